//! Advisory per-layer locks for lifecycle operations.
//!
//! Lifecycle operations (copy, archive, restore, remove) are rare and
//! coarse; two of them racing on the same layer would interleave reads
//! and writes badly. The registry hands out one async mutex per
//! `(tenant, layer)` and acquires multi-layer sets in sorted order so
//! concurrent copies can never deadlock. Acquisition is fail-fast:
//! a held lock surfaces as [`LayerError::LayerBusy`] instead of
//! queueing.

use std::sync::Arc;

use dashmap::DashMap;
use doppel_graph::{LayerId, TenantId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::LayerError;

#[derive(Default)]
pub(crate) struct LockRegistry {
    locks: DashMap<(TenantId, LayerId), Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn handle(&self, tenant: TenantId, layer: &LayerId) -> Arc<Mutex<()>> {
        self.locks
            .entry((tenant, layer.clone()))
            .or_default()
            .clone()
    }

    /// Acquire every named layer for one tenant, or none of them.
    pub(crate) fn try_acquire(
        &self,
        tenant: TenantId,
        layers: &[&LayerId],
    ) -> Result<Vec<OwnedMutexGuard<()>>, LayerError> {
        let mut ordered: Vec<&LayerId> = layers.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for layer in ordered {
            let handle = self.handle(tenant, layer);
            match handle.try_lock_owned() {
                Ok(guard) => guards.push(guard),
                // Guards taken so far drop here, releasing them.
                Err(_) => {
                    return Err(LayerError::LayerBusy {
                        layer: layer.clone(),
                    })
                }
            }
        }
        Ok(guards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(name: &str) -> LayerId {
        name.parse().unwrap()
    }

    #[tokio::test]
    async fn second_acquisition_of_a_held_layer_fails_fast() {
        let registry = LockRegistry::new();
        let tenant = TenantId::new();
        let a = layer("layer-a");

        let _held = registry.try_acquire(tenant, &[&a]).unwrap();
        let err = registry.try_acquire(tenant, &[&a]).unwrap_err();
        assert!(matches!(err, LayerError::LayerBusy { .. }));
    }

    #[tokio::test]
    async fn failed_multi_layer_acquisition_releases_what_it_took() {
        let registry = LockRegistry::new();
        let tenant = TenantId::new();
        let a = layer("layer-a");
        let b = layer("layer-b");

        let held_b = registry.try_acquire(tenant, &[&b]).unwrap();
        // Takes a, then fails on b and must release a.
        assert!(registry.try_acquire(tenant, &[&a, &b]).is_err());
        drop(held_b);

        let both = registry.try_acquire(tenant, &[&a, &b]).unwrap();
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn same_layer_listed_twice_locks_once() {
        let registry = LockRegistry::new();
        let tenant = TenantId::new();
        let a = layer("layer-a");

        let guards = registry.try_acquire(tenant, &[&a, &a]).unwrap();
        assert_eq!(guards.len(), 1);
    }

    #[tokio::test]
    async fn tenants_do_not_contend() {
        let registry = LockRegistry::new();
        let a = layer("layer-a");

        let _held = registry.try_acquire(TenantId::new(), &[&a]).unwrap();
        assert!(registry.try_acquire(TenantId::new(), &[&a]).is_ok());
    }
}
