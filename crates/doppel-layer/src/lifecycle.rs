//! Lifecycle operations over whole layers.
//!
//! Copy, archive, restore and remove all operate under per-layer
//! advisory locks. Writes larger than one batch are chunked; a failure
//! partway through a copy or restore rolls the target back so no
//! half-populated layer survives.

use std::collections::HashMap;
use std::sync::Arc;

use doppel_graph::{
    with_retry, CommitReceipt, GraphError, GraphScope, GraphStore, LayerId, LayerRemoval,
    NodeDraft, NodeFilter, NodeId, RelDraft, RelFilter, Relationship, ResourceNode, RetryPolicy,
    TenantId, WriteBatch,
};
use serde::Serialize;

use crate::archive::{validate_archive, EndpointRef, LayerArchive};
use crate::error::LayerError;
use crate::locks::LockRegistry;

/// Operations per write batch during copy and restore.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Outcome of [`LayerLifecycleManager::copy_layer`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CopyReport {
    /// Nodes written into the target layer.
    pub nodes_copied: usize,
    /// Relationships rewired onto the copied nodes.
    pub relationships_copied: usize,
}

/// Outcome of [`LayerLifecycleManager::restore_layer`].
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    /// True when the archive was legacy and guarantees are reduced.
    pub degraded: bool,
    /// Nodes rebuilt in the target layer.
    pub nodes_restored: usize,
    /// Relationships rebuilt in the target layer.
    pub relationships_restored: usize,
    /// Pre-flight warnings, empty for current-format archives.
    pub warnings: Vec<String>,
}

/// Copies, archives, restores and removes layers for one store.
///
/// Lifecycle operations are coarse and rare; concurrent operations on
/// the same layer fail fast with [`LayerError::LayerBusy`] rather than
/// queue.
pub struct LayerLifecycleManager {
    store: Arc<dyn GraphStore>,
    locks: LockRegistry,
    policy: RetryPolicy,
    chunk_size: usize,
}

impl LayerLifecycleManager {
    /// Build a manager over a store with default retry and chunking.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            locks: LockRegistry::new(),
            policy: RetryPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Replace the retry policy used for store commits.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Change how many operations go into one write batch.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Copy every element of `source` into an empty `target` layer.
    ///
    /// The copy is fully isolated: nodes get fresh element ids, and all
    /// relationships, provenance edges included, are rewired onto the
    /// new ids. Editing the copy never touches the source.
    ///
    /// # Errors
    ///
    /// [`LayerError::LayerBusy`] when either layer is locked,
    /// [`LayerError::TargetNotEmpty`] when the target holds data, and
    /// store failures; writing into a protected target fails with a
    /// security violation unless the layer is unprotected first.
    pub async fn copy_layer(
        &self,
        tenant: TenantId,
        source: &LayerId,
        target: &LayerId,
    ) -> Result<CopyReport, LayerError> {
        let _guards = self.locks.try_acquire(tenant, &[source, target])?;
        self.ensure_empty(tenant, target).await?;

        let (nodes, relationships) = self.read_layer(tenant, source).await?;
        let nodes_copied = nodes.len();
        let relationships_copied = relationships.len();

        let result = self.write_copy(tenant, target, nodes, relationships).await;
        if let Err(err) = result {
            tracing::error!(
                tenant = %tenant,
                source = %source,
                target = %target,
                error = %err,
                "layer copy failed, rolling back target"
            );
            self.roll_back(tenant, target).await;
            return Err(err);
        }

        tracing::info!(
            tenant = %tenant,
            source = %source,
            target = %target,
            nodes = nodes_copied,
            relationships = relationships_copied,
            "layer copied"
        );
        Ok(CopyReport {
            nodes_copied,
            relationships_copied,
        })
    }

    /// Snapshot a layer into a checksummed archive document.
    ///
    /// Persistence is separate; hand the result to a
    /// [`FileArchiveStore`](crate::FileArchiveStore) to write it out.
    ///
    /// # Errors
    ///
    /// [`LayerError::LayerBusy`] when the layer is locked, plus store
    /// read failures.
    pub async fn archive_layer(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<LayerArchive, LayerError> {
        let _guards = self.locks.try_acquire(tenant, &[layer])?;
        let (nodes, relationships) = self.read_layer(tenant, layer).await?;
        if nodes.is_empty() {
            tracing::warn!(tenant = %tenant, layer = %layer, "archiving an empty layer");
        }

        let archive = LayerArchive::build(tenant, layer.clone(), nodes, relationships)?;
        tracing::info!(
            tenant = %tenant,
            layer = %layer,
            nodes = archive.nodes.len(),
            relationships = archive.relationships.len(),
            "layer archived"
        );
        Ok(archive)
    }

    /// Rebuild an archived layer inside an empty target layer.
    ///
    /// Pre-flight validation runs before any write: schema version,
    /// checksum and endpoint integrity. A failure after writes have
    /// started rolls the target back to empty.
    ///
    /// # Errors
    ///
    /// [`ArchiveSchemaError`](crate::ArchiveSchemaError) variants from
    /// pre-flight, [`LayerError::LayerBusy`],
    /// [`LayerError::TargetNotEmpty`], and store failures.
    pub async fn restore_layer(
        &self,
        tenant: TenantId,
        archive: &LayerArchive,
        target: &LayerId,
    ) -> Result<RestoreReport, LayerError> {
        let check = validate_archive(archive)?;
        if tenant != archive.tenant {
            tracing::warn!(
                archive_tenant = %archive.tenant,
                tenant = %tenant,
                "restoring an archive into a different tenant"
            );
        }

        let _guards = self.locks.try_acquire(tenant, &[target])?;
        self.ensure_empty(tenant, target).await?;

        let result = self.write_restore(tenant, archive, target).await;
        match result {
            Ok((nodes_restored, relationships_restored)) => {
                tracing::info!(
                    tenant = %tenant,
                    target = %target,
                    nodes = nodes_restored,
                    relationships = relationships_restored,
                    degraded = check.degraded,
                    "layer restored"
                );
                Ok(RestoreReport {
                    degraded: check.degraded,
                    nodes_restored,
                    relationships_restored,
                    warnings: check.warnings,
                })
            }
            Err(err) => {
                tracing::error!(
                    tenant = %tenant,
                    target = %target,
                    error = %err,
                    "restore failed, rolling back target"
                );
                self.roll_back(tenant, target).await;
                Err(err)
            }
        }
    }

    /// Remove a layer, honoring protection.
    ///
    /// # Errors
    ///
    /// [`LayerError::LayerBusy`] when the layer is locked, a security
    /// violation for protected layers without `override_protection`,
    /// and [`GraphError::LayerNotFound`] for empty layers.
    pub async fn remove_layer(
        &self,
        tenant: TenantId,
        layer: &LayerId,
        override_protection: bool,
    ) -> Result<LayerRemoval, LayerError> {
        let _guards = self.locks.try_acquire(tenant, &[layer])?;
        let removal = self
            .store
            .remove_layer(tenant, layer, override_protection)
            .await?;
        tracing::info!(
            tenant = %tenant,
            layer = %layer,
            nodes = removal.nodes_removed,
            relationships = removal.relationships_removed,
            "layer removed"
        );
        Ok(removal)
    }

    /// Mark a layer protected or unprotected.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn set_protection(
        &self,
        tenant: TenantId,
        layer: &LayerId,
        protected: bool,
    ) -> Result<(), LayerError> {
        self.store.protect_layer(tenant, layer, protected).await?;
        tracing::info!(tenant = %tenant, layer = %layer, protected, "layer protection changed");
        Ok(())
    }

    async fn read_layer(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<(Vec<ResourceNode>, Vec<Relationship>), LayerError> {
        let nodes = self
            .store
            .nodes(
                tenant,
                NodeFilter::in_layer(layer.clone()).with_scope(GraphScope::Both),
            )
            .await?;
        let relationships = self
            .store
            .relationships(
                tenant,
                RelFilter::in_layer(layer.clone()).with_scope(GraphScope::Both),
            )
            .await?;
        Ok((nodes, relationships))
    }

    async fn ensure_empty(&self, tenant: TenantId, layer: &LayerId) -> Result<(), LayerError> {
        let counts = self.store.node_counts(tenant, layer).await?;
        if counts.original + counts.abstracted > 0 {
            return Err(LayerError::TargetNotEmpty {
                layer: layer.clone(),
            });
        }
        Ok(())
    }

    async fn apply_chunk(
        &self,
        batch: WriteBatch,
        operation: &str,
    ) -> Result<CommitReceipt, GraphError> {
        with_retry(&self.policy, operation, || {
            let store = Arc::clone(&self.store);
            let batch = batch.clone();
            async move { store.apply(batch).await }
        })
        .await
    }

    async fn write_copy(
        &self,
        tenant: TenantId,
        target: &LayerId,
        nodes: Vec<ResourceNode>,
        relationships: Vec<Relationship>,
    ) -> Result<(), LayerError> {
        let mut new_ids: HashMap<NodeId, NodeId> = HashMap::with_capacity(nodes.len());

        for chunk in nodes.chunks(self.chunk_size) {
            let mut batch = WriteBatch::new(tenant, target.clone());
            let mut pending = Vec::with_capacity(chunk.len());
            for node in chunk {
                let proposed = batch.upsert_node(NodeDraft::new(
                    node.kind,
                    &node.resource_id,
                    &node.resource_type,
                    node.properties.clone(),
                ));
                pending.push((node.id, proposed));
            }
            let receipt = self.apply_chunk(batch, "copy_layer_nodes").await?;
            for (old, proposed) in pending {
                if let Some(effective) = receipt.effective_node(proposed) {
                    new_ids.insert(old, effective);
                }
            }
        }

        for chunk in relationships.chunks(self.chunk_size) {
            let mut batch = WriteBatch::new(tenant, target.clone());
            for rel in chunk {
                let (Some(source), Some(target_id)) =
                    (new_ids.get(&rel.source), new_ids.get(&rel.target))
                else {
                    tracing::warn!(rel = %rel.id, "skipping relationship with endpoint outside the layer");
                    continue;
                };
                batch.upsert_relationship(RelDraft::new(
                    rel.rel_type.clone(),
                    *source,
                    *target_id,
                    rel.properties.clone(),
                ));
            }
            if batch.is_empty() {
                continue;
            }
            self.apply_chunk(batch, "copy_layer_relationships").await?;
        }
        Ok(())
    }

    async fn write_restore(
        &self,
        tenant: TenantId,
        archive: &LayerArchive,
        target: &LayerId,
    ) -> Result<(usize, usize), LayerError> {
        let mut ids: HashMap<EndpointRef, NodeId> = HashMap::with_capacity(archive.nodes.len());
        let mut nodes_restored = 0usize;
        let mut relationships_restored = 0usize;

        for chunk in archive.nodes.chunks(self.chunk_size) {
            let mut batch = WriteBatch::new(tenant, target.clone());
            let mut pending = Vec::with_capacity(chunk.len());
            for node in chunk {
                let proposed = batch.upsert_node(NodeDraft::new(
                    node.kind,
                    &node.resource_id,
                    &node.resource_type,
                    node.properties.clone(),
                ));
                pending.push((
                    EndpointRef {
                        kind: node.kind,
                        resource_id: node.resource_id.clone(),
                    },
                    proposed,
                ));
            }
            let receipt = self.apply_chunk(batch, "restore_layer_nodes").await?;
            for (endpoint, proposed) in pending {
                if let Some(effective) = receipt.effective_node(proposed) {
                    ids.insert(endpoint, effective);
                    nodes_restored += 1;
                }
            }
        }

        for chunk in archive.relationships.chunks(self.chunk_size) {
            let mut batch = WriteBatch::new(tenant, target.clone());
            for rel in chunk {
                // Pre-flight guaranteed both endpoints are archived.
                let (Some(source), Some(target_id)) = (ids.get(&rel.source), ids.get(&rel.target))
                else {
                    tracing::warn!(rel_type = %rel.rel_type, "archived relationship endpoint missing after node restore");
                    continue;
                };
                batch.upsert_relationship(RelDraft::new(
                    rel.rel_type.clone(),
                    *source,
                    *target_id,
                    rel.properties.clone(),
                ));
            }
            if batch.is_empty() {
                continue;
            }
            let receipt = self
                .apply_chunk(batch, "restore_layer_relationships")
                .await?;
            relationships_restored +=
                receipt.relationships_created() + receipt.relationships_updated();
        }

        Ok((nodes_restored, relationships_restored))
    }

    /// Best-effort removal of a partially written target.
    async fn roll_back(&self, tenant: TenantId, layer: &LayerId) {
        match self.store.remove_layer(tenant, layer, false).await {
            Ok(removal) => {
                tracing::warn!(
                    tenant = %tenant,
                    layer = %layer,
                    nodes = removal.nodes_removed,
                    relationships = removal.relationships_removed,
                    "rolled back partial layer writes"
                );
            }
            // Nothing was written before the failure.
            Err(GraphError::LayerNotFound { .. }) => {}
            Err(err) => {
                tracing::error!(
                    tenant = %tenant,
                    layer = %layer,
                    error = %err,
                    "rollback after failed lifecycle operation also failed"
                );
            }
        }
    }
}
