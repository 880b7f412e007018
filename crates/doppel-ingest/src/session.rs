//! Scan sessions and the pair index
//!
//! A scan session binds a tenant, a target layer and the tenant's
//! abstractor for the duration of one discovery run. Its [`PairIndex`]
//! maps original resource ids to the node pair already written, so
//! relationship mirroring is an indexed lookup rather than a graph
//! traversal; resuming a session hydrates the index from the store's
//! provenance edges.

use dashmap::DashMap;
use doppel_abstract::{AbstractedId, IdAbstractor};
use doppel_graph::{GraphError, GraphStore, LayerId, NodeId, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use ulid::Ulid;

/// Sortable identifier of one scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate a fresh session id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The node pair written for one original resource
#[derive(Debug, Clone)]
pub struct PairEntry {
    /// Original-subgraph node
    pub original_node: NodeId,
    /// Abstracted-subgraph node
    pub abstracted_node: NodeId,
    /// The abstracted resource id
    pub abstracted_id: AbstractedId,
}

/// original resource id -> pair, concurrent
#[derive(Debug, Default)]
pub struct PairIndex {
    entries: DashMap<String, PairEntry>,
}

impl PairIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the pair for an original resource id
    #[must_use]
    pub fn get(&self, original_resource_id: &str) -> Option<PairEntry> {
        self.entries.get(original_resource_id).map(|e| e.clone())
    }

    pub(crate) fn insert(&self, original_resource_id: String, entry: PairEntry) {
        self.entries.insert(original_resource_id, entry);
    }

    /// Number of indexed pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fill the index from the store's provenance edges
    ///
    /// Returns how many pairs were loaded. Existing entries for the same
    /// resource ids are overwritten with the stored truth.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn hydrate(
        &self,
        store: &dyn GraphStore,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<usize, GraphError> {
        let pairs = store.provenance_pairs(tenant, layer).await?;
        let loaded = pairs.len();
        for pair in pairs {
            self.insert(
                pair.original_resource_id,
                PairEntry {
                    original_node: pair.original,
                    abstracted_node: pair.abstracted,
                    abstracted_id: AbstractedId::from(pair.abstracted_resource_id),
                },
            );
        }
        Ok(loaded)
    }
}

/// One discovery run against one tenant and layer
pub struct ScanSession {
    id: SessionId,
    tenant: TenantId,
    layer: LayerId,
    abstractor: IdAbstractor,
    pairs: PairIndex,
}

impl ScanSession {
    /// Open a fresh session with an empty pair index
    #[must_use]
    pub fn new(tenant: TenantId, layer: LayerId, abstractor: IdAbstractor) -> Self {
        Self {
            id: SessionId::new(),
            tenant,
            layer,
            abstractor,
            pairs: PairIndex::new(),
        }
    }

    /// Open a session over a layer with existing data, hydrating the pair
    /// index from stored provenance
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn resume(
        store: &dyn GraphStore,
        tenant: TenantId,
        layer: LayerId,
        abstractor: IdAbstractor,
    ) -> Result<Self, GraphError> {
        let session = Self::new(tenant, layer, abstractor);
        let loaded = session.pairs.hydrate(store, tenant, &session.layer).await?;
        tracing::info!(
            session = %session.id,
            tenant = %tenant,
            layer = %session.layer,
            pairs = loaded,
            "resumed scan session"
        );
        Ok(session)
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Tenant this session writes for
    #[inline]
    #[must_use]
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// Layer this session writes into
    #[inline]
    #[must_use]
    pub fn layer(&self) -> &LayerId {
        &self.layer
    }

    /// The tenant's abstractor
    #[inline]
    #[must_use]
    pub fn abstractor(&self) -> &IdAbstractor {
        &self.abstractor
    }

    /// The session's pair index
    #[inline]
    #[must_use]
    pub fn pairs(&self) -> &PairIndex {
        &self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doppel_graph::{MemoryGraphStore, NodeDraft, NodeKind, PropertyBag, RelDraft, WriteBatch};

    #[tokio::test]
    async fn hydrate_rebuilds_the_index_from_provenance() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();

        let mut batch = WriteBatch::new(tenant, layer.clone());
        let original = batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            "/sub/1/vm/web-01",
            "vm",
            PropertyBag::new(),
        ));
        let abstracted = batch.upsert_node(NodeDraft::new(
            NodeKind::Abstracted,
            "vm-a1b2c3d4e5f6",
            "vm",
            PropertyBag::new(),
        ));
        batch.upsert_relationship(RelDraft::provenance(abstracted, original));
        store.apply(batch).await.unwrap();

        let index = PairIndex::new();
        let loaded = index.hydrate(&store, tenant, &layer).await.unwrap();
        assert_eq!(loaded, 1);

        let entry = index.get("/sub/1/vm/web-01").unwrap();
        assert_eq!(entry.original_node, original);
        assert_eq!(entry.abstracted_node, abstracted);
        assert_eq!(entry.abstracted_id.as_str(), "vm-a1b2c3d4e5f6");
        assert!(index.get("/sub/1/vm/other").is_none());
    }

    #[tokio::test]
    async fn resume_on_an_empty_layer_yields_an_empty_index() {
        let store = MemoryGraphStore::new();
        let session = ScanSession::resume(
            &store,
            TenantId::new(),
            LayerId::default_layer(),
            IdAbstractor::new(doppel_abstract::AbstractionSeed::generate()),
        )
        .await
        .unwrap();
        assert!(session.pairs().is_empty());
    }
}
