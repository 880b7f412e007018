//! Store abstraction: write batches, query filters, receipts
//!
//! [`GraphStore`] is the seam between the ingestion/lifecycle layers and
//! whatever holds the graph. A write batch is the unit of atomicity: the
//! store applies every operation in a batch or none of them.

use crate::error::GraphError;
use crate::ids::{LayerId, NodeId, RelId, TenantId};
use crate::node::{NodeDraft, NodeKind, ResourceNode};
use crate::rel::{RelDraft, RelType, Relationship};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which half of the dual graph a query addresses
///
/// Defaults to [`GraphScope::Abstracted`]: the anonymized subgraph is the
/// product, so reads land there unless a caller asks otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GraphScope {
    /// Abstracted nodes, relationships between abstracted nodes
    #[default]
    Abstracted,
    /// Original nodes, relationships between original nodes
    Original,
    /// Everything, provenance edges included
    Both,
}

impl GraphScope {
    /// Whether a node of `kind` is visible in this scope
    #[inline]
    #[must_use]
    pub fn admits_node(self, kind: NodeKind) -> bool {
        match self {
            GraphScope::Abstracted => kind == NodeKind::Abstracted,
            GraphScope::Original => kind == NodeKind::Original,
            GraphScope::Both => true,
        }
    }

    /// Whether a relationship with these endpoint kinds is visible
    #[inline]
    #[must_use]
    pub fn admits_rel(self, source_kind: NodeKind, target_kind: NodeKind) -> bool {
        match self {
            GraphScope::Abstracted => {
                source_kind == NodeKind::Abstracted && target_kind == NodeKind::Abstracted
            }
            GraphScope::Original => {
                source_kind == NodeKind::Original && target_kind == NodeKind::Original
            }
            GraphScope::Both => true,
        }
    }
}

/// One operation inside a write batch
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create or update a node, keyed by `(layer, kind, resource_id)`
    UpsertNode(NodeDraft),
    /// Create or update a relationship, keyed by
    /// `(layer, rel_type, source, target)`
    UpsertRelationship(RelDraft),
}

/// An atomic unit of graph mutation
///
/// A batch is scoped to one tenant and one layer. Relationship drafts may
/// reference the proposed ids of node drafts in the same batch; the store
/// resolves them to effective ids during staging.
#[derive(Debug, Clone)]
pub struct WriteBatch {
    /// Tenant every operation belongs to
    pub tenant: TenantId,
    /// Layer every operation writes into
    pub layer: LayerId,
    /// Allow writes into a protected layer
    pub override_protection: bool,
    /// Operations in application order
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Open an empty batch for one tenant and layer
    #[must_use]
    pub fn new(tenant: TenantId, layer: LayerId) -> Self {
        Self {
            tenant,
            layer,
            override_protection: false,
            ops: Vec::new(),
        }
    }

    /// Permit this batch to write into a protected layer
    #[must_use]
    pub fn with_override_protection(mut self) -> Self {
        self.override_protection = true;
        self
    }

    /// Queue a node upsert, returning the draft's proposed id
    ///
    /// The receipt maps the proposed id to the effective one, which
    /// differs when the upsert matched an existing node.
    pub fn upsert_node(&mut self, draft: NodeDraft) -> NodeId {
        let proposed = draft.id;
        self.ops.push(WriteOp::UpsertNode(draft));
        proposed
    }

    /// Queue a relationship upsert, returning the draft's proposed id
    pub fn upsert_relationship(&mut self, draft: RelDraft) -> RelId {
        let proposed = draft.id;
        self.ops.push(WriteOp::UpsertRelationship(draft));
        proposed
    }

    /// Number of queued operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no operations
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Outcome of one applied operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A node was created or updated
    Node {
        /// Id the draft proposed
        proposed: NodeId,
        /// Id the node holds in the store
        id: NodeId,
        /// True on first insert, false on update
        created: bool,
    },
    /// A relationship was created or updated
    Relationship {
        /// Id the draft proposed
        proposed: RelId,
        /// Id the relationship holds in the store
        id: RelId,
        /// True on first insert, false on update
        created: bool,
    },
}

/// Receipt for a committed batch, entries in operation order
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Tenant the batch wrote for
    pub tenant: TenantId,
    /// Layer the batch wrote into
    pub layer: LayerId,
    /// One entry per operation
    pub applied: Vec<Applied>,
}

impl CommitReceipt {
    /// Resolve a draft's proposed node id to the effective stored id
    #[must_use]
    pub fn effective_node(&self, proposed: NodeId) -> Option<NodeId> {
        self.applied.iter().find_map(|entry| match entry {
            Applied::Node { proposed: p, id, .. } if *p == proposed => Some(*id),
            _ => None,
        })
    }

    /// Resolve a draft's proposed relationship id to the effective stored id
    #[must_use]
    pub fn effective_relationship(&self, proposed: RelId) -> Option<RelId> {
        self.applied.iter().find_map(|entry| match entry {
            Applied::Relationship { proposed: p, id, .. } if *p == proposed => Some(*id),
            _ => None,
        })
    }

    /// Nodes inserted for the first time
    #[must_use]
    pub fn nodes_created(&self) -> usize {
        self.applied
            .iter()
            .filter(|e| matches!(e, Applied::Node { created: true, .. }))
            .count()
    }

    /// Nodes that matched an existing key and were updated
    #[must_use]
    pub fn nodes_updated(&self) -> usize {
        self.applied
            .iter()
            .filter(|e| matches!(e, Applied::Node { created: false, .. }))
            .count()
    }

    /// Relationships inserted for the first time
    #[must_use]
    pub fn relationships_created(&self) -> usize {
        self.applied
            .iter()
            .filter(|e| matches!(e, Applied::Relationship { created: true, .. }))
            .count()
    }

    /// Relationships that matched an existing key and were updated
    #[must_use]
    pub fn relationships_updated(&self) -> usize {
        self.applied
            .iter()
            .filter(|e| matches!(e, Applied::Relationship { created: false, .. }))
            .count()
    }
}

/// Node query, scoped to one layer
#[derive(Debug, Clone)]
pub struct NodeFilter {
    /// Layer to read from
    pub layer: LayerId,
    /// Which subgraph to read
    pub scope: GraphScope,
    /// Restrict to one resource type
    pub resource_type: Option<String>,
    /// Restrict to one resource id
    pub resource_id: Option<String>,
}

impl NodeFilter {
    /// All abstracted nodes in a layer
    #[must_use]
    pub fn in_layer(layer: LayerId) -> Self {
        Self {
            layer,
            scope: GraphScope::default(),
            resource_type: None,
            resource_id: None,
        }
    }

    /// Read from a different scope
    #[must_use]
    pub fn with_scope(mut self, scope: GraphScope) -> Self {
        self.scope = scope;
        self
    }

    /// Restrict to one resource type
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Restrict to one resource id
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Whether a node satisfies this filter
    #[must_use]
    pub fn matches(&self, node: &ResourceNode) -> bool {
        node.layer == self.layer
            && self.scope.admits_node(node.kind)
            && self
                .resource_type
                .as_ref()
                .map_or(true, |t| node.resource_type == *t)
            && self
                .resource_id
                .as_ref()
                .map_or(true, |r| node.resource_id == *r)
    }
}

/// Relationship query, scoped to one layer
#[derive(Debug, Clone)]
pub struct RelFilter {
    /// Layer to read from
    pub layer: LayerId,
    /// Which subgraph to read
    pub scope: GraphScope,
    /// Restrict to one relationship type
    pub rel_type: Option<RelType>,
}

impl RelFilter {
    /// All abstracted-side relationships in a layer
    #[must_use]
    pub fn in_layer(layer: LayerId) -> Self {
        Self {
            layer,
            scope: GraphScope::default(),
            rel_type: None,
        }
    }

    /// Read from a different scope
    #[must_use]
    pub fn with_scope(mut self, scope: GraphScope) -> Self {
        self.scope = scope;
        self
    }

    /// Restrict to one relationship type
    #[must_use]
    pub fn with_rel_type(mut self, rel_type: RelType) -> Self {
        self.rel_type = Some(rel_type);
        self
    }

    /// Whether a relationship with the given endpoint kinds satisfies
    /// this filter
    #[must_use]
    pub fn matches(
        &self,
        rel: &Relationship,
        source_kind: NodeKind,
        target_kind: NodeKind,
    ) -> bool {
        rel.layer == self.layer
            && self.scope.admits_rel(source_kind, target_kind)
            && self.rel_type.as_ref().map_or(true, |t| rel.rel_type == *t)
    }
}

/// Node totals per subgraph within one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeCounts {
    /// Nodes in the original subgraph
    pub original: usize,
    /// Nodes in the abstracted subgraph
    pub abstracted: usize,
}

impl NodeCounts {
    /// Whether both subgraphs hold the same number of nodes
    #[inline]
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.original == self.abstracted
    }
}

/// Relationship totals per type and subgraph within one layer
///
/// Provenance edges are counted separately: they belong to neither
/// subgraph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelTypeCounts {
    /// Counts by wire name in the original subgraph
    pub original: BTreeMap<String, usize>,
    /// Counts by wire name in the abstracted subgraph
    pub abstracted: BTreeMap<String, usize>,
    /// Provenance edges crossing the two
    pub provenance: usize,
}

impl RelTypeCounts {
    /// Relationship types whose counts differ between subgraphs,
    /// sorted by wire name
    #[must_use]
    pub fn mismatched_types(&self) -> Vec<String> {
        let mut types: Vec<&String> = self.original.keys().chain(self.abstracted.keys()).collect();
        types.sort();
        types.dedup();
        types
            .into_iter()
            .filter(|t| {
                self.original.get(*t).copied().unwrap_or(0)
                    != self.abstracted.get(*t).copied().unwrap_or(0)
            })
            .cloned()
            .collect()
    }

    /// Whether per-type counts agree between the subgraphs
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.mismatched_types().is_empty()
    }
}

/// One provenance edge resolved to both endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenancePair {
    /// Abstracted endpoint (edge source)
    pub abstracted: NodeId,
    /// Original endpoint (edge target)
    pub original: NodeId,
    /// The edge itself
    pub rel: RelId,
    /// `resource_id` of the abstracted endpoint
    pub abstracted_resource_id: String,
    /// `resource_id` of the original endpoint
    pub original_resource_id: String,
}

/// Per-layer summary, as returned by [`GraphStore::layers`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerInfo {
    /// Layer name
    pub layer: LayerId,
    /// Whether the layer is protected against modification
    pub protected: bool,
    /// Nodes across both subgraphs
    pub nodes: usize,
    /// Relationships, provenance included
    pub relationships: usize,
}

/// What a layer removal deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerRemoval {
    /// Nodes deleted across both subgraphs
    pub nodes_removed: usize,
    /// Relationships deleted, provenance included
    pub relationships_removed: usize,
}

/// Backend holding the dual graph
///
/// Implementations must apply a [`WriteBatch`] atomically and keep every
/// read and write scoped to the given tenant.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Apply a batch; all operations commit or none do
    async fn apply(&self, batch: WriteBatch) -> Result<CommitReceipt, GraphError>;

    /// Fetch one node by element id
    async fn node(&self, tenant: TenantId, id: NodeId) -> Result<Option<ResourceNode>, GraphError>;

    /// Nodes matching a filter, unordered
    async fn nodes(
        &self,
        tenant: TenantId,
        filter: NodeFilter,
    ) -> Result<Vec<ResourceNode>, GraphError>;

    /// Node totals per subgraph for one layer
    async fn node_counts(&self, tenant: TenantId, layer: &LayerId)
        -> Result<NodeCounts, GraphError>;

    /// Relationships matching a filter, unordered
    async fn relationships(
        &self,
        tenant: TenantId,
        filter: RelFilter,
    ) -> Result<Vec<Relationship>, GraphError>;

    /// Relationship totals per type and subgraph for one layer
    async fn relationship_counts(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<RelTypeCounts, GraphError>;

    /// Every provenance edge in one layer, endpoints resolved
    async fn provenance_pairs(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<Vec<ProvenancePair>, GraphError>;

    /// Layers holding data for a tenant, sorted by name
    async fn layers(&self, tenant: TenantId) -> Result<Vec<LayerInfo>, GraphError>;

    /// Delete every element in a layer
    ///
    /// Fails with [`GraphError::ProtectedLayer`] unless
    /// `override_protection` is set, and with [`GraphError::LayerNotFound`]
    /// when the layer holds nothing for this tenant.
    async fn remove_layer(
        &self,
        tenant: TenantId,
        layer: &LayerId,
        override_protection: bool,
    ) -> Result<LayerRemoval, GraphError>;

    /// Mark a layer protected or unprotected
    async fn protect_layer(
        &self,
        tenant: TenantId,
        layer: &LayerId,
        protected: bool,
    ) -> Result<(), GraphError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PropertyBag;

    fn draft(kind: NodeKind, rid: &str) -> NodeDraft {
        NodeDraft::new(kind, rid, "vm", PropertyBag::new())
    }

    #[test]
    fn batch_preserves_operation_order() {
        let mut batch = WriteBatch::new(TenantId::new(), LayerId::default_layer());
        let a = batch.upsert_node(draft(NodeKind::Original, "r1"));
        let b = batch.upsert_node(draft(NodeKind::Abstracted, "vm-abc"));
        batch.upsert_relationship(RelDraft::provenance(b, a));

        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert!(matches!(batch.ops[0], WriteOp::UpsertNode(_)));
        assert!(matches!(batch.ops[2], WriteOp::UpsertRelationship(_)));
    }

    #[test]
    fn scope_defaults_to_abstracted() {
        let filter = NodeFilter::in_layer(LayerId::default_layer());
        assert_eq!(filter.scope, GraphScope::Abstracted);
        assert!(filter.scope.admits_node(NodeKind::Abstracted));
        assert!(!filter.scope.admits_node(NodeKind::Original));
    }

    #[test]
    fn scope_admits_relationships_by_endpoint_kind() {
        assert!(GraphScope::Abstracted.admits_rel(NodeKind::Abstracted, NodeKind::Abstracted));
        assert!(!GraphScope::Abstracted.admits_rel(NodeKind::Abstracted, NodeKind::Original));
        assert!(GraphScope::Original.admits_rel(NodeKind::Original, NodeKind::Original));
        assert!(GraphScope::Both.admits_rel(NodeKind::Abstracted, NodeKind::Original));
    }

    #[test]
    fn node_filter_narrows_by_type_and_resource_id() {
        let layer = LayerId::default_layer();
        let mut batch = WriteBatch::new(TenantId::new(), layer.clone());
        let id = batch.upsert_node(draft(NodeKind::Abstracted, "vm-abc"));
        let WriteOp::UpsertNode(d) = &batch.ops[0] else {
            panic!("expected node op");
        };
        let node = d.clone().into_node(batch.tenant, layer.clone());
        assert_eq!(node.id, id);

        assert!(NodeFilter::in_layer(layer.clone()).matches(&node));
        assert!(NodeFilter::in_layer(layer.clone())
            .with_resource_type("vm")
            .matches(&node));
        assert!(!NodeFilter::in_layer(layer.clone())
            .with_resource_type("storage")
            .matches(&node));
        assert!(!NodeFilter::in_layer(layer)
            .with_resource_id("other")
            .matches(&node));
    }

    #[test]
    fn receipt_resolves_proposed_ids() {
        let proposed = NodeId::new();
        let effective = NodeId::new();
        let receipt = CommitReceipt {
            tenant: TenantId::new(),
            layer: LayerId::default_layer(),
            applied: vec![Applied::Node {
                proposed,
                id: effective,
                created: false,
            }],
        };
        assert_eq!(receipt.effective_node(proposed), Some(effective));
        assert_eq!(receipt.effective_node(NodeId::new()), None);
        assert_eq!(receipt.nodes_created(), 0);
        assert_eq!(receipt.nodes_updated(), 1);
    }

    #[test]
    fn mismatched_types_reports_union_of_divergent_keys() {
        let mut counts = RelTypeCounts::default();
        counts.original.insert("CONTAINS".to_string(), 3);
        counts.abstracted.insert("CONTAINS".to_string(), 3);
        counts.original.insert("DEPENDS_ON".to_string(), 2);
        counts.abstracted.insert("CONNECTED_TO".to_string(), 1);

        assert!(!counts.is_balanced());
        assert_eq!(
            counts.mismatched_types(),
            vec!["CONNECTED_TO".to_string(), "DEPENDS_ON".to_string()]
        );
    }
}
