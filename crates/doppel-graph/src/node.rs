//! Resource nodes: the two variants of one logical resource
//!
//! Every discovered resource is materialized twice, as a tagged pair
//! rather than inheritance: an Original node carrying the real cloud
//! identity and an Abstracted node carrying the pseudonymized identity.
//! Both share one property-bag shape and differ only in [`NodeKind`] and
//! the `resource_id` they carry.

use crate::ids::{LayerId, NodeId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Property bag attached to nodes and relationships
pub type PropertyBag = serde_json::Map<String, serde_json::Value>;

/// Which side of the dual graph a node belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// True cloud identity; labels `{Resource, Original}`
    Original,
    /// Deterministically anonymized identity; label `{Resource}` only
    Abstracted,
}

impl NodeKind {
    /// Graph labels carried by this node variant
    ///
    /// The Abstracted side intentionally carries only `Resource`, so the
    /// default traversal (filter on `Resource` without `Original`) returns
    /// the anonymized subgraph.
    #[inline]
    #[must_use]
    pub const fn labels(&self) -> &'static [&'static str] {
        match self {
            NodeKind::Original => &["Resource", "Original"],
            NodeKind::Abstracted => &["Resource"],
        }
    }

    /// The opposite side of the dual graph
    #[inline]
    #[must_use]
    pub const fn counterpart(&self) -> Self {
        match self {
            NodeKind::Original => NodeKind::Abstracted,
            NodeKind::Abstracted => NodeKind::Original,
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Original => write!(f, "Original"),
            NodeKind::Abstracted => write!(f, "Abstracted"),
        }
    }
}

/// Logical upsert identity of a node within one tenant
///
/// Re-processing the same `(layer, kind, resource_id)` updates the stored
/// node in place; the internal [`NodeId`] stays stable across upserts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    /// Owning layer
    pub layer: LayerId,
    /// Dual-graph side
    pub kind: NodeKind,
    /// Cloud resource id (Original) or abstracted id (Abstracted)
    pub resource_id: String,
}

impl NodeKey {
    /// Build a key
    #[inline]
    #[must_use]
    pub fn new(layer: LayerId, kind: NodeKind, resource_id: impl Into<String>) -> Self {
        Self {
            layer,
            kind,
            resource_id: resource_id.into(),
        }
    }
}

/// A stored resource node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Internal element id, stable across upserts
    pub id: NodeId,
    /// Owning tenant
    pub tenant: TenantId,
    /// Owning layer
    pub layer: LayerId,
    /// Dual-graph side
    pub kind: NodeKind,
    /// Cloud resource id (Original) or abstracted id (Abstracted)
    pub resource_id: String,
    /// Cloud resource type, e.g. `Microsoft.Compute/virtualMachines`
    pub resource_type: String,
    /// Descriptive properties
    pub properties: PropertyBag,
    /// First write timestamp
    pub created_at: DateTime<Utc>,
    /// Last write timestamp (last-writer-wins observability)
    pub updated_at: DateTime<Utc>,
}

impl ResourceNode {
    /// Logical upsert identity of this node
    #[inline]
    #[must_use]
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.layer.clone(), self.kind, self.resource_id.clone())
    }

    /// Graph labels of this node
    #[inline]
    #[must_use]
    pub fn labels(&self) -> &'static [&'static str] {
        self.kind.labels()
    }
}

/// Node draft submitted in a write batch
///
/// `id` is the proposed element id: honored on insert, ignored on update
/// (the existing node keeps its id). The commit receipt reports the
/// effective id.
#[derive(Debug, Clone)]
pub struct NodeDraft {
    /// Proposed element id
    pub id: NodeId,
    /// Dual-graph side
    pub kind: NodeKind,
    /// Cloud resource id or abstracted id
    pub resource_id: String,
    /// Cloud resource type
    pub resource_type: String,
    /// Descriptive properties
    pub properties: PropertyBag,
}

impl NodeDraft {
    /// Draft a node with a fresh proposed id
    #[must_use]
    pub fn new(
        kind: NodeKind,
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
        properties: PropertyBag,
    ) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            resource_id: resource_id.into(),
            resource_type: resource_type.into(),
            properties,
        }
    }

    /// Override the proposed element id (used by layer copies to pre-plan
    /// endpoint rewiring)
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Materialize into a stored node with fresh timestamps
    #[must_use]
    pub fn into_node(self, tenant: TenantId, layer: LayerId) -> ResourceNode {
        let now = Utc::now();
        ResourceNode {
            id: self.id,
            tenant,
            layer,
            kind: self.kind,
            resource_id: self.resource_id,
            resource_type: self.resource_type,
            properties: self.properties,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_carries_both_labels() {
        assert_eq!(NodeKind::Original.labels(), &["Resource", "Original"]);
    }

    #[test]
    fn abstracted_carries_resource_label_only() {
        assert_eq!(NodeKind::Abstracted.labels(), &["Resource"]);
    }

    #[test]
    fn counterpart_is_involutive() {
        assert_eq!(NodeKind::Original.counterpart(), NodeKind::Abstracted);
        assert_eq!(
            NodeKind::Original.counterpart().counterpart(),
            NodeKind::Original
        );
    }

    #[test]
    fn node_key_distinguishes_kinds() {
        let layer = LayerId::default_layer();
        let a = NodeKey::new(layer.clone(), NodeKind::Original, "vm-001");
        let b = NodeKey::new(layer, NodeKind::Abstracted, "vm-001");
        assert_ne!(a, b);
    }

    #[test]
    fn draft_keeps_explicit_id() {
        let id = NodeId::new();
        let draft = NodeDraft::new(
            NodeKind::Original,
            "vm-001",
            "Microsoft.Compute/virtualMachines",
            PropertyBag::new(),
        )
        .with_id(id);
        assert_eq!(draft.id, id);
    }
}
