//! In-memory reference store
//!
//! [`MemoryGraphStore`] keeps one shard per tenant behind a [`DashMap`],
//! so tenants never contend with each other. Inside a shard, a batch is
//! staged (validated against the live tables, endpoints resolved) and
//! committed under a single write guard, which makes the batch atomic:
//! a staging failure leaves the tables untouched.

use crate::error::{GraphError, ValidationError};
use crate::ids::{LayerId, NodeId, RelId, TenantId};
use crate::node::{NodeDraft, NodeKey, NodeKind, ResourceNode};
use crate::rel::{RelDraft, RelKey, Relationship};
use crate::store::{
    Applied, CommitReceipt, GraphStore, LayerInfo, LayerRemoval, NodeCounts, NodeFilter,
    ProvenancePair, RelFilter, RelTypeCounts, WriteBatch, WriteOp,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct Tables {
    nodes: HashMap<NodeId, ResourceNode>,
    node_keys: HashMap<NodeKey, NodeId>,
    rels: HashMap<RelId, Relationship>,
    rel_keys: HashMap<RelKey, RelId>,
    protected: HashSet<LayerId>,
}

#[derive(Default)]
struct TenantShard {
    tables: RwLock<Tables>,
}

/// One validated operation, endpoints resolved, ready to commit
enum StagedOp {
    Node {
        draft: NodeDraft,
        effective: NodeId,
        create: bool,
    },
    Rel {
        draft: RelDraft,
        effective: RelId,
        create: bool,
        source: NodeId,
        target: NodeId,
    },
}

/// In-memory [`GraphStore`] with per-tenant shards
///
/// The reference backend for tests and single-process deployments. Writes
/// for one tenant serialize on that tenant's shard; reads and writes for
/// other tenants proceed concurrently.
#[derive(Default)]
pub struct MemoryGraphStore {
    shards: DashMap<TenantId, Arc<TenantShard>>,
}

impl MemoryGraphStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, tenant: TenantId) -> Arc<TenantShard> {
        self.shards.entry(tenant).or_default().clone()
    }

    /// Shard lookup without creating one, for read paths
    fn shard_if_present(&self, tenant: TenantId) -> Option<Arc<TenantShard>> {
        self.shards.get(&tenant).map(|s| s.clone())
    }
}

/// Resolve the kind of a relationship endpoint during staging
fn endpoint_kind(
    id: NodeId,
    layer: &LayerId,
    staged_kinds: &HashMap<NodeId, NodeKind>,
    tables: &Tables,
) -> Result<NodeKind, ValidationError> {
    if let Some(kind) = staged_kinds.get(&id) {
        return Ok(*kind);
    }
    match tables.nodes.get(&id) {
        Some(node) if node.layer == *layer => Ok(node.kind),
        Some(node) => Err(ValidationError::CrossLayerEndpoint {
            node: id,
            expected: layer.clone(),
            found: node.layer.clone(),
        }),
        None => Err(ValidationError::UnknownEndpoint { node: id }),
    }
}

/// Validate a batch against the live tables and produce the commit plan
fn stage(batch: &WriteBatch, tables: &Tables) -> Result<Vec<StagedOp>, ValidationError> {
    let mut staged = Vec::with_capacity(batch.ops.len());
    // proposed draft id -> effective id
    let mut alias: HashMap<NodeId, NodeId> = HashMap::new();
    let mut staged_node_keys: HashMap<NodeKey, NodeId> = HashMap::new();
    let mut staged_kinds: HashMap<NodeId, NodeKind> = HashMap::new();
    let mut staged_rel_keys: HashMap<RelKey, RelId> = HashMap::new();

    for op in &batch.ops {
        match op {
            WriteOp::UpsertNode(draft) => {
                let key = NodeKey::new(batch.layer.clone(), draft.kind, draft.resource_id.clone());
                let staged_hit = staged_node_keys.get(&key).copied();
                let store_hit = tables.node_keys.get(&key).copied();
                let (effective, create) = match staged_hit.or(store_hit) {
                    Some(id) => (id, false),
                    None => {
                        staged_node_keys.insert(key, draft.id);
                        (draft.id, true)
                    }
                };
                alias.insert(draft.id, effective);
                staged_kinds.insert(effective, draft.kind);
                staged.push(StagedOp::Node {
                    draft: draft.clone(),
                    effective,
                    create,
                });
            }
            WriteOp::UpsertRelationship(draft) => {
                let source = alias.get(&draft.source).copied().unwrap_or(draft.source);
                let target = alias.get(&draft.target).copied().unwrap_or(draft.target);
                let source_kind = endpoint_kind(source, &batch.layer, &staged_kinds, tables)?;
                let target_kind = endpoint_kind(target, &batch.layer, &staged_kinds, tables)?;

                if draft.rel_type.is_provenance() {
                    if source_kind != NodeKind::Abstracted || target_kind != NodeKind::Original {
                        return Err(ValidationError::InvalidProvenanceDirection {
                            source_kind,
                            target_kind,
                        });
                    }
                } else if source_kind != target_kind {
                    return Err(ValidationError::CrossSubgraphRelationship {
                        rel_type: draft.rel_type.wire_name().to_string(),
                        source_kind,
                        target_kind,
                    });
                }

                let key = RelKey {
                    layer: batch.layer.clone(),
                    rel_type: draft.rel_type.clone(),
                    source,
                    target,
                };
                let staged_hit = staged_rel_keys.get(&key).copied();
                let store_hit = tables.rel_keys.get(&key).copied();
                let (effective, create) = match staged_hit.or(store_hit) {
                    Some(id) => (id, false),
                    None => {
                        staged_rel_keys.insert(key, draft.id);
                        (draft.id, true)
                    }
                };
                staged.push(StagedOp::Rel {
                    draft: draft.clone(),
                    effective,
                    create,
                    source,
                    target,
                });
            }
        }
    }
    Ok(staged)
}

/// Apply a validated plan; infallible because staging ran under the same
/// write guard
fn commit(batch: &WriteBatch, staged: Vec<StagedOp>, tables: &mut Tables) -> Vec<Applied> {
    let now = Utc::now();
    let mut applied = Vec::with_capacity(staged.len());
    for op in staged {
        match op {
            StagedOp::Node {
                draft,
                effective,
                create,
            } => {
                let proposed = draft.id;
                match tables.nodes.entry(effective) {
                    Entry::Occupied(mut slot) => {
                        let node = slot.get_mut();
                        node.resource_type = draft.resource_type;
                        node.properties = draft.properties;
                        node.updated_at = now;
                    }
                    Entry::Vacant(slot) => {
                        let node = draft
                            .with_id(effective)
                            .into_node(batch.tenant, batch.layer.clone());
                        tables.node_keys.insert(node.key(), effective);
                        slot.insert(node);
                    }
                }
                applied.push(Applied::Node {
                    proposed,
                    id: effective,
                    created: create,
                });
            }
            StagedOp::Rel {
                draft,
                effective,
                create,
                source,
                target,
            } => {
                let proposed = draft.id;
                match tables.rels.entry(effective) {
                    Entry::Occupied(mut slot) => {
                        slot.get_mut().properties = draft.properties;
                    }
                    Entry::Vacant(slot) => {
                        let rel = draft.with_id(effective).into_rel(
                            batch.tenant,
                            batch.layer.clone(),
                            source,
                            target,
                        );
                        tables.rel_keys.insert(rel.key(), effective);
                        slot.insert(rel);
                    }
                }
                applied.push(Applied::Relationship {
                    proposed,
                    id: effective,
                    created: create,
                });
            }
        }
    }
    applied
}

#[async_trait::async_trait]
impl GraphStore for MemoryGraphStore {
    async fn apply(&self, batch: WriteBatch) -> Result<CommitReceipt, GraphError> {
        if batch.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let shard = self.shard(batch.tenant);
        let mut tables = shard.tables.write();

        if tables.protected.contains(&batch.layer) && !batch.override_protection {
            tracing::warn!(
                tenant = %batch.tenant,
                layer = %batch.layer,
                "write into protected layer rejected"
            );
            return Err(GraphError::ProtectedLayer {
                layer: batch.layer,
            });
        }

        let staged = stage(&batch, &tables)?;
        let applied = commit(&batch, staged, &mut tables);
        Ok(CommitReceipt {
            tenant: batch.tenant,
            layer: batch.layer,
            applied,
        })
    }

    async fn node(&self, tenant: TenantId, id: NodeId) -> Result<Option<ResourceNode>, GraphError> {
        let Some(shard) = self.shard_if_present(tenant) else {
            return Ok(None);
        };
        let tables = shard.tables.read();
        Ok(tables.nodes.get(&id).cloned())
    }

    async fn nodes(
        &self,
        tenant: TenantId,
        filter: NodeFilter,
    ) -> Result<Vec<ResourceNode>, GraphError> {
        let Some(shard) = self.shard_if_present(tenant) else {
            return Ok(Vec::new());
        };
        let tables = shard.tables.read();
        Ok(tables
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect())
    }

    async fn node_counts(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<NodeCounts, GraphError> {
        let Some(shard) = self.shard_if_present(tenant) else {
            return Ok(NodeCounts::default());
        };
        let tables = shard.tables.read();
        let mut counts = NodeCounts::default();
        for node in tables.nodes.values().filter(|n| n.layer == *layer) {
            match node.kind {
                NodeKind::Original => counts.original += 1,
                NodeKind::Abstracted => counts.abstracted += 1,
            }
        }
        Ok(counts)
    }

    async fn relationships(
        &self,
        tenant: TenantId,
        filter: RelFilter,
    ) -> Result<Vec<Relationship>, GraphError> {
        let Some(shard) = self.shard_if_present(tenant) else {
            return Ok(Vec::new());
        };
        let tables = shard.tables.read();
        let mut out = Vec::new();
        for rel in tables.rels.values() {
            let (Some(source), Some(target)) =
                (tables.nodes.get(&rel.source), tables.nodes.get(&rel.target))
            else {
                continue;
            };
            if filter.matches(rel, source.kind, target.kind) {
                out.push(rel.clone());
            }
        }
        Ok(out)
    }

    async fn relationship_counts(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<RelTypeCounts, GraphError> {
        let Some(shard) = self.shard_if_present(tenant) else {
            return Ok(RelTypeCounts::default());
        };
        let tables = shard.tables.read();
        let mut counts = RelTypeCounts::default();
        for rel in tables.rels.values().filter(|r| r.layer == *layer) {
            if rel.rel_type.is_provenance() {
                counts.provenance += 1;
                continue;
            }
            let Some(source) = tables.nodes.get(&rel.source) else {
                continue;
            };
            let by_kind = match source.kind {
                NodeKind::Original => &mut counts.original,
                NodeKind::Abstracted => &mut counts.abstracted,
            };
            *by_kind.entry(rel.rel_type.wire_name().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn provenance_pairs(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<Vec<ProvenancePair>, GraphError> {
        let Some(shard) = self.shard_if_present(tenant) else {
            return Ok(Vec::new());
        };
        let tables = shard.tables.read();
        let mut out = Vec::new();
        for rel in tables
            .rels
            .values()
            .filter(|r| r.layer == *layer && r.rel_type.is_provenance())
        {
            let (Some(abstracted), Some(original)) =
                (tables.nodes.get(&rel.source), tables.nodes.get(&rel.target))
            else {
                continue;
            };
            out.push(ProvenancePair {
                abstracted: abstracted.id,
                original: original.id,
                rel: rel.id,
                abstracted_resource_id: abstracted.resource_id.clone(),
                original_resource_id: original.resource_id.clone(),
            });
        }
        Ok(out)
    }

    async fn layers(&self, tenant: TenantId) -> Result<Vec<LayerInfo>, GraphError> {
        let Some(shard) = self.shard_if_present(tenant) else {
            return Ok(Vec::new());
        };
        let tables = shard.tables.read();
        let mut by_layer: BTreeMap<LayerId, (usize, usize)> = BTreeMap::new();
        for node in tables.nodes.values() {
            by_layer.entry(node.layer.clone()).or_default().0 += 1;
        }
        for rel in tables.rels.values() {
            by_layer.entry(rel.layer.clone()).or_default().1 += 1;
        }
        // Protected but empty layers still show up in listings.
        for layer in &tables.protected {
            by_layer.entry(layer.clone()).or_default();
        }
        Ok(by_layer
            .into_iter()
            .map(|(layer, (nodes, relationships))| LayerInfo {
                protected: tables.protected.contains(&layer),
                layer,
                nodes,
                relationships,
            })
            .collect())
    }

    async fn remove_layer(
        &self,
        tenant: TenantId,
        layer: &LayerId,
        override_protection: bool,
    ) -> Result<LayerRemoval, GraphError> {
        let shard = self.shard(tenant);
        let mut tables = shard.tables.write();

        if tables.protected.contains(layer) && !override_protection {
            tracing::warn!(
                tenant = %tenant,
                layer = %layer,
                "removal of protected layer rejected"
            );
            return Err(GraphError::ProtectedLayer {
                layer: layer.clone(),
            });
        }

        let node_ids: Vec<NodeId> = tables
            .nodes
            .values()
            .filter(|n| n.layer == *layer)
            .map(|n| n.id)
            .collect();
        let rel_ids: Vec<RelId> = tables
            .rels
            .values()
            .filter(|r| r.layer == *layer)
            .map(|r| r.id)
            .collect();
        if node_ids.is_empty() && rel_ids.is_empty() {
            return Err(GraphError::LayerNotFound {
                tenant,
                layer: layer.clone(),
            });
        }

        for id in &rel_ids {
            if let Some(rel) = tables.rels.remove(id) {
                tables.rel_keys.remove(&rel.key());
            }
        }
        for id in &node_ids {
            if let Some(node) = tables.nodes.remove(id) {
                tables.node_keys.remove(&node.key());
            }
        }
        // A removed layer loses its protection marker with it.
        tables.protected.remove(layer);

        Ok(LayerRemoval {
            nodes_removed: node_ids.len(),
            relationships_removed: rel_ids.len(),
        })
    }

    async fn protect_layer(
        &self,
        tenant: TenantId,
        layer: &LayerId,
        protected: bool,
    ) -> Result<(), GraphError> {
        let shard = self.shard(tenant);
        let mut tables = shard.tables.write();
        if protected {
            tables.protected.insert(layer.clone());
        } else {
            tables.protected.remove(layer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PropertyBag;
    use crate::rel::RelType;
    use crate::store::GraphScope;
    use serde_json::json;

    fn props(pairs: &[(&str, serde_json::Value)]) -> PropertyBag {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    /// Batch holding one original/abstracted pair plus its provenance edge
    fn pair_batch(tenant: TenantId, layer: &LayerId, rid: &str, abs_rid: &str) -> WriteBatch {
        let mut batch = WriteBatch::new(tenant, layer.clone());
        let original = batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            rid,
            "vm",
            props(&[("name", json!("web-01"))]),
        ));
        let abstracted = batch.upsert_node(NodeDraft::new(
            NodeKind::Abstracted,
            abs_rid,
            "vm",
            props(&[("name", json!(abs_rid))]),
        ));
        batch.upsert_relationship(RelDraft::provenance(abstracted, original));
        batch
    }

    #[tokio::test]
    async fn pair_batch_commits_atomically() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();

        let receipt = store
            .apply(pair_batch(tenant, &layer, "/sub/1/vm/web-01", "vm-a1b2"))
            .await
            .unwrap();
        assert_eq!(receipt.nodes_created(), 2);
        assert_eq!(receipt.relationships_created(), 1);

        let counts = store.node_counts(tenant, &layer).await.unwrap();
        assert_eq!(counts.original, 1);
        assert_eq!(counts.abstracted, 1);
        assert!(counts.is_balanced());

        let pairs = store.provenance_pairs(tenant, &layer).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].original_resource_id, "/sub/1/vm/web-01");
        assert_eq!(pairs[0].abstracted_resource_id, "vm-a1b2");
    }

    #[tokio::test]
    async fn reprocessing_updates_in_place_and_keeps_ids() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();

        let first = store
            .apply(pair_batch(tenant, &layer, "/sub/1/vm/web-01", "vm-a1b2"))
            .await
            .unwrap();
        let second = store
            .apply(pair_batch(tenant, &layer, "/sub/1/vm/web-01", "vm-a1b2"))
            .await
            .unwrap();

        assert_eq!(second.nodes_created(), 0);
        assert_eq!(second.nodes_updated(), 2);
        assert_eq!(second.relationships_created(), 0);

        // Same effective element ids both times.
        let ids = |r: &CommitReceipt| -> Vec<NodeId> {
            r.applied
                .iter()
                .filter_map(|a| match a {
                    Applied::Node { id, .. } => Some(*id),
                    Applied::Relationship { .. } => None,
                })
                .collect()
        };
        assert_eq!(ids(&first), ids(&second));

        let counts = store.node_counts(tenant, &layer).await.unwrap();
        assert_eq!(counts.original, 1);
        assert_eq!(counts.abstracted, 1);
    }

    #[tokio::test]
    async fn property_bag_is_last_writer_wins() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();

        let mut batch = WriteBatch::new(tenant, layer.clone());
        let id = batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            "rid",
            "vm",
            props(&[("size", json!("D2")), ("zone", json!("1"))]),
        ));
        store.apply(batch).await.unwrap();

        let mut batch = WriteBatch::new(tenant, layer.clone());
        batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            "rid",
            "vm",
            props(&[("size", json!("D4"))]),
        ));
        store.apply(batch).await.unwrap();

        let node = store.node(tenant, id).await.unwrap().unwrap();
        assert_eq!(node.properties.get("size"), Some(&json!("D4")));
        // Replaced, not merged.
        assert!(!node.properties.contains_key("zone"));
        assert!(node.updated_at >= node.created_at);
    }

    #[tokio::test]
    async fn cross_subgraph_relationship_is_rejected() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();

        let mut batch = WriteBatch::new(tenant, layer.clone());
        let original = batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            "rid",
            "vm",
            PropertyBag::new(),
        ));
        let abstracted = batch.upsert_node(NodeDraft::new(
            NodeKind::Abstracted,
            "vm-a1b2",
            "vm",
            PropertyBag::new(),
        ));
        batch.upsert_relationship(RelDraft::new(
            RelType::Contains,
            original,
            abstracted,
            PropertyBag::new(),
        ));

        let err = store.apply(batch).await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::CrossSubgraphRelationship { .. })
        ));

        // Nothing committed.
        let counts = store.node_counts(tenant, &layer).await.unwrap();
        assert_eq!(counts.original + counts.abstracted, 0);
    }

    #[tokio::test]
    async fn reversed_provenance_is_rejected() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();

        let mut batch = WriteBatch::new(tenant, layer);
        let original = batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            "rid",
            "vm",
            PropertyBag::new(),
        ));
        let abstracted = batch.upsert_node(NodeDraft::new(
            NodeKind::Abstracted,
            "vm-a1b2",
            "vm",
            PropertyBag::new(),
        ));
        // Wrong direction on purpose.
        batch.upsert_relationship(RelDraft::provenance(original, abstracted));

        let err = store.apply(batch).await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::InvalidProvenanceDirection { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_endpoint_is_rejected() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();

        let mut batch = WriteBatch::new(tenant, LayerId::default_layer());
        batch.upsert_relationship(RelDraft::new(
            RelType::Contains,
            NodeId::new(),
            NodeId::new(),
            PropertyBag::new(),
        ));
        let err = store.apply(batch).await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::UnknownEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn relationship_may_not_span_layers() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer_a = LayerId::new("layer-a").unwrap();
        let layer_b = LayerId::new("layer-b").unwrap();

        let mut batch = WriteBatch::new(tenant, layer_a);
        let in_a = batch.upsert_node(NodeDraft::new(
            NodeKind::Abstracted,
            "vm-a1b2",
            "vm",
            PropertyBag::new(),
        ));
        store.apply(batch).await.unwrap();

        let mut batch = WriteBatch::new(tenant, layer_b);
        let in_b = batch.upsert_node(NodeDraft::new(
            NodeKind::Abstracted,
            "vm-c3d4",
            "vm",
            PropertyBag::new(),
        ));
        batch.upsert_relationship(RelDraft::new(
            RelType::ConnectedTo,
            in_b,
            in_a,
            PropertyBag::new(),
        ));
        let err = store.apply(batch).await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::CrossLayerEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let store = MemoryGraphStore::new();
        let batch = WriteBatch::new(TenantId::new(), LayerId::default_layer());
        let err = store.apply(batch).await.unwrap_err();
        assert!(matches!(
            err,
            GraphError::Validation(ValidationError::EmptyBatch)
        ));
    }

    #[tokio::test]
    async fn failed_batch_leaves_no_partial_writes() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();

        let mut batch = WriteBatch::new(tenant, layer.clone());
        batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            "rid",
            "vm",
            PropertyBag::new(),
        ));
        batch.upsert_relationship(RelDraft::new(
            RelType::Contains,
            NodeId::new(),
            NodeId::new(),
            PropertyBag::new(),
        ));

        assert!(store.apply(batch).await.is_err());
        let counts = store.node_counts(tenant, &layer).await.unwrap();
        assert_eq!(counts.original, 0);
    }

    #[tokio::test]
    async fn protection_blocks_writes_and_removal_without_override() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::new("golden").unwrap();

        store
            .apply(pair_batch(tenant, &layer, "rid", "vm-a1b2"))
            .await
            .unwrap();
        store.protect_layer(tenant, &layer, true).await.unwrap();

        let err = store
            .apply(pair_batch(tenant, &layer, "rid2", "vm-c3d4"))
            .await
            .unwrap_err();
        assert!(err.is_security_violation());

        let err = store.remove_layer(tenant, &layer, false).await.unwrap_err();
        assert!(err.is_security_violation());

        // Override is explicit consent.
        store
            .apply(
                pair_batch(tenant, &layer, "rid2", "vm-c3d4").with_override_protection(),
            )
            .await
            .unwrap();
        let removal = store.remove_layer(tenant, &layer, true).await.unwrap();
        assert_eq!(removal.nodes_removed, 4);
        assert_eq!(removal.relationships_removed, 2);

        // Marker went with the layer.
        let layers = store.layers(tenant).await.unwrap();
        assert!(layers.iter().all(|l| l.layer != layer));
    }

    #[tokio::test]
    async fn remove_layer_requires_elements() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::new("nothing-here").unwrap();
        let err = store.remove_layer(tenant, &layer, false).await.unwrap_err();
        assert!(matches!(err, GraphError::LayerNotFound { .. }));
    }

    #[tokio::test]
    async fn layers_are_listed_sorted_with_protection_flags() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let sandbox = LayerId::new("sandbox").unwrap();
        let default = LayerId::default_layer();

        store
            .apply(pair_batch(tenant, &sandbox, "rid", "vm-a1b2"))
            .await
            .unwrap();
        store
            .apply(pair_batch(tenant, &default, "rid", "vm-a1b2"))
            .await
            .unwrap();
        store.protect_layer(tenant, &default, true).await.unwrap();

        let layers = store.layers(tenant).await.unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].layer, default);
        assert!(layers[0].protected);
        assert_eq!(layers[0].nodes, 2);
        assert_eq!(layers[0].relationships, 1);
        assert_eq!(layers[1].layer, sandbox);
        assert!(!layers[1].protected);
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = MemoryGraphStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let layer = LayerId::default_layer();

        let receipt = store
            .apply(pair_batch(tenant_a, &layer, "rid", "vm-a1b2"))
            .await
            .unwrap();

        let counts = store.node_counts(tenant_b, &layer).await.unwrap();
        assert_eq!(counts.original + counts.abstracted, 0);

        // Element ids do not resolve across tenants.
        let Applied::Node { id, .. } = receipt.applied[0] else {
            panic!("expected a node entry");
        };
        assert!(store.node(tenant_b, id).await.unwrap().is_none());
        assert!(store.node(tenant_a, id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_key_within_batch_collapses_to_one_node() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();

        let mut batch = WriteBatch::new(tenant, layer.clone());
        let first = batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            "rid",
            "vm",
            props(&[("rev", json!(1))]),
        ));
        let second = batch.upsert_node(NodeDraft::new(
            NodeKind::Original,
            "rid",
            "vm",
            props(&[("rev", json!(2))]),
        ));
        let receipt = store.apply(batch).await.unwrap();

        assert_eq!(receipt.nodes_created(), 1);
        assert_eq!(receipt.nodes_updated(), 1);
        let effective = receipt.effective_node(first).unwrap();
        assert_eq!(receipt.effective_node(second), Some(effective));

        let counts = store.node_counts(tenant, &layer).await.unwrap();
        assert_eq!(counts.original, 1);
        let node = store.node(tenant, effective).await.unwrap().unwrap();
        assert_eq!(node.properties.get("rev"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn scope_filters_split_the_dual_graph() {
        let store = MemoryGraphStore::new();
        let tenant = TenantId::new();
        let layer = LayerId::default_layer();
        store
            .apply(pair_batch(tenant, &layer, "rid", "vm-a1b2"))
            .await
            .unwrap();

        let abstracted = store
            .nodes(tenant, NodeFilter::in_layer(layer.clone()))
            .await
            .unwrap();
        assert_eq!(abstracted.len(), 1);
        assert_eq!(abstracted[0].kind, NodeKind::Abstracted);

        let both = store
            .nodes(
                tenant,
                NodeFilter::in_layer(layer.clone()).with_scope(GraphScope::Both),
            )
            .await
            .unwrap();
        assert_eq!(both.len(), 2);

        // Provenance shows up only under Both.
        let default_rels = store
            .relationships(tenant, RelFilter::in_layer(layer.clone()))
            .await
            .unwrap();
        assert!(default_rels.is_empty());
        let all_rels = store
            .relationships(
                tenant,
                RelFilter::in_layer(layer).with_scope(GraphScope::Both),
            )
            .await
            .unwrap();
        assert_eq!(all_rels.len(), 1);
        assert!(all_rels[0].rel_type.is_provenance());
    }
}
