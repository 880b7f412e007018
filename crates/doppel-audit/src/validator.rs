//! Topology audits over one layer of the dual graph.
//!
//! An audit answers one question: are the two subgraphs still mirror
//! images of each other? Counts must balance, every node must sit in a
//! provenance-joined pair, and each semantic edge must have a twin on
//! the other side. The isomorphism check is a single pass over the
//! edges using the provenance map as the node bijection; nothing here
//! is quadratic in graph size.
//!
//! A missing provenance anchor is a warning, not a failure: the audit
//! records it, logs it, and keeps going so one stray node cannot hide
//! the rest of the picture.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use doppel_graph::{
    GraphError, GraphScope, GraphStore, LayerId, NodeCounts, NodeFilter, NodeId, NodeKind,
    RelFilter, RelTypeCounts, TenantId,
};
use serde::Serialize;

/// Node cited by an audit finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    /// Element id in the store.
    pub id: NodeId,
    /// Resource id the node carries (abstracted or original).
    pub resource_id: String,
}

/// A node anchored by more than one provenance edge.
#[derive(Debug, Clone, Serialize)]
pub struct ProvenanceDup {
    /// The over-claimed node.
    pub node: NodeRef,
    /// Every node on the other end of a provenance edge to it.
    pub claimants: Vec<NodeRef>,
}

/// Nodes that break the pair structure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrphanCheck {
    /// Abstracted nodes with no provenance edge to an original.
    pub unanchored_abstracted: Vec<NodeRef>,
    /// Original nodes no abstracted twin points at.
    pub unmirrored_originals: Vec<NodeRef>,
    /// Nodes carrying more than one provenance edge.
    pub duplicated_provenance: Vec<ProvenanceDup>,
}

impl OrphanCheck {
    /// True when every node sits in exactly one provenance-joined pair.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unanchored_abstracted.is_empty()
            && self.unmirrored_originals.is_empty()
            && self.duplicated_provenance.is_empty()
    }

    fn finding_count(&self) -> usize {
        self.unanchored_abstracted.len()
            + self.unmirrored_originals.len()
            + self.duplicated_provenance.len()
    }
}

/// An edge present on one side with no twin on the other.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeWitness {
    /// Relationship wire name.
    pub rel_type: String,
    /// Source node of the unmatched edge.
    pub source: NodeRef,
    /// Target node of the unmatched edge.
    pub target: NodeRef,
}

/// Result of the provenance-mapped edge comparison.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IsomorphismCheck {
    /// Abstracted-side edges whose mapped twin is absent.
    pub missing_in_original: Vec<EdgeWitness>,
    /// Original-side edges whose mapped twin is absent.
    pub missing_in_abstracted: Vec<EdgeWitness>,
    /// Edges skipped because an endpoint has no usable provenance
    /// mapping; those endpoints surface in the orphan check instead.
    pub skipped_edges: usize,
}

impl IsomorphismCheck {
    /// True when every mapped edge has its twin.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing_in_original.is_empty() && self.missing_in_abstracted.is_empty()
    }

    fn finding_count(&self) -> usize {
        self.missing_in_original.len() + self.missing_in_abstracted.len()
    }
}

/// Full audit of one tenant layer.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyAudit {
    /// Audited tenant.
    pub tenant: TenantId,
    /// Audited layer.
    pub layer: LayerId,
    /// Node totals per subgraph.
    pub nodes: NodeCounts,
    /// Relationship totals per type and subgraph.
    pub relationships: RelTypeCounts,
    /// Pair-structure findings.
    pub orphans: OrphanCheck,
    /// Edge-mirroring findings.
    pub isomorphism: IsomorphismCheck,
    /// When the audit ran.
    pub checked_at: DateTime<Utc>,
}

impl TopologyAudit {
    /// True when the two subgraphs are structurally equivalent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.nodes.is_balanced()
            && self.relationships.is_balanced()
            && self.orphans.is_clean()
            && self.isomorphism.is_clean()
    }

    /// Total number of recorded findings.
    #[must_use]
    pub fn finding_count(&self) -> usize {
        self.relationships.mismatched_types().len()
            + self.orphans.finding_count()
            + self.isomorphism.finding_count()
    }
}

/// Read-only auditor over a [`GraphStore`].
pub struct TopologyValidator {
    store: Arc<dyn GraphStore>,
}

impl TopologyValidator {
    /// Build a validator over a store.
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Node totals per subgraph.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn compare_node_counts(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<NodeCounts, GraphError> {
        self.store.node_counts(tenant, layer).await
    }

    /// Relationship totals per type and subgraph.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn compare_relationship_counts(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<RelTypeCounts, GraphError> {
        self.store.relationship_counts(tenant, layer).await
    }

    /// Find nodes that break the pair structure.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn detect_orphans(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<OrphanCheck, GraphError> {
        let snapshot = self.snapshot(tenant, layer).await?;
        Ok(orphans_of(&snapshot))
    }

    /// Compare edges across subgraphs through the provenance map.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn check_isomorphism(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<IsomorphismCheck, GraphError> {
        let snapshot = self.snapshot(tenant, layer).await?;
        Ok(isomorphism_of(&snapshot))
    }

    /// Run every check over one layer.
    ///
    /// # Errors
    /// Propagates store read failures.
    pub async fn audit(
        &self,
        tenant: TenantId,
        layer: &LayerId,
    ) -> Result<TopologyAudit, GraphError> {
        let nodes = self.store.node_counts(tenant, layer).await?;
        let relationships = self.store.relationship_counts(tenant, layer).await?;
        let snapshot = self.snapshot(tenant, layer).await?;

        let audit = TopologyAudit {
            tenant,
            layer: layer.clone(),
            nodes,
            relationships,
            orphans: orphans_of(&snapshot),
            isomorphism: isomorphism_of(&snapshot),
            checked_at: Utc::now(),
        };

        if audit.is_consistent() {
            tracing::info!(tenant = %tenant, layer = %layer, "topology audit clean");
        } else {
            tracing::warn!(
                tenant = %tenant,
                layer = %layer,
                findings = audit.finding_count(),
                "topology audit found inconsistencies"
            );
        }
        Ok(audit)
    }

    async fn snapshot(&self, tenant: TenantId, layer: &LayerId) -> Result<Snapshot, GraphError> {
        let nodes = self
            .store
            .nodes(
                tenant,
                NodeFilter::in_layer(layer.clone()).with_scope(GraphScope::Both),
            )
            .await?;
        let mut refs = HashMap::with_capacity(nodes.len());
        for node in nodes {
            refs.insert(node.id, (node.kind, node.resource_id));
        }

        let mut orig_claims: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut abs_anchors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for pair in self.store.provenance_pairs(tenant, layer).await? {
            orig_claims.entry(pair.original).or_default().push(pair.abstracted);
            abs_anchors.entry(pair.abstracted).or_default().push(pair.original);
        }

        let rels = self
            .store
            .relationships(
                tenant,
                RelFilter::in_layer(layer.clone()).with_scope(GraphScope::Both),
            )
            .await?;
        let mut original_edges = Vec::new();
        let mut abstracted_edges = Vec::new();
        for rel in rels {
            if rel.rel_type.is_provenance() {
                continue;
            }
            // Both endpoints share a kind; the store rejects cross-subgraph
            // edges at write time.
            let wire = rel.rel_type.wire_name().to_owned();
            match refs.get(&rel.source).map(|(kind, _)| *kind) {
                Some(NodeKind::Original) => original_edges.push((rel.source, rel.target, wire)),
                Some(NodeKind::Abstracted) => {
                    abstracted_edges.push((rel.source, rel.target, wire));
                }
                None => {}
            }
        }

        Ok(Snapshot {
            refs,
            orig_claims,
            abs_anchors,
            original_edges,
            abstracted_edges,
        })
    }
}

struct Snapshot {
    refs: HashMap<NodeId, (NodeKind, String)>,
    /// original -> abstracted nodes claiming it via provenance
    orig_claims: HashMap<NodeId, Vec<NodeId>>,
    /// abstracted -> originals it anchors to
    abs_anchors: HashMap<NodeId, Vec<NodeId>>,
    original_edges: Vec<(NodeId, NodeId, String)>,
    abstracted_edges: Vec<(NodeId, NodeId, String)>,
}

fn node_ref(refs: &HashMap<NodeId, (NodeKind, String)>, id: NodeId) -> NodeRef {
    NodeRef {
        id,
        resource_id: refs.get(&id).map(|(_, rid)| rid.clone()).unwrap_or_default(),
    }
}

fn orphans_of(snapshot: &Snapshot) -> OrphanCheck {
    let mut check = OrphanCheck::default();

    for (id, (kind, resource_id)) in &snapshot.refs {
        match kind {
            NodeKind::Abstracted if !snapshot.abs_anchors.contains_key(id) => {
                tracing::warn!(node = %id, resource = %resource_id, "abstracted node has no provenance edge");
                check.unanchored_abstracted.push(NodeRef {
                    id: *id,
                    resource_id: resource_id.clone(),
                });
            }
            NodeKind::Original if !snapshot.orig_claims.contains_key(id) => {
                tracing::warn!(node = %id, resource = %resource_id, "original node has no abstracted counterpart");
                check.unmirrored_originals.push(NodeRef {
                    id: *id,
                    resource_id: resource_id.clone(),
                });
            }
            _ => {}
        }
    }

    for (claims, label) in [
        (&snapshot.orig_claims, "original claimed by multiple abstracted nodes"),
        (&snapshot.abs_anchors, "abstracted node anchored to multiple originals"),
    ] {
        for (id, others) in claims {
            if others.len() > 1 {
                tracing::warn!(node = %id, count = others.len(), "{label}");
                check.duplicated_provenance.push(ProvenanceDup {
                    node: node_ref(&snapshot.refs, *id),
                    claimants: others.iter().map(|o| node_ref(&snapshot.refs, *o)).collect(),
                });
            }
        }
    }

    // Map iteration order is arbitrary; reports must be stable.
    check.unanchored_abstracted.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
    check.unmirrored_originals.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
    check
        .duplicated_provenance
        .sort_by(|a, b| a.node.resource_id.cmp(&b.node.resource_id));
    check
}

fn isomorphism_of(snapshot: &Snapshot) -> IsomorphismCheck {
    let mut check = IsomorphismCheck::default();

    // Only unambiguous anchors participate in the bijection; duplicates
    // are already orphan findings.
    let abs_to_orig: HashMap<NodeId, NodeId> = snapshot
        .abs_anchors
        .iter()
        .filter(|(_, originals)| originals.len() == 1)
        .map(|(abs, originals)| (*abs, originals[0]))
        .collect();
    let orig_to_abs: HashMap<NodeId, NodeId> = snapshot
        .orig_claims
        .iter()
        .filter(|(_, abstracted)| abstracted.len() == 1)
        .map(|(orig, abstracted)| (*orig, abstracted[0]))
        .collect();

    let original_set: HashSet<(NodeId, NodeId, &str)> = snapshot
        .original_edges
        .iter()
        .map(|(s, t, ty)| (*s, *t, ty.as_str()))
        .collect();
    let abstracted_set: HashSet<(NodeId, NodeId, &str)> = snapshot
        .abstracted_edges
        .iter()
        .map(|(s, t, ty)| (*s, *t, ty.as_str()))
        .collect();

    for (source, target, rel_type) in &snapshot.abstracted_edges {
        match (abs_to_orig.get(source), abs_to_orig.get(target)) {
            (Some(s), Some(t)) => {
                if !original_set.contains(&(*s, *t, rel_type.as_str())) {
                    tracing::warn!(rel_type = %rel_type, "abstracted edge has no original twin");
                    check.missing_in_original.push(EdgeWitness {
                        rel_type: rel_type.clone(),
                        source: node_ref(&snapshot.refs, *source),
                        target: node_ref(&snapshot.refs, *target),
                    });
                }
            }
            _ => check.skipped_edges += 1,
        }
    }

    for (source, target, rel_type) in &snapshot.original_edges {
        match (orig_to_abs.get(source), orig_to_abs.get(target)) {
            (Some(s), Some(t)) => {
                if !abstracted_set.contains(&(*s, *t, rel_type.as_str())) {
                    tracing::warn!(rel_type = %rel_type, "original edge has no abstracted twin");
                    check.missing_in_abstracted.push(EdgeWitness {
                        rel_type: rel_type.clone(),
                        source: node_ref(&snapshot.refs, *source),
                        target: node_ref(&snapshot.refs, *target),
                    });
                }
            }
            _ => check.skipped_edges += 1,
        }
    }

    let by_witness = |a: &EdgeWitness, b: &EdgeWitness| {
        (a.rel_type.as_str(), a.source.resource_id.as_str(), a.target.resource_id.as_str()).cmp(&(
            b.rel_type.as_str(),
            b.source.resource_id.as_str(),
            b.target.resource_id.as_str(),
        ))
    };
    check.missing_in_original.sort_by(by_witness);
    check.missing_in_abstracted.sort_by(by_witness);
    check
}
