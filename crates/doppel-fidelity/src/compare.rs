//! Property-level comparison of two layers.
//!
//! Identity resolution is provenance-first: original nodes carry their own
//! cloud resource id, abstracted nodes resolve through their provenance
//! edge to the original id they stand in for. Only when a node has no
//! provenance anchor does the comparator fall back to a heuristic identity
//! built from type, name, and location. Heuristic matches are reported with
//! degraded confidence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use doppel_graph::{
    GraphScope, GraphStore, LayerId, NodeFilter, NodeId, PropertyBag, ResourceNode, TenantId,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::FidelityError;
use crate::metrics::{Classification, FidelityMetrics};
use crate::redaction::{render_value, RedactionLevel};
use crate::sensitivity::{classify, Sensitivity};

/// One side of a comparison: a layer read through a single subgraph.
///
/// The scope is fixed at construction to `Original` or `Abstracted`;
/// comparing a mixed view would pair every resource with its own twin.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSelector {
    /// Tenant to read from.
    pub tenant: TenantId,
    /// Layer to read from.
    pub layer: LayerId,
    scope: GraphScope,
}

impl LayerSelector {
    /// Select the original subgraph of `layer`.
    #[must_use]
    pub fn original(tenant: TenantId, layer: LayerId) -> Self {
        Self {
            tenant,
            layer,
            scope: GraphScope::Original,
        }
    }

    /// Select the abstracted subgraph of `layer`.
    #[must_use]
    pub fn abstracted(tenant: TenantId, layer: LayerId) -> Self {
        Self {
            tenant,
            layer,
            scope: GraphScope::Abstracted,
        }
    }

    /// Which subgraph this selector reads.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> GraphScope {
        self.scope
    }
}

/// How a compared pair was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchBasis {
    /// Resolved through provenance edges or the node's own resource id.
    Provenance,
    /// Resolved by (type, name, location) because provenance was absent.
    Heuristic,
}

/// One differing property of a drifted resource.
///
/// Values are rendered through the report's redaction level before they
/// land here; raw sensitive values never reach a serialized report unless
/// redaction was explicitly disabled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDiff {
    /// Dot-path of the differing property.
    pub name: String,
    /// Rendered value on the source side; absent when the property is too.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_value: Option<Value>,
    /// Rendered value on the target side; absent when the property is too.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_value: Option<Value>,
    /// Whether the property name classified as sensitive.
    pub sensitive: bool,
    /// Whether either rendered value was withheld or scrubbed.
    pub redacted: bool,
}

/// Per-resource verdict in a [`FidelityReport`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    /// Cloud resource id where identity resolved through provenance,
    /// otherwise the node's own id.
    pub id: String,
    /// Resource type of the source node (target's for extras).
    pub resource_type: String,
    /// Verdict for this resource.
    pub classification: Classification,
    /// How the pair was identified; absent for one-sided entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<MatchBasis>,
    /// Populated for drifted resources only.
    pub properties: Vec<PropertyDiff>,
}

/// Full output of one comparison run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FidelityReport {
    /// When the comparison ran.
    pub generated_at: DateTime<Utc>,
    /// Side the comparison reads as the baseline.
    pub source: LayerSelector,
    /// Side compared against the baseline.
    pub target: LayerSelector,
    /// Redaction level the drift values were rendered under.
    pub redaction: RedactionLevel,
    /// True when any identity was resolved heuristically or could not be
    /// resolved at all.
    pub degraded: bool,
    /// Aggregated counts and percentages.
    pub summary: FidelityMetrics,
    /// Entries sorted by id for stable output.
    pub resources: Vec<ResourceEntry>,
}

/// Compares two layers property by property.
pub struct FidelityComparator {
    store: Arc<dyn GraphStore>,
    redaction: RedactionLevel,
}

impl FidelityComparator {
    /// Comparator with full redaction, the safe default.
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            redaction: RedactionLevel::Full,
        }
    }

    /// Override the redaction level applied when rendering drift detail.
    #[must_use]
    pub fn with_redaction(mut self, redaction: RedactionLevel) -> Self {
        self.redaction = redaction;
        self
    }

    /// Compare `source` against `target` and classify every resource.
    ///
    /// Drift detection always runs on raw values; redaction applies only
    /// when rendering the differing values into the report.
    ///
    /// # Errors
    ///
    /// Returns [`FidelityError::Graph`] when either side cannot be read.
    pub async fn compare(
        &self,
        source: &LayerSelector,
        target: &LayerSelector,
    ) -> Result<FidelityReport, FidelityError> {
        if self.redaction == RedactionLevel::None {
            warn!(
                source = %source.layer,
                target = %target.layer,
                "redaction disabled; report will contain raw sensitive values"
            );
        }

        let src = self.load_side(source).await?;
        let tgt = self.load_side(target).await?;
        let degraded = src.degraded || tgt.degraded;

        let mut metrics = FidelityMetrics::default();
        let mut entries = Vec::new();

        for node in src.ambiguous.into_iter().chain(tgt.ambiguous) {
            let id = node.resource_id.clone();
            entries.push(uncomparable_entry(id, &node, &mut metrics));
        }

        // Provenance-resolved identities join directly.
        let mut tgt_anchored = tgt.anchored;
        let mut src_leftover: Vec<(String, ResourceNode)> = Vec::new();
        for (key, node) in src.anchored {
            match tgt_anchored.remove(&key) {
                Some(peer) => entries.push(self.pair_entry(
                    key,
                    node,
                    peer,
                    MatchBasis::Provenance,
                    &mut metrics,
                )),
                None => src_leftover.push((key, node)),
            }
        }
        let tgt_leftover: Vec<(String, ResourceNode)> = tgt_anchored.into_iter().collect();

        if src.unanchored.is_empty() && tgt.unanchored.is_empty() {
            // Both sides fully anchored: an unmatched identity is a real
            // absence, never a rename candidate.
            for (id, node) in src_leftover {
                let entry = absent_entry(id, &node, Classification::MissingInTarget, &mut metrics);
                entries.push(entry);
            }
            for (id, node) in tgt_leftover {
                let entry = absent_entry(id, &node, Classification::ExtraInTarget, &mut metrics);
                entries.push(entry);
            }
        } else {
            self.join_heuristically(
                src_leftover,
                src.unanchored,
                tgt_leftover,
                tgt.unanchored,
                &mut entries,
                &mut metrics,
            );
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        metrics.finalize();

        info!(
            source = %source.layer,
            target = %target.layer,
            total = metrics.counts.total(),
            fidelity_percent = metrics.fidelity_percent,
            drift_percent = metrics.drift_percent,
            degraded,
            "fidelity comparison complete"
        );

        Ok(FidelityReport {
            generated_at: Utc::now(),
            source: source.clone(),
            target: target.clone(),
            redaction: self.redaction,
            degraded,
            summary: metrics,
            resources: entries,
        })
    }

    async fn load_side(&self, sel: &LayerSelector) -> Result<Side, FidelityError> {
        let filter = NodeFilter::in_layer(sel.layer.clone()).with_scope(sel.scope);
        let nodes = self.store.nodes(sel.tenant, filter).await?;

        // Abstracted nodes resolve identity through their provenance edge.
        let mut claims: HashMap<NodeId, Vec<String>> = HashMap::new();
        if sel.scope == GraphScope::Abstracted {
            for pair in self.store.provenance_pairs(sel.tenant, &sel.layer).await? {
                claims
                    .entry(pair.abstracted)
                    .or_default()
                    .push(pair.original_resource_id);
            }
        }

        let mut side = Side::default();
        for node in nodes {
            let canonical = match sel.scope {
                GraphScope::Abstracted => match claims.remove(&node.id) {
                    Some(mut ids) if ids.len() == 1 => ids.pop(),
                    Some(_) => {
                        warn!(
                            resource = %node.resource_id,
                            "conflicting provenance claims; resource is uncomparable"
                        );
                        side.degraded = true;
                        side.ambiguous.push(node);
                        continue;
                    }
                    None => None,
                },
                _ => Some(node.resource_id.clone()),
            };
            match canonical {
                Some(key) => {
                    if let Some(previous) = side.anchored.remove(&key) {
                        warn!(
                            resource = %key,
                            "two nodes share one resolved identity; both are uncomparable"
                        );
                        side.degraded = true;
                        side.ambiguous.push(previous);
                        side.ambiguous.push(node);
                    } else {
                        side.anchored.insert(key, node);
                    }
                }
                None => side.unanchored.push(node),
            }
        }

        if !side.unanchored.is_empty() {
            side.degraded = true;
            warn!(
                layer = %sel.layer,
                nodes = side.unanchored.len(),
                "no provenance anchors; falling back to heuristic identity"
            );
        }
        Ok(side)
    }

    /// Join whatever provenance could not resolve by (type, name, location).
    fn join_heuristically(
        &self,
        src_leftover: Vec<(String, ResourceNode)>,
        src_unanchored: Vec<ResourceNode>,
        tgt_leftover: Vec<(String, ResourceNode)>,
        tgt_unanchored: Vec<ResourceNode>,
        entries: &mut Vec<ResourceEntry>,
        metrics: &mut FidelityMetrics,
    ) {
        let mut src_pool = pool(src_leftover, src_unanchored);
        let mut tgt_pool = pool(tgt_leftover, tgt_unanchored);

        let keys: Vec<String> = src_pool.keys().cloned().collect();
        for key in keys {
            let Some(mut candidates) = src_pool.remove(&key) else {
                continue;
            };
            match tgt_pool.remove(&key) {
                Some(mut peers) if candidates.len() == 1 && peers.len() == 1 => {
                    let (id, node) = candidates.remove(0);
                    let (_, peer) = peers.remove(0);
                    debug!(resource = %id, "matched heuristically");
                    entries.push(self.pair_entry(id, node, peer, MatchBasis::Heuristic, metrics));
                }
                Some(peers) => {
                    // More than one claimant for the same (type, name,
                    // location) tuple: no honest pairing exists.
                    for (id, node) in candidates.into_iter().chain(peers) {
                        warn!(resource = %id, "heuristic identity is ambiguous");
                        entries.push(uncomparable_entry(id, &node, metrics));
                    }
                }
                None => {
                    for (id, node) in candidates {
                        entries.push(absent_entry(
                            id,
                            &node,
                            Classification::MissingInTarget,
                            metrics,
                        ));
                    }
                }
            }
        }
        for (_, peers) in tgt_pool {
            for (id, node) in peers {
                entries.push(absent_entry(id, &node, Classification::ExtraInTarget, metrics));
            }
        }
    }

    fn pair_entry(
        &self,
        id: String,
        source: ResourceNode,
        target: ResourceNode,
        basis: MatchBasis,
        metrics: &mut FidelityMetrics,
    ) -> ResourceEntry {
        let mut diffs = Vec::new();
        if source.resource_type != target.resource_type {
            diffs.push(PropertyDiff {
                name: "resource_type".to_owned(),
                source_value: Some(Value::String(source.resource_type.clone())),
                target_value: Some(Value::String(target.resource_type.clone())),
                sensitive: false,
                redacted: false,
            });
        }

        let source_leaves = flatten_properties(&source.properties);
        let target_leaves = flatten_properties(&target.properties);
        let names: BTreeSet<&String> = source_leaves.keys().chain(target_leaves.keys()).collect();
        for name in names {
            let source_raw = source_leaves.get(name.as_str());
            let target_raw = target_leaves.get(name.as_str());
            if source_raw == target_raw {
                continue;
            }
            let sensitivity = classify(name);
            let (source_value, source_redacted) =
                render_optional(self.redaction, sensitivity, source_raw);
            let (target_value, target_redacted) =
                render_optional(self.redaction, sensitivity, target_raw);
            diffs.push(PropertyDiff {
                name: name.clone(),
                source_value,
                target_value,
                sensitive: sensitivity != Sensitivity::Plain,
                redacted: source_redacted || target_redacted,
            });
        }

        let classification = if diffs.is_empty() {
            Classification::ExactMatch
        } else {
            debug!(resource = %id, drifted_properties = diffs.len(), "drift detected");
            Classification::Drifted
        };
        metrics.record(&source.resource_type, classification);
        ResourceEntry {
            id,
            resource_type: source.resource_type,
            classification,
            matched_by: Some(basis),
            properties: diffs,
        }
    }
}

/// Per-side working state while resolving identities.
#[derive(Default)]
struct Side {
    /// Resolved identity -> node.
    anchored: HashMap<String, ResourceNode>,
    /// Nodes whose resolved identity collided with another node's.
    ambiguous: Vec<ResourceNode>,
    /// Nodes with no provenance anchor, awaiting heuristic matching.
    unanchored: Vec<ResourceNode>,
    degraded: bool,
}

fn pool(
    leftover: Vec<(String, ResourceNode)>,
    unanchored: Vec<ResourceNode>,
) -> HashMap<String, Vec<(String, ResourceNode)>> {
    let mut grouped: HashMap<String, Vec<(String, ResourceNode)>> = HashMap::new();
    for (id, node) in leftover
        .into_iter()
        .chain(unanchored.into_iter().map(|n| (n.resource_id.clone(), n)))
    {
        grouped.entry(heuristic_key(&node)).or_default().push((id, node));
    }
    grouped
}

/// Flatten a property bag to dot-path leaves so drift localizes to the
/// exact nested field. Arrays and empty objects stay whole.
fn flatten_properties(bag: &PropertyBag) -> BTreeMap<String, Value> {
    let mut leaves = BTreeMap::new();
    for (name, value) in bag {
        flatten_into(name.clone(), value, &mut leaves);
    }
    leaves
}

fn flatten_into(path: String, value: &Value, leaves: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(fields) if !fields.is_empty() => {
            for (name, nested) in fields {
                flatten_into(format!("{path}.{name}"), nested, leaves);
            }
        }
        _ => {
            leaves.insert(path, value.clone());
        }
    }
}

fn heuristic_key(node: &ResourceNode) -> String {
    let name = node
        .properties
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_else(|| trailing_segment(&node.resource_id));
    let location = node
        .properties
        .get("location")
        .and_then(Value::as_str)
        .unwrap_or("");
    format!(
        "{}|{}|{}",
        node.resource_type.to_ascii_lowercase(),
        name.to_ascii_lowercase(),
        location.to_ascii_lowercase()
    )
}

fn trailing_segment(resource_id: &str) -> &str {
    resource_id.rsplit('/').next().unwrap_or(resource_id)
}

fn absent_entry(
    id: String,
    node: &ResourceNode,
    classification: Classification,
    metrics: &mut FidelityMetrics,
) -> ResourceEntry {
    metrics.record(&node.resource_type, classification);
    ResourceEntry {
        id,
        resource_type: node.resource_type.clone(),
        classification,
        matched_by: None,
        properties: Vec::new(),
    }
}

fn uncomparable_entry(
    id: String,
    node: &ResourceNode,
    metrics: &mut FidelityMetrics,
) -> ResourceEntry {
    metrics.record(&node.resource_type, Classification::Uncomparable);
    ResourceEntry {
        id,
        resource_type: node.resource_type.clone(),
        classification: Classification::Uncomparable,
        matched_by: None,
        properties: Vec::new(),
    }
}

fn render_optional(
    level: RedactionLevel,
    sensitivity: Sensitivity,
    value: Option<&Value>,
) -> (Option<Value>, bool) {
    match value {
        Some(raw) => {
            let (rendered, redacted) = render_value(level, sensitivity, raw);
            (Some(rendered), redacted)
        }
        None => (None, false),
    }
}
