//! Layer archive documents.
//!
//! An archive is a self-contained JSON snapshot of one layer: every
//! node from both subgraphs, every relationship including the
//! `SCAN_SOURCE_NODE` provenance edges, and a SHA-256 checksum over the
//! canonical payload. Relationships reference nodes by
//! `(kind, resource_id)` rather than element id, so a restore into a
//! fresh store rebuilds the same topology under new element ids.
//!
//! Schema history:
//! - `2.0` (current): provenance edges included, checksum mandatory,
//!   `includes_scan_source_node` flag present.
//! - pre-`2.0` (legacy): written before provenance edges existed;
//!   restores are accepted in degraded mode and the pair structure must
//!   be re-derived by a fresh scan.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use doppel_graph::{LayerId, NodeKind, PropertyBag, RelType, Relationship, ResourceNode, TenantId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ulid::Ulid;

use crate::error::{ArchiveSchemaError, LayerError};

/// Schema version written by this build.
pub const ARCHIVE_SCHEMA_VERSION: &str = "2.0";
/// Version assumed for documents written before the `version` field existed.
pub const LEGACY_SCHEMA_VERSION: &str = "1.0";

/// Major component of [`ARCHIVE_SCHEMA_VERSION`].
const CURRENT_MAJOR: u32 = 2;

fn legacy_version() -> String {
    LEGACY_SCHEMA_VERSION.to_owned()
}

fn schema_major(version: &str) -> Option<u32> {
    version.split('.').next().and_then(|major| major.parse().ok())
}

/// Element-id independent reference to an archived node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointRef {
    /// Which subgraph the node belongs to.
    pub kind: NodeKind,
    /// Resource id of the node, unique within its kind.
    pub resource_id: String,
}

/// One node as stored in an archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedNode {
    /// Which subgraph the node belongs to.
    pub kind: NodeKind,
    /// Resource id, real for Original nodes and pseudonymized for
    /// Abstracted ones.
    pub resource_id: String,
    /// Provider resource type.
    pub resource_type: String,
    /// Properties exactly as stored in the layer.
    #[serde(default)]
    pub properties: PropertyBag,
}

impl ArchivedNode {
    fn endpoint(&self) -> EndpointRef {
        EndpointRef {
            kind: self.kind,
            resource_id: self.resource_id.clone(),
        }
    }
}

/// One relationship as stored in an archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedRel {
    /// Relationship type, serialized under the `type` key.
    #[serde(rename = "type")]
    pub rel_type: RelType,
    /// Node the edge leaves from.
    pub source: EndpointRef,
    /// Node the edge points at.
    pub target: EndpointRef,
    /// Edge properties exactly as stored in the layer.
    #[serde(default)]
    pub properties: PropertyBag,
}

/// Self-contained snapshot of one layer.
///
/// Optional fields default for tolerance of legacy documents; current
/// writes always fill them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerArchive {
    /// Document schema version; absent in the very oldest archives.
    #[serde(rename = "version", default = "legacy_version")]
    pub schema_version: String,
    /// Unique id of this archive document.
    #[serde(default)]
    pub archive_id: Option<String>,
    /// Tenant the layer was captured from.
    #[serde(rename = "tenant_id")]
    pub tenant: TenantId,
    /// Layer the snapshot covers.
    #[serde(rename = "layer_id")]
    pub layer: LayerId,
    /// When the archive was taken.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Whether provenance edges were captured.
    #[serde(default)]
    pub includes_scan_source_node: bool,
    /// All nodes of the layer, both subgraphs, in canonical order.
    pub nodes: Vec<ArchivedNode>,
    /// All relationships of the layer, in canonical order.
    pub relationships: Vec<ArchivedRel>,
    /// SHA-256 over the canonical payload; mandatory from 2.0 on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl LayerArchive {
    /// Build a current-format archive from live layer elements.
    ///
    /// Element order is normalized before checksumming, so archiving the
    /// same layer twice yields byte-identical payloads.
    ///
    /// # Errors
    ///
    /// [`ArchiveSchemaError::Malformed`] when the payload cannot be
    /// serialized.
    pub fn build(
        tenant: TenantId,
        layer: LayerId,
        nodes: Vec<ResourceNode>,
        relationships: Vec<Relationship>,
    ) -> Result<Self, ArchiveSchemaError> {
        let endpoints: std::collections::HashMap<_, _> = nodes
            .iter()
            .map(|node| {
                (
                    node.id,
                    EndpointRef {
                        kind: node.kind,
                        resource_id: node.resource_id.clone(),
                    },
                )
            })
            .collect();

        let mut archived_nodes: Vec<ArchivedNode> = nodes
            .into_iter()
            .map(|node| ArchivedNode {
                kind: node.kind,
                resource_id: node.resource_id,
                resource_type: node.resource_type,
                properties: node.properties,
            })
            .collect();
        archived_nodes.sort_by(|a, b| {
            (a.kind, a.resource_id.as_str()).cmp(&(b.kind, b.resource_id.as_str()))
        });

        let mut archived_rels = Vec::with_capacity(relationships.len());
        for rel in relationships {
            let (Some(source), Some(target)) =
                (endpoints.get(&rel.source), endpoints.get(&rel.target))
            else {
                tracing::warn!(rel = %rel.id, "skipping relationship with endpoint outside the layer");
                continue;
            };
            archived_rels.push(ArchivedRel {
                rel_type: rel.rel_type,
                source: source.clone(),
                target: target.clone(),
                properties: rel.properties,
            });
        }
        archived_rels.sort_by(|a, b| {
            (
                a.rel_type.wire_name(),
                a.source.kind,
                a.source.resource_id.as_str(),
                a.target.resource_id.as_str(),
            )
                .cmp(&(
                    b.rel_type.wire_name(),
                    b.source.kind,
                    b.source.resource_id.as_str(),
                    b.target.resource_id.as_str(),
                ))
        });

        let mut archive = Self {
            schema_version: ARCHIVE_SCHEMA_VERSION.to_owned(),
            archive_id: Some(Ulid::new().to_string()),
            tenant,
            layer,
            created_at: Some(Utc::now()),
            includes_scan_source_node: true,
            nodes: archived_nodes,
            relationships: archived_rels,
            checksum: None,
        };
        archive.checksum = Some(archive.compute_checksum()?);
        Ok(archive)
    }

    /// Checksum over everything except the checksum field itself.
    ///
    /// Canonical form is the serde_json rendering with `checksum`
    /// omitted; property maps serialize with sorted keys, so the bytes
    /// are stable.
    ///
    /// # Errors
    ///
    /// [`ArchiveSchemaError::Malformed`] when the payload cannot be
    /// serialized.
    pub fn compute_checksum(&self) -> Result<String, ArchiveSchemaError> {
        let mut payload = self.clone();
        payload.checksum = None;
        let bytes = serde_json::to_vec(&payload)?;
        Ok(hex::encode(Sha256::digest(bytes)))
    }

    /// Whether this document predates the current schema major.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        schema_major(&self.schema_version).is_some_and(|major| major < CURRENT_MAJOR)
    }
}

/// Outcome of archive pre-flight validation.
#[derive(Debug, Clone, Default)]
pub struct ArchiveCheck {
    /// True when the archive is restorable only with reduced guarantees.
    pub degraded: bool,
    /// Human-readable notes on what is degraded.
    pub warnings: Vec<String>,
}

/// Validate an archive before any write is attempted.
///
/// # Errors
///
/// [`ArchiveSchemaError::UnsupportedVersion`] for unknown schemas,
/// [`ArchiveSchemaError::MissingChecksum`] and
/// [`ArchiveSchemaError::ChecksumMismatch`] for checksum problems, and
/// [`ArchiveSchemaError::DanglingRelationship`] when a relationship
/// references a node the archive does not contain.
pub fn validate_archive(archive: &LayerArchive) -> Result<ArchiveCheck, ArchiveSchemaError> {
    let mut check = ArchiveCheck::default();

    match schema_major(&archive.schema_version) {
        Some(CURRENT_MAJOR) => {}
        Some(major) if major < CURRENT_MAJOR => {
            check.degraded = true;
            check.warnings.push(format!(
                "legacy {} archive: provenance edges were not captured",
                archive.schema_version
            ));
        }
        _ => {
            return Err(ArchiveSchemaError::UnsupportedVersion {
                found: archive.schema_version.clone(),
            })
        }
    }

    match &archive.checksum {
        Some(stored) => {
            let computed = archive.compute_checksum()?;
            if *stored != computed {
                return Err(ArchiveSchemaError::ChecksumMismatch {
                    stored: stored.clone(),
                    computed,
                });
            }
        }
        None if archive.is_legacy() => {
            check.degraded = true;
            check
                .warnings
                .push("legacy archive carries no checksum; integrity not verified".to_owned());
        }
        None => return Err(ArchiveSchemaError::MissingChecksum),
    }

    let known: std::collections::HashSet<EndpointRef> =
        archive.nodes.iter().map(ArchivedNode::endpoint).collect();
    for rel in &archive.relationships {
        for endpoint in [&rel.source, &rel.target] {
            if !known.contains(endpoint) {
                return Err(ArchiveSchemaError::DanglingRelationship {
                    rel_type: rel.rel_type.wire_name().to_owned(),
                    resource_id: endpoint.resource_id.clone(),
                });
            }
        }
    }

    for warning in &check.warnings {
        tracing::warn!(layer = %archive.layer, "{warning}");
    }
    Ok(check)
}

/// Archive documents on the local filesystem, one JSON file each.
///
/// Layout: `{root}/{tenant}/{layer}-{archive_id}.json`. Writes go
/// through a temp file and rename so a crash never leaves a truncated
/// archive in place.
pub struct FileArchiveStore {
    root: PathBuf,
}

impl FileArchiveStore {
    /// Root the store at a directory, created lazily on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist an archive, returning the path written.
    ///
    /// # Errors
    /// Io failures and serialization failures.
    pub async fn save(&self, archive: &LayerArchive) -> Result<PathBuf, LayerError> {
        let dir = self.root.join(archive.tenant.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let stem = match &archive.archive_id {
            Some(id) => format!("{}-{id}", archive.layer),
            None => archive.layer.to_string(),
        };
        let path = dir.join(format!("{stem}.json"));
        let tmp = dir.join(format!("{stem}.json.tmp"));

        let bytes = serde_json::to_vec_pretty(archive).map_err(ArchiveSchemaError::from)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::info!(
            path = %path.display(),
            nodes = archive.nodes.len(),
            relationships = archive.relationships.len(),
            "archive written"
        );
        Ok(path)
    }

    /// Load an archive document from disk.
    ///
    /// # Errors
    /// Io failures and [`ArchiveSchemaError::Malformed`] for bad JSON.
    pub async fn load(&self, path: &Path) -> Result<LayerArchive, LayerError> {
        let bytes = tokio::fs::read(path).await?;
        let archive: LayerArchive =
            serde_json::from_slice(&bytes).map_err(ArchiveSchemaError::from)?;
        Ok(archive)
    }
}
