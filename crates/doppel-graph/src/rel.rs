//! Relationships and the provenance edge
//!
//! Semantic relationships exist once in the Original subgraph and once,
//! mirrored, in the Abstracted subgraph; they never cross sides. The single
//! exception is [`RelType::ScanSource`] (`SCAN_SOURCE_NODE`), the directed
//! provenance edge Abstracted → Original created atomically with each node
//! pair.

use crate::ids::{LayerId, NodeId, RelId, TenantId};
use crate::node::PropertyBag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Wire name of the provenance edge
pub const SCAN_SOURCE_NODE: &str = "SCAN_SOURCE_NODE";

/// Relationship type
///
/// Well-known kinds get variants; anything else rides in `Other` with its
/// wire name preserved verbatim. Display/FromStr use the
/// SCREAMING_SNAKE_CASE wire names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelType {
    /// Containment (resource group contains resource, vnet contains subnet)
    Contains,
    /// Resource uses a managed identity
    UsesIdentity,
    /// Network reachability
    ConnectedTo,
    /// Generic dependency
    DependsOn,
    /// Provenance edge, Abstracted → Original; never mirrored
    ScanSource,
    /// Any other relationship kind, wire name verbatim
    Other(String),
}

impl RelType {
    /// Whether this is the provenance edge
    #[inline]
    #[must_use]
    pub fn is_provenance(&self) -> bool {
        matches!(self, RelType::ScanSource)
    }

    /// Wire name of this relationship type
    #[must_use]
    pub fn wire_name(&self) -> &str {
        match self {
            RelType::Contains => "CONTAINS",
            RelType::UsesIdentity => "USES_IDENTITY",
            RelType::ConnectedTo => "CONNECTED_TO",
            RelType::DependsOn => "DEPENDS_ON",
            RelType::ScanSource => SCAN_SOURCE_NODE,
            RelType::Other(name) => name,
        }
    }
}

impl Display for RelType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl From<&str> for RelType {
    fn from(s: &str) -> Self {
        match s {
            "CONTAINS" => RelType::Contains,
            "USES_IDENTITY" => RelType::UsesIdentity,
            "CONNECTED_TO" => RelType::ConnectedTo,
            "DEPENDS_ON" => RelType::DependsOn,
            SCAN_SOURCE_NODE => RelType::ScanSource,
            other => RelType::Other(other.to_string()),
        }
    }
}

impl FromStr for RelType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl Serialize for RelType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for RelType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(RelType::from(raw.as_str()))
    }
}

/// Dedupe identity of a relationship within one tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelKey {
    /// Owning layer
    pub layer: LayerId,
    /// Relationship type
    pub rel_type: RelType,
    /// Source element
    pub source: NodeId,
    /// Target element
    pub target: NodeId,
}

/// A stored relationship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Internal element id
    pub id: RelId,
    /// Owning tenant
    pub tenant: TenantId,
    /// Owning layer
    pub layer: LayerId,
    /// Relationship type
    pub rel_type: RelType,
    /// Source element
    pub source: NodeId,
    /// Target element
    pub target: NodeId,
    /// Relationship properties
    pub properties: PropertyBag,
    /// First write timestamp
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// Dedupe identity of this relationship
    #[inline]
    #[must_use]
    pub fn key(&self) -> RelKey {
        RelKey {
            layer: self.layer.clone(),
            rel_type: self.rel_type.clone(),
            source: self.source,
            target: self.target,
        }
    }
}

/// Relationship draft submitted in a write batch
///
/// Endpoints reference either nodes already stored or the proposed ids of
/// node drafts in the same batch; the store resolves them to effective ids
/// before commit.
#[derive(Debug, Clone)]
pub struct RelDraft {
    /// Proposed element id
    pub id: RelId,
    /// Relationship type
    pub rel_type: RelType,
    /// Source element (proposed or existing)
    pub source: NodeId,
    /// Target element (proposed or existing)
    pub target: NodeId,
    /// Relationship properties
    pub properties: PropertyBag,
}

impl RelDraft {
    /// Draft a relationship with a fresh proposed id
    #[must_use]
    pub fn new(rel_type: RelType, source: NodeId, target: NodeId, properties: PropertyBag) -> Self {
        Self {
            id: RelId::new(),
            rel_type,
            source,
            target,
            properties,
        }
    }

    /// Draft a provenance edge abstracted → original
    #[inline]
    #[must_use]
    pub fn provenance(abstracted: NodeId, original: NodeId) -> Self {
        Self::new(RelType::ScanSource, abstracted, original, PropertyBag::new())
    }

    /// Override the proposed element id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: RelId) -> Self {
        self.id = id;
        self
    }

    /// Materialize into a stored relationship
    ///
    /// `source` and `target` are the effective endpoint ids after the
    /// store resolved proposed ids.
    #[must_use]
    pub fn into_rel(
        self,
        tenant: TenantId,
        layer: LayerId,
        source: NodeId,
        target: NodeId,
    ) -> Relationship {
        Relationship {
            id: self.id,
            tenant,
            layer,
            rel_type: self.rel_type,
            source,
            target,
            properties: self.properties,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for rel in [
            RelType::Contains,
            RelType::UsesIdentity,
            RelType::ConnectedTo,
            RelType::DependsOn,
            RelType::ScanSource,
            RelType::Other("PEERS_WITH".to_string()),
        ] {
            let parsed: RelType = rel.wire_name().parse().unwrap();
            assert_eq!(parsed, rel);
        }
    }

    #[test]
    fn provenance_detection() {
        assert!(RelType::ScanSource.is_provenance());
        assert!(!RelType::Contains.is_provenance());
        assert!(!RelType::Other("SCAN_ADJACENT".to_string()).is_provenance());
    }

    #[test]
    fn scan_source_parses_to_variant_not_other() {
        let parsed: RelType = SCAN_SOURCE_NODE.parse().unwrap();
        assert_eq!(parsed, RelType::ScanSource);
    }

    #[test]
    fn rel_type_serde_uses_wire_names() {
        let json = serde_json::to_string(&RelType::ScanSource).unwrap();
        assert_eq!(json, "\"SCAN_SOURCE_NODE\"");
        let back: RelType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RelType::ScanSource);
    }

    #[test]
    fn unknown_wire_name_lands_in_other() {
        let parsed: RelType = "ROUTES_TO".parse().unwrap();
        assert_eq!(parsed, RelType::Other("ROUTES_TO".to_string()));
        assert_eq!(parsed.wire_name(), "ROUTES_TO");
    }
}
