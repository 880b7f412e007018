//! Identifier newtypes used across the dual-graph model
//!
//! Provides strongly-typed ids for tenants, graph elements and layers.
//! [`LayerId`] is the only validated id: layer names come from operators
//! and discovery pipelines, so malformed input must be rejected before it
//! reaches any write path.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Unique tenant identifier
///
/// A tenant is the top-level customer/org whose resources are modeled.
/// Tenants are fully independent: distinct seeds, distinct id namespaces,
/// no cross-tenant coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    /// Generate a fresh tenant id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal graph-element identifier for nodes
///
/// Distinct from the cloud `resource_id`: a node keeps its `NodeId` across
/// upserts, while the property bag is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Generate a fresh node id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal graph-element identifier for relationships
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelId(pub Uuid);

impl RelId {
    /// Generate a fresh relationship id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RelId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum accepted layer-name length
const LAYER_ID_MAX_LEN: usize = 64;

/// A named, isolated subgraph of a tenant's resources
///
/// Every node and relationship is tagged with exactly one `LayerId`;
/// operations scoped to a layer never read or write another layer's
/// elements. Names are validated on construction: first character
/// alphanumeric, the rest alphanumeric or `_`, `-`, `.`, at most 64
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LayerId(String);

impl LayerId {
    /// Validate and construct a layer id
    ///
    /// # Errors
    /// Returns [`ValidationError::MalformedLayerId`] for empty, oversized
    /// or non-conforming names.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::MalformedLayerId {
                id: name,
                reason: "empty layer name",
            });
        }
        if name.len() > LAYER_ID_MAX_LEN {
            return Err(ValidationError::MalformedLayerId {
                id: name,
                reason: "layer name exceeds 64 characters",
            });
        }
        let mut chars = name.chars();
        // First character is stricter so names cannot start with '.' or '-'
        // and masquerade as paths or CLI flags.
        match chars.next() {
            Some(c) if c.is_ascii_alphanumeric() => {}
            _ => {
                return Err(ValidationError::MalformedLayerId {
                    id: name,
                    reason: "layer name must start with an ASCII letter or digit",
                })
            }
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            return Err(ValidationError::MalformedLayerId {
                id: name,
                reason: "layer name may only contain ASCII letters, digits, '_', '-', '.'",
            });
        }
        Ok(Self(name))
    }

    /// The conventional layer discovery writes into
    #[inline]
    #[must_use]
    pub fn default_layer() -> Self {
        Self("default".to_string())
    }

    /// Layer name as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LayerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for LayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for LayerId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for LayerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        LayerId::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_id_accepts_conventional_names() {
        for name in ["default", "sandbox", "prod-eu.2024", "A1_b2"] {
            assert!(LayerId::new(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn layer_id_rejects_empty() {
        assert!(matches!(
            LayerId::new(""),
            Err(ValidationError::MalformedLayerId { .. })
        ));
    }

    #[test]
    fn layer_id_rejects_path_traversal() {
        for name in ["../etc", "a/b", "..", "-rf", ".hidden", "a b"] {
            assert!(
                LayerId::new(name).is_err(),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn layer_id_rejects_oversized() {
        let name = "a".repeat(65);
        assert!(LayerId::new(name).is_err());
    }

    #[test]
    fn layer_id_round_trips_serde() {
        let layer = LayerId::new("sandbox").unwrap();
        let json = serde_json::to_string(&layer).unwrap();
        let decoded: LayerId = serde_json::from_str(&json).unwrap();
        assert_eq!(layer, decoded);
    }

    #[test]
    fn layer_id_deserialize_validates() {
        let result: Result<LayerId, _> = serde_json::from_str("\"../escape\"");
        assert!(result.is_err());
    }

    #[test]
    fn ids_display_as_uuid() {
        let id = NodeId::new();
        assert_eq!(id.to_string(), id.0.to_string());
        let tenant = TenantId::new();
        assert_eq!(tenant.to_string(), tenant.0.to_string());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
        assert_ne!(TenantId::new(), TenantId::new());
        assert_ne!(RelId::new(), RelId::new());
    }
}
