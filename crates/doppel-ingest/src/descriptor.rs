//! Input shapes handed over by discovery
//!
//! Discovery (out of scope here) emits resource descriptors and
//! relationship facts as JSON; these are their typed forms. Identifiers
//! inside them are still the real ones; abstraction happens in the
//! writer.

use doppel_graph::PropertyBag;
use serde::{Deserialize, Serialize};

/// One discovered resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Cloud resource id, e.g. a full ARM path
    pub resource_id: String,
    /// Cloud resource type, e.g. `Microsoft.Compute/virtualMachines`
    pub resource_type: String,
    /// Descriptive properties as discovered
    #[serde(default)]
    pub properties: PropertyBag,
}

impl ResourceDescriptor {
    /// Build a descriptor
    #[must_use]
    pub fn new(
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
        properties: PropertyBag,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type: resource_type.into(),
            properties,
        }
    }
}

/// One discovered relationship between two resources
///
/// Endpoints are named by original resource id; the writer resolves them
/// through the pair index to node ids on both sides of the dual graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipFact {
    /// Original resource id of the source
    pub source_id: String,
    /// Original resource id of the target
    pub target_id: String,
    /// Relationship wire name, e.g. `CONTAINS`
    pub rel_type: String,
    /// Relationship properties
    #[serde(default)]
    pub properties: PropertyBag,
}

impl RelationshipFact {
    /// Build a fact
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        rel_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            rel_type: rel_type.into(),
            properties: PropertyBag::new(),
        }
    }

    /// Attach relationship properties
    #[must_use]
    pub fn with_properties(mut self, properties: PropertyBag) -> Self {
        self.properties = properties;
        self
    }
}
