//! Error types for ingestion

use doppel_graph::GraphError;

/// Ingestion failures
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Underlying store failure, already retried where retryable
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A relationship fact names a resource the session has never written
    /// and the store holds no provenance for
    #[error("resource {resource_id:?} is not in the pair index")]
    UnknownResource {
        /// Original resource id from the fact
        resource_id: String,
    },

    /// Facts may not carry the provenance type; only the dual-node writer
    /// creates `SCAN_SOURCE_NODE` edges
    #[error("relationship type {rel_type:?} is reserved for provenance")]
    ReservedRelationshipType {
        /// Offending wire name
        rel_type: String,
    },
}
