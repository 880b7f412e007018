//! Error types for layer lifecycle operations

use doppel_graph::{GraphError, LayerId};

/// An archive document that cannot be restored as-is
///
/// Every variant here is detected during pre-flight validation, before a
/// single write reaches the store.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveSchemaError {
    /// Schema version this build does not understand
    #[error("unsupported archive schema version {found:?}")]
    UnsupportedVersion {
        /// Version string from the document
        found: String,
    },

    /// Stored checksum does not match the recomputed one
    #[error("archive checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum carried by the document
        stored: String,
        /// Checksum computed over the payload
        computed: String,
    },

    /// Current-format archives must carry a checksum
    #[error("archive is missing its checksum")]
    MissingChecksum,

    /// A relationship references a node the archive does not contain
    #[error("relationship {rel_type} references missing node {resource_id:?}")]
    DanglingRelationship {
        /// Wire name of the offending relationship
        rel_type: String,
        /// Endpoint resource id with no archived node
        resource_id: String,
    },

    /// The document is not valid archive JSON
    #[error("malformed archive document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Layer lifecycle failures
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// Another lifecycle operation holds the advisory lock
    #[error("layer {layer} is busy with another lifecycle operation")]
    LayerBusy {
        /// Contended layer
        layer: LayerId,
    },

    /// Copy and restore targets must start empty
    #[error("target layer {layer} already holds data")]
    TargetNotEmpty {
        /// Occupied target layer
        layer: LayerId,
    },

    /// Archive failed pre-flight validation
    #[error(transparent)]
    Archive(#[from] ArchiveSchemaError),

    /// Underlying store failure
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Archive file could not be read or written
    #[error("archive io failed: {0}")]
    Io(#[from] std::io::Error),
}

impl LayerError {
    /// Whether this failure denied access to a protected layer
    #[must_use]
    pub fn is_security_violation(&self) -> bool {
        matches!(self, LayerError::Graph(e) if e.is_security_violation())
    }
}
