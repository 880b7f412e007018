//! Error types for fidelity comparison

use doppel_graph::GraphError;

/// Comparison and history failures
#[derive(Debug, thiserror::Error)]
pub enum FidelityError {
    /// Underlying store failure
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// History file could not be read or written
    #[error("history io failed: {0}")]
    Io(#[from] std::io::Error),

    /// A history line is not valid JSON
    #[error("malformed history entry: {0}")]
    Malformed(#[from] serde_json::Error),
}
