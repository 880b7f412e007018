//! Error types for the graph substrate
//!
//! Follows the system-wide taxonomy:
//! - [`ValidationError`]: malformed input, rejected before any write
//! - [`GraphError::Transaction`]: store write failure, retried with backoff
//!   then surfaced with full rollback of the affected unit of work
//! - [`GraphError::ProtectedLayer`]: security violation, a modification of
//!   a protected layer without the explicit override flag

use crate::ids::{LayerId, NodeId, TenantId};
use crate::node::NodeKind;
use std::time::Duration;

/// Input validation failures
///
/// Every variant is rejected immediately with no partial write.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Layer name does not conform to the accepted grammar
    #[error("malformed layer id {id:?}: {reason}")]
    MalformedLayerId {
        /// Offending input
        id: String,
        /// Constraint that failed
        reason: &'static str,
    },

    /// A non-provenance relationship would join an Original node to an
    /// Abstracted node
    #[error("relationship {rel_type} would cross subgraphs: {source_kind} -> {target_kind}")]
    CrossSubgraphRelationship {
        /// Relationship wire name
        rel_type: String,
        /// Kind of the source endpoint
        source_kind: NodeKind,
        /// Kind of the target endpoint
        target_kind: NodeKind,
    },

    /// A provenance edge ran in the wrong direction
    #[error("provenance edge must run Abstracted -> Original, got {source_kind} -> {target_kind}")]
    InvalidProvenanceDirection {
        /// Kind of the source endpoint
        source_kind: NodeKind,
        /// Kind of the target endpoint
        target_kind: NodeKind,
    },

    /// A relationship endpoint resolves to no node in the batch or store
    #[error("relationship endpoint {node} not found in batch or store")]
    UnknownEndpoint {
        /// Unresolvable element id
        node: NodeId,
    },

    /// A relationship endpoint lives in a different layer than the batch
    #[error("relationship endpoint {node} belongs to layer {found}, batch is scoped to {expected}")]
    CrossLayerEndpoint {
        /// Offending element id
        node: NodeId,
        /// Layer the batch writes into
        expected: LayerId,
        /// Layer the endpoint belongs to
        found: LayerId,
    },

    /// A property value failed the injection screen
    ///
    /// Rejected per-property by the writer, never fatal for the whole
    /// write.
    #[error("property {name:?} rejected: {reason}")]
    PropertyRejected {
        /// Property path
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A batch with no operations
    #[error("empty write batch")]
    EmptyBatch,
}

/// Graph store failures
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Input validation failed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Store write failed; `attempts` is the number of tries consumed
    #[error("transaction failed after {attempts} attempt(s): {reason}")]
    Transaction {
        /// Attempts consumed including the first
        attempts: u32,
        /// Underlying failure description
        reason: String,
        /// Whether another attempt could succeed
        retryable: bool,
    },

    /// Store call exceeded its timeout
    #[error("graph store call timed out after {0:?}")]
    Timeout(Duration),

    /// Store unreachable (connectivity); transient until retries exhaust
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    /// Attempt to modify a protected layer without the override flag
    #[error("layer {layer} is protected; pass override_protection to modify it")]
    ProtectedLayer {
        /// Protected layer
        layer: LayerId,
    },

    /// Layer has no elements for this tenant
    #[error("layer {layer} not found for tenant {tenant}")]
    LayerNotFound {
        /// Tenant queried
        tenant: TenantId,
        /// Missing layer
        layer: LayerId,
    },
}

impl GraphError {
    /// Whether retrying the operation could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GraphError::Timeout(_)
                | GraphError::Unavailable(_)
                | GraphError::Transaction {
                    retryable: true,
                    ..
                }
        )
    }

    /// Whether this is the security-violation path
    #[inline]
    #[must_use]
    pub fn is_security_violation(&self) -> bool {
        matches!(self, GraphError::ProtectedLayer { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GraphError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(GraphError::Unavailable("refused".to_string()).is_retryable());
        assert!(GraphError::Transaction {
            attempts: 1,
            reason: "deadlock".to_string(),
            retryable: true
        }
        .is_retryable());
        assert!(!GraphError::Transaction {
            attempts: 3,
            reason: "constraint".to_string(),
            retryable: false
        }
        .is_retryable());
        assert!(!GraphError::Validation(ValidationError::EmptyBatch).is_retryable());
    }

    #[test]
    fn protected_layer_is_security_violation() {
        let err = GraphError::ProtectedLayer {
            layer: LayerId::default_layer(),
        };
        assert!(err.is_security_violation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn messages_are_lowercase_and_specific() {
        let err = ValidationError::MalformedLayerId {
            id: "../x".to_string(),
            reason: "layer name must start with an ASCII letter or digit",
        };
        assert!(err.to_string().contains("malformed layer id"));
    }
}
