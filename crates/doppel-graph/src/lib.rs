//! Dual-graph storage substrate
//!
//! Every discovered cloud resource exists twice in the graph: an Original
//! node carrying the real identity and an Abstracted node carrying a
//! deterministic pseudonym, joined by a directed `SCAN_SOURCE_NODE`
//! provenance edge (Abstracted → Original). This crate owns the model and
//! the store seam that keeps the pair structure honest.
//!
//! # Core Concepts
//!
//! - [`GraphStore`]: async store trait; a [`WriteBatch`] commits atomically
//! - [`MemoryGraphStore`]: per-tenant sharded in-memory reference backend
//! - [`ResourceNode`] / [`Relationship`]: stored elements, layer-scoped
//! - [`NodeKind`]: which side of the dual graph an element lives on
//! - [`LayerId`]: validated layer name; layers never leak into each other
//! - [`with_retry`]: backoff wrapper for transient store failures
//!
//! # Example
//!
//! ```rust,ignore
//! use doppel_graph::{MemoryGraphStore, GraphStore, WriteBatch, NodeDraft, RelDraft, NodeKind};
//!
//! let mut batch = WriteBatch::new(tenant, layer);
//! let original = batch.upsert_node(NodeDraft::new(NodeKind::Original, rid, "vm", props));
//! let abstracted = batch.upsert_node(NodeDraft::new(NodeKind::Abstracted, abs_id, "vm", props));
//! batch.upsert_relationship(RelDraft::provenance(abstracted, original));
//!
//! // Both nodes and the provenance edge land together or not at all.
//! let receipt = store.apply(batch).await?;
//! ```

#![warn(unreachable_pub)]

mod error;
mod ids;
mod memory;
mod node;
mod rel;
mod retry;
mod store;

pub use error::{GraphError, ValidationError};
pub use ids::{LayerId, NodeId, RelId, TenantId};
pub use memory::MemoryGraphStore;
pub use node::{NodeDraft, NodeKey, NodeKind, PropertyBag, ResourceNode};
pub use rel::{RelDraft, RelKey, RelType, Relationship, SCAN_SOURCE_NODE};
pub use retry::{with_retry, RetryPolicy};
pub use store::{
    Applied, CommitReceipt, GraphScope, GraphStore, LayerInfo, LayerRemoval, NodeCounts,
    NodeFilter, ProvenancePair, RelFilter, RelTypeCounts, WriteBatch, WriteOp,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
