//! Dual-graph ingestion: original nodes, abstracted twins, mirrored
//! relationships.
//!
//! This crate turns discovery output into the dual graph. Every
//! resource descriptor becomes an atomic pair of nodes joined by a
//! `SCAN_SOURCE_NODE` provenance edge; every relationship fact becomes
//! two mirrored edges, one per subgraph. All writes go through a
//! [`ScanSession`], which pins the tenant, the target layer and the
//! tenant's abstractor for one discovery run.
//!
//! # Core Concepts
//!
//! - [`ScanSession`]: one discovery run; owns the [`PairIndex`] that
//!   maps original resource ids to their written node pairs.
//! - [`DualNodeWriter`]: screens properties, derives the abstracted id
//!   and twin properties, and commits the pair in one transaction.
//! - [`RelationshipDuplicator`]: resolves endpoints through the pair
//!   index and mirrors the edge into both subgraphs atomically.
//!
//! # Example
//!
//! ```rust,ignore
//! let session = Arc::new(ScanSession::new(tenant, layer, abstractor));
//! let writer = DualNodeWriter::new(store.clone(), session.clone());
//! writer.write_resource(vm_descriptor).await?;
//!
//! let links = RelationshipDuplicator::new(store, session);
//! links.link(RelationshipFact::new(vnet_id, vm_id, "CONTAINS")).await?;
//! ```

#![warn(unreachable_pub)]

mod descriptor;
mod error;
mod relationships;
mod rewrite;
mod screen;
mod session;
mod writer;

pub use descriptor::{RelationshipFact, ResourceDescriptor};
pub use error::IngestError;
pub use relationships::{LinkReceipt, RelationshipDuplicator};
pub use rewrite::rewrite_identifiers;
pub use screen::{screen_properties, RejectedProperty};
pub use session::{PairEntry, PairIndex, ScanSession, SessionId};
pub use writer::{BatchReport, DualNodeWriter, ItemOutcome, PairReceipt, DEFAULT_CONCURRENCY};

/// Crate version, from the build.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
