//! Structural audits for the dual graph.
//!
//! After ingestion the Original and Abstracted subgraphs must be mirror
//! images joined by provenance edges. [`TopologyValidator`] verifies
//! that from the outside: balanced node and relationship counts, no
//! orphaned halves of a pair, and edge-level isomorphism computed in
//! one linear pass through the provenance map.
//!
//! ```rust,ignore
//! let validator = TopologyValidator::new(store);
//! let audit = validator.audit(tenant, &layer).await?;
//! if !audit.is_consistent() {
//!     eprintln!("{}", serde_json::to_string_pretty(&audit)?);
//! }
//! ```

#![warn(unreachable_pub)]

mod validator;

pub use validator::{
    EdgeWitness, IsomorphismCheck, NodeRef, OrphanCheck, ProvenanceDup, TopologyAudit,
    TopologyValidator,
};

/// Crate version, from the build.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
