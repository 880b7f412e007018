//! Fidelity comparison between two layers of the dual graph.
//!
//! After a copy, an archive restore, or a rescan, this crate answers the
//! question "did we lose anything?". It joins the resources of two layers
//! by identity, compares them property by property, and classifies every
//! resource. Identity resolution is provenance-first; a heuristic
//! (type, name, location) fallback covers graphs whose provenance edges
//! were lost, at degraded confidence.
//!
//! Reports redact sensitive values at render time. Drift detection always
//! runs on the raw values, so a rotated password still reads as drift
//! while the report shows only `[REDACTED]` on both sides.
//!
//! # Core Concepts
//!
//! - [`FidelityComparator`]: loads both sides and produces a
//!   [`FidelityReport`] with per-resource [`Classification`]s.
//! - [`RedactionLevel`]: `FULL` (default), `MINIMAL`, or `NONE`.
//! - [`FidelityMetrics`]: counts plus fidelity / drift percentages.
//! - [`FidelityHistory`]: JSON-lines log of run summaries.
//!
//! # Example
//!
//! ```rust,ignore
//! let comparator = FidelityComparator::new(store);
//! let source = LayerSelector::original(tenant, baseline);
//! let target = LayerSelector::original(tenant, restored);
//!
//! let report = comparator.compare(&source, &target).await?;
//! println!("{}", report.render_console());
//! ```

#![warn(unreachable_pub)]

mod compare;
mod error;
mod history;
mod metrics;
mod redaction;
mod report;
mod sensitivity;

pub use compare::{
    FidelityComparator, FidelityReport, LayerSelector, MatchBasis, PropertyDiff, ResourceEntry,
};
pub use error::FidelityError;
pub use history::{FidelityHistory, HistoryEntry};
pub use metrics::{ClassCounts, Classification, FidelityMetrics};
pub use redaction::{render_value, RedactionLevel, REDACTED_MARKER};
pub use sensitivity::{classify, is_sensitive, Sensitivity};

/// Crate version, from the build.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
