//! Layer lifecycle for the dual graph.
//!
//! Layers partition a tenant's graph into independent workspaces. This
//! crate moves whole layers around: isolated copies with fresh element
//! ids, checksummed JSON archives, validated restores with rollback,
//! and protected removal. Operations take advisory per-layer locks and
//! fail fast when a layer is already being worked on.
//!
//! # Core Concepts
//!
//! - [`LayerLifecycleManager`]: copy, archive, restore, remove, protect.
//! - [`LayerArchive`]: self-contained schema-versioned snapshot; current
//!   format is `2.0` with a mandatory SHA-256 checksum.
//! - [`FileArchiveStore`]: one JSON document per archive on disk.
//!
//! # Example
//!
//! ```rust,ignore
//! let lifecycle = LayerLifecycleManager::new(store);
//! let archive = lifecycle.archive_layer(tenant, &layer).await?;
//! FileArchiveStore::new("/var/lib/doppel/archives").save(&archive).await?;
//!
//! lifecycle.restore_layer(tenant, &archive, &scratch).await?;
//! ```

#![warn(unreachable_pub)]

mod archive;
mod error;
mod lifecycle;
mod locks;

pub use archive::{
    validate_archive, ArchiveCheck, ArchivedNode, ArchivedRel, EndpointRef, FileArchiveStore,
    LayerArchive, ARCHIVE_SCHEMA_VERSION, LEGACY_SCHEMA_VERSION,
};
pub use error::{ArchiveSchemaError, LayerError};
pub use lifecycle::{CopyReport, LayerLifecycleManager, RestoreReport, DEFAULT_CHUNK_SIZE};

/// Crate version, from the build.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
