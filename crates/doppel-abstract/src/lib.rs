//! Tenant seeding and deterministic ID abstraction
//!
//! # Core Concepts
//!
//! - [`SeedVault`]: race-safe per-tenant 256-bit seeds, immutable once set
//! - [`AbstractionSeed`]: secret key material; `Debug` redacts, only
//!   [`AbstractionSeed::fingerprint`] is loggable
//! - [`IdAbstractor`]: keyed-hash pseudonyms `"{type_prefix}-{token}"`,
//!   memoized, collision-aware
//! - [`type_prefix`]: cloud resource type to prefix taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use doppel_abstract::{SeedVault, IdAbstractor};
//!
//! let vault = SeedVault::new();
//! let abstractor = IdAbstractor::new(vault.get_or_create(tenant));
//!
//! // Deterministic under the tenant seed: "vm-3f9c21ab04de"
//! let id = abstractor.abstract_id("Microsoft.Compute/virtualMachines", raw_id);
//! ```

#![warn(unreachable_pub)]

mod abstractor;
mod error;
mod seed;
mod taxonomy;

pub use abstractor::{AbstractedId, IdAbstractor, TOKEN_LEN};
pub use error::AbstractError;
pub use seed::{AbstractionSeed, SeedVault, SEED_LEN};
pub use taxonomy::{type_prefix, DEFAULT_PREFIX};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
