//! Tenant seeds and the vault that owns them
//!
//! A seed is 256 bits from the OS RNG, created on first use per tenant and
//! immutable afterwards. The raw bytes never leave this crate: the seed
//! does not implement `Serialize`, its `Debug` output is redacted, and the
//! only loggable handle is [`AbstractionSeed::fingerprint`].

use crate::error::AbstractError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use doppel_graph::TenantId;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Seed length in bytes (256 bits)
pub const SEED_LEN: usize = 32;

/// Per-tenant secret keying the abstraction hash
#[derive(Clone, PartialEq, Eq)]
pub struct AbstractionSeed([u8; SEED_LEN]);

impl AbstractionSeed {
    /// Generate a fresh seed from the OS RNG
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wrap existing seed material
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode seed material from hex (escrow import path)
    ///
    /// # Errors
    /// Returns [`AbstractError::MalformedHex`] for non-hex input and
    /// [`AbstractError::InvalidSeedLength`] for any length other than 32
    /// bytes.
    pub fn from_hex(encoded: &str) -> Result<Self, AbstractError> {
        let raw = hex::decode(encoded)?;
        let len = raw.len();
        let bytes: [u8; SEED_LEN] = raw
            .try_into()
            .map_err(|_| AbstractError::InvalidSeedLength { found: len })?;
        Ok(Self(bytes))
    }

    /// Loggable one-way handle: hex of the first 8 bytes of the seed's
    /// blake3 hash
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(&blake3::hash(&self.0).as_bytes()[..8])
    }

    /// Raw key material for the keyed hash; crate-internal on purpose
    #[inline]
    pub(crate) fn key(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl fmt::Debug for AbstractionSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AbstractionSeed(fp:{})", self.fingerprint())
    }
}

/// Race-safe store of per-tenant seeds
///
/// First `get_or_create` for a tenant wins; every concurrent caller gets
/// the same seed back. There is no rotation and no removal.
#[derive(Debug, Default)]
pub struct SeedVault {
    seeds: DashMap<TenantId, AbstractionSeed>,
}

impl SeedVault {
    /// Create an empty vault
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the tenant's seed, creating one on first use
    pub fn get_or_create(&self, tenant: TenantId) -> AbstractionSeed {
        match self.seeds.entry(tenant) {
            Entry::Occupied(slot) => slot.get().clone(),
            Entry::Vacant(slot) => {
                let seed = AbstractionSeed::generate();
                tracing::info!(
                    tenant = %tenant,
                    fingerprint = %seed.fingerprint(),
                    "created abstraction seed"
                );
                slot.insert(seed.clone());
                seed
            }
        }
    }

    /// Fetch the tenant's seed without creating one
    #[must_use]
    pub fn get(&self, tenant: TenantId) -> Option<AbstractionSeed> {
        self.seeds.get(&tenant).map(|s| s.clone())
    }

    /// Install a seed restored from escrow
    ///
    /// Importing the bytes already stored is an idempotent no-op.
    ///
    /// # Errors
    /// Returns [`AbstractError::SeedImmutable`] when the tenant already
    /// holds different seed material.
    pub fn import(&self, tenant: TenantId, seed: AbstractionSeed) -> Result<(), AbstractError> {
        match self.seeds.entry(tenant) {
            Entry::Occupied(slot) => {
                if *slot.get() == seed {
                    Ok(())
                } else {
                    Err(AbstractError::SeedImmutable { tenant })
                }
            }
            Entry::Vacant(slot) => {
                tracing::info!(
                    tenant = %tenant,
                    fingerprint = %seed.fingerprint(),
                    "imported abstraction seed"
                );
                slot.insert(seed);
                Ok(())
            }
        }
    }

    /// Number of tenants holding a seed
    #[must_use]
    pub fn tenants(&self) -> usize {
        self.seeds.len()
    }
}
