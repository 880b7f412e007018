//! Error types for seeding and abstraction

use doppel_graph::TenantId;

/// Seed vault and abstraction failures
#[derive(Debug, thiserror::Error)]
pub enum AbstractError {
    /// Attempt to replace an existing tenant seed with different bytes
    ///
    /// Seeds are immutable once created: replacing one would silently
    /// re-identify every abstracted id derived from it.
    #[error("tenant {tenant} already holds a different seed; seeds are immutable")]
    SeedImmutable {
        /// Tenant whose seed was targeted
        tenant: TenantId,
    },

    /// Seed material with the wrong byte length
    #[error("seed must be 32 bytes, got {found}")]
    InvalidSeedLength {
        /// Bytes actually provided
        found: usize,
    },

    /// Seed hex string failed to decode
    #[error("seed is not valid hex: {0}")]
    MalformedHex(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_constraint() {
        let err = AbstractError::InvalidSeedLength { found: 16 };
        assert_eq!(err.to_string(), "seed must be 32 bytes, got 16");
    }
}
