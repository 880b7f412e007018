//! Deterministic ID abstraction
//!
//! An abstracted id is `"{type_prefix}-{token}"` where the token is the
//! hex of a blake3 keyed hash of the original id under the tenant seed,
//! truncated to [`TOKEN_LEN`] characters. Same seed and input always give
//! the same output; different tenants (different seeds) give unrelated
//! outputs; the original id is not recoverable from the token.
//!
//! One [`IdAbstractor`] serves one tenant/scan. It memoizes every
//! derivation and tracks which original claimed which abstracted id, so a
//! truncation collision is detected instead of silently merging two
//! resources: the colliding derivation widens the token to 24 chars and,
//! failing that, appends a numeric disambiguator, logging each step.

use crate::seed::AbstractionSeed;
use crate::taxonomy;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Token length in hex characters (48 bits)
pub const TOKEN_LEN: usize = 12;

/// Widened token length used after a collision
const WIDE_TOKEN_LEN: usize = 24;

/// A deterministic pseudonym for an original resource id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbstractedId(String);

impl AbstractedId {
    /// The id as a string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AbstractedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<AbstractedId> for String {
    fn from(id: AbstractedId) -> Self {
        id.0
    }
}

impl From<String> for AbstractedId {
    /// Rewrap an id read back from the store (pair-index hydration)
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Keyed-hash abstraction engine for one tenant/scan
pub struct IdAbstractor {
    seed: AbstractionSeed,
    /// `(prefix, original id)` -> derived id
    memo: DashMap<(String, String), AbstractedId>,
    /// derived id -> original id that owns it
    claims: DashMap<String, String>,
}

impl IdAbstractor {
    /// Build an abstractor over a tenant seed
    #[must_use]
    pub fn new(seed: AbstractionSeed) -> Self {
        Self {
            seed,
            memo: DashMap::new(),
            claims: DashMap::new(),
        }
    }

    /// Fingerprint of the seed in use, safe to log
    #[must_use]
    pub fn seed_fingerprint(&self) -> String {
        self.seed.fingerprint()
    }

    /// Abstract a resource id, deriving the prefix from its type
    #[must_use]
    pub fn abstract_id(&self, resource_type: &str, original_id: &str) -> AbstractedId {
        self.abstract_with_prefix(taxonomy::type_prefix(resource_type), original_id)
    }

    /// Abstract a value under an explicit prefix
    #[must_use]
    pub fn abstract_with_prefix(&self, prefix: &str, original: &str) -> AbstractedId {
        let memo_key = (prefix.to_string(), original.to_string());
        if let Some(hit) = self.memo.get(&memo_key) {
            return hit.clone();
        }
        let id = self.claim(prefix, original);
        self.memo.insert(memo_key, id.clone());
        id
    }

    /// Abstract an ARM-style path segment by segment
    ///
    /// Structural segments (`subscriptions`, `resourceGroups`,
    /// `providers`, namespaces, type names) survive verbatim; the value
    /// segments between them are abstracted with the prefix of their
    /// enclosing type. Callers route whole ids through
    /// [`IdAbstractor::abstract_id`] and only path-shaped values here; a
    /// string with no recognized markers passes through unchanged.
    #[must_use]
    pub fn abstract_path(&self, path: &str) -> String {
        enum Expect {
            Marker,
            Value(&'static str),
            ProviderNamespace,
            ProviderType,
            ProviderName,
        }

        let mut out: Vec<String> = Vec::new();
        let mut state = Expect::Marker;
        let mut last_type: Option<String> = None;
        for segment in path.split('/') {
            if segment.is_empty() {
                out.push(String::new());
                continue;
            }
            match state {
                Expect::Marker => {
                    let lowered = segment.to_ascii_lowercase();
                    state = match lowered.as_str() {
                        "subscriptions" => Expect::Value(taxonomy::type_prefix("subscriptions")),
                        "resourcegroups" => Expect::Value(taxonomy::type_prefix("resourceGroups")),
                        "providers" => Expect::ProviderNamespace,
                        _ => Expect::Marker,
                    };
                    out.push(segment.to_string());
                }
                Expect::Value(prefix) => {
                    out.push(self.abstract_with_prefix(prefix, segment).into());
                    state = Expect::Marker;
                }
                Expect::ProviderNamespace => {
                    out.push(segment.to_string());
                    state = Expect::ProviderType;
                }
                Expect::ProviderType => {
                    last_type = Some(segment.to_string());
                    out.push(segment.to_string());
                    state = Expect::ProviderName;
                }
                Expect::ProviderName => {
                    let prefix = last_type
                        .as_deref()
                        .map_or(taxonomy::DEFAULT_PREFIX, taxonomy::type_prefix);
                    out.push(self.abstract_with_prefix(prefix, segment).into());
                    // Child resources alternate type/name below this point.
                    state = Expect::ProviderType;
                }
            }
        }
        out.join("/")
    }

    /// Number of memoized derivations
    #[must_use]
    pub fn derivations(&self) -> usize {
        self.memo.len()
    }

    fn candidate(&self, prefix: &str, original: &str, len: usize) -> String {
        let hash = blake3::keyed_hash(self.seed.key(), original.as_bytes());
        let hex = hex::encode(hash.as_bytes());
        format!("{prefix}-{}", &hex[..len])
    }

    /// Record `candidate` as owned by `original`; false when another
    /// original already owns it
    fn try_claim(&self, candidate: &str, original: &str) -> bool {
        match self.claims.entry(candidate.to_string()) {
            Entry::Occupied(slot) => slot.get() == original,
            Entry::Vacant(slot) => {
                slot.insert(original.to_string());
                true
            }
        }
    }

    fn claim(&self, prefix: &str, original: &str) -> AbstractedId {
        let narrow = self.candidate(prefix, original, TOKEN_LEN);
        if self.try_claim(&narrow, original) {
            return AbstractedId(narrow);
        }

        let wide = self.candidate(prefix, original, WIDE_TOKEN_LEN);
        tracing::warn!(
            prefix,
            candidate = %narrow,
            "abstracted id collision, widening token"
        );
        if self.try_claim(&wide, original) {
            return AbstractedId(wide);
        }

        let mut n: u64 = 2;
        loop {
            let suffixed = format!("{wide}-{n}");
            tracing::warn!(
                prefix,
                candidate = %wide,
                disambiguator = n,
                "widened abstracted id still taken, appending disambiguator"
            );
            if self.try_claim(&suffixed, original) {
                return AbstractedId(suffixed);
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VM_TYPE: &str = "Microsoft.Compute/virtualMachines";

    fn fixed_abstractor() -> IdAbstractor {
        IdAbstractor::new(AbstractionSeed::from_bytes([9u8; 32]))
    }

    #[test]
    fn output_is_prefix_dash_twelve_hex() {
        let abstractor = fixed_abstractor();
        let id = abstractor.abstract_id(VM_TYPE, "/sub/1/vm/web-01");
        let (prefix, token) = id.as_str().split_once('-').unwrap();
        assert_eq!(prefix, "vm");
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_seed_same_input_same_output() {
        let a = fixed_abstractor();
        let b = fixed_abstractor();
        assert_eq!(
            a.abstract_id(VM_TYPE, "/sub/1/vm/web-01"),
            b.abstract_id(VM_TYPE, "/sub/1/vm/web-01")
        );
    }

    #[test]
    fn different_seeds_diverge() {
        let a = IdAbstractor::new(AbstractionSeed::from_bytes([1u8; 32]));
        let b = IdAbstractor::new(AbstractionSeed::from_bytes([2u8; 32]));
        assert_ne!(
            a.abstract_id(VM_TYPE, "/sub/1/vm/web-01"),
            b.abstract_id(VM_TYPE, "/sub/1/vm/web-01")
        );
    }

    #[test]
    fn derivations_are_memoized() {
        let abstractor = fixed_abstractor();
        let first = abstractor.abstract_id(VM_TYPE, "/sub/1/vm/web-01");
        let second = abstractor.abstract_id(VM_TYPE, "/sub/1/vm/web-01");
        assert_eq!(first, second);
        assert_eq!(abstractor.derivations(), 1);
    }

    #[test]
    fn output_never_contains_the_original_name() {
        let abstractor = fixed_abstractor();
        let id = abstractor.abstract_id(VM_TYPE, "prod-web-frontend-01");
        assert!(!id.as_str().contains("prod-web"));
    }

    #[test]
    fn collisions_widen_then_disambiguate() {
        let abstractor = fixed_abstractor();
        let narrow = abstractor.candidate("vm", "victim", TOKEN_LEN);
        abstractor.claims.insert(narrow, "squatter".to_string());

        let widened = abstractor.abstract_id(VM_TYPE, "victim");
        let wide = abstractor.candidate("vm", "victim", WIDE_TOKEN_LEN);
        assert_eq!(widened.as_str(), wide);

        // Stable on re-derivation.
        assert_eq!(abstractor.abstract_id(VM_TYPE, "victim"), widened);

        // Squat the wide candidate of another input as well.
        let narrow2 = abstractor.candidate("vm", "victim-2", TOKEN_LEN);
        let wide2 = abstractor.candidate("vm", "victim-2", WIDE_TOKEN_LEN);
        abstractor.claims.insert(narrow2, "squatter".to_string());
        abstractor.claims.insert(wide2.clone(), "squatter".to_string());

        let suffixed = abstractor.abstract_id(VM_TYPE, "victim-2");
        assert_eq!(suffixed.as_str(), format!("{wide2}-2"));
        assert_eq!(abstractor.abstract_id(VM_TYPE, "victim-2"), suffixed);
    }

    #[test]
    fn arm_path_keeps_structure_and_abstracts_values() {
        let abstractor = fixed_abstractor();
        let path = "/subscriptions/0000-1111/resourceGroups/prod-rg/providers/Microsoft.Compute/virtualMachines/web-01";
        let abstracted = abstractor.abstract_path(path);
        let parts: Vec<&str> = abstracted.split('/').collect();

        assert_eq!(parts[1], "subscriptions");
        assert!(parts[2].starts_with("sub-"));
        assert_eq!(parts[3], "resourceGroups");
        assert!(parts[4].starts_with("rg-"));
        assert_eq!(parts[5], "providers");
        assert_eq!(parts[6], "Microsoft.Compute");
        assert_eq!(parts[7], "virtualMachines");
        assert!(parts[8].starts_with("vm-"));
        assert!(!abstracted.contains("prod-rg"));
        assert!(!abstracted.contains("web-01"));
    }

    #[test]
    fn nested_child_resources_alternate() {
        let abstractor = fixed_abstractor();
        let path = "/subscriptions/S/resourceGroups/RG/providers/Microsoft.Network/virtualNetworks/vnet-prod/subnets/frontend";
        let abstracted = abstractor.abstract_path(path);
        let parts: Vec<&str> = abstracted.split('/').collect();

        assert_eq!(parts[7], "virtualNetworks");
        assert!(parts[8].starts_with("vnet-"));
        assert_eq!(parts[9], "subnets");
        assert!(parts[10].starts_with("subnet-"));
    }

    #[test]
    fn path_values_reuse_plain_derivations() {
        let abstractor = fixed_abstractor();
        let rg_direct = abstractor.abstract_with_prefix("rg", "prod-rg");
        let path = abstractor.abstract_path("/subscriptions/S/resourceGroups/prod-rg");
        assert!(path.ends_with(rg_direct.as_str()));
    }

    #[test]
    fn lowercase_markers_are_recognized() {
        let abstractor = fixed_abstractor();
        let abstracted = abstractor.abstract_path("/subscriptions/S/resourcegroups/prod-rg");
        assert!(!abstracted.contains("prod-rg"));
        assert!(abstracted.contains("/resourcegroups/"));
    }

    #[test]
    fn unmarked_strings_pass_through() {
        let abstractor = fixed_abstractor();
        assert_eq!(abstractor.abstract_path("plain-value"), "plain-value");
    }
}
