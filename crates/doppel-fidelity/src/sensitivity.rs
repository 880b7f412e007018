//! Property-name sensitivity classification.
//!
//! Classification is purely name-based and deliberately greedy: a
//! property called `adminPasswordBackup` is credential material even
//! though no cloud API documents it. Values are never inspected here;
//! the redaction layer decides what to do with a classified property.

use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::Serialize;

/// How much a property name reveals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Credential material: never shown except under explicit opt-out.
    Credential,
    /// Mixed structural fields (connection strings, SAS URLs) that embed
    /// credentials next to host information.
    Structural,
    /// Ordinary descriptive data.
    Plain,
}

static CREDENTIAL_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?i)password",
        r"(?i)passwd",
        r"(?i)\bpwd\b|pwd$|^pwd",
        r"(?i)secret",
        r"(?i)token",
        r"(?i)credential",
        r"(?i)certificate",
        r"(?i)private[_-]?key",
        r"(?i)access[_-]?key",
        r"(?i)account[_-]?key",
        r"(?i)api[_-]?key",
        r"(?i)shared[_-]?key",
        r"(?i)client[_-]?secret",
        r"(?i)\bsas\b|sas[_-]?(key|url|uri)",
    ])
    .unwrap_or_else(|e| panic!("credential pattern set is invalid: {e}"))
});

static STRUCTURAL_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([r"(?i)connection[_-]?string"])
        .unwrap_or_else(|e| panic!("structural pattern set is invalid: {e}"))
});

/// Classify a property by name.
#[must_use]
pub fn classify(property_name: &str) -> Sensitivity {
    if CREDENTIAL_PATTERNS.is_match(property_name) {
        Sensitivity::Credential
    } else if STRUCTURAL_PATTERNS.is_match(property_name) {
        Sensitivity::Structural
    } else {
        Sensitivity::Plain
    }
}

/// Whether a property name matches any sensitive pattern.
#[inline]
#[must_use]
pub fn is_sensitive(property_name: &str) -> bool {
    classify(property_name) != Sensitivity::Plain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_names_classify_as_credential() {
        for name in [
            "adminPassword",
            "ADMIN_PASSWORD",
            "passwd",
            "sshPrivateKey",
            "private_key",
            "clientSecret",
            "storageAccountKey",
            "apiKey",
            "sasToken",
            "authToken",
            "tlsCertificate",
            "dbCredentials",
        ] {
            assert_eq!(classify(name), Sensitivity::Credential, "{name}");
        }
    }

    #[test]
    fn connection_strings_are_structural() {
        assert_eq!(classify("connectionString"), Sensitivity::Structural);
        assert_eq!(classify("connection_string"), Sensitivity::Structural);
        assert_eq!(classify("sqlConnectionString"), Sensitivity::Structural);
    }

    #[test]
    fn ordinary_names_are_plain() {
        for name in ["name", "location", "skuName", "osType", "vmSize", "tags"] {
            assert_eq!(classify(name), Sensitivity::Plain, "{name}");
        }
    }

    #[test]
    fn greedy_matching_catches_compounds() {
        assert!(is_sensitive("adminPasswordBackup"));
        assert!(is_sensitive("legacyApiKeyRotated"));
        assert!(!is_sensitive("passideration"));
    }
}
