//! Redaction policy applied when rendering comparison results.
//!
//! Comparison itself always runs on raw values so drift detection stays
//! exact; redaction only governs what a report reveals. The functions
//! here are pure: sensitivity times redaction level in, rendered value
//! out.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sensitivity::{classify, Sensitivity};

/// Marker shown in place of a withheld value.
pub const REDACTED_MARKER: &str = "[REDACTED]";

/// How much sensitive detail a report may reveal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RedactionLevel {
    /// Sensitive values always render as the marker, drifted or not.
    #[default]
    Full,
    /// Credential material is withheld; structural fields keep their
    /// non-secret parts (hostnames survive, embedded keys do not).
    Minimal,
    /// Raw values, debugging only; the report is watermarked and the
    /// run is logged loudly.
    None,
}

impl RedactionLevel {
    /// Wire spelling, matching the serialized form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RedactionLevel::Full => "FULL",
            RedactionLevel::Minimal => "MINIMAL",
            RedactionLevel::None => "NONE",
        }
    }
}

impl std::fmt::Display for RedactionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Key=value` credential fragments inside connection strings and SAS
/// URLs.
static EMBEDDED_SECRET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(accountkey|accountsecret|sharedaccesskey|sharedaccesssignature|accesskey|password|pwd|secret|sig)=([^;&\s]*)",
    )
    .unwrap_or_else(|e| panic!("embedded secret pattern is invalid: {e}"))
});

/// Render one property value under a redaction policy.
///
/// Returns the value to display and whether anything was withheld.
/// Container values under a plain name are walked recursively, so a
/// credential nested three levels deep is still withheld.
#[must_use]
pub fn render_value(
    level: RedactionLevel,
    sensitivity: Sensitivity,
    value: &Value,
) -> (Value, bool) {
    match (level, sensitivity) {
        (RedactionLevel::None, _) => (value.clone(), false),
        (RedactionLevel::Full, Sensitivity::Credential | Sensitivity::Structural)
        | (RedactionLevel::Minimal, Sensitivity::Credential) => {
            (Value::String(REDACTED_MARKER.to_owned()), true)
        }
        (RedactionLevel::Minimal, Sensitivity::Structural) => scrub_embedded(value),
        (_, Sensitivity::Plain) => scrub_container(level, value),
    }
}

/// Walk arrays and objects, withholding any sensitively-named field
/// inside. Scalars pass through untouched.
fn scrub_container(level: RedactionLevel, value: &Value) -> (Value, bool) {
    match value {
        Value::Array(items) => {
            let mut changed = false;
            let rendered = items
                .iter()
                .map(|item| {
                    let (shown, withheld) = scrub_container(level, item);
                    changed |= withheld;
                    shown
                })
                .collect();
            (Value::Array(rendered), changed)
        }
        Value::Object(fields) => {
            let mut changed = false;
            let rendered = fields
                .iter()
                .map(|(name, nested)| {
                    let (shown, withheld) = render_value(level, classify(name), nested);
                    changed |= withheld;
                    (name.clone(), shown)
                })
                .collect();
            (Value::Object(rendered), changed)
        }
        _ => (value.clone(), false),
    }
}

/// Strip `Key=secret` fragments from a structural value, keeping the
/// rest intact. Non-string structural values are fully withheld.
fn scrub_embedded(value: &Value) -> (Value, bool) {
    match value {
        Value::String(text) => {
            let scrubbed = EMBEDDED_SECRET.replace_all(text, |caps: &regex::Captures<'_>| {
                format!("{}={REDACTED_MARKER}", &caps[1])
            });
            let changed = matches!(scrubbed, std::borrow::Cow::Owned(_));
            (Value::String(scrubbed.into_owned()), changed)
        }
        _ => (Value::String(REDACTED_MARKER.to_owned()), true),
    }
}
