//! Property injection screen
//!
//! Discovery payloads are untrusted. A property whose key or nested
//! string values carry traversal sequences, script payloads or raw
//! control characters is dropped from the write; the rest of the
//! resource is ingested normally. Rejections are reported per property,
//! never as a failure of the whole write.

use doppel_graph::PropertyBag;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A property dropped by the screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedProperty {
    /// Top-level property name
    pub name: String,
    /// What the screen found
    pub reason: String,
}

fn poisoned_text(text: &str) -> Option<&'static str> {
    if text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\t' | '\r'))
    {
        return Some("control character");
    }
    if text.contains("../") || text.contains("..\\") {
        return Some("path traversal sequence");
    }
    let lowered = text.to_ascii_lowercase();
    if lowered.contains("<script") || lowered.contains("javascript:") {
        return Some("script payload");
    }
    None
}

fn poisoned_value(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(s) => poisoned_text(s),
        Value::Array(items) => items.iter().find_map(poisoned_value),
        Value::Object(map) => map
            .iter()
            .find_map(|(k, v)| poisoned_text(k).or_else(|| poisoned_value(v))),
        _ => None,
    }
}

/// Split a property bag into accepted properties and screen rejections
#[must_use]
pub fn screen_properties(properties: PropertyBag) -> (PropertyBag, Vec<RejectedProperty>) {
    let mut accepted = PropertyBag::new();
    let mut rejected = Vec::new();
    for (name, value) in properties {
        if let Some(reason) = poisoned_text(&name).or_else(|| poisoned_value(&value)) {
            rejected.push(RejectedProperty {
                name,
                reason: reason.to_string(),
            });
        } else {
            accepted.insert(name, value);
        }
    }
    (accepted, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(pairs: &[(&str, Value)]) -> PropertyBag {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn clean_properties_pass_through() {
        let (accepted, rejected) = screen_properties(bag(&[
            ("name", json!("web-01")),
            ("size", json!("Standard_D2s_v3")),
            ("tags", json!({"env": "prod"})),
        ]));
        assert_eq!(accepted.len(), 3);
        assert!(rejected.is_empty());
    }

    #[test]
    fn traversal_sequences_are_rejected() {
        let (accepted, rejected) =
            screen_properties(bag(&[("path", json!("../../etc/passwd")), ("ok", json!(1))]));
        assert_eq!(accepted.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].name, "path");
        assert_eq!(rejected[0].reason, "path traversal sequence");
    }

    #[test]
    fn script_payloads_are_rejected_case_insensitively() {
        let (_, rejected) = screen_properties(bag(&[
            ("a", json!("<SCRIPT>alert(1)</SCRIPT>")),
            ("b", json!("javascript:void(0)")),
        ]));
        assert_eq!(rejected.len(), 2);
        assert!(rejected.iter().all(|r| r.reason == "script payload"));
    }

    #[test]
    fn nested_values_are_walked() {
        let (accepted, rejected) = screen_properties(bag(&[(
            "config",
            json!({"inner": ["fine", {"deep": "..\\windows"}]}),
        )]));
        assert!(accepted.is_empty());
        assert_eq!(rejected[0].name, "config");
    }

    #[test]
    fn poisoned_keys_reject_the_property() {
        let (_, rejected) = screen_properties(bag(&[("..\\key", json!("value"))]));
        assert_eq!(rejected.len(), 1);
    }

    #[test]
    fn control_characters_are_rejected_but_whitespace_kept() {
        let (accepted, rejected) = screen_properties(bag(&[
            ("multiline", json!("line1\nline2\ttabbed")),
            ("poisoned", json!("null\u{0}byte")),
        ]));
        assert_eq!(accepted.len(), 1);
        assert!(accepted.contains_key("multiline"));
        assert_eq!(rejected[0].reason, "control character");
    }
}
