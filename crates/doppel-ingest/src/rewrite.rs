//! Identifier rewriting for abstracted property bags.
//!
//! The abstracted copy of a resource must not leak customer identifiers
//! through its properties. Strings shaped like ARM resource paths are
//! rewritten segment by segment, and values stored under id-bearing keys
//! (`id`, `subnetId`, `principal_id`, ...) are replaced with derived
//! tokens. Everything else passes through untouched so the abstracted
//! node keeps the same shape as the original.

use doppel_abstract::{IdAbstractor, DEFAULT_PREFIX};
use doppel_graph::PropertyBag;
use serde_json::Value;

/// Produce the abstracted twin of a screened property bag.
///
/// Rewrites are applied recursively through arrays and nested objects;
/// the key of the nearest enclosing object decides whether a plain
/// string is treated as an identifier.
pub fn rewrite_identifiers(abstractor: &IdAbstractor, properties: PropertyBag) -> PropertyBag {
    properties
        .into_iter()
        .map(|(key, value)| {
            let rewritten = rewrite_value(abstractor, &key, value);
            (key, rewritten)
        })
        .collect()
}

fn rewrite_value(abstractor: &IdAbstractor, key: &str, value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(rewrite_string(abstractor, key, text)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rewrite_value(abstractor, key, item))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(nested_key, nested)| {
                    let rewritten = rewrite_value(abstractor, &nested_key, nested);
                    (nested_key, rewritten)
                })
                .collect(),
        ),
        other => other,
    }
}

fn rewrite_string(abstractor: &IdAbstractor, key: &str, text: String) -> String {
    if text.starts_with("/subscriptions/") {
        return abstractor.abstract_path(&text);
    }
    if is_id_key(key) {
        return abstractor.abstract_with_prefix(DEFAULT_PREFIX, &text).into();
    }
    text
}

/// Keys that carry raw identifiers: `id` itself, camel-case `...Id`,
/// upper-case `...ID`, and snake-case `..._id`. Plain words that merely
/// end in "id" ("valid", "invalid") are not identifiers.
fn is_id_key(key: &str) -> bool {
    key == "id" || key.ends_with("Id") || key.ends_with("ID") || key.ends_with("_id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use doppel_abstract::AbstractionSeed;
    use serde_json::json;

    fn abstractor() -> IdAbstractor {
        IdAbstractor::new(AbstractionSeed::from_bytes([7u8; 32]))
    }

    fn bag(value: Value) -> PropertyBag {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn arm_paths_are_rewritten_wherever_they_appear() {
        let out = rewrite_identifiers(
            &abstractor(),
            bag(json!({
                "subnetRef": "/subscriptions/abc-123/resourceGroups/prod-rg/providers/Microsoft.Network/virtualNetworks/corp-net/subnets/web",
            })),
        );
        let rewritten = out["subnetRef"].as_str().unwrap();
        assert!(rewritten.starts_with("/subscriptions/sub-"));
        assert!(!rewritten.contains("prod-rg"));
        assert!(!rewritten.contains("corp-net"));
    }

    #[test]
    fn id_keys_are_rewritten_and_names_survive() {
        let out = rewrite_identifiers(
            &abstractor(),
            bag(json!({
                "principalId": "11111111-2222-3333-4444-555555555555",
                "name": "orders-vm",
            })),
        );
        let principal = out["principalId"].as_str().unwrap();
        assert!(principal.starts_with("resource-"));
        assert_eq!(out["name"], json!("orders-vm"));
    }

    #[test]
    fn id_key_detection_skips_plain_words() {
        assert!(is_id_key("id"));
        assert!(is_id_key("subnetId"));
        assert!(is_id_key("tenant_id"));
        assert!(is_id_key("resourceID"));
        assert!(!is_id_key("valid"));
        assert!(!is_id_key("uuid"));
        assert!(!is_id_key("name"));
    }

    #[test]
    fn nested_objects_and_arrays_are_walked() {
        let out = rewrite_identifiers(
            &abstractor(),
            bag(json!({
                "ipConfigurations": [
                    { "subnet_id": "snet-raw-id", "primary": true },
                ],
                "tags": { "env": "prod" },
            })),
        );
        let configs = out["ipConfigurations"].as_array().unwrap();
        let subnet = configs[0]["subnet_id"].as_str().unwrap();
        assert!(subnet.starts_with("resource-"));
        assert_eq!(configs[0]["primary"], json!(true));
        assert_eq!(out["tags"]["env"], json!("prod"));
    }

    #[test]
    fn rewrites_are_deterministic() {
        let first = rewrite_identifiers(&abstractor(), bag(json!({ "diskId": "disk-raw" })));
        let second = rewrite_identifiers(&abstractor(), bag(json!({ "diskId": "disk-raw" })));
        assert_eq!(first, second);
    }
}
