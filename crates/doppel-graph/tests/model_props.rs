use doppel_graph::{LayerId, NodeKey, NodeKind, RelType};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_layer_id_validation_never_panics(name in ".*") {
        // Accept or reject, never panic; accepted names validate again
        // unchanged.
        if let Ok(layer) = LayerId::new(name.clone()) {
            prop_assert_eq!(layer.as_str(), name.as_str());
            prop_assert!(LayerId::new(layer.as_str()).is_ok());
        }
    }

    #[test]
    fn prop_conforming_layer_names_are_accepted(
        name in "[a-zA-Z0-9][a-zA-Z0-9_.-]{0,63}"
    ) {
        let layer = LayerId::new(name.clone());
        prop_assert!(layer.is_ok(), "{name:?} should be accepted");
        let layer = layer.unwrap();
        let json = serde_json::to_string(&layer).unwrap();
        let back: LayerId = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(layer, back);
    }

    #[test]
    fn prop_rel_type_wire_names_round_trip(name in "[A-Z][A-Z_]{0,30}") {
        let rel = RelType::from(name.as_str());
        prop_assert_eq!(rel.wire_name(), name.as_str());
        let again = RelType::from(rel.wire_name());
        prop_assert_eq!(rel, again);
    }

    #[test]
    fn prop_node_keys_separate_the_subgraphs(rid in "[ -~]{1,80}") {
        let layer = LayerId::default_layer();
        let original = NodeKey::new(layer.clone(), NodeKind::Original, rid.clone());
        let abstracted = NodeKey::new(layer, NodeKind::Abstracted, rid);
        // Same resource id on both sides must never collide as an upsert key.
        prop_assert_ne!(original, abstracted);
    }
}
