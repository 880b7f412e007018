use doppel_abstract::{AbstractionSeed, IdAbstractor, TOKEN_LEN};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_abstraction_is_deterministic(
        seed in proptest::array::uniform32(any::<u8>()),
        original in "[ -~]{1,120}",
        resource_type in "[A-Za-z./]{1,60}",
    ) {
        let a = IdAbstractor::new(AbstractionSeed::from_bytes(seed));
        let b = IdAbstractor::new(AbstractionSeed::from_bytes(seed));
        prop_assert_eq!(
            a.abstract_id(&resource_type, &original),
            b.abstract_id(&resource_type, &original)
        );
    }

    #[test]
    fn prop_distinct_seeds_give_distinct_tokens(
        seed_a in proptest::array::uniform32(any::<u8>()),
        seed_b in proptest::array::uniform32(any::<u8>()),
        original in "[ -~]{1,120}",
    ) {
        prop_assume!(seed_a != seed_b);
        let a = IdAbstractor::new(AbstractionSeed::from_bytes(seed_a));
        let b = IdAbstractor::new(AbstractionSeed::from_bytes(seed_b));
        // 48-bit tokens: a chance equality over the test corpus would be
        // a real finding, not flakiness.
        prop_assert_ne!(
            a.abstract_id("virtualMachines", &original),
            b.abstract_id("virtualMachines", &original)
        );
    }

    #[test]
    fn prop_fresh_tokens_have_the_documented_shape(
        seed in proptest::array::uniform32(any::<u8>()),
        original in "[ -~]{1,120}",
    ) {
        let abstractor = IdAbstractor::new(AbstractionSeed::from_bytes(seed));
        let id = abstractor.abstract_id("virtualMachines", &original);
        let (prefix, token) = id.as_str().split_once('-').unwrap();
        prop_assert_eq!(prefix, "vm");
        prop_assert_eq!(token.len(), TOKEN_LEN);
        prop_assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn prop_tokens_never_echo_the_original(
        seed in proptest::array::uniform32(any::<u8>()),
        // Letters outside the hex alphabet cannot appear in a token.
        original in "[g-z]{4,40}",
    ) {
        let abstractor = IdAbstractor::new(AbstractionSeed::from_bytes(seed));
        let id = abstractor.abstract_id("virtualMachines", &original);
        prop_assert!(!id.as_str().contains(&original));
    }

    #[test]
    fn prop_memoization_never_changes_an_answer(
        seed in proptest::array::uniform32(any::<u8>()),
        originals in proptest::collection::vec("[ -~]{1,60}", 1..20),
    ) {
        let abstractor = IdAbstractor::new(AbstractionSeed::from_bytes(seed));
        let first: Vec<_> = originals
            .iter()
            .map(|o| abstractor.abstract_id("disks", o))
            .collect();
        let second: Vec<_> = originals
            .iter()
            .map(|o| abstractor.abstract_id("disks", o))
            .collect();
        prop_assert_eq!(first, second);
    }
}
