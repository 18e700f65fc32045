// tests/property_order.rs

use proptest::prelude::*;
use scenepipe::order::{OrderKey, WildcardResolver};

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (0u64..50).prop_map(|n| n.to_string()),
        1 => "[a-z]{1,3}",
    ]
}

fn key_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(segment(), 1..5).prop_map(|segs| segs.join("."))
}

proptest! {
    #[test]
    fn ordering_is_total_and_consistent(a in key_text(), b in key_text(), c in key_text()) {
        let (ka, kb, kc) = (
            OrderKey::parse(&a).unwrap(),
            OrderKey::parse(&b).unwrap(),
            OrderKey::parse(&c).unwrap(),
        );

        // antisymmetry
        prop_assert_eq!(ka.cmp(&kb), kb.cmp(&ka).reverse());
        // transitivity
        if ka <= kb && kb <= kc {
            prop_assert!(ka <= kc);
        }
        // display round-trips through parse
        prop_assert_eq!(OrderKey::parse(&ka.to_string()).unwrap(), ka);
    }

    #[test]
    fn repeated_wildcards_yield_strictly_increasing_keys(prefix in key_text(), n in 1usize..12) {
        let mut resolver = WildcardResolver::new();
        let wild = OrderKey::parse(&format!("{prefix}.+")).unwrap();

        let mut previous: Option<OrderKey> = None;
        for _ in 0..n {
            let resolved = resolver.resolve(&wild).unwrap();
            prop_assert!(!resolved.has_wildcard());
            if let Some(prev) = &previous {
                prop_assert!(prev < &resolved);
            }
            previous = Some(resolved);
        }
    }
}
