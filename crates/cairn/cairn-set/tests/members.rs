use cairn_codec::Json;
use cairn_events::Marshal;
use cairn_set::{Members, RigidSet, Set};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn shared_set_collects_from_many_threads() {
    let set = Arc::new(Set::<u32>::new().safe());

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                set.add((0..100).map(|i| i * 4 + t));
                set.remove((0..100).filter(|i| i % 10 == 0).map(|i| i * 4 + t));
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(set.len(), 360);
    assert!(!set.contains(&0));
    assert!(set.contains(&5));
}

#[test]
fn embedded_set_round_trips_through_json() {
    let set = Set::<String>::from_iter(["a".to_string(), "b".to_string()]);
    let bytes = set.marshal::<Json>().unwrap();

    let back = Set::<String>::new();
    back.unmarshal::<Json>(&bytes).unwrap();
    let mut members = back.list();
    members.sort();
    assert_eq!(members, ["a", "b"]);
}

fn count<M: Members<u8>>(m: &M) -> usize {
    m.len()
}

#[test]
fn members_trait_spans_wrappers() {
    let set = Set::<u8>::from_iter([1, 2, 3]);
    assert_eq!(count(&set), 3);
    assert_eq!(count(&Some(&set)), 3);
    assert_eq!(count(&None::<Set<u8>>), 0);
}

proptest! {
    #[test]
    fn rigid_set_is_bounded_and_unique(
        capacity in 1usize..16,
        values in proptest::collection::vec(0u8..24, 0..128),
    ) {
        let r = RigidSet::<u8>::new(capacity);
        for v in &values {
            r.add([*v]);
            let all = r.get_all();
            prop_assert!(all.len() <= capacity);
            let distinct: HashSet<_> = all.iter().collect();
            prop_assert_eq!(distinct.len(), all.len());
            prop_assert!(r.contains(v));
        }
    }
}
