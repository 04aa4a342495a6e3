//! Fixtures shared by the criterion benches.

use cairn_maps::{Locked, Map, OrderedMap, WeightedMap, Weighted};

/// `key-00000`, `key-00001`, ...; fixed width so natural order matches index order.
pub fn keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("key-{i:05}")).collect()
}

pub fn filled_map(n: usize) -> Map<String, u64, Locked> {
    let map = Map::<String, u64>::new().safe();
    for (i, k) in keys(n).into_iter().enumerate() {
        map.set(k, i as u64);
    }
    map
}

pub fn filled_ordered(n: usize) -> OrderedMap<String, u64, Locked> {
    let map = OrderedMap::<String, u64>::new().safe();
    for (i, k) in keys(n).into_iter().enumerate() {
        map.set(k, i as u64);
    }
    map
}

/// Weights cycle through `groups` distinct values.
pub fn filled_weighted(n: usize, groups: u32) -> WeightedMap<String, u64, Locked> {
    let map = WeightedMap::<String, u64>::new().safe();
    for (i, k) in keys(n).into_iter().enumerate() {
        map.set_weighted(k, Weighted::new(i as u64, i as u32 % groups.max(1)));
    }
    map
}
