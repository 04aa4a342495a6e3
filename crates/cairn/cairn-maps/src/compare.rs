use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// `true` when the two mappings differ in size or in any entry.
pub fn differs<K, V, S>(a: &HashMap<K, V, S>, b: &HashMap<K, V, S>) -> bool
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    a.len() != b.len() || a.iter().any(|(k, v)| b.get(k) != Some(v))
}
