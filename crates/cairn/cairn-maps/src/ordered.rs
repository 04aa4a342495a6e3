use crate::map::{Commit, Iter, Map};
use crate::table::SortCache;
use cairn_channel::{CancelToken, Client, Hub, HubConfig};
use cairn_codec::Codec;
use cairn_events::{Error, Marshal, WatchMsg};
use cairn_sync::{LockPolicy, Locked, Unlocked};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Key ordering used by an [`OrderedMap`].
pub type Comparator<K> = Arc<dyn Fn(&K, &K) -> Ordering + Send + Sync>;

fn natural<K: Ord + 'static>() -> Comparator<K> {
    Arc::new(|a: &K, b: &K| a.cmp(b))
}

/// A [`Map`] whose `keys`/`values`/`iter`/`for_each` follow a comparator.
///
/// The sorted key list is built on the first ordered read after a mutation
/// and reused until the next one. Keys the comparator considers equal come
/// out in whatever order the backing `HashMap` enumerates them.
pub struct OrderedMap<K, V, L: LockPolicy = Unlocked> {
    map: Map<K, V, L>,
    compare: Comparator<K>,
}

impl<K: Ord + 'static, V, L: LockPolicy> OrderedMap<K, V, L> {
    /// Empty map ordered by `K`'s natural ascending order.
    pub fn new() -> Self {
        Self::with_comparator(natural())
    }

    pub fn from_map(entries: HashMap<K, V>) -> Self {
        Self::from_map_with(entries, natural())
    }
}

impl<K, V, L: LockPolicy> OrderedMap<K, V, L> {
    pub fn with_comparator(compare: Comparator<K>) -> Self {
        Self::from_map_with(HashMap::new(), compare)
    }

    pub fn from_map_with(entries: HashMap<K, V>, compare: Comparator<K>) -> Self {
        Self {
            map: Map::from_map(entries),
            compare,
        }
    }

    pub fn safe(self) -> OrderedMap<K, V, Locked> {
        OrderedMap {
            map: self.map.safe(),
            compare: self.compare,
        }
    }

    pub fn read_only(self) -> Self {
        Self {
            map: self.map.read_only(),
            compare: self.compare,
        }
    }

    pub fn freeze(&self) {
        self.map.freeze();
    }

    pub fn is_read_only(&self) -> bool {
        self.map.is_read_only()
    }

    pub fn is_safe(&self) -> bool {
        self.map.is_safe()
    }

    pub fn hub(&self) -> Option<&Hub<WatchMsg<K, V>>> {
        self.map.hub()
    }

    pub fn watch(&self) -> Option<Client<WatchMsg<K, V>>> {
        self.map.watch()
    }

    pub fn unwatch(&self, client: Client<WatchMsg<K, V>>) {
        self.map.unwatch(client);
    }

    /// The unordered map underneath.
    pub fn as_map(&self) -> &Map<K, V, L> {
        &self.map
    }
}

impl<K, V, L> OrderedMap<K, V, L>
where
    K: Clone + Send + 'static,
    V: Clone + Send + 'static,
    L: LockPolicy,
{
    pub fn eventful(self, cancel: &CancelToken, config: HubConfig) -> Self {
        Self {
            map: self.map.eventful(cancel, config),
            compare: self.compare,
        }
    }
}

impl<K: Eq + Hash, V, L: LockPolicy> OrderedMap<K, V, L> {
    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.exists(key)
    }

    pub fn get<Q>(&self, key: &Q) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Default + Clone,
    {
        self.map.get(key)
    }

    pub fn get_full<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.map.get_full(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn set(&self, key: K, value: V)
    where
        K: Clone,
        V: Clone,
    {
        self.map.set(key, value);
    }

    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q> + Clone,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.map.delete(key);
    }

    pub fn commit(&self) -> Option<Commit<'_, K, V, L>> {
        self.map.commit()
    }
}

impl<K: Eq + Hash + Clone, V, L: LockPolicy> OrderedMap<K, V, L> {
    fn sort(&self, entries: &HashMap<K, V>) -> SortCache<K> {
        let mut keys: Vec<K> = entries.keys().cloned().collect();
        keys.sort_by(|a, b| (self.compare)(a, b));
        SortCache::new(keys, 0)
    }

    pub fn keys(&self) -> Vec<K> {
        self.map.sorted(|e| self.sort(e)).sorted_keys().to_vec()
    }
}

impl<K: Eq + Hash + Clone, V: Clone, L: LockPolicy> OrderedMap<K, V, L> {
    pub fn values(&self) -> Vec<V> {
        let table = self.map.sorted(|e| self.sort(e));
        table.sorted_entries().map(|(_, v)| v.clone()).collect()
    }

    /// Calls `f` for every entry in key order. The walk runs over a snapshot,
    /// so `f` may write to this map.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for (k, v) in self.iter() {
            f(&k, &v);
        }
    }

    /// Snapshot of the entries in key order.
    pub fn iter(&self) -> Iter<K, V> {
        let table = self.map.sorted(|e| self.sort(e));
        Iter::new(
            table
                .sorted_entries()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Unlocked, writable, silent duplicate sharing this map's comparator.
    pub fn copy(&self) -> OrderedMap<K, V> {
        OrderedMap {
            map: self.map.copy(),
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<K, V, L> Marshal for OrderedMap<K, V, L>
where
    K: Eq + Hash + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
    L: LockPolicy,
{
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error> {
        self.map.marshal::<C>()
    }

    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error> {
        self.map.unmarshal::<C>(bytes)
    }
}

impl<K: Eq + Hash + Serialize, V: Serialize, L: LockPolicy> Serialize for OrderedMap<K, V, L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.map.serialize(serializer)
    }
}

impl<'de, K, V, L> Deserialize<'de> for OrderedMap<K, V, L>
where
    K: Eq + Hash + Ord + Deserialize<'de> + 'static,
    V: Deserialize<'de>,
    L: LockPolicy,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashMap::deserialize(deserializer).map(Self::from_map)
    }
}

impl<K: Ord + 'static, V, L: LockPolicy> Default for OrderedMap<K, V, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Eq + Hash + 'static, V, L: LockPolicy> FromIterator<(K, V)> for OrderedMap<K, V, L> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, L: LockPolicy> fmt::Debug for OrderedMap<K, V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedMap").field("map", &self.map).finish()
    }
}

/// Like the [`Map`] rendering, but in key order.
impl<K, V, L> fmt::Display for OrderedMap<K, V, L>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: fmt::Display,
    L: LockPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.map.sorted(|e| self.sort(e));
        f.write_str("{")?;
        for (i, (k, v)) in table.sorted_entries().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        f.write_str("}")?;
        if self.is_safe() {
            f.write_str(" (safe)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn keys_follow_natural_order() {
        let m = OrderedMap::<String, u8>::new();
        for k in ["3", "1", "2"] {
            m.set(k.to_string(), 0);
        }
        assert_eq!(m.keys(), ["1", "2", "3"]);
    }

    #[test]
    fn custom_comparator_reverses() {
        let m = OrderedMap::<u32, &str>::with_comparator(Arc::new(|a: &u32, b: &u32| b.cmp(a)));
        m.set(1, "one");
        m.set(3, "three");
        m.set(2, "two");
        assert_eq!(m.keys(), [3, 2, 1]);
        assert_eq!(m.values(), ["three", "two", "one"]);
        assert_eq!(m.to_string(), "{3: three, 2: two, 1: one}");
    }

    #[test]
    fn sorted_view_is_reused_until_a_mutation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let compare: Comparator<u32> = Arc::new(move |a: &u32, b: &u32| {
            counter.fetch_add(1, AtomicOrdering::Relaxed);
            a.cmp(b)
        });
        let m = OrderedMap::<u32, ()>::from_map_with(
            (0..32).map(|k| (k, ())).collect(),
            compare,
        );

        m.keys();
        let after_first = calls.load(AtomicOrdering::Relaxed);
        assert!(after_first > 0);

        m.keys();
        m.values();
        m.iter().count();
        m.for_each(|_, _| {});
        assert_eq!(calls.load(AtomicOrdering::Relaxed), after_first);

        m.set(100, ());
        assert_eq!(m.keys().last(), Some(&100));
        assert!(calls.load(AtomicOrdering::Relaxed) > after_first);
    }

    #[test]
    fn delete_and_commit_invalidate() {
        let m = OrderedMap::<u32, u32>::from_iter([(2, 20), (1, 10)]).safe();
        assert_eq!(m.keys(), [1, 2]);

        m.delete(&1u32);
        assert_eq!(m.keys(), [2]);

        if let Some(mut entries) = m.commit() {
            entries.insert(0, 0);
        }
        assert_eq!(m.keys(), [0, 2]);
        let seen: Vec<_> = m.iter().collect();
        assert_eq!(seen, [(0, 0), (2, 20)]);
    }

    #[test]
    fn copy_keeps_the_comparator() {
        let m = OrderedMap::<i32, ()>::with_comparator(Arc::new(|a: &i32, b: &i32| b.cmp(a)));
        m.set(1, ());
        m.set(2, ());
        let c = m.copy();
        c.set(3, ());
        assert_eq!(c.keys(), [3, 2, 1]);
        assert_eq!(m.keys(), [2, 1]);
    }

    #[test]
    fn for_each_callback_may_write_back() {
        let m = OrderedMap::<u32, u32>::from_iter([(1, 1), (2, 2)]);
        let mut seen = Vec::new();
        m.for_each(|k, _| {
            seen.push(*k);
            m.set(*k + 10, 0);
        });
        assert_eq!(seen, [1, 2]);
        assert_eq!(m.keys(), [1, 2, 11, 12]);

        let locked = OrderedMap::<u32, u32>::from_iter([(1, 1), (2, 2)]).safe();
        locked.for_each(|k, _| locked.delete(k));
        assert!(locked.is_empty());
    }

    proptest! {
        #[test]
        fn keys_always_match_a_fresh_sort(
            first in proptest::collection::vec(any::<u16>(), 0..64),
            second in proptest::collection::vec(any::<u16>(), 0..16),
        ) {
            let m = OrderedMap::<u16, ()>::new();
            for k in &first {
                m.set(*k, ());
            }
            let mut expected: Vec<u16> = first.clone();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(m.keys(), expected.clone());

            for k in &second {
                m.set(*k, ());
            }
            expected.extend(&second);
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(m.keys(), expected);
        }
    }
}
