use crate::map::{Commit, Iter, Map};
use crate::table::{SortCache, Table};
use cairn_channel::{CancelToken, Client, Hub, HubConfig};
use cairn_codec::Codec;
use cairn_events::{Error, Marshal, WatchMsg, Weighted};
use cairn_sync::{LockPolicy, Locked, Unlocked};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::debug;

/// A map whose ordered reads go from the highest weight to the lowest.
///
/// Plain [`set`](WeightedMap::set) stores the value at weight 0. Weights are
/// priority metadata only: codecs carry bare values.
pub struct WeightedMap<K, V, L: LockPolicy = Unlocked> {
    map: Map<K, Weighted<V>, L>,
}

/// Members sharing one weight, yielded by [`WeightedMap::weight_iter`].
#[derive(Debug)]
pub struct WeightGroup<K, V> {
    weight: u32,
    entries: Iter<K, V>,
}

impl<K, V> WeightGroup<K, V> {
    #[inline]
    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }
}

impl<K, V> Iterator for WeightGroup<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

/// Groups of a weighted map, highest weight first.
#[derive(Debug)]
pub struct WeightGroups<K, V> {
    groups: std::vec::IntoIter<WeightGroup<K, V>>,
}

impl<K, V> Iterator for WeightGroups<K, V> {
    type Item = WeightGroup<K, V>;

    fn next(&mut self) -> Option<WeightGroup<K, V>> {
        self.groups.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.groups.size_hint()
    }
}

impl<K, V, L: LockPolicy> WeightedMap<K, V, L> {
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    pub fn from_map(entries: HashMap<K, Weighted<V>>) -> Self {
        Self {
            map: Map::from_map(entries),
        }
    }

    pub fn safe(self) -> WeightedMap<K, V, Locked> {
        WeightedMap {
            map: self.map.safe(),
        }
    }

    pub fn read_only(self) -> Self {
        Self {
            map: self.map.read_only(),
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

    pub fn hub(&self) -> Option<&Hub<WatchMsg<K, Weighted<V>>>> {
        self.map.hub()
    }

    pub fn watch(&self) -> Option<Client<WatchMsg<K, Weighted<V>>>> {
        self.map.watch()
    }

    pub fn unwatch(&self, client: Client<WatchMsg<K, Weighted<V>>>) {
        self.map.unwatch(client);
    }
}

impl<K: Eq + Hash, V, L: LockPolicy> WeightedMap<K, V, L> {
    /// Weight of each value is its position in `values`. Keys beyond the
    /// shorter of the two inputs are ignored.
    pub fn from_ranked(keys: impl IntoIterator<Item = K>, values: impl IntoIterator<Item = V>) -> Self {
        let entries = keys
            .into_iter()
            .zip(values)
            .zip(0u32..)
            .map(|((k, v), rank)| (k, Weighted::new(v, rank)))
            .collect();
        Self::from_map(entries)
    }
}

impl<K, V, L> WeightedMap<K, V, L>
where
    K: Clone + Send + 'static,
    V: Clone + Send + 'static,
    L: LockPolicy,
{
    pub fn eventful(self, cancel: &CancelToken, config: HubConfig) -> Self {
        Self {
            map: self.map.eventful(cancel, config),
        }
    }
}

impl<K: Eq + Hash, V, L: LockPolicy> WeightedMap<K, V, L> {
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
        self.get_full(key).unwrap_or_default()
    }

    pub fn get_full<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get_weighted(key).map(Weighted::into_value)
    }

    pub fn get_weighted<Q>(&self, key: &Q) -> Option<Weighted<V>>
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

    /// Stores `value` at the lowest weight.
    pub fn set(&self, key: K, value: V)
    where
        K: Clone,
        V: Clone,
    {
        self.map.set(key, Weighted::lowest(value));
    }

    pub fn set_weighted(&self, key: K, value: Weighted<V>)
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

    pub fn commit(&self) -> Option<Commit<'_, K, Weighted<V>, L>> {
        self.map.commit()
    }
}

/// Keys by descending weight, plus the number of distinct weights.
fn rank<K: Eq + Hash + Clone, V>(entries: &HashMap<K, Weighted<V>>) -> SortCache<K> {
    let weight = |k: &K| entries.get(k).map_or(0, |w| w.weight);

    let mut keys: Vec<K> = entries.keys().cloned().collect();
    keys.sort_unstable_by_key(|k| Reverse(weight(k)));
    let groups = keys.chunk_by(|a, b| weight(a) == weight(b)).count();
    SortCache::new(keys, groups)
}

impl<K: Eq + Hash + Clone, V, L: LockPolicy> WeightedMap<K, V, L> {
    pub fn keys(&self) -> Vec<K> {
        self.map.sorted(rank).sorted_keys().to_vec()
    }

    /// Number of distinct weights currently stored.
    pub fn weights(&self) -> usize {
        self.map.sorted(rank).groups()
    }
}

impl<K: Eq + Hash + Clone, V: Clone, L: LockPolicy> WeightedMap<K, V, L> {
    pub fn values(&self) -> Vec<V> {
        let table = self.map.sorted(rank);
        table.sorted_entries().map(|(_, w)| w.value.clone()).collect()
    }

    /// Calls `f` for every entry, highest weight first, over a snapshot.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for (k, v) in self.iter() {
            f(&k, &v);
        }
    }

    /// Snapshot of the entries, highest weight first.
    pub fn iter(&self) -> Iter<K, V> {
        let table = self.map.sorted(rank);
        Iter::new(
            table
                .sorted_entries()
                .map(|(k, w)| (k.clone(), w.value.clone()))
                .collect(),
        )
    }

    /// Snapshot split into one group per distinct weight, highest first.
    pub fn weight_iter(&self) -> WeightGroups<K, V> {
        let table = self.map.sorted(rank);
        let weight = |k: &K| table.entries.get(k).map_or(0, |w| w.weight);

        let mut groups: Vec<WeightGroup<K, V>> = Vec::with_capacity(table.groups());
        for chunk in table.sorted_keys().chunk_by(|a, b| weight(a) == weight(b)) {
            let members = chunk
                .iter()
                .filter_map(|k| table.entries.get_key_value(k))
                .map(|(k, w)| (k.clone(), w.value.clone()))
                .collect();
            groups.push(WeightGroup {
                weight: chunk.first().map_or(0, weight),
                entries: Iter::new(members),
            });
        }

        WeightGroups {
            groups: groups.into_iter(),
        }
    }

    pub fn copy(&self) -> WeightedMap<K, V> {
        WeightedMap {
            map: self.map.copy(),
        }
    }
}

fn plain<K: Eq + Hash, V>(table: &Table<K, Weighted<V>>) -> HashMap<&K, &V> {
    table.entries.iter().map(|(k, w)| (k, &w.value)).collect()
}

impl<K, V, L> Marshal for WeightedMap<K, V, L>
where
    K: Eq + Hash + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
    L: LockPolicy,
{
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error> {
        Ok(C::encode(&plain(&*self.map.read_table()))?)
    }

    /// Replaces the content with the decoded values. A key that was already
    /// present keeps its weight; new keys start at 0.
    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error> {
        if self.map.is_read_only() {
            debug!(codec = C::NAME, "refusing to decode into read-only weighted map");
            return Err(Error::ReadOnly);
        }
        let decoded: HashMap<K, V> = C::decode(bytes)?;

        let mut table = self.map.write_table();
        let entries: HashMap<K, Weighted<V>> = decoded
            .into_iter()
            .map(|(k, value)| {
                let weight = table.entries.get(&k).map_or(0, |w| w.weight);
                (k, Weighted::new(value, weight))
            })
            .collect();
        table.entries = entries;
        table.invalidate();
        Ok(())
    }
}

impl<K: Eq + Hash + Serialize, V: Serialize, L: LockPolicy> Serialize for WeightedMap<K, V, L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        plain(&*self.map.read_table()).serialize(serializer)
    }
}

impl<'de, K, V, L> Deserialize<'de> for WeightedMap<K, V, L>
where
    K: Eq + Hash + Deserialize<'de>,
    V: Deserialize<'de>,
    L: LockPolicy,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let plain = HashMap::<K, V>::deserialize(deserializer)?;
        Ok(Self::from_map(
            plain
                .into_iter()
                .map(|(k, v)| (k, Weighted::lowest(v)))
                .collect(),
        ))
    }
}

impl<K, V, L: LockPolicy> Default for WeightedMap<K, V, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V, L: LockPolicy> FromIterator<(K, Weighted<V>)> for WeightedMap<K, V, L> {
    fn from_iter<I: IntoIterator<Item = (K, Weighted<V>)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, L: LockPolicy> fmt::Debug for WeightedMap<K, V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightedMap").field("map", &self.map).finish()
    }
}

/// `{k: v@w, ...}`, highest weight first.
impl<K, V, L> fmt::Display for WeightedMap<K, V, L>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: fmt::Display,
    L: LockPolicy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.map.sorted(rank);
        f.write_str("{")?;
        for (i, (k, w)) in table.sorted_entries().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {}@{}", w.value, w.weight)?;
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
    use cairn_codec::{Cbor, Json};
    use std::collections::HashSet;

    fn abc() -> WeightedMap<&'static str, &'static str> {
        let m = WeightedMap::new();
        m.set_weighted("A", Weighted::new("a", 5));
        m.set_weighted("B", Weighted::new("b", 5));
        m.set_weighted("C", Weighted::new("c", 1));
        m
    }

    #[test]
    fn groups_come_out_highest_first() {
        let m = abc();
        let mut groups = m.weight_iter();

        let first = groups.next().unwrap();
        assert_eq!(first.weight(), 5);
        let keys: HashSet<_> = first.map(|(k, _)| k).collect();
        assert_eq!(keys, HashSet::from(["A", "B"]));

        let second = groups.next().unwrap();
        assert_eq!(second.weight(), 1);
        assert_eq!(second.collect::<Vec<_>>(), [("C", "c")]);

        assert!(groups.next().is_none());
        assert_eq!(m.weights(), 2);
    }

    #[test]
    fn keys_descend_by_weight() {
        let m = abc();
        m.set("D", "d");
        let keys = m.keys();
        assert_eq!(keys.len(), 4);
        assert_eq!(&keys[2..], ["C", "D"]);
        assert_eq!(m.values().last(), Some(&"d"));
        assert_eq!(m.weights(), 3);
    }

    #[test]
    fn for_each_callback_can_reweight() {
        let m = abc();
        m.for_each(|k, v| m.set_weighted(*k, Weighted::new(*v, 9)));
        assert_eq!(m.weights(), 1);
        assert_eq!(m.get_weighted("C"), Some(Weighted::new("c", 9)));
    }

    #[test]
    fn plain_set_uses_weight_zero() {
        let m = WeightedMap::<String, u8>::new();
        m.set("k".into(), 7);
        assert_eq!(m.get("k"), 7);
        assert_eq!(m.get_weighted("k"), Some(Weighted::new(7, 0)));
        assert_eq!(m.get("missing"), 0);
    }

    #[test]
    fn from_ranked_uses_positions() {
        let m = WeightedMap::<&str, char>::from_ranked(["x", "y", "z"], ['a', 'b', 'c']);
        assert_eq!(m.keys(), ["z", "y", "x"]);
        assert_eq!(m.get_weighted("y"), Some(Weighted::new('b', 1)));
    }

    #[test]
    fn codecs_drop_weights_and_keep_prior_ones() {
        let src = WeightedMap::<String, u32>::new();
        src.set_weighted("old".into(), Weighted::new(1, 9));
        src.set_weighted("new".into(), Weighted::new(2, 4));

        let json = src.marshal::<Json>().unwrap();
        let text = String::from_utf8(json.clone()).unwrap();
        assert!(!text.contains("weight"));

        let dst = WeightedMap::<String, u32>::new();
        dst.set_weighted("old".into(), Weighted::new(0, 3));
        dst.set_weighted("gone".into(), Weighted::new(0, 8));
        dst.unmarshal::<Json>(&json).unwrap();

        assert!(!dst.exists("gone"));
        assert_eq!(dst.get_weighted("old"), Some(Weighted::new(1, 3)));
        assert_eq!(dst.get_weighted("new"), Some(Weighted::new(2, 0)));

        let fresh = WeightedMap::<String, u32>::new();
        fresh.unmarshal::<Cbor>(&src.marshal::<Cbor>().unwrap()).unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.weights(), 1);
    }

    #[test]
    fn read_only_refuses_decoding() {
        let m = WeightedMap::<String, u8>::from_ranked(["a".to_string()], [1]).read_only();
        assert!(matches!(m.unmarshal::<Json>(b"{}"), Err(Error::ReadOnly)));
        assert_eq!(m.len(), 1);
    }
}
