use std::collections::HashMap;
use std::hash::Hash;

/// Backing state of every map: the entries plus an optional sorted view.
///
/// `order` is `None` whenever the entries changed since the view was last
/// built ("dirty"). Plain maps never build it; ordered and weighted maps
/// build it on the first read after a mutation and reuse it until the next.
pub(crate) struct Table<K, V> {
    pub(crate) entries: HashMap<K, V>,
    order: Option<SortCache<K>>,
}

pub(crate) struct SortCache<K> {
    keys: Vec<K>,
    /// Distinct weights among `keys`; 0 for comparator-ordered maps.
    groups: usize,
}

impl<K> SortCache<K> {
    pub(crate) fn new(keys: Vec<K>, groups: usize) -> Self {
        Self { keys, groups }
    }
}

impl<K, V> Table<K, V> {
    pub(crate) fn new(entries: HashMap<K, V>) -> Self {
        Self {
            entries,
            order: None,
        }
    }

    #[inline]
    pub(crate) fn invalidate(&mut self) {
        self.order = None;
    }

    #[inline]
    pub(crate) fn is_sorted(&self) -> bool {
        self.order.is_some()
    }

    pub(crate) fn cache(&mut self, order: SortCache<K>) {
        self.order = Some(order);
    }

    pub(crate) fn sorted_keys(&self) -> &[K] {
        self.order.as_ref().map_or(&[], |o| o.keys.as_slice())
    }

    pub(crate) fn groups(&self) -> usize {
        self.order.as_ref().map_or(0, |o| o.groups)
    }
}

impl<K: Eq + Hash, V> Table<K, V> {
    /// Entries in cached order. Empty when the view has not been built.
    pub(crate) fn sorted_entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.sorted_keys()
            .iter()
            .filter_map(|k| self.entries.get_key_value(k))
    }
}
