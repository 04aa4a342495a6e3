use crate::bucket::Bucket;
use crate::map::{Iter, Map};
use crate::ordered::OrderedMap;
use crate::weighted::WeightedMap;
use cairn_sync::LockPolicy;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

/// Read/write surface shared by every map flavour.
///
/// Keys are looked up in borrowed form, as with the maps' own methods, so a
/// `Container<String, V>` accepts `&str`. Also implemented for `Option<C>`:
/// `None` stands for "no container yet" and behaves as an empty, frozen
/// one. Reads return zero values and writes do nothing.
pub trait Container<K, V> {
    fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Lookup<K> + ?Sized;

    fn get_full<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Lookup<K> + ?Sized;

    /// Value for `key`, or `V::default()`.
    fn get<Q>(&self, key: &Q) -> V
    where
        K: Borrow<Q>,
        Q: Lookup<K> + ?Sized,
        V: Default,
    {
        self.get_full(key).unwrap_or_default()
    }

    fn set(&self, key: K, value: V);

    fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Lookup<K> + ?Sized;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> Vec<K>;

    fn values(&self) -> Vec<V>;

    /// One-shot snapshot of the entries.
    fn iter(&self) -> Iter<K, V>;

    fn is_read_only(&self) -> bool;
}

/// Borrowed key form accepted by [`Container`] lookups.
///
/// `ToOwned` lets a [`Bucket`] rebuild the full key from the relative one.
pub trait Lookup<K>: Hash + Eq + ToOwned<Owned = K> {}

impl<K, Q: Hash + Eq + ToOwned<Owned = K> + ?Sized> Lookup<K> for Q {}

macro_rules! delegate_container {
    ($ty:ident) => {
        impl<K, V, L> Container<K, V> for $ty<K, V, L>
        where
            K: Eq + Hash + Clone,
            V: Clone,
            L: LockPolicy,
        {
            fn exists<Q>(&self, key: &Q) -> bool
            where
                K: Borrow<Q>,
                Q: Lookup<K> + ?Sized,
            {
                $ty::exists(self, key)
            }

            fn get_full<Q>(&self, key: &Q) -> Option<V>
            where
                K: Borrow<Q>,
                Q: Lookup<K> + ?Sized,
            {
                $ty::get_full(self, key)
            }

            fn set(&self, key: K, value: V) {
                $ty::set(self, key, value);
            }

            fn delete<Q>(&self, key: &Q)
            where
                K: Borrow<Q>,
                Q: Lookup<K> + ?Sized,
            {
                $ty::delete(self, key);
            }

            fn len(&self) -> usize {
                $ty::len(self)
            }

            fn keys(&self) -> Vec<K> {
                $ty::keys(self)
            }

            fn values(&self) -> Vec<V> {
                $ty::values(self)
            }

            fn iter(&self) -> Iter<K, V> {
                $ty::iter(self)
            }

            fn is_read_only(&self) -> bool {
                $ty::is_read_only(self)
            }
        }
    };
}

delegate_container!(Map);
delegate_container!(OrderedMap);
delegate_container!(WeightedMap);

/// Keys are given relative to the bucket; scans return full keys.
impl<V: Clone, L: LockPolicy> Container<String, V> for Bucket<'_, V, L> {
    fn exists<Q>(&self, key: &Q) -> bool
    where
        String: Borrow<Q>,
        Q: Lookup<String> + ?Sized,
    {
        Bucket::exists(self, &key.to_owned())
    }

    fn get_full<Q>(&self, key: &Q) -> Option<V>
    where
        String: Borrow<Q>,
        Q: Lookup<String> + ?Sized,
    {
        Bucket::get_full(self, &key.to_owned())
    }

    fn set(&self, key: String, value: V) {
        Bucket::set(self, &key, value);
    }

    fn delete<Q>(&self, key: &Q)
    where
        String: Borrow<Q>,
        Q: Lookup<String> + ?Sized,
    {
        Bucket::delete(self, &key.to_owned());
    }

    fn len(&self) -> usize {
        Bucket::len(self)
    }

    fn keys(&self) -> Vec<String> {
        Bucket::keys(self)
    }

    fn values(&self) -> Vec<V> {
        Bucket::values(self)
    }

    fn iter(&self) -> Iter<String, V> {
        Bucket::iter(self)
    }

    fn is_read_only(&self) -> bool {
        Bucket::is_read_only(self)
    }
}

macro_rules! forward_container {
    ($($wrapper:ty),+) => {$(
        impl<K, V, C: Container<K, V> + ?Sized> Container<K, V> for $wrapper {
            fn exists<Q>(&self, key: &Q) -> bool
            where
                K: Borrow<Q>,
                Q: Lookup<K> + ?Sized,
            {
                (**self).exists(key)
            }

            fn get_full<Q>(&self, key: &Q) -> Option<V>
            where
                K: Borrow<Q>,
                Q: Lookup<K> + ?Sized,
            {
                (**self).get_full(key)
            }

            fn set(&self, key: K, value: V) {
                (**self).set(key, value);
            }

            fn delete<Q>(&self, key: &Q)
            where
                K: Borrow<Q>,
                Q: Lookup<K> + ?Sized,
            {
                (**self).delete(key);
            }

            fn len(&self) -> usize {
                (**self).len()
            }

            fn keys(&self) -> Vec<K> {
                (**self).keys()
            }

            fn values(&self) -> Vec<V> {
                (**self).values()
            }

            fn iter(&self) -> Iter<K, V> {
                (**self).iter()
            }

            fn is_read_only(&self) -> bool {
                (**self).is_read_only()
            }
        }
    )+};
}

forward_container!(&C, Arc<C>);

impl<K, V, C: Container<K, V>> Container<K, V> for Option<C> {
    fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Lookup<K> + ?Sized,
    {
        self.as_ref().is_some_and(|c| c.exists(key))
    }

    fn get_full<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Lookup<K> + ?Sized,
    {
        self.as_ref().and_then(|c| c.get_full(key))
    }

    fn set(&self, key: K, value: V) {
        if let Some(c) = self {
            c.set(key, value);
        }
    }

    fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Lookup<K> + ?Sized,
    {
        if let Some(c) = self {
            c.delete(key);
        }
    }

    fn len(&self) -> usize {
        self.as_ref().map_or(0, C::len)
    }

    fn keys(&self) -> Vec<K> {
        self.as_ref().map_or_else(Vec::new, C::keys)
    }

    fn values(&self) -> Vec<V> {
        self.as_ref().map_or_else(Vec::new, C::values)
    }

    fn iter(&self) -> Iter<K, V> {
        self.as_ref().map_or_else(Iter::empty, C::iter)
    }

    /// A missing container accepts no writes.
    fn is_read_only(&self) -> bool {
        self.as_ref().is_none_or(C::is_read_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_events::Weighted;
    use cairn_sync::Locked;

    fn fill<C: Container<String, u32>>(c: &C) {
        c.set("b".into(), 2);
        c.set("a".into(), 1);
        c.set("c".into(), 3);
        c.delete("c");
    }

    fn sorted<T: Ord>(mut v: Vec<T>) -> Vec<T> {
        v.sort();
        v
    }

    fn check<C: Container<String, u32>>(c: &C) {
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("a"), 1);
        assert!(!c.exists("c"));
        assert_eq!(sorted(c.keys()), ["a", "b"]);
        assert_eq!(sorted(c.values()), [1, 2]);
        assert_eq!(c.iter().count(), 2);
    }

    #[test]
    fn every_flavour_behaves_as_a_container() {
        let map = Map::<String, u32>::new();
        let ordered = OrderedMap::<String, u32, Locked>::new();
        let weighted = WeightedMap::<String, u32>::new().safe();
        let shared = Arc::new(Map::<String, u32>::new().safe());

        fill(&map);
        fill(&ordered);
        fill(&weighted);
        fill(&shared);

        check(&map);
        check(&ordered);
        check(&weighted);
        check(&shared);
        assert_eq!(ordered.keys(), ["a", "b"]);
        assert_eq!(weighted.get_weighted("a"), Some(Weighted::new(1, 0)));
    }

    #[test]
    fn shared_map_takes_borrowed_keys() {
        let shared = Arc::new(Map::<String, u32>::new().safe());
        shared.set("k".to_string(), 1);
        assert!(shared.exists("k"));
        assert_eq!(shared.get("k"), 1);
        assert_eq!(shared.get_full("k"), Some(1));

        let key = "k".to_string();
        shared.delete(key.as_str());
        assert!(shared.is_empty());
        assert!(shared.commit().is_some());

        let ordered = Arc::new(OrderedMap::<String, u32>::new());
        ordered.set("z".into(), 26);
        ordered.delete("z");
        assert!(!ordered.exists("z"));
    }

    #[test]
    fn missing_container_reads_as_empty() {
        let none: Option<Map<String, u32>> = None;
        let key = "k".to_string();

        none.set(key.clone(), 1);
        none.delete(&key);
        assert!(!none.exists(&key));
        assert_eq!(none.get(&key), 0);
        assert_eq!(none.get_full(&key), None);
        assert_eq!(none.len(), 0);
        assert!(none.is_empty());
        assert!(none.keys().is_empty());
        assert!(none.values().is_empty());
        assert_eq!(Container::iter(&none).count(), 0);
        assert!(none.is_read_only());

        let some = Some(Map::<String, u32>::new());
        some.set(key.clone(), 1);
        assert_eq!(some.get(&key), 1);
        assert!(!some.is_read_only());
    }

    #[test]
    fn bucket_is_a_container() {
        let m = Map::<String, u32>::new();
        let b = m.bucket("p/");
        fill(&b);
        assert_eq!(sorted(Container::keys(&b)), ["p/a", "p/b"]);
        assert_eq!(Container::get(&b, "a"), 1);
        assert_eq!(m.len(), 2);
    }
}
