use cairn_codec::Codec;
use cairn_events::{Error, Marshal};
use cairn_maps::Map;
use cairn_sync::{LockPolicy, Locked, Unlocked};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Unordered collection of distinct values.
///
/// Backed by a `Map<T, (), L>`; the locking choice works the same way. On
/// the wire a set is a plain sequence of its members.
pub struct Set<T, L: LockPolicy = Unlocked> {
    map: Map<T, (), L>,
}

impl<T, L: LockPolicy> Set<T, L> {
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    pub fn safe(self) -> Set<T, Locked> {
        Set {
            map: self.map.safe(),
        }
    }

    pub fn is_safe(&self) -> bool {
        self.map.is_safe()
    }
}

impl<T: Eq + Hash, L: LockPolicy> Set<T, L> {
    /// Inserts every value, under one exclusive guard.
    pub fn add<I: IntoIterator<Item = T>>(&self, values: I) {
        if let Some(mut members) = self.map.commit() {
            members.extend(values.into_iter().map(|v| (v, ())));
        }
    }

    pub fn delete<I: IntoIterator<Item = T>>(&self, values: I) {
        if let Some(mut members) = self.map.commit() {
            for v in values {
                members.remove(&v);
            }
        }
    }

    /// Same as [`Set::delete`].
    #[inline]
    pub fn remove<I: IntoIterator<Item = T>>(&self, values: I) {
        self.delete(values);
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.exists(value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        if let Some(mut members) = self.map.commit() {
            members.clear();
        }
    }
}

impl<T: Eq + Hash + Clone, L: LockPolicy> Set<T, L> {
    /// Members in unspecified order.
    pub fn list(&self) -> Vec<T> {
        self.map.keys()
    }

    /// One-shot snapshot of the members.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = T> + use<T, L> {
        self.map.iter().map(|(v, ())| v)
    }

    /// Unlocked duplicate.
    pub fn copy(&self) -> Set<T> {
        Set {
            map: self.map.copy(),
        }
    }
}

impl<T: Eq + Hash, L: LockPolicy> FromIterator<T> for Set<T, L> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().map(|v| (v, ())).collect(),
        }
    }
}

impl<T, L: LockPolicy> Default for Set<T, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, L> Marshal for Set<T, L>
where
    T: Eq + Hash + Clone + Serialize + DeserializeOwned,
    L: LockPolicy,
{
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error> {
        Ok(C::encode(&self.list())?)
    }

    /// Replaces the members with the decoded sequence.
    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error> {
        let decoded: Vec<T> = C::decode(bytes)?;
        if let Some(mut members) = self.map.commit() {
            members.clear();
            members.extend(decoded.into_iter().map(|v| (v, ())));
        }
        Ok(())
    }
}

impl<T: Eq + Hash + Clone + Serialize, L: LockPolicy> Serialize for Set<T, L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.list())
    }
}

impl<'de, T, L> Deserialize<'de> for Set<T, L>
where
    T: Eq + Hash + Deserialize<'de>,
    L: LockPolicy,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from_iter)
    }
}

impl<T: fmt::Debug, L: LockPolicy> fmt::Debug for Set<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Set").field("map", &self.map).finish()
    }
}

/// `[a, b, c]` in unspecified order.
impl<T: Eq + Hash + Clone + fmt::Display, L: LockPolicy> fmt::Display for Set<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

/// Membership operations, forwarded through `&S`, `Arc<S>` and
/// `Option<S>`. A `None` set contains nothing and ignores writes.
pub trait Members<T> {
    fn add<I: IntoIterator<Item = T>>(&self, values: I);

    fn delete<I: IntoIterator<Item = T>>(&self, values: I);

    fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized;

    fn list(&self) -> Vec<T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Eq + Hash + Clone, L: LockPolicy> Members<T> for Set<T, L> {
    fn add<I: IntoIterator<Item = T>>(&self, values: I) {
        Set::add(self, values);
    }

    fn delete<I: IntoIterator<Item = T>>(&self, values: I) {
        Set::delete(self, values);
    }

    fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Set::contains(self, value)
    }

    fn list(&self) -> Vec<T> {
        Set::list(self)
    }

    fn len(&self) -> usize {
        Set::len(self)
    }
}

impl<T, S: Members<T> + ?Sized> Members<T> for &S {
    fn add<I: IntoIterator<Item = T>>(&self, values: I) {
        (**self).add(values);
    }

    fn delete<I: IntoIterator<Item = T>>(&self, values: I) {
        (**self).delete(values);
    }

    fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        (**self).contains(value)
    }

    fn list(&self) -> Vec<T> {
        (**self).list()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<T, S: Members<T> + ?Sized> Members<T> for Arc<S> {
    fn add<I: IntoIterator<Item = T>>(&self, values: I) {
        (**self).add(values);
    }

    fn delete<I: IntoIterator<Item = T>>(&self, values: I) {
        (**self).delete(values);
    }

    fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        (**self).contains(value)
    }

    fn list(&self) -> Vec<T> {
        (**self).list()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<T, S: Members<T>> Members<T> for Option<S> {
    fn add<I: IntoIterator<Item = T>>(&self, values: I) {
        if let Some(set) = self {
            set.add(values);
        }
    }

    fn delete<I: IntoIterator<Item = T>>(&self, values: I) {
        if let Some(set) = self {
            set.delete(values);
        }
    }

    fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.as_ref().is_some_and(|set| set.contains(value))
    }

    fn list(&self) -> Vec<T> {
        self.as_ref().map_or_else(Vec::new, S::list)
    }

    fn len(&self) -> usize {
        self.as_ref().map_or(0, S::len)
    }
}
