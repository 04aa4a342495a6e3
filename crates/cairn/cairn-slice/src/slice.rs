use cairn_codec::Codec;
use cairn_events::{Error, Marshal};
use cairn_sync::{LockPolicy, Unlocked};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::mem;
use std::ops::{Deref, DerefMut};

/// Growable guarded sequence.
///
/// `capacity` is only the allocation hint used whenever the slice is
/// (re)created; the slice itself is unbounded.
pub struct Slice<T, L: LockPolicy = Unlocked> {
    items: L::Cell<Vec<T>>,
    capacity: usize,
}

/// Exclusive access to a slice's backing vector, released on drop.
pub struct Commit<'a, T: 'a, L: LockPolicy> {
    guard: L::Write<'a, Vec<T>>,
    capacity: usize,
}

impl<'a, T: 'a, L: LockPolicy> Commit<'a, T, L> {
    /// Allocation hint the slice was created with.
    pub fn capacity_hint(&self) -> usize {
        self.capacity
    }
}

impl<'a, T: 'a, L: LockPolicy> Deref for Commit<'a, T, L> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.guard
    }
}

impl<'a, T: 'a, L: LockPolicy> DerefMut for Commit<'a, T, L> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.guard
    }
}

impl<T, L: LockPolicy> Slice<T, L> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: L::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn add<I: IntoIterator<Item = T>>(&self, items: I) {
        L::write(&self.items).extend(items);
    }

    pub fn len(&self) -> usize {
        L::read(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        L::read(&self.items).is_empty()
    }

    pub fn clear(&self) {
        *L::write(&self.items) = Vec::with_capacity(self.capacity);
    }

    /// Contents so far; leaves the slice empty.
    pub fn take(&self) -> Vec<T> {
        let mut items = L::write(&self.items);
        mem::replace(&mut *items, Vec::with_capacity(self.capacity))
    }

    /// Direct access to the backing vector for a batch of edits.
    pub fn commit(&self) -> Commit<'_, T, L> {
        Commit {
            guard: L::write(&self.items),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone, L: LockPolicy> Slice<T, L> {
    pub fn get_all(&self) -> Vec<T> {
        L::read(&self.items).clone()
    }

    /// Element at `idx`, or `None` when out of range.
    pub fn get(&self, idx: usize) -> Option<T> {
        L::read(&self.items).get(idx).cloned()
    }
}

impl<T, L> Marshal for Slice<T, L>
where
    T: Serialize + DeserializeOwned,
    L: LockPolicy,
{
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error> {
        Ok(C::encode(&*L::read(&self.items))?)
    }

    /// Replaces the contents with the decoded sequence.
    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error> {
        let decoded: Vec<T> = C::decode(bytes)?;
        *L::write(&self.items) = decoded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_codec::{Cbor, Json};
    use cairn_sync::Locked;

    #[test]
    fn add_get_clear() {
        let s = Slice::<u8>::new(4);
        s.add([1, 2, 3]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.get(1), Some(2));
        assert_eq!(s.get(3), None);
        s.clear();
        assert!(s.is_empty());
    }

    #[test]
    fn commit_edits_in_place() {
        let s = Slice::<u8, Locked>::new(2);
        s.add([3, 1, 2]);
        {
            let mut items = s.commit();
            assert_eq!(items.capacity_hint(), 2);
            items.sort_unstable();
            items.push(9);
        }
        assert_eq!(s.take(), vec![1, 2, 3, 9]);
        assert!(s.is_empty());
    }

    #[test]
    fn codecs_carry_the_sequence() {
        let s = Slice::<String>::new(0);
        s.add(["x".to_string(), "y".to_string()]);

        let json = s.marshal::<Json>().unwrap();
        assert_eq!(json, br#"["x","y"]"#);

        let other = Slice::<String>::new(0);
        other.add(["stale".to_string()]);
        other.unmarshal::<Cbor>(&s.marshal::<Cbor>().unwrap()).unwrap();
        assert_eq!(other.get_all(), s.get_all());
    }
}
