use crate::set::Set;
use cairn_slice::{Bounded, Rigid};
use cairn_sync::{LockPolicy, Locked, Unlocked};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use tracing::trace;

/// Bounded buffer holding each distinct value at most once.
///
/// Values already in the buffer are skipped by [`add`](RigidSet::add). Once
/// a value is evicted (or taken) it may be admitted again.
pub struct RigidSet<T, L: LockPolicy = Unlocked> {
    buffer: Rigid<T, L>,
    members: Set<T, L>,
    // Serializes add/take so the buffer and the member set move together.
    gate: L::Cell<()>,
}

impl<T, L: LockPolicy> RigidSet<T, L> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Rigid::new(capacity),
            members: Set::new(),
            gate: L::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl<T: Eq + Hash + Clone> RigidSet<T, Unlocked> {
    pub fn safe(self) -> RigidSet<T, Locked> {
        let buffer = Rigid::new(self.buffer.capacity());
        buffer.add(self.buffer.take());
        RigidSet {
            buffer,
            members: self.members.safe(),
            gate: <Locked as LockPolicy>::new(()),
        }
    }
}

impl<T: Eq + Hash + Clone, L: LockPolicy> RigidSet<T, L> {
    /// Appends the values not yet present and returns what fell out, oldest
    /// first. Repeats within `values` are admitted once.
    pub fn add<I: IntoIterator<Item = T>>(&self, values: I) -> Vec<T> {
        let _gate = L::write(&self.gate);

        let mut batch = HashSet::new();
        let fresh: Vec<T> = values
            .into_iter()
            .filter(|v| !self.members.contains(v) && batch.insert(v.clone()))
            .collect();
        self.members.add(fresh.iter().cloned());

        let evicted = self.buffer.add(fresh);
        if !evicted.is_empty() {
            trace!(evicted = evicted.len(), "rigid set dropped its oldest members");
            self.members.delete(evicted.iter().cloned());
        }
        evicted
    }

    pub fn contains(&self, value: &T) -> bool {
        self.members.contains(value)
    }

    pub fn get_all(&self) -> Vec<T> {
        self.buffer.get_all()
    }

    pub fn get_last(&self, n: usize) -> Vec<T> {
        self.buffer.get_last(n)
    }

    /// Contents so far; leaves the buffer empty and every value admissible.
    pub fn take(&self) -> Vec<T> {
        let _gate = L::write(&self.gate);
        let taken = self.buffer.take();
        self.members.clear();
        taken
    }
}

impl<T: Eq + Hash + Clone, L: LockPolicy> Bounded<T> for RigidSet<T, L> {
    fn add<I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        RigidSet::add(self, items)
    }

    fn get_all(&self) -> Vec<T> {
        RigidSet::get_all(self)
    }

    fn get_last(&self, n: usize) -> Vec<T> {
        RigidSet::get_last(self, n)
    }

    fn take(&self) -> Vec<T> {
        RigidSet::take(self)
    }

    fn len(&self) -> usize {
        RigidSet::len(self)
    }
}

impl<T: fmt::Debug + Clone, L: LockPolicy> fmt::Debug for RigidSet<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RigidSet")
            .field("capacity", &self.buffer.capacity())
            .field("items", &self.buffer.get_all())
            .finish()
    }
}
