//! Fixed-capacity sequence with FIFO eviction.
//!
//! A [`Rigid`] buffer keeps at most `capacity` elements. Appending past that
//! evicts the oldest elements and hands them back to the caller, oldest
//! first, so nothing is lost silently.
//!
//! # Example
//!
//! ```text
//! capacity = 3
//!
//! add(a, b, c)  → [a, b, c]   evicted: []
//! add(d)        → [b, c, d]   evicted: [a]
//! add(e, f, g)  → [e, f, g]   evicted: [b, c, d]
//! ```

use cairn_sync::{LockPolicy, Unlocked};
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

/// Number of elements that must be evicted so `len` fits into `capacity`.
///
/// `saturating_sub` makes a buffer that is still under capacity evict nothing.
#[inline(always)]
pub fn excess(len: usize, capacity: usize) -> usize {
    len.saturating_sub(capacity)
}

/// Bounded FIFO buffer. See the module docs for the eviction policy.
pub struct Rigid<T, L: LockPolicy = Unlocked> {
    buf: L::Cell<VecDeque<T>>,
    /// Always at least 1; a zero capacity is promoted on construction.
    capacity: usize,
}

impl<T, L: LockPolicy> Rigid<T, L> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: L::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `items` and returns whatever had to be evicted, oldest first.
    pub fn add<I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        let mut buf = L::write(&self.buf);
        buf.extend(items);
        let evict = excess(buf.len(), self.capacity);
        buf.drain(..evict).collect()
    }

    pub fn len(&self) -> usize {
        L::read(&self.buf).len()
    }

    pub fn is_empty(&self) -> bool {
        L::read(&self.buf).is_empty()
    }

    /// Current contents in insertion order and resets the buffer.
    pub fn take(&self) -> Vec<T> {
        let mut buf = L::write(&self.buf);
        mem::replace(&mut *buf, VecDeque::with_capacity(self.capacity)).into()
    }
}

impl<T: Clone, L: LockPolicy> Rigid<T, L> {
    /// Current contents in insertion order.
    pub fn get_all(&self) -> Vec<T> {
        L::read(&self.buf).iter().cloned().collect()
    }

    /// Element at `idx`; an index past the end reads the newest element.
    pub fn get(&self, idx: usize) -> Option<T> {
        let buf = L::read(&self.buf);
        let last = buf.len().checked_sub(1)?;
        buf.get(idx.min(last)).cloned()
    }

    /// The `n` most recent elements (never more than capacity or length).
    pub fn get_last(&self, n: usize) -> Vec<T> {
        let buf = L::read(&self.buf);
        let n = n.min(self.capacity).min(buf.len());
        buf.range(buf.len() - n..).cloned().collect()
    }
}

/// Operations shared by the bounded buffers, forwarded through `&B`,
/// `Arc<B>` and `Option<B>`. A `None` buffer holds nothing and accepts
/// nothing.
pub trait Bounded<T> {
    fn add<I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T>;

    fn get_all(&self) -> Vec<T>;

    fn get_last(&self, n: usize) -> Vec<T>;

    fn take(&self) -> Vec<T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone, L: LockPolicy> Bounded<T> for Rigid<T, L> {
    fn add<I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        Rigid::add(self, items)
    }

    fn get_all(&self) -> Vec<T> {
        Rigid::get_all(self)
    }

    fn get_last(&self, n: usize) -> Vec<T> {
        Rigid::get_last(self, n)
    }

    fn take(&self) -> Vec<T> {
        Rigid::take(self)
    }

    fn len(&self) -> usize {
        Rigid::len(self)
    }
}

impl<T, B: Bounded<T> + ?Sized> Bounded<T> for &B {
    fn add<I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        (**self).add(items)
    }

    fn get_all(&self) -> Vec<T> {
        (**self).get_all()
    }

    fn get_last(&self, n: usize) -> Vec<T> {
        (**self).get_last(n)
    }

    fn take(&self) -> Vec<T> {
        (**self).take()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<T, B: Bounded<T> + ?Sized> Bounded<T> for Arc<B> {
    fn add<I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        (**self).add(items)
    }

    fn get_all(&self) -> Vec<T> {
        (**self).get_all()
    }

    fn get_last(&self, n: usize) -> Vec<T> {
        (**self).get_last(n)
    }

    fn take(&self) -> Vec<T> {
        (**self).take()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl<T, B: Bounded<T>> Bounded<T> for Option<B> {
    fn add<I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        self.as_ref().map(|b| b.add(items)).unwrap_or_default()
    }

    fn get_all(&self) -> Vec<T> {
        self.as_ref().map(|b| b.get_all()).unwrap_or_default()
    }

    fn get_last(&self, n: usize) -> Vec<T> {
        self.as_ref().map(|b| b.get_last(n)).unwrap_or_default()
    }

    fn take(&self) -> Vec<T> {
        self.as_ref().map(|b| b.take()).unwrap_or_default()
    }

    fn len(&self) -> usize {
        self.as_ref().map_or(0, |b| b.len())
    }
}
