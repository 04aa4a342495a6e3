//! Prefix-scoped views over a string-keyed [`Map`].
//!
//! A [`Bucket`] owns no storage. Writes and point reads prepend the bucket's
//! prefix to the key; scans walk the whole parent and keep the entries whose
//! key starts with the prefix. Keys come back in full, prefix included.

use crate::map::{Iter, Map};
use cairn_channel::{Client, Hub, RecvError, RecvTimeoutError, TryRecvError};
use cairn_events::WatchMsg;
use cairn_sync::{LockPolicy, Unlocked};
use std::fmt;
use std::time::{Duration, Instant};

pub struct Bucket<'m, V, L: LockPolicy = Unlocked> {
    map: &'m Map<String, V, L>,
    prefix: String,
}

impl<V, L: LockPolicy> Map<String, V, L> {
    /// View of the keys starting with `prefix`.
    pub fn bucket(&self, prefix: impl Into<String>) -> Bucket<'_, V, L> {
        Bucket {
            map: self,
            prefix: prefix.into(),
        }
    }
}

impl<'m, V, L: LockPolicy> Bucket<'m, V, L> {
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Nested view; the prefixes concatenate.
    pub fn bucket(&self, prefix: &str) -> Bucket<'m, V, L> {
        Bucket {
            map: self.map,
            prefix: format!("{}{prefix}", self.prefix),
        }
    }

    /// Whether the parent map is frozen.
    pub fn is_read_only(&self) -> bool {
        self.map.is_read_only()
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.map.exists(self.key(key).as_str())
    }

    pub fn get(&self, key: &str) -> V
    where
        V: Default + Clone,
    {
        self.map.get(self.key(key).as_str())
    }

    pub fn get_full(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        self.map.get_full(self.key(key).as_str())
    }

    pub fn set(&self, key: &str, value: V)
    where
        V: Clone,
    {
        self.map.set(self.key(key), value);
    }

    pub fn delete(&self, key: &str)
    where
        V: Clone,
    {
        self.map.delete(self.key(key).as_str());
    }

    fn scan(&self, mut f: impl FnMut(&str, &V)) {
        self.map.scan(|k, v| {
            if k.starts_with(&self.prefix) {
                f(k.as_str(), v);
            }
        });
    }

    pub fn len(&self) -> usize {
        let mut n = 0;
        self.scan(|_, _| n += 1);
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to the parent's events for keys under the prefix.
    ///
    /// `None` when the parent map is not eventful. The subscription ends when
    /// the returned handle is dropped, which can be no later than this view.
    pub fn watch(&self) -> Option<BucketWatch<'_, V>> {
        let hub = self.map.hub()?;
        Some(BucketWatch {
            hub,
            prefix: &self.prefix,
            client: Some(hub.register()),
        })
    }
}

impl<'m, V: Clone, L: LockPolicy> Bucket<'m, V, L> {
    /// Calls `f` for every entry under the prefix, over a snapshot; `f` may
    /// write through this view or the parent.
    pub fn for_each(&self, mut f: impl FnMut(&str, &V)) {
        for (k, v) in self.iter() {
            f(&k, &v);
        }
    }

    pub fn iter(&self) -> Iter<String, V> {
        let mut items = Vec::new();
        self.scan(|k, v| items.push((k.to_owned(), v.clone())));
        Iter::new(items)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.scan(|k, _| keys.push(k.to_owned()));
        keys
    }

    pub fn values(&self) -> Vec<V> {
        let mut values = Vec::new();
        self.scan(|_, v| values.push(v.clone()));
        values
    }
}

impl<V, L: LockPolicy> fmt::Debug for Bucket<'_, V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Prefix-filtered subscription handed out by [`Bucket::watch`].
///
/// Events for other keys are skipped as they are received. Dropping the
/// handle releases the underlying hub client.
pub struct BucketWatch<'b, V> {
    hub: &'b Hub<WatchMsg<String, V>>,
    prefix: &'b str,
    client: Option<Client<WatchMsg<String, V>>>,
}

impl<V> BucketWatch<'_, V> {
    fn matches(&self, msg: &WatchMsg<String, V>) -> bool {
        msg.key.starts_with(self.prefix)
    }

    /// Next matching event; fails once the subscription is closed.
    pub fn recv(&self) -> Result<WatchMsg<String, V>, RecvError> {
        let client = self.client.as_ref().ok_or(RecvError)?;
        loop {
            let msg = client.recv()?;
            if self.matches(&msg) {
                return Ok(msg);
            }
        }
    }

    /// Next matching event already queued; skips queued events for other keys.
    pub fn try_recv(&self) -> Result<WatchMsg<String, V>, TryRecvError> {
        let client = self.client.as_ref().ok_or(TryRecvError::Disconnected)?;
        loop {
            let msg = client.try_recv()?;
            if self.matches(&msg) {
                return Ok(msg);
            }
        }
    }

    /// Waits up to `timeout` in total for a matching event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<WatchMsg<String, V>, RecvTimeoutError> {
        let client = self
            .client
            .as_ref()
            .ok_or(RecvTimeoutError::Disconnected)?;
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let msg = client.recv_timeout(left)?;
            if self.matches(&msg) {
                return Ok(msg);
            }
        }
    }

    /// Blocking iterator over matching events.
    pub fn iter(&self) -> impl Iterator<Item = WatchMsg<String, V>> + '_ {
        std::iter::from_fn(|| self.recv().ok())
    }
}

impl<V> Drop for BucketWatch<'_, V> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.hub.release(client);
        }
    }
}

impl<V> fmt::Debug for BucketWatch<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketWatch")
            .field("prefix", &self.prefix)
            .field("client", &self.client)
            .finish()
    }
}
