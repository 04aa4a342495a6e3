//! The base key/value container.
//!
//! A [`Map`] is configured once, while it is still owned by a single caller:
//!
//! ```text
//! Map::new()                       unlocked, writable, silent
//!     .safe()                      → reader/writer lock around the entries
//!     .read_only()                 → mutators become no-ops
//!     .eventful(&cancel, config)   → Put/Delete events on an attached hub
//! ```
//!
//! # Concurrency
//! Reads take the shared guard, `set`/`delete`/`commit` the exclusive one.
//! An unlocked map is `!Sync` and cannot be shared between threads.
//!
//! # Events
//! An eventful map publishes every mutation *before* applying it. A watcher
//! reacting to an event may still observe the previous state for a moment.

use crate::table::{SortCache, Table};
use cairn_channel::{CancelToken, Client, Hub, HubConfig};
use cairn_codec::Codec;
use cairn_events::{Error, Marshal, WatchMsg};
use cairn_sync::{LockPolicy, Locked, Unlocked};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub struct Map<K, V, L: LockPolicy = Unlocked> {
    table: L::Cell<Table<K, V>>,
    read_only: AtomicBool,
    hub: Option<Hub<WatchMsg<K, V>>>,
}

/// Exclusive, direct access to a map's entries.
///
/// Obtained from [`Map::commit`]; the exclusive guard is released when this
/// value is dropped. Taking it invalidates any sorted view.
pub struct Commit<'a, K: 'a, V: 'a, L: LockPolicy> {
    guard: L::Write<'a, Table<K, V>>,
}

impl<'a, K: 'a, V: 'a, L: LockPolicy> Deref for Commit<'a, K, V, L> {
    type Target = HashMap<K, V>;

    fn deref(&self) -> &HashMap<K, V> {
        &self.guard.entries
    }
}

impl<'a, K: 'a, V: 'a, L: LockPolicy> DerefMut for Commit<'a, K, V, L> {
    fn deref_mut(&mut self) -> &mut HashMap<K, V> {
        &mut self.guard.entries
    }
}

/// One-shot snapshot of a container's entries.
///
/// Taken in full under the shared guard when created; later mutations are
/// not reflected and the iterator cannot be restarted.
#[derive(Debug)]
pub struct Iter<K, V> {
    inner: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iter<K, V> {
    pub(crate) fn new(items: Vec<(K, V)>) -> Self {
        Self {
            inner: items.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl<K, V> Iterator for Iter<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<K, V> {}

impl<K, V, L: LockPolicy> Map<K, V, L> {
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    pub fn from_map(entries: HashMap<K, V>) -> Self {
        Self {
            table: L::new(Table::new(entries)),
            read_only: AtomicBool::new(false),
            hub: None,
        }
    }

    /// Moves the entries behind a reader/writer lock.
    pub fn safe(self) -> Map<K, V, Locked> {
        Map {
            table: <Locked as LockPolicy>::new(L::into_inner(self.table)),
            read_only: self.read_only,
            hub: self.hub,
        }
    }

    pub fn read_only(self) -> Self {
        self.freeze();
        self
    }

    /// Makes every mutator a no-op from now on. There is no way back.
    pub fn freeze(&self) {
        self.read_only.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_safe(&self) -> bool {
        L::SYNCHRONIZED
    }

    pub fn hub(&self) -> Option<&Hub<WatchMsg<K, V>>> {
        self.hub.as_ref()
    }

    /// Subscribes to this map's change events; `None` unless eventful.
    pub fn watch(&self) -> Option<Client<WatchMsg<K, V>>> {
        self.hub.as_ref().map(Hub::register)
    }

    /// Ends a subscription obtained from [`Map::watch`].
    pub fn unwatch(&self, client: Client<WatchMsg<K, V>>) {
        if let Some(hub) = &self.hub {
            hub.release(client);
        }
    }

    pub(crate) fn read_table(&self) -> L::Read<'_, Table<K, V>> {
        L::read(&self.table)
    }

    pub(crate) fn write_table(&self) -> L::Write<'_, Table<K, V>> {
        L::write(&self.table)
    }

    /// Read guard over a table whose sorted view is current.
    ///
    /// Clean tables are served under the shared guard. A dirty one is rebuilt
    /// once under the exclusive guard, which is then downgraded so no writer
    /// can invalidate the fresh view before the caller reads it.
    pub(crate) fn sorted(
        &self,
        build: impl FnOnce(&HashMap<K, V>) -> SortCache<K>,
    ) -> L::Read<'_, Table<K, V>> {
        let table = L::read(&self.table);
        if table.is_sorted() {
            return table;
        }
        drop(table);

        let mut table = L::write(&self.table);
        if !table.is_sorted() {
            let order = build(&table.entries);
            table.cache(order);
        }
        L::downgrade(&self.table, table)
    }
}

impl<K, V, L> Map<K, V, L>
where
    K: Clone + Send + 'static,
    V: Clone + Send + 'static,
    L: LockPolicy,
{
    /// Attaches a hub bound to `cancel` that relays every mutation.
    pub fn eventful(mut self, cancel: &CancelToken, config: HubConfig) -> Self {
        self.hub = Some(Hub::new(cancel, config));
        self
    }
}

impl<K: Eq + Hash, V, L: LockPolicy> Map<K, V, L> {
    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        L::read(&self.table).entries.contains_key(key)
    }

    /// Value for `key`, or `V::default()` when absent.
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
        L::read(&self.table).entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        L::read(&self.table).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        L::read(&self.table).entries.is_empty()
    }

    pub fn set(&self, key: K, value: V)
    where
        K: Clone,
        V: Clone,
    {
        if self.is_read_only() {
            return;
        }
        if let Some(hub) = &self.hub {
            hub.broadcast(WatchMsg::put(key.clone(), value.clone()));
        }

        let mut table = L::write(&self.table);
        table.entries.insert(key, value);
        table.invalidate();
    }

    /// Removes `key`. An eventful map publishes the value being removed; a
    /// key that is not present produces no event.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q> + Clone,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        if self.is_read_only() {
            return;
        }
        if let Some(hub) = &self.hub {
            let prior = L::read(&self.table)
                .entries
                .get_key_value(key)
                .map(|(k, v)| (k.clone(), v.clone()));
            if let Some((k, v)) = prior {
                hub.broadcast(WatchMsg::delete(k, v));
            }
        }

        let mut table = L::write(&self.table);
        table.entries.remove(key);
        table.invalidate();
    }

    /// Exclusive direct access to the entries; `None` on a read-only map.
    ///
    /// Edits made through the guard publish no events.
    pub fn commit(&self) -> Option<Commit<'_, K, V, L>> {
        if self.is_read_only() {
            return None;
        }
        let mut guard = L::write(&self.table);
        guard.invalidate();
        Some(Commit { guard })
    }

    /// Walks the entries under the shared guard. Only for callbacks that
    /// never touch this map again.
    pub(crate) fn scan(&self, mut f: impl FnMut(&K, &V)) {
        let table = L::read(&self.table);
        for (k, v) in &table.entries {
            f(k, v);
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone, L: LockPolicy> Map<K, V, L> {
    pub fn iter(&self) -> Iter<K, V> {
        let table = L::read(&self.table);
        Iter::new(
            table
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Calls `f` for every entry of a snapshot taken when the call starts.
    ///
    /// No guard is held while `f` runs, so `f` may write to this map; those
    /// writes are not part of the walk.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for (k, v) in self.iter() {
            f(&k, &v);
        }
    }

    pub fn keys(&self) -> Vec<K> {
        L::read(&self.table).entries.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<V> {
        L::read(&self.table).entries.values().cloned().collect()
    }

    /// Independent duplicate of the content: unlocked, writable, silent.
    pub fn copy(&self) -> Map<K, V> {
        Map::from_map(L::read(&self.table).entries.clone())
    }
}

impl<K, V, L> Marshal for Map<K, V, L>
where
    K: Eq + Hash + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
    L: LockPolicy,
{
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error> {
        Ok(C::encode(&L::read(&self.table).entries)?)
    }

    /// Merges the decoded entries into the map; decoded keys win.
    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error> {
        if self.is_read_only() {
            debug!(codec = C::NAME, "refusing to decode into read-only map");
            return Err(Error::ReadOnly);
        }
        let decoded: HashMap<K, V> = C::decode(bytes)?;

        let mut table = L::write(&self.table);
        table.entries.extend(decoded);
        table.invalidate();
        Ok(())
    }
}

impl<K: Eq + Hash + Serialize, V: Serialize, L: LockPolicy> Serialize for Map<K, V, L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        L::read(&self.table).entries.serialize(serializer)
    }
}

impl<'de, K, V, L> Deserialize<'de> for Map<K, V, L>
where
    K: Eq + Hash + Deserialize<'de>,
    V: Deserialize<'de>,
    L: LockPolicy,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashMap::deserialize(deserializer).map(Self::from_map)
    }
}

impl<K, V, L: LockPolicy> Default for Map<K, V, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, L: LockPolicy> From<HashMap<K, V>> for Map<K, V, L> {
    fn from(entries: HashMap<K, V>) -> Self {
        Self::from_map(entries)
    }
}

impl<K: Eq + Hash, V, L: LockPolicy> FromIterator<(K, V)> for Map<K, V, L> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, L: LockPolicy> fmt::Debug for Map<K, V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("entries", &L::read(&self.table).entries)
            .field("safe", &L::SYNCHRONIZED)
            .field("read_only", &self.is_read_only())
            .field("eventful", &self.hub.is_some())
            .finish()
    }
}

/// `{k: v, ...} (safe)`; entry order is unspecified.
impl<K: fmt::Display, V: fmt::Display, L: LockPolicy> fmt::Display for Map<K, V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = L::read(&self.table);
        f.write_str("{")?;
        for (i, (k, v)) in table.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        f.write_str("}")?;
        if L::SYNCHRONIZED {
            f.write_str(" (safe)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_codec::{Cbor, Json};
    use cairn_events::EventKind;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn sample() -> Map<String, String> {
        Map::from_map(HashMap::from([("a".to_string(), "1".to_string())]))
    }

    #[test]
    fn get_set_delete() {
        let m = Map::<String, String>::new();
        assert!(!m.exists("x"));
        assert_eq!(m.get("x"), "");
        assert_eq!(m.get_full("x"), None);

        m.set("x".into(), "y".into());
        assert!(m.exists("x"));
        assert_eq!(m.get("x"), "y");
        assert_eq!(m.get_full("x"), Some("y".to_string()));
        assert_eq!(m.len(), 1);

        m.delete("x");
        assert!(m.is_empty());
    }

    #[test]
    fn frozen_map_ignores_mutators() {
        let m = sample().read_only();
        m.set("b".into(), "2".into());
        m.delete("a");
        assert!(m.commit().is_none());

        assert!(!m.exists("b"));
        assert_eq!(m.get("a"), "1");
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn freeze_applies_to_a_live_map() {
        let m = sample().safe();
        m.set("b".into(), "2".into());
        m.freeze();
        m.set("c".into(), "3".into());
        assert!(m.is_read_only());
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn commit_grants_direct_access() {
        let m = Map::<String, u32>::new();
        if let Some(mut entries) = m.commit() {
            entries.insert("x".into(), 1);
            entries.insert("y".into(), 2);
        }
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("y"), 2);
    }

    #[test]
    fn iter_is_a_snapshot() {
        let m = sample().safe();
        let iter = m.iter();
        m.set("b".into(), "2".into());
        let seen: Vec<_> = iter.collect();
        assert_eq!(seen, vec![("a".to_string(), "1".to_string())]);
        assert_eq!(m.iter().len(), 2);
    }

    #[test]
    fn for_each_callback_can_mutate_the_map() {
        let m = sample();
        m.for_each(|k, v| m.set(format!("{k}{v}"), v.clone()));
        assert_eq!(m.get("a1"), "1");
        assert_eq!(m.len(), 2);

        let locked = sample().safe();
        locked.for_each(|k, _| locked.delete(k));
        assert!(locked.is_empty());
    }

    #[test]
    fn copy_is_independent_and_plain() {
        let m = sample().safe().read_only();
        let c = m.copy();
        assert!(!c.is_safe());
        assert!(!c.is_read_only());
        c.set("b".into(), "2".into());
        assert_eq!(c.len(), 2);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn codec_round_trip() {
        let m = Map::<String, u32>::from_iter([("x".to_string(), 1), ("y".to_string(), 2)]);

        let json = Map::<String, u32>::new();
        json.unmarshal::<Json>(&m.marshal::<Json>().unwrap()).unwrap();
        let cbor = Map::<String, u32>::new();
        cbor.unmarshal::<Cbor>(&m.marshal::<Cbor>().unwrap()).unwrap();

        for decoded in [json, cbor] {
            assert_eq!(decoded.len(), 2);
            assert_eq!(decoded.get("x"), 1);
            assert_eq!(decoded.get("y"), 2);
        }
    }

    #[test]
    fn unmarshal_merges_and_respects_freeze() {
        let m = sample();
        m.unmarshal::<Json>(br#"{"b":"2","a":"9"}"#).unwrap();
        assert_eq!(m.get("a"), "9");
        assert_eq!(m.get("b"), "2");

        let frozen = sample().read_only();
        assert!(matches!(
            frozen.unmarshal::<Json>(br#"{"b":"2"}"#),
            Err(Error::ReadOnly)
        ));
        assert!(frozen.marshal::<Json>().is_ok());
    }

    #[test]
    fn eventful_map_publishes_put_and_prior_value_on_delete() {
        let cancel = CancelToken::new();
        let m = Map::<String, u32>::new()
            .safe()
            .eventful(&cancel, HubConfig { broadcast_buffer: 4, client_buffer: 4 });
        let watcher = m.watch().unwrap();

        m.set("k".into(), 1);
        m.delete("missing");
        m.delete("k");

        let put = watcher.recv_timeout(WAIT).unwrap();
        assert_eq!(put, WatchMsg::put("k".to_string(), 1));
        assert!(put.is_put());
        let del = watcher.recv_timeout(WAIT).unwrap();
        assert!(!del.is_put());
        assert_eq!(del.kind, EventKind::Delete);
        assert_eq!(del.value, 1);

        m.unwatch(watcher);
        cancel.cancel();
    }

    #[derive(Serialize, Deserialize)]
    struct Document {
        name: String,
        counts: Map<String, u32, Locked>,
    }

    #[test]
    fn embeds_in_a_larger_document() {
        let text = r#"{"name":"doc","counts":{"x":3}}"#;
        let doc: Document = serde_json::from_str(text).unwrap();
        assert!(doc.counts.is_safe());
        assert_eq!(doc.counts.get("x"), 3);

        doc.counts.set("y".into(), 4);
        let back: serde_json::Value = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["name"], "doc");
        assert_eq!(back["counts"]["y"], 4);
    }

    #[test]
    fn deleting_an_absent_key_is_silent() {
        let cancel = CancelToken::new();
        let m = Map::<String, u32>::new()
            .safe()
            .eventful(&cancel, HubConfig::with_buffer(4));
        let watcher = m.watch().unwrap();

        m.delete("missing");
        assert!(matches!(
            watcher.recv_timeout(Duration::from_millis(200)),
            Err(cairn_channel::RecvTimeoutError::Timeout)
        ));
        m.unwatch(watcher);
        cancel.cancel();
    }

    #[test]
    fn display_marks_safe_maps() {
        assert_eq!(sample().to_string(), "{a: 1}");
        assert_eq!(sample().safe().to_string(), "{a: 1} (safe)");
    }

    #[test]
    fn silent_map_has_no_watch() {
        assert!(sample().watch().is_none());
    }
}
