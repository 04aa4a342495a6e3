#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Which mutation produced a [`WatchMsg`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Put,
    Delete,
}

/// Change event published by an eventful container on every mutation.
///
/// For `Put` the value is the one being written; for `Delete` it is the value
/// held just before removal. Events go out before the mutation is applied, so
/// a watcher reacting immediately may still read the old state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchMsg<K, V> {
    pub kind: EventKind,
    pub key: K,
    pub value: V,
}

impl<K, V> WatchMsg<K, V> {
    pub fn put(key: K, value: V) -> Self {
        Self {
            kind: EventKind::Put,
            key,
            value,
        }
    }

    pub fn delete(key: K, value: V) -> Self {
        Self {
            kind: EventKind::Delete,
            key,
            value,
        }
    }

    #[inline]
    pub fn is_put(&self) -> bool {
        self.kind == EventKind::Put
    }
}
