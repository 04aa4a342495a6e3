//! Concurrency-aware key/value containers.
//!
//! - [`Map`]: the base container (optionally locked, frozen, eventful)
//! - [`OrderedMap`]: adds a lazily rebuilt, comparator-sorted key view
//! - [`WeightedMap`]: adds per-entry priorities, highest first
//! - [`Bucket`]: prefix-scoped view over a string-keyed map
//!
//! All of them implement [`Container`], which is also implemented for
//! `Option<C>` so a missing container reads as empty and ignores writes.

mod bucket;
mod compare;
mod container;
mod map;
mod ordered;
mod table;
mod weighted;

pub use bucket::{Bucket, BucketWatch};
pub use compare::differs;
pub use container::{Container, Lookup};
pub use map::{Commit, Iter, Map};
pub use ordered::{Comparator, OrderedMap};
pub use weighted::{WeightGroup, WeightGroups, WeightedMap};

pub use cairn_channel::{CancelToken, Client, HubConfig};
pub use cairn_events::{Error, EventKind, Marshal, WatchMsg, Weighted};
pub use cairn_sync::{LockPolicy, Locked, Unlocked};
