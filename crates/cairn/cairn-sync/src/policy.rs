//! Guarded handle: per-container choice between unsynchronized and
//! synchronized state.
//!
//! Every container carries a [`LockPolicy`] as a type parameter. The policy
//! decides which cell wraps the container's state:
//!
//! | policy       | cell                    | container is `Sync`? |
//! |--------------|-------------------------|----------------------|
//! | [`Unlocked`] | `RefCell<T>`            | no                   |
//! | [`Locked`]   | `parking_lot::RwLock<T>`| yes (if `T` is)      |
//!
//! The choice is made once, when the container is built, and is visible in
//! its type. An unlocked container cannot be shared between threads at all:
//! the compiler rejects it, so there is no way to retrofit a lock onto an
//! instance that is already in concurrent use.
//!
//! # Guard Discipline
//!
//! - **read**: shared access; any number of readers at once
//! - **write**: exclusive access; excludes readers and other writers
//! - **downgrade**: turn a write guard into a read guard without letting a
//!   writer in between (used by the lazy sort caches)
//!
//! An unlocked cell enforces the same discipline dynamically. Taking a write
//! guard while a read guard from the same cell is alive panics, where the
//! locked variant would deadlock. Callbacks run under a guard must therefore
//! not re-enter the container they were called from.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::cell::{Ref, RefCell, RefMut};
use std::ops::{Deref, DerefMut};

/// Capability shared by the two synchronization variants.
///
/// The policy types themselves are zero-sized markers; all state lives in
/// [`LockPolicy::Cell`].
pub trait LockPolicy: Send + Sync + 'static {
    /// Storage wrapping the guarded value.
    type Cell<T>;

    /// Shared access guard.
    type Read<'a, T: 'a>: Deref<Target = T>
    where
        Self: 'a;

    /// Exclusive access guard.
    type Write<'a, T: 'a>: DerefMut<Target = T>
    where
        Self: 'a;

    /// `true` when the cell is safe to share between threads.
    const SYNCHRONIZED: bool;

    fn new<T>(value: T) -> Self::Cell<T>;

    fn read<'a, T: 'a>(cell: &'a Self::Cell<T>) -> Self::Read<'a, T>;

    fn write<'a, T: 'a>(cell: &'a Self::Cell<T>) -> Self::Write<'a, T>;

    /// Converts exclusive access into shared access.
    ///
    /// For [`Locked`] no writer can slip in between; for [`Unlocked`] there
    /// is no other thread that could.
    fn downgrade<'a, T: 'a>(cell: &'a Self::Cell<T>, guard: Self::Write<'a, T>) -> Self::Read<'a, T>;

    /// Direct access through a unique borrow; no guard needed.
    fn get_mut<T>(cell: &mut Self::Cell<T>) -> &mut T;

    fn into_inner<T>(cell: Self::Cell<T>) -> T;
}

/// No synchronization. Containers using it are `!Sync`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unlocked;

/// Reader/writer lock around the container state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Locked;

impl LockPolicy for Unlocked {
    type Cell<T> = RefCell<T>;
    type Read<'a, T: 'a> = Ref<'a, T>;
    type Write<'a, T: 'a> = RefMut<'a, T>;

    const SYNCHRONIZED: bool = false;

    #[inline]
    fn new<T>(value: T) -> RefCell<T> {
        RefCell::new(value)
    }

    #[inline]
    fn read<'a, T: 'a>(cell: &'a RefCell<T>) -> Ref<'a, T> {
        cell.borrow()
    }

    #[inline]
    fn write<'a, T: 'a>(cell: &'a RefCell<T>) -> RefMut<'a, T> {
        cell.borrow_mut()
    }

    #[inline]
    fn downgrade<'a, T: 'a>(cell: &'a RefCell<T>, guard: RefMut<'a, T>) -> Ref<'a, T> {
        drop(guard);
        cell.borrow()
    }

    #[inline]
    fn get_mut<T>(cell: &mut RefCell<T>) -> &mut T {
        cell.get_mut()
    }

    #[inline]
    fn into_inner<T>(cell: RefCell<T>) -> T {
        cell.into_inner()
    }
}

impl LockPolicy for Locked {
    type Cell<T> = RwLock<T>;
    type Read<'a, T: 'a> = RwLockReadGuard<'a, T>;
    type Write<'a, T: 'a> = RwLockWriteGuard<'a, T>;

    const SYNCHRONIZED: bool = true;

    #[inline]
    fn new<T>(value: T) -> RwLock<T> {
        RwLock::new(value)
    }

    #[inline]
    fn read<'a, T: 'a>(cell: &'a RwLock<T>) -> RwLockReadGuard<'a, T> {
        cell.read()
    }

    #[inline]
    fn write<'a, T: 'a>(cell: &'a RwLock<T>) -> RwLockWriteGuard<'a, T> {
        cell.write()
    }

    #[inline]
    fn downgrade<'a, T: 'a>(
        _cell: &'a RwLock<T>,
        guard: RwLockWriteGuard<'a, T>,
    ) -> RwLockReadGuard<'a, T> {
        RwLockWriteGuard::downgrade(guard)
    }

    #[inline]
    fn get_mut<T>(cell: &mut RwLock<T>) -> &mut T {
        cell.get_mut()
    }

    #[inline]
    fn into_inner<T>(cell: RwLock<T>) -> T {
        cell.into_inner()
    }
}
