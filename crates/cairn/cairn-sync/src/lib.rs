mod policy;

pub use policy::{LockPolicy, Locked, Unlocked};
