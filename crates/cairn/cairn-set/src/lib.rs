//! Membership containers built on the cairn maps and buffers.
//!
//! - [`Set`]: value-only map, encoded as a sequence of members
//! - [`RigidSet`]: bounded buffer that admits each distinct value once

mod rigid;
mod set;

pub use rigid::RigidSet;
pub use set::{Members, Set};
