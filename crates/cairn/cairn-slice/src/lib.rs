mod rigid;
mod slice;

pub use rigid::{Bounded, Rigid, excess};
pub use slice::{Commit, Slice};
