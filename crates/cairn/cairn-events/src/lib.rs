pub mod error;
pub mod watch;
pub mod weighted;

pub use error::{Error, Marshal};
pub use watch::{EventKind, WatchMsg};
pub use weighted::Weighted;

// shared vocabulary for every cairn container crate: the change events a
// hub relays, the weighted value envelope, and the error taxonomy of the
// marshal/unmarshal boundary
