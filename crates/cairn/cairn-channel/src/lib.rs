mod cancel;
mod hub;
mod multi;

pub use cancel::CancelToken;
pub use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
pub use hub::{Client, ClientId, Hub, HubConfig};
pub use multi::merge;
