//! Error taxonomy for the marshal/unmarshal boundary.
//!
//! Every other container operation degrades to a zero value or a no-op; only
//! the codec boundary reports failure, because silently skipping a decode
//! would leave external state out of sync with what the caller believes.

use cairn_codec::{Codec, CodecError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted on a container that does not exist.
    #[error("container is nil")]
    NilContainer,

    /// Decode attempted into a frozen container.
    #[error("container is read-only")]
    ReadOnly,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Conversion of a container's content to and from a [`Codec`] payload.
///
/// Implemented by every container and forwarded through `&C`, `Arc<C>` and
/// `Option<C>`. The `Option` form is how "no container yet" is represented:
/// `None` answers both directions with [`Error::NilContainer`].
pub trait Marshal {
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error>;

    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error>;
}

impl<M: Marshal + ?Sized> Marshal for &M {
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error> {
        (**self).marshal::<C>()
    }

    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error> {
        (**self).unmarshal::<C>(bytes)
    }
}

impl<M: Marshal + ?Sized> Marshal for Arc<M> {
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error> {
        (**self).marshal::<C>()
    }

    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error> {
        (**self).unmarshal::<C>(bytes)
    }
}

impl<M: Marshal> Marshal for Option<M> {
    fn marshal<C: Codec>(&self) -> Result<Vec<u8>, Error> {
        match self {
            Some(m) => m.marshal::<C>(),
            None => Err(Error::NilContainer),
        }
    }

    fn unmarshal<C: Codec>(&self, bytes: &[u8]) -> Result<(), Error> {
        match self {
            Some(m) => m.unmarshal::<C>(bytes),
            None => Err(Error::NilContainer),
        }
    }
}
