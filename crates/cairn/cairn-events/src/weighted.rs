#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

// Weight is priority metadata only: higher sorts first, 0 is the lowest and
// the default for plain inserts. It is never written to the wire by the
// weighted map, which encodes bare values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Weighted<V> {
    pub value: V,
    pub weight: u32,
}

impl<V> Weighted<V> {
    #[inline]
    pub fn new(value: V, weight: u32) -> Self {
        Self { value, weight }
    }

    /// Value with the lowest priority.
    #[inline]
    pub fn lowest(value: V) -> Self {
        Self { value, weight: 0 }
    }

    pub fn into_value(self) -> V {
        self.value
    }
}
