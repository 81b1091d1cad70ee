use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identity of a codec, recorded in every container that uses it.
///
/// Ids below [`CodecId::FIRST_CUSTOM`] belong to the built-in codecs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct CodecId(pub u32);

impl CodecId {
    /// Smallest id a custom codec may use.
    pub const FIRST_CUSTOM: u32 = 64;

    pub fn is_reserved(self) -> bool {
        self.0 < Self::FIRST_CUSTOM
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
