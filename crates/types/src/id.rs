//! 32-byte member identifier.
//!
//! Every certified member of the network is identified by the SHA-256
//! subject key identifier of its certificate. All ring placements and
//! comparisons operate on this value.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Size of a member identifier in bytes
pub const ID_SIZE: usize = 32;

/// A 32-byte member identifier.
///
/// This is the SHA-256 subject key identifier taken from a member's
/// certificate. It is the only value used for ring placement, neighbour
/// computation and peer lookup.
///
/// # Example
///
/// ```rust
/// use lampyre_types::PeerId;
///
/// let id = PeerId::new([1u8; 32]);
/// let parsed: PeerId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PeerId([u8; ID_SIZE]);

impl PeerId {
    /// Creates an identifier from a 32-byte array.
    #[inline]
    pub const fn new(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates an identifier from a slice.
    ///
    /// Returns an error if the slice length is not exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != ID_SIZE {
            return Err(Error::InvalidLength {
                expected: ID_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; ID_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Hex-encodes the identifier.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex form for log output (first four bytes).
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.short())
    }
}

impl FromStr for PeerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for PeerId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ID_SIZE]> for PeerId {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }
}

// Hex-string serde so identifiers can key JSON maps on the wire.
impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
