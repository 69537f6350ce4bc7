//! Per-member ring participation mask.
//!
//! Each member announces in its note which of the K rings it participates
//! in. A disabled ring withdraws the member from monitoring and accusation
//! on that ring; validity limits how many rings may be disabled at once so
//! that no member can make itself unmonitorable.

use serde::{Deserialize, Serialize};

/// Ring participation mask, one byte per ring.
///
/// Byte `i` is nonzero when ring `i` is enabled for the member. The mask
/// travels inside every [`Note`](crate::Note) and is copied into each
/// [`Accusation`](crate::Accusation) at accusation time.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RingMask(Vec<u8>);

impl RingMask {
    /// A mask with every one of `num_rings` rings enabled.
    pub fn all_enabled(num_rings: u32) -> Self {
        Self(vec![1u8; num_rings as usize])
    }

    /// Builds a mask from raw bytes, one byte per ring.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Number of rings the mask covers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the mask covers no rings at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether ring `ring` is enabled. Out-of-range rings read as disabled.
    pub fn is_enabled(&self, ring: u32) -> bool {
        self.0.get(ring as usize).is_some_and(|b| *b != 0)
    }

    /// Whether ring `ring` is disabled.
    pub fn is_disabled(&self, ring: u32) -> bool {
        !self.is_enabled(ring)
    }

    /// Enables ring `ring`. Out-of-range indices are ignored.
    pub fn enable(&mut self, ring: u32) {
        if let Some(b) = self.0.get_mut(ring as usize) {
            *b = 1;
        }
    }

    /// Disables ring `ring`. Out-of-range indices are ignored.
    pub fn disable(&mut self, ring: u32) {
        if let Some(b) = self.0.get_mut(ring as usize) {
            *b = 0;
        }
    }

    /// Number of disabled rings.
    pub fn disabled_count(&self) -> usize {
        self.0.iter().filter(|b| **b == 0).count()
    }

    /// Raw mask bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
