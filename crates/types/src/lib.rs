//! # Lampyre Types
//!
//! Core type definitions for the Lampyre membership protocol.
//!
//! This crate provides the fundamental types exchanged between members:
//! - [`PeerId`] - 32-byte member identifiers (certificate subject key ids)
//! - [`RingMask`] - per-member map of enabled rings
//! - [`Note`] and [`Accusation`] - the signed liveness statements of the
//!   protocol
//! - [`State`] and [`StateResponse`] - the gossip exchange envelope
//!
//! All wire messages carry `serde` derives and encode to JSON at the
//! transport boundary via [`wire::encode`] / [`wire::decode`]. The byte
//! strings that signatures cover are produced by the deterministic encoders
//! on the individual messages (`Note::signing_bytes`,
//! `Accusation::signing_bytes`, `Certificate::signing_bytes`) and never
//! include the signature itself.
//!
//! ## Example
//!
//! ```rust
//! use lampyre_types::{PeerId, RingMask};
//!
//! let id = PeerId::new([7u8; 32]);
//! let mut mask = RingMask::all_enabled(10);
//! mask.disable(3);
//!
//! assert!(mask.is_enabled(0));
//! assert!(!mask.is_enabled(3));
//! assert_eq!(id.to_string().len(), 64);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod id;
pub mod mask;
pub mod wire;

// Re-export main types at crate root
pub use id::PeerId;
pub use mask::RingMask;
pub use wire::{
    Accusation, Certificate, Msg, MsgResponse, Note, Ping, Pong, Signature, State, StateResponse,
};

/// Result type alias for type-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while constructing or decoding protocol types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A fixed-size field had the wrong length
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected byte length
        expected: usize,
        /// Actual byte length
        actual: usize,
    },

    /// Hex decoding failed
    #[error("hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Wire encoding or decoding failed
    #[error("wire codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
