//! # Lampyre Crypto
//!
//! Cryptographic primitives for the Lampyre membership protocol.
//!
//! This crate provides:
//! - **SHA-256 hashing** - member ids and ring placement keys
//! - **ECDSA P-256 signatures** - notes, accusations, certificates, pongs
//! - **Certificates** - the compact CA-issued identity documents members
//!   exchange, and the issuing/validation halves of that interface
//!
//! ## Example
//!
//! ```rust
//! use lampyre_crypto::{ecdsa::PrivateKey, identity::CertificateAuthority};
//!
//! // The CA side, run by the (external) authority service.
//! let ca = CertificateAuthority::random();
//!
//! // A member key and its issued certificate.
//! let key = PrivateKey::random();
//! let cert = ca.issue(&key.public_key(), "127.0.0.1:9000", "127.0.0.1:9001", None);
//!
//! assert!(ca.root().verify_certificate(&cert));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod ecdsa;
pub mod hash;
pub mod identity;

// Re-export commonly used items
pub use ecdsa::{PrivateKey, PublicKey, Signature};
pub use hash::{sha256, sha256_concat};
pub use identity::{CaCertificate, CertificateAuthority, NodeIdentity};

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Error types for cryptographic operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Invalid private key bytes
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid public key bytes
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature bytes
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Invalid input length
    #[error("invalid input length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected byte length
        expected: usize,
        /// Actual byte length
        actual: usize,
    },

    /// A certificate's public key does not match the local private key
    #[error("certificate public key does not match the supplied private key")]
    CertificateKeyMismatch,

    /// A certificate failed validation against the trusted CA root
    #[error("certificate is not signed by the trusted certificate authority")]
    UntrustedCertificate,
}
