//! ECDSA signatures over the P-256 curve.
//!
//! Notes, accusations, certificates and monitor pongs are all signed with
//! ECDSA P-256; the message bytes are SHA-256 hashed as part of signing.
//! Signatures travel on the wire as raw `(r, s)` scalars
//! ([`lampyre_types::Signature`]) and are converted to and from the checked
//! [`Signature`] type here.

use crate::{CryptoError, Result};
use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature as P256Signature, SigningKey, VerifyingKey,
};
use p256::FieldBytes;
use rand::rngs::OsRng;

/// Byte length of one signature scalar
pub const SCALAR_SIZE: usize = 32;

/// ECDSA P-256 private key.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generates a random private key using the operating system RNG.
    pub fn random() -> Self {
        Self {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    /// Creates a private key from raw scalar bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let inner = SigningKey::from_bytes(FieldBytes::from_slice(bytes))
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Raw scalar bytes of the private key.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes().into()
    }

    /// Derives the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: *self.inner.verifying_key(),
        }
    }

    /// Signs `data` (hashed with SHA-256 internally).
    pub fn sign(&self, data: &[u8]) -> Signature {
        let sig: P256Signature = self.inner.sign(data);
        Signature::from_p256(&sig)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("PrivateKey(..)")
    }
}

/// ECDSA P-256 public key.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    /// Parses a SEC1-encoded public key (compressed or uncompressed).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Compressed SEC1 encoding of the public key.
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.inner.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Verifies `signature` over `data`.
    pub fn verify(&self, data: &[u8], signature: &Signature) -> bool {
        match signature.to_p256() {
            Ok(sig) => self.inner.verify(data, &sig).is_ok(),
            Err(_) => false,
        }
    }

    /// Verifies a wire-form `(r, s)` signature over `data`.
    ///
    /// Malformed scalars verify as `false` rather than erroring; adversarial
    /// input must never abort evaluation.
    pub fn verify_wire(&self, data: &[u8], signature: &lampyre_types::Signature) -> bool {
        match Signature::from_wire(signature) {
            Ok(sig) => self.verify(data, &sig),
            Err(_) => false,
        }
    }
}

/// An ECDSA signature as fixed-width `(r, s)` scalars.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Signature {
    r: [u8; SCALAR_SIZE],
    s: [u8; SCALAR_SIZE],
}

impl Signature {
    /// The `r` scalar.
    pub fn r(&self) -> &[u8; SCALAR_SIZE] {
        &self.r
    }

    /// The `s` scalar.
    pub fn s(&self) -> &[u8; SCALAR_SIZE] {
        &self.s
    }

    /// Converts from the wire representation, checking scalar lengths.
    pub fn from_wire(sig: &lampyre_types::Signature) -> Result<Self> {
        let r: [u8; SCALAR_SIZE] =
            sig.r
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidLength {
                    expected: SCALAR_SIZE,
                    actual: sig.r.len(),
                })?;
        let s: [u8; SCALAR_SIZE] =
            sig.s
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidLength {
                    expected: SCALAR_SIZE,
                    actual: sig.s.len(),
                })?;
        Ok(Self { r, s })
    }

    /// Converts to the wire representation.
    pub fn to_wire(&self) -> lampyre_types::Signature {
        lampyre_types::Signature {
            r: self.r.to_vec(),
            s: self.s.to_vec(),
        }
    }

    fn from_p256(sig: &P256Signature) -> Self {
        let (r, s) = sig.split_bytes();
        Self {
            r: r.into(),
            s: s.into(),
        }
    }

    fn to_p256(&self) -> Result<P256Signature> {
        P256Signature::from_scalars(FieldBytes::from(self.r), FieldBytes::from(self.s))
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_round_trip() {
        let key = PrivateKey::random();
        let sig = key.sign(b"statement");
        assert!(key.public_key().verify(b"statement", &sig));
        assert!(!key.public_key().verify(b"other", &sig));
    }

    #[test]
    fn test_private_key_byte_round_trip() {
        let key = PrivateKey::random();
        let restored = PrivateKey::from_bytes(&key.to_bytes()).unwrap();
        let sig = restored.sign(b"data");
        assert!(key.public_key().verify(b"data", &sig));
    }
}
