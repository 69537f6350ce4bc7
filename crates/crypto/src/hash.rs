//! SHA-256 hashing helpers.
//!
//! Member ids are SHA-256 digests of public keys, and every ring orders
//! its members by `SHA-256(ring_index || id)`. Both uses go through the
//! helpers here.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes the SHA-256 digest of the concatenation of `parts`.
///
/// Avoids materializing the concatenated buffer.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        let digest = sha256(b"");
        assert_eq!(
            hex::encode(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_concat_equals_joined_input() {
        let joined = sha256(b"hello world");
        let parts = sha256_concat(&[b"hello", b" ", b"world"]);
        assert_eq!(joined, parts);
    }
}
