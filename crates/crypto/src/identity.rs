//! Member identities and the certificate interface.
//!
//! Members are identified by compact certificates issued by a shared
//! certificate authority. The subject key id, the SHA-256 of the SEC1
//! public key encoding, is the member's [`PeerId`] and drives every ring
//! placement. The authority itself runs outside the membership core; this
//! module carries both halves of the interface so deployment tooling and
//! tests can mint identities.

use crate::ecdsa::{PrivateKey, PublicKey};
use crate::hash::sha256;
use crate::{CryptoError, Result};
use lampyre_types::{Certificate, PeerId};

/// Derives the subject key id for a public key.
pub fn derive_peer_id(public_key: &PublicKey) -> PeerId {
    PeerId::new(sha256(&public_key.to_sec1_bytes()))
}

/// The trusted CA root a node validates member certificates against.
#[derive(Clone, Debug)]
pub struct CaCertificate {
    public_key: PublicKey,
}

impl CaCertificate {
    /// Wraps a CA public key as a trust root.
    pub fn new(public_key: PublicKey) -> Self {
        Self { public_key }
    }

    /// The CA public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Validates a member certificate: the subject key id must match the
    /// embedded public key and the CA signature must verify.
    pub fn verify_certificate(&self, cert: &Certificate) -> bool {
        let Ok(subject_key) = PublicKey::from_sec1_bytes(&cert.public_key) else {
            return false;
        };
        if derive_peer_id(&subject_key) != cert.subject_key_id {
            return false;
        }
        self.public_key
            .verify_wire(&cert.to_signing_bytes(), &cert.signature)
    }
}

/// The issuing half of the certificate authority interface.
///
/// Production deployments run this inside the external CA service; tests
/// and local clusters use it directly.
#[derive(Clone, Debug)]
pub struct CertificateAuthority {
    key: PrivateKey,
}

impl CertificateAuthority {
    /// Creates an authority from an existing CA key.
    pub fn new(key: PrivateKey) -> Self {
        Self { key }
    }

    /// Creates an authority with a fresh random key.
    pub fn random() -> Self {
        Self::new(PrivateKey::random())
    }

    /// The root certificate members trust.
    pub fn root(&self) -> CaCertificate {
        CaCertificate::new(self.key.public_key())
    }

    /// Issues a certificate binding `public_key` to the given addresses.
    pub fn issue(
        &self,
        public_key: &PublicKey,
        gossip_addr: &str,
        ping_addr: &str,
        http_addr: Option<&str>,
    ) -> Certificate {
        let subject_key_id = derive_peer_id(public_key);
        let public_key = public_key.to_sec1_bytes();
        let signing_bytes = Certificate::signing_bytes(
            &subject_key_id,
            &public_key,
            gossip_addr,
            ping_addr,
            http_addr,
        );
        let signature = self.key.sign(&signing_bytes).to_wire();

        Certificate {
            subject_key_id,
            public_key,
            gossip_addr: gossip_addr.to_string(),
            ping_addr: ping_addr.to_string(),
            http_addr: http_addr.map(str::to_string),
            signature,
        }
    }
}

/// The complete local identity a node starts with: its private key, its
/// issued certificate, and the CA root it trusts.
#[derive(Clone, Debug)]
pub struct NodeIdentity {
    keypair: PrivateKey,
    certificate: Certificate,
    ca: CaCertificate,
}

impl NodeIdentity {
    /// Binds a private key, certificate and trust root together.
    ///
    /// Fails if the certificate does not embed the key's public half, or is
    /// not signed by the given CA.
    pub fn new(keypair: PrivateKey, certificate: Certificate, ca: CaCertificate) -> Result<Self> {
        if certificate.public_key != keypair.public_key().to_sec1_bytes() {
            return Err(CryptoError::CertificateKeyMismatch);
        }
        if !ca.verify_certificate(&certificate) {
            return Err(CryptoError::UntrustedCertificate);
        }
        Ok(Self {
            keypair,
            certificate,
            ca,
        })
    }

    /// The local member id.
    pub fn id(&self) -> PeerId {
        self.certificate.subject_key_id
    }

    /// The local certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The trusted CA root.
    pub fn ca(&self) -> &CaCertificate {
        &self.ca
    }

    /// The local public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Signs `data` with the local private key, in wire form.
    pub fn sign(&self, data: &[u8]) -> lampyre_types::Signature {
        self.keypair.sign(data).to_wire()
    }
}
