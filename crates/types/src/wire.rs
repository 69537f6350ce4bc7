//! Wire messages of the membership protocol.
//!
//! This module defines:
//! - The signed statements: [`Note`], [`Accusation`], [`Certificate`]
//! - The gossip exchange envelope: [`State`] / [`StateResponse`]
//! - Application messaging: [`Msg`] / [`MsgResponse`]
//! - The monitor challenge: [`Ping`] / [`Pong`]
//!
//! Messages serialize with `serde`; [`encode`] / [`decode`] produce the
//! transport representation. Signing inputs are built by the
//! `signing_bytes` constructors below: a fixed domain tag, then each field
//! in declaration order, fixed-width integers big-endian and variable
//! fields length-prefixed with a u32. Signatures are never part of their
//! own signing input.

use crate::{PeerId, Result, RingMask};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;

/// Domain tag for note signing inputs
const NOTE_DOMAIN: &[u8] = b"lampyre/note/v1";
/// Domain tag for accusation signing inputs
const ACCUSATION_DOMAIN: &[u8] = b"lampyre/accusation/v1";
/// Domain tag for certificate signing inputs
const CERTIFICATE_DOMAIN: &[u8] = b"lampyre/certificate/v1";

/// Size of a monitor ping nonce in bytes
pub const NONCE_SIZE: usize = 32;

/// Encodes a wire message for transport.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(msg)?)
}

/// Decodes a wire message received from transport.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(data)?)
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// An ECDSA signature as raw `(r, s)` scalars.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Signature {
    /// The `r` scalar, 32 bytes
    pub r: Vec<u8>,
    /// The `s` scalar, 32 bytes
    pub s: Vec<u8>,
}

/// A member certificate issued by the shared certificate authority.
///
/// The subject key id is the SHA-256 of the SEC1 public key encoding and
/// doubles as the member's [`PeerId`]. Addresses are carried verbatim from
/// issuance. The CA signature covers every field except itself.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Certificate {
    /// Subject key identifier, the member's network id
    pub subject_key_id: PeerId,
    /// SEC1-encoded ECDSA P-256 public key
    pub public_key: Vec<u8>,
    /// Gossip RPC endpoint address
    pub gossip_addr: String,
    /// Monitor ping endpoint address
    pub ping_addr: String,
    /// Optional HTTP debug endpoint address
    pub http_addr: Option<String>,
    /// CA signature over the fields above
    pub signature: Signature,
}

impl Certificate {
    /// Deterministic signing input for a certificate with the given fields.
    pub fn signing_bytes(
        subject_key_id: &PeerId,
        public_key: &[u8],
        gossip_addr: &str,
        ping_addr: &str,
        http_addr: Option<&str>,
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(CERTIFICATE_DOMAIN);
        out.extend_from_slice(subject_key_id.as_bytes());
        put_bytes(&mut out, public_key);
        put_bytes(&mut out, gossip_addr.as_bytes());
        put_bytes(&mut out, ping_addr.as_bytes());
        put_bytes(&mut out, http_addr.unwrap_or("").as_bytes());
        out
    }

    /// The signing input for this certificate.
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        Self::signing_bytes(
            &self.subject_key_id,
            &self.public_key,
            &self.gossip_addr,
            &self.ping_addr,
            self.http_addr.as_deref(),
        )
    }
}

/// A member's periodic, self-signed liveness statement.
///
/// The epoch is a logical clock only the member itself advances; a note
/// with a higher epoch than every outstanding accusation against the
/// member rebuts those accusations.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Note {
    /// Issuing member
    pub id: PeerId,
    /// Logical timestamp, strictly increasing per member
    pub epoch: u64,
    /// Ring participation mask at issue time
    pub mask: RingMask,
    /// The member's signature over `(epoch, id, mask)`
    pub signature: Signature,
}

impl Note {
    /// Deterministic signing input for a note with the given fields.
    pub fn signing_bytes(id: &PeerId, epoch: u64, mask: &RingMask) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(NOTE_DOMAIN);
        out.extend_from_slice(&epoch.to_be_bytes());
        out.extend_from_slice(id.as_bytes());
        put_bytes(&mut out, mask.as_bytes());
        out
    }

    /// The signing input for this note.
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        Self::signing_bytes(&self.id, self.epoch, &self.mask)
    }

    /// Whether a statement at `epoch` supersedes this note.
    pub fn superseded_by(&self, epoch: u64) -> bool {
        epoch > self.epoch
    }
}

/// A signed claim that a member appears dead on one ring.
///
/// Only the accused member's immediate ring predecessor may issue the
/// accusation, and its epoch must match the accused's current note.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Accusation {
    /// The member claimed dead
    pub accused: PeerId,
    /// The ring predecessor making the claim
    pub accuser: PeerId,
    /// Epoch of the accused's note at accusation time
    pub epoch: u64,
    /// Ring the accusation applies to
    pub ring: u32,
    /// Copy of the accused's mask at accusation time
    pub mask: RingMask,
    /// The accuser's signature over the fields above
    pub signature: Signature,
}

impl Accusation {
    /// Deterministic signing input for an accusation with the given fields.
    pub fn signing_bytes(
        accused: &PeerId,
        accuser: &PeerId,
        epoch: u64,
        ring: u32,
        mask: &RingMask,
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(96);
        out.extend_from_slice(ACCUSATION_DOMAIN);
        out.extend_from_slice(&epoch.to_be_bytes());
        out.extend_from_slice(accused.as_bytes());
        out.extend_from_slice(accuser.as_bytes());
        out.extend_from_slice(&ring.to_be_bytes());
        put_bytes(&mut out, mask.as_bytes());
        out
    }

    /// The signing input for this accusation.
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        Self::signing_bytes(&self.accused, &self.accuser, self.epoch, self.ring, &self.mask)
    }

    /// Whether this is the same claim as `(accused, accuser, ring, epoch)`.
    pub fn matches(&self, accused: &PeerId, accuser: &PeerId, ring: u32, epoch: u64) -> bool {
        self.accused == *accused
            && self.accuser == *accuser
            && self.ring == ring
            && self.epoch == epoch
    }

    /// Whether a note at `epoch` rebuts this accusation.
    pub fn invalidated_by(&self, epoch: u64) -> bool {
        epoch > self.epoch
    }
}

/// The gossip request one member sends a neighbour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct State {
    /// The sender's current note
    pub own_note: Note,
    /// Epoch of the freshest note the sender holds per known member,
    /// zero for members it knows only by certificate. Empty for
    /// rebuttal-only exchanges.
    pub existing_hosts: HashMap<PeerId, u64>,
    /// Opportunistic application payload, if the host set one
    pub external_gossip: Option<Bytes>,
}

/// The receiver's reply to a [`State`] request: everything the sender
/// appears to be missing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StateResponse {
    /// Certificates of members absent from the sender's view
    pub certificates: Vec<Certificate>,
    /// Notes fresher than the sender's recorded epochs
    pub notes: Vec<Note>,
    /// All accusations held against members of the reply
    pub accusations: Vec<Accusation>,
    /// Application handler reply to the request payload
    pub external_gossip: Option<Bytes>,
}

impl StateResponse {
    /// True when the response carries no protocol state at all.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
            && self.notes.is_empty()
            && self.accusations.is_empty()
            && self.external_gossip.is_none()
    }
}

/// A direct application message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Msg {
    /// Opaque application content
    pub content: Bytes,
}

/// Reply to a direct application message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MsgResponse {
    /// Opaque application reply
    pub content: Bytes,
}

/// A monitor liveness challenge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ping {
    /// Fresh random challenge bytes
    pub nonce: Vec<u8>,
}

/// Answer to a monitor challenge: the nonce signed by the responder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pong {
    /// Echo of the challenge nonce
    pub nonce: Vec<u8>,
    /// Responder's signature over the nonce
    pub signature: Signature,
}
