//! Per-member record.
//!
//! A record is created the first time a member's certificate validates and
//! holds everything the local node believes about that member: the
//! certificate itself, the freshest verified note, the standing accusations
//! keyed by ring, and the monitor's consecutive-failure counter. The
//! certificate and parsed public key are immutable; the rest sits behind a
//! single mutex so composite updates stay atomic.

use crate::{Error, Result};
use lampyre_crypto::PublicKey;
use lampyre_types::{Accusation, Certificate, Note, PeerId};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;

/// Mutable half of a peer record. Guarded by the record's mutex; the view
/// composes multi-field updates while holding it.
#[derive(Debug, Default)]
pub(crate) struct PeerState {
    pub(crate) note: Option<Note>,
    pub(crate) accusations: HashMap<u32, Accusation>,
    pub(crate) failed_pings: u32,
}

/// Everything known about one certified member.
#[derive(Debug)]
pub struct PeerRecord {
    id: PeerId,
    certificate: Certificate,
    public_key: PublicKey,
    state: Mutex<PeerState>,
}

impl PeerRecord {
    /// Builds a record from a certificate, parsing its public key.
    pub fn new(certificate: Certificate) -> Result<Self> {
        let public_key = PublicKey::from_sec1_bytes(&certificate.public_key)
            .map_err(|e| Error::InvalidCertificate(e.to_string()))?;
        Ok(Self {
            id: certificate.subject_key_id,
            certificate,
            public_key,
            state: Mutex::new(PeerState::default()),
        })
    }

    /// The member's id.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// The member's certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The member's public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The member's gossip endpoint.
    pub fn gossip_addr(&self) -> &str {
        &self.certificate.gossip_addr
    }

    /// The member's monitor ping endpoint.
    pub fn ping_addr(&self) -> &str {
        &self.certificate.ping_addr
    }

    /// The freshest verified note, if any.
    pub fn note(&self) -> Option<Note> {
        self.state.lock().note.clone()
    }

    /// The epoch of the freshest verified note.
    pub fn note_epoch(&self) -> Option<u64> {
        self.state.lock().note.as_ref().map(|n| n.epoch)
    }

    /// All standing accusations against the member.
    pub fn accusations(&self) -> Vec<Accusation> {
        self.state.lock().accusations.values().cloned().collect()
    }

    /// The standing accusation for one ring, if any.
    pub fn ring_accusation(&self, ring: u32) -> Option<Accusation> {
        self.state.lock().accusations.get(&ring).cloned()
    }

    /// Whether any accusation stands against the member.
    pub fn is_accused(&self) -> bool {
        !self.state.lock().accusations.is_empty()
    }

    /// Current consecutive failed-ping count.
    pub fn failed_pings(&self) -> u32 {
        self.state.lock().failed_pings
    }

    /// Records one failed ping and returns the new count.
    pub fn record_failed_ping(&self) -> u32 {
        let mut state = self.state.lock();
        state.failed_pings += 1;
        state.failed_pings
    }

    /// Clears the failed-ping counter after a verified pong.
    pub fn reset_pings(&self) {
        self.state.lock().failed_pings = 0;
    }

    /// Locks the mutable state for a composite update. Lock order is
    /// View → PeerRecord; never take a view lock while holding this.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, PeerState> {
        self.state.lock()
    }
}
