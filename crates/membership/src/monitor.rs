//! The failure monitor.
//!
//! Every monitor interval the node challenges its successor on each ring
//! it participates in. The challenge is a random nonce the successor must
//! sign; only a missing or malformed answer counts as a failure, never a
//! slow one that eventually arrives. After `ping_retry_limit` consecutive
//! failures the monitor signs an accusation naming the successor's current
//! note epoch and feeds it through the local evaluation kernel, which
//! stores it and opens the death timer.

use crate::node::Node;
use crate::peer::PeerRecord;
use lampyre_types::{wire::NONCE_SIZE, Accusation, Ping};
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl Node {
    /// One monitor round of the correct strategy.
    pub(crate) async fn monitor_round(&self) {
        let mask = self.view.local_mask();
        for ring in 0..self.protocol.num_rings {
            // A withdrawn ring is not ours to monitor.
            if mask.is_disabled(ring) {
                continue;
            }
            let Some(successor) = self.view.successor_to_monitor(ring) else {
                continue;
            };

            if self.challenge(&successor).await {
                continue;
            }

            let failures = successor.record_failed_ping();
            debug!(
                peer = %successor.id().short(),
                ring,
                failures,
                "monitor challenge failed"
            );
            if failures >= self.protocol.ping_retry_limit {
                self.accuse(&successor, ring).await;
            }
        }
    }

    /// One monitor round of the spam strategy: fabricate an accusation
    /// against every member we hold a note for, regardless of ring
    /// position, and store them locally so our gossip replies carry them.
    pub(crate) async fn fabricate_accusations(&self) {
        for peer in self.view.full_records() {
            let Some(note) = peer.note() else {
                continue;
            };
            warn!(
                accused = %peer.id().short(),
                epoch = note.epoch,
                "fabricating accusation"
            );
            let accusation = self.sign_accusation(&peer, note.epoch, 0);
            // Bypass accuser validation: we are deliberately not the
            // predecessor. Correct receivers reject these.
            self.view.commit_accusation(&peer, accusation);
        }
    }

    /// Challenges a member once. True on a verified pong.
    async fn challenge(&self, peer: &Arc<PeerRecord>) -> bool {
        let mut nonce = vec![0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        match self
            .transport
            .ping(peer.ping_addr(), Ping { nonce: nonce.clone() })
            .await
        {
            Ok(pong) => {
                let fresh = pong.nonce == nonce;
                let verified = fresh && peer.public_key().verify_wire(&pong.nonce, &pong.signature);
                if verified {
                    peer.reset_pings();
                } else {
                    debug!(peer = %peer.id().short(), "pong failed nonce verification");
                }
                verified
            }
            Err(err) => {
                debug!(peer = %peer.id().short(), "monitor ping failed: {err}");
                false
            }
        }
    }

    /// Signs and locally applies an accusation against an unresponsive
    /// successor.
    async fn accuse(&self, peer: &Arc<PeerRecord>, ring: u32) {
        let Some(note) = peer.note() else {
            debug!(
                peer = %peer.id().short(),
                "successor unresponsive but we hold no note to accuse against"
            );
            return;
        };

        info!(
            accused = %peer.id().short(),
            ring,
            epoch = note.epoch,
            "successor unresponsive, accusing"
        );
        let accusation = self.sign_accusation(peer, note.epoch, ring);
        if let Err(err) = self.eval_accusation(&accusation).await {
            if err.is_benign() {
                debug!("local accusation not stored: {err}");
            } else {
                warn!("local accusation rejected: {err}");
            }
        }
    }

    fn sign_accusation(&self, peer: &Arc<PeerRecord>, epoch: u64, ring: u32) -> Accusation {
        let accused = peer.id();
        let accuser = self.id();
        let mask = peer
            .note()
            .map(|n| n.mask)
            .unwrap_or_else(|| self.view.local_mask());
        let signature = self.identity.sign(&Accusation::signing_bytes(
            &accused, &accuser, epoch, ring, &mask,
        ));
        Accusation {
            accused,
            accuser,
            epoch,
            ring,
            mask,
            signature,
        }
    }
}
