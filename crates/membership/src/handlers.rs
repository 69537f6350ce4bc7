//! Inbound RPC entry points and the evaluation kernel.
//!
//! The three `eval_*` functions are the protocol's acceptance logic for
//! certificates, notes and accusations. They are total: adversarial input
//! produces an [`Error`], never a panic, and no error here is fatal to the
//! node. Transports dispatch decoded requests to [`Node::handle_spread`],
//! [`Node::handle_messenger`] and [`Node::handle_ping`], passing the
//! certificate the authenticated channel presented for the sender.

use crate::node::{Node, NodeEvent};
use crate::view::{AccusationOutcome, NoteOutcome};
use crate::{Error, Result};
use lampyre_crypto::identity::derive_peer_id;
use lampyre_crypto::PublicKey;
use lampyre_types::{
    Accusation, Certificate, Msg, MsgResponse, Note, PeerId, Ping, Pong, State, StateResponse,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Logs an evaluation error at the severity its disposition calls for.
fn log_eval(context: &'static str, err: &Error) {
    if err.is_benign() {
        debug!(context, "{err}");
    } else {
        warn!(context, "{err}");
    }
}

impl Node {
    // ------------------------------------------------------------------
    // RPC entry points
    // ------------------------------------------------------------------

    /// Serves one gossip exchange from the member authenticated as
    /// `sender`.
    ///
    /// Neighbours get a full view diff; observed non-neighbours get either
    /// their standing accusations (so a falsely silent member learns it
    /// must rebut) or a `NotMyNeighbour` refusal; unknown members get a
    /// bootstrap package of our certificate and note plus those of their
    /// future neighbours.
    pub async fn handle_spread(&self, sender: &Certificate, state: State) -> Result<StateResponse> {
        let remote_id = sender.subject_key_id;
        let observed = self.view.contains(&remote_id);
        let should = self.view.should_be_neighbour(&remote_id);

        let mut reply = StateResponse::default();

        if should {
            if let Err(err) = self.eval_certificate(sender) {
                log_eval("spread", &err);
                return Err(err);
            }
            if let Err(err) = self.eval_note(&state.own_note) {
                log_eval("spread", &err);
            }

            // An empty host digest marks a rebuttal-only exchange; there
            // is nothing to diff.
            if !state.existing_hosts.is_empty() {
                self.merge_views(&state.existing_hosts, &mut reply);
            }

            if let Some(payload) = state.external_gossip {
                let handler = self.gossip_handler.read().clone();
                if let Some(handler) = handler {
                    match handler(payload) {
                        Ok(response) => reply.external_gossip = Some(response),
                        Err(err) => error!("gossip handler failed: {err}"),
                    }
                }
            }
        } else if observed {
            let peer = self.view.peer(&remote_id).ok_or(Error::NoPeer(remote_id))?;

            if let Err(err) = self.eval_note(&state.own_note) {
                log_eval("spread", &err);
            }

            if !peer.is_accused() {
                return Err(Error::NotMyNeighbour);
            }

            // The sender is accused and contacting the wrong members:
            // likely it never saw the accusations. Send them all so it
            // can rebut.
            reply.accusations = peer.accusations();
        } else {
            if let Err(err) = self.eval_certificate(sender) {
                log_eval("spread", &err);
                return Err(err);
            }
            if let Err(err) = self.eval_note(&state.own_note) {
                log_eval("spread", &err);
            }

            // Help the new member integrate.
            reply.certificates.push(self.identity.certificate().clone());
            reply.notes.push(self.view.local_note());
            for neighbour in self.view.find_neighbours(&remote_id) {
                reply.certificates.push(neighbour.certificate().clone());
                if let Some(note) = neighbour.note() {
                    reply.notes.push(note);
                }
            }
        }

        Ok(reply)
    }

    /// Serves one application message from the member authenticated as
    /// `sender`.
    pub fn handle_messenger(&self, sender: &Certificate, msg: Msg) -> Result<MsgResponse> {
        if !self.identity.ca().verify_certificate(sender) {
            return Err(Error::InvalidCertificate(
                "sender certificate failed CA validation".to_string(),
            ));
        }

        let handler = self.msg_handler.read().clone();
        let content = match handler {
            Some(handler) => handler(msg.content).map_err(|e| Error::Handler(e.to_string()))?,
            None => Default::default(),
        };
        Ok(MsgResponse { content })
    }

    /// Serves one monitor challenge: signs the nonce and echoes it.
    pub fn handle_ping(&self, ping: Ping) -> Pong {
        let signature = self.identity.sign(&ping.nonce);
        Pong {
            nonce: ping.nonce,
            signature,
        }
    }

    // ------------------------------------------------------------------
    // View merging
    // ------------------------------------------------------------------

    /// Computes the diff between our view and a partner's host digest:
    /// certificates they lack, notes fresher than their epochs, and every
    /// accusation we hold. Notes are epoch-gated to bound bandwidth;
    /// accusations go wholesale because withholding one can mask an
    /// attack.
    pub(crate) fn merge_views(&self, given: &HashMap<PeerId, u64>, reply: &mut StateResponse) {
        for peer in self.view.full_records() {
            match given.get(&peer.id()) {
                None => {
                    reply.certificates.push(peer.certificate().clone());
                    if let Some(note) = peer.note() {
                        reply.notes.push(note);
                    }
                }
                Some(epoch) => {
                    if let Some(note) = peer.note() {
                        if note.epoch > *epoch {
                            reply.notes.push(note);
                        }
                    }
                }
            }
            reply.accusations.extend(peer.accusations());
        }

        let local_note = self.view.local_note();
        match given.get(&self.id()) {
            Some(epoch) if local_note.epoch <= *epoch => {}
            _ => reply.notes.push(local_note),
        }
    }

    /// Feeds a gossip response through the evaluation kernel.
    pub(crate) async fn merge_response(&self, response: StateResponse) {
        for certificate in &response.certificates {
            if let Err(err) = self.eval_certificate(certificate) {
                log_eval("merge certificate", &err);
            }
        }
        for note in &response.notes {
            if note.id == self.id() {
                continue;
            }
            if let Err(err) = self.eval_note(note) {
                log_eval("merge note", &err);
            }
        }
        for accusation in &response.accusations {
            if let Err(err) = self.eval_accusation(accusation).await {
                log_eval("merge accusation", &err);
            }
        }
        if let Some(payload) = response.external_gossip {
            let handler = self.response_handler.read().clone();
            if let Some(handler) = handler {
                handler(payload);
            }
        }
    }

    // ------------------------------------------------------------------
    // Evaluation kernel
    // ------------------------------------------------------------------

    /// Accepts a certificate into the full view.
    ///
    /// The subject key id must be derived from the embedded public key and
    /// the CA signature must verify. Idempotent for known members.
    pub fn eval_certificate(&self, certificate: &Certificate) -> Result<()> {
        if certificate.subject_key_id == self.id() {
            return Err(Error::SelfCertificate);
        }

        let public_key = PublicKey::from_sec1_bytes(&certificate.public_key)
            .map_err(|e| Error::InvalidCertificate(e.to_string()))?;
        if derive_peer_id(&public_key) != certificate.subject_key_id {
            return Err(Error::InvalidId);
        }
        if !self.identity.ca().verify_certificate(certificate) {
            return Err(Error::InvalidCertificate(
                "not signed by the trusted certificate authority".to_string(),
            ));
        }

        let (_, inserted) = self.view.add_full(certificate.clone())?;
        if inserted {
            debug!(
                peer = %certificate.subject_key_id.short(),
                "certified new member into full view"
            );
        }
        Ok(())
    }

    /// Accepts a note: stores it if fresher and verified, removes the
    /// accusations it rebuts and restores the member to the live view once
    /// none remain. Repeated application never changes state.
    pub fn eval_note(&self, note: &Note) -> Result<()> {
        let peer = self.view.peer(&note.id).ok_or(Error::NoPeer(note.id))?;

        if let Some(epoch) = peer.note_epoch() {
            if note.epoch <= epoch {
                return Err(Error::OldNote(note.id));
            }
        }
        if !self.view.valid_mask(&note.mask) {
            return Err(Error::InvalidMask);
        }
        if !peer
            .public_key()
            .verify_wire(&note.to_signing_bytes(), &note.signature)
        {
            return Err(Error::InvalidSignature);
        }

        let outcome: NoteOutcome = self.view.commit_note(&peer, note.clone());
        if !outcome.rebutted_rings.is_empty() {
            debug!(
                peer = %note.id.short(),
                epoch = note.epoch,
                rings = ?outcome.rebutted_rings,
                "rebuttal received"
            );
            self.emit(NodeEvent::MemberRebutted(note.id));
        }
        if outcome.became_live {
            debug!(peer = %note.id.short(), epoch = note.epoch, "member entered live view");
            self.emit(NodeEvent::MemberJoined(note.id));
        }
        Ok(())
    }

    /// Accepts an accusation.
    ///
    /// An accusation against us triggers a rebuttal when it targets our
    /// current note on an enabled ring. Against others it must name the
    /// accused's current epoch and an enabled ring, come from the ring
    /// predecessor, and verify under the accuser's key; it then opens the
    /// death timer if none is running.
    pub async fn eval_accusation(&self, accusation: &Accusation) -> Result<()> {
        if accusation.accused == self.id() {
            if self.view.should_rebuttal(accusation.epoch, accusation.ring) {
                warn!(
                    accuser = %accusation.accuser.short(),
                    ring = accusation.ring,
                    "accused of being dead, issuing rebuttal"
                );
                let strategy = Arc::clone(&self.strategy);
                strategy.rebuttal(self).await;
                return Ok(());
            }
            return Err(Error::InvalidSelfAccusation);
        }

        let accuser_key = if accusation.accuser == self.id() {
            self.identity.public_key()
        } else {
            *self
                .view
                .peer(&accusation.accuser)
                .ok_or(Error::NoPeer(accusation.accuser))?
                .public_key()
        };

        let accused = self
            .view
            .peer(&accusation.accused)
            .ok_or(Error::NoPeer(accusation.accused))?;

        if let Some(existing) = accused.ring_accusation(accusation.ring) {
            if existing.matches(
                &accusation.accused,
                &accusation.accuser,
                accusation.ring,
                accusation.epoch,
            ) {
                // Known accusation; make sure its timer survived.
                if self.view.is_alive(&accused.id()) && !self.view.has_timer(&accused.id()) {
                    if let Some(note) = accused.note() {
                        debug!(
                            peer = %accused.id().short(),
                            "stored accusation had no timer, starting one"
                        );
                        self.view
                            .start_timer(&accused, note, Some(accusation.accuser));
                    }
                }
                return Err(Error::AccusationExists);
            }
        }

        match accused.note_epoch() {
            Some(epoch) if epoch == accusation.epoch => {}
            _ => return Err(Error::InvalidEpoch),
        }
        let mask = accused.note().map(|n| n.mask);
        if mask
            .map(|m| self.view.is_ring_disabled(&m, accusation.ring))
            .unwrap_or(true)
        {
            return Err(Error::DisabledRing(accusation.ring));
        }
        if !self
            .view
            .valid_accuser(&accusation.accused, &accusation.accuser, accusation.ring)
        {
            return Err(Error::InvalidAccuser);
        }
        if !accuser_key.verify_wire(&accusation.to_signing_bytes(), &accusation.signature) {
            return Err(Error::InvalidSignature);
        }

        match self.view.commit_accusation(&accused, accusation.clone()) {
            AccusationOutcome::Stored { timer_started } => {
                debug!(
                    accused = %accusation.accused.short(),
                    accuser = %accusation.accuser.short(),
                    ring = accusation.ring,
                    epoch = accusation.epoch,
                    timer_started,
                    "accusation stored"
                );
                self.emit(NodeEvent::MemberAccused {
                    id: accusation.accused,
                    ring: accusation.ring,
                });
                Ok(())
            }
            AccusationOutcome::EpochMismatch => Err(Error::InvalidEpoch),
        }
    }
}
