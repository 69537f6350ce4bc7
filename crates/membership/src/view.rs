//! The concurrent membership view.
//!
//! Two overlapping sets over peer records: the **full view** of every
//! member whose certificate ever validated, and the **live view** of
//! members currently believed reachable. The view also owns the ring
//! overlay, the standing-accusation timers and the local member's current
//! note, and provides the composite updates the evaluation kernel needs to
//! keep them consistent.
//!
//! Lock order is full → live → rings → record state → timers; no lock is
//! ever held across I/O. Methods that need several locks take them in that
//! order or sequentially without nesting.

use crate::peer::PeerRecord;
use crate::ring::RingSet;
use crate::timers::{AccusationTimeout, TimeoutRegistry};
use crate::Result;
use lampyre_types::{Accusation, Certificate, Note, PeerId, RingMask};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What a committed note changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NoteOutcome {
    /// The note replaced the stored one
    pub stored: bool,
    /// Rings whose accusations the note rebutted
    pub rebutted_rings: Vec<u32>,
    /// The member entered the live view
    pub became_live: bool,
    /// An open accusation timer was cancelled
    pub timer_cancelled: bool,
}

/// What committing an accusation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccusationOutcome {
    /// The accusation was stored
    Stored {
        /// A deadline timer was opened for the accused
        timer_started: bool,
    },
    /// The accused's note changed under us; the accusation no longer
    /// matches and was dropped
    EpochMismatch,
}

/// The full and live membership sets, rings, timers and local note.
pub struct View {
    local_id: PeerId,
    num_rings: u32,
    max_disabled_rings: u32,
    full: RwLock<HashMap<PeerId, Arc<PeerRecord>>>,
    live: RwLock<HashSet<PeerId>>,
    rings: RwLock<RingSet>,
    timeouts: TimeoutRegistry,
    local_note: RwLock<Note>,
}

impl View {
    /// Creates a view containing only the local member.
    pub fn new(
        local_id: PeerId,
        num_rings: u32,
        max_disabled_rings: u32,
        accusation_timeout: Duration,
        initial_note: Note,
    ) -> Self {
        Self {
            local_id,
            num_rings,
            max_disabled_rings,
            full: RwLock::new(HashMap::new()),
            live: RwLock::new(HashSet::new()),
            rings: RwLock::new(RingSet::new(num_rings, local_id)),
            timeouts: TimeoutRegistry::new(accusation_timeout),
            local_note: RwLock::new(initial_note),
        }
    }

    /// The local member id.
    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    /// Number of rings in the overlay.
    pub fn num_rings(&self) -> u32 {
        self.num_rings
    }

    /// The local member's current signed note.
    pub fn local_note(&self) -> Note {
        self.local_note.read().clone()
    }

    /// Replaces the local note after an epoch bump.
    pub(crate) fn set_local_note(&self, note: Note) {
        *self.local_note.write() = note;
    }

    /// The local member's current ring mask.
    pub fn local_mask(&self) -> RingMask {
        self.local_note.read().mask.clone()
    }

    // ------------------------------------------------------------------
    // Membership sets
    // ------------------------------------------------------------------

    /// Looks up a member record.
    pub fn peer(&self, id: &PeerId) -> Option<Arc<PeerRecord>> {
        self.full.read().get(id).cloned()
    }

    /// Whether the member is in the full view.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.full.read().contains_key(id)
    }

    /// Every record in the full view.
    pub fn full_records(&self) -> Vec<Arc<PeerRecord>> {
        self.full.read().values().cloned().collect()
    }

    /// Size of the full view (excluding the local member).
    pub fn full_size(&self) -> usize {
        self.full.read().len()
    }

    /// Ids currently in the live view.
    pub fn live_ids(&self) -> Vec<PeerId> {
        self.live.read().iter().copied().collect()
    }

    /// Records currently in the live view.
    pub fn live_records(&self) -> Vec<Arc<PeerRecord>> {
        let ids = self.live_ids();
        let full = self.full.read();
        ids.iter().filter_map(|id| full.get(id).cloned()).collect()
    }

    /// Size of the live view.
    pub fn live_size(&self) -> usize {
        self.live.read().len()
    }

    /// Whether the member is currently believed reachable.
    pub fn is_alive(&self, id: &PeerId) -> bool {
        self.live.read().contains(id)
    }

    /// Inserts a certified member into the full view and every ring.
    /// Idempotent; returns the record and whether it was newly created.
    pub fn add_full(&self, certificate: Certificate) -> Result<(Arc<PeerRecord>, bool)> {
        let id = certificate.subject_key_id;
        if let Some(existing) = self.peer(&id) {
            return Ok((existing, false));
        }
        let record = Arc::new(PeerRecord::new(certificate)?);
        {
            let mut full = self.full.write();
            if let Some(existing) = full.get(&id) {
                return Ok((existing.clone(), false));
            }
            full.insert(id, record.clone());
        }
        self.rings.write().insert(id);
        Ok((record, true))
    }

    /// Adds a member to the live view. Members outside the full view are
    /// refused, preserving `live ⊆ full`.
    pub fn add_live(&self, id: &PeerId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.live.write().insert(*id)
    }

    /// Removes a member from the live view only.
    pub fn remove_live(&self, id: &PeerId) -> bool {
        self.live.write().remove(id)
    }

    // ------------------------------------------------------------------
    // Ring queries
    // ------------------------------------------------------------------

    /// Whether `id` is our predecessor or successor on any ring enabled in
    /// both masks. Members we hold no note for count as fully enabled.
    pub fn should_be_neighbour(&self, id: &PeerId) -> bool {
        let local_mask = self.local_mask();
        let remote_mask = self.peer(id).and_then(|p| p.note()).map(|n| n.mask);
        let rings = self.rings.read();
        for ring in rings.rings() {
            let index = ring.index();
            if local_mask.is_disabled(index) {
                continue;
            }
            if let Some(mask) = &remote_mask {
                if mask.is_disabled(index) {
                    continue;
                }
            }
            if ring.predecessor_of(&self.local_id) == Some(*id)
                || ring.successor_of(&self.local_id) == Some(*id)
            {
                return true;
            }
        }
        false
    }

    /// The records of `id`'s ring neighbours, excluding `id` and us.
    pub fn find_neighbours(&self, id: &PeerId) -> Vec<Arc<PeerRecord>> {
        let ids: Vec<PeerId> = {
            let rings = self.rings.read();
            rings.neighbour_ids(id).into_iter().collect()
        };
        let full = self.full.read();
        ids.iter().filter_map(|id| full.get(id).cloned()).collect()
    }

    /// The members we gossip with: our predecessor and successor on every
    /// ring enabled in our mask and, as far as we know, in theirs.
    pub fn gossip_partners(&self) -> Vec<Arc<PeerRecord>> {
        let local_mask = self.local_mask();
        let candidates: Vec<(u32, PeerId)> = {
            let rings = self.rings.read();
            let mut out = Vec::new();
            for ring in rings.rings() {
                if local_mask.is_disabled(ring.index()) {
                    continue;
                }
                if let Some((pred, succ)) = ring.neighbours_of(&self.local_id) {
                    out.push((ring.index(), pred));
                    out.push((ring.index(), succ));
                }
            }
            out
        };

        let mut seen = HashSet::new();
        let mut partners = Vec::new();
        for (index, id) in candidates {
            if id == self.local_id || seen.contains(&id) {
                continue;
            }
            let Some(record) = self.peer(&id) else {
                continue;
            };
            let enabled = record
                .note()
                .map(|n| n.mask.is_enabled(index))
                .unwrap_or(true);
            if enabled {
                seen.insert(id);
                partners.push(record);
            }
        }
        partners
    }

    /// Whether `accuser` is the first member before `accused` on ring
    /// `ring_num`, skipping members whose mask disables that ring.
    pub fn valid_accuser(&self, accused: &PeerId, accuser: &PeerId, ring_num: u32) -> bool {
        let walk: Vec<PeerId> = {
            let rings = self.rings.read();
            match rings.ring(ring_num) {
                Some(ring) => ring.predecessors_from(accused),
                None => return false,
            }
        };
        for id in walk {
            if self.ring_disabled_for(&id, ring_num) {
                continue;
            }
            return id == *accuser;
        }
        false
    }

    /// The member we monitor on `ring_num`: our first successor whose mask
    /// enables the ring. `None` when we are alone there.
    pub fn successor_to_monitor(&self, ring_num: u32) -> Option<Arc<PeerRecord>> {
        let walk: Vec<PeerId> = {
            let rings = self.rings.read();
            rings.ring(ring_num)?.successors_from(&self.local_id)
        };
        for id in walk {
            if self.ring_disabled_for(&id, ring_num) {
                continue;
            }
            if let Some(record) = self.peer(&id) {
                return Some(record);
            }
        }
        None
    }

    fn ring_disabled_for(&self, id: &PeerId, ring_num: u32) -> bool {
        let mask = if *id == self.local_id {
            Some(self.local_mask())
        } else {
            self.peer(id).and_then(|p| p.note()).map(|n| n.mask)
        };
        // Members without a note count as enabled everywhere.
        mask.map(|m| m.is_disabled(ring_num)).unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Validity predicates
    // ------------------------------------------------------------------

    /// Whether a mask covers exactly our ring count without disabling more
    /// rings than the configured tolerance allows.
    pub fn valid_mask(&self, mask: &RingMask) -> bool {
        mask.len() == self.num_rings as usize
            && mask.disabled_count() <= self.max_disabled_rings as usize
    }

    /// Whether `mask` disables ring `ring_num`.
    pub fn is_ring_disabled(&self, mask: &RingMask, ring_num: u32) -> bool {
        mask.is_disabled(ring_num)
    }

    /// Whether an accusation against us at `epoch` on `ring_num` deserves
    /// a rebuttal: it targets our current note on a ring we have enabled.
    pub fn should_rebuttal(&self, epoch: u64, ring_num: u32) -> bool {
        let note = self.local_note.read();
        note.epoch == epoch && note.mask.is_enabled(ring_num)
    }

    /// The freshest note epoch we hold per member, zero for members known
    /// only by certificate, including ourselves. This is the digest a
    /// gossip partner diffs its view against.
    pub fn existing_hosts(&self) -> HashMap<PeerId, u64> {
        let mut hosts: HashMap<PeerId, u64> = self
            .full_records()
            .iter()
            .map(|p| (p.id(), p.note_epoch().unwrap_or(0)))
            .collect();
        hosts.insert(self.local_id, self.local_note.read().epoch);
        hosts
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Opens an accusation timer for `peer` unless one is running.
    pub fn start_timer(&self, peer: &Arc<PeerRecord>, observed: Note, accuser: Option<PeerId>) {
        self.timeouts.start(peer.id(), observed, accuser);
    }

    /// Whether an accusation timer is open for the member.
    pub fn has_timer(&self, id: &PeerId) -> bool {
        self.timeouts.contains(id)
    }

    /// Cancels the member's accusation timer.
    pub fn delete_timeout(&self, id: &PeerId) -> bool {
        self.timeouts.cancel(id)
    }

    /// Number of open accusation timers.
    pub fn open_timers(&self) -> usize {
        self.timeouts.len()
    }

    /// Removes and returns every matured timer.
    pub(crate) fn drain_expired_timers(&self, now: Instant) -> Vec<AccusationTimeout> {
        self.timeouts.drain_expired(now)
    }

    // ------------------------------------------------------------------
    // Composite updates
    // ------------------------------------------------------------------

    /// Stores a verified note, removing the accusations it rebuts and
    /// restoring liveness when none remain. Atomic with respect to the
    /// live view.
    pub fn commit_note(&self, peer: &Arc<PeerRecord>, note: Note) -> NoteOutcome {
        let mut outcome = NoteOutcome::default();
        let mut live = self.live.write();
        let mut state = peer.lock_state();

        if let Some(current) = &state.note {
            if !current.superseded_by(note.epoch) {
                return outcome;
            }
        }

        let had_accusations = !state.accusations.is_empty();
        let epoch = note.epoch;
        state.accusations.retain(|ring, accusation| {
            if accusation.invalidated_by(epoch) {
                outcome.rebutted_rings.push(*ring);
                false
            } else {
                true
            }
        });
        state.note = Some(note);
        outcome.stored = true;

        if state.accusations.is_empty() {
            if had_accusations {
                state.failed_pings = 0;
            }
            outcome.timer_cancelled = self.timeouts.cancel(&peer.id());
            outcome.became_live = live.insert(peer.id());
        }
        outcome
    }

    /// Stores an accusation that matched the accused's current note,
    /// opening a deadline timer if the accused is live without one. The
    /// note epoch is re-checked under the record lock; a mismatch drops
    /// the accusation.
    pub fn commit_accusation(&self, peer: &Arc<PeerRecord>, acc: Accusation) -> AccusationOutcome {
        let live = self.live.read();
        let mut state = peer.lock_state();

        let Some(note) = state.note.clone() else {
            return AccusationOutcome::EpochMismatch;
        };
        if note.epoch != acc.epoch {
            return AccusationOutcome::EpochMismatch;
        }

        let accuser = acc.accuser;
        state.accusations.insert(acc.ring, acc);

        let mut timer_started = false;
        if live.contains(&peer.id()) && !self.timeouts.contains(&peer.id()) {
            self.timeouts.start(peer.id(), note, Some(accuser));
            timer_started = true;
        }
        AccusationOutcome::Stored { timer_started }
    }

    /// Confirms a matured accusation timer: if the member is still accused
    /// and its note never advanced past the observed epoch, it is demoted
    /// from the live view. The full-view record and its accusations are
    /// retained.
    pub fn confirm_death(&self, timeout: &AccusationTimeout) -> bool {
        let Some(peer) = self.peer(&timeout.peer) else {
            return false;
        };
        let mut live = self.live.write();
        let state = peer.lock_state();

        let still_accused = !state.accusations.is_empty();
        let same_epoch =
            state.note.as_ref().map(|n| n.epoch) == Some(timeout.observed.epoch);
        if still_accused && same_epoch {
            live.remove(&timeout.peer)
        } else {
            false
        }
    }
}
