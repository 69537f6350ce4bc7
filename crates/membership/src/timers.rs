//! Standing-accusation deadlines.
//!
//! Every accusation against a live member opens a timer. If the member has
//! not rebutted by the deadline it is demoted from the live view; a
//! rebuttal cancels the timer through the evaluation kernel. The deadline
//! must outlast a full gossip round trip times the expected propagation
//! depth, so a genuine rebuttal has time to travel accused → accuser.

use lampyre_types::{Note, PeerId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// One standing-accusation deadline.
#[derive(Debug, Clone)]
pub struct AccusationTimeout {
    /// The accused member
    pub peer: PeerId,
    /// The accused's note when the timer opened; death is only confirmed
    /// if the note has not advanced past this epoch
    pub observed: Note,
    /// The accusing member, when known locally
    pub accuser: Option<PeerId>,
    /// When the timer opened
    pub started_at: Instant,
    /// When the accusation matures into death
    pub deadline: Instant,
}

/// The set of open accusation timers.
#[derive(Debug)]
pub struct TimeoutRegistry {
    timeout: Duration,
    entries: Mutex<HashMap<PeerId, AccusationTimeout>>,
}

impl TimeoutRegistry {
    /// Creates a registry issuing deadlines of `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a timer for `peer` unless one is already running.
    pub fn start(&self, peer: PeerId, observed: Note, accuser: Option<PeerId>) {
        let now = Instant::now();
        self.entries.lock().entry(peer).or_insert(AccusationTimeout {
            peer,
            observed,
            accuser,
            started_at: now,
            deadline: now + self.timeout,
        });
    }

    /// Whether a timer is open for `peer`.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.entries.lock().contains_key(peer)
    }

    /// Cancels the timer for `peer`. Returns whether one was open.
    pub fn cancel(&self, peer: &PeerId) -> bool {
        self.entries.lock().remove(peer).is_some()
    }

    /// Number of open timers.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no timers are open.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes and returns every timer whose deadline has passed.
    pub fn drain_expired(&self, now: Instant) -> Vec<AccusationTimeout> {
        let mut entries = self.entries.lock();
        let expired: Vec<PeerId> = entries
            .iter()
            .filter(|(_, t)| now >= t.deadline)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| entries.remove(&id))
            .collect()
    }
}
