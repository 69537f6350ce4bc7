//! # Lampyre Membership
//!
//! The protocol core of Lampyre: a gossip-based, Byzantine fault tolerant
//! membership and failure detection service in the Fireflies family.
//!
//! Every certified member is placed on K pseudo-random rings. On each ring
//! a member monitors its successor and may accuse it of being dead; the
//! accused rebuts by gossiping a fresher note. Standing accusations that
//! survive a timeout demote the accused from the live view. Because only a
//! ring predecessor may accuse, colluding members cannot evict a correct
//! member unless they hold the predecessor slot on every ring the member
//! has enabled.
//!
//! ## Components
//!
//! - [`ring`] - the K-ring overlay and neighbour queries
//! - [`peer`] - per-member record: certificate, note, accusations
//! - [`view`] - the concurrent full/live membership view
//! - [`timers`] - standing-accusation deadlines
//! - [`node`] - the assembled node: tickers, evaluation kernel, RPC entry
//!   points
//! - [`strategy`] - pluggable behaviour (`Correct` or the experimental
//!   `SpamAccusations`)
//! - [`transport`] - the interface an RPC transport implements
//!
//! The transport itself (mutually authenticated channels), the certificate
//! authority and configuration loading live outside this crate.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod gossip;
mod handlers;
pub mod monitor;
pub mod node;
pub mod peer;
pub mod ring;
pub mod stats;
pub mod strategy;
pub mod timers;
pub mod transport;
pub mod view;

// Re-export main types at crate root
pub use node::{Node, NodeEvent};
pub use peer::PeerRecord;
pub use ring::{Ring, RingSet};
pub use stats::{GossipStats, StatsSnapshot};
pub use strategy::{Correct, SpamAccusations, Strategy};
pub use timers::{AccusationTimeout, TimeoutRegistry};
pub use transport::{MemberTransport, TransportError, TransportResult};
pub use view::View;

use lampyre_types::PeerId;

/// Result type alias for membership operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the evaluation kernel and the RPC entry points.
///
/// None of these are fatal to the node. The benign kinds are the normal
/// noise of an eventually consistent protocol and log at debug; the
/// non-benign kinds indicate a protocol violation by the remote and log at
/// warn. See [`Error::is_benign`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A note or accusation referenced a member absent from the full view
    #[error("member {0} not found in full view")]
    NoPeer(PeerId),

    /// A note no fresher than the one already stored
    #[error("already hold the same or a more recent note for {0}")]
    OldNote(PeerId),

    /// The identical accusation is already stored
    #[error("accusation already exists, discarding")]
    AccusationExists,

    /// The accusation names a ring the accused has disabled
    #[error("ring {0} is disabled in the accused's mask")]
    DisabledRing(u32),

    /// The accusation epoch does not match the accused's current note
    #[error("accusation epoch does not match the accused's note epoch")]
    InvalidEpoch,

    /// A gossiping member is not a ring neighbour of ours
    #[error("invalid gossip partner, not my neighbour")]
    NotMyNeighbour,

    /// A note carried a mask of the wrong length or with too many
    /// disabled rings
    #[error("note carried an invalid ring mask")]
    InvalidMask,

    /// The accuser is not the accused's predecessor on the named ring
    #[error("accuser is not the accused's predecessor on the given ring")]
    InvalidAccuser,

    /// A signature failed verification
    #[error("signature verification failed")]
    InvalidSignature,

    /// A certificate failed validation
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// A certificate's subject key id does not match its public key
    #[error("certificate subject key id does not match its public key")]
    InvalidId,

    /// A certificate presented our own identity
    #[error("certificate is my own")]
    SelfCertificate,

    /// An accusation against us that does not warrant a rebuttal
    #[error("received an invalid accusation about myself")]
    InvalidSelfAccusation,

    /// The transport presented no usable sender certificate
    #[error("no certificate presented on the authenticated channel")]
    NoCertificate,

    /// A registered application handler failed
    #[error("application handler error: {0}")]
    Handler(String),

    /// The transport failed to complete a call
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// Whether the error is ordinary protocol noise (log at debug) rather
    /// than a violation by the remote (log at warn).
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Error::NoPeer(_)
                | Error::OldNote(_)
                | Error::AccusationExists
                | Error::DisabledRing(_)
                | Error::InvalidEpoch
                | Error::NotMyNeighbour
                | Error::Transport(_)
        )
    }
}
