//! The interface an RPC transport implements for the membership core.
//!
//! Lampyre does not ship a transport. Deployments bring mutually
//! authenticated channels (mTLS) and wire them up both ways: outbound by
//! implementing [`MemberTransport`], inbound by dispatching decoded
//! requests to the matching `handle_*` entry point on
//! [`Node`](crate::Node), passing the certificate the channel
//! authenticated the sender with.
//!
//! Implementations must enforce the configured hard deadline on every
//! call; the core treats any error as a transport failure and never as
//! evidence of death outside the monitor's explicit ping path.

use async_trait::async_trait;
use lampyre_types::{Msg, MsgResponse, Ping, Pong, State, StateResponse};
use std::time::Duration;

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors a transport implementation reports back to the core.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The destination could not be reached
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// The call did not complete within its deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A payload failed to encode or decode
    #[error("codec error: {0}")]
    Codec(String),

    /// The remote completed the call with an error
    #[error("remote error: {0}")]
    Remote(String),
}

/// Outbound half of the membership RPC surface.
#[async_trait]
pub trait MemberTransport: Send + Sync + 'static {
    /// Performs one gossip exchange with the member at `addr`.
    async fn spread(&self, addr: &str, state: State) -> TransportResult<StateResponse>;

    /// Delivers an application message to the member at `addr`.
    async fn messenger(&self, addr: &str, msg: Msg) -> TransportResult<MsgResponse>;

    /// Issues a monitor liveness challenge to the member at `addr`.
    async fn ping(&self, addr: &str, ping: Ping) -> TransportResult<Pong>;
}
