//! # Lampyre
//!
//! Lampyre is a Byzantine fault tolerant, gossip based membership and
//! failure detection service in the Fireflies family. Each participant
//! maintains an eventually consistent view of the live members of an open
//! network in which a bounded fraction of members may be actively
//! malicious.
//!
//! This crate is the host-application facade. The protocol core lives in
//! [`lampyre_membership`]; identities and the certificate interface in
//! [`lampyre_crypto`]; configuration in [`lampyre_config`]. Deployments
//! supply the authenticated RPC transport by implementing
//! [`MemberTransport`] and dispatching inbound calls to the node handlers.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lampyre::{Client, Config};
//! use lampyre_crypto::NodeIdentity;
//! use lampyre_membership::MemberTransport;
//! use std::sync::Arc;
//!
//! # async fn run(identity: NodeIdentity, transport: Arc<dyn MemberTransport>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(std::path::Path::new("lampyre.toml"))?;
//! let client = Client::new(&config, identity, transport)?;
//!
//! client.register_msg_handler(|msg| Ok(msg));
//! client.start();
//!
//! println!("live members: {:?}", client.members());
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod client;

pub use client::{Client, ClientError};

// Re-export the pieces a host application wires together.
pub use lampyre_config::Config;
pub use lampyre_crypto::identity::{CaCertificate, CertificateAuthority, NodeIdentity};
pub use lampyre_membership::{
    MemberTransport, Node, NodeEvent, StatsSnapshot, TransportError, TransportResult,
};
pub use lampyre_types::PeerId;
