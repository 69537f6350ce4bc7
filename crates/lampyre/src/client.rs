//! The host-application client.
//!
//! A [`Client`] wraps a running membership node with the surface a host
//! application uses: handler registration, direct and broadcast
//! messaging, the gossip payload, and the live member list. Responses to
//! direct sends arrive over returned channels; an unreachable destination
//! or a timeout yields `None` rather than an error.

use bytes::Bytes;
use lampyre_config::Config;
use lampyre_crypto::NodeIdentity;
use lampyre_membership::node::HandlerError;
use lampyre_membership::{MemberTransport, Node, NodeEvent, StatsSnapshot};
use lampyre_types::PeerId;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

/// Errors surfaced by the client facade
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An empty payload was supplied where content is required
    #[error("supplied data is empty")]
    NoData,

    /// Building the underlying node failed
    #[error(transparent)]
    Membership(#[from] lampyre_membership::Error),
}

/// A Lampyre membership client.
///
/// Cheap to clone; all clones share the same node.
#[derive(Clone)]
pub struct Client {
    node: Arc<Node>,
}

impl Client {
    /// Creates a client from validated configuration, a bound identity and
    /// a transport. The node is inert until [`Client::start`].
    pub fn new(
        config: &Config,
        identity: NodeIdentity,
        transport: Arc<dyn MemberTransport>,
    ) -> Result<Self, ClientError> {
        let node = Node::new(config, identity, transport)?;
        Ok(Self { node })
    }

    /// Starts gossiping, monitoring and timeout sweeping.
    pub fn start(&self) {
        self.node.start();
    }

    /// Shuts the node down and waits for its tasks to drain.
    pub async fn shutdown(&self) {
        self.node.shutdown().await;
    }

    /// The local member id issued by the certificate authority.
    pub fn id(&self) -> PeerId {
        self.node.id()
    }

    /// The local gossip endpoint address.
    pub fn addr(&self) -> String {
        self.node.addr().to_string()
    }

    /// Gossip addresses of every member currently believed alive.
    pub fn members(&self) -> Vec<String> {
        self.node.live_member_addrs()
    }

    /// Subscribes to membership events.
    pub fn events(&self) -> broadcast::Receiver<NodeEvent> {
        self.node.events()
    }

    /// Gossip exchange statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.node.stats().snapshot()
    }

    /// The underlying node, for transports dispatching inbound RPCs.
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Registers the handler invoked per received application message.
    /// The returned bytes are sent back as the response.
    pub fn register_msg_handler<F>(&self, handler: F)
    where
        F: Fn(Bytes) -> Result<Bytes, HandlerError> + Send + Sync + 'static,
    {
        self.node.set_msg_handler(handler);
    }

    /// Registers the handler invoked per received gossip payload.
    pub fn register_gossip_handler<F>(&self, handler: F)
    where
        F: Fn(Bytes) -> Result<Bytes, HandlerError> + Send + Sync + 'static,
    {
        self.node.set_gossip_handler(handler);
    }

    /// Registers the handler invoked per reply collected for our gossip
    /// payload.
    pub fn register_response_handler<F>(&self, handler: F)
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.node.set_response_handler(handler);
    }

    /// Replaces the payload exchanged with neighbours on every gossip
    /// interaction. Recipients see it through their gossip handler; their
    /// replies come back through our response handler.
    pub fn set_gossip_content(&self, content: Bytes) -> Result<(), ClientError> {
        if content.is_empty() {
            return Err(ClientError::NoData);
        }
        self.node.set_gossip_content(content);
        Ok(())
    }

    /// Sends `content` to the member at `addr`. The returned channel
    /// yields the response, or `None` if the destination could not be
    /// reached.
    pub fn send_to(&self, addr: impl Into<String>, content: Bytes) -> oneshot::Receiver<Option<Bytes>> {
        let (tx, rx) = oneshot::channel();
        let node = Arc::clone(&self.node);
        let addr = addr.into();
        tokio::spawn(async move {
            let response = match node.send_message(&addr, content).await {
                Ok(reply) => Some(reply),
                Err(err) => {
                    debug!(%addr, "send failed: {err}");
                    None
                }
            };
            let _ = tx.send(response);
        });
        rx
    }

    /// Sends `content` to every member currently believed alive. Returns
    /// the response channel and how many members were contacted.
    pub fn send_to_all(&self, content: Bytes) -> (mpsc::Receiver<Option<Bytes>>, usize) {
        let members = self.members();
        let count = members.len();
        // Don't let the channel grow with the fan-out.
        let capacity = (count / 10).max(1);
        let (tx, rx) = mpsc::channel(capacity);

        for addr in members {
            let node = Arc::clone(&self.node);
            let tx = tx.clone();
            let content = content.clone();
            tokio::spawn(async move {
                let response = match node.send_message(&addr, content).await {
                    Ok(reply) => Some(reply),
                    Err(err) => {
                        debug!(%addr, "send failed: {err}");
                        None
                    }
                };
                let _ = tx.send(response).await;
            });
        }
        (rx, count)
    }
}
