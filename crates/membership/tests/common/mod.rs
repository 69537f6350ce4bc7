//! Shared harness for membership tests: a test certificate authority, an
//! in-memory loopback transport, and helpers for minting signed protocol
//! statements.

#![allow(dead_code)]

use async_trait::async_trait;
use lampyre_config::Config;
use lampyre_crypto::ecdsa::PrivateKey;
use lampyre_crypto::identity::{CertificateAuthority, NodeIdentity};
use lampyre_membership::{MemberTransport, Node, TransportError, TransportResult};
use lampyre_types::{
    Accusation, Certificate, Msg, MsgResponse, Note, PeerId, Ping, Pong, RingMask, State,
    StateResponse,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Installs a subscriber honouring `RUST_LOG` once per test binary.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Routing table of the in-memory network, keyed by endpoint address.
#[derive(Default)]
pub struct Registry {
    nodes: Mutex<HashMap<String, Arc<Node>>>,
}

impl Registry {
    fn get(&self, addr: &str) -> Option<Arc<Node>> {
        self.nodes.lock().get(addr).cloned()
    }

    fn register(&self, addr: String, node: Arc<Node>) {
        self.nodes.lock().insert(addr, node);
    }

    fn remove(&self, addr: &str) {
        self.nodes.lock().remove(addr);
    }
}

/// Loopback transport: calls dispatch straight into the target node's
/// handlers, presenting the sender's certificate the way an mTLS channel
/// would.
pub struct LoopbackTransport {
    registry: Arc<Registry>,
    sender: Certificate,
}

#[async_trait]
impl MemberTransport for LoopbackTransport {
    async fn spread(&self, addr: &str, state: State) -> TransportResult<StateResponse> {
        let node = self
            .registry
            .get(addr)
            .ok_or_else(|| TransportError::Unreachable(addr.to_string()))?;
        node.handle_spread(&self.sender, state)
            .await
            .map_err(|e| TransportError::Remote(e.to_string()))
    }

    async fn messenger(&self, addr: &str, msg: Msg) -> TransportResult<MsgResponse> {
        let node = self
            .registry
            .get(addr)
            .ok_or_else(|| TransportError::Unreachable(addr.to_string()))?;
        node.handle_messenger(&self.sender, msg)
            .map_err(|e| TransportError::Remote(e.to_string()))
    }

    async fn ping(&self, addr: &str, ping: Ping) -> TransportResult<Pong> {
        let node = self
            .registry
            .get(addr)
            .ok_or_else(|| TransportError::Unreachable(addr.to_string()))?;
        Ok(node.handle_ping(ping))
    }
}

/// Transport for nodes under unit test: every call fails.
pub struct NullTransport;

#[async_trait]
impl MemberTransport for NullTransport {
    async fn spread(&self, addr: &str, _state: State) -> TransportResult<StateResponse> {
        Err(TransportError::Unreachable(addr.to_string()))
    }

    async fn messenger(&self, addr: &str, _msg: Msg) -> TransportResult<MsgResponse> {
        Err(TransportError::Unreachable(addr.to_string()))
    }

    async fn ping(&self, addr: &str, _ping: Ping) -> TransportResult<Pong> {
        Err(TransportError::Unreachable(addr.to_string()))
    }
}

/// An in-memory network of membership nodes sharing one CA.
pub struct TestNet {
    pub ca: CertificateAuthority,
    registry: Arc<Registry>,
    identities: Mutex<HashMap<PeerId, NodeIdentity>>,
    next_host: Mutex<u32>,
}

impl TestNet {
    pub fn new() -> Self {
        init_tracing();
        Self {
            ca: CertificateAuthority::random(),
            registry: Arc::new(Registry::default()),
            identities: Mutex::new(HashMap::new()),
            next_host: Mutex::new(0),
        }
    }

    /// Mints a fresh identity with unique loopback addresses.
    pub fn new_identity(&self) -> NodeIdentity {
        let host = {
            let mut next = self.next_host.lock();
            *next += 1;
            *next
        };
        let key = PrivateKey::random();
        let cert = self.ca.issue(
            &key.public_key(),
            &format!("10.0.0.{host}:7946"),
            &format!("10.0.0.{host}:7947"),
            None,
        );
        let identity = NodeIdentity::new(key, cert, self.ca.root()).unwrap();
        self.identities.lock().insert(identity.id(), identity.clone());
        identity
    }

    /// Builds a node wired to the in-memory network. Inert until
    /// `start()`.
    pub fn spawn_node(&self, config: &Config) -> Arc<Node> {
        let identity = self.new_identity();
        self.spawn_with(identity, config)
    }

    /// Builds a node for an already-minted identity.
    pub fn spawn_with(&self, identity: NodeIdentity, config: &Config) -> Arc<Node> {
        let transport = Arc::new(LoopbackTransport {
            registry: Arc::clone(&self.registry),
            sender: identity.certificate().clone(),
        });
        let node = Node::new(config, identity.clone(), transport).unwrap();
        self.registry
            .register(identity.certificate().gossip_addr.clone(), Arc::clone(&node));
        self.registry
            .register(identity.certificate().ping_addr.clone(), Arc::clone(&node));
        node
    }

    /// The identity behind a member id.
    pub fn identity(&self, id: &PeerId) -> NodeIdentity {
        self.identities.lock().get(id).cloned().unwrap()
    }

    /// Makes a node unreachable, simulating a crash.
    pub fn kill(&self, node: &Node) {
        self.registry.remove(node.addr());
        let ping_addr = self
            .identity(&node.id())
            .certificate()
            .ping_addr
            .clone();
        self.registry.remove(&ping_addr);
    }
}

/// A node wired to a transport where every call fails; used to exercise
/// the evaluation kernel directly.
pub fn isolated_node(config: &Config) -> (Arc<Node>, CertificateAuthority, NodeIdentity) {
    let ca = CertificateAuthority::random();
    let key = PrivateKey::random();
    let cert = ca.issue(&key.public_key(), "10.9.9.1:7946", "10.9.9.1:7947", None);
    let identity = NodeIdentity::new(key, cert, ca.root()).unwrap();
    let node = Node::new(config, identity.clone(), Arc::new(NullTransport)).unwrap();
    (node, ca, identity)
}

/// Mints an identity under `ca` without a node behind it.
pub fn member_identity(ca: &CertificateAuthority, host: u32) -> NodeIdentity {
    let key = PrivateKey::random();
    let cert = ca.issue(
        &key.public_key(),
        &format!("10.1.0.{host}:7946"),
        &format!("10.1.0.{host}:7947"),
        None,
    );
    NodeIdentity::new(key, cert, ca.root()).unwrap()
}

/// A properly signed note for `identity`.
pub fn signed_note(identity: &NodeIdentity, epoch: u64, mask: RingMask) -> Note {
    let id = identity.id();
    let signature = identity.sign(&Note::signing_bytes(&id, epoch, &mask));
    Note {
        id,
        epoch,
        mask,
        signature,
    }
}

/// A properly signed accusation by `accuser` against `accused`.
pub fn signed_accusation(
    accuser: &NodeIdentity,
    accused: PeerId,
    epoch: u64,
    ring: u32,
    mask: RingMask,
) -> Accusation {
    let accuser_id = accuser.id();
    let signature =
        accuser.sign(&Accusation::signing_bytes(&accused, &accuser_id, epoch, ring, &mask));
    Accusation {
        accused,
        accuser: accuser_id,
        epoch,
        ring,
        mask,
        signature,
    }
}

/// Registers a member with `node`: certificate first, then a signed note
/// at `epoch` with a fully enabled mask.
pub fn introduce(node: &Node, identity: &NodeIdentity, epoch: u64) {
    node.eval_certificate(identity.certificate()).unwrap();
    let mask = RingMask::all_enabled(node.view().num_rings());
    node.eval_note(&signed_note(identity, epoch, mask)).unwrap();
}
