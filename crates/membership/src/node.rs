//! The assembled membership node.
//!
//! A [`Node`] owns the local identity, the shared [`View`], the pluggable
//! [`Strategy`](crate::Strategy) and the transport handle, and runs three
//! periodic tasks: the gossip ticker, the monitor ticker and the
//! accusation-timeout sweeper. All three select against one shutdown
//! broadcast channel and exit before their next cycle once
//! [`Node::shutdown`] fires.
//!
//! Host applications interact through the registered callbacks and the
//! facade crate; transports dispatch inbound RPCs to the `handle_*`
//! methods in the handlers module.

use crate::stats::GossipStats;
use crate::strategy::{self, Strategy};
use crate::transport::MemberTransport;
use crate::view::View;
use crate::{Error, Result};
use bytes::Bytes;
use lampyre_config::{Config, ProtocolConfig};
use lampyre_crypto::NodeIdentity;
use lampyre_types::{Msg, Note, PeerId, RingMask};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Error type application handlers may fail with
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked with an application payload, returning the reply
pub type MsgHandler = Arc<dyn Fn(Bytes) -> std::result::Result<Bytes, HandlerError> + Send + Sync>;

/// Callback invoked with the reply to an outbound application payload
pub type ResponseHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Membership changes a node announces to its host application.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A member entered the live view
    MemberJoined(PeerId),
    /// An accusation against a member was stored
    MemberAccused {
        /// The accused member
        id: PeerId,
        /// The ring the accusation names
        ring: u32,
    },
    /// A member rebutted its accusations and returned to the live view
    MemberRebutted(PeerId),
    /// A member's accusation deadline passed; it left the live view
    MemberDied(PeerId),
}

/// A running membership node.
pub struct Node {
    pub(crate) protocol: ProtocolConfig,
    pub(crate) entry_addrs: Vec<String>,
    pub(crate) identity: NodeIdentity,
    pub(crate) view: Arc<View>,
    pub(crate) transport: Arc<dyn MemberTransport>,
    pub(crate) strategy: Arc<dyn Strategy>,
    epoch: AtomicU64,
    /// Serializes self-note reissue so epochs are signed in order
    note_lock: Mutex<()>,
    gossip_payload: RwLock<Option<Bytes>>,
    pub(crate) msg_handler: RwLock<Option<MsgHandler>>,
    pub(crate) gossip_handler: RwLock<Option<MsgHandler>>,
    pub(crate) response_handler: RwLock<Option<ResponseHandler>>,
    stats: GossipStats,
    events: broadcast::Sender<NodeEvent>,
    shutdown: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Builds a node from validated configuration, a bound identity and a
    /// transport. The node is inert until [`Node::start`].
    pub fn new(
        config: &Config,
        identity: NodeIdentity,
        transport: Arc<dyn MemberTransport>,
    ) -> Result<Arc<Self>> {
        let protocol = config.protocol.clone();
        let local_id = identity.id();

        let initial_epoch = 1u64;
        let mask = RingMask::all_enabled(protocol.num_rings);
        let signature = identity.sign(&Note::signing_bytes(&local_id, initial_epoch, &mask));
        let initial_note = Note {
            id: local_id,
            epoch: initial_epoch,
            mask,
            signature,
        };

        let view = Arc::new(View::new(
            local_id,
            protocol.num_rings,
            protocol.max_disabled_rings,
            protocol.accusation_timeout(),
            initial_note,
        ));

        let (events, _) = broadcast::channel(256);
        let (shutdown, _) = broadcast::channel(1);

        Ok(Arc::new(Self {
            protocol,
            entry_addrs: config.node.entry_addrs.clone(),
            identity,
            view,
            transport,
            strategy: strategy::for_kind(config.strategy.kind),
            epoch: AtomicU64::new(initial_epoch),
            note_lock: Mutex::new(()),
            gossip_payload: RwLock::new(None),
            msg_handler: RwLock::new(None),
            gossip_handler: RwLock::new(None),
            response_handler: RwLock::new(None),
            stats: GossipStats::new(),
            events,
            shutdown,
            handles: Mutex::new(Vec::new()),
        }))
    }

    /// The local member id.
    pub fn id(&self) -> PeerId {
        self.identity.id()
    }

    /// The local gossip endpoint address.
    pub fn addr(&self) -> &str {
        &self.identity.certificate().gossip_addr
    }

    /// The shared membership view.
    pub fn view(&self) -> &Arc<View> {
        &self.view
    }

    /// Gossip exchange statistics.
    pub fn stats(&self) -> &GossipStats {
        &self.stats
    }

    /// Subscribes to membership events.
    pub fn events(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// Gossip addresses of every member currently believed alive.
    pub fn live_member_addrs(&self) -> Vec<String> {
        self.view
            .live_records()
            .iter()
            .map(|p| p.gossip_addr().to_string())
            .collect()
    }

    // ------------------------------------------------------------------
    // Host application callbacks
    // ------------------------------------------------------------------

    /// Registers the handler invoked per received application message.
    pub fn set_msg_handler<F>(&self, handler: F)
    where
        F: Fn(Bytes) -> std::result::Result<Bytes, HandlerError> + Send + Sync + 'static,
    {
        *self.msg_handler.write() = Some(Arc::new(handler));
    }

    /// Registers the handler invoked per received gossip payload.
    pub fn set_gossip_handler<F>(&self, handler: F)
    where
        F: Fn(Bytes) -> std::result::Result<Bytes, HandlerError> + Send + Sync + 'static,
    {
        *self.gossip_handler.write() = Some(Arc::new(handler));
    }

    /// Registers the handler invoked per reply to our gossip payload.
    pub fn set_response_handler<F>(&self, handler: F)
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        *self.response_handler.write() = Some(Arc::new(handler));
    }

    /// Replaces the payload piggy-backed on outgoing gossip exchanges.
    pub fn set_gossip_content(&self, content: Bytes) {
        *self.gossip_payload.write() = Some(content);
    }

    /// Snapshot of the current gossip payload.
    pub fn gossip_content(&self) -> Option<Bytes> {
        self.gossip_payload.read().clone()
    }

    /// Sends an application message and returns the reply content.
    pub async fn send_message(&self, addr: &str, content: Bytes) -> Result<Bytes> {
        let response = self.transport.messenger(addr, Msg { content }).await?;
        Ok(response.content)
    }

    // ------------------------------------------------------------------
    // Self note management
    // ------------------------------------------------------------------

    /// The epoch of the current self note.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Issues a fresh self note with a bumped epoch and the current mask.
    pub(crate) fn refresh_note(&self) -> Note {
        let _guard = self.note_lock.lock();
        let mask = self.view.local_mask();
        self.reissue_note(mask)
    }

    /// Enables or disables one of our rings, reissuing the self note.
    ///
    /// Refuses a change that would disable more rings than a valid mask
    /// may, since such a note would be rejected network-wide and leave us
    /// unmonitorable.
    pub fn set_ring_enabled(&self, ring: u32, enabled: bool) -> Result<Note> {
        let _guard = self.note_lock.lock();
        let mut mask = self.view.local_mask();
        if enabled {
            mask.enable(ring);
        } else {
            mask.disable(ring);
        }
        if !self.view.valid_mask(&mask) {
            return Err(Error::InvalidMask);
        }
        info!(ring, enabled, "changing local ring participation");
        Ok(self.reissue_note(mask))
    }

    /// Bumps the epoch and signs a note carrying `mask`. Caller holds the
    /// note lock.
    fn reissue_note(&self, mask: RingMask) -> Note {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let id = self.id();
        let signature = self.identity.sign(&Note::signing_bytes(&id, epoch, &mask));
        let note = Note {
            id,
            epoch,
            mask,
            signature,
        };
        self.view.set_local_note(note.clone());
        note
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Starts the gossip ticker, monitor ticker and timeout sweeper.
    /// Calling `start` on a running node is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return;
        }

        info!(
            id = %self.id().short(),
            addr = self.addr(),
            rings = self.protocol.num_rings,
            strategy = self.strategy.name(),
            "starting membership node"
        );
        if self.strategy.name() != strategy::CORRECT {
            warn!(
                strategy = self.strategy.name(),
                "adversarial protocol strategy enabled; this node will misbehave on purpose"
            );
        }

        let node = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(node.protocol.gossip_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let strategy = Arc::clone(&node.strategy);
                        strategy.gossip_tick(&node).await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("gossip ticker shutting down");
                        break;
                    }
                }
            }
        }));

        let node = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(node.protocol.monitor_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let strategy = Arc::clone(&node.strategy);
                        strategy.monitor_tick(&node).await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("monitor ticker shutting down");
                        break;
                    }
                }
            }
        }));

        let node = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(node.protocol.sweep_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => node.sweep_timeouts(),
                    _ = shutdown_rx.recv() => {
                        debug!("timeout sweeper shutting down");
                        break;
                    }
                }
            }
        }));
    }

    /// Signals every ticker to exit and waits for them to drain.
    pub async fn shutdown(&self) {
        info!(id = %self.id().short(), "shutting down membership node");
        let _ = self.shutdown.send(());
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// One pass of the accusation-timeout sweeper: matured accusations
    /// whose target never rebutted demote the target from the live view.
    pub(crate) fn sweep_timeouts(&self) {
        for timeout in self.view.drain_expired_timers(Instant::now()) {
            if self.view.confirm_death(&timeout) {
                warn!(
                    peer = %timeout.peer.short(),
                    epoch = timeout.observed.epoch,
                    "accusation deadline passed without rebuttal, member removed from live view"
                );
                self.emit(NodeEvent::MemberDied(timeout.peer));
            } else {
                debug!(peer = %timeout.peer.short(), "accusation timer lapsed after rebuttal");
            }
        }
    }

    pub(crate) fn emit(&self, event: NodeEvent) {
        // Dropped when no subscriber is listening.
        let _ = self.events.send(event);
    }
}
