//! The gossip engine.
//!
//! Every gossip interval the node exchanges state with its ring
//! neighbours: it sends its own note, a digest of every member it knows
//! (id → freshest note epoch) and the host application's payload, and
//! merges whatever the partner answers with. A node that knows nobody yet
//! falls back to its configured entry points, which serve it the bootstrap
//! package from their side of the exchange.
//!
//! Transport failures here are ordinary: the partner is retried on the
//! next tick, and only the monitor's ping path ever converts silence into
//! an accusation.

use crate::node::Node;
use crate::transport::TransportResult;
use lampyre_types::{State, StateResponse};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, trace};

impl Node {
    /// One gossip round of the correct strategy.
    pub(crate) async fn gossip_round(&self) {
        let partners = self.view.gossip_partners();
        let state = self.collect_state();

        if partners.is_empty() {
            // Nobody in view yet: bootstrap through the entry points.
            let entry_addrs = self.entry_addrs.clone();
            for addr in entry_addrs {
                if addr == self.addr() {
                    continue;
                }
                trace!(%addr, "gossiping to entry point");
                self.exchange_with(&addr, state.clone()).await;
            }
            return;
        }

        for partner in partners {
            self.exchange_with(partner.gossip_addr(), state.clone()).await;
        }
    }

    /// One gossip round of the spam strategy: contact every known member,
    /// not just neighbours, so the fabricated accusations in our replies
    /// spread as widely as possible.
    pub(crate) async fn spam_gossip_round(&self) {
        let state = self.collect_state();
        let peers = self.view.full_records();

        if peers.is_empty() {
            // Even a spammer has to join the network first.
            let entry_addrs = self.entry_addrs.clone();
            for addr in entry_addrs {
                if addr == self.addr() {
                    continue;
                }
                self.exchange_with(&addr, state.clone()).await;
            }
            return;
        }

        for peer in peers {
            self.exchange_with(peer.gossip_addr(), state.clone()).await;
        }
    }

    /// Pushes a fresh rebuttal note to every neighbour without waiting for
    /// the next scheduled round. The empty host digest marks the exchange
    /// as rebuttal-only, so partners skip the view diff.
    pub(crate) async fn send_rebuttal(&self) {
        let note = self.refresh_note();
        debug!(epoch = note.epoch, "broadcasting rebuttal note");

        let state = State {
            own_note: note,
            existing_hosts: HashMap::new(),
            external_gossip: None,
        };
        for partner in self.view.gossip_partners() {
            self.exchange_with(partner.gossip_addr(), state.clone()).await;
        }
    }

    /// The gossip request for this round.
    pub(crate) fn collect_state(&self) -> State {
        State {
            own_note: self.view.local_note(),
            existing_hosts: self.view.existing_hosts(),
            external_gossip: self.gossip_content(),
        }
    }

    async fn exchange_with(&self, addr: &str, state: State) {
        let started = Instant::now();
        let result: TransportResult<StateResponse> = self.transport.spread(addr, state).await;
        match result {
            Ok(response) => {
                self.stats().record_completed(started.elapsed());
                self.merge_response(response).await;
            }
            Err(err) => {
                self.stats().record_failed();
                debug!(addr, "gossip exchange failed: {err}");
            }
        }
    }
}
