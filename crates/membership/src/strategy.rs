//! Pluggable protocol behaviour.
//!
//! A node delegates its periodic work to one [`Strategy`] selected at
//! construction: [`Correct`] runs the protocol as specified, while
//! [`SpamAccusations`] is a deliberately hostile behaviour used in
//! resilience experiments. Spam nodes fabricate accusations against every
//! member they know and gossip with the entire view instead of their
//! neighbours; correct receivers are expected to shrug the fabrications
//! off as `InvalidAccuser`.

use crate::node::Node;
use async_trait::async_trait;
use lampyre_config::StrategyKind;
use std::sync::Arc;

/// Name of the correct strategy
pub const CORRECT: &str = "correct";
/// Name of the accusation-spamming strategy
pub const SPAM_ACCUSATIONS: &str = "spam-accusations";

/// The behaviour a node runs on each gossip tick, monitor tick and
/// rebuttal trigger.
#[async_trait]
pub trait Strategy: Send + Sync + 'static {
    /// Stable name, used in logs and startup announcements.
    fn name(&self) -> &'static str;

    /// One gossip round.
    async fn gossip_tick(&self, node: &Node);

    /// One monitor round.
    async fn monitor_tick(&self, node: &Node);

    /// Answer an accusation against the local member.
    async fn rebuttal(&self, node: &Node);
}

/// Builds the strategy a configuration selects.
pub fn for_kind(kind: StrategyKind) -> Arc<dyn Strategy> {
    match kind {
        StrategyKind::Correct => Arc::new(Correct),
        StrategyKind::SpamAccusations => Arc::new(SpamAccusations),
    }
}

/// The correct Fireflies behaviour.
pub struct Correct;

#[async_trait]
impl Strategy for Correct {
    fn name(&self) -> &'static str {
        CORRECT
    }

    async fn gossip_tick(&self, node: &Node) {
        node.gossip_round().await;
    }

    async fn monitor_tick(&self, node: &Node) {
        node.monitor_round().await;
    }

    async fn rebuttal(&self, node: &Node) {
        node.send_rebuttal().await;
    }
}

/// Adversarial behaviour for resilience experiments only: fabricate
/// accusations against everyone and broadcast as widely as possible.
/// Opt-in through configuration and announced loudly at startup.
pub struct SpamAccusations;

#[async_trait]
impl Strategy for SpamAccusations {
    fn name(&self) -> &'static str {
        SPAM_ACCUSATIONS
    }

    async fn gossip_tick(&self, node: &Node) {
        node.spam_gossip_round().await;
    }

    async fn monitor_tick(&self, node: &Node) {
        node.fabricate_accusations().await;
    }

    // Even a spamming node defends its own membership.
    async fn rebuttal(&self, node: &Node) {
        node.send_rebuttal().await;
    }
}
