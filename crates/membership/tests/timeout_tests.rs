//! Tests for accusation timers: registry mechanics and the sweeper's
//! death/rebuttal decisions under a paused clock.

mod common;

use common::{introduce, isolated_node, member_identity, signed_accusation, signed_note};
use lampyre_config::Config;
use lampyre_crypto::NodeIdentity;
use lampyre_membership::{Node, NodeEvent, RingSet, TimeoutRegistry};
use lampyre_types::{Note, PeerId, RingMask, Signature};
use std::time::Duration;
use tokio::time::Instant;

fn observed_note(id: PeerId, epoch: u64) -> Note {
    Note {
        id,
        epoch,
        mask: RingMask::all_enabled(10),
        signature: Signature::default(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_registry_start_contains_cancel() {
    let registry = TimeoutRegistry::new(Duration::from_secs(5));
    let peer = PeerId::new([1u8; 32]);

    assert!(registry.is_empty());
    registry.start(peer, observed_note(peer, 1), None);
    assert!(registry.contains(&peer));
    assert_eq!(registry.len(), 1);

    assert!(registry.cancel(&peer));
    assert!(!registry.contains(&peer));
    assert!(!registry.cancel(&peer));
}

#[tokio::test(start_paused = true)]
async fn test_registry_start_does_not_reset_running_timer() {
    let registry = TimeoutRegistry::new(Duration::from_secs(5));
    let peer = PeerId::new([1u8; 32]);

    registry.start(peer, observed_note(peer, 1), None);
    tokio::time::advance(Duration::from_secs(4)).await;

    // A second start for the same member must not extend the deadline.
    registry.start(peer, observed_note(peer, 2), None);
    tokio::time::advance(Duration::from_secs(2)).await;

    let expired = registry.drain_expired(Instant::now());
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].observed.epoch, 1);
}

#[tokio::test(start_paused = true)]
async fn test_registry_drains_only_matured_timers() {
    let registry = TimeoutRegistry::new(Duration::from_secs(5));
    let early = PeerId::new([1u8; 32]);
    let late = PeerId::new([2u8; 32]);

    registry.start(early, observed_note(early, 1), None);
    tokio::time::advance(Duration::from_secs(3)).await;
    registry.start(late, observed_note(late, 1), None);

    tokio::time::advance(Duration::from_secs(2)).await;
    let expired = registry.drain_expired(Instant::now());
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].peer, early);

    // The late timer matures on its own schedule.
    tokio::time::advance(Duration::from_secs(3)).await;
    let expired = registry.drain_expired(Instant::now());
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].peer, late);
    assert!(registry.is_empty());
}

/// Config keeping the monitor out of the way so tests control accusations
/// themselves.
fn sweeper_config() -> Config {
    let mut config = Config::default();
    config.protocol.monitor_interval_ms = 3_600_000;
    config.protocol.accusation_timeout_ms = 5_000;
    config.protocol.sweep_interval_ms = 500;
    config
}

fn predecessor_identity(
    node: &Node,
    node_identity: &NodeIdentity,
    members: &[NodeIdentity],
    accused: PeerId,
) -> NodeIdentity {
    let mut rings = RingSet::new(node.view().num_rings(), node.id());
    for member in members {
        rings.insert(member.id());
    }
    let pred = rings.ring(0).unwrap().predecessor_of(&accused).unwrap();
    if pred == node.id() {
        node_identity.clone()
    } else {
        members.iter().find(|m| m.id() == pred).unwrap().clone()
    }
}

#[tokio::test(start_paused = true)]
async fn test_unrebutted_accusation_matures_into_death() {
    let (node, ca, node_identity) = isolated_node(&sweeper_config());
    let members: Vec<_> = (1..=4).map(|i| member_identity(&ca, i)).collect();
    for member in &members {
        introduce(&node, member, 1);
    }
    let accused = members[0].id();
    let accuser = predecessor_identity(&node, &node_identity, &members, accused);

    let mut events = node.events();
    node.start();

    let mask = RingMask::all_enabled(node.view().num_rings());
    let acc = signed_accusation(&accuser, accused, 1, 0, mask);
    node.eval_accusation(&acc).await.unwrap();
    assert!(node.view().is_alive(&accused));

    // Let the deadline pass and the sweeper fire.
    tokio::time::sleep(Duration::from_secs(7)).await;

    assert!(!node.view().is_alive(&accused));
    // Death demotes from the live view only; identity and evidence stay.
    assert!(node.view().contains(&accused));
    assert!(node.view().peer(&accused).unwrap().is_accused());
    assert!(!node.view().has_timer(&accused));

    let died = loop {
        match events.try_recv() {
            Ok(NodeEvent::MemberDied(id)) => break id,
            Ok(_) => continue,
            Err(e) => panic!("expected a death event, got {e:?}"),
        }
    };
    assert_eq!(died, accused);

    node.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rebuttal_before_deadline_prevents_death() {
    let (node, ca, node_identity) = isolated_node(&sweeper_config());
    let members: Vec<_> = (1..=4).map(|i| member_identity(&ca, i)).collect();
    for member in &members {
        introduce(&node, member, 1);
    }
    let accused_identity = members[0].clone();
    let accused = accused_identity.id();
    let accuser = predecessor_identity(&node, &node_identity, &members, accused);

    node.start();

    let mask = RingMask::all_enabled(node.view().num_rings());
    let acc = signed_accusation(&accuser, accused, 1, 0, mask.clone());
    node.eval_accusation(&acc).await.unwrap();
    assert!(node.view().has_timer(&accused));

    tokio::time::sleep(Duration::from_secs(2)).await;

    // The accused gossips a fresher note in time.
    node.eval_note(&signed_note(&accused_identity, 2, mask))
        .unwrap();
    assert!(!node.view().has_timer(&accused));

    tokio::time::sleep(Duration::from_secs(7)).await;

    assert!(node.view().is_alive(&accused));
    assert!(!node.view().peer(&accused).unwrap().is_accused());

    node.shutdown().await;
}
