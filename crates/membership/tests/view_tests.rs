//! Tests for the membership view: set maintenance, mask validity,
//! neighbour predicates and the composite note/accusation updates.

mod common;

use common::{member_identity, signed_accusation, signed_note};
use lampyre_crypto::identity::CertificateAuthority;
use lampyre_crypto::NodeIdentity;
use lampyre_membership::view::{AccusationOutcome, View};
use lampyre_types::{Note, PeerId, RingMask, Signature};
use std::time::Duration;

const NUM_RINGS: u32 = 4;
const MAX_DISABLED: u32 = 1;

fn local_note(id: PeerId, epoch: u64) -> Note {
    Note {
        id,
        epoch,
        mask: RingMask::all_enabled(NUM_RINGS),
        signature: Signature::default(),
    }
}

fn test_view(local: PeerId) -> View {
    View::new(
        local,
        NUM_RINGS,
        MAX_DISABLED,
        Duration::from_secs(5),
        local_note(local, 1),
    )
}

fn setup() -> (View, CertificateAuthority) {
    let ca = CertificateAuthority::random();
    (test_view(PeerId::new([0xff; 32])), ca)
}

/// Adds the identity's certificate and a note at `epoch` to the view.
fn join(view: &View, identity: &NodeIdentity, epoch: u64) {
    let (record, _) = view.add_full(identity.certificate().clone()).unwrap();
    let note = signed_note(identity, epoch, RingMask::all_enabled(NUM_RINGS));
    let outcome = view.commit_note(&record, note);
    assert!(outcome.stored);
}

#[test]
fn test_add_full_is_idempotent() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);

    let (_, first) = view.add_full(member.certificate().clone()).unwrap();
    let (_, second) = view.add_full(member.certificate().clone()).unwrap();
    assert!(first);
    assert!(!second);
    assert_eq!(view.full_size(), 1);
}

#[test]
fn test_live_requires_full_membership() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);

    // Not certified yet: refuse.
    assert!(!view.add_live(&member.id()));
    assert_eq!(view.live_size(), 0);

    view.add_full(member.certificate().clone()).unwrap();
    assert!(view.add_live(&member.id()));
    assert!(view.is_alive(&member.id()));

    // live ⊆ full holds.
    for id in view.live_ids() {
        assert!(view.contains(&id));
    }
}

#[test]
fn test_valid_mask() {
    let (view, _) = setup();

    assert!(view.valid_mask(&RingMask::all_enabled(NUM_RINGS)));

    // Wrong length.
    assert!(!view.valid_mask(&RingMask::all_enabled(NUM_RINGS + 1)));
    assert!(!view.valid_mask(&RingMask::all_enabled(NUM_RINGS - 1)));

    // One disabled ring is within tolerance, two are not.
    let mut mask = RingMask::all_enabled(NUM_RINGS);
    mask.disable(0);
    assert!(view.valid_mask(&mask));
    mask.disable(1);
    assert!(!view.valid_mask(&mask));
}

#[test]
fn test_should_rebuttal() {
    let local = PeerId::new([0xff; 32]);
    let view = test_view(local);

    assert!(view.should_rebuttal(1, 0));
    // Wrong epoch.
    assert!(!view.should_rebuttal(2, 0));
    // Out-of-range ring reads disabled.
    assert!(!view.should_rebuttal(1, NUM_RINGS));
}

#[test]
fn test_existing_hosts_digest() {
    let (view, ca) = setup();
    let with_note = member_identity(&ca, 1);
    let cert_only = member_identity(&ca, 2);

    join(&view, &with_note, 7);
    view.add_full(cert_only.certificate().clone()).unwrap();

    let hosts = view.existing_hosts();
    assert_eq!(hosts.get(&with_note.id()), Some(&7));
    // Members known only by certificate report epoch zero.
    assert_eq!(hosts.get(&cert_only.id()), Some(&0));
    // The local member is always present.
    assert_eq!(hosts.get(&view.local_id()), Some(&1));
}

#[test]
fn test_commit_note_stores_and_enlivens() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);
    let (record, _) = view.add_full(member.certificate().clone()).unwrap();

    let note = signed_note(&member, 3, RingMask::all_enabled(NUM_RINGS));
    let outcome = view.commit_note(&record, note);

    assert!(outcome.stored);
    assert!(outcome.became_live);
    assert!(view.is_alive(&member.id()));
    assert_eq!(record.note_epoch(), Some(3));
}

#[test]
fn test_commit_note_refuses_stale_epochs() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);
    let (record, _) = view.add_full(member.certificate().clone()).unwrap();
    join(&view, &member, 5);

    for stale in [4, 5] {
        let note = signed_note(&member, stale, RingMask::all_enabled(NUM_RINGS));
        let outcome = view.commit_note(&record, note);
        assert!(!outcome.stored);
        assert_eq!(record.note_epoch(), Some(5));
    }
}

#[test]
fn test_commit_accusation_opens_timer_for_live_member() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);
    let accuser = member_identity(&ca, 2);
    join(&view, &member, 5);

    let acc = signed_accusation(
        &accuser,
        member.id(),
        5,
        0,
        RingMask::all_enabled(NUM_RINGS),
    );
    let record = view.peer(&member.id()).unwrap();
    let outcome = view.commit_accusation(&record, acc);

    assert_eq!(outcome, AccusationOutcome::Stored { timer_started: true });
    assert!(view.has_timer(&member.id()));
    assert!(record.is_accused());
    // The accused stays in the live view during the suspicion window.
    assert!(view.is_alive(&member.id()));
}

#[test]
fn test_commit_accusation_drops_epoch_mismatch() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);
    let accuser = member_identity(&ca, 2);
    join(&view, &member, 5);

    let acc = signed_accusation(
        &accuser,
        member.id(),
        4,
        0,
        RingMask::all_enabled(NUM_RINGS),
    );
    let record = view.peer(&member.id()).unwrap();
    assert_eq!(
        view.commit_accusation(&record, acc),
        AccusationOutcome::EpochMismatch
    );
    assert!(!record.is_accused());
    assert!(!view.has_timer(&member.id()));
}

#[test]
fn test_rebuttal_note_clears_accusations_and_timer() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);
    let accuser = member_identity(&ca, 2);
    join(&view, &member, 5);

    let record = view.peer(&member.id()).unwrap();
    let acc = signed_accusation(
        &accuser,
        member.id(),
        5,
        2,
        RingMask::all_enabled(NUM_RINGS),
    );
    view.commit_accusation(&record, acc);
    assert!(view.has_timer(&member.id()));

    let rebuttal = signed_note(&member, 6, RingMask::all_enabled(NUM_RINGS));
    let outcome = view.commit_note(&record, rebuttal);

    assert!(outcome.stored);
    assert_eq!(outcome.rebutted_rings, vec![2]);
    assert!(outcome.timer_cancelled);
    assert!(!record.is_accused());
    assert!(!view.has_timer(&member.id()));
    assert!(view.is_alive(&member.id()));
}

#[test]
fn test_rebuttal_removes_only_older_accusations() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);
    let accuser = member_identity(&ca, 2);
    join(&view, &member, 5);
    let record = view.peer(&member.id()).unwrap();

    view.commit_accusation(
        &record,
        signed_accusation(&accuser, member.id(), 5, 0, RingMask::all_enabled(NUM_RINGS)),
    );

    // A note at the accusation's own epoch is not a rebuttal; one above
    // it is.
    assert!(record.ring_accusation(0).is_some());
    let equal = signed_note(&member, 5, RingMask::all_enabled(NUM_RINGS));
    assert!(!view.commit_note(&record, equal).stored);
    assert!(record.ring_accusation(0).is_some());

    let above = signed_note(&member, 6, RingMask::all_enabled(NUM_RINGS));
    assert!(view.commit_note(&record, above).stored);
    assert!(record.ring_accusation(0).is_none());
}

#[test]
fn test_confirm_death_demotes_unrebutted_member() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);
    let accuser = member_identity(&ca, 2);
    join(&view, &member, 5);
    let record = view.peer(&member.id()).unwrap();

    view.commit_accusation(
        &record,
        signed_accusation(&accuser, member.id(), 5, 0, RingMask::all_enabled(NUM_RINGS)),
    );

    let timeout = lampyre_membership::AccusationTimeout {
        peer: member.id(),
        observed: record.note().unwrap(),
        accuser: Some(accuser.id()),
        started_at: tokio::time::Instant::now(),
        deadline: tokio::time::Instant::now(),
    };

    assert!(view.confirm_death(&timeout));
    assert!(!view.is_alive(&member.id()));
    // Full view entry and accusations persist.
    assert!(view.contains(&member.id()));
    assert!(record.is_accused());
}

#[test]
fn test_confirm_death_aborts_after_note_advance() {
    let (view, ca) = setup();
    let member = member_identity(&ca, 1);
    let accuser = member_identity(&ca, 2);
    join(&view, &member, 5);
    let record = view.peer(&member.id()).unwrap();

    view.commit_accusation(
        &record,
        signed_accusation(&accuser, member.id(), 5, 0, RingMask::all_enabled(NUM_RINGS)),
    );
    let observed = record.note().unwrap();

    // The member rebuts before the sweeper fires.
    let rebuttal = signed_note(&member, 6, RingMask::all_enabled(NUM_RINGS));
    view.commit_note(&record, rebuttal);

    let timeout = lampyre_membership::AccusationTimeout {
        peer: member.id(),
        observed,
        accuser: Some(accuser.id()),
        started_at: tokio::time::Instant::now(),
        deadline: tokio::time::Instant::now(),
    };

    assert!(!view.confirm_death(&timeout));
    assert!(view.is_alive(&member.id()));
}

#[test]
fn test_should_be_neighbour_matches_ring_adjacency() {
    let (view, ca) = setup();
    let members: Vec<_> = (1..=6).map(|i| member_identity(&ca, i)).collect();
    for member in &members {
        join(&view, member, 1);
    }

    // With every mask fully enabled the predicate is exactly raw ring
    // adjacency; replicate the rings and compare member by member.
    let mut rings = lampyre_membership::RingSet::new(NUM_RINGS, view.local_id());
    for member in &members {
        rings.insert(member.id());
    }
    let local = view.local_id();
    for member in &members {
        let adjacent = rings.rings().iter().any(|ring| {
            ring.predecessor_of(&local) == Some(member.id())
                || ring.successor_of(&local) == Some(member.id())
        });
        assert_eq!(view.should_be_neighbour(&member.id()), adjacent);
    }

    // Gossip partners are precisely the adjacent members.
    let mut partner_ids: Vec<PeerId> =
        view.gossip_partners().iter().map(|p| p.id()).collect();
    partner_ids.sort();
    let mut expected: Vec<PeerId> = members
        .iter()
        .map(|m| m.id())
        .filter(|id| view.should_be_neighbour(id))
        .collect();
    expected.sort();
    assert_eq!(partner_ids, expected);
}

#[test]
fn test_valid_accuser_is_ring_predecessor() {
    let (view, ca) = setup();
    let members: Vec<_> = (1..=5).map(|i| member_identity(&ca, i)).collect();
    for member in &members {
        join(&view, member, 1);
    }

    // Recompute the expected predecessor of members[0] on ring 0 from an
    // identical ring set.
    let mut rings = lampyre_membership::RingSet::new(NUM_RINGS, view.local_id());
    for member in &members {
        rings.insert(member.id());
    }
    let accused = members[0].id();
    let pred = rings.ring(0).unwrap().predecessor_of(&accused).unwrap();

    assert!(view.valid_accuser(&accused, &pred, 0));
    for member in &members {
        if member.id() != pred {
            assert!(!view.valid_accuser(&accused, &member.id(), 0));
        }
    }
}

#[test]
fn test_valid_accuser_skips_members_withdrawn_from_ring() {
    let (view, ca) = setup();
    let members: Vec<_> = (1..=5).map(|i| member_identity(&ca, i)).collect();
    for member in &members {
        join(&view, member, 1);
    }

    let mut rings = lampyre_membership::RingSet::new(NUM_RINGS, view.local_id());
    for member in &members {
        rings.insert(member.id());
    }
    let accused = members[0].id();
    let walk = rings.ring(0).unwrap().predecessors_from(&accused);
    let first = walk[0];
    let second = walk[1];

    // Withdraw the immediate predecessor from ring 0: accusation rights
    // pass to the next member back.
    if let Some(identity) = members.iter().find(|m| m.id() == first) {
        let mut mask = RingMask::all_enabled(NUM_RINGS);
        mask.disable(0);
        let record = view.peer(&first).unwrap();
        view.commit_note(&record, signed_note(identity, 2, mask));

        assert!(!view.valid_accuser(&accused, &first, 0));
        assert!(view.valid_accuser(&accused, &second, 0));
    }
}
