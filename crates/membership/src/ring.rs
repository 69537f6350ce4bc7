//! The K-ring overlay.
//!
//! Each ring is an independent pseudo-random total order over all certified
//! members: ring `i` orders member `P` by `SHA-256(i || P.id)`, with the
//! raw id as tie-break. Predecessor and successor wrap around, so on a ring of
//! one the querier is its own neighbour and on a ring of two the other
//! member fills both roles. Bounding accusation rights to ring predecessors
//! is what makes collusion expensive: an attacker must capture the
//! predecessor slot on every enabled ring of a victim.

use lampyre_crypto::sha256_concat;
use lampyre_types::PeerId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

/// A member's placement key on one ring: the ring-specific rank followed by
/// the raw id as tie-break.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct RingPosition {
    rank: [u8; 32],
    id: PeerId,
}

impl RingPosition {
    /// Computes the placement of `id` on ring `index`.
    pub fn of(index: u32, id: PeerId) -> Self {
        Self {
            rank: sha256_concat(&[&index.to_be_bytes(), id.as_bytes()]),
            id,
        }
    }
}

/// One ring of the overlay: the circular order of all inserted members.
#[derive(Debug)]
pub struct Ring {
    index: u32,
    order: BTreeMap<RingPosition, PeerId>,
    positions: HashMap<PeerId, RingPosition>,
}

impl Ring {
    /// Creates an empty ring with the given index.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            order: BTreeMap::new(),
            positions: HashMap::new(),
        }
    }

    /// The ring index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Inserts a member. Idempotent.
    pub fn insert(&mut self, id: PeerId) {
        let pos = RingPosition::of(self.index, id);
        self.order.insert(pos, id);
        self.positions.insert(id, pos);
    }

    /// Removes a member. Unknown members are ignored.
    pub fn remove(&mut self, id: &PeerId) {
        if let Some(pos) = self.positions.remove(id) {
            self.order.remove(&pos);
        }
    }

    /// Whether the member is placed on this ring.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.positions.contains_key(id)
    }

    /// Number of members on the ring.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The member immediately after `id` in ring order, wrapping around.
    ///
    /// On a ring of one this is `id` itself; callers treat the self-loop as
    /// "no successor". Returns `None` only when `id` is not on the ring.
    pub fn successor_of(&self, id: &PeerId) -> Option<PeerId> {
        let pos = self.positions.get(id)?;
        self.order
            .range((Excluded(*pos), Unbounded))
            .map(|(_, id)| *id)
            .next()
            .or_else(|| self.order.values().next().copied())
    }

    /// The member immediately before `id` in ring order, wrapping around.
    ///
    /// Self-loop semantics match [`Ring::successor_of`].
    pub fn predecessor_of(&self, id: &PeerId) -> Option<PeerId> {
        let pos = self.positions.get(id)?;
        self.order
            .range(..*pos)
            .map(|(_, id)| *id)
            .next_back()
            .or_else(|| self.order.values().next_back().copied())
    }

    /// Both neighbours of `id`: `(predecessor, successor)`.
    pub fn neighbours_of(&self, id: &PeerId) -> Option<(PeerId, PeerId)> {
        Some((self.predecessor_of(id)?, self.successor_of(id)?))
    }

    /// The ring in forward order starting after `id`, excluding `id`,
    /// wrapping once. Empty when `id` is not on the ring.
    pub fn successors_from(&self, id: &PeerId) -> Vec<PeerId> {
        let Some(pos) = self.positions.get(id) else {
            return Vec::new();
        };
        self.order
            .range((Excluded(*pos), Unbounded))
            .chain(self.order.range(..*pos))
            .map(|(_, id)| *id)
            .collect()
    }

    /// The ring in backward order starting before `id`, excluding `id`,
    /// wrapping once. Empty when `id` is not on the ring.
    pub fn predecessors_from(&self, id: &PeerId) -> Vec<PeerId> {
        let Some(pos) = self.positions.get(id) else {
            return Vec::new();
        };
        self.order
            .range(..*pos)
            .rev()
            .chain(self.order.range((Excluded(*pos), Unbounded)).rev())
            .map(|(_, id)| *id)
            .collect()
    }
}

/// The full overlay: K rings sharing one membership, seeded with the local
/// member.
#[derive(Debug)]
pub struct RingSet {
    local: PeerId,
    rings: Vec<Ring>,
}

impl RingSet {
    /// Creates `num_rings` rings containing only the local member.
    pub fn new(num_rings: u32, local: PeerId) -> Self {
        let mut rings: Vec<Ring> = (0..num_rings).map(Ring::new).collect();
        for ring in &mut rings {
            ring.insert(local);
        }
        Self { local, rings }
    }

    /// The local member id.
    pub fn local(&self) -> PeerId {
        self.local
    }

    /// Number of rings.
    pub fn num_rings(&self) -> u32 {
        self.rings.len() as u32
    }

    /// The ring at `index`.
    pub fn ring(&self, index: u32) -> Option<&Ring> {
        self.rings.get(index as usize)
    }

    /// All rings in index order.
    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Inserts a member on every ring. Idempotent.
    pub fn insert(&mut self, id: PeerId) {
        for ring in &mut self.rings {
            ring.insert(id);
        }
    }

    /// Removes a member from every ring.
    pub fn remove(&mut self, id: &PeerId) {
        for ring in &mut self.rings {
            ring.remove(id);
        }
    }

    /// The distinct neighbours (predecessor and successor on any ring) of
    /// `of`, excluding `of` itself and the local member.
    pub fn neighbour_ids(&self, of: &PeerId) -> BTreeSet<PeerId> {
        let mut out = BTreeSet::new();
        for ring in &self.rings {
            if let Some((pred, succ)) = ring.neighbours_of(of) {
                out.insert(pred);
                out.insert(succ);
            }
        }
        out.remove(of);
        out.remove(&self.local);
        out
    }
}
