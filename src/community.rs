use std::fmt;
use std::fmt::{Display, Formatter};

use crate::types::{BestNeighbor, Candidate, CommunityId, NeighborEntry};
use crate::universe::Contributions;
use crate::util::{Stamp, StampClock};

/// A community of the universe. Keeps its neighbors ordered by id, each
/// with the modularity change of a merge, and the best of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Community {
    id: CommunityId,  // ID of community.
    neighbors: Vec<NeighborEntry>,  // Neighbors and members, strictly increasing ids.
    best: Option<BestNeighbor>,  // Result of the last scan.
    stamp: Stamp,  // Stamp of the last scan, 0 if never scanned.
}

impl Community {
    /// Create a community from an ordered neighbor sequence.
    pub fn new(id: CommunityId, neighbors: Vec<NeighborEntry>) -> Community {
        debug_assert!(neighbors.windows(2).all(|w| w[0].neighbor_id < w[1].neighbor_id));
        Community {
            id,
            neighbors,
            best: None,
            stamp: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> CommunityId {
        self.id
    }

    #[inline]
    pub fn neighbors(&self) -> &[NeighborEntry] {
        &self.neighbors
    }

    #[inline]
    pub fn best(&self) -> Option<BestNeighbor> {
        self.best
    }

    #[inline]
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    /// Length of the whole sequence, members included.
    #[inline]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn contains(&self, id: CommunityId) -> bool {
        self.position(id).is_ok()
    }

    /// Count of structural neighbors.
    pub fn degree(&self) -> usize {
        self.neighbors.iter().filter(|e| !e.is_member).count()
    }

    pub fn member_count(&self) -> usize {
        self.neighbors.iter().filter(|e| e.is_member).count()
    }

    /// Ids folded into this community, ascending.
    pub fn members(&self) -> impl Iterator<Item = CommunityId> + '_ {
        self.neighbors.iter()
            .filter(|e| e.is_member)
            .map(|e| e.neighbor_id)
    }

    pub fn is_strictly_sorted(&self) -> bool {
        self.neighbors.windows(2).all(|w| w[0].neighbor_id < w[1].neighbor_id)
    }

    /// The candidate pushed for this community after a successful scan.
    pub fn candidate(&self) -> Option<Candidate> {
        self.best.map(|best| Candidate {
            community: self.id,
            neighbor: best.neighbor_id,
            delta_q: best.delta_q,
            stamp: self.stamp,
        })
    }

    fn position(&self, id: CommunityId) -> Result<usize, usize> {
        self.neighbors.binary_search_by_key(&id, |e| e.neighbor_id)
    }

    /// Find the alive structural neighbor with the largest positive delta Q.
    /// The first one in id order wins a tie. The stamp is refreshed on every call.
    pub fn scan(&mut self, av: &Contributions, clock: &StampClock) -> bool {
        let mut best: Option<BestNeighbor> = None;
        for entry in &self.neighbors {
            if entry.is_member || !av.is_alive(entry.neighbor_id) {
                continue;
            }
            let best_dq = best.map_or(0.0, |b| b.delta_q);
            if entry.delta_q > best_dq {
                best = Some(BestNeighbor {
                    neighbor_id: entry.neighbor_id,
                    delta_q: entry.delta_q,
                });
            }
        }
        self.best = best;
        self.stamp = clock.tick();
        best.is_some()
    }

    /// Drop the result of the last scan.
    pub fn invalidate(&mut self) {
        self.best = None;
    }

    /// Merge `other` into this community. Both sequences are walked once,
    /// `other` is left empty. `av` must still hold the values before the merge.
    pub fn merge(&mut self, other: &mut Community, av: &Contributions) {
        let self_av = av.value(self.id);
        let other_av = av.value(other.id);

        let left = std::mem::take(&mut self.neighbors);
        let right = std::mem::take(&mut other.neighbors);
        let mut merged = Vec::with_capacity(left.len() + right.len() + 1);

        let mut ax = left.into_iter().peekable();
        let mut bx = right.into_iter().peekable();
        loop {
            match (ax.peek().copied(), bx.peek().copied()) {
                (None, None) => break,
                // The pair itself becomes a self loop, drop it on both sides.
                (Some(a), _) if a.neighbor_id == other.id => {
                    ax.next();
                }
                (_, Some(b)) if b.neighbor_id == self.id => {
                    bx.next();
                }
                (Some(mut a), None) => {
                    // Equation (10c).
                    a.delta_q -= 2.0 * other_av * av.value(a.neighbor_id);
                    merged.push(a);
                    ax.next();
                }
                (None, Some(mut b)) => {
                    // Equation (10b).
                    b.delta_q -= 2.0 * self_av * av.value(b.neighbor_id);
                    merged.push(b);
                    bx.next();
                }
                (Some(mut a), Some(mut b)) => {
                    if a.neighbor_id < b.neighbor_id {
                        a.delta_q -= 2.0 * other_av * av.value(a.neighbor_id);
                        merged.push(a);
                        ax.next();
                    } else if a.neighbor_id > b.neighbor_id {
                        b.delta_q -= 2.0 * self_av * av.value(b.neighbor_id);
                        merged.push(b);
                        bx.next();
                    } else {
                        // Equation (10a).
                        if b.is_member {
                            a.is_member = true;
                        } else {
                            a.delta_q += b.delta_q;
                        }
                        merged.push(a);
                        ax.next();
                        bx.next();
                    }
                }
            }
        }

        self.neighbors = merged;
        self.insert_member(other.id);
        other.best = None;
        debug_assert!(self.is_strictly_sorted());
    }

    /// Add the own id as a member entry, so the member list is complete.
    pub fn materialize_members(&mut self) {
        self.insert_member(self.id);
    }

    fn insert_member(&mut self, id: CommunityId) {
        match self.position(id) {
            Ok(pos) => self.neighbors[pos].is_member = true,
            Err(pos) => self.neighbors.insert(pos, NeighborEntry::member(id)),
        }
    }
}

impl Display for Community {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "C{} (stamp: {}) -> ", self.id, self.stamp)?;
        for entry in &self.neighbors {
            write!(f, "{} ", entry)?;
        }
        match self.best {
            Some(best) => write!(f, "best: C{}", best.neighbor_id),
            None => write!(f, "best: none"),
        }
    }
}
