use std::cmp::Ordering;
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::util::Stamp;

/// Vertex id as read from the input graph.
pub type VInt = u32;

/// Dense community id in `[0, n)`. Community `i` starts out as vertex `i`.
pub type CommunityId = u32;

// Define a trait to encode something to Bytes.
pub trait Encode {
    // the method encode itself to Bytes.
    fn encode(&self) -> Vec<u8>;
}

pub trait Decode: Sized {
    fn from_bytes(bytes: &[u8]) -> Option<Self>;
}

/// One slot in a community's ordered neighbor sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEntry {
    pub neighbor_id: CommunityId,
    pub delta_q: f64,  // Modularity change when merging with this neighbor.
    pub is_member: bool  // Folded into the community, not a structural neighbor.
}

impl NeighborEntry {
    pub fn neighbor(neighbor_id: CommunityId, delta_q: f64) -> Self {
        NeighborEntry {
            neighbor_id,
            delta_q,
            is_member: false
        }
    }

    pub fn member(neighbor_id: CommunityId) -> Self {
        NeighborEntry {
            neighbor_id,
            delta_q: 0.0,
            is_member: true
        }
    }
}

impl Display for NeighborEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_member {
            write!(f, "[C{}]", self.neighbor_id)
        } else {
            write!(f, "C{}({:.6})", self.neighbor_id, self.delta_q)
        }
    }
}

/// The best merge partner found by the last scan, held by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestNeighbor {
    pub neighbor_id: CommunityId,
    pub delta_q: f64,
}

/// Entry of the contribution vector `av`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contribution {
    /// Still a community, holding its share `degree / 2m` of the total degree.
    Alive(f64),
    /// Absorbed, the value is the community it was merged into.
    Redirect(CommunityId),
}

impl Contribution {
    #[inline]
    pub fn is_alive(&self) -> bool {
        matches!(self, Contribution::Alive(_))
    }

    /// The contribution of an alive community, zero for an absorbed one.
    #[inline]
    pub fn value(&self) -> f64 {
        match self {
            Contribution::Alive(v) => *v,
            Contribution::Redirect(_) => 0.0,
        }
    }
}

/// A proposed merge of `community` with `neighbor`, valid only while the
/// stamp of `community` is still `stamp`.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub community: CommunityId,
    pub neighbor: CommunityId,
    pub delta_q: f64,
    pub stamp: Stamp,
}

// Larger delta Q first, then the smaller community id, then the smaller neighbor id.
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.delta_q.total_cmp(&other.delta_q)
            .then_with(|| other.community.cmp(&self.community))
            .then_with(|| other.neighbor.cmp(&self.neighbor))
            .then_with(|| other.stamp.cmp(&self.stamp))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Display for Candidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "(C{} -> C{}, dq: {:.6}, stamp: {})",
               self.community, self.neighbor, self.delta_q, self.stamp)
    }
}
