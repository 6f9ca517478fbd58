use std::collections::BinaryHeap;

use crate::types::{Candidate, CommunityId};
use crate::util::Stamp;

/// Max-heap of merge candidates. Stale entries are never searched for,
/// they are dropped when popped and their stamp no longer matches.
#[derive(Debug, Default)]
pub struct CandidateHeap {
    heap: BinaryHeap<Candidate>,
}

impl CandidateHeap {
    pub fn new() -> Self {
        CandidateHeap { heap: BinaryHeap::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        CandidateHeap { heap: BinaryHeap::with_capacity(capacity) }
    }

    #[inline]
    pub fn push(&mut self, community: CommunityId, neighbor: CommunityId, delta_q: f64, stamp: Stamp) {
        self.heap.push(Candidate { community, neighbor, delta_q, stamp });
    }

    #[inline]
    pub fn push_candidate(&mut self, candidate: Candidate) {
        self.heap.push(candidate);
    }

    /// Remove the candidate with the largest delta Q.
    #[inline]
    pub fn pop(&mut self) -> Option<Candidate> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&Candidate> {
        self.heap.peek()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

impl Extend<Candidate> for CandidateHeap {
    fn extend<T: IntoIterator<Item = Candidate>>(&mut self, iter: T) {
        self.heap.extend(iter);
    }
}
