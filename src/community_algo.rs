use std::time::Instant;

use anyhow::Result;
use fixedbitset::FixedBitSet;
use log::{debug, info, trace};
use rayon::prelude::*;

use crate::config::PARALLEL_SCAN_THRESHOLD;
use crate::graph::GraphSnapshot;
use crate::heap::CandidateHeap;
use crate::partition::{MergeRecord, Partition};
use crate::types::{Candidate, CommunityId};
use crate::universe::Universe;
use crate::util::{elapsed_ms, StampClock};

// Define the core of community detection, i.e., greedy modularity maximization.
// The engine owns the universe, the candidate heap and the stamp clock.
pub struct ModularityEngine {
    universe: Universe,
    heap: CandidateHeap,
    clock: StampClock,
    modularity: f64,  // Accumulated Q.
    history: Vec<MergeRecord>,  // Applied merges in order.
    rescans: usize,  // Full rescans after the heap ran dry.
}

impl ModularityEngine {
    /// Take over a universe and fill the heap with one candidate per community.
    pub fn new(universe: Universe) -> ModularityEngine {
        let start = Instant::now();
        let modularity = universe.av().initial_modularity();
        let mut engine = ModularityEngine {
            heap: CandidateHeap::with_capacity(universe.len()),
            universe,
            clock: StampClock::new(),
            modularity,
            history: Vec::new(),
            rescans: 0,
        };
        let pushed = engine.initialize();
        info!("Engine ready: {} communities, {} edges, {} candidates, Q0 = {:.6} ({:.1} ms)",
              engine.universe.len(), engine.universe.edge_count(), pushed, modularity, elapsed_ms(start));
        engine
    }

    pub fn from_graph(graph: &GraphSnapshot) -> Result<ModularityEngine> {
        Ok(Self::new(Universe::from_graph(graph)?))
    }

    #[inline]
    pub fn modularity(&self) -> f64 {
        self.modularity
    }

    #[inline]
    pub fn merges(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[MergeRecord] {
        &self.history
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn heap(&self) -> &CandidateHeap {
        &self.heap
    }

    pub fn rescans(&self) -> usize {
        self.rescans
    }

    /// The community vertex `vertex` belongs to now.
    pub fn owner_of(&self, vertex: CommunityId) -> CommunityId {
        self.universe.owner_of(vertex)
    }

    /// Scan every alive community and refill the heap from scratch.
    /// Returns the number of candidates pushed.
    pub fn initialize(&mut self) -> usize {
        self.heap.clear();
        let clock = &self.clock;
        let (communities, av) = self.universe.split_mut();
        let candidates: Vec<Candidate> = if communities.len() >= PARALLEL_SCAN_THRESHOLD {
            communities.par_iter_mut()
                .filter(|c| av.is_alive(c.id()))
                .filter_map(|c| if c.scan(av, clock) { c.candidate() } else { None })
                .collect()
        } else {
            communities.iter_mut()
                .filter(|c| av.is_alive(c.id()))
                .filter_map(|c| if c.scan(av, clock) { c.candidate() } else { None })
                .collect()
        };
        let pushed = candidates.len();
        self.heap.extend(candidates);
        pushed
    }

    /// Rescan one community and push its new candidate, if any.
    fn rescan(&mut self, id: CommunityId) -> bool {
        let (communities, av) = self.universe.split_mut();
        let community = &mut communities[id as usize];
        if community.scan(av, &self.clock) {
            if let Some(candidate) = community.candidate() {
                self.heap.push_candidate(candidate);
            }
            true
        } else {
            false
        }
    }

    /// Whether a popped candidate may still be applied. A candidate pointing
    /// at an absorbed neighbor makes its community look for a new best one.
    pub fn validity(&mut self, candidate: &Candidate) -> bool {
        let av = self.universe.av();
        if !av.is_alive(candidate.community) {
            trace!("Drop {}: community absorbed", candidate);
            return false;
        }
        if !av.is_alive(candidate.neighbor) {
            trace!("Drop {}: neighbor absorbed, rescanning", candidate);
            self.rescan(candidate.community);
            return false;
        }
        let current = self.universe.community(candidate.community).stamp() == candidate.stamp;
        if !current {
            trace!("Drop {}: stale stamp", candidate);
        }
        current
    }

    /// Merge `a` and `b`. The one with the longer sequence survives, `a` on a tie.
    /// Returns the survivor.
    pub fn merge_step(&mut self, a: CommunityId, b: CommunityId) -> CommunityId {
        let len_a = self.universe.community(a).len();
        let len_b = self.universe.community(b).len();
        let (survivor, absorbed) = if len_b > len_a { (b, a) } else { (a, b) };

        {
            let (keep, gone, av) = self.universe.pair_mut(survivor, absorbed);
            keep.merge(gone, av);
            gone.invalidate();
        }
        self.universe.av_mut().absorb(survivor, absorbed);
        self.rescan(survivor);
        survivor
    }

    // Apply a validated candidate and book it.
    fn apply(&mut self, candidate: &Candidate) -> MergeRecord {
        let delta_q = self.universe.community(candidate.community)
            .best()
            .map_or(candidate.delta_q, |best| best.delta_q);
        self.modularity += delta_q;
        let survivor = self.merge_step(candidate.community, candidate.neighbor);
        let absorbed = if survivor == candidate.community { candidate.neighbor } else { candidate.community };
        let record = MergeRecord {
            survivor,
            absorbed,
            delta_q,
            modularity: self.modularity,
        };
        debug!("Merge C{} into C{}: dq = {:.6}, Q = {:.6}", absorbed, survivor, delta_q, self.modularity);
        self.history.push(record);
        record
    }

    /// Pop until one candidate is valid and apply it. `None` once the heap is empty.
    pub fn step(&mut self) -> Option<MergeRecord> {
        while let Some(candidate) = self.heap.pop() {
            if self.validity(&candidate) {
                return Some(self.apply(&candidate));
            }
        }
        None
    }

    /// Single pair loop. Drain the heap, then rescan everything; stop when
    /// the rescan finds no improving pair.
    pub fn cnm(&mut self) -> f64 {
        let start = Instant::now();
        let merges_before = self.merges();
        loop {
            let mut merged = 0usize;
            while self.step().is_some() {
                merged += 1;
            }
            let pushed = self.initialize();
            self.rescans += 1;
            info!("Convergence rescan #{} after {} merges: {} candidates", self.rescans, merged, pushed);
            if pushed == 0 {
                break;
            }
        }
        info!("CNM done: {} merges, {} communities, Q = {:.6} ({:.1} ms)",
              self.merges() - merges_before, self.universe.av().alive_count(),
              self.modularity, elapsed_ms(start));
        self.modularity
    }

    /// Batched loop. Each round collects up to `scope` valid candidates and
    /// applies those whose two communities are untouched in the round; the
    /// others go back to the heap. The first round uses `initial_scope`,
    /// later ones `subsequent_scope`. Finishes with `cnm`.
    pub fn cnm2(&mut self, initial_scope: usize, subsequent_scope: usize) -> f64 {
        let start = Instant::now();
        let subsequent_scope = subsequent_scope.max(1);
        let mut scope = initial_scope.max(1);
        let mut touched = FixedBitSet::with_capacity(self.universe.len());
        let mut batch: Vec<Candidate> = Vec::with_capacity(scope);
        let mut deferred: Vec<Candidate> = Vec::new();
        let mut rounds = 0usize;
        let merges_before = self.merges();

        loop {
            while batch.len() < scope {
                let Some(candidate) = self.heap.pop() else {
                    break;
                };
                if self.validity(&candidate) {
                    batch.push(candidate);
                }
            }
            // Nothing valid left and the heap is empty.
            if batch.is_empty() {
                break;
            }

            for candidate in batch.drain(..) {
                let (a, b) = (candidate.community as usize, candidate.neighbor as usize);
                if touched.contains(a) || touched.contains(b) {
                    deferred.push(candidate);
                    continue;
                }
                touched.insert(a);
                touched.insert(b);
                self.apply(&candidate);
            }
            self.heap.extend(deferred.drain(..));
            touched.clear();
            rounds += 1;
            scope = subsequent_scope;
        }

        info!("Batched phase done: {} rounds, {} merges ({:.1} ms)",
              rounds, self.merges() - merges_before, elapsed_ms(start));
        self.cnm()
    }

    /// Add every alive community to its own member list.
    pub fn materialize_members(&mut self) {
        let alive: Vec<CommunityId> = self.universe.av().alive_ids().collect();
        for id in alive {
            self.universe.community_mut(id).materialize_members();
        }
    }

    /// Materialize members and report the alive communities. `graph` must be
    /// the graph the universe was built from, it is used to recompute the
    /// modularity of the final partition.
    pub fn into_partition(mut self, graph: &GraphSnapshot) -> Partition {
        self.materialize_members();
        let communities = self.universe.av().alive_ids()
            .map(|id| self.universe.community(id).members().collect())
            .collect();
        let partition = Partition::new(graph, communities, self.modularity, self.history);
        info!("Running Q = {:.6}, recomputed Q = {:.6}", partition.modularity, partition.partition_modularity);
        partition
    }
}
