use anyhow::{bail, Result};
use rayon::prelude::*;

use crate::community::Community;
use crate::graph::GraphSnapshot;
use crate::types::{CommunityId, Contribution, NeighborEntry};

/// The vector `av`: one contribution per community, or the id of the
/// community that absorbed it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contributions {
    values: Vec<Contribution>,
}

impl Contributions {
    pub fn new(values: Vec<Contribution>) -> Self {
        Contributions { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, id: CommunityId) -> Contribution {
        self.values[id as usize]
    }

    #[inline]
    pub fn is_alive(&self, id: CommunityId) -> bool {
        self.values[id as usize].is_alive()
    }

    #[inline]
    pub fn value(&self, id: CommunityId) -> f64 {
        self.values[id as usize].value()
    }

    pub fn as_slice(&self) -> &[Contribution] {
        &self.values
    }

    /// Move the contribution of `absorbed` onto `survivor` and leave a redirect behind.
    pub fn absorb(&mut self, survivor: CommunityId, absorbed: CommunityId) {
        let moved = self.value(absorbed);
        if let Contribution::Alive(v) = &mut self.values[survivor as usize] {
            *v += moved;
        }
        self.values[absorbed as usize] = Contribution::Redirect(survivor);
    }

    /// Follow redirects from `id` to the community that owns it now.
    pub fn owner_of(&self, id: CommunityId) -> CommunityId {
        let mut current = id;
        // A chain can never be longer than the number of communities.
        for _ in 0..self.values.len() {
            match self.values[current as usize] {
                Contribution::Alive(_) => return current,
                Contribution::Redirect(owner) => current = owner,
            }
        }
        current
    }

    pub fn alive_ids(&self) -> impl Iterator<Item = CommunityId> + '_ {
        self.values.iter()
            .enumerate()
            .filter(|(_, c)| c.is_alive())
            .map(|(id, _)| id as CommunityId)
    }

    pub fn alive_count(&self) -> usize {
        self.values.iter().filter(|c| c.is_alive()).count()
    }

    /// Sum of the contributions of alive communities. Merges keep it constant.
    pub fn alive_mass(&self) -> f64 {
        self.values.iter().map(|c| c.value()).sum()
    }

    /// Modularity of the current partition if no pair shared an edge, `-Σ av²`.
    pub fn initial_modularity(&self) -> f64 {
        -self.values.iter().map(|c| c.value() * c.value()).sum::<f64>()
    }
}

/// Every community of the run together with `av`.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    communities: Vec<Community>,
    av: Contributions,
    edge_count: u64,
}

/// Initial delta Q of joining two single vertex communities across one edge.
#[inline]
pub(crate) fn initial_delta_q(ki: usize, kj: usize, m: u64) -> f64 {
    let two_m = 2.0 * m as f64;
    2.0 * (1.0 / two_m - (ki as f64 * kj as f64) / (two_m * two_m))
}

impl Universe {
    /// One community per vertex, `av[i] = k_i / 2m`.
    pub fn from_graph(graph: &GraphSnapshot) -> Result<Universe> {
        let m = graph.edge_count();
        if m == 0 {
            bail!("graph has no edges, modularity is undefined");
        }
        let n = graph.vertex_count();
        let two_m = 2.0 * m as f64;

        let communities: Vec<Community> = (0..n).into_par_iter()
            .map(|i| {
                let ki = graph.degree(i as CommunityId);
                let entries = graph.neighbors(i as CommunityId).iter()
                    .map(|&j| NeighborEntry::neighbor(j, initial_delta_q(ki, graph.degree(j), m)))
                    .collect();
                Community::new(i as CommunityId, entries)
            })
            .collect();

        let av = Contributions::new((0..n)
            .map(|i| Contribution::Alive(graph.degree(i as CommunityId) as f64 / two_m))
            .collect());

        Ok(Universe {
            communities,
            av,
            edge_count: m,
        })
    }

    pub fn from_parts(communities: Vec<Community>, av: Contributions, edge_count: u64) -> Universe {
        debug_assert_eq!(communities.len(), av.len());
        Universe {
            communities,
            av,
            edge_count,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.communities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }

    #[inline]
    pub fn edge_count(&self) -> u64 {
        self.edge_count
    }

    #[inline]
    pub fn community(&self, id: CommunityId) -> &Community {
        &self.communities[id as usize]
    }

    #[inline]
    pub fn community_mut(&mut self, id: CommunityId) -> &mut Community {
        &mut self.communities[id as usize]
    }

    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    #[inline]
    pub fn av(&self) -> &Contributions {
        &self.av
    }

    pub(crate) fn av_mut(&mut self) -> &mut Contributions {
        &mut self.av
    }

    /// Borrow the records mutably while `av` stays readable.
    pub(crate) fn split_mut(&mut self) -> (&mut [Community], &Contributions) {
        (&mut self.communities, &self.av)
    }

    /// Two distinct records at once, in argument order.
    pub(crate) fn pair_mut(&mut self, a: CommunityId, b: CommunityId) -> (&mut Community, &mut Community, &Contributions) {
        assert_ne!(a, b, "cannot borrow community {} twice", a);
        let (a, b) = (a as usize, b as usize);
        let (first, second) = if a < b {
            let (low, high) = self.communities.split_at_mut(b);
            (&mut low[a], &mut high[0])
        } else {
            let (low, high) = self.communities.split_at_mut(a);
            (&mut high[0], &mut low[b])
        };
        (first, second, &self.av)
    }

    pub fn owner_of(&self, id: CommunityId) -> CommunityId {
        self.av.owner_of(id)
    }
}

#[cfg(test)]
mod test_universe {
    use crate::graph::GraphSnapshot;
    use crate::types::Contribution;
    use crate::universe::{Contributions, Universe};

    fn path4() -> GraphSnapshot {
        GraphSnapshot::from_edges(vec![(0, 1), (1, 2), (2, 3)].into_iter())
    }

    #[test]
    fn test_from_graph() {
        let universe = Universe::from_graph(&path4()).unwrap();
        assert_eq!(universe.len(), 4);
        assert_eq!(universe.edge_count(), 3);

        let expected = [1.0 / 6.0, 2.0 / 6.0, 2.0 / 6.0, 1.0 / 6.0];
        for (i, v) in expected.iter().enumerate() {
            assert!((universe.av().value(i as u32) - v).abs() < 1e-12);
        }

        // dq(0, 1) = 2 * (1/6 - 2/36) = 8/36, dq(1, 2) = 2 * (1/6 - 4/36) = 4/36.
        let c1 = universe.community(1);
        assert_eq!(c1.neighbors().len(), 2);
        assert!((c1.neighbors()[0].delta_q - 8.0 / 36.0).abs() < 1e-12);
        assert!((c1.neighbors()[1].delta_q - 4.0 / 36.0).abs() < 1e-12);
        assert!((universe.av().initial_modularity() + 10.0 / 36.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_graph_rejected() {
        let graph = GraphSnapshot::from_edges(vec![(3, 3)].into_iter());
        assert!(Universe::from_graph(&graph).is_err());
    }

    #[test]
    fn test_absorb_and_owner() {
        let mut av = Contributions::new(vec![Contribution::Alive(0.25); 4]);
        av.absorb(1, 0);
        av.absorb(2, 1);
        assert_eq!(av.owner_of(0), 2);
        assert_eq!(av.owner_of(1), 2);
        assert_eq!(av.owner_of(3), 3);
        assert!((av.value(2) - 0.75).abs() < 1e-12);
        assert!((av.alive_mass() - 1.0).abs() < 1e-12);
        assert_eq!(av.alive_count(), 2);
        assert_eq!(av.alive_ids().collect::<Vec<_>>(), vec![2, 3]);
        // Redirect to 0 must stay distinguishable from an alive community.
        av.absorb(0, 3);
        assert_eq!(av.get(3), Contribution::Redirect(0));
    }

    #[test]
    fn test_pair_mut() {
        let mut universe = Universe::from_graph(&path4()).unwrap();
        let (a, b, _) = universe.pair_mut(2, 1);
        assert_eq!((a.id(), b.id()), (2, 1));
        let (a, b, _) = universe.pair_mut(0, 3);
        assert_eq!((a.id(), b.id()), (0, 3));
    }
}
