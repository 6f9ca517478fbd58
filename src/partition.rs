use itertools::Itertools;
use serde::Serialize;

use crate::graph::GraphSnapshot;
use crate::types::{CommunityId, VInt};

/// One applied merge, in the order the engine applied them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergeRecord {
    pub survivor: CommunityId,
    pub absorbed: CommunityId,
    pub delta_q: f64,
    pub modularity: f64,  // Q after this merge.
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    /// Member vertices of every surviving community, each ascending.
    /// Communities are ordered by their smallest member.
    pub communities: Vec<Vec<VInt>>,
    /// Running total `Q₀ + Σ dq` of the applied merges. Only survivor lists
    /// are rewritten on a merge, so this is an estimate of the real value.
    pub modularity: f64,
    /// Modularity of `communities`, recomputed on the graph.
    pub partition_modularity: f64,
    pub merges: usize,
    pub history: Vec<MergeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub vertex_count: usize,
    pub community_count: usize,
    pub largest: usize,
    pub smallest: usize,
    pub singletons: usize,
    pub mean_size: f64,
    pub modularity: f64,
    pub partition_modularity: f64,
    pub merges: usize,
}

impl Partition {
    pub fn new(graph: &GraphSnapshot, mut communities: Vec<Vec<VInt>>, modularity: f64,
               history: Vec<MergeRecord>) -> Partition {
        for members in communities.iter_mut() {
            members.sort_unstable();
        }
        communities.sort_unstable_by_key(|members| members.first().copied());
        let partition_modularity = modularity_of(graph, &communities);
        Partition {
            communities,
            modularity,
            partition_modularity,
            merges: history.len(),
            history,
        }
    }

    pub fn community_count(&self) -> usize {
        self.communities.len()
    }

    /// Community index of every vertex, `None` for vertices in no community.
    pub fn labels(&self, vertex_count: usize) -> Vec<Option<usize>> {
        let mut labels = vec![None; vertex_count];
        for (index, members) in self.communities.iter().enumerate() {
            for &v in members {
                if let Some(slot) = labels.get_mut(v as usize) {
                    *slot = Some(index);
                }
            }
        }
        labels
    }

    pub fn summary(&self) -> Summary {
        let sizes = self.communities.iter().map(|c| c.len()).collect_vec();
        let vertex_count: usize = sizes.iter().sum();
        let (smallest, largest) = match sizes.iter().minmax().into_option() {
            Some((&min, &max)) => (min, max),
            None => (0, 0),
        };
        Summary {
            vertex_count,
            community_count: sizes.len(),
            largest,
            smallest,
            singletons: sizes.iter().filter(|&&s| s == 1).count(),
            mean_size: if sizes.is_empty() { 0.0 } else { vertex_count as f64 / sizes.len() as f64 },
            modularity: self.modularity,
            partition_modularity: self.partition_modularity,
            merges: self.merges,
        }
    }
}

/// Newman modularity of `communities` on `graph`, computed from scratch.
/// Vertices left out of every community count as singletons.
pub fn modularity_of(graph: &GraphSnapshot, communities: &[Vec<VInt>]) -> f64 {
    let m = graph.edge_count();
    if m == 0 {
        return 0.0;
    }
    let n = graph.vertex_count();
    let mut com_structure: Vec<usize> = (0..n).map(|v| communities.len() + v).collect();
    for (index, members) in communities.iter().enumerate() {
        for &v in members {
            com_structure[v as usize] = index;
        }
    }

    let slots = communities.len() + n;
    let mut internal = vec![0.0f64; slots];
    let mut degrees = vec![0.0f64; slots];
    for u in 0..n {
        let cu = com_structure[u];
        let neighbors = graph.neighbors(u as VInt);
        degrees[cu] += neighbors.len() as f64;
        for &v in neighbors {
            if com_structure[v as usize] == cu {
                internal[cu] += 1.0;
            }
        }
    }

    let total = m as f64;
    let mut res = 0.0f64;
    for i in 0..slots {
        // Every internal edge was seen from both ends.
        internal[i] /= 2.0;
        res += internal[i] / total - (degrees[i] / (2.0 * total)).powi(2);
    }
    res
}

#[cfg(test)]
mod test_partition {
    use crate::graph::GraphSnapshot;
    use crate::partition::{modularity_of, Partition};

    #[test]
    fn test_modularity_of_known_partitions() {
        let path = GraphSnapshot::from_edges(vec![(0, 1), (1, 2), (2, 3)].into_iter());
        let whole = modularity_of(&path, &[vec![0, 1, 2, 3]]);
        assert!(whole.abs() < 1e-12);
        let halves = modularity_of(&path, &[vec![0, 1], vec![2, 3]]);
        assert!((halves - 1.0 / 6.0).abs() < 1e-12);
        // Singletons: -Σ (k/2m)².
        let singles = modularity_of(&path, &[]);
        assert!((singles + 10.0 / 36.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_and_labels() {
        let graph = GraphSnapshot::from_edges(vec![(0, 1), (1, 2), (3, 5), (4, 5)].into_iter());
        let partition = Partition::new(&graph, vec![vec![5, 3], vec![0, 2, 1], vec![4]], 0.25, vec![]);
        assert_eq!(partition.communities, vec![vec![0, 1, 2], vec![3, 5], vec![4]]);
        let summary = partition.summary();
        assert_eq!(summary.community_count, 3);
        assert_eq!(summary.vertex_count, 6);
        assert_eq!((summary.smallest, summary.largest), (1, 3));
        assert_eq!(summary.singletons, 1);
        let expected = modularity_of(&graph, &partition.communities);
        assert_eq!(summary.partition_modularity, expected);
        assert_eq!(summary.modularity, 0.25);
        assert!((summary.mean_size - 2.0).abs() < 1e-12);
        assert_eq!(partition.labels(6), vec![Some(0), Some(0), Some(0), Some(1), Some(2), Some(1)]);
    }

    #[test]
    fn test_json_shape() {
        let graph = GraphSnapshot::from_edges(vec![(0, 1)].into_iter());
        let partition = Partition::new(&graph, vec![vec![0, 1]], 0.5, vec![]);
        let json = serde_json::to_value(&partition).unwrap();
        assert_eq!(json["communities"][0][1], 1);
        assert_eq!(json["merges"], 0);
        assert_eq!(json["partition_modularity"], 0.0);
    }
}
