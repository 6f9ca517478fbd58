use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use itertools::Itertools;
use log::{info, warn};

use crate::config::{CACHE_MAGIC, CACHE_VERSION, READ_BUFFER_SIZE};
use crate::types::{Decode, Encode, VInt};

// Undirected graph without self loops, vertices are 0..n.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub(crate) adj: Vec<Vec<VInt>>,  // Sorted, duplicate free neighbor lists.
    pub(crate) e_size: u64  // Undirected edge count.
}

impl GraphSnapshot {
    pub fn new() -> GraphSnapshot {
        // Create a new empty Graph Snapshot.
        GraphSnapshot {
            adj: Vec::new(),
            e_size: 0u64
        }
    }

    /// Build from undirected edges. Self loops are dropped, repeated edges in
    /// either direction are kept once. Vertex count is the largest id plus one.
    pub fn from_edges(edges_iter: impl Iterator<Item = (VInt, VInt)>) -> GraphSnapshot {
        let mut adj: Vec<Vec<VInt>> = Vec::new();
        for (u, v) in edges_iter {
            let top = u.max(v) as usize;
            if top >= adj.len() {
                adj.resize_with(top + 1, Vec::new);
            }
            if u == v {
                continue;
            }
            adj[u as usize].push(v);
            adj[v as usize].push(u);
        }
        Self::from_adjacency(adj)
    }

    /// Normalize raw adjacency lists: sort and remove duplicates.
    pub fn from_adjacency(adj: Vec<Vec<VInt>>) -> GraphSnapshot {
        let adj: Vec<Vec<VInt>> = adj.into_iter()
            .enumerate()
            .map(|(u, neighbors)| neighbors.into_iter()
                .filter(|&v| v as usize != u)
                .sorted_unstable()
                .dedup()
                .collect())
            .collect();
        let degree_sum: u64 = adj.iter().map(|n| n.len() as u64).sum();
        GraphSnapshot {
            adj,
            e_size: degree_sum / 2
        }
    }

    /// Load an edge list, one `u v` pair per line. Blank lines and lines
    /// starting with `#` or `%` are skipped.
    pub fn from_edge_list_file(file_path: impl AsRef<Path>) -> Result<GraphSnapshot> {
        let file_path = file_path.as_ref();
        let graph_file = File::open(file_path)
            .with_context(|| format!("failed to open edge list {}", file_path.display()))?;
        let graph_reader = BufReader::with_capacity(READ_BUFFER_SIZE, graph_file);
        Self::from_edge_list_reader(graph_reader)
            .with_context(|| format!("failed to load edge list {}", file_path.display()))
    }

    pub fn from_edge_list_reader(reader: impl BufRead) -> Result<GraphSnapshot> {
        let mut edges = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
                continue;
            }
            let mut tokens = trimmed.split_whitespace();
            let (Some(src), Some(dst)) = (tokens.next(), tokens.next()) else {
                bail!("line {}: expected two vertex ids, got `{}`", line_no + 1, trimmed);
            };
            let src: VInt = src.parse()
                .with_context(|| format!("line {}: bad vertex id `{}`", line_no + 1, src))?;
            let dst: VInt = dst.parse()
                .with_context(|| format!("line {}: bad vertex id `{}`", line_no + 1, dst))?;
            edges.push((src, dst));
        }
        Ok(Self::from_edges(edges.into_iter()))
    }

    /// Use the adjacency cache when it decodes, else parse the edge list and
    /// write a fresh cache.
    pub fn load_or_build(edge_path: impl AsRef<Path>, cache_path: Option<&Path>) -> Result<GraphSnapshot> {
        let Some(cache_path) = cache_path else {
            return Self::from_edge_list_file(edge_path);
        };
        if cache_path.exists() {
            match Self::read_cache(cache_path) {
                Ok(graph) => {
                    info!("Adjacency cache {} loaded", cache_path.display());
                    return Ok(graph);
                }
                Err(e) => warn!("Adjacency cache {} unusable, rebuilding: {:#}", cache_path.display(), e),
            }
        } else {
            info!("Adjacency cache {} not found, building it", cache_path.display());
        }
        let graph = Self::from_edge_list_file(edge_path)?;
        graph.write_cache(cache_path)?;
        Ok(graph)
    }

    pub fn read_cache(cache_path: impl AsRef<Path>) -> Result<GraphSnapshot> {
        let cache_path = cache_path.as_ref();
        let mut bytes = Vec::new();
        File::open(cache_path)
            .and_then(|mut f| f.read_to_end(&mut bytes))
            .with_context(|| format!("failed to read cache {}", cache_path.display()))?;
        match GraphSnapshot::from_bytes(&bytes) {
            Some(graph) => Ok(graph),
            None => bail!("cache {} is corrupted or from another version", cache_path.display()),
        }
    }

    pub fn write_cache(&self, cache_path: impl AsRef<Path>) -> Result<()> {
        let cache_path = cache_path.as_ref();
        let file = File::create(cache_path)
            .with_context(|| format!("failed to create cache {}", cache_path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&self.encode())
            .and_then(|_| writer.flush())
            .with_context(|| format!("failed to write cache {}", cache_path.display()))?;
        Ok(())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.adj.len()
    }

    #[inline]
    pub fn edge_count(&self) -> u64 {
        self.e_size
    }

    #[inline]
    pub fn degree(&self, vertex_id: VInt) -> usize {
        self.adj[vertex_id as usize].len()
    }

    #[inline]
    pub fn neighbors(&self, vertex_id: VInt) -> &[VInt] {
        &self.adj[vertex_id as usize]
    }

    /// Check what the modularity engine relies on: sorted unique lists,
    /// ids in range, no self loops, every edge stored in both directions.
    pub fn validate(&self) -> Result<()> {
        let n = self.adj.len();
        let mut degree_sum = 0u64;
        for (u, neighbors) in self.adj.iter().enumerate() {
            degree_sum += neighbors.len() as u64;
            if !neighbors.windows(2).all(|w| w[0] < w[1]) {
                bail!("neighbors of vertex {} are not strictly increasing", u);
            }
            for &v in neighbors {
                if v as usize >= n {
                    bail!("vertex {} has neighbor {} out of range 0..{}", u, v, n);
                }
                if v as usize == u {
                    bail!("vertex {} has a self loop", u);
                }
                if self.adj[v as usize].binary_search(&(u as VInt)).is_err() {
                    bail!("edge ({}, {}) is missing its reverse direction", u, v);
                }
            }
        }
        if degree_sum != 2 * self.e_size {
            bail!("edge count {} does not match degree sum {}", self.e_size, degree_sum);
        }
        Ok(())
    }

    pub fn print_graph(&self) {
        for (u, neighbors) in self.adj.iter().enumerate() {
            println!("{} -> {}", u, neighbors.iter().join(" "));
        }
    }
}

// Layout: magic, version, n, m, then per vertex the degree and the ids,
// finally a crc32 of everything before it.
impl Encode for GraphSnapshot {
    fn encode(&self) -> Vec<u8> {
        let degree_sum: usize = self.adj.iter().map(|n| n.len()).sum();
        let mut buf = Vec::with_capacity(24 + 4 * (self.adj.len() + degree_sum));
        buf.extend_from_slice(CACHE_MAGIC);
        // Writing into a Vec never fails.
        let _ = buf.write_u32::<LittleEndian>(CACHE_VERSION);
        let _ = buf.write_u32::<LittleEndian>(self.adj.len() as u32);
        let _ = buf.write_u64::<LittleEndian>(self.e_size);
        for neighbors in &self.adj {
            let _ = buf.write_u32::<LittleEndian>(neighbors.len() as u32);
            for &v in neighbors {
                let _ = buf.write_u32::<LittleEndian>(v);
            }
        }
        let checksum = crc32fast::hash(&buf);
        let _ = buf.write_u32::<LittleEndian>(checksum);
        buf
    }
}

impl Decode for GraphSnapshot {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        const HEADER: usize = 4 + 4 + 4 + 8;
        if bytes.len() < HEADER + 4 {
            return None;
        }
        let (body, tail) = bytes.split_at(bytes.len() - 4);
        if crc32fast::hash(body) != LittleEndian::read_u32(tail) {
            return None;
        }
        if &body[0..4] != CACHE_MAGIC || LittleEndian::read_u32(&body[4..8]) != CACHE_VERSION {
            return None;
        }
        let n = LittleEndian::read_u32(&body[8..12]) as usize;
        let e_size = LittleEndian::read_u64(&body[12..20]);

        let mut adj = Vec::with_capacity(n);
        let mut offset = HEADER;
        for _ in 0..n {
            let degree = LittleEndian::read_u32(body.get(offset..offset + 4)?) as usize;
            offset += 4;
            let raw = body.get(offset..offset + 4 * degree)?;
            let mut neighbors = vec![0u32; degree];
            LittleEndian::read_u32_into(raw, &mut neighbors);
            offset += 4 * degree;
            adj.push(neighbors);
        }
        if offset != body.len() {
            return None;
        }
        Some(GraphSnapshot {
            adj,
            e_size
        })
    }
}

#[cfg(test)]
mod test_graph {
    use std::io::Cursor;

    use crate::graph::GraphSnapshot;
    use crate::types::{Decode, Encode};

    #[test]
    fn test_from_edges() {
        let g = GraphSnapshot::from_edges(vec![(1, 2), (2, 3), (3, 1), (2, 1), (4, 4)].into_iter());
        assert_eq!(g.vertex_count(), 5);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.neighbors(1), &[2, 3]);
        assert_eq!(g.neighbors(2), &[1, 3]);
        assert_eq!(g.degree(0), 0);
        assert_eq!(g.degree(4), 0);
        g.validate().unwrap();
        g.print_graph();
    }

    #[test]
    fn test_edge_list_reader() {
        let text = "# Directed graph: example\n# FromNodeId\tToNodeId\n0\t1\n1 2\n\n% comment\n2   0\n";
        let g = GraphSnapshot::from_edge_list_reader(Cursor::new(text)).unwrap();
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.neighbors(0), &[1, 2]);
    }

    #[test]
    fn test_edge_list_errors() {
        let err = GraphSnapshot::from_edge_list_reader(Cursor::new("0 1\n2\n")).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
        let err = GraphSnapshot::from_edge_list_reader(Cursor::new("0 x\n")).unwrap_err();
        assert!(format!("{:#}", err).contains("bad vertex id"));
    }

    #[test]
    fn test_validate_rejects_broken_adjacency() {
        let one_way = GraphSnapshot { adj: vec![vec![1], vec![]], e_size: 1 };
        assert!(one_way.validate().is_err());
        let unsorted = GraphSnapshot { adj: vec![vec![2, 1], vec![0], vec![0]], e_size: 2 };
        assert!(unsorted.validate().is_err());
        let out_of_range = GraphSnapshot { adj: vec![vec![5]], e_size: 1 };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_cache_bytes() {
        let g = GraphSnapshot::from_edges(vec![(0, 1), (1, 2), (2, 3), (5, 1)].into_iter());
        let bytes = g.encode();
        assert_eq!(GraphSnapshot::from_bytes(&bytes), Some(g.clone()));

        // A flipped bit or a cut tail is rejected.
        let mut corrupted = bytes.clone();
        corrupted[24] ^= 0x01;
        assert!(GraphSnapshot::from_bytes(&corrupted).is_none());
        assert!(GraphSnapshot::from_bytes(&bytes[..bytes.len() - 3]).is_none());
        assert!(GraphSnapshot::from_bytes(&[]).is_none());
    }

    #[test]
    fn test_load_or_build() {
        let dir = tempfile::tempdir().unwrap();
        let edge_path = dir.path().join("edges.txt");
        let cache_path = dir.path().join("edges.fcdg");
        std::fs::write(&edge_path, "0 1\n1 2\n").unwrap();

        let built = GraphSnapshot::load_or_build(&edge_path, Some(cache_path.as_path())).unwrap();
        assert!(cache_path.exists());

        // The cache now wins over the edge list.
        std::fs::write(&edge_path, "0 1\n").unwrap();
        let cached = GraphSnapshot::load_or_build(&edge_path, Some(cache_path.as_path())).unwrap();
        assert_eq!(built, cached);

        // A broken cache is rebuilt.
        std::fs::write(&cache_path, b"garbage").unwrap();
        let rebuilt = GraphSnapshot::load_or_build(&edge_path, Some(cache_path.as_path())).unwrap();
        assert_eq!(rebuilt.edge_count(), 1);
        assert_eq!(GraphSnapshot::read_cache(&cache_path).unwrap(), rebuilt);
    }
}
