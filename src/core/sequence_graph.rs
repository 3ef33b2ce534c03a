//! Strand-symmetric sequence graph
//!
//! Edges carry the bases; vertices are the (K-1)-base overlaps between
//! consecutive edges. Every edge is paired with its reverse-complement edge
//! through the involution, and `inv(inv(e)) == e` must hold at all times
//! outside of an edit.
//!
//! Edge lengths are measured in graph-mer units: an edge with `L` bases
//! spans `L - K + 1` graph-mers.

use anyhow::{anyhow, Result};
use serde::Serialize;

/// A directed edge of the assembly graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    /// Source vertex
    pub from: usize,
    /// Target vertex
    pub to: usize,
    /// Uppercase bases (`A`, `C`, `G`, `T`, `N`)
    pub seq: Vec<u8>,
    /// Length in graph-mer units
    pub kmers: usize,
}

/// Assembly graph with edge sequences and reverse-complement involution
#[derive(Debug, Clone)]
pub struct SequenceGraph {
    /// Graph-mer size
    pub(crate) k: usize,
    pub(crate) edges: Vec<EdgeRecord>,
    /// Outgoing edge ids per vertex, in insertion order
    pub(crate) from: Vec<Vec<usize>>,
    /// Incoming edge ids per vertex, in insertion order
    pub(crate) to: Vec<Vec<usize>>,
    pub(crate) inv: Vec<usize>,
    /// Cleared when an edge is deleted; dead edges stay addressable until compaction
    pub(crate) live: Vec<bool>,
}

impl SequenceGraph {
    /// Create an empty graph with `vertex_count` isolated vertices
    pub fn new(k: usize, vertex_count: usize) -> Result<Self> {
        if k < 2 {
            return Err(anyhow!("Graph-mer size must be at least 2, got {}", k));
        }

        Ok(Self {
            k,
            edges: Vec::new(),
            from: vec![Vec::new(); vertex_count],
            to: vec![Vec::new(); vertex_count],
            inv: Vec::new(),
            live: Vec::new(),
        })
    }

    /// Add a vertex and return its id
    pub fn add_vertex(&mut self) -> usize {
        self.from.push(Vec::new());
        self.to.push(Vec::new());
        self.from.len() - 1
    }

    /// Add an edge and return its id.
    ///
    /// The new edge is its own involute until [`pair_edges`](Self::pair_edges)
    /// or [`set_involution`](Self::set_involution) says otherwise.
    pub fn add_edge(&mut self, from: usize, to: usize, seq: &[u8]) -> Result<usize> {
        let n = self.vertex_count();
        if from >= n || to >= n {
            return Err(anyhow!(
                "Edge {}->{} references a vertex outside 0..{}",
                from,
                to,
                n
            ));
        }
        if seq.len() < self.k {
            return Err(anyhow!(
                "Edge {}->{} has {} bases, need at least K={}",
                from,
                to,
                seq.len(),
                self.k
            ));
        }

        Ok(self.push_edge(from, to, seq.to_ascii_uppercase()))
    }

    /// Append an edge whose endpoints and length are already known to be valid
    pub(crate) fn push_edge(&mut self, from: usize, to: usize, seq: Vec<u8>) -> usize {
        let id = self.edges.len();
        let kmers = seq.len() + 1 - self.k;
        self.edges.push(EdgeRecord {
            from,
            to,
            seq,
            kmers,
        });
        self.from[from].push(id);
        self.to[to].push(id);
        self.inv.push(id);
        self.live.push(true);
        id
    }

    /// Declare `e` and `f` reverse complements of each other
    pub fn pair_edges(&mut self, e: usize, f: usize) -> Result<()> {
        if e >= self.edges.len() || f >= self.edges.len() {
            return Err(anyhow!("Cannot pair edges {} and {}: out of range", e, f));
        }
        self.inv[e] = f;
        self.inv[f] = e;
        Ok(())
    }

    /// Replace the whole involution array
    pub fn set_involution(&mut self, inv: Vec<usize>) -> Result<()> {
        if inv.len() != self.edges.len() {
            return Err(anyhow!(
                "Involution has {} entries but graph has {} edges",
                inv.len(),
                self.edges.len()
            ));
        }
        if let Some(&bad) = inv.iter().find(|&&x| x >= self.edges.len()) {
            return Err(anyhow!("Involution references missing edge {}", bad));
        }
        self.inv = inv;
        Ok(())
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn vertex_count(&self) -> usize {
        self.from.len()
    }

    /// Number of edge slots, including deleted edges not yet compacted away
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn live_edge_count(&self) -> usize {
        self.live.iter().filter(|&&alive| alive).count()
    }

    pub fn has_dead_edges(&self) -> bool {
        self.live.iter().any(|&alive| !alive)
    }

    pub fn is_live(&self, e: usize) -> bool {
        self.live.get(e).copied().unwrap_or(false)
    }

    /// Outgoing edges of `v`
    pub fn outgoing(&self, v: usize) -> &[usize] {
        &self.from[v]
    }

    /// Incoming edges of `v`
    pub fn incoming(&self, v: usize) -> &[usize] {
        &self.to[v]
    }

    pub fn source(&self, e: usize) -> usize {
        self.edges[e].from
    }

    pub fn target(&self, e: usize) -> usize {
        self.edges[e].to
    }

    pub fn seq(&self, e: usize) -> &[u8] {
        &self.edges[e].seq
    }

    /// Edge length in graph-mer units
    pub fn kmers(&self, e: usize) -> usize {
        self.edges[e].kmers
    }

    /// Reverse-complement partner of `e`
    pub fn inv(&self, e: usize) -> usize {
        self.inv[e]
    }

    pub fn involution(&self) -> &[usize] {
        &self.inv
    }

    pub fn edge(&self, e: usize) -> &EdgeRecord {
        &self.edges[e]
    }

    /// Concatenate the sequences of a walk, collapsing the (K-1)-base overlaps
    pub fn concat(&self, walk: &[usize]) -> Vec<u8> {
        let overlap = self.k - 1;
        let total = walk.iter().map(|&e| self.kmers(e)).sum::<usize>() + overlap;
        let mut seq = Vec::with_capacity(total);
        for (i, &e) in walk.iter().enumerate() {
            let bases = self.seq(e);
            if i == 0 {
                seq.extend_from_slice(bases);
            } else {
                seq.extend_from_slice(&bases[overlap..]);
            }
        }
        seq
    }

    /// Remove edges from the adjacency lists and mark them dead.
    ///
    /// Ids stay stable until the graph is compacted. Returns the number of
    /// edges that were live before the call.
    pub fn delete_edges(&mut self, edges: &[usize]) -> usize {
        let mut removed = 0;
        for &e in edges {
            if !self.is_live(e) {
                continue;
            }
            self.live[e] = false;
            let EdgeRecord { from, to, .. } = self.edges[e];
            self.from[from].retain(|&x| x != e);
            self.to[to].retain(|&x| x != e);
            removed += 1;
        }
        removed
    }

    /// Drop dead edges and isolated vertices, renumbering both.
    ///
    /// Returns the old-to-new edge id map (`None` for removed edges) and the
    /// number of vertices removed. Adjacency order is preserved.
    pub fn compact(&mut self) -> (Vec<Option<usize>>, usize) {
        let mut edge_map = vec![None; self.edges.len()];
        let mut next = 0;
        for (e, slot) in edge_map.iter_mut().enumerate() {
            if self.live[e] {
                *slot = Some(next);
                next += 1;
            }
        }

        let mut vertex_map = vec![None; self.vertex_count()];
        let mut next_vertex = 0;
        for (v, slot) in vertex_map.iter_mut().enumerate() {
            if !self.from[v].is_empty() || !self.to[v].is_empty() {
                *slot = Some(next_vertex);
                next_vertex += 1;
            }
        }
        let vertices_removed = self.vertex_count() - next_vertex;

        // Live edges only reference live edges' endpoints, so the maps are total here
        let remap_edge = |e: usize| edge_map[e].unwrap_or(usize::MAX);
        let remap_vertex = |v: usize| vertex_map[v].unwrap_or(usize::MAX);

        let old_edges = std::mem::take(&mut self.edges);
        let old_inv = std::mem::take(&mut self.inv);
        let mut edges = Vec::with_capacity(next);
        let mut inv = Vec::with_capacity(next);
        for (e, record) in old_edges.into_iter().enumerate() {
            if edge_map[e].is_none() {
                continue;
            }
            edges.push(EdgeRecord {
                from: remap_vertex(record.from),
                to: remap_vertex(record.to),
                ..record
            });
            inv.push(remap_edge(old_inv[e]));
        }

        let mut from = Vec::with_capacity(next_vertex);
        let mut to = Vec::with_capacity(next_vertex);
        for v in 0..vertex_map.len() {
            if vertex_map[v].is_none() {
                continue;
            }
            from.push(self.from[v].iter().map(|&e| remap_edge(e)).collect());
            to.push(self.to[v].iter().map(|&e| remap_edge(e)).collect());
        }

        self.edges = edges;
        self.inv = inv;
        self.from = from;
        self.to = to;
        self.live = vec![true; next];

        (edge_map, vertices_removed)
    }

    /// Vertices touched by at least one live edge
    pub fn active_vertex_count(&self) -> usize {
        (0..self.vertex_count())
            .filter(|&v| !self.from[v].is_empty() || !self.to[v].is_empty())
            .count()
    }

    /// Total graph-mers over live edges
    pub fn total_kmers(&self) -> usize {
        (0..self.edge_count())
            .filter(|&e| self.is_live(e))
            .map(|e| self.kmers(e))
            .sum()
    }
}

/// Summary of the live part of a graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub vertices: usize,
    pub edges: usize,
    pub total_kmers: usize,
    /// Vertices with more than one outgoing edge
    pub branch_vertices: usize,
    /// Vertices with incoming but no outgoing edges
    pub dead_ends: usize,
    /// Edges that are their own reverse complement
    pub palindromic_edges: usize,
    pub longest_edge_kmers: usize,
    pub n50_kmers: usize,
}

impl SequenceGraph {
    pub fn stats(&self) -> GraphStats {
        let mut lengths: Vec<usize> = (0..self.edge_count())
            .filter(|&e| self.is_live(e))
            .map(|e| self.kmers(e))
            .collect();
        lengths.sort_unstable_by(|a, b| b.cmp(a));

        let total_kmers: usize = lengths.iter().sum();
        let mut running = 0;
        let n50_kmers = lengths
            .iter()
            .find(|&&len| {
                running += len;
                running * 2 >= total_kmers
            })
            .copied()
            .unwrap_or(0);

        GraphStats {
            vertices: self.active_vertex_count(),
            edges: lengths.len(),
            total_kmers,
            branch_vertices: (0..self.vertex_count())
                .filter(|&v| self.from[v].len() > 1)
                .count(),
            dead_ends: (0..self.vertex_count())
                .filter(|&v| self.from[v].is_empty() && !self.to[v].is_empty())
                .count(),
            palindromic_edges: (0..self.edge_count())
                .filter(|&e| self.is_live(e) && self.inv[e] == e)
                .count(),
            longest_edge_kmers: lengths.first().copied().unwrap_or(0),
            n50_kmers,
        }
    }
}

/// Reverse complement of a base sequence; non-ACGT bases map to `N`
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' | b'a' => b'T',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        b'T' | b't' => b'A',
        _ => b'N',
    }
}
