//! Edge deletion, post-deletion cleanup and invariant checks
//!
//! Cleanup runs in three steps:
//! 1. read paths that touch a deleted edge are emptied
//! 2. vertices with exactly one incoming and one outgoing edge are merged
//!    away, together with their reverse-complement partner vertex
//! 3. dead edges and isolated vertices are compacted out and ids renumbered
//!
//! Read paths are rewritten onto the merged edges so that they keep
//! describing the same bases.

use crate::core::{reverse_complement, ReadPath, SequenceGraph};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// A violated graph or read-path invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphInvariantError {
    #[error("Involution out of range: inv({edge}) = {partner}")]
    InvolutionOutOfRange { edge: usize, partner: usize },

    #[error("Involution does not return: inv(inv({edge})) = {back}")]
    NotAnInvolution { edge: usize, back: usize },

    #[error("Edge {edge} is live but its partner {partner} is deleted")]
    DeadPartner { edge: usize, partner: usize },

    #[error("Edge {partner} is not the reverse complement of edge {edge}")]
    SequenceMismatch { edge: usize, partner: usize },

    #[error("Adjacency at vertex {vertex} is not mirrored for edges {entering} -> {leaving}")]
    AsymmetricAdjacency {
        vertex: usize,
        entering: usize,
        leaving: usize,
    },

    #[error("Edges {entering} -> {leaving} disagree on the overlap at vertex {vertex}")]
    OverlapMismatch {
        vertex: usize,
        entering: usize,
        leaving: usize,
    },

    #[error("Read path {path} references missing edge {edge}")]
    MissingPathEdge { path: usize, edge: usize },

    #[error("Read path {path} is broken between edges {left} and {right}")]
    DisconnectedPath {
        path: usize,
        left: usize,
        right: usize,
    },
}

/// What one cleanup run changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub paths_dropped: usize,
    pub vertices_merged: usize,
    pub edges_removed: usize,
    pub vertices_removed: usize,
}

/// Mutating access to a graph and its read paths, kept in step
pub struct GraphEditor<'g> {
    graph: &'g mut SequenceGraph,
    paths: &'g mut Vec<ReadPath>,
}

impl<'g> GraphEditor<'g> {
    pub fn new(graph: &'g mut SequenceGraph, paths: &'g mut Vec<ReadPath>) -> Self {
        Self { graph, paths }
    }

    /// Delete `edges` together with their involutes. Returns the number of
    /// edges actually removed.
    pub fn delete_edges(&mut self, edges: &[usize]) -> usize {
        let mut doomed: Vec<usize> = edges
            .iter()
            .filter(|&&e| e < self.graph.edge_count())
            .flat_map(|&e| [e, self.graph.inv(e)])
            .collect();
        doomed.sort_unstable();
        doomed.dedup();
        self.graph.delete_edges(&doomed)
    }

    /// Restore a compact, path-consistent graph after deletions
    pub fn cleanup(&mut self) -> CleanupStats {
        let paths_dropped = drop_broken_paths(self.graph, self.paths);
        let vertices_merged = merge_unneeded_vertices(self.graph, self.paths);

        let before = self.graph.edge_count();
        let (edge_map, vertices_removed) = self.graph.compact();
        for path in self.paths.iter_mut() {
            path.edges = path.edges.iter().filter_map(|&e| edge_map[e]).collect();
        }

        let stats = CleanupStats {
            paths_dropped,
            vertices_merged,
            edges_removed: before - self.graph.edge_count(),
            vertices_removed,
        };
        debug!(?stats, "cleanup finished");
        stats
    }

    pub fn validate(&self) -> Result<(), GraphInvariantError> {
        validate(self.graph, self.paths)
    }
}

/// Check the involution, the vertex overlaps and every read path
pub fn validate(graph: &SequenceGraph, paths: &[ReadPath]) -> Result<(), GraphInvariantError> {
    check_involution(graph)?;
    check_overlaps(graph)?;
    check_paths(graph, paths)
}

/// Check that the involution pairs live edges with their reverse complements
/// and that adjacency is mirrored across strands
pub fn check_involution(graph: &SequenceGraph) -> Result<(), GraphInvariantError> {
    let n = graph.edge_count();
    for e in (0..n).filter(|&e| graph.is_live(e)) {
        let partner = graph.inv(e);
        if partner >= n {
            return Err(GraphInvariantError::InvolutionOutOfRange { edge: e, partner });
        }
        let back = graph.inv(partner);
        if back != e {
            return Err(GraphInvariantError::NotAnInvolution { edge: e, back });
        }
        if !graph.is_live(partner) {
            return Err(GraphInvariantError::DeadPartner { edge: e, partner });
        }
        if graph.seq(partner) != reverse_complement(graph.seq(e)).as_slice() {
            return Err(GraphInvariantError::SequenceMismatch { edge: e, partner });
        }
    }

    // A walk e -> f through v mirrors to inv(f) -> inv(e) through one vertex
    for vertex in 0..graph.vertex_count() {
        for &entering in graph.incoming(vertex) {
            for &leaving in graph.outgoing(vertex) {
                if graph.target(graph.inv(leaving)) != graph.source(graph.inv(entering)) {
                    return Err(GraphInvariantError::AsymmetricAdjacency {
                        vertex,
                        entering,
                        leaving,
                    });
                }
            }
        }
    }

    Ok(())
}

/// Check that every edge entering a vertex ends with the (K-1) bases that
/// every edge leaving it starts with
pub fn check_overlaps(graph: &SequenceGraph) -> Result<(), GraphInvariantError> {
    let overlap = graph.k() - 1;
    for vertex in 0..graph.vertex_count() {
        for &entering in graph.incoming(vertex) {
            let tail = graph.seq(entering);
            let tail = &tail[tail.len() - overlap..];
            for &leaving in graph.outgoing(vertex) {
                if &graph.seq(leaving)[..overlap] != tail {
                    return Err(GraphInvariantError::OverlapMismatch {
                        vertex,
                        entering,
                        leaving,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Check that every read path uses live edges that follow one another
pub fn check_paths(graph: &SequenceGraph, paths: &[ReadPath]) -> Result<(), GraphInvariantError> {
    for (id, path) in paths.iter().enumerate() {
        if let Some(&edge) = path.edges.iter().find(|&&e| !graph.is_live(e)) {
            return Err(GraphInvariantError::MissingPathEdge { path: id, edge });
        }
        for pair in path.edges.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            if graph.target(left) != graph.source(right) {
                return Err(GraphInvariantError::DisconnectedPath {
                    path: id,
                    left,
                    right,
                });
            }
        }
    }
    Ok(())
}

fn drop_broken_paths(graph: &SequenceGraph, paths: &mut [ReadPath]) -> usize {
    let mut dropped = 0;
    for path in paths.iter_mut() {
        if path.edges.iter().any(|&e| !graph.is_live(e)) {
            path.clear();
            dropped += 1;
        }
    }
    dropped
}

/// Replace `a` then `b` by one edge; `parts` tracks which pre-merge edges
/// each edge is made of.
fn join(graph: &mut SequenceGraph, parts: &mut Vec<Vec<usize>>, a: usize, b: usize) -> usize {
    let from = graph.source(a);
    let to = graph.target(b);
    let seq = graph.concat(&[a, b]);
    graph.delete_edges(&[a, b]);
    let merged = graph.push_edge(from, to, seq);

    let mut constituents = parts[a].clone();
    constituents.extend_from_slice(&parts[b]);
    parts.push(constituents);
    merged
}

/// Merge every vertex with one incoming and one outgoing edge. Returns the
/// number of vertices bypassed.
fn merge_unneeded_vertices(graph: &mut SequenceGraph, paths: &mut [ReadPath]) -> usize {
    let original_edges = graph.edge_count();
    let mut parts: Vec<Vec<usize>> = (0..original_edges).map(|e| vec![e]).collect();
    let mut merged = 0;

    for v in 0..graph.vertex_count() {
        let (a, b) = match (graph.incoming(v), graph.outgoing(v)) {
            (&[a], &[b]) if a != b => (a, b),
            _ => continue,
        };
        let (ia, ib) = (graph.inv(a), graph.inv(b));

        if ia == b {
            // v is its own partner; the merged edge reads the same on both strands
            let c = join(graph, &mut parts, a, b);
            graph.inv[c] = c;
            merged += 1;
            continue;
        }
        if ia == a || ib == b {
            continue;
        }

        let partner = graph.target(ib);
        if partner == v {
            continue;
        }
        match (graph.incoming(partner), graph.outgoing(partner)) {
            (&[x], &[y]) if x == ib && y == ia => {}
            _ => continue,
        }

        let c = join(graph, &mut parts, a, b);
        let rc = join(graph, &mut parts, ib, ia);
        graph.inv[c] = rc;
        graph.inv[rc] = c;
        merged += 2;
    }

    if merged > 0 {
        rewrite_paths(graph, &parts, original_edges, paths);
    }
    merged
}

/// Move read paths from pre-merge edges onto the edges that absorbed them
fn rewrite_paths(
    graph: &SequenceGraph,
    parts: &[Vec<usize>],
    original_edges: usize,
    paths: &mut [ReadPath],
) {
    // (final edge, constituent index, graph-mers before the constituent)
    let mut placement = vec![(usize::MAX, 0usize, 0i64); original_edges];
    for edge in (0..graph.edge_count()).filter(|&e| graph.is_live(e)) {
        let mut before = 0i64;
        for (idx, &orig) in parts[edge].iter().enumerate() {
            placement[orig] = (edge, idx, before);
            before += graph.kmers(orig) as i64;
        }
    }

    for path in paths.iter_mut() {
        let Some(&first) = path.edges.first() else {
            continue;
        };
        let shift = placement[first].2;

        let mut edges = Vec::with_capacity(path.edges.len());
        let mut previous: Option<(usize, usize)> = None;
        for &e in &path.edges {
            let (edge, idx, _) = placement[e];
            match previous {
                Some((prev_edge, prev_idx)) if prev_edge == edge && idx == prev_idx + 1 => {}
                _ => edges.push(edge),
            }
            previous = Some((edge, idx));
        }

        path.edges = edges;
        path.offset += shift;
    }
}
