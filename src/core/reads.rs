//! Reads and their placements on the assembly graph

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A sequenced read: bases plus per-base Phred qualities (offset removed)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Read {
    pub bases: Vec<u8>,
    pub quals: Vec<u8>,
}

impl Read {
    pub fn new(bases: &[u8], quals: &[u8]) -> Result<Self> {
        if bases.len() != quals.len() {
            return Err(anyhow!(
                "Read has {} bases but {} quality values",
                bases.len(),
                quals.len()
            ));
        }
        Ok(Self {
            bases: bases.to_ascii_uppercase(),
            quals: quals.to_vec(),
        })
    }

    /// Read with a constant quality at every base
    pub fn with_uniform_quality(bases: &[u8], qual: u8) -> Self {
        Self {
            bases: bases.to_ascii_uppercase(),
            quals: vec![qual; bases.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

/// The walk a read takes through the graph.
///
/// `offset` is the position of the read's first base in the base frame of
/// the first edge. It may be negative when the read starts before the edge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadPath {
    pub edges: Vec<usize>,
    pub offset: i64,
}

impl ReadPath {
    pub fn new(edges: Vec<usize>, offset: i64) -> Self {
        Self { edges, offset }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Drop the placement entirely
    pub fn clear(&mut self) {
        self.edges.clear();
        self.offset = 0;
    }

    /// Positions at which `edge` occurs
    pub fn positions_of(&self, edge: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(move |&(_, &e)| e == edge)
            .map(|(j, _)| j)
    }
}

/// Check that reads and paths line up one-to-one and every read is well formed
pub fn check_read_set(reads: &[Read], paths: &[ReadPath]) -> Result<()> {
    if reads.len() != paths.len() {
        return Err(anyhow!(
            "{} reads but {} read paths; path i must belong to read i",
            reads.len(),
            paths.len()
        ));
    }
    if let Some((id, read)) = reads
        .iter()
        .enumerate()
        .find(|(_, r)| r.bases.len() != r.quals.len())
    {
        return Err(anyhow!(
            "Read {} has {} bases but {} quality values",
            id,
            read.bases.len(),
            read.quals.len()
        ));
    }
    Ok(())
}
