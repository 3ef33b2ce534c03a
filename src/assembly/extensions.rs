//! Candidate forward walks from a branch vertex
//!
//! Each outgoing edge of the branch vertex seeds one walk. Walks are grown
//! forward until they reach the depth bound (in graph-mers); a walk that
//! runs into a dead end pulls the depth bound down to its own length so that
//! every candidate is compared over the same horizon.

use crate::core::{reverse_complement, SequenceGraph};

/// One candidate walk, rooted at one outgoing edge of the branch vertex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub edges: Vec<usize>,
    /// Index into the branch vertex's outgoing edge list
    pub root: usize,
    /// Concatenated forward bases
    pub seq: Vec<u8>,
    /// Reverse complement of `seq`
    pub rc_seq: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ExtensionSet {
    pub extensions: Vec<Extension>,
    /// Final comparison depth in graph-mers
    pub depth: usize,
}

impl ExtensionSet {
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Enumeration {
    Complete(ExtensionSet),
    /// More than `max_exts` walks; the vertex is left alone
    TooComplex { walks: usize },
}

/// One round of walk growth. Returns the walks (with their roots) and the
/// possibly reduced depth.
fn grow_walks(
    graph: &SequenceGraph,
    v: usize,
    max_exts: usize,
    mut depth: usize,
) -> (Vec<(usize, Vec<usize>)>, usize) {
    let mut walks: Vec<(usize, Vec<usize>)> = graph
        .outgoing(v)
        .iter()
        .enumerate()
        .map(|(root, &e)| (root, vec![e]))
        .collect();
    let mut lengths: Vec<usize> = walks
        .iter()
        .map(|(_, walk)| graph.kmers(walk[0]))
        .collect();

    let mut i = 0;
    while i < walks.len() && i < max_exts {
        if lengths[i] >= depth {
            i += 1;
            continue;
        }

        let Some(&last) = walks[i].1.last() else {
            i += 1;
            continue;
        };
        let w = graph.target(last);
        let children = graph.outgoing(w);
        if children.is_empty() {
            depth = depth.min(lengths[i]);
            i += 1;
            continue;
        }

        // First child extends walk i in place; the others become new walks.
        // Walk i is then re-examined.
        let (root, base) = walks[i].clone();
        let base_len = lengths[i];
        for (m, &child) in children.iter().enumerate() {
            let mut next = base.clone();
            next.push(child);
            let len = base_len + graph.kmers(child);
            if m == 0 {
                walks[i] = (root, next);
                lengths[i] = len;
            } else {
                walks.push((root, next));
                lengths.push(len);
            }
        }
    }

    (walks, depth)
}

/// Enumerate the extensions of `v`.
///
/// The growth is run twice: the first round only settles the final depth,
/// the second produces the walks under that depth.
pub fn enumerate_extensions(
    graph: &SequenceGraph,
    v: usize,
    max_exts: usize,
    max_depth: usize,
) -> Enumeration {
    let (_, depth) = grow_walks(graph, v, max_exts, max_depth);
    let (walks, depth) = grow_walks(graph, v, max_exts, depth);

    if walks.len() > max_exts {
        return Enumeration::TooComplex { walks: walks.len() };
    }

    let extensions = walks
        .into_iter()
        .map(|(root, edges)| {
            let seq = graph.concat(&edges);
            let rc_seq = reverse_complement(&seq);
            Extension {
                edges,
                root,
                seq,
                rc_seq,
            }
        })
        .collect();

    Enumeration::Complete(ExtensionSet { extensions, depth })
}
