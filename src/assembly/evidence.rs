//! Quality-weighted read evidence for the outgoing edges of a branch vertex
//!
//! Every read placed across the branch (on either strand) is compared base by
//! base against each candidate extension. Mismatches cost the read's quality
//! at that base. The read then votes for the outgoing edge whose best
//! extension explains it most cheaply, with a weight equal to the margin over
//! the runner-up edge. Reads that cannot separate the top two edges cast no
//! vote.

use crate::assembly::extensions::{Extension, ExtensionSet};
use crate::assembly::path_index::PathIndex;
use crate::core::{Read, ReadPath, SequenceGraph};

/// Margin by which one outgoing edge beat the runner-up for one read
pub type EvidenceSample = u32;

/// Score assigned to an outgoing edge that no extension represents
const UNEXPLAINED: u32 = 1_000_000_000;

/// A read placed relative to the branch: `start` is the read's first base
/// expressed in the extension base frame (extension base 0 is the first base
/// of the outgoing edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Anchor {
    read: usize,
    start: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strand {
    Forward,
    Reverse,
}

/// Read-only scorer over one pass's snapshot
pub struct EvidenceScorer<'a> {
    graph: &'a SequenceGraph,
    paths: &'a [ReadPath],
    reads: &'a [Read],
    index: &'a PathIndex,
}

impl<'a> EvidenceScorer<'a> {
    pub fn new(
        graph: &'a SequenceGraph,
        paths: &'a [ReadPath],
        reads: &'a [Read],
        index: &'a PathIndex,
    ) -> Self {
        Self {
            graph,
            paths,
            reads,
            index,
        }
    }

    /// Evidence samples per outgoing edge of `v`, each list sorted descending.
    ///
    /// `entering` are the incoming edges of `v` through which reads are
    /// collected.
    pub fn score(
        &self,
        v: usize,
        entering: &[usize],
        exts: &ExtensionSet,
    ) -> Vec<Vec<EvidenceSample>> {
        let outgoing = self.graph.outgoing(v);
        let n = outgoing.len();
        let mut samples: Vec<Vec<EvidenceSample>> = vec![Vec::new(); n];
        if n < 2 {
            return samples;
        }

        let window = exts.depth + self.graph.k() - 1;

        for anchor in self.forward_anchors(entering, outgoing) {
            let mismatches = self.mismatch_scores(anchor, &exts.extensions, window, Strand::Forward);
            if let Some((edge, margin)) = attribute(&mismatches, &exts.extensions, n) {
                samples[edge].push(margin);
            }
        }

        for anchor in self.reverse_anchors(entering, outgoing) {
            let mismatches = self.mismatch_scores(anchor, &exts.extensions, window, Strand::Reverse);
            if let Some((edge, margin)) = attribute(&mismatches, &exts.extensions, n) {
                samples[edge].push(margin);
            }
        }

        for list in &mut samples {
            list.sort_unstable_by(|a, b| b.cmp(a));
        }
        samples
    }

    /// Graph-mers covered by `path.edges[..end]`
    fn kmers_before(&self, path: &ReadPath, end: usize) -> i64 {
        path.edges[..end]
            .iter()
            .map(|&e| self.graph.kmers(e) as i64)
            .sum()
    }

    /// Reads crossing an entering edge, plus reads that start on an outgoing
    /// edge without coming through an entering edge (those were already
    /// collected).
    fn forward_anchors(&self, entering: &[usize], outgoing: &[usize]) -> Vec<Anchor> {
        let mut anchors = Vec::new();

        for &e in entering {
            for &id in self.index.paths_through(e) {
                let path = &self.paths[id];
                for j in path.positions_of(e) {
                    anchors.push(Anchor {
                        read: id,
                        start: path.offset - self.kmers_before(path, j + 1),
                    });
                }
            }
        }

        for &f in outgoing {
            for &id in self.index.paths_through(f) {
                let path = &self.paths[id];
                for j in path.positions_of(f) {
                    if j > 0 && entering.contains(&path.edges[j - 1]) {
                        continue;
                    }
                    anchors.push(Anchor {
                        read: id,
                        start: path.offset - self.kmers_before(path, j),
                    });
                }
            }
        }

        anchors
    }

    /// Same collection on the opposite strand, through the involutes.
    /// Here `start` is measured from the first base of the involuted
    /// entering edge.
    fn reverse_anchors(&self, entering: &[usize], outgoing: &[usize]) -> Vec<Anchor> {
        let rc_entering: Vec<usize> = entering.iter().map(|&e| self.graph.inv(e)).collect();
        let mut anchors = Vec::new();

        for &re in &rc_entering {
            for &id in self.index.paths_through(re) {
                let path = &self.paths[id];
                for j in path.positions_of(re) {
                    anchors.push(Anchor {
                        read: id,
                        start: path.offset - self.kmers_before(path, j),
                    });
                }
            }
        }

        for &f in outgoing {
            let rf = self.graph.inv(f);
            for &id in self.index.paths_through(rf) {
                let path = &self.paths[id];
                for j in path.positions_of(rf) {
                    if j + 1 < path.len() && rc_entering.contains(&path.edges[j + 1]) {
                        continue;
                    }
                    anchors.push(Anchor {
                        read: id,
                        start: path.offset - self.kmers_before(path, j + 1),
                    });
                }
            }
        }

        anchors
    }

    /// Quality-weighted mismatch total of one read against every extension
    fn mismatch_scores(
        &self,
        anchor: Anchor,
        extensions: &[Extension],
        window: usize,
        strand: Strand,
    ) -> Vec<u32> {
        let read = &self.reads[anchor.read];
        let read_len = read.len() as i64;
        let overlap_last = self.graph.k() as i64 - 2;
        let mut scores = vec![0u32; extensions.len()];

        for pos in 0..window {
            let rpos = match strand {
                Strand::Forward => pos as i64 - anchor.start,
                Strand::Reverse => overlap_last - pos as i64 - anchor.start,
            };
            if rpos < 0 || rpos >= read_len {
                continue;
            }
            let rpos = rpos as usize;
            let base = read.bases[rpos];
            let qual = u32::from(read.quals[rpos]);

            for (score, ext) in scores.iter_mut().zip(extensions) {
                let s = ext.seq.len();
                if pos >= s {
                    continue;
                }
                let template = match strand {
                    Strand::Forward => ext.seq[pos],
                    Strand::Reverse => ext.rc_seq[s - pos - 1],
                };
                if template != base {
                    *score += qual;
                }
            }
        }

        scores
    }
}

/// Reduce extension scores to edge scores (best extension per edge) and
/// return the winning edge with its margin, if the winner is strict.
fn attribute(mismatches: &[u32], extensions: &[Extension], n: usize) -> Option<(usize, EvidenceSample)> {
    let mut per_edge = vec![UNEXPLAINED; n];
    for (&score, ext) in mismatches.iter().zip(extensions) {
        per_edge[ext.root] = per_edge[ext.root].min(score);
    }

    let mut ranked: Vec<(u32, usize)> = per_edge
        .into_iter()
        .enumerate()
        .map(|(edge, score)| (score, edge))
        .collect();
    ranked.sort_unstable();

    let (best, edge) = ranked[0];
    let (second, _) = ranked[1];
    (best < second).then(|| (edge, second - best))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::extensions::{enumerate_extensions, Enumeration};
    use crate::core::reverse_complement;

    const ENTRY: &[u8] = b"GTCAGTCAGTCAAACC";
    const WIN: &[u8] = b"AACCGATTACAGATTACAGATTAC";
    const LOSE: &[u8] = b"AACCTCTAGGCTCTAGGCTCTAGG";

    /// u -> v branching into two dead ends, with reverse-complement partners.
    /// Vertex x's partner is x ^ 1.
    fn branch_graph() -> (SequenceGraph, [usize; 6]) {
        let mut g = SequenceGraph::new(5, 8).unwrap();
        let pair = |g: &mut SequenceGraph, from: usize, to: usize, seq: &[u8]| {
            let e = g.add_edge(from, to, seq).unwrap();
            let re = g.add_edge(to ^ 1, from ^ 1, &reverse_complement(seq)).unwrap();
            g.pair_edges(e, re).unwrap();
            (e, re)
        };
        let (e, re) = pair(&mut g, 0, 2, ENTRY);
        let (a, ra) = pair(&mut g, 2, 4, WIN);
        let (b, rb) = pair(&mut g, 2, 6, LOSE);
        (g, [e, re, a, ra, b, rb])
    }

    fn extensions(g: &SequenceGraph) -> ExtensionSet {
        match enumerate_extensions(g, 2, 10, 250) {
            Enumeration::Complete(set) => set,
            Enumeration::TooComplex { .. } => panic!("branch should be simple"),
        }
    }

    /// Last 8 bases of the entering edge followed by the winning edge past the overlap
    fn spanning_read() -> Vec<u8> {
        let mut bases = ENTRY[ENTRY.len() - 8..].to_vec();
        bases.extend_from_slice(&WIN[4..]);
        bases
    }

    #[test]
    fn test_forward_read_votes_for_matching_edge() {
        let (g, [e, _, a, _, _, _]) = branch_graph();
        let exts = extensions(&g);
        assert_eq!(exts.depth, 20);

        let reads = vec![Read::with_uniform_quality(&spanning_read(), 10)];
        let paths = vec![ReadPath::new(vec![e, a], (ENTRY.len() - 8) as i64)];
        let index = PathIndex::build(&paths, g.edge_count());
        let scorer = EvidenceScorer::new(&g, &paths, &reads, &index);

        let samples = scorer.score(2, &[e], &exts);
        // 17 of the 20 bases past the overlap differ between the two edges
        assert_eq!(samples, vec![vec![170], vec![]]);
    }

    #[test]
    fn test_reverse_read_votes_for_matching_edge() {
        let (g, [e, re, _, ra, _, _]) = branch_graph();
        let exts = extensions(&g);

        let reads = vec![Read::with_uniform_quality(&reverse_complement(&spanning_read()), 10)];
        let paths = vec![ReadPath::new(vec![ra, re], 0)];
        let index = PathIndex::build(&paths, g.edge_count());
        let scorer = EvidenceScorer::new(&g, &paths, &reads, &index);

        let samples = scorer.score(2, &[e], &exts);
        assert_eq!(samples[0], vec![170]);
        assert!(samples[1].is_empty());
    }

    #[test]
    fn test_read_on_outgoing_edge_only() {
        let (g, [e, _, _, _, b, _]) = branch_graph();
        let exts = extensions(&g);

        // A read lying entirely on the losing edge, starting at its base 2
        let reads = vec![Read::with_uniform_quality(&LOSE[2..], 5)];
        let paths = vec![ReadPath::new(vec![b], 2)];
        let index = PathIndex::build(&paths, g.edge_count());
        let scorer = EvidenceScorer::new(&g, &paths, &reads, &index);

        let samples = scorer.score(2, &[e], &exts);
        assert!(samples[0].is_empty());
        assert_eq!(samples[1], vec![85]);
    }

    #[test]
    fn test_uninformative_read_casts_no_vote() {
        let (g, [e, ..]) = branch_graph();
        let exts = extensions(&g);

        // Only covers the shared overlap bases
        let reads = vec![Read::with_uniform_quality(&ENTRY[4..], 30)];
        let paths = vec![ReadPath::new(vec![e], 4)];
        let index = PathIndex::build(&paths, g.edge_count());
        let scorer = EvidenceScorer::new(&g, &paths, &reads, &index);

        let samples = scorer.score(2, &[e], &exts);
        assert!(samples.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_bases_past_shrunken_depth_are_ignored() {
        // A 10 graph-mer dead end caps the depth; the long branch only
        // diverges from it after those 14 bases
        let short = &WIN[..14];
        let mut long = short.to_vec();
        long.extend_from_slice(b"CCCCCCCCCC");

        let mut g = SequenceGraph::new(5, 8).unwrap();
        let mut pair = |from: usize, to: usize, seq: &[u8]| {
            let e = g.add_edge(from, to, seq).unwrap();
            let re = g.add_edge(to ^ 1, from ^ 1, &reverse_complement(seq)).unwrap();
            g.pair_edges(e, re).unwrap();
            e
        };
        let e = pair(0, 2, ENTRY);
        pair(2, 4, short);
        let b = pair(2, 6, &long);

        let exts = extensions(&g);
        assert_eq!(exts.depth, 10);

        // Follows the long branch, and WIN's tail disagrees with it past base 14
        let mut on_long = ENTRY[ENTRY.len() - 8..].to_vec();
        on_long.extend_from_slice(&long[4..]);
        let reads = vec![
            Read::with_uniform_quality(&on_long, 30),
            Read::with_uniform_quality(&spanning_read(), 30),
        ];
        let offset = (ENTRY.len() - 8) as i64;
        let paths = vec![
            ReadPath::new(vec![e, b], offset),
            ReadPath::new(vec![e, b], offset),
        ];
        let index = PathIndex::build(&paths, g.edge_count());
        let scorer = EvidenceScorer::new(&g, &paths, &reads, &index);

        let samples = scorer.score(2, &[e], &exts);
        assert_eq!(samples, vec![Vec::<EvidenceSample>::new(), Vec::new()]);
    }

    #[test]
    fn test_samples_sorted_descending() {
        let (g, [e, _, a, _, _, _]) = branch_graph();
        let exts = extensions(&g);

        let read = spanning_read();
        let reads = vec![
            Read::with_uniform_quality(&read, 2),
            Read::with_uniform_quality(&read, 9),
            Read::with_uniform_quality(&read, 4),
        ];
        let offset = (ENTRY.len() - 8) as i64;
        let paths = vec![ReadPath::new(vec![e, a], offset); 3];
        let index = PathIndex::build(&paths, g.edge_count());
        let scorer = EvidenceScorer::new(&g, &paths, &reads, &index);

        let samples = scorer.score(2, &[e], &exts);
        assert_eq!(samples[0], vec![153, 68, 34]);
    }
}
