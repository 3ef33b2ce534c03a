//! Shared fixtures for the integration tests
//!
//! A "fork" is the smallest interesting branch: an entering edge into `v`
//! that splits into a winning and a losing dead end, plus the mirrored
//! reverse-complement strand. Vertex `x` and `x ^ 1` are partners.

#![allow(dead_code)]

use prune_forge::core::{reverse_complement, Read, ReadPath, SequenceGraph};

pub const K: usize = 5;
/// Both branches start with the (K-1)-base overlap `AACC`
pub const WIN: &[u8] = b"AACCGATTACAGATTACAGATTAC";
pub const LOSE: &[u8] = b"AACCTCTAGGCTCTAGGCTCTAGG";
/// Bases past the overlap where WIN and LOSE differ
pub const DIFFERING_BASES: u32 = 17;

/// 40 graph-mers of `GTCA` repeats ending in the overlap
pub fn entry_seq() -> Vec<u8> {
    let mut seq = b"GTCA".repeat(10);
    seq.extend_from_slice(b"AACC");
    seq
}

#[derive(Debug, Clone, Copy)]
pub struct Fork {
    pub v: usize,
    pub e: usize,
    pub re: usize,
    pub a: usize,
    pub ra: usize,
    pub b: usize,
    pub rb: usize,
}

/// Add `seq` from `from` to `to` plus its reverse complement between the partner vertices
pub fn add_pair(g: &mut SequenceGraph, from: usize, to: usize, seq: &[u8]) -> (usize, usize) {
    let e = g.add_edge(from, to, seq).unwrap();
    let re = g
        .add_edge(to ^ 1, from ^ 1, &reverse_complement(seq))
        .unwrap();
    g.pair_edges(e, re).unwrap();
    (e, re)
}

/// Add one fork on vertices `base..base + 8` (`base` must be even)
pub fn add_fork(g: &mut SequenceGraph, base: usize) -> Fork {
    let (e, re) = add_pair(g, base, base + 2, &entry_seq());
    let (a, ra) = add_pair(g, base + 2, base + 4, WIN);
    let (b, rb) = add_pair(g, base + 2, base + 6, LOSE);
    Fork {
        v: base + 2,
        e,
        re,
        a,
        ra,
        b,
        rb,
    }
}

pub fn fork_graph(count: usize) -> (SequenceGraph, Vec<Fork>) {
    let mut g = SequenceGraph::new(K, 8 * count).unwrap();
    let forks = (0..count).map(|i| add_fork(&mut g, 8 * i)).collect();
    (g, forks)
}

/// Reads with their paths, kept index-aligned
#[derive(Debug, Default)]
pub struct ReadSet {
    pub reads: Vec<Read>,
    pub paths: Vec<ReadPath>,
}

impl ReadSet {
    fn push(&mut self, bases: &[u8], qual: u8, path: ReadPath) {
        self.reads.push(Read::with_uniform_quality(bases, qual));
        self.paths.push(path);
    }

    /// Last 8 entry bases followed by the winning branch
    pub fn add_forward_winner(&mut self, fork: &Fork, qual: u8) {
        let entry = entry_seq();
        let start = entry.len() - 8;
        let mut bases = entry[start..].to_vec();
        bases.extend_from_slice(&WIN[K - 1..]);
        self.push(&bases, qual, ReadPath::new(vec![fork.e, fork.a], start as i64));
    }

    /// The forward winner read sequenced from the other strand
    pub fn add_reverse_winner(&mut self, fork: &Fork, qual: u8) {
        let entry = entry_seq();
        let mut forward = entry[entry.len() - 8..].to_vec();
        forward.extend_from_slice(&WIN[K - 1..]);
        self.push(
            &reverse_complement(&forward),
            qual,
            ReadPath::new(vec![fork.ra, fork.re], 0),
        );
    }

    /// A read lying on the losing branch only
    pub fn add_loser(&mut self, fork: &Fork, qual: u8) {
        self.push(&LOSE[2..], qual, ReadPath::new(vec![fork.b], 2));
    }

    /// Two forward and one reverse read for the winner
    pub fn add_strong_support(&mut self, fork: &Fork, qual: u8) {
        self.add_forward_winner(fork, qual);
        self.add_forward_winner(fork, qual);
        self.add_reverse_winner(fork, qual);
    }
}
