//! Branch resolution: decide which outgoing edges of a vertex are artifacts
//!
//! Per-edge evidence samples are summed above a noise cutoff `d`, edges are
//! ranked by that support, and a boundary `r` splits the ranking into kept
//! and discarded edges. The scan tries `d = 0, 1, ..` and for each `d` the
//! boundaries `r = 1, 2, ..`; the first (d, r) that passes all three
//! thresholds decides the vertex.

use crate::assembly::evidence::EvidenceSample;
use crate::core::SequenceGraph;
use serde::{Deserialize, Serialize};
use tracing::info;

/// How many top-ranked edges may survive a decision
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryScan {
    /// Only the single strongest edge may be kept (`r = 1`)
    #[default]
    Strict,
    /// Any prefix of the ranking may be kept (`r = 1..n-1`)
    Permissive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchThresholds {
    /// Largest noise cutoff tried
    pub max_del: u32,
    /// Minimum support of the top-ranked edge
    pub min_win: u64,
    /// Maximum support of the best discarded edge
    pub max_lose: u64,
    /// Winner must have at least this multiple of the discarded edge's support
    pub min_ratio: u64,
    pub scan: BoundaryScan,
}

impl Default for BranchThresholds {
    fn default() -> Self {
        Self {
            max_del: 15,
            min_win: 100,
            max_lose: 50,
            min_ratio: 5,
            scan: BoundaryScan::Strict,
        }
    }
}

/// Outcome for one vertex; indices refer to the vertex's outgoing edge list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDecision {
    /// Noise cutoff at which the decision was made
    pub cutoff: u32,
    /// Rank of the first discarded edge
    pub boundary: usize,
    /// Outgoing edge indices, strongest first
    pub ranking: Vec<usize>,
    /// Support of each ranked edge at `cutoff`, aligned with `ranking`
    pub support: Vec<u64>,
}

impl BranchDecision {
    pub fn retained(&self) -> &[usize] {
        &self.ranking[..self.boundary]
    }

    pub fn discarded(&self) -> &[usize] {
        &self.ranking[self.boundary..]
    }
}

impl BranchThresholds {
    /// Apply the cutoff/boundary scan to per-edge samples
    pub fn decide(&self, samples: &[Vec<EvidenceSample>]) -> Option<BranchDecision> {
        let n = samples.len();
        if n < 2 {
            return None;
        }
        let last_boundary = match self.scan {
            BoundaryScan::Strict => 1,
            BoundaryScan::Permissive => n - 1,
        };

        for cutoff in 0..=self.max_del {
            let qsum: Vec<u64> = samples
                .iter()
                .map(|list| {
                    list.iter()
                        .filter(|&&s| s > cutoff)
                        .map(|&s| u64::from(s))
                        .sum()
                })
                .collect();

            // Ties rank the higher edge index first
            let mut ranking: Vec<usize> = (0..n).collect();
            ranking.sort_unstable_by(|&x, &y| (qsum[y], y).cmp(&(qsum[x], x)));
            let support: Vec<u64> = ranking.iter().map(|&j| qsum[j]).collect();

            let top = support[0];
            for boundary in 1..=last_boundary {
                let challenger = support[boundary];
                if top >= self.min_win
                    && challenger <= self.max_lose
                    && top >= challenger.saturating_mul(self.min_ratio)
                {
                    return Some(BranchDecision {
                        cutoff,
                        boundary,
                        ranking,
                        support,
                    });
                }
            }
        }

        None
    }
}

/// Emit the diagnostic trail for a decision.
///
/// Level 1 lists the ranked edges with their samples and the discarded range;
/// level 2 also dumps the bases of every discarded edge.
pub fn report_decision(
    graph: &SequenceGraph,
    v: usize,
    samples: &[Vec<EvidenceSample>],
    decision: &BranchDecision,
    pass: usize,
    verbosity: u8,
) {
    if verbosity == 0 {
        return;
    }

    let outgoing = graph.outgoing(v);
    let n = decision.ranking.len();
    let ranked_edges: Vec<usize> = decision.ranking.iter().map(|&j| outgoing[j]).collect();
    info!(pass, vertex = v, cutoff = decision.cutoff, "--> {:?}", ranked_edges);
    for (rank, &j) in decision.ranking.iter().enumerate() {
        info!("e{}: {:?}", rank + 1, samples[j]);
    }
    if n > decision.boundary + 1 {
        info!("deleting e{}-{}", decision.boundary + 1, n);
    } else {
        info!("deleting e{}", decision.boundary + 1);
    }

    if verbosity >= 2 {
        for &j in decision.discarded() {
            let e = outgoing[j];
            info!(
                ">{}.{}\n{}",
                pass,
                e,
                String::from_utf8_lossy(graph.seq(e))
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_edge_discards_weak_edge() {
        let samples = vec![vec![90, 60], vec![12, 8]];
        let decision = BranchThresholds::default().decide(&samples).unwrap();

        assert_eq!(decision.cutoff, 0);
        assert_eq!(decision.ranking, vec![0, 1]);
        assert_eq!(decision.support, vec![150, 20]);
        assert_eq!(decision.retained(), &[0]);
        assert_eq!(decision.discarded(), &[1]);
    }

    #[test]
    fn test_strong_loser_blocks_decision() {
        let samples = vec![vec![90, 60], vec![20, 20, 20]];
        assert!(BranchThresholds::default().decide(&samples).is_none());
    }

    #[test]
    fn test_cutoff_filters_noise() {
        // Many small samples on the loser push it over max_lose at d=0..2,
        // the cutoff at 3 removes them.
        let samples = vec![vec![200], vec![3; 20]];
        let decision = BranchThresholds::default().decide(&samples).unwrap();
        assert_eq!(decision.cutoff, 3);
        assert_eq!(decision.support, vec![200, 0]);
    }

    #[test]
    fn test_ratio_requirement() {
        // 40 passes max_lose but 120 < 5 * 40
        let samples = vec![vec![120], vec![40]];
        assert!(BranchThresholds::default().decide(&samples).is_none());
    }

    #[test]
    fn test_weak_winner_never_decides() {
        let samples = vec![vec![99], vec![]];
        assert!(BranchThresholds::default().decide(&samples).is_none());
    }

    #[test]
    fn test_strict_scan_needs_runner_up_weak() {
        // Two well-supported edges and one artifact
        let samples = vec![vec![400], vec![300], vec![5]];
        assert!(BranchThresholds::default().decide(&samples).is_none());

        let permissive = BranchThresholds {
            scan: BoundaryScan::Permissive,
            ..BranchThresholds::default()
        };
        let decision = permissive.decide(&samples).unwrap();
        assert_eq!(decision.boundary, 2);
        assert_eq!(decision.retained(), &[0, 1]);
        assert_eq!(decision.discarded(), &[2]);
    }

    #[test]
    fn test_ties_rank_higher_index_first() {
        let samples = vec![vec![], vec![500], vec![]];
        let decision = BranchThresholds::default().decide(&samples).unwrap();
        assert_eq!(decision.ranking, vec![1, 2, 0]);
        assert_eq!(decision.discarded(), &[2, 0]);
    }

    #[test]
    fn test_huge_ratio_saturates() {
        let thresholds = BranchThresholds {
            min_ratio: u64::MAX,
            ..BranchThresholds::default()
        };
        assert!(thresholds.decide(&[vec![500], vec![1]]).is_none());

        // Only an edge with no support at all can lose against it
        let decision = thresholds.decide(&[vec![500], vec![]]).unwrap();
        assert_eq!(decision.discarded(), &[1]);
    }

    #[test]
    fn test_single_edge_is_not_a_branch() {
        assert!(BranchThresholds::default().decide(&[vec![1000]]).is_none());
    }
}
