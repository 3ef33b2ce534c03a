//! Weak-branch pruning driver
//!
//! Each pass takes a read-only snapshot of the graph, analyzes every branch
//! vertex in parallel and collects the outgoing edges that read evidence
//! marks as artifacts. Deletions are applied only after the whole pass has
//! been analyzed, followed by cleanup and validation. A final sweep removes
//! tiny isolated stubs left behind by the passes.

use crate::assembly::branch_analysis::{report_decision, BranchThresholds};
use crate::assembly::evidence::EvidenceScorer;
use crate::assembly::extensions::{enumerate_extensions, Enumeration};
use crate::assembly::graph_editor::{validate, CleanupStats, GraphEditor};
use crate::assembly::path_index::PathIndex;
use crate::core::{check_read_set, Read, ReadPath, SequenceGraph};
use ahash::AHashSet;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Number of analyze/delete/cleanup rounds
pub const PASSES: usize = 2;

/// Which vertices count as branch points
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum BranchMode {
    /// Exactly one incoming edge, evidence collected through it
    #[default]
    SoloEntry,
    /// Any number of incoming edges, evidence collected through all of them
    AnyEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneSettings {
    /// Vertices producing more candidate walks than this are skipped
    pub max_exts: usize,
    /// Upper bound on the comparison depth in graph-mers; roughly the longest read
    pub max_read_len: usize,
    pub thresholds: BranchThresholds,
    pub mode: BranchMode,
    /// Run the tiny stub sweep after the passes
    pub remove_tiny: bool,
    /// Stubs up to this many graph-mers are removed by the sweep
    pub tiny_max_kmers: usize,
    /// 0 = quiet, 1 = decisions, 2 = decisions with discarded bases
    pub verbosity: u8,
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            max_exts: 10,
            max_read_len: 250,
            thresholds: BranchThresholds::default(),
            mode: BranchMode::SoloEntry,
            remove_tiny: true,
            tiny_max_kmers: 50,
            verbosity: 0,
        }
    }
}

/// Counters for one analysis round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BranchScan {
    pub branch_vertices: usize,
    pub too_complex: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub pass: usize,
    pub scan: BranchScan,
    pub edges_deleted: usize,
    pub cleanup: CleanupStats,
    pub edges_after: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub passes: Vec<PassReport>,
    pub stubs_removed: usize,
    pub stub_cleanup: Option<CleanupStats>,
    pub final_edges: usize,
    pub final_vertices: usize,
    pub elapsed_ms: u128,
}

impl PruneReport {
    pub fn total_edges_deleted(&self) -> usize {
        self.passes.iter().map(|p| p.edges_deleted).sum::<usize>() + self.stubs_removed
    }
}

enum VertexOutcome {
    TooComplex,
    Undecided,
    Resolved(Vec<usize>),
}

/// Evidence-driven removal of weakly supported branches
pub struct WeakBranchPruner {
    settings: PruneSettings,
    thread_pool: Option<rayon::ThreadPool>,
}

impl WeakBranchPruner {
    /// Pruner running on the global rayon pool
    pub fn new(settings: PruneSettings) -> Self {
        Self {
            settings,
            thread_pool: None,
        }
    }

    /// Pruner with a dedicated pool; `num_threads == 0` falls back to the global pool
    pub fn with_threads(settings: PruneSettings, num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Ok(Self::new(settings));
        }

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("prune-worker-{}", i))
            .build()
            .context("Failed to build pruning thread pool")?;

        Ok(Self {
            settings,
            thread_pool: Some(thread_pool),
        })
    }

    pub fn settings(&self) -> &PruneSettings {
        &self.settings
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.thread_pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Run both passes and the stub sweep, editing `graph` and `paths` in place
    pub fn prune(
        &self,
        graph: &mut SequenceGraph,
        paths: &mut Vec<ReadPath>,
        reads: &[Read],
    ) -> Result<PruneReport> {
        let start = Instant::now();
        check_read_set(reads, paths).context("Reads and read paths do not line up")?;
        validate(graph, paths).context("Input graph failed validation")?;

        info!(
            "🌿 Pruning weak branches: {} edges, {} vertices, {} reads",
            graph.live_edge_count(),
            graph.active_vertex_count(),
            reads.len()
        );

        let mut report = PruneReport::default();
        for pass in 1..=PASSES {
            let (to_delete, scan) =
                self.install(|| self.find_weak_branches(graph, paths, reads, pass));

            let mut editor = GraphEditor::new(graph, paths);
            let edges_deleted = editor.delete_edges(&to_delete);
            // An empty pass leaves the graph exactly as it was
            let cleanup = if edges_deleted > 0 {
                editor.cleanup()
            } else {
                CleanupStats::default()
            };
            editor
                .validate()
                .with_context(|| format!("Graph invariants broken after pass {}", pass))?;

            info!(
                "✂️  Pass {}/{}: {} branch vertices, {} too complex, {} resolved, {} edges deleted",
                pass, PASSES, scan.branch_vertices, scan.too_complex, scan.resolved, edges_deleted
            );
            report.passes.push(PassReport {
                pass,
                scan,
                edges_deleted,
                cleanup,
                edges_after: graph.edge_count(),
            });
        }

        if self.settings.remove_tiny {
            let stubs = find_tiny_stubs(graph, self.settings.tiny_max_kmers);
            let mut editor = GraphEditor::new(graph, paths);
            report.stubs_removed = editor.delete_edges(&stubs);
            report.stub_cleanup = Some(if report.stubs_removed > 0 {
                editor.cleanup()
            } else {
                CleanupStats::default()
            });
            editor
                .validate()
                .context("Graph invariants broken after stub sweep")?;
            info!("🧹 Removed {} tiny stub edges", report.stubs_removed);
        }

        report.final_edges = graph.edge_count();
        report.final_vertices = graph.vertex_count();
        report.elapsed_ms = start.elapsed().as_millis();

        info!(
            "✅ Pruning complete: {} edges deleted, {} edges remain ({} ms)",
            report.total_edges_deleted(),
            report.final_edges,
            report.elapsed_ms
        );
        Ok(report)
    }

    /// Analyze every branch vertex of the snapshot and return the sorted set
    /// of edges (with involutes) to delete. The graph is not modified.
    pub fn find_weak_branches(
        &self,
        graph: &SequenceGraph,
        paths: &[ReadPath],
        reads: &[Read],
        pass: usize,
    ) -> (Vec<usize>, BranchScan) {
        let index = PathIndex::build(paths, graph.edge_count());
        let scorer = EvidenceScorer::new(graph, paths, reads, &index);
        debug!(
            pass,
            incidences = index.incidence_count(),
            "path index built"
        );

        let deletions = Mutex::new(AHashSet::new());
        let branch_vertices = AtomicUsize::new(0);
        let too_complex = AtomicUsize::new(0);
        let resolved = AtomicUsize::new(0);

        (0..graph.vertex_count()).into_par_iter().for_each(|v| {
            let Some(entering) = self.branch_entry(graph, v) else {
                return;
            };
            branch_vertices.fetch_add(1, Ordering::Relaxed);

            match self.analyze_vertex(graph, &scorer, v, entering, pass) {
                VertexOutcome::TooComplex => {
                    too_complex.fetch_add(1, Ordering::Relaxed);
                }
                VertexOutcome::Undecided => {}
                VertexOutcome::Resolved(edges) => {
                    resolved.fetch_add(1, Ordering::Relaxed);
                    deletions.lock().extend(edges);
                }
            }
        });

        let mut to_delete: Vec<usize> = deletions.into_inner().into_iter().collect();
        to_delete.sort_unstable();

        let scan = BranchScan {
            branch_vertices: branch_vertices.into_inner(),
            too_complex: too_complex.into_inner(),
            resolved: resolved.into_inner(),
        };
        (to_delete, scan)
    }

    /// Entering edges of `v` if it is a branch vertex under the current mode
    fn branch_entry<'g>(&self, graph: &'g SequenceGraph, v: usize) -> Option<&'g [usize]> {
        let incoming = graph.incoming(v);
        if graph.outgoing(v).len() < 2 {
            return None;
        }
        match self.settings.mode {
            BranchMode::SoloEntry if incoming.len() == 1 => Some(incoming),
            BranchMode::AnyEntry if !incoming.is_empty() => Some(incoming),
            _ => None,
        }
    }

    fn analyze_vertex(
        &self,
        graph: &SequenceGraph,
        scorer: &EvidenceScorer<'_>,
        v: usize,
        entering: &[usize],
        pass: usize,
    ) -> VertexOutcome {
        let exts = match enumerate_extensions(
            graph,
            v,
            self.settings.max_exts,
            self.settings.max_read_len,
        ) {
            Enumeration::Complete(exts) => exts,
            Enumeration::TooComplex { walks } => {
                debug!(vertex = v, walks, "branch too complex, skipping");
                return VertexOutcome::TooComplex;
            }
        };

        let samples = scorer.score(v, entering, &exts);
        let Some(decision) = self.settings.thresholds.decide(&samples) else {
            return VertexOutcome::Undecided;
        };
        report_decision(graph, v, &samples, &decision, pass, self.settings.verbosity);

        let outgoing = graph.outgoing(v);
        let edges = decision
            .discarded()
            .iter()
            .flat_map(|&j| [outgoing[j], graph.inv(outgoing[j])])
            .collect();
        VertexOutcome::Resolved(edges)
    }
}

/// Edges `e: v -> w` where `v` has no incoming and only `e` outgoing, `w` has
/// only `e` incoming and nothing outgoing, and `e` spans at most `max_kmers`
/// graph-mers. Returned sorted, with involutes.
pub fn find_tiny_stubs(graph: &SequenceGraph, max_kmers: usize) -> Vec<usize> {
    let mut stubs = Vec::new();
    for v in 0..graph.vertex_count() {
        if !graph.incoming(v).is_empty() {
            continue;
        }
        let &[e] = graph.outgoing(v) else {
            continue;
        };
        let w = graph.target(e);
        if w == v || graph.incoming(w).len() != 1 || !graph.outgoing(w).is_empty() {
            continue;
        }
        if graph.kmers(e) <= max_kmers {
            stubs.push(e);
            stubs.push(graph.inv(e));
        }
    }
    stubs.sort_unstable();
    stubs.dedup();
    stubs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reverse_complement;

    fn add_pair(g: &mut SequenceGraph, from: usize, to: usize, seq: &[u8]) -> (usize, usize) {
        let e = g.add_edge(from, to, seq).unwrap();
        let re = g.add_edge(to ^ 1, from ^ 1, &reverse_complement(seq)).unwrap();
        g.pair_edges(e, re).unwrap();
        (e, re)
    }

    fn stub(kmers: usize) -> Vec<u8> {
        let mut seq = b"ACGTTGCA".repeat(kmers / 8 + 2);
        seq.truncate(kmers + 4);
        seq
    }

    #[test]
    fn test_tiny_stub_found_with_partner() {
        let mut g = SequenceGraph::new(5, 4).unwrap();
        let (e, re) = add_pair(&mut g, 0, 2, &stub(40));
        assert_eq!(find_tiny_stubs(&g, 50), vec![e, re]);
        assert!(find_tiny_stubs(&g, 39).is_empty());
    }

    #[test]
    fn test_long_isolated_edge_kept() {
        let mut g = SequenceGraph::new(5, 4).unwrap();
        add_pair(&mut g, 0, 2, &stub(60));
        assert!(find_tiny_stubs(&g, 50).is_empty());
    }

    #[test]
    fn test_connected_edge_is_not_a_stub() {
        // 0 -> 2 continues into 2 -> 4, so neither end is free
        let mut g = SequenceGraph::new(5, 6).unwrap();
        add_pair(&mut g, 0, 2, b"ACGTTGCAAC");
        add_pair(&mut g, 2, 4, b"CAACTTTT");
        assert!(find_tiny_stubs(&g, 50).is_empty());
    }

    #[test]
    fn test_branch_modes() {
        // Two edges enter v, two leave
        let mut g = SequenceGraph::new(3, 8).unwrap();
        add_pair(&mut g, 0, 2, b"AACGT");
        add_pair(&mut g, 4, 2, b"CCCGT");
        add_pair(&mut g, 2, 6, b"GTAAA");
        add_pair(&mut g, 2, 6, b"GTCCC");

        let solo = WeakBranchPruner::new(PruneSettings::default());
        assert!(solo.branch_entry(&g, 2).is_none());

        let any = WeakBranchPruner::new(PruneSettings {
            mode: BranchMode::AnyEntry,
            ..PruneSettings::default()
        });
        assert_eq!(any.branch_entry(&g, 2), Some(g.incoming(2)));
        assert!(any.branch_entry(&g, 0).is_none());
    }

    #[test]
    fn test_zero_threads_uses_global_pool() {
        let pruner = WeakBranchPruner::with_threads(PruneSettings::default(), 0).unwrap();
        assert!(pruner.thread_pool.is_none());
        let pruner = WeakBranchPruner::with_threads(PruneSettings::default(), 2).unwrap();
        assert!(pruner.thread_pool.is_some());
    }
}
