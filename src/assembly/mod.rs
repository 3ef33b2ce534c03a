//! Weak-branch pruning over the strand-symmetric assembly graph
//!
//! **Driver**: `weak_branch_pruner.rs` - passes, stub sweep and reporting
//! **Analysis**: `extensions.rs`, `evidence.rs`, `branch_analysis.rs`
//! **Editing**: `graph_editor.rs` - deletion, cleanup and validation

pub mod branch_analysis;
pub mod evidence;
pub mod extensions;
pub mod graph_editor;
pub mod path_index;
pub mod weak_branch_pruner;

pub use branch_analysis::{BoundaryScan, BranchDecision, BranchThresholds};
pub use evidence::{EvidenceSample, EvidenceScorer};
pub use extensions::{enumerate_extensions, Enumeration, Extension, ExtensionSet};
pub use graph_editor::{CleanupStats, GraphEditor, GraphInvariantError};
pub use path_index::PathIndex;
pub use weak_branch_pruner::{
    find_tiny_stubs, BranchMode, BranchScan, PassReport, PruneReport, PruneSettings,
    WeakBranchPruner, PASSES,
};
