//! # PruneForge - Weak-Branch Pruning for Assembly Graphs
//!
//! Refines a strand-symmetric sequence graph by deleting outgoing edges at
//! branch vertices that the aligned reads do not support. Every edit keeps
//! the reverse-complement involution and the read paths consistent.

pub mod assembly;
pub mod core;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::assembly::{
    BoundaryScan, BranchMode, BranchThresholds, GraphInvariantError, PruneReport, PruneSettings,
    WeakBranchPruner,
};
pub use crate::core::{Read, ReadPath, SequenceGraph};

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;
