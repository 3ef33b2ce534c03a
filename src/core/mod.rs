pub mod reads;
pub mod sequence_graph;

pub use reads::{check_read_set, Read, ReadPath};
pub use sequence_graph::{complement, reverse_complement, EdgeRecord, GraphStats, SequenceGraph};
