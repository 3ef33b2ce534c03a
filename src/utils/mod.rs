//! Configuration, logging setup and file formats

pub mod configuration;
pub mod graph_io;

pub use configuration::{ConfigurationManager, PipelineError, PruneConfiguration};
pub use graph_io::{load_bundle, load_fastq_reads, save_bundle, write_gfa, GraphBundle};
