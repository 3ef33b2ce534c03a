use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use prune_forge::assembly::graph_editor::validate;
use prune_forge::utils::configuration::config_utils;
use prune_forge::utils::{load_bundle, load_fastq_reads, save_bundle, write_gfa};
use prune_forge::utils::ConfigurationManager;
use prune_forge::{BoundaryScan, BranchMode, WeakBranchPruner};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "prune-forge")]
#[command(about = "Evidence-driven pruning of weak branches in strand-symmetric assembly graphs")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Decision diagnostics (-v per-deletion summary, -vv with discarded bases)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prune weak branches and write the edited graph
    Prune {
        /// Input graph bundle (JSON)
        #[arg(short, long)]
        graph: PathBuf,

        /// Reads in FASTQ, one record per read path
        #[arg(short, long)]
        reads: PathBuf,

        /// Output graph bundle (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the pruned graph as GFA
        #[arg(long)]
        gfa: Option<PathBuf>,

        /// Write the pruning report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Which vertices are analyzed (overrides config)
        #[arg(long, value_enum)]
        mode: Option<BranchMode>,

        /// How many top edges may survive a decision (overrides config)
        #[arg(long, value_enum)]
        scan: Option<BoundaryScan>,

        /// Number of threads (overrides config)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Skip the tiny stub sweep after the passes
        #[arg(long)]
        no_remove_tiny: bool,
    },

    /// Print summary statistics of a graph bundle
    Stats {
        /// Graph bundle (JSON)
        #[arg(short, long)]
        graph: PathBuf,
    },

    /// Write the default configuration as TOML
    ConfigTemplate {
        /// Output path
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut manager = match &cli.config {
        Some(path) => ConfigurationManager::from_file(path)?,
        None => ConfigurationManager::new()?,
    };
    if cli.verbose > 0 {
        manager.config_mut().pruning.verbosity = cli.verbose.min(2);
    }
    let _log_guard = manager.setup_logging()?;

    match cli.command {
        Commands::Prune {
            graph,
            reads,
            output,
            gfa,
            report,
            mode,
            scan,
            threads,
            no_remove_tiny,
        } => {
            let config = manager.config_mut();
            if let Some(mode) = mode {
                config.pruning.mode = mode;
            }
            if let Some(scan) = scan {
                config.pruning.thresholds.scan = scan;
            }
            if let Some(threads) = threads {
                config.performance.num_threads = threads;
            }
            if no_remove_tiny {
                config.pruning.remove_tiny = false;
            }
            manager.validate_configuration()?;
            let config = manager.config();

            let (mut sequence_graph, mut paths) = load_bundle(&graph)?;
            let reads = load_fastq_reads(&reads)?;

            let pruner = WeakBranchPruner::with_threads(
                config.pruning.clone(),
                config.performance.num_threads,
            )?;
            let prune_report = pruner.prune(&mut sequence_graph, &mut paths, &reads)?;

            save_bundle(&output, &sequence_graph, &paths)?;
            if let Some(gfa) = gfa {
                write_gfa(&sequence_graph, gfa)?;
            }
            if let Some(report) = report {
                let file = File::create(&report).with_context(|| {
                    format!("Failed to create report file: {}", report.display())
                })?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, &prune_report)?;
                writer.flush()?;
                info!("💾 Report saved to {}", report.display());
            }

            println!("✅ Pruning completed successfully!");
            println!("📊 Results:");
            for pass in &prune_report.passes {
                println!(
                    "   Pass {}: {} branch vertices, {} resolved, {} edges deleted",
                    pass.pass, pass.scan.branch_vertices, pass.scan.resolved, pass.edges_deleted
                );
            }
            println!("   Tiny stubs removed: {}", prune_report.stubs_removed);
            println!(
                "   Final graph: {} edges, {} vertices",
                prune_report.final_edges, prune_report.final_vertices
            );
            println!("   Processing time: {} ms", prune_report.elapsed_ms);
        }
        Commands::Stats { graph } => {
            let (sequence_graph, paths) = load_bundle(&graph)?;
            let stats = sequence_graph.stats();

            println!("📊 Graph: {}", graph.display());
            println!("   K: {}", sequence_graph.k());
            println!("   Vertices: {}", stats.vertices);
            println!("   Edges: {}", stats.edges);
            println!("   Total graph-mers: {}", stats.total_kmers);
            println!("   Branch vertices: {}", stats.branch_vertices);
            println!("   Dead ends: {}", stats.dead_ends);
            println!("   Palindromic edges: {}", stats.palindromic_edges);
            println!("   Longest edge: {} graph-mers", stats.longest_edge_kmers);
            println!("   N50: {} graph-mers", stats.n50_kmers);
            println!("   Read paths: {}", paths.len());
            match validate(&sequence_graph, &paths) {
                Ok(()) => println!("   Invariants: ok"),
                Err(e) => println!("   Invariants: violated ({})", e),
            }
        }
        Commands::ConfigTemplate { output } => {
            config_utils::generate_config_template(&output)?;
            println!("💾 Configuration template written to {}", output.display());
        }
    }

    Ok(())
}
