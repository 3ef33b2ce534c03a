//! Graph bundle (JSON), FASTQ read and GFA export support
use crate::core::{Read, ReadPath, SequenceGraph};
use anyhow::{anyhow, bail, Context, Result};
use bio::io::fastq;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Phred+33 quality encoding
const QUALITY_OFFSET: u8 = 33;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEdge {
    pub from: usize,
    pub to: usize,
    pub seq: String,
}

/// A graph, its involution and its read paths in one JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphBundle {
    pub k: usize,
    /// Defaults to one past the largest edge endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_count: Option<usize>,
    pub edges: Vec<BundleEdge>,
    pub involution: Vec<usize>,
    #[serde(default)]
    pub paths: Vec<ReadPath>,
}

impl GraphBundle {
    /// Snapshot a compacted graph and its paths
    pub fn from_parts(graph: &SequenceGraph, paths: &[ReadPath]) -> Result<Self> {
        if graph.has_dead_edges() {
            bail!("Graph has deleted edges; run cleanup before saving");
        }

        let edges = (0..graph.edge_count())
            .map(|e| BundleEdge {
                from: graph.source(e),
                to: graph.target(e),
                seq: String::from_utf8_lossy(graph.seq(e)).into_owned(),
            })
            .collect();

        Ok(Self {
            k: graph.k(),
            vertex_count: Some(graph.vertex_count()),
            edges,
            involution: graph.involution().to_vec(),
            paths: paths.to_vec(),
        })
    }

    /// Build the in-memory graph; structural problems are reported, not repaired
    pub fn into_parts(self) -> Result<(SequenceGraph, Vec<ReadPath>)> {
        let implied = self
            .edges
            .iter()
            .map(|edge| edge.from.max(edge.to) + 1)
            .max()
            .unwrap_or(0);
        let vertex_count = match self.vertex_count {
            Some(n) if n < implied => {
                bail!("vertex_count {} is smaller than the edges require ({})", n, implied)
            }
            Some(n) => n,
            None => implied,
        };

        let mut graph = SequenceGraph::new(self.k, vertex_count)?;
        for (id, edge) in self.edges.iter().enumerate() {
            graph
                .add_edge(edge.from, edge.to, edge.seq.as_bytes())
                .with_context(|| format!("Invalid edge {}", id))?;
        }
        graph.set_involution(self.involution)?;

        Ok((graph, self.paths))
    }
}

/// Load a graph bundle from JSON
pub fn load_bundle<P: AsRef<Path>>(path: P) -> Result<(SequenceGraph, Vec<ReadPath>)> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open graph bundle: {}", path.display()))?;
    let bundle: GraphBundle = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Malformed graph bundle: {}", path.display()))?;
    let (graph, paths) = bundle
        .into_parts()
        .with_context(|| format!("Invalid graph bundle: {}", path.display()))?;

    info!(
        "📖 Loaded graph: {} edges, {} vertices, {} read paths",
        graph.edge_count(),
        graph.vertex_count(),
        paths.len()
    );
    Ok((graph, paths))
}

/// Write a graph bundle as JSON
pub fn save_bundle<P: AsRef<Path>>(
    path: P,
    graph: &SequenceGraph,
    paths: &[ReadPath],
) -> Result<()> {
    let path = path.as_ref();
    let bundle = GraphBundle::from_parts(graph, paths)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create graph bundle: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &bundle)?;
    writer.flush()?;

    info!(
        "💾 Saved graph: {} edges to {}",
        graph.edge_count(),
        path.display()
    );
    Ok(())
}

/// Load reads from FASTQ; record order gives the read id
pub fn load_fastq_reads<P: AsRef<Path>>(path: P) -> Result<Vec<Read>> {
    let path = path.as_ref();
    let reader = fastq::Reader::from_file(path)
        .with_context(|| format!("Failed to open FASTQ file: {}", path.display()))?;

    let mut reads = Vec::new();
    for (read_id, record_result) in reader.records().enumerate() {
        let record = record_result
            .with_context(|| format!("Malformed FASTQ record {}", read_id))?;

        let quals = record
            .qual()
            .iter()
            .map(|&q| {
                q.checked_sub(QUALITY_OFFSET)
                    .ok_or_else(|| anyhow!("Quality byte {} below Phred+33 range", q))
            })
            .collect::<Result<Vec<u8>>>()
            .with_context(|| format!("Read {} ({})", read_id, record.id()))?;

        let read = Read::new(&record.seq().to_ascii_uppercase(), &quals)
            .with_context(|| format!("Read {} ({})", read_id, record.id()))?;
        reads.push(read);
    }

    info!("📖 Loaded {} reads from {}", reads.len(), path.display());
    Ok(reads)
}

/// Write the graph to GFA 1.0: one segment per edge, one link per
/// pair of edges meeting at a vertex
pub fn write_gfa<P: AsRef<Path>>(graph: &SequenceGraph, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create GFA file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "H\tVN:Z:1.0")?;

    let live: Vec<usize> = (0..graph.edge_count())
        .filter(|&e| graph.is_live(e))
        .collect();
    for &e in &live {
        writeln!(
            writer,
            "S\te{}\t{}\tLN:i:{}\tKC:i:{}",
            e,
            String::from_utf8_lossy(graph.seq(e)),
            graph.seq(e).len(),
            graph.kmers(e)
        )?;
    }

    let overlap = graph.k() - 1;
    let mut links = 0;
    for v in 0..graph.vertex_count() {
        for &entering in graph.incoming(v) {
            for &leaving in graph.outgoing(v) {
                writeln!(
                    writer,
                    "L\te{}\t+\te{}\t+\t{}M",
                    entering, leaving, overlap
                )?;
                links += 1;
            }
        }
    }

    writer.flush()?;
    info!(
        "📊 Wrote {} segments and {} links to GFA: {}",
        live.len(),
        links,
        path.display()
    );
    Ok(())
}
