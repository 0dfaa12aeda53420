//! Diagnostic CSV outputs.
//!
//! All files are comma-delimited UTF-8 with a header row, written next to
//! the run's other outputs. The marker graph dump is also the failure
//! path for strand-symmetry errors, so it must never assume the graph is
//! consistent.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::assembly::marker_graph::MarkerGraph;
use crate::core::MarkerTable;

pub fn write_disjoint_sets_histogram(dir: &Path, histogram: &[u64]) -> Result<()> {
    let mut csv = create(dir, "DisjointSetsHistogram.csv")?;
    writeln!(csv, "Coverage,Frequency")?;
    for (coverage, &frequency) in histogram.iter().enumerate() {
        if frequency > 0 {
            writeln!(csv, "{coverage},{frequency}")?;
        }
    }
    Ok(())
}

pub fn write_vertex_coverage_histogram(dir: &Path, graph: &MarkerGraph) -> Result<()> {
    let mut histogram: Vec<u64> = Vec::new();
    for vertex_id in 0..graph.vertex_count() {
        let coverage = graph.vertex_markers(vertex_id).len();
        if coverage >= histogram.len() {
            histogram.resize(coverage + 1, 0);
        }
        histogram[coverage] += 1;
    }
    let mut csv = create(dir, "MarkerGraphVertexCoverageHistogram.csv")?;
    writeln!(csv, "Coverage,Frequency")?;
    for (coverage, &frequency) in histogram.iter().enumerate() {
        if frequency > 0 {
            writeln!(csv, "{coverage},{frequency}")?;
        }
    }
    Ok(())
}

pub fn write_edge_coverage_histogram(dir: &Path, graph: &MarkerGraph) -> Result<()> {
    let mut histogram: Vec<u64> = Vec::new();
    for edge_id in 0..graph.edge_count() {
        // The uncapped count, from the interval list.
        let coverage = graph.edge_marker_intervals.size_of(edge_id as usize);
        if coverage >= histogram.len() {
            histogram.resize(coverage + 1, 0);
        }
        histogram[coverage] += 1;
    }
    let mut csv = create(dir, "MarkerGraphEdgeCoverageHistogram.csv")?;
    writeln!(csv, "Coverage,Frequency")?;
    for (coverage, &frequency) in histogram.iter().enumerate() {
        if frequency > 0 {
            writeln!(csv, "{coverage},{frequency}")?;
        }
    }
    Ok(())
}

/// Vertices holding more than one marker of the same oriented read.
pub fn write_bad_vertices(dir: &Path, graph: &MarkerGraph, markers: &MarkerTable) -> Result<()> {
    let mut csv = create(dir, "BadMarkerGraphVertices.csv")?;
    writeln!(csv, "VertexId,Coverage")?;
    for vertex_id in 0..graph.vertex_count() {
        if graph.is_bad_vertex(vertex_id, markers) {
            writeln!(
                csv,
                "{vertex_id},{}",
                graph.vertex_markers(vertex_id).len()
            )?;
        }
    }
    Ok(())
}

/// Coverage statistics aggregated by k-mer id: how many vertices carry
/// each k-mer and at what total coverage.
pub fn write_vertex_coverage_by_kmer(
    dir: &Path,
    graph: &MarkerGraph,
    markers: &MarkerTable,
) -> Result<()> {
    let mut by_kmer: std::collections::BTreeMap<u64, (u64, u64)> = std::collections::BTreeMap::new();
    for vertex_id in 0..graph.vertex_count() {
        let vertex_markers = graph.vertex_markers(vertex_id);
        let kmer_id = markers.marker(vertex_markers[0]).kmer_id;
        let entry = by_kmer.entry(kmer_id).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += vertex_markers.len() as u64;
    }
    let mut csv = create(dir, "VertexCoverageByKmerId.csv")?;
    writeln!(csv, "KmerId,VertexCount,TotalCoverage")?;
    for (kmer_id, (vertex_count, total_coverage)) in by_kmer {
        writeln!(csv, "{kmer_id},{vertex_count},{total_coverage}")?;
    }
    Ok(())
}

/// Full marker graph dump, used before aborting on structural errors.
pub fn dump_marker_graph(graph: &MarkerGraph, markers: &MarkerTable, dir: &Path) -> Result<()> {
    let mut vertices_csv = create(dir, "MarkerGraphVerticesDump.csv")?;
    writeln!(vertices_csv, "VertexId,MarkerId,OrientedRead,Ordinal")?;
    for vertex_id in 0..graph.vertex_count() {
        for &marker_id in graph.vertex_markers(vertex_id) {
            let (oriented_read_id, ordinal) = markers.find_marker_id(marker_id);
            writeln!(
                vertices_csv,
                "{vertex_id},{marker_id},{oriented_read_id},{ordinal}"
            )?;
        }
    }

    let mut edges_csv = create(dir, "MarkerGraphEdgesDump.csv")?;
    writeln!(edges_csv, "EdgeId,Source,Target,Coverage,WasRemoved")?;
    for edge_id in 0..graph.edge_count() {
        let edge = &graph.edges[edge_id as usize];
        writeln!(
            edges_csv,
            "{edge_id},{},{},{},{}",
            edge.source,
            edge.target,
            graph.edge_marker_intervals.size_of(edge_id as usize),
            edge.was_removed() as u8
        )?;
    }
    Ok(())
}

fn create(dir: &Path, name: &str) -> Result<BufWriter<File>> {
    let path = dir.join(name);
    let file =
        File::create(&path).with_context(|| format!("unable to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
