//! Shared helpers for the integration tests: hand-built marker graphs
//! and small synthetic read sets with their reverse complement pairs.

#![allow(dead_code)]

use marker_forge::assembly::marker_graph::{MarkerGraph, MarkerGraphEdge};
use marker_forge::assembly::read_graph::{ReadGraph, ReadGraphEdge};
use marker_forge::core::ids::{EdgeId, Marker, MarkerInterval, VertexId};
use marker_forge::core::{MarkerTable, OrientedReadId};
use marker_forge::storage::LargeData;
use marker_forge::utils::configuration::PipelineConfiguration;

/// Builds a marker graph directly, bypassing the construction passes.
/// Used by the simplifier scenarios, which need precise control over
/// topology and coverage.
pub struct GraphBuilder {
    pub graph: MarkerGraph,
    interval_read: u32,
}

impl GraphBuilder {
    pub fn new(vertex_count: usize) -> Self {
        let mut graph = MarkerGraph::create_new(&LargeData::anonymous()).unwrap();
        for _ in 0..vertex_count {
            // Simplifier scenarios never consult vertex marker lists.
            graph.vertices.append_vector(&[]).unwrap();
        }
        GraphBuilder {
            graph,
            interval_read: 0,
        }
    }

    /// Add an edge with `coverage` synthetic marker intervals.
    pub fn add_edge(&mut self, source: VertexId, target: VertexId, coverage: usize) -> EdgeId {
        let edge_id = self.graph.edges.len() as EdgeId;
        self.graph
            .edges
            .push(MarkerGraphEdge::new(source, target, coverage))
            .unwrap();
        let intervals: Vec<MarkerInterval> = (0..coverage)
            .map(|_| {
                // Distinct reads per interval keep the intervals sorted.
                let read = self.interval_read;
                self.interval_read += 1;
                MarkerInterval::new(OrientedReadId::new(read, 0), 0, 1)
            })
            .collect();
        self.graph
            .edge_marker_intervals
            .append_vector(&intervals)
            .unwrap();
        edge_id
    }

    /// Add an edge with explicit marker intervals.
    pub fn add_edge_with_intervals(
        &mut self,
        source: VertexId,
        target: VertexId,
        intervals: &[MarkerInterval],
    ) -> EdgeId {
        let edge_id = self.graph.edges.len() as EdgeId;
        self.graph
            .edges
            .push(MarkerGraphEdge::new(source, target, intervals.len()))
            .unwrap();
        self.graph
            .edge_marker_intervals
            .append_vector(intervals)
            .unwrap();
        edge_id
    }

    /// Declare reverse complement vertex pairs `(v, v_rc)`.
    pub fn set_rc_vertices(&mut self, pairs: &[(VertexId, VertexId)]) {
        let n = self.graph.vertices.len();
        self.graph.reverse_complement_vertex.resize(n).unwrap();
        for &(v, v_rc) in pairs {
            self.graph.reverse_complement_vertex[v as usize] = v_rc;
            self.graph.reverse_complement_vertex[v_rc as usize] = v;
        }
    }

    /// Declare reverse complement edge pairs `(e, e_rc)`.
    pub fn set_rc_edges(&mut self, pairs: &[(EdgeId, EdgeId)]) {
        let n = self.graph.edges.len();
        self.graph.reverse_complement_edge.resize(n).unwrap();
        for &(e, e_rc) in pairs {
            self.graph.reverse_complement_edge[e as usize] = e_rc;
            self.graph.reverse_complement_edge[e_rc as usize] = e;
        }
    }

    /// Build the adjacency lists and hand over the finished graph.
    pub fn finish(mut self) -> MarkerGraph {
        let vertex_count = self.graph.vertices.len();
        let edges: Vec<MarkerGraphEdge> = self.graph.edges.as_slice().to_vec();

        self.graph.edges_by_source.begin_pass1(vertex_count).unwrap();
        self.graph.edges_by_target.begin_pass1(vertex_count).unwrap();
        for edge in &edges {
            self.graph
                .edges_by_source
                .increment_count(edge.source as usize);
            self.graph
                .edges_by_target
                .increment_count(edge.target as usize);
        }
        self.graph.edges_by_source.begin_pass2().unwrap();
        self.graph.edges_by_target.begin_pass2().unwrap();
        for (edge_id, edge) in edges.iter().enumerate() {
            self.graph
                .edges_by_source
                .store(edge.source as usize, (edge_id as u64).into());
            self.graph
                .edges_by_target
                .store(edge.target as usize, (edge_id as u64).into());
        }
        self.graph.edges_by_source.end_pass2().unwrap();
        self.graph.edges_by_target.end_pass2().unwrap();
        self.graph
    }
}

/// Build a graph whose reverse complement side mirrors the forward side:
/// forward vertices are `0..vertex_count`, the rc of vertex `v` is
/// `v + vertex_count`, and each forward edge `(u, v, coverage)` gets a
/// mirrored rc edge `(v + n, u + n, coverage)`.
pub fn mirrored_graph(vertex_count: u64, forward_edges: &[(u64, u64, usize)]) -> MarkerGraph {
    let mut builder = GraphBuilder::new(2 * vertex_count as usize);
    let edge_count = forward_edges.len() as u64;
    for &(u, v, coverage) in forward_edges {
        builder.add_edge(u, v, coverage);
    }
    for &(u, v, coverage) in forward_edges {
        builder.add_edge(v + vertex_count, u + vertex_count, coverage);
    }
    let vertex_pairs: Vec<(u64, u64)> =
        (0..vertex_count).map(|v| (v, v + vertex_count)).collect();
    builder.set_rc_vertices(&vertex_pairs);
    let edge_pairs: Vec<(u64, u64)> = (0..edge_count).map(|e| (e, e + edge_count)).collect();
    builder.set_rc_edges(&edge_pairs);
    builder.finish()
}

/// An empty marker table, for scenarios that never look markers up.
pub fn empty_markers() -> MarkerTable {
    MarkerTable::from_vectors(&[]).unwrap()
}

/// Configuration for deterministic small-scale tests: two threads,
/// anonymous arenas.
pub fn test_config() -> PipelineConfiguration {
    let mut config = PipelineConfiguration::default();
    config.resources.thread_count = 2;
    config
}

// ---------------------------------------------------------------------
// Synthetic reads: k-mer ids below RC_OFFSET are "forward" k-mers whose
// reverse complement is the id plus RC_OFFSET.
// ---------------------------------------------------------------------

pub const RC_OFFSET: u64 = 1000;

pub fn rc_kmer(kmer_id: u64) -> u64 {
    if kmer_id < RC_OFFSET {
        kmer_id + RC_OFFSET
    } else {
        kmer_id - RC_OFFSET
    }
}

/// Marker table for reads given as forward-strand k-mer id sequences.
/// The reverse strand is derived (complement each k-mer, reverse the
/// order); positions are synthetic.
pub fn marker_table(reads: &[Vec<u64>]) -> MarkerTable {
    let mut per_oriented_read = Vec::with_capacity(2 * reads.len());
    for read in reads {
        let forward: Vec<Marker> = read
            .iter()
            .enumerate()
            .map(|(i, &kmer_id)| Marker::new(kmer_id, 10 * i as u32))
            .collect();
        let reverse: Vec<Marker> = read
            .iter()
            .rev()
            .enumerate()
            .map(|(i, &kmer_id)| Marker::new(rc_kmer(kmer_id), 10 * i as u32))
            .collect();
        per_oriented_read.push(forward);
        per_oriented_read.push(reverse);
    }
    MarkerTable::from_vectors(&per_oriented_read).unwrap()
}

/// A read-graph alignment between two oriented reads, by ordinal pairs.
pub struct TestAlignment {
    pub oriented_read_ids: [OrientedReadId; 2],
    pub ordinals: Vec<[u32; 2]>,
}

/// Build a read graph from alignments, generating the reverse complement
/// edge of each alignment automatically (at index `2i + 1`, with
/// mirrored, re-sorted ordinals).
pub fn read_graph(markers: &MarkerTable, alignments: &[TestAlignment]) -> ReadGraph {
    let mut edges = Vec::new();
    let mut stored_alignments = Vec::new();

    for alignment in alignments {
        let [id0, id1] = alignment.oriented_read_ids;
        assert!(id0 < id1, "test alignments must be normalized");

        let alignment_id = stored_alignments.len() as u64;
        stored_alignments.push(alignment.ordinals.clone());
        edges.push(ReadGraphEdge::new([id0, id1], alignment_id, false, false));

        // Mirrored ordinals of the strand-flipped alignment.
        let count0 = markers.count_of(id0);
        let count1 = markers.count_of(id1);
        let mut mirrored: Vec<[u32; 2]> = alignment
            .ordinals
            .iter()
            .map(|&[o0, o1]| [count0 - 1 - o0, count1 - 1 - o1])
            .collect();
        mirrored.sort_unstable();
        let rc_alignment_id = stored_alignments.len() as u64;
        stored_alignments.push(mirrored);

        // Flipping both strands preserves ascending order for distinct
        // reads, so the pair stays normalized.
        let rc_ids = [id0.flipped(), id1.flipped()];
        edges.push(ReadGraphEdge::new(rc_ids, rc_alignment_id, false, false));
    }

    let chimeric = vec![false; markers.read_count()];
    ReadGraph::from_parts(&edges, &chimeric, &stored_alignments).unwrap()
}
