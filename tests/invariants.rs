//! Structural invariants, idempotence properties, and boundary behaviors.

mod common;

use common::{marker_table, read_graph, test_config, TestAlignment};
use marker_forge::assembly::{prune, strand_symmetry};
use marker_forge::core::OrientedReadId;
use marker_forge::mode3::Mode3AssemblyGraph;
use marker_forge::storage::LargeData;
use marker_forge::utils::WorkerPool;
use marker_forge::AssemblyPipeline;

/// Pipeline over the two-read reverse-complement pair scenario.
fn two_read_pipeline() -> AssemblyPipeline {
    let markers = marker_table(&[vec![0, 1, 2, 3, 4], vec![1004, 1003, 1002, 1001, 1000]]);
    let reads = read_graph(
        &markers,
        &[TestAlignment {
            oriented_read_ids: [OrientedReadId::new(0, 0), OrientedReadId::new(1, 1)],
            ordinals: (0..5).map(|i| [i, i]).collect(),
        }],
    );
    let mut config = test_config();
    config.marker_graph.min_coverage = 2;
    config.marker_graph.max_coverage = 10;
    config.marker_graph.min_coverage_per_strand = 1;

    let mut pipeline = AssemblyPipeline::new(config, markers, reads, None).unwrap();
    pipeline.create_vertices().unwrap();
    pipeline.create_edges().unwrap();
    pipeline.find_reverse_complements().unwrap();
    pipeline
}

#[test]
fn vertex_table_and_vertices_agree() {
    let pipeline = two_read_pipeline();
    pipeline.marker_graph.check_vertices(2, 10).unwrap();
    pipeline.marker_graph.check_adjacency().unwrap();
}

#[test]
fn strand_symmetry_holds_and_is_stable() {
    let mut pipeline = two_read_pipeline();
    strand_symmetry::check_strand_symmetry(
        &pipeline.marker_graph,
        &pipeline.markers,
        &pipeline.pool,
    )
    .unwrap();

    // Running the mapping pass again yields identical mappings.
    let rc_vertices: Vec<u64> = pipeline
        .marker_graph
        .reverse_complement_vertex
        .as_slice()
        .to_vec();
    let rc_edges: Vec<u64> = pipeline
        .marker_graph
        .reverse_complement_edge
        .as_slice()
        .to_vec();
    pipeline.find_reverse_complements().unwrap();
    assert_eq!(
        pipeline.marker_graph.reverse_complement_vertex.as_slice(),
        rc_vertices.as_slice()
    );
    assert_eq!(
        pipeline.marker_graph.reverse_complement_edge.as_slice(),
        rc_edges.as_slice()
    );
}

#[test]
fn removal_flags_stay_strand_symmetric_through_the_simplifier() {
    let mut pipeline = two_read_pipeline();
    pipeline.reduce().unwrap();
    pipeline.prune().unwrap();
    pipeline.simplify().unwrap();

    let graph = &pipeline.marker_graph;
    for edge_id in 0..graph.edge_count() {
        let rc = graph.rc_edge(edge_id);
        let edge = &graph.edges[edge_id as usize];
        let rc_edge = &graph.edges[rc as usize];
        assert_eq!(
            edge.was_removed_by_transitive_reduction(),
            rc_edge.was_removed_by_transitive_reduction()
        );
        assert_eq!(edge.was_pruned(), rc_edge.was_pruned());
        assert_eq!(edge.is_super_bubble_edge(), rc_edge.is_super_bubble_edge());
    }
}

/// Pruning peels exactly one layer of leaves per iteration and commits
/// marks at iteration end.
#[test]
fn pruning_peels_one_layer_per_iteration() {
    // A 3-edge chain (plus its mirror): both end edges are leaves, the
    // middle one only becomes a leaf after they are committed.
    let mut graph = common::mirrored_graph(4, &[(0, 1, 10), (1, 2, 10), (2, 3, 10)]);
    prune::prune_strong_subgraph(&mut graph, 1).unwrap();
    assert!(graph.edges[0].was_pruned());
    assert!(!graph.edges[1].was_pruned());
    assert!(graph.edges[2].was_pruned());
    assert!(graph.edges[3].was_pruned());
    assert!(!graph.edges[4].was_pruned());
    assert!(graph.edges[5].was_pruned());

    let mut graph = common::mirrored_graph(4, &[(0, 1, 10), (1, 2, 10), (2, 3, 10)]);
    prune::prune_strong_subgraph(&mut graph, 2).unwrap();
    assert!(graph.edges.iter().all(|e| e.was_pruned()));
}

/// Rebuilding Mode-3 segments from the same marker graph yields
/// identical segments.
#[test]
fn segment_construction_is_deterministic() {
    let mut pipeline = two_read_pipeline();
    pipeline.reduce().unwrap();
    pipeline.prune().unwrap();
    pipeline.simplify().unwrap();

    let pool = WorkerPool::new(2).unwrap();
    let a = Mode3AssemblyGraph::create(
        &pipeline.marker_graph,
        &pipeline.markers,
        2,
        &LargeData::anonymous(),
        &pool,
    )
    .unwrap();
    let b = Mode3AssemblyGraph::create(
        &pipeline.marker_graph,
        &pipeline.markers,
        2,
        &LargeData::anonymous(),
        &pool,
    )
    .unwrap();

    assert_eq!(a.segment_count(), b.segment_count());
    for segment_id in 0..a.segment_count() {
        assert_eq!(a.path(segment_id), b.path(segment_id));
    }
}

/// A single read with no alignments: every marker is a singleton set.
/// With min_coverage 1 each becomes a vertex; with min_coverage 2
/// nothing survives.
#[test]
fn single_read_boundary() {
    for (min_coverage, expected_vertices) in [(1u64, 6u64), (2, 0)] {
        let markers = marker_table(&[vec![0, 1, 2]]);
        let reads = read_graph(&markers, &[]);
        let mut config = test_config();
        config.marker_graph.min_coverage = min_coverage;
        config.marker_graph.max_coverage = 10;

        let mut pipeline = AssemblyPipeline::new(config, markers, reads, None).unwrap();
        pipeline.create_vertices().unwrap();
        pipeline.create_edges().unwrap();
        assert_eq!(pipeline.marker_graph.vertex_count(), expected_vertices);
        if expected_vertices == 0 {
            assert_eq!(pipeline.marker_graph.edge_count(), 0);
        }
    }
}

/// With automatic selection and a size distribution that has no genomic
/// peak, min_coverage falls back to 5.
#[test]
fn auto_min_coverage_falls_back_on_flat_histogram() {
    // A lone read yields only singleton sets: histogram [0, 6], nothing
    // at or beyond the peak start index.
    let markers = marker_table(&[vec![0, 1, 2]]);
    let reads = read_graph(&markers, &[]);
    let mut config = test_config();
    config.marker_graph.min_coverage = 0;

    let mut pipeline = AssemblyPipeline::new(config, markers, reads, None).unwrap();
    pipeline.create_vertices().unwrap();
    assert_eq!(pipeline.min_coverage_used, 5);
    assert_eq!(pipeline.marker_graph.vertex_count(), 0);
}

/// Mode-3 segment pair analysis: two segments sharing reads at a known
/// offset reproduce the offset and the common read count.
#[test]
fn segment_pair_offset_estimation() {
    let mut pipeline = two_read_pipeline();
    pipeline.reduce().unwrap();
    pipeline.prune().unwrap();
    pipeline.simplify().unwrap();
    pipeline.build_mode3().unwrap();
    let mode3 = pipeline.mode3.as_ref().unwrap();
    let graph = &pipeline.marker_graph;

    // A segment compared against itself: offset 0, every read common.
    let info = mode3.oriented_read_information(graph, 0);
    assert_eq!(info.infos.len(), 2);
    let (offset, common) = Mode3AssemblyGraph::estimate_offset(&info, &info);
    assert_eq!(common, 2);
    assert_eq!(offset, 0);

    let pair = mode3.analyze_segment_pair(&pipeline.markers, 0, 0, &info, &info);
    assert_eq!(pair.common_count, 2);
    assert_eq!(pair.offset, 0);
    assert_eq!(pair.unexplained_count, [0, 0]);
    assert_eq!(pair.short_count, [0, 0]);

    // The two strands' segments share no oriented reads.
    let info_rc = mode3.oriented_read_information(graph, 1);
    let (_, common) = Mode3AssemblyGraph::estimate_offset(&info, &info_rc);
    assert_eq!(common, 0);
}

/// Distinct oriented reads on a segment, with the average edge coverage
/// of its path.
#[test]
fn oriented_reads_on_segment() {
    let mut pipeline = two_read_pipeline();
    pipeline.build_mode3().unwrap();
    let mode3 = pipeline.mode3.as_ref().unwrap();

    let (reads, average_coverage) =
        mode3.find_oriented_reads_on_segment(&pipeline.marker_graph, 0);
    assert_eq!(reads.len(), 2);
    assert!((average_coverage - 2.0).abs() < 1e-9);
}
