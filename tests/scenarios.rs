//! End-to-end scenarios: vertex and edge construction from aligned reads,
//! transitive reduction, bubble and superbubble removal, and Mode-3
//! segment/transition/link construction.

mod common;

use common::{marker_table, read_graph, test_config, GraphBuilder, TestAlignment};
use marker_forge::assembly::{simplify, transitive_reduction};
use marker_forge::core::ids::MarkerInterval;
use marker_forge::core::OrientedReadId;
use marker_forge::mode3::Mode3AssemblyGraph;
use marker_forge::storage::LargeData;
use marker_forge::utils::WorkerPool;
use marker_forge::AssemblyPipeline;

/// Two reads, reverse complements of each other, perfectly aligned on all
/// five markers. Each k-mer becomes a vertex of coverage 2 with one
/// marker per strand; the chain yields four edges per strand and one
/// Mode-3 segment per strand.
#[test]
fn two_aligned_reads_build_a_chain() {
    let markers = marker_table(&[
        vec![0, 1, 2, 3, 4],
        // Read 1 is the reverse complement of read 0, so its forward
        // strand carries the complements in reverse order.
        vec![1004, 1003, 1002, 1001, 1000],
    ]);
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

    let graph = &pipeline.marker_graph;
    let markers = &pipeline.markers;

    // Both strands together: 5 vertices and 4 edges per strand.
    assert_eq!(graph.vertex_count(), 10);
    assert_eq!(graph.edge_count(), 8);

    // Forward-strand vertices, one per k-mer, coverage 2, one marker per
    // strand of the input.
    let forward = OrientedReadId::new(0, 0);
    let mate = OrientedReadId::new(1, 1);
    let mut chain = Vec::new();
    for ordinal in 0..5 {
        let vertex_id = graph
            .vertex_of_marker(markers.marker_id(forward, ordinal))
            .expect("every aligned marker gets a vertex");
        let vertex_markers = graph.vertex_markers(vertex_id);
        assert_eq!(vertex_markers.len(), 2);
        assert!(vertex_markers.contains(&markers.marker_id(mate, ordinal)));
        chain.push(vertex_id);
    }

    // The chain edges connect consecutive vertices with coverage 2.
    for window in chain.windows(2) {
        let edges: Vec<u64> = graph.out_edges(window[0]).collect();
        assert_eq!(edges.len(), 1);
        let edge = &graph.edges[edges[0] as usize];
        assert_eq!(edge.target, window[1]);
        assert_eq!(edge.coverage, 2);
        assert_eq!(graph.edge_marker_intervals.size_of(edges[0] as usize), 2);
    }

    // Mode 3: one segment per strand, each holding the four chain edges;
    // no transitions, so no links.
    pipeline.reduce().unwrap();
    pipeline.prune().unwrap();
    pipeline.simplify().unwrap();
    pipeline.build_mode3().unwrap();
    let mode3 = pipeline.mode3.as_ref().unwrap();
    assert_eq!(mode3.segment_count(), 2);
    assert_eq!(mode3.path(0).len(), 4);
    assert_eq!(mode3.path(1).len(), 4);
    assert_eq!(mode3.links.len(), 0);

    // GFA carries the two segments and no links.
    let dir = tempfile::tempdir().unwrap();
    let gfa_path = dir.path().join("assembly.gfa");
    pipeline.write_gfa(&gfa_path).unwrap();
    let gfa = std::fs::read_to_string(&gfa_path).unwrap();
    let lines: Vec<&str> = gfa.lines().collect();
    assert_eq!(lines[0], "H\tVN:Z:1.0");
    assert_eq!(lines.iter().filter(|l| l.starts_with("S\t")).count(), 2);
    assert_eq!(lines.iter().filter(|l| l.starts_with("L\t")).count(), 0);
    assert!(lines.contains(&"S\t0\t*\tLN:i:4"));
}

/// Three reads: two share the suffix [X, Y, Z], the third shares only
/// [X, Y]. Z survives at coverage 2; the third read's continuation after
/// Y creates no edge because its next marker has no vertex.
#[test]
fn partial_suffix_sharing() {
    // X=0, Y=1, Z=2, P=5, Q=6, W=7.
    let markers = marker_table(&[vec![5, 6, 0, 1, 2], vec![0, 1, 2], vec![0, 1, 7]]);
    let reads = read_graph(
        &markers,
        &[
            TestAlignment {
                oriented_read_ids: [OrientedReadId::new(0, 0), OrientedReadId::new(1, 0)],
                ordinals: vec![[2, 0], [3, 1], [4, 2]],
            },
            TestAlignment {
                oriented_read_ids: [OrientedReadId::new(0, 0), OrientedReadId::new(2, 0)],
                ordinals: vec![[2, 0], [3, 1]],
            },
            TestAlignment {
                oriented_read_ids: [OrientedReadId::new(1, 0), OrientedReadId::new(2, 0)],
                ordinals: vec![[0, 0], [1, 1]],
            },
        ],
    );

    let mut config = test_config();
    config.marker_graph.min_coverage = 2;
    config.marker_graph.max_coverage = 10;

    let mut pipeline = AssemblyPipeline::new(config, markers, reads, None).unwrap();
    pipeline.create_vertices().unwrap();
    pipeline.create_edges().unwrap();

    let graph = &pipeline.marker_graph;
    let markers = &pipeline.markers;
    let r0 = OrientedReadId::new(0, 0);
    let r2 = OrientedReadId::new(2, 0);

    let x = graph.vertex_of_marker(markers.marker_id(r0, 2)).unwrap();
    let y = graph.vertex_of_marker(markers.marker_id(r0, 3)).unwrap();
    let z = graph.vertex_of_marker(markers.marker_id(r0, 4)).unwrap();
    assert_eq!(graph.vertex_markers(x).len(), 3);
    assert_eq!(graph.vertex_markers(y).len(), 3);
    assert_eq!(graph.vertex_markers(z).len(), 2);

    // P, Q and W fall below min_coverage.
    assert_eq!(graph.vertex_of_marker(markers.marker_id(r0, 0)), None);
    assert_eq!(graph.vertex_of_marker(markers.marker_id(r0, 1)), None);
    assert_eq!(graph.vertex_of_marker(markers.marker_id(r2, 2)), None);

    // Y has exactly one out-edge, Y -> Z, with coverage 2: the third
    // read contributes no edge out of Y.
    let out: Vec<u64> = graph.out_edges(y).collect();
    assert_eq!(out.len(), 1);
    let edge = &graph.edges[out[0] as usize];
    assert_eq!(edge.target, z);
    assert_eq!(edge.coverage, 2);
}

/// A -> C (coverage 3) is transitively implied by A -> B -> C
/// (coverage 10) and gets removed; the path edges survive.
#[test]
fn transitive_reduction_removes_the_shortcut() {
    let mut graph = common::mirrored_graph(3, &[(0, 1, 10), (1, 2, 10), (0, 2, 3)]);
    let mut config = test_config().transitive_reduction;
    config.low_coverage_threshold = 1;
    config.high_coverage_threshold = 100;
    config.max_distance = 3;

    transitive_reduction::transitive_reduction(&mut graph, &config, &LargeData::anonymous())
        .unwrap();

    // Shortcut and its reverse complement are flagged.
    assert!(graph.edges[2].was_removed_by_transitive_reduction());
    assert!(graph.edges[5].was_removed_by_transitive_reduction());
    for edge_id in [0, 1, 3, 4] {
        assert!(!graph.edges[edge_id].was_removed_by_transitive_reduction());
    }

    // Idempotence: reducing an already-reduced graph with the same
    // parameters changes nothing.
    let flags_before: Vec<bool> = graph
        .edges
        .iter()
        .map(|e| e.was_removed_by_transitive_reduction())
        .collect();
    transitive_reduction::transitive_reduction(&mut graph, &config, &LargeData::anonymous())
        .unwrap();
    let flags_after: Vec<bool> = graph
        .edges
        .iter()
        .map(|e| e.was_removed_by_transitive_reduction())
        .collect();
    assert_eq!(flags_before, flags_after);
}

/// Two parallel edges v -> w: the lower-coverage one is flagged as a
/// bubble edge, the higher one survives.
#[test]
fn bubble_removal_keeps_the_strongest_edge() {
    let mut graph = common::mirrored_graph(2, &[(0, 1, 5), (0, 1, 20)]);
    let pool = WorkerPool::new(2).unwrap();
    simplify::simplify_marker_graph(&mut graph, &common::empty_markers(), &[10], &pool).unwrap();

    assert!(graph.edges[0].is_super_bubble_edge());
    assert!(graph.edges[2].is_super_bubble_edge()); // reverse complement
    assert!(!graph.edges[1].is_super_bubble_edge());
    assert!(!graph.edges[3].is_super_bubble_edge());
}

/// A braided superbubble between s and t with a long entry and exit:
/// only the edges on the highest-coverage path from entry to exit
/// survive part 2.
#[test]
fn superbubble_removal_retains_the_shortest_path() {
    // x=0, i1=1, i2=2, s=3, a=4, b=5, t=6, j1=7, j2=8, y=9.
    let forward_edges = [
        (0, 1, 10),
        (1, 2, 10),
        (2, 3, 10), // long entry chain x => s
        (3, 4, 10), // s -> a
        (4, 6, 10), // a -> t
        (3, 5, 4),  // s -> b
        (5, 6, 4),  // b -> t
        (4, 5, 2),  // a -> b braid edge
        (6, 7, 10),
        (7, 8, 10),
        (8, 9, 10), // long exit chain t => y
    ];
    let mut graph = common::mirrored_graph(10, &forward_edges);
    let pool = WorkerPool::new(2).unwrap();
    simplify::simplify_marker_graph(&mut graph, &common::empty_markers(), &[2], &pool).unwrap();

    let rc = forward_edges.len();
    // The weak side of the bubble and the braid edge go.
    for edge_id in [5, 6, 7] {
        assert!(graph.edges[edge_id].is_super_bubble_edge(), "edge {edge_id}");
        assert!(graph.edges[edge_id + rc].is_super_bubble_edge());
    }
    // The strong path and both long chains survive.
    for edge_id in [0, 1, 2, 3, 4, 8, 9, 10] {
        assert!(!graph.edges[edge_id].is_super_bubble_edge(), "edge {edge_id}");
        assert!(!graph.edges[edge_id + rc].is_super_bubble_edge());
    }
}

/// One oriented read traverses segments [S0, S0, S1, S2, S2]; the
/// transitions are (S0, S1) and (S1, S2) with coverage 1, below the
/// default link coverage of 2, so no links appear.
#[test]
fn mode3_transitions_and_links() {
    let markers = marker_table(&[vec![0, 1, 2, 3, 4, 5]]);
    let read = OrientedReadId::new(0, 0);

    let mut builder = GraphBuilder::new(8);
    // Chain v0 -> v1 -> v2 (segment 0), with branches at v2 and v3
    // splitting the remaining path into segments.
    builder.add_edge_with_intervals(0, 1, &[MarkerInterval::new(read, 0, 1)]);
    builder.add_edge_with_intervals(1, 2, &[MarkerInterval::new(read, 1, 2)]);
    builder.add_edge_with_intervals(2, 3, &[MarkerInterval::new(read, 2, 3)]); // segment 1
    builder.add_edge_with_intervals(3, 4, &[MarkerInterval::new(read, 3, 4)]); // segment 2
    builder.add_edge_with_intervals(4, 7, &[MarkerInterval::new(read, 4, 5)]);
    builder.add_edge_with_intervals(2, 5, &[]); // branch, its own segment
    builder.add_edge_with_intervals(6, 3, &[]); // branch into v3
    let graph = builder.finish();

    let pool = WorkerPool::new(2).unwrap();
    let mode3 =
        Mode3AssemblyGraph::create(&graph, &markers, 2, &LargeData::anonymous(), &pool).unwrap();
    assert_eq!(mode3.segment_count(), 5);
    assert_eq!(mode3.path(0).len(), 2); // v0 -> v1 -> v2
    assert_eq!(mode3.path(1).len(), 1); // v2 -> v3
    assert_eq!(mode3.path(2).len(), 2); // v3 -> v4 -> v7
    // With min coverage 2 and a single read, no links.
    assert_eq!(mode3.links.len(), 0);

    // With min coverage 1 the two transitions become links.
    let mode3 =
        Mode3AssemblyGraph::create(&graph, &markers, 1, &LargeData::anonymous(), &pool).unwrap();
    assert_eq!(mode3.links.len(), 2);
    let link0 = mode3.links[0];
    assert_eq!((link0.segment_id0, link0.segment_id1), (0, 1));
    assert_eq!(link0.coverage, 1);
    let link1 = mode3.links[1];
    assert_eq!((link1.segment_id0, link1.segment_id1), (1, 2));

    // Supporting transitions carry the generating read and entries.
    let transitions = mode3.transitions.slice(0);
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].oriented_read_id, read);
    assert_eq!(transitions[0].entries[0].segment_id, 0);
    assert_eq!(transitions[0].entries[1].segment_id, 1);

    // Connectivity indexes the links by segment.
    assert_eq!(mode3.links_by_source.slice(0), &[0]);
    assert_eq!(mode3.links_by_source.slice(1), &[1]);
    assert_eq!(mode3.links_by_target.slice(1), &[0]);
    assert_eq!(mode3.links_by_target.slice(2), &[1]);
}

/// A circular chain is detected and becomes one segment holding every
/// edge of the cycle.
#[test]
fn circular_chain_becomes_one_segment() {
    let mut builder = GraphBuilder::new(3);
    builder.add_edge_with_intervals(0, 1, &[]);
    builder.add_edge_with_intervals(1, 2, &[]);
    builder.add_edge_with_intervals(2, 0, &[]);
    let graph = builder.finish();

    let pool = WorkerPool::new(2).unwrap();
    let mode3 = Mode3AssemblyGraph::create(
        &graph,
        &common::empty_markers(),
        2,
        &LargeData::anonymous(),
        &pool,
    )
    .unwrap();
    assert_eq!(mode3.segment_count(), 1);
    assert_eq!(mode3.path(0).len(), 3);
}
