//! Marker graph edge construction.
//!
//! For each vertex and each of its markers, the next vertex-bearing
//! ordinal on the same oriented read yields a tentative (child vertex,
//! marker interval) pair; grouping the pairs by child produces one edge
//! per distinct child, carrying its interval list. Workers accumulate
//! edges per batch and the batches are merged in index order, so edge ids
//! are a deterministic function of the input regardless of scheduling.

use anyhow::{ensure, Result};
use std::sync::Mutex;
use tracing::info;

use crate::assembly::marker_graph::{MarkerGraph, MarkerGraphEdge};
use crate::core::ids::{MarkerInterval, Uint40, VertexId};
use crate::core::MarkerTable;
use crate::utils::load_balancer::LoadBalancer;
use crate::utils::WorkerPool;

const VERTEX_BATCH_SIZE: u64 = 100;
const EDGE_BATCH_SIZE: u64 = 100_000;

struct EdgeChunk {
    batch_begin: u64,
    edges: Vec<MarkerGraphEdge>,
    intervals: Vec<Vec<MarkerInterval>>,
}

/// Build all edges of the marker graph, their marker interval lists, and
/// the adjacency lists.
pub fn create_marker_graph_edges(
    graph: &mut MarkerGraph,
    markers: &MarkerTable,
    pool: &WorkerPool,
) -> Result<()> {
    let vertex_count = graph.vertex_count();
    info!(vertex_count, "creating marker graph edges");

    let chunks: Mutex<Vec<EdgeChunk>> = Mutex::new(Vec::new());
    let balancer = LoadBalancer::new(vertex_count, VERTEX_BATCH_SIZE);
    pool.run(|_| {
        // Reused across batches to limit allocation churn.
        let mut work_area: Vec<(VertexId, MarkerInterval)> = Vec::new();
        while let Some((begin, end)) = balancer.next_batch() {
            let mut chunk = EdgeChunk {
                batch_begin: begin,
                edges: Vec::new(),
                intervals: Vec::new(),
            };
            for vertex0 in begin..end {
                find_children(graph, markers, vertex0, &mut work_area);

                // One edge per streak of entries with the same child.
                let mut streak_begin = 0;
                while streak_begin < work_area.len() {
                    let vertex1 = work_area[streak_begin].0;
                    let mut streak_end = streak_begin + 1;
                    while streak_end < work_area.len() && work_area[streak_end].0 == vertex1 {
                        streak_end += 1;
                    }
                    let intervals: Vec<MarkerInterval> = work_area[streak_begin..streak_end]
                        .iter()
                        .map(|&(_, interval)| interval)
                        .collect();
                    chunk
                        .edges
                        .push(MarkerGraphEdge::new(vertex0, vertex1, intervals.len()));
                    chunk.intervals.push(intervals);
                    streak_begin = streak_end;
                }
            }
            chunks.lock().unwrap().push(chunk);
        }
        Ok(())
    })?;

    // Merge in batch order; edge ids become independent of scheduling.
    let mut chunks = chunks.into_inner().unwrap();
    chunks.sort_unstable_by_key(|chunk| chunk.batch_begin);
    for chunk in chunks {
        ensure!(chunk.edges.len() == chunk.intervals.len());
        for (edge, intervals) in chunk.edges.iter().zip(&chunk.intervals) {
            graph.edges.push(*edge)?;
            graph.edge_marker_intervals.append_vector(intervals)?;
        }
    }
    graph.edges.unreserve()?;
    graph.edge_marker_intervals.unreserve()?;
    ensure!(graph.edges.len() == graph.edge_marker_intervals.len());
    info!(
        edge_count = graph.edge_count(),
        "marker graph edge construction completed"
    );

    create_edges_by_source_and_target(graph, pool)
}

/// Find the children of `vertex0` with the marker intervals that support
/// each child, sorted by (child, interval).
fn find_children(
    graph: &MarkerGraph,
    markers: &MarkerTable,
    vertex0: VertexId,
    work_area: &mut Vec<(VertexId, MarkerInterval)>,
) {
    work_area.clear();
    for &marker_id in graph.vertex_markers(vertex0) {
        let (oriented_read_id, ordinal0) = markers.find_marker_id(marker_id);
        let marker_count = markers.count_of(oriented_read_id);

        // First subsequent ordinal on this read that carries a vertex.
        for ordinal1 in ordinal0 + 1..marker_count {
            let child_marker_id = markers.marker_id(oriented_read_id, ordinal1);
            if let Some(vertex1) = graph.vertex_of_marker(child_marker_id) {
                work_area.push((
                    vertex1,
                    MarkerInterval::new(oriented_read_id, ordinal0, ordinal1),
                ));
                break;
            }
        }
    }
    work_area.sort_unstable();
}

/// Build `edges_by_source` and `edges_by_target` with the two-pass
/// protocol, storing 40-bit edge ids.
fn create_edges_by_source_and_target(graph: &mut MarkerGraph, pool: &WorkerPool) -> Result<()> {
    let vertex_count = graph.vertex_count() as usize;
    let edge_count = graph.edge_count();

    graph.edges_by_source.begin_pass1(vertex_count)?;
    graph.edges_by_target.begin_pass1(vertex_count)?;
    {
        let edges = graph.edges.as_slice();
        let by_source = &graph.edges_by_source;
        let by_target = &graph.edges_by_target;
        let balancer = LoadBalancer::new(edge_count, EDGE_BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for i in begin..end {
                    let edge = &edges[i as usize];
                    by_source.increment_count_multithreaded(edge.source as usize);
                    by_target.increment_count_multithreaded(edge.target as usize);
                }
            }
            Ok(())
        })?;
    }
    graph.edges_by_source.begin_pass2()?;
    graph.edges_by_target.begin_pass2()?;
    {
        let edges = graph.edges.as_slice();
        let by_source = &graph.edges_by_source;
        let by_target = &graph.edges_by_target;
        let balancer = LoadBalancer::new(edge_count, EDGE_BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for i in begin..end {
                    let edge = &edges[i as usize];
                    by_source.store_multithreaded(edge.source as usize, Uint40::new(i));
                    by_target.store_multithreaded(edge.target as usize, Uint40::new(i));
                }
            }
            Ok(())
        })?;
    }
    graph.edges_by_source.end_pass2()?;
    graph.edges_by_target.end_pass2()?;
    Ok(())
}
