//! Approximate transitive reduction and reverse transitive reduction.
//!
//! Edges are bucketed by coverage, keeping only the canonical member of
//! each reverse-complement pair (the one with the lower id), and processed
//! in ascending coverage: weaker edges must fall before stronger ones for
//! the reduction to be deterministic. An edge falls when a bounded BFS
//! finds an alternative path between its endpoints that avoids the edge
//! itself and everything already removed. Whenever an edge is flagged, its
//! reverse complement is flagged with it, which preserves strand symmetry.

use anyhow::{ensure, Result};
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::assembly::marker_graph::MarkerGraph;
use crate::core::ids::{EdgeId, VertexId};
use crate::storage::{LargeData, VectorOfVectors};
use crate::utils::configuration::TransitiveReductionConfig;

/// Forward transitive reduction. Also clears all simplifier flags first,
/// so the simplification stages always start from a clean slate.
pub fn transitive_reduction(
    graph: &mut MarkerGraph,
    config: &TransitiveReductionConfig,
    large_data: &LargeData,
) -> Result<()> {
    info!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "transitive reduction begins"
    );

    for edge in graph.edges.as_mut_slice() {
        edge.clear_simplifier_flags();
    }

    let mut edges_by_coverage = bucket_canonical_edges_by_coverage(
        graph,
        large_data,
        |coverage| (coverage as u64) < config.high_coverage_threshold,
    )?;
    ensure!(
        edges_by_coverage.size_of(0) == 0,
        "marker graph contains edges with coverage 0"
    );

    // Low-coverage cull: everything at or below the threshold goes.
    for coverage in 1..=config.low_coverage_threshold.min(255) {
        let bucket: Vec<EdgeId> = edges_by_coverage.slice(coverage as usize).to_vec();
        if !bucket.is_empty() {
            debug!(
                coverage,
                count = 2 * bucket.len(),
                "flagging low coverage edges"
            );
        }
        for edge_id in bucket {
            flag_edge_pair(graph, edge_id);
        }
    }

    // Coverage-1 edges with an excessive marker skip are unreliable even
    // when the low-coverage threshold is 0.
    let mut skip_culled = 0usize;
    for edge_id in edges_by_coverage.slice(1).to_vec() {
        let intervals = graph.edge_marker_intervals.slice(edge_id as usize);
        if intervals.len() != 1 {
            continue;
        }
        let interval = intervals[0];
        let skip = interval.ordinals[1] - interval.ordinals[0];
        if skip > config.edge_marker_skip_threshold
            && !graph.edges[edge_id as usize].was_removed_by_transitive_reduction()
        {
            flag_edge_pair(graph, edge_id);
            skip_culled += 2;
        }
    }
    info!(
        count = skip_culled,
        threshold = config.edge_marker_skip_threshold,
        "flagged coverage-1 edges with excessive marker skip"
    );

    // Intermediate coverages, ascending, with a bounded BFS per edge.
    let mut bfs = BfsWorkArea::new(graph.vertex_count());
    for coverage in config.low_coverage_threshold + 1..config.high_coverage_threshold {
        if coverage > 255 {
            break;
        }
        let bucket: Vec<EdgeId> = edges_by_coverage.slice(coverage as usize).to_vec();
        if bucket.is_empty() {
            continue;
        }
        let mut count = 0usize;
        for edge_id in bucket.iter().copied() {
            let edge = &graph.edges[edge_id as usize];
            if edge.was_removed_by_transitive_reduction() {
                continue;
            }
            let (u0, u1) = (edge.source, edge.target);
            if bfs.path_exists(graph, u0, u1, edge_id, config.max_distance) {
                flag_edge_pair(graph, edge_id);
                count += 2;
            }
        }
        if count > 0 {
            debug!(coverage, count, total = 2 * bucket.len(), "flagged edges");
        }
    }

    edges_by_coverage.remove()?;

    let removed = graph
        .edges
        .iter()
        .filter(|edge| edge.was_removed_by_transitive_reduction())
        .count() as u64;
    info!(
        removed,
        surviving = graph.edge_count() - removed,
        "transitive reduction completed"
    );
    Ok(())
}

/// Reverse transitive reduction: removes local back-edges. Identical
/// machinery, but the BFS starts at the edge's target looking for its
/// source, and only coverages strictly inside the configured range are
/// processed.
pub fn reverse_transitive_reduction(
    graph: &mut MarkerGraph,
    config: &TransitiveReductionConfig,
    large_data: &LargeData,
) -> Result<()> {
    info!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "reverse transitive reduction begins"
    );

    let mut edges_by_coverage = bucket_canonical_edges_by_coverage(graph, large_data, |coverage| {
        (coverage as u64) > config.low_coverage_threshold
            && (coverage as u64) < config.high_coverage_threshold
    })?;

    let mut bfs = BfsWorkArea::new(graph.vertex_count());
    let mut removed = 0usize;
    for coverage in config.low_coverage_threshold + 1..config.high_coverage_threshold {
        if coverage > 255 {
            break;
        }
        let bucket: Vec<EdgeId> = edges_by_coverage.slice(coverage as usize).to_vec();
        if bucket.is_empty() {
            continue;
        }
        let mut count = 0usize;
        for edge_id in bucket.iter().copied() {
            let edge = &graph.edges[edge_id as usize];
            if edge.was_removed_by_transitive_reduction() {
                continue;
            }
            // Walk forward from the target looking for the source.
            let (u0, u1) = (edge.target, edge.source);
            if bfs.path_exists(graph, u0, u1, edge_id, config.max_distance) {
                flag_edge_pair(graph, edge_id);
                count += 2;
            }
        }
        if count > 0 {
            debug!(coverage, count, total = 2 * bucket.len(), "flagged back-edges");
        }
        removed += count;
    }

    edges_by_coverage.remove()?;
    info!(removed, "reverse transitive reduction completed");
    Ok(())
}

fn flag_edge_pair(graph: &mut MarkerGraph, edge_id: EdgeId) {
    let rc = graph.rc_edge(edge_id);
    graph.edges[edge_id as usize].set_was_removed_by_transitive_reduction(true);
    graph.edges[rc as usize].set_was_removed_by_transitive_reduction(true);
}

/// Bucket edges by coverage, keeping only edges whose id is lower than
/// their reverse complement's (canonical pair representative) and whose
/// coverage satisfies `accept`.
fn bucket_canonical_edges_by_coverage(
    graph: &MarkerGraph,
    large_data: &LargeData,
    accept: impl Fn(u8) -> bool,
) -> Result<VectorOfVectors<EdgeId>> {
    let mut edges_by_coverage: VectorOfVectors<EdgeId> = VectorOfVectors::create_new(
        large_data.name("tmp-TransitiveReduction-EdgesByCoverage"),
        large_data.page_size,
    )?;
    edges_by_coverage.begin_pass1(256)?;
    for edge_id in 0..graph.edge_count() {
        if graph.rc_edge(edge_id) < edge_id {
            continue;
        }
        let coverage = graph.edges[edge_id as usize].coverage;
        if accept(coverage) {
            edges_by_coverage.increment_count(coverage as usize);
        }
    }
    edges_by_coverage.begin_pass2()?;
    for edge_id in 0..graph.edge_count() {
        if graph.rc_edge(edge_id) < edge_id {
            continue;
        }
        let coverage = graph.edges[edge_id as usize].coverage;
        if accept(coverage) {
            edges_by_coverage.store(coverage as usize, edge_id);
        }
    }
    edges_by_coverage.end_pass2()?;
    Ok(edges_by_coverage)
}

/// Reusable state for the bounded BFS: a distance per vertex (-1 when
/// unvisited), reset after each search by replaying the visited stack.
struct BfsWorkArea {
    distances: Vec<i32>,
    queue: VecDeque<VertexId>,
    visited: Vec<VertexId>,
}

impl BfsWorkArea {
    fn new(vertex_count: u64) -> Self {
        BfsWorkArea {
            distances: vec![-1; vertex_count as usize],
            queue: VecDeque::new(),
            visited: Vec::new(),
        }
    }

    /// Is `u1` reachable from `u0` within `max_distance` hops, without
    /// using `forbidden_edge` or any removed edge?
    fn path_exists(
        &mut self,
        graph: &MarkerGraph,
        u0: VertexId,
        u1: VertexId,
        forbidden_edge: EdgeId,
        max_distance: u32,
    ) -> bool {
        self.queue.push_back(u0);
        self.distances[u0 as usize] = 0;
        self.visited.push(u0);

        let mut found = false;
        'bfs: while let Some(v0) = self.queue.pop_front() {
            let distance1 = self.distances[v0 as usize] + 1;
            for edge_id in graph.out_edges(v0) {
                if edge_id == forbidden_edge {
                    continue;
                }
                let edge = &graph.edges[edge_id as usize];
                if edge.was_removed_by_transitive_reduction() {
                    continue;
                }
                let v1 = edge.target;
                if self.distances[v1 as usize] >= 0 {
                    continue;
                }
                if v1 == u1 {
                    found = true;
                    break 'bfs;
                }
                self.distances[v1 as usize] = distance1;
                self.visited.push(v1);
                if distance1 < max_distance as i32 {
                    self.queue.push_back(v1);
                }
            }
        }

        self.queue.clear();
        for &v in &self.visited {
            self.distances[v as usize] = -1;
        }
        self.visited.clear();
        found
    }
}
