//! Strand symmetry enforcement.
//!
//! The marker graph must be invariant under reverse complement: every
//! vertex and edge has a counterpart obtained by reverse-complementing
//! its markers or intervals, and the mapping is an involution. The
//! mappings are established once after construction and re-verified
//! between simplification stages; any lookup failure is a structural
//! error, diagnosed with a CSV dump before aborting.

use anyhow::{anyhow, ensure, Result};
use std::path::Path;
use tracing::info;

use crate::assembly::marker_graph::MarkerGraph;
use crate::core::ids::{EdgeId, MarkerInterval, VertexId};
use crate::core::MarkerTable;
use crate::diagnostics;
use crate::utils::load_balancer::LoadBalancer;
use crate::utils::WorkerPool;

const BATCH_SIZE: u64 = 10_000;

/// Establish `reverse_complement_vertex` and verify it is an involution.
pub fn find_reverse_complement_vertices(
    graph: &mut MarkerGraph,
    markers: &MarkerTable,
    pool: &WorkerPool,
) -> Result<()> {
    info!("finding reverse complement vertices");
    let vertex_count = graph.vertex_count();
    graph
        .reverse_complement_vertex
        .resize(vertex_count as usize)?;

    {
        let rc_vertex = &graph.reverse_complement_vertex;
        let balancer = LoadBalancer::new(vertex_count, BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for vertex_id in begin..end {
                    let rc = reverse_complement_of_vertex(graph, markers, vertex_id)?;
                    // Distinct vertex ids per batch, no aliasing.
                    unsafe { rc_vertex.write_shared(vertex_id as usize, rc) };
                }
            }
            Ok(())
        })?;
    }

    // Involution check.
    let balancer = LoadBalancer::new(vertex_count, BATCH_SIZE);
    pool.run(|_| {
        while let Some((begin, end)) = balancer.next_batch() {
            for vertex_id in begin..end {
                let rc = graph.rc_vertex(vertex_id);
                ensure!(
                    graph.rc_vertex(rc) == vertex_id,
                    "reverse complement of vertices is not an involution at {vertex_id}"
                );
            }
        }
        Ok(())
    })
}

fn reverse_complement_of_vertex(
    graph: &MarkerGraph,
    markers: &MarkerTable,
    vertex_id: VertexId,
) -> Result<VertexId> {
    let vertex_markers = graph.vertex_markers(vertex_id);
    ensure!(!vertex_markers.is_empty());

    let first_rc = markers.reverse_complement(vertex_markers[0]);
    let rc_vertex_id = graph
        .vertex_of_marker(first_rc)
        .ok_or_else(|| anyhow!("vertex {vertex_id}: reverse complement marker is unassigned"))?;

    // Every marker must reverse-complement into the same vertex.
    for &marker_id in vertex_markers {
        let rc_marker = markers.reverse_complement(marker_id);
        ensure!(
            graph.vertex_of_marker(rc_marker) == Some(rc_vertex_id),
            "vertex {vertex_id}: markers reverse-complement into different vertices"
        );
    }
    Ok(rc_vertex_id)
}

/// Establish `reverse_complement_edge` and verify it is an involution.
/// On lookup failure, dump the marker graph to `csv_dir` and abort.
pub fn find_reverse_complement_edges(
    graph: &mut MarkerGraph,
    markers: &MarkerTable,
    pool: &WorkerPool,
    csv_dir: Option<&Path>,
) -> Result<()> {
    info!("finding reverse complement edges");
    let edge_count = graph.edge_count();
    graph.reverse_complement_edge.resize(edge_count as usize)?;

    let result = {
        let rc_edge = &graph.reverse_complement_edge;
        let balancer = LoadBalancer::new(edge_count, BATCH_SIZE);
        pool.run(|_| {
            while let Some((begin, end)) = balancer.next_batch() {
                for edge_id in begin..end {
                    let rc = reverse_complement_of_edge(graph, markers, edge_id)?;
                    unsafe { rc_edge.write_shared(edge_id as usize, rc) };
                }
            }
            Ok(())
        })
    };
    if let Err(error) = result {
        if let Some(dir) = csv_dir {
            diagnostics::dump_marker_graph(graph, markers, dir)?;
        }
        return Err(error);
    }

    // Involution check; edges are never their own reverse complement.
    let balancer = LoadBalancer::new(edge_count, BATCH_SIZE);
    pool.run(|_| {
        while let Some((begin, end)) = balancer.next_batch() {
            for edge_id in begin..end {
                let rc = graph.rc_edge(edge_id);
                ensure!(
                    graph.rc_edge(rc) == edge_id,
                    "reverse complement of edges is not an involution at {edge_id}"
                );
                ensure!(
                    rc != edge_id,
                    "edge {edge_id} is its own reverse complement"
                );
            }
        }
        Ok(())
    })
}

/// Locate the reverse complement of an edge by scanning the out-edges of
/// the reverse complement of its target for one whose interval list,
/// reverse complemented and re-sorted, matches exactly. The scan is
/// resilient to parallel edges and to duplicate-marker vertices.
fn reverse_complement_of_edge(
    graph: &MarkerGraph,
    markers: &MarkerTable,
    edge_id: EdgeId,
) -> Result<EdgeId> {
    let edge = &graph.edges[edge_id as usize];
    let v0_rc = graph.rc_vertex(edge.source);
    let v1_rc = graph.rc_vertex(edge.target);
    let intervals = graph.edge_marker_intervals.slice(edge_id as usize);

    let mut resorted: Vec<MarkerInterval> = Vec::with_capacity(intervals.len());
    for candidate_id in graph.out_edges(v1_rc) {
        let candidate = &graph.edges[candidate_id as usize];
        debug_assert_eq!(candidate.source, v1_rc);
        if candidate.target != v0_rc {
            continue;
        }

        resorted.clear();
        for interval in graph.edge_marker_intervals.slice(candidate_id as usize) {
            let marker_count = markers.count_of(interval.oriented_read_id);
            resorted.push(interval.reverse_complement(marker_count));
        }
        resorted.sort_unstable();

        if resorted.as_slice() == intervals {
            return Ok(candidate_id);
        }
    }
    Err(anyhow!(
        "unable to locate the reverse complement of marker graph edge {edge_id} {} -> {}",
        edge.source,
        edge.target
    ))
}

/// Full strand-symmetry verification, run between simplification stages.
/// Checks both mappings for involution, marker-set correspondence on
/// vertices, and coverage/flag equality on reverse complement edge pairs.
pub fn check_strand_symmetry(
    graph: &MarkerGraph,
    markers: &MarkerTable,
    pool: &WorkerPool,
) -> Result<()> {
    let vertex_count = graph.vertex_count();
    let balancer = LoadBalancer::new(vertex_count, BATCH_SIZE);
    pool.run(|_| {
        while let Some((begin, end)) = balancer.next_batch() {
            for v0 in begin..end {
                let v1 = graph.rc_vertex(v0);
                ensure!(graph.rc_vertex(v1) == v0);

                let markers0 = graph.vertex_markers(v0);
                let markers1 = graph.vertex_markers(v1);
                ensure!(
                    markers0.len() == markers1.len(),
                    "vertices {v0} and {v1} are reverse complements with different coverage"
                );
                for &marker_id in markers0 {
                    let rc_marker = markers.reverse_complement(marker_id);
                    ensure!(graph.vertex_of_marker(marker_id) == Some(v0));
                    ensure!(graph.vertex_of_marker(rc_marker) == Some(v1));
                }
            }
        }
        Ok(())
    })?;

    let edge_count = graph.edge_count();
    let balancer = LoadBalancer::new(edge_count, BATCH_SIZE);
    pool.run(|_| {
        while let Some((begin, end)) = balancer.next_batch() {
            for e0 in begin..end {
                let e1 = graph.rc_edge(e0);
                let e2 = graph.rc_edge(e1);
                ensure!(e2 == e0);
                ensure!(e1 != e0);

                let edge0 = &graph.edges[e0 as usize];
                let edge1 = &graph.edges[e1 as usize];
                ensure!(edge0.coverage == edge1.coverage);
                ensure!(
                    edge0.was_removed_by_transitive_reduction()
                        == edge1.was_removed_by_transitive_reduction()
                );
                ensure!(edge0.was_pruned() == edge1.was_pruned());
                ensure!(edge0.is_super_bubble_edge() == edge1.is_super_bubble_edge());
            }
        }
        Ok(())
    })
}
