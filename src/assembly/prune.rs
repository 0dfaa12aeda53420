//! Iterative leaf pruning of the strong subgraph.
//!
//! A forward leaf is an edge whose target has no surviving out-edges; a
//! backward leaf is an edge whose source has no surviving in-edges. Each
//! iteration marks every current leaf, then commits all marks at once, so
//! one iteration peels exactly one layer.

use anyhow::Result;
use bit_vec::BitVec;
use tracing::info;

use crate::assembly::marker_graph::MarkerGraph;
use crate::core::ids::VertexId;

pub fn prune_strong_subgraph(graph: &mut MarkerGraph, iteration_count: usize) -> Result<()> {
    let edge_count = graph.edge_count() as usize;

    for edge in graph.edges.as_mut_slice() {
        edge.set_was_pruned(false);
    }

    let mut to_prune = BitVec::from_elem(edge_count, false);
    for iteration in 0..iteration_count {
        // Mark.
        for edge_id in 0..edge_count {
            let edge = &graph.edges[edge_id];
            if edge.was_removed_by_transitive_reduction() || edge.was_pruned() {
                continue;
            }
            if is_forward_leaf(graph, edge.target) || is_backward_leaf(graph, edge.source) {
                to_prune.set(edge_id, true);
            }
        }

        // Commit.
        let mut count = 0u64;
        for edge_id in 0..edge_count {
            if to_prune[edge_id] {
                graph.edges[edge_id].set_was_pruned(true);
                to_prune.set(edge_id, false);
                count += 1;
            }
        }
        info!(iteration, pruned = count, "prune iteration");
    }

    let surviving = graph
        .edges
        .iter()
        .filter(|edge| !edge.was_removed_by_transitive_reduction() && !edge.was_pruned())
        .count();
    info!(
        edge_count,
        surviving, "pruning of the strong subgraph completed"
    );
    Ok(())
}

/// A vertex with no surviving out-edges.
fn is_forward_leaf(graph: &MarkerGraph, vertex_id: VertexId) -> bool {
    !graph.out_edges(vertex_id).any(|edge_id| {
        let edge = &graph.edges[edge_id as usize];
        !edge.was_removed_by_transitive_reduction() && !edge.was_pruned()
    })
}

/// A vertex with no surviving in-edges.
fn is_backward_leaf(graph: &MarkerGraph, vertex_id: VertexId) -> bool {
    !graph.in_edges(vertex_id).any(|edge_id| {
        let edge = &graph.edges[edge_id as usize];
        !edge.was_removed_by_transitive_reduction() && !edge.was_pruned()
    })
}
