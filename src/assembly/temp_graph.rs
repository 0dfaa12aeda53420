//! Temporary assembly graph used by bubble and superbubble removal.
//!
//! A chain-compressed view of the current strong subgraph: vertices are
//! marker graph vertices that are not interior to a non-branching chain,
//! and each edge is a maximal chain of surviving marker graph edges,
//! carrying the chain's edge list, its average coverage, and its reverse
//! complement. The graph is rebuilt from scratch for every simplifier
//! iteration and dropped afterwards.

use ahash::AHashMap;
use anyhow::{anyhow, ensure, Result};
use bit_vec::BitVec;

use crate::assembly::marker_graph::MarkerGraph;
use crate::core::ids::{EdgeId, VertexId};

pub struct TempAssemblyGraph {
    /// Marker graph vertex behind each assembly graph vertex.
    pub vertices: Vec<VertexId>,
    pub edges: Vec<TempEdge>,
    /// Marker graph edges of each chain, in path order; parallel to
    /// `edges`.
    pub edge_lists: Vec<Vec<EdgeId>>,
    pub reverse_complement_vertex: Vec<usize>,
    pub reverse_complement_edge: Vec<usize>,
    pub edges_by_source: Vec<Vec<usize>>,
    pub edges_by_target: Vec<Vec<usize>>,
}

#[derive(Clone, Debug)]
pub struct TempEdge {
    pub source: usize,
    pub target: usize,
    /// Mean of the member edges' interval-list lengths. Computed from the
    /// uncapped counts, not the 8-bit coverage field.
    pub average_edge_coverage: u64,
}

impl TempAssemblyGraph {
    pub fn build(graph: &MarkerGraph) -> Result<Self> {
        let edge_count = graph.edge_count() as usize;
        let mut was_found = BitVec::from_elem(edge_count, false);

        let mut vertices: Vec<VertexId> = Vec::new();
        let mut vertex_index: AHashMap<VertexId, usize> = AHashMap::new();
        let mut edges: Vec<TempEdge> = Vec::new();
        let mut edge_lists: Vec<Vec<EdgeId>> = Vec::new();
        // Chain index of every surviving marker graph edge, for the
        // reverse complement lookup below.
        let mut chain_of_edge: AHashMap<EdgeId, usize> = AHashMap::new();

        // Discover one maximal chain per unvisited surviving edge.
        for start_edge_id in 0..edge_count as u64 {
            if was_found[start_edge_id as usize]
                || graph.edges[start_edge_id as usize].was_removed()
            {
                continue;
            }
            let chain = extract_chain(graph, start_edge_id);
            for &edge_id in &chain {
                was_found.set(edge_id as usize, true);
            }

            let source_vertex = graph.edges[chain[0] as usize].source;
            let target_vertex = graph.edges[*chain.last().unwrap() as usize].target;
            let source = intern(&mut vertices, &mut vertex_index, source_vertex);
            let target = intern(&mut vertices, &mut vertex_index, target_vertex);

            let coverage_sum: u64 = chain
                .iter()
                .map(|&e| graph.edge_marker_intervals.size_of(e as usize) as u64)
                .sum();
            let chain_index = edges.len();
            edges.push(TempEdge {
                source,
                target,
                average_edge_coverage: coverage_sum / chain.len() as u64,
            });
            for &edge_id in &chain {
                chain_of_edge.insert(edge_id, chain_index);
            }
            edge_lists.push(chain);
        }

        // Reverse complement of a chain: the chain containing the reverse
        // complement of its last marker graph edge.
        let mut reverse_complement_edge = vec![usize::MAX; edges.len()];
        for (chain_index, chain) in edge_lists.iter().enumerate() {
            let rc_of_last = graph.rc_edge(*chain.last().unwrap());
            let rc_chain = *chain_of_edge.get(&rc_of_last).ok_or_else(|| {
                anyhow!("assembly graph chain {chain_index} has no reverse complement")
            })?;
            reverse_complement_edge[chain_index] = rc_chain;
            ensure!(
                edge_lists[rc_chain].len() == chain.len(),
                "reverse complement chains have different lengths"
            );
        }
        for (chain_index, &rc) in reverse_complement_edge.iter().enumerate() {
            ensure!(
                reverse_complement_edge[rc] == chain_index,
                "assembly graph chain reverse complement is not an involution"
            );
        }

        // Reverse complement of a vertex.
        let mut reverse_complement_vertex = vec![usize::MAX; vertices.len()];
        for (index, &marker_vertex) in vertices.iter().enumerate() {
            let rc_marker_vertex = graph.rc_vertex(marker_vertex);
            let rc_index = *vertex_index.get(&rc_marker_vertex).ok_or_else(|| {
                anyhow!("assembly graph vertex for marker graph vertex {rc_marker_vertex} missing")
            })?;
            reverse_complement_vertex[index] = rc_index;
        }

        // Adjacency.
        let mut edges_by_source = vec![Vec::new(); vertices.len()];
        let mut edges_by_target = vec![Vec::new(); vertices.len()];
        for (edge_index, edge) in edges.iter().enumerate() {
            edges_by_source[edge.source].push(edge_index);
            edges_by_target[edge.target].push(edge_index);
        }

        Ok(TempAssemblyGraph {
            vertices,
            edges,
            edge_lists,
            reverse_complement_vertex,
            reverse_complement_edge,
            edges_by_source,
            edges_by_target,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of marker graph edges in a chain.
    pub fn edge_length(&self, edge_index: usize) -> u64 {
        self.edge_lists[edge_index].len() as u64
    }
}

fn intern(
    vertices: &mut Vec<VertexId>,
    vertex_index: &mut AHashMap<VertexId, usize>,
    marker_vertex: VertexId,
) -> usize {
    *vertex_index.entry(marker_vertex).or_insert_with(|| {
        vertices.push(marker_vertex);
        vertices.len() - 1
    })
}

/// The maximal chain through `start_edge_id`: extended forward while the
/// target has exactly one surviving in- and out-edge, then backward
/// symmetrically. Circular chains are detected when the forward walk
/// returns to the start edge.
fn extract_chain(graph: &MarkerGraph, start_edge_id: EdgeId) -> Vec<EdgeId> {
    let mut next_edges: Vec<EdgeId> = Vec::new();
    let mut is_circular = false;

    let mut edge_id = start_edge_id;
    loop {
        let target = graph.edges[edge_id as usize].target;
        match unique_strong_neighbor(graph, target) {
            Some(next) => {
                if next == start_edge_id {
                    is_circular = true;
                    break;
                }
                next_edges.push(next);
                edge_id = next;
            }
            None => break,
        }
    }

    let mut previous_edges: Vec<EdgeId> = Vec::new();
    if !is_circular {
        let mut edge_id = start_edge_id;
        loop {
            let source = graph.edges[edge_id as usize].source;
            match unique_strong_predecessor(graph, source) {
                Some(previous) => {
                    previous_edges.push(previous);
                    edge_id = previous;
                }
                None => break,
            }
        }
    }

    let mut chain = Vec::with_capacity(previous_edges.len() + 1 + next_edges.len());
    chain.extend(previous_edges.into_iter().rev());
    chain.push(start_edge_id);
    chain.extend(next_edges);
    chain
}

/// The unique surviving out-edge of a vertex with strong in-degree and
/// out-degree both 1, otherwise `None`.
fn unique_strong_neighbor(graph: &MarkerGraph, vertex_id: VertexId) -> Option<EdgeId> {
    if graph.strong_out_degree(vertex_id) != 1 || graph.strong_in_degree(vertex_id) != 1 {
        return None;
    }
    graph
        .out_edges(vertex_id)
        .find(|&e| !graph.edges[e as usize].was_removed())
}

/// Symmetric to [`unique_strong_neighbor`], walking backward.
fn unique_strong_predecessor(graph: &MarkerGraph, vertex_id: VertexId) -> Option<EdgeId> {
    if graph.strong_out_degree(vertex_id) != 1 || graph.strong_in_degree(vertex_id) != 1 {
        return None;
    }
    graph
        .in_edges(vertex_id)
        .find(|&e| !graph.edges[e as usize].was_removed())
}
