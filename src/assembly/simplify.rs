//! Bubble and superbubble removal.
//!
//! Runs one iteration per configured `max_length`, in order. Each
//! iteration builds a fresh temporary assembly graph twice:
//!
//! * **Part 1 — bubbles.** For each source vertex whose out-edges are all
//!   short, parallel edges to the same target are collapsed to the single
//!   one with the highest average coverage.
//! * **Part 2 — superbubbles.** Connected components over short edges are
//!   analyzed: components with no entries or exits are whole islands and
//!   are retained; self-complementary components are retained (no
//!   simplification is attempted on them); every other component keeps
//!   only the edges on shortest paths between entry/exit pairs, with edge
//!   weight `1 / average coverage` so high-coverage paths win.
//!
//! Everything not kept is converted back to marker graph edges flagged
//! `is_super_bubble_edge`, always together with their reverse complements.

use anyhow::{ensure, Result};
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::assembly::marker_graph::MarkerGraph;
use crate::assembly::strand_symmetry;
use crate::assembly::temp_graph::TempAssemblyGraph;
use crate::core::MarkerTable;
use crate::utils::WorkerPool;

pub fn simplify_marker_graph(
    graph: &mut MarkerGraph,
    markers: &MarkerTable,
    max_lengths: &[u64],
    pool: &WorkerPool,
) -> Result<()> {
    for edge in graph.edges.as_mut_slice() {
        edge.set_is_super_bubble_edge(false);
    }

    for (iteration, &max_length) in max_lengths.iter().enumerate() {
        info!(iteration, max_length, "simplify iteration begins");
        strand_symmetry::check_strand_symmetry(graph, markers, pool)?;
        remove_bubbles(graph, max_length)?;
        strand_symmetry::check_strand_symmetry(graph, markers, pool)?;
        remove_superbubbles(graph, max_length)?;
    }
    strand_symmetry::check_strand_symmetry(graph, markers, pool)?;

    let surviving = graph.edges.iter().filter(|e| !e.was_removed()).count();
    info!(surviving, "simplification completed");
    Ok(())
}

/// Part 1: for each set of short parallel assembly graph edges, keep only
/// the one with the highest average coverage.
fn remove_bubbles(graph: &mut MarkerGraph, max_length: u64) -> Result<()> {
    let temp = TempAssemblyGraph::build(graph)?;
    debug!(
        vertices = temp.vertex_count(),
        edges = temp.edge_count(),
        "assembly graph for bubble removal"
    );

    let mut keep = vec![true; temp.edge_count()];
    for v0 in 0..temp.vertex_count() {
        let out_edges = &temp.edges_by_source[v0];

        // A long out-edge disqualifies the whole vertex.
        if out_edges
            .iter()
            .any(|&e| temp.edge_length(e) > max_length)
        {
            continue;
        }

        // Group the out-edges by target.
        let mut edge_table: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &edge_index in out_edges {
            edge_table
                .entry(temp.edges[edge_index].target)
                .or_default()
                .push(edge_index);
        }

        for (v1, mut group) in edge_table {
            // Bubbles between a vertex and its own reverse complement
            // contain the rc pairs of their own edges; removal would not
            // be strand-symmetric, so leave them alone.
            if v1 == temp.reverse_complement_vertex[v0] {
                continue;
            }
            if group.len() < 2 {
                continue;
            }
            group.sort_unstable_by(|&a, &b| {
                temp.edges[b]
                    .average_edge_coverage
                    .cmp(&temp.edges[a].average_edge_coverage)
                    .then(a.cmp(&b))
            });
            for &edge_index in &group[1..] {
                keep[edge_index] = false;
            }
        }
    }

    flag_unkept_edges(graph, &temp, &keep);
    Ok(())
}

/// Part 2: superbubble removal by connected-component analysis and
/// shortest-path retention.
fn remove_superbubbles(graph: &mut MarkerGraph, max_length: u64) -> Result<()> {
    let temp = TempAssemblyGraph::build(graph)?;
    let n = temp.vertex_count();
    debug!(
        vertices = n,
        edges = temp.edge_count(),
        "assembly graph for superbubble removal"
    );

    // Connected components over short edges only.
    let mut union_find: UnionFind<usize> = UnionFind::new(n);
    for (edge_index, edge) in temp.edges.iter().enumerate() {
        if temp.edge_length(edge_index) <= max_length {
            union_find.union(edge.source, edge.target);
        }
    }

    // Inter-component and long edges survive unconditionally.
    let mut keep = vec![false; temp.edge_count()];
    for (edge_index, edge) in temp.edges.iter().enumerate() {
        if union_find.find(edge.source) != union_find.find(edge.target)
            || temp.edge_length(edge_index) > max_length
        {
            keep[edge_index] = true;
        }
    }

    // Vertices of each component; members come out sorted because vertex
    // indices are scanned in order.
    let mut component_table: Vec<Vec<usize>> = vec![Vec::new(); n];
    for v in 0..n {
        component_table[union_find.find(v)].push(v);
    }

    // Pair components with their reverse complements.
    let mut rc_component = vec![usize::MAX; n];
    for component_id in 0..n {
        let component = &component_table[component_id];
        if component.is_empty() {
            continue;
        }
        let v_rc = temp.reverse_complement_vertex[component[0]];
        rc_component[component_id] = union_find.find(v_rc);
    }
    for component_id in 0..n {
        if component_table[component_id].is_empty() {
            continue;
        }
        ensure!(
            rc_component[rc_component[component_id]] == component_id,
            "component reverse complement pairing is not an involution"
        );
    }
    for v0 in 0..n {
        let v1 = temp.reverse_complement_vertex[v0];
        let c0 = union_find.find(v0);
        let c1 = union_find.find(v1);
        ensure!(rc_component[c0] == c1 && rc_component[c1] == c0);
    }

    // Entries have an in-edge from another component or a long in-edge;
    // exits are symmetric.
    let mut is_entry = vec![false; n];
    let mut is_exit = vec![false; n];
    for v0 in 0..n {
        let component0 = union_find.find(v0);
        for &edge_index in &temp.edges_by_target[v0] {
            if temp.edge_length(edge_index) > max_length
                || union_find.find(temp.edges[edge_index].source) != component0
            {
                is_entry[v0] = true;
                break;
            }
        }
        for &edge_index in &temp.edges_by_source[v0] {
            if temp.edge_length(edge_index) > max_length
                || union_find.find(temp.edges[edge_index].target) != component0
            {
                is_exit[v0] = true;
                break;
            }
        }
    }

    // Process each component.
    for component_id in 0..n {
        let component = &component_table[component_id];
        if component.is_empty() {
            continue;
        }

        // Self-complementary components are retained whole; simplifying
        // them cannot be done strand-symmetrically one side at a time.
        if rc_component[component_id] == component_id {
            info!(
                size = component.len(),
                "retaining a self-complementary component"
            );
            keep_internal_edges(&temp, &union_find, component, &mut keep);
            continue;
        }

        // Each rc pair of components is handled once; the keeps are
        // mirrored through the rc edge mapping.
        if rc_component[component_id] < component_id {
            continue;
        }

        let entries_exist = component.iter().any(|&v| is_entry[v]);
        let exits_exist = component.iter().any(|&v| is_exit[v]);

        // A component with no entries or no exits is an entire island of
        // the full graph; retain it.
        if !(entries_exist && exits_exist) {
            for &v0 in component {
                let component0 = union_find.find(v0);
                for &edge_index in &temp.edges_by_source[v0] {
                    if union_find.find(temp.edges[edge_index].target) == component0 {
                        keep[edge_index] = true;
                        keep[temp.reverse_complement_edge[edge_index]] = true;
                    }
                }
            }
            continue;
        }

        // The binary searches below rely on component members being
        // sorted, which the gathering loop guarantees.
        ensure!(component.windows(2).all(|w| w[0] < w[1]));
        retain_shortest_paths(
            &temp,
            &union_find,
            component,
            &is_entry,
            &is_exit,
            max_length,
            &mut keep,
        )?;
    }

    flag_unkept_edges(graph, &temp, &keep);
    Ok(())
}

fn keep_internal_edges(
    temp: &TempAssemblyGraph,
    union_find: &UnionFind<usize>,
    component: &[usize],
    keep: &mut [bool],
) {
    for &v0 in component {
        let component0 = union_find.find(v0);
        for &edge_index in &temp.edges_by_source[v0] {
            if union_find.find(temp.edges[edge_index].target) == component0 {
                keep[edge_index] = true;
            }
        }
    }
}

/// Keep, for every entry/exit pair of the component, the edges of a
/// shortest path between them, weighting edges by inverse coverage and
/// resolving parallel edges in favor of the highest coverage.
fn retain_shortest_paths(
    temp: &TempAssemblyGraph,
    union_find: &UnionFind<usize>,
    component: &[usize],
    is_entry: &[bool],
    is_exit: &[bool],
    max_length: u64,
    keep: &mut [bool],
) -> Result<()> {
    // Weighted digraph over the component; node i is component[i].
    let mut weighted: DiGraph<(), f64> = DiGraph::new();
    for _ in component {
        weighted.add_node(());
    }
    let component_id = union_find.find(component[0]);
    for (i, &vertex0) in component.iter().enumerate() {
        for &edge_index in &temp.edges_by_source[vertex0] {
            if temp.edge_length(edge_index) > max_length {
                continue;
            }
            let vertex1 = temp.edges[edge_index].target;
            if union_find.find(vertex1) != component_id {
                continue;
            }
            let j = component.binary_search(&vertex1).map_err(|_| {
                anyhow::anyhow!("assembly graph edge target missing from its component")
            })?;
            let coverage = temp.edges[edge_index].average_edge_coverage.max(1);
            weighted.add_edge(
                NodeIndex::new(i),
                NodeIndex::new(j),
                1.0 / coverage as f64,
            );
        }
    }

    for (entry_index, &entry) in component.iter().enumerate() {
        if !is_entry[entry] {
            continue;
        }
        for (exit_index, &exit) in component.iter().enumerate() {
            if !is_exit[exit] || exit == entry {
                continue;
            }

            // Dijkstra: astar with a zero heuristic and non-negative
            // weights.
            let Some((_, path)) = astar(
                &weighted,
                NodeIndex::new(entry_index),
                |node| node == NodeIndex::new(exit_index),
                |edge| *edge.weight(),
                |_| 0.0,
            ) else {
                continue; // exit unreachable from this entry
            };

            // Walk the path; at each hop keep the best parallel edge and
            // its reverse complement.
            for hop in path.windows(2) {
                let vertex0 = component[hop[0].index()];
                let vertex1 = component[hop[1].index()];

                let mut best: Option<usize> = None;
                for &edge_index in &temp.edges_by_source[vertex0] {
                    if temp.edges[edge_index].target != vertex1
                        || temp.edge_length(edge_index) > max_length
                    {
                        continue;
                    }
                    let better = match best {
                        None => true,
                        Some(current) => {
                            temp.edges[edge_index].average_edge_coverage
                                > temp.edges[current].average_edge_coverage
                        }
                    };
                    if better {
                        best = Some(edge_index);
                    }
                }
                let best =
                    best.ok_or_else(|| anyhow::anyhow!("shortest path hop without an edge"))?;
                keep[best] = true;
                keep[temp.reverse_complement_edge[best]] = true;
            }
        }
    }
    Ok(())
}

/// Flag the marker graph edges behind every unkept assembly graph edge,
/// together with their reverse complements.
fn flag_unkept_edges(graph: &mut MarkerGraph, temp: &TempAssemblyGraph, keep: &[bool]) {
    for (edge_index, &kept) in keep.iter().enumerate() {
        if kept {
            continue;
        }
        for &marker_edge_id in &temp.edge_lists[edge_index] {
            let rc = graph.rc_edge(marker_edge_id);
            graph.edges[marker_edge_id as usize].set_is_super_bubble_edge(true);
            graph.edges[rc as usize].set_is_super_bubble_edge(true);
        }
    }
}
