//! Marker graph storage.
//!
//! Vertices are equivalence classes of markers; edges are induced by
//! marker adjacency along oriented reads. Vertices and edges are created
//! once and never deleted: all later removal is expressed through edge
//! flags, so ids stay stable across the whole pipeline and the
//! reverse-complement indices can refer by id forever.

use anyhow::{ensure, Result};

use crate::core::ids::{EdgeId, MarkerId, MarkerInterval, Uint40, VertexId};
use crate::core::MarkerTable;
use crate::storage::{LargeData, MappedVector, Pod, StorageError, VectorOfVectors};

const WAS_REMOVED_BY_TRANSITIVE_REDUCTION: u8 = 1;
const WAS_PRUNED: u8 = 1 << 1;
const IS_SUPER_BUBBLE_EDGE: u8 = 1 << 2;
const IS_LOW_COVERAGE_CROSS_EDGE: u8 = 1 << 3;
const WAS_ASSEMBLED: u8 = 1 << 4;
const IS_SECONDARY: u8 = 1 << 5;

/// One marker graph edge. Coverage is capped at 255 here; the full count
/// is always the length of the edge's marker interval list.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct MarkerGraphEdge {
    pub source: VertexId,
    pub target: VertexId,
    pub coverage: u8,
    flags: u8,
    _pad: [u8; 6],
}

unsafe impl Pod for MarkerGraphEdge {}

impl MarkerGraphEdge {
    pub fn new(source: VertexId, target: VertexId, full_coverage: usize) -> Self {
        MarkerGraphEdge {
            source,
            target,
            coverage: full_coverage.min(255) as u8,
            flags: 0,
            _pad: [0; 6],
        }
    }

    pub fn was_removed_by_transitive_reduction(&self) -> bool {
        self.flags & WAS_REMOVED_BY_TRANSITIVE_REDUCTION != 0
    }
    pub fn set_was_removed_by_transitive_reduction(&mut self, value: bool) {
        self.set(WAS_REMOVED_BY_TRANSITIVE_REDUCTION, value);
    }

    pub fn was_pruned(&self) -> bool {
        self.flags & WAS_PRUNED != 0
    }
    pub fn set_was_pruned(&mut self, value: bool) {
        self.set(WAS_PRUNED, value);
    }

    pub fn is_super_bubble_edge(&self) -> bool {
        self.flags & IS_SUPER_BUBBLE_EDGE != 0
    }
    pub fn set_is_super_bubble_edge(&mut self, value: bool) {
        self.set(IS_SUPER_BUBBLE_EDGE, value);
    }

    pub fn is_low_coverage_cross_edge(&self) -> bool {
        self.flags & IS_LOW_COVERAGE_CROSS_EDGE != 0
    }
    pub fn set_is_low_coverage_cross_edge(&mut self, value: bool) {
        self.set(IS_LOW_COVERAGE_CROSS_EDGE, value);
    }

    pub fn was_assembled(&self) -> bool {
        self.flags & WAS_ASSEMBLED != 0
    }
    pub fn set_was_assembled(&mut self, value: bool) {
        self.set(WAS_ASSEMBLED, value);
    }

    pub fn is_secondary(&self) -> bool {
        self.flags & IS_SECONDARY != 0
    }
    pub fn set_is_secondary(&mut self, value: bool) {
        self.set(IS_SECONDARY, value);
    }

    /// True if any removal flag is set; the strong subgraph consists of
    /// the edges for which this is false.
    pub fn was_removed(&self) -> bool {
        self.flags
            & (WAS_REMOVED_BY_TRANSITIVE_REDUCTION
                | WAS_PRUNED
                | IS_SUPER_BUBBLE_EDGE
                | IS_LOW_COVERAGE_CROSS_EDGE)
            != 0
    }

    /// Clear the flags owned by the simplifier.
    pub fn clear_simplifier_flags(&mut self) {
        self.flags &= !(WAS_REMOVED_BY_TRANSITIVE_REDUCTION | WAS_PRUNED | IS_SUPER_BUBBLE_EDGE);
    }

    fn set(&mut self, bit: u8, value: bool) {
        if value {
            self.flags |= bit;
        } else {
            self.flags &= !bit;
        }
    }
}

pub struct MarkerGraph {
    /// Vertex id (40-bit) of every marker, sentinel if unassigned.
    pub vertex_table: MappedVector<Uint40>,
    /// Per-vertex sorted marker lists.
    pub vertices: VectorOfVectors<MarkerId>,
    pub reverse_complement_vertex: MappedVector<u64>,
    pub edges: MappedVector<MarkerGraphEdge>,
    pub edge_marker_intervals: VectorOfVectors<MarkerInterval>,
    /// Out-edges per vertex, 40-bit edge ids.
    pub edges_by_source: VectorOfVectors<Uint40>,
    /// In-edges per vertex, 40-bit edge ids.
    pub edges_by_target: VectorOfVectors<Uint40>,
    pub reverse_complement_edge: MappedVector<u64>,
}

impl MarkerGraph {
    pub const VERTEX_TABLE_NAME: &'static str = "MarkerGraphVertexTable";
    pub const VERTICES_NAME: &'static str = "MarkerGraphVertices";
    pub const RC_VERTEX_NAME: &'static str = "MarkerGraphReverseComplementVertex";
    pub const EDGES_NAME: &'static str = "GlobalMarkerGraphEdges";
    pub const EDGE_MARKER_INTERVALS_NAME: &'static str = "GlobalMarkerGraphEdgeMarkerIntervals";
    pub const EDGES_BY_SOURCE_NAME: &'static str = "GlobalMarkerGraphEdgesBySource";
    pub const EDGES_BY_TARGET_NAME: &'static str = "GlobalMarkerGraphEdgesByTarget";
    pub const RC_EDGE_NAME: &'static str = "MarkerGraphReverseComplementEdge";

    /// Create an empty marker graph whose arenas live under the configured
    /// large-data prefix (anonymous when the prefix is empty).
    pub fn create_new(large_data: &LargeData) -> Result<Self, StorageError> {
        let page = large_data.page_size;
        Ok(MarkerGraph {
            vertex_table: MappedVector::create_new(
                large_data.name(Self::VERTEX_TABLE_NAME),
                page,
            )?,
            vertices: VectorOfVectors::create_new(large_data.name(Self::VERTICES_NAME), page)?,
            reverse_complement_vertex: MappedVector::create_new(
                large_data.name(Self::RC_VERTEX_NAME),
                page,
            )?,
            edges: MappedVector::create_new(large_data.name(Self::EDGES_NAME), page)?,
            edge_marker_intervals: VectorOfVectors::create_new(
                large_data.name(Self::EDGE_MARKER_INTERVALS_NAME),
                page,
            )?,
            edges_by_source: VectorOfVectors::create_new(
                large_data.name(Self::EDGES_BY_SOURCE_NAME),
                page,
            )?,
            edges_by_target: VectorOfVectors::create_new(
                large_data.name(Self::EDGES_BY_TARGET_NAME),
                page,
            )?,
            reverse_complement_edge: MappedVector::create_new(
                large_data.name(Self::RC_EDGE_NAME),
                page,
            )?,
        })
    }

    pub fn vertex_count(&self) -> u64 {
        self.vertices.len() as u64
    }

    pub fn edge_count(&self) -> u64 {
        self.edges.len() as u64
    }

    pub fn vertex_markers(&self, vertex_id: VertexId) -> &[MarkerId] {
        self.vertices.slice(vertex_id as usize)
    }

    /// Vertex the marker belongs to, or `None` if unassigned.
    pub fn vertex_of_marker(&self, marker_id: MarkerId) -> Option<VertexId> {
        let packed = self.vertex_table[marker_id as usize];
        if packed.is_invalid() {
            None
        } else {
            Some(packed.get())
        }
    }

    pub fn out_edges(&self, vertex_id: VertexId) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges_by_source
            .slice(vertex_id as usize)
            .iter()
            .map(|packed| packed.get())
    }

    pub fn in_edges(&self, vertex_id: VertexId) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges_by_target
            .slice(vertex_id as usize)
            .iter()
            .map(|packed| packed.get())
    }

    pub fn rc_vertex(&self, vertex_id: VertexId) -> VertexId {
        self.reverse_complement_vertex[vertex_id as usize]
    }

    pub fn rc_edge(&self, edge_id: EdgeId) -> EdgeId {
        self.reverse_complement_edge[edge_id as usize]
    }

    /// Out-degree and in-degree of a vertex counting only edges of the
    /// pruned strong subgraph.
    pub fn strong_out_degree(&self, vertex_id: VertexId) -> usize {
        self.out_edges(vertex_id)
            .filter(|&e| !self.edges[e as usize].was_removed())
            .count()
    }

    pub fn strong_in_degree(&self, vertex_id: VertexId) -> usize {
        self.in_edges(vertex_id)
            .filter(|&e| !self.edges[e as usize].was_removed())
            .count()
    }

    /// Whether a vertex holds more than one marker of the same oriented
    /// read. Vertex markers are sorted by marker id, which orders by
    /// oriented read first, so adjacent comparison suffices.
    pub fn is_bad_vertex(&self, vertex_id: VertexId, markers: &MarkerTable) -> bool {
        let vertex_markers = self.vertex_markers(vertex_id);
        for window in vertex_markers.windows(2) {
            let (read0, _) = markers.find_marker_id(window[0]);
            let (read1, _) = markers.find_marker_id(window[1]);
            if read0 == read1 {
                return true;
            }
        }
        false
    }

    /// Verify that `vertex_table` and `vertices` agree and that every
    /// vertex coverage is in range. Fatal on any mismatch.
    pub fn check_vertices(&self, min_coverage: u64, max_coverage: u64) -> Result<()> {
        for vertex_id in 0..self.vertex_count() {
            let markers = self.vertex_markers(vertex_id);
            ensure!(
                (min_coverage..=max_coverage).contains(&(markers.len() as u64)),
                "vertex {vertex_id} has coverage {} outside [{min_coverage}, {max_coverage}]",
                markers.len()
            );
            for &marker_id in markers {
                ensure!(
                    self.vertex_of_marker(marker_id) == Some(vertex_id),
                    "vertex table points marker {marker_id} away from vertex {vertex_id}"
                );
            }
        }
        Ok(())
    }

    /// Verify that every edge appears exactly once in the adjacency list
    /// of its source and of its target.
    pub fn check_adjacency(&self) -> Result<()> {
        for edge_id in 0..self.edge_count() {
            let edge = &self.edges[edge_id as usize];
            let in_source = self
                .out_edges(edge.source)
                .filter(|&e| e == edge_id)
                .count();
            let in_target = self
                .in_edges(edge.target)
                .filter(|&e| e == edge_id)
                .count();
            ensure!(
                in_source == 1 && in_target == 1,
                "edge {edge_id} appears {in_source} times by source and {in_target} by target"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_flags() {
        let mut edge = MarkerGraphEdge::new(3, 4, 300);
        assert_eq!(edge.coverage, 255);
        assert!(!edge.was_removed());

        edge.set_was_pruned(true);
        assert!(edge.was_pruned());
        assert!(edge.was_removed());

        edge.set_is_super_bubble_edge(true);
        edge.set_was_assembled(true);
        edge.clear_simplifier_flags();
        assert!(!edge.was_pruned());
        assert!(!edge.is_super_bubble_edge());
        assert!(edge.was_assembled());
        assert!(!edge.was_removed());
    }

    #[test]
    fn edge_record_is_compact() {
        assert_eq!(std::mem::size_of::<MarkerGraphEdge>(), 24);
    }
}
