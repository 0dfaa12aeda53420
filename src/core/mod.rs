//! Core identifier types, the marker table, and the lock-free union-find
//! engine that everything else builds on.

pub mod disjoint_sets;
pub mod ids;
pub mod markers;

pub use disjoint_sets::DisjointSets;
pub use ids::{
    EdgeId, Marker, MarkerId, MarkerInterval, OrientedReadId, ReadId, SegmentId, Strand, Uint40,
    VertexId, INVALID_EDGE_ID, INVALID_VERTEX_ID,
};
pub use markers::MarkerTable;
