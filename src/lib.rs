//! # marker-forge
//!
//! Graph-construction and simplification core of a long-read de novo
//! genome assembler. From oriented reads (sequences of fixed-length
//! k-mer markers) and pairwise alignments between them, marker-forge
//! builds a strand-symmetric marker graph, simplifies it by approximate
//! transitive reduction, pruning and superbubble removal, and derives a
//! Mode-3 assembly graph of segments and links, emitted as GFA.

pub mod assembly;
pub mod core;
pub mod diagnostics;
pub mod mode3;
pub mod pipeline;
pub mod storage;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::assembly::{MarkerGraph, MarkerGraphEdge, ReadGraph, ReadGraphEdge};
pub use crate::core::{MarkerInterval, MarkerTable, OrientedReadId};
pub use crate::mode3::Mode3AssemblyGraph;
pub use crate::pipeline::AssemblyPipeline;
pub use crate::utils::PipelineConfiguration;

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;
