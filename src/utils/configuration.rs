//! Configuration for the marker graph pipeline.
//!
//! Options load from an optional TOML file, overridden by
//! `MARKER_FORGE_*` environment variables (double underscore separates
//! nesting, e.g. `MARKER_FORGE_MARKER_GRAPH__MIN_COVERAGE=3`).

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Full pipeline configuration tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfiguration {
    pub marker_graph: MarkerGraphConfig,
    pub transitive_reduction: TransitiveReductionConfig,
    pub simplify: SimplifyConfig,
    pub mode3: Mode3Config,
    pub resources: ResourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerGraphConfig {
    /// Minimum marker count for a vertex to be kept; 0 selects the value
    /// automatically from the disjoint-set size histogram.
    pub min_coverage: u64,
    /// Maximum marker count for a vertex to be kept.
    pub max_coverage: u64,
    /// Minimum marker count required on each strand separately.
    pub min_coverage_per_strand: u64,
    /// Keep vertices holding two markers of the same oriented read.
    pub allow_duplicate_markers: bool,
    /// Minimum area fraction for the automatic min_coverage peak.
    pub peak_finder_min_area_fraction: f64,
    /// First histogram bin considered when looking for the peak.
    pub peak_finder_area_start_index: usize,
}

impl Default for MarkerGraphConfig {
    fn default() -> Self {
        MarkerGraphConfig {
            min_coverage: 0,
            max_coverage: 100,
            min_coverage_per_strand: 0,
            allow_duplicate_markers: false,
            peak_finder_min_area_fraction: 0.08,
            peak_finder_area_start_index: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitiveReductionConfig {
    /// Edges with coverage at or below this are removed outright.
    pub low_coverage_threshold: u64,
    /// Edges with coverage at or above this are never touched.
    pub high_coverage_threshold: u64,
    /// Maximum BFS depth when searching for an alternative path.
    pub max_distance: u32,
    /// Coverage-1 edges whose single marker skip exceeds this are removed.
    pub edge_marker_skip_threshold: u32,
}

impl Default for TransitiveReductionConfig {
    fn default() -> Self {
        TransitiveReductionConfig {
            low_coverage_threshold: 1,
            high_coverage_threshold: 256,
            max_distance: 30,
            edge_marker_skip_threshold: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyConfig {
    /// Number of leaf-pruning iterations.
    pub prune_iteration_count: usize,
    /// One bubble/superbubble iteration per entry, in order.
    pub max_lengths: Vec<u64>,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        SimplifyConfig {
            prune_iteration_count: 6,
            max_lengths: vec![10, 100, 1000, 10_000, 100_000],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Mode3Config {
    /// Minimum transition count (oriented reads) for a link.
    pub min_link_coverage: u64,
}

impl Default for Mode3Config {
    fn default() -> Self {
        Mode3Config {
            min_link_coverage: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Worker threads; 0 selects the hardware concurrency.
    pub thread_count: usize,
    /// Page size used when sizing mapped arenas.
    pub large_data_page_size: usize,
    /// Prefix for file-backed arenas; empty keeps everything anonymous.
    pub large_data_file_name_prefix: String,
    /// Emit per-vertex and per-edge coverage histograms.
    pub store_coverage_data: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        ResourceConfig {
            thread_count: 0,
            large_data_page_size: 4096,
            large_data_file_name_prefix: String::new(),
            store_coverage_data: false,
        }
    }
}

impl PipelineConfiguration {
    /// Load configuration, starting from defaults, then the TOML file (if
    /// given), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_owned()).format(FileFormat::Toml));
            info!("loading configuration from {}", path.display());
        }
        let config = builder
            .add_source(Environment::with_prefix("MARKER_FORGE").separator("__"))
            .build()?;
        let configuration: PipelineConfiguration = config.try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.marker_graph.max_coverage == 0 {
            return Err(ConfigurationError::Invalid(
                "marker_graph.max_coverage must be positive".into(),
            ));
        }
        if self.marker_graph.min_coverage > self.marker_graph.max_coverage {
            return Err(ConfigurationError::Invalid(format!(
                "marker_graph.min_coverage {} exceeds max_coverage {}",
                self.marker_graph.min_coverage, self.marker_graph.max_coverage
            )));
        }
        let tr = &self.transitive_reduction;
        if tr.high_coverage_threshold <= tr.low_coverage_threshold {
            return Err(ConfigurationError::Invalid(format!(
                "transitive_reduction.high_coverage_threshold {} must exceed \
                 low_coverage_threshold {}",
                tr.high_coverage_threshold, tr.low_coverage_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.marker_graph.peak_finder_min_area_fraction) {
            return Err(ConfigurationError::Invalid(
                "marker_graph.peak_finder_min_area_fraction must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
