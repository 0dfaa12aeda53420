//! Pass orchestration.
//!
//! Owns the inputs, the marker graph and the worker pool, and runs the
//! pass sequence in order: vertices, edges, reverse complement indices,
//! transitive reduction, reverse transitive reduction, pruning,
//! bubble/superbubble simplification, and the Mode-3 assembly graph.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::assembly::{
    edge_builder, marker_graph::MarkerGraph, prune, read_graph::ReadGraph, simplify,
    strand_symmetry, transitive_reduction, vertex_builder,
};
use crate::core::MarkerTable;
use crate::diagnostics;
use crate::mode3::Mode3AssemblyGraph;
use crate::storage::LargeData;
use crate::utils::{PipelineConfiguration, WorkerPool};

pub struct AssemblyPipeline {
    pub config: PipelineConfiguration,
    pub large_data: LargeData,
    pub pool: WorkerPool,
    pub markers: MarkerTable,
    pub read_graph: ReadGraph,
    pub marker_graph: MarkerGraph,
    pub mode3: Option<Mode3AssemblyGraph>,
    /// Directory for diagnostic CSVs; `None` disables them.
    pub csv_dir: Option<PathBuf>,
    /// The `min_coverage` actually used, after automatic selection.
    pub min_coverage_used: u64,
}

impl AssemblyPipeline {
    /// Set up a pipeline over inputs already opened by the caller.
    pub fn new(
        config: PipelineConfiguration,
        markers: MarkerTable,
        read_graph: ReadGraph,
        csv_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let large_data = LargeData::new(
            config.resources.large_data_file_name_prefix.clone(),
            config.resources.large_data_page_size,
        );
        let pool = WorkerPool::new(config.resources.thread_count)?;
        let marker_graph = MarkerGraph::create_new(&large_data)?;
        Ok(AssemblyPipeline {
            config,
            large_data,
            pool,
            markers,
            read_graph,
            marker_graph,
            mode3: None,
            csv_dir,
            min_coverage_used: 0,
        })
    }

    /// Open all inputs from a data directory and set up the pipeline.
    /// Arena names are resolved under that directory.
    pub fn open(
        mut config: PipelineConfiguration,
        data_dir: &Path,
        csv_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let prefix = format!("{}/", data_dir.display());
        config.resources.large_data_file_name_prefix = prefix;
        let large_data = LargeData::new(
            config.resources.large_data_file_name_prefix.clone(),
            config.resources.large_data_page_size,
        );
        let markers = MarkerTable::access_existing(&large_data)?;
        let read_graph = ReadGraph::access_existing(&large_data)?;
        Self::new(config, markers, read_graph, csv_dir)
    }

    /// Run every pass in order and emit the configured outputs.
    pub fn run(&mut self) -> Result<()> {
        self.create_vertices()?;
        self.create_edges()?;
        self.find_reverse_complements()?;
        self.reduce()?;
        self.prune()?;
        self.simplify()?;
        self.build_mode3()?;
        self.write_diagnostics()?;
        Ok(())
    }

    pub fn create_vertices(&mut self) -> Result<()> {
        self.min_coverage_used = vertex_builder::create_marker_graph_vertices(
            &mut self.marker_graph,
            &self.markers,
            &self.read_graph,
            &self.config.marker_graph,
            &self.large_data,
            &self.pool,
            self.csv_dir.as_deref(),
        )?;
        Ok(())
    }

    pub fn create_edges(&mut self) -> Result<()> {
        edge_builder::create_marker_graph_edges(&mut self.marker_graph, &self.markers, &self.pool)
    }

    pub fn find_reverse_complements(&mut self) -> Result<()> {
        strand_symmetry::find_reverse_complement_vertices(
            &mut self.marker_graph,
            &self.markers,
            &self.pool,
        )?;
        strand_symmetry::find_reverse_complement_edges(
            &mut self.marker_graph,
            &self.markers,
            &self.pool,
            self.csv_dir.as_deref(),
        )?;
        strand_symmetry::check_strand_symmetry(&self.marker_graph, &self.markers, &self.pool)
    }

    pub fn reduce(&mut self) -> Result<()> {
        transitive_reduction::transitive_reduction(
            &mut self.marker_graph,
            &self.config.transitive_reduction,
            &self.large_data,
        )?;
        transitive_reduction::reverse_transitive_reduction(
            &mut self.marker_graph,
            &self.config.transitive_reduction,
            &self.large_data,
        )
    }

    pub fn prune(&mut self) -> Result<()> {
        prune::prune_strong_subgraph(
            &mut self.marker_graph,
            self.config.simplify.prune_iteration_count,
        )
    }

    pub fn simplify(&mut self) -> Result<()> {
        simplify::simplify_marker_graph(
            &mut self.marker_graph,
            &self.markers,
            &self.config.simplify.max_lengths,
            &self.pool,
        )
    }

    pub fn build_mode3(&mut self) -> Result<()> {
        self.mode3 = Some(Mode3AssemblyGraph::create(
            &self.marker_graph,
            &self.markers,
            self.config.mode3.min_link_coverage,
            &self.large_data,
            &self.pool,
        )?);
        Ok(())
    }

    pub fn write_gfa(&self, path: &Path) -> Result<()> {
        let mode3 = self
            .mode3
            .as_ref()
            .expect("mode 3 assembly graph not built");
        mode3.write_gfa(path)?;
        info!(path = %path.display(), "wrote GFA");
        Ok(())
    }

    fn write_diagnostics(&self) -> Result<()> {
        let Some(dir) = self.csv_dir.as_deref() else {
            return Ok(());
        };
        diagnostics::write_bad_vertices(dir, &self.marker_graph, &self.markers)?;
        if self.config.resources.store_coverage_data {
            diagnostics::write_vertex_coverage_histogram(dir, &self.marker_graph)?;
            diagnostics::write_edge_coverage_histogram(dir, &self.marker_graph)?;
            diagnostics::write_vertex_coverage_by_kmer(dir, &self.marker_graph, &self.markers)?;
        }
        Ok(())
    }
}
