use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use marker_forge::AssemblyPipeline;
use marker_forge::PipelineConfiguration;

/// Marker graph construction and simplification for long-read assembly.
///
/// Reads the marker table, read graph and compressed alignments from the
/// data directory, builds and simplifies the marker graph, constructs the
/// Mode-3 assembly graph, and writes GFA plus diagnostic CSVs.
#[derive(Parser)]
#[command(name = "marker-forge", version, about)]
struct Cli {
    /// Data directory holding the input arrays (Markers, ReadGraphEdges,
    /// ReadFlags, CompressedAlignments). Outputs land there too.
    #[arg(short, long)]
    data: PathBuf,

    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GFA output path. Defaults to <data>/Assembly-Mode3.gfa.
    #[arg(short, long)]
    gfa: Option<PathBuf>,

    /// Directory for diagnostic CSVs. Defaults to the data directory;
    /// pass --no-csv to disable.
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Disable diagnostic CSV output.
    #[arg(long)]
    no_csv: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = PipelineConfiguration::load(cli.config.as_deref())?;

    let csv_dir = if cli.no_csv {
        None
    } else {
        Some(cli.csv_dir.unwrap_or_else(|| cli.data.clone()))
    };

    let mut pipeline = AssemblyPipeline::open(config, &cli.data, csv_dir)?;
    pipeline.run()?;

    let gfa_path = cli
        .gfa
        .unwrap_or_else(|| cli.data.join("Assembly-Mode3.gfa"));
    pipeline.write_gfa(&gfa_path)?;

    Ok(())
}
