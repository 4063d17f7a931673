/// Bridge dataset generator entry point
use bridge_dataset::config::PipelineConfig;
use bridge_dataset::params::{Constraints, PierLayout, PierSection, TopologyKind};
use bridge_dataset::pipeline::{self, DatasetPipeline, RunOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Synthetic bridge geometry, TLS survey plans and labeled scan datasets
#[derive(Parser)]
#[command(name = "bridge-dataset")]
#[command(about = "Generate labeled bridge point-cloud datasets", long_about = None)]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset root, overrides `dataset_dir` from the config file
    #[arg(long, global = true)]
    dataset_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate bridges, survey plans and optionally scans and labels
    Run {
        /// Number of bridges to generate
        #[arg(long)]
        num_bridges: usize,

        /// Deck topology (default: mixed)
        #[arg(long, value_enum)]
        bridge_type: Option<TopologyKind>,

        /// Number of spans
        #[arg(long)]
        span_count: Option<u32>,

        /// Total deck length in metres
        #[arg(long)]
        total_length: Option<f64>,

        /// Deck width in metres
        #[arg(long)]
        width: Option<f64>,

        #[arg(long, value_enum)]
        pier_layout: Option<PierLayout>,

        #[arg(long, value_enum)]
        pier_section: Option<PierSection>,

        /// Batch seed, overrides `generation.seed`
        #[arg(long)]
        seed: Option<u64>,

        /// Hand scenes to the LiDAR stage and merge the returned legs
        #[arg(long)]
        run_simulation: bool,

        /// Label merged scans by component (implies --run-simulation)
        #[arg(long)]
        semantic_segmentation: bool,
    },

    /// Label existing scan files against a bridge's components.json
    Segment {
        /// Path to the bridge's components.json
        #[arg(long)]
        components: PathBuf,

        /// Directory for the labeled output
        #[arg(long)]
        output: PathBuf,

        /// XYZ, LAS or LAZ scan files
        #[arg(required = true)]
        scans: Vec<PathBuf>,
    },

    /// Count the artifacts present in the dataset directory
    Verify,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = cli.dataset_dir {
        config.dataset_dir = dir;
    }

    match cli.command {
        Commands::Run {
            num_bridges,
            bridge_type,
            span_count,
            total_length,
            width,
            pier_layout,
            pier_section,
            seed,
            mut run_simulation,
            semantic_segmentation,
        } => {
            if semantic_segmentation && !run_simulation {
                log::warn!("Semantic segmentation requires simulation; enabling --run-simulation");
                run_simulation = true;
            }
            if let Some(seed) = seed {
                config.generation.seed = seed;
            }
            config.validate()?;

            let options = RunOptions {
                num_bridges,
                constraints: Constraints {
                    topology: bridge_type,
                    span_count,
                    total_length,
                    width,
                    pier_layout,
                    pier_section,
                },
                run_simulation,
                semantic_segmentation,
            };
            let summary = DatasetPipeline::new(config).run(&options)?;
            if summary.failed > 0 {
                log::error!(
                    "{} of {} bridges failed",
                    summary.failed,
                    summary.requested
                );
                std::process::exit(1);
            }
        }
        Commands::Segment {
            components,
            output,
            scans,
        } => {
            let report = pipeline::segment_scans(&components, &scans, &output, &config)?;
            if report.flagged {
                log::warn!(
                    "{:.1}% of points fell outside every component",
                    report.unassigned_ratio * 100.0
                );
            }
        }
        Commands::Verify => {
            pipeline::verify(&config.dataset_dir)?;
        }
    }

    Ok(())
}
