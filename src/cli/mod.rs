//! Command-line interface.
//!
//! Two subcommands: `detect` runs the full pipeline over a cloud file and
//! writes the labeled, cleaned, and CSV exports; `visualize` renders a cloud
//! to PNG without touching its labels. Threshold flags override whatever the
//! YAML config file provides.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

use crate::config::PipelineConfig;
use crate::core::loaders::load_cloud;
use crate::pipeline::detector::{process_cloud_file, DetectionOutputs};
use crate::visualization::plot_labeled_cloud;

#[derive(Parser, Debug)]
#[command(
    name = "map-cleaner",
    version,
    about = "Detect and remove parked vehicles from static LIDAR map clouds"
)]
struct Cli {
    /// Path to a YAML pipeline configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run detection over a cloud file and write all exports
    Detect {
        /// Input cloud (.ply or .csv)
        input: PathBuf,

        /// Directory for the output files
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// RANSAC seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Clustering neighborhood radius in meters
        #[arg(long)]
        eps: Option<f32>,

        /// Minimum neighbors for a cluster core point
        #[arg(long)]
        min_pts: Option<usize>,

        /// Lower edge of the candidate height band in meters
        #[arg(long)]
        min_height: Option<f32>,

        /// Upper edge of the candidate height band in meters
        #[arg(long)]
        max_height: Option<f32>,

        /// Also render a top-down plot of the labeled cloud
        #[arg(long)]
        plot: bool,
    },

    /// Render a cloud file to a top-down PNG
    Visualize {
        /// Input cloud (.ply or .csv)
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long, default_value = "cloud.png")]
        output: PathBuf,

        /// Maximum number of points to draw
        #[arg(long, default_value_t = 100_000)]
        max_points: usize,
    },
}

/// Parse arguments and run; exits the process on failure.
pub fn run() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).init();

    if let Err(e) = dispatch(cli) {
        log::error!("{e:#}");
        process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect {
            input,
            output_dir,
            seed,
            eps,
            min_pts,
            min_height,
            max_height,
            plot,
        } => {
            let mut config = config;
            if seed.is_some() {
                config.ransac.seed = seed;
            }
            if let Some(eps) = eps {
                config.clustering.eps = eps;
            }
            if let Some(min_pts) = min_pts {
                config.clustering.min_pts = min_pts;
            }
            if let Some(min_height) = min_height {
                config.height.min_height = min_height;
            }
            if let Some(max_height) = max_height {
                config.height.max_height = max_height;
            }
            cmd_detect(&input, &output_dir, &config, plot)
        }
        Commands::Visualize {
            input,
            output,
            max_points,
        } => cmd_visualize(&input, &output, max_points),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .with_context(|| format!("failed to load config from '{}'", path.display()))?;
            log::info!("loaded configuration from '{}'", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn cmd_detect(
    input: &std::path::Path,
    output_dir: &std::path::Path,
    config: &PipelineConfig,
    plot: bool,
) -> Result<()> {
    let spinner = create_spinner(&format!("Processing {}", input.display()));
    let outputs = process_cloud_file(input, output_dir, config, plot)?;
    spinner.finish_and_clear();

    print_summary(&outputs);
    Ok(())
}

fn cmd_visualize(
    input: &std::path::Path,
    output: &std::path::Path,
    max_points: usize,
) -> Result<()> {
    let cloud = load_cloud(input)
        .with_context(|| format!("failed to load point cloud from '{}'", input.display()))?;
    let store = cloud.into_store();

    plot_labeled_cloud(output, &store, max_points)
        .with_context(|| format!("failed to render '{}'", output.display()))?;

    println!("Wrote {}", output.display());
    Ok(())
}

fn print_summary(outputs: &DetectionOutputs) {
    let report = &outputs.report;

    println!("\n{}", "=".repeat(60));
    println!("  Detection summary");
    println!("{}", "=".repeat(60));
    println!("  Total points:      {}", report.total_points);
    println!("  Ground points:     {}", report.ground_points);
    println!("  Candidates:        {}", report.candidate_points);
    println!(
        "  Clusters:          {} ({} dynamic)",
        report.clusters, report.dynamic_clusters
    );
    println!("  Dynamic points:    {}", report.dynamic_points);
    println!("  Noise points:      {}", report.noise_points);
    println!("  Kept in clean map: {}", outputs.kept_points);
    println!("  Elapsed:           {:.2?}", report.elapsed);
    println!("{}", "=".repeat(60));
    println!("  Labeled cloud: {}", outputs.labeled_ply.display());
    println!("  Cleaned cloud: {}", outputs.cleaned_ply.display());
    println!("  Labels CSV:    {}", outputs.labels_csv.display());
    if let Some(plot) = &outputs.plot {
        println!("  Plot:          {}", plot.display());
    }
    println!("{}", "=".repeat(60));
}
