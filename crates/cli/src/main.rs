//! Terrover CLI - terrain overlays from DEMs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use terrover_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use terrover_overlay::{
    overlay_file_name, raster_bounds, LayerKind, OverlayConfig, OverlayPipeline, ResultCache,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "terrover")]
#[command(author, version, about = "Flow accumulation and slope overlays from DEMs", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render overlay PNGs for a DEM and print their map bounds
    Overlays {
        /// Input DEM file
        input: PathBuf,
        /// Directory for the PNGs (defaults to the DEM's directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
        /// Cache derived rasters in this directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Layer to render: flow-accumulation, slope (repeatable; default both)
        #[arg(short, long = "layer")]
        layers: Vec<LayerKind>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Write a derived layer as GeoTIFF
    Derive {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Layer to derive: flow-accumulation, slope
        #[arg(short, long)]
        layer: LayerKind,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write 64-bit samples instead of 32-bit
        #[arg(long)]
        double: bool,
    },
    /// Print the map bounds of a raster as JSON
    Bounds {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// A parseable `RUST_LOG` wins over `--verbose`.
fn log_filter(verbose: bool, env: Option<&str>) -> EnvFilter {
    env.and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

fn setup_logging(verbose: bool) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(verbose, env.as_deref());
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&Path>) -> Result<OverlayConfig> {
    match path {
        Some(p) => OverlayConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(OverlayConfig::default()),
    }
}

/// Resolve the overlay directory before the pipeline sees it.
fn resolve_out_dir(input: &Path, out_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match out_dir {
        Some(dir) => dir,
        None => match input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    Ok(dir)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Overlays ─────────────────────────────────────────────────
        Commands::Overlays {
            input,
            out_dir,
            cache_dir,
            config,
            layers,
        } => {
            let config = load_config(config.as_deref())?;
            let out_dir = resolve_out_dir(&input, out_dir)?;
            let cache = cache_dir
                .map(|dir| {
                    ResultCache::new(&dir)
                        .with_context(|| format!("Failed to open cache {}", dir.display()))
                })
                .transpose()?;

            let layers = if layers.is_empty() {
                LayerKind::ALL.to_vec()
            } else {
                layers
            };

            let pipeline = OverlayPipeline::new(config, cache);
            for layer in layers {
                let png = out_dir.join(overlay_file_name(&input, layer));
                let start = Instant::now();
                let pb = spinner(&format!("Rendering {} overlay...", layer));
                let result = pipeline.produce_overlay(&input, layer, &png);
                pb.finish_and_clear();
                let product =
                    result.with_context(|| format!("Failed to produce {} overlay", layer))?;

                let [[south, west], [north, east]] = product.bounds.as_corner_pairs();
                println!("{} overlay saved to: {}", layer, product.png_path.display());
                println!(
                    "  Bounds: [[{:.6}, {:.6}], [{:.6}, {:.6}]]",
                    south, west, north, east
                );
                println!("  Processing time: {:.2?}", start.elapsed());
            }
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let raster: terrover_core::Raster<f64> =
                read_geotiff(&input, None).context("Failed to read raster")?;
            pb.finish_and_clear();

            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: south {:.6}, west {:.6}, north {:.6}, east {:.6}",
                bounds.south, bounds.west, bounds.north, bounds.east
            );
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Derive ───────────────────────────────────────────────────
        Commands::Derive {
            input,
            output,
            layer,
            config,
            double,
        } => {
            let config = load_config(config.as_deref())?;
            let pipeline = OverlayPipeline::new(config, None);

            let start = Instant::now();
            let pb = spinner(&format!("Computing {}...", layer));
            let result = pipeline.derive(&input, layer);
            pb.finish_and_clear();
            let (_, derived) = result.with_context(|| format!("Failed to derive {}", layer))?;
            info!("Derived {} x {}", derived.cols(), derived.rows());

            let options = if double {
                GeoTiffOptions::lossless()
            } else {
                GeoTiffOptions::default()
            };
            let pb = spinner("Writing output...");
            write_geotiff(&derived, &output, Some(options)).context("Failed to write output")?;
            pb.finish_and_clear();

            println!("{} saved to: {}", layer, output.display());
            println!("  Processing time: {:.2?}", start.elapsed());
        }

        // ── Bounds ───────────────────────────────────────────────────
        Commands::Bounds { input } => {
            let bounds = raster_bounds(&input).context("Failed to read raster bounds")?;
            println!("{}", serde_json::to_string_pretty(&bounds)?);
        }
    }

    Ok(())
}
