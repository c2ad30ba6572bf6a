//! Map Tile Downloader CLI
//!
//! Downloads map tiles for polygons or the world basemap into the tile cache
//! and mirrors them into an output directory.

use clap::{Args as ClapArgs, Parser, Subcommand};
use map_tile_downloader::{
    DownloadConfig, DownloadRequest, DownloadSession, Downloader, MapSources, Paths,
    ProgressSink, Ring, SessionError, SessionSummary, TileDownloaderError, TracingSink,
    WorldDownloadRequest,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "map-tile-downloader")]
#[command(about = "Download and cache raster map tiles", long_about = None)]
struct Cli {
    /// Base directory holding `tile-cache/` and `config/`
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Map sources JSON (defaults to <base-dir>/config/map_sources.json)
    #[arg(long)]
    sources: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download tiles covering polygons or a bounding box
    Download {
        #[command(flatten)]
        target: TargetArgs,

        /// JSON file with a list of rings of [lat, lng] pairs
        #[arg(long, conflicts_with = "bbox", required_unless_present = "bbox")]
        polygons: Option<PathBuf>,

        /// Bounding box as SOUTH WEST NORTH EAST
        #[arg(long, num_args = 4, allow_negative_numbers = true)]
        bbox: Option<Vec<f64>>,

        /// Lowest zoom level
        #[arg(long, default_value = "0")]
        min_zoom: u8,

        /// Highest zoom level (max 19)
        #[arg(long)]
        max_zoom: u8,
    },
    /// Download the world basemap, zoom 0 to 7
    World {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List configured map styles
    Styles,
    /// List cached tiles of a style as z/x/y
    Cached {
        /// Style name
        style: String,
    },
    /// Delete a style's cache
    Purge {
        /// Style name
        style: String,
    },
    /// Print the default output directory
    DefaultOutput,
}

#[derive(ClapArgs)]
struct TargetArgs {
    /// Map style name or URL template from the sources file
    #[arg(long)]
    style: String,

    /// Reduce tiles to a 256-color palette
    #[arg(long)]
    eight_bit: bool,

    /// Also write packed RGB565 .bin files (implies --eight-bit)
    #[arg(long)]
    rgb565: bool,

    /// Output root (defaults to the default output directory)
    #[arg(long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let sources_path = cli
        .sources
        .clone()
        .unwrap_or_else(|| cli.base_dir.join("config").join("map_sources.json"));
    let sources = MapSources::load(&sources_path).map_err(|e| e.to_string())?;
    let paths = Paths::under(&cli.base_dir);
    let downloader = Downloader::with_default_client(sources, paths, DownloadConfig::default())
        .map_err(|e| e.to_string())?;

    match cli.command {
        Command::Download {
            target,
            polygons,
            bbox,
            min_zoom,
            max_zoom,
        } => {
            let rings = match (polygons, bbox) {
                (Some(path), _) => load_polygons(&path)?,
                (None, Some(bbox)) => vec![bbox_ring(&bbox)?],
                (None, None) => return Err("Either --polygons or --bbox is required".to_string()),
            };
            let mut request =
                DownloadRequest::new(rings, min_zoom, max_zoom, style_url(&downloader, &target.style))
                    .with_conversion(target.eight_bit, target.rgb565);
            request.output_dir = target.output;

            let session = downloader.prepare(&request).await.map_err(rejected)?;
            let summary = run_cancellable(&downloader, session).await;
            print_summary(&summary);
        }
        Command::World { target } => {
            let mut request = WorldDownloadRequest::new(style_url(&downloader, &target.style))
                .with_conversion(target.eight_bit, target.rgb565);
            request.output_dir = target.output;

            let session = downloader.prepare_world(&request).await.map_err(rejected)?;
            let summary = run_cancellable(&downloader, session).await;
            print_summary(&summary);
        }
        Command::Styles => {
            for (name, url) in downloader.list_styles() {
                println!("{:<30} {}", name, url);
            }
        }
        Command::Cached { style } => {
            let tiles = downloader
                .list_cached_tiles(&style)
                .await
                .map_err(|e| e.to_string())?;
            for [z, x, y] in &tiles {
                println!("{}/{}/{}", z, x, y);
            }
            eprintln!("{} cached tiles", tiles.len());
        }
        Command::Purge { style } => {
            if downloader
                .delete_style_cache(&style)
                .await
                .map_err(|e| e.to_string())?
            {
                println!("Deleted cache for '{}'", style);
            } else {
                return Err(format!("No cache found for '{}'", style));
            }
        }
        Command::DefaultOutput => {
            println!("{}", downloader.default_output_dir().display());
        }
    }

    Ok(())
}

fn sink() -> Arc<dyn ProgressSink> {
    Arc::new(TracingSink)
}

/// Accept either a configured style name or its URL template
fn style_url(downloader: &Downloader, style: &str) -> String {
    downloader
        .sources()
        .url_for(style)
        .unwrap_or(style)
        .to_string()
}

fn load_polygons(path: &Path) -> Result<Vec<Ring>, String> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&json).map_err(|e| format!("Invalid polygons in {}: {}", path.display(), e))
}

fn bbox_ring(bbox: &[f64]) -> Result<Ring, String> {
    let &[south, west, north, east] = bbox else {
        return Err("--bbox takes exactly four numbers".to_string());
    };
    Ok(vec![
        [south, west],
        [north, west],
        [north, east],
        [south, east],
        [south, west],
    ])
}

fn rejected(err: TileDownloaderError) -> String {
    SessionError::from(err).message()
}

/// Drive a prepared session, turning Ctrl-C into a cooperative cancel
///
/// The session is armed before the handler is installed, so an early Ctrl-C
/// still reaches it.
async fn run_cancellable(downloader: &Downloader, session: DownloadSession) -> SessionSummary {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        eprintln!("Cancelling, waiting for in-flight tiles...");
    };
    downloader.run_until(session, sink(), ctrl_c).await
}

fn print_summary(summary: &SessionSummary) {
    println!("Style:       {}", summary.style);
    println!("Output:      {}", summary.output_dir.display());
    println!("Tiles:       {}", summary.total_tiles);
    println!("Downloaded:  {}", summary.downloaded);
    println!("Cached:      {}", summary.skipped);
    println!("Converted:   {}", summary.converted);
    println!("Failed:      {}", summary.failed);
    if summary.cancelled {
        println!("Cancelled:   {} tiles not started", summary.not_started);
    }
    println!(
        "Elapsed:     {:.1}s",
        summary.duration().num_milliseconds() as f64 / 1000.0
    );
}
