//! Command-line frontend for the reachmap pipeline: `precompute` builds
//! traveltime and opportunity matrices from file-backed sources, `heatmap`
//! queries them into a GeoJSON layer.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::{Args, Parser, Subcommand};
use reachmap_core::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_INVALID_ARGS: u8 = 2;
const EXIT_MISSING_DATA: u8 = 3;
const EXIT_CACHE_WRITE: u8 = 4;

#[derive(Parser)]
#[command(name = "reachmap", version, about = "Accessibility heatmap pipeline")]
struct Cli {
    /// Root directory for matrix archives.
    #[arg(long, env = "CACHE_ROOT", default_value = "cache", global = true)]
    cache_root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build traveltime and opportunity matrices for the study areas.
    Precompute(PrecomputeArgs),
    /// Query the precomputed matrices into a heatmap layer.
    Heatmap(HeatmapArgs),
}

#[derive(Args)]
struct PrecomputeArgs {
    /// GeoJSON feature collection of study-area polygons.
    #[arg(long)]
    study_areas: PathBuf,
    /// CSV edge list of the routing network.
    #[arg(long)]
    edges: PathBuf,
    /// CSV of points of interest.
    #[arg(long)]
    pois: PathBuf,
    #[arg(long, default_value = "walking")]
    mode: String,
    #[arg(long, default_value = "standard")]
    profile: String,
    /// Travel-time budget in minutes.
    #[arg(long, default_value_t = 20)]
    max_time: u32,
    /// Travel speed in km/h; defaults to the mode's standard speed.
    #[arg(long)]
    speed: Option<f64>,
    /// Restrict the opportunity stage to these categories.
    #[arg(long, value_delimiter = ',')]
    categories: Option<Vec<String>>,
    /// Write the bulk-cell coverage to this GeoJSON file for inspection.
    #[arg(long)]
    dump_coverage: Option<PathBuf>,
}

#[derive(Args)]
struct HeatmapArgs {
    /// GeoJSON feature collection of study-area polygons.
    #[arg(long)]
    study_areas: PathBuf,
    /// POI categories to aggregate.
    #[arg(long, value_delimiter = ',', required = true)]
    categories: Vec<String>,
    #[arg(long, default_value = "walking")]
    mode: String,
    #[arg(long, default_value = "standard")]
    profile: String,
    /// Maximum travel time in minutes.
    #[arg(long, default_value_t = 20)]
    max_time: u32,
    #[arg(long, default_value = "min")]
    aggregation: String,
    /// Output GeoJSON file.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ReachmapConfig::from_env();
    config.cache_root = cli.cache_root.clone();

    let result = match cli.command {
        Command::Precompute(args) => run_precompute(&config, &args),
        Command::Heatmap(args) => run_heatmap(&config, &args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(exit) => {
            error!("{}", exit.message);
            ExitCode::from(exit.code)
        }
    }
}

struct CliFailure {
    code: u8,
    message: String,
}

impl CliFailure {
    fn new(code: u8, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

fn run_precompute(config: &ReachmapConfig, args: &PrecomputeArgs) -> Result<(), CliFailure> {
    let mode: Mode = parse_arg(&args.mode)?;
    let profile: Profile = parse_arg(&args.profile)?;

    let study_areas = load_study_areas(&args.study_areas)
        .map_err(|e| CliFailure::new(EXIT_MISSING_DATA, format!("study areas: {e}")))?;
    let edge_list = load_edge_list(&args.edges)
        .map_err(|e| CliFailure::new(EXIT_MISSING_DATA, format!("edges: {e}")))?;
    let pois = load_pois(&args.pois)
        .map_err(|e| CliFailure::new(EXIT_MISSING_DATA, format!("pois: {e}")))?;

    let network = MemoryNetwork::new(edge_list, config.max_snap_distance_m);
    let poi_source = MemoryPoiSource::new(pois);
    let store = MatrixStore::new(&config.cache_root);

    if let Some(path) = &args.dump_coverage {
        dump_coverage(config, &study_areas, args, mode, path)?;
    }

    let request = PrecomputeRequest {
        mode,
        profile,
        max_travel_time_min: args.max_time,
        speed_mps: args.speed.map(|kmh| kmh / 3.6),
        categories: args.categories.clone(),
    };

    let cancel = AtomicBool::new(false);
    let summary = Precompute::new(&network, &poi_source, &store, config)
        .run(&study_areas, &request, &cancel)
        .map_err(map_pipeline_error)?;

    info!(
        "precompute: {} bulk cells completed, {} skipped, {} write failures",
        summary.completed(),
        summary.skipped(),
        summary.write_failures()
    );
    if summary.write_failures() > 0 {
        return Err(CliFailure::new(
            EXIT_CACHE_WRITE,
            "one or more archives could not be written",
        ));
    }
    if summary.completed() == 0 {
        return Err(CliFailure::new(
            EXIT_MISSING_DATA,
            "no bulk cell produced a traveltime matrix",
        ));
    }
    Ok(())
}

fn run_heatmap(config: &ReachmapConfig, args: &HeatmapArgs) -> Result<(), CliFailure> {
    let store = MatrixStore::new(&config.cache_root);
    let study_areas = load_study_areas(&args.study_areas)
        .map_err(|e| CliFailure::new(EXIT_MISSING_DATA, format!("study areas: {e}")))?;

    let request = HeatmapRequest {
        mode: parse_arg(&args.mode)?,
        profile: parse_arg(&args.profile)?,
        max_travel_time_min: args.max_time,
        categories: args.categories.clone(),
        aggregation: parse_arg(&args.aggregation)?,
    };

    let result = read_heatmap(&store, &study_areas, &request, config).map_err(map_pipeline_error)?;
    if result.coverage_ratio == 0.0 {
        return Err(CliFailure::new(
            EXIT_MISSING_DATA,
            "no opportunity archives found for the query region; run `precompute` first",
        ));
    }

    let body = serde_json::to_string_pretty(&result.collection)
        .map_err(|e| CliFailure::new(EXIT_CACHE_WRITE, e.to_string()))?;
    fs::write(&args.out, body)
        .map_err(|e| CliFailure::new(EXIT_CACHE_WRITE, format!("{}: {e}", args.out.display())))?;

    info!(
        "wrote {} features to {} (coverage {:.2})",
        result.collection.features.len(),
        args.out.display(),
        result.coverage_ratio
    );
    Ok(())
}

fn dump_coverage(
    config: &ReachmapConfig,
    study_areas: &[StudyArea],
    args: &PrecomputeArgs,
    mode: Mode,
    path: &PathBuf,
) -> Result<(), CliFailure> {
    let speed_mps = args.speed.map_or(mode.default_speed_mps(), |kmh| kmh / 3.6);
    let buffer_m = speed_mps * f64::from(args.max_time) * 60.0;

    let cells =
        reachmap_core::tiling::cover_study_areas(study_areas, config.bulk_resolution, buffer_m)
            .map_err(map_pipeline_error)?;
    let collection = reachmap_core::tiling::coverage_geojson(&cells).map_err(map_pipeline_error)?;

    let body = serde_json::to_string_pretty(&collection)
        .map_err(|e| CliFailure::new(EXIT_CACHE_WRITE, e.to_string()))?;
    fs::write(path, body)
        .map_err(|e| CliFailure::new(EXIT_CACHE_WRITE, format!("{}: {e}", path.display())))?;
    info!("wrote bulk coverage ({} cells) to {}", cells.len(), path.display());
    Ok(())
}

fn parse_arg<T>(raw: &str) -> Result<T, CliFailure>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| CliFailure::new(EXIT_INVALID_ARGS, format!("{e}")))
}

fn map_pipeline_error(e: Error) -> CliFailure {
    let code = match &e {
        Error::InvalidResolution { .. } | Error::UnsupportedGeometry(_) | Error::InvalidData(_) => {
            EXIT_INVALID_ARGS
        }
        Error::ArchiveIo(_) | Error::ArchiveCorrupt(_) => EXIT_CACHE_WRITE,
        _ => EXIT_MISSING_DATA,
    };
    CliFailure::new(code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_documented_exit_codes() {
        let invalid = map_pipeline_error(Error::InvalidResolution { bulk: 8, calc: 6 });
        assert_eq!(invalid.code, EXIT_INVALID_ARGS);

        let missing = map_pipeline_error(Error::RegionEmpty);
        assert_eq!(missing.code, EXIT_MISSING_DATA);

        let io = map_pipeline_error(Error::ArchiveIo(std::io::Error::other("disk full")));
        assert_eq!(io.code, EXIT_CACHE_WRITE);
    }

    #[test]
    fn cli_declares_both_subcommands() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
