//! geocurve: command-line driver for the curve detectors.
//!
//! Reads a JSON input, runs one detector and writes the resulting curve
//! set as JSON, optionally also as SVG.
//!
//! # Usage
//!
//! ```text
//! geocurve trend-lines points.json --max-distance 15 --damping 0.75
//! geocurve edges grid.json --sigma 2 --line-length 5 --svg edges.svg
//! geocurve contours grid.json --interval-min 0 --interval-max 500 --interval-spacing 50
//! ```
//!
//! `trend-lines` reads a [`PartsSource`] (`vertices`, optional `parts`
//! and `labels`); `edges` and `contours` read a [`GridData`].

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use geocurve_export::SvgMetadata;
use geocurve_pipeline::{
    AzimuthFilter, ContourConfig, CurveError, CurveSet, DetectionConfig, EdgeDetectionConfig,
    GridData, PartsSource,
};
use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Detect trend lines, edges and contours in geoscience data.
#[derive(Parser)]
#[command(name = "geocurve", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write the curve set JSON to this file instead of stdout.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Also write the curves as SVG.
    #[arg(long, global = true)]
    svg: Option<PathBuf>,

    /// Full detector config as a JSON string.
    ///
    /// When provided, all other parameter flags of the subcommand are
    /// ignored. The JSON must match the detector's config serialization.
    #[arg(long, global = true)]
    config_json: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Connect labeled points across parts into trend lines.
    TrendLines(TrendLineArgs),
    /// Detect straight edges in a grid.
    Edges(EdgeArgs),
    /// Trace iso-value contours of a grid.
    Contours(ContourArgs),
}

#[derive(Args)]
struct TrendLineArgs {
    /// Path to the points JSON.
    input: PathBuf,

    /// Minimum number of edges per trend line.
    #[arg(long, default_value_t = DetectionConfig::DEFAULT_MIN_EDGES)]
    min_edges: usize,

    /// Ignore connections longer than this.
    #[arg(long)]
    max_distance: Option<f64>,

    /// Straightness vs. proximity weight, 0 (straight) to 1 (nearest).
    #[arg(long, default_value_t = DetectionConfig::DEFAULT_DAMPING)]
    damping: f64,

    /// Keep connections aligned with this azimuth (degrees from north).
    #[arg(long, requires = "azimuth_tol", allow_negative_numbers = true)]
    azimuth: Option<f64>,

    /// Allowed deviation from `--azimuth` in degrees.
    #[arg(long, requires = "azimuth")]
    azimuth_tol: Option<f64>,

    /// Label whose points are never connected.
    #[arg(long, allow_negative_numbers = true)]
    background: Option<i64>,

    /// Name of the per-vertex label array in the output.
    #[arg(long, default_value = "label")]
    data_name: String,
}

#[derive(Args)]
struct EdgeArgs {
    /// Path to the grid JSON.
    input: PathBuf,

    /// Minimum segment length in pixels.
    #[arg(long, default_value_t = EdgeDetectionConfig::DEFAULT_LINE_LENGTH)]
    line_length: u32,

    /// Maximum gap in pixels within one segment.
    #[arg(long, default_value_t = EdgeDetectionConfig::DEFAULT_LINE_GAP)]
    line_gap: u32,

    /// Gaussian blur sigma.
    #[arg(long, default_value_t = EdgeDetectionConfig::DEFAULT_SIGMA)]
    sigma: f32,

    /// Minimum Hough votes per line.
    #[arg(long, default_value_t = EdgeDetectionConfig::DEFAULT_THRESHOLD)]
    threshold: u32,

    /// Tile width in pixels.
    #[arg(long)]
    window_size: Option<u32>,

    /// Merge endpoints closer than this world distance.
    #[arg(long)]
    merge_length: Option<f64>,

    /// Canny low threshold, as a gradient-magnitude quantile in [0, 1].
    #[arg(long, default_value_t = EdgeDetectionConfig::DEFAULT_CANNY_LOW)]
    canny_low: f32,

    /// Canny high threshold, as a gradient-magnitude quantile in [0, 1].
    #[arg(long, default_value_t = EdgeDetectionConfig::DEFAULT_CANNY_HIGH)]
    canny_high: f32,
}

#[derive(Args)]
struct ContourArgs {
    /// Path to the grid JSON.
    input: PathBuf,

    /// First interval level.
    #[arg(long, allow_negative_numbers = true)]
    interval_min: Option<f64>,

    /// Last interval level (inclusive).
    #[arg(long, allow_negative_numbers = true)]
    interval_max: Option<f64>,

    /// Step between interval levels.
    #[arg(long)]
    interval_spacing: Option<f64>,

    /// Extra level to trace; repeatable.
    #[arg(long = "fixed-contour", allow_negative_numbers = true)]
    fixed_contours: Vec<f64>,
}

/// Everything that can stop a run.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error parsing --config-json: {0}")]
    ConfigJson(serde_json::Error),

    #[error("error serializing output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Curve(#[from] CurveError),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse `--config-json` if given, otherwise build the config from flags.
fn config_or<T: DeserializeOwned>(
    config_json: Option<&str>,
    from_flags: impl FnOnce() -> Result<T, CliError>,
) -> Result<T, CliError> {
    match config_json {
        Some(json) => serde_json::from_str(json).map_err(CliError::ConfigJson),
        None => from_flags(),
    }
}

fn detection_config(args: &TrendLineArgs) -> Result<DetectionConfig, CliError> {
    let azimuth = args
        .azimuth
        .zip(args.azimuth_tol)
        .map(|(azimuth, tolerance)| AzimuthFilter::try_new(azimuth, tolerance))
        .transpose()?;
    Ok(DetectionConfig::try_new(
        args.min_edges,
        args.max_distance,
        args.damping,
        azimuth,
    )?)
}

const fn edge_config(args: &EdgeArgs) -> EdgeDetectionConfig {
    EdgeDetectionConfig {
        line_length: args.line_length,
        line_gap: args.line_gap,
        sigma: args.sigma,
        threshold: args.threshold,
        window_size: args.window_size,
        merge_length: args.merge_length,
        canny_low: args.canny_low,
        canny_high: args.canny_high,
    }
}

fn contour_config(args: &ContourArgs) -> ContourConfig {
    ContourConfig {
        interval_min: args.interval_min,
        interval_max: args.interval_max,
        interval_spacing: args.interval_spacing,
        fixed_contours: args.fixed_contours.clone(),
    }
}

/// Run the selected detector; `None` when it found nothing.
///
/// Also returns the input path and the effective config as JSON for the
/// SVG metadata.
fn detect(cli: &Cli) -> Result<(Option<CurveSet>, &Path, String), CliError> {
    let config_json = cli.config_json.as_deref();
    match &cli.command {
        Command::TrendLines(args) => {
            let config = config_or(config_json, || detection_config(args))?;
            let source: PartsSource = read_json(&args.input)?;
            let connections = geocurve_pipeline::connect_parts(&source, &config, args.background)?;
            let set = connections.into_curve_set(&args.data_name)?;
            Ok((set, args.input.as_path(), to_json(&config)?))
        }
        Command::Edges(args) => {
            let config = config_or(config_json, || Ok(edge_config(args)))?;
            let source: GridData = read_json(&args.input)?;
            let set = geocurve_pipeline::detect_edges(&source, &config)?;
            Ok((set, args.input.as_path(), to_json(&config)?))
        }
        Command::Contours(args) => {
            let config = config_or(config_json, || Ok(contour_config(args)))?;
            let source: GridData = read_json(&args.input)?;
            let set = geocurve_pipeline::detect_contours(&source, &config)?;
            Ok((Some(set), args.input.as_path(), to_json(&config)?))
        }
    }
}

fn to_json(value: &impl Serialize) -> Result<String, CliError> {
    Ok(serde_json::to_string(value)?)
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let (set, input, config_json) = detect(cli)?;
    write_outputs(cli, set.as_ref(), input, &config_json)?;
    Ok(())
}

/// Write the curve set as JSON and, if requested, SVG.
///
/// Nothing is written when detection found no curves; returns whether
/// output was produced.
fn write_outputs(
    cli: &Cli,
    set: Option<&CurveSet>,
    input: &Path,
    config_json: &str,
) -> Result<bool, CliError> {
    let Some(set) = set else {
        warn!("no curves found in {}; nothing written", input.display());
        return Ok(false);
    };

    let json = serde_json::to_string_pretty(set)?;
    match &cli.output {
        Some(path) => {
            write_file(path, &json)?;
            info!("curve set written to {}", path.display());
        }
        None => println!("{json}"),
    }

    if let Some(ref svg_path) = cli.svg {
        let title = input.file_stem().and_then(|s| s.to_str());
        let svg = geocurve_export::to_svg(
            set,
            &SvgMetadata {
                title,
                description: None,
                config_json: Some(config_json),
            },
        );
        write_file(svg_path, &svg)?;
        info!("SVG written to {}", svg_path.display());
    }

    Ok(true)
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn trend_line_flags_build_config() {
        let cli = parse(&[
            "geocurve",
            "trend-lines",
            "points.json",
            "--min-edges",
            "3",
            "--max-distance",
            "15",
            "--damping",
            "0.75",
            "--azimuth",
            "5",
            "--azimuth-tol",
            "10",
        ]);
        let Command::TrendLines(args) = &cli.command else {
            unreachable!("parsed as trend-lines");
        };
        let config = detection_config(args).unwrap();
        assert_eq!(config.min_edges, 3);
        assert_eq!(config.max_distance, Some(15.0));
        assert_eq!(config.azimuth, Some(AzimuthFilter::try_new(5.0, 10.0).unwrap()));
    }

    #[test]
    fn azimuth_requires_tolerance() {
        assert!(
            Cli::try_parse_from(["geocurve", "trend-lines", "p.json", "--azimuth", "5"]).is_err()
        );
    }

    #[test]
    fn invalid_damping_is_rejected() {
        let cli = parse(&["geocurve", "trend-lines", "p.json", "--damping", "2"]);
        let Command::TrendLines(args) = &cli.command else {
            unreachable!("parsed as trend-lines");
        };
        assert!(matches!(
            detection_config(args),
            Err(CliError::Curve(CurveError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn config_json_overrides_flags() {
        let config: EdgeDetectionConfig =
            config_or(Some(r#"{"sigma": 2.5}"#), || Ok(EdgeDetectionConfig::default())).unwrap();
        assert!((config.sigma - 2.5).abs() < f32::EPSILON);
        assert_eq!(config.canny_high, EdgeDetectionConfig::DEFAULT_CANNY_HIGH);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let result: Result<DetectionConfig, _> =
            config_or(Some(r#"{"azimuth": 5.0}"#), || Ok(DetectionConfig::default()));
        assert!(matches!(result, Err(CliError::ConfigJson(_))));
    }

    #[test]
    fn repeated_fixed_contours() {
        let cli = parse(&[
            "geocurve",
            "contours",
            "grid.json",
            "--fixed-contour",
            "100",
            "--fixed-contour",
            "-20",
        ]);
        let Command::Contours(args) = &cli.command else {
            unreachable!("parsed as contours");
        };
        assert_eq!(contour_config(args).fixed_contours, vec![100.0, -20.0]);
    }

    #[test]
    fn empty_result_writes_nothing() {
        let dir = std::env::temp_dir().join(format!("geocurve-empty-{}", std::process::id()));
        let output = dir.join("curves.json");
        let svg = dir.join("curves.svg");
        let cli = parse(&[
            "geocurve",
            "--output",
            output.to_str().unwrap(),
            "--svg",
            svg.to_str().unwrap(),
            "trend-lines",
            "points.json",
        ]);
        let written = write_outputs(&cli, None, Path::new("points.json"), "{}").unwrap();
        assert!(!written);
        assert!(!output.exists());
        assert!(!svg.exists());
    }

    #[test]
    fn found_curves_are_written() {
        let dir = std::env::temp_dir().join(format!("geocurve-found-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let output = dir.join("curves.json");
        let cli = parse(&["geocurve", "--output", output.to_str().unwrap(), "edges", "grid.json"]);
        let set = CurveSet::new(
            vec![
                geocurve_pipeline::Point::new(0.0, 0.0),
                geocurve_pipeline::Point::new(1.0, 1.0),
            ],
            vec![[0, 1]],
        )
        .unwrap();
        let written = write_outputs(&cli, Some(&set), Path::new("grid.json"), "{}").unwrap();
        assert!(written);
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("vertices"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_input_is_a_read_error() {
        let result: Result<GridData, _> = read_json(Path::new("/nonexistent/grid.json"));
        assert!(matches!(result, Err(CliError::Read { .. })));
    }
}
