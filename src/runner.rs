//! End-to-end weighted window runs.
//!
//! A run reads one series from a file, applies the window, and writes three
//! CSV tables next to the input (or into a chosen folder):
//!
//! - `<base>_sliced.csv`: the raw slice around every position
//! - `<base>_mult.csv`: the same slices after weighting
//! - `<base>_<statistic>.csv`: the statistic series
//!
//! `<base>` is the run name (or the input file stem), cut to 20 characters,
//! followed by the first 20 characters of the window when it is given in
//! compact form (e.g. `9xxxxx9`).
//!
//! SQLite inputs also get the statistic series stored back into the database
//! as table `<table>_<statistic>`.

use crate::analytics::calculators::Statistic;
use crate::analytics::{
    transform_detailed, transform_detailed_par, TransformError, WindowedAnalysis,
};
use crate::csv_io::{write_sliced, write_statistic, write_weighted, CsvSeriesSource};
use crate::sqlite_source::{SqliteSeriesSource, SqliteSeriesStore};
use crate::time_series::{SeriesSource, SourceError};
use crate::window_spec::{WindowError, WindowSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the folder created beside the input when no output folder is set.
pub const DEFAULT_OUTPUT_FOLDER: &str = "weighslide_output";

const NAME_LIMIT: usize = 20;

/// Configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Input file (.csv, .tsv, .db, .sqlite, .sqlite3)
    pub input: PathBuf,
    /// Window description, e.g. `"[2, 5, 2]"` or `"393x393"`
    pub window: String,
    /// Statistic name: `mean`, `sum` or `std` (default: `mean`)
    pub statistic: String,
    /// Data column; required when the input has several columns
    pub column: Option<String>,
    /// Table holding the data column (SQLite inputs only)
    pub table: Option<String>,
    /// Dataset name used in output file names
    pub name: Option<String>,
    /// Output folder (default: `weighslide_output` beside the input)
    pub output_dir: Option<PathBuf>,
    /// Replace existing output files (default: false)
    pub overwrite: bool,
    /// CSV field delimiter (default: `,`)
    pub delimiter: char,
    /// Whether CSV inputs start with a header row (default: true)
    pub has_headers: bool,
    /// Evaluate positions on the rayon thread pool (default: false)
    pub parallel: bool,
    /// Longest accepted window (default: 100)
    pub max_window_len: Option<usize>,
    /// Longest accepted input (default: 10 000)
    pub max_points: Option<usize>,
    /// Input length above which a slow-run warning is logged (default: 1 000)
    pub warn_points: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            input: PathBuf::new(),
            window: String::new(),
            statistic: "mean".to_string(),
            column: None,
            table: None,
            name: None,
            output_dir: None,
            overwrite: false,
            delimiter: ',',
            has_headers: true,
            parallel: false,
            max_window_len: Some(100),
            max_points: Some(10_000),
            warn_points: 1_000,
        }
    }
}

impl RunConfig {
    /// Creates a configuration with default settings.
    pub fn new(
        input: impl Into<PathBuf>,
        window: impl Into<String>,
        statistic: impl Into<String>,
    ) -> Self {
        RunConfig {
            input: input.into(),
            window: window.into(),
            statistic: statistic.into(),
            ..RunConfig::default()
        }
    }

    /// Parses a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, RunError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, RunError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    fn delimiter_byte(&self) -> Result<u8, RunError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(RunError::Config(format!(
                "delimiter {:?} is not a single-byte character",
                self.delimiter
            )))
        }
    }
}

/// Errors that end a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Window or statistic rejected
    Transform(TransformError),
    /// Input could not be read
    Source(SourceError),
    /// Output folder or file could not be written
    Io(String),
    /// Output table could not be written
    Csv(String),
    /// Configuration could not be parsed
    Config(String),
    /// An output file exists and overwriting is disabled
    OutputExists(PathBuf),
    /// The SQLite result table exists and overwriting is disabled
    ResultTableExists(String),
    /// Window longer than `max_window_len`
    WindowTooLong { len: usize, max: usize },
    /// Input longer than `max_points`
    InputTooLong { len: usize, max: usize },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Transform(err) => write!(f, "{}", err),
            RunError::Source(err) => write!(f, "{}", err),
            RunError::Io(msg) => write!(f, "I/O error: {}", msg),
            RunError::Csv(msg) => write!(f, "CSV error: {}", msg),
            RunError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            RunError::OutputExists(path) => write!(
                f,
                "Output file {} already exists; enable overwrite to replace it",
                path.display()
            ),
            RunError::ResultTableExists(table) => write!(
                f,
                "Result table {} already exists; enable overwrite to replace it",
                table
            ),
            RunError::WindowTooLong { len, max } => write!(
                f,
                "Window length ({}) exceeds the limit of {} positions",
                len, max
            ),
            RunError::InputTooLong { len, max } => write!(
                f,
                "Input length ({}) exceeds the limit of {} values",
                len, max
            ),
        }
    }
}

impl std::error::Error for RunError {}

impl From<TransformError> for RunError {
    fn from(err: TransformError) -> Self {
        RunError::Transform(err)
    }
}

impl From<WindowError> for RunError {
    fn from(err: WindowError) -> Self {
        RunError::Transform(TransformError::InvalidWindow(err))
    }
}

impl From<SourceError> for RunError {
    fn from(err: SourceError) -> Self {
        RunError::Source(err)
    }
}

impl From<std::io::Error> for RunError {
    fn from(err: std::io::Error) -> Self {
        RunError::Io(err.to_string())
    }
}

impl From<csv::Error> for RunError {
    fn from(err: csv::Error) -> Self {
        RunError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for RunError {
    fn from(err: serde_json::Error) -> Self {
        RunError::Config(err.to_string())
    }
}

/// Files written by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub sliced: PathBuf,
    pub weighted: PathBuf,
    pub statistic: PathBuf,
}

impl OutputPaths {
    pub fn all(&self) -> [&Path; 3] {
        [
            self.sliced.as_path(),
            self.weighted.as_path(),
            self.statistic.as_path(),
        ]
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub source: String,
    pub points: usize,
    pub window: String,
    pub window_len: usize,
    pub statistic: Statistic,
    /// Outputs computed from windows reaching past the input
    pub partial_positions: usize,
    /// Outputs with no value (no included positions)
    pub missing_outputs: usize,
    pub outputs: OutputPaths,
    /// Table holding the statistic series, for SQLite inputs
    pub result_table: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// True for compact window strings such as `393x393`.
fn is_compact_window(window: &str) -> bool {
    let trimmed = window.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c.eq_ignore_ascii_case(&'x'))
}

fn truncate(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}

/// Computes where a run with this configuration writes its tables.
pub fn output_paths(config: &RunConfig, statistic: Statistic) -> OutputPaths {
    let dir = config.output_dir.clone().unwrap_or_else(|| {
        config
            .input
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(DEFAULT_OUTPUT_FOLDER)
    });

    let name = match config.name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => truncate(name, NAME_LIMIT),
        None => config
            .input
            .file_stem()
            .map(|stem| truncate(&stem.to_string_lossy(), NAME_LIMIT))
            .unwrap_or_default(),
    };
    let window_label = if is_compact_window(&config.window) {
        truncate(config.window.trim(), NAME_LIMIT)
    } else {
        String::new()
    };
    let base = format!("{}{}", name, window_label);

    OutputPaths {
        sliced: dir.join(format!("{}_sliced.csv", base)),
        weighted: dir.join(format!("{}_mult.csv", base)),
        statistic: dir.join(format!("{}_{}.csv", base, statistic)),
        dir,
    }
}

fn input_extension(config: &RunConfig) -> String {
    config
        .input
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn is_sqlite_extension(extension: &str) -> bool {
    matches!(extension, "db" | "sqlite" | "sqlite3")
}

/// Name of the table a SQLite input's statistic series is stored in:
/// `<table>_<statistic>`. `None` for file inputs.
pub fn result_table_name(config: &RunConfig, statistic: Statistic) -> Option<String> {
    if !is_sqlite_extension(&input_extension(config)) {
        return None;
    }
    config
        .table
        .as_deref()
        .map(|table| format!("{}_{}", table, statistic))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn remove_outputs<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        if path.is_file() {
            if let Err(err) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %err, "Failed to remove incomplete output");
            }
        }
    }
}

fn stage_and_commit<'a>(
    outputs: &'a OutputPaths,
    staged: &[PathBuf; 3],
    analysis: &WindowedAnalysis,
    committed: &mut Vec<&'a Path>,
) -> Result<(), RunError> {
    write_sliced(&mut csv::Writer::from_path(&staged[0])?, analysis)?;
    write_weighted(&mut csv::Writer::from_path(&staged[1])?, analysis)?;
    write_statistic(&mut csv::Writer::from_path(&staged[2])?, analysis)?;

    for (staging, target) in staged.iter().zip(outputs.all()) {
        fs::rename(staging, target)?;
        committed.push(target);
    }
    Ok(())
}

/// Writes the three tables under staging names, then moves them into place.
/// If any step fails, every file written by this call is removed again.
fn write_outputs(outputs: &OutputPaths, analysis: &WindowedAnalysis) -> Result<(), RunError> {
    let staged = [
        staging_path(&outputs.sliced),
        staging_path(&outputs.weighted),
        staging_path(&outputs.statistic),
    ];
    let mut committed = Vec::new();

    let result = stage_and_commit(outputs, &staged, analysis, &mut committed);
    if result.is_err() {
        remove_outputs(staged.iter().map(PathBuf::as_path).chain(committed));
    }
    result
}

/// Picks the series source matching the input file extension.
///
/// # Errors
/// Returns `SourceError::UnsupportedInput` for unknown extensions (Excel
/// workbooks included) and `SourceError::MissingSetting` when a SQLite input
/// has no table or column.
pub fn source_for_config(config: &RunConfig) -> Result<Box<dyn SeriesSource>, RunError> {
    let extension = input_extension(config);

    match extension.as_str() {
        "csv" | "tsv" => {
            let delimiter = if extension == "tsv" {
                b'\t'
            } else {
                config.delimiter_byte()?
            };
            let mut source = CsvSeriesSource::new(&config.input)
                .with_delimiter(delimiter)
                .with_headers(config.has_headers);
            if let Some(column) = &config.column {
                source = source.with_column(column.clone());
            }
            Ok(Box::new(source))
        }
        ext if is_sqlite_extension(ext) => {
            let table = config
                .table
                .as_deref()
                .ok_or(SourceError::MissingSetting("table"))?;
            let column = config
                .column
                .as_deref()
                .ok_or(SourceError::MissingSetting("column"))?;
            Ok(Box::new(SqliteSeriesSource::open(&config.input, table, column)?))
        }
        _ => Err(SourceError::UnsupportedInput(config.input.clone()).into()),
    }
}

/// Runs the weighted window analysis described by `config`.
///
/// The window and statistic are validated before the input is opened, and
/// existing outputs are checked before anything is written. For SQLite
/// inputs the statistic series is also stored back into the database (see
/// [`result_table_name`]). A failed run leaves no partial outputs behind.
///
/// # Errors
/// Returns `RunError` when validation fails, the input cannot be read, an
/// output already exists without `overwrite`, or a table cannot be written.
pub fn run_weighslide(config: &RunConfig) -> Result<RunSummary, RunError> {
    let started_at = Utc::now();

    let window = WindowSpec::parse(&config.window)?;
    let statistic: Statistic = config.statistic.parse()?;
    if let Some(max) = config.max_window_len {
        if window.len() > max {
            return Err(RunError::WindowTooLong {
                len: window.len(),
                max,
            });
        }
    }

    let source = source_for_config(config)?;
    info!(
        source = %source.describe(),
        window = %window,
        statistic = %statistic,
        "Starting weighslide analysis"
    );

    let input = source.read_series()?;
    if let Some(max) = config.max_points {
        if input.len() > max {
            return Err(RunError::InputTooLong {
                len: input.len(),
                max,
            });
        }
    }
    if input.len() > config.warn_points {
        warn!(
            points = input.len(),
            "Input is long; weighted window analysis may be slow"
        );
    }

    let outputs = output_paths(config, statistic);
    if !config.overwrite {
        if let Some(existing) = outputs.all().into_iter().find(|path| path.exists()) {
            return Err(RunError::OutputExists(existing.to_path_buf()));
        }
    }
    let mut result_store = match result_table_name(config, statistic) {
        Some(table) => {
            let store = SqliteSeriesStore::open_existing(&config.input)?;
            if !config.overwrite && store.table_exists(&table)? {
                return Err(RunError::ResultTableExists(table));
            }
            Some((store, table))
        }
        None => None,
    };
    fs::create_dir_all(&outputs.dir)?;

    let analysis = if config.parallel {
        transform_detailed_par(&input, &window, statistic)
    } else {
        transform_detailed(&input, &window, statistic)
    };

    write_outputs(&outputs, &analysis)?;
    debug!(dir = %outputs.dir.display(), "Wrote output tables");

    if let Some((store, table)) = result_store.as_mut() {
        if let Err(err) = store.store_series(table.as_str(), statistic.name(), &analysis.output) {
            remove_outputs(outputs.all());
            return Err(err.into());
        }
        debug!(table = %table, "Stored statistic series");
    }

    let summary = RunSummary {
        input: config.input.clone(),
        source: source.describe(),
        points: input.len(),
        window: window.to_string(),
        window_len: window.len(),
        statistic,
        partial_positions: analysis.partial_positions().len(),
        missing_outputs: analysis.output.iter().filter(|value| value.is_none()).count(),
        outputs,
        result_table: result_store.map(|(_, table)| table),
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        points = summary.points,
        output_dir = %summary.outputs.dir.display(),
        "Weighslide analysis finished"
    );

    Ok(summary)
}
