use serde_json::Value;
use std::path::PathBuf;

/// One input value. `None` marks missing data, whether it came from a gap in
/// the source or from padding past either end of the sequence.
pub type Sample = Option<f64>;

/// Converts raw floats into samples, treating NaN as missing.
pub fn samples_from_f64(values: &[f64]) -> Vec<Sample> {
    values
        .iter()
        .map(|&value| if value.is_nan() { None } else { Some(value) })
        .collect()
}

/// Renders samples as floats with missing values as NaN.
pub fn samples_to_f64(samples: &[Sample]) -> Vec<f64> {
    samples.iter().map(|sample| sample.unwrap_or(f64::NAN)).collect()
}

/// Parses a JSON array of numbers (or `null` for missing values), e.g.
/// `"[1, 3, null, 7.5]"`.
///
/// # Errors
/// Returns `SourceError::InvalidRawData` if the text is not a JSON array of
/// numbers and nulls.
pub fn parse_raw_series(raw: &str) -> Result<Vec<Sample>, SourceError> {
    let parsed: Value = serde_json::from_str(raw.trim())
        .map_err(|e| SourceError::InvalidRawData(e.to_string()))?;

    let items = parsed.as_array().ok_or_else(|| {
        SourceError::InvalidRawData("expected a JSON array of numbers".to_string())
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Null => Ok(None),
            Value::Number(number) => number.as_f64().map(Some).ok_or_else(|| {
                SourceError::InvalidRawData(format!("value {} at index {} is not a float", number, index))
            }),
            other => Err(SourceError::InvalidRawData(format!(
                "value {} at index {} is not a number",
                other, index
            ))),
        })
        .collect()
}

/// Trait for data source abstraction.
///
/// The transform engine only consumes in-memory sequences; implementations
/// of this trait turn files, databases or literals into one.
pub trait SeriesSource {
    /// Reads the full sequence in source order.
    ///
    /// # Errors
    /// Returns an error if the source cannot be opened, the requested column
    /// cannot be resolved, or a value cannot be interpreted as a number.
    fn read_series(&self) -> Result<Vec<Sample>, SourceError>;

    /// Short description used in logs and run summaries.
    fn describe(&self) -> String;
}

/// Errors that can occur when reading a series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Underlying file could not be read
    Io(String),
    /// Input file does not exist
    InputNotFound(PathBuf),
    /// Malformed CSV
    Csv(String),
    /// SQLite query failed
    Sqlite(String),
    /// The file holds several columns and none was selected
    ColumnRequired { path: PathBuf, columns: usize },
    /// The selected table does not exist
    TableNotFound(String),
    /// The selected column does not exist
    ColumnNotFound(String),
    /// A cell could not be parsed as a number
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    /// Table or column name is not a plain identifier
    InvalidIdentifier(String),
    /// File type is not supported
    UnsupportedInput(PathBuf),
    /// Raw literal data could not be parsed
    InvalidRawData(String),
    /// Required setting missing for this kind of source
    MissingSetting(&'static str),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(msg) => write!(f, "I/O error: {}", msg),
            SourceError::InputNotFound(path) => {
                write!(f, "Input file not found: {}", path.display())
            }
            SourceError::Csv(msg) => write!(f, "CSV error: {}", msg),
            SourceError::Sqlite(msg) => write!(f, "SQLite error: {}", msg),
            SourceError::ColumnRequired { path, columns } => write!(
                f,
                "Input file {} has {} columns; select the data column by name",
                path.display(),
                columns
            ),
            SourceError::TableNotFound(table) => write!(f, "Table not found: {}", table),
            SourceError::ColumnNotFound(column) => write!(f, "Column not found: {}", column),
            SourceError::InvalidValue { row, column, value } => write!(
                f,
                "Value {:?} in row {} of column {} is not a number",
                value, row, column
            ),
            SourceError::InvalidIdentifier(name) => {
                write!(f, "Invalid table or column name: {:?}", name)
            }
            SourceError::UnsupportedInput(path) => write!(
                f,
                "Unsupported input {}: expected a .csv, .tsv, .db, .sqlite or .sqlite3 file",
                path.display()
            ),
            SourceError::InvalidRawData(msg) => write!(f, "Invalid raw data: {}", msg),
            SourceError::MissingSetting(setting) => {
                write!(f, "Missing setting for this input: {}", setting)
            }
        }
    }
}

impl std::error::Error for SourceError {}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err.to_string())
    }
}

impl From<csv::Error> for SourceError {
    fn from(err: csv::Error) -> Self {
        SourceError::Csv(err.to_string())
    }
}

impl From<rusqlite::Error> for SourceError {
    fn from(err: rusqlite::Error) -> Self {
        SourceError::Sqlite(err.to_string())
    }
}

/// In-memory series, mostly for tests and raw command-line data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemorySeries {
    samples: Vec<Sample>,
}

impl InMemorySeries {
    pub fn new(samples: Vec<Sample>) -> Self {
        InMemorySeries { samples }
    }

    /// Builds a series from floats; NaN becomes missing.
    pub fn from_f64(values: &[f64]) -> Self {
        InMemorySeries {
            samples: samples_from_f64(values),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SeriesSource for InMemorySeries {
    fn read_series(&self) -> Result<Vec<Sample>, SourceError> {
        Ok(self.samples.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory series ({} values)", self.samples.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_becomes_missing() {
        let samples = samples_from_f64(&[1.0, f64::NAN, 3.0]);
        assert_eq!(samples, vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_missing_renders_as_nan() {
        let rendered = samples_to_f64(&[Some(2.0), None]);
        assert_eq!(rendered[0], 2.0);
        assert!(rendered[1].is_nan());
    }

    #[test]
    fn test_raw_series_accepts_numbers_and_nulls() {
        let samples = parse_raw_series("[1, 3.5, null, -7]").unwrap();
        assert_eq!(samples, vec![Some(1.0), Some(3.5), None, Some(-7.0)]);
        assert_eq!(parse_raw_series("[]").unwrap(), Vec::<Sample>::new());
    }

    #[test]
    fn test_raw_series_rejects_non_numbers() {
        assert!(matches!(
            parse_raw_series("[1, \"a\"]"),
            Err(SourceError::InvalidRawData(_))
        ));
        assert!(matches!(
            parse_raw_series("{\"a\": 1}"),
            Err(SourceError::InvalidRawData(_))
        ));
        assert!(matches!(
            parse_raw_series("[1, 2"),
            Err(SourceError::InvalidRawData(_))
        ));
    }

    #[test]
    fn test_in_memory_series_round_trips() {
        let source = InMemorySeries::from_f64(&[1.0, f64::NAN]);
        assert_eq!(source.len(), 2);
        assert_eq!(source.read_series().unwrap(), vec![Some(1.0), None]);
        assert!(source.describe().contains("2 values"));
    }
}
