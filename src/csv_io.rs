//! CSV input and output for weighted window runs.
//!
//! Input: a single numeric column, selected by header name when the file
//! holds several. Output: three tables per run, the raw slices, the
//! weighted slices and the statistic series.

use crate::analytics::weighting::WeightedValue;
use crate::analytics::WindowedAnalysis;
use crate::time_series::{Sample, SeriesSource, SourceError};
use csv::{ReaderBuilder, StringRecord, Writer};
use std::io;
use std::path::{Path, PathBuf};

/// Rendering of a missing sample in the slice tables.
pub const NODATA: &str = "nodata";

/// Rendering of an ignored offset in the weighted table.
pub const IGNORED: &str = "x";

/// Cell texts read as missing values (compared case-insensitively).
const MISSING_CELLS: [&str; 5] = ["", "nan", "na", "null", NODATA];

fn parse_cell(row: usize, column: &str, raw: &str) -> Result<Sample, SourceError> {
    let trimmed = raw.trim();
    if MISSING_CELLS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        return Ok(None);
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_nan() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(SourceError::InvalidValue {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Reads one column of a delimited text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSeriesSource {
    path: PathBuf,
    column: Option<String>,
    delimiter: u8,
    has_headers: bool,
}

impl CsvSeriesSource {
    /// Creates a comma-delimited source with a header row.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvSeriesSource {
            path: path.into(),
            column: None,
            delimiter: b',',
            has_headers: true,
        }
    }

    /// Selects the data column by header name, or by zero-based index when
    /// the file has no header row.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, has_headers: bool) -> Self {
        self.has_headers = has_headers;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves the index and display label of the data column.
    fn resolve_column(
        &self,
        headers: Option<&StringRecord>,
        width: usize,
    ) -> Result<(usize, String), SourceError> {
        let Some(column) = &self.column else {
            if width == 1 {
                let label = headers
                    .and_then(|h| h.get(0))
                    .unwrap_or("0")
                    .to_string();
                return Ok((0, label));
            }
            return Err(SourceError::ColumnRequired {
                path: self.path.clone(),
                columns: width,
            });
        };

        if let Some(headers) = headers {
            if let Some(index) = headers.iter().position(|h| h.trim() == column.trim()) {
                return Ok((index, column.clone()));
            }
        }

        column
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|&index| index < width)
            .map(|index| (index, column.clone()))
            .ok_or_else(|| SourceError::ColumnNotFound(column.clone()))
    }
}

impl SeriesSource for CsvSeriesSource {
    fn read_series(&self) -> Result<Vec<Sample>, SourceError> {
        if !self.path.is_file() {
            return Err(SourceError::InputNotFound(self.path.clone()));
        }
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_headers)
            .from_path(&self.path)?;

        let headers = if self.has_headers {
            Some(reader.headers()?.clone())
        } else {
            None
        };
        let records: Vec<StringRecord> = reader.records().collect::<Result<_, _>>()?;

        let width = headers
            .as_ref()
            .map(StringRecord::len)
            .or_else(|| records.first().map(StringRecord::len))
            .unwrap_or(0);
        if width == 0 {
            return Ok(Vec::new());
        }

        let (index, label) = self.resolve_column(headers.as_ref(), width)?;

        records
            .iter()
            .enumerate()
            .map(|(row, record)| parse_cell(row, &label, record.get(index).unwrap_or("")))
            .collect()
    }

    fn describe(&self) -> String {
        match &self.column {
            Some(column) => format!("{} (column {})", self.path.display(), column),
            None => self.path.display().to_string(),
        }
    }
}

fn render_sample(sample: &Sample) -> String {
    match sample {
        Some(value) => value.to_string(),
        None => NODATA.to_string(),
    }
}

fn render_weighted(value: &WeightedValue) -> String {
    match value {
        WeightedValue::Value(value) => value.to_string(),
        WeightedValue::Missing => NODATA.to_string(),
        WeightedValue::Ignored => IGNORED.to_string(),
    }
}

fn slice_header(columns: usize) -> Vec<String> {
    std::iter::once("offset".to_string())
        .chain((0..columns).map(|index| format!("window {}", index)))
        .collect()
}

/// Writes the raw slices: one row per window offset, one column per input
/// position.
pub fn write_sliced<W: io::Write>(
    writer: &mut Writer<W>,
    analysis: &WindowedAnalysis,
) -> csv::Result<()> {
    writer.write_record(slice_header(analysis.slices.len()))?;
    for (row, (offset, _)) in analysis.window.offsets().enumerate() {
        let mut record = vec![offset.to_string()];
        record.extend(
            analysis
                .slices
                .iter()
                .map(|slice| render_sample(&slice.values()[row])),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the weighted slices in the same layout as [`write_sliced`].
pub fn write_weighted<W: io::Write>(
    writer: &mut Writer<W>,
    analysis: &WindowedAnalysis,
) -> csv::Result<()> {
    writer.write_record(slice_header(analysis.weighted.len()))?;
    for (row, (offset, _)) in analysis.window.offsets().enumerate() {
        let mut record = vec![offset.to_string()];
        record.extend(
            analysis
                .weighted
                .iter()
                .map(|weighted| render_weighted(&weighted.values()[row])),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the statistic series: `position`, `<statistic> over window`.
/// Missing outputs are written as empty cells.
pub fn write_statistic<W: io::Write>(
    writer: &mut Writer<W>,
    analysis: &WindowedAnalysis,
) -> csv::Result<()> {
    writer.write_record([
        "position".to_string(),
        format!("{} over window", analysis.statistic),
    ])?;
    for (position, value) in analysis.output.iter().enumerate() {
        let rendered = value.map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([position.to_string(), rendered])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::calculators::Statistic;
    use crate::analytics::transform_detailed;
    use crate::window_spec::WindowSpec;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn table<F>(analysis: &WindowedAnalysis, write: F) -> String
    where
        F: Fn(&mut Writer<Vec<u8>>, &WindowedAnalysis) -> csv::Result<()>,
    {
        let mut writer = Writer::from_writer(Vec::new());
        write(&mut writer, analysis).unwrap();
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_reads_single_column_without_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "single.csv", "value\n1\n2.5\nnan\nnodata\n4\n");
        let series = CsvSeriesSource::new(&path).read_series().unwrap();
        assert_eq!(series, vec![Some(1.0), Some(2.5), None, None, Some(4.0)]);
    }

    #[test]
    fn test_missing_file_is_reported_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        assert_eq!(
            CsvSeriesSource::new(&path).read_series(),
            Err(SourceError::InputNotFound(path.clone()))
        );

        let err = CsvSeriesSource::new("/nonexistent/input.csv")
            .read_series()
            .unwrap_err();
        assert_eq!(err.to_string(), "Input file not found: /nonexistent/input.csv");
    }

    #[test]
    fn test_empty_cells_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "gaps.csv", "a,b\n1,\n2,3\n");
        let series = CsvSeriesSource::new(&path)
            .with_column("b")
            .read_series()
            .unwrap();
        assert_eq!(series, vec![None, Some(3.0)]);
    }

    #[test]
    fn test_multi_column_file_requires_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "multi.csv", ",wave,noisy wave\n0,1,1.5\n1,3,3.2\n");

        let err = CsvSeriesSource::new(&path).read_series().unwrap_err();
        assert!(matches!(err, SourceError::ColumnRequired { columns: 3, .. }));

        let series = CsvSeriesSource::new(&path)
            .with_column("noisy wave")
            .read_series()
            .unwrap();
        assert_eq!(series, vec![Some(1.5), Some(3.2)]);

        let err = CsvSeriesSource::new(&path)
            .with_column("missing")
            .read_series()
            .unwrap_err();
        assert_eq!(err, SourceError::ColumnNotFound("missing".to_string()));
    }

    #[test]
    fn test_headerless_file_selects_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "plain.tsv", "a\t1\nb\t2\n");
        let series = CsvSeriesSource::new(&path)
            .with_delimiter(b'\t')
            .with_headers(false)
            .with_column("1")
            .read_series()
            .unwrap();
        assert_eq!(series, vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn test_rejects_non_numeric_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "bad.csv", "value\n1\nabc\n");
        let err = CsvSeriesSource::new(&path).read_series().unwrap_err();
        assert_eq!(
            err,
            SourceError::InvalidValue {
                row: 1,
                column: "value".to_string(),
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_writes_slice_tables_per_offset() {
        let window = WindowSpec::parse("[2, x, 2]").unwrap();
        let input = vec![Some(1.0), Some(2.0)];
        let analysis = transform_detailed(&input, &window, Statistic::Sum);

        let sliced = table(&analysis, |w, a| write_sliced(w, a));
        assert_eq!(
            sliced,
            "offset,window 0,window 1\n-1,nodata,1\n0,1,2\n1,2,nodata\n"
        );

        let weighted = table(&analysis, |w, a| write_weighted(w, a));
        assert_eq!(
            weighted,
            "offset,window 0,window 1\n-1,nodata,2\n0,x,x\n1,4,nodata\n"
        );
    }

    #[test]
    fn test_writes_statistic_series_with_empty_missing() {
        let window = WindowSpec::parse("[1]").unwrap();
        let input = vec![Some(1.0), None];
        let analysis = transform_detailed(&input, &window, Statistic::Mean);

        let series = table(&analysis, |w, a| write_statistic(w, a));
        assert_eq!(series, "position,mean over window\n0,1\n1,\n");
    }
}
