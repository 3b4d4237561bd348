pub mod window_spec;
pub mod time_series;
pub mod analytics;
pub mod csv_io;
pub mod sqlite_source;
pub mod runner;


pub use window_spec::{WeightEntry, WindowError, WindowSpec};
pub use time_series::{
    parse_raw_series, samples_from_f64, samples_to_f64, InMemorySeries, Sample, SeriesSource,
    SourceError,
};
pub use analytics::{
    calculators::{Statistic, WindowReducer},
    transform,
    transform_detailed,
    transform_detailed_par,
    transform_par,
    transform_raw,
    TransformError,
    WindowedAnalysis,
};
pub use csv_io::CsvSeriesSource;
pub use sqlite_source::{SqliteSeriesSource, SqliteSeriesStore};
pub use runner::{
    result_table_name, run_weighslide, OutputPaths, RunConfig, RunError, RunSummary,
};
