//! Weighslide command-line interface
//!
//! Examples:
//!   weighslide "[0.5,1.0,0.5]" mean -r "[1,3,5,7,2,4,3,5,7,2,4]"
//!   weighslide 393x393 sum -i data.csv -c "noisy wave" -o
//!
//! Set RUST_LOG to control log output (default: info).

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use weighslide::{
    parse_raw_series, run_weighslide, transform, RunConfig, Statistic, WindowSpec,
};

fn cli() -> Command {
    Command::new("weighslide")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Weighted sliding window analysis")
        .arg(
            Arg::new("window")
                .help(
                    "Sliding weighted window. Either a list (e.g. \"[0.3,1.0,0.3,x,0.3,1.0,0.3]\") \
                     or a compact string (e.g. 393x393) where digits 0-9 are relative weights \
                     and x marks ignored positions",
                )
                .index(1),
        )
        .arg(
            Arg::new("statistic")
                .help("Reduction applied to each weighted window")
                .value_parser(["mean", "std", "sum"])
                .default_value("mean")
                .index(2),
        )
        .arg(
            Arg::new("raw")
                .long("raw")
                .short('r')
                .help("Raw data as a JSON list, e.g. \"[1.1, 3.4, null, 7.8]\""),
        )
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .help("Input file (.csv, .tsv, .db, .sqlite, .sqlite3)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .short('n')
                .help("Dataset name used in output file names (first 20 characters)"),
        )
        .arg(
            Arg::new("column")
                .long("column")
                .short('c')
                .help("Data column in the input file"),
        )
        .arg(
            Arg::new("table")
                .long("table")
                .short('t')
                .help("Table holding the data column (SQLite inputs)"),
        )
        .arg(
            Arg::new("delimiter")
                .long("delimiter")
                .short('d')
                .help("CSV field delimiter (a single character)"),
        )
        .arg(
            Arg::new("output_dir")
                .long("output-dir")
                .help("Output folder (default: weighslide_output beside the input)"),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .short('o')
                .help("Replace existing output files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .help("Evaluate window positions in parallel")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("JSON run configuration; command-line flags override its values"),
        )
}

/// Prints one output value per line, `NaN` where there is no value.
fn run_raw<W: Write>(
    out: &mut W,
    window: &str,
    statistic: &str,
    raw: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let window = WindowSpec::parse(window)?;
    let statistic: Statistic = statistic.parse()?;
    let input = parse_raw_series(raw)?;

    let output = transform(&input, &window, statistic);
    writeln!(out, "Weighslide output:")?;
    for value in output {
        writeln!(out, "{}", value.unwrap_or(f64::NAN))?;
    }
    Ok(())
}

fn build_config(matches: &ArgMatches) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => RunConfig::from_json_file(path)?,
        None => RunConfig::default(),
    };

    if let Some(input) = matches.get_one::<String>("input") {
        config.input = PathBuf::from(input);
    }
    if let Some(window) = matches.get_one::<String>("window") {
        config.window = window.clone();
    }
    if matches.value_source("statistic") == Some(clap::parser::ValueSource::CommandLine)
        || matches.get_one::<String>("config").is_none()
    {
        if let Some(statistic) = matches.get_one::<String>("statistic") {
            config.statistic = statistic.clone();
        }
    }
    if let Some(name) = matches.get_one::<String>("name") {
        config.name = Some(name.clone());
    }
    if let Some(column) = matches.get_one::<String>("column") {
        config.column = Some(column.clone());
    }
    if let Some(table) = matches.get_one::<String>("table") {
        config.table = Some(table.clone());
    }
    if let Some(delimiter) = matches.get_one::<String>("delimiter") {
        let mut chars = delimiter.chars();
        config.delimiter = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(format!("delimiter must be one character, got {:?}", delimiter).into()),
        };
    }
    if let Some(output_dir) = matches.get_one::<String>("output_dir") {
        config.output_dir = Some(PathBuf::from(output_dir));
    }
    if matches.get_flag("overwrite") {
        config.overwrite = true;
    }
    if matches.get_flag("parallel") {
        config.parallel = true;
    }

    if config.input.as_os_str().is_empty() {
        return Err("no input given; use --input <file> or --raw <list>".into());
    }
    Ok(config)
}

fn run<W: Write>(out: &mut W, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let raw = matches.get_one::<String>("raw");
    if raw.is_some() && matches.get_one::<String>("input").is_some() {
        return Err("both an input file and raw data were given; use only one".into());
    }

    if let Some(raw) = raw {
        let window = matches
            .get_one::<String>("window")
            .ok_or("a window is required with --raw")?;
        let statistic = matches
            .get_one::<String>("statistic")
            .map(String::as_str)
            .unwrap_or("mean");
        return run_raw(out, window, statistic, raw);
    }

    let config = build_config(matches)?;
    let summary = run_weighslide(&config)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    if let Err(error) = run(&mut io::stdout().lock(), &matches) {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_lines(args: &[&str]) -> Vec<String> {
        let matches = cli().try_get_matches_from(args.iter().copied()).unwrap();
        let mut out = Vec::new();
        run(&mut out, &matches).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_raw_mode_prints_one_value_per_line() {
        let lines = raw_lines(&[
            "weighslide",
            "[0.5,1.0,0.5]",
            "mean",
            "-r",
            "[1,3,5,7,2,4,3,5,7,2,4]",
        ]);

        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0], "Weighslide output:");
        let values: Vec<f64> = lines[1..].iter().map(|line| line.parse().unwrap()).collect();
        // Edge: (1 * 1.0 + 3 * 0.5) / 2
        assert!((values[0] - 1.25).abs() < 1e-12);
        // Interior: (1 * 0.5 + 3 * 1.0 + 5 * 0.5) / 3
        assert!((values[1] - 2.0).abs() < 1e-12);
        assert!((values[2] - 10.0 / 3.0).abs() < 1e-12);
        // Edge: (2 * 0.5 + 4 * 1.0) / 2
        assert!((values[10] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_raw_mode_prints_nan_for_missing() {
        let lines = raw_lines(&["weighslide", "[1, x, 1]", "std", "-r", "[null, 2, 4, null]"]);
        assert_eq!(lines[1..], ["NaN", "NaN", "NaN", "NaN"]);

        let lines = raw_lines(&["weighslide", "[1, 1, 1]", "sum", "-r", "[null, 2, null]"]);
        assert_eq!(lines[1..], ["2", "2", "2"]);
    }

    #[test]
    fn test_raw_mode_rejects_malformed_data() {
        let mut out = Vec::new();
        let err = run_raw(&mut out, "393", "mean", "[1, 2, oops]").unwrap_err();
        assert!(err.to_string().starts_with("Invalid raw data"));
        assert!(out.is_empty());

        assert!(run_raw(&mut out, "393", "mean", "{\"a\": 1}").is_err());
        assert!(run_raw(&mut out, "39", "mean", "[1, 2]").is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_raw_and_input_are_exclusive() {
        let matches = cli()
            .try_get_matches_from(["weighslide", "393", "-r", "[1,2]", "-i", "data.csv"])
            .unwrap();
        assert!(run(&mut Vec::new(), &matches).is_err());
    }

    #[test]
    fn test_flags_fill_the_run_config() {
        let matches = cli()
            .try_get_matches_from([
                "weighslide",
                "9x9",
                "sum",
                "-i",
                "data.csv",
                "-c",
                "value",
                "-n",
                "trial",
                "-o",
                "--parallel",
            ])
            .unwrap();
        let config = build_config(&matches).unwrap();
        assert_eq!(config.input, PathBuf::from("data.csv"));
        assert_eq!(config.window, "9x9");
        assert_eq!(config.statistic, "sum");
        assert_eq!(config.column.as_deref(), Some("value"));
        assert_eq!(config.name.as_deref(), Some("trial"));
        assert!(config.overwrite);
        assert!(config.parallel);
    }

    #[test]
    fn test_unknown_statistic_is_rejected_by_parser() {
        assert!(cli()
            .try_get_matches_from(["weighslide", "393", "median"])
            .is_err());
    }
}
