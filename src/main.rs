//! BudgetLens - Budget CSV Cleaning & Year-wise Analysis
//!
//! One-shot command-line front end: load a budget CSV, resolve the year and
//! value columns, normalize, filter, aggregate, and print the cleaned table
//! with summary metrics.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use budgetlens::data::{
    aggregate, filter_by_year_range, normalize, resolve_columns, AggregatePolicy, DataLoader,
    RejectedRow,
};
use budgetlens::stats::{SeriesSummary, StatsCalculator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AggArg {
    /// Sum budgets per year
    Sum,
    /// Average budgets per year
    Average,
    /// Keep raw rows
    Raw,
}

impl From<AggArg> for AggregatePolicy {
    fn from(arg: AggArg) -> Self {
        match arg {
            AggArg::Sum => AggregatePolicy::Sum,
            AggArg::Average => AggregatePolicy::Average,
            AggArg::Raw => AggregatePolicy::Raw,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "budgetlens", about = "Clean and analyze a budget CSV year-wise")]
struct Args {
    /// Input CSV/TSV file
    file: PathBuf,

    /// Year column name (overrides auto-detection)
    #[arg(long)]
    year_col: Option<String>,

    /// Budget/value column name (overrides auto-detection)
    #[arg(long)]
    value_col: Option<String>,

    /// Keep only years >= this bound
    #[arg(long)]
    min_year: Option<i32>,

    /// Keep only years <= this bound
    #[arg(long)]
    max_year: Option<i32>,

    /// How to combine multiple rows per year
    #[arg(long, value_enum, default_value = "sum")]
    agg: AggArg,

    /// Write the cleaned series as CSV to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the series and summary as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    year_column: &'a str,
    value_column: &'a str,
    series: &'a budgetlens::data::AggregatedSeries,
    summary: &'a SeriesSummary,
    rejected: &'a [RejectedRow],
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env).with_writer(std::io::stderr).init();

    let args = Args::parse();
    let path = args.file.to_string_lossy().into_owned();

    let mut loader = DataLoader::new();
    let table = loader
        .load_csv(&path)
        .with_context(|| format!("could not load {path}"))?;

    let (year_col, value_col) =
        resolve_columns(table, args.year_col.as_deref(), args.value_col.as_deref())?;

    let data = normalize(table, &year_col, &value_col)?;
    for r in &data.rejected {
        warn!(
            row = r.row,
            value = %r.original_value,
            reason = ?r.reason,
            "row rejected"
        );
    }

    let min_year = args.min_year.unwrap_or(i32::MIN);
    let max_year = args.max_year.unwrap_or(i32::MAX);
    let filtered = filter_by_year_range(&data.records, min_year, max_year);

    let series = aggregate(&filtered, args.agg.into());
    if series.is_empty() {
        anyhow::bail!("no records left after filtering to [{min_year}, {max_year}]");
    }
    let summary = StatsCalculator::summarize(&series)?;

    if args.json {
        let report = JsonReport {
            year_column: &year_col,
            value_column: &value_col,
            series: &series,
            summary: &summary,
            rejected: &data.rejected,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&year_col, &value_col, &series, &summary, &data.rejected);
    }

    if let Some(out) = &args.output {
        fs::write(out, series.to_csv())
            .with_context(|| format!("could not write {}", out.display()))?;
        eprintln!("Cleaned CSV written to {}", out.display());
    }

    Ok(())
}

fn print_report(
    year_col: &str,
    value_col: &str,
    series: &budgetlens::data::AggregatedSeries,
    summary: &SeriesSummary,
    rejected: &[RejectedRow],
) {
    println!("Columns: year = {year_col:?}, value = {value_col:?}");
    println!();
    println!("{:<8} {:>16}", "Year", "Budget");
    for p in &series.points {
        println!("{:<8} {:>16.2}", p.year, p.value);
    }
    println!();
    println!("Total:   {:.2}", summary.total);
    println!("Average: {:.2}", summary.average);
    println!("Highest: {} — {:.2}", summary.max.year, summary.max.value);
    println!("Lowest:  {} — {:.2}", summary.min.year, summary.min.value);

    if !rejected.is_empty() {
        println!();
        println!("{} row(s) could not be parsed:", rejected.len());
        for r in rejected {
            println!("  row {}: {:?} ({:?})", r.row, r.original_value, r.reason);
        }
    }
}
