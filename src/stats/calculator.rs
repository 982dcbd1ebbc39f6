//! Statistics Calculator Module
//! Summary statistics over an aggregated budget series.

use serde::Serialize;
use statrs::statistics::Statistics;
use thiserror::Error;

use crate::data::{AggregatedSeries, SeriesPoint};

/// Contract violation: callers must check non-emptiness before summarizing.
/// Distinct from the run-level "no valid rows" condition.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Cannot summarize an empty series")]
pub struct EmptySeriesError;

/// Headline figures for one series, as shown in the metrics row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub total: f64,
    pub average: f64,
    /// Highest-valued point; ties resolve to the earliest year.
    pub max: SeriesPoint,
    /// Lowest-valued point; ties resolve to the earliest year.
    pub min: SeriesPoint,
}

/// Handles statistical calculations over aggregated series.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute total, average, and the extreme years of a non-empty series.
    pub fn summarize(series: &AggregatedSeries) -> Result<SeriesSummary, EmptySeriesError> {
        let first = *series.points.first().ok_or(EmptySeriesError)?;

        let total: f64 = series.points.iter().map(|p| p.value).sum();
        let average = series.points.iter().map(|p| p.value).mean();

        // Strict comparisons keep the first occurrence on ties; the series
        // is already year-ascending.
        let mut max = first;
        let mut min = first;
        for &p in &series.points[1..] {
            if p.value > max.value {
                max = p;
            }
            if p.value < min.value {
                min = p;
            }
        }

        Ok(SeriesSummary {
            total,
            average,
            max,
            min,
        })
    }
}
