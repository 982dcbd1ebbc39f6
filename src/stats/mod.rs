//! Stats module - summary statistics

mod calculator;

pub use calculator::{EmptySeriesError, SeriesSummary, StatsCalculator};
