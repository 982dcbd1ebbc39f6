//! BudgetLens - Budget CSV Cleaning & Year-wise Analysis
//!
//! Turns messy budget spreadsheets (currency symbols, thousands separators,
//! accounting negatives, fiscal-year labels) into a clean year/value series
//! with explicit per-row rejection diagnostics, then aggregates and
//! summarizes it. The pipeline is `normalize` → `filter_by_year_range` →
//! `aggregate` → `StatsCalculator::summarize`, invoked once per request.

pub mod data;
pub mod stats;
