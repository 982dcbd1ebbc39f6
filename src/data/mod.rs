//! Data module - CSV loading and normalization

mod loader;
mod normalizer;
mod table;

pub use loader::{DataLoader, LoaderError};
pub use normalizer::{
    aggregate, detect_columns, filter_by_year_range, normalize, parse_value, parse_year,
    resolve_columns, AggregatePolicy, AggregatedSeries, ColumnGuess, NormalizeError,
    NormalizedData, ParsedRecord, RejectReason, RejectedRow, SeriesPoint,
};
pub use table::{RawRow, RawTable};
