//! Budget Normalizer Module
//! Turns raw string rows into typed (year, value) records: column detection,
//! messy-number coercion, range filtering, and per-year aggregation.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::table::RawTable;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Input table has no data rows")]
    EmptyInput,
    #[error("Year/value columns could not be detected; select them explicitly")]
    ColumnSelectionRequired,
    #[error("No column named {0:?} in input")]
    UnknownColumn(String),
    #[error("No rows survived normalization ({rejected} rejected)")]
    NoValidRows { rejected: usize },
}

/// Calendar years embedded in free text, e.g. "FY2019-20".
static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(19|20)\d{2}").expect("valid regex"));

const YEAR_KEYWORDS: [&str; 2] = ["year", "yr"];
const VALUE_KEYWORDS: [&str; 8] = [
    "budget",
    "amount",
    "expenditure",
    "expend",
    "value",
    "total",
    "allocation",
    "outlay",
];

/// One successfully normalized row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParsedRecord {
    pub year: i32,
    pub value: f64,
}

/// Why a row failed normalization. Year failure takes precedence when both
/// cells are unparseable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    YearUnparseable,
    ValueUnparseable,
}

/// A row that failed normalization, kept verbatim for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// Zero-based data-row index in the input table.
    pub row: usize,
    pub original_value: String,
    pub reason: RejectReason,
}

/// Outcome of a normalization pass: every input row lands in exactly one of
/// the two lists.
#[derive(Debug, Clone, Default)]
pub struct NormalizedData {
    pub records: Vec<ParsedRecord>,
    pub rejected: Vec<RejectedRow>,
}

/// Rule for combining multiple records that share a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatePolicy {
    Sum,
    Average,
    /// No grouping; records pass through, possibly several per year.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub value: f64,
}

/// Year-ascending series produced by [`aggregate`]. Years are unique under
/// `Sum`/`Average`; `Raw` may repeat them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregatedSeries {
    pub points: Vec<SeriesPoint>,
}

impl AggregatedSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Serialize as `Year,Budget` CSV with two-decimal values.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("Year,Budget\n");
        for p in &self.points {
            let _ = writeln!(out, "{},{:.2}", p.year, p.value);
        }
        out
    }
}

/// Best-effort column guess; a caller may always override either role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnGuess {
    pub year: Option<String>,
    pub value: Option<String>,
}

/// Detect year/value columns by common header names, first match wins.
///
/// The year role requires an exact, word-token, or prefix match so that
/// e.g. "birthyear" is not mistaken for it; the value role accepts any
/// substring match but never reuses the year column.
pub fn detect_columns(columns: &[String]) -> ColumnGuess {
    let lowered: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();

    let mut year = None;
    for (i, name) in lowered.iter().enumerate() {
        let hit = YEAR_KEYWORDS.iter().any(|&ky| {
            name.as_str() == ky
                || name.split_whitespace().any(|tok| tok == ky)
                || name.starts_with(ky)
        });
        if hit {
            year = Some(columns[i].clone());
            break;
        }
    }

    let mut value = None;
    for (i, name) in lowered.iter().enumerate() {
        if Some(&columns[i]) == year.as_ref() {
            continue;
        }
        if VALUE_KEYWORDS.iter().any(|kb| name.contains(kb)) {
            value = Some(columns[i].clone());
            break;
        }
    }

    ColumnGuess { year, value }
}

/// Combine detection with explicit caller overrides, validating that both
/// roles end up bound to a real column.
pub fn resolve_columns(
    table: &RawTable,
    year_override: Option<&str>,
    value_override: Option<&str>,
) -> Result<(String, String), NormalizeError> {
    for name in [year_override, value_override].into_iter().flatten() {
        if table.column_index(name).is_none() {
            return Err(NormalizeError::UnknownColumn(name.to_string()));
        }
    }

    let guess = detect_columns(table.columns());
    let year = year_override
        .map(str::to_string)
        .or(guess.year)
        .ok_or(NormalizeError::ColumnSelectionRequired)?;
    let value = value_override
        .map(str::to_string)
        .or(guess.value)
        .ok_or(NormalizeError::ColumnSelectionRequired)?;
    Ok((year, value))
}

/// Extract a year from raw cell text. Total function: never panics.
///
/// A 4-digit `19xx`/`20xx` run anywhere in the text wins over direct numeric
/// parsing, so "FY2019-20" resolves to 2019. Failing that, the whole trimmed
/// text is parsed as a number and truncated toward zero.
pub fn parse_year(raw: &str) -> Option<i32> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(m) = YEAR_PATTERN.find(s) {
        return m.as_str().parse().ok();
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i32)
}

/// Coerce messy monetary text to a number. Total function: never panics.
///
/// Parentheses are the accounting convention for negatives. Everything that
/// is not a digit, decimal point, minus sign, or exponent marker is stripped
/// in one pass, which removes currency symbols and thousands separators
/// regardless of locale.
pub fn parse_value(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        negative = true;
        s = s[1..s.len() - 1].trim();
    }

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E'))
        .collect();
    if matches!(cleaned.as_str(), "" | "." | "-" | "+") {
        return None;
    }

    let val = cleaned.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(if negative { -val } else { val })
}

/// Normalize every row of `table` against the nominated columns.
///
/// Each row independently becomes a [`ParsedRecord`] (both parses succeed) or
/// a [`RejectedRow`]; malformed cells never abort the pass. An empty table
/// and a pass with zero survivors are run-level errors with no partial
/// result.
pub fn normalize(
    table: &RawTable,
    year_col: &str,
    value_col: &str,
) -> Result<NormalizedData, NormalizeError> {
    if table.is_empty() {
        return Err(NormalizeError::EmptyInput);
    }
    let year_idx = table
        .column_index(year_col)
        .ok_or_else(|| NormalizeError::UnknownColumn(year_col.to_string()))?;
    let value_idx = table
        .column_index(value_col)
        .ok_or_else(|| NormalizeError::UnknownColumn(value_col.to_string()))?;

    let mut data = NormalizedData::default();
    for (i, row) in table.rows().iter().enumerate() {
        let raw_year = row.cell(year_idx);
        let raw_value = row.cell(value_idx);

        match (parse_year(raw_year), parse_value(raw_value)) {
            (Some(year), Some(value)) => data.records.push(ParsedRecord { year, value }),
            (None, _) => {
                debug!(row = i, cell = raw_year, "year unparseable");
                data.rejected.push(RejectedRow {
                    row: i,
                    original_value: raw_year.to_string(),
                    reason: RejectReason::YearUnparseable,
                });
            }
            (Some(_), None) => {
                debug!(row = i, cell = raw_value, "value unparseable");
                data.rejected.push(RejectedRow {
                    row: i,
                    original_value: raw_value.to_string(),
                    reason: RejectReason::ValueUnparseable,
                });
            }
        }
    }

    if data.records.is_empty() {
        return Err(NormalizeError::NoValidRows {
            rejected: data.rejected.len(),
        });
    }
    Ok(data)
}

/// Retain records whose year lies in the inclusive `[min_year, max_year]`.
pub fn filter_by_year_range(
    records: &[ParsedRecord],
    min_year: i32,
    max_year: i32,
) -> Vec<ParsedRecord> {
    records
        .iter()
        .copied()
        .filter(|r| r.year >= min_year && r.year <= max_year)
        .collect()
}

/// Group records by year under `policy`. Output is always year-ascending;
/// empty input yields an empty series.
pub fn aggregate(records: &[ParsedRecord], policy: AggregatePolicy) -> AggregatedSeries {
    if policy == AggregatePolicy::Raw {
        let mut points: Vec<SeriesPoint> = records
            .iter()
            .map(|r| SeriesPoint {
                year: r.year,
                value: r.value,
            })
            .collect();
        points.sort_by_key(|p| p.year);
        return AggregatedSeries { points };
    }

    let mut groups: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for r in records {
        let entry = groups.entry(r.year).or_insert((0.0, 0));
        entry.0 += r.value;
        entry.1 += 1;
    }

    let points = groups
        .into_iter()
        .map(|(year, (sum, count))| SeriesPoint {
            year,
            value: match policy {
                AggregatePolicy::Sum => sum,
                AggregatePolicy::Average => sum / count as f64,
                AggregatePolicy::Raw => unreachable!(),
            },
        })
        .collect();
    AggregatedSeries { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::RawRow;

    fn table(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| RawRow::new(r.iter().map(|c| c.to_string()).collect()))
                .collect(),
        )
    }

    #[test]
    fn parse_year_extracts_four_digit_run() {
        assert_eq!(parse_year("2019"), Some(2019));
        assert_eq!(parse_year("FY2019-20"), Some(2019));
        assert_eq!(parse_year("  Budget 2024 (rev)  "), Some(2024));
    }

    #[test]
    fn parse_year_falls_back_to_direct_numeric() {
        assert_eq!(parse_year("1850"), Some(1850));
        assert_eq!(parse_year("42"), Some(42));
        assert_eq!(parse_year("1850.7"), Some(1850));
    }

    #[test]
    fn parse_year_rejects_garbage() {
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("   "), None);
        assert_eq!(parse_year("abc"), None);
    }

    #[test]
    fn parse_value_handles_separators_and_currency() {
        assert_eq!(parse_value("1,234.50"), Some(1234.50));
        assert_eq!(parse_value("₹2,000"), Some(2000.0));
        assert_eq!(parse_value("$ 1200"), Some(1200.0));
        assert_eq!(parse_value("Rs. 3.5"), Some(3.5));
        assert_eq!(parse_value("1.2e3"), Some(1200.0));
    }

    #[test]
    fn parse_value_accounting_negative() {
        assert_eq!(parse_value("(500)"), Some(-500.0));
        assert_eq!(parse_value("( 1,234.00 )"), Some(-1234.0));
        assert_eq!(parse_value("-500"), Some(-500.0));
    }

    #[test]
    fn parse_value_rejects_residue() {
        assert_eq!(parse_value(""), None);
        assert_eq!(parse_value("$"), None);
        assert_eq!(parse_value("-"), None);
        assert_eq!(parse_value("."), None);
        assert_eq!(parse_value("n/a"), None);
    }

    #[test]
    fn parse_value_rejects_non_finite() {
        assert_eq!(parse_value("1e999"), None);
    }

    #[test]
    fn detects_common_column_names() {
        let guess = detect_columns(&["Fiscal Year".into(), "Total Budget".into()]);
        assert_eq!(guess.year.as_deref(), Some("Fiscal Year"));
        assert_eq!(guess.value.as_deref(), Some("Total Budget"));
    }

    #[test]
    fn year_detection_needs_token_or_prefix() {
        // Substring alone is not enough for the year role.
        let guess = detect_columns(&["birthyear".into(), "amount".into()]);
        assert_eq!(guess.year, None);
        assert_eq!(guess.value.as_deref(), Some("amount"));

        let guess = detect_columns(&["Yr".into(), "Outlay (cr)".into()]);
        assert_eq!(guess.year.as_deref(), Some("Yr"));
        assert_eq!(guess.value.as_deref(), Some("Outlay (cr)"));
    }

    #[test]
    fn value_detection_skips_year_column() {
        // "Year Total" matches both keyword sets; it must only fill the
        // year role, leaving the value role to the next candidate.
        let guess = detect_columns(&["Year Total".into(), "Allocation".into()]);
        assert_eq!(guess.year.as_deref(), Some("Year Total"));
        assert_eq!(guess.value.as_deref(), Some("Allocation"));
    }

    #[test]
    fn first_match_wins_for_value() {
        let guess = detect_columns(&["Year".into(), "Total Allocation".into(), "Amount".into()]);
        assert_eq!(guess.value.as_deref(), Some("Total Allocation"));
    }

    #[test]
    fn resolve_columns_requires_both_roles() {
        let t = table(&["A", "B"], &[&["1", "2"]]);
        let err = resolve_columns(&t, None, None).unwrap_err();
        assert!(matches!(err, NormalizeError::ColumnSelectionRequired));

        let (y, v) = resolve_columns(&t, Some("A"), Some("B")).unwrap();
        assert_eq!((y.as_str(), v.as_str()), ("A", "B"));
    }

    #[test]
    fn resolve_columns_rejects_unknown_override() {
        let t = table(&["Year", "Budget"], &[&["2019", "1"]]);
        let err = resolve_columns(&t, Some("Jahr"), None).unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownColumn(name) if name == "Jahr"));
    }

    #[test]
    fn normalize_messy_rows() {
        let t = table(
            &["Y", "B"],
            &[
                &["2019", "1,234.50"],
                &["2020", "₹2,000"],
                &["2021", "(500)"],
                &["abc", "300"],
            ],
        );
        let data = normalize(&t, "Y", "B").unwrap();
        assert_eq!(
            data.records,
            vec![
                ParsedRecord { year: 2019, value: 1234.50 },
                ParsedRecord { year: 2020, value: 2000.0 },
                ParsedRecord { year: 2021, value: -500.0 },
            ]
        );
        assert_eq!(
            data.rejected,
            vec![RejectedRow {
                row: 3,
                original_value: "abc".into(),
                reason: RejectReason::YearUnparseable,
            }]
        );
    }

    #[test]
    fn year_failure_wins_when_both_cells_bad() {
        let t = table(&["Y", "B"], &[&["??", "??"], &["2020", "1"]]);
        let data = normalize(&t, "Y", "B").unwrap();
        assert_eq!(data.rejected[0].reason, RejectReason::YearUnparseable);
        assert_eq!(data.rejected[0].original_value, "??");
    }

    #[test]
    fn value_failure_reported_with_value_cell() {
        let t = table(&["Y", "B"], &[&["2019", "n/a"], &["2020", "1"]]);
        let data = normalize(&t, "Y", "B").unwrap();
        assert_eq!(
            data.rejected,
            vec![RejectedRow {
                row: 0,
                original_value: "n/a".into(),
                reason: RejectReason::ValueUnparseable,
            }]
        );
    }

    #[test]
    fn normalize_clean_table_is_lossless() {
        let t = table(&["Y", "B"], &[&["2019", "100"], &["2020", "250.5"]]);
        let data = normalize(&t, "Y", "B").unwrap();
        assert!(data.rejected.is_empty());
        assert_eq!(
            data.records,
            vec![
                ParsedRecord { year: 2019, value: 100.0 },
                ParsedRecord { year: 2020, value: 250.5 },
            ]
        );
    }

    #[test]
    fn normalize_empty_table_is_fatal() {
        let t = table(&["Y", "B"], &[]);
        assert!(matches!(
            normalize(&t, "Y", "B"),
            Err(NormalizeError::EmptyInput)
        ));
    }

    #[test]
    fn normalize_without_survivors_is_fatal() {
        let t = table(&["Y", "B"], &[&["abc", "1"], &["def", "2"]]);
        assert!(matches!(
            normalize(&t, "Y", "B"),
            Err(NormalizeError::NoValidRows { rejected: 2 })
        ));
    }

    #[test]
    fn filter_is_inclusive() {
        let records = [
            ParsedRecord { year: 2018, value: 1.0 },
            ParsedRecord { year: 2019, value: 2.0 },
            ParsedRecord { year: 2020, value: 3.0 },
        ];
        let kept = filter_by_year_range(&records, 2019, 2020);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].year, 2019);
    }

    #[test]
    fn aggregate_sum_average_raw() {
        let records = [
            ParsedRecord { year: 2020, value: 100.0 },
            ParsedRecord { year: 2020, value: 200.0 },
        ];
        let sum = aggregate(&records, AggregatePolicy::Sum);
        assert_eq!(sum.points, vec![SeriesPoint { year: 2020, value: 300.0 }]);

        let avg = aggregate(&records, AggregatePolicy::Average);
        assert_eq!(avg.points, vec![SeriesPoint { year: 2020, value: 150.0 }]);

        let raw = aggregate(&records, AggregatePolicy::Raw);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.points[0].value, 100.0);
        assert_eq!(raw.points[1].value, 200.0);
    }

    #[test]
    fn aggregate_sorts_ascending_by_year() {
        let records = [
            ParsedRecord { year: 2021, value: 1.0 },
            ParsedRecord { year: 2019, value: 2.0 },
            ParsedRecord { year: 2020, value: 3.0 },
        ];
        let series = aggregate(&records, AggregatePolicy::Raw);
        let years: Vec<i32> = series.points.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
    }

    #[test]
    fn aggregate_empty_input_is_empty_series() {
        assert!(aggregate(&[], AggregatePolicy::Sum).is_empty());
    }

    #[test]
    fn csv_export_round_trips_through_parsers() {
        let series = AggregatedSeries {
            points: vec![
                SeriesPoint { year: 2019, value: 1234.5 },
                SeriesPoint { year: 2021, value: -500.0 },
            ],
        };
        let csv = series.to_csv();
        assert_eq!(csv, "Year,Budget\n2019,1234.50\n2021,-500.00\n");

        for (line, expect) in csv.lines().skip(1).zip(&series.points) {
            let (y, v) = line.split_once(',').unwrap();
            assert_eq!(parse_year(y), Some(expect.year));
            let parsed = parse_value(v).unwrap();
            assert!((parsed - expect.value).abs() < 0.005);
        }
    }
}
