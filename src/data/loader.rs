//! CSV Data Loader Module
//! Handles file loading, text decoding, and delimiter detection.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use super::table::{RawRow, RawTable};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("File is empty or has no header row")]
    NoHeader,
}

/// Delimiters tried when sniffing the header line, in preference order.
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Handles delimiter-separated file loading into a [`RawTable`].
pub struct DataLoader {
    table: Option<RawTable>,
    file_path: Option<PathBuf>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            table: None,
            file_path: None,
        }
    }

    /// Load a delimiter-separated file. The separator is sniffed from the
    /// header line; text is decoded as UTF-8 with a Latin-1 fallback.
    pub fn load_csv(&mut self, file_path: &str) -> Result<&RawTable, LoaderError> {
        self.file_path = Some(PathBuf::from(file_path));

        let bytes = fs::read(file_path)?;
        let text = decode_text(bytes);
        let table = parse_table(&text)?;

        info!(
            rows = table.row_count(),
            columns = table.columns().len(),
            file = file_path,
            "loaded table"
        );
        self.table = Some(table);
        self.table.as_ref().ok_or(LoaderError::NoHeader)
    }

    /// Get list of column names from the loaded table.
    pub fn get_columns(&self) -> Vec<String> {
        self.table
            .as_ref()
            .map(|t| t.columns().to_vec())
            .unwrap_or_default()
    }

    /// Get the number of data rows in the loaded table.
    pub fn get_row_count(&self) -> usize {
        self.table.as_ref().map(|t| t.row_count()).unwrap_or(0)
    }

    /// Get a reference to the loaded table.
    pub fn get_table(&self) -> Option<&RawTable> {
        self.table.as_ref()
    }

    /// Get file path.
    pub fn get_file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }
}

/// Decode file bytes as UTF-8, falling back to Latin-1. Latin-1 maps every
/// byte to the code point of the same value, so the fallback cannot fail.
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            debug!("input is not valid UTF-8, decoding as Latin-1");
            err.into_bytes().iter().map(|&b| b as char).collect()
        }
    }
}

/// Pick the delimiter with the most occurrences in the header line,
/// defaulting to comma on a tie or when none appears.
fn sniff_delimiter(header_line: &str) -> u8 {
    let mut best = b',';
    let mut best_count = 0usize;
    for &delim in &CANDIDATE_DELIMITERS {
        let count = header_line.bytes().filter(|&b| b == delim).count();
        if count > best_count {
            best = delim;
            best_count = count;
        }
    }
    best
}

/// Parse decoded text into a [`RawTable`]. The first record is the header.
fn parse_table(text: &str) -> Result<RawTable, LoaderError> {
    let header_line = text.lines().next().unwrap_or("");
    let delimiter = sniff_delimiter(header_line);
    debug!(delimiter = %(delimiter as char), "sniffed delimiter");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if columns.is_empty() || (columns.len() == 1 && columns[0].is_empty()) {
        return Err(LoaderError::NoHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(RawRow::new(record.iter().map(str::to_string).collect()));
    }

    Ok(RawTable::new(columns, rows))
}
