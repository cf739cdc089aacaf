/*!
 * Tabular records and the sources and sinks that move them.
 *
 * The translation core only sees a `RecordSet`: a header row plus records
 * of named fields. `CsvSource` and `CsvSink` adapt it to UTF-8 CSV files
 * (with the BOM spreadsheet tools expect), and `MemorySink` keeps every
 * write in memory for tests.
 */

use log::{debug, warn};
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::errors::TableError;

const UTF8_BOM: &str = "\u{feff}";

/// One row: ordered `(column, value)` pairs with unique column names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from pairs; a repeated column keeps its last value
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (column, value) in pairs {
            let column: String = column.into();
            record.set(&column, value);
        }
        record
    }

    /// Value of a column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Set a column, appending it if the record does not have it yet
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    /// Column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Serializes as a JSON object with keys in column order
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// A header row and the records that share it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    headers: Vec<String>,
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            records: Vec::new(),
        }
    }

    /// Append a row given in header order. Short rows are padded with empty
    /// values and extra values are dropped.
    pub fn push_row(&mut self, values: Vec<String>) {
        let mut values = values.into_iter();
        let record = Record {
            fields: self
                .headers
                .iter()
                .map(|header| (header.clone(), values.next().unwrap_or_default()))
                .collect(),
        };
        self.records.push(record);
    }

    /// Append a record, filling any missing header column with an empty value
    pub fn push(&mut self, record: Record) {
        let values = self
            .headers
            .iter()
            .map(|header| record.get(header).unwrap_or_default().to_string())
            .collect();
        self.push_row(values);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize, column: &str) -> Option<&str> {
        self.records.get(index).and_then(|r| r.get(column))
    }

    /// Overwrite a cell; returns false when the row or column does not exist
    pub fn set(&mut self, index: usize, column: &str, value: impl Into<String>) -> bool {
        if !self.has_column(column) {
            return false;
        }
        match self.records.get_mut(index) {
            Some(record) => {
                record.set(column, value);
                true
            }
            None => false,
        }
    }

    /// Values of each record in header order
    pub fn rows(&self) -> impl Iterator<Item = Vec<&str>> + '_ {
        self.records.iter().map(move |record| {
            self.headers
                .iter()
                .map(|header| record.get(header).unwrap_or_default())
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Where records come from
pub trait RowSource {
    fn read(&self) -> Result<RecordSet, TableError>;
}

/// Where records go. Every write replaces the previous one.
pub trait RowSink: Send + Sync {
    fn write(&self, records: &RecordSet) -> Result<(), TableError>;
}

/// Reads a CSV file with a header row
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse CSV data from any reader
    pub fn read_from<R: Read>(reader: R) -> Result<RecordSet, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let mut headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if let Some(first) = headers.first_mut() {
            *first = first.trim_start_matches(UTF8_BOM).to_string();
        }
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(TableError::EmptyHeader);
        }

        let mut records = RecordSet::new(headers);
        for (line, result) in reader.records().enumerate() {
            let row = result?;
            if row.len() > records.headers().len() {
                warn!(
                    "Row {} has {} fields, header has {}; extra fields dropped",
                    line + 2,
                    row.len(),
                    records.headers().len()
                );
            }
            records.push_row(row.iter().map(|v| v.to_string()).collect());
        }

        Ok(records)
    }
}

impl RowSource for CsvSource {
    fn read(&self) -> Result<RecordSet, TableError> {
        let file = File::open(&self.path)?;
        let records = Self::read_from(file)?;
        debug!("Read {} rows from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// Writes a CSV file with a UTF-8 BOM, replacing the destination atomically
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize records as CSV into any writer
    pub fn write_to<W: Write>(writer: W, records: &RecordSet) -> Result<(), TableError> {
        let mut writer = BufWriter::new(writer);
        writer.write_all(UTF8_BOM.as_bytes())?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(records.headers())?;
        for row in records.rows() {
            csv_writer.write_record(&row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RowSink for CsvSink {
    fn write(&self, records: &RecordSet) -> Result<(), TableError> {
        let temp_path = self.temp_path();
        let file = File::create(&temp_path)?;

        if let Err(e) = Self::write_to(file, records) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &self.path)?;
        debug!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Keeps every write in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    writes: Mutex<Vec<RecordSet>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes so far
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// The most recent write
    pub fn last(&self) -> Option<RecordSet> {
        self.writes.lock().last().cloned()
    }
}

impl RowSink for MemorySink {
    fn write(&self, records: &RecordSet) -> Result<(), TableError> {
        self.writes.lock().push(records.clone());
        Ok(())
    }
}
