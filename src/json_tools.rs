/*!
 * JSON hygiene for localization tables.
 *
 * Tables are often turned into JSON further down the line, sometimes by
 * converters that concatenate strings without escaping them. This module
 * exports a table as a JSON array of objects (UTF-8, no BOM), reports cells
 * holding characters such converters break on, and rewrites chosen columns
 * with JSON string escapes so naive conversion stays valid.
 */

use log::debug;
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::errors::{AppError, ConfigError, TableError};
use crate::table::{CsvSink, CsvSource, RecordSet, RowSink, RowSource};

/// Columns sanitized when none are given, if the table has them
pub const DEFAULT_SANITIZE_COLUMNS: [&str; 3] = ["ZH", "VN", "TH"];

/// Optional columns copied into the report to help locate a cell
pub const LOCATOR_COLUMNS: [&str; 4] = ["Table", "Sheet", "Field", "Position"];

/// Header of the unsafe-cell report
pub const REPORT_HEADERS: [&str; 10] = [
    "csv_line",
    "row_index",
    "Table",
    "Sheet",
    "Field",
    "Position",
    "column",
    "issues",
    "value_len",
    "value_preview",
];

const PREVIEW_CHARS: usize = 120;

/// A character class that must be escaped inside a JSON string.
///
/// Variants are ordered by label so reports list issues alphabetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UnsafeIssue {
    Backslash,
    Backspace,
    CarriageReturn,
    /// Any character below U+0020
    ControlChar,
    DoubleQuote,
    Formfeed,
    Newline,
    Tab,
}

impl UnsafeIssue {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Backslash => "backslash",
            Self::Backspace => "backspace",
            Self::CarriageReturn => "carriage_return",
            Self::ControlChar => "control_char",
            Self::DoubleQuote => "double_quote",
            Self::Formfeed => "formfeed",
            Self::Newline => "newline",
            Self::Tab => "tab",
        }
    }

    fn for_char(ch: char) -> Option<Self> {
        match ch {
            '"' => Some(Self::DoubleQuote),
            '\\' => Some(Self::Backslash),
            '\n' => Some(Self::Newline),
            '\r' => Some(Self::CarriageReturn),
            '\t' => Some(Self::Tab),
            '\u{8}' => Some(Self::Backspace),
            '\u{c}' => Some(Self::Formfeed),
            _ => None,
        }
    }
}

/// Every issue found in a value, sorted and without duplicates
pub fn find_issues(value: &str) -> Vec<UnsafeIssue> {
    let mut issues = BTreeSet::new();
    for ch in value.chars() {
        if let Some(issue) = UnsafeIssue::for_char(ch) {
            issues.insert(issue);
        }
        if (ch as u32) < 0x20 {
            issues.insert(UnsafeIssue::ControlChar);
        }
    }
    issues.into_iter().collect()
}

/// A cell that would break string-built JSON
#[derive(Debug, Clone, PartialEq)]
pub struct UnsafeCell {
    /// Line in the CSV file; the header is line 1
    pub csv_line: usize,
    /// 1-based data row
    pub row_index: usize,
    pub column: String,
    pub issues: Vec<UnsafeIssue>,
    /// Length in characters
    pub value_len: usize,
    pub value_preview: String,
    /// Values of `LOCATOR_COLUMNS`, empty when the table lacks them
    pub locator: [String; 4],
}

impl UnsafeCell {
    /// Issue labels joined with `|`
    pub fn issue_labels(&self) -> String {
        self.issues
            .iter()
            .map(UnsafeIssue::label)
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Rows read and cells reported or changed by a tool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolSummary {
    pub rows: usize,
    pub cells: usize,
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(PREVIEW_CHARS - 1).collect();
        format!("{}…", truncated)
    }
}

/// Requested columns, checked against the header, or `fallback` when none
fn select_columns(
    records: &RecordSet,
    requested: Option<&[String]>,
    fallback: impl FnOnce() -> Vec<String>,
) -> Result<Vec<String>, ConfigError> {
    let columns = match requested {
        Some(columns) if !columns.is_empty() => columns.to_vec(),
        _ => fallback(),
    };
    if let Some(missing) = columns.iter().find(|c| !records.has_column(c)) {
        return Err(ConfigError::MissingColumn(missing.clone()));
    }
    Ok(columns)
}

/// Find cells containing characters that must be escaped in JSON strings.
///
/// Scans `columns`, or every column when `None`.
pub fn scan_json_unsafe(records: &RecordSet, columns: Option<&[String]>) -> Result<Vec<UnsafeCell>, ConfigError> {
    let columns = select_columns(records, columns, || records.headers().to_vec())?;
    let mut findings = Vec::new();

    for (index, record) in records.records().iter().enumerate() {
        for column in &columns {
            let value = record.get(column).unwrap_or_default();
            let issues = find_issues(value);
            if issues.is_empty() {
                continue;
            }

            findings.push(UnsafeCell {
                csv_line: index + 2,
                row_index: index + 1,
                column: column.clone(),
                issues,
                value_len: value.chars().count(),
                value_preview: preview(value),
                locator: LOCATOR_COLUMNS.map(|c| record.get(c).unwrap_or_default().to_string()),
            });
        }
    }

    Ok(findings)
}

/// Lay findings out as a report table
pub fn report_records(findings: &[UnsafeCell]) -> RecordSet {
    let mut report = RecordSet::new(REPORT_HEADERS.iter().map(|h| h.to_string()).collect());
    for cell in findings {
        let [table, sheet, field, position] = cell.locator.clone();
        report.push_row(vec![
            cell.csv_line.to_string(),
            cell.row_index.to_string(),
            table,
            sheet,
            field,
            position,
            cell.column.clone(),
            cell.issue_labels(),
            cell.value_len.to_string(),
            cell.value_preview.clone(),
        ]);
    }
    report
}

/// `(row_index, column)` pairs listed in a report; malformed rows are ignored
pub fn report_targets(report: &RecordSet) -> HashSet<(usize, String)> {
    report
        .records()
        .iter()
        .filter_map(|row| {
            let row_index = row.get("row_index")?.trim().parse::<usize>().ok()?;
            let column = row.get("column")?.trim();
            (row_index > 0 && !column.is_empty()).then(|| (row_index, column.to_string()))
        })
        .collect()
}

/// JSON string escaping of `value`, without the surrounding quotes
pub fn json_escape(value: &str) -> String {
    match serde_json::to_string(value) {
        Ok(dumped) => dumped
            .strip_prefix('"')
            .and_then(|d| d.strip_suffix('"'))
            .map(str::to_string)
            .unwrap_or(dumped),
        Err(_) => value.to_string(),
    }
}

/// Escape cells in place.
///
/// Works on `columns`, or on `DEFAULT_SANITIZE_COLUMNS` present in the
/// table (every column if none is). With `only`, cells not listed there are
/// left alone.
///
/// # Returns
/// * The number of cells that changed
pub fn sanitize_for_json(
    records: &mut RecordSet,
    columns: Option<&[String]>,
    only: Option<&HashSet<(usize, String)>>,
) -> Result<usize, ConfigError> {
    let columns = select_columns(records, columns, || {
        let preferred: Vec<String> = DEFAULT_SANITIZE_COLUMNS
            .iter()
            .filter(|c| records.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if preferred.is_empty() {
            records.headers().to_vec()
        } else {
            preferred
        }
    })?;

    let mut changed = 0;
    for index in 0..records.len() {
        for column in &columns {
            if let Some(only) = only {
                if !only.contains(&(index + 1, column.clone())) {
                    continue;
                }
            }

            let original = records.get(index, column).unwrap_or_default().to_string();
            let escaped = json_escape(&original);
            if escaped != original {
                records.set(index, column, escaped);
                changed += 1;
            }
        }
    }

    Ok(changed)
}

/// Serialize records as a pretty JSON array of objects, keys in column order
pub fn write_json<W: Write>(writer: W, records: &RecordSet) -> Result<(), TableError> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, records.records())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Convert a CSV file into a JSON file
///
/// # Returns
/// * The number of rows written
pub fn export_json(input: &Path, output: &Path) -> Result<usize, AppError> {
    let records = CsvSource::new(input).read()?;
    let file = File::create(output)?;
    write_json(file, &records)?;
    debug!("Exported {} rows to {}", records.len(), output.display());
    Ok(records.len())
}

/// Scan a CSV file and write the report as CSV
pub fn check_file(input: &Path, report: &Path, columns: Option<&[String]>) -> Result<ToolSummary, AppError> {
    let records = CsvSource::new(input).read()?;
    let findings = scan_json_unsafe(&records, columns)?;
    CsvSink::new(report).write(&report_records(&findings))?;

    Ok(ToolSummary {
        rows: records.len(),
        cells: findings.len(),
    })
}

/// Write a copy of a CSV file with JSON-escaped cells.
///
/// With a `report`, only the cells it lists are touched.
pub fn sanitize_file(
    input: &Path,
    output: &Path,
    columns: Option<&[String]>,
    report: Option<&Path>,
) -> Result<ToolSummary, AppError> {
    let targets = match report {
        Some(report) => {
            let targets = report_targets(&CsvSource::new(report).read()?);
            if targets.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "report '{}' lists no row_index/column pairs",
                    report.display()
                ))
                .into());
            }
            Some(targets)
        }
        None => None,
    };

    let mut records = CsvSource::new(input).read()?;
    let changed = sanitize_for_json(&mut records, columns, targets.as_ref())?;
    CsvSink::new(output).write(&records)?;

    Ok(ToolSummary {
        rows: records.len(),
        cells: changed,
    })
}

fn with_stem_suffix(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    input.with_file_name(name)
}

/// `<input>.json`
pub fn json_output_path(input: &Path) -> PathBuf {
    input.with_extension("json")
}

/// `<stem>_json_unsafe_report.<ext>`
pub fn report_output_path(input: &Path) -> PathBuf {
    with_stem_suffix(input, "_json_unsafe_report")
}

/// `<stem>_jsonsafe.<ext>`
pub fn sanitized_output_path(input: &Path) -> PathBuf {
    with_stem_suffix(input, "_jsonsafe")
}
