/*!
 * Tests for JSON export, the unsafe-cell report and escaping
 */

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use loctrans::errors::{AppError, ConfigError};
use loctrans::json_tools::{
    self, find_issues, json_escape, report_records, report_targets, sanitize_for_json, scan_json_unsafe, UnsafeIssue,
};
use loctrans::table::{CsvSource, RowSource};

use crate::common::{create_temp_dir, create_test_file, record_set};

#[test]
fn test_find_issues_shouldListSortedLabelsOnce() {
    let issues = find_issues("说\"好\"\\\n\n");
    assert_eq!(
        issues,
        vec![
            UnsafeIssue::Backslash,
            UnsafeIssue::ControlChar,
            UnsafeIssue::DoubleQuote,
            UnsafeIssue::Newline
        ]
    );
    assert!(find_issues("<color=#ffa500>史诗诡术：2.2%</color>").is_empty());
    assert_eq!(find_issues("\u{1}"), vec![UnsafeIssue::ControlChar]);
}

#[test]
fn test_scan_json_unsafe_shouldLocateCellsAndCopyLocators() {
    let records = record_set(
        &["Table", "Field", "ZH", "TH"],
        &[
            &["items", "name", "普通", "ปกติ"],
            &["items", "desc", "第一行\t第二行", "บรรทัด\"หนึ่ง\""],
        ],
    );

    let findings = scan_json_unsafe(&records, None).unwrap();

    assert_eq!(findings.len(), 2);
    let zh = &findings[0];
    assert_eq!((zh.csv_line, zh.row_index), (3, 2));
    assert_eq!(zh.column, "ZH");
    assert_eq!(zh.issue_labels(), "control_char|tab");
    assert_eq!(zh.value_len, 7);
    assert_eq!(zh.locator[0], "items");
    assert_eq!(zh.locator[2], "desc");
    // No Sheet or Position column
    assert_eq!(zh.locator[1], "");
    assert_eq!(findings[1].issue_labels(), "double_quote");
}

#[test]
fn test_scan_json_unsafe_withMissingColumn_shouldFail() {
    let records = record_set(&["ZH"], &[&["\""]]);
    let columns = vec!["VN".to_string()];
    let result = scan_json_unsafe(&records, Some(columns.as_slice()));
    assert!(matches!(result, Err(ConfigError::MissingColumn(column)) if column == "VN"));
}

#[test]
fn test_report_records_shouldRoundTripIntoTargets() {
    let records = record_set(&["ZH", "TH"], &[&["a\"b", ""], &["ok", "x\\y"]]);
    let findings = scan_json_unsafe(&records, None).unwrap();

    let report = report_records(&findings);

    assert_eq!(report.headers().len(), 10);
    assert_eq!(report.get(0, "issues"), Some("double_quote"));
    assert_eq!(report.get(1, "row_index"), Some("2"));
    let targets = report_targets(&report);
    let expected: HashSet<(usize, String)> = [(1, "ZH".to_string()), (2, "TH".to_string())].into_iter().collect();
    assert_eq!(targets, expected);
}

#[test]
fn test_report_targets_shouldIgnoreMalformedRows() {
    let report = record_set(&["row_index", "column"], &[&["x", "ZH"], &["0", "ZH"], &["3", " "], &[" 4 ", "TH"]]);
    let targets = report_targets(&report);
    assert_eq!(targets.len(), 1);
    assert!(targets.contains(&(4, "TH".to_string())));
}

#[test]
fn test_json_escape_shouldEscapeQuotesAndControlsButKeepUnicode() {
    assert_eq!(json_escape("他说\"好\"\n"), "他说\\\"好\\\"\\n");
    assert_eq!(json_escape("a\\b\tc"), "a\\\\b\\tc");
    assert_eq!(json_escape("สวัสดี"), "สวัสดี");
    assert_eq!(json_escape("\u{1}"), "\\u0001");
}

#[test]
fn test_sanitize_for_json_shouldDefaultToLanguageColumns() {
    let mut records = record_set(&["ID", "ZH", "TH", "Note"], &[&["1", "\"引号\"", "ปกติ", "keep \"this\""]]);

    let changed = sanitize_for_json(&mut records, None, None).unwrap();

    assert_eq!(changed, 1);
    assert_eq!(records.get(0, "ZH"), Some("\\\"引号\\\""));
    assert_eq!(records.get(0, "Note"), Some("keep \"this\""));
}

#[test]
fn test_sanitize_for_json_withTargets_shouldOnlyTouchListedCells() {
    let mut records = record_set(&["ZH", "VN"], &[&["a\"", "b\""], &["c\"", "d\""]]);
    let only: HashSet<(usize, String)> = [(2, "VN".to_string())].into_iter().collect();

    let changed = sanitize_for_json(&mut records, None, Some(&only)).unwrap();

    assert_eq!(changed, 1);
    assert_eq!(records.get(1, "VN"), Some("d\\\""));
    assert_eq!(records.get(0, "VN"), Some("b\""));
    assert_eq!(records.get(1, "ZH"), Some("c\""));
}

#[test]
fn test_export_json_shouldWriteArrayInColumnOrderWithoutBom() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_file(dir.path(), "strings.csv", "\u{feff}ZH,TH\n你好,\"ส\"\"ว\"\n世界,\n").unwrap();
    let output = json_tools::json_output_path(&input);

    let rows = json_tools::export_json(&input, &output).unwrap();

    assert_eq!(rows, 2);
    assert_eq!(output, dir.path().join("strings.json"));
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with('['));
    assert!(text.ends_with("]\n"));
    let zh = text.find("\"ZH\"").unwrap();
    let th = text.find("\"TH\"").unwrap();
    assert!(zh < th);

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value[0]["TH"], "ส\"ว");
    assert_eq!(value[1]["ZH"], "世界");
}

#[test]
fn test_check_then_sanitize_withReport_shouldEscapeReportedCells() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_file(
        dir.path(),
        "strings.csv",
        "ZH,TH,VN\n普通,ปกติ,thường\n\"换\n行\",\"ขึ้น\"\"บรรทัด\",ok\n",
    )
    .unwrap();
    let report = json_tools::report_output_path(&input);

    let check = json_tools::check_file(&input, &report, None).unwrap();
    assert_eq!(check.rows, 2);
    assert_eq!(check.cells, 2);
    assert_eq!(report, dir.path().join("strings_json_unsafe_report.csv"));

    let output = json_tools::sanitized_output_path(&input);
    let summary = json_tools::sanitize_file(&input, &output, None, Some(report.as_path())).unwrap();

    assert_eq!(summary.cells, 2);
    assert_eq!(output, dir.path().join("strings_jsonsafe.csv"));
    let sanitized = CsvSource::new(&output).read().unwrap();
    assert_eq!(sanitized.get(1, "ZH"), Some("换\\n行"));
    assert_eq!(sanitized.get(1, "TH"), Some("ขึ้น\\\"บรรทัด"));
    assert_eq!(sanitized.get(0, "VN"), Some("thường"));
}

#[test]
fn test_sanitize_file_withEmptyReport_shouldRefuse() {
    let dir = create_temp_dir().unwrap();
    let input = create_test_file(dir.path(), "in.csv", "ZH\n\"\"\"\"\n").unwrap();
    let report = create_test_file(dir.path(), "report.csv", "row_index,column\n").unwrap();

    let result = json_tools::sanitize_file(&input, &dir.path().join("out.csv"), None, Some(report.as_path()));

    assert!(matches!(result, Err(AppError::Config(ConfigError::Invalid(_)))));
    assert!(!dir.path().join("out.csv").exists());
}

#[test]
fn test_output_paths_shouldKeepDirectoryAndExtension() {
    let input = Path::new("/data/loc/strings.csv");
    assert_eq!(json_tools::json_output_path(input), Path::new("/data/loc/strings.json"));
    assert_eq!(
        json_tools::report_output_path(input),
        Path::new("/data/loc/strings_json_unsafe_report.csv")
    );
    assert_eq!(json_tools::sanitized_output_path(input), Path::new("/data/loc/strings_jsonsafe.csv"));
    assert_eq!(json_tools::sanitized_output_path(Path::new("table")), Path::new("table_jsonsafe"));
}
