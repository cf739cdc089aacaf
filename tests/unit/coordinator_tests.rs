/*!
 * Tests for task planning, the worker pool and checkpoints
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loctrans::errors::{AppError, BackendError, ConfigError};
use loctrans::providers::mock::MockBackend;
use loctrans::table::MemorySink;
use loctrans::translation::{
    needs_translation, Coordinator, CoordinatorOptions, MarkupTranslator, Orchestrator, RetryPolicy,
    TranslationCache,
};

use crate::common::{record_set, tagging_backend, translator_for, FlakySink, SlowSink};

fn options(concurrency: usize, checkpoint_every: usize) -> CoordinatorOptions {
    CoordinatorOptions {
        source_column: "ZH".to_string(),
        target_columns: vec!["TH".to_string(), "VN".to_string()],
        force: false,
        concurrency,
        checkpoint_every,
    }
}

#[test]
fn test_needs_translation_truthTable() {
    // Blank target
    assert!(needs_translation("你好", "", false));
    assert!(needs_translation("你好", "   ", false));
    // Untranslated copy
    assert!(needs_translation("你好", "你好", false));
    assert!(needs_translation("你好", " 你好 ", false));
    // Already translated
    assert!(!needs_translation("你好", "สวัสดี", false));
    // Force overrides everything
    assert!(needs_translation("你好", "สวัสดี", true));
}

#[test]
fn test_plan_tasks_shouldSkipFilledCellsAndEmptySources() {
    let records = record_set(
        &["ID", "ZH", "TH", "VN"],
        &[
            &["1", "你好", "", "xin chào"],
            &["2", "", "", ""],
            &["3", "世界", "世界", ""],
        ],
    );
    let coordinator = Coordinator::new(translator_for(tagging_backend()), options(2, 10));

    let (tasks, skipped) = coordinator.plan_tasks(&records).unwrap();

    let planned: Vec<(usize, &str)> = tasks.iter().map(|t| (t.record_index, t.column.as_str())).collect();
    assert_eq!(planned, vec![(0, "TH"), (2, "TH"), (2, "VN")]);
    // Row 1 VN is filled, row 2 has no source (two cells)
    assert_eq!(skipped, 3);
    assert_eq!(tasks[1].source_text, "世界");
    assert_eq!(tasks[1].target_lang, "TH");
}

#[test]
fn test_plan_tasks_withForce_shouldIncludeFilledCells() {
    let records = record_set(&["ZH", "TH", "VN"], &[&["你好", "สวัสดี", "xin chào"]]);
    let mut opts = options(1, 10);
    opts.force = true;
    let coordinator = Coordinator::new(translator_for(tagging_backend()), opts);

    let (tasks, skipped) = coordinator.plan_tasks(&records).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(skipped, 0);
}

#[test]
fn test_plan_tasks_withMissingColumn_shouldFail() {
    let records = record_set(&["ZH", "TH"], &[&["你好", ""]]);
    let coordinator = Coordinator::new(translator_for(tagging_backend()), options(1, 10));

    let result = coordinator.plan_tasks(&records);
    assert_eq!(result.unwrap_err(), ConfigError::MissingColumn("VN".to_string()));
}

#[tokio::test]
async fn test_run_withMissingSourceColumn_shouldFailBeforeCallingBackend() {
    let backend = tagging_backend();
    let records = record_set(&["CN", "TH", "VN"], &[&["你好", "", ""]]);
    let coordinator = Coordinator::new(translator_for(backend.clone()), options(1, 10));

    let result = coordinator.run(records, Arc::new(MemorySink::new())).await;

    assert!(matches!(result, Err(AppError::Config(ConfigError::MissingColumn(_)))));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_run_shouldWriteTranslationsAndFlushAtCheckpoints() {
    let records = record_set(
        &["ZH", "TH", "VN"],
        &[&["一", "", ""], &["二", "", ""], &["三", "", ""]],
    );
    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(translator_for(tagging_backend()), options(3, 2));

    let output = coordinator.run(records, sink.clone()).await.unwrap();

    assert_eq!(output.summary.total_tasks, 6);
    assert_eq!(output.summary.translated, 6);
    // Checkpoints after 2 and 4 finished cells, then the final flush
    assert_eq!(output.summary.checkpoints, 2);
    assert_eq!(sink.write_count(), 3);

    let written = sink.last().unwrap();
    assert_eq!(written.get(0, "TH"), Some("th:一"));
    assert_eq!(written.get(2, "VN"), Some("vn:三"));
    assert_eq!(written, output.records);
}

#[tokio::test]
async fn test_run_withFailingBackend_shouldKeepSourceTextAndComplete() {
    let backend = MockBackend::failing(BackendError::ServiceUnavailable("down".to_string()));
    let records = record_set(&["ZH", "TH", "VN"], &[&["你好", "", ""]]);
    let coordinator = Coordinator::new(translator_for(backend), options(2, 10));

    let output = coordinator.run(records, Arc::new(MemorySink::new())).await.unwrap();

    assert_eq!(output.summary.failed, 2);
    assert_eq!(output.records.get(0, "TH"), Some("你好"));
    assert_eq!(output.records.get(0, "VN"), Some("你好"));
}

#[tokio::test]
async fn test_run_withFailingCheckpoints_shouldContinueAndFlushAtEnd() {
    let records = record_set(
        &["ZH", "TH", "VN"],
        &[&["一", "", ""], &["二", "", ""]],
    );
    // Checkpoints after 1, 2 and 3 cells fail; the final write succeeds
    let sink = Arc::new(FlakySink::failing_first(3));
    let coordinator = Coordinator::new(translator_for(tagging_backend()), options(1, 1));

    let output = coordinator.run(records, sink.clone()).await.unwrap();

    assert_eq!(output.summary.translated, 4);
    assert_eq!(output.summary.checkpoint_failures, 3);
    assert_eq!(output.summary.checkpoints, 0);
    assert_eq!(sink.write_count(), 4);
}

#[tokio::test]
async fn test_run_withFailingFinalFlush_shouldReturnError() {
    let records = record_set(&["ZH", "TH", "VN"], &[&["一", "", ""]]);
    let coordinator = Coordinator::new(translator_for(tagging_backend()), options(1, 10));

    let result = coordinator.run(records, Arc::new(FlakySink::always_failing())).await;

    assert!(matches!(result, Err(AppError::Table(_))));
}

#[tokio::test]
async fn test_run_withCancelledFlag_shouldLeaveCellsUntouchedAndStillFlush() {
    let backend = tagging_backend();
    let records = record_set(&["ZH", "TH", "VN"], &[&["一", "", "已有"], &["二", "", ""]]);
    let sink = Arc::new(MemorySink::new());
    let coordinator = Coordinator::new(translator_for(backend.clone()), options(2, 10));
    coordinator.cancellation().cancel();

    let output = coordinator.run(records, sink.clone()).await.unwrap();

    assert_eq!(backend.call_count(), 0);
    assert_eq!(output.summary.cancelled, 3);
    assert_eq!(output.records.get(0, "TH"), Some(""));
    assert_eq!(output.records.get(0, "VN"), Some("已有"));
    assert_eq!(sink.write_count(), 1);
}

#[tokio::test]
async fn test_run_shouldReportProgressForEveryTask() {
    let records = record_set(&["ZH", "TH", "VN"], &[&["一", "", ""], &["二", "", ""]]);
    let calls = Arc::new(AtomicUsize::new(0));
    let last_total = Arc::new(AtomicUsize::new(0));

    let calls_clone = Arc::clone(&calls);
    let total_clone = Arc::clone(&last_total);
    let coordinator = Coordinator::new(translator_for(tagging_backend()), options(2, 10)).with_progress(Arc::new(
        move |_finished, total| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            total_clone.store(total, Ordering::SeqCst);
        },
    ));

    coordinator.run(records, Arc::new(MemorySink::new())).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(last_total.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_run_withRepeatedSourceText_shouldHitCache() {
    let backend = tagging_backend();
    let records = record_set(
        &["ZH", "TH", "VN"],
        &[&["确定", "", "x"], &["确定", "", "x"], &["确定", "", "x"]],
    );
    // One worker so the second and third cells see the cached result
    let coordinator = Coordinator::new(translator_for(backend.clone()), options(1, 10));

    let output = coordinator.run(records, Arc::new(MemorySink::new())).await.unwrap();

    assert_eq!(output.summary.translated, 3);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_run_withCancelDuringBackoff_shouldWriteSourceTextIntoStartedCell() {
    let backend = MockBackend::fail_first(10, BackendError::RateLimited("slow down".to_string()));
    let policy = RetryPolicy {
        max_attempts: 10,
        base_delay: Duration::from_millis(100),
        short_delay: Duration::from_millis(100),
        inter_call_delay: Duration::ZERO,
    };
    let orchestrator = Orchestrator::new(Arc::new(backend.clone()), policy);
    let translator = MarkupTranslator::new(orchestrator, TranslationCache::default());
    // VN is filled, so TH is the only task
    let records = record_set(&["ZH", "TH", "VN"], &[&["你好", "", "xin chào"]]);
    let coordinator = Coordinator::new(translator, options(1, 10));

    let cancel = coordinator.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let output = coordinator.run(records, Arc::new(MemorySink::new())).await.unwrap();

    assert_eq!(backend.call_count(), 1);
    assert_eq!(output.summary.cancelled, 1);
    assert_eq!(output.summary.failed, 0);
    assert_eq!(output.records.get(0, "TH"), Some("你好"));
    assert_eq!(output.records.get(0, "VN"), Some("xin chào"));
}

#[tokio::test]
async fn test_run_withSlowBackend_shouldOverlapCallsUpToConcurrency() {
    let backend = MockBackend::slow(30);
    let rows: Vec<[String; 3]> = (0..6)
        .map(|i| [format!("句子{}", i), String::new(), String::new()])
        .collect();
    let row_refs: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
    let row_slices: Vec<&[&str]> = row_refs.iter().map(Vec::as_slice).collect();
    let records = record_set(&["ZH", "TH", "VN"], &row_slices);
    let coordinator = Coordinator::new(translator_for(backend.clone()), options(3, 100));

    let output = coordinator.run(records, Arc::new(MemorySink::new())).await.unwrap();

    assert_eq!(output.summary.translated, 12);
    assert_eq!(backend.call_count(), 12);
    let peak = backend.max_in_flight();
    assert!(peak <= 3, "{} calls overlapped with 3 workers", peak);
    assert!(peak > 1, "workers never overlapped");
}

#[tokio::test]
async fn test_run_withSlowSink_shouldWriteOffTheRuntimeThreadOneAtATime() {
    let test_thread = std::thread::current().id();
    let records = record_set(
        &["ZH", "TH", "VN"],
        &[&["一", "", ""], &["二", "", ""], &["三", "", ""]],
    );
    let sink = Arc::new(SlowSink::new(20));
    let coordinator = Coordinator::new(translator_for(tagging_backend()), options(3, 1));

    let output = coordinator.run(records, sink.clone()).await.unwrap();

    // Checkpoints after cells 1 to 5, then the final flush
    assert_eq!(output.summary.checkpoints, 5);
    let threads = sink.write_threads();
    assert_eq!(threads.len(), 6);
    assert!(threads.iter().all(|thread| *thread != test_thread));
    assert_eq!(sink.max_concurrent_writes(), 1);
    assert_eq!(sink.last().unwrap(), output.records);
}
