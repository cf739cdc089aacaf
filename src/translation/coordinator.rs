/*!
 * Row translation coordinator.
 *
 * Plans one task per target cell that needs translating, runs the tasks on
 * a fixed pool of workers sharing a queue, writes results back into the
 * record set, and flushes the whole set to the sink every
 * `checkpoint_every` finished cells and once more at the end.
 */

use log::{error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::app_config::Config;
use crate::errors::{AppError, ConfigError, TableError};
use crate::table::{RecordSet, RowSink};
use crate::translation::orchestrator::CancellationFlag;
use crate::translation::pipeline::{CellStatus, MarkupTranslator};

/// Called with `(finished, total)` after every task
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Whether a target cell should be (re)translated.
///
/// True when the target is blank, when it still equals the source text
/// (an untranslated copy), or when `force` is set. A proper noun that is
/// legitimately identical in both languages will be sent again.
pub fn needs_translation(source: &str, target: &str, force: bool) -> bool {
    force || target.trim().is_empty() || target.trim() == source.trim()
}

/// One cell to translate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTask {
    pub record_index: usize,
    /// Target column
    pub column: String,
    /// Logical language of the target column
    pub target_lang: String,
    pub source_text: String,
}

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_tasks: usize,
    pub translated: usize,
    pub unchanged: usize,
    pub failed: usize,
    /// Cells that did not need translating
    pub skipped: usize,
    pub cancelled: usize,
    /// Successful intermediate flushes
    pub checkpoints: usize,
    pub checkpoint_failures: usize,
}

/// Coordinator settings
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorOptions {
    pub source_column: String,
    pub target_columns: Vec<String>,
    /// Translate even cells that already hold a translation
    pub force: bool,
    pub concurrency: usize,
    /// Flush to the sink every N finished tasks
    pub checkpoint_every: usize,
}

impl CoordinatorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_column: config.source_column.clone(),
            target_columns: config.target_columns.clone(),
            force: !config.skip_existing,
            concurrency: config.translation.effective_concurrency(),
            checkpoint_every: config.translation.common.batch_checkpoint_size,
        }
    }
}

/// Result of a run: the final record set and its counters
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub records: RecordSet,
    pub summary: RunSummary,
}

/// State shared by the workers
struct RunState {
    records: Mutex<RecordSet>,
    summary: Mutex<RunSummary>,
    finished: AtomicUsize,
    /// Held for the whole of a sink write
    write_gate: tokio::sync::Mutex<()>,
}

impl RunState {
    /// Write a snapshot of the records on the blocking pool.
    ///
    /// The record lock is only held while cloning; writes never overlap.
    async fn flush(&self, sink: &Arc<dyn RowSink>) -> Result<(), TableError> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.records.lock().clone();
        let sink = Arc::clone(sink);
        tokio::task::spawn_blocking(move || sink.write(&snapshot))
            .await
            .map_err(|e| TableError::Io(std::io::Error::other(e.to_string())))?
    }
}

/// Fans cell translations out over a worker pool
pub struct Coordinator {
    translator: MarkupTranslator,
    options: CoordinatorOptions,
    cancel: CancellationFlag,
    progress: Option<ProgressFn>,
}

impl Coordinator {
    pub fn new(translator: MarkupTranslator, options: CoordinatorOptions) -> Self {
        let cancel = translator.orchestrator().cancellation().clone();
        Self {
            translator,
            options,
            cancel,
            progress: None,
        }
    }

    /// Report progress after every task
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The flag that stops this run
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    pub fn translator(&self) -> &MarkupTranslator {
        &self.translator
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    /// Check the columns and list the cells to translate.
    ///
    /// # Returns
    /// * The tasks, and how many cells were skipped
    pub fn plan_tasks(&self, records: &RecordSet) -> Result<(Vec<TranslationTask>, usize), ConfigError> {
        let source_column = &self.options.source_column;
        if !records.has_column(source_column) {
            return Err(ConfigError::MissingColumn(source_column.clone()));
        }
        if let Some(missing) = self
            .options
            .target_columns
            .iter()
            .find(|column| !records.has_column(column))
        {
            return Err(ConfigError::MissingColumn(missing.clone()));
        }

        let mut tasks = Vec::new();
        let mut skipped = 0;

        for (record_index, record) in records.records().iter().enumerate() {
            let source_text = record.get(source_column).unwrap_or_default();
            if source_text.trim().is_empty() {
                skipped += self.options.target_columns.len();
                continue;
            }

            for column in &self.options.target_columns {
                let current = record.get(column).unwrap_or_default();
                if needs_translation(source_text, current, self.options.force) {
                    tasks.push(TranslationTask {
                        record_index,
                        column: column.clone(),
                        target_lang: column.clone(),
                        source_text: source_text.to_string(),
                    });
                } else {
                    skipped += 1;
                }
            }
        }

        Ok((tasks, skipped))
    }

    /// Translate every needed cell and flush the result to `sink`.
    ///
    /// Per-cell failures keep the source text and never abort the run. A cell
    /// whose task was started and then cancelled gets the source text too;
    /// cells never picked up stay as they were.
    /// Checkpoint write failures are logged; a failing final write is an error.
    pub async fn run(&self, records: RecordSet, sink: Arc<dyn RowSink>) -> Result<RunOutput, AppError> {
        let (tasks, skipped) = self.plan_tasks(&records)?;
        let total = tasks.len();
        let workers = self.options.concurrency.max(1).min(total.max(1));

        info!(
            "Translating {} cell(s) from {} into {:?} with {} worker(s) ({} skipped)",
            total, self.options.source_column, self.options.target_columns, workers, skipped
        );

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let state = Arc::new(RunState {
            records: Mutex::new(records),
            summary: Mutex::new(RunSummary {
                total_tasks: total,
                skipped,
                ..RunSummary::default()
            }),
            finished: AtomicUsize::new(0),
            write_gate: tokio::sync::Mutex::new(()),
        });

        let mut join_set = JoinSet::new();
        for worker_id in 0..workers {
            let translator = self.translator.clone();
            let queue = Arc::clone(&queue);
            let state = Arc::clone(&state);
            let sink = Arc::clone(&sink);
            let cancel = self.cancel.clone();
            let progress = self.progress.clone();
            let source_column = self.options.source_column.clone();
            let checkpoint_every = self.options.checkpoint_every.max(1);

            join_set.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let task = match queue.lock().pop_front() {
                        Some(task) => task,
                        None => break,
                    };

                    let outcome = translator
                        .translate_cell(&task.source_text, &source_column, &task.target_lang)
                        .await;

                    {
                        let mut records = state.records.lock();
                        let mut summary = state.summary.lock();
                        records.set(task.record_index, &task.column, outcome.text);
                        match outcome.status {
                            CellStatus::Translated => summary.translated += 1,
                            CellStatus::Unchanged => summary.unchanged += 1,
                            CellStatus::Cancelled => summary.cancelled += 1,
                            CellStatus::Failed(_) => summary.failed += 1,
                        }
                    }

                    let finished = state.finished.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(progress) = &progress {
                        progress(finished, total);
                    }

                    if finished % checkpoint_every == 0 && finished < total {
                        let result = state.flush(&sink).await;
                        let mut summary = state.summary.lock();
                        match result {
                            Ok(()) => summary.checkpoints += 1,
                            Err(e) => {
                                summary.checkpoint_failures += 1;
                                warn!("Worker {}: checkpoint after {} cells failed: {}", worker_id, finished, e);
                            }
                        }
                    }
                }
            });
        }

        while let Some(result) = join_set.join_next().await {
            if let Err(e) = result {
                error!("Translation worker stopped unexpectedly: {}", e);
            }
        }

        let abandoned = queue.lock().len();
        let records = state.records.lock().clone();
        let mut summary = state.summary.lock().clone();
        summary.cancelled += abandoned;
        // A worker that died mid-task leaves its cell untouched
        let accounted = summary.translated + summary.unchanged + summary.failed + summary.cancelled;
        if accounted < total {
            summary.cancelled += total - accounted;
        }

        state.flush(&sink).await?;

        info!(
            "Run finished: {} translated, {} unchanged, {} failed, {} skipped, {} cancelled",
            summary.translated, summary.unchanged, summary.failed, summary.skipped, summary.cancelled
        );

        Ok(RunOutput { records, summary })
    }
}
