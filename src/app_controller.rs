use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::providers::create_backend;
use crate::table::{CsvSink, CsvSource, RowSink, RowSource};
use crate::translation::{
    CancellationFlag, Coordinator, CoordinatorOptions, MarkupTranslator, Orchestrator, ProgressFn, RetryPolicy,
    RunOutput, RunSummary, TranslationCache,
};

// @module: Application controller for table translation

/// Main application controller for table translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Stops the run when set (Ctrl-C)
    cancel: CancellationFlag,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        Ok(Self {
            config,
            cancel: CancellationFlag::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag that stops the current run; hand it to a signal handler
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Output path used when none is given: `<stem>_translated.csv` next to the input
    pub fn default_output_path(input_file: &Path) -> PathBuf {
        let stem = input_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        input_file.with_file_name(format!("{}_translated.csv", stem))
    }

    /// Wire the configured backends, retry policy and cache together
    pub fn build_translator(&self) -> MarkupTranslator {
        let translation = &self.config.translation;
        let primary = create_backend(translation, translation.backend);

        let mut orchestrator = Orchestrator::new(primary, RetryPolicy::from_config(translation))
            .with_cancellation(self.cancel.clone());
        if let Some(fallback) = translation.fallback.filter(|f| *f != translation.backend) {
            orchestrator = orchestrator.with_fallback(create_backend(translation, fallback));
        }

        MarkupTranslator::new(orchestrator, TranslationCache::default())
    }

    /// Translate a CSV file into `output_file`
    pub async fn run(&self, input_file: PathBuf, output_file: PathBuf) -> Result<RunSummary> {
        let start_time = std::time::Instant::now();

        if !input_file.exists() {
            return Err(anyhow::anyhow!("Input file does not exist: {:?}", input_file));
        }

        info!(
            "loctrans: {} (fallback: {})",
            self.config.translation.backend.display_name(),
            self.config
                .translation
                .fallback
                .map(|f| f.display_name().to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let source = CsvSource::new(&input_file);
        let sink: Arc<dyn RowSink> = Arc::new(CsvSink::new(&output_file));
        let output = self
            .run_with(self.build_translator(), &source, sink, true)
            .await?;

        if self.cancel.is_cancelled() {
            warn!("Run cancelled; partial results written to {}", output_file.display());
        }

        info!(
            "Translation completed in {}. {} translated, {} failed, {} skipped.",
            Self::format_duration(start_time.elapsed()),
            output.summary.translated,
            output.summary.failed,
            output.summary.skipped
        );
        info!("Success: {}", output_file.display());

        Ok(output.summary)
    }

    /// Run the coordinator over any source and sink
    pub async fn run_with(
        &self,
        translator: MarkupTranslator,
        source: &dyn RowSource,
        sink: Arc<dyn RowSink>,
        show_progress: bool,
    ) -> Result<RunOutput> {
        let records = source.read().context("Failed to read input rows")?;

        let mut coordinator = Coordinator::new(translator, CoordinatorOptions::from_config(&self.config));

        let progress_bar = if show_progress {
            let progress_bar = ProgressBar::new(0);
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cells ({percent}%) {msg} {eta}")
                .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            progress_bar.set_style(style.progress_chars("#>-"));
            progress_bar.set_message("Translating");

            let pb = progress_bar.clone();
            let callback: ProgressFn = Arc::new(move |finished, total| {
                pb.set_length(total as u64);
                pb.set_position(finished as u64);
            });
            coordinator = coordinator.with_progress(callback);
            Some(progress_bar)
        } else {
            None
        };

        let result = coordinator.run(records, sink).await;

        if let Some(progress_bar) = progress_bar {
            progress_bar.finish_and_clear();
        }

        let output = result?;
        let stats = coordinator.translator().cache().stats();
        info!(
            "Cache: {} hits, {} misses ({:.0}% hit rate)",
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0
        );

        Ok(output)
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
