/*!
 * Markup-preserving translation of tabular records.
 *
 * This module contains the translation core. It is split into several submodules:
 *
 * - `orchestrator`: Retry and fallback around a backend
 * - `cache`: Memoization of translated runs
 * - `pipeline`: Per-cell segmentation, translation and reassembly
 * - `coordinator`: Worker pool over all cells of a record set
 * - `concurrency`: Per-backend worker and delay defaults
 */

// Re-export main types for easier usage
pub use self::cache::{CacheStats, TranslationCache};
pub use self::coordinator::{
    needs_translation, Coordinator, CoordinatorOptions, ProgressFn, RunOutput, RunSummary, TranslationTask,
};
pub use self::orchestrator::{CancellationFlag, Orchestrator, Outcome, ResilienceReport, RetryPolicy};
pub use self::pipeline::{CellOutcome, CellStatus, MarkupTranslator};

// Submodules
pub mod cache;
pub mod concurrency;
pub mod coordinator;
pub mod orchestrator;
pub mod pipeline;
