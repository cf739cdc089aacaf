/*!
 * # loctrans - localization table translator
 *
 * A Rust library for batch translation of game localization tables whose
 * strings carry inline `<color=...>...</color>` markup.
 *
 * ## Features
 *
 * - Markup segmentation: color spans keep their tags verbatim and only the
 *   content is translated; stray tags are re-inserted proportionally
 * - Translate through several backends:
 *   - Free web translate endpoint with host rotation
 *   - DeepL-style cloud API
 *   - OpenAI-compatible chat API
 *   - MyMemory-style dictionary API
 * - Retry with backoff, endpoint rotation and a one-shot fallback backend
 * - In-memory translation cache
 * - JSON export, JSON-unsafe cell report and escaping of CSV tables
 * - Worker pool with periodic checkpoints and cancellation
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `markup`: Segmentation and tag repositioning
 * - `providers`: Translation backend clients
 * - `translation`: Translation core:
 *   - `translation::orchestrator`: Retry and fallback
 *   - `translation::cache`: Caching of translated runs
 *   - `translation::pipeline`: Per-cell translation
 *   - `translation::coordinator`: Worker pool over a record set
 * - `table`: Records, CSV source and sink
 * - `json_tools`: JSON export and hygiene checks
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `language_utils`: Column to backend language code mapping
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod json_tools;
pub mod language_utils;
pub mod markup;
pub mod providers;
pub mod table;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{BackendType, Config};
pub use errors::{AppError, BackendError, ConfigError, TableError};
pub use language_utils::{get_language_name, LanguageMap};
pub use markup::{Segment, TagPosition, Unit};
pub use providers::Backend;
pub use table::{CsvSink, CsvSource, MemorySink, Record, RecordSet, RowSink, RowSource};
pub use translation::{
    CancellationFlag, Coordinator, MarkupTranslator, Orchestrator, RetryPolicy, RunSummary, TranslationCache,
};
