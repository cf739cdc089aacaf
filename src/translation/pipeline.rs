/*!
 * Markup-preserving translation of a single cell.
 *
 * A cell is segmented, well-formed color spans have only their content
 * translated, and runs of plain text mixed with stray tags are translated as
 * one piece with the tags re-inserted proportionally afterwards. A cell is
 * all or nothing: if any run fails, the source text is kept.
 */

use log::{debug, error};

use crate::errors::BackendError;
use crate::markup::{self, Segment, Unit};
use crate::translation::cache::{truncate_text, TranslationCache};
use crate::translation::orchestrator::{Orchestrator, Outcome};

/// How a cell ended up
#[derive(Debug, Clone, PartialEq)]
pub enum CellStatus {
    /// At least part of the text was translated
    Translated,
    /// Nothing needed translating (tags only, or the backend found nothing)
    Unchanged,
    /// A run could not be translated; the text is the source text
    Failed(BackendError),
    /// The run was cancelled before finishing; the text is the source text
    Cancelled,
}

/// Text to write into the target cell, and how it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct CellOutcome {
    pub text: String,
    pub status: CellStatus,
}

impl CellOutcome {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            status: CellStatus::Unchanged,
        }
    }
}

/// Why a run could not be translated
enum RunFailure {
    Failed(BackendError),
    Cancelled,
}

/// Translates cells through the cache and the orchestrator
#[derive(Debug, Clone)]
pub struct MarkupTranslator {
    orchestrator: Orchestrator,
    cache: TranslationCache,
}

impl MarkupTranslator {
    pub fn new(orchestrator: Orchestrator, cache: TranslationCache) -> Self {
        Self { orchestrator, cache }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Translate one cell from the `source` column language into the
    /// `target` column language
    pub async fn translate_cell(&self, text: &str, source: &str, target: &str) -> CellOutcome {
        let segments = markup::segment(text);
        if !markup::has_translatable_text(&segments) {
            return CellOutcome::unchanged(text);
        }

        match self.translate_units(&segments, source, target).await {
            Ok(translated) if translated == text => CellOutcome::unchanged(text),
            Ok(translated) => CellOutcome {
                text: translated,
                status: CellStatus::Translated,
            },
            Err(RunFailure::Cancelled) => CellOutcome {
                text: text.to_string(),
                status: CellStatus::Cancelled,
            },
            Err(RunFailure::Failed(e)) => {
                error!(
                    "Keeping source text for '{}' ({} -> {}): {}",
                    truncate_text(text, 30),
                    source,
                    target,
                    e
                );
                CellOutcome {
                    text: text.to_string(),
                    status: CellStatus::Failed(e),
                }
            }
        }
    }

    async fn translate_units(&self, segments: &[Segment], source: &str, target: &str) -> Result<String, RunFailure> {
        let mut output = String::new();
        let mut inline: Vec<Segment> = Vec::new();

        for unit in markup::group_units(segments) {
            match unit {
                Unit::Paired { open, content, close } => {
                    if !inline.is_empty() {
                        output.push_str(&self.translate_inline(&inline, source, target).await?);
                        inline.clear();
                    }
                    output.push_str(&open);
                    output.push_str(&self.translate_run(&content, source, target).await?);
                    output.push_str(&close);
                }
                Unit::Text(text) => inline.push(Segment::Plain(text)),
                Unit::Loose(tag) => inline.push(Segment::Tag(tag)),
            }
        }

        if !inline.is_empty() {
            output.push_str(&self.translate_inline(&inline, source, target).await?);
        }

        Ok(output)
    }

    /// Plain text mixed with loose tags: translate the plain projection, then
    /// put the tags back at scaled offsets
    async fn translate_inline(&self, segments: &[Segment], source: &str, target: &str) -> Result<String, RunFailure> {
        let (plain, positions) = markup::extract_tag_positions(segments);
        if positions.is_empty() {
            return self.translate_run(&plain, source, target).await;
        }
        if plain.trim().is_empty() {
            return Ok(markup::join(segments));
        }

        debug!("Repositioning {} loose tag(s)", positions.len());
        let translated = self.translate_run(&plain, source, target).await?;
        Ok(markup::reconstruct(&translated, &positions, &plain))
    }

    /// Translate a run of plain text, keeping its outer whitespace
    async fn translate_run(&self, text: &str, source: &str, target: &str) -> Result<String, RunFailure> {
        let (leading, core, trailing) = markup::split_whitespace_margins(text);
        if core.is_empty() {
            return Ok(text.to_string());
        }

        let translated = self
            .cache
            .get_or_compute(core, source, target, || async {
                let report = self.orchestrator.translate_with_resilience(core, source, target).await;
                match report.outcome {
                    Outcome::Success(translation) => Ok(translation),
                    Outcome::Failed(e) => Err(RunFailure::Failed(e)),
                    Outcome::Cancelled => Err(RunFailure::Cancelled),
                }
            })
            .await?;

        let translated = translated.trim();
        if translated.is_empty() {
            debug!("No translation found for '{}', keeping it", truncate_text(core, 30));
            return Ok(text.to_string());
        }

        Ok(format!("{}{}{}", leading, translated, trailing))
    }
}
