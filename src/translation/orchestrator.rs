/*!
 * Retry and fallback around a translation backend.
 *
 * Each run of text gets up to `max_attempts` tries on the primary backend.
 * Rate limits and connection problems rotate the backend to its next
 * endpoint and back off linearly; other failures wait a short fixed delay.
 * Once the primary is exhausted the fallback backend, if any, gets exactly
 * one try.
 */

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationConfig;
use crate::errors::BackendError;
use crate::providers::Backend;

/// Shared stop signal for a run
///
/// Checked before every task and every backend attempt. Calls already in
/// flight are not aborted.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Timing and attempt limits
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Tries on the primary backend
    pub max_attempts: u32,
    /// Multiplied by the attempt index after rate-limit and connection failures
    pub base_delay: Duration,
    /// Wait after any other failure
    pub short_delay: Duration,
    /// Courtesy pause after every call
    pub inter_call_delay: Duration,
}

impl RetryPolicy {
    /// Policy from the translation settings
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_attempts: config.common.max_retries.max(1),
            base_delay: Duration::from_millis(config.common.retry_backoff_ms),
            short_delay: Duration::from_millis(config.common.short_retry_delay_ms),
            inter_call_delay: config.effective_inter_call_delay(),
        }
    }

    /// Policy with no waiting at all
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            short_delay: Duration::ZERO,
            inter_call_delay: Duration::ZERO,
        }
    }

    /// Wait before the next try after `error` on attempt `attempt` (1-based)
    pub fn delay_for(&self, error: &BackendError, attempt: u32) -> Duration {
        if error.is_transient() {
            self.base_delay * attempt
        } else {
            self.short_delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TranslationConfig::default())
    }
}

/// Final state of a resilient translation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A backend answered; the text may be empty when it found nothing
    Success(String),
    /// Every permitted attempt failed; holds the last error
    Failed(BackendError),
    /// The run was cancelled before an answer arrived
    Cancelled,
}

/// What happened while translating one run of text
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceReport {
    pub outcome: Outcome,
    /// Backend calls made, fallback included
    pub attempts: u32,
    /// Retry waits, in order
    pub delays: Vec<Duration>,
    /// Whether the fallback backend was called
    pub used_fallback: bool,
}

impl ResilienceReport {
    fn new() -> Self {
        Self {
            outcome: Outcome::Cancelled,
            attempts: 0,
            delays: Vec::new(),
            used_fallback: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }
}

/// Drives a primary backend and an optional fallback
#[derive(Debug, Clone)]
pub struct Orchestrator {
    primary: Arc<dyn Backend>,
    fallback: Option<Arc<dyn Backend>>,
    policy: RetryPolicy,
    cancel: CancellationFlag,
}

impl Orchestrator {
    /// Create an orchestrator without a fallback
    pub fn new(primary: Arc<dyn Backend>, policy: RetryPolicy) -> Self {
        Self {
            primary,
            fallback: None,
            policy,
            cancel: CancellationFlag::new(),
        }
    }

    /// Set the fallback backend
    pub fn with_fallback(mut self, fallback: Arc<dyn Backend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Share a cancellation flag with the caller
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Name of the primary backend
    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    /// Translate `text` from the `source` column language into the `target`
    /// column language, retrying and falling back as configured.
    pub async fn translate_with_resilience(&self, text: &str, source: &str, target: &str) -> ResilienceReport {
        let mut report = ResilienceReport::new();
        let mut last_error = None;

        match resolve_codes(self.primary.as_ref(), source, target) {
            Ok((source_code, target_code)) => {
                for attempt in 1..=self.policy.max_attempts {
                    if self.cancel.is_cancelled() {
                        report.outcome = Outcome::Cancelled;
                        return report;
                    }

                    report.attempts += 1;
                    debug!("{} attempt {}/{}", self.primary.name(), attempt, self.policy.max_attempts);
                    let result = self.primary.translate(text, &target_code, &source_code).await;
                    self.courtesy_pause().await;

                    let error = match result {
                        Ok(translation) => {
                            report.outcome = Outcome::Success(translation);
                            return report;
                        }
                        Err(error) => error,
                    };

                    if matches!(error, BackendError::InvalidCredentials(_)) {
                        warn!("{} rejected the credentials: {}", self.primary.name(), error);
                        last_error = Some(error);
                        break;
                    }

                    if attempt == self.policy.max_attempts {
                        last_error = Some(error);
                        break;
                    }

                    if error.is_transient() && self.primary.rotate() {
                        debug!("{} rotated endpoint after {}", self.primary.name(), error.kind());
                    }

                    let delay = self.policy.delay_for(&error, attempt);
                    warn!(
                        "{} attempt {} failed ({}), retrying in {:?}",
                        self.primary.name(),
                        attempt,
                        error,
                        delay
                    );
                    report.delays.push(delay);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(error);
                }
            }
            Err(error) => last_error = Some(error),
        }

        if let Some(fallback) = &self.fallback {
            if self.cancel.is_cancelled() {
                report.outcome = Outcome::Cancelled;
                return report;
            }

            match resolve_codes(fallback.as_ref(), source, target) {
                Ok((source_code, target_code)) => {
                    warn!("{} exhausted, trying {}", self.primary.name(), fallback.name());
                    report.attempts += 1;
                    report.used_fallback = true;
                    let result = fallback.translate(text, &target_code, &source_code).await;
                    self.courtesy_pause().await;

                    match result {
                        Ok(translation) => {
                            report.outcome = Outcome::Success(translation);
                            return report;
                        }
                        Err(error) => last_error = Some(error),
                    }
                }
                Err(error) => last_error = Some(error),
            }
        }

        report.outcome = Outcome::Failed(
            last_error.unwrap_or_else(|| BackendError::Unknown("No attempt was made".to_string())),
        );
        report
    }

    async fn courtesy_pause(&self) {
        if !self.policy.inter_call_delay.is_zero() {
            tokio::time::sleep(self.policy.inter_call_delay).await;
        }
    }
}

/// Look up the backend's codes for the two columns
fn resolve_codes(backend: &dyn Backend, source: &str, target: &str) -> Result<(String, String), BackendError> {
    let languages = backend.language_map();
    let missing = |column: &str| {
        BackendError::Unknown(format!("{} has no language code for column '{}'", backend.name(), column))
    };

    let source_code = languages.resolve(source).ok_or_else(|| missing(source))?;
    let target_code = languages.resolve(target).ok_or_else(|| missing(target))?;
    Ok((source_code, target_code))
}
