/*!
 * Mock backend for testing.
 *
 * This module provides a scriptable backend that simulates different behaviors:
 * - `MockBackend::working()` - Always succeeds with a tagged translation
 * - `MockBackend::fail_first(n, error)` - Fails n times, then succeeds
 * - `MockBackend::failing(error)` - Always fails with the given error
 * - `MockBackend::slow(delay_ms)` - Succeeds after a delay
 *
 * Every call is counted and recorded so tests can assert on dispatch, and
 * the highest number of overlapping calls is kept.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::BackendError;
use crate::language_utils::LanguageMap;
use crate::providers::Backend;

/// Function turning `(text, target_code)` into a translation
pub type TransformFn = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails with `error` for the first `count` calls, then succeeds
    FailFirst { count: usize, error: BackendError },
    /// Always fails with `error`
    Failing(BackendError),
    /// Succeeds with an empty translation
    Empty,
    /// Succeeds after sleeping
    Slow { delay_ms: u64 },
}

/// A recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub text: String,
    pub target_code: String,
    pub source_code: String,
}

/// Mock backend for testing translation behavior
#[derive(Clone)]
pub struct MockBackend {
    /// Name reported in logs
    name: String,
    /// Behavior mode
    behavior: MockBehavior,
    /// Produces successful translations
    transform: TransformFn,
    /// Column -> language code
    languages: LanguageMap,
    /// Request counter
    request_count: Arc<AtomicUsize>,
    /// Rotation counter
    rotations: Arc<AtomicUsize>,
    /// Every call, in order
    calls: Arc<Mutex<Vec<MockCall>>>,
    /// Calls currently running
    in_flight: Arc<AtomicUsize>,
    /// Highest value `in_flight` reached
    peak_in_flight: Arc<AtomicUsize>,
}

impl fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBackend")
            .field("name", &self.name)
            .field("behavior", &self.behavior)
            .field("request_count", &self.call_count())
            .finish()
    }
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            name: "mock".to_string(),
            behavior,
            transform: Arc::new(|text, target| format!("[{}] {}", target, text)),
            languages: LanguageMap::passthrough(),
            request_count: Arc::new(AtomicUsize::new(0)),
            rotations: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that fails `count` times before succeeding
    pub fn fail_first(count: usize, error: BackendError) -> Self {
        Self::new(MockBehavior::FailFirst { count, error })
    }

    /// Create a failing mock backend that always errors
    pub fn failing(error: BackendError) -> Self {
        Self::new(MockBehavior::Failing(error))
    }

    /// Create a mock that finds nothing
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that sleeps before every successful answer
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set the translation function
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        self.transform = Arc::new(transform);
        self
    }

    /// Set the language map
    pub fn with_language_map(mut self, languages: LanguageMap) -> Self {
        self.languages = languages;
        self
    }

    /// Set the name reported in logs
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of translate calls so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of rotations requested so far
    pub fn rotation_count(&self) -> usize {
        self.rotations.load(Ordering::SeqCst)
    }

    /// Every call so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Most calls that were running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn language_map(&self) -> &LanguageMap {
        &self.languages
    }

    async fn translate(
        &self,
        text: &str,
        target_code: &str,
        source_code: &str,
    ) -> Result<String, BackendError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(MockCall {
            text: text.to_string(),
            target_code: target_code.to_string(),
            source_code: source_code.to_string(),
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        let result = match &self.behavior {
            MockBehavior::Working => Ok((self.transform)(text, target_code)),
            MockBehavior::FailFirst { count: failures, error } => {
                if count < *failures {
                    Err(error.clone())
                } else {
                    Ok((self.transform)(text, target_code))
                }
            }
            MockBehavior::Failing(error) => Err(error.clone()),
            MockBehavior::Empty => Ok(String::new()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok((self.transform)(text, target_code))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn rotate(&self) -> bool {
        self.rotations.fetch_add(1, Ordering::SeqCst);
        true
    }
}
