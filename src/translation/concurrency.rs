/*!
 * Backend-specific concurrency tuning.
 *
 * Free services throttle aggressively while credentialed APIs tolerate
 * more parallel requests, so each backend gets its own defaults for the
 * worker count and the courtesy delay between calls.
 */

use std::time::Duration;

use crate::app_config::BackendType;

/// Backend-specific concurrency profile with tuned defaults
#[derive(Debug, Clone, PartialEq)]
pub struct BackendProfile {
    /// Parallel workers pulling cells from the queue
    pub max_concurrent_requests: usize,
    /// Pause after every call, in milliseconds
    pub inter_call_delay_ms: u64,
}

impl BackendProfile {
    /// Get the profile for a given backend
    pub fn for_backend(backend: BackendType) -> Self {
        match backend {
            BackendType::FreeWeb => Self {
                // Unauthenticated endpoint, blocks bursts quickly
                max_concurrent_requests: 5,
                inter_call_delay_ms: 100,
            },
            BackendType::CloudApi => Self {
                max_concurrent_requests: 8,
                inter_call_delay_ms: 50,
            },
            BackendType::ChatApi => Self {
                max_concurrent_requests: 5,
                inter_call_delay_ms: 200,
            },
            BackendType::DictionaryApi => Self {
                // Anonymous daily quota
                max_concurrent_requests: 2,
                inter_call_delay_ms: 500,
            },
        }
    }

    /// Get effective worker count, respecting any user override
    pub fn effective_concurrency(&self, user_override: Option<usize>) -> usize {
        user_override
            .filter(|n| *n > 0)
            .unwrap_or(self.max_concurrent_requests)
    }

    /// Get effective courtesy delay, respecting any user override
    pub fn effective_inter_call_delay(&self, user_override_ms: Option<u64>) -> Duration {
        Duration::from_millis(user_override_ms.unwrap_or(self.inter_call_delay_ms))
    }
}
