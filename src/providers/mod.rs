/*!
 * Backend implementations for different translation services.
 *
 * This module contains client implementations for the supported services:
 * - FreeWeb: unauthenticated web translate endpoint with rotating hosts
 * - Cloud: credentialed DeepL-style REST API
 * - Chat: OpenAI-compatible chat completion API
 * - Dictionary: MyMemory-style bilingual dictionary API
 * - Mock: scriptable backend for tests
 */

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::app_config::{BackendType, TranslationConfig};
use crate::errors::BackendError;
use crate::language_utils::LanguageMap;

/// Common trait for all translation backends
///
/// Backends translate one piece of plain text at a time. Language codes are
/// already resolved through the backend's own `LanguageMap`.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Column name to backend language code mapping
    fn language_map(&self) -> &LanguageMap;

    /// Translate `text` from `source_code` into `target_code`
    ///
    /// # Returns
    /// * `Result<String, BackendError>` - The translation, possibly empty when
    ///   the service found nothing
    async fn translate(
        &self,
        text: &str,
        target_code: &str,
        source_code: &str,
    ) -> Result<String, BackendError>;

    /// Switch to the next equivalent endpoint, if the backend has several
    ///
    /// # Returns
    /// * `bool` - Whether the endpoint changed
    fn rotate(&self) -> bool {
        false
    }
}

/// Build the backend for a variant from the configuration
pub fn create_backend(config: &TranslationConfig, backend: BackendType) -> Arc<dyn Backend> {
    let languages = config.language_map(&backend);
    let timeout = config.get_timeout(&backend);

    match backend {
        BackendType::FreeWeb => Arc::new(free_web::FreeWeb::new(
            config.get_endpoints(&backend),
            timeout,
            languages,
        )),
        BackendType::CloudApi => Arc::new(cloud::Cloud::new(
            config.get_api_key(&backend),
            config.get_endpoint(&backend),
            timeout,
            languages,
        )),
        BackendType::ChatApi => Arc::new(
            chat::Chat::new(
                config.get_api_key(&backend),
                config.get_endpoint(&backend),
                config.get_model(&backend),
                timeout,
                languages,
            )
            .with_system_prompt(config.common.system_prompt.clone())
            .with_temperature(config.common.temperature),
        ),
        BackendType::DictionaryApi => Arc::new(dictionary::Dictionary::new(
            config.get_api_key(&backend),
            config.get_endpoint(&backend),
            timeout,
            languages,
        )),
    }
}

/// Map an HTTP error status onto a backend error kind
pub fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate_body(body));

    match status.as_u16() {
        429 => BackendError::RateLimited(message),
        401 | 403 => BackendError::InvalidCredentials(message),
        408 | 504 => BackendError::Timeout(message),
        500..=599 => BackendError::ServiceUnavailable(message),
        _ => BackendError::Unknown(message),
    }
}

/// Map a transport failure onto a backend error kind
pub fn classify_transport(error: &reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout(error.to_string())
    } else if error.is_connect() {
        BackendError::ServiceUnavailable(error.to_string())
    } else if let Some(status) = error.status() {
        classify_status(status, &error.to_string())
    } else {
        BackendError::Unknown(error.to_string())
    }
}

/// Join an API path onto a configured base URL
pub fn endpoint_url(base: &str, path: &str) -> Result<Url, BackendError> {
    let base = format!("{}/", base.trim().trim_end_matches('/'));
    Url::parse(&base)
        .and_then(|url| url.join(path.trim_start_matches('/')))
        .map_err(|e| BackendError::Unknown(format!("Invalid endpoint '{}': {}", base, e)))
}

/// HTTP client with the backend's timeout
pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Read an error body and classify the status
pub(crate) async fn error_from_response(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    debug!("Backend answered {}: {}", status, truncate_body(&body));
    classify_status(status, &body)
}

fn truncate_body(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    if body.chars().count() <= MAX_CHARS {
        body.to_string()
    } else {
        let truncated: String = body.chars().take(MAX_CHARS).collect();
        format!("{}...", truncated)
    }
}

pub mod chat;
pub mod cloud;
pub mod dictionary;
pub mod free_web;
pub mod mock;
