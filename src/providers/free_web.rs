use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::BackendError;
use crate::language_utils::LanguageMap;
use crate::providers::{build_client, classify_transport, endpoint_url, error_from_response, Backend};

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com";

/// Client for the free web translate endpoint
///
/// No credentials are needed, but the service throttles bursts. Several
/// equivalent hosts can be configured and the client moves to the next one
/// whenever the orchestrator asks it to rotate.
#[derive(Debug)]
pub struct FreeWeb {
    /// HTTP client for API requests
    client: Client,
    /// Equivalent hosts
    endpoints: Vec<String>,
    /// Index of the host in use, always below `endpoints.len()`
    current: AtomicUsize,
    /// Column -> language code
    languages: LanguageMap,
}

/// Response shape: `[[["translated","original",...], ...], ...]`
fn extract_translation(body: &Value) -> Result<String, BackendError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::Unknown("Unexpected free web response shape".to_string()))?;

    Ok(sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect())
}

impl FreeWeb {
    /// Create a new client, starting on a random host
    pub fn new(endpoints: Vec<String>, timeout: Duration, languages: LanguageMap) -> Self {
        let mut endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            endpoints.push(DEFAULT_ENDPOINT.to_string());
        }

        let start = rand::rng().random_range(0..endpoints.len());

        Self {
            client: build_client(timeout),
            endpoints,
            current: AtomicUsize::new(start),
            languages,
        }
    }

    /// Host currently in use
    pub fn current_endpoint(&self) -> &str {
        let index = self.current.load(Ordering::SeqCst) % self.endpoints.len();
        &self.endpoints[index]
    }

    /// Configured hosts
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

#[async_trait]
impl Backend for FreeWeb {
    fn name(&self) -> &str {
        "free-web"
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
        let endpoint = self.current_endpoint();
        let url = endpoint_url(endpoint, "translate_a/single")?;
        debug!("free-web request to {} ({} -> {})", endpoint, source_code, target_code);

        let response = self
            .client
            .get(url)
            .query(&[
                ("client", "gtx"),
                ("sl", source_code),
                ("tl", target_code),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::Unknown(format!("Failed to parse free web response: {}", e)))?;

        extract_translation(&body)
    }

    fn rotate(&self) -> bool {
        let count = self.endpoints.len();
        if count < 2 {
            return false;
        }

        let _ = self
            .current
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % count));
        warn!("free-web rotated to {}", self.current_endpoint());
        true
    }
}
