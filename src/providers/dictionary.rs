use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::errors::BackendError;
use crate::language_utils::LanguageMap;
use crate::providers::{build_client, classify_transport, endpoint_url, error_from_response, Backend};

const QUOTA_WARNING: &str = "MYMEMORY WARNING";

/// Client for a MyMemory-style bilingual dictionary API
///
/// When the service has no translation it answers with a non-200
/// `responseStatus`; that is reported as an empty translation rather than
/// an error.
#[derive(Debug)]
pub struct Dictionary {
    /// HTTP client for API requests
    client: Client,
    /// Optional key raising the anonymous quota
    api_key: String,
    /// API base URL
    endpoint: String,
    /// Column -> language code
    languages: LanguageMap,
}

/// Lookup response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryResponse {
    /// Best match
    #[serde(default)]
    pub response_data: Option<DictionaryData>,

    /// Numeric or string status, 200 on success
    #[serde(default)]
    pub response_status: Value,

    /// Human readable status
    #[serde(default)]
    pub response_details: Option<String>,

    /// Set once the daily quota is used up
    #[serde(default)]
    pub quota_finished: Option<bool>,
}

/// Best match payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryData {
    /// Translated text
    #[serde(default)]
    pub translated_text: String,
}

impl DictionaryResponse {
    /// Status code, whether the service sent it as a number or a string
    pub fn status(&self) -> Option<u16> {
        match &self.response_status {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Turn the response into a translation, an empty string, or an error
    pub fn into_translation(self) -> Result<String, BackendError> {
        let status = self.status();
        let text = self
            .response_data
            .map(|data| data.translated_text)
            .unwrap_or_default();

        if self.quota_finished == Some(true)
            || status == Some(429)
            || text.starts_with(QUOTA_WARNING)
        {
            return Err(BackendError::RateLimited(
                self.response_details
                    .unwrap_or_else(|| "Dictionary quota exhausted".to_string()),
            ));
        }

        if status != Some(200) {
            debug!(
                "dictionary-api found nothing (status {:?}: {})",
                status,
                self.response_details.unwrap_or_default()
            );
            return Ok(String::new());
        }

        Ok(text.trim().to_string())
    }
}

impl Dictionary {
    /// Create a new client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
        languages: LanguageMap,
    ) -> Self {
        Self {
            client: build_client(timeout),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            languages,
        }
    }
}

#[async_trait]
impl Backend for Dictionary {
    fn name(&self) -> &str {
        "dictionary-api"
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
        let url = endpoint_url(&self.endpoint, "get")?;
        let langpair = format!("{}|{}", source_code, target_code);

        let mut query = vec![("q", text), ("langpair", langpair.as_str())];
        if !self.api_key.is_empty() {
            query.push(("key", self.api_key.as_str()));
        }

        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json::<DictionaryResponse>()
            .await
            .map_err(|e| BackendError::Unknown(format!("Failed to parse dictionary response: {}", e)))?
            .into_translation()
    }
}
