use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::BackendError;
use crate::language_utils::LanguageMap;
use crate::providers::{build_client, classify_transport, endpoint_url, error_from_response, Backend};

/// DeepL answers 456 once the character quota is used up
const QUOTA_EXCEEDED: u16 = 456;

/// Client for a credentialed DeepL-style translation API
#[derive(Debug)]
pub struct Cloud {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL
    endpoint: String,
    /// Column -> language code
    languages: LanguageMap,
}

/// Translate request
#[derive(Debug, Serialize)]
pub struct CloudRequest {
    /// Texts to translate
    text: Vec<String>,

    /// Target language code
    target_lang: String,

    /// Source language code
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<String>,

    /// Keep line breaks and spacing as sent
    #[serde(skip_serializing_if = "Option::is_none")]
    preserve_formatting: Option<bool>,
}

/// Translate response
#[derive(Debug, Deserialize)]
pub struct CloudResponse {
    /// One entry per requested text
    pub translations: Vec<CloudTranslation>,
}

/// Individual translation in a response
#[derive(Debug, Deserialize)]
pub struct CloudTranslation {
    /// Language the service detected
    #[serde(default)]
    pub detected_source_language: Option<String>,

    /// Translated text
    pub text: String,
}

impl CloudRequest {
    /// Create a request for a single text
    pub fn new(text: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            text: vec![text.into()],
            target_lang: target_lang.into(),
            source_lang: None,
            preserve_formatting: Some(true),
        }
    }

    /// Set the source language
    pub fn source_lang(mut self, source_lang: impl Into<String>) -> Self {
        let source_lang = source_lang.into();
        if !source_lang.is_empty() {
            self.source_lang = Some(source_lang);
        }
        self
    }
}

impl Cloud {
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

    /// Send a translate request
    pub async fn complete(&self, request: CloudRequest) -> Result<CloudResponse, BackendError> {
        if self.api_key.is_empty() {
            return Err(BackendError::InvalidCredentials(
                "No API key configured for the cloud backend".to_string(),
            ));
        }

        let url = endpoint_url(&self.endpoint, "v2/translate")?;
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if status.as_u16() == QUOTA_EXCEEDED {
            return Err(BackendError::RateLimited("Cloud API quota exceeded".to_string()));
        }
        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json::<CloudResponse>()
            .await
            .map_err(|e| BackendError::Unknown(format!("Failed to parse cloud API response: {}", e)))
    }
}

#[async_trait]
impl Backend for Cloud {
    fn name(&self) -> &str {
        "cloud-api"
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
        let request = CloudRequest::new(text, target_code).source_lang(source_code);
        let response = self.complete(request).await?;

        let translation = response
            .translations
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Unknown("Cloud API returned no translations".to_string()))?;

        if let Some(detected) = &translation.detected_source_language {
            debug!("cloud-api detected source language {}", detected);
        }

        Ok(translation.text)
    }
}
