use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::BackendError;
use crate::language_utils::{get_language_name, LanguageMap};
use crate::providers::{build_client, classify_transport, endpoint_url, error_from_response, Backend};

/// Client for an OpenAI-compatible chat completion API
#[derive(Debug)]
pub struct Chat {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL
    endpoint: String,
    /// Model name
    model: String,
    /// Prompt template with {source_language} and {target_language}
    system_prompt: String,
    /// Sampling temperature
    temperature: f32,
    /// Column -> language code
    languages: LanguageMap,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<ChatMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Whether to stream the answer
    stream: bool,
}

/// Chat message format
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Generated alternatives
    pub choices: Vec<ChatChoice>,
}

/// Individual choice in a chat response
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The generated message
    pub message: ChatMessage,
}

impl ChatRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            stream: false,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Chat {
    /// Create a new client with the default prompt and a low temperature
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        languages: LanguageMap,
    ) -> Self {
        Self {
            client: build_client(timeout),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            system_prompt: "Translate the following text from {source_language} into {target_language}. Preserve all markup exactly. Return only the translation.".to_string(),
            temperature: 0.3,
            languages,
        }
    }

    /// Replace the system prompt template
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        if !system_prompt.trim().is_empty() {
            self.system_prompt = system_prompt;
        }
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    /// Fill the prompt template with language names
    pub fn build_system_prompt(&self, source_code: &str, target_code: &str) -> String {
        let source = get_language_name(source_code).unwrap_or_else(|_| source_code.to_string());
        let target = get_language_name(target_code).unwrap_or_else(|_| target_code.to_string());
        self.system_prompt
            .replace("{source_language}", &source)
            .replace("{target_language}", &target)
    }

    /// Send a chat completion request
    pub async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, BackendError> {
        if self.api_key.is_empty() {
            return Err(BackendError::InvalidCredentials(
                "No API key configured for the chat backend".to_string(),
            ));
        }

        let url = endpoint_url(&self.endpoint, "chat/completions")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| BackendError::Unknown(format!("Failed to parse chat API response: {}", e)))
    }
}

#[async_trait]
impl Backend for Chat {
    fn name(&self) -> &str {
        "chat-api"
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
        let request = ChatRequest::new(&self.model)
            .add_message("system", self.build_system_prompt(source_code, target_code))
            .add_message("user", text)
            .temperature(self.temperature);

        let response = self.complete(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| BackendError::Unknown("Chat API returned no choices".to_string()))
    }
}
