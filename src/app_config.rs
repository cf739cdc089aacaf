use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::default::Default;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::language_utils::LanguageMap;
use crate::translation::concurrency::BackendProfile;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Column holding the text to translate
    #[serde(default = "default_source_column")]
    pub source_column: String,

    /// Columns to fill with translations
    #[serde(default = "default_target_columns")]
    pub target_columns: Vec<String>,

    /// Leave cells that already hold a translation alone
    #[serde(default = "default_true")]
    pub skip_existing: bool,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation backend type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    // @backend: Free web translate, rotating hosts
    #[default]
    FreeWeb,
    // @backend: Credentialed cloud API (DeepL style)
    CloudApi,
    // @backend: Chat completion API (OpenAI compatible)
    ChatApi,
    // @backend: Bilingual dictionary API (MyMemory style)
    DictionaryApi,
}

impl BackendType {
    // @returns: Human readable backend name
    pub fn display_name(&self) -> &str {
        match self {
            Self::FreeWeb => "Free web translate",
            Self::CloudApi => "Cloud API",
            Self::ChatApi => "Chat API",
            Self::DictionaryApi => "Dictionary API",
        }
    }

    // @returns: Kebab-case backend identifier
    pub fn to_identifier(&self) -> &'static str {
        match self {
            Self::FreeWeb => "free-web",
            Self::CloudApi => "cloud-api",
            Self::ChatApi => "chat-api",
            Self::DictionaryApi => "dictionary-api",
        }
    }

    /// Whether this backend refuses to work without an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::CloudApi | Self::ChatApi)
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_identifier())
    }
}

impl std::str::FromStr for BackendType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "free-web" | "freeweb" | "google" => Ok(Self::FreeWeb),
            "cloud-api" | "cloudapi" | "deepl" => Ok(Self::CloudApi),
            "chat-api" | "chatapi" | "deepseek" | "openai" => Ok(Self::ChatApi),
            "dictionary-api" | "dictionaryapi" | "mymemory" => Ok(Self::DictionaryApi),
            _ => Err(anyhow!("Invalid backend type: {}", s)),
        }
    }
}

/// Backend configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    // @field: Backend type identifier
    #[serde(rename = "type")]
    pub backend_type: String,

    // @field: API key or account credential
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL override
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Equivalent hosts rotated on rate limits
    #[serde(default)]
    pub alternate_endpoints: Vec<String>,

    // @field: Model name, chat backends only
    #[serde(default = "String::new")]
    pub model: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Column -> backend language code overrides
    #[serde(default)]
    pub language_codes: HashMap<String, String>,
}

impl BackendConfig {
    // @param backend_type: Backend enum
    // @returns: Backend config with defaults
    pub fn new(backend_type: BackendType) -> Self {
        let (endpoint, alternate_endpoints, model) = match backend_type {
            BackendType::FreeWeb => (
                default_free_web_endpoint(),
                default_free_web_alternates(),
                String::new(),
            ),
            BackendType::CloudApi => (default_cloud_endpoint(), Vec::new(), String::new()),
            BackendType::ChatApi => (default_chat_endpoint(), Vec::new(), default_chat_model()),
            BackendType::DictionaryApi => (default_dictionary_endpoint(), Vec::new(), String::new()),
        };

        Self {
            backend_type: backend_type.to_identifier().to_string(),
            api_key: String::new(),
            endpoint,
            alternate_endpoints,
            model,
            timeout_secs: default_timeout_secs(),
            language_codes: HashMap::new(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Primary backend
    #[serde(default, alias = "backend_type")]
    pub backend: BackendType,

    /// Backend tried once after the primary is exhausted
    #[serde(default)]
    pub fallback: Option<BackendType>,

    /// Available backends
    #[serde(default)]
    pub available_backends: Vec<BackendConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all backends
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for chat backends
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Courtesy delay in milliseconds after every backend call
    /// (None uses the backend profile)
    #[serde(default)]
    pub inter_call_delay_ms: Option<u64>,

    /// Attempts on the primary backend before falling back
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for rate-limit and connection failures, multiplied by the attempt index
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Delay before retrying other failures
    #[serde(default = "default_short_retry_delay_ms")]
    pub short_retry_delay_ms: u64,

    /// Parallel workers (None uses the backend profile)
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Flush the record set to the output every N finished cells
    #[serde(default = "default_batch_checkpoint_size")]
    pub batch_checkpoint_size: usize,

    /// Temperature for chat backends (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            inter_call_delay_ms: None,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            short_retry_delay_ms: default_short_retry_delay_ms(),
            concurrency: None,
            batch_checkpoint_size: default_batch_checkpoint_size(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_source_column() -> String {
    "ZH".to_string()
}

fn default_target_columns() -> Vec<String> {
    vec!["TH".to_string(), "VN".to_string()]
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_short_retry_delay_ms() -> u64 {
    500
}

fn default_batch_checkpoint_size() -> usize {
    10
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_free_web_endpoint() -> String {
    "https://translate.googleapis.com".to_string()
}

fn default_free_web_alternates() -> Vec<String> {
    vec![
        "https://translate.google.com".to_string(),
        "https://translate.google.cn".to_string(),
    ]
}

fn default_cloud_endpoint() -> String {
    "https://api-free.deepl.com".to_string()
}

fn default_chat_endpoint() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_dictionary_endpoint() -> String {
    "https://api.mymemory.translated.net".to_string()
}

fn default_chat_model() -> String {
    "deepseek-chat".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional game localization translator. Translate the following text from {source_language} into {target_language}. Preserve all markup such as <color=#xxx>...</color> exactly as it appears. Return only the translation, without explanations.".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_column.trim().is_empty() {
            return Err(ConfigError::Invalid("source column is empty".to_string()));
        }

        if self.target_columns.is_empty() {
            return Err(ConfigError::Invalid("no target columns configured".to_string()));
        }

        if let Some(column) = self
            .target_columns
            .iter()
            .find(|c| c.trim() == self.source_column.trim())
        {
            return Err(ConfigError::Invalid(format!(
                "column '{}' is both source and target",
                column
            )));
        }

        let common = &self.translation.common;
        if common.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".to_string()));
        }
        if common.batch_checkpoint_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_checkpoint_size must be at least 1".to_string(),
            ));
        }
        if common.concurrency == Some(0) {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }

        for backend in self.translation.active_backends() {
            if backend.requires_api_key() && self.translation.get_api_key(&backend).is_empty() {
                return Err(ConfigError::MissingCredentials(backend.to_string()));
            }

            for endpoint in self.translation.get_endpoints(&backend) {
                url::Url::parse(&endpoint).map_err(|e| {
                    ConfigError::Invalid(format!("invalid endpoint '{}' for {}: {}", endpoint, backend, e))
                })?;
            }

            let languages = self.translation.language_map(&backend);
            let columns = std::iter::once(&self.source_column).chain(self.target_columns.iter());
            for column in columns {
                if languages.resolve(column).is_none() {
                    return Err(ConfigError::UnsupportedLanguage {
                        column: column.clone(),
                        backend: backend.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_column: default_source_column(),
            target_columns: default_target_columns(),
            skip_existing: true,
            translation: TranslationConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Primary backend followed by the fallback, if any
    pub fn active_backends(&self) -> Vec<BackendType> {
        let mut backends = vec![self.backend];
        if let Some(fallback) = self.fallback {
            if fallback != self.backend {
                backends.push(fallback);
            }
        }
        backends
    }

    /// Get a specific backend configuration by type
    pub fn get_backend_config(&self, backend: &BackendType) -> Option<&BackendConfig> {
        let identifier = backend.to_identifier();
        self.available_backends
            .iter()
            .find(|b| b.backend_type == identifier)
    }

    /// Get a mutable backend configuration, creating a default entry if needed
    pub fn backend_config_mut(&mut self, backend: &BackendType) -> &mut BackendConfig {
        let identifier = backend.to_identifier();
        let index = match self
            .available_backends
            .iter()
            .position(|b| b.backend_type == identifier)
        {
            Some(index) => index,
            None => {
                self.available_backends.push(BackendConfig::new(*backend));
                self.available_backends.len() - 1
            }
        };
        &mut self.available_backends[index]
    }

    /// Get the API key for a backend
    pub fn get_api_key(&self, backend: &BackendType) -> String {
        self.get_backend_config(backend)
            .map(|b| b.api_key.trim().to_string())
            .unwrap_or_default()
    }

    /// Get the model for a backend
    pub fn get_model(&self, backend: &BackendType) -> String {
        if let Some(config) = self.get_backend_config(backend) {
            if !config.model.is_empty() {
                return config.model.clone();
            }
        }

        BackendConfig::new(*backend).model
    }

    /// Get the primary endpoint for a backend
    pub fn get_endpoint(&self, backend: &BackendType) -> String {
        if let Some(config) = self.get_backend_config(backend) {
            if !config.endpoint.is_empty() {
                return config.endpoint.clone();
            }
        }

        BackendConfig::new(*backend).endpoint
    }

    /// Primary endpoint followed by the alternates
    pub fn get_endpoints(&self, backend: &BackendType) -> Vec<String> {
        let alternates = match self.get_backend_config(backend) {
            Some(config) => config.alternate_endpoints.clone(),
            None => BackendConfig::new(*backend).alternate_endpoints,
        };

        let mut endpoints = vec![self.get_endpoint(backend)];
        for alternate in alternates {
            if !alternate.is_empty() && !endpoints.contains(&alternate) {
                endpoints.push(alternate);
            }
        }
        endpoints
    }

    /// Get the request timeout for a backend
    pub fn get_timeout(&self, backend: &BackendType) -> Duration {
        let secs = self
            .get_backend_config(backend)
            .map(|b| b.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or_else(default_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Default language codes for the backend with the user's overrides applied
    pub fn language_map(&self, backend: &BackendType) -> LanguageMap {
        let mut map = LanguageMap::for_backend(backend);
        if let Some(config) = self.get_backend_config(backend) {
            map.extend(&config.language_codes);
        }
        map
    }

    /// Worker count, from the config or the primary backend's profile
    pub fn effective_concurrency(&self) -> usize {
        BackendProfile::for_backend(self.backend).effective_concurrency(self.common.concurrency)
    }

    /// Courtesy delay after each call, from the config or the primary backend's profile
    pub fn effective_inter_call_delay(&self) -> Duration {
        BackendProfile::for_backend(self.backend)
            .effective_inter_call_delay(self.common.inter_call_delay_ms)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::default(),
            fallback: None,
            available_backends: vec![
                BackendConfig::new(BackendType::FreeWeb),
                BackendConfig::new(BackendType::CloudApi),
                BackendConfig::new(BackendType::ChatApi),
                BackendConfig::new(BackendType::DictionaryApi),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
