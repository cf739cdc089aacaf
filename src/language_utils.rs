use anyhow::{Result, anyhow};
use isolang::Language;
use std::collections::HashMap;

use crate::app_config::BackendType;

/// Language utilities for column-to-backend language code mapping
///
/// Spreadsheet columns carry logical names ("ZH", "TH", "VN") while every
/// backend expects its own spelling of the language ("th", "TH", "th-TH").
/// Each backend owns a `LanguageMap` that resolves the former to the latter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LanguageMap {
    /// Uppercased column name -> backend code
    codes: HashMap<String, String>,
    /// Resolve unknown columns to their lowercased name
    passthrough: bool,
}

impl LanguageMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a map that resolves every column to its lowercased name
    pub fn passthrough() -> Self {
        Self {
            codes: HashMap::new(),
            passthrough: true,
        }
    }

    /// Builder-style insert
    pub fn with(mut self, column: &str, code: &str) -> Self {
        self.insert(column, code);
        self
    }

    /// Map a column to a backend code, replacing any previous mapping
    pub fn insert(&mut self, column: &str, code: &str) {
        self.codes.insert(normalize_column(column), code.trim().to_string());
    }

    /// Apply user overrides on top of the defaults
    pub fn extend(&mut self, overrides: &HashMap<String, String>) {
        for (column, code) in overrides {
            self.insert(column, code);
        }
    }

    /// Resolve a column name to the backend's language code
    pub fn resolve(&self, column: &str) -> Option<String> {
        let key = normalize_column(column);
        match self.codes.get(&key) {
            Some(code) => Some(code.clone()),
            None if self.passthrough && !key.is_empty() => Some(key.to_lowercase()),
            None => None,
        }
    }

    /// Default codes for a backend variant
    pub fn for_backend(backend: &BackendType) -> Self {
        let pairs: &[(&str, &str)] = match backend {
            BackendType::FreeWeb => &[
                ("ZH", "zh-CN"),
                ("TW", "zh-TW"),
                ("TH", "th"),
                ("VN", "vi"),
                ("EN", "en"),
                ("JA", "ja"),
                ("KO", "ko"),
                ("ID", "id"),
            ],
            // DeepL-style APIs want uppercase codes
            BackendType::CloudApi => &[
                ("ZH", "ZH"),
                ("TW", "ZH-HANT"),
                ("TH", "TH"),
                ("VN", "VI"),
                ("EN", "EN"),
                ("JA", "JA"),
                ("KO", "KO"),
                ("ID", "ID"),
            ],
            BackendType::ChatApi => &[
                ("ZH", "zh"),
                ("TW", "zh-TW"),
                ("TH", "th"),
                ("VN", "vi"),
                ("EN", "en"),
                ("JA", "ja"),
                ("KO", "ko"),
                ("ID", "id"),
            ],
            BackendType::DictionaryApi => &[
                ("ZH", "zh-CN"),
                ("TW", "zh-TW"),
                ("TH", "th-TH"),
                ("VN", "vi-VN"),
                ("EN", "en-US"),
                ("JA", "ja-JP"),
                ("KO", "ko-KR"),
                ("ID", "id-ID"),
            ],
        };

        pairs
            .iter()
            .fold(Self::new(), |map, (column, code)| map.with(column, code))
    }
}

fn normalize_column(column: &str) -> String {
    column.trim().to_uppercase()
}

/// Get the English language name for a backend code such as "th", "vi-VN" or "ZH"
pub fn get_language_name(code: &str) -> Result<String> {
    let primary = code
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let language = match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => Language::from_639_3(&primary),
        _ => None,
    };

    language
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}
