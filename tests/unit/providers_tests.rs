/*!
 * Tests for backend helpers and the backend factory
 */

use std::time::Duration;

use loctrans::app_config::{BackendType, TranslationConfig};
use loctrans::errors::BackendError;
use loctrans::language_utils::LanguageMap;
use loctrans::providers::free_web::FreeWeb;
use loctrans::providers::mock::MockBackend;
use loctrans::providers::{classify_status, create_backend, endpoint_url, Backend};
use reqwest::StatusCode;

#[test]
fn test_classify_status_shouldMapStatusCodesToKinds() {
    let cases = [
        (429, "rate-limited"),
        (401, "invalid-credentials"),
        (403, "invalid-credentials"),
        (408, "timeout"),
        (504, "timeout"),
        (500, "service-unavailable"),
        (503, "service-unavailable"),
        (400, "unknown"),
        (404, "unknown"),
    ];

    for (code, kind) in cases {
        let status = StatusCode::from_u16(code).unwrap();
        assert_eq!(classify_status(status, "body").kind(), kind, "status {}", code);
    }
}

#[test]
fn test_classify_status_shouldKeepTruncatedBodyInMessage() {
    let body = "x".repeat(500);
    let error = classify_status(StatusCode::TOO_MANY_REQUESTS, &body);
    let message = error.to_string();
    assert!(message.contains("HTTP 429"));
    assert!(message.ends_with("..."));
    assert!(message.len() < 300);
}

#[test]
fn test_endpoint_url_shouldJoinWithOrWithoutSlashes() {
    let expected = "https://api.example.com/v2/translate";
    assert_eq!(endpoint_url("https://api.example.com", "v2/translate").unwrap().as_str(), expected);
    assert_eq!(endpoint_url("https://api.example.com/", "/v2/translate").unwrap().as_str(), expected);

    let nested = endpoint_url("https://gateway.example.com/openai/v1", "chat/completions").unwrap();
    assert_eq!(nested.as_str(), "https://gateway.example.com/openai/v1/chat/completions");
}

#[test]
fn test_endpoint_url_withGarbage_shouldFail() {
    assert!(matches!(endpoint_url("not a url", "get"), Err(BackendError::Unknown(_))));
}

#[test]
fn test_create_backend_shouldBuildEveryVariant() {
    let config = TranslationConfig::default();
    let cases = [
        (BackendType::FreeWeb, "free-web"),
        (BackendType::CloudApi, "cloud-api"),
        (BackendType::ChatApi, "chat-api"),
        (BackendType::DictionaryApi, "dictionary-api"),
    ];

    for (backend_type, name) in cases {
        let backend = create_backend(&config, backend_type);
        assert_eq!(backend.name(), name);
        assert!(backend.language_map().resolve("TH").is_some());
    }
}

#[test]
fn test_create_backend_shouldApplyLanguageOverrides() {
    let mut config = TranslationConfig::default();
    config
        .backend_config_mut(&BackendType::DictionaryApi)
        .language_codes
        .insert("VN".to_string(), "vi".to_string());

    let backend = create_backend(&config, BackendType::DictionaryApi);
    assert_eq!(backend.language_map().resolve("VN"), Some("vi".to_string()));
}

#[test]
fn test_free_web_rotation_shouldCycleThroughConfiguredHosts() {
    let config = TranslationConfig::default();
    let hosts = config.get_endpoints(&BackendType::FreeWeb);
    let backend = FreeWeb::new(hosts.clone(), Duration::from_secs(1), LanguageMap::new());

    let mut seen = vec![backend.current_endpoint().to_string()];
    for _ in 1..hosts.len() {
        assert!(backend.rotate());
        seen.push(backend.current_endpoint().to_string());
    }
    seen.sort();
    let mut expected = hosts;
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_mock_backend_shouldRecordCallsAndRotations() {
    let backend = MockBackend::working().with_name("stub");
    let clone = backend.clone();

    assert_eq!(clone.translate("你好", "th", "zh").await.unwrap(), "[th] 你好");
    assert!(clone.rotate());

    assert_eq!(backend.name(), "stub");
    assert_eq!(backend.call_count(), 1);
    assert_eq!(backend.rotation_count(), 1);
    assert_eq!(backend.calls()[0].source_code, "zh");
}
