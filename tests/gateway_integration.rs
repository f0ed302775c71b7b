use serde_json::json;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use repodoc::config::LlmConfig;
use repodoc::gateway::{LlmGateway, TextGenerator};

fn test_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        api_base: format!("{}/chat/completions", server.uri()),
        model: "gemini-2.0-flash".to_string(),
        api_key: "system-key".to_string(),
        request_delay_secs: 0,
        fallback_delay_secs: 0,
        request_timeout_secs: 5,
        validate_timeout_secs: 5,
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content }
        }]
    })
}

#[tokio::test]
async fn test_generate_returns_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer system-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hello there")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    let result = gateway.generate("hi", None).await;
    assert_eq!(result, Some("hello there".to_string()));
}

#[tokio::test]
async fn test_generate_empty_content_is_absent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("   ")))
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    assert_eq!(gateway.generate("hi", None).await, None);
}

#[tokio::test]
async fn test_generate_error_status_is_absent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    assert_eq!(gateway.generate("hi", None).await, None);
}

#[tokio::test]
async fn test_generate_malformed_payload_is_absent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    assert_eq!(gateway.generate("hi", None).await, None);
}

#[tokio::test]
async fn test_failed_user_key_falls_back_to_system_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer user-key"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer system-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    let result = gateway.generate("hi", Some("user-key")).await;
    assert_eq!(result, Some("recovered".to_string()));
}

#[tokio::test]
async fn test_system_key_failure_has_no_second_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    assert_eq!(gateway.generate("hi", None).await, None);
}

#[tokio::test]
async fn test_validate_accepts_working_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer candidate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    assert!(gateway.validate("candidate").await);
}

#[tokio::test]
async fn test_validate_rejects_bad_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    assert!(!gateway.validate("bad-key").await);
}

#[tokio::test]
async fn test_validate_rejects_blank_key_without_remote_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    assert!(!gateway.validate("   ").await);
}

#[tokio::test]
async fn test_chat_sends_conversation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(wiremock::matchers::body_string_contains("first question"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("the answer")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = LlmGateway::new(&test_config(&server)).unwrap();
    let messages = [
        repodoc::gateway::ChatMessage::user("context"),
        repodoc::gateway::ChatMessage::user("first question"),
    ];
    let result = gateway.chat(&messages, None).await;
    assert_eq!(result, Some("the answer".to_string()));
}
