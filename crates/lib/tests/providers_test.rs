//! # Provider Wire-Level Tests
//!
//! HTTP-level behavior of the model and embedding clients against a mock
//! server: request shape, safety-blocked responses resolving to an empty
//! string, rate-limit classification, and usage accounting.

use dartwiki::{EmbeddingClient, GeminiProvider, LanguageModel, LmError, OpenAiCompatProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn gemini_request_carries_open_safety_settings_and_token_cap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini:generateContent"))
        .and(body_partial_json(json!({
            "generationConfig": {"maxOutputTokens": 500},
            "safetySettings": [
                {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE"},
            ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"parts": [{"text": "응답"}]}, "finishReason": "STOP"}
            ],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(
        format!("{}/v1beta/models/gemini:generateContent", server.uri()),
        "test-key".to_string(),
        500,
    )
    .unwrap();

    let text = provider.complete("system", "user").await.unwrap();
    assert_eq!(text, "응답");

    let usage = provider.usage();
    assert_eq!(usage.prompt_tokens, 12);
    assert_eq!(usage.completion_tokens, 3);
    assert_eq!(usage.calls, 1);

    provider.reset_usage();
    assert_eq!(provider.usage().calls, 0);
}

#[tokio::test]
async fn gemini_safety_blocked_response_is_an_empty_string_not_an_error() {
    let server = MockServer::start().await;
    // A blocked response has no candidates at all.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let provider =
        GeminiProvider::new(server.uri(), "test-key".to_string(), 500).unwrap();
    let text = provider.complete("system", "user").await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn gemini_empty_parts_is_an_empty_string_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
        })))
        .mount(&server)
        .await;

    let provider =
        GeminiProvider::new(server.uri(), "test-key".to_string(), 500).unwrap();
    let text = provider.complete("system", "user").await.unwrap();
    assert_eq!(text, "");
}

#[tokio::test]
async fn gemini_429_maps_to_the_rate_limit_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&server)
        .await;

    let provider =
        GeminiProvider::new(server.uri(), "test-key".to_string(), 500).unwrap();
    let error = provider.complete("system", "user").await.unwrap_err();
    assert!(error.is_rate_limit());
    assert!(error.is_transient());
}

#[tokio::test]
async fn openai_compat_parses_choices_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "local-model",
            "max_tokens": 700,
            "stream": false,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "섹션 본문"}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 7}
        })))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new(
        format!("{}/v1/chat/completions", server.uri()),
        Some("key".to_string()),
        Some("local-model".to_string()),
        700,
    )
    .unwrap();

    let text = provider.complete("system", "user").await.unwrap();
    assert_eq!(text, "섹션 본문");
    assert_eq!(provider.usage().prompt_tokens, 20);
    assert_eq!(provider.usage().completion_tokens, 7);
}

#[tokio::test]
async fn openai_compat_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let provider = OpenAiCompatProvider::new(server.uri(), None, None, 700).unwrap();
    let error = provider.complete("system", "user").await.unwrap_err();
    assert!(matches!(error, LmError::Api { status: 503, .. }));
    assert!(error.is_transient());
}

#[tokio::test]
async fn embedding_client_sends_openai_batches_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({
            "model": "embed-model",
            "input": ["첫 번째", "두 번째"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"embedding": [1.0, 0.0]},
                {"embedding": [0.0, 1.0]},
            ]
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(
        format!("{}/v1/embeddings", server.uri()),
        "embed-model".to_string(),
        None,
        2,
    )
    .unwrap();

    let vectors = client.embed_batch(&["첫 번째", "두 번째"]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    assert_eq!(client.dimension(), 2);
}

#[tokio::test]
async fn embedding_client_empty_batch_skips_the_network() {
    // No mock server mounted: an empty batch must not make a request.
    let client = EmbeddingClient::new(
        "http://127.0.0.1:1/v1/embeddings".to_string(),
        "embed-model".to_string(),
        None,
        2,
    )
    .unwrap();
    let vectors = client.embed_batch(&[]).await.unwrap();
    assert!(vectors.is_empty());
}
