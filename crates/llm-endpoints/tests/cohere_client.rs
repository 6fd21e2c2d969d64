//! Mock API tests for the Cohere client
//!
//! These tests use wiremock to stand in for Cohere's v2 endpoints. Payloads
//! follow the shapes documented at https://docs.cohere.com/reference/chat

use futures::StreamExt;
use llm_endpoints::providers::{CohereConfig, CohereProvider};
use llm_endpoints::{
    CancellationToken, ChatClient, ChatMessage, ChatRequest, ChatUsage, ClientConfig,
    EmbeddingRequest, FinishReason, LLMError, StaticCredential, StreamContext, StreamKind,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, api_key: Option<&str>) -> ChatClient {
    let config = CohereConfig::new().with_api_base(format!("{}/v2", server.uri()));
    let credentials = Arc::new(match api_key {
        Some(key) => StaticCredential::new(key),
        None => StaticCredential::anonymous(),
    });
    let provider = CohereProvider::with_credentials(config, credentials).unwrap();
    ChatClient::new(Arc::new(provider), ClientConfig::default().with_timeout(10)).unwrap()
}

fn hello_request() -> ChatRequest {
    ChatRequest::builder("command-r")
        .add_message(ChatMessage::user("Say hello"))
        .build()
}

fn ndjson(records: &[serde_json::Value]) -> String {
    records
        .iter()
        .map(|r| format!("{r}\n"))
        .collect::<String>()
}

#[tokio::test]
async fn test_chat_non_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .and(header("Authorization", "Bearer test-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({"model": "command-r", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "c14c80c3-18eb-4519-9460-6c92edd8cfb4",
            "finish_reason": "COMPLETE",
            "message": {
                "role": "assistant",
                "content": [{"type": "text", "text": "Hello!"}]
            },
            "usage": {
                "billed_units": {"input_tokens": 3, "output_tokens": 2},
                "tokens": {"input_tokens": 69, "output_tokens": 2}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("test-key"));
    let result = client.chat(hello_request()).await.unwrap();

    assert_eq!(result.text().as_deref(), Some("Hello!"));
    assert_eq!(result.finish_reason(), Some(FinishReason::Stop));
    assert_eq!(result.usage, Some(ChatUsage::new(3, 2)));
}

#[tokio::test]
async fn test_chat_streaming() {
    let server = MockServer::start().await;

    let body = ndjson(&[
        json!({"event_type": "stream-start", "generation_id": "g1", "is_finished": false}),
        json!({"event_type": "text-generation", "text": "Hel", "is_finished": false}),
        json!({"event_type": "text-generation", "text": "lo", "is_finished": false}),
        json!({
            "event_type": "stream-end",
            "is_finished": true,
            "finish_reason": "COMPLETE",
            "response": {"usage": {"billed_units": {"input_tokens": 5, "output_tokens": 2}}}
        }),
    ]);

    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .and(header("Accept", "application/x-ndjson"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("test-key"));
    let stream = client
        .stream_chat(hello_request(), StreamContext::new())
        .await
        .unwrap();
    let results: Vec<_> = stream.map(|r| r.unwrap()).collect().await;

    let kinds: Vec<StreamKind> = results.iter().map(|r| r.stream_kind).collect();
    assert_eq!(
        kinds,
        vec![
            StreamKind::None,
            StreamKind::None,
            StreamKind::AppendAssistantMessage,
            StreamKind::FinishData
        ]
    );
    assert_eq!(results[2].text().as_deref(), Some("Hello"));
    assert_eq!(results[3].usage, Some(ChatUsage::new(5, 2)));
    assert!(results.iter().all(|r| r.id.as_deref() == Some("g1")));
}

#[tokio::test]
async fn test_stream_without_terminal_event_still_finishes() {
    let server = MockServer::start().await;

    let body = ndjson(&[json!({"event_type": "text-generation", "text": "partial", "is_finished": false})]);
    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let results: Vec<_> = client
        .stream_chat(hello_request(), StreamContext::new())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(results.len(), 3);
    let finish = results[2].as_ref().unwrap();
    assert!(finish.is_finish());
    assert_eq!(finish.finish_reason(), Some(FinishReason::Unknown));
}

#[tokio::test]
async fn test_canceled_stream_reports_canceled() {
    let server = MockServer::start().await;

    let body = ndjson(&[json!({"event_type": "text-generation", "text": "x", "is_finished": false})]);
    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let client = client_for(&server, None);
    let results: Vec<_> = client
        .stream_chat(hello_request(), StreamContext::new().with_cancellation(token))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].as_ref().unwrap().is_finish());
    assert!(matches!(results[1], Err(LLMError::Canceled)));
}

#[tokio::test]
async fn test_missing_credential_sends_no_auth_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "command-r", "endpoints": ["chat"], "context_length": 128000}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let models = client.list_models().await.unwrap();
    assert_eq!(models.models[0].name, "command-r");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
    assert!(requests[0].headers.contains_key("user-agent"));
}

#[tokio::test]
async fn test_embed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/embed"))
        .and(body_partial_json(json!({
            "texts": ["hello", "world"],
            "input_type": "search_query",
            "embedding_types": ["float"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "emb-1",
            "embeddings": {"float": [[0.25, 0.5], [0.75, 1.0]]},
            "texts": ["hello", "world"],
            "meta": {"billed_units": {"input_tokens": 2}}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("test-key"));
    let request = EmbeddingRequest::new("embed-english-v3.0", vec!["hello".into(), "world".into()])
        .with_input_type("search_query");
    let result = client.embed(request).await.unwrap();

    assert_eq!(result.id.as_deref(), Some("emb-1"));
    assert_eq!(result.embeddings, vec![vec![0.25, 0.5], vec![0.75, 1.0]]);
}

#[tokio::test]
async fn test_error_statuses_are_mapped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .and(header("Authorization", "Bearer bad-key"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "invalid api token"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .and(header("Authorization", "Bearer busy-key"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .and(header("Authorization", "Bearer lost-key"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .and(header("Authorization", "Bearer down-key"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client_for(&server, Some("bad-key")).chat(hello_request()).await.unwrap_err();
    assert!(matches!(err, LLMError::AuthenticationFailed));

    let err = client_for(&server, Some("busy-key")).chat(hello_request()).await.unwrap_err();
    assert!(matches!(err, LLMError::RateLimitExceeded(ref body) if body == "slow down"));

    let Err(err) = client_for(&server, Some("lost-key"))
        .stream_chat(hello_request(), StreamContext::new())
        .await
    else {
        panic!("expected the stream to fail before opening");
    };
    assert!(matches!(err, LLMError::ModelNotFound(ref model) if model == "command-r"));

    let err = client_for(&server, Some("down-key")).chat(hello_request()).await.unwrap_err();
    assert!(matches!(err, LLMError::RequestFailed(ref msg) if msg.contains("503") && msg.contains("maintenance")));
}

#[tokio::test]
async fn test_malformed_response_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server, None).chat(hello_request()).await.unwrap_err();
    assert!(matches!(err, LLMError::UnexpectedResponse(_)));
}
