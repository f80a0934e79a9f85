//! Completion clients against a mock HTTP server.

use askdb::config::LlmConfig;
use askdb::executor::StatementRunner;
use askdb::llm::{CompletionError, CompletionProvider, CompletionRequest, LlmClient, LlmProvider};
use askdb::types::{ColumnDescriptor, GenerationPhase, ResultRow, TableDescriptor};
use askdb::{Pipeline, PipelineStage, Result, SafetyGate, SchemaModel, SqlStatement};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(model: &str, server: &MockServer) -> LlmConfig {
    LlmConfig {
        model: model.to_string(),
        api_key: "test-key".to_string(),
        base_url: Some(format!("{}/", server.uri())),
        timeout: Duration::from_secs(5),
    }
}

fn openai_reply(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}
        ]
    })
}

#[tokio::test]
async fn openai_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 500,
            "messages": [{"role": "user", "content": "count employees"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("SELECT 1 AS one")))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(&config("gpt-4o-mini", &server)).unwrap();
    assert_eq!(client.provider(), LlmProvider::OpenAI);

    let text = client
        .complete(&CompletionRequest::new("count employees", 500, 0.1))
        .await
        .unwrap();
    assert_eq!(text, "SELECT 1 AS one");
}

#[tokio::test]
async fn anthropic_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"model": "claude-haiku-4-5", "max_tokens": 800})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "There are "},
                {"type": "text", "text": "12 employees."}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(&config("claude-haiku-4-5", &server)).unwrap();
    assert_eq!(client.provider(), LlmProvider::Anthropic);

    let text = client
        .complete(&CompletionRequest::new("summarize", 800, 0.3))
        .await
        .unwrap();
    assert_eq!(text, "There are 12 employees.");
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = LlmClient::new(&config("gpt-4o-mini", &server)).unwrap();
    let err = client
        .complete(&CompletionRequest::new("hi", 10, 0.1))
        .await
        .unwrap_err();

    match err {
        CompletionError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("expected Status, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = LlmClient::new(&config("gpt-4o-mini", &server)).unwrap();
    let err = client
        .complete(&CompletionRequest::new("hi", 10, 0.1))
        .await
        .unwrap_err();
    assert!(matches!(err, CompletionError::Parse(_)));
}

struct NoRows;

#[async_trait]
impl StatementRunner for NoRows {
    async fn run(&self, _statement: &SqlStatement) -> Result<Vec<ResultRow>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn pipeline_over_http_summary_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 500})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_reply("```SQL\nSELECT e.name FROM public.employees e LIMIT 50\n```")),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"max_tokens": 800})))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(&config("gpt-4o-mini", &server)).unwrap();
    let pipeline = Pipeline::new(Arc::new(client), SafetyGate::default(), Arc::new(NoRows));
    let schema = SchemaModel::from(vec![TableDescriptor::new("public", "employees")
        .with_column(ColumnDescriptor::new("name", "text", true))]);

    let err = pipeline
        .ask("List employee names", Some(&schema))
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::AnswerSynthesized);
    assert_eq!(err.error.generation_phase(), Some(GenerationPhase::Summarization));
    assert!(err.error.to_string().contains("503"));
}
