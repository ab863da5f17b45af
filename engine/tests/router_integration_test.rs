//! Integration tests for the LLM Router
//!
//! Validates provider request shapes and failover using mock servers

use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use parley_engine::config::{AnthropicConfig, LLMConfig, OpenAIConfig};
use parley_engine::llm::{
    AnthropicProvider, LLMError, LLMProvider, LLMRouter, OllamaProvider, OpenAIProvider,
};
use parley_engine::secrets::SecretCache;
use sdk::errors::EngineError;
use sdk::ports::GenerationPort;
use sdk::types::{GenerationRequest, HealthStatus};

fn request() -> GenerationRequest {
    GenerationRequest {
        system_prompt: "You are helpful.".to_string(),
        user_prompt: "Context:\nNo additional context available.\n\nUser message: Hello".to_string(),
        max_tokens: 500,
        temperature: 0.7,
    }
}

fn ollama_reply(content: &str) -> serde_json::Value {
    json!({
        "model": "llama3.1:8b",
        "created_at": "2023-08-04T19:22:45.499127Z",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

fn config(default_provider: &str) -> Arc<LLMConfig> {
    Arc::new(LLMConfig {
        default_provider: default_provider.to_string(),
        request_timeout_secs: 5,
        ..Default::default()
    })
}

fn keys() -> Arc<SecretCache> {
    Arc::new(SecretCache::with_values([
        ("openai_api_key", "sk-test"),
        ("anthropic_api_key", "sk-ant-test"),
    ]))
}

#[tokio::test]
async fn test_openai_request_shape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 500
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Hi there!  " } }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAIProvider::new(
        OpenAIConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        },
        keys(),
    );

    assert_eq!(provider.complete(&request()).await.unwrap(), "Hi there!");
}

#[tokio::test]
async fn test_openai_without_key_fails_auth() {
    let provider = OpenAIProvider::new(
        OpenAIConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        },
        Arc::new(SecretCache::with_values(Vec::<(String, String)>::new())),
    );

    assert!(!provider.check_health().await);
    assert!(matches!(
        provider.complete(&request()).await,
        Err(LLMError::AuthenticationFailed(_))
    ));
}

#[tokio::test]
async fn test_anthropic_request_shape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({ "system": "You are helpful." })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "Hi " },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": "there!" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let provider = AnthropicProvider::new(
        AnthropicConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        },
        keys(),
    );

    assert_eq!(provider.complete(&request()).await.unwrap(), "Hi there!");
}

#[tokio::test]
async fn test_ollama_request_shape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.1:8b",
            "stream": false,
            "options": { "num_predict": 500 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply("Hi there!")))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(mock_server.uri(), "llama3.1:8b");
    assert_eq!(provider.complete(&request()).await.unwrap(), "Hi there!");
}

#[tokio::test]
async fn test_router_fails_over_to_next_provider() {
    let failing_server = MockServer::start().await;
    let succeeding_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&failing_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ollama_reply("Hello! I am the backup provider.")),
        )
        .mount(&succeeding_server)
        .await;

    // OpenAI is the default, so it is tried first despite costing more
    let providers: Vec<Box<dyn LLMProvider>> = vec![
        Box::new(OllamaProvider::new(succeeding_server.uri(), "llama3.1:8b")),
        Box::new(OpenAIProvider::new(
            OpenAIConfig {
                base_url: failing_server.uri(),
                ..Default::default()
            },
            keys(),
        )),
    ];
    let router = LLMRouter::new(providers, config("openai"));

    let (text, provider) = router.call(&request()).await.unwrap();
    assert_eq!(text, "Hello! I am the backup provider.");
    assert_eq!(provider, "ollama");
}

#[tokio::test]
async fn test_empty_completion_fails_over() {
    let empty_server = MockServer::start().await;
    let good_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply("   ")))
        .mount(&empty_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply("Real answer")))
        .mount(&good_server)
        .await;

    let providers: Vec<Box<dyn LLMProvider>> = vec![
        Box::new(OllamaProvider::new(empty_server.uri(), "llama3.1:8b")),
        Box::new(OllamaProvider::new(good_server.uri(), "llama3.1:8b")),
    ];
    let router = LLMRouter::new(providers, config("ollama"));

    assert_eq!(router.generate(&request()).await.unwrap(), "Real answer");
}

#[tokio::test]
async fn test_all_providers_failing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let providers: Vec<Box<dyn LLMProvider>> =
        vec![Box::new(OllamaProvider::new(mock_server.uri(), "llama3.1:8b"))];
    let router = LLMRouter::new(providers, config("ollama"));

    assert!(matches!(
        router.generate(&request()).await,
        Err(EngineError::AllProvidersExhausted)
    ));
}

#[tokio::test]
async fn test_no_providers() {
    let router = LLMRouter::new(Vec::new(), config("ollama"));

    assert!(router.generate(&request()).await.is_err());
    assert_eq!(router.model(), "none");

    let health = GenerationPort::health(&router).await;
    assert_eq!(health.status, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn test_generation_health_probes_providers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&mock_server)
        .await;

    let providers: Vec<Box<dyn LLMProvider>> = vec![
        Box::new(OllamaProvider::new(mock_server.uri(), "llama3.1:8b")),
        Box::new(OllamaProvider::new("http://127.0.0.1:1", "llama3.1:8b")),
    ];
    let router = LLMRouter::new(providers, config("ollama"));

    let health = GenerationPort::health(&router).await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.detail.as_deref(), Some("ollama=up, ollama=down"));
    assert_eq!(router.model(), "ollama:llama3.1:8b -> ollama:llama3.1:8b");
}

#[tokio::test]
async fn test_cloud_health_requires_a_working_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("x-api-key", "sk-ant-test"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let openai = OpenAIProvider::new(
        OpenAIConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        },
        keys(),
    );
    let anthropic = AnthropicProvider::new(
        AnthropicConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        },
        keys(),
    );

    assert!(openai.check_health().await);
    // A key is present but rejected
    assert!(!anthropic.check_health().await);
}

#[tokio::test]
async fn test_unreachable_cloud_provider_is_down() {
    let providers: Vec<Box<dyn LLMProvider>> = vec![Box::new(OpenAIProvider::new(
        OpenAIConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        },
        keys(),
    ))];
    let router = LLMRouter::new(providers, config("openai"));

    let health = GenerationPort::health(&router).await;
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert_eq!(health.detail.as_deref(), Some("openai=down"));
}
