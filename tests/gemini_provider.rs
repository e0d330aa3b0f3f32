//! Gemini provider and full agent turns against mocked Gemini and tool servers.

use rentaldesk::agent::{Agent, ChatAgent};
use rentaldesk::config::{AgentConfig, GeminiConfig, ToolboxConfig};
use rentaldesk::handler::{classify, FailureClass};
use rentaldesk::providers::{GeminiProvider, Message, Provider};
use rentaldesk::tools::registry_builder::registry_from_descriptors;
use rentaldesk::tools::{ParameterSpec, ParameterType, ToolDescriptor, ToolboxClient};
use rentaldesk::RentaldeskError;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-pro:generateContent";

fn provider_for(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(GeminiConfig {
        api_base: server.uri(),
        api_key: Some("test-key".to_string()),
        ..Default::default()
    })
    .unwrap()
}

fn text_response(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 7}
    })
}

#[tokio::test]
async fn test_complete_returns_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_string_contains("systemInstruction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response("Hello there")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let response = provider
        .complete(
            &[Message::system("Be brief"), Message::user("Hi")],
            &[],
        )
        .await
        .unwrap();

    assert_eq!(response.message.content.as_deref(), Some("Hello there"));
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 12);
    assert_eq!(usage.completion_tokens, 7);
}

#[tokio::test]
async fn test_too_many_requests_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string(
            r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED"}}"#,
        ))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .complete(&[Message::user("Hi")], &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RentaldeskError>(),
        Some(RentaldeskError::RateLimited(_))
    ));
    assert_eq!(classify(&err), FailureClass::Retryable);
}

#[tokio::test]
async fn test_bad_request_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error":{"code":400,"status":"INVALID_ARGUMENT"}}"#,
        ))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .complete(&[Message::user("Hi")], &[])
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RentaldeskError>(),
        Some(RentaldeskError::Provider(_))
    ));
    assert_eq!(classify(&err), FailureClass::Terminal);
}

#[tokio::test]
async fn test_agent_turn_calls_database_tool() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {"name": "films-by-year", "args": {"year": 2005}}}]
                }
            }]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains("functionResponse"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(text_response("🎬 Found 2 films from 2005")),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/tool/films-by-year/invoke"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "[{\"title\":\"Academy Dinosaur\"},{\"title\":\"Ace Goldfinger\"}]"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let toolbox = Arc::new(
        ToolboxClient::new(&ToolboxConfig {
            url: server.uri(),
            ..Default::default()
        })
        .unwrap(),
    );
    let descriptor = ToolDescriptor::new("films-by-year", "Films released in a given year")
        .with_parameter(ParameterSpec::new("year", ParameterType::Integer, "Release year"));
    let tools = registry_from_descriptors(vec![descriptor], toolbox).unwrap();

    let agent = Agent::new(
        Arc::new(provider_for(&server)),
        Arc::new(tools),
        AgentConfig::default(),
    )
    .unwrap();

    let mut conversation = agent.new_conversation();
    let answer = agent
        .run_turn(&mut conversation, "Which films came out in 2005?")
        .await
        .unwrap();

    assert_eq!(answer, "🎬 Found 2 films from 2005");

    let roles: Vec<&str> = conversation
        .messages()
        .iter()
        .map(|m| m.role.as_str())
        .collect();
    assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);
    assert!(conversation.messages()[2]
        .content
        .as_deref()
        .unwrap()
        .contains("Academy Dinosaur"));
    assert_eq!(conversation.provider_usage().unwrap().prompt_tokens, 12);
}
