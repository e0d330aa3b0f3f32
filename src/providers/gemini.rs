//! Google Gemini provider implementation for Rentaldesk
//!
//! Talks to the `generateContent` REST endpoint. System messages become the
//! request's system instruction, tool definitions become function
//! declarations, and tool calls and results travel as `functionCall` /
//! `functionResponse` parts.

use crate::config::GeminiConfig;
use crate::error::{Result, RentaldeskError};
use crate::providers::{
    status_error, tool_name_for_call, validate_message_sequence, CompletionResponse, Message,
    Provider, Role, TokenUsage, ToolCall,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini API provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    ///
    /// # Errors
    ///
    /// Returns `RentaldeskError::Config` when no API key is configured and
    /// `RentaldeskError::Provider` if the HTTP client cannot be built
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                RentaldeskError::Config(
                    "Gemini API key missing; set GOOGLE_API_KEY or provider.gemini.api_key"
                        .to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("rentaldesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                RentaldeskError::Provider(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!("Initialized Gemini provider: model={}", config.model);

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(&self, messages: &[Message], tools: &[serde_json::Value]) -> GenerateRequest {
        let messages = validate_message_sequence(messages);

        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .filter_map(|m| m.content.as_deref())
            .collect();
        let system_instruction = (!system_text.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: Some(system_text.join("\n\n")),
                ..Default::default()
            }],
        });

        let mut contents: Vec<Content> = Vec::new();
        for message in messages.iter().filter(|m| m.role != Role::System) {
            let (role, parts) = match message.role {
                Role::Assistant => ("model", assistant_parts(message)),
                Role::Tool => {
                    let id = message.tool_call_id.as_deref().unwrap_or_default();
                    let name = tool_name_for_call(&messages, id).unwrap_or(id).to_string();
                    let part = Part {
                        function_response: Some(GeminiFunctionResponse {
                            name,
                            response: serde_json::json!({
                                "result": message.content.clone().unwrap_or_default()
                            }),
                        }),
                        ..Default::default()
                    };
                    ("user", vec![part])
                }
                _ => (
                    "user",
                    vec![Part {
                        text: message.content.clone(),
                        ..Default::default()
                    }],
                ),
            };

            if parts.is_empty() {
                continue;
            }

            // Consecutive function responses belong in one turn.
            let merge = message.role == Role::Tool
                && contents.last().is_some_and(|c| {
                    c.role.as_deref() == Some("user")
                        && c.parts.iter().all(|p| p.function_response.is_some())
                });
            match contents.last_mut() {
                Some(last) if merge => last.parts.extend(parts),
                _ => contents.push(Content {
                    role: Some(role.to_string()),
                    parts,
                }),
            }
        }

        let declarations: Vec<serde_json::Value> = tools
            .iter()
            .filter(|t| t.get("name").is_some())
            .cloned()
            .collect();

        GenerateRequest {
            contents,
            system_instruction,
            tools: if declarations.is_empty() {
                Vec::new()
            } else {
                vec![ToolDeclarations {
                    function_declarations: declarations,
                }]
            },
        }
    }

    fn convert_response(response: GenerateResponse) -> Result<CompletionResponse> {
        let content = response
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .ok_or_else(|| {
                let feedback = response
                    .prompt_feedback
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "no candidates returned".to_string());
                RentaldeskError::Provider(format!("Gemini returned no content: {}", feedback))
            })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in content.parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall::generated(call.name, call.args.to_string()));
            }
        }

        let message = if tool_calls.is_empty() {
            Message::assistant(text)
        } else {
            let mut message = Message::assistant_with_tools(tool_calls);
            if !text.is_empty() {
                message.content = Some(text);
            }
            message
        };

        Ok(match response.usage_metadata {
            Some(usage) => CompletionResponse::with_usage(
                message,
                TokenUsage::new(usage.prompt_token_count, usage.candidates_token_count),
            ),
            None => CompletionResponse::new(message),
        })
    }
}

fn assistant_parts(message: &Message) -> Vec<Part> {
    let mut parts = Vec::new();
    if let Some(text) = message.content.as_ref().filter(|t| !t.is_empty()) {
        parts.push(Part {
            text: Some(text.clone()),
            ..Default::default()
        });
    }
    for call in message.tool_calls.iter().flatten() {
        parts.push(Part {
            function_call: Some(GeminiFunctionCall {
                name: call.function.name.clone(),
                args: serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| serde_json::json!({})),
            }),
            ..Default::default()
        });
    }
    parts
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let request = self.build_request(messages, tools);

        tracing::debug!(
            "Sending Gemini request: {} contents, {} tools",
            request.contents.len(),
            tools.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                RentaldeskError::Provider(format!("Gemini request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("Gemini returned error {}: {}", status, error_text);
            return Err(status_error("Gemini", status, &error_text).into());
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}", e);
            RentaldeskError::Provider(format!("Failed to parse Gemini response: {}", e))
        })?;

        Self::convert_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::FunctionCall;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(GeminiConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = GeminiProvider::new(GeminiConfig::default()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<RentaldeskError>(),
            Some(RentaldeskError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_uses_model() {
        assert!(provider()
            .endpoint()
            .ends_with("/v1beta/models/gemini-1.5-pro:generateContent"));
    }

    #[test]
    fn test_build_request_maps_roles_and_tools() {
        let messages = vec![
            Message::system("You are a DVD rental assistant"),
            Message::user("Is ACADEMY DINOSAUR available?"),
            Message::assistant_with_tools(vec![
                ToolCall {
                    id: "c1".to_string(),
                    function: FunctionCall {
                        name: "search-films-by-title".to_string(),
                        arguments: r#"{"title":"ACADEMY"}"#.to_string(),
                    },
                },
                ToolCall {
                    id: "c2".to_string(),
                    function: FunctionCall {
                        name: "get-film-availability".to_string(),
                        arguments: r#"{"film_id":1}"#.to_string(),
                    },
                },
            ]),
            Message::tool_result("c1", "[{\"film_id\":1}]"),
            Message::tool_result("c2", "4 copies"),
        ];
        let tools = vec![serde_json::json!({
            "name": "search-films-by-title",
            "description": "Find films",
            "parameters": {"type": "object", "properties": {"title": {"type": "string"}}}
        })];

        let request = provider().build_request(&messages, &tools);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "You are a DVD rental assistant"
        );
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(
            json["contents"][1]["parts"][1]["functionCall"]["args"]["film_id"],
            1
        );
        let responses = json["contents"][2]["parts"].as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses[1]["functionResponse"]["name"],
            "get-film-availability"
        );
        assert_eq!(
            json["tools"][0]["functionDeclarations"][0]["name"],
            "search-films-by-title"
        );
    }

    #[test]
    fn test_convert_response_text() {
        let body: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {
                "role": "model",
                "parts": [{"text": "🎬 Found 3 "}, {"text": "films"}]
            }}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
        }))
        .unwrap();

        let response = GeminiProvider::convert_response(body).unwrap();
        assert_eq!(response.message.content.as_deref(), Some("🎬 Found 3 films"));
        assert_eq!(response.usage.unwrap().total_tokens, 16);
    }

    #[test]
    fn test_convert_response_function_call() {
        let body: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "films-by-year", "args": {"year": 2005}}}
            ]}}]
        }))
        .unwrap();

        let response = GeminiProvider::convert_response(body).unwrap();
        let calls = response.message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "films-by-year");
        assert_eq!(calls[0].function.arguments, r#"{"year":2005}"#);
    }

    #[test]
    fn test_convert_response_without_candidates_fails() {
        let body: GenerateResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();

        let err = GeminiProvider::convert_response(body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
