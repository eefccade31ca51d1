//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI itself and any endpoint that speaks the
//! `/chat/completions` wire format (OpenRouter, Ollama, vLLM, ...).
//! Messages are flat role/content records; tool calls ride on assistant
//! messages as `function` entries with stringified arguments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tether_core::error::ProviderError;
use tether_core::message::{Message, ToolCall};
use tether_core::provider::{ChatRequest, ChatResponse, Provider, ToolDef, Usage};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider. An empty `model` selects the default.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        let model = model.into();
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: if model.is_empty() {
                DEFAULT_MODEL.into()
            } else {
                model
            },
            client,
        }
    }

    /// Point the provider at another compatible backend.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn to_api_request(&self, request: &ChatRequest) -> ApiRequest {
        ApiRequest {
            model: request
                .model
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or(&self.model)
                .to_string(),
            messages: Self::to_api_messages(&request.messages),
            tools: Self::to_api_tools(&request.tools),
            max_tokens: request.max_tokens.filter(|n| *n > 0),
        }
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                // An assistant turn that only carries tool calls has no text
                content: if m.content.is_empty() && m.has_tool_calls() {
                    None
                } else {
                    Some(m.content.clone())
                },
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDef]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Only the first choice is consulted; an empty choice list is an empty reply.
    fn from_api_response(resp: ApiResponse) -> Result<ChatResponse, ProviderError> {
        if let Some(err) = resp.error {
            return Err(ProviderError::Api {
                kind: err.kind.unwrap_or_default(),
                message: err.message,
            });
        }

        let usage = resp
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let Some(choice) = resp.choices.into_iter().next() else {
            return Ok(ChatResponse {
                usage,
                ..ChatResponse::default()
            });
        };

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage,
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredential {
                provider: "openai".into(),
            });
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.to_api_request(request);

        debug!(
            provider = "openai",
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %text, "Provider returned error");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let api_response: ApiResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Decode(format!("openai: {e}")))?;

        Self::from_api_response(api_response)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    // Some compatible servers omit it; the loop assigns one
    #[serde(default)]
    id: String,
    #[serde(default)]
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}
