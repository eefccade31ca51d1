//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tether_core::error::ProviderError;
use tether_core::message::{Message, Role, ToolCall};
use tether_core::provider::{ChatRequest, ChatResponse, Provider, ToolDef, Usage};
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider. An empty `model` selects the default.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
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

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the wire request. The system prompt is lifted out of the turn
    /// sequence; when several system messages are present the last one wins.
    fn to_api_request(&self, request: &ChatRequest) -> AnthropicRequest {
        let mut system = None;
        let mut messages = Vec::with_capacity(request.messages.len());

        for msg in &request.messages {
            match msg.role {
                Role::System => system = Some(msg.content.clone()),
                _ => messages.push(Self::to_api_message(msg)),
            }
        }

        AnthropicRequest {
            model: request
                .model
                .as_deref()
                .filter(|m| !m.is_empty())
                .unwrap_or(&self.model)
                .to_string(),
            max_tokens: request
                .max_tokens
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            tools: Self::to_api_tools(&request.tools),
        }
    }

    /// Convert one non-system message to Anthropic format.
    fn to_api_message(msg: &Message) -> AnthropicMessage {
        match msg.role {
            Role::Assistant if msg.has_tool_calls() => {
                let mut blocks = Vec::with_capacity(msg.tool_calls.len() + 1);
                if !msg.content.is_empty() {
                    blocks.push(ContentBlock::Text {
                        text: msg.content.clone(),
                    });
                }
                for tc in &msg.tool_calls {
                    // Arguments that are not valid JSON travel as a null input
                    let input = serde_json::from_str(&tc.arguments)
                        .unwrap_or(serde_json::Value::Null);
                    blocks.push(ContentBlock::ToolUse {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        input,
                    });
                }
                AnthropicMessage {
                    role: "assistant".into(),
                    content: AnthropicContent::Blocks(blocks),
                }
            }
            Role::Tool => AnthropicMessage {
                role: "user".into(),
                content: AnthropicContent::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: msg.content.clone(),
                }]),
            },
            Role::Assistant => AnthropicMessage {
                role: "assistant".into(),
                content: AnthropicContent::Text(msg.content.clone()),
            },
            Role::User | Role::System => AnthropicMessage {
                role: "user".into(),
                content: AnthropicContent::Text(msg.content.clone()),
            },
        }
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDef]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    /// Convert an Anthropic API response to a canonical response.
    fn from_api_response(resp: AnthropicResponse) -> Result<ChatResponse, ProviderError> {
        if let Some(err) = resp.error {
            return Err(ProviderError::Api {
                kind: err.kind,
                message: err.message,
            });
        }

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text } => content.push_str(&text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments: input.to_string(),
                    });
                }
                ResponseContentBlock::Other => {}
            }
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            usage: Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
            },
        })
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredential {
                provider: "anthropic".into(),
            });
        }

        let url = format!("{}/v1/messages", self.base_url);
        let body = self.to_api_request(request);

        debug!(
            provider = "anthropic",
            model = %body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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
            warn!(status = status.as_u16(), body = %text, "Anthropic API error");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let api_resp: AnthropicResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Decode(format!("anthropic: {e}")))?;

        Self::from_api_response(api_resp)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: AnthropicUsage,
    #[serde(default)]
    #[allow(dead_code)]
    stop_reason: Option<String>,
    #[serde(default)]
    error: Option<AnthropicError>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Thinking, redacted thinking, and any block type added later
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}
