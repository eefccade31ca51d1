//! Provider trait: the abstraction over LLM backends.
//!
//! A Provider translates a canonical [`ChatRequest`] into one backend's wire
//! protocol and the backend's reply back into a canonical [`ChatResponse`].
//!
//! Implementations: Anthropic-style content blocks, OpenAI-style flat messages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// The tool name, `tool.command`
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One model call's input. Adapters only ever borrow it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The conversation messages, oldest first
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDef>,

    /// Overrides the adapter's default model when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Text content, empty when the model only requested tools
    pub content: String,

    /// Tool calls in the order the model issued them
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Token usage statistics
    #[serde(default)]
    pub usage: Usage,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// The core Provider trait.
///
/// The agent loop calls `chat()` without knowing which backend is behind it.
/// Implementations hold no per-call state, so one instance can serve many
/// concurrent runs. Dropping the returned future aborts the request.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A short identifier for this provider (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_are_empty() {
        let req = ChatRequest::default();
        assert!(req.messages.is_empty());
        assert!(req.model.is_none());
        assert!(req.max_tokens.is_none());
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDef {
            name: "memo.add".into(),
            description: "[memo] Store a note".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "content": { "type": "string", "description": "Note body" }
                },
                "required": ["content"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("memo.add"));
        assert!(json.contains("content"));
    }
}
