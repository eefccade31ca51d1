//! The agent tool loop.

use std::collections::HashSet;
use std::sync::Arc;

use tether_core::capture::{CaptureEvent, CaptureSink, NoopCapture};
use tether_core::context::{ContextBuilder, PassthroughContext};
use tether_core::error::{Error, Result};
use tether_core::message::{Message, ToolCall};
use tether_core::provider::{ChatRequest, Provider};
use tether_core::session::SessionStore;
use tether_core::tool::ToolExecutor;
use tether_core::transcript::{check_correlation, close_interrupted_calls};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Final text when the budget ran out on a turn that produced no text.
pub const MAX_ITERATIONS_TEXT: &str = "[max iterations reached]";

/// Final text when the model never produced any.
pub const EMPTY_RESPONSE_TEXT: &str = "I've completed processing but have no response to give.";

/// Drives one conversation turn: call the model, run the tools it asks for,
/// feed the results back, until it answers in plain text or the iteration
/// budget runs out.
///
/// Collaborators are shared and read-only; one loop may serve concurrent
/// runs as long as each uses its own session key.
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Tools advertised to the model and executed on request
    tools: Arc<dyn ToolExecutor>,

    /// Transcript storage
    sessions: Arc<dyn SessionStore>,

    /// Turns stored history into the initial request messages
    context: Arc<dyn ContextBuilder>,

    /// Best-effort per-call recorder
    capture: Arc<dyn CaptureSink>,

    /// Model override; the provider default when unset
    model: Option<String>,

    max_tokens: Option<u32>,

    /// Maximum provider calls per run
    max_iterations: u32,
}

impl AgentLoop {
    /// Create a new agent loop with a passthrough context and no capture.
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolExecutor>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            provider,
            tools,
            sessions,
            context: Arc::new(PassthroughContext),
            capture: Arc::new(NoopCapture),
            model: None,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the maximum number of provider calls per run (at least one).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_context(mut self, context: Arc<dyn ContextBuilder>) -> Self {
        self.context = context;
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn CaptureSink>) -> Self {
        self.capture = capture;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Process `user_message` in the session `session_key` and return the
    /// final assistant text.
    ///
    /// Every message appended to the transcript is persisted as soon as it
    /// exists. Provider failures end the run; tool failures become error
    /// text for the model. Cancelling `cancel` aborts the in-flight provider
    /// call or tool subprocess and returns [`Error::Cancelled`].
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        session_key: &str,
        user_message: &str,
    ) -> Result<String> {
        let history = close_interrupted_calls(self.sessions.history(session_key).await);
        let summary = self.sessions.summary(session_key).await;

        info!(
            session = session_key,
            history = history.len(),
            provider = self.provider.name(),
            "Processing message"
        );

        let mut request = ChatRequest {
            messages: self.context.build_messages(&history, &summary, user_message),
            tools: self.tools.definitions(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        };
        // A request that cannot be sent must not leave the user turn behind
        check_correlation(&request.messages)?;
        self.persist(session_key, Message::user(user_message)).await;

        let mut final_content = String::new();

        for iteration in 1..=self.max_iterations {
            debug!(
                session = session_key,
                iteration,
                max = self.max_iterations,
                messages = request.messages.len(),
                "Agent loop iteration"
            );

            check_correlation(&request.messages)?;

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(session = session_key, iteration, "Run cancelled during provider call");
                    return Err(Error::Cancelled);
                }
                result = self.provider.chat(&request) => result?,
            };

            let event = CaptureEvent {
                provider: self.provider.name(),
                session_key,
                intent: user_message,
                iteration,
                response: &response,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(session = session_key, iteration, "Run cancelled during capture");
                    return Err(Error::Cancelled);
                }
                () = self.capture.record(event) => {}
            }

            debug!(
                chars = response.content.len(),
                tool_calls = response.tool_calls.len(),
                prompt_tokens = response.usage.prompt_tokens,
                completion_tokens = response.usage.completion_tokens,
                "Provider responded"
            );

            if response.tool_calls.is_empty() {
                final_content = response.content;
                break;
            }

            let calls = assign_call_ids(response.tool_calls);
            let assistant = Message::assistant_with_tool_calls(response.content.clone(), calls.clone());
            request.messages.push(assistant.clone());
            self.persist(session_key, assistant).await;

            for call in &calls {
                debug!(tool = %call.name, id = %call.id, "Executing tool call");

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(session = session_key, tool = %call.name, "Run cancelled during tool call");
                        return Err(Error::Cancelled);
                    }
                    result = self.tools.execute(call) => result,
                };

                let content = match result {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(tool = %call.name, error = %e, "Tool execution failed");
                        format!("Error: {e}")
                    }
                };

                let tool_msg = Message::tool_result(call.id.clone(), content);
                request.messages.push(tool_msg.clone());
                self.persist(session_key, tool_msg).await;
            }

            if iteration == self.max_iterations {
                warn!(
                    session = session_key,
                    iterations = iteration,
                    "Max tool iterations reached"
                );
                final_content = if response.content.is_empty() {
                    MAX_ITERATIONS_TEXT.to_string()
                } else {
                    response.content
                };
            }
        }

        if final_content.is_empty() {
            final_content = EMPTY_RESPONSE_TEXT.to_string();
        }

        self.persist(session_key, Message::assistant(final_content.clone()))
            .await;

        info!(session = session_key, chars = final_content.len(), "Run complete");
        Ok(final_content)
    }

    /// Append and save. A failed save is logged; the run continues.
    async fn persist(&self, session_key: &str, message: Message) {
        self.sessions.add_message(session_key, message).await;
        if let Err(e) = self.sessions.save(session_key).await {
            warn!(session = session_key, error = %e, "Failed to save session");
        }
    }
}

/// Give every call a usable id: empty or repeated ids are replaced with a
/// generated `call_<uuid>`.
fn assign_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.is_empty() || !seen.insert(call.id.clone()) {
                call.id = format!("call_{}", Uuid::new_v4().simple());
                seen.insert(call.id.clone());
            }
            call
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tether_core::error::{ProviderError, ToolError};
    use tether_core::provider::{ChatResponse, ToolDef};
    use tether_session::InMemorySessionStore;

    /// A mock provider that returns a fixed response.
    struct MockProvider {
        response: String,
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn chat(&self, _request: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            Ok(ChatResponse::text(&self.response))
        }
    }

    struct NoTools;

    #[async_trait]
    impl ToolExecutor for NoTools {
        fn definitions(&self) -> Vec<ToolDef> {
            vec![]
        }

        async fn execute(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
            Err(ToolError::UnknownTool(call.name.clone()))
        }
    }

    #[tokio::test]
    async fn simple_text_response() {
        let sessions = Arc::new(InMemorySessionStore::new());
        let agent = AgentLoop::new(
            Arc::new(MockProvider {
                response: "Hello! How can I help?".into(),
            }),
            Arc::new(NoTools),
            sessions.clone(),
        );

        let out = agent
            .run(&CancellationToken::new(), "main", "Hello!")
            .await
            .unwrap();
        assert_eq!(out, "Hello! How can I help?");
        // User + Assistant
        assert_eq!(
            sessions.history("main").await,
            vec![Message::user("Hello!"), Message::assistant("Hello! How can I help?")]
        );
    }

    #[tokio::test]
    async fn empty_text_gets_fallback() {
        let agent = AgentLoop::new(
            Arc::new(MockProvider { response: String::new() }),
            Arc::new(NoTools),
            Arc::new(InMemorySessionStore::new()),
        );
        let out = agent.run(&CancellationToken::new(), "main", "hi").await.unwrap();
        assert_eq!(out, EMPTY_RESPONSE_TEXT);
    }

    #[test]
    fn zero_iterations_clamps_to_one() {
        let agent = AgentLoop::new(
            Arc::new(MockProvider { response: String::new() }),
            Arc::new(NoTools),
            Arc::new(InMemorySessionStore::new()),
        )
        .with_max_iterations(0);
        assert_eq!(agent.max_iterations(), 1);
    }

    #[test]
    fn call_ids_are_filled_and_deduplicated() {
        let calls = assign_call_ids(vec![
            ToolCall::new("", "a.b", "{}"),
            ToolCall::new("x", "a.b", "{}"),
            ToolCall::new("x", "a.b", "{}"),
        ]);
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[1].id, "x");
        assert!(calls[2].id.starts_with("call_"));
        assert_ne!(calls[0].id, calls[2].id);
    }
}
