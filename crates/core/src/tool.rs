//! Tool executor trait: the abstraction over externally executable actions.
//!
//! The agent loop advertises [`ToolExecutor::definitions`] to the model and
//! hands every tool call it receives back to [`ToolExecutor::execute`].

use async_trait::async_trait;

use crate::error::ToolError;
use crate::message::ToolCall;
use crate::provider::ToolDef;

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions advertised to the model, in a stable order.
    fn definitions(&self) -> Vec<ToolDef>;

    /// Run one tool call and return its captured output.
    ///
    /// Dropping the returned future must stop any subprocess it started.
    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError>;
}
