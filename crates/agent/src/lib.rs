//! The tool-calling agent loop.
//!
//! Each run follows a **call → execute → feed back** cycle:
//!
//! 1. **Build context** (system prompt + stored history + the new message)
//! 2. **Send to LLM** via the configured provider
//! 3. **If tool calls**: run them in order, append the results, go to step 2
//! 4. **If text response**: persist it and return it to the caller
//!
//! The loop stops on a text-only response or when the iteration budget is
//! spent. Every appended message is saved to the session store right away.

pub mod capture;
pub mod context;
pub mod loop_runner;

pub use capture::CommandCapture;
pub use context::WorkspaceContextBuilder;
pub use loop_runner::AgentLoop;
pub use tokio_util::sync::CancellationToken;
