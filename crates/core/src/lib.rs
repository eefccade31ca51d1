//! # tether core
//!
//! Canonical conversation model, error definitions, and the collaborator
//! traits the agent loop is written against. This crate depends on no other
//! workspace crate: providers, tools, and session stores implement these
//! traits in their own crates.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the loop is a trait here. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod capture;
pub mod context;
pub mod error;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;
pub mod transcript;

// Re-export key types at crate root for ergonomics
pub use capture::{CaptureEvent, CaptureSink, NoopCapture};
pub use context::{ContextBuilder, PassthroughContext};
pub use error::{Error, ProviderError, Result, SessionError, ToolError, TranscriptError};
pub use message::{Message, Role, ToolCall};
pub use provider::{ChatRequest, ChatResponse, Provider, ToolDef, Usage};
pub use session::SessionStore;
pub use tool::ToolExecutor;
