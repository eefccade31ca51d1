//! LLM provider adapters for tether.
//!
//! Both adapters implement [`tether_core::Provider`] and translate the
//! canonical message model to and from their backend's wire format.
//! [`build_provider`] picks one from configuration.

pub mod anthropic;
pub mod factory;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use factory::build_provider;
pub use openai_compat::OpenAiCompatProvider;
