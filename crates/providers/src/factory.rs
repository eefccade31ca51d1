//! Provider factory: turns the `[provider]` config section into a live adapter.

use std::sync::Arc;

use tether_config::{ProviderSection, SUPPORTED_PROVIDERS};
use tether_core::error::Error;
use tether_core::provider::Provider;
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build a provider from configuration.
///
/// `anthropic`/`claude` select the content-block adapter, `openai`/`gpt` the
/// flat-message one. A missing key is not rejected here; the adapter reports
/// it on the first request.
pub fn build_provider(config: &ProviderSection) -> Result<Arc<dyn Provider>, Error> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let model = config.model.clone().unwrap_or_default();

    let provider: Arc<dyn Provider> = match config.name.as_str() {
        "anthropic" | "claude" => {
            let mut p = AnthropicProvider::new(api_key, model);
            if let Some(url) = &config.base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        "openai" | "gpt" => {
            let mut p = OpenAiCompatProvider::new(api_key, model);
            if let Some(url) = &config.base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        other => {
            return Err(Error::Config {
                message: format!(
                    "unknown provider: {other} (supported: {})",
                    SUPPORTED_PROVIDERS.join(", ")
                ),
            });
        }
    };

    debug!(provider = provider.name(), "Provider built");
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str) -> ProviderSection {
        ProviderSection {
            name: name.into(),
            api_key: Some("k".into()),
            ..ProviderSection::default()
        }
    }

    #[test]
    fn aliases_select_the_same_adapter() {
        assert_eq!(build_provider(&section("anthropic")).unwrap().name(), "anthropic");
        assert_eq!(build_provider(&section("claude")).unwrap().name(), "anthropic");
        assert_eq!(build_provider(&section("openai")).unwrap().name(), "openai");
        assert_eq!(build_provider(&section("gpt")).unwrap().name(), "openai");
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        match build_provider(&section("gemini")) {
            Err(Error::Config { message }) => {
                assert!(message.contains("gemini"));
                assert!(message.contains("anthropic, claude, openai, gpt"));
            }
            Err(other) => panic!("expected config error, got {other:?}"),
            Ok(_) => panic!("expected config error"),
        }
    }

    #[test]
    fn missing_key_still_builds() {
        let config = ProviderSection {
            api_key: None,
            ..section("anthropic")
        };
        assert!(build_provider(&config).is_ok());
    }
}
