//! Configuration loading, validation, and management for tether.
//!
//! Loads configuration from `~/.tether/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Provider names the factory understands.
pub const SUPPORTED_PROVIDERS: &[&str] = &["anthropic", "claude", "openai", "gpt"];

/// The root configuration structure.
///
/// Maps directly to `~/.tether/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model backend selection and credentials
    #[serde(default)]
    pub provider: ProviderSection,

    /// Loop limits and session selection
    #[serde(default)]
    pub agent: AgentSection,

    /// Tool manifest discovery and execution
    #[serde(default)]
    pub tools: ToolsSection,

    /// Transcript persistence
    #[serde(default)]
    pub sessions: SessionsSection,

    /// Per-call capture recorder
    #[serde(default)]
    pub capture: CaptureSection,

    /// System prompt assembly
    #[serde(default)]
    pub context: ContextSection,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default = "default_provider")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Empty means the provider's own default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Custom endpoint for wire-compatible backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_provider() -> String {
    "anthropic".into()
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            name: default_provider(),
            api_key: None,
            model: None,
            base_url: None,
            max_tokens: None,
        }
    }
}

impl std::fmt::Debug for ProviderSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSection")
            .field("name", &self.name)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_session_key")]
    pub session_key: String,
}

fn default_max_iterations() -> u32 {
    20
}
fn default_session_key() -> String {
    "main".into()
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            session_key: default_session_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsSection {
    /// Directories scanned for `<tool>/tool.json` manifests
    #[serde(default = "default_tool_dirs")]
    pub dirs: Vec<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_tool_dirs() -> Vec<PathBuf> {
    vec![AppConfig::config_dir().join("tools")]
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            dirs: default_tool_dirs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsSection {
    #[serde(default = "default_sessions_dir")]
    pub dir: PathBuf,
}

fn default_sessions_dir() -> PathBuf {
    AppConfig::config_dir().join("sessions")
}

impl Default for SessionsSection {
    fn default() -> Self {
        Self {
            dir: default_sessions_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_capture_binary")]
    pub binary: String,
}

fn default_true() -> bool {
    true
}
fn default_capture_binary() -> String {
    "token-eval".into()
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: default_capture_binary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    /// Directory holding AGENTS.md, SOUL.md and friends
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    #[serde(default = "default_bootstrap_max_chars")]
    pub bootstrap_max_chars: usize,

    #[serde(default = "default_bootstrap_total_max_chars")]
    pub bootstrap_total_max_chars: usize,
}

fn default_workspace() -> PathBuf {
    AppConfig::workspace_dir()
}
fn default_bootstrap_max_chars() -> usize {
    20_000
}
fn default_bootstrap_total_max_chars() -> usize {
    24_000
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            bootstrap_max_chars: default_bootstrap_max_chars(),
            bootstrap_total_max_chars: default_bootstrap_total_max_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tether/config.toml).
    ///
    /// Environment overrides:
    /// - `TETHER_PROVIDER`, `TETHER_MODEL`
    /// - `TETHER_API_KEY`, then the backend's own variable
    ///   (`ANTHROPIC_API_KEY` or `OPENAI_API_KEY`) when no key is configured
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("TETHER_PROVIDER") {
            self.provider.name = provider;
        }
        if let Some(model) = lookup("TETHER_MODEL") {
            self.provider.model = Some(model);
        }
        if self.provider.api_key.is_none() {
            let backend_var = match self.provider.name.as_str() {
                "openai" | "gpt" => "OPENAI_API_KEY",
                _ => "ANTHROPIC_API_KEY",
            };
            self.provider.api_key = lookup("TETHER_API_KEY").or_else(|| lookup(backend_var));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tether")
    }

    /// Get the workspace directory path.
    pub fn workspace_dir() -> PathBuf {
        Self::config_dir().join("workspace")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_PROVIDERS.contains(&self.provider.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown provider {:?} (supported: {})",
                self.provider.name,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tools.timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider
            .api_key
            .as_deref()
            .is_some_and(|k| !k.is_empty())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.provider.name, "anthropic");
        assert_eq!(config.agent.max_iterations, 20);
        assert_eq!(config.agent.session_key, "main");
        assert_eq!(config.tools.timeout_secs, 30);
        assert!(config.capture.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.name, config.provider.name);
        assert_eq!(parsed.tools.dirs, config.tools.dirs);
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = AppConfig::default();
        config.provider.name = "mystery".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::read_file(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.name, "anthropic");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[provider]
name = "openai"
base_url = "http://localhost:11434/v1"

[agent]
max_iterations = 3
"#,
        )
        .unwrap();

        let config = AppConfig::read_file(&path).unwrap();
        assert_eq!(config.provider.name, "openai");
        assert_eq!(
            config.provider.base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.session_key, "main");
        assert_eq!(config.tools.timeout_secs, 30);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nmax_iterations = ").unwrap();
        assert!(matches!(
            AppConfig::read_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_provider_and_model() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("TETHER_PROVIDER", "openai"),
            ("TETHER_MODEL", "gpt-4o-mini"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ]));
        assert_eq!(config.provider.name, "openai");
        assert_eq!(config.provider.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-openai"));
    }

    #[test]
    fn generic_key_wins_over_backend_key() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("TETHER_API_KEY", "sk-generic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ]));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-generic"));
    }

    #[test]
    fn configured_key_is_not_overridden() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("from-file".into());
        config.apply_env(env(&[("ANTHROPIC_API_KEY", "sk-ant")]));
        assert_eq!(config.provider.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("anthropic"));
        assert!(toml_str.contains("token-eval"));
    }
}
