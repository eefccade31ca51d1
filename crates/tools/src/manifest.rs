//! `tool.json` manifest model.
//!
//! A manifest names an executable and the commands it accepts. Every command
//! is advertised to the model as its own tool, `<tool>.<command>`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tether_core::provider::ToolDef;

/// Parameter name piped to stdin when a command sets `stdin: true`
/// without naming one.
pub const DEFAULT_STDIN_PARAM: &str = "content";

/// Top-level `tool.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    pub binary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub commands: BTreeMap<String, CommandDef>,
}

/// One command a tool binary accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandDef {
    #[serde(default)]
    pub description: String,

    /// Argument template such as `"--namespace {namespace} {query}"`.
    /// When absent the command runs in flag mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,

    /// Pipe one parameter to the subprocess's stdin.
    #[serde(default)]
    pub stdin: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_param: Option<String>,

    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterDef>,
}

impl CommandDef {
    /// The parameter routed to stdin, if any.
    pub fn stdin_param(&self) -> Option<&str> {
        if !self.stdin {
            return None;
        }
        Some(
            self.stdin_param
                .as_deref()
                .filter(|p| !p.is_empty())
                .unwrap_or(DEFAULT_STDIN_PARAM),
        )
    }

    /// The template, treating an empty string as flag mode.
    pub fn template(&self) -> Option<&str> {
        self.args.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    #[serde(rename = "type", default = "default_param_type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

fn default_param_type() -> String {
    "string".into()
}

impl ToolManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// One definition per command, named `<tool>.<command>`.
    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.commands
            .iter()
            .map(|(cmd_name, cmd)| ToolDef {
                name: format!("{}.{}", self.name, cmd_name),
                description: format!("[{}] {}", self.name, cmd.description),
                parameters: build_json_schema(&cmd.parameters),
            })
            .collect()
    }
}

/// JSON Schema object for a command's parameters. `required` is only
/// emitted when at least one parameter is required.
pub fn build_json_schema(params: &BTreeMap<String, ParameterDef>) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (name, p) in params {
        let mut prop = serde_json::json!({
            "type": p.kind,
            "description": p.description,
        });
        if let Some(default) = &p.default {
            prop["default"] = default.clone();
        }
        properties.insert(name.clone(), prop);
        if p.required {
            required.push(serde_json::Value::String(name.clone()));
        }
    }

    let mut schema = serde_json::json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = serde_json::Value::Array(required);
    }
    schema
}
