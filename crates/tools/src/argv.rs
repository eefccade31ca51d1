//! Argument vector construction for manifest commands.

use serde_json::{Map, Value};

use crate::manifest::CommandDef;

/// Text form of an argument value: strings verbatim, everything else as
/// compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the argument vector for `cmd_name`. The command name always comes
/// first.
///
/// Template mode substitutes `{param}` placeholders, splits on whitespace,
/// and drops any token that still holds an unreplaced placeholder. Flag mode
/// emits `--key value` for each argument except the stdin parameter.
pub fn build_command_args(cmd: &CommandDef, args: &Map<String, Value>, cmd_name: &str) -> Vec<String> {
    let mut argv = vec![cmd_name.to_string()];

    match cmd.template() {
        Some(template) => {
            let mut expanded = template.to_string();
            for (key, value) in args {
                expanded = expanded.replace(&format!("{{{key}}}"), &render_value(value));
            }
            argv.extend(
                expanded
                    .split_whitespace()
                    .filter(|part| !part.contains('{'))
                    .map(str::to_string),
            );
        }
        None => {
            let stdin_param = cmd.stdin_param();
            for (key, value) in args {
                if stdin_param == Some(key.as_str()) {
                    continue;
                }
                argv.push(format!("--{key}"));
                argv.push(render_value(value));
            }
        }
    }

    argv
}

/// Placeholder names in a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                if !name.is_empty() && !name.contains('{') {
                    found.push(name);
                }
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    found
}
