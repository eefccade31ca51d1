//! Workspace-aware context builder.
//!
//! The system prompt is assembled from these sections, separated by `---`:
//!
//! 1. Identity: current time, runtime, workspace path, and ground rules
//! 2. Workspace bootstrap files (`AGENTS.md`, `SOUL.md`, ...), capped per file
//!    and in total
//! 3. A short list of the tools the model may call
//! 4. The summary of earlier conversation, if any
//!
//! It is followed by the stored history and then the new user message.

use std::path::{Path, PathBuf};

use tether_core::context::ContextBuilder;
use tether_core::message::Message;
use tether_core::provider::ToolDef;
use tracing::debug;

/// Files read from the workspace root, in prompt order.
pub const BOOTSTRAP_FILES: [&str; 5] = ["AGENTS.md", "SOUL.md", "USER.md", "IDENTITY.md", "TOOLS.md"];

pub const DEFAULT_BOOTSTRAP_MAX_CHARS: usize = 20_000;
pub const DEFAULT_BOOTSTRAP_TOTAL_MAX_CHARS: usize = 24_000;

const TRUNCATED_MARKER: &str = "\n\n[... truncated]";
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

pub struct WorkspaceContextBuilder {
    workspace: PathBuf,
    max_chars: usize,
    total_max_chars: usize,
    tools: Vec<ToolDef>,
}

impl WorkspaceContextBuilder {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            max_chars: DEFAULT_BOOTSTRAP_MAX_CHARS,
            total_max_chars: DEFAULT_BOOTSTRAP_TOTAL_MAX_CHARS,
            tools: Vec::new(),
        }
    }

    /// Per-file and total character caps for bootstrap files.
    pub fn with_limits(mut self, max_chars: usize, total_max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self.total_max_chars = total_max_chars;
        self
    }

    /// Tools listed in the prompt's tool summary.
    pub fn with_tools(mut self, tools: Vec<ToolDef>) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(&self, summary: &str) -> String {
        let mut parts = vec![self.identity()];

        let bootstrap = self.bootstrap_files();
        if !bootstrap.is_empty() {
            parts.push(bootstrap);
        }

        let tools = self.tool_summary();
        if !tools.is_empty() {
            parts.push(tools);
        }

        if !summary.is_empty() {
            parts.push(format!("## Previous Conversation Summary\n\n{summary}"));
        }

        parts.join(SECTION_SEPARATOR)
    }

    fn identity(&self) -> String {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");
        let workspace = std::path::absolute(&self.workspace).unwrap_or_else(|_| self.workspace.clone());
        format!(
            "# tether\n\n\
             You are an autonomous agent that acts through external tools.\n\n\
             ## Current Time\n{now}\n\n\
             ## Runtime\n{} {}, tether {}\n\n\
             ## Workspace\n{}\n\n\
             ## Important Rules\n\
             1. Use tools to perform actions. Do not pretend to execute commands.\n\
             2. If a tool returns an error, read it and adjust before retrying.\n\
             3. When the task is done, answer in plain text without calling tools.",
            std::env::consts::OS,
            std::env::consts::ARCH,
            env!("CARGO_PKG_VERSION"),
            workspace.display(),
        )
    }

    fn bootstrap_files(&self) -> String {
        let mut parts = Vec::new();
        let mut total = 0;

        for name in BOOTSTRAP_FILES {
            if total >= self.total_max_chars {
                break;
            }
            let Some(content) = read_text(&self.workspace.join(name)) else {
                continue;
            };

            let content = cap_chars(content, self.max_chars);
            let content = cap_chars(content, self.total_max_chars - total);
            total += content.chars().count();

            debug!(file = name, total, "Loaded bootstrap file");
            parts.push(format!("## {name}\n\n{content}"));
        }

        if parts.is_empty() {
            return String::new();
        }
        format!("# Workspace Context\n\n{}", parts.join("\n\n"))
    }

    fn tool_summary(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }

        let mut out = String::from("## Available Tools\n\nYou MUST use tools to perform actions.\n\n");
        for def in &self.tools {
            out.push_str(&format!("- **{}**: {}\n", def.name, def.description));
        }
        out
    }
}

impl ContextBuilder for WorkspaceContextBuilder {
    fn build_messages(&self, history: &[Message], summary: &str, user_text: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system_prompt(summary)));
        messages.extend_from_slice(history);
        messages.push(Message::user(user_text));
        messages
    }
}

fn read_text(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Keep at most `max` characters, marking the cut.
fn cap_chars(content: String, max: usize) -> String {
    match content.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{TRUNCATED_MARKER}", &content[..cut]),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> ToolDef {
        ToolDef {
            name: name.into(),
            description: format!("[{name}] does things"),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn messages_are_system_history_user() {
        let dir = tempfile::tempdir().unwrap();
        let builder = WorkspaceContextBuilder::new(dir.path());
        let history = vec![Message::user("earlier"), Message::assistant("reply")];

        let messages = builder.build_messages(&history, "", "now");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, tether_core::message::Role::System);
        assert_eq!(&messages[1..3], &history[..]);
        assert_eq!(messages[3], Message::user("now"));
    }

    #[test]
    fn prompt_sections_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "be kind").unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "agents here").unwrap();

        let builder = WorkspaceContextBuilder::new(dir.path()).with_tools(vec![tool("memo.add")]);
        let prompt = builder.system_prompt("we talked about rust");

        let identity = prompt.find("# tether").unwrap();
        let workspace = prompt.find("# Workspace Context").unwrap();
        let agents = prompt.find("## AGENTS.md\n\nagents here").unwrap();
        let soul = prompt.find("## SOUL.md\n\nbe kind").unwrap();
        let tools = prompt.find("- **memo.add**: [memo.add] does things").unwrap();
        let summary = prompt
            .find("## Previous Conversation Summary\n\nwe talked about rust")
            .unwrap();

        assert!(identity < workspace && workspace < agents && agents < soul);
        assert!(soul < tools && tools < summary);
        assert_eq!(prompt.matches(SECTION_SEPARATOR).count(), 3);
    }

    #[test]
    fn empty_sections_are_omitted() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = WorkspaceContextBuilder::new(dir.path()).system_prompt("");
        assert!(!prompt.contains("Workspace Context"));
        assert!(!prompt.contains("Available Tools"));
        assert!(!prompt.contains("Previous Conversation Summary"));
        assert!(!prompt.contains(SECTION_SEPARATOR));
    }

    #[test]
    fn per_file_cap_truncates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("USER.md"), "x".repeat(50)).unwrap();

        let prompt = WorkspaceContextBuilder::new(dir.path())
            .with_limits(10, 1000)
            .system_prompt("");
        assert!(prompt.contains(&format!("## USER.md\n\n{}{TRUNCATED_MARKER}", "x".repeat(10))));
    }

    #[test]
    fn total_cap_stops_later_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "a".repeat(30)).unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "s".repeat(30)).unwrap();
        std::fs::write(dir.path().join("USER.md"), "u".repeat(30)).unwrap();

        let prompt = WorkspaceContextBuilder::new(dir.path())
            .with_limits(100, 40)
            .system_prompt("");
        assert!(prompt.contains(&"a".repeat(30)));
        assert!(prompt.contains(&format!("## SOUL.md\n\n{}{TRUNCATED_MARKER}", "s".repeat(10))));
        assert!(!prompt.contains("USER.md"));
    }

    #[test]
    fn cap_is_char_safe() {
        assert_eq!(cap_chars("héllo".into(), 2), format!("hé{TRUNCATED_MARKER}"));
        assert_eq!(cap_chars("hi".into(), 2), "hi");
    }
}
