//! Manifest registry and subprocess executor.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tether_core::error::ToolError;
use tether_core::message::ToolCall;
use tether_core::provider::ToolDef;
use tether_core::tool::ToolExecutor;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::argv::{build_command_args, placeholders, render_value};
use crate::manifest::ToolManifest;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MANIFEST_FILE: &str = "tool.json";

/// Tools keyed by name, each backed by an external binary.
pub struct ManifestRegistry {
    tools: BTreeMap<String, ToolManifest>,
    timeout: Duration,
}

/// A template placeholder that names no declared parameter. Such a token is
/// always dropped from the argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlaceholder {
    pub tool: String,
    pub command: String,
    pub placeholder: String,
}

impl fmt::Display for UnknownPlaceholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: placeholder {{{}}} is not a declared parameter",
            self.tool, self.command, self.placeholder
        )
    }
}

impl ManifestRegistry {
    /// A zero timeout selects the default.
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: BTreeMap::new(),
            timeout: if timeout.is_zero() {
                DEFAULT_TIMEOUT
            } else {
                timeout
            },
        }
    }

    /// Add a manifest, replacing any tool of the same name.
    pub fn register(&mut self, manifest: ToolManifest) {
        debug!(tool = %manifest.name, commands = manifest.commands.len(), "Registered tool");
        self.tools.insert(manifest.name.clone(), manifest);
    }

    /// Scan each directory's immediate subdirectories for `tool.json`.
    ///
    /// Missing directories, unreadable files, and malformed manifests are
    /// skipped. Returns the number of manifests registered.
    pub fn discover(&mut self, dirs: &[PathBuf]) -> usize {
        let mut found = 0;
        for dir in dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                debug!(dir = %dir.display(), "Tool directory not readable, skipping");
                continue;
            };

            let mut subdirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            subdirs.sort();

            for subdir in subdirs {
                if let Some(manifest) = Self::read_manifest(&subdir.join(MANIFEST_FILE)) {
                    self.register(manifest);
                    found += 1;
                }
            }
        }
        info!(found, total = self.tools.len(), "Tool discovery complete");
        found
    }

    fn read_manifest(path: &Path) -> Option<ToolManifest> {
        let text = std::fs::read_to_string(path).ok()?;
        match ToolManifest::from_json(&text) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping malformed tool manifest");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn manifests(&self) -> impl Iterator<Item = &ToolManifest> {
        self.tools.values()
    }

    /// Report template placeholders that match no declared parameter.
    pub fn validate(&self) -> Vec<UnknownPlaceholder> {
        let mut issues = Vec::new();
        for tool in self.tools.values() {
            for (cmd_name, cmd) in &tool.commands {
                let Some(template) = cmd.template() else {
                    continue;
                };
                for name in placeholders(template) {
                    if !cmd.parameters.contains_key(name) {
                        issues.push(UnknownPlaceholder {
                            tool: tool.name.clone(),
                            command: cmd_name.clone(),
                            placeholder: name.to_string(),
                        });
                    }
                }
            }
        }
        issues
    }

    fn parse_arguments(raw: &str) -> Result<Map<String, Value>, ToolError> {
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(Value::Null) => Ok(Map::new()),
            Ok(other) => Err(ToolError::InvalidArguments(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(e) => Err(ToolError::InvalidArguments(e.to_string())),
        }
    }
}

impl Default for ManifestRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl ToolExecutor for ManifestRegistry {
    fn definitions(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self.tools.values().flat_map(|t| t.tool_defs()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let (tool_name, cmd_name) = call
            .name
            .split_once('.')
            .ok_or_else(|| ToolError::InvalidName(call.name.clone()))?;

        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let cmd = tool
            .commands
            .get(cmd_name)
            .ok_or_else(|| ToolError::UnknownCommand {
                tool: tool_name.to_string(),
                command: cmd_name.to_string(),
            })?;

        let args = Self::parse_arguments(&call.arguments)?;
        let argv = build_command_args(cmd, &args, cmd_name);
        let stdin_text = cmd
            .stdin_param()
            .and_then(|param| args.get(param))
            .map(render_value);

        debug!(
            tool = tool_name,
            command = cmd_name,
            binary = %tool.binary,
            argc = argv.len(),
            stdin = stdin_text.is_some(),
            "Executing tool"
        );

        let mut child = Command::new(&tool.binary)
            .args(&argv)
            .stdin(if stdin_text.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Spawn {
                tool: tool_name.to_string(),
                command: cmd_name.to_string(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take();
        let feed_stdin = async move {
            if let (Some(text), Some(mut stdin)) = (stdin_text, stdin) {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    debug!(error = %e, "Tool closed stdin early");
                }
            }
        };
        // The write and the wait run together so a child that never reads
        // stdin still gets waited on; dropping both on timeout or
        // cancellation kills the process
        let run = async {
            let ((), output) = tokio::join!(feed_stdin, child.wait_with_output());
            output
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result.map_err(|e| ToolError::Failed {
                tool: tool_name.to_string(),
                command: cmd_name.to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                warn!(tool = tool_name, command = cmd_name, "Tool timed out");
                return Err(ToolError::Timeout {
                    tool: tool_name.to_string(),
                    command: cmd_name.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr.into_owned()
            };
            warn!(tool = tool_name, command = cmd_name, status = %output.status, "Tool failed");
            return Err(ToolError::Failed {
                tool: tool_name.to_string(),
                command: cmd_name.to_string(),
                reason,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
