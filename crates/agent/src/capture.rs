//! Capture sink that reports each model call to an external recorder binary.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tether_core::capture::{CaptureEvent, CaptureSink};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_CAPTURE_BINARY: &str = "token-eval";

const INTENT_MAX_CHARS: usize = 50;
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `<binary> record --provider .. --prompt-tokens .. --completion-tokens
/// .. --intent ..` once per model call, with a small JSON document on stdin.
///
/// A missing binary or a failing recorder is logged at debug level and
/// otherwise ignored.
pub struct CommandCapture {
    binary: String,
    timeout: Duration,
}

impl CommandCapture {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: CAPTURE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(event: &CaptureEvent<'_>) -> Vec<String> {
        vec![
            "record".into(),
            "--provider".into(),
            event.provider.into(),
            "--prompt-tokens".into(),
            event.response.usage.prompt_tokens.to_string(),
            "--completion-tokens".into(),
            event.response.usage.completion_tokens.to_string(),
            "--intent".into(),
            format!(
                "orchestrator:{}:iter{}",
                truncate(event.intent, INTENT_MAX_CHARS),
                event.iteration
            ),
        ]
    }

    async fn try_record(&self, event: &CaptureEvent<'_>) -> std::io::Result<()> {
        let mut child = Command::new(&self.binary)
            .args(Self::args(event))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let input = serde_json::json!({
            "session": event.session_key,
            "iteration": event.iteration,
        });
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.to_string().as_bytes()).await?;
        }

        let status = tokio::time::timeout(self.timeout, child.wait())
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "recorder timed out"))??;

        if !status.success() {
            return Err(std::io::Error::other(format!("recorder exited with {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CaptureSink for CommandCapture {
    async fn record(&self, event: CaptureEvent<'_>) {
        if self.binary.is_empty() {
            return;
        }
        match self.try_record(&event).await {
            Ok(()) => debug!(binary = %self.binary, iteration = event.iteration, "Call captured"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(binary = %self.binary, "Capture binary not installed")
            }
            Err(e) => debug!(binary = %self.binary, error = %e, "Capture failed"),
        }
    }
}

/// First `max` characters of `s`, with `...` appended when cut.
fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::provider::{ChatResponse, Usage};

    fn response() -> ChatResponse {
        ChatResponse {
            usage: Usage {
                prompt_tokens: 120,
                completion_tokens: 30,
            },
            ..ChatResponse::default()
        }
    }

    #[test]
    fn args_carry_usage_and_intent() {
        let resp = response();
        let event = CaptureEvent {
            provider: "anthropic",
            session_key: "main",
            intent: "summarize my notes",
            iteration: 2,
            response: &resp,
        };
        assert_eq!(
            CommandCapture::args(&event),
            vec![
                "record",
                "--provider",
                "anthropic",
                "--prompt-tokens",
                "120",
                "--completion-tokens",
                "30",
                "--intent",
                "orchestrator:summarize my notes:iter2",
            ]
        );
    }

    #[test]
    fn long_intent_is_truncated() {
        let long = "x".repeat(80);
        assert_eq!(truncate(&long, 50), format!("{}...", "x".repeat(50)));
        assert_eq!(truncate("short", 50), "short");
    }

    #[tokio::test]
    async fn missing_binary_is_swallowed() {
        let resp = response();
        let sink = CommandCapture::new("/nonexistent/token-eval");
        sink.record(CaptureEvent {
            provider: "openai",
            session_key: "main",
            intent: "hi",
            iteration: 1,
            response: &resp,
        })
        .await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn recorder_receives_args_and_stdin() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("captured");
        let bin = dir.path().join("recorder");
        std::fs::write(
            &bin,
            format!("#!/bin/sh\necho \"$*\" > {0}\ncat >> {0}\n", out.display()),
        )
        .unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resp = response();
        CommandCapture::new(bin.display().to_string())
            .record(CaptureEvent {
                provider: "openai",
                session_key: "cli:main",
                intent: "hi",
                iteration: 3,
                response: &resp,
            })
            .await;

        let captured = std::fs::read_to_string(&out).unwrap();
        let mut lines = captured.lines();
        assert_eq!(
            lines.next(),
            Some("record --provider openai --prompt-tokens 120 --completion-tokens 30 --intent orchestrator:hi:iter3")
        );
        let stdin: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(stdin, serde_json::json!({"session": "cli:main", "iteration": 3}));
    }
}
