//! Capture sink trait: best-effort telemetry for each model call.

use async_trait::async_trait;

use crate::provider::ChatResponse;

/// What the loop knows about one model call when it reports it.
#[derive(Debug, Clone, Copy)]
pub struct CaptureEvent<'a> {
    pub provider: &'a str,
    pub session_key: &'a str,
    /// The user message that started the run
    pub intent: &'a str,
    /// 1-based iteration number within the run
    pub iteration: u32,
    pub response: &'a ChatResponse,
}

/// A recorder outside the control path. It has no way to report failure:
/// implementations swallow their own errors.
#[async_trait]
pub trait CaptureSink: Send + Sync {
    async fn record(&self, event: CaptureEvent<'_>);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCapture;

#[async_trait]
impl CaptureSink for NoopCapture {
    async fn record(&self, _event: CaptureEvent<'_>) {}
}
