//! Session store trait: where a conversation's transcript lives between runs.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::message::Message;

/// Keyed, append-only transcript storage.
///
/// Implementations must tolerate concurrent use across distinct keys.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Messages stored for `key`, oldest first. Unknown keys yield an empty list.
    async fn history(&self, key: &str) -> Vec<Message>;

    /// The compaction summary for `key`, empty when none was set.
    async fn summary(&self, key: &str) -> String;

    /// Append one message to `key`, creating the session if needed.
    async fn add_message(&self, key: &str, message: Message);

    /// Persist `key`. Saving an unknown key is a no-op.
    async fn save(&self, key: &str) -> Result<(), SessionError>;
}
