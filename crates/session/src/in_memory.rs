//! In-memory session store. Also serves as the index behind the file store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tether_core::error::SessionError;
use tether_core::message::{Message, Role};
use tether_core::session::SessionStore;
use tokio::sync::RwLock;

/// One conversation's persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub key: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            messages: Vec::new(),
            summary: String::new(),
            created: now,
            updated: now,
        }
    }
}

/// Sessions that live only as long as the process.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: impl IntoIterator<Item = SessionRecord>) -> Self {
        Self {
            sessions: RwLock::new(records.into_iter().map(|r| (r.key.clone(), r)).collect()),
        }
    }

    /// Replace the summary and keep only the newest `keep_last` messages.
    /// `keep_last == 0` keeps everything.
    ///
    /// The kept window never starts on a tool result: results whose call
    /// would be cut off are dropped with it, so fewer than `keep_last`
    /// messages may remain.
    pub async fn set_summary(&self, key: &str, summary: impl Into<String>, keep_last: usize) {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .entry(key.to_string())
            .or_insert_with(|| SessionRecord::new(key));
        record.summary = summary.into();
        if keep_last > 0 && record.messages.len() > keep_last {
            let mut drop = record.messages.len() - keep_last;
            while record.messages.get(drop).is_some_and(|m| m.role == Role::Tool) {
                drop += 1;
            }
            record.messages.drain(..drop);
        }
        record.updated = Utc::now();
    }

    pub async fn message_count(&self, key: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(key)
            .map_or(0, |r| r.messages.len())
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copy of the record for `key`, taken under the read lock.
    pub async fn snapshot(&self, key: &str) -> Option<SessionRecord> {
        self.sessions.read().await.get(key).cloned()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn history(&self, key: &str) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(key)
            .map(|r| r.messages.clone())
            .unwrap_or_default()
    }

    async fn summary(&self, key: &str) -> String {
        self.sessions
            .read()
            .await
            .get(key)
            .map(|r| r.summary.clone())
            .unwrap_or_default()
    }

    async fn add_message(&self, key: &str, message: Message) {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .entry(key.to_string())
            .or_insert_with(|| SessionRecord::new(key));
        record.messages.push(message);
        record.updated = Utc::now();
    }

    async fn save(&self, _key: &str) -> Result<(), SessionError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::message::ToolCall;

    #[tokio::test]
    async fn unknown_key_is_empty() {
        let store = InMemorySessionStore::new();
        assert!(store.history("nope").await.is_empty());
        assert_eq!(store.summary("nope").await, "");
        assert_eq!(store.message_count("nope").await, 0);
        assert!(store.save("nope").await.is_ok());
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let store = InMemorySessionStore::new();
        store.add_message("s", Message::user("one")).await;
        store.add_message("s", Message::assistant("two")).await;
        store.add_message("other", Message::user("x")).await;

        let history = store.history("s").await;
        assert_eq!(history, vec![Message::user("one"), Message::assistant("two")]);
        assert_eq!(store.keys().await, vec!["other", "s"]);
    }

    #[tokio::test]
    async fn history_is_a_copy() {
        let store = InMemorySessionStore::new();
        store.add_message("s", Message::user("one")).await;
        let mut history = store.history("s").await;
        history.push(Message::user("local only"));
        assert_eq!(store.message_count("s").await, 1);
    }

    #[tokio::test]
    async fn set_summary_truncates_to_newest() {
        let store = InMemorySessionStore::new();
        for i in 0..5 {
            store.add_message("s", Message::user(format!("m{i}"))).await;
        }

        store.set_summary("s", "earlier talk", 2).await;
        assert_eq!(store.summary("s").await, "earlier talk");
        assert_eq!(
            store.history("s").await,
            vec![Message::user("m3"), Message::user("m4")]
        );

        store.set_summary("s", "again", 0).await;
        assert_eq!(store.message_count("s").await, 2);
    }

    #[tokio::test]
    async fn set_summary_never_keeps_a_split_tool_turn() {
        let store = InMemorySessionStore::new();
        store.add_message("s", Message::user("hi")).await;
        store
            .add_message(
                "s",
                Message::assistant_with_tool_calls("", vec![ToolCall::new("a", "memo.add", "{}")]),
            )
            .await;
        store.add_message("s", Message::tool_result("a", "ok")).await;
        store.add_message("s", Message::assistant("done")).await;

        store.set_summary("s", "sum", 2).await;
        assert_eq!(store.history("s").await, vec![Message::assistant("done")]);
    }
}
