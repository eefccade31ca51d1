//! File-backed session store: one pretty-printed JSON document per key.
//!
//! Every session file is loaded into memory on open. `save` snapshots one
//! session and writes it through a temp file in the same directory, then
//! renames it into place, so a crash never leaves a half-written file.
//!
//! Storage location: `~/.tether/sessions/<key>.json`

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tether_core::error::SessionError;
use tether_core::message::Message;
use tether_core::session::SessionStore;
use tracing::{debug, warn};

use crate::in_memory::{InMemorySessionStore, SessionRecord};

pub struct FileSessionStore {
    dir: PathBuf,
    index: InMemorySessionStore,
}

impl FileSessionStore {
    /// Open (creating if needed) a session directory and load every
    /// readable `*.json` file in it.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "Could not create session directory");
        }
        let records = Self::load_all(&dir);
        debug!(dir = %dir.display(), sessions = records.len(), "Session store loaded");
        Self {
            dir,
            index: InMemorySessionStore::from_records(records),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_all(dir: &Path) -> Vec<SessionRecord> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };

        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| {
                let text = std::fs::read_to_string(&path).ok()?;
                match serde_json::from_str::<SessionRecord>(&text) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping corrupted session file");
                        None
                    }
                }
            })
            .collect()
    }

    /// Path a key is stored under.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }

    pub async fn set_summary(&self, key: &str, summary: impl Into<String>, keep_last: usize) {
        self.index.set_summary(key, summary, keep_last).await;
    }

    pub async fn message_count(&self, key: &str) -> usize {
        self.index.message_count(key).await
    }

    pub async fn keys(&self) -> Vec<String> {
        self.index.keys().await
    }
}

/// `:` and path separators cannot appear in a file name.
fn file_stem(key: &str) -> String {
    key.replace([':', '/', '\\'], "_")
}

fn write_atomic(dir: &Path, target: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix("session-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn history(&self, key: &str) -> Vec<Message> {
        self.index.history(key).await
    }

    async fn summary(&self, key: &str) -> String {
        self.index.summary(key).await
    }

    async fn add_message(&self, key: &str, message: Message) {
        self.index.add_message(key, message).await;
    }

    async fn save(&self, key: &str) -> Result<(), SessionError> {
        let Some(snapshot) = self.index.snapshot(key).await else {
            return Ok(());
        };

        let data = serde_json::to_vec_pretty(&snapshot).map_err(|e| SessionError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let dir = self.dir.clone();
        let target = self.path_for(key);
        let io_err = |reason: String| SessionError::Io {
            key: key.to_string(),
            reason,
        };

        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &data))
            .await
            .map_err(|e| io_err(e.to_string()))?
            .map_err(|e| io_err(e.to_string()))?;

        debug!(key, messages = snapshot.messages.len(), "Session saved");
        Ok(())
    }
}
