//! Persistence for client-side chat state.
//!
//! Keys follow the storefront's browser storage layout: the current session
//! id lives under `ai_session_id` and each session's messages under
//! `ai_chat_<session>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use super::conversation::ChatMessage;

pub const SESSION_KEY: &str = "ai_session_id";

pub fn messages_key(session_id: &str) -> String {
    format!("ai_chat_{session_id}")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored chat data is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    async fn session_id(&self) -> Result<Option<String>, StoreError>;
    async fn set_session_id(&self, session_id: &str) -> Result<(), StoreError>;
    async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError>;
    async fn save_messages(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), StoreError>;
    async fn clear(&self, session_id: &str) -> Result<(), StoreError>;
}

type Entries = BTreeMap<String, Value>;

fn read_session(entries: &Entries) -> Option<String> {
    entries
        .get(SESSION_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn read_messages(entries: &Entries, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
    match entries.get(&messages_key(session_id)) {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => Ok(Vec::new()),
    }
}

/// In-process store, useful for short-lived clients.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryStore {
    async fn session_id(&self) -> Result<Option<String>, StoreError> {
        Ok(read_session(&*self.entries.lock().await))
    }

    async fn set_session_id(&self, session_id: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(SESSION_KEY.to_string(), Value::String(session_id.to_string()));
        Ok(())
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        read_messages(&*self.entries.lock().await, session_id)
    }

    async fn save_messages(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(messages)?;
        self.entries
            .lock()
            .await
            .insert(messages_key(session_id), value);
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(&messages_key(session_id));
        Ok(())
    }
}

/// Store backed by a single JSON object on disk. Writes go through a
/// temporary file and a rename so a crash never leaves a truncated file.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Entries::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Entries) + Send,
    {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        apply(&mut entries);
        self.write(&entries).await
    }
}

#[async_trait::async_trait]
impl ConversationStore for JsonFileStore {
    async fn session_id(&self) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(read_session(&self.load().await?))
    }

    async fn set_session_id(&self, session_id: &str) -> Result<(), StoreError> {
        let value = Value::String(session_id.to_string());
        self.update(move |entries| {
            entries.insert(SESSION_KEY.to_string(), value);
        })
        .await
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let _guard = self.lock.lock().await;
        read_messages(&self.load().await?, session_id)
    }

    async fn save_messages(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), StoreError> {
        let key = messages_key(session_id);
        let value = serde_json::to_value(messages)?;
        self.update(move |entries| {
            entries.insert(key, value);
        })
        .await
    }

    async fn clear(&self, session_id: &str) -> Result<(), StoreError> {
        let key = messages_key(session_id);
        self.update(move |entries| {
            entries.remove(&key);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::chat::ChatRole;

    fn message(role: ChatRole, content: &str) -> ChatMessage {
        ChatMessage::new(role, content)
    }

    #[tokio::test]
    async fn file_store_round_trips_sessions_and_messages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chat").join("state.json");
        let store = JsonFileStore::new(&path);

        assert_eq!(store.session_id().await.expect("read"), None);
        store.set_session_id("ses_one").await.expect("write session");
        store
            .save_messages(
                "ses_one",
                &[message(ChatRole::User, "مرحبا"), message(ChatRole::Assistant, "أهلاً")],
            )
            .await
            .expect("write messages");

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.session_id().await.expect("read").as_deref(),
            Some("ses_one")
        );
        let messages = reopened.messages("ses_one").await.expect("read messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "أهلاً");
        assert!(reopened.messages("ses_other").await.expect("read").is_empty());

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("file")).expect("json");
        assert_eq!(raw["ai_session_id"], "ses_one");
        assert!(raw["ai_chat_ses_one"].is_array());
    }

    #[tokio::test]
    async fn clear_only_drops_that_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("state.json"));
        store
            .save_messages("ses_a", &[message(ChatRole::User, "a")])
            .await
            .expect("save a");
        store
            .save_messages("ses_b", &[message(ChatRole::User, "b")])
            .await
            .expect("save b");

        store.clear("ses_a").await.expect("clear");
        assert!(store.messages("ses_a").await.expect("read").is_empty());
        assert_eq!(store.messages("ses_b").await.expect("read").len(), 1);
    }

    #[tokio::test]
    async fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").expect("seed");
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.session_id().await, Err(StoreError::Json(_))));
    }

    #[tokio::test]
    async fn memory_store_keeps_sessions_apart() {
        let store = MemoryStore::new();
        store.set_session_id("ses_x").await.expect("set");
        store
            .save_messages("ses_x", &[message(ChatRole::User, "hi")])
            .await
            .expect("save");
        assert_eq!(store.session_id().await.expect("get").as_deref(), Some("ses_x"));
        assert_eq!(store.messages("ses_x").await.expect("get").len(), 1);
        store.clear("ses_x").await.expect("clear");
        assert!(store.messages("ses_x").await.expect("get").is_empty());
    }
}
