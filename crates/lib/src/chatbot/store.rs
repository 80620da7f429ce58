//! Chatbot store: records persisted as a JSON array and reloaded when the file changes.

use super::record::{ChatbotRecord, ChatbotUpdate};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chatbot store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("chatbot store is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("chatbot not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
}

/// Read-only lookup the chat proxy depends on. `Ok(None)` means the id is unknown.
#[async_trait]
pub trait ChatbotResolver: Send + Sync {
    async fn resolve(&self, chatbot_id: &str) -> Result<Option<ChatbotRecord>, StoreError>;
}

/// Size and mtime of the store file when it was last read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

struct Snapshot {
    entries: Vec<ChatbotRecord>,
    stamp: Option<FileStamp>,
}

/// Records in insertion order; saved to `path` after every write when a path is set.
///
/// Other processes (the CLI) edit the same file, so lookups re-read it whenever its size or
/// mtime differs from the last read.
pub struct ChatbotStore {
    path: Option<PathBuf>,
    state: RwLock<Snapshot>,
}

impl ChatbotStore {
    /// Load store from path; a missing file starts empty. An unreadable or invalid file is an
    /// error so a later save cannot overwrite records that failed to parse.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = read_snapshot(&path).await?;
        if snapshot.stamp.is_none() {
            log::debug!("chatbot store not found, starting empty: {}", path.display());
        }
        Ok(Self {
            path: Some(path),
            state: RwLock::new(snapshot),
        })
    }

    /// Store that is never written to disk.
    pub fn in_memory(entries: Vec<ChatbotRecord>) -> Self {
        Self {
            path: None,
            state: RwLock::new(Snapshot {
                entries,
                stamp: None,
            }),
        }
    }

    /// Re-read the file if it changed since the last read or write. Returns whether it did.
    pub async fn reload_if_changed(&self) -> Result<bool, StoreError> {
        let Some(ref path) = self.path else {
            return Ok(false);
        };
        let current = file_stamp(path).await?;
        if self.state.read().await.stamp == current {
            return Ok(false);
        }
        let mut state = self.state.write().await;
        self.refresh(&mut state).await
    }

    async fn refresh(&self, state: &mut Snapshot) -> Result<bool, StoreError> {
        let Some(ref path) = self.path else {
            return Ok(false);
        };
        if file_stamp(path).await? == state.stamp {
            return Ok(false);
        }
        *state = read_snapshot(path).await?;
        log::debug!(
            "reloaded {} chatbot(s) from {}",
            state.entries.len(),
            path.display()
        );
        Ok(true)
    }

    /// Persist `entries`, then make them current. Memory is untouched when the write fails.
    async fn commit(
        &self,
        state: &mut Snapshot,
        entries: Vec<ChatbotRecord>,
    ) -> Result<(), StoreError> {
        if let Some(ref path) = self.path {
            state.stamp = write_entries(path, &entries).await?;
        }
        state.entries = entries;
        Ok(())
    }

    pub async fn get(&self, chatbot_id: &str) -> Option<ChatbotRecord> {
        let state = self.state.read().await;
        state.entries.iter().find(|e| e.id == chatbot_id).cloned()
    }

    pub async fn list(&self) -> Vec<ChatbotRecord> {
        self.state.read().await.entries.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Create a chatbot with default settings, apply `settings`, and persist it.
    pub async fn create(
        &self,
        name: &str,
        settings: ChatbotUpdate,
    ) -> Result<ChatbotRecord, StoreError> {
        let mut record = ChatbotRecord::new(name);
        record.apply(settings)?;
        let mut state = self.state.write().await;
        self.refresh(&mut state).await?;
        let mut entries = state.entries.clone();
        entries.push(record.clone());
        self.commit(&mut state, entries).await?;
        Ok(record)
    }

    /// Apply a partial update to an existing chatbot and persist it.
    pub async fn update(
        &self,
        chatbot_id: &str,
        update: ChatbotUpdate,
    ) -> Result<ChatbotRecord, StoreError> {
        let mut state = self.state.write().await;
        self.refresh(&mut state).await?;
        let mut entries = state.entries.clone();
        let record = entries
            .iter_mut()
            .find(|e| e.id == chatbot_id)
            .ok_or_else(|| StoreError::NotFound(chatbot_id.to_string()))?;
        record.apply(update)?;
        let updated = record.clone();
        self.commit(&mut state, entries).await?;
        Ok(updated)
    }

    /// Remove a chatbot and persist. Returns the removed record.
    pub async fn remove(&self, chatbot_id: &str) -> Result<ChatbotRecord, StoreError> {
        let mut state = self.state.write().await;
        self.refresh(&mut state).await?;
        let mut entries = state.entries.clone();
        let idx = entries
            .iter()
            .position(|e| e.id == chatbot_id)
            .ok_or_else(|| StoreError::NotFound(chatbot_id.to_string()))?;
        let removed = entries.remove(idx);
        self.commit(&mut state, entries).await?;
        Ok(removed)
    }
}

#[async_trait]
impl ChatbotResolver for ChatbotStore {
    async fn resolve(&self, chatbot_id: &str) -> Result<Option<ChatbotRecord>, StoreError> {
        self.reload_if_changed().await?;
        Ok(self.get(chatbot_id.trim()).await)
    }
}

async fn file_stamp(path: &Path) -> Result<Option<FileStamp>, StoreError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(FileStamp {
            modified: meta.modified()?,
            len: meta.len(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The stamp is taken before the read, so a write racing the read triggers another reload.
async fn read_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
    let stamp = file_stamp(path).await?;
    let entries = match tokio::fs::read_to_string(path).await {
        Ok(s) if s.trim().is_empty() => Vec::new(),
        Ok(s) => serde_json::from_str(&s)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    Ok(Snapshot { entries, stamp })
}

/// Write through a sibling temp file and rename, so readers never see a partial array.
async fn write_entries(
    path: &Path,
    entries: &[ChatbotRecord],
) -> Result<Option<FileStamp>, StoreError> {
    let json = serde_json::to_string_pretty(entries)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    file_stamp(path).await
}
