use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use taskstream_core::Conversation;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode conversations: {0}")]
    Encode(String),
    #[error("could not decode conversations: {0}")]
    Decode(String),
}

/// Where the conversation list lives between runs.
///
/// Read once at startup and rewritten in full on every change.
pub trait ConversationStore: Send + Sync {
    fn load(&self) -> Result<Vec<Conversation>, PersistError>;
    fn save(&self, conversations: &[Conversation]) -> Result<(), PersistError>;
}

/// Store that keeps the last saved list in memory.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    saved: Mutex<Vec<Conversation>>,
}

impl MemoryConversationStore {
    pub fn with_conversations(conversations: Vec<Conversation>) -> Self {
        Self {
            saved: Mutex::new(conversations),
        }
    }

    pub fn snapshot(&self) -> Vec<Conversation> {
        self.saved
            .lock()
            .map(|saved| saved.clone())
            .unwrap_or_default()
    }
}

impl ConversationStore for MemoryConversationStore {
    fn load(&self) -> Result<Vec<Conversation>, PersistError> {
        Ok(self.snapshot())
    }

    fn save(&self, conversations: &[Conversation]) -> Result<(), PersistError> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|err| PersistError::StateDir(err.to_string()))?;
        *saved = conversations.to_vec();
        Ok(())
    }
}

/// Ensure the state directory exists; create if missing.
pub fn ensure_state_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StateDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StateDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_state_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // Readers see either the previous list or the new one, never a mix.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
