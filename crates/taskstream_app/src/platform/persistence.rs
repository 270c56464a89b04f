use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stream_logging::{stream_debug, stream_info};
use taskstream_core::Conversation;
use taskstream_engine::{AtomicFileWriter, ConversationStore, PersistError};

const STATE_FILENAME: &str = "conversations.ron";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    conversations: Vec<Conversation>,
}

/// Conversation list kept as one RON file in the state directory.
#[derive(Debug, Clone)]
pub(crate) struct FileConversationStore {
    writer: AtomicFileWriter,
}

impl FileConversationStore {
    pub(crate) fn new(state_dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(state_dir),
        }
    }

    pub(crate) fn path(&self) -> PathBuf {
        self.writer.dir().join(STATE_FILENAME)
    }
}

impl ConversationStore for FileConversationStore {
    fn load(&self) -> Result<Vec<Conversation>, PersistError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                stream_debug!("No saved conversations at {:?}", path);
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let state: PersistedState =
            ron::from_str(&content).map_err(|err| PersistError::Decode(err.to_string()))?;
        stream_info!(
            "Loaded {} conversations from {:?}",
            state.conversations.len(),
            path
        );
        Ok(state.conversations)
    }

    fn save(&self, conversations: &[Conversation]) -> Result<(), PersistError> {
        let state = PersistedState {
            conversations: conversations.to_vec(),
        };
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(&state, pretty)
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        self.writer.write(STATE_FILENAME, &content)?;
        stream_debug!(
            "Saved {} conversations to {:?}",
            conversations.len(),
            self.writer.dir()
        );
        Ok(())
    }
}

/// Resolves a possibly relative state dir against `base`.
pub(crate) fn resolve_state_dir(base: &Path, state_dir: &Path) -> PathBuf {
    if state_dir.is_absolute() {
        state_dir.to_path_buf()
    } else {
        base.join(state_dir)
    }
}
