//! Saved conversations, one JSON document per chat.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::core::config::io::project_dirs;
use crate::core::message::{MessageRecord, Role};

pub const UNTITLED_CHAT: &str = "New chat";
const TITLE_MAX_CHARS: usize = 40;

#[derive(Debug)]
pub enum SessionStoreError {
    NoDataDirectory,
    InvalidId(String),
    NotFound(String),
    Random(String),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStoreError::NoDataDirectory => {
                f.write_str("Could not determine a data directory for saved chats")
            }
            SessionStoreError::InvalidId(id) => write!(f, "Invalid chat id: {id}"),
            SessionStoreError::NotFound(id) => write!(f, "No saved chat with id {id}"),
            SessionStoreError::Random(err) => write!(f, "Could not generate a chat id: {err}"),
            SessionStoreError::Io { path, source } => {
                write!(f, "Chat store I/O error at {}: {source}", path.display())
            }
            SessionStoreError::Json { path, source } => {
                write!(f, "Malformed chat file {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SessionStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionStoreError::Io { source, .. } => Some(source),
            SessionStoreError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub model: String,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

impl ChatSession {
    pub fn new(model: &str) -> Result<Self, SessionStoreError> {
        let now = Utc::now();
        Ok(Self {
            id: generate_chat_id()?,
            title: UNTITLED_CHAT.to_string(),
            created_at: now,
            updated_at: now,
            model: model.to_string(),
            messages: Vec::new(),
        })
    }

    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }
}

/// Title derived from the first thing the user typed: whitespace collapsed,
/// cut at 40 characters.
pub fn title_from(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return UNTITLED_CHAT.to_string();
    }
    let mut chars = collapsed.chars();
    let title: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", title.trim_end())
    } else {
        title
    }
}

/// Sixteen lowercase hex digits from the OS random source.
pub fn generate_chat_id() -> Result<String, SessionStoreError> {
    let mut bytes = [0u8; 8];
    getrandom::fill(&mut bytes).map_err(|err| SessionStoreError::Random(err.to_string()))?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[derive(Debug, Clone)]
pub struct ChatSessionStore {
    dir: PathBuf,
}

impl ChatSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store under the platform data directory.
    pub fn open_default() -> Result<Self, SessionStoreError> {
        let dirs = project_dirs().map_err(|_| SessionStoreError::NoDataDirectory)?;
        Ok(Self::new(dirs.data_dir().join("chats")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, SessionStoreError> {
        if !is_valid_id(id) {
            return Err(SessionStoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Every readable chat, most recently updated first. Files that fail to
    /// parse are skipped.
    pub fn list(&self) -> Result<Vec<ChatSession>, SessionStoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionStoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_session(&path) {
                Ok(session) => sessions.push(session),
                Err(err) => warn!(error = %err, "skipping unreadable chat"),
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(sessions)
    }

    pub fn load(&self, id: &str) -> Result<ChatSession, SessionStoreError> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(SessionStoreError::NotFound(id.to_string()));
        }
        read_session(&path)
    }

    /// Writes through a temp file in the store directory.
    pub fn save(&self, session: &ChatSession) -> Result<(), SessionStoreError> {
        let path = self.path_for(&session.id)?;
        let io_err = |source| SessionStoreError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let json = serde_json::to_vec_pretty(session).map_err(|source| SessionStoreError::Json {
            path: path.clone(),
            source,
        })?;
        let mut temp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp.write_all(&json).map_err(io_err)?;
        temp.persist(&path).map_err(|err| io_err(err.error))?;
        debug!(id = %session.id, messages = session.messages.len(), "chat saved");
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), SessionStoreError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SessionStoreError::NotFound(id.to_string()))
            }
            Err(source) => Err(SessionStoreError::Io { path, source }),
        }
    }
}

fn read_session(path: &Path) -> Result<ChatSession, SessionStoreError> {
    let raw = fs::read_to_string(path).map_err(|source| SessionStoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SessionStoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}
