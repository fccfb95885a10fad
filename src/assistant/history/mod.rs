#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::Result;
use crate::generation::{ChatMessage, Role};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded conversation of one user, persisted as a JSON array.
///
/// Once `max_length` entries are stored the oldest ones are dropped first.
#[derive(Debug)]
pub struct ChatHistory {
    path: PathBuf,
    max_length: usize,
    entries: VecDeque<HistoryEntry>,
}

impl ChatHistory {
    /// Empty history that will be saved to `path`
    #[inline]
    pub fn new(path: PathBuf, max_length: usize) -> Self {
        Self {
            path,
            max_length: max_length.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Load the history stored at `path`.
    ///
    /// A missing file gives an empty history; an unreadable or corrupt file
    /// is logged and replaced by an empty history on the next save.
    #[inline]
    pub fn load(path: PathBuf, max_length: usize) -> Self {
        let mut history = Self::new(path, max_length);

        let content = match fs::read_to_string(&history.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return history,
            Err(e) => {
                warn!(
                    "Failed to read chat history {}: {}; starting fresh",
                    history.path.display(),
                    e
                );
                return history;
            }
        };

        match serde_json::from_str::<Vec<HistoryEntry>>(&content) {
            Ok(entries) => {
                for entry in entries {
                    history.push_entry(entry);
                }
                debug!(
                    "Loaded {} history entries from {}",
                    history.len(),
                    history.path.display()
                );
            }
            Err(e) => warn!(
                "Corrupt chat history {}: {}; starting fresh",
                history.path.display(),
                e
            ),
        }

        history
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    #[inline]
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.push_entry(HistoryEntry {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_length {
            self.entries.pop_front();
        }
    }

    /// Stored turns as chat messages, oldest first
    #[inline]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.entries
            .iter()
            .map(|entry| ChatMessage {
                role: entry.role,
                content: entry.content.clone(),
            })
            .collect()
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries: Vec<&HistoryEntry> = self.entries.iter().collect();
        let content = serde_json::to_string_pretty(&entries)
            .map_err(|e| anyhow::anyhow!("Failed to serialize chat history: {}", e))?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Forget every turn and remove the stored file
    #[inline]
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// File name for a user id.
///
/// Lowercase ASCII letters, digits, `-` and `_` are kept; every other byte is
/// written as `%XX` with uppercase hex. Distinct ids always get distinct
/// names, also on case-insensitive filesystems. The empty id maps to
/// `%.json`, which no other id produces.
#[inline]
pub fn history_file_name(user_id: &str) -> String {
    let mut name = String::with_capacity(user_id.len() + 5);
    for byte in user_id.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' || byte == b'_' {
            name.push(char::from(byte));
        } else {
            name.push('%');
            name.push(char::from(HEX_DIGITS[usize::from(byte >> 4)]));
            name.push(char::from(HEX_DIGITS[usize::from(byte & 0x0f)]));
        }
    }
    if name.is_empty() {
        name.push('%');
    }
    name.push_str(".json");
    name
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Cached histories above which idle ones are dropped
const DEFAULT_MAX_CACHED: usize = 1024;

/// Hands out one lock-guarded history per user.
///
/// Holding a user's lock for a whole request serializes concurrent messages
/// from that user; different users never wait on each other. Once more than
/// `max_cached` histories are cached, the ones nobody holds are dropped; they
/// are reloaded from disk on the next request.
#[derive(Debug)]
pub struct HistoryRegistry {
    directory: PathBuf,
    max_length: usize,
    max_cached: usize,
    histories: std::sync::Mutex<HashMap<String, Arc<Mutex<ChatHistory>>>>,
}

impl HistoryRegistry {
    #[inline]
    pub fn new(directory: PathBuf, max_length: usize) -> Self {
        Self {
            directory,
            max_length,
            max_cached: DEFAULT_MAX_CACHED,
            histories: std::sync::Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn with_max_cached(mut self, max_cached: usize) -> Self {
        self.max_cached = max_cached.max(1);
        self
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of histories currently held in memory
    #[inline]
    pub fn cached(&self) -> usize {
        self.histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// History of `user_id`, loaded from disk on first use
    #[inline]
    pub fn get(&self, user_id: &str) -> Arc<Mutex<ChatHistory>> {
        let mut histories = self
            .histories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !histories.contains_key(user_id) && histories.len() >= self.max_cached {
            let before = histories.len();
            histories.retain(|_, history| Arc::strong_count(history) > 1);
            debug!("Dropped {} idle chat histories", before - histories.len());
        }

        Arc::clone(histories.entry(user_id.to_string()).or_insert_with(|| {
            let path = self.directory.join(history_file_name(user_id));
            Arc::new(Mutex::new(ChatHistory::load(path, self.max_length)))
        }))
    }
}
