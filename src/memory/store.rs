//! File-backed conversation memory
//!
//! Layout under the base directory:
//!
//! ```text
//! conversations/user_{u}_session_{s}.jsonl            one entry per line, append-only
//! summaries/user_{u}_session_{s}_summary_{id}.json    one pretty JSON document
//! ```
//!
//! Ids are escaped with [`storage_key`] so that distinct `(user, session)`
//! pairs never share a file.

use crate::memory::embedding::EmbeddingService;
use crate::memory::index::VectorIndex;
use crate::memory::types::{ConversationEntry, Neighbor, Role, SummaryRecord};
use crate::{ChronosError, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Longest key [`storage_key`] produces
pub const MAX_KEY_LEN: usize = 64;

/// Hex digits of the digest suffix on shortened keys
const DIGEST_HEX_LEN: usize = 32;

/// Escape an id for use inside a file name.
///
/// ASCII letters, digits and `-` pass through; every other byte becomes
/// `_XX` (upper-case hex). Since `_` itself is escaped, the mapping is
/// injective and `user_{a}_session_{b}` cannot collide across pairs.
///
/// Escaped keys longer than [`MAX_KEY_LEN`] are cut to a prefix followed by
/// `.` and a SHA-256 digest of the raw id. `.` never survives escaping, so a
/// shortened key cannot equal an unshortened one.
pub fn storage_key(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02X}", byte));
        }
    }

    if out.len() <= MAX_KEY_LEN {
        return out;
    }

    let digest = Sha256::digest(id.as_bytes());
    let keep = MAX_KEY_LEN - DIGEST_HEX_LEN - 1;
    // `out` is ASCII, so any byte offset is a char boundary
    format!("{}.{}", &out[..keep], hex::encode(&digest[..DIGEST_HEX_LEN / 2]))
}

/// Vector index datapoint id for a conversation entry
pub fn datapoint_id(user_id: &str, session_id: &str, entry_id: &str) -> String {
    format!(
        "user_{}_session_{}_entry_{}",
        storage_key(user_id),
        storage_key(session_id),
        storage_key(entry_id)
    )
}

/// Conversation and summary persistence with embedding-backed search
pub struct MemoryStore {
    base_dir: PathBuf,
    conversations_dir: PathBuf,
    summaries_dir: PathBuf,
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    append_lock: Mutex<()>,
}

impl MemoryStore {
    /// Open (creating if needed) a store rooted at `base_dir`
    pub async fn open(
        base_dir: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let base_dir = base_dir.into();
        let conversations_dir = base_dir.join("conversations");
        let summaries_dir = base_dir.join("summaries");

        fs::create_dir_all(&conversations_dir).await?;
        fs::create_dir_all(&summaries_dir).await?;

        info!("Memory store opened at {:?}", base_dir);
        Ok(Self {
            base_dir,
            conversations_dir,
            summaries_dir,
            embedder,
            index,
            append_lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn conversation_path(&self, user_id: &str, session_id: &str) -> PathBuf {
        self.conversations_dir.join(format!(
            "user_{}_session_{}.jsonl",
            storage_key(user_id),
            storage_key(session_id)
        ))
    }

    pub fn summary_path(&self, user_id: &str, session_id: &str, summary_id: &str) -> PathBuf {
        self.summaries_dir.join(format!(
            "user_{}_session_{}_summary_{}.json",
            storage_key(user_id),
            storage_key(session_id),
            storage_key(summary_id)
        ))
    }

    /// Embed `content`, append it to the session log and index it.
    ///
    /// The log line is written before the index is updated, so an index
    /// failure leaves the entry on disk and is reported as an error.
    pub async fn save_conversation_entry(
        &self,
        user_id: &str,
        session_id: &str,
        entry_id: &str,
        content: &str,
        role: Role,
    ) -> Result<ConversationEntry> {
        let content_vector = self.embedder.embed(content).await?;

        let entry = ConversationEntry {
            id: entry_id.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            content: content.to_string(),
            content_vector,
            role,
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let path = self.conversation_path(user_id, session_id);
        {
            let _guard = self.append_lock.lock().await;
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }

        let datapoint = datapoint_id(user_id, session_id, entry_id);
        self.index.upsert(&datapoint, &entry.content_vector).await?;

        debug!(datapoint = %datapoint, role = %role, "Saved conversation entry");
        Ok(entry)
    }

    /// Every entry of a session in append order; empty when none exist.
    pub async fn load_conversation(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<ConversationEntry>> {
        let path = self.conversation_path(user_id, session_id);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(parse_log(&path, &text))
    }

    /// Re-index every entry found in the conversation logs.
    ///
    /// Needed after a restart when the index lives only in memory. Returns
    /// the number of entries indexed.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let mut dir = fs::read_dir(&self.conversations_dir).await?;
        let mut indexed = 0;

        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("jsonl") {
                continue;
            }

            let text = fs::read_to_string(&path).await?;
            for entry in parse_log(&path, &text) {
                let datapoint = datapoint_id(&entry.user_id, &entry.session_id, &entry.id);
                self.index.upsert(&datapoint, &entry.content_vector).await?;
                indexed += 1;
            }
        }

        info!(entries = indexed, "Rebuilt memory index from conversation logs");
        Ok(indexed)
    }

    /// Write a summary, replacing any previous one with the same id
    pub async fn save_summary(
        &self,
        user_id: &str,
        session_id: &str,
        summary_id: &str,
        summary: &str,
    ) -> Result<SummaryRecord> {
        let record = SummaryRecord {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            summary_id: summary_id.to_string(),
            timestamp: Utc::now(),
            summary: summary.to_string(),
        };

        let path = self.summary_path(user_id, session_id, summary_id);
        fs::write(&path, serde_json::to_vec_pretty(&record)?).await?;
        debug!("Saved summary to {:?}", path);
        Ok(record)
    }

    pub async fn load_summary(
        &self,
        user_id: &str,
        session_id: &str,
        summary_id: &str,
    ) -> Result<Option<SummaryRecord>> {
        let path = self.summary_path(user_id, session_id, summary_id);
        match fs::read(&path).await {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes).map_err(|e| {
                    ChronosError::StorageError(format!("Corrupt summary {:?}: {}", path, e))
                })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Nearest stored entries to `query`
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Neighbor>> {
        let vector = self.embedder.embed(query).await?;
        self.index.query(&vector, k).await
    }
}

/// Entries of one JSONL log; malformed lines are skipped with a warning
fn parse_log(path: &Path, text: &str) -> Vec<ConversationEntry> {
    let mut entries = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ConversationEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping malformed line {} in {:?}: {}", n + 1, path, e),
        }
    }
    entries
}
