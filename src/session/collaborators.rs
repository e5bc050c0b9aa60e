//! External collaborators of a reading session
//!
//! The session never touches storage directly: book bytes come from a
//! `ByteSource` and progress goes to a `ProgressSink`. Local filesystem
//! implementations back the command-line front end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::progress::ProgressSnapshot;
use crate::error::Result;

/// What the library knows about a book before it is opened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: String,
    /// Where the byte source finds the book
    pub locator: String,
    pub last_fractional_progress: Option<f64>,
    /// 1-based
    pub last_page_number: Option<usize>,
    pub last_position_token: Option<String>,
}

impl BookRecord {
    pub fn new(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locator: locator.into(),
            ..Self::default()
        }
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Resolves a book record to its raw EPUB bytes
#[async_trait::async_trait]
pub trait ByteSource: Send + Sync {
    async fn fetch(&self, record: &BookRecord) -> anyhow::Result<Vec<u8>>;
}

/// Persists reading progress
///
/// Failures are logged by the session and never interrupt reading.
#[async_trait::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn save_progress(&self, snapshot: ProgressSnapshot) -> anyhow::Result<()>;
}

// ============================================================================
// Filesystem Byte Source
// ============================================================================

/// Reads books from a library directory
#[derive(Debug, Clone)]
pub struct FsByteSource {
    library_dir: PathBuf,
}

impl FsByteSource {
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
        }
    }

    /// Absolute locators pass through; relative ones live in the library
    pub fn resolve(&self, locator: &str) -> PathBuf {
        let path = Path::new(locator);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.library_dir.join(path)
        }
    }
}

#[async_trait::async_trait]
impl ByteSource for FsByteSource {
    async fn fetch(&self, record: &BookRecord) -> anyhow::Result<Vec<u8>> {
        let path = self.resolve(&record.locator);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

// ============================================================================
// JSON Progress Store
// ============================================================================

/// Stored progress for one book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProgress {
    pub percent: f64,
    pub position_token: Option<String>,
    pub page: usize,
    pub updated_at: DateTime<Utc>,
}

/// Progress sink that keeps every book's position in one JSON file
pub struct JsonProgressStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, StoredProgress>>,
}

impl JsonProgressStore {
    /// Open the store, starting empty when the file does not exist yet
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(|b| b.is_ascii_whitespace()) => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            "Progress store {} holds {} books",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub async fn get(&self, book_id: &str) -> Option<StoredProgress> {
        self.entries.lock().await.get(book_id).cloned()
    }

    /// Book record carrying whatever progress is stored for this book
    pub async fn record_for(&self, book_id: &str, locator: &str) -> BookRecord {
        let mut record = BookRecord::new(book_id, locator);
        if let Some(stored) = self.get(book_id).await {
            record.last_fractional_progress = Some(stored.percent);
            record.last_page_number = Some(stored.page);
            record.last_position_token = stored.position_token;
        }
        record
    }

    async fn persist(&self, entries: &HashMap<String, StoredProgress>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProgressSink for JsonProgressStore {
    async fn save_progress(&self, snapshot: ProgressSnapshot) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            snapshot.book_id.clone(),
            StoredProgress {
                percent: snapshot.fraction,
                position_token: snapshot.position_token,
                page: snapshot.page_number,
                updated_at: Utc::now(),
            },
        );
        self.persist(&entries)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        tracing::debug!(
            "Saved progress for {}: {:.3}",
            snapshot.book_id,
            snapshot.fraction
        );
        Ok(())
    }
}
