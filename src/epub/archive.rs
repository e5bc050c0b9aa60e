//! ZIP archive access for EPUB containers
//!
//! Indexes file entries once at open time and decompresses them lazily,
//! so a single damaged content document does not poison the whole book.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use parking_lot::Mutex;
use zip::ZipArchive;

use super::EpubError;

/// Fixed location of the container descriptor
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Opaque handle over a decoded EPUB archive
pub struct RawArchive {
    zip: Mutex<ZipArchive<Cursor<Vec<u8>>>>,
    /// Exact entry name -> index
    entries: HashMap<String, usize>,
    /// Lowercased entry name -> index, for sloppy packagers
    folded: HashMap<String, usize>,
}

impl RawArchive {
    /// Open an archive from raw bytes
    pub fn open(bytes: Vec<u8>) -> Result<Self, EpubError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| EpubError::ArchiveCorrupt(e.to_string()))?;

        let mut entries = HashMap::new();
        let mut folded = HashMap::new();
        for index in 0..zip.len() {
            let file = zip
                .by_index_raw(index)
                .map_err(|e| EpubError::ArchiveCorrupt(e.to_string()))?;
            // Directory entries are optional in the wild; only files are addressable
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            folded.entry(name.to_lowercase()).or_insert(index);
            entries.insert(name, index);
        }

        if entries.is_empty() {
            return Err(EpubError::ArchiveCorrupt("archive has no file entries".to_string()));
        }

        tracing::debug!("Opened archive with {} entries", entries.len());

        Ok(Self {
            zip: Mutex::new(zip),
            entries,
            folded,
        })
    }

    /// Number of file entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read an entry and decode it as text
    pub fn read_entry(&self, path: &str) -> Result<String, EpubError> {
        let index = self
            .locate(path)
            .ok_or_else(|| EpubError::EntryNotFound(path.to_string()))?;

        let mut zip = self.zip.lock();
        let mut file = zip
            .by_index(index)
            .map_err(|e| EpubError::ArchiveCorrupt(format!("{}: {}", path, e)))?;

        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| EpubError::ArchiveCorrupt(format!("{}: {}", path, e)))?;

        Ok(decode_text(path, bytes))
    }

    fn locate(&self, path: &str) -> Option<usize> {
        let path = path.trim_start_matches('/');
        self.entries
            .get(path)
            .or_else(|| self.folded.get(&path.to_lowercase()))
            .copied()
    }
}

/// Decode entry bytes as UTF-8, dropping a BOM and tolerating bad sequences
fn decode_text(path: &str, bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Entry {} is not valid UTF-8, decoding lossily", path);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// Resolve an href against a base directory into an absolute archive path
///
/// Fragments are dropped, percent escapes decoded and `.`/`..` segments folded.
pub fn resolve_path(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href);
    let decoded = urlencoding::decode(href)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string());

    let joined = if decoded.starts_with('/') || base_dir.is_empty() {
        decoded.trim_start_matches('/').to_string()
    } else {
        format!("{}/{}", base_dir.trim_end_matches('/'), decoded)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Directory part of an archive path ("" for root-level files)
pub fn parent_dir(path: &str) -> String {
    path.rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}
