//! Test fixtures: in-memory EPUBs, deterministic measurers and collaborators

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::epub::archive::{RawArchive, CONTAINER_PATH};
use crate::epub::Chapter;
use crate::html::decompose;
use crate::layout::{LayoutError, MeasureSurface, Measurer, SurfaceStyle};
use crate::session::{BookRecord, ByteSource, ProgressSink, ProgressSnapshot};

// ============================================================================
// Archives
// ============================================================================

/// Write a stored (uncompressed) ZIP with the given entries
pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, content) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

enum FixtureChapter {
    Body(String),
    Document(String),
    Missing,
}

/// Builder for small EPUBs laid out like real ones
///
/// Chapters live at `OEBPS/text/<id>.xhtml` and appear in the spine in the
/// order they are added.
pub struct EpubFixture {
    title: Option<String>,
    author: Option<String>,
    chapters: Vec<(String, FixtureChapter)>,
    container: bool,
}

impl Default for EpubFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl EpubFixture {
    pub fn new() -> Self {
        Self {
            title: None,
            author: None,
            chapters: Vec::new(),
            container: true,
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    /// Chapter whose body holds `body`
    pub fn chapter(mut self, id: &str, body: &str) -> Self {
        self.chapters
            .push((id.to_string(), FixtureChapter::Body(body.to_string())));
        self
    }

    /// Chapter stored exactly as given
    pub fn raw_chapter(mut self, id: &str, document: &str) -> Self {
        self.chapters
            .push((id.to_string(), FixtureChapter::Document(document.to_string())));
        self
    }

    /// Chapter listed in manifest and spine but absent from the archive
    pub fn missing_chapter(mut self, id: &str) -> Self {
        self.chapters.push((id.to_string(), FixtureChapter::Missing));
        self
    }

    pub fn without_container(mut self) -> Self {
        self.container = false;
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut files: Vec<(String, String)> =
            vec![("mimetype".to_string(), "application/epub+zip".to_string())];
        if self.container {
            files.push((CONTAINER_PATH.to_string(), CONTAINER_XML.to_string()));
        }
        files.push(("OEBPS/content.opf".to_string(), self.package_document()));

        for (id, chapter) in &self.chapters {
            let path = format!("OEBPS/text/{}.xhtml", id);
            match chapter {
                FixtureChapter::Body(body) => files.push((path, xhtml(body))),
                FixtureChapter::Document(document) => files.push((path, document.clone())),
                FixtureChapter::Missing => {}
            }
        }

        let refs: Vec<(&str, &str)> = files
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
            .collect();
        zip_bytes(&refs)
    }

    pub fn archive(&self) -> RawArchive {
        RawArchive::open(self.bytes()).unwrap()
    }

    fn package_document(&self) -> String {
        let mut metadata = String::new();
        if let Some(title) = &self.title {
            metadata.push_str(&format!("    <dc:title>{}</dc:title>\n", title));
        }
        if let Some(author) = &self.author {
            metadata.push_str(&format!("    <dc:creator>{}</dc:creator>\n", author));
        }

        let manifest: String = self
            .chapters
            .iter()
            .map(|(id, _)| {
                format!(
                    "    <item id=\"{id}\" href=\"text/{id}.xhtml\" media-type=\"application/xhtml+xml\"/>\n"
                )
            })
            .collect();
        let spine: String = self
            .chapters
            .iter()
            .map(|(id, _)| format!("    <itemref idref=\"{}\"/>\n", id))
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="uid">fixture-book</dc:identifier>
{metadata}  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine>
{spine}  </spine>
</package>"#
        )
    }
}

fn xhtml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><meta charset="utf-8"/></head>
<body>{}</body>
</html>"#,
        body
    )
}

// ============================================================================
// Content
// ============================================================================

/// `count` numbered paragraphs
pub fn paragraphs(count: usize) -> String {
    (1..=count)
        .map(|i| format!("<p>Paragraph {}</p>", i))
        .collect()
}

pub fn chapter(id: &str, content: &str) -> Chapter {
    Chapter {
        id: id.to_string(),
        title: format!("Title {}", id),
        content: content.to_string(),
        source_path: format!("OEBPS/text/{}.xhtml", id),
        spine_index: 0,
    }
}

// ============================================================================
// Measurers
// ============================================================================

/// Every block is `font_size * 5` px tall
///
/// With a 1080px viewport (920px budget) that is eight blocks per page at
/// 22px and five at 32px.
pub struct BlockCountMeasurer;

struct BlockCountSurface {
    block_height: f32,
}

impl MeasureSurface for BlockCountSurface {
    fn measure(&mut self, html: &str) -> f32 {
        decompose(html).len() as f32 * self.block_height
    }
}

impl Measurer for BlockCountMeasurer {
    fn open_surface(&self, style: &SurfaceStyle) -> Result<Box<dyn MeasureSurface>, LayoutError> {
        Ok(Box::new(BlockCountSurface {
            block_height: style.font_size * 5.0,
        }))
    }
}

/// `BlockCountMeasurer` that counts surfaces opened and released
#[derive(Default)]
pub struct CountingMeasurer {
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    fail: bool,
    delay: Duration,
}

impl CountingMeasurer {
    /// Refuses to open surfaces
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Blocks the pagination thread for `delay` before each surface opens
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

struct CountingSurface {
    inner: BlockCountSurface,
    released: Arc<AtomicUsize>,
}

impl MeasureSurface for CountingSurface {
    fn measure(&mut self, html: &str) -> f32 {
        self.inner.measure(html)
    }
}

impl Drop for CountingSurface {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl Measurer for CountingMeasurer {
    fn open_surface(&self, style: &SurfaceStyle) -> Result<Box<dyn MeasureSurface>, LayoutError> {
        if self.fail {
            return Err(LayoutError::SurfaceUnavailable("test surface refused".to_string()));
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSurface {
            inner: BlockCountSurface {
                block_height: style.font_size * 5.0,
            },
            released: Arc::clone(&self.released),
        }))
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Books keyed by locator, optionally delayed
#[derive(Default)]
pub struct MemoryByteSource {
    books: Mutex<HashMap<String, (Vec<u8>, Duration)>>,
}

impl MemoryByteSource {
    pub fn insert(&self, locator: &str, bytes: Vec<u8>) {
        self.insert_slow(locator, bytes, Duration::ZERO);
    }

    pub fn insert_slow(&self, locator: &str, bytes: Vec<u8>, delay: Duration) {
        self.books.lock().insert(locator.to_string(), (bytes, delay));
    }
}

#[async_trait::async_trait]
impl ByteSource for MemoryByteSource {
    async fn fetch(&self, record: &BookRecord) -> anyhow::Result<Vec<u8>> {
        let entry = self.books.lock().get(&record.locator).cloned();
        let (bytes, delay) =
            entry.ok_or_else(|| anyhow::anyhow!("no book at {}", record.locator))?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(bytes)
    }
}

/// Keeps every saved snapshot
#[derive(Default)]
pub struct RecordingSink {
    saved: Mutex<Vec<ProgressSnapshot>>,
}

impl RecordingSink {
    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.saved.lock().clone()
    }

    pub fn last(&self) -> Option<ProgressSnapshot> {
        self.saved.lock().last().cloned()
    }
}

#[async_trait::async_trait]
impl ProgressSink for RecordingSink {
    async fn save_progress(&self, snapshot: ProgressSnapshot) -> anyhow::Result<()> {
        self.saved.lock().push(snapshot);
        Ok(())
    }
}
