//! Reading session state machine
//!
//! `Idle -> Loading -> Ready`, `Loading -> Error`, and `Ready -> Loading`
//! whenever the page geometry changes. Long work (fetching, parsing,
//! pagination) runs without the state lock held; every operation that can
//! supersede another bumps the session epoch, and results are committed only
//! if their epoch is still current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::collaborators::{BookRecord, ByteSource, ProgressSink};
use super::events::{LoadStatus, SessionEvent};
use super::progress::{
    fraction_for, initial_index, layout_fingerprint, remap_index, PositionToken,
    ProgressSnapshot,
};
use crate::epub::{load_book, BookMetadata, Chapter, EpubError};
use crate::error::{ReaderError, Result};
use crate::html::plain_text;
use crate::layout::{paginate, LayoutConfig, Measurer, Page, Viewport};

const EVENT_CAPACITY: usize = 64;

/// Features a host may switch off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub double_page: bool,
    pub layout_settings: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            double_page: true,
            layout_settings: true,
        }
    }
}

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Bound on the fetch and on the parse, each
    pub load_timeout: Duration,
    /// Quiet period before a navigation is persisted
    pub progress_debounce: Duration,
    pub capabilities: Capabilities,
    pub layout: LayoutConfig,
    pub viewport: Viewport,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
            progress_debounce: Duration::from_secs(1),
            capabilities: Capabilities::default(),
            layout: LayoutConfig::default(),
            viewport: Viewport::default(),
        }
    }
}

/// How an `open_book` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Ready { page_count: usize },
    /// A later operation took over before this one finished
    Superseded,
}

/// First page of a chapter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    pub chapter_id: String,
    pub title: String,
    pub page_index: usize,
}

struct OpenBook {
    record: BookRecord,
    metadata: BookMetadata,
    chapters: Arc<Vec<Chapter>>,
}

struct State {
    status: LoadStatus,
    error: Option<String>,
    /// Last record passed to `open_book`, kept for `retry`
    requested: Option<BookRecord>,
    book: Option<OpenBook>,
    pages: Vec<Page>,
    /// Fingerprint of the layout the current pages were produced with
    fingerprint: String,
    index: usize,
    layout: LayoutConfig,
    viewport: Viewport,
}

impl State {
    fn clear_book(&mut self) {
        self.book = None;
        self.pages = Vec::new();
        self.fingerprint.clear();
        self.index = 0;
    }

    fn snapshot(&self) -> Option<ProgressSnapshot> {
        let book = self.book.as_ref()?;
        if self.pages.is_empty() {
            return None;
        }
        let count = self.pages.len();
        let index = self.index.min(count - 1);

        Some(ProgressSnapshot {
            book_id: book.record.id.clone(),
            fraction: fraction_for(index, count),
            position_token: Some(
                PositionToken::new(self.fingerprint.clone(), count, index).to_string(),
            ),
            page_number: index + 1,
        })
    }

    fn page_changed(&self) -> Option<SessionEvent> {
        let page = self.pages.get(self.index)?;
        Some(SessionEvent::PageChanged {
            index: self.index,
            total: self.pages.len(),
            chapter_title: page.chapter_title.clone(),
            text: plain_text(&page.content),
        })
    }
}

struct Relayout {
    epoch: u64,
    chapters: Arc<Vec<Chapter>>,
    index: usize,
    page_count: usize,
}

struct Inner {
    state: Mutex<State>,
    epoch: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
    pending_save: Mutex<Option<JoinHandle<()>>>,
    source: Arc<dyn ByteSource>,
    sink: Arc<dyn ProgressSink>,
    measurer: Arc<dyn Measurer>,
    settings: SessionSettings,
}

impl Inner {
    /// Start a new operation; callers hold the state lock
    fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_status(&self, state: &mut State, status: LoadStatus) {
        state.status = status;
        self.emit(SessionEvent::StatusChanged {
            status,
            message: state.error.clone(),
        });
    }
}

/// A reading session over one book at a time
///
/// Cheap to clone; clones share the same session. Navigation methods
/// schedule background saves and must be called inside a tokio runtime.
#[derive(Clone)]
pub struct ReadingSession {
    inner: Arc<Inner>,
}

impl ReadingSession {
    pub fn new(
        source: Arc<dyn ByteSource>,
        sink: Arc<dyn ProgressSink>,
        measurer: Arc<dyn Measurer>,
        settings: SessionSettings,
    ) -> Self {
        let mut layout = settings.layout.clone().clamped();
        if layout.double_page && !settings.capabilities.double_page {
            layout.double_page = false;
        }
        let viewport = settings.viewport.clamped();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    status: LoadStatus::Idle,
                    error: None,
                    requested: None,
                    book: None,
                    pages: Vec::new(),
                    fingerprint: String::new(),
                    index: 0,
                    layout,
                    viewport,
                }),
                epoch: AtomicU64::new(0),
                events,
                pending_save: Mutex::new(None),
                source,
                sink,
                measurer,
                settings,
            }),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load a book, replacing whatever was open or loading
    pub async fn open_book(&self, record: BookRecord) -> Result<OpenOutcome> {
        self.cancel_pending_save();

        let (epoch, previous) = {
            let mut state = self.inner.state.lock();
            let epoch = self.inner.bump_epoch();
            let previous = state.snapshot();
            state.clear_book();
            state.error = None;
            state.requested = Some(record.clone());
            self.inner.set_status(&mut state, LoadStatus::Loading);
            (epoch, previous)
        };

        if let Some(snapshot) = previous {
            self.save_now(snapshot).await;
        }

        tracing::info!("Opening book {} ({})", record.id, record.locator);

        match self.load(epoch, &record).await {
            Ok(Some(page_count)) => Ok(OpenOutcome::Ready { page_count }),
            Ok(None) => {
                tracing::debug!("Load of {} was superseded", record.id);
                Ok(OpenOutcome::Superseded)
            }
            Err(e) => {
                if self.fail(epoch, &e) {
                    tracing::error!("Failed to open {}: {}", record.id, e);
                    Err(e)
                } else {
                    Ok(OpenOutcome::Superseded)
                }
            }
        }
    }

    /// Open the last requested book again
    pub async fn retry(&self) -> Result<OpenOutcome> {
        let record = self
            .inner
            .state
            .lock()
            .requested
            .clone()
            .ok_or(ReaderError::NoBookOpen)?;
        self.open_book(record).await
    }

    /// Save progress and return to `Idle`
    pub async fn close(&self) {
        let snapshot = {
            let mut state = self.inner.state.lock();
            self.inner.bump_epoch();
            let snapshot = state.snapshot();
            state.clear_book();
            state.requested = None;
            state.error = None;
            self.inner.set_status(&mut state, LoadStatus::Idle);
            snapshot
        };
        self.cancel_pending_save();

        if let Some(snapshot) = snapshot {
            self.save_now(snapshot).await;
        }
        tracing::info!("Session closed");
    }

    async fn load(&self, epoch: u64, record: &BookRecord) -> Result<Option<usize>> {
        let limit = self.inner.settings.load_timeout;

        let bytes = match timeout(limit, self.inner.source.fetch(record)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Err(ReaderError::Source(format!("{:#}", e))),
            Err(_) => return Err(ReaderError::LoadTimeout(limit.as_secs())),
        };
        if !self.inner.is_current(epoch) {
            return Ok(None);
        }

        // Parsing is CPU-bound; keep it off the async workers
        let book = match timeout(limit, tokio::task::spawn_blocking(move || load_book(bytes))).await
        {
            Ok(joined) => joined??,
            Err(_) => return Err(ReaderError::LoadTimeout(limit.as_secs())),
        };
        if !self.inner.is_current(epoch) {
            return Ok(None);
        }

        let metadata = book.metadata;
        let chapters = Arc::new(book.chapters);
        let inner = &self.inner;

        let commit = |state: &mut State, pages: Vec<Page>, fingerprint: String| -> Result<usize> {
            if pages.is_empty() {
                return Err(EpubError::NoReadableChapters(
                    "no chapter has visible content".to_string(),
                )
                .into());
            }

            let page_count = pages.len();
            state.index = initial_index(record, &fingerprint, page_count);
            state.pages = pages;
            state.fingerprint = fingerprint;
            state.book = Some(OpenBook {
                record: record.clone(),
                metadata: metadata.clone(),
                chapters: Arc::clone(&chapters),
            });
            state.error = None;
            inner.set_status(state, LoadStatus::Ready);
            inner.emit(SessionEvent::ContentReady {
                book_id: record.id.clone(),
                title: metadata.title.clone(),
                author: metadata.author.clone(),
                language: metadata.language.clone(),
                page_count,
            });
            if let Some(event) = state.page_changed() {
                inner.emit(event);
            }

            tracing::info!(
                "Book {} ready: {} pages, starting at page {}",
                record.id,
                page_count,
                state.index + 1
            );
            Ok(page_count)
        };

        let committed = self.paginate_until_stable(epoch, &chapters, commit).await?;

        committed.transpose()
    }

    /// Paginate with the current geometry until it stops changing underneath
    ///
    /// `commit` runs under the state lock with the fresh pages and their
    /// layout fingerprint. Returns `None` when the epoch was superseded.
    async fn paginate_until_stable<R, F>(
        &self,
        epoch: u64,
        chapters: &Arc<Vec<Chapter>>,
        mut commit: F,
    ) -> Result<Option<R>>
    where
        F: FnMut(&mut State, Vec<Page>, String) -> R + Send,
    {
        loop {
            let (layout, viewport) = {
                let state = self.inner.state.lock();
                (state.layout.clone(), state.viewport)
            };

            let pages = self
                .paginate_chapters(Arc::clone(chapters), layout.clone(), viewport)
                .await?;

            let mut state = self.inner.state.lock();
            if !self.inner.is_current(epoch) {
                return Ok(None);
            }
            if state.layout.affects_layout(&layout) || state.viewport != viewport {
                tracing::debug!("Layout changed during pagination, paginating again");
                continue;
            }

            let fingerprint = layout_fingerprint(&layout, &viewport);
            return Ok(Some(commit(&mut *state, pages, fingerprint)));
        }
    }

    async fn paginate_chapters(
        &self,
        chapters: Arc<Vec<Chapter>>,
        layout: LayoutConfig,
        viewport: Viewport,
    ) -> Result<Vec<Page>> {
        let measurer = Arc::clone(&self.inner.measurer);
        let pages = tokio::task::spawn_blocking(move || {
            paginate(&chapters, &layout, &viewport, measurer.as_ref())
        })
        .await??;
        Ok(pages)
    }

    /// Move to `Error` if `epoch` is still current; false when superseded
    fn fail(&self, epoch: u64, error: &ReaderError) -> bool {
        let mut state = self.inner.state.lock();
        if !self.inner.is_current(epoch) {
            return false;
        }
        state.clear_book();
        state.error = Some(error.to_string());
        self.inner.set_status(&mut state, LoadStatus::Error);
        true
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Apply new layout settings, re-paginating when page geometry changes
    pub async fn change_layout(&self, config: LayoutConfig) -> Result<()> {
        let capabilities = self.inner.settings.capabilities;
        if !capabilities.layout_settings {
            return Err(ReaderError::CapabilityDisabled("layout_settings"));
        }

        let mut config = config.clamped();
        if config.double_page && !capabilities.double_page {
            tracing::warn!("Double-page mode is disabled, keeping single pages");
            config.double_page = false;
        }

        let job = {
            let mut state = self.inner.state.lock();
            if state.layout == config {
                return Ok(());
            }
            let geometry_changed = state.layout.affects_layout(&config);
            state.layout = config.clone();
            self.inner.emit(SessionEvent::LayoutChanged { layout: config });
            if !geometry_changed {
                return Ok(());
            }
            self.begin_relayout(&mut state)
        };

        match job {
            Some(job) => self.relayout(job).await,
            None => Ok(()),
        }
    }

    /// React to a new reading surface size
    pub async fn resize(&self, viewport: Viewport) -> Result<()> {
        let viewport = viewport.clamped();

        let job = {
            let mut state = self.inner.state.lock();
            if state.viewport == viewport {
                return Ok(());
            }
            state.viewport = viewport;
            self.begin_relayout(&mut state)
        };

        match job {
            Some(job) => self.relayout(job).await,
            None => Ok(()),
        }
    }

    /// Switch a ready session to `Loading` for re-pagination
    ///
    /// Sessions that are not ready just keep the stored geometry; a load in
    /// flight picks it up before committing.
    fn begin_relayout(&self, state: &mut State) -> Option<Relayout> {
        if state.status != LoadStatus::Ready {
            return None;
        }
        let chapters = Arc::clone(&state.book.as_ref()?.chapters);

        let job = Relayout {
            epoch: self.inner.bump_epoch(),
            chapters,
            index: state.index,
            page_count: state.pages.len(),
        };
        self.inner.set_status(state, LoadStatus::Loading);
        self.cancel_pending_save();
        Some(job)
    }

    async fn relayout(&self, job: Relayout) -> Result<()> {
        let Relayout {
            epoch,
            chapters,
            index,
            page_count,
        } = job;
        let inner = &self.inner;

        let commit = |state: &mut State, pages: Vec<Page>, fingerprint: String| {
            let new_count = pages.len();
            state.index = remap_index(index, page_count, new_count);
            state.pages = pages;
            state.fingerprint = fingerprint;
            inner.set_status(state, LoadStatus::Ready);
            if let Some(event) = state.page_changed() {
                inner.emit(event);
            }

            tracing::info!(
                "Re-paginated {} -> {} pages, page {} -> {}",
                page_count,
                new_count,
                index + 1,
                state.index + 1
            );
            state.snapshot()
        };

        let result = self.paginate_until_stable(epoch, &chapters, commit).await;

        match result {
            Ok(Some(snapshot)) => {
                if let Some(snapshot) = snapshot {
                    self.save_now(snapshot).await;
                }
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                if self.fail(epoch, &e) {
                    tracing::error!("Re-pagination failed: {}", e);
                    Err(e)
                } else {
                    Ok(())
                }
            }
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Advance one spread; false at the last page or when nothing is open
    pub fn go_to_next(&self) -> bool {
        self.step(true)
    }

    /// Go back one spread; false at the first page or when nothing is open
    pub fn go_to_prev(&self) -> bool {
        self.step(false)
    }

    /// Jump to a zero-based page index
    pub fn go_to_page(&self, index: usize) -> bool {
        self.navigate(|state| (index < state.pages.len()).then_some(index))
    }

    /// Jump to the first page of a chapter
    pub fn go_to_chapter(&self, chapter_id: &str) -> bool {
        self.navigate(|state| state.pages.iter().position(|p| p.chapter_id == chapter_id))
    }

    fn step(&self, forward: bool) -> bool {
        self.navigate(|state| {
            let stride = state.layout.pages_per_spread();
            let last = state.pages.len().checked_sub(1)?;
            Some(if forward {
                (state.index + stride).min(last)
            } else {
                state.index.saturating_sub(stride)
            })
        })
    }

    fn navigate(&self, target: impl FnOnce(&State) -> Option<usize>) -> bool {
        let moved = {
            let mut state = self.inner.state.lock();
            if state.status != LoadStatus::Ready {
                return false;
            }
            match target(&*state) {
                Some(index) if index != state.index => {
                    state.index = index;
                    if let Some(event) = state.page_changed() {
                        self.inner.emit(event);
                    }
                    true
                }
                _ => false,
            }
        };

        if moved {
            self.schedule_save();
        }
        moved
    }

    // ========================================================================
    // Progress persistence
    // ========================================================================

    /// Persist the current position after the debounce period
    ///
    /// Each call replaces the previously scheduled save.
    fn schedule_save(&self) {
        let Some(snapshot) = self.inner.state.lock().snapshot() else {
            return;
        };
        let sink = Arc::clone(&self.inner.sink);
        let delay = self.inner.settings.progress_debounce;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            save_snapshot(sink.as_ref(), snapshot).await;
        });

        if let Some(previous) = self.inner.pending_save.lock().replace(handle) {
            previous.abort();
        }
    }

    fn cancel_pending_save(&self) {
        if let Some(handle) = self.inner.pending_save.lock().take() {
            handle.abort();
        }
    }

    async fn save_now(&self, snapshot: ProgressSnapshot) {
        save_snapshot(self.inner.sink.as_ref(), snapshot).await;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> LoadStatus {
        self.inner.state.lock().status
    }

    /// Message of the last failed load
    pub fn error_message(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    pub fn layout(&self) -> LayoutConfig {
        self.inner.state.lock().layout.clone()
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.state.lock().viewport
    }

    pub fn metadata(&self) -> Option<BookMetadata> {
        let state = self.inner.state.lock();
        state.book.as_ref().map(|b| b.metadata.clone())
    }

    pub fn page_count(&self) -> usize {
        self.inner.state.lock().pages.len()
    }

    pub fn current_index(&self) -> usize {
        self.inner.state.lock().index
    }

    pub fn current_page(&self) -> Option<Page> {
        let state = self.inner.state.lock();
        state.pages.get(state.index).cloned()
    }

    /// Pages on screen: the current page, plus its neighbour in double-page mode
    pub fn visible_pages(&self) -> Vec<Page> {
        let state = self.inner.state.lock();
        let end = (state.index + state.layout.pages_per_spread()).min(state.pages.len());
        state.pages.get(state.index..end).map(|p| p.to_vec()).unwrap_or_default()
    }

    /// First page of every chapter that produced pages
    pub fn table_of_contents(&self) -> Vec<TocEntry> {
        let state = self.inner.state.lock();
        let mut entries: Vec<TocEntry> = Vec::new();
        for (index, page) in state.pages.iter().enumerate() {
            if entries.last().map(|e| e.chapter_id.as_str()) != Some(page.chapter_id.as_str()) {
                entries.push(TocEntry {
                    chapter_id: page.chapter_id.clone(),
                    title: page.chapter_title.clone(),
                    page_index: index,
                });
            }
        }
        entries
    }

    /// Current reading position, when a book is open
    pub fn progress(&self) -> Option<ProgressSnapshot> {
        self.inner.state.lock().snapshot()
    }
}

async fn save_snapshot(sink: &dyn ProgressSink, snapshot: ProgressSnapshot) {
    let book_id = snapshot.book_id.clone();
    if let Err(e) = sink.save_progress(snapshot).await {
        tracing::warn!("Failed to save progress for {}: {:#}", book_id, e);
    }
}
