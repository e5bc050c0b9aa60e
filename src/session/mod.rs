//! Reading sessions
//!
//! A `ReadingSession` owns one open book: its pages, the layout they were
//! produced with and the reader's position. Bytes and progress persistence
//! are delegated to collaborators.

pub mod collaborators;
pub mod controller;
pub mod events;
pub mod progress;

pub use collaborators::{BookRecord, ByteSource, FsByteSource, JsonProgressStore, ProgressSink};
pub use controller::{Capabilities, OpenOutcome, ReadingSession, SessionSettings, TocEntry};
pub use events::{LoadStatus, SessionEvent};
pub use progress::{PositionToken, ProgressSnapshot};
