//! Reading position arithmetic
//!
//! Page indexes do not survive re-pagination, so positions are stored as
//! fractional progress. A position token additionally records the exact
//! index together with a fingerprint of the layout that produced it, which
//! lets an unchanged layout restore the very same page.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::collaborators::BookRecord;
use crate::layout::{LayoutConfig, Viewport};

const TOKEN_VERSION: &str = "v1";

/// Progress through the book after reading page `index`, in (0, 1]
pub fn fraction_for(index: usize, page_count: usize) -> f64 {
    if page_count == 0 {
        return 0.0;
    }
    (index.min(page_count - 1) + 1) as f64 / page_count as f64
}

/// Page index for a stored fraction, clamped to the page range
pub fn index_for(fraction: f64, page_count: usize) -> usize {
    if page_count == 0 || !fraction.is_finite() {
        return 0;
    }
    let raw = (fraction.clamp(0.0, 1.0) * page_count as f64).floor() as usize;
    raw.min(page_count - 1)
}

/// Carry an index across a re-pagination
pub fn remap_index(index: usize, old_count: usize, new_count: usize) -> usize {
    if new_count == 0 {
        return 0;
    }
    if old_count == new_count {
        return index.min(new_count - 1);
    }
    index_for(fraction_for(index, old_count), new_count)
}

/// Short hash of everything that changes page geometry
pub fn layout_fingerprint(layout: &LayoutConfig, viewport: &Viewport) -> String {
    let key = format!(
        "{:.2}|{}|{:.3}|{:.2}|{}|{:.1}x{:.1}",
        layout.font_size,
        layout.font_family,
        layout.line_height,
        layout.margin,
        layout.double_page,
        viewport.width,
        viewport.height
    );
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..8])
}

/// Exact position under a specific layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionToken {
    pub fingerprint: String,
    pub page_count: usize,
    pub index: usize,
}

impl PositionToken {
    pub fn new(fingerprint: impl Into<String>, page_count: usize, index: usize) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            page_count,
            index,
        }
    }

    /// Whether this token points into a pagination with this fingerprint and size
    pub fn matches(&self, fingerprint: &str, page_count: usize) -> bool {
        self.fingerprint == fingerprint && self.page_count == page_count && self.index < page_count
    }
}

impl fmt::Display for PositionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            TOKEN_VERSION, self.fingerprint, self.page_count, self.index
        )
    }
}

impl FromStr for PositionToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [version, fingerprint, count, index] = parts.as_slice() else {
            return Err(format!("malformed position token '{}'", s));
        };
        if *version != TOKEN_VERSION {
            return Err(format!("unsupported position token version '{}'", version));
        }
        if fingerprint.is_empty() || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("bad fingerprint in position token '{}'", s));
        }

        Ok(Self {
            fingerprint: fingerprint.to_string(),
            page_count: count.parse().map_err(|_| format!("bad page count in '{}'", s))?,
            index: index.parse().map_err(|_| format!("bad page index in '{}'", s))?,
        })
    }
}

/// Where to start reading a freshly paginated book
///
/// An exact token wins, then fractional progress, then the page number.
pub fn initial_index(record: &BookRecord, fingerprint: &str, page_count: usize) -> usize {
    if page_count == 0 {
        return 0;
    }

    let token = record
        .last_position_token
        .as_deref()
        .and_then(|t| t.parse::<PositionToken>().ok())
        .filter(|t| t.matches(fingerprint, page_count));
    if let Some(token) = token {
        return token.index;
    }

    if let Some(fraction) = record.last_fractional_progress.filter(|p| p.is_finite()) {
        return index_for(fraction, page_count);
    }

    record
        .last_page_number
        .map(|n| n.saturating_sub(1).min(page_count - 1))
        .unwrap_or(0)
}

/// Progress handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub book_id: String,
    /// Fraction read, in [0, 1]
    pub fraction: f64,
    pub position_token: Option<String>,
    /// 1-based page number
    pub page_number: usize,
}
