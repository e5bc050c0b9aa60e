//! Page layout
//!
//! Reflows chapter markup into viewport-sized pages. Geometry comes from
//! `LayoutConfig` and `Viewport`; heights come from an injected `Measurer`.

pub mod config;
pub mod measure;
pub mod paginator;

use thiserror::Error;

pub use config::{
    content_width, page_height_budget, LayoutConfig, SurfaceStyle, Theme, Viewport,
};
pub use measure::{GlyphMetrics, MeasureSurface, Measurer};
pub use paginator::{paginate, Page};

/// Errors raised while laying out pages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Measurement surface unavailable: {0}")]
    SurfaceUnavailable(String),
}
