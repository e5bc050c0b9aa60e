//! Layout configuration and viewport geometry

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MIN_FONT_SIZE: f32 = 12.0;
pub const MAX_FONT_SIZE: f32 = 36.0;
pub const MIN_LINE_HEIGHT: f32 = 1.0;
pub const MAX_LINE_HEIGHT: f32 = 3.0;
pub const MAX_MARGIN: f32 = 200.0;

/// Vertical space reserved for reader chrome (header, footer, controls)
pub const CHROME_HEIGHT: f32 = 80.0;
/// Share of the remaining height a page may fill
pub const PAGE_FILL: f32 = 0.92;

/// Colour theme. Purely presentational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Sepia,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Sepia => "sepia",
        };
        f.write_str(name)
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "sepia" => Ok(Theme::Sepia),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

/// Reader layout settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    /// Font size in px
    pub font_size: f32,
    pub font_family: String,
    /// Line height as a multiple of the font size
    pub line_height: f32,
    /// Horizontal margin in px, applied on both sides of a column
    pub margin: f32,
    pub theme: Theme,
    pub double_page: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_size: 18.0,
            font_family: "Georgia, serif".to_string(),
            line_height: 1.6,
            margin: 40.0,
            theme: Theme::Light,
            double_page: false,
        }
    }
}

impl LayoutConfig {
    /// Bring every numeric field into its accepted range
    ///
    /// Non-finite values fall back to the defaults.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        let font_family = if self.font_family.trim().is_empty() {
            defaults.font_family
        } else {
            self.font_family
        };

        Self {
            font_size: clamp_or(self.font_size, MIN_FONT_SIZE, MAX_FONT_SIZE, defaults.font_size),
            font_family,
            line_height: clamp_or(
                self.line_height,
                MIN_LINE_HEIGHT,
                MAX_LINE_HEIGHT,
                defaults.line_height,
            ),
            margin: clamp_or(self.margin, 0.0, MAX_MARGIN, defaults.margin),
            theme: self.theme,
            double_page: self.double_page,
        }
    }

    /// Whether switching to `other` changes page geometry
    ///
    /// Everything except the theme does.
    pub fn affects_layout(&self, other: &LayoutConfig) -> bool {
        self.font_size != other.font_size
            || self.font_family != other.font_family
            || self.line_height != other.line_height
            || self.margin != other.margin
            || self.double_page != other.double_page
    }

    /// Pages shown side by side
    pub fn pages_per_spread(&self) -> usize {
        if self.double_page {
            2
        } else {
            1
        }
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Size of the live reading surface in px
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 1000.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Replace negative or non-finite dimensions with zero
    pub fn clamped(self) -> Self {
        let fix = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            width: fix(self.width),
            height: fix(self.height),
        }
    }
}

/// Height a page's content may occupy
pub fn page_height_budget(viewport: &Viewport) -> f32 {
    ((viewport.height - CHROME_HEIGHT) * PAGE_FILL).max(0.0)
}

/// Width available to text in one column
pub fn content_width(layout: &LayoutConfig, viewport: &Viewport) -> f32 {
    let column = viewport.width / layout.pages_per_spread() as f32;
    (column - 2.0 * layout.margin).max(1.0)
}

/// Typography handed to a measurement surface
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceStyle {
    pub width: f32,
    pub font_size: f32,
    pub font_family: String,
    pub line_height: f32,
}

impl SurfaceStyle {
    pub fn new(layout: &LayoutConfig, viewport: &Viewport) -> Self {
        Self {
            width: content_width(layout, viewport),
            font_size: layout.font_size,
            font_family: layout.font_family.clone(),
            line_height: layout.line_height,
        }
    }
}
