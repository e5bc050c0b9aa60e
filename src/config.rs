//! Configuration management for the Los Libros reader

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::layout::{LayoutConfig, Theme, Viewport};
use crate::session::{Capabilities, SessionSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub reader: ReaderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// Directory relative book locators resolve against
    pub library_dir: PathBuf,
    /// JSON file holding reading progress
    pub progress_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    pub viewport: Viewport,
    pub layout: LayoutConfig,
    pub load_timeout_secs: u64,
    pub progress_debounce_ms: u64,
    pub capabilities: Capabilities,
}

/// A variable was set but could not be parsed
#[derive(Debug, Error)]
#[error("{name}: cannot parse '{value}'")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            library: LibraryConfig {
                library_dir: PathBuf::from("."),
                progress_file: PathBuf::from("reading-progress.json"),
            },
            reader: ReaderConfig {
                viewport: Viewport::default(),
                layout: LayoutConfig::default(),
                load_timeout_secs: 30,
                progress_debounce_ms: 1000,
                capabilities: Capabilities::default(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let vars = Vars(&lookup);
        let layout = defaults.reader.layout;
        let viewport = defaults.reader.viewport;
        let capabilities = defaults.reader.capabilities;

        Ok(Config {
            library: LibraryConfig {
                library_dir: vars
                    .string("READER_LIBRARY_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.library.library_dir),
                progress_file: vars
                    .string("READER_PROGRESS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.library.progress_file),
            },
            reader: ReaderConfig {
                viewport: Viewport {
                    width: vars.parse("READER_VIEWPORT_WIDTH", viewport.width)?,
                    height: vars.parse("READER_VIEWPORT_HEIGHT", viewport.height)?,
                },
                layout: LayoutConfig {
                    font_size: vars.parse("READER_FONT_SIZE", layout.font_size)?,
                    font_family: vars
                        .string("READER_FONT_FAMILY")
                        .unwrap_or(layout.font_family),
                    line_height: vars.parse("READER_LINE_HEIGHT", layout.line_height)?,
                    margin: vars.parse("READER_MARGIN", layout.margin)?,
                    theme: vars.parse::<Theme>("READER_THEME", layout.theme)?,
                    double_page: vars.flag("READER_DOUBLE_PAGE", layout.double_page)?,
                }
                .clamped(),
                load_timeout_secs: vars
                    .parse("READER_LOAD_TIMEOUT_SECS", defaults.reader.load_timeout_secs)?,
                progress_debounce_ms: vars.parse(
                    "READER_PROGRESS_DEBOUNCE_MS",
                    defaults.reader.progress_debounce_ms,
                )?,
                capabilities: Capabilities {
                    double_page: vars
                        .flag("READER_ENABLE_DOUBLE_PAGE", capabilities.double_page)?,
                    layout_settings: vars
                        .flag("READER_ENABLE_LAYOUT_SETTINGS", capabilities.layout_settings)?,
                },
            },
        })
    }

    /// Settings for a reading session
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            load_timeout: Duration::from_secs(self.reader.load_timeout_secs),
            progress_debounce: Duration::from_millis(self.reader.progress_debounce_ms),
            capabilities: self.reader.capabilities,
            layout: self.reader.layout.clone(),
            viewport: self.reader.viewport,
        }
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, name: &'static str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.string(name) {
            Some(value) => value.parse().map_err(|_| ConfigError { name, value }),
            None => Ok(default),
        }
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.string(name) {
            Some(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError { name, value }),
            },
            None => Ok(default),
        }
    }
}
