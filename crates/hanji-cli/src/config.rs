//! RON configuration for the `hanji` binary.
//!
//! Resolution order: `--config <path>`, then `~/.config/hanji/config.ron`,
//! then built-in defaults. Every field is optional in the file.
//!
//! ```ron
//! (
//!     locale: ko,
//!     editor: (autosave_debounce_ms: 500),
//!     search: (max_results: 20, fuzzy: (threshold: 0.3)),
//!     view: (overscan: 5),
//! )
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hanji_editor::EditorConfig;
use hanji_search::{DEFAULT_SEARCH_DEBOUNCE, FuzzyOptions, SearchOptions};
use hanji_types::Locale;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HanjiConfig {
    pub locale: Locale,
    pub editor: EditorConfig,
    pub search: SearchConfig,
    pub view: ViewConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period for interactive search front ends.
    pub debounce_ms: u64,
    pub max_results: usize,
    pub fuzzy: FuzzyOptions,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_SEARCH_DEBOUNCE.as_millis() as u64,
            max_results: SearchOptions::default().max_results,
            fuzzy: FuzzyOptions::default(),
        }
    }
}

impl SearchConfig {
    /// Pipeline options seeded from this section.
    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            fuzzy: self.fuzzy.clone(),
            max_results: self.max_results,
            ..SearchOptions::default()
        }
    }
}

/// Terminal list settings, in rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub item_height: f64,
    pub overscan: usize,
    pub end_threshold: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            item_height: 1.0,
            overscan: hanji_view::DEFAULT_OVERSCAN,
            end_threshold: 5.0,
        }
    }
}

impl HanjiConfig {
    /// `~/.config/hanji/config.ron` (platform equivalent elsewhere).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hanji").join("config.ron"))
    }

    /// Load with the usual resolution order. An explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                tracing::debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_ron(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }
}
