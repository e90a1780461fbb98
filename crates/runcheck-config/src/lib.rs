//! Configuration loading for the runcheck harness.
//!
//! Configurations are plain JSON files. A config directory contains one
//! `internal.json` with run-wide options plus any number of language config
//! files, e.g.:
//!
//! ```json
//! {
//!     "language": "asm x86_64",
//!     "extension": "s",
//!     "description": "Uses -no-pie to disable position independent execution",
//!     "steps": [
//!         {
//!             "runtime": "gcc",
//!             "command": " -no-pie -o {0} {1} -lm",
//!             "args": ["FILE_NAME_WEX", "ALL_FILES_IN_DIR"]
//!         },
//!         {
//!             "runtime": "WORKING_DIR/FILE_NAME_WEX",
//!             "command": "",
//!             "args": []
//!         }
//!     ]
//! }
//! ```
//!
//! Chapter configs (`chapter.json`) live next to the exercise directories
//! and are looked up lazily, per candidate file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use runcheck_types::{ChapterConfig, InternalConfig, LanguageConfig, Result, RuncheckError};

/// File name of the run-wide options file inside the config directory.
pub const INTERNAL_CONFIG_FILE: &str = "internal.json";

/// File name of the per-exercise expected-values file.
pub const CHAPTER_CONFIG_FILE: &str = "chapter.json";

// ---------------------------------------------------------------------------
// ConfigRegistry
// ---------------------------------------------------------------------------

/// Read-only registry of language configs keyed by file extension, plus the
/// internal run-wide options. Loaded once, shared without locking.
#[derive(Debug)]
pub struct ConfigRegistry {
    pub internal: InternalConfig,
    languages: HashMap<String, LanguageConfig>,
}

impl ConfigRegistry {
    /// Build a registry directly from already-loaded parts. Duplicate
    /// extensions follow the same last-write-wins rule as [`load`](Self::load).
    pub fn from_parts(
        internal: InternalConfig,
        languages: impl IntoIterator<Item = LanguageConfig>,
    ) -> ConfigRegistry {
        let mut map = HashMap::new();
        for config in languages {
            if let Some(previous) = map.insert(config.extension.clone(), config) {
                tracing::warn!(
                    extension = %previous.extension,
                    "duplicate language config for extension, last one wins"
                );
            }
        }
        ConfigRegistry {
            internal,
            languages: map,
        }
    }

    /// Load `internal.json` and every language config (`*.json`) from
    /// `config_dir`. A missing `internal.json` falls back to defaults.
    pub fn load(config_dir: &Path) -> Result<ConfigRegistry> {
        let internal = load_internal(config_dir)?;
        let mut registry = ConfigRegistry {
            internal,
            languages: HashMap::new(),
        };
        registry.load_language_configs(config_dir)?;
        Ok(registry)
    }

    fn load_language_configs(&mut self, config_dir: &Path) -> Result<()> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(config_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();

        for path in entries {
            // Filter out non-json files and the internal config itself.
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()) == Some(INTERNAL_CONFIG_FILE) {
                continue;
            }

            let raw = std::fs::read_to_string(&path)?;
            let config: LanguageConfig =
                serde_json::from_str(&raw).map_err(|e| RuncheckError::Config {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;

            if let Some(previous) = self
                .languages
                .insert(config.extension.clone(), config.clone())
            {
                // Duplicate extensions are a configuration mistake; the
                // later file wins.
                tracing::warn!(
                    extension = %config.extension,
                    replaced = %previous.language,
                    by = %config.language,
                    "duplicate language config for extension, last one wins"
                );
            }
            tracing::info!(language = %self.languages[&config.extension].language, "loaded language config");
        }
        Ok(())
    }

    /// Look up the language config for a file extension (without the dot).
    pub fn language_for(&self, extension: &str) -> Option<&LanguageConfig> {
        self.languages.get(extension)
    }

    pub fn language_count(&self) -> usize {
        self.languages.len()
    }
}

// ---------------------------------------------------------------------------
// Chapter lookup
// ---------------------------------------------------------------------------

/// Load just `internal.json` from `config_dir`, falling back to defaults
/// when absent. Split out from [`ConfigRegistry::load`] so callers can read
/// the configured log level before installing a subscriber and loading the
/// rest of the configuration.
pub fn load_internal(config_dir: &Path) -> Result<InternalConfig> {
    let internal_path = config_dir.join(INTERNAL_CONFIG_FILE);
    if internal_path.is_file() {
        let raw = std::fs::read_to_string(&internal_path)?;
        serde_json::from_str(&raw).map_err(|e| RuncheckError::Config {
            path: internal_path.display().to_string(),
            message: e.to_string(),
        })
    } else {
        tracing::info!(
            path = %internal_path.display(),
            "no internal config found, using defaults"
        );
        Ok(InternalConfig::default())
    }
}

/// Find and load the chapter config governing `candidate` by walking up its
/// ancestor directories until a `chapter.json` is found.
///
/// `Ok(None)` is the explicit "not present" signal; whether that is an
/// error is the caller's policy.
pub fn chapter_for(candidate: &Path) -> Result<Option<ChapterConfig>> {
    let start = candidate.parent().unwrap_or(candidate);
    for dir in start.ancestors() {
        let path = dir.join(CHAPTER_CONFIG_FILE);
        if path.is_file() {
            let raw = std::fs::read_to_string(&path)?;
            let chapter = ChapterConfig::from_json(&raw).map_err(|e| RuncheckError::Config {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            tracing::debug!(
                chapter = %path.display(),
                rows = chapter.expected_values.len(),
                "loaded chapter config"
            );
            return Ok(Some(chapter));
        }
    }
    Ok(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
