//! Persistent user settings.
//!
//! The shell remembers the last-used field values (API key, input path,
//! output path, recursive flag) across invocations in a flat JSON document
//! at a fixed per-user path. The contract is deliberately forgiving:
//! `load` never fails — a missing or malformed file yields defaults with a
//! warning — and `save` replaces the file atomically so a crash mid-write
//! cannot truncate a previously good settings file.
//!
//! Unknown keys in the file are ignored and missing keys take their
//! defaults, so the format can grow without a schema version.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The persisted settings record.
///
/// Every field has a safe default so the record is always loadable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// API key for the description service.
    pub api_key: String,
    /// Last-used input file or directory.
    pub input_path: String,
    /// Last-used output directory.
    pub output_path: String,
    /// Last-used recursive-scan flag.
    pub recursive: bool,
}

/// Handle to the settings document at a fixed path.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Open the store at the per-user default location
    /// (`~/.pdfscribe/settings.json`).
    pub fn open() -> Self {
        Self {
            path: Self::default_path(),
        }
    }

    /// Open the store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The fixed per-user settings path.
    ///
    /// Falls back to a relative path when no home directory can be resolved
    /// (containers, stripped-down CI environments).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pdfscribe")
            .join("settings.json")
    }

    /// Path backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings record.
    ///
    /// Never fails: a missing file yields defaults silently; unreadable or
    /// malformed content yields defaults with a warning.
    pub fn load(&self) -> Settings {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings file at {}, using defaults", self.path.display());
                return Settings::default();
            }
            Err(e) => {
                warn!("failed to read settings from {}: {e}", self.path.display());
                return Settings::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "malformed settings at {} ({e}), using defaults",
                    self.path.display()
                );
                Settings::default()
            }
        }
    }

    /// Persist the settings record.
    ///
    /// Writes to a temp file in the target directory and renames over the
    /// destination, so readers never observe a half-written document.
    pub fn save(&self, settings: &Settings) -> std::io::Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(settings)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!("settings saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::at(dir.path().join("settings.json"))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let settings = Settings {
            api_key: "sk-test-123".into(),
            input_path: "/data/reports".into(),
            output_path: "/data/out".into(),
            recursive: true,
        };
        store.save(&settings).unwrap();

        // A fresh store handle at the same path reproduces the record exactly.
        let reread = store_in(&dir).load();
        assert_eq!(reread, settings);
    }

    #[test]
    fn malformed_content_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json at all").unwrap();
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn unknown_fields_are_ignored_and_missing_fields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"apiKey":"k","futureKnob":42}"#,
        )
        .unwrap();

        let settings = store.load();
        assert_eq!(settings.api_key, "k");
        assert_eq!(settings.input_path, "");
        assert!(!settings.recursive);
    }

    #[test]
    fn keys_are_camel_case_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store
            .save(&Settings {
                api_key: "k".into(),
                input_path: "i".into(),
                output_path: "o".into(),
                recursive: false,
            })
            .unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"apiKey\""), "got: {raw}");
        assert!(raw.contains("\"inputPath\""));
        assert!(raw.contains("\"outputPath\""));
        assert!(raw.contains("\"recursive\""));
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::at(dir.path().join("nested").join("settings.json"));
        store.save(&Settings::default()).unwrap();
        assert!(store.path().exists());
    }
}
