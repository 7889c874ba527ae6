//! Persistence for inkmark: per-document annotation sidecars and viewer
//! preferences.

mod sidecar;

pub use sidecar::{sidecar_path, JsonFileRepository, SIDECAR_SCHEMA_VERSION};

use directories::ProjectDirs;
use inkmark_core::{RepositoryError, StrokeStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PREFS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{path}: unsupported schema version {found}, expected {expected}")]
    UnsupportedVersion { path: PathBuf, found: u32, expected: u32 },
}

impl From<StorageError> for RepositoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Serde(_) | StorageError::UnsupportedVersion { .. } => {
                RepositoryError::Corrupt(err.to_string())
            }
            StorageError::NoDataDirectory | StorageError::Io(_) => {
                RepositoryError::Backend(err.to_string())
            }
        }
    }
}

/// Viewer settings that outlive a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerPreferences {
    pub zoom: f32,
    pub stroke: StrokeStyle,
}

impl Default for ViewerPreferences {
    fn default() -> Self {
        Self { zoom: 1.0, stroke: StrokeStyle::default() }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: ViewerPreferences,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "Inkmark", "Inkmark").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_preferences(&self) -> Result<ViewerPreferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            return Ok(ViewerPreferences::default());
        }

        let bytes = fs::read(&path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != PREFS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                path,
                found: envelope.version,
                expected: PREFS_SCHEMA_VERSION,
            });
        }

        Ok(envelope.preferences)
    }

    pub fn save_preferences(&self, preferences: &ViewerPreferences) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: *preferences };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        sidecar::write_atomic(&self.preferences_path(), &bytes)?;
        Ok(())
    }

    fn preferences_path(&self) -> PathBuf {
        self.root.join("preferences.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkmark_core::Color;

    #[test]
    fn test_preferences_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path().join("nested"));

        let prefs = ViewerPreferences {
            zoom: 2.25,
            stroke: StrokeStyle::new(Color::BLUE, 5.0, 0.75).expect("valid style"),
        };

        store.save_preferences(&prefs).expect("save should succeed");
        let loaded = store.load_preferences().expect("load should succeed");

        assert_eq!(loaded, prefs);
    }

    #[test]
    fn test_load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_preferences().expect("load should succeed");
        assert_eq!(loaded, ViewerPreferences::default());
    }

    #[test]
    fn test_newer_preferences_are_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        fs::write(temp.path().join("preferences.json"), r#"{"version": 9, "preferences": {}}"#)
            .expect("write");

        let err = store.load_preferences().expect_err("version 9 is unknown");
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 9, expected: 1, .. }));
        assert!(matches!(RepositoryError::from(err), RepositoryError::Corrupt(_)));
    }

    #[test]
    fn test_partial_preferences_fill_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        fs::write(
            temp.path().join("preferences.json"),
            r#"{"version": 1, "preferences": {"zoom": 1.5}}"#,
        )
        .expect("write");

        let loaded = store.load_preferences().expect("load should succeed");
        assert_eq!(loaded.zoom, 1.5);
        assert_eq!(loaded.stroke, StrokeStyle::default());
    }
}
