//! JSON sidecar holding the annotations of one document.

use crate::StorageError;
use inkmark_core::{
    AnnotationRepository, InMemoryRepository, InkStroke, Marker, MarkerId, RepositoryError,
    StrokeId,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const SIDECAR_SCHEMA_VERSION: u32 = 1;

/// `<pdf>.inkmark.json` next to the document.
pub fn sidecar_path(pdf: &Path) -> PathBuf {
    let mut name = pdf.as_os_str().to_owned();
    name.push(".inkmark.json");
    PathBuf::from(name)
}

#[derive(Deserialize)]
struct SidecarFile {
    version: u32,
    #[serde(default)]
    markers: Vec<Marker>,
    #[serde(default)]
    strokes: Vec<InkStroke>,
}

#[derive(Serialize)]
struct SidecarRef<'a> {
    version: u32,
    markers: &'a [Marker],
    strokes: &'a [InkStroke],
}

/// Repository backed by a JSON file.
///
/// Every mutation rewrites the whole file. The in-memory records change only
/// after the write succeeded, so a failed write leaves both sides as they
/// were.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    records: InMemoryRepository,
}

impl JsonFileRepository {
    /// Load `path`, or start empty when it does not exist yet. Nothing is
    /// written until the first mutation.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if !path.exists() {
            log::debug!("no sidecar at {}, starting empty", path.display());
            return Ok(Self { path, records: InMemoryRepository::new() });
        }

        let bytes = fs::read(&path)?;
        let file: SidecarFile = serde_json::from_slice(&bytes)?;
        if file.version != SIDECAR_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                path,
                found: file.version,
                expected: SIDECAR_SCHEMA_VERSION,
            });
        }

        log::debug!(
            "loaded {} markers and {} strokes from {}",
            file.markers.len(),
            file.strokes.len(),
            path.display()
        );
        let records = InMemoryRepository { markers: file.markers, strokes: file.strokes };
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &InMemoryRepository {
        &self.records
    }

    fn commit(
        &mut self,
        change: impl FnOnce(&mut InMemoryRepository) -> Result<(), RepositoryError>,
    ) -> Result<(), RepositoryError> {
        let mut next = self.records.clone();
        change(&mut next)?;
        if next == self.records {
            return Ok(());
        }

        let file = SidecarRef {
            version: SIDECAR_SCHEMA_VERSION,
            markers: &next.markers,
            strokes: &next.strokes,
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(StorageError::from)?;
        write_atomic(&self.path, &bytes).map_err(StorageError::from)?;

        self.records = next;
        Ok(())
    }
}

impl AnnotationRepository for JsonFileRepository {
    fn list_markers(&self, page_number: u32) -> Result<Vec<Marker>, RepositoryError> {
        self.records.list_markers(page_number)
    }

    fn find_marker(&self, id: MarkerId) -> Result<Option<Marker>, RepositoryError> {
        self.records.find_marker(id)
    }

    fn upsert_marker(&mut self, marker: Marker) -> Result<(), RepositoryError> {
        self.commit(|records| records.upsert_marker(marker))
    }

    fn delete_marker(&mut self, id: MarkerId) -> Result<(), RepositoryError> {
        self.commit(|records| records.delete_marker(id))
    }

    fn list_strokes(&self, page_number: u32) -> Result<Vec<InkStroke>, RepositoryError> {
        self.records.list_strokes(page_number)
    }

    fn upsert_stroke(&mut self, stroke: InkStroke) -> Result<(), RepositoryError> {
        self.commit(|records| records.upsert_stroke(stroke))
    }

    fn delete_stroke(&mut self, id: StrokeId) -> Result<(), RepositoryError> {
        self.commit(|records| records.delete_stroke(id))
    }
}

/// Write through a sibling `.tmp` file and rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
