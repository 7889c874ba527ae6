//! Storage boundary for markers and strokes.

use crate::ink::{InkStroke, StrokeId};
use crate::marker::{Marker, MarkerId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// CRUD over the annotation records of one document.
///
/// Lists are returned in insertion order. Deleting an id that is not stored
/// succeeds.
pub trait AnnotationRepository {
    fn list_markers(&self, page_number: u32) -> Result<Vec<Marker>, RepositoryError>;
    fn find_marker(&self, id: MarkerId) -> Result<Option<Marker>, RepositoryError>;
    fn upsert_marker(&mut self, marker: Marker) -> Result<(), RepositoryError>;
    fn delete_marker(&mut self, id: MarkerId) -> Result<(), RepositoryError>;

    fn list_strokes(&self, page_number: u32) -> Result<Vec<InkStroke>, RepositoryError>;
    fn upsert_stroke(&mut self, stroke: InkStroke) -> Result<(), RepositoryError>;
    fn delete_stroke(&mut self, id: StrokeId) -> Result<(), RepositoryError>;
}

/// Records held in insertion order. Also the in-memory model behind file
/// backed repositories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryRepository {
    pub markers: Vec<Marker>,
    pub strokes: Vec<InkStroke>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.id == id)
    }
}

impl AnnotationRepository for InMemoryRepository {
    fn list_markers(&self, page_number: u32) -> Result<Vec<Marker>, RepositoryError> {
        Ok(self.markers.iter().filter(|m| m.page_number == page_number).cloned().collect())
    }

    fn find_marker(&self, id: MarkerId) -> Result<Option<Marker>, RepositoryError> {
        Ok(self.marker(id).cloned())
    }

    fn upsert_marker(&mut self, marker: Marker) -> Result<(), RepositoryError> {
        match self.markers.iter_mut().find(|existing| existing.id == marker.id) {
            Some(existing) => *existing = marker,
            None => self.markers.push(marker),
        }
        Ok(())
    }

    fn delete_marker(&mut self, id: MarkerId) -> Result<(), RepositoryError> {
        self.markers.retain(|marker| marker.id != id);
        Ok(())
    }

    fn list_strokes(&self, page_number: u32) -> Result<Vec<InkStroke>, RepositoryError> {
        Ok(self.strokes.iter().filter(|s| s.page_number == page_number).cloned().collect())
    }

    fn upsert_stroke(&mut self, stroke: InkStroke) -> Result<(), RepositoryError> {
        match self.strokes.iter_mut().find(|existing| existing.id == stroke.id) {
            Some(existing) => *existing = stroke,
            None => self.strokes.push(stroke),
        }
        Ok(())
    }

    fn delete_stroke(&mut self, id: StrokeId) -> Result<(), RepositoryError> {
        self.strokes.retain(|stroke| stroke.id != id);
        Ok(())
    }
}
