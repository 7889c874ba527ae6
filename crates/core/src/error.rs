use crate::geometry::{GeometryError, UnitRect};
use crate::marker::MarkerId;
use crate::repository::RepositoryError;

/// Errors surfaced to the host by annotation commands.
///
/// Validation variants are returned before anything is written.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("index {index_number} is already used on page {page_number}")]
    DuplicateIndex { page_number: u32, index_number: u32 },
    #[error("marker index must be at least 1, got {0}")]
    InvalidIndex(u32),
    #[error("page {0} does not exist")]
    InvalidPage(u32),
    #[error("anchor region {0:?} is outside the unit square")]
    InvalidRegion(UnitRect),
    #[error("a stroke needs at least 2 points, got {points}")]
    EmptyStroke { points: usize },
    #[error("invalid stroke style: {0}")]
    InvalidStyle(String),
    #[error("unknown marker {0}")]
    UnknownMarker(MarkerId),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("repository failure: {0}")]
    RepositoryFailure(#[from] RepositoryError),
}
