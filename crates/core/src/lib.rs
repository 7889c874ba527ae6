//! Inkmark core
//!
//! Annotation model and interaction logic for reading PDFs with numbered
//! margin markers and freehand ink. Everything is stored in page-relative
//! unit coordinates and projected onto the current render surface on
//! demand, so annotations survive any zoom level.
//!
//! The entry point for hosts is [`AnnotationSession`]; the other modules are
//! usable on their own for tooling.

pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod ink;
pub mod marker;
pub mod overlay;
pub mod paint;
pub mod repository;
pub mod selection;
pub mod session;
pub mod text;
pub mod undo;

pub use color::{Color, ColorParseError};
pub use config::{ConfigError, SessionConfig, ZoomPolicy};
pub use error::AnnotationError;
pub use geometry::{
    GeometryError, ScreenPoint, ScreenRect, SurfaceSize, UnitPoint, UnitRect,
};
pub use ink::{InkStroke, StrokeId, StrokeStyle};
pub use marker::{Category, Marker, MarkerDraft, MarkerId};
pub use overlay::{Badge, Connector, InkPath, MarginSide, OverlayScene, OverlayStyle, Primitive};
pub use paint::{paint_overlay, PaintError};
pub use repository::{AnnotationRepository, InMemoryRepository, RepositoryError};
pub use selection::{GestureContext, GestureEvent, Mode, SelectionEngine};
pub use session::{AnnotationSession, PageRenderState, SessionEvent, SessionState};
pub use text::TextFragment;
pub use undo::UndoStack;
