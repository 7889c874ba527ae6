//! Inkmark Render Library
//!
//! Page rasterization for the annotation engine.
//!
//! A [`PageRasterizer`] turns one page into an RGBA raster at a given scale and
//! reports positioned text when the backend can extract it. The
//! [`DocumentRenderer`] drives a rasterizer on worker threads and guarantees
//! that only the newest request for its surface is ever delivered.
//!
//! Backends:
//! - [`LopdfRasterizer`]: pure Rust, geometry only (always available)
//! - [`MemoryRasterizer`]: blank pages for headless hosts and tests
//! - `PdfiumRasterizer`: full rendering and text, behind the `pdfium` feature

mod lopdf_backend;
mod memory;
#[cfg(feature = "pdfium")]
mod pdfium_backend;
mod rasterizer;
mod renderer;

pub use lopdf_backend::LopdfRasterizer;
pub use memory::MemoryRasterizer;
#[cfg(feature = "pdfium")]
pub use pdfium_backend::PdfiumRasterizer;
pub use rasterizer::{PageInfo, PageRasterizer, PageRotation, RenderError, RgbaImage, TextSpan};
pub use renderer::{DocumentRenderer, RenderEvent, RenderOutput};

/// Open `bytes` with the best backend compiled in.
///
/// With the `pdfium` feature, PDFium is preferred and lopdf is the fallback
/// when the library cannot be bound.
pub fn open_document(bytes: Vec<u8>) -> Result<Box<dyn PageRasterizer>, RenderError> {
    #[cfg(feature = "pdfium")]
    {
        match PdfiumRasterizer::from_bytes(bytes.clone()) {
            Ok(rasterizer) => return Ok(Box::new(rasterizer)),
            Err(err) => log::warn!("pdfium unavailable, falling back to lopdf: {err}"),
        }
    }

    Ok(Box::new(LopdfRasterizer::from_bytes(&bytes)?))
}
