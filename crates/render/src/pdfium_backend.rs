//! Full-fidelity rasterization and text extraction through PDFium.

use crate::rasterizer::{PageInfo, PageRasterizer, PageRotation, RenderError, RgbaImage, TextSpan};
use inkmark_scheduler::CancellationToken;
use pdfium_render::prelude::*;
use std::fs;
use std::path::Path;

pub struct PdfiumRasterizer {
    pdfium: &'static Pdfium,
    bytes: Vec<u8>,
    pages: Vec<PageInfo>,
}

fn backend(err: PdfiumError) -> RenderError {
    RenderError::Backend(err.to_string())
}

/// Bind PDFium from the executable's directory, then the working directory,
/// then the system library paths.
fn bind_pdfium() -> Result<Pdfium, RenderError> {
    let exe_dir = std::env::current_exe().ok().and_then(|p| p.parent().map(|p| p.to_path_buf()));

    if let Some(ref dir) = exe_dir {
        if let Ok(bindings) =
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        {
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|err| RenderError::Backend(format!("failed to bind pdfium: {err}")))?;
    Ok(Pdfium::new(bindings))
}

fn rotation_of(page: &PdfPage) -> PageRotation {
    match page.rotation() {
        Ok(PdfPageRenderRotation::Degrees90) => PageRotation::Quarter,
        Ok(PdfPageRenderRotation::Degrees180) => PageRotation::Half,
        Ok(PdfPageRenderRotation::Degrees270) => PageRotation::ThreeQuarter,
        _ => PageRotation::None,
    }
}

impl PdfiumRasterizer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        Self::from_bytes(fs::read(path)?)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RenderError> {
        // Leaked once per document so the handle can be shared with workers.
        let pdfium: &'static Pdfium = Box::leak(Box::new(bind_pdfium()?));

        let pages = {
            let doc = pdfium.load_pdf_from_byte_slice(&bytes, None).map_err(backend)?;
            let mut pages = Vec::new();
            for page in doc.pages().iter() {
                let rotation = rotation_of(&page);
                // PDFium reports the displayed size; store the unrotated one.
                let (w, h) = (page.width().value, page.height().value);
                let (width_pt, height_pt) = if rotation.swaps_axes() { (h, w) } else { (w, h) };
                pages.push(PageInfo { width_pt, height_pt, rotation });
            }
            pages
        };

        if pages.is_empty() {
            return Err(RenderError::NoPages);
        }

        Ok(Self { pdfium, bytes, pages })
    }

    fn with_page<T>(
        &self,
        page_index: u32,
        f: impl FnOnce(&PdfPage) -> Result<T, RenderError>,
    ) -> Result<T, RenderError> {
        self.check_page(page_index)?;
        let index = u16::try_from(page_index)
            .map_err(|_| RenderError::Backend(format!("page index {page_index} too large")))?;
        let doc = self.pdfium.load_pdf_from_byte_slice(&self.bytes, None).map_err(backend)?;
        let page = doc.pages().get(index).map_err(backend)?;
        f(&page)
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_info(&self, page_index: u32) -> Result<PageInfo, RenderError> {
        self.check_page(page_index)?;
        Ok(self.pages[page_index as usize])
    }

    fn rasterize(
        &self,
        page_index: u32,
        scale: f32,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, RenderError> {
        let (width, height) = self.page_info(page_index)?.pixel_size(scale);

        self.with_page(page_index, |page| {
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);
            let bitmap = page.render_with_config(&config).map_err(backend)?;

            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }

            let (bw, bh) = (bitmap.width() as u32, bitmap.height() as u32);
            RgbaImage::from_raw(bw, bh, bitmap.as_rgba_bytes().to_vec())
                .ok_or(RenderError::EmptyRaster(page_index + 1))
        })
    }

    /// Characters are grouped into whitespace-separated spans using their
    /// loose bounds, with y flipped to a top-left origin.
    fn text_spans(&self, page_index: u32) -> Result<Vec<TextSpan>, RenderError> {
        let info = self.page_info(page_index)?;

        self.with_page(page_index, |page| {
            let text_page = page.text().map_err(backend)?;
            let mut spans = Vec::new();
            let mut current: Option<TextSpan> = None;

            for ch in text_page.chars().iter() {
                let Some(c) = ch.unicode_char() else { continue };
                let Ok(bounds) = ch.loose_bounds() else { continue };

                if c.is_whitespace() {
                    spans.extend(current.take());
                    continue;
                }

                let left = bounds.left().value;
                let right = bounds.right().value;
                let top = info.height_pt - bounds.top().value;
                let bottom = info.height_pt - bounds.bottom().value;

                match current.as_mut() {
                    Some(span) => {
                        let span_right = (span.x + span.width).max(right);
                        let span_bottom = (span.y + span.height).max(bottom);
                        span.x = span.x.min(left);
                        span.y = span.y.min(top);
                        span.width = span_right - span.x;
                        span.height = span_bottom - span.y;
                        span.text.push(c);
                    }
                    None => {
                        current = Some(TextSpan {
                            text: c.to_string(),
                            x: left,
                            y: top,
                            width: right - left,
                            height: bottom - top,
                        });
                    }
                }
            }
            spans.extend(current);

            Ok(spans)
        })
    }
}
