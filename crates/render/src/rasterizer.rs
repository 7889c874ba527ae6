//! Backend-neutral page rasterization types.

use image::{ImageBuffer, Rgba};
use inkmark_scheduler::CancellationToken;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("encrypted PDFs are not supported by this backend")]
    Encrypted,
    #[error("document has no pages")]
    NoPages,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("render scale must be positive and finite, got {0}")]
    InvalidScale(f32),
    #[error("backend produced an empty raster for page {0}")]
    EmptyRaster(u32),
    #[error("render was cancelled")]
    Cancelled,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Clockwise page rotation as stored in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageRotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl PageRotation {
    /// Normalize a raw `/Rotate` value. Values that are not multiples of 90
    /// are invalid in PDF and fall back to no rotation.
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => Self::Quarter,
            180 => Self::Half,
            270 => Self::ThreeQuarter,
            _ => Self::None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }

    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Quarter | Self::ThreeQuarter)
    }
}

/// A positioned run of text. Page-space spans use points with a top-left
/// origin on the unrotated page; rendered spans use raster pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Native geometry of one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// Unrotated MediaBox width in points.
    pub width_pt: f32,
    /// Unrotated MediaBox height in points.
    pub height_pt: f32,
    pub rotation: PageRotation,
}

impl PageInfo {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt, rotation: PageRotation::None }
    }

    pub fn with_rotation(mut self, rotation: PageRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Size of the page as displayed, after its rotation is applied.
    pub fn display_size_pt(&self) -> (f32, f32) {
        if self.rotation.swaps_axes() {
            (self.height_pt, self.width_pt)
        } else {
            (self.width_pt, self.height_pt)
        }
    }

    /// Raster dimensions for the displayed page at `scale` pixels per point.
    pub fn pixel_size(&self, scale: f32) -> (u32, u32) {
        let (width, height) = self.display_size_pt();
        ((width * scale).round().max(1.0) as u32, (height * scale).round().max(1.0) as u32)
    }

    /// Map a point on the unrotated page into displayed page space.
    fn rotate_point(&self, x: f32, y: f32) -> (f32, f32) {
        let (w, h) = (self.width_pt, self.height_pt);
        match self.rotation {
            PageRotation::None => (x, y),
            PageRotation::Quarter => (h - y, x),
            PageRotation::Half => (w - x, h - y),
            PageRotation::ThreeQuarter => (y, w - x),
        }
    }

    /// Map a page-space span onto a raster of `pixel_width` x `pixel_height`.
    pub fn span_to_pixels(&self, span: &TextSpan, pixel_width: u32, pixel_height: u32) -> TextSpan {
        let (display_w, display_h) = self.display_size_pt();
        let sx = pixel_width as f32 / display_w.max(f32::EPSILON);
        let sy = pixel_height as f32 / display_h.max(f32::EPSILON);

        let (x0, y0) = self.rotate_point(span.x, span.y);
        let (x1, y1) = self.rotate_point(span.x + span.width, span.y + span.height);
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (top, bottom) = (y0.min(y1), y0.max(y1));

        TextSpan {
            text: span.text.clone(),
            x: left * sx,
            y: top * sy,
            width: (right - left) * sx,
            height: (bottom - top) * sy,
        }
    }
}

/// A source of page rasters.
///
/// Implementations honour the page's stored rotation and never apply one of
/// their own: a page with `/Rotate 90` rasterizes with swapped dimensions.
pub trait PageRasterizer: Send + Sync {
    fn page_count(&self) -> u32;

    fn page_info(&self, page_index: u32) -> Result<PageInfo, RenderError>;

    /// Rasterize the displayed page at `scale` pixels per point. Long-running
    /// backends check `cancel` and return [`RenderError::Cancelled`].
    fn rasterize(
        &self,
        page_index: u32,
        scale: f32,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, RenderError>;

    /// Positioned text of the page in unrotated page space. Image-only pages
    /// return an empty list.
    fn text_spans(&self, _page_index: u32) -> Result<Vec<TextSpan>, RenderError> {
        Ok(Vec::new())
    }

    fn check_page(&self, page_index: u32) -> Result<(), RenderError> {
        let page_count = self.page_count();
        if page_index >= page_count {
            return Err(RenderError::PageOutOfRange { page: page_index + 1, page_count });
        }
        Ok(())
    }
}

impl<T: PageRasterizer + ?Sized> PageRasterizer for Box<T> {
    fn page_count(&self) -> u32 {
        (**self).page_count()
    }

    fn page_info(&self, page_index: u32) -> Result<PageInfo, RenderError> {
        (**self).page_info(page_index)
    }

    fn rasterize(
        &self,
        page_index: u32,
        scale: f32,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, RenderError> {
        (**self).rasterize(page_index, scale, cancel)
    }

    fn text_spans(&self, page_index: u32) -> Result<Vec<TextSpan>, RenderError> {
        (**self).text_spans(page_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(PageRotation::from_degrees(0), PageRotation::None);
        assert_eq!(PageRotation::from_degrees(90), PageRotation::Quarter);
        assert_eq!(PageRotation::from_degrees(-90), PageRotation::ThreeQuarter);
        assert_eq!(PageRotation::from_degrees(450), PageRotation::Quarter);
        assert_eq!(PageRotation::from_degrees(45), PageRotation::None);
    }

    #[test]
    fn test_pixel_size_swaps_for_quarter_turns() {
        let page = PageInfo::new(600.0, 800.0).with_rotation(PageRotation::Quarter);
        assert_eq!(page.pixel_size(1.0), (800, 600));

        let upright = PageInfo::new(600.0, 800.0).with_rotation(PageRotation::Half);
        assert_eq!(upright.pixel_size(2.0), (1200, 1600));
    }

    #[test]
    fn test_span_to_pixels_scales_unrotated() {
        let page = PageInfo::new(100.0, 200.0);
        let span = TextSpan { text: "word".into(), x: 10.0, y: 20.0, width: 30.0, height: 5.0 };

        let mapped = page.span_to_pixels(&span, 200, 400);
        assert_eq!(mapped.x, 20.0);
        assert_eq!(mapped.y, 40.0);
        assert_eq!(mapped.width, 60.0);
        assert_eq!(mapped.height, 10.0);
    }

    #[test]
    fn test_span_to_pixels_follows_quarter_turn() {
        // 100 x 200 page shown rotated clockwise becomes 200 x 100.
        let page = PageInfo::new(100.0, 200.0).with_rotation(PageRotation::Quarter);
        let span = TextSpan { text: "a".into(), x: 0.0, y: 0.0, width: 10.0, height: 20.0 };

        let mapped = page.span_to_pixels(&span, 200, 100);
        assert_eq!(mapped.x, 180.0);
        assert_eq!(mapped.y, 0.0);
        assert_eq!(mapped.width, 20.0);
        assert_eq!(mapped.height, 10.0);
    }
}
