//! In-memory rasterizer for headless hosts and tests.

use crate::rasterizer::{PageInfo, PageRasterizer, RenderError, RgbaImage, TextSpan};
use image::Rgba;
use inkmark_scheduler::CancellationToken;
use std::thread;
use std::time::{Duration, Instant};

const CANCEL_POLL: Duration = Duration::from_millis(2);

#[derive(Debug, Clone)]
struct MemoryPage {
    info: PageInfo,
    spans: Vec<TextSpan>,
    fail: bool,
    delay: Duration,
}

/// Blank pages of fixed geometry with optional positioned text.
///
/// Pages can be told to fail or to take a while, which makes render
/// failure and supersession observable without a real document.
#[derive(Debug, Clone)]
pub struct MemoryRasterizer {
    pages: Vec<MemoryPage>,
    background: [u8; 4],
}

impl MemoryRasterizer {
    pub fn new() -> Self {
        Self { pages: Vec::new(), background: [255, 255, 255, 255] }
    }

    /// Append a page and return its zero-based index.
    pub fn push_page(&mut self, info: PageInfo) -> u32 {
        self.pages.push(MemoryPage { info, spans: Vec::new(), fail: false, delay: Duration::ZERO });
        self.pages.len() as u32 - 1
    }

    pub fn with_page(mut self, info: PageInfo) -> Self {
        self.push_page(info);
        self
    }

    pub fn with_text(mut self, page_index: u32, spans: Vec<TextSpan>) -> Self {
        if let Some(page) = self.pages.get_mut(page_index as usize) {
            page.spans = spans;
        }
        self
    }

    pub fn with_failure(mut self, page_index: u32) -> Self {
        if let Some(page) = self.pages.get_mut(page_index as usize) {
            page.fail = true;
        }
        self
    }

    pub fn with_delay(mut self, page_index: u32, delay: Duration) -> Self {
        if let Some(page) = self.pages.get_mut(page_index as usize) {
            page.delay = delay;
        }
        self
    }

    fn page(&self, page_index: u32) -> Result<&MemoryPage, RenderError> {
        self.check_page(page_index)?;
        Ok(&self.pages[page_index as usize])
    }
}

impl Default for MemoryRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRasterizer for MemoryRasterizer {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_info(&self, page_index: u32) -> Result<PageInfo, RenderError> {
        Ok(self.page(page_index)?.info)
    }

    fn rasterize(
        &self,
        page_index: u32,
        scale: f32,
        cancel: &CancellationToken,
    ) -> Result<RgbaImage, RenderError> {
        let page = self.page(page_index)?;

        let deadline = Instant::now() + page.delay;
        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            thread::sleep(CANCEL_POLL);
        }
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        if page.fail {
            return Err(RenderError::Backend(format!("page {} is unreadable", page_index + 1)));
        }

        let (width, height) = page.info.pixel_size(scale);
        Ok(RgbaImage::from_pixel(width, height, Rgba(self.background)))
    }

    fn text_spans(&self, page_index: u32) -> Result<Vec<TextSpan>, RenderError> {
        Ok(self.page(page_index)?.spans.clone())
    }
}
