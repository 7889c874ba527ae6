use crate::rasterizer::{PageInfo, PageRasterizer, PageRotation, RenderError, RgbaImage};
use image::Rgba;
use inkmark_scheduler::CancellationToken;
use lopdf::{Dictionary, Document, Object};
use std::fs;
use std::path::Path;

/// Page tree nesting is shallow in practice; the cap guards against cycles.
const MAX_TREE_DEPTH: usize = 32;

const LETTER: (f32, f32) = (612.0, 792.0);
const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const FRAME: Rgba<u8> = Rgba([220, 220, 220, 255]);

/// Pure-Rust backend that reads page geometry with `lopdf`.
///
/// It does not interpret content streams: pages rasterize as blank paper
/// with a hairline frame and expose no text.
#[derive(Debug, Clone)]
pub struct LopdfRasterizer {
    pages: Vec<PageInfo>,
}

impl LopdfRasterizer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        Self::from_bytes(&fs::read(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RenderError> {
        if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(RenderError::Encrypted);
        }

        let doc = Document::load_mem(bytes)?;
        let mut pages = Vec::new();

        for (_, object_id) in doc.get_pages() {
            let dict = doc.get_dictionary(object_id)?;
            let (width_pt, height_pt) = inherited(&doc, dict, b"MediaBox")
                .and_then(media_box_size)
                .unwrap_or(LETTER);
            let rotation = inherited(&doc, dict, b"Rotate")
                .and_then(|obj| obj.as_i64().ok())
                .map(PageRotation::from_degrees)
                .unwrap_or_default();

            pages.push(PageInfo { width_pt, height_pt, rotation });
        }

        if pages.is_empty() {
            return Err(RenderError::NoPages);
        }

        Ok(Self { pages })
    }
}

/// Look `key` up on the page, then on its ancestors in the page tree.
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut dict = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn media_box_size(obj: &Object) -> Option<(f32, f32)> {
    let array = obj.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;
    Some(((x1 - x0).abs(), (y1 - y0).abs()))
}

impl PageRasterizer for LopdfRasterizer {
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
        let info = self.page_info(page_index)?;
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let (width, height) = info.pixel_size(scale);
        let mut image = RgbaImage::from_pixel(width, height, PAPER);

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, FRAME);
                image.put_pixel(x, height - 1, FRAME);
            }
            for y in 0..height {
                image.put_pixel(0, y, FRAME);
                image.put_pixel(width - 1, y, FRAME);
            }
        }

        Ok(image)
    }
}
