//! Rasterize an [`OverlayScene`] onto a page raster with tiny-skia.

use crate::color::Color;
use crate::geometry::ScreenPoint;
use crate::overlay::{OverlayScene, Primitive};
use inkmark_render::RgbaImage;
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaintError {
    #[error(
        "overlay was composed for {scene_width}x{scene_height} but the raster is {width}x{height}"
    )]
    SizeMismatch { scene_width: u32, scene_height: u32, width: u32, height: u32 },
    #[error("raster {0}x{1} cannot be painted")]
    InvalidRaster(u32, u32),
}

/// Paint `scene` over `image`.
///
/// The scene must have been composed for the raster's exact dimensions; a
/// scene from an earlier render is refused rather than drawn misaligned.
pub fn paint_overlay(scene: &OverlayScene, image: &mut RgbaImage) -> Result<(), PaintError> {
    let (width, height) = image.dimensions();
    if (scene.surface.width, scene.surface.height) != (width, height) {
        return Err(PaintError::SizeMismatch {
            scene_width: scene.surface.width,
            scene_height: scene.surface.height,
            width,
            height,
        });
    }

    if scene.is_empty() {
        return Ok(());
    }

    let primitives = scene.primitives();
    with_pixmap(image, |pixmap| {
        for primitive in &primitives {
            draw(pixmap, primitive);
        }
    })
}

fn with_pixmap(image: &mut RgbaImage, f: impl FnOnce(&mut Pixmap)) -> Result<(), PaintError> {
    let (w, h) = image.dimensions();
    let size = tiny_skia::IntSize::from_wh(w, h).ok_or(PaintError::InvalidRaster(w, h))?;
    let mut pixmap =
        Pixmap::from_vec(image.as_raw().clone(), size).ok_or(PaintError::InvalidRaster(w, h))?;

    f(&mut pixmap);

    image.copy_from_slice(pixmap.data());
    Ok(())
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn round_stroke(width: f32) -> Stroke {
    Stroke {
        width: width.max(0.5),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    }
}

fn draw(pixmap: &mut Pixmap, primitive: &Primitive) {
    let identity = Transform::identity();
    match primitive {
        Primitive::Polyline { points, width, color, smooth } => {
            let path = if *smooth { smooth_path(points) } else { straight_path(points) };
            if let Some(path) = path {
                let stroke = round_stroke(*width);
                pixmap.stroke_path(&path, &paint_for(*color), &stroke, identity, None);
            }
        }
        Primitive::Circle { center, radius, fill } => {
            if let Some(path) = circle_path(*center, *radius) {
                pixmap.fill_path(&path, &paint_for(*fill), FillRule::Winding, identity, None);
            }
        }
        Primitive::Ring { center, radius, width, color } => {
            if let Some(path) = circle_path(*center, *radius) {
                let stroke = round_stroke(*width);
                pixmap.stroke_path(&path, &paint_for(*color), &stroke, identity, None);
            }
        }
        Primitive::Label { text, center, size, color } => {
            if let Some(path) = digits_path(text, *center, *size as f32) {
                let stroke = round_stroke((*size as f32 * 0.16).max(1.0));
                pixmap.stroke_path(&path, &paint_for(*color), &stroke, identity, None);
            }
        }
    }
}

fn circle_path(center: ScreenPoint, radius: f64) -> Option<tiny_skia::Path> {
    PathBuilder::from_circle(center.x as f32, center.y as f32, radius as f32)
}

fn straight_path(points: &[ScreenPoint]) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.finish()
}

/// Quadratic curve through segment midpoints, using each captured point as
/// the control point. The curve starts and ends on the raw endpoints.
fn smooth_path(points: &[ScreenPoint]) -> Option<tiny_skia::Path> {
    if points.len() < 3 {
        return straight_path(points);
    }

    let mut pb = PathBuilder::new();
    pb.move_to(points[0].x as f32, points[0].y as f32);
    for pair in points[1..].windows(2) {
        let (control, next) = (pair[0], pair[1]);
        let mid_x = (control.x + next.x) / 2.0;
        let mid_y = (control.y + next.y) / 2.0;
        pb.quad_to(control.x as f32, control.y as f32, mid_x as f32, mid_y as f32);
    }
    let last = points[points.len() - 1];
    pb.line_to(last.x as f32, last.y as f32);
    pb.finish()
}

/// Seven-segment outlines for the decimal digits of `text`, centered on
/// `center` and sized to fit a badge of radius `radius`.
fn digits_path(text: &str, center: ScreenPoint, radius: f32) -> Option<tiny_skia::Path> {
    // Segment order: top, upper right, lower right, bottom, lower left,
    // upper left, middle.
    const SEGMENTS: [[bool; 7]; 10] = [
        [true, true, true, true, true, true, false],
        [false, true, true, false, false, false, false],
        [true, true, false, true, true, false, true],
        [true, true, true, true, false, false, true],
        [false, true, true, false, false, true, true],
        [true, false, true, true, false, true, true],
        [true, false, true, true, true, true, true],
        [true, true, true, false, false, false, false],
        [true, true, true, true, true, true, true],
        [true, true, true, true, false, true, true],
    ];

    let digits: Vec<usize> =
        text.chars().filter_map(|c| c.to_digit(10)).map(|d| d as usize).collect();
    if digits.is_empty() {
        return None;
    }

    let height = radius * 0.9;
    let count = digits.len() as f32;
    let gap = radius * 0.15;
    let width = ((radius * 1.3 - gap * (count - 1.0)) / count).min(radius * 0.5);
    let total = width * count + gap * (count - 1.0);
    let top = center.y as f32 - height / 2.0;
    let mid = top + height / 2.0;
    let bottom = top + height;

    let mut pb = PathBuilder::new();
    for (i, digit) in digits.into_iter().enumerate() {
        let left = center.x as f32 - total / 2.0 + i as f32 * (width + gap);
        let right = left + width;
        let lines = [
            (left, top, right, top),
            (right, top, right, mid),
            (right, mid, right, bottom),
            (left, bottom, right, bottom),
            (left, mid, left, bottom),
            (left, top, left, mid),
            (left, mid, right, mid),
        ];
        for (on, (x0, y0, x1, y1)) in SEGMENTS[digit].iter().zip(lines) {
            if *on {
                pb.move_to(x0, y0);
                pb.line_to(x1, y1);
            }
        }
    }
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{SurfaceSize, UnitPoint, UnitRect};
    use crate::ink::{InkStroke, StrokeStyle};
    use crate::marker::{Category, Marker, MarkerDraft};
    use crate::overlay::{compose, OverlayStyle};
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn blank(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, WHITE)
    }

    #[test]
    fn test_badge_is_filled_with_category_color() {
        let marker = Marker::from_draft(MarkerDraft {
            page_number: 1,
            index_number: 1,
            anchor_region: UnitRect::new(0.25, 0.1, 0.125, 0.05),
            trigger_text: None,
            label: String::new(),
            category: Category::Note,
        });
        let style = OverlayStyle::default();
        let scene = compose(SurfaceSize::new(200, 200), &[marker], &[], None, &style);
        let mut image = blank(200, 200);

        paint_overlay(&scene, &mut image).expect("sizes match");

        // Badge center is (20, 15); sample just inside its edge, away from the digit.
        let pixel = image.get_pixel(20, 5);
        let blue = Category::Note.color();
        assert_eq!((pixel[0], pixel[1], pixel[2]), (blue.r, blue.g, blue.b));
        assert_eq!(*image.get_pixel(150, 150), WHITE);
    }

    #[test]
    fn test_ink_is_translucent_over_paper() {
        let stroke = InkStroke::new(
            1,
            vec![UnitPoint::new(0.0, 0.5), UnitPoint::new(1.0, 0.5)],
            StrokeStyle { color: Color::rgb(0, 0, 0), thickness: 6.0, opacity: 0.5 },
        )
        .expect("valid stroke");
        let style = OverlayStyle::default();
        let scene = compose(SurfaceSize::new(100, 100), &[], &[stroke], None, &style);
        let mut image = blank(100, 100);

        paint_overlay(&scene, &mut image).expect("sizes match");

        let pixel = image.get_pixel(50, 50);
        assert!(pixel[0] > 100 && pixel[0] < 160, "expected mid grey, got {pixel:?}");
        assert_eq!(*image.get_pixel(50, 10), WHITE);
    }

    #[test]
    fn test_stale_scene_is_refused() {
        let scene = compose(SurfaceSize::new(800, 1000), &[], &[], None, &OverlayStyle::default());
        let mut image = blank(1600, 2000);

        let err = paint_overlay(&scene, &mut image).expect_err("dimensions differ");
        assert!(matches!(err, PaintError::SizeMismatch { scene_width: 800, width: 1600, .. }));
    }

    #[test]
    fn test_digit_paths() {
        assert!(digits_path("12", ScreenPoint::new(20.0, 20.0), 12.0).is_some());
        assert!(digits_path("", ScreenPoint::new(20.0, 20.0), 12.0).is_none());
    }

    #[test]
    fn test_smooth_path_handles_short_input() {
        assert!(smooth_path(&[]).is_none());
        let two = [ScreenPoint::new(0.0, 0.0), ScreenPoint::new(10.0, 10.0)];
        assert!(smooth_path(&two).is_some());
        let three =
            [ScreenPoint::new(0.0, 0.0), ScreenPoint::new(5.0, 10.0), ScreenPoint::new(10.0, 0.0)];
        assert!(smooth_path(&three).is_some());
    }
}
