//! Screen and unit-square coordinate spaces.
//!
//! Screen coordinates are raster pixels with a top-left origin. Unit
//! coordinates divide each axis by the rendered surface size, so a stored
//! unit point lands on the same spot of the page at every zoom level.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("surface {width}x{height} has no area; render the page first")]
    EmptySurface { width: u32, height: u32 },
}

/// Pixel dimensions of a rendered page surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn checked(self) -> Result<(f64, f64), GeometryError> {
        if self.is_empty() {
            return Err(GeometryError::EmptySurface { width: self.width, height: self.height });
        }
        Ok((f64::from(self.width), f64::from(self.height)))
    }

    /// Clamp `point` onto the surface.
    pub fn clamp(&self, point: ScreenPoint) -> ScreenPoint {
        ScreenPoint {
            x: point.x.clamp(0.0, f64::from(self.width)),
            y: point.y.clamp(0.0, f64::from(self.height)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitPoint {
    pub x: f64,
    pub y: f64,
}

impl UnitPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &UnitPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Distance to the segment `start..end`, projecting onto the segment and
    /// clamping to its endpoints.
    pub fn distance_to_segment(&self, start: &UnitPoint, end: &UnitPoint) -> f64 {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let length_sq = dx * dx + dy * dy;

        if length_sq < 1e-12 {
            return self.distance_to(start);
        }

        let t = (((self.x - start.x) * dx + (self.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
        self.distance_to(&UnitPoint::new(start.x + t * dx, start.y + t * dy))
    }
}

/// Axis-aligned rectangle in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Bounding rectangle of two corners given in any order.
    pub fn from_corners(a: ScreenPoint, b: ScreenPoint) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self { x, y, width: (a.x - b.x).abs(), height: (a.y - b.y).abs() }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Any shared point counts, including touching edges, so a zero-area
    /// rectangle still hits whatever it sits on.
    pub fn intersects(&self, other: &ScreenRect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }
}

/// Axis-aligned rectangle in unit-square coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl UnitRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Returns `true` when the rectangle lies inside the unit square.
    pub fn is_within_unit_square(&self) -> bool {
        let finite = [self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite());
        finite
            && self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width <= 1.0 + 1e-9
            && self.y + self.height <= 1.0 + 1e-9
    }
}

/// Convert a screen point into unit-square coordinates of `surface`.
pub fn to_unit(point: ScreenPoint, surface: SurfaceSize) -> Result<UnitPoint, GeometryError> {
    let (width, height) = surface.checked()?;
    Ok(UnitPoint { x: point.x / width, y: point.y / height })
}

/// Convert a unit-square point back onto `surface`.
pub fn to_screen(point: UnitPoint, surface: SurfaceSize) -> ScreenPoint {
    ScreenPoint {
        x: point.x * f64::from(surface.width),
        y: point.y * f64::from(surface.height),
    }
}

pub fn rect_to_unit(rect: ScreenRect, surface: SurfaceSize) -> Result<UnitRect, GeometryError> {
    let (width, height) = surface.checked()?;
    Ok(UnitRect {
        x: rect.x / width,
        y: rect.y / height,
        width: rect.width / width,
        height: rect.height / height,
    })
}

pub fn rect_to_screen(rect: UnitRect, surface: SurfaceSize) -> ScreenRect {
    let (width, height) = (f64::from(surface.width), f64::from(surface.height));
    ScreenRect {
        x: rect.x * width,
        y: rect.y * height,
        width: rect.width * width,
        height: rect.height * height,
    }
}
