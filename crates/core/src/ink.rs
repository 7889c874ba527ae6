//! Freeform ink strokes.

use crate::color::Color;
use crate::error::AnnotationError;
use crate::geometry::UnitPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeId(pub Uuid);

impl StrokeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StrokeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StrokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for StrokeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Pen settings applied to newly drawn strokes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Color,
    /// Screen pixels; does not scale with zoom.
    pub thickness: f32,
    /// In `(0, 1]`.
    pub opacity: f32,
}

impl StrokeStyle {
    pub fn new(color: Color, thickness: f32, opacity: f32) -> Result<Self, AnnotationError> {
        let style = Self { color, thickness, opacity };
        style.validate()?;
        Ok(style)
    }

    pub fn validate(&self) -> Result<(), AnnotationError> {
        if !(self.opacity > 0.0 && self.opacity <= 1.0) {
            return Err(AnnotationError::InvalidStyle(format!(
                "opacity must be in (0, 1], got {}",
                self.opacity
            )));
        }
        if !(self.thickness.is_finite() && self.thickness > 0.0) {
            return Err(AnnotationError::InvalidStyle(format!(
                "thickness must be positive, got {}",
                self.thickness
            )));
        }
        Ok(())
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self { color: Color::RED, thickness: 3.0, opacity: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InkStroke {
    pub id: StrokeId,
    /// 1-based page number.
    pub page_number: u32,
    #[serde(with = "path_codec")]
    pub path: Vec<UnitPoint>,
    pub color: Color,
    pub thickness: f32,
    pub opacity: f32,
}

impl InkStroke {
    pub fn new(
        page_number: u32,
        path: Vec<UnitPoint>,
        style: StrokeStyle,
    ) -> Result<Self, AnnotationError> {
        if path.len() < 2 {
            return Err(AnnotationError::EmptyStroke { points: path.len() });
        }
        style.validate()?;

        Ok(Self {
            id: StrokeId::new(),
            page_number,
            path,
            color: style.color,
            thickness: style.thickness,
            opacity: style.opacity,
        })
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle { color: self.color, thickness: self.thickness, opacity: self.opacity }
    }
}

/// String form of a stroke path, used only at the storage boundary.
///
/// The format is an SVG-style absolute polyline: `M x,y L x,y L x,y`.
pub mod path_codec {
    use crate::geometry::UnitPoint;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Write;

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum PathCodecError {
        #[error("path is empty")]
        Empty,
        #[error("a stroke needs at least 2 points, got {0}")]
        TooShort(usize),
        #[error("expected command {expected:?} at token {position}, found {found:?}")]
        UnexpectedCommand { expected: &'static str, position: usize, found: String },
        #[error("malformed coordinate pair {0:?}")]
        BadPoint(String),
    }

    pub fn encode(points: &[UnitPoint]) -> String {
        let mut out = String::new();
        for (i, point) in points.iter().enumerate() {
            let command = if i == 0 { 'M' } else { 'L' };
            if i > 0 {
                out.push(' ');
            }
            // Display for f64 is shortest round-trip, so decode is exact.
            let _ = write!(out, "{command}{},{}", point.x, point.y);
        }
        out
    }

    pub fn decode(input: &str) -> Result<Vec<UnitPoint>, PathCodecError> {
        let mut points = Vec::new();

        for (position, token) in input.split_whitespace().enumerate() {
            let expected = if position == 0 { "M" } else { "L" };
            let body = token.strip_prefix(expected).ok_or_else(|| {
                PathCodecError::UnexpectedCommand { expected, position, found: token.to_owned() }
            })?;

            let (x, y) =
                body.split_once(',').ok_or_else(|| PathCodecError::BadPoint(body.to_owned()))?;
            let parse = |v: &str| {
                v.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| PathCodecError::BadPoint(body.to_owned()))
            };
            points.push(UnitPoint::new(parse(x)?, parse(y)?));
        }

        if points.is_empty() {
            return Err(PathCodecError::Empty);
        }
        Ok(points)
    }

    pub fn serialize<S: Serializer>(
        points: &[UnitPoint],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(points))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<UnitPoint>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let points = decode(&raw).map_err(serde::de::Error::custom)?;
        if points.len() < 2 {
            return Err(serde::de::Error::custom(PathCodecError::TooShort(points.len())));
        }
        Ok(points)
    }
}
