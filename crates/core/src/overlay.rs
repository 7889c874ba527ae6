//! Screen-space overlay composition.
//!
//! [`compose`] is a pure function of the page's records and the current
//! surface size. It rebuilds the whole scene on every call, so composing
//! twice with the same inputs yields the same scene, and composing after a
//! zoom change re-derives every position from unit coordinates.

use crate::color::Color;
use crate::geometry::{self, ScreenPoint, SurfaceSize};
use crate::ink::{InkStroke, StrokeId};
use crate::marker::{Marker, MarkerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginSide {
    Left,
    Right,
}

/// Fixed pixel metrics and colors of the overlay. None of the distances
/// scale with zoom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// Horizontal step from the anchor edge away from the rectangle.
    pub connector_offset: f64,
    /// Distance of the connector end from the page edge.
    pub margin_inset: f64,
    pub badge_radius: f64,
    /// Height of the badge center above the connector end.
    pub badge_lift: f64,
    pub connector_width: f32,
    pub connector_color: Color,
    pub emphasis_color: Color,
    pub outline_width: f32,
    pub label_color: Color,
    /// Push overlapping badges in the same margin apart vertically.
    pub stack_badges: bool,
    pub badge_gap: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            connector_offset: 10.0,
            margin_inset: 20.0,
            badge_radius: 12.0,
            badge_lift: 15.0,
            connector_width: 1.5,
            connector_color: Color::SLATE,
            emphasis_color: Color::ORANGE,
            outline_width: 3.0,
            label_color: Color::WHITE,
            stack_badges: false,
            badge_gap: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InkPath {
    pub stroke_id: StrokeId,
    pub points: Vec<ScreenPoint>,
    pub color: Color,
    pub thickness: f32,
    pub opacity: f32,
}

/// Three-point polyline from a marker's anchor to its margin.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub marker_id: MarkerId,
    pub side: MarginSide,
    /// Anchor edge, offset point, margin end.
    pub points: [ScreenPoint; 3],
    pub color: Color,
    pub width: f32,
}

/// Index badge. Doubles as the click target of its marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub marker_id: MarkerId,
    pub center: ScreenPoint,
    pub radius: f64,
    pub fill: Color,
    /// Set only for the selected marker.
    pub outline: Option<Color>,
    pub label: String,
}

impl Badge {
    pub fn contains(&self, point: ScreenPoint) -> bool {
        self.center.distance_to(&point) <= self.radius
    }
}

/// Drawing operations in paint order.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Polyline { points: Vec<ScreenPoint>, width: f32, color: Color, smooth: bool },
    Circle { center: ScreenPoint, radius: f64, fill: Color },
    Ring { center: ScreenPoint, radius: f64, width: f32, color: Color },
    Label { text: String, center: ScreenPoint, size: f64, color: Color },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayScene {
    pub surface: SurfaceSize,
    pub ink: Vec<InkPath>,
    pub connectors: Vec<Connector>,
    pub badges: Vec<Badge>,
    pub style: OverlayStyle,
}

impl OverlayScene {
    /// Badges registered for click dispatch.
    pub fn hit_targets(&self) -> &[Badge] {
        &self.badges
    }

    pub fn is_empty(&self) -> bool {
        self.ink.is_empty() && self.connectors.is_empty() && self.badges.is_empty()
    }

    /// Flatten the scene: ink first, then connectors, then badges.
    pub fn primitives(&self) -> Vec<Primitive> {
        let capacity = self.ink.len() + self.connectors.len() + self.badges.len() * 3;
        let mut out = Vec::with_capacity(capacity);

        for ink in &self.ink {
            out.push(Primitive::Polyline {
                points: ink.points.clone(),
                width: ink.thickness,
                color: ink.color.with_opacity(ink.opacity),
                smooth: true,
            });
        }

        for connector in &self.connectors {
            out.push(Primitive::Polyline {
                points: connector.points.to_vec(),
                width: connector.width,
                color: connector.color,
                smooth: false,
            });
        }

        for badge in &self.badges {
            out.push(Primitive::Circle {
                center: badge.center,
                radius: badge.radius,
                fill: badge.fill,
            });
            if let Some(color) = badge.outline {
                out.push(Primitive::Ring {
                    center: badge.center,
                    radius: badge.radius,
                    width: self.style.outline_width,
                    color,
                });
            }
            out.push(Primitive::Label {
                text: badge.label.clone(),
                center: badge.center,
                size: badge.radius,
                color: self.style.label_color,
            });
        }

        out
    }
}

/// Lay out connectors and badges for `markers` and project `strokes` onto a
/// surface of the given size.
pub fn compose(
    surface: SurfaceSize,
    markers: &[Marker],
    strokes: &[InkStroke],
    selected: Option<MarkerId>,
    style: &OverlayStyle,
) -> OverlayScene {
    let ink = strokes
        .iter()
        .map(|stroke| InkPath {
            stroke_id: stroke.id,
            points: stroke.path.iter().map(|p| geometry::to_screen(*p, surface)).collect(),
            color: stroke.color,
            thickness: stroke.thickness,
            opacity: stroke.opacity,
        })
        .collect();

    let width = f64::from(surface.width);
    let mut connectors = Vec::with_capacity(markers.len());
    let mut badges: Vec<Badge> = Vec::with_capacity(markers.len());
    let mut placed: Vec<(MarginSide, f64)> = Vec::new();

    for marker in markers {
        let rect = geometry::rect_to_screen(marker.anchor_region, surface);
        let side = if rect.center_x() < width / 2.0 { MarginSide::Left } else { MarginSide::Right };
        let y = rect.bottom();

        // The connector leaves from the edge facing its margin.
        let (edge_x, offset_x, margin_x) = match side {
            MarginSide::Left => (rect.x, rect.x - style.connector_offset, style.margin_inset),
            MarginSide::Right => {
                (rect.right(), rect.right() + style.connector_offset, width - style.margin_inset)
            }
        };

        let mut badge_y = y - style.badge_lift;
        if style.stack_badges {
            badge_y = clear_of(&placed, side, badge_y, 2.0 * style.badge_radius + style.badge_gap);
            placed.push((side, badge_y));
        }
        let end = ScreenPoint::new(margin_x, badge_y + style.badge_lift);

        connectors.push(Connector {
            marker_id: marker.id,
            side,
            points: [ScreenPoint::new(edge_x, y), ScreenPoint::new(offset_x, y), end],
            color: style.connector_color,
            width: style.connector_width,
        });

        badges.push(Badge {
            marker_id: marker.id,
            center: ScreenPoint::new(margin_x, badge_y),
            radius: style.badge_radius,
            fill: marker.color(),
            outline: (selected == Some(marker.id)).then_some(style.emphasis_color),
            label: marker.index_number.to_string(),
        });
    }

    OverlayScene { surface, ink, connectors, badges, style: style.clone() }
}

/// Move `y` down until it is at least `spacing` away from every badge
/// already placed on `side`.
fn clear_of(placed: &[(MarginSide, f64)], side: MarginSide, mut y: f64, spacing: f64) -> f64 {
    // Each pass moves past at least one badge, so this terminates.
    for _ in 0..=placed.len() {
        let blocker = placed
            .iter()
            .filter(|(s, _)| *s == side)
            .map(|(_, other)| *other)
            .find(|other| (y - other).abs() < spacing);
        match blocker {
            Some(other) => y = other + spacing,
            None => break,
        }
    }
    y
}
