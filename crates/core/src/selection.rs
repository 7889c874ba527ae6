//! Pointer gesture state machine.
//!
//! The engine turns a down/move/up sequence into normalized geometry. It
//! never touches storage: completed gestures come back as [`GestureEvent`]s
//! and the caller decides what to persist.

use crate::geometry::{
    self, GeometryError, ScreenPoint, ScreenRect, SurfaceSize, UnitPoint, UnitRect,
};
use crate::hit_test;
use crate::ink::{InkStroke, StrokeId, StrokeStyle};
use crate::text::{self, TextFragment};
use serde::{Deserialize, Serialize};

/// Interaction mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Rectangular region selection for new markers.
    #[default]
    Select,
    /// Freeform ink.
    Draw,
    /// Delete strokes under the pointer.
    Erase,
}

/// What the engine needs to know about the page under the pointer.
#[derive(Debug, Clone, Copy)]
pub struct GestureContext<'a> {
    pub surface: SurfaceSize,
    pub text_fragments: &'a [TextFragment],
    pub strokes: &'a [InkStroke],
    pub stroke_style: StrokeStyle,
    pub erase_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    SelectionCompleted { region: UnitRect, text: Option<String> },
    StrokeCompleted { path: Vec<UnitPoint>, style: StrokeStyle },
    StrokeDeleted(StrokeId),
}

#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    Idle,
    Selecting {
        start: ScreenPoint,
        end: ScreenPoint,
    },
    Drawing {
        points: Vec<ScreenPoint>,
    },
    Erasing {
        erased: Vec<StrokeId>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SelectionEngine {
    mode: Mode,
    gesture: Gesture,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch modes. Any gesture in progress is dropped without events.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            log::debug!("mode {:?} -> {:?}", self.mode, mode);
        }
        self.cancel();
        self.mode = mode;
    }

    /// Drop the gesture in progress, if any.
    pub fn cancel(&mut self) {
        if !matches!(self.gesture, Gesture::Idle) {
            log::debug!("{:?} gesture cancelled", self.mode);
        }
        self.gesture = Gesture::Idle;
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    /// Live selection rectangle while a select drag is in progress.
    pub fn live_rect(&self) -> Option<ScreenRect> {
        match self.gesture {
            Gesture::Selecting { start, end } => Some(ScreenRect::from_corners(start, end)),
            _ => None,
        }
    }

    /// Points captured so far by a draw drag.
    pub fn live_path(&self) -> &[ScreenPoint] {
        match &self.gesture {
            Gesture::Drawing { points } => points,
            _ => &[],
        }
    }

    pub fn pointer_down(
        &mut self,
        point: ScreenPoint,
        ctx: &GestureContext<'_>,
    ) -> Result<Vec<GestureEvent>, GeometryError> {
        if ctx.surface.is_empty() {
            return Err(GeometryError::EmptySurface {
                width: ctx.surface.width,
                height: ctx.surface.height,
            });
        }
        let point = ctx.surface.clamp(point);

        self.gesture = match self.mode {
            Mode::Select => Gesture::Selecting { start: point, end: point },
            Mode::Draw => Gesture::Drawing { points: vec![point] },
            Mode::Erase => Gesture::Erasing { erased: Vec::new() },
        };

        self.erase_at(point, ctx)
    }

    /// Track the pointer. Without a preceding `pointer_down` this is a no-op.
    pub fn pointer_move(
        &mut self,
        point: ScreenPoint,
        ctx: &GestureContext<'_>,
    ) -> Result<Vec<GestureEvent>, GeometryError> {
        let point = ctx.surface.clamp(point);

        if matches!(self.gesture, Gesture::Erasing { .. }) {
            return self.erase_at(point, ctx);
        }

        match &mut self.gesture {
            Gesture::Idle | Gesture::Erasing { .. } => {}
            Gesture::Selecting { end, .. } => *end = point,
            Gesture::Drawing { points } => points.push(point),
        }
        Ok(Vec::new())
    }

    pub fn pointer_up(
        &mut self,
        point: ScreenPoint,
        ctx: &GestureContext<'_>,
    ) -> Result<Vec<GestureEvent>, GeometryError> {
        let point = ctx.surface.clamp(point);

        match std::mem::take(&mut self.gesture) {
            Gesture::Idle | Gesture::Erasing { .. } => Ok(Vec::new()),
            Gesture::Selecting { start, .. } => {
                let rect = ScreenRect::from_corners(start, point);
                let region = geometry::rect_to_unit(rect, ctx.surface)?;
                let text = text::text_in_region(ctx.text_fragments, &rect);
                Ok(vec![GestureEvent::SelectionCompleted { region, text }])
            }
            Gesture::Drawing { mut points } => {
                if points.last() != Some(&point) {
                    points.push(point);
                }
                if points.len() < 2 {
                    log::debug!("discarding ink gesture with {} point(s)", points.len());
                    return Ok(Vec::new());
                }

                let path = points
                    .into_iter()
                    .map(|p| geometry::to_unit(p, ctx.surface))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(vec![GestureEvent::StrokeCompleted { path, style: ctx.stroke_style }])
            }
        }
    }

    fn erase_at(
        &mut self,
        point: ScreenPoint,
        ctx: &GestureContext<'_>,
    ) -> Result<Vec<GestureEvent>, GeometryError> {
        let Gesture::Erasing { erased } = &mut self.gesture else {
            return Ok(Vec::new());
        };

        let unit = geometry::to_unit(point, ctx.surface)?;
        let candidates = ctx.strokes.iter().filter(|stroke| !erased.contains(&stroke.id));

        match hit_test::first_within(unit, candidates, ctx.erase_threshold) {
            Some(id) => {
                erased.push(id);
                Ok(vec![GestureEvent::StrokeDeleted(id)])
            }
            None => Ok(Vec::new()),
        }
    }
}
