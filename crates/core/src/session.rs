//! Document-level annotation session.
//!
//! [`AnnotationSession`] owns the interaction state that a host would
//! otherwise keep in globals: mode, page, zoom, selected marker and pen. The
//! host feeds it commands and pointer input, pumps render completions, and
//! drains [`SessionEvent`]s in the order they happened.

use crate::color::Color;
use crate::config::{ConfigError, SessionConfig};
use crate::error::AnnotationError;
use crate::geometry::{GeometryError, ScreenPoint, SurfaceSize, UnitRect};
use crate::hit_test;
use crate::ink::{InkStroke, StrokeId, StrokeStyle};
use crate::marker::{self, Marker, MarkerDraft, MarkerId};
use crate::overlay::{self, OverlayScene};
use crate::paint::{self, PaintError};
use crate::repository::AnnotationRepository;
use crate::selection::{GestureContext, GestureEvent, Mode, SelectionEngine};
use crate::text::TextFragment;
use crate::undo::UndoStack;
use inkmark_render::{DocumentRenderer, PageRasterizer, RenderEvent, RenderOutput, RgbaImage};
use std::collections::VecDeque;

/// Interaction state owned by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub mode: Mode,
    /// Requested page; the displayed page is in [`PageRenderState`].
    pub page_number: u32,
    pub zoom: f32,
    pub selected_marker: Option<MarkerId>,
    pub stroke_style: StrokeStyle,
}

/// Geometry of the page currently on screen. Rebuilt on every render and
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRenderState {
    pub page_number: u32,
    pub zoom: f32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub text_fragments: Vec<TextFragment>,
}

impl PageRenderState {
    pub fn surface(&self) -> SurfaceSize {
        SurfaceSize::new(self.pixel_width, self.pixel_height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A select drag finished. The host decides whether to create a marker.
    SelectionCompleted { page_number: u32, region: UnitRect, text: Option<String> },
    /// A stroke was drawn and stored.
    StrokeCompleted(InkStroke),
    /// A stroke was removed by erase or undo.
    StrokeDeleted { page_number: u32, stroke_id: StrokeId },
    MarkerClicked(MarkerId),
    RenderComplete { page_number: u32, pixel_width: u32, pixel_height: u32 },
    RenderFailed { page_number: u32, message: String },
    /// The overlay was recomposed for the current surface.
    OverlayRepainted { page_number: u32, markers: usize, strokes: usize },
}

#[derive(Debug, Clone, Copy)]
enum Pointer {
    Down,
    Move,
    Up,
}

pub struct AnnotationSession<R, P> {
    config: SessionConfig,
    state: SessionState,
    repository: R,
    renderer: DocumentRenderer<P>,
    selection: SelectionEngine,
    undo: UndoStack,
    page: Option<PageRenderState>,
    raster: Option<RgbaImage>,
    markers: Vec<Marker>,
    strokes: Vec<InkStroke>,
    scene: OverlayScene,
    events: VecDeque<SessionEvent>,
}

impl<R: AnnotationRepository, P: PageRasterizer + 'static> AnnotationSession<R, P> {
    pub fn new(rasterizer: P, repository: R, config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_renderer(DocumentRenderer::new(rasterizer), repository, config)
    }

    pub fn with_renderer(
        renderer: DocumentRenderer<P>,
        repository: R,
        config: SessionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let state = SessionState {
            mode: Mode::default(),
            page_number: 1,
            zoom: config.zoom.clamp(1.0),
            selected_marker: None,
            stroke_style: config.stroke,
        };

        Ok(Self {
            config,
            state,
            repository,
            renderer,
            selection: SelectionEngine::new(),
            undo: UndoStack::new(),
            page: None,
            raster: None,
            markers: Vec::new(),
            strokes: Vec::new(),
            scene: OverlayScene::default(),
            events: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn page_state(&self) -> Option<&PageRenderState> {
        self.page.as_ref()
    }

    pub fn page_count(&self) -> u32 {
        self.renderer.page_count()
    }

    /// Overlay from the last composer pass.
    pub fn scene(&self) -> &OverlayScene {
        &self.scene
    }

    /// Raster of the displayed page, without overlay.
    pub fn raster(&self) -> Option<&RgbaImage> {
        self.raster.as_ref()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn strokes(&self) -> &[InkStroke] {
        &self.strokes
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn into_repository(self) -> R {
        self.repository
    }

    pub fn live_selection(&self) -> Option<crate::geometry::ScreenRect> {
        self.selection.live_rect()
    }

    // Commands

    pub fn set_mode(&mut self, mode: Mode) {
        self.selection.set_mode(mode);
        self.state.mode = mode;
    }

    /// Navigate to `page_number` (1-based). The gesture in progress and any
    /// render still running for the previous request are dropped.
    pub fn set_page(&mut self, page_number: u32) -> Result<(), AnnotationError> {
        if page_number == 0 || page_number > self.page_count() {
            return Err(AnnotationError::InvalidPage(page_number));
        }

        self.selection.cancel();
        self.state.page_number = page_number;
        self.request_render();
        Ok(())
    }

    /// Set the zoom factor, clamped to the configured bounds. Returns the
    /// zoom actually applied.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        let zoom = self.config.zoom.clamp(zoom);
        self.selection.cancel();
        self.state.zoom = zoom;
        self.request_render();
        zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.config.zoom.zoom_in(self.state.zoom))
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.config.zoom.zoom_out(self.state.zoom))
    }

    /// Pen for subsequent strokes. Existing strokes keep their own style.
    pub fn configure_stroke(
        &mut self,
        color: Color,
        thickness: f32,
        opacity: f32,
    ) -> Result<(), AnnotationError> {
        self.state.stroke_style = StrokeStyle::new(color, thickness, opacity)?;
        Ok(())
    }

    pub fn select_marker(&mut self, id: Option<MarkerId>) {
        self.state.selected_marker = id;
        self.recompose();
    }

    /// Remove the most recent stroke drawn on this page.
    pub fn undo(&mut self) -> Option<StrokeId> {
        let stroke_id = self.undo.pop()?;
        let page_number = self.undo.page_number().unwrap_or(self.state.page_number);

        if !self.strokes.iter().any(|stroke| stroke.id == stroke_id) {
            log::debug!("undo: stroke {stroke_id} is already gone");
            self.repaint();
            return Some(stroke_id);
        }

        match self.repository.delete_stroke(stroke_id) {
            Ok(()) => {
                self.strokes.retain(|stroke| stroke.id != stroke_id);
                self.events.push_back(SessionEvent::StrokeDeleted { page_number, stroke_id });
            }
            Err(err) => log::warn!("undo could not delete stroke {stroke_id}: {err}"),
        }
        self.repaint();
        Some(stroke_id)
    }

    /// Delete every stroke on the displayed page. Returns how many were
    /// removed.
    pub fn clear_page_strokes(&mut self) -> usize {
        let Some(page_number) = self.page.as_ref().map(|page| page.page_number) else {
            return 0;
        };

        let strokes = self.list_strokes(page_number);
        let mut removed = 0;
        for stroke in strokes {
            match self.repository.delete_stroke(stroke.id) {
                Ok(()) => removed += 1,
                Err(err) => log::warn!("could not delete stroke {}: {err}", stroke.id),
            }
        }

        self.undo.clear();
        self.repaint();
        removed
    }

    /// Reload the page's records and recompose the overlay. Does nothing
    /// before the first render completes.
    pub fn repaint(&mut self) {
        let Some(page_number) = self.page.as_ref().map(|page| page.page_number) else {
            return;
        };
        self.markers = self.list_markers(page_number);
        self.strokes = self.list_strokes(page_number);
        self.recompose();
    }

    // Rendering

    fn request_render(&mut self) {
        let scale = self.config.zoom.render_scale(self.state.zoom);
        self.renderer.request(self.state.page_number, scale);
    }

    pub fn render_in_flight(&self) -> bool {
        self.renderer.in_flight()
    }

    /// Apply render results that have arrived. Returns how many were
    /// applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.renderer.poll() {
            self.apply_render(event);
            applied += 1;
        }
        applied
    }

    /// Block until the outstanding render resolves and apply it. Returns
    /// `false` when nothing was in flight.
    pub fn wait_for_render(&mut self) -> bool {
        match self.renderer.wait() {
            Some(event) => {
                self.apply_render(event);
                true
            }
            None => false,
        }
    }

    fn apply_render(&mut self, event: RenderEvent) {
        match event {
            RenderEvent::Complete(output) => self.apply_output(output),
            RenderEvent::Failed { page_number, error } => {
                // Keep showing the last good page.
                if let Some(page) = &self.page {
                    self.state.page_number = page.page_number;
                    self.state.zoom = page.zoom;
                }
                let message = error.to_string();
                self.events.push_back(SessionEvent::RenderFailed { page_number, message });
            }
        }
    }

    fn apply_output(&mut self, output: RenderOutput) {
        let displayed = self.page.as_ref().map(|page| page.page_number);
        let page_changed = displayed != Some(output.page_number);
        if page_changed {
            self.selection.cancel();
            self.undo.reset_for_page(output.page_number);
            self.state.selected_marker = None;
        }

        let page = PageRenderState {
            page_number: output.page_number,
            zoom: self.state.zoom,
            pixel_width: output.pixel_width,
            pixel_height: output.pixel_height,
            text_fragments: output.text_spans.iter().map(TextFragment::from).collect(),
        };

        self.events.push_back(SessionEvent::RenderComplete {
            page_number: page.page_number,
            pixel_width: page.pixel_width,
            pixel_height: page.pixel_height,
        });
        self.page = Some(page);
        self.raster = Some(output.image);

        self.repaint();
    }

    fn recompose(&mut self) {
        let Some(page) = &self.page else {
            return;
        };

        self.scene = overlay::compose(
            page.surface(),
            &self.markers,
            &self.strokes,
            self.state.selected_marker,
            &self.config.overlay,
        );
        self.events.push_back(SessionEvent::OverlayRepainted {
            page_number: page.page_number,
            markers: self.markers.len(),
            strokes: self.strokes.len(),
        });
    }

    /// The displayed raster with the overlay painted over it.
    pub fn composite(&self) -> Option<Result<RgbaImage, PaintError>> {
        let mut image = self.raster.clone()?;
        Some(paint::paint_overlay(&self.scene, &mut image).map(|()| image))
    }

    fn list_markers(&self, page_number: u32) -> Vec<Marker> {
        self.repository.list_markers(page_number).unwrap_or_else(|err| {
            log::warn!("showing no markers for page {page_number}: {err}");
            Vec::new()
        })
    }

    fn list_strokes(&self, page_number: u32) -> Vec<InkStroke> {
        self.repository.list_strokes(page_number).unwrap_or_else(|err| {
            log::warn!("showing no ink for page {page_number}: {err}");
            Vec::new()
        })
    }

    // Pointer input

    pub fn pointer_down(&mut self, point: ScreenPoint) -> Result<(), AnnotationError> {
        if self.state.mode == Mode::Select {
            if let Some(id) = hit_test::marker_at(point, self.scene.hit_targets()) {
                self.events.push_back(SessionEvent::MarkerClicked(id));
                self.select_marker(Some(id));
                return Ok(());
            }
        }
        self.dispatch(Pointer::Down, point)
    }

    pub fn pointer_move(&mut self, point: ScreenPoint) -> Result<(), AnnotationError> {
        self.dispatch(Pointer::Move, point)
    }

    pub fn pointer_up(&mut self, point: ScreenPoint) -> Result<(), AnnotationError> {
        self.dispatch(Pointer::Up, point)
    }

    fn dispatch(&mut self, pointer: Pointer, point: ScreenPoint) -> Result<(), AnnotationError> {
        let Some(page) = self.page.as_ref() else {
            return Err(GeometryError::EmptySurface { width: 0, height: 0 }.into());
        };
        let page_number = page.page_number;

        let ctx = GestureContext {
            surface: page.surface(),
            text_fragments: &page.text_fragments,
            strokes: &self.strokes,
            stroke_style: self.state.stroke_style,
            erase_threshold: self.config.erase_threshold,
        };
        let events = match pointer {
            Pointer::Down => self.selection.pointer_down(point, &ctx)?,
            Pointer::Move => self.selection.pointer_move(point, &ctx)?,
            Pointer::Up => self.selection.pointer_up(point, &ctx)?,
        };

        for event in events {
            self.apply_gesture(page_number, event);
        }
        Ok(())
    }

    fn apply_gesture(&mut self, page_number: u32, event: GestureEvent) {
        match event {
            GestureEvent::SelectionCompleted { region, text } => {
                let event = SessionEvent::SelectionCompleted { page_number, region, text };
                self.events.push_back(event);
            }
            GestureEvent::StrokeCompleted { path, style } => {
                let stroke = match InkStroke::new(page_number, path, style) {
                    Ok(stroke) => stroke,
                    Err(err) => {
                        log::debug!("dropping stroke: {err}");
                        return;
                    }
                };
                if let Err(err) = self.repository.upsert_stroke(stroke.clone()) {
                    log::warn!("could not store stroke on page {page_number}: {err}");
                    return;
                }
                self.undo.push(stroke.id);
                self.strokes.push(stroke.clone());
                self.events.push_back(SessionEvent::StrokeCompleted(stroke));
                self.recompose();
            }
            GestureEvent::StrokeDeleted(stroke_id) => {
                if let Err(err) = self.repository.delete_stroke(stroke_id) {
                    log::warn!("could not delete stroke {stroke_id}: {err}");
                    return;
                }
                self.undo.remove(stroke_id);
                self.strokes.retain(|stroke| stroke.id != stroke_id);
                self.events.push_back(SessionEvent::StrokeDeleted { page_number, stroke_id });
                self.recompose();
            }
        }
    }

    // Markers

    /// Validate and store a new marker. Nothing is written when validation
    /// fails.
    pub fn create_marker(&mut self, draft: MarkerDraft) -> Result<Marker, AnnotationError> {
        let marker = Marker::from_draft(draft);
        let existing = self.repository.list_markers(marker.page_number)?;
        marker::validate_marker(&existing, &marker)?;

        self.repository.upsert_marker(marker.clone())?;
        log::info!("marker {} created on page {}", marker.index_number, marker.page_number);
        self.refresh_if_displayed(marker.page_number);
        Ok(marker)
    }

    /// Store edits to an existing marker, re-validating its index against
    /// the page it ends up on. The marker may move to another page.
    pub fn update_marker(&mut self, mut marker: Marker) -> Result<Marker, AnnotationError> {
        let Some(stored) = self.repository.find_marker(marker.id)? else {
            return Err(AnnotationError::UnknownMarker(marker.id));
        };
        let existing = self.repository.list_markers(marker.page_number)?;
        marker::validate_marker(&existing, &marker)?;

        marker.touch();
        self.repository.upsert_marker(marker.clone())?;
        if stored.page_number != marker.page_number {
            log::info!(
                "marker {} moved from page {} to page {}",
                marker.index_number,
                stored.page_number,
                marker.page_number
            );
            self.refresh_if_displayed(stored.page_number);
        }
        self.refresh_if_displayed(marker.page_number);
        Ok(marker)
    }

    pub fn delete_marker(&mut self, id: MarkerId) -> Result<(), AnnotationError> {
        self.repository.delete_marker(id)?;
        if self.state.selected_marker == Some(id) {
            self.state.selected_marker = None;
        }
        self.repaint();
        Ok(())
    }

    /// Smallest index not yet used on `page_number`.
    pub fn next_free_index(&self, page_number: u32) -> Result<u32, AnnotationError> {
        let existing = self.repository.list_markers(page_number)?;
        Ok(marker::next_free_index(&existing, page_number))
    }

    fn refresh_if_displayed(&mut self, page_number: u32) {
        if self.page.as_ref().is_some_and(|page| page.page_number == page_number) {
            self.repaint();
        }
    }

    // Events

    pub fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }
}
