//! Asynchronous, cancellable page rendering with last-request-wins delivery.

use crate::rasterizer::{PageInfo, PageRasterizer, RenderError, RgbaImage, TextSpan};
use inkmark_scheduler::{CancellationToken, RequestGate, RequestTicket, SurfaceId};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

/// A finished page raster plus the text positioned on it.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// 1-based page number.
    pub page_number: u32,
    pub scale: f32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub page: PageInfo,
    /// Text spans in raster pixels. Empty for image-only pages.
    pub text_spans: Vec<TextSpan>,
    pub image: RgbaImage,
}

#[derive(Debug)]
pub enum RenderEvent {
    Complete(RenderOutput),
    Failed { page_number: u32, error: RenderError },
}

type Delivery = (RequestTicket, u32, Result<RenderOutput, RenderError>);

/// Renders pages of one document onto one surface.
///
/// Every [`request`](Self::request) supersedes the previous one. Results of
/// superseded or cancelled requests are dropped by [`poll`](Self::poll) and
/// [`wait`](Self::wait), so only the newest request can ever be delivered.
pub struct DocumentRenderer<R> {
    rasterizer: Arc<R>,
    gate: RequestGate,
    surface: SurfaceId,
    sender: Sender<Delivery>,
    receiver: Receiver<Delivery>,
}

impl<R: PageRasterizer + 'static> DocumentRenderer<R> {
    pub fn new(rasterizer: R) -> Self {
        Self::with_gate(Arc::new(rasterizer), RequestGate::new(), 0)
    }

    /// Share a gate between renderers that target different surfaces.
    pub fn with_gate(rasterizer: Arc<R>, gate: RequestGate, surface: SurfaceId) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { rasterizer, gate, surface, sender, receiver }
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    pub fn page_count(&self) -> u32 {
        self.rasterizer.page_count()
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Start rendering `page_number` (1-based) at `scale` pixels per point on
    /// a worker thread.
    pub fn request(&mut self, page_number: u32, scale: f32) -> RequestTicket {
        let ticket = self.gate.begin(self.surface);
        log::debug!(
            "surface {}: request {} for page {page_number} at scale {scale}",
            self.surface,
            ticket.generation
        );

        let rasterizer = Arc::clone(&self.rasterizer);
        let sender = self.sender.clone();
        let worker_ticket = ticket.clone();

        let spawned = thread::Builder::new()
            .name(format!("inkmark-render-{}", ticket.generation))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    render_page(rasterizer.as_ref(), page_number, scale, &worker_ticket.token)
                }))
                .unwrap_or_else(|_| Err(RenderError::Backend("render worker panicked".into())));
                // The renderer may have been dropped while we were working.
                let _ = sender.send((worker_ticket, page_number, result));
            });

        if let Err(err) = spawned {
            let error = RenderError::Backend(format!("failed to spawn render worker: {err}"));
            let _ = self.sender.send((ticket.clone(), page_number, Err(error)));
        }

        ticket
    }

    /// Render synchronously through the same gate. A newer request issued
    /// from another handle wins over this one.
    pub fn render_now(
        &mut self,
        page_number: u32,
        scale: f32,
    ) -> Result<RenderOutput, RenderError> {
        let ticket = self.gate.begin(self.surface);
        let result = render_page(self.rasterizer.as_ref(), page_number, scale, &ticket.token);

        if !self.gate.finish(&ticket) {
            return Err(RenderError::Cancelled);
        }
        result
    }

    /// Cancel the in-flight request, if any. Its result will be swallowed.
    pub fn cancel(&mut self) -> bool {
        self.gate.cancel(self.surface)
    }

    pub fn in_flight(&self) -> bool {
        self.gate.in_flight(self.surface)
    }

    /// Deliver the result of the current request if it has arrived.
    pub fn poll(&mut self) -> Option<RenderEvent> {
        while let Ok(delivery) = self.receiver.try_recv() {
            if let Some(event) = self.accept(delivery) {
                return Some(event);
            }
        }
        None
    }

    /// Block until the current request resolves. Returns `None` when nothing
    /// is in flight.
    pub fn wait(&mut self) -> Option<RenderEvent> {
        while self.in_flight() {
            let delivery = self.receiver.recv().ok()?;
            if let Some(event) = self.accept(delivery) {
                return Some(event);
            }
        }
        self.poll()
    }

    fn accept(&mut self, (ticket, page_number, result): Delivery) -> Option<RenderEvent> {
        if !self.gate.finish(&ticket) {
            log::debug!(
                "surface {}: dropping stale render {}",
                ticket.surface,
                ticket.generation
            );
            return None;
        }

        match result {
            Ok(output) => {
                log::info!(
                    "rendered page {} at {}x{}",
                    output.page_number,
                    output.pixel_width,
                    output.pixel_height
                );
                Some(RenderEvent::Complete(output))
            }
            Err(RenderError::Cancelled) => None,
            Err(error) => {
                log::error!("render of page {page_number} failed: {error}");
                Some(RenderEvent::Failed { page_number, error })
            }
        }
    }
}

fn render_page<R: PageRasterizer + ?Sized>(
    rasterizer: &R,
    page_number: u32,
    scale: f32,
    cancel: &CancellationToken,
) -> Result<RenderOutput, RenderError> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(RenderError::InvalidScale(scale));
    }

    let page_count = rasterizer.page_count();
    if page_number == 0 || page_number > page_count {
        return Err(RenderError::PageOutOfRange { page: page_number, page_count });
    }
    let page_index = page_number - 1;
    let page = rasterizer.page_info(page_index)?;

    let image = rasterizer.rasterize(page_index, scale, cancel)?;
    let (pixel_width, pixel_height) = image.dimensions();
    if pixel_width == 0 || pixel_height == 0 {
        return Err(RenderError::EmptyRaster(page_number));
    }

    if cancel.is_cancelled() {
        return Err(RenderError::Cancelled);
    }

    let text_spans = match rasterizer.text_spans(page_index) {
        Ok(spans) => spans
            .iter()
            .map(|span| page.span_to_pixels(span, pixel_width, pixel_height))
            .collect(),
        Err(err) => {
            log::warn!("text extraction failed for page {page_number}: {err}");
            Vec::new()
        }
    };

    Ok(RenderOutput { page_number, scale, pixel_width, pixel_height, page, text_spans, image })
}
