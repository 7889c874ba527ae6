use inkmark_core::{
    AnnotationError, AnnotationRepository, AnnotationSession, Category, Color, InMemoryRepository,
    InkStroke, Marker, MarkerDraft, MarkerId, Mode, RepositoryError, ScreenPoint, SessionConfig,
    SessionEvent, StrokeId, UnitPoint, UnitRect, ZoomPolicy,
};
use inkmark_render::{MemoryRasterizer, PageInfo, TextSpan};
use std::thread;
use std::time::Duration;

type Session<R = InMemoryRepository> = AnnotationSession<R, MemoryRasterizer>;

fn config() -> SessionConfig {
    SessionConfig {
        zoom: ZoomPolicy { base_scale: 1.0, ..ZoomPolicy::default() },
        ..SessionConfig::default()
    }
}

fn pages(count: usize) -> MemoryRasterizer {
    (0..count).fold(MemoryRasterizer::new(), |raster, _| {
        raster.with_page(PageInfo::new(800.0, 1000.0))
    })
}

fn open_with<R: AnnotationRepository>(rasterizer: MemoryRasterizer, repository: R) -> Session<R> {
    let mut session =
        AnnotationSession::new(rasterizer, repository, config()).expect("valid config");
    session.set_page(1).expect("page 1 exists");
    assert!(session.wait_for_render());
    session.drain_events();
    session
}

fn open(count: usize) -> Session {
    open_with(pages(count), InMemoryRepository::new())
}

fn p(x: f64, y: f64) -> ScreenPoint {
    ScreenPoint::new(x, y)
}

fn draw(session: &mut Session<impl AnnotationRepository>, from: ScreenPoint, to: ScreenPoint) {
    let mid = p((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
    session.pointer_down(from).expect("down");
    session.pointer_move(mid).expect("move");
    session.pointer_up(to).expect("up");
}

fn draft(page_number: u32, index_number: u32) -> MarkerDraft {
    MarkerDraft {
        page_number,
        index_number,
        anchor_region: UnitRect::new(0.1, 0.2, 0.3, 0.05),
        trigger_text: None,
        label: format!("marker {index_number}"),
        category: Category::Note,
    }
}

#[test]
fn test_duplicate_index_rejected_per_page() {
    let mut session = open(3);

    session.create_marker(draft(2, 1)).expect("first marker");
    let err = session.create_marker(draft(2, 1)).expect_err("duplicate");
    assert!(matches!(err, AnnotationError::DuplicateIndex { page_number: 2, index_number: 1 }));
    assert_eq!(session.repository().markers.len(), 1);

    session.create_marker(draft(3, 1)).expect("same index on another page");
    assert_eq!(session.repository().markers.len(), 2);
}

#[test]
fn test_invalid_marker_writes_nothing() {
    let mut session = open(1);

    let mut outside = draft(1, 1);
    outside.anchor_region = UnitRect::new(0.9, 0.9, 0.2, 0.2);
    assert!(matches!(
        session.create_marker(outside),
        Err(AnnotationError::InvalidRegion(_))
    ));
    assert!(matches!(session.create_marker(draft(1, 0)), Err(AnnotationError::InvalidIndex(0))));
    assert!(session.repository().markers.is_empty());
}

#[test]
fn test_stroke_follows_zoom() {
    let mut session = open(1);
    session.set_mode(Mode::Draw);

    draw(&mut session, p(100.0, 100.0), p(200.0, 200.0));

    let stroke = session.strokes()[0].clone();
    assert_eq!(stroke.path.first(), Some(&UnitPoint::new(0.125, 0.1)));
    assert_eq!(stroke.path.last(), Some(&UnitPoint::new(0.25, 0.2)));

    assert_eq!(session.set_zoom(2.0), 2.0);
    assert!(session.wait_for_render());

    let page = session.page_state().expect("rendered");
    assert_eq!((page.pixel_width, page.pixel_height), (1600, 2000));

    let ink = &session.scene().ink[0];
    assert_eq!(ink.stroke_id, stroke.id);
    assert_eq!(ink.points.first(), Some(&p(200.0, 200.0)));
    assert_eq!(ink.points.last(), Some(&p(400.0, 400.0)));
}

#[test]
fn test_zero_area_selection_reports_point_region() {
    let mut session = open(1);

    session.pointer_down(p(50.0, 50.0)).expect("down");
    session.pointer_up(p(50.0, 50.0)).expect("up");

    assert_eq!(
        session.drain_events(),
        vec![SessionEvent::SelectionCompleted {
            page_number: 1,
            region: UnitRect::new(0.0625, 0.05, 0.0, 0.0),
            text: None,
        }]
    );
}

#[test]
fn test_selection_captures_text_under_region() {
    let spans = vec![
        TextSpan { text: "Press".into(), x: 100.0, y: 100.0, width: 40.0, height: 10.0 },
        TextSpan { text: "here".into(), x: 150.0, y: 100.0, width: 30.0, height: 10.0 },
        TextSpan { text: "elsewhere".into(), x: 100.0, y: 600.0, width: 60.0, height: 10.0 },
    ];
    let rasterizer = pages(1).with_text(0, spans);
    let mut session = open_with(rasterizer, InMemoryRepository::new());

    session.pointer_down(p(90.0, 95.0)).expect("down");
    session.pointer_move(p(150.0, 105.0)).expect("move");
    session.pointer_up(p(200.0, 115.0)).expect("up");

    let events = session.drain_events();
    let Some(SessionEvent::SelectionCompleted { text, .. }) = events.first() else {
        panic!("expected a selection, got {events:?}");
    };
    assert_eq!(text.as_deref(), Some("Press here"));
}

#[test]
fn test_undo_removes_latest_stroke_first() {
    let mut session = open(1);
    session.set_mode(Mode::Draw);

    draw(&mut session, p(100.0, 100.0), p(200.0, 100.0));
    draw(&mut session, p(100.0, 300.0), p(200.0, 300.0));
    let first = session.strokes()[0].id;
    let second = session.strokes()[1].id;
    assert_eq!(session.undo_depth(), 2);

    assert_eq!(session.undo(), Some(second));
    assert_eq!(session.strokes().iter().map(|s| s.id).collect::<Vec<_>>(), vec![first]);
    assert_eq!(session.undo(), Some(first));
    assert_eq!(session.undo(), None);
    assert!(session.repository().strokes.is_empty());
}

#[test]
fn test_page_change_discards_undo_history() {
    let mut session = open(2);
    session.set_mode(Mode::Draw);
    draw(&mut session, p(100.0, 100.0), p(200.0, 100.0));

    session.set_page(2).expect("page 2");
    assert!(session.wait_for_render());
    assert_eq!(session.undo_depth(), 0);

    session.set_page(1).expect("page 1");
    assert!(session.wait_for_render());
    assert_eq!(session.undo(), None);
    assert_eq!(session.strokes().len(), 1);
}

#[test]
fn test_erase_deletes_stroke_under_pointer() {
    let mut session = open(1);
    session.set_mode(Mode::Draw);
    draw(&mut session, p(100.0, 100.0), p(200.0, 200.0));
    let stroke_id = session.strokes()[0].id;
    session.drain_events();

    session.set_mode(Mode::Erase);
    session.pointer_down(p(150.0, 152.0)).expect("down");
    session.pointer_move(p(151.0, 151.0)).expect("move");
    session.pointer_up(p(151.0, 151.0)).expect("up");

    let deleted: Vec<StrokeId> = session
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::StrokeDeleted { stroke_id, .. } => Some(stroke_id),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, vec![stroke_id]);
    assert!(session.strokes().is_empty());
    assert!(session.repository().strokes.is_empty());
}

#[test]
fn test_undo_after_erase_skips_erased_stroke() {
    let mut session = open(1);
    session.set_mode(Mode::Draw);
    draw(&mut session, p(100.0, 100.0), p(200.0, 100.0));
    draw(&mut session, p(100.0, 300.0), p(200.0, 300.0));
    let (first, second) = (session.strokes()[0].id, session.strokes()[1].id);

    session.set_mode(Mode::Erase);
    session.pointer_down(p(150.0, 300.0)).expect("down");
    session.pointer_up(p(150.0, 300.0)).expect("up");
    assert_eq!(session.undo_depth(), 1);
    session.drain_events();

    assert_eq!(session.undo(), Some(first));
    let deleted: Vec<StrokeId> = session
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::StrokeDeleted { stroke_id, .. } => Some(stroke_id),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, vec![first]);
    assert!(!deleted.contains(&second));
    assert!(session.strokes().is_empty());
    assert_eq!(session.undo(), None);
}

#[test]
fn test_render_failure_keeps_previous_page() {
    let rasterizer = pages(2).with_failure(1);
    let mut session = open_with(rasterizer, InMemoryRepository::new());

    session.set_page(2).expect("page 2 exists");
    assert!(session.wait_for_render());

    let events = session.drain_events();
    assert!(matches!(events.as_slice(), [SessionEvent::RenderFailed { page_number: 2, .. }]));
    assert_eq!(session.page_state().map(|page| page.page_number), Some(1));
    assert_eq!(session.state().page_number, 1);
    assert!(session.raster().is_some());
}

#[test]
fn test_out_of_range_page_is_rejected() {
    let mut session = open(2);
    assert!(matches!(session.set_page(3), Err(AnnotationError::InvalidPage(3))));
    assert!(matches!(session.set_page(0), Err(AnnotationError::InvalidPage(0))));
    assert!(!session.render_in_flight());
}

#[test]
fn test_superseded_render_is_never_delivered() {
    let rasterizer = pages(2).with_delay(0, Duration::from_millis(200));
    let mut session =
        AnnotationSession::new(rasterizer, InMemoryRepository::new(), config()).expect("config");

    session.set_page(1).expect("page 1");
    session.set_page(2).expect("page 2");
    assert!(session.wait_for_render());

    thread::sleep(Duration::from_millis(50));
    assert_eq!(session.pump(), 0);

    let rendered: Vec<u32> = session
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::RenderComplete { page_number, .. } => Some(page_number),
            _ => None,
        })
        .collect();
    assert_eq!(rendered, vec![2]);
    assert_eq!(session.page_state().map(|page| page.page_number), Some(2));
}

#[test]
fn test_render_complete_precedes_overlay_repaint() {
    let mut session =
        AnnotationSession::new(pages(1), InMemoryRepository::new(), config()).expect("config");
    session.set_page(1).expect("page 1");
    assert!(session.wait_for_render());

    assert_eq!(
        session.drain_events(),
        vec![
            SessionEvent::RenderComplete { page_number: 1, pixel_width: 800, pixel_height: 1000 },
            SessionEvent::OverlayRepainted { page_number: 1, markers: 0, strokes: 0 },
        ]
    );
}

#[test]
fn test_marker_click_selects_marker() {
    let mut session = open(1);
    let marker = session.create_marker(draft(1, 1)).expect("marker");
    session.drain_events();

    let badge = session.scene().hit_targets()[0].clone();
    assert_eq!(badge.label, "1");
    assert!(badge.outline.is_none());

    session.pointer_down(badge.center).expect("down");
    session.pointer_up(badge.center).expect("up");

    let events = session.drain_events();
    assert_eq!(events.first(), Some(&SessionEvent::MarkerClicked(marker.id)));
    assert!(!events.iter().any(|e| matches!(e, SessionEvent::SelectionCompleted { .. })));
    assert_eq!(session.state().selected_marker, Some(marker.id));
    assert!(session.scene().hit_targets()[0].outline.is_some());
}

#[test]
fn test_update_and_delete_marker() {
    let mut session = open(1);
    let mut marker = session.create_marker(draft(1, 1)).expect("marker");
    session.create_marker(draft(1, 2)).expect("second");

    marker.index_number = 2;
    assert!(matches!(
        session.update_marker(marker.clone()),
        Err(AnnotationError::DuplicateIndex { page_number: 1, index_number: 2 })
    ));

    marker.index_number = 3;
    marker.label = "renumbered".into();
    let updated = session.update_marker(marker.clone()).expect("update");
    assert!(updated.updated_at >= updated.created_at);
    assert_eq!(session.next_free_index(1).expect("list"), 1);

    session.delete_marker(marker.id).expect("delete");
    assert_eq!(session.markers().len(), 1);
    assert!(matches!(
        session.update_marker(marker),
        Err(AnnotationError::UnknownMarker(_))
    ));
}

#[test]
fn test_update_marker_moves_it_to_another_page() {
    let mut session = open(2);
    let mut marker = session.create_marker(draft(1, 1)).expect("marker");
    session.create_marker(draft(2, 1)).expect("page 2 marker");
    assert_eq!(session.markers().len(), 1);

    marker.page_number = 2;
    assert!(matches!(
        session.update_marker(marker.clone()),
        Err(AnnotationError::DuplicateIndex { page_number: 2, index_number: 1 })
    ));

    marker.index_number = 2;
    let moved = session.update_marker(marker.clone()).expect("move to page 2");
    assert_eq!(moved.page_number, 2);
    assert!(session.markers().is_empty());

    let stored = session.repository().marker(marker.id).expect("still stored");
    assert_eq!((stored.page_number, stored.index_number), (2, 2));
    assert_eq!(session.repository().list_markers(1).expect("list"), Vec::new());
}

#[test]
fn test_clear_page_strokes_leaves_other_pages() {
    let mut session = open(2);
    session.set_mode(Mode::Draw);
    draw(&mut session, p(100.0, 100.0), p(200.0, 100.0));
    draw(&mut session, p(100.0, 200.0), p(200.0, 200.0));

    let other = InkStroke::new(
        2,
        vec![UnitPoint::new(0.1, 0.1), UnitPoint::new(0.2, 0.2)],
        session.state().stroke_style,
    )
    .expect("stroke");
    let mut repository = session.into_repository();
    repository.upsert_stroke(other).expect("upsert");
    let mut session = open_with(pages(2), repository);

    assert_eq!(session.clear_page_strokes(), 2);
    assert!(session.strokes().is_empty());
    assert_eq!(session.repository().strokes.len(), 1);
    assert_eq!(session.undo(), None);
}

#[test]
fn test_configured_pen_applies_to_new_strokes() {
    let mut session = open(1);
    session.configure_stroke(Color::BLUE, 6.0, 0.8).expect("style");
    assert!(session.configure_stroke(Color::BLUE, 0.0, 0.8).is_err());

    session.set_mode(Mode::Draw);
    draw(&mut session, p(10.0, 10.0), p(20.0, 20.0));

    let stroke = &session.strokes()[0];
    assert_eq!((stroke.color, stroke.thickness, stroke.opacity), (Color::BLUE, 6.0, 0.8));
}

struct FailingRepository;

impl AnnotationRepository for FailingRepository {
    fn list_markers(&self, _page_number: u32) -> Result<Vec<Marker>, RepositoryError> {
        Err(RepositoryError::Backend("offline".into()))
    }

    fn find_marker(&self, _id: MarkerId) -> Result<Option<Marker>, RepositoryError> {
        Err(RepositoryError::Backend("offline".into()))
    }

    fn upsert_marker(&mut self, _marker: Marker) -> Result<(), RepositoryError> {
        Err(RepositoryError::Backend("offline".into()))
    }

    fn delete_marker(&mut self, _id: MarkerId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Backend("offline".into()))
    }

    fn list_strokes(&self, _page_number: u32) -> Result<Vec<InkStroke>, RepositoryError> {
        Err(RepositoryError::Backend("offline".into()))
    }

    fn upsert_stroke(&mut self, _stroke: InkStroke) -> Result<(), RepositoryError> {
        Err(RepositoryError::Backend("offline".into()))
    }

    fn delete_stroke(&mut self, _id: StrokeId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Backend("offline".into()))
    }
}

#[test]
fn test_failing_repository_degrades_to_empty_page() {
    let mut session =
        AnnotationSession::new(pages(1), FailingRepository, config()).expect("config");
    session.set_page(1).expect("page 1");
    assert!(session.wait_for_render());

    assert_eq!(
        session.drain_events().last(),
        Some(&SessionEvent::OverlayRepainted { page_number: 1, markers: 0, strokes: 0 })
    );

    session.set_mode(Mode::Draw);
    draw(&mut session, p(100.0, 100.0), p(200.0, 200.0));
    assert!(session.drain_events().is_empty());
    assert_eq!(session.undo_depth(), 0);

    assert!(matches!(
        session.create_marker(draft(1, 1)),
        Err(AnnotationError::RepositoryFailure(_))
    ));
}
