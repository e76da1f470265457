//! Integration tests for image switching through the public controller API.

use pixdust::prelude::*;
use pixdust::render::BackendStats;
use pixdust::{ControllerEvent, PerformanceProfile};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

const DT: f32 = 1.0 / 60.0;

fn image_a() -> DecodedImage {
    DecodedImage::from_grey(
        4,
        4,
        &[10, 50, 90, 200, 10, 10, 10, 10, 200, 200, 10, 10, 10, 10, 200, 10],
    )
    .unwrap()
}

fn source() -> MemoryImageSource {
    MemoryImageSource::new()
        .with_image("a", image_a())
        .with_image("b", DecodedImage::from_grey(2, 2, &[255, 0, 0, 0]).unwrap())
        .with_image("c", DecodedImage::from_grey(3, 1, &[255, 255, 255]).unwrap())
}

fn controller(dispatch: Dispatch) -> (Controller, Rc<RefCell<BackendStats>>) {
    let backend = RecordingBackend::new();
    let stats = backend.stats();
    let controller = Controller::builder()
        .source(source())
        .backend(backend)
        .dispatch(dispatch)
        .profile(PerformanceProfile::fallback())
        .seed(3)
        .images(["a", "b", "c"])
        .build()
        .unwrap();
    (controller, stats)
}

/// Tick until `done` holds, failing after a generous wall-clock limit.
fn tick_until(controller: &mut Controller, mut done: impl FnMut(&Controller) -> bool) -> Vec<ControllerEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while !done(controller) {
        assert!(Instant::now() < deadline, "controller never settled: {:?}", controller);
        events.extend(controller.tick(DT));
        std::thread::sleep(Duration::from_micros(200));
    }
    events
}

fn visible(c: &Controller) -> bool {
    c.state() == ControllerState::Visible
}

// ============================================================================
// Density scenario
// ============================================================================

#[test]
fn test_reference_image_builds_five_particles() {
    let (mut c, stats) = controller(Dispatch::Inline);
    c.goto("a");
    c.tick(0.0);

    let field = c.current_field().unwrap();
    assert_eq!(field.visible_count(), 5);
    assert_eq!(field.total_pixels(), 16);
    assert_eq!(field.instances().pixel_index(), &[2, 3, 8, 9, 14]);
    assert_eq!(stats.borrow().last_instance_count, 5);
}

// ============================================================================
// Sequential switching
// ============================================================================

#[test]
fn test_rapid_next_settles_on_third_image() {
    let (mut c, stats) = controller(Dispatch::Threaded);
    c.goto("a");
    tick_until(&mut c, visible);

    // Faster than any dissolve.
    c.next();
    c.tick(DT);
    c.next();
    c.tick(DT);
    c.next();

    tick_until(&mut c, visible);
    let field = c.current_field().unwrap();
    assert_eq!(field.reference(), "c");
    assert_eq!(c.index(), Some(2));

    let stats = stats.borrow();
    assert_eq!(stats.live.len(), 1);
    assert!(stats.live.contains(&field.id()));
    assert_eq!(stats.uploads, stats.releases + 1);
}

#[test]
fn test_rapid_next_from_empty_builds_one_field() {
    let (mut c, stats) = controller(Dispatch::Threaded);
    c.next();
    c.next();
    c.next();

    let events = tick_until(&mut c, visible);
    let ready: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ControllerEvent::FieldReady { reference, .. } => Some(reference.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(ready, vec!["c"]);
    assert_eq!(stats.borrow().uploads, 1);
}

#[test]
fn test_playlist_wraps_around() {
    let (mut c, _) = controller(Dispatch::Inline);
    for expected in ["a", "b", "c", "a"] {
        c.next();
        tick_until(&mut c, visible);
        assert_eq!(c.current_field().unwrap().reference(), expected);
    }
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_decode_failure_after_dissolve_leaves_no_field() {
    let (mut c, stats) = controller(Dispatch::Inline);
    c.goto("a");
    tick_until(&mut c, visible);

    c.goto("does-not-exist");
    let events = tick_until(&mut c, |c| c.state() == ControllerState::Idle);

    assert!(events
        .iter()
        .any(|e| matches!(e, ControllerEvent::DecodeFailed { reference, .. } if reference == "does-not-exist")));
    assert!(!events.iter().any(|e| matches!(e, ControllerEvent::FieldReady { .. })));
    assert!(c.current_field().is_none());
    assert!(stats.borrow().live.is_empty());

    // The controller keeps working afterwards.
    c.goto("b");
    tick_until(&mut c, visible);
    assert_eq!(c.current_field().unwrap().reference(), "b");
}

#[test]
fn test_missing_backend_is_reported_at_build() {
    let result = Controller::builder().source(source()).build();
    assert!(result.is_err());
}

// ============================================================================
// Pointer
// ============================================================================

#[test]
fn test_pointer_outside_field_is_ignored() {
    let (mut c, _) = controller(Dispatch::Inline);
    c.goto("b");
    tick_until(&mut c, visible);

    // A square image spans the visible height but not the full width.
    let viewport = c.viewport();
    c.pointer_move(PointerEvent {
        position: Vec2::new(1.0, viewport.y * 0.5),
        viewport,
    });
    c.tick(0.0);
    assert_eq!(c.touch().active_count(), 0);

    c.pointer_move(PointerEvent {
        position: viewport * 0.5,
        viewport,
    });
    c.tick(0.0);
    assert_eq!(c.touch().active_count(), 1);
}

#[test]
fn test_touch_decays_after_pointer_stops() {
    let (mut c, _) = controller(Dispatch::Inline);
    c.goto("a");
    tick_until(&mut c, visible);

    let viewport = c.viewport();
    c.pointer_move(PointerEvent {
        position: viewport * 0.5,
        viewport,
    });

    let mut last = f32::INFINITY;
    let mut frames = 0;
    loop {
        c.tick(0.1);
        let value = c.touch().sample(Vec2::splat(0.5));
        if value == 0.0 {
            break;
        }
        assert!(value < last);
        last = value;
        frames += 1;
        assert!(frames < 1000);
    }
    assert_eq!(c.touch().active_count(), 0);
}
