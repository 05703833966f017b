use focus_veil::geometry::Rect;
use focus_veil::mask::{build_requests, MaskPolicy, MaskRenderer, MaskRequest};
use focus_veil::tracking::backend::{
    FocusedWindow, MockAccessibility, MockSwitch, MockSwitchHandle, MockWindowSource,
    RecordingSink, RecordingSinkHandle, WindowInfo,
};
use focus_veil::tracking::{
    ActiveWindowSnapshot, Collaborators, ControllerConfig, DisplayId, DisplayInfo,
    DisplayLinkTick, DisplayPolicy, MaskRegion, OverlayController, PointerEvent, ProcessId,
    Purpose, ResolveRequest, ResolverConfig, SnapshotProvider, TrackingPolicy, TrackingState,
    WindowId, WindowSnapshotResolver,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const REFRESH: Duration = Duration::from_nanos(16_666_667);

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn app_window(id: u64, bounds: Rect) -> WindowInfo {
    WindowInfo {
        id: WindowId(id),
        layer: 0,
        alpha: 1.0,
        bounds,
        owner_pid: ProcessId(42),
        owner_name: "Editor".into(),
        title: Some("notes.txt".into()),
    }
}

fn laptop() -> DisplayInfo {
    DisplayInfo::new(DisplayId(1), Rect::new(0.0, 0.0, 1440.0, 900.0), 2.0)
}

fn external() -> DisplayInfo {
    DisplayInfo::new(DisplayId(2), Rect::new(1440.0, 0.0, 1920.0, 1080.0), 1.0)
}

struct Rig {
    controller: OverlayController,
    windows: MockWindowSource,
    sink: RecordingSinkHandle,
    link: MockSwitchHandle,
}

fn rig(
    windows: Vec<WindowInfo>,
    accessibility: MockAccessibility,
    displays: Vec<DisplayInfo>,
) -> Rig {
    let source = MockWindowSource::new(windows);
    let resolver = WindowSnapshotResolver::new(
        Box::new(source.clone()),
        Box::new(accessibility),
        ResolverConfig::default(),
    );
    let (sink, sink_handle) = RecordingSink::new();
    let (link, link_handle) = MockSwitch::new();
    let (monitor, _) = MockSwitch::new();
    let controller = OverlayController::new(
        ControllerConfig::default(),
        Collaborators {
            provider: Box::new(resolver),
            sink: Box::new(sink),
            display_link: Box::new(link),
            interaction: Box::new(monitor),
        },
        displays,
        Arc::new(TrackingPolicy::default()),
    );
    Rig {
        controller,
        windows: source,
        sink: sink_handle,
        link: link_handle,
    }
}

#[test]
fn single_window_gets_one_expanded_cutout() {
    let snapshot =
        ActiveWindowSnapshot::new(Rect::new(100.0, 100.0, 400.0, 300.0), 12.0, Vec::new())
            .unwrap();
    let requests = build_requests(
        &snapshot,
        &laptop(),
        &DisplayPolicy::default(),
        &MaskPolicy::default(),
    );
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].rect, Rect::new(98.0, 98.0, 404.0, 304.0));
    assert_eq!(requests[0].purpose, Purpose::ApplicationWindow);
    assert!(requests[0].corner_radius <= 150.0);
    assert_eq!(requests[0].corner_radius, 14.0);
}

#[test]
fn overlapping_menus_switch_to_bitmap() {
    let bounds = Rect::new(0.0, 0.0, 800.0, 600.0);
    let mut renderer = MaskRenderer::default();

    let disjoint = [MaskRequest {
        rect: Rect::new(100.0, 100.0, 200.0, 100.0),
        corner_radius: 6.0,
        purpose: Purpose::ApplicationMenu,
    }];
    renderer.render(bounds, 2.0, &[], &disjoint);
    let before = renderer.diagnostics();
    assert_eq!(before.vector_frames, 1);
    assert_eq!(before.bitmap_frames, 0);

    // The second menu overlaps 80% of the first.
    let overlapping = [
        disjoint[0],
        MaskRequest {
            rect: Rect::new(140.0, 100.0, 200.0, 100.0),
            corner_radius: 6.0,
            purpose: Purpose::ApplicationMenu,
        },
    ];
    let image = renderer.render(bounds, 2.0, &[], &overlapping);
    assert!(image.is_bitmap());
    let after = renderer.diagnostics();
    assert_eq!(after.bitmap_frames, before.bitmap_frames + 1);
    assert_eq!(after.vector_frames, before.vector_frames);
}

#[test]
fn nothing_resolvable_clears_every_display() {
    let mut rig = rig(Vec::new(), MockAccessibility::denied(), vec![laptop(), external()]);
    rig.controller.start(Instant::now());
    assert_eq!(rig.windows.query_count(), 1);

    let applied = rig.sink.applied();
    assert_eq!(applied.len(), 2);
    assert!(applied.iter().all(|mask| mask.regions.is_empty()));
    assert!(rig.controller.presented_snapshot().is_none());
    assert_eq!(rig.controller.active_display(), None);
}

#[test]
fn accessibility_fills_in_when_no_base_window_is_listed() {
    let accessibility = MockAccessibility::denied();
    accessibility.set_focused_window(Some(FocusedWindow {
        frame: Rect::new(100.0, 100.0, 400.0, 300.0),
        corner_radius: None,
    }));
    accessibility.set_frontmost_pid(Some(ProcessId(42)));
    let popup = WindowInfo {
        layer: 101,
        ..app_window(9, Rect::new(520.0, 120.0, 180.0, 200.0))
    };
    let source = MockWindowSource::new(vec![popup]);
    let mut resolver = WindowSnapshotResolver::new(
        Box::new(source),
        Box::new(accessibility),
        ResolverConfig::default(),
    );
    let request = ResolveRequest {
        displays: vec![laptop()],
        ..ResolveRequest::default()
    };
    let snapshot = resolver.resolve(&request).expect("focused window");
    assert_eq!(snapshot.frame(), Rect::new(100.0, 500.0, 400.0, 300.0));
    assert_eq!(
        snapshot.corner_radius(),
        ResolverConfig::default().fallback_corner_radius
    );
    let menus = snapshot.supplementary_masks();
    assert_eq!(menus.len(), 1);
    assert_eq!(menus[0].purpose, Purpose::ApplicationMenu);
    assert_eq!(menus[0].frame, Rect::new(520.0, 580.0, 180.0, 200.0));
}

#[test]
fn cutout_order_does_not_depend_on_input_order() {
    let menus = vec![
        MaskRegion::new(Rect::new(600.0, 200.0, 180.0, 240.0), 6.0, Purpose::ApplicationMenu),
        MaskRegion::new(Rect::new(0.0, 876.0, 300.0, 24.0), 4.0, Purpose::SystemMenu),
        MaskRegion::new(Rect::new(300.0, 650.0, 120.0, 90.0), 6.0, Purpose::ApplicationMenu),
    ];
    let mut shuffled = menus.clone();
    shuffled.rotate_left(1);
    shuffled.swap(0, 1);

    let frame = Rect::new(100.0, 100.0, 400.0, 300.0);
    let a = ActiveWindowSnapshot::new(frame, 12.0, menus).unwrap();
    let b = ActiveWindowSnapshot::new(frame, 12.0, shuffled).unwrap();
    let display = laptop();
    let policy = MaskPolicy::default();
    let display_policy = DisplayPolicy::default();
    assert_eq!(
        build_requests(&a, &display, &display_policy, &policy),
        build_requests(&b, &display, &display_policy, &policy)
    );
}

#[test]
fn stop_is_synchronous_and_happens_once() {
    let now = Instant::now();
    let mut rig = rig(
        vec![app_window(1, Rect::new(100.0, 100.0, 400.0, 300.0))],
        MockAccessibility::denied(),
        vec![laptop(), external()],
    );
    rig.controller.start(now);
    rig.controller.pointer(PointerEvent::Began, now);
    assert!(rig.link.is_running());
    rig.sink.clear();

    rig.controller.stop();
    rig.controller.stop();

    let applied = rig.sink.applied();
    assert_eq!(applied.len(), 2);
    assert_eq!(rig.sink.applied_for(DisplayId(1)).len(), 1);
    assert_eq!(rig.sink.applied_for(DisplayId(2)).len(), 1);
    assert!(applied.iter().all(|mask| mask.regions.is_empty()));
    assert_eq!(rig.link.stop_count(), 1);
    assert_eq!(rig.controller.state(), TrackingState::Stopped);
    assert_eq!(rig.controller.next_deadline(), None);
}

#[test]
fn priming_the_same_snapshot_twice_applies_once() {
    let mut rig = rig(Vec::new(), MockAccessibility::denied(), vec![laptop()]);
    let snapshot =
        ActiveWindowSnapshot::new(Rect::new(200.0, 200.0, 500.0, 400.0), 10.0, Vec::new())
            .unwrap();
    rig.controller.prime_overlay_mask(Some(snapshot.clone()));
    rig.controller.prime_overlay_mask(Some(snapshot));

    // Within tolerance of what is on screen: nothing is rebuilt.
    let nudged =
        ActiveWindowSnapshot::new(Rect::new(200.3, 200.0, 500.0, 400.0), 10.0, Vec::new())
            .unwrap();
    rig.controller.prime_overlay_mask(Some(nudged));

    assert_eq!(rig.sink.applied().len(), 1);
    assert_eq!(rig.controller.diagnostics_snapshot().vector_frames, 1);
    assert_eq!(
        rig.controller.presented_snapshot().map(|s| s.frame()),
        Some(Rect::new(200.0, 200.0, 500.0, 400.0))
    );
    assert_eq!(
        rig.controller.last_known(DisplayId(1)).map(|s| s.frame()),
        Some(Rect::new(200.0, 200.0, 500.0, 400.0))
    );
}

#[test]
fn quiet_pointer_stops_the_display_link() {
    let now = Instant::now();
    let mut rig = rig(
        vec![app_window(1, Rect::new(100.0, 100.0, 400.0, 300.0))],
        MockAccessibility::denied(),
        vec![laptop()],
    );
    rig.controller.start(now);
    rig.controller.pointer(PointerEvent::Began, now);
    assert_eq!(rig.link.start_count(), 1);

    rig.controller.tick(now + ms(900));
    assert_eq!(rig.controller.state(), TrackingState::Idle);
    assert!(!rig.link.is_running());
    assert_eq!(rig.link.stop_count(), 1);
}

#[test]
fn stationary_window_produces_no_prediction() {
    let now = Instant::now();
    let mut rig = rig(
        vec![app_window(1, Rect::new(100.0, 100.0, 400.0, 300.0))],
        MockAccessibility::denied(),
        vec![laptop()],
    );
    rig.controller.start(now);
    rig.controller.pointer(PointerEvent::Began, now);
    rig.controller.handle_display_link(DisplayLinkTick {
        host_time: now + ms(16),
        refresh_period: REFRESH,
    });
    assert_eq!(rig.controller.last_predicted(DisplayId(1)), None);
    assert_eq!(rig.sink.applied().len(), 1);
}

#[test]
fn predictions_are_withdrawn_when_the_boost_ends() {
    let now = Instant::now();
    let mut rig = rig(
        vec![app_window(1, Rect::new(100.0, 100.0, 400.0, 300.0))],
        MockAccessibility::denied(),
        vec![laptop()],
    );
    rig.controller.start(now);
    rig.controller.pointer(PointerEvent::Began, now);

    rig.windows
        .set_windows(vec![app_window(1, Rect::new(110.0, 100.0, 400.0, 300.0))]);
    rig.controller.handle_display_link(DisplayLinkTick {
        host_time: now + ms(16),
        refresh_period: REFRESH,
    });
    let predicted = rig
        .controller
        .last_predicted(DisplayId(1))
        .expect("moving window is extrapolated");
    assert!(predicted.x > 110.0);

    rig.controller.tick(now + ms(2000));
    assert_eq!(rig.controller.last_predicted(DisplayId(1)), None);
    let applied = rig.controller.last_applied(DisplayId(1)).expect("applied");
    assert_eq!(applied[0].frame, Rect::new(108.0, 498.0, 404.0, 304.0));
}

#[test]
fn moving_display_link_frame_renders_once() {
    let now = Instant::now();
    let mut rig = rig(
        vec![app_window(1, Rect::new(100.0, 100.0, 400.0, 300.0))],
        MockAccessibility::denied(),
        vec![laptop()],
    );
    rig.controller.start(now);
    rig.controller.pointer(PointerEvent::Began, now);

    rig.windows
        .set_windows(vec![app_window(1, Rect::new(110.0, 100.0, 400.0, 300.0))]);
    rig.controller.handle_display_link(DisplayLinkTick {
        host_time: now + ms(16),
        refresh_period: REFRESH,
    });

    assert!(rig.controller.last_predicted(DisplayId(1)).is_some());
    assert_eq!(
        rig.controller.presented_snapshot().map(|s| s.frame()),
        Some(Rect::new(110.0, 500.0, 400.0, 300.0))
    );
    assert_eq!(rig.sink.applied().len(), 2);
    assert_eq!(rig.controller.diagnostics_snapshot().vector_frames, 2);
}

#[test]
fn release_after_drag_settles_once_cooldown_elapses() {
    let start = Instant::now();
    let mut rig = rig(
        vec![app_window(1, Rect::new(100.0, 100.0, 400.0, 300.0))],
        MockAccessibility::denied(),
        vec![laptop()],
    );
    rig.controller.start(start);
    rig.controller.pointer(PointerEvent::Began, start);

    for step in 1..=5u64 {
        let x = 100.0 + 10.0 * step as f64;
        rig.windows
            .set_windows(vec![app_window(1, Rect::new(x, 100.0, 400.0, 300.0))]);
        rig.controller.handle_display_link(DisplayLinkTick {
            host_time: start + ms(16 * step),
            refresh_period: REFRESH,
        });
        if step == 3 {
            rig.controller.pointer(PointerEvent::Dragged, start + ms(48));
        }
    }
    assert!(rig.controller.last_predicted(DisplayId(1)).is_some());

    rig.controller.pointer(PointerEvent::Ended, start + ms(80));

    // The window stays put: the timer sample withdraws the prediction
    // without counting as movement.
    rig.controller.tick(start + ms(96));
    assert_eq!(rig.controller.last_predicted(DisplayId(1)), None);
    assert_eq!(
        rig.controller.last_applied(DisplayId(1)).unwrap()[0].frame,
        Rect::new(148.0, 498.0, 404.0, 304.0)
    );
    assert!(rig.controller.state().is_boosted());

    // 260 ms after release, past the 250 ms cooldown.
    rig.controller.tick(start + ms(340));
    assert_eq!(rig.controller.state(), TrackingState::Idle);
    assert!(!rig.link.is_running());
    assert_eq!(rig.link.stop_count(), 1);
}

#[test]
fn display_link_without_bounds_falls_back_to_full_resolve() {
    let now = Instant::now();
    let accessibility = MockAccessibility::denied();
    accessibility.set_focused_window(Some(FocusedWindow {
        frame: Rect::new(100.0, 100.0, 400.0, 300.0),
        corner_radius: Some(12.0),
    }));
    let mut rig = rig(Vec::new(), accessibility.clone(), vec![laptop()]);
    rig.controller.start(now);
    rig.controller.pointer(PointerEvent::Began, now);
    assert_eq!(rig.sink.applied().len(), 1);

    accessibility.set_focused_window(Some(FocusedWindow {
        frame: Rect::new(160.0, 100.0, 400.0, 300.0),
        corner_radius: Some(12.0),
    }));
    rig.controller.handle_display_link(DisplayLinkTick {
        host_time: now + ms(16),
        refresh_period: REFRESH,
    });

    assert_eq!(
        rig.controller.presented_snapshot().map(|s| s.frame()),
        Some(Rect::new(160.0, 500.0, 400.0, 300.0))
    );
    assert_eq!(rig.sink.applied().len(), 2);
    assert!(rig.controller.state().display_link_active());
}
