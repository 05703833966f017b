use focus_veil::tracking::scheduler::can_transition;
use focus_veil::tracking::{
    InteractionTiming, PointerEvent, TrackingProfile, TrackingProfileKind, TrackingScheduler,
    TrackingState,
};
use std::time::{Duration, Instant};

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn standard() -> TrackingScheduler {
    TrackingScheduler::new(
        TrackingProfile::for_kind(TrackingProfileKind::Standard),
        InteractionTiming::default(),
    )
}

#[test]
fn quiet_pointer_settles_to_idle_interval() {
    let start = Instant::now();
    let mut scheduler = standard();
    assert!(scheduler.start(start));
    scheduler.pointer(PointerEvent::Began, start);
    assert!(scheduler.state().display_link_active());

    // Longer than boost plus cooldown with no further pointer activity.
    let later = start + ms(600 + 250 + 50);
    let advance = scheduler.advance(later);
    assert!(advance.boost_ended);
    assert_eq!(scheduler.state(), TrackingState::Idle);
    assert!(!scheduler.state().display_link_active());
    assert_eq!(
        scheduler.current_interval(),
        TrackingProfile::for_kind(TrackingProfileKind::Standard).idle_interval
    );
}

#[test]
fn drag_extends_then_release_shortens_to_cooldown() {
    let start = Instant::now();
    let mut scheduler = standard();
    scheduler.start(start);

    scheduler.pointer(PointerEvent::Began, start);
    assert_eq!(scheduler.boost_deadline(), Some(start + ms(600)));

    scheduler.pointer(PointerEvent::Dragged, start + ms(100));
    assert_eq!(scheduler.boost_deadline(), Some(start + ms(700)));
    assert_eq!(scheduler.current_interval(), ms(16));

    scheduler.pointer(PointerEvent::Ended, start + ms(200));
    assert_eq!(scheduler.boost_deadline(), Some(start + ms(450)));

    let during = scheduler.advance(start + ms(300));
    assert!(!during.boost_ended);
    assert!(scheduler.state().is_boosted());

    let after = scheduler.advance(start + ms(460));
    assert!(after.boost_ended);
    assert_eq!(scheduler.state(), TrackingState::Idle);
    assert_eq!(scheduler.current_interval(), ms(250));
    assert!(!scheduler.admit_fast_frame(start + ms(470)));
}

#[test]
fn fast_frames_are_rate_limited_while_boosted() {
    let start = Instant::now();
    let mut scheduler = standard();
    scheduler.start(start);
    scheduler.pointer(PointerEvent::Began, start);

    assert!(scheduler.admit_fast_frame(start + ms(1)));
    assert!(!scheduler.admit_fast_frame(start + ms(5)));
    assert!(scheduler.admit_fast_frame(start + ms(15)));
}

#[test]
fn stopped_scheduler_has_no_deadline() {
    let start = Instant::now();
    let mut scheduler = standard();
    assert_eq!(scheduler.next_deadline(), None);
    scheduler.start(start);
    assert_eq!(scheduler.next_deadline(), Some(start + ms(250)));
    scheduler.stop();
    assert_eq!(scheduler.next_deadline(), None);
    assert!(!scheduler.advance(start + ms(300)).sample);
}

#[test]
fn lifecycle_never_jumps_from_stopped_to_boost() {
    let boosted = TrackingState::InteractionBoost {
        display_link_active: true,
    };
    assert!(!can_transition(TrackingState::Stopped, boosted));
    assert!(can_transition(TrackingState::Stopped, TrackingState::Idle));
    assert!(can_transition(boosted, TrackingState::Stopped));
}
