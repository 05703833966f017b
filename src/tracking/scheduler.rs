use crate::tracking::model::{PointerEvent, TrackingProfile};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Stopped,
    Idle,
    InteractionBoost { display_link_active: bool },
}

impl TrackingState {
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Stopped)
    }

    pub fn is_boosted(self) -> bool {
        matches!(self, Self::InteractionBoost { .. })
    }

    pub fn display_link_active(self) -> bool {
        matches!(
            self,
            Self::InteractionBoost {
                display_link_active: true
            }
        )
    }
}

pub fn can_transition(from: TrackingState, to: TrackingState) -> bool {
    use TrackingState::*;
    matches!(
        (from, to),
        (Stopped, Idle)
            | (Idle, InteractionBoost { .. })
            | (InteractionBoost { .. }, Idle)
            | (InteractionBoost { .. }, InteractionBoost { .. })
            | (_, Stopped)
    ) || from == to
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionTiming {
    pub boost_duration: Duration,
    pub cooldown_duration: Duration,
    /// Ceiling on display-link work while boosted.
    pub max_fast_frame_rate_hz: f64,
}

impl Default for InteractionTiming {
    fn default() -> Self {
        Self {
            boost_duration: Duration::from_millis(600),
            cooldown_duration: Duration::from_millis(250),
            max_fast_frame_rate_hz: 75.0,
        }
    }
}

impl InteractionTiming {
    pub fn min_fast_frame_gap(&self) -> Duration {
        if self.max_fast_frame_rate_hz.is_finite() && self.max_fast_frame_rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / self.max_fast_frame_rate_hz)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Advance {
    /// The boost deadline passed during this call.
    pub boost_ended: bool,
    /// A full resolve is due.
    pub sample: bool,
}

/// Pure timing state machine. It never talks to the environment; the
/// controller mirrors [`TrackingState::display_link_active`] onto the real
/// display link after every call.
#[derive(Debug, Clone)]
pub struct TrackingScheduler {
    profile: TrackingProfile,
    timing: InteractionTiming,
    state: TrackingState,
    boost_deadline: Option<Instant>,
    next_sample: Option<Instant>,
    last_fast_frame: Option<Instant>,
}

impl TrackingScheduler {
    pub fn new(profile: TrackingProfile, timing: InteractionTiming) -> Self {
        Self {
            profile,
            timing,
            state: TrackingState::Stopped,
            boost_deadline: None,
            next_sample: None,
            last_fast_frame: None,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn profile(&self) -> TrackingProfile {
        self.profile
    }

    pub fn timing(&self) -> InteractionTiming {
        self.timing
    }

    pub fn boost_deadline(&self) -> Option<Instant> {
        self.boost_deadline
    }

    fn transition(&mut self, to: TrackingState) {
        if self.state == to {
            return;
        }
        if !can_transition(self.state, to) {
            tracing::warn!(from = ?self.state, ?to, "rejected tracking state transition");
            return;
        }
        tracing::debug!(from = ?self.state, ?to, "tracking state transition");
        self.state = to;
    }

    /// Returns `false` when already running.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.state.is_running() {
            return false;
        }
        self.transition(TrackingState::Idle);
        self.next_sample = Some(now + self.profile.idle_interval);
        true
    }

    pub fn stop(&mut self) {
        self.transition(TrackingState::Stopped);
        self.boost_deadline = None;
        self.next_sample = None;
        self.last_fast_frame = None;
    }

    pub fn current_interval(&self) -> Duration {
        if self.state.is_boosted() {
            self.profile.interaction_interval
        } else {
            self.profile.idle_interval
        }
    }

    fn pull_sample_forward(&mut self, now: Instant) {
        let candidate = now + self.current_interval();
        self.next_sample = Some(match self.next_sample {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
    }

    pub fn pointer(&mut self, event: PointerEvent, now: Instant) {
        if !self.state.is_running() {
            return;
        }
        match event {
            PointerEvent::Began | PointerEvent::Dragged => {
                let extended = now + self.timing.boost_duration;
                self.boost_deadline = Some(match self.boost_deadline {
                    Some(existing) if existing > extended => existing,
                    _ => extended,
                });
                self.transition(TrackingState::InteractionBoost {
                    display_link_active: true,
                });
                self.pull_sample_forward(now);
            }
            PointerEvent::Ended => {
                if self.state.is_boosted() {
                    self.boost_deadline = Some(now + self.timing.cooldown_duration);
                }
            }
        }
    }

    /// A sample differed from the presented one: stay responsive for a
    /// while, without starting the display link.
    pub fn note_activity(&mut self, now: Instant) {
        if !self.state.is_running() {
            return;
        }
        let extended = now + self.timing.boost_duration;
        match self.state {
            TrackingState::Idle => {
                self.boost_deadline = Some(extended);
                self.transition(TrackingState::InteractionBoost {
                    display_link_active: false,
                });
                self.pull_sample_forward(now);
            }
            TrackingState::InteractionBoost { .. } => {
                if self.boost_deadline.map_or(true, |deadline| deadline < extended) {
                    self.boost_deadline = Some(extended);
                }
            }
            TrackingState::Stopped => {}
        }
    }

    pub fn advance(&mut self, now: Instant) -> Advance {
        let mut advance = Advance::default();
        if !self.state.is_running() {
            return advance;
        }

        if self.state.is_boosted() && self.boost_deadline.map_or(true, |deadline| deadline <= now)
        {
            self.transition(TrackingState::Idle);
            self.boost_deadline = None;
            self.last_fast_frame = None;
            advance.boost_ended = true;
        }

        if self.next_sample.map_or(true, |due| due <= now) {
            advance.sample = true;
            self.next_sample = Some(now + self.current_interval());
        } else if advance.boost_ended {
            self.next_sample = Some(now + self.current_interval());
        }
        advance
    }

    /// Rate limit for display-link ticks.
    pub fn admit_fast_frame(&mut self, now: Instant) -> bool {
        if !self.state.display_link_active() {
            return false;
        }
        if let Some(last) = self.last_fast_frame {
            if now.saturating_duration_since(last) < self.timing.min_fast_frame_gap() {
                return false;
            }
        }
        self.last_fast_frame = Some(now);
        true
    }

    /// Earliest instant at which [`advance`](Self::advance) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.state.is_running() {
            return None;
        }
        match (self.next_sample, self.boost_deadline) {
            (Some(sample), Some(boost)) => Some(sample.min(boost)),
            (sample, boost) => sample.or(boost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::model::TrackingProfileKind;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn scheduler() -> TrackingScheduler {
        TrackingScheduler::new(
            TrackingProfile::for_kind(TrackingProfileKind::Standard),
            InteractionTiming::default(),
        )
    }

    #[test]
    fn lifecycle_transitions() {
        use TrackingState::*;
        assert!(can_transition(Stopped, Idle));
        assert!(!can_transition(
            Stopped,
            InteractionBoost {
                display_link_active: true
            }
        ));
        assert!(can_transition(
            InteractionBoost {
                display_link_active: false
            },
            Stopped
        ));
        assert!(can_transition(Idle, Stopped));
    }

    #[test]
    fn pointer_events_before_start_are_ignored() {
        let now = Instant::now();
        let mut scheduler = scheduler();
        scheduler.pointer(PointerEvent::Began, now);
        assert_eq!(scheduler.state(), TrackingState::Stopped);
        assert!(scheduler.next_deadline().is_none());
    }

    #[test]
    fn drag_boosts_then_release_shortens_deadline() {
        let now = Instant::now();
        let mut scheduler = scheduler();
        scheduler.start(now);
        scheduler.pointer(PointerEvent::Began, now);
        assert!(scheduler.state().display_link_active());
        assert_eq!(scheduler.boost_deadline(), Some(now + ms(600)));

        scheduler.pointer(PointerEvent::Dragged, now + ms(100));
        assert_eq!(scheduler.boost_deadline(), Some(now + ms(700)));
        assert_eq!(scheduler.current_interval(), ms(16));

        scheduler.pointer(PointerEvent::Ended, now + ms(200));
        assert_eq!(scheduler.boost_deadline(), Some(now + ms(450)));

        let advance = scheduler.advance(now + ms(450));
        assert!(advance.boost_ended);
        assert_eq!(scheduler.state(), TrackingState::Idle);
        assert_eq!(scheduler.current_interval(), ms(250));
    }

    #[test]
    fn activity_enters_boost_without_display_link() {
        let now = Instant::now();
        let mut scheduler = scheduler();
        scheduler.start(now);
        scheduler.note_activity(now);
        assert_eq!(
            scheduler.state(),
            TrackingState::InteractionBoost {
                display_link_active: false
            }
        );
        assert!(scheduler.next_deadline().expect("deadline") <= now + ms(16));
    }

    #[test]
    fn samples_follow_current_interval() {
        let now = Instant::now();
        let mut scheduler = scheduler();
        scheduler.start(now);
        assert!(!scheduler.advance(now + ms(100)).sample);
        assert!(scheduler.advance(now + ms(250)).sample);
        assert_eq!(scheduler.next_deadline(), Some(now + ms(500)));
    }

    #[test]
    fn fast_frames_are_rate_limited() {
        let now = Instant::now();
        let mut scheduler = scheduler();
        scheduler.start(now);
        assert!(!scheduler.admit_fast_frame(now));
        scheduler.pointer(PointerEvent::Began, now);
        assert!(scheduler.admit_fast_frame(now));
        assert!(!scheduler.admit_fast_frame(now + ms(8)));
        assert!(scheduler.admit_fast_frame(now + ms(14)));
    }

    #[test]
    fn stop_clears_deadlines() {
        let now = Instant::now();
        let mut scheduler = scheduler();
        scheduler.start(now);
        scheduler.pointer(PointerEvent::Began, now);
        scheduler.stop();
        assert_eq!(scheduler.state(), TrackingState::Stopped);
        assert!(scheduler.next_deadline().is_none());
        assert!(scheduler.start(now));
    }
}
