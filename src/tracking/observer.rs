use crate::tracking::model::DisplayId;
use crate::tracking::scheduler::TrackingState;
use std::sync::{Arc, Mutex};

/// Synchronous listener for controller changes. Callbacks run on the
/// tracking thread and must not block.
pub trait TrackerObserver: Send {
    fn tracking_state_changed(&mut self, _state: TrackingState) {}
    fn active_display_changed(&mut self, _display: Option<DisplayId>) {}
    fn managed_displays_changed(&mut self, _displays: &[DisplayId]) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    State(TrackingState),
    ActiveDisplay(Option<DisplayId>),
    Displays(Vec<DisplayId>),
}

#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<ObserverEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> (Self, RecordingObserverHandle) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: Arc::clone(&events),
            },
            RecordingObserverHandle { events },
        )
    }

    fn push(&self, event: ObserverEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl TrackerObserver for RecordingObserver {
    fn tracking_state_changed(&mut self, state: TrackingState) {
        self.push(ObserverEvent::State(state));
    }

    fn active_display_changed(&mut self, display: Option<DisplayId>) {
        self.push(ObserverEvent::ActiveDisplay(display));
    }

    fn managed_displays_changed(&mut self, displays: &[DisplayId]) {
        self.push(ObserverEvent::Displays(displays.to_vec()));
    }
}

pub struct RecordingObserverHandle {
    events: Arc<Mutex<Vec<ObserverEvent>>>,
}

impl RecordingObserverHandle {
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}
