//! Seams to the environment: window enumeration, accessibility, pointer
//! interaction, display-synchronised ticks, display topology and the
//! per-display overlay sink. Each trait has a mock with a shared handle so
//! tests can script inputs and inspect outputs.

use crate::geometry::Rect;
use crate::mask::MaskImage;
use crate::tracking::model::{DisplayId, DisplayInfo, MaskRegion, ProcessId, WindowId};
use anyhow::anyhow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowId,
    pub layer: i32,
    pub alpha: f64,
    /// Bounds in enumeration space.
    pub bounds: Rect,
    pub owner_pid: ProcessId,
    pub owner_name: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusedWindow {
    /// Frame in enumeration space.
    pub frame: Rect,
    pub corner_radius: Option<f64>,
}

/// Front-to-back list of on-screen windows.
pub trait WindowListSource: Send {
    fn windows(&self) -> Vec<WindowInfo>;
}

pub trait AccessibilitySource: Send {
    fn focused_window(&self) -> Option<FocusedWindow>;
    fn corner_radius(&self, pid: ProcessId, bounds: Rect) -> Option<f64>;
    fn frontmost_pid(&self) -> Option<ProcessId>;
}

pub trait InteractionMonitor: Send {
    fn start(&mut self) -> anyhow::Result<()>;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

pub trait DisplayLink: Send {
    fn start(&mut self) -> anyhow::Result<()>;
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

pub trait DisplayTopology: Send {
    fn displays(&self) -> Vec<DisplayInfo>;
}

/// Paints the overlay of each display; consumes masks, never produces them.
pub trait OverlaySink: Send {
    fn apply_mask(&mut self, display: DisplayId, regions: &[MaskRegion], mask: &MaskImage);
    fn set_filters_enabled(&mut self, display: DisplayId, enabled: bool);
}

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MockWindowSource {
    windows: Arc<Mutex<Vec<WindowInfo>>>,
    queries: Arc<AtomicUsize>,
}

impl MockWindowSource {
    pub fn new(windows: Vec<WindowInfo>) -> Self {
        Self {
            windows: Arc::new(Mutex::new(windows)),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_windows(&self, windows: Vec<WindowInfo>) {
        if let Ok(mut guard) = self.windows.lock() {
            *guard = windows;
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl WindowListSource for MockWindowSource {
    fn windows(&self) -> Vec<WindowInfo> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.windows
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
struct MockAccessibilityState {
    focused: Option<FocusedWindow>,
    corner_radius: Option<f64>,
    frontmost: Option<ProcessId>,
}

#[derive(Clone, Default)]
pub struct MockAccessibility {
    state: Arc<Mutex<MockAccessibilityState>>,
}

impl MockAccessibility {
    /// Accessibility without permission: every query fails.
    pub fn denied() -> Self {
        Self::default()
    }

    pub fn set_focused_window(&self, focused: Option<FocusedWindow>) {
        if let Ok(mut state) = self.state.lock() {
            state.focused = focused;
        }
    }

    pub fn set_corner_radius(&self, radius: Option<f64>) {
        if let Ok(mut state) = self.state.lock() {
            state.corner_radius = radius;
        }
    }

    pub fn set_frontmost_pid(&self, pid: Option<ProcessId>) {
        if let Ok(mut state) = self.state.lock() {
            state.frontmost = pid;
        }
    }
}

impl AccessibilitySource for MockAccessibility {
    fn focused_window(&self) -> Option<FocusedWindow> {
        self.state.lock().ok()?.focused
    }

    fn corner_radius(&self, _pid: ProcessId, _bounds: Rect) -> Option<f64> {
        self.state.lock().ok()?.corner_radius
    }

    fn frontmost_pid(&self) -> Option<ProcessId> {
        self.state.lock().ok()?.frontmost
    }
}

#[derive(Default)]
struct MockSwitchState {
    running: Mutex<bool>,
    start_count: AtomicUsize,
    stop_count: AtomicUsize,
    fail_start: Mutex<bool>,
}

/// Start/stop recorder shared by the interaction monitor and display link mocks.
#[derive(Clone, Default)]
pub struct MockSwitch {
    state: Arc<MockSwitchState>,
}

impl MockSwitch {
    pub fn new() -> (Self, MockSwitchHandle) {
        let state = Arc::new(MockSwitchState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            MockSwitchHandle { state },
        )
    }

    fn switch_on(&mut self) -> anyhow::Result<()> {
        if *self.state.fail_start.lock().map_err(|_| anyhow!("lock"))? {
            return Err(anyhow!("permission denied"));
        }
        let mut running = self.state.running.lock().map_err(|_| anyhow!("lock"))?;
        if !*running {
            self.state.start_count.fetch_add(1, Ordering::SeqCst);
            *running = true;
        }
        Ok(())
    }

    fn switch_off(&mut self) {
        if let Ok(mut running) = self.state.running.lock() {
            if *running {
                self.state.stop_count.fetch_add(1, Ordering::SeqCst);
            }
            *running = false;
        }
    }

    fn running(&self) -> bool {
        self.state
            .running
            .lock()
            .map(|guard| *guard)
            .unwrap_or(false)
    }
}

impl InteractionMonitor for MockSwitch {
    fn start(&mut self) -> anyhow::Result<()> {
        self.switch_on()
    }

    fn stop(&mut self) {
        self.switch_off()
    }

    fn is_running(&self) -> bool {
        self.running()
    }
}

impl DisplayLink for MockSwitch {
    fn start(&mut self) -> anyhow::Result<()> {
        self.switch_on()
    }

    fn stop(&mut self) {
        self.switch_off()
    }

    fn is_running(&self) -> bool {
        self.running()
    }
}

pub struct MockSwitchHandle {
    state: Arc<MockSwitchState>,
}

impl MockSwitchHandle {
    pub fn is_running(&self) -> bool {
        self.state
            .running
            .lock()
            .map(|guard| *guard)
            .unwrap_or(false)
    }

    pub fn start_count(&self) -> usize {
        self.state.start_count.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.state.stop_count.load(Ordering::SeqCst)
    }

    pub fn fail_start(&self, fail: bool) {
        if let Ok(mut guard) = self.state.fail_start.lock() {
            *guard = fail;
        }
    }
}

#[derive(Clone, Default)]
pub struct StaticDisplays {
    displays: Arc<Mutex<Vec<DisplayInfo>>>,
}

impl StaticDisplays {
    pub fn new(displays: Vec<DisplayInfo>) -> Self {
        Self {
            displays: Arc::new(Mutex::new(displays)),
        }
    }

    pub fn set(&self, displays: Vec<DisplayInfo>) {
        if let Ok(mut guard) = self.displays.lock() {
            *guard = displays;
        }
    }
}

impl DisplayTopology for StaticDisplays {
    fn displays(&self) -> Vec<DisplayInfo> {
        self.displays
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedMask {
    pub display: DisplayId,
    pub regions: Vec<MaskRegion>,
    pub bitmap: bool,
}

#[derive(Default)]
struct RecordingSinkState {
    applied: Mutex<Vec<AppliedMask>>,
    filters: Mutex<Vec<(DisplayId, bool)>>,
}

/// Sink that records every call for later inspection.
#[derive(Clone, Default)]
pub struct RecordingSink {
    state: Arc<RecordingSinkState>,
}

impl RecordingSink {
    pub fn new() -> (Self, RecordingSinkHandle) {
        let state = Arc::new(RecordingSinkState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            RecordingSinkHandle { state },
        )
    }
}

impl OverlaySink for RecordingSink {
    fn apply_mask(&mut self, display: DisplayId, regions: &[MaskRegion], mask: &MaskImage) {
        if let Ok(mut applied) = self.state.applied.lock() {
            applied.push(AppliedMask {
                display,
                regions: regions.to_vec(),
                bitmap: mask.is_bitmap(),
            });
        }
    }

    fn set_filters_enabled(&mut self, display: DisplayId, enabled: bool) {
        if let Ok(mut filters) = self.state.filters.lock() {
            filters.push((display, enabled));
        }
    }
}

pub struct RecordingSinkHandle {
    state: Arc<RecordingSinkState>,
}

impl RecordingSinkHandle {
    pub fn applied(&self) -> Vec<AppliedMask> {
        self.state
            .applied
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn applied_for(&self, display: DisplayId) -> Vec<AppliedMask> {
        self.applied()
            .into_iter()
            .filter(|mask| mask.display == display)
            .collect()
    }

    pub fn last_for(&self, display: DisplayId) -> Option<AppliedMask> {
        self.applied_for(display).pop()
    }

    pub fn filters(&self) -> Vec<(DisplayId, bool)> {
        self.state
            .filters
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut applied) = self.state.applied.lock() {
            applied.clear();
        }
        if let Ok(mut filters) = self.state.filters.lock() {
            filters.clear();
        }
    }
}
