use crate::geometry::Rect;
use crate::mask::{build_requests, MaskImage, MaskPolicy, MaskRenderer, RendererConfig};
use crate::tracking::backend::{DisplayLink, InteractionMonitor, OverlaySink};
use crate::tracking::model::{
    regions_approx_eq, ActiveWindowSnapshot, DisplayId, DisplayInfo, DisplayLinkTick,
    DisplayPolicy, MaskDiagnostics, MaskRegion, PointerEvent, ProcessId, TrackingPolicy,
    TrackingProfile, WindowId,
};
use crate::tracking::observer::TrackerObserver;
use crate::tracking::predictor::{is_meaningful_shift, MotionPredictor, PredictorConfig};
use crate::tracking::resolver::{bounding_display, ResolveRequest, SnapshotProvider};
use crate::tracking::scheduler::{InteractionTiming, TrackingScheduler, TrackingState};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionConfig {
    pub min_center_delta: f64,
    pub min_size_delta: f64,
    /// Lead time in display refresh periods.
    pub lead_frames: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_center_delta: 0.75,
            min_size_delta: 0.5,
            lead_frames: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub profile: TrackingProfile,
    pub timing: InteractionTiming,
    /// Full resolves within this distance of the presented snapshot are
    /// treated as unchanged.
    pub snapshot_tolerance: f64,
    /// Same, for the display-link fast path.
    pub fast_path_tolerance: f64,
    pub prediction: PredictionConfig,
    pub predictor: PredictorConfig,
    pub mask_policy: MaskPolicy,
    pub renderer: RendererConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            profile: TrackingProfile::default(),
            timing: InteractionTiming::default(),
            snapshot_tolerance: 0.5,
            fast_path_tolerance: 0.25,
            prediction: PredictionConfig::default(),
            predictor: PredictorConfig::default(),
            mask_policy: MaskPolicy::default(),
            renderer: RendererConfig::default(),
        }
    }
}

/// Everything the controller talks to outside the core.
pub struct Collaborators {
    pub provider: Box<dyn SnapshotProvider>,
    pub sink: Box<dyn OverlaySink>,
    pub display_link: Box<dyn DisplayLink>,
    pub interaction: Box<dyn InteractionMonitor>,
}

struct DisplayState {
    info: DisplayInfo,
    policy: DisplayPolicy,
    renderer: MaskRenderer,
    last_applied: Option<Vec<MaskRegion>>,
    last_known: Option<ActiveWindowSnapshot>,
    last_predicted: Option<Rect>,
    is_active: bool,
}

impl DisplayState {
    fn new(info: DisplayInfo, policy: DisplayPolicy, renderer: RendererConfig) -> Self {
        Self {
            info,
            policy,
            renderer: MaskRenderer::new(renderer),
            last_applied: None,
            last_known: None,
            last_predicted: None,
            is_active: false,
        }
    }

    fn clear_cache(&mut self) {
        self.last_applied = None;
        self.last_known = None;
        self.last_predicted = None;
        self.is_active = false;
    }

    /// Menu-bar strip along the top edge in content space.
    fn static_rects(&self) -> Vec<Rect> {
        let height = self.info.menu_bar_height;
        if self.policy.excluded || !self.policy.keep_menu_bar_visible || height <= 0.0 {
            return Vec::new();
        }
        let bounds = self.info.content_bounds();
        vec![Rect::new(
            0.0,
            bounds.height - height,
            bounds.width,
            height,
        )]
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Presentation {
    Unset,
    Cleared,
    Window(ActiveWindowSnapshot),
}

impl Presentation {
    fn snapshot(&self) -> Option<&ActiveWindowSnapshot> {
        match self {
            Presentation::Window(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Drives resolution, prediction and mask application for every managed
/// display. Single-threaded; owns all per-display caches.
pub struct OverlayController {
    config: ControllerConfig,
    scheduler: TrackingScheduler,
    provider: Box<dyn SnapshotProvider>,
    predictor: MotionPredictor,
    sink: Box<dyn OverlaySink>,
    display_link: Box<dyn DisplayLink>,
    interaction: Box<dyn InteractionMonitor>,
    displays: Vec<DisplayState>,
    policy: Arc<TrackingPolicy>,
    excluded_windows: HashSet<WindowId>,
    preferred_process: Option<ProcessId>,
    presented: Presentation,
    active_display: Option<DisplayId>,
    observers: Vec<Box<dyn TrackerObserver>>,
}

impl OverlayController {
    pub fn new(
        config: ControllerConfig,
        collaborators: Collaborators,
        displays: Vec<DisplayInfo>,
        policy: Arc<TrackingPolicy>,
    ) -> Self {
        let displays = displays
            .into_iter()
            .map(|info| DisplayState::new(info, policy.for_display(info.id), config.renderer))
            .collect();
        Self {
            scheduler: TrackingScheduler::new(config.profile, config.timing),
            predictor: MotionPredictor::new(config.predictor),
            provider: collaborators.provider,
            sink: collaborators.sink,
            display_link: collaborators.display_link,
            interaction: collaborators.interaction,
            displays,
            policy,
            excluded_windows: HashSet::new(),
            preferred_process: None,
            presented: Presentation::Unset,
            active_display: None,
            observers: Vec::new(),
            config,
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn TrackerObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> TrackingState {
        self.scheduler.state()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn policy(&self) -> &TrackingPolicy {
        &self.policy
    }

    pub fn active_display(&self) -> Option<DisplayId> {
        self.active_display
    }

    pub fn managed_displays(&self) -> Vec<DisplayId> {
        self.displays.iter().map(|state| state.info.id).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn presented_snapshot(&self) -> Option<&ActiveWindowSnapshot> {
        self.presented.snapshot()
    }

    pub fn last_applied(&self, display: DisplayId) -> Option<&[MaskRegion]> {
        self.display(display)?.last_applied.as_deref()
    }

    pub fn last_predicted(&self, display: DisplayId) -> Option<Rect> {
        self.display(display)?.last_predicted
    }

    pub fn last_known(&self, display: DisplayId) -> Option<&ActiveWindowSnapshot> {
        self.display(display)?.last_known.as_ref()
    }

    /// Whether `display` is the one under the tracked window.
    pub fn is_active(&self, display: DisplayId) -> bool {
        self.display(display).is_some_and(|state| state.is_active)
    }

    pub fn current_mask(&self, display: DisplayId) -> Option<&MaskImage> {
        self.display(display).map(|state| state.renderer.image())
    }

    fn display(&self, display: DisplayId) -> Option<&DisplayState> {
        self.displays.iter().find(|state| state.info.id == display)
    }

    pub fn diagnostics_snapshot(&self) -> MaskDiagnostics {
        self.displays
            .iter()
            .map(|state| state.renderer.diagnostics())
            .fold(MaskDiagnostics::default(), MaskDiagnostics::merge)
    }

    // -- lifecycle ---------------------------------------------------------

    pub fn start(&mut self, now: Instant) {
        let before = self.scheduler.state();
        if !self.scheduler.start(now) {
            tracing::debug!("tracking already running");
            return;
        }
        if let Err(err) = self.interaction.start() {
            tracing::warn!(?err, "interaction monitoring unavailable, continuing with polling");
        }
        self.apply_filters();
        self.notify_state(before);
        self.refresh(now);
    }

    /// Synchronous and total: every managed display receives exactly one
    /// empty mask and all caches are dropped.
    pub fn stop(&mut self) {
        let before = self.scheduler.state();
        if !before.is_running() {
            return;
        }
        self.scheduler.stop();
        self.display_link.stop();
        self.interaction.stop();

        for state in &mut self.displays {
            state.renderer.reset();
            let cleared = MaskImage::full_coverage(state.info.content_bounds(), state.info.scale);
            self.sink.apply_mask(state.info.id, &[], &cleared);
            state.clear_cache();
        }
        self.presented = Presentation::Unset;
        self.predictor.reset();
        self.set_active_display(None);
        self.notify_state(before);
    }

    // -- events ------------------------------------------------------------

    pub fn tick(&mut self, now: Instant) {
        let before = self.scheduler.state();
        if !before.is_running() {
            tracing::warn!("tracking tick before start ignored");
            return;
        }
        let advance = self.scheduler.advance(now);
        if advance.boost_ended {
            self.end_boost();
        }
        if advance.sample && self.refresh(now) {
            self.scheduler.note_activity(now);
        }
        self.sync_display_link();
        self.notify_state(before);
    }

    pub fn pointer(&mut self, event: PointerEvent, now: Instant) {
        let before = self.scheduler.state();
        if !before.is_running() {
            tracing::warn!(?event, "pointer event before start ignored");
            return;
        }
        self.scheduler.pointer(event, now);
        self.sync_display_link();
        self.notify_state(before);
    }

    pub fn handle_display_link(&mut self, tick: DisplayLinkTick) {
        let now = tick.host_time;
        if !self.scheduler.state().display_link_active() {
            tracing::trace!("display link tick outside interaction ignored");
            return;
        }
        self.predictor.set_refresh_period(tick.refresh_period);
        if !self.scheduler.admit_fast_frame(now) {
            return;
        }

        let request = self.resolve_request();
        let Some(frame) = self.provider.resolve_frame(&request) else {
            if self.refresh(now) {
                self.scheduler.note_activity(now);
            }
            return;
        };
        let Some(base) = self.presented.snapshot().cloned() else {
            if self.refresh(now) {
                self.scheduler.note_activity(now);
            }
            return;
        };

        // The observed frame is adopted first so an active-display change
        // resets the history before this sample lands in it.
        let moved = !frame.approx_eq(&base.frame(), self.config.fast_path_tolerance);
        let updated = if moved { base.with_frame(frame) } else { None };
        let adopted = match updated {
            Some(updated) => {
                self.adopt(Presentation::Window(updated));
                self.scheduler.note_activity(now);
                true
            }
            None => false,
        };
        self.predictor.record(frame, now);

        let lead = tick.refresh_period.mul_f64(self.config.prediction.lead_frames.max(0.0));
        let prediction = self.predictor.predict(lead).filter(|predicted| {
            is_meaningful_shift(
                &frame,
                predicted,
                self.config.prediction.min_center_delta,
                self.config.prediction.min_size_delta,
            )
        });
        match prediction {
            // Only the speculative frame is rendered.
            Some(predicted) => self.apply_prediction(predicted),
            None if adopted => self.render_presented(),
            None => self.drop_predictions(),
        }
    }

    pub fn displays_changed(&mut self, displays: Vec<DisplayInfo>) {
        let mut previous: Vec<DisplayState> = std::mem::take(&mut self.displays);
        self.displays = displays
            .into_iter()
            .map(|info| {
                let policy = self.policy.for_display(info.id);
                match previous.iter().position(|state| state.info.id == info.id) {
                    Some(index) => {
                        let mut state = previous.swap_remove(index);
                        state.info = info;
                        state.policy = policy;
                        state.clear_cache();
                        state
                    }
                    None => DisplayState::new(info, policy, self.config.renderer),
                }
            })
            .collect();

        let ids = self.managed_displays();
        tracing::debug!(displays = ids.len(), "display configuration changed");
        if let Some(active) = self.active_display {
            if !ids.contains(&active) {
                self.predictor.reset();
                self.set_active_display(None);
            }
        }
        for observer in &mut self.observers {
            observer.managed_displays_changed(&ids);
        }

        if self.scheduler.state().is_running() {
            self.apply_filters();
            let current = self.presented.clone();
            self.present(current);
        }
    }

    // -- setters -----------------------------------------------------------

    pub fn set_policy(&mut self, policy: Arc<TrackingPolicy>) {
        for state in &mut self.displays {
            state.policy = policy.for_display(state.info.id);
            state.last_applied = None;
        }
        self.policy = policy;
        if self.scheduler.state().is_running() {
            self.apply_filters();
            let current = self.presented.clone();
            self.present(current);
        }
    }

    pub fn set_preferred_process(&mut self, process: Option<ProcessId>, now: Instant) {
        if self.preferred_process == process {
            return;
        }
        self.preferred_process = process;
        if self.scheduler.state().is_running() {
            self.refresh(now);
        }
    }

    pub fn set_excluded_windows(&mut self, windows: HashSet<WindowId>) {
        self.excluded_windows = windows;
    }

    /// Paints `snapshot` right away, e.g. before the first resolve lands.
    pub fn prime_overlay_mask(&mut self, snapshot: Option<ActiveWindowSnapshot>) {
        let presentation = match snapshot {
            Some(snapshot) => Presentation::Window(snapshot),
            None => Presentation::Cleared,
        };
        if self.is_presented(&presentation) && !self.has_outstanding_prediction() {
            tracing::trace!("primed mask already presented");
            return;
        }
        self.present(presentation);
    }

    // -- internals ---------------------------------------------------------

    fn resolve_request(&self) -> ResolveRequest {
        ResolveRequest {
            excluded_window_ids: self.excluded_windows.clone(),
            include_all_application_windows: self.policy.wants_all_windows(),
            preferred_process: self.preferred_process,
            displays: self.displays.iter().map(|state| state.info).collect(),
        }
    }

    fn has_outstanding_prediction(&self) -> bool {
        self.displays
            .iter()
            .any(|state| state.last_predicted.is_some())
    }

    /// Whether `presentation` matches what is on screen within tolerance.
    fn is_presented(&self, presentation: &Presentation) -> bool {
        match (&self.presented, presentation) {
            (Presentation::Window(current), Presentation::Window(next)) => {
                current.approx_eq(next, self.config.snapshot_tolerance)
            }
            (Presentation::Cleared, Presentation::Cleared) => true,
            _ => false,
        }
    }

    /// Full resolve. Returns `true` only when the resolved snapshot differs
    /// from the presented one. Withdrawing a stale prediction is not a change.
    fn refresh(&mut self, now: Instant) -> bool {
        let request = self.resolve_request();
        let next = match self.provider.resolve(&request) {
            Some(snapshot) => Presentation::Window(snapshot),
            None => Presentation::Cleared,
        };
        if self.is_presented(&next) {
            self.drop_predictions();
            return false;
        }
        match next.snapshot() {
            Some(snapshot) => self.predictor.record(snapshot.frame(), now),
            None => tracing::debug!("no protected region, covering every display"),
        }
        self.present(next);
        true
    }

    fn present(&mut self, presentation: Presentation) {
        self.adopt(presentation);
        self.render_presented();
    }

    /// Makes `presentation` current and refreshes the per-display caches
    /// without rendering.
    fn adopt(&mut self, presentation: Presentation) {
        let frames: Vec<Rect> = self.displays.iter().map(|state| state.info.frame).collect();
        let active = presentation
            .snapshot()
            .and_then(|snapshot| bounding_display(&snapshot.frame(), &frames))
            .map(|index| self.displays[index].info.id);
        if active != self.active_display {
            if self.active_display.is_some() {
                self.predictor.reset();
            }
            self.set_active_display(active);
        }

        self.presented = presentation;
        let snapshot = self.presented.snapshot().cloned();
        for state in &mut self.displays {
            state.last_known = snapshot.clone();
            state.last_predicted = None;
        }
    }

    fn render_presented(&mut self) {
        let snapshot = self.presented.snapshot().cloned();
        for index in 0..self.displays.len() {
            self.displays[index].last_predicted = None;
            self.apply_to_display(index, snapshot.as_ref());
        }
    }

    fn apply_prediction(&mut self, predicted: Rect) {
        let Some(speculative) = self
            .presented
            .snapshot()
            .and_then(|snapshot| snapshot.with_frame(predicted))
        else {
            self.render_presented();
            return;
        };
        tracing::trace!(?predicted, "applying predicted frame");
        for index in 0..self.displays.len() {
            self.displays[index].last_predicted = Some(predicted);
            self.apply_to_display(index, Some(&speculative));
        }
    }

    fn drop_predictions(&mut self) {
        if !self.has_outstanding_prediction() {
            return;
        }
        let current = self.presented.clone();
        self.present(current);
    }

    fn apply_to_display(&mut self, index: usize, snapshot: Option<&ActiveWindowSnapshot>) {
        let Self {
            displays,
            sink,
            config,
            ..
        } = self;
        let state = &mut displays[index];

        let requests = match snapshot {
            Some(snapshot) => {
                build_requests(snapshot, &state.info, &state.policy, &config.mask_policy)
            }
            None => Vec::new(),
        };
        let regions: Vec<MaskRegion> = requests
            .iter()
            .map(|request| MaskRegion::new(request.rect, request.corner_radius, request.purpose))
            .collect();
        if let Some(applied) = &state.last_applied {
            if regions_approx_eq(applied, &regions, 0.0) {
                return;
            }
        }

        let static_rects = state.static_rects();
        let image = state.renderer.render(
            state.info.content_bounds(),
            state.info.scale,
            &static_rects,
            &requests,
        );
        sink.apply_mask(state.info.id, &regions, image);
        state.last_applied = Some(regions);
    }

    fn apply_filters(&mut self) {
        for state in &self.displays {
            self.sink
                .set_filters_enabled(state.info.id, !state.policy.excluded);
        }
    }

    fn end_boost(&mut self) {
        tracing::debug!("interaction boost ended");
        self.drop_predictions();
        self.predictor.reset();
    }

    fn sync_display_link(&mut self) {
        let wanted = self.scheduler.state().display_link_active();
        if wanted && !self.display_link.is_running() {
            if let Err(err) = self.display_link.start() {
                tracing::warn!(?err, "display link unavailable, relying on timer ticks");
            }
        } else if !wanted && self.display_link.is_running() {
            self.display_link.stop();
        }
    }

    fn set_active_display(&mut self, display: Option<DisplayId>) {
        if self.active_display == display {
            return;
        }
        self.active_display = display;
        for state in &mut self.displays {
            state.is_active = Some(state.info.id) == display;
        }
        for observer in &mut self.observers {
            observer.active_display_changed(display);
        }
    }

    fn notify_state(&mut self, before: TrackingState) {
        let after = self.scheduler.state();
        if before == after {
            return;
        }
        for observer in &mut self.observers {
            observer.tracking_state_changed(after);
        }
    }
}
