use crate::geometry::Rect;
use crate::tracking::backend::{AccessibilitySource, WindowInfo, WindowListSource};
use crate::tracking::classify::{classify_surface, BASE_WINDOW_LAYER};
use crate::tracking::model::{
    ActiveWindowSnapshot, DisplayInfo, MaskRegion, ProcessId, Purpose, WindowId,
};
use std::collections::HashSet;

pub const MIN_WINDOW_ALPHA: f64 = 0.01;
pub const MIN_WINDOW_EXTENT: f64 = 4.0;

const MODERN_OS_MAJOR: u32 = 26;
const MODERN_CORNER_RADIUS: f64 = 16.0;
const LEGACY_CORNER_RADIUS: f64 = 10.0;
const DEFAULT_MENU_CORNER_RADIUS: f64 = 6.0;

/// Corner radius used when the real value cannot be queried. Depends only on
/// the OS generation, never on the window.
pub fn fallback_corner_radius(os_major: u32) -> f64 {
    if os_major >= MODERN_OS_MAJOR {
        MODERN_CORNER_RADIUS
    } else {
        LEGACY_CORNER_RADIUS
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveRequest {
    /// The overlay's own windows.
    pub excluded_window_ids: HashSet<WindowId>,
    pub include_all_application_windows: bool,
    /// Last externally activated application.
    pub preferred_process: Option<ProcessId>,
    pub displays: Vec<DisplayInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    WindowList,
    Accessibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyMiss {
    NoCandidateWindow,
    AccessibilityUnavailable,
    InvalidGeometry,
}

impl std::fmt::Display for StrategyMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyMiss::NoCandidateWindow => write!(f, "no candidate window"),
            StrategyMiss::AccessibilityUnavailable => write!(f, "accessibility unavailable"),
            StrategyMiss::InvalidGeometry => write!(f, "invalid geometry"),
        }
    }
}

/// Anything able to say what must stay visible right now.
pub trait SnapshotProvider: Send {
    fn resolve(&mut self, request: &ResolveRequest) -> Option<ActiveWindowSnapshot>;
    /// Primary window bounds only, in render space.
    fn resolve_frame(&mut self, request: &ResolveRequest) -> Option<Rect>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    pub fallback_corner_radius: f64,
    pub menu_corner_radius: f64,
    /// Convert top-left enumeration bounds to bottom-left render space.
    pub flip_vertical: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fallback_corner_radius: LEGACY_CORNER_RADIUS,
            menu_corner_radius: DEFAULT_MENU_CORNER_RADIUS,
            flip_vertical: true,
        }
    }
}

/// Index of the display sharing the most area with `bounds`; ties go to
/// the earlier display.
pub fn bounding_display(bounds: &Rect, frames: &[Rect]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, frame) in frames.iter().enumerate() {
        let area = frame.intersection_area(bounds);
        if area > 0.0 && best.map_or(true, |(_, best_area)| area > best_area) {
            best = Some((index, area));
        }
    }
    best.map(|(index, _)| index)
}

fn primary_display_index(displays: &[DisplayInfo]) -> usize {
    displays
        .iter()
        .position(|display| display.frame.x == 0.0 && display.frame.y == 0.0)
        .unwrap_or(0)
}

/// Converts top-left enumeration bounds to bottom-left render space using
/// the display that contains most of the window.
pub fn to_render_space(bounds: Rect, displays: &[DisplayInfo]) -> Rect {
    if displays.is_empty() {
        return bounds;
    }
    let primary = primary_display_index(displays);
    let top = displays[primary].frame.max_y();
    let top_left_frames: Vec<Rect> = displays
        .iter()
        .map(|display| {
            Rect::new(
                display.frame.x,
                top - display.frame.max_y(),
                display.frame.width,
                display.frame.height,
            )
        })
        .collect();

    let index = bounding_display(&bounds, &top_left_frames).unwrap_or(0);
    let display = &displays[index].frame;
    let top_left = &top_left_frames[index];
    let y = display.y + display.height - (bounds.y - top_left.y) - bounds.height;
    Rect::new(bounds.x, y, bounds.width, bounds.height)
}

pub struct WindowSnapshotResolver {
    windows: Box<dyn WindowListSource>,
    accessibility: Box<dyn AccessibilitySource>,
    strategies: Vec<ResolutionStrategy>,
    config: ResolverConfig,
}

impl WindowSnapshotResolver {
    pub fn new(
        windows: Box<dyn WindowListSource>,
        accessibility: Box<dyn AccessibilitySource>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            windows,
            accessibility,
            strategies: vec![
                ResolutionStrategy::WindowList,
                ResolutionStrategy::Accessibility,
            ],
            config,
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<ResolutionStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_vertical_flip(mut self, flip: bool) -> Self {
        self.config.flip_vertical = flip;
        self
    }

    pub fn strategies(&self) -> &[ResolutionStrategy] {
        &self.strategies
    }

    fn to_render(&self, bounds: Rect, displays: &[DisplayInfo]) -> Rect {
        if self.config.flip_vertical {
            to_render_space(bounds, displays)
        } else {
            bounds
        }
    }

    fn qualifying_windows(&self, request: &ResolveRequest) -> Vec<WindowInfo> {
        self.windows
            .windows()
            .into_iter()
            .filter(|window| {
                !request.excluded_window_ids.contains(&window.id)
                    && window.alpha >= MIN_WINDOW_ALPHA
                    && window.bounds.is_finite()
                    && window.bounds.width >= MIN_WINDOW_EXTENT
                    && window.bounds.height >= MIN_WINDOW_EXTENT
            })
            .collect()
    }

    fn primary_window<'a>(
        windows: &'a [WindowInfo],
        preferred: Option<ProcessId>,
    ) -> Option<&'a WindowInfo> {
        let base = || windows.iter().filter(|w| w.layer == BASE_WINDOW_LAYER);
        preferred
            .and_then(|pid| base().find(|w| w.owner_pid == pid))
            .or_else(|| base().next())
    }

    fn supplementary_masks(
        &self,
        windows: &[WindowInfo],
        app_pid: ProcessId,
        primary_id: Option<WindowId>,
        request: &ResolveRequest,
    ) -> Vec<MaskRegion> {
        windows
            .iter()
            .filter(|window| Some(window.id) != primary_id)
            .filter_map(|window| {
                let purpose = if window.layer == BASE_WINDOW_LAYER {
                    (request.include_all_application_windows && window.owner_pid == app_pid)
                        .then_some(Purpose::ApplicationWindow)?
                } else {
                    classify_surface(window, app_pid)?
                };
                let radius = match purpose {
                    Purpose::ApplicationWindow => self
                        .accessibility
                        .corner_radius(window.owner_pid, window.bounds)
                        .unwrap_or(self.config.fallback_corner_radius),
                    _ => self.config.menu_corner_radius,
                };
                let frame = self.to_render(window.bounds, &request.displays);
                Some(MaskRegion::new(frame, radius, purpose))
            })
            .collect()
    }

    fn from_window_list(
        &self,
        request: &ResolveRequest,
    ) -> Result<ActiveWindowSnapshot, StrategyMiss> {
        let windows = self.qualifying_windows(request);
        let primary = Self::primary_window(&windows, request.preferred_process)
            .ok_or(StrategyMiss::NoCandidateWindow)?;

        let radius = self
            .accessibility
            .corner_radius(primary.owner_pid, primary.bounds)
            .unwrap_or(self.config.fallback_corner_radius);
        let frame = self.to_render(primary.bounds, &request.displays);
        let supplementary =
            self.supplementary_masks(&windows, primary.owner_pid, Some(primary.id), request);
        ActiveWindowSnapshot::new(frame, radius, supplementary).ok_or(StrategyMiss::InvalidGeometry)
    }

    fn from_accessibility(
        &self,
        request: &ResolveRequest,
    ) -> Result<ActiveWindowSnapshot, StrategyMiss> {
        let focused = self
            .accessibility
            .focused_window()
            .ok_or(StrategyMiss::AccessibilityUnavailable)?;
        let frame = self.to_render(focused.frame, &request.displays);
        let radius = focused
            .corner_radius
            .unwrap_or(self.config.fallback_corner_radius);

        let supplementary = match self.accessibility.frontmost_pid() {
            Some(pid) => {
                let windows = self.qualifying_windows(request);
                self.supplementary_masks(&windows, pid, None, request)
            }
            None => Vec::new(),
        };
        ActiveWindowSnapshot::new(frame, radius, supplementary).ok_or(StrategyMiss::InvalidGeometry)
    }

    fn run(
        &self,
        strategy: ResolutionStrategy,
        request: &ResolveRequest,
    ) -> Result<ActiveWindowSnapshot, StrategyMiss> {
        match strategy {
            ResolutionStrategy::WindowList => self.from_window_list(request),
            ResolutionStrategy::Accessibility => self.from_accessibility(request),
        }
    }
}

impl SnapshotProvider for WindowSnapshotResolver {
    fn resolve(&mut self, request: &ResolveRequest) -> Option<ActiveWindowSnapshot> {
        for strategy in &self.strategies {
            match self.run(*strategy, request) {
                Ok(snapshot) => return Some(snapshot),
                Err(miss) => tracing::trace!(?strategy, %miss, "resolution strategy missed"),
            }
        }
        None
    }

    fn resolve_frame(&mut self, request: &ResolveRequest) -> Option<Rect> {
        let windows = self.qualifying_windows(request);
        let primary = Self::primary_window(&windows, request.preferred_process)?;
        let frame = self.to_render(primary.bounds, &request.displays);
        frame.is_valid().then_some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::backend::{FocusedWindow, MockAccessibility, MockWindowSource};
    use crate::tracking::model::DisplayId;

    fn window(id: u64, layer: i32, pid: u32, bounds: Rect) -> WindowInfo {
        WindowInfo {
            id: WindowId(id),
            layer,
            alpha: 1.0,
            bounds,
            owner_pid: ProcessId(pid),
            owner_name: format!("app-{pid}"),
            title: None,
        }
    }

    fn displays() -> Vec<DisplayInfo> {
        vec![DisplayInfo::new(
            DisplayId(1),
            Rect::new(0.0, 0.0, 1440.0, 900.0),
            2.0,
        )]
    }

    fn request() -> ResolveRequest {
        ResolveRequest {
            displays: displays(),
            ..ResolveRequest::default()
        }
    }

    fn make_resolver(
        windows: Vec<WindowInfo>,
        accessibility: MockAccessibility,
    ) -> WindowSnapshotResolver {
        WindowSnapshotResolver::new(
            Box::new(MockWindowSource::new(windows)),
            Box::new(accessibility),
            ResolverConfig::default(),
        )
    }

    #[test]
    fn flips_into_render_space() {
        let flipped = to_render_space(Rect::new(100.0, 100.0, 400.0, 300.0), &displays());
        assert_eq!(flipped, Rect::new(100.0, 500.0, 400.0, 300.0));
    }

    #[test]
    fn flip_uses_display_with_largest_overlap() {
        let displays = vec![
            DisplayInfo::new(DisplayId(1), Rect::new(0.0, 0.0, 1440.0, 900.0), 2.0),
            DisplayInfo::new(DisplayId(2), Rect::new(1440.0, -180.0, 1920.0, 1080.0), 1.0),
        ];
        // Top-left frame of the second display starts at y = 0.
        let flipped = to_render_space(Rect::new(1500.0, 0.0, 400.0, 300.0), &displays);
        assert_eq!(flipped, Rect::new(1500.0, 600.0, 400.0, 300.0));
        assert_eq!(
            bounding_display(
                &flipped,
                &displays.iter().map(|d| d.frame).collect::<Vec<_>>()
            ),
            Some(1)
        );
    }

    #[test]
    fn skips_excluded_transparent_and_tiny_windows() {
        let mut transparent = window(2, 0, 20, Rect::new(0.0, 0.0, 500.0, 500.0));
        transparent.alpha = 0.0;
        let windows = vec![
            window(1, 0, 10, Rect::new(0.0, 0.0, 1440.0, 900.0)),
            transparent,
            window(3, 0, 30, Rect::new(0.0, 0.0, 3.0, 300.0)),
            window(4, 0, 40, Rect::new(100.0, 100.0, 400.0, 300.0)),
        ];
        let mut resolver = make_resolver(windows, MockAccessibility::denied());
        let mut req = request();
        req.excluded_window_ids.insert(WindowId(1));
        let snapshot = resolver.resolve(&req).expect("snapshot");
        assert_eq!(snapshot.frame(), Rect::new(100.0, 500.0, 400.0, 300.0));
        assert_eq!(snapshot.corner_radius(), LEGACY_CORNER_RADIUS);
    }

    #[test]
    fn preferred_process_wins_over_stacking_order() {
        let windows = vec![
            window(1, 0, 10, Rect::new(0.0, 0.0, 300.0, 300.0)),
            window(2, 0, 20, Rect::new(400.0, 100.0, 300.0, 300.0)),
        ];
        let mut resolver = make_resolver(windows, MockAccessibility::denied());
        let req = ResolveRequest {
            preferred_process: Some(ProcessId(20)),
            ..request()
        };
        assert_eq!(
            resolver.resolve_frame(&req),
            Some(Rect::new(400.0, 500.0, 300.0, 300.0))
        );
    }

    #[test]
    fn accessibility_radius_is_clamped() {
        let accessibility = MockAccessibility::denied();
        accessibility.set_corner_radius(Some(500.0));
        let windows = vec![window(1, 0, 10, Rect::new(0.0, 0.0, 300.0, 100.0))];
        let mut resolver = make_resolver(windows, accessibility);
        let snapshot = resolver.resolve(&request()).expect("snapshot");
        assert_eq!(snapshot.corner_radius(), 50.0);
    }

    #[test]
    fn menus_and_sibling_windows_become_supplementary_masks() {
        let mut menu = window(2, 101, 10, Rect::new(120.0, 120.0, 200.0, 240.0));
        menu.title = Some("File".into());
        let mut status = window(3, 25, 99, Rect::new(1200.0, 0.0, 300.0, 400.0));
        status.owner_name = "Control Center".into();
        let windows = vec![
            menu,
            status,
            window(1, 0, 10, Rect::new(100.0, 100.0, 600.0, 400.0)),
            window(4, 0, 10, Rect::new(800.0, 100.0, 400.0, 400.0)),
        ];
        let mut resolver = make_resolver(windows.clone(), MockAccessibility::denied());
        let snapshot = resolver.resolve(&request()).expect("snapshot");
        let purposes: Vec<Purpose> = snapshot
            .supplementary_masks()
            .iter()
            .map(|region| region.purpose)
            .collect();
        assert_eq!(purposes, vec![Purpose::ApplicationMenu, Purpose::SystemMenu]);

        let mut resolver = make_resolver(windows, MockAccessibility::denied());
        let req = ResolveRequest {
            include_all_application_windows: true,
            ..request()
        };
        let snapshot = resolver.resolve(&req).expect("snapshot");
        assert!(snapshot
            .supplementary_masks()
            .iter()
            .any(|region| region.purpose == Purpose::ApplicationWindow));
    }

    #[test]
    fn falls_back_to_accessibility_when_window_list_is_empty() {
        let accessibility = MockAccessibility::denied();
        accessibility.set_focused_window(Some(FocusedWindow {
            frame: Rect::new(100.0, 100.0, 400.0, 300.0),
            corner_radius: Some(12.0),
        }));
        let mut resolver = make_resolver(Vec::new(), accessibility);
        let snapshot = resolver.resolve(&request()).expect("snapshot");
        assert_eq!(snapshot.frame(), Rect::new(100.0, 500.0, 400.0, 300.0));
        assert_eq!(snapshot.corner_radius(), 12.0);
        assert!(resolver.resolve_frame(&request()).is_none());
    }

    #[test]
    fn nothing_available_resolves_to_none() {
        let mut resolver = make_resolver(Vec::new(), MockAccessibility::denied());
        assert!(resolver.resolve(&request()).is_none());
    }

    #[test]
    fn strategy_order_is_respected() {
        let accessibility = MockAccessibility::denied();
        accessibility.set_focused_window(Some(FocusedWindow {
            frame: Rect::new(10.0, 10.0, 50.0, 50.0),
            corner_radius: None,
        }));
        let windows = vec![window(1, 0, 10, Rect::new(100.0, 100.0, 400.0, 300.0))];
        let mut resolver = make_resolver(windows, accessibility)
            .with_strategies(vec![ResolutionStrategy::Accessibility]);
        let snapshot = resolver.resolve(&request()).expect("snapshot");
        assert_eq!(snapshot.frame(), Rect::new(10.0, 840.0, 50.0, 50.0));
    }

    #[test]
    fn disabling_flip_keeps_enumeration_coordinates() {
        let windows = vec![window(1, 0, 10, Rect::new(100.0, 100.0, 400.0, 300.0))];
        let mut resolver =
            make_resolver(windows, MockAccessibility::denied()).with_vertical_flip(false);
        assert_eq!(
            resolver.resolve_frame(&request()),
            Some(Rect::new(100.0, 100.0, 400.0, 300.0))
        );
    }

    #[test]
    fn fallback_radius_is_version_gated() {
        assert_eq!(fallback_corner_radius(14), 10.0);
        assert_eq!(fallback_corner_radius(26), 16.0);
    }
}
