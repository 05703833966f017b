use crate::geometry::{clamp_corner_radius, Rect};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisplayId(pub u32);

impl std::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "display-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayInfo {
    pub id: DisplayId,
    /// Frame in render space (bottom-left origin on platforms that flip).
    pub frame: Rect,
    /// Device pixels per point.
    pub scale: f64,
    /// Height of the menu-bar strip at the top of this display, 0 when absent.
    pub menu_bar_height: f64,
}

impl DisplayInfo {
    pub fn new(id: DisplayId, frame: Rect, scale: f64) -> Self {
        Self {
            id,
            frame,
            scale,
            menu_bar_height: 0.0,
        }
    }

    pub fn with_menu_bar(mut self, height: f64) -> Self {
        self.menu_bar_height = height.max(0.0);
        self
    }

    pub fn content_bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.frame.width, self.frame.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    ApplicationWindow,
    ApplicationMenu,
    SystemMenu,
}

impl Purpose {
    pub fn is_menu(self) -> bool {
        !matches!(self, Purpose::ApplicationWindow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskRegion {
    pub frame: Rect,
    pub corner_radius: f64,
    pub purpose: Purpose,
}

impl MaskRegion {
    pub fn new(frame: Rect, corner_radius: f64, purpose: Purpose) -> Self {
        Self {
            frame,
            corner_radius: clamp_corner_radius(corner_radius, &frame),
            purpose,
        }
    }

    pub fn approx_eq(&self, other: &MaskRegion, tolerance: f64) -> bool {
        self.purpose == other.purpose
            && self.frame.approx_eq(&other.frame, tolerance)
            && (self.corner_radius - other.corner_radius).abs() <= tolerance
    }
}

pub fn regions_approx_eq(a: &[MaskRegion], b: &[MaskRegion], tolerance: f64) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(lhs, rhs)| lhs.approx_eq(rhs, tolerance))
}

/// What must stay visible for one scheduling tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveWindowSnapshot {
    frame: Rect,
    corner_radius: f64,
    supplementary_masks: Vec<MaskRegion>,
}

impl ActiveWindowSnapshot {
    /// Returns `None` for geometry that cannot describe a window.
    pub fn new(
        frame: Rect,
        corner_radius: f64,
        supplementary_masks: Vec<MaskRegion>,
    ) -> Option<Self> {
        if !frame.is_valid() {
            return None;
        }
        let supplementary_masks = supplementary_masks
            .into_iter()
            .filter(|region| region.frame.is_valid())
            .map(|region| MaskRegion::new(region.frame, region.corner_radius, region.purpose))
            .collect();
        Some(Self {
            frame,
            corner_radius: clamp_corner_radius(corner_radius, &frame),
            supplementary_masks,
        })
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn corner_radius(&self) -> f64 {
        self.corner_radius
    }

    pub fn supplementary_masks(&self) -> &[MaskRegion] {
        &self.supplementary_masks
    }

    pub fn primary_region(&self) -> MaskRegion {
        MaskRegion::new(self.frame, self.corner_radius, Purpose::ApplicationWindow)
    }

    /// Same surfaces, primary window moved to `frame`.
    pub fn with_frame(&self, frame: Rect) -> Option<Self> {
        Self::new(frame, self.corner_radius, self.supplementary_masks.clone())
    }

    pub fn approx_eq(&self, other: &ActiveWindowSnapshot, tolerance: f64) -> bool {
        self.frame.approx_eq(&other.frame, tolerance)
            && (self.corner_radius - other.corner_radius).abs() <= tolerance
            && regions_approx_eq(
                &self.supplementary_masks,
                &other.supplementary_masks,
                tolerance,
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingProfileKind {
    EnergySaving,
    Standard,
    HighPerformance,
}

impl Default for TrackingProfileKind {
    fn default() -> Self {
        TrackingProfileKind::Standard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingProfile {
    pub idle_interval: Duration,
    pub interaction_interval: Duration,
}

impl TrackingProfile {
    pub fn for_kind(kind: TrackingProfileKind) -> Self {
        match kind {
            TrackingProfileKind::EnergySaving => Self {
                idle_interval: Duration::from_millis(1000),
                interaction_interval: Duration::from_millis(33),
            },
            TrackingProfileKind::Standard => Self {
                idle_interval: Duration::from_millis(250),
                interaction_interval: Duration::from_millis(16),
            },
            TrackingProfileKind::HighPerformance => Self {
                idle_interval: Duration::from_millis(100),
                interaction_interval: Duration::from_millis(8),
            },
        }
    }
}

impl Default for TrackingProfile {
    fn default() -> Self {
        Self::for_kind(TrackingProfileKind::Standard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskingMode {
    FocusedWindow,
    AllWindows,
}

impl Default for MaskingMode {
    fn default() -> Self {
        MaskingMode::FocusedWindow
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPolicy {
    pub masking_mode: MaskingMode,
    pub excluded: bool,
    pub keep_menu_bar_visible: bool,
}

impl Default for DisplayPolicy {
    fn default() -> Self {
        Self {
            masking_mode: MaskingMode::FocusedWindow,
            excluded: false,
            keep_menu_bar_visible: true,
        }
    }
}

/// Read-only policy handed to the controller as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackingPolicy {
    pub default_mode: MaskingMode,
    pub mode_overrides: HashMap<DisplayId, MaskingMode>,
    pub excluded_displays: HashSet<DisplayId>,
    pub keep_menu_bar_visible: bool,
}

impl TrackingPolicy {
    pub fn for_display(&self, display: DisplayId) -> DisplayPolicy {
        DisplayPolicy {
            masking_mode: self
                .mode_overrides
                .get(&display)
                .copied()
                .unwrap_or(self.default_mode),
            excluded: self.excluded_displays.contains(&display),
            keep_menu_bar_visible: self.keep_menu_bar_visible,
        }
    }

    pub fn wants_all_windows(&self) -> bool {
        self.default_mode == MaskingMode::AllWindows
            || self
                .mode_overrides
                .values()
                .any(|mode| *mode == MaskingMode::AllWindows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Began,
    Dragged,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayLinkTick {
    pub host_time: Instant,
    pub refresh_period: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaskDiagnostics {
    pub vector_frames: u64,
    pub bitmap_frames: u64,
}

impl MaskDiagnostics {
    pub fn merge(self, other: MaskDiagnostics) -> MaskDiagnostics {
        MaskDiagnostics {
            vector_frames: self.vector_frames.saturating_add(other.vector_frames),
            bitmap_frames: self.bitmap_frames.saturating_add(other.bitmap_frames),
        }
    }
}
