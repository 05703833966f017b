//! OS backends for the collaborator traits.
//!
//! Windows gets real window enumeration and display topology. Every other
//! target gets empty sources: the resolver then finds nothing and displays
//! stay fully covered.

use crate::geometry::Rect;
use crate::tracking::backend::{
    AccessibilitySource, DisplayTopology, FocusedWindow, WindowInfo, WindowListSource,
};
use crate::tracking::model::{DisplayInfo, ProcessId};
use crate::tracking::resolver::{ResolverConfig, WindowSnapshotResolver};

#[cfg(windows)]
pub mod win32;

#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWindowSource;

impl WindowListSource for EmptyWindowSource {
    fn windows(&self) -> Vec<WindowInfo> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccessibility;

impl AccessibilitySource for NoAccessibility {
    fn focused_window(&self) -> Option<FocusedWindow> {
        None
    }

    fn corner_radius(&self, _pid: ProcessId, _bounds: Rect) -> Option<f64> {
        None
    }

    fn frontmost_pid(&self) -> Option<ProcessId> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDisplays;

impl DisplayTopology for NoDisplays {
    fn displays(&self) -> Vec<DisplayInfo> {
        Vec::new()
    }
}

/// Whether enumeration bounds need flipping into render space here.
pub const ENUMERATION_NEEDS_FLIP: bool = !cfg!(windows);

pub fn display_topology() -> Box<dyn DisplayTopology> {
    #[cfg(windows)]
    {
        Box::new(win32::MonitorTopology)
    }

    #[cfg(not(windows))]
    {
        Box::new(NoDisplays)
    }
}

/// Resolver wired to this platform's window list and focus sources.
pub fn snapshot_resolver(config: ResolverConfig) -> WindowSnapshotResolver {
    #[cfg(windows)]
    let resolver = WindowSnapshotResolver::new(
        Box::new(win32::TopLevelWindows),
        Box::new(win32::ForegroundFocus),
        config,
    );

    #[cfg(not(windows))]
    let resolver = WindowSnapshotResolver::new(
        Box::new(EmptyWindowSource),
        Box::new(NoAccessibility),
        config,
    );

    resolver.with_vertical_flip(ENUMERATION_NEEDS_FLIP && config.flip_vertical)
}
