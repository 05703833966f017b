use crate::tracking::backend::WindowInfo;
use crate::tracking::model::{ProcessId, Purpose};

/// Compositing layer of ordinary application windows.
pub const BASE_WINDOW_LAYER: i32 = 0;
/// Layers at or above this are screen savers, cursors and similar.
const MAX_SURFACE_LAYER: i32 = 1000;
/// Main menu, status items and pop-up menus.
const MENU_LAYERS: &[i32] = &[24, 25, 101];

const SYSTEM_MENU_OWNERS: &[&str] = &[
    "Window Server",
    "SystemUIServer",
    "Control Center",
    "ControlCenter",
    "Notification Center",
    "NotificationCenter",
    "Spotlight",
    "TextInputMenuAgent",
    "explorer.exe",
    "ShellExperienceHost.exe",
    "StartMenuExperienceHost.exe",
];

const MENU_KEYWORDS: &[&str] = &["menu", "popover", "popup", "pop-up", "context", "tooltip"];

const MENU_MAX_HEIGHT: f64 = 48.0;
const MENU_MAX_WIDTH: f64 = 420.0;

pub fn is_system_owner(owner_name: &str) -> bool {
    SYSTEM_MENU_OWNERS
        .iter()
        .any(|owner| owner.eq_ignore_ascii_case(owner_name.trim()))
}

fn has_menu_keyword(title: Option<&str>) -> bool {
    let Some(title) = title else {
        return false;
    };
    let normalized = title.trim().to_lowercase();
    !normalized.is_empty() && MENU_KEYWORDS.iter().any(|keyword| normalized.contains(keyword))
}

fn has_menu_shape(window: &WindowInfo) -> bool {
    window.layer > BASE_WINDOW_LAYER
        && (window.bounds.height <= MENU_MAX_HEIGHT || window.bounds.width <= MENU_MAX_WIDTH)
}

/// Classifies a secondary surface above the base layer. Returns `None` for
/// anything that does not look like a menu or popover, and never returns
/// `ApplicationWindow`.
pub fn classify_surface(window: &WindowInfo, app_pid: ProcessId) -> Option<Purpose> {
    if window.layer <= BASE_WINDOW_LAYER || window.layer >= MAX_SURFACE_LAYER {
        return None;
    }

    let menu_like = MENU_LAYERS.contains(&window.layer)
        || has_menu_keyword(window.title.as_deref())
        || has_menu_shape(window);
    if !menu_like {
        return None;
    }

    if window.owner_pid == app_pid {
        Some(Purpose::ApplicationMenu)
    } else if is_system_owner(&window.owner_name) {
        Some(Purpose::SystemMenu)
    } else {
        None
    }
}
