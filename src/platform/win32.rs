use crate::geometry::Rect;
use crate::tracking::backend::{
    AccessibilitySource, DisplayTopology, FocusedWindow, WindowInfo, WindowListSource,
};
use crate::tracking::model::{DisplayId, DisplayInfo, ProcessId, WindowId};
use std::collections::hash_map::DefaultHasher;
use std::ffi::OsString;
use std::hash::{Hash, Hasher};
use std::os::windows::ffi::OsStringExt;
use std::path::Path;
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFOEXW,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_FORMAT,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::HiDpi::{GetDpiForMonitor, MDT_EFFECTIVE_DPI};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClassNameW, GetForegroundWindow, GetLayeredWindowAttributes,
    GetWindowLongPtrW, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindowVisible, GWL_EXSTYLE, LWA_ALPHA, WS_EX_LAYERED,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
};

/// Window class of classic pop-up menus.
const MENU_CLASS: &str = "#32768";
const MENU_LAYER: i32 = 101;
const FLOATING_LAYER: i32 = 3;
const BASE_DPI: f64 = 96.0;

fn wide_to_string(buf: &[u16]) -> String {
    OsString::from_wide(buf).to_string_lossy().to_string()
}

fn rect_from_win(rc: RECT) -> Rect {
    Rect::from_edges(
        rc.left as f64,
        rc.top as f64,
        rc.right as f64,
        rc.bottom as f64,
    )
}

fn window_rect(hwnd: HWND) -> Option<Rect> {
    let mut rc = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rc) }.ok()?;
    Some(rect_from_win(rc))
}

fn window_pid(hwnd: HWND) -> Option<ProcessId> {
    let mut pid = 0u32;
    unsafe {
        let _ = GetWindowThreadProcessId(hwnd, Some(&mut pid));
    }
    (pid != 0).then_some(ProcessId(pid))
}

fn process_name(pid: ProcessId) -> Option<String> {
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid.0).ok()?;
        let mut buffer = vec![0u16; 1024];
        let mut size = buffer.len() as u32;
        let success = QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_FORMAT(0),
            PWSTR(buffer.as_mut_ptr()),
            &mut size,
        )
        .is_ok();
        let _ = CloseHandle(handle);
        if !success || size == 0 {
            return None;
        }
        let path = wide_to_string(&buffer[..size as usize]);
        Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
    }
}

fn window_title(hwnd: HWND) -> Option<String> {
    unsafe {
        let len = GetWindowTextLengthW(hwnd);
        if len <= 0 {
            return None;
        }
        let mut buf = vec![0u16; len as usize + 1];
        let read = GetWindowTextW(hwnd, &mut buf);
        if read <= 0 {
            return None;
        }
        Some(wide_to_string(&buf[..read as usize]))
    }
}

fn window_class(hwnd: HWND) -> Option<String> {
    let mut buf = vec![0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    (len > 0).then(|| wide_to_string(&buf[..len as usize]))
}

fn window_alpha(hwnd: HWND, ex_style: u32) -> f64 {
    if ex_style & WS_EX_LAYERED.0 == 0 {
        return 1.0;
    }
    let mut alpha = 255u8;
    let mut flags = Default::default();
    let queried =
        unsafe { GetLayeredWindowAttributes(hwnd, None, Some(&mut alpha), Some(&mut flags)) };
    if queried.is_ok() && flags & LWA_ALPHA == LWA_ALPHA {
        alpha as f64 / 255.0
    } else {
        1.0
    }
}

fn window_layer(class: Option<&str>, ex_style: u32) -> i32 {
    if class == Some(MENU_CLASS) {
        MENU_LAYER
    } else if ex_style & (WS_EX_TOPMOST.0 | WS_EX_TOOLWINDOW.0) != 0 {
        FLOATING_LAYER
    } else {
        0
    }
}

/// Visible top-level windows in Z order, front first.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopLevelWindows;

impl WindowListSource for TopLevelWindows {
    fn windows(&self) -> Vec<WindowInfo> {
        unsafe extern "system" fn enum_cb(hwnd: HWND, lparam: LPARAM) -> BOOL {
            let windows = &mut *(lparam.0 as *mut Vec<WindowInfo>);
            if !IsWindowVisible(hwnd).as_bool() || IsIconic(hwnd).as_bool() {
                return BOOL(1);
            }
            let Some(bounds) = window_rect(hwnd) else {
                return BOOL(1);
            };
            let Some(owner_pid) = window_pid(hwnd) else {
                return BOOL(1);
            };
            let ex_style = GetWindowLongPtrW(hwnd, GWL_EXSTYLE) as u32;
            let class = window_class(hwnd);
            windows.push(WindowInfo {
                id: WindowId(hwnd.0 as usize as u64),
                layer: window_layer(class.as_deref(), ex_style),
                alpha: window_alpha(hwnd, ex_style),
                bounds,
                owner_pid,
                owner_name: process_name(owner_pid).unwrap_or_default(),
                title: window_title(hwnd),
            });
            BOOL(1)
        }

        let mut windows: Vec<WindowInfo> = Vec::new();
        unsafe {
            let ptr = &mut windows as *mut Vec<WindowInfo>;
            if let Err(err) = EnumWindows(Some(enum_cb), LPARAM(ptr as isize)) {
                tracing::debug!(?err, "window enumeration stopped early");
            }
        }
        windows
    }
}

/// Foreground window as the focus fallback. Windows exposes no per-window
/// corner radius, so callers fall back to the configured constant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForegroundFocus;

impl AccessibilitySource for ForegroundFocus {
    fn focused_window(&self) -> Option<FocusedWindow> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            return None;
        }
        Some(FocusedWindow {
            frame: window_rect(hwnd)?,
            corner_radius: None,
        })
    }

    fn corner_radius(&self, _pid: ProcessId, _bounds: Rect) -> Option<f64> {
        None
    }

    fn frontmost_pid(&self) -> Option<ProcessId> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            return None;
        }
        window_pid(hwnd)
    }
}

fn display_id(device: &str) -> DisplayId {
    let mut hasher = DefaultHasher::new();
    device.hash(&mut hasher);
    DisplayId(hasher.finish() as u32)
}

fn monitor_scale(monitor: HMONITOR) -> f64 {
    let (mut dpi_x, mut dpi_y) = (0u32, 0u32);
    match unsafe { GetDpiForMonitor(monitor, MDT_EFFECTIVE_DPI, &mut dpi_x, &mut dpi_y) } {
        Ok(()) if dpi_x > 0 => dpi_x as f64 / BASE_DPI,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorTopology;

impl DisplayTopology for MonitorTopology {
    fn displays(&self) -> Vec<DisplayInfo> {
        extern "system" fn monitor_enum_proc(
            monitor: HMONITOR,
            _hdc: HDC,
            _rc_clip: *mut RECT,
            data: LPARAM,
        ) -> BOOL {
            let displays = unsafe { &mut *(data.0 as *mut Vec<DisplayInfo>) };
            let mut info = MONITORINFOEXW::default();
            info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;
            if unsafe { GetMonitorInfoW(monitor, &mut info.monitorInfo as *mut _ as *mut _) }
                .as_bool()
            {
                let device_len = info
                    .szDevice
                    .iter()
                    .position(|c| *c == 0)
                    .unwrap_or(info.szDevice.len());
                let device = wide_to_string(&info.szDevice[..device_len]);
                displays.push(DisplayInfo::new(
                    display_id(&device),
                    rect_from_win(info.monitorInfo.rcMonitor),
                    monitor_scale(monitor),
                ));
            }
            BOOL(1)
        }

        let mut displays: Vec<DisplayInfo> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(monitor_enum_proc),
                LPARAM(&mut displays as *mut Vec<DisplayInfo> as isize),
            );
        }
        displays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_class_maps_to_menu_layer() {
        assert_eq!(window_layer(Some("#32768"), 0), MENU_LAYER);
        assert_eq!(window_layer(Some("Notepad"), WS_EX_TOPMOST.0), FLOATING_LAYER);
        assert_eq!(window_layer(Some("Notepad"), 0), 0);
    }

    #[test]
    fn display_ids_are_stable_per_device() {
        assert_eq!(display_id(r"\\.\DISPLAY1"), display_id(r"\\.\DISPLAY1"));
        assert_ne!(display_id(r"\\.\DISPLAY1"), display_id(r"\\.\DISPLAY2"));
    }
}
