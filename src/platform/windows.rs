//! Windows-specific platform implementation

use std::path::PathBuf;
use std::process::Command;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, BOOL, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, HWND, LPARAM,
};
use windows_sys::Win32::Storage::FileSystem::GetLogicalDrives;
use windows_sys::Win32::System::Threading::{
    OpenProcess, TerminateProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_TERMINATE,
};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    keybd_event, KEYEVENTF_KEYUP, VK_F4, VK_MENU,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindowThreadProcessId, IsWindowVisible, PostMessageW, SetForegroundWindow,
    ShowWindow, SW_MAXIMIZE, SW_MINIMIZE, SW_RESTORE, WM_CLOSE,
};

use super::WindowHandle;
use crate::control::{ControlError, WindowAction};

const START_MENU_PROGRAMS: &str = r"Microsoft\Windows\Start Menu\Programs";

/// Drive roots of every mounted logical drive, `A:\` through `Z:\`
pub fn mounted_volumes() -> Vec<PathBuf> {
    let mask = unsafe { GetLogicalDrives() };
    (0..26_u8)
        .filter(|bit| mask & (1 << bit) != 0)
        .map(|bit| PathBuf::from(format!("{}:\\", (b'A' + bit) as char)))
        .collect()
}

/// Per-user and all-users start menu program folders
pub fn start_menu_dirs() -> Vec<PathBuf> {
    ["APPDATA", "PROGRAMDATA"]
        .iter()
        .filter_map(std::env::var_os)
        .map(|base| PathBuf::from(base).join(START_MENU_PROGRAMS))
        .collect()
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = unsafe { &mut *(lparam as *mut Vec<(WindowHandle, u32)>) };
    if unsafe { IsWindowVisible(hwnd) } != 0 {
        let mut pid = 0_u32;
        unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
        if pid != 0 {
            windows.push((WindowHandle(hwnd as isize), pid));
        }
    }
    1
}

/// Visible top-level windows with their owning process ids
pub fn visible_windows() -> Vec<(WindowHandle, u32)> {
    let mut windows: Vec<(WindowHandle, u32)> = Vec::new();
    unsafe {
        EnumWindows(
            Some(collect_window),
            &mut windows as *mut Vec<(WindowHandle, u32)> as LPARAM,
        )
    };
    windows
}

/// Ask a window to close
pub fn post_close(window: WindowHandle) -> Result<(), ControlError> {
    let posted = unsafe { PostMessageW(window.0 as HWND, WM_CLOSE, 0, 0) };
    if posted == 0 {
        return Err(last_error(&format!("WM_CLOSE to {:?}", window)));
    }
    Ok(())
}

/// Focus a window and press Alt+F4
pub fn send_close_shortcut(window: WindowHandle) -> Result<(), ControlError> {
    unsafe {
        SetForegroundWindow(window.0 as HWND);
        keybd_event(VK_MENU as u8, 0, 0, 0);
        keybd_event(VK_F4 as u8, 0, 0, 0);
        keybd_event(VK_F4 as u8, 0, KEYEVENTF_KEYUP, 0);
        keybd_event(VK_MENU as u8, 0, KEYEVENTF_KEYUP, 0);
    }
    Ok(())
}

pub fn show_window(window: WindowHandle, action: WindowAction) -> Result<(), ControlError> {
    let command = match action {
        WindowAction::Minimize => SW_MINIMIZE,
        WindowAction::Maximize => SW_MAXIMIZE,
        WindowAction::Restore => SW_RESTORE,
    };
    // return value is the previous visibility, not success
    unsafe { ShowWindow(window.0 as HWND, command) };
    Ok(())
}

/// Check that `pid` can be opened with terminate rights
pub fn open_process(pid: u32) -> Result<(), ControlError> {
    let handle = unsafe { OpenProcess(PROCESS_TERMINATE | PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
    if handle.is_null() {
        return Err(last_error(&format!("pid {}", pid)));
    }
    unsafe { CloseHandle(handle) };
    Ok(())
}

/// Windows has no polite signal; terminate and kill are the same call
pub fn terminate_process(pid: u32) -> Result<(), ControlError> {
    kill_process(pid)
}

pub fn kill_process(pid: u32) -> Result<(), ControlError> {
    let handle = unsafe { OpenProcess(PROCESS_TERMINATE, 0, pid) };
    if handle.is_null() {
        return Err(last_error(&format!("pid {}", pid)));
    }

    let terminated = unsafe { TerminateProcess(handle, 1) };
    let result = if terminated == 0 {
        Err(last_error(&format!("terminate pid {}", pid)))
    } else {
        Ok(())
    };
    unsafe { CloseHandle(handle) };
    result
}

/// Forced kill through `taskkill`, which may run with more rights than we have
pub fn elevated_kill(pid: u32) -> Result<(), ControlError> {
    let output = Command::new("taskkill")
        .args(["/F", "/PID", &pid.to_string()])
        .output()
        .map_err(|e| ControlError::Failed(format!("taskkill: {}", e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ControlError::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

fn last_error(context: &str) -> ControlError {
    let code = unsafe { GetLastError() };
    match code {
        ERROR_ACCESS_DENIED => ControlError::PermissionDenied(context.to_string()),
        ERROR_INVALID_PARAMETER => ControlError::NotFound(context.to_string()),
        other => ControlError::Failed(format!("{}: error {}", context, other)),
    }
}
