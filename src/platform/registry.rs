//! Install locations from the uninstall registry

use windows_sys::Win32::Foundation::{ERROR_NO_MORE_ITEMS, ERROR_SUCCESS};
use windows_sys::Win32::System::Registry::{
    RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, RegQueryInfoKeyW, RegQueryValueExW, HKEY,
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, REG_EXPAND_SZ, REG_SZ,
};

use tracing::debug;

const UNINSTALL_SUBKEYS: &[&str] = &[
    r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
    r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
];

/// Raw `InstallLocation` values from every uninstall entry.
///
/// Keys that cannot be opened and entries without the value are skipped.
pub fn uninstall_install_locations() -> Vec<String> {
    let mut locations = Vec::new();

    for (hive_label, root) in [("hklm", HKEY_LOCAL_MACHINE), ("hkcu", HKEY_CURRENT_USER)] {
        for subkey in UNINSTALL_SUBKEYS {
            collect_install_locations(hive_label, root, subkey, &mut locations);
        }
    }

    locations
}

fn collect_install_locations(hive_label: &str, root: HKEY, subkey: &str, out: &mut Vec<String>) {
    let Some(uninstall_root) = open_key(root, subkey) else {
        debug!("Uninstall key not readable: {}\\{}", hive_label, subkey);
        return;
    };

    let mut subkey_count = 0_u32;
    let mut max_subkey_len = 0_u32;
    let info_status = unsafe {
        RegQueryInfoKeyW(
            uninstall_root,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null(),
            &mut subkey_count,
            &mut max_subkey_len,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        )
    };
    if info_status != ERROR_SUCCESS {
        unsafe { RegCloseKey(uninstall_root) };
        return;
    }

    let mut name_buffer = vec![0_u16; max_subkey_len as usize + 2];
    for index in 0..subkey_count {
        let mut name_len = max_subkey_len + 1;
        let enum_status = unsafe {
            RegEnumKeyExW(
                uninstall_root,
                index,
                name_buffer.as_mut_ptr(),
                &mut name_len,
                std::ptr::null(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if enum_status == ERROR_NO_MORE_ITEMS {
            break;
        }
        if enum_status != ERROR_SUCCESS {
            continue;
        }

        let entry_name = String::from_utf16_lossy(&name_buffer[..name_len as usize]);
        let Some(entry_key) = open_key(uninstall_root, &entry_name) else {
            continue;
        };
        if let Some(location) = read_reg_string_value(entry_key, "InstallLocation") {
            out.push(location);
        }
        unsafe { RegCloseKey(entry_key) };
    }

    unsafe { RegCloseKey(uninstall_root) };
}

fn open_key(root: HKEY, subkey: &str) -> Option<HKEY> {
    let subkey_wide = to_wide(subkey);
    let mut key: HKEY = std::ptr::null_mut();
    let status = unsafe { RegOpenKeyExW(root, subkey_wide.as_ptr(), 0, KEY_READ, &mut key) };
    (status == ERROR_SUCCESS).then_some(key)
}

fn read_reg_string_value(key: HKEY, value_name: &str) -> Option<String> {
    let value_name_wide = to_wide(value_name);
    let mut value_type = 0_u32;
    let mut size = 0_u32;
    let query_status = unsafe {
        RegQueryValueExW(
            key,
            value_name_wide.as_ptr(),
            std::ptr::null(),
            &mut value_type,
            std::ptr::null_mut(),
            &mut size,
        )
    };
    if query_status != ERROR_SUCCESS || size == 0 {
        return None;
    }
    if value_type != REG_SZ && value_type != REG_EXPAND_SZ {
        return None;
    }

    let mut buffer = vec![0_u8; size as usize];
    let read_status = unsafe {
        RegQueryValueExW(
            key,
            value_name_wide.as_ptr(),
            std::ptr::null(),
            &mut value_type,
            buffer.as_mut_ptr(),
            &mut size,
        )
    };
    if read_status != ERROR_SUCCESS {
        return None;
    }

    let mut wide: Vec<u16> = buffer
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();
    while wide.last().copied() == Some(0) {
        wide.pop();
    }

    let value = String::from_utf16_lossy(&wide).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}
