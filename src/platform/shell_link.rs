//! `.lnk` resolution through the shell-link COM object

use std::path::{Path, PathBuf};

use windows::core::{Interface, HSTRING};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, IPersistFile, CLSCTX_INPROC_SERVER,
    COINIT_APARTMENTTHREADED, STGM_READ,
};
use windows::Win32::UI::Shell::{IShellLinkW, ShellLink};

use crate::indexer::sources::DiscoveryError;

// RPC_E_CHANGED_MODE: COM already initialized on this thread with another model
const RPC_E_CHANGED_MODE: u32 = 0x80010106;
const MAX_PATH: usize = 260;

/// Resolves shortcuts on the current thread
pub struct ShellLinkResolver {
    link: IShellLinkW,
    _com: ComInitializer,
}

impl ShellLinkResolver {
    /// Fails with `Unavailable` when COM or the shell-link class is missing
    pub fn new() -> Result<Self, DiscoveryError> {
        let com = ComInitializer::new()?;
        let link: IShellLinkW = unsafe { CoCreateInstance(&ShellLink, None, CLSCTX_INPROC_SERVER) }
            .map_err(|e| DiscoveryError::Unavailable(format!("ShellLink: {}", e)))?;
        Ok(Self { link, _com: com })
    }

    /// Target path of one shortcut
    pub fn resolve(&self, shortcut: &Path) -> Result<PathBuf, DiscoveryError> {
        let file: IPersistFile = self
            .link
            .cast()
            .map_err(|e| DiscoveryError::Unavailable(format!("IPersistFile: {}", e)))?;

        let shortcut_name = HSTRING::from(shortcut.to_string_lossy().as_ref());
        unsafe { file.Load(&shortcut_name, STGM_READ) }
            .map_err(|e| DiscoveryError::AccessDenied(format!("{:?}: {}", shortcut, e)))?;

        let mut buffer = [0_u16; MAX_PATH];
        unsafe { self.link.GetPath(&mut buffer, std::ptr::null_mut(), 0) }
            .map_err(|e| DiscoveryError::NotFound(format!("{:?}: {}", shortcut, e)))?;

        let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        if len == 0 {
            // advertised shortcuts have no file target
            return Err(DiscoveryError::NotFound(format!("{:?}", shortcut)));
        }
        Ok(PathBuf::from(String::from_utf16_lossy(&buffer[..len])))
    }
}

/// RAII wrapper for COM initialization
struct ComInitializer {
    should_uninit: bool,
}

impl ComInitializer {
    fn new() -> Result<Self, DiscoveryError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr.is_err() && hr.0 as u32 != RPC_E_CHANGED_MODE {
            return Err(DiscoveryError::Unavailable(format!(
                "CoInitializeEx failed: 0x{:08X}",
                hr.0 as u32
            )));
        }
        Ok(Self {
            should_uninit: hr.is_ok(),
        })
    }
}

impl Drop for ComInitializer {
    fn drop(&mut self) {
        if self.should_uninit {
            unsafe { CoUninitialize() };
        }
    }
}
