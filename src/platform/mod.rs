//! Platform-specific implementations
//!
//! Each platform module exposes the same set of free functions; callers use
//! them through this module.

#[cfg(windows)]
mod registry;
#[cfg(windows)]
mod shell_link;
#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub mod linux;

#[cfg(windows)]
pub use self::registry::uninstall_install_locations;
#[cfg(windows)]
pub use self::shell_link::ShellLinkResolver;
#[cfg(windows)]
pub use self::windows::*;

#[cfg(unix)]
pub use self::linux::*;

use std::path::PathBuf;

/// Top-level window identifier, valid only for the command that resolved it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// Root of the OS installation, where the built-in utilities live
pub fn system_root() -> PathBuf {
    std::env::var_os("SystemRoot")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Windows"))
}
