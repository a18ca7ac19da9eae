//! Contains logic for identifying the foreground application in different
//! environments. [GenericForegroundQuery] is the main artifact of this module
//! that abstracts the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use std::{path::Path, sync::Arc};

use anyhow::Result;

#[cfg(test)]
use mockall::automock;

/// Identity of the application currently holding window focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundWindow {
    /// Lowercase executable identifier. For example 'code.exe' or 'nvim'
    pub exe: Arc<str>,
    /// Title of the focused window. For example 'Vibing in YouTube - Chrome'
    pub title: Arc<str>,
}

impl ForegroundWindow {
    /// Builds an identity from a raw process path and a window title. The path is reduced to its
    /// lowercase file name so that the same executable maps to one identifier on every platform.
    pub fn new(process_path: &str, title: impl Into<Arc<str>>) -> Self {
        Self {
            exe: normalize_exe(process_path).into(),
            title: title.into(),
        }
    }

    /// Identity used when the OS query fails. An empty identity is a valid bucket of its own, not
    /// an error.
    pub fn unknown() -> Self {
        Self {
            exe: "".into(),
            title: "".into(),
        }
    }
}

/// Reduces a full executable path to the lowercase file name used as the application identifier.
pub fn normalize_exe(value: &str) -> String {
    Path::new(value)
        .file_name()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_else(|| value.to_string())
        .to_lowercase()
}

/// Intended to serve as a contract windows and linux systems must implement.
#[cfg_attr(test, automock)]
pub trait ForegroundQuery: Send {
    fn foreground_window(&mut self) -> Result<ForegroundWindow>;
}

/// Serves as a cross-compatible ForegroundQuery implementation.
pub struct GenericForegroundQuery {
    inner: Box<dyn ForegroundQuery>,
}

impl GenericForegroundQuery {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsForegroundQuery;
                Ok(Self {
                    inner: Box::new(WindowsForegroundQuery::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::LinuxForegroundQuery;
                Ok(Self {
                    inner: Box::new(LinuxForegroundQuery::new()?),
                })
            }
            else {
                // This runtime error is needed to allow the project to be compiled for during testing.
                unimplemented!("No foreground query backend was specified")
            }
        }
    }
}

impl ForegroundQuery for GenericForegroundQuery {
    fn foreground_window(&mut self) -> Result<ForegroundWindow> {
        self.inner.foreground_window()
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_exe;

    #[test]
    fn normalize_strips_path_and_case() {
        assert_eq!(normalize_exe("/usr/bin/Code"), "code");
        assert_eq!(normalize_exe("nvim"), "nvim");
        assert_eq!(normalize_exe(""), "");
    }
}
