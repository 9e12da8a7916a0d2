//! Facts about the invoking user and machine, captured once at startup.
use std::path::{Path, PathBuf};

/// Identity and standard directories of the invoking user.
///
/// Detection reads the process environment exactly once; everything after
/// that receives these values through [`Config`](crate::config::Config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Home directory used for `~` expansion.
    pub home: PathBuf,
    /// Base directory for configuration files (`$XDG_CONFIG_HOME`).
    pub config_dir: PathBuf,
    /// Base directory for log files (`$XDG_CACHE_HOME`).
    pub cache_dir: PathBuf,
    /// Machine hostname recorded with each session.
    pub hostname: String,
    /// Login name recorded with each session.
    pub username: String,
}

impl HostInfo {
    /// Detect the current user and machine.
    #[must_use]
    pub fn detect() -> Self {
        let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("/"), PathBuf::from);
        let config_dir = xdg_dir("XDG_CONFIG_HOME", &home, ".config");
        let cache_dir = xdg_dir("XDG_CACHE_HOME", &home, ".cache");
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            home,
            config_dir,
            cache_dir,
            hostname,
            username,
        }
    }

    /// Host rooted at `home`, with XDG directories beneath it.
    #[must_use]
    pub fn with_home(home: &Path, hostname: &str, username: &str) -> Self {
        Self {
            home: home.to_path_buf(),
            config_dir: home.join(".config"),
            cache_dir: home.join(".cache"),
            hostname: hostname.to_string(),
            username: username.to_string(),
        }
    }
}

/// Resolve an XDG base directory, ignoring empty or relative values as the
/// XDG specification requires.
fn xdg_dir(var: &str, home: &Path, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .unwrap_or_else(|| home.join(fallback))
}
