//! Remote session and platform detection
//!
//! Detects when the host runs somewhere other than a plain local desktop:
//! - SSH remotes
//! - Dev containers
//! - WSL
//! - Codespaces
//! - ChromeOS Linux containers

use std::env;
use std::path::Path;

/// Remote session kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    Codespaces,
    DevContainer,
    Wsl,
    SshRemote,
}

impl RemoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteKind::Codespaces => "codespaces",
            RemoteKind::DevContainer => "dev-container",
            RemoteKind::Wsl => "wsl",
            RemoteKind::SshRemote => "ssh-remote",
        }
    }
}

/// Detect the remote session kind from environment variables
pub fn detect_remote_kind() -> Option<RemoteKind> {
    // Most specific first: a codespace is also a container reached over ssh
    if env::var("CODESPACES").is_ok() {
        return Some(RemoteKind::Codespaces);
    }

    if env::var("REMOTE_CONTAINERS").is_ok() {
        return Some(RemoteKind::DevContainer);
    }

    if env::var("WSL_DISTRO_NAME").is_ok() {
        return Some(RemoteKind::Wsl);
    }

    if env::var("SSH_CONNECTION").is_ok() || env::var("SSH_CLIENT").is_ok() {
        return Some(RemoteKind::SshRemote);
    }

    None
}

/// Remote name as reported in session context; an explicit
/// `EDITOR_ANALYTICS_REMOTE_NAME` wins over detection.
pub fn detect_remote_name() -> Option<String> {
    if let Ok(name) = env::var("EDITOR_ANALYTICS_REMOTE_NAME") {
        if !name.trim().is_empty() {
            return Some(name.trim().to_string());
        }
    }

    detect_remote_kind().map(|kind| kind.as_str().to_string())
}

/// ChromeOS exposes its milestone file inside the Linux container
fn is_chrome_os() -> bool {
    Path::new("/dev/.cros_milestone").exists()
}

/// Platform names as editor hosts report them
fn os_name() -> &'static str {
    match env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

/// Platform string for session context, e.g. `linux (ChromeOS)`
pub fn platform_string() -> String {
    format_platform(os_name(), is_chrome_os())
}

fn format_platform(os: &str, chrome_os: bool) -> String {
    if chrome_os {
        format!("{} (ChromeOS)", os)
    } else {
        os.to_string()
    }
}
