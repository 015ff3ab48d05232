//! Anonymous installation identity and the system-backed host environment
//!
//! Nothing here touches the disk. A host-provided id is used as given; without
//! one the id is derived from a hash of a stable hardware identifier.

use sha2::{Digest, Sha256};
use std::env;

use crate::providers::HostEnvironment;
use crate::remote::{detect_remote_name, platform_string};

/// Machine id reported by editor development hosts, which carry no real identity
pub const DEV_HOST_MACHINE_ID: &str = "someValue.machineId";

/// Namespace mixed into derived ids
const MACHINE_ID_NAMESPACE: &str = "editor-analytics";

/// Validate a host-provided machine id.
///
/// Empty ids and the development-host placeholder count as absent.
pub fn resolve_machine_id(raw: Option<&str>) -> Option<String> {
    let id = raw?.trim();
    if id.is_empty() || id == DEV_HOST_MACHINE_ID {
        return None;
    }
    Some(id.to_string())
}

/// Derive an anonymous machine id from the hardware.
///
/// SHA256 of the namespace and the MAC address (or hostname as fallback).
/// Returns `None` when neither is available.
pub fn derive_machine_id() -> Option<String> {
    get_machine_identifier().map(|identifier| hash_identifier(&identifier))
}

fn hash_identifier(identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(MACHINE_ID_NAMESPACE.as_bytes());
    hasher.update(identifier.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Get a stable machine identifier (MAC address or hostname)
fn get_machine_identifier() -> Option<String> {
    if let Ok(Some(mac_addr)) = mac_address::get_mac_address() {
        return Some(mac_addr.to_string());
    }

    if let Ok(hostname) = hostname::get() {
        if let Some(hostname_str) = hostname.to_str() {
            if !hostname_str.is_empty() {
                return Some(hostname_str.to_string());
            }
        }
    }

    None
}

/// Normalize a POSIX locale (`en_US.UTF-8`) to a language tag (`en-us`)
pub fn locale_to_language(locale: &str) -> Option<String> {
    let tag = locale.split(['.', '@']).next().unwrap_or("").trim();
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    Some(tag.replace('_', "-").to_lowercase())
}

fn env_flag_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}

/// Host environment read from the process environment
///
/// Identity, locale and host application facts are captured by [`detect`];
/// the telemetry switch and test-run flag are read on every call.
///
/// [`detect`]: SystemEnvironment::detect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEnvironment {
    pub machine_id: Option<String>,
    pub language: Option<String>,
    pub app_name: Option<String>,
    pub app_version: String,
    pub remote_name: Option<String>,
}

impl SystemEnvironment {
    pub fn detect() -> Self {
        let machine_id = match env::var("EDITOR_ANALYTICS_MACHINE_ID") {
            Ok(raw) => resolve_machine_id(Some(&raw)),
            Err(_) => derive_machine_id(),
        };

        let language = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .find_map(|locale| locale_to_language(&locale));

        let app_name = env::var("EDITOR_ANALYTICS_APP_NAME")
            .or_else(|_| env::var("TERM_PROGRAM"))
            .ok();
        let app_version = env::var("EDITOR_ANALYTICS_APP_VERSION")
            .or_else(|_| env::var("TERM_PROGRAM_VERSION"))
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            machine_id,
            language,
            app_name,
            app_version,
            remote_name: detect_remote_name(),
        }
    }
}

impl HostEnvironment for SystemEnvironment {
    fn machine_id(&self) -> Option<String> {
        self.machine_id.clone()
    }

    fn telemetry_enabled(&self) -> bool {
        env::var("EDITOR_ANALYTICS_HOST_TELEMETRY")
            .map(|value| !env_flag_off(&value))
            .unwrap_or(true)
    }

    fn is_test_run(&self) -> bool {
        env::var("EDITOR_ANALYTICS_TEST_RUN").is_ok()
    }

    fn language(&self) -> Option<String> {
        self.language.clone()
    }

    fn app_name(&self) -> Option<String> {
        self.app_name.clone()
    }

    fn app_version(&self) -> String {
        self.app_version.clone()
    }

    fn remote_name(&self) -> Option<String> {
        self.remote_name.clone()
    }

    fn platform(&self) -> String {
        platform_string()
    }
}
