//! Interfaces the host implements for the analytics client

use crate::remote::platform_string;

/// A document or folder a hit relates to, used for resource-scoped settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub uri: String,
}

impl Resource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// Applied formatter preferences for the tool's language
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatterPreferences {
    /// The editor's selected default formatter, if any
    pub default_formatter: Option<String>,
    pub sdk_formatter_enabled: bool,
    pub format_on_save: bool,
}

/// Feature toggles recorded once per session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureToggles {
    pub closing_labels: bool,
    pub show_todos: bool,
    pub use_lsp: bool,
    pub hot_reload_on_save: String,
    pub preview_ui_guides: bool,
    pub ui_guides_custom_tracking: bool,
}

/// Machine identity and host application facts
pub trait HostEnvironment: Send + Sync {
    /// Stable installation identifier. `None` blocks all sends.
    fn machine_id(&self) -> Option<String>;

    /// The host editor's global telemetry switch
    fn telemetry_enabled(&self) -> bool;

    /// Whether this process is an automated test run
    fn is_test_run(&self) -> bool;

    fn language(&self) -> Option<String>;

    fn app_name(&self) -> Option<String>;

    fn app_version(&self) -> String;

    /// Remote session kind (ssh, container, ...), `None` for local sessions
    fn remote_name(&self) -> Option<String>;

    fn platform(&self) -> String {
        platform_string()
    }
}

/// User settings. Consent flags are read on every send attempt.
pub trait Settings: Send + Sync {
    /// Legacy opt-in flag, kept for users who opted out under the old name
    fn allow_analytics(&self) -> bool;

    /// Current opt-out flag
    fn disable_analytics(&self) -> bool;

    fn feature_toggles(&self) -> FeatureToggles;

    fn formatter_preferences(&self) -> anyhow::Result<FormatterPreferences>;

    fn step_into_sdk_libraries(&self, resource: &Resource) -> bool;

    fn step_into_external_packages(&self, resource: &Resource) -> bool;
}

/// Facts about the open workspace
pub trait WorkspaceContext: Send + Sync {
    fn workspace_type_description(&self) -> String;

    /// Whether any project in the workspace uses the companion framework
    fn has_framework_projects(&self) -> bool;
}

/// Diagnostic log sink. Implementations must not panic.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Logger that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "editor_analytics", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "editor_analytics", "{}", message);
    }
}

/// Fixed workspace description, for hosts that detect the project type up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticWorkspace {
    pub description: String,
    pub framework_projects: bool,
}

impl Default for StaticWorkspace {
    fn default() -> Self {
        Self {
            description: "Unknown".to_string(),
            framework_projects: false,
        }
    }
}

impl WorkspaceContext for StaticWorkspace {
    fn workspace_type_description(&self) -> String {
        self.description.clone()
    }

    fn has_framework_projects(&self) -> bool {
        self.framework_projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_workspace_default() {
        let workspace = StaticWorkspace::default();
        assert_eq!(workspace.workspace_type_description(), "Unknown");
        assert!(!workspace.has_framework_projects());
    }

    #[test]
    fn test_resource_from_str() {
        assert_eq!(Resource::new("file:///a.dart").uri, "file:///a.dart");
    }

    #[test]
    fn test_tracing_logger_without_subscriber() {
        let logger = TracingLogger;
        logger.info("info line");
        logger.warn("warn line");
    }
}
