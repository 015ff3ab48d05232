//! Session context and hit enrichment
//!
//! The session context is captured once when the client is built. Only the
//! late-bound tool versions change afterwards, and those are read at
//! enrichment time so every hit carries the latest known value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::events::Hit;
use crate::providers::{FormatterPreferences, HostEnvironment, Settings, WorkspaceContext};

/// Named custom dimensions understood by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    IsDevBuild,
    Platform,
    SdkVersion,
    AnalyzerVersion,
    HostVersion,
    DebuggerScope,
    WorkspaceType,
    ClosingLabels,
    HotReloadOnSave,
    Todos,
    LanguageProtocol,
    Formatter,
    ToolchainSdkVersion,
    CompanionExtension,
    DebuggerType,
    RunType,
    UiGuides,
    RemoteName,
    HostAppName,
}

/// Identity of the tool embedding this client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    /// Display name sent as the application name, e.g. "Dart Code"
    pub name: String,
    /// Extension identifier, used to tell our formatter apart from others
    pub id: String,
    pub version: String,
    pub tracking_id: String,
    /// Whether the companion framework extension is installed
    pub companion_installed: bool,
}

impl ToolInfo {
    /// Development builds carry a `-dev` version suffix
    pub fn is_dev_build(&self) -> bool {
        self.version.ends_with("-dev")
    }
}

/// How the user's documents get formatted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatterSetting {
    /// Another extension is the selected default formatter
    Other(String),
    Disabled,
    Enabled,
    EnabledOnSave,
    Unknown,
}

impl FormatterSetting {
    /// Classify the applied formatter preferences.
    ///
    /// A different default formatter wins over our own enable flag, so a user
    /// who picked another formatter is never recorded as using ours.
    pub fn resolve(preferences: anyhow::Result<FormatterPreferences>, own_id: &str) -> Self {
        let Ok(preferences) = preferences else {
            return FormatterSetting::Unknown;
        };

        if let Some(other) = preferences.default_formatter {
            if !other.is_empty() && other != own_id {
                return FormatterSetting::Other(other);
            }
        }

        if !preferences.sdk_formatter_enabled {
            FormatterSetting::Disabled
        } else if preferences.format_on_save {
            FormatterSetting::EnabledOnSave
        } else {
            FormatterSetting::Enabled
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FormatterSetting::Other(id) => id,
            FormatterSetting::Disabled => "Disabled",
            FormatterSetting::Enabled => "Enabled",
            FormatterSetting::EnabledOnSave => "Enabled on Save",
            FormatterSetting::Unknown => "Unknown",
        }
    }
}

/// Which code the debugger will step into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebuggerScope {
    AllCode,
    MyCodeAndSdk,
    MyCodeAndLibraries,
    MyCode,
}

impl DebuggerScope {
    pub fn from_settings(step_into_sdk: bool, step_into_packages: bool) -> Self {
        match (step_into_sdk, step_into_packages) {
            (true, true) => DebuggerScope::AllCode,
            (true, false) => DebuggerScope::MyCodeAndSdk,
            (false, true) => DebuggerScope::MyCodeAndLibraries,
            (false, false) => DebuggerScope::MyCode,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DebuggerScope::AllCode => "All code",
            DebuggerScope::MyCodeAndSdk => "My code + SDK",
            DebuggerScope::MyCodeAndLibraries => "My code + Libraries",
            DebuggerScope::MyCode => "My code",
        }
    }
}

/// State of the preview UI guides feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiGuides {
    Off,
    On,
    OnWithCustomTracking,
}

impl UiGuides {
    pub fn from_settings(enabled: bool, custom_tracking: bool) -> Self {
        match (enabled, custom_tracking) {
            (false, _) => UiGuides::Off,
            (true, false) => UiGuides::On,
            (true, true) => UiGuides::OnWithCustomTracking,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UiGuides::Off => "Off",
            UiGuides::On => "On",
            UiGuides::OnWithCustomTracking => "On + Custom Tracking",
        }
    }
}

/// Versions detected after startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LateVersions {
    pub sdk_version: Option<String>,
    pub toolchain_sdk_version: Option<String>,
    pub analyzer_version: Option<String>,
}

/// Descriptive context captured once per process
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub tool: ToolInfo,
    pub platform: String,
    pub host_version: String,
    pub host_app_name: String,
    pub remote_name: String,
    pub language: Option<String>,
    pub machine_id: Option<String>,
    pub formatter: FormatterSetting,
    pub workspace_type: String,
    pub closing_labels: bool,
    pub show_todos: bool,
    pub use_lsp: bool,
    /// Only recorded when the workspace contains framework projects
    pub hot_reload_on_save: Option<String>,
    /// Only recorded when the workspace contains framework projects
    pub ui_guides: Option<UiGuides>,
}

impl SessionContext {
    pub fn capture(
        tool: ToolInfo,
        environment: &dyn HostEnvironment,
        settings: &dyn Settings,
        workspace: &dyn WorkspaceContext,
    ) -> Self {
        let formatter = FormatterSetting::resolve(settings.formatter_preferences(), &tool.id);
        let toggles = settings.feature_toggles();
        let has_framework_projects = workspace.has_framework_projects();

        Self {
            platform: environment.platform(),
            host_version: environment.app_version(),
            host_app_name: environment
                .app_name()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            remote_name: environment
                .remote_name()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| "None".to_string()),
            language: environment.language(),
            machine_id: environment.machine_id(),
            formatter,
            workspace_type: workspace.workspace_type_description(),
            closing_labels: toggles.closing_labels,
            show_todos: toggles.show_todos,
            use_lsp: toggles.use_lsp,
            hot_reload_on_save: has_framework_projects.then(|| toggles.hot_reload_on_save.clone()),
            ui_guides: has_framework_projects.then(|| {
                UiGuides::from_settings(toggles.preview_ui_guides, toggles.ui_guides_custom_tracking)
            }),
            tool,
        }
    }

    /// Context dimensions for one hit
    pub fn dimensions(
        &self,
        versions: &LateVersions,
        debugger_scope: Option<DebuggerScope>,
    ) -> BTreeMap<Dimension, String> {
        let mut dims = BTreeMap::new();

        dims.insert(Dimension::IsDevBuild, self.tool.is_dev_build().to_string());
        dims.insert(Dimension::Platform, self.platform.clone());
        dims.insert(Dimension::HostVersion, self.host_version.clone());
        dims.insert(Dimension::WorkspaceType, self.workspace_type.clone());
        dims.insert(Dimension::ClosingLabels, on_off(self.closing_labels));
        dims.insert(Dimension::Todos, on_off(self.show_todos));
        dims.insert(
            Dimension::LanguageProtocol,
            if self.use_lsp { "LSP" } else { "DAS" }.to_string(),
        );
        dims.insert(Dimension::Formatter, self.formatter.label().to_string());
        dims.insert(
            Dimension::CompanionExtension,
            if self.tool.companion_installed {
                "Installed"
            } else {
                "Not Installed"
            }
            .to_string(),
        );
        dims.insert(Dimension::RemoteName, self.remote_name.clone());
        dims.insert(Dimension::HostAppName, self.host_app_name.clone());

        if let Some(hot_reload) = &self.hot_reload_on_save {
            dims.insert(Dimension::HotReloadOnSave, hot_reload.clone());
        }
        if let Some(guides) = self.ui_guides {
            dims.insert(Dimension::UiGuides, guides.label().to_string());
        }
        if let Some(scope) = debugger_scope {
            dims.insert(Dimension::DebuggerScope, scope.label().to_string());
        }

        if let Some(version) = &versions.sdk_version {
            dims.insert(Dimension::SdkVersion, version.clone());
        }
        if let Some(version) = &versions.toolchain_sdk_version {
            dims.insert(Dimension::ToolchainSdkVersion, version.clone());
        }
        if let Some(version) = &versions.analyzer_version {
            dims.insert(Dimension::AnalyzerVersion, version.clone());
        }

        dims
    }
}

fn on_off(value: bool) -> String {
    let label = if value { "On" } else { "Off" };
    label.to_string()
}

/// A hit merged with its session context, ready for the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedHit {
    pub tracking_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub app_name: String,
    pub app_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub dimensions: BTreeMap<Dimension, String>,
    pub hit: Hit,
}

/// Merge session context into a hit.
///
/// Context dimensions are copied first, then the hit's own custom dimensions
/// are laid over them, so caller-supplied values win on collision. Hit fields
/// never share a key with context fields.
pub fn enrich(
    context: &SessionContext,
    versions: &LateVersions,
    mut hit: Hit,
    debugger_scope: Option<DebuggerScope>,
) -> EnrichedHit {
    let mut dimensions = context.dimensions(versions, debugger_scope);
    dimensions.extend(hit.take_custom());

    EnrichedHit {
        tracking_id: context.tool.tracking_id.clone(),
        client_id: context.machine_id.clone(),
        app_name: context.tool.name.clone(),
        app_version: context.tool.version.clone(),
        language: context.language.clone(),
        dimensions,
        hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Category, EventAction};
    use std::collections::HashSet;

    fn context() -> SessionContext {
        SessionContext {
            tool: ToolInfo {
                name: "Dart Code".to_string(),
                id: "dart-code.dart-code".to_string(),
                version: "3.80.0".to_string(),
                tracking_id: "UA-TEST-1".to_string(),
                companion_installed: true,
            },
            platform: "linux".to_string(),
            host_version: "1.90.0".to_string(),
            host_app_name: "Visual Studio Code".to_string(),
            remote_name: "None".to_string(),
            language: Some("en".to_string()),
            machine_id: Some("machine".to_string()),
            formatter: FormatterSetting::Enabled,
            workspace_type: "Dart".to_string(),
            closing_labels: true,
            show_todos: false,
            use_lsp: true,
            hot_reload_on_save: None,
            ui_guides: None,
        }
    }

    #[test]
    fn test_debugger_scope_labels_are_distinct() {
        let labels: HashSet<&str> = [(true, true), (true, false), (false, true), (false, false)]
            .into_iter()
            .map(|(sdk, packages)| DebuggerScope::from_settings(sdk, packages).label())
            .collect();

        assert_eq!(labels.len(), 4);
        assert_eq!(DebuggerScope::from_settings(true, true).label(), "All code");
        assert_eq!(DebuggerScope::from_settings(true, false).label(), "My code + SDK");
        assert_eq!(DebuggerScope::from_settings(false, true).label(), "My code + Libraries");
        assert_eq!(DebuggerScope::from_settings(false, false).label(), "My code");
    }

    #[test]
    fn test_formatter_resolution() {
        let own = "dart-code.dart-code";
        let prefs = |default: Option<&str>, enabled: bool, on_save: bool| {
            Ok(FormatterPreferences {
                default_formatter: default.map(str::to_string),
                sdk_formatter_enabled: enabled,
                format_on_save: on_save,
            })
        };

        assert_eq!(
            FormatterSetting::resolve(prefs(Some("other.formatter"), true, true), own),
            FormatterSetting::Other("other.formatter".to_string())
        );
        assert_eq!(
            FormatterSetting::resolve(prefs(Some(own), false, false), own),
            FormatterSetting::Disabled
        );
        assert_eq!(
            FormatterSetting::resolve(prefs(None, true, true), own),
            FormatterSetting::EnabledOnSave
        );
        assert_eq!(
            FormatterSetting::resolve(prefs(None, true, false), own),
            FormatterSetting::Enabled
        );
        assert_eq!(
            FormatterSetting::resolve(Err(anyhow::anyhow!("settings unavailable")), own),
            FormatterSetting::Unknown
        );
        assert_eq!(FormatterSetting::EnabledOnSave.label(), "Enabled on Save");
    }

    #[test]
    fn test_custom_dimension_wins_over_context() {
        let hit = Hit::event_with(
            Category::Debugger,
            EventAction::Activated,
            [(Dimension::Platform, "custom-platform".to_string())],
        );

        let enriched = enrich(&context(), &LateVersions::default(), hit, None);

        assert_eq!(
            enriched.dimensions.get(&Dimension::Platform).map(String::as_str),
            Some("custom-platform")
        );
        match &enriched.hit {
            Hit::Event(event) => assert!(event.custom.is_empty()),
            other => panic!("unexpected hit {:?}", other),
        }
    }

    #[test]
    fn test_enrichment_reflects_latest_versions() {
        let mut versions = LateVersions::default();
        let enriched = enrich(
            &context(),
            &versions,
            Hit::event(Category::Analyzer, EventAction::Restart),
            None,
        );
        assert!(!enriched.dimensions.contains_key(&Dimension::SdkVersion));

        versions.sdk_version = Some("3.4.0".to_string());
        versions.sdk_version = Some("3.5.0".to_string());
        versions.analyzer_version = Some("1.2.3".to_string());
        let enriched = enrich(
            &context(),
            &versions,
            Hit::event(Category::Analyzer, EventAction::Restart),
            None,
        );
        assert_eq!(enriched.dimensions[&Dimension::SdkVersion], "3.5.0");
        assert_eq!(enriched.dimensions[&Dimension::AnalyzerVersion], "1.2.3");
        assert!(!enriched.dimensions.contains_key(&Dimension::ToolchainSdkVersion));
    }

    #[test]
    fn test_debugger_scope_only_when_resolved() {
        let hit = Hit::event(Category::Debugger, EventAction::Activated);
        let without = enrich(&context(), &LateVersions::default(), hit.clone(), None);
        assert!(!without.dimensions.contains_key(&Dimension::DebuggerScope));

        let with = enrich(
            &context(),
            &LateVersions::default(),
            hit,
            Some(DebuggerScope::MyCodeAndSdk),
        );
        assert_eq!(with.dimensions[&Dimension::DebuggerScope], "My code + SDK");
    }

    #[test]
    fn test_context_dimensions_labels() {
        let dims = context().dimensions(&LateVersions::default(), None);
        assert_eq!(dims[&Dimension::ClosingLabels], "On");
        assert_eq!(dims[&Dimension::Todos], "Off");
        assert_eq!(dims[&Dimension::LanguageProtocol], "LSP");
        assert_eq!(dims[&Dimension::CompanionExtension], "Installed");
        assert_eq!(dims[&Dimension::IsDevBuild], "false");
        assert!(!dims.contains_key(&Dimension::HotReloadOnSave));
        assert!(!dims.contains_key(&Dimension::UiGuides));
    }

    #[test]
    fn test_ui_guides_labels() {
        assert_eq!(UiGuides::from_settings(false, true).label(), "Off");
        assert_eq!(UiGuides::from_settings(true, false).label(), "On");
        assert_eq!(UiGuides::from_settings(true, true).label(), "On + Custom Tracking");
    }

    #[test]
    fn test_dev_build_detection() {
        let mut tool = context().tool;
        assert!(!tool.is_dev_build());
        tool.version = "3.81.0-dev".to_string();
        assert!(tool.is_dev_build());
    }
}
