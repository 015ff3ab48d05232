//! Analytics configuration loading
//!
//! File and environment backed implementation of [`Settings`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::providers::{FeatureToggles, FormatterPreferences, Resource, Settings};

/// Default collector property
pub const DEFAULT_TRACKING_ID: &str = "UA-2201586-19";

/// Analytics configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Legacy opt-in flag (default: true)
    pub allow_analytics: bool,

    /// Opt-out flag (default: false)
    pub disable_analytics: bool,

    /// Post to the validation endpoint and log collector feedback (default: false)
    pub debug: bool,

    /// Override the collector property (for testing, optional)
    pub tracking_id: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    pub closing_labels: bool,
    pub show_todos: bool,
    pub use_lsp: bool,
    pub hot_reload_on_save: String,
    pub preview_ui_guides: bool,
    pub preview_ui_guides_custom_tracking: bool,

    pub enable_sdk_formatter: bool,
    pub format_on_save: bool,
    pub default_formatter: Option<String>,

    pub debug_sdk_libraries: bool,
    pub debug_external_package_libraries: bool,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            allow_analytics: true,
            disable_analytics: false,
            debug: false,
            tracking_id: None,
            timeout_secs: 10,
            closing_labels: true,
            show_todos: true,
            use_lsp: true,
            hot_reload_on_save: "manual".to_string(),
            preview_ui_guides: false,
            preview_ui_guides_custom_tracking: false,
            enable_sdk_formatter: true,
            format_on_save: false,
            default_formatter: None,
            debug_sdk_libraries: false,
            debug_external_package_libraries: false,
        }
    }
}

/// One config file's `[analytics]` table; unset keys leave lower layers alone
#[derive(Debug, Clone, Default, Deserialize)]
struct PartialAnalyticsConfig {
    allow_analytics: Option<bool>,
    disable_analytics: Option<bool>,
    debug: Option<bool>,
    tracking_id: Option<String>,
    timeout_secs: Option<u64>,
    closing_labels: Option<bool>,
    show_todos: Option<bool>,
    use_lsp: Option<bool>,
    hot_reload_on_save: Option<String>,
    preview_ui_guides: Option<bool>,
    preview_ui_guides_custom_tracking: Option<bool>,
    enable_sdk_formatter: Option<bool>,
    format_on_save: Option<bool>,
    default_formatter: Option<String>,
    debug_sdk_libraries: Option<bool>,
    debug_external_package_libraries: Option<bool>,
}

/// Load analytics configuration with precedence:
/// 1. Environment variables (highest priority)
/// 2. Local config (.editor-analytics/config.local.toml)
/// 3. Project config (.editor-analytics/config.toml)
/// 4. User config (~/.editor-analytics/config.toml)
/// 5. Defaults
pub fn load_analytics_config() -> Result<AnalyticsConfig> {
    let mut config = AnalyticsConfig::default();

    let mut layers = Vec::new();
    if let Some(home_dir) = dirs::home_dir() {
        layers.push(home_dir.join(".editor-analytics/config.toml"));
    }
    layers.push(PathBuf::from(".editor-analytics/config.toml"));
    layers.push(PathBuf::from(".editor-analytics/config.local.toml"));

    for path in layers {
        if path.exists() {
            // Unreadable or malformed files are skipped
            if let Ok(partial) = load_config_from_file(&path) {
                merge_config(&mut config, partial);
            }
        }
    }

    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Load the `[analytics]` table from a TOML file
fn load_config_from_file(path: &Path) -> Result<PartialAnalyticsConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    #[derive(Deserialize)]
    struct FullConfig {
        #[serde(default)]
        analytics: Option<PartialAnalyticsConfig>,
    }

    let full_config: FullConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;

    Ok(full_config.analytics.unwrap_or_default())
}

/// Overlay keys set in `new` onto `base`
fn merge_config(base: &mut AnalyticsConfig, new: PartialAnalyticsConfig) {
    macro_rules! overlay {
        ($($field:ident),* $(,)?) => {
            $(if let Some(value) = new.$field {
                base.$field = value;
            })*
        };
    }

    overlay!(
        allow_analytics,
        disable_analytics,
        debug,
        timeout_secs,
        closing_labels,
        show_todos,
        use_lsp,
        hot_reload_on_save,
        preview_ui_guides,
        preview_ui_guides_custom_tracking,
        enable_sdk_formatter,
        format_on_save,
        debug_sdk_libraries,
        debug_external_package_libraries,
    );

    if new.tracking_id.is_some() {
        base.tracking_id = new.tracking_id;
    }
    if new.default_formatter.is_some() {
        base.default_formatter = new.default_formatter;
    }
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut AnalyticsConfig) -> Result<()> {
    // EDITOR_ANALYTICS_DISABLED=1 disables analytics
    if env::var("EDITOR_ANALYTICS_DISABLED").is_ok() {
        config.disable_analytics = true;
        return Ok(());
    }

    // DO_NOT_TRACK=1 (universal opt-out)
    if env::var("DO_NOT_TRACK").is_ok() {
        config.disable_analytics = true;
        return Ok(());
    }

    // EDITOR_ANALYTICS_DEBUG=1 posts to the validation endpoint
    if env::var("EDITOR_ANALYTICS_DEBUG").is_ok() {
        config.debug = true;
    }

    if let Ok(tracking_id) = env::var("EDITOR_ANALYTICS_TRACKING_ID") {
        if !tracking_id.trim().is_empty() {
            config.tracking_id = Some(tracking_id.trim().to_string());
        }
    }

    // Auto-disable in CI unless explicitly enabled
    if is_ci() && env::var("EDITOR_ANALYTICS_IN_CI").is_err() {
        config.disable_analytics = true;
    }

    Ok(())
}

/// Check if running in CI environment
pub fn is_ci() -> bool {
    env::var("CI").is_ok()
        || env::var("CONTINUOUS_INTEGRATION").is_ok()
        || env::var("GITHUB_ACTIONS").is_ok()
        || env::var("GITLAB_CI").is_ok()
        || env::var("CIRCLECI").is_ok()
        || env::var("TRAVIS").is_ok()
}

impl Settings for AnalyticsConfig {
    fn allow_analytics(&self) -> bool {
        self.allow_analytics
    }

    fn disable_analytics(&self) -> bool {
        self.disable_analytics
    }

    fn feature_toggles(&self) -> FeatureToggles {
        FeatureToggles {
            closing_labels: self.closing_labels,
            show_todos: self.show_todos,
            use_lsp: self.use_lsp,
            hot_reload_on_save: self.hot_reload_on_save.clone(),
            preview_ui_guides: self.preview_ui_guides,
            ui_guides_custom_tracking: self.preview_ui_guides_custom_tracking,
        }
    }

    fn formatter_preferences(&self) -> Result<FormatterPreferences> {
        Ok(FormatterPreferences {
            default_formatter: self.default_formatter.clone(),
            sdk_formatter_enabled: self.enable_sdk_formatter,
            format_on_save: self.format_on_save,
        })
    }

    fn step_into_sdk_libraries(&self, _resource: &Resource) -> bool {
        self.debug_sdk_libraries
    }

    fn step_into_external_packages(&self, _resource: &Resource) -> bool {
        self.debug_external_package_libraries
    }
}

/// Settings backed by the config layers, re-read whenever consent or
/// resource-scoped debugger settings are asked for.
///
/// Feature toggles and formatter preferences come from the snapshot taken at
/// startup, since they are only recorded once per session.
#[derive(Debug, Clone)]
pub struct LiveSettings {
    snapshot: AnalyticsConfig,
}

impl LiveSettings {
    pub fn new(snapshot: AnalyticsConfig) -> Self {
        Self { snapshot }
    }

    /// Startup configuration
    pub fn snapshot(&self) -> &AnalyticsConfig {
        &self.snapshot
    }

    fn current(&self) -> AnalyticsConfig {
        load_analytics_config().unwrap_or_else(|_| self.snapshot.clone())
    }
}

impl Settings for LiveSettings {
    fn allow_analytics(&self) -> bool {
        self.current().allow_analytics
    }

    fn disable_analytics(&self) -> bool {
        self.current().disable_analytics
    }

    fn feature_toggles(&self) -> FeatureToggles {
        self.snapshot.feature_toggles()
    }

    fn formatter_preferences(&self) -> Result<FormatterPreferences> {
        self.snapshot.formatter_preferences()
    }

    fn step_into_sdk_libraries(&self, resource: &Resource) -> bool {
        self.current().step_into_sdk_libraries(resource)
    }

    fn step_into_external_packages(&self, resource: &Resource) -> bool {
        self.current().step_into_external_packages(resource)
    }
}
