//! Main analytics client

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::{load_analytics_config, LiveSettings, DEFAULT_TRACKING_ID};
use crate::context::{enrich, DebuggerScope, Dimension, LateVersions, SessionContext, ToolInfo};
use crate::error::AnalyticsError;
use crate::events::{Category, EventAction, Hit, TimingVariable};
use crate::gate::{EligibilityGate, FailureLatch};
use crate::machine_id::SystemEnvironment;
use crate::providers::{HostEnvironment, Logger, Resource, Settings, TracingLogger, WorkspaceContext};
use crate::transport::{Endpoint, HitSender, HttpSender, Transport};
use crate::wire;

/// Host-provided collaborators
#[derive(Clone)]
pub struct Collaborators {
    pub environment: Arc<dyn HostEnvironment>,
    pub settings: Arc<dyn Settings>,
    pub workspace: Arc<dyn WorkspaceContext>,
    pub logger: Arc<dyn Logger>,
}

struct Inner {
    context: SessionContext,
    versions: RwLock<LateVersions>,
    latch: FailureLatch,
    environment: Arc<dyn HostEnvironment>,
    settings: Arc<dyn Settings>,
    logger: Arc<dyn Logger>,
    transport: Transport,
}

impl Inner {
    fn can_send(&self) -> bool {
        EligibilityGate {
            latch: &self.latch,
            machine_id: self.context.machine_id.as_deref(),
            environment: self.environment.as_ref(),
            settings: self.settings.as_ref(),
        }
        .can_send()
    }

    async fn send(&self, hit: Hit, resource: Option<&Resource>) -> Result<(), AnalyticsError> {
        if !self.can_send() {
            return Ok(());
        }

        let debugger_scope = resource.map(|resource| {
            DebuggerScope::from_settings(
                self.settings.step_into_sdk_libraries(resource),
                self.settings.step_into_external_packages(resource),
            )
        });

        let versions = self
            .versions
            .read()
            .map_err(|_| AnalyticsError::StatePoisoned)?
            .clone();
        let enriched = enrich(&self.context, &versions, hit, debugger_scope);

        if self.transport.endpoint() == Endpoint::Validate {
            self.logger.info(&format!(
                "Sending analytic: {}",
                serde_json::to_string(&enriched)?
            ));
        }

        self.transport.deliver(wire::encode(&enriched)).await;
        Ok(())
    }
}

/// Completion of the shutdown hit, for hosts that flush on exit
pub struct ShutdownFlush {
    handle: Option<JoinHandle<Result<(), AnalyticsError>>>,
}

impl Future for ShutdownFlush {
    type Output = Result<(), AnalyticsError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.handle.as_mut() {
            Some(handle) => Pin::new(handle)
                .poll(cx)
                .map(|joined| joined.map_err(AnalyticsError::from).and_then(|sent| sent)),
            None => Poll::Ready(Err(AnalyticsError::NoRuntime)),
        }
    }
}

/// Analytics client
///
/// Every `log_*` method returns immediately. The send runs as a detached task
/// on the current tokio runtime and its failures go to the diagnostic logger.
#[derive(Clone)]
pub struct Analytics {
    inner: Arc<Inner>,
}

impl Analytics {
    /// Build a client. The session context is captured here, once.
    pub fn new(
        tool: ToolInfo,
        collaborators: Collaborators,
        endpoint: Endpoint,
        sender: Arc<dyn HitSender>,
    ) -> Self {
        let Collaborators {
            environment,
            settings,
            workspace,
            logger,
        } = collaborators;

        let context = SessionContext::capture(
            tool,
            environment.as_ref(),
            settings.as_ref(),
            workspace.as_ref(),
        );
        let latch = FailureLatch::new();
        let transport = Transport::new(sender, endpoint, latch.clone(), Arc::clone(&logger));

        Self {
            inner: Arc::new(Inner {
                context,
                versions: RwLock::new(LateVersions::default()),
                latch,
                environment,
                settings,
                logger,
                transport,
            }),
        }
    }

    /// Build a client from config files, environment variables and the
    /// machine's own identity.
    pub fn from_system(mut tool: ToolInfo, workspace: Arc<dyn WorkspaceContext>) -> Result<Self> {
        let config = load_analytics_config()?;

        if let Some(tracking_id) = config.tracking_id.clone() {
            tool.tracking_id = tracking_id;
        } else if tool.tracking_id.is_empty() {
            tool.tracking_id = DEFAULT_TRACKING_ID.to_string();
        }

        let endpoint = Endpoint::for_debug(config.debug);
        let sender = Arc::new(HttpSender::new(Duration::from_secs(config.timeout_secs)));
        let collaborators = Collaborators {
            environment: Arc::new(SystemEnvironment::detect()),
            settings: Arc::new(LiveSettings::new(config)),
            workspace,
            logger: Arc::new(TracingLogger),
        };

        Ok(Self::new(tool, collaborators, endpoint, sender))
    }

    /// Whether a hit would be sent right now
    pub fn can_send(&self) -> bool {
        self.inner.can_send()
    }

    /// Whether a transport failure has disabled analytics for this process
    pub fn is_disabled_for_session(&self) -> bool {
        self.inner.latch.is_tripped()
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.inner.context
    }

    /// Run the send pipeline for one hit and wait for it to finish.
    ///
    /// Ineligible hits and transport failures both resolve to `Ok`.
    pub async fn send(&self, hit: Hit, resource: Option<&Resource>) -> Result<(), AnalyticsError> {
        self.inner.send(hit, resource).await
    }

    pub fn set_sdk_version(&self, version: impl Into<String>) {
        let version = version.into();
        self.update_versions(|versions| versions.sdk_version = Some(version));
    }

    pub fn set_toolchain_sdk_version(&self, version: impl Into<String>) {
        let version = version.into();
        self.update_versions(|versions| versions.toolchain_sdk_version = Some(version));
    }

    pub fn set_analyzer_version(&self, version: impl Into<String>) {
        let version = version.into();
        self.update_versions(|versions| versions.analyzer_version = Some(version));
    }

    pub fn versions(&self) -> LateVersions {
        match self.inner.versions.read() {
            Ok(versions) => versions.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update_versions(&self, update: impl FnOnce(&mut LateVersions)) {
        match self.inner.versions.write() {
            Ok(mut versions) => update(&mut versions),
            Err(_) => self.inner.logger.warn(&AnalyticsError::StatePoisoned.to_string()),
        }
    }

    pub fn log_extension_startup(&self, time_in_ms: f64) {
        self.event(Category::Extension, EventAction::Activated);
        self.time(Category::Extension, TimingVariable::Startup, time_in_ms, None);
    }

    pub fn log_extension_restart(&self, time_in_ms: f64) {
        self.event(Category::Extension, EventAction::Restart);
        self.time(Category::Extension, TimingVariable::Startup, time_in_ms, None);
    }

    pub fn log_analyzer_restart(&self) {
        self.event(Category::Analyzer, EventAction::Restart);
    }

    /// Log deactivation. The returned future resolves once the hit has been
    /// delivered, so the host can wait for it before exiting.
    pub fn log_extension_shutdown(&self) -> ShutdownFlush {
        let hit = Hit::event(Category::Extension, EventAction::Deactivated);
        let inner = Arc::clone(&self.inner);

        let handle = Handle::try_current()
            .ok()
            .map(|runtime| runtime.spawn(async move { inner.send(hit, None).await }));

        ShutdownFlush { handle }
    }

    pub fn log_sdk_detection_failure(&self) {
        self.event(Category::Extension, EventAction::SdkDetectionFailure);
    }

    pub fn log_error(&self, description: &str, fatal: bool) {
        self.dispatch(Hit::exception(description, fatal), None);
    }

    pub fn log_analyzer_startup_time(&self, time_in_ms: f64) {
        self.time(Category::Analyzer, TimingVariable::Startup, time_in_ms, None);
    }

    pub fn log_debug_session_duration(&self, debugger_type: &str, time_in_ms: f64) {
        self.time(
            Category::Debugger,
            TimingVariable::SessionDuration,
            time_in_ms,
            Some(debugger_type.to_string()),
        );
    }

    pub fn log_analyzer_first_analysis_time(&self, time_in_ms: f64) {
        self.time(Category::Analyzer, TimingVariable::FirstAnalysis, time_in_ms, None);
    }

    /// Log a debug session launch. When `resource` is given the hit also
    /// records which code the debugger steps into.
    pub fn log_debugger_start(&self, resource: Option<Resource>, debugger_type: &str, run_type: &str) {
        let hit = Hit::event_with(
            Category::Debugger,
            EventAction::Activated,
            [
                (Dimension::DebuggerType, debugger_type.to_string()),
                (Dimension::RunType, run_type.to_string()),
            ],
        );
        self.dispatch(hit, resource);
    }

    pub fn log_debugger_restart(&self) {
        self.event(Category::Debugger, EventAction::Restart);
    }

    pub fn log_debugger_hot_reload(&self) {
        self.event(Category::Debugger, EventAction::HotReload);
    }

    pub fn log_debugger_open_observatory(&self) {
        self.event(Category::Debugger, EventAction::OpenObservatory);
    }

    pub fn log_debugger_open_timeline(&self) {
        self.event(Category::Debugger, EventAction::OpenTimeline);
    }

    pub fn log_debugger_open_dev_tools(&self) {
        self.event(Category::Debugger, EventAction::OpenDevTools);
    }

    pub fn log_survey_shown(&self) {
        self.event(Category::SurveyPrompt, EventAction::Shown);
    }

    pub fn log_survey_clicked(&self) {
        self.event(Category::SurveyPrompt, EventAction::Clicked);
    }

    pub fn log_survey_dismissed(&self) {
        self.event(Category::SurveyPrompt, EventAction::Dismissed);
    }

    fn event(&self, category: Category, action: EventAction) {
        self.dispatch(Hit::event(category, action), None);
    }

    fn time(&self, category: Category, variable: TimingVariable, time_in_ms: f64, label: Option<String>) {
        let hit = Hit::timing(category, variable, time_in_ms, label);
        if let Hit::Timing(timing) = &hit {
            self.inner.logger.info(&timing_message(
                category,
                variable,
                timing.duration_ms,
                timing.label.as_deref(),
            ));
        }
        self.dispatch(hit, None);
    }

    /// Fire and forget. Failures are logged, never returned.
    fn dispatch(&self, hit: Hit, resource: Option<Resource>) {
        let Ok(runtime) = Handle::try_current() else {
            self.inner
                .logger
                .warn(&AnalyticsError::NoRuntime.to_string());
            return;
        };

        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            if let Err(e) = inner.send(hit, resource.as_ref()).await {
                inner.logger.info(&e.to_string());
            }
        });
    }
}

fn timing_message(category: Category, variable: TimingVariable, ms: f64, label: Option<&str>) -> String {
    let suffix = label.map(|label| format!(" ({})", label)).unwrap_or_default();
    format!("{}:{} timing: {}ms{}", category.as_str(), variable.as_str(), ms, suffix)
}
