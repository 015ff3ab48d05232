//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use editor_analytics::providers::{FeatureToggles, FormatterPreferences, StaticWorkspace};
use editor_analytics::{
    Analytics, Collaborators, Endpoint, HitResponse, HitSender, HostEnvironment, Logger, Resource,
    Settings, ToolInfo, TransportError,
};

/// How the fake collector answers
#[derive(Debug, Clone)]
pub enum Outcome {
    Ok,
    Status(u16),
    NetworkError,
    Body(String),
}

/// Records every post. Queued outcomes answer posts in arrival order, then
/// the fixed outcome answers the rest.
pub struct RecordingSender {
    outcome: Mutex<Outcome>,
    queued: Mutex<VecDeque<Outcome>>,
    posts: Mutex<Vec<(Endpoint, String)>>,
}

impl RecordingSender {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(outcome),
            queued: Mutex::new(VecDeque::new()),
            posts: Mutex::new(Vec::new()),
        })
    }

    pub fn queue_outcomes(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.queued.lock().unwrap().extend(outcomes);
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<BTreeMap<String, String>> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| parse_body(body))
            .collect()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.posts.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    /// Wait until at least `n` posts arrived
    pub async fn wait_for(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for analytics posts");
    }
}

#[async_trait]
impl HitSender for RecordingSender {
    async fn post(&self, endpoint: Endpoint, body: String) -> Result<HitResponse, TransportError> {
        self.posts.lock().unwrap().push((endpoint, body));
        let queued = self.queued.lock().unwrap().pop_front();
        let outcome = queued.unwrap_or_else(|| self.outcome.lock().unwrap().clone());
        match outcome {
            Outcome::Ok => Ok(HitResponse {
                status: 200,
                reason: Some("OK".to_string()),
                body: String::new(),
            }),
            Outcome::Status(status) => Ok(HitResponse {
                status,
                reason: Some("Server Error".to_string()),
                body: String::new(),
            }),
            Outcome::Body(body) => Ok(HitResponse {
                status: 200,
                reason: Some("OK".to_string()),
                body,
            }),
            Outcome::NetworkError => Err(TransportError("connection refused".to_string())),
        }
    }
}

pub fn parse_body(body: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect()
}

#[derive(Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("info: {}", message));
    }

    fn warn(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("warn: {}", message));
    }
}

pub struct FakeEnvironment {
    pub machine_id: Option<String>,
    pub telemetry_enabled: AtomicBool,
    pub test_run: AtomicBool,
}

impl FakeEnvironment {
    pub fn with_machine_id(machine_id: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            machine_id: machine_id.map(str::to_string),
            telemetry_enabled: AtomicBool::new(true),
            test_run: AtomicBool::new(false),
        })
    }
}

impl HostEnvironment for FakeEnvironment {
    fn machine_id(&self) -> Option<String> {
        self.machine_id.clone()
    }

    fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled.load(Ordering::SeqCst)
    }

    fn is_test_run(&self) -> bool {
        self.test_run.load(Ordering::SeqCst)
    }

    fn language(&self) -> Option<String> {
        Some("en".to_string())
    }

    fn app_name(&self) -> Option<String> {
        Some("Visual Studio Code".to_string())
    }

    fn app_version(&self) -> String {
        "1.90.0".to_string()
    }

    fn remote_name(&self) -> Option<String> {
        None
    }

    fn platform(&self) -> String {
        "linux".to_string()
    }
}

pub struct FakeSettings {
    pub allow_analytics: AtomicBool,
    pub disable_analytics: AtomicBool,
    pub step_into_sdk: bool,
    pub step_into_packages: bool,
}

impl FakeSettings {
    pub fn new(step_into_sdk: bool, step_into_packages: bool) -> Arc<Self> {
        Arc::new(Self {
            allow_analytics: AtomicBool::new(true),
            disable_analytics: AtomicBool::new(false),
            step_into_sdk,
            step_into_packages,
        })
    }
}

impl Settings for FakeSettings {
    fn allow_analytics(&self) -> bool {
        self.allow_analytics.load(Ordering::SeqCst)
    }

    fn disable_analytics(&self) -> bool {
        self.disable_analytics.load(Ordering::SeqCst)
    }

    fn feature_toggles(&self) -> FeatureToggles {
        FeatureToggles {
            closing_labels: true,
            show_todos: true,
            use_lsp: true,
            hot_reload_on_save: "always".to_string(),
            preview_ui_guides: true,
            ui_guides_custom_tracking: false,
        }
    }

    fn formatter_preferences(&self) -> anyhow::Result<FormatterPreferences> {
        Ok(FormatterPreferences {
            default_formatter: None,
            sdk_formatter_enabled: true,
            format_on_save: true,
        })
    }

    fn step_into_sdk_libraries(&self, _resource: &Resource) -> bool {
        self.step_into_sdk
    }

    fn step_into_external_packages(&self, _resource: &Resource) -> bool {
        self.step_into_packages
    }
}

pub fn tool() -> ToolInfo {
    ToolInfo {
        name: "Dart Code".to_string(),
        id: "dart-code.dart-code".to_string(),
        version: "3.80.0".to_string(),
        tracking_id: "UA-TEST-1".to_string(),
        companion_installed: false,
    }
}

/// Everything a test needs to drive and observe one client
pub struct Harness {
    pub analytics: Analytics,
    pub sender: Arc<RecordingSender>,
    pub logger: Arc<MemoryLogger>,
    pub environment: Arc<FakeEnvironment>,
    pub settings: Arc<FakeSettings>,
}

pub fn harness(outcome: Outcome) -> Harness {
    harness_with(outcome, Some("machine-123"), FakeSettings::new(false, false), Endpoint::Collect)
}

pub fn harness_with(
    outcome: Outcome,
    machine_id: Option<&str>,
    settings: Arc<FakeSettings>,
    endpoint: Endpoint,
) -> Harness {
    let sender = RecordingSender::new(outcome);
    let logger = Arc::new(MemoryLogger::default());
    let environment = FakeEnvironment::with_machine_id(machine_id);

    let analytics = Analytics::new(
        tool(),
        Collaborators {
            environment: environment.clone(),
            settings: settings.clone(),
            workspace: Arc::new(StaticWorkspace {
                description: "Flutter".to_string(),
                framework_projects: true,
            }),
            logger: logger.clone(),
        },
        endpoint,
        sender.clone(),
    );

    Harness {
        analytics,
        sender,
        logger,
        environment,
        settings,
    }
}
