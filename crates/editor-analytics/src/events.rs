//! Telemetry hit data structures

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::context::Dimension;

/// Area of the tool a hit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Extension,
    Analyzer,
    Debugger,
    SurveyPrompt,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Extension,
        Category::Analyzer,
        Category::Debugger,
        Category::SurveyPrompt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Extension => "extension",
            Category::Analyzer => "analyzer",
            Category::Debugger => "debugger",
            Category::SurveyPrompt => "surveyPrompt",
        }
    }
}

/// What happened, for interaction hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventAction {
    Activated,
    SdkDetectionFailure,
    Deactivated,
    Restart,
    HotReload,
    OpenObservatory,
    OpenTimeline,
    OpenDevTools,
    Shown,
    Clicked,
    Dismissed,
}

impl EventAction {
    pub const ALL: [EventAction; 11] = [
        EventAction::Activated,
        EventAction::SdkDetectionFailure,
        EventAction::Deactivated,
        EventAction::Restart,
        EventAction::HotReload,
        EventAction::OpenObservatory,
        EventAction::OpenTimeline,
        EventAction::OpenDevTools,
        EventAction::Shown,
        EventAction::Clicked,
        EventAction::Dismissed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Activated => "activated",
            EventAction::SdkDetectionFailure => "sdkDetectionFailure",
            EventAction::Deactivated => "deactivated",
            EventAction::Restart => "restart",
            EventAction::HotReload => "hotReload",
            EventAction::OpenObservatory => "openObservatory",
            EventAction::OpenTimeline => "openTimeline",
            EventAction::OpenDevTools => "openDevTools",
            EventAction::Shown => "shown",
            EventAction::Clicked => "clicked",
            EventAction::Dismissed => "dismissed",
        }
    }
}

/// What was measured, for timing hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimingVariable {
    Startup,
    FirstAnalysis,
    SessionDuration,
}

impl TimingVariable {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimingVariable::Startup => "startup",
            TimingVariable::FirstAnalysis => "firstAnalysis",
            TimingVariable::SessionDuration => "sessionDuration",
        }
    }
}

/// Forces the collector to open or close a usage session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionControl {
    Start,
    End,
}

impl SessionControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionControl::Start => "start",
            SessionControl::End => "end",
        }
    }
}

/// Interaction hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHit {
    pub category: Category,
    pub action: EventAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_control: Option<SessionControl>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<Dimension, String>,
}

impl EventHit {
    /// Attach a caller-supplied dimension. Custom values override session context.
    pub fn with_custom(mut self, dimension: Dimension, value: impl Into<String>) -> Self {
        self.custom.insert(dimension, value.into());
        self
    }
}

/// Timing hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingHit {
    pub category: Category,
    pub variable: TimingVariable,
    /// Whole milliseconds. Negative and non-finite inputs are kept as given.
    pub duration_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Exception hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionHit {
    pub description: String,
    pub fatal: bool,
}

/// One telemetry payload. The variant is the hit type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "hit_type", rename_all = "lowercase")]
pub enum Hit {
    Event(EventHit),
    Timing(TimingHit),
    Exception(ExceptionHit),
}

impl Hit {
    /// Build an interaction hit, stamping session markers for extension
    /// activation and deactivation.
    pub fn event(category: Category, action: EventAction) -> Self {
        let session_control = match (category, action) {
            (Category::Extension, EventAction::Activated) => Some(SessionControl::Start),
            (Category::Extension, EventAction::Deactivated) => Some(SessionControl::End),
            _ => None,
        };

        Hit::Event(EventHit {
            category,
            action,
            session_control,
            custom: BTreeMap::new(),
        })
    }

    /// Build an interaction hit carrying custom dimensions.
    pub fn event_with(
        category: Category,
        action: EventAction,
        custom: impl IntoIterator<Item = (Dimension, String)>,
    ) -> Self {
        let mut hit = Self::event(category, action);
        if let Hit::Event(event) = &mut hit {
            event.custom.extend(custom);
        }
        hit
    }

    pub fn timing(
        category: Category,
        variable: TimingVariable,
        time_in_ms: f64,
        label: Option<String>,
    ) -> Self {
        Hit::Timing(TimingHit {
            category,
            variable,
            duration_ms: time_in_ms.round(),
            label,
        })
    }

    pub fn exception(description: &str, fatal: bool) -> Self {
        Hit::Exception(ExceptionHit {
            description: description.trim().to_string(),
            fatal,
        })
    }

    /// Wire tag for this hit type
    pub fn hit_type(&self) -> &'static str {
        match self {
            Hit::Event(_) => "event",
            Hit::Timing(_) => "timing",
            Hit::Exception(_) => "exception",
        }
    }

    pub fn session_control(&self) -> Option<SessionControl> {
        match self {
            Hit::Event(event) => event.session_control,
            _ => None,
        }
    }

    /// Remove and return the caller-supplied dimensions.
    pub(crate) fn take_custom(&mut self) -> BTreeMap<Dimension, String> {
        match self {
            Hit::Event(event) => std::mem::take(&mut event.custom),
            _ => BTreeMap::new(),
        }
    }
}
