//! # editor-analytics
//!
//! Usage analytics client for editor integrations.
//!
//! ## Guarantees
//!
//! - **Never blocks**: every `log_*` call returns immediately; delivery runs
//!   on a detached task
//! - **Never fails the host**: transport and pipeline errors go to the
//!   diagnostic logger, only the shutdown flush reports completion
//! - **Opt-out respected**: consent settings, the host editor's telemetry
//!   switch and test runs are checked before every hit
//! - **Self-disabling**: the first network failure turns analytics off for
//!   the rest of the process
//! - **Anonymous**: IP anonymization is always requested and the client id is
//!   a hashed installation id
//!
//! ## What We Collect
//!
//! - Extension, analyzer and debugger lifecycle events
//! - Startup, first-analysis and debug session timings
//! - Error descriptions
//! - Platform, tool and host versions, feature toggle states
//!
//! ## Opt-Out
//!
//! ```bash
//! # Via environment variable
//! export EDITOR_ANALYTICS_DISABLED=1
//!
//! # Via config file (~/.editor-analytics/config.toml)
//! [analytics]
//! disable_analytics = true
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod gate;
pub mod machine_id;
pub mod providers;
pub mod remote;
pub mod transport;
pub mod wire;

pub use client::{Analytics, Collaborators, ShutdownFlush};
pub use config::{load_analytics_config, AnalyticsConfig, LiveSettings};
pub use context::{DebuggerScope, Dimension, FormatterSetting, LateVersions, SessionContext, ToolInfo};
pub use error::AnalyticsError;
pub use events::{Category, EventAction, Hit, SessionControl, TimingVariable};
pub use gate::{analytics_permitted, FailureLatch};
pub use machine_id::SystemEnvironment;
pub use providers::{HostEnvironment, Logger, Resource, Settings, TracingLogger, WorkspaceContext};
pub use transport::{Endpoint, HitResponse, HitSender, HttpSender, TransportError};

/// Re-export common types
pub type Result<T> = anyhow::Result<T>;
