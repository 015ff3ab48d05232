//! Send eligibility and the session disable latch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::providers::{HostEnvironment, Settings};

/// Set on the first transport failure and never cleared for the life of the process
#[derive(Debug, Clone, Default)]
pub struct FailureLatch(Arc<AtomicBool>);

impl FailureLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Trip the latch. Returns true if this call was the one that tripped it.
    pub fn trip(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

/// Whether the user's consent settings allow analytics.
///
/// `allow_legacy` is the old opt-in flag (true unless the user opted out with
/// it). `disable_current` is the current opt-out flag.
pub fn analytics_permitted(allow_legacy: bool, disable_current: bool) -> bool {
    allow_legacy && !disable_current
}

/// Per-call send predicate
pub struct EligibilityGate<'a> {
    pub latch: &'a FailureLatch,
    pub machine_id: Option<&'a str>,
    pub environment: &'a dyn HostEnvironment,
    pub settings: &'a dyn Settings,
}

impl EligibilityGate<'_> {
    /// Evaluated fresh on every send; settings may change between calls.
    pub fn can_send(&self) -> bool {
        if self.latch.is_tripped() {
            return false;
        }

        if self.machine_id.map_or(true, str::is_empty) {
            return false;
        }

        analytics_permitted(self.settings.allow_analytics(), self.settings.disable_analytics())
            && self.environment.telemetry_enabled()
            && !self.environment.is_test_run()
    }
}
