//! Capability reachability tracking
//!
//! Every capability call outcome is recorded here. A capability counts as
//! reachable until a call ends in a timeout or transport failure; any answer
//! from the service (including a refusal) marks it reachable again.

use crate::error::{Capability, CapabilityError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Boolean-per-capability status for readiness checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityHealth {
    /// Text generation reachable
    pub text_generation: bool,
    /// Vision scoring reachable
    pub vision_scoring: bool,
    /// Image generation reachable
    pub image_generation: bool,
}

impl CapabilityHealth {
    /// All capabilities reachable
    #[inline]
    #[must_use]
    pub fn all_reachable(&self) -> bool {
        self.text_generation && self.vision_scoring && self.image_generation
    }
}

#[derive(Debug, Clone)]
struct Observation {
    reachable: bool,
    last_error: Option<String>,
    observed_at: DateTime<Utc>,
}

/// Shared reachability monitor
#[derive(Debug, Clone, Default)]
pub struct HealthMonitor {
    observations: Arc<DashMap<Capability, Observation>>,
}

impl HealthMonitor {
    /// Create monitor with every capability presumed reachable
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful exchange
    pub fn record_success(&self, capability: Capability) {
        self.observations.insert(
            capability,
            Observation {
                reachable: true,
                last_error: None,
                observed_at: Utc::now(),
            },
        );
    }

    /// Record a failed attempt
    pub fn record_failure(&self, capability: Capability, error: &CapabilityError) {
        self.observations.insert(
            capability,
            Observation {
                reachable: !error.is_transient(),
                last_error: Some(error.to_string()),
                observed_at: Utc::now(),
            },
        );
    }

    /// Whether the capability is currently considered reachable
    #[must_use]
    pub fn is_reachable(&self, capability: Capability) -> bool {
        self.observations
            .get(&capability)
            .map_or(true, |obs| obs.reachable)
    }

    /// Last recorded error and when it was seen
    #[must_use]
    pub fn last_error(&self, capability: Capability) -> Option<(String, DateTime<Utc>)> {
        self.observations.get(&capability).and_then(|obs| {
            obs.last_error
                .as_ref()
                .map(|error| (error.clone(), obs.observed_at))
        })
    }

    /// Snapshot for readiness reporting
    #[must_use]
    pub fn report(&self) -> CapabilityHealth {
        CapabilityHealth {
            text_generation: self.is_reachable(Capability::TextGeneration),
            vision_scoring: self.is_reachable(Capability::VisionScoring),
            image_generation: self.is_reachable(Capability::ImageGeneration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachable_until_transient_failure() {
        let health = HealthMonitor::new();
        assert!(health.report().all_reachable());

        health.record_failure(Capability::VisionScoring, &CapabilityError::Timeout);
        let report = health.report();
        assert!(!report.vision_scoring);
        assert!(report.text_generation);
        assert!(health.last_error(Capability::VisionScoring).is_some());

        health.record_success(Capability::VisionScoring);
        assert!(health.report().vision_scoring);
        assert!(health.last_error(Capability::VisionScoring).is_none());
    }

    #[test]
    fn refusal_keeps_capability_reachable() {
        let health = HealthMonitor::new();
        health.record_failure(
            Capability::ImageGeneration,
            &CapabilityError::ContentPolicy("blocked".into()),
        );
        assert!(health.is_reachable(Capability::ImageGeneration));
    }

    #[test]
    fn clones_share_state() {
        let health = HealthMonitor::new();
        let clone = health.clone();
        clone.record_failure(
            Capability::TextGeneration,
            &CapabilityError::Transport("reset".into()),
        );
        assert!(!health.report().text_generation);
    }
}
