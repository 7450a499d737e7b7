//! Alert state machine with adaptive cooldown.
//!
//! The engine has two states, Normal and Overheating. Each reading at or above
//! the threshold may emit an alert, but only once the current cooldown has
//! elapsed since the previous alert. Every emitted alert doubles the cooldown
//! up to a cap. Leaving Overheating resets the cooldown to its base and
//! forgets the last alert time, so the next episode alerts immediately.
//!
//! ```text
//!            temp >= threshold
//!   Normal ─────────────────────▶ Overheating ──┐ alert when
//!     ▲                               │         │ now - last >= cooldown
//!     │  temp < threshold             │◀────────┘ (cooldown doubles)
//!     └───────────────────────────────┘
//!        (after `reset_dwell` readings)
//! ```
//!
//! Absent readings never move the machine in either direction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Configuration;

/// Upper bound for the doubling cooldown.
pub const DEFAULT_MAX_COOLDOWN: Duration = Duration::from_secs(320);

// ============================================================================
// Policy
// ============================================================================

/// Tunables for the alert engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Cooldown after entering an episode, before any alert was sent
    pub base_cooldown: Duration,

    /// Cap for the doubling cooldown
    pub max_cooldown: Duration,

    /// Consecutive below-threshold readings needed to leave Overheating.
    ///
    /// `1` resets on the first dip. Larger values damp cooldown flapping
    /// around the threshold.
    pub reset_dwell: u32,
}

impl AlertPolicy {
    /// Policy with the given base cooldown, default cap and immediate reset.
    pub fn new(base_cooldown: Duration) -> Self {
        Self {
            base_cooldown,
            max_cooldown: DEFAULT_MAX_COOLDOWN.max(base_cooldown),
            reset_dwell: 1,
        }
    }

    /// Policy derived from the configured base cooldown.
    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.base_cooldown())
    }

    #[must_use]
    pub fn with_reset_dwell(mut self, readings: u32) -> Self {
        self.reset_dwell = readings.max(1);
        self
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::from_config(&Configuration::default())
    }
}

// ============================================================================
// State
// ============================================================================

/// Alert progression, persisted for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    /// Minimum time before the next alert may fire
    pub cooldown: Duration,

    /// When the last alert fired. `None` means never (or reset by recovery).
    pub last_alert: Option<DateTime<Utc>>,

    /// Whether the engine is in the Overheating state
    pub overheating: bool,

    /// Total alerts emitted since start
    pub alerts_sent: u64,

    /// Consecutive below-threshold readings while overheating
    #[serde(skip)]
    below_streak: u32,
}

impl AlertState {
    fn initial(policy: &AlertPolicy) -> Self {
        Self {
            cooldown: policy.base_cooldown,
            last_alert: None,
            overheating: false,
            alerts_sent: 0,
            below_streak: 0,
        }
    }

    /// Time left before another alert is allowed, zero if one may fire now.
    pub fn remaining_cooldown(&self, now: DateTime<Utc>) -> Duration {
        match self.last_alert {
            None => Duration::ZERO,
            Some(last) => {
                let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
                self.cooldown.saturating_sub(elapsed)
            }
        }
    }
}

/// What the engine decided for one reading.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertDecision {
    /// No temperature available; state unchanged
    NoData,

    /// Below threshold and not overheating
    Normal,

    /// Emit an alert now
    Alert {
        temperature_c: f32,
        threshold_c: f32,
        /// True on the first alert of a new episode
        new_episode: bool,
        /// Cooldown that now applies before the next alert
        next_cooldown: Duration,
    },

    /// Overheating, but still inside the cooldown window
    Suppressed { remaining: Duration },

    /// Below threshold while overheating, dwell not yet satisfied
    Cooling { below_streak: u32 },

    /// Left Overheating; cooldown reset to base
    Recovered,
}

// ============================================================================
// Engine
// ============================================================================

/// Pure alert state machine. Owned by exactly one execution context.
#[derive(Debug, Clone)]
pub struct NotificationEngine {
    policy: AlertPolicy,
    state: AlertState,
}

impl NotificationEngine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            state: AlertState::initial(&policy),
            policy,
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Applies a new policy.
    ///
    /// Outside an episode the cooldown is reset to the new base. During an
    /// episode the current progression continues and the new base takes
    /// effect at the next recovery.
    pub fn reconfigure(&mut self, policy: AlertPolicy) {
        self.policy = policy;
        if !self.state.overheating {
            self.state.cooldown = policy.base_cooldown;
        } else {
            self.state.cooldown = self.state.cooldown.min(policy.max_cooldown);
        }
    }

    /// Feeds one reading through the state machine.
    pub fn observe(
        &mut self,
        temperature_c: Option<f32>,
        threshold_c: f32,
        now: DateTime<Utc>,
    ) -> AlertDecision {
        let Some(temperature_c) = temperature_c else {
            return AlertDecision::NoData;
        };

        if temperature_c >= threshold_c {
            self.on_hot(temperature_c, threshold_c, now)
        } else {
            self.on_cool()
        }
    }

    fn on_hot(&mut self, temperature_c: f32, threshold_c: f32, now: DateTime<Utc>) -> AlertDecision {
        let new_episode = !self.state.overheating;
        self.state.overheating = true;
        self.state.below_streak = 0;

        let remaining = self.state.remaining_cooldown(now);
        if !remaining.is_zero() {
            return AlertDecision::Suppressed { remaining };
        }

        self.state.last_alert = Some(now);
        self.state.cooldown = self
            .state
            .cooldown
            .saturating_mul(2)
            .min(self.policy.max_cooldown);
        self.state.alerts_sent = self.state.alerts_sent.saturating_add(1);

        debug!(
            temperature_c,
            threshold_c,
            next_cooldown_secs = self.state.cooldown.as_secs(),
            "Alert emitted"
        );

        AlertDecision::Alert {
            temperature_c,
            threshold_c,
            new_episode,
            next_cooldown: self.state.cooldown,
        }
    }

    fn on_cool(&mut self) -> AlertDecision {
        if !self.state.overheating {
            return AlertDecision::Normal;
        }

        self.state.below_streak = self.state.below_streak.saturating_add(1);
        if self.state.below_streak < self.policy.reset_dwell {
            return AlertDecision::Cooling {
                below_streak: self.state.below_streak,
            };
        }

        let alerts_sent = self.state.alerts_sent;
        self.state = AlertState::initial(&self.policy);
        self.state.alerts_sent = alerts_sent;
        AlertDecision::Recovered
    }
}

impl Default for NotificationEngine {
    fn default() -> Self {
        Self::new(AlertPolicy::default())
    }
}
