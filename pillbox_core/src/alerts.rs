//! Alert scheduler with per-dose re-alert suppression.
//!
//! ## State Transitions
//!
//! ```text
//! Pending -> Alerting -> (Acked | SuppressedCooldown) -> Pending
//! ```
//!
//! A dose alerts when its `HH:MM` equals the current wall-clock minute and it
//! has not been taken. Once raised, its id stays in the suppression set until
//! the cooldown expires, so repeated ticks within the same minute never raise
//! it twice. After expiry it can alert again only if the clock still matches.

use crate::{DoseInstance, TimeOfDay};
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;

/// Observable alert state of one dose instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertState {
    /// Not yet alerted, or eligible again after cooldown
    Pending,
    /// Currently shown on the alert surface
    Alerting,
    /// Taken; never alerts again
    Acked,
    /// Alerted recently and dismissed or still unanswered
    SuppressedCooldown,
}

/// Polling alert checker
///
/// Holds the suppression set: instance id -> instant the entry expires.
#[derive(Debug, Clone)]
pub struct AlertScheduler {
    cooldown: Duration,
    suppressed: HashMap<String, NaiveDateTime>,
}

impl AlertScheduler {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            suppressed: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Scan `schedule` at `now` and return the doses that must alert
    ///
    /// Every returned dose is added to the suppression set.
    pub fn check(&mut self, schedule: &[DoseInstance], now: NaiveDateTime) -> Vec<DoseInstance> {
        self.expire(now);

        let minute = TimeOfDay::of(&now).to_string();
        let mut due = Vec::new();

        for dose in schedule {
            if dose.is_taken || dose.time_string != minute {
                continue;
            }
            if self.suppressed.contains_key(&dose.instance_id) {
                tracing::trace!("Dose {} suppressed", dose.instance_id);
                continue;
            }

            let expires_at = now
                .checked_add_signed(self.cooldown)
                .unwrap_or(NaiveDateTime::MAX);
            self.suppressed.insert(dose.instance_id.clone(), expires_at);
            tracing::debug!(
                "Dose {} due at {}, suppressed until {}",
                dose.instance_id,
                minute,
                expires_at
            );
            due.push(dose.clone());
        }

        due
    }

    /// Drop suppression entries whose cooldown has elapsed
    ///
    /// Removing an id that is already gone is a no-op.
    pub fn expire(&mut self, now: NaiveDateTime) {
        self.suppressed.retain(|id, expires_at| {
            let keep = *expires_at > now;
            if !keep {
                tracing::trace!("Suppression of {} expired", id);
            }
            keep
        });
    }

    pub fn is_suppressed(&self, instance_id: &str, now: NaiveDateTime) -> bool {
        self.suppressed
            .get(instance_id)
            .map(|expires_at| *expires_at > now)
            .unwrap_or(false)
    }

    pub fn suppressed_len(&self) -> usize {
        self.suppressed.len()
    }

    /// Alert state of `dose`, given the id currently on the alert surface
    pub fn state_of(
        &self,
        dose: &DoseInstance,
        active_alert: Option<&str>,
        now: NaiveDateTime,
    ) -> AlertState {
        if dose.is_taken {
            AlertState::Acked
        } else if active_alert == Some(dose.instance_id.as_str()) {
            AlertState::Alerting
        } else if self.is_suppressed(&dose.instance_id, now) {
            AlertState::SuppressedCooldown
        } else {
            AlertState::Pending
        }
    }
}

impl Default for AlertScheduler {
    fn default() -> Self {
        Self::new(Duration::minutes(2))
    }
}
