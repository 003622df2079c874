use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::clock::Clock;
use super::domain::{ReplacementId, UserId};

/// Dials governing how aggressively repeated withdrawals are throttled.
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    /// Wait imposed after a throttled attempt before a retry is accepted.
    pub retry_cooldown: Duration,
    /// Minimum spacing between two successful withdrawals by the same actor.
    pub min_spacing: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            retry_cooldown: Duration::from_secs(3),
            min_spacing: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct KeyRecord {
    last_denied: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct LimiterState {
    per_key: HashMap<(UserId, ReplacementId), KeyRecord>,
    per_actor_success: HashMap<UserId, DateTime<Utc>>,
}

/// Keyed throttle guarding repeated withdraw attempts.
///
/// State is (applicant x replacement) -> last attempt timestamps plus the
/// actor's last successful withdrawal across all requests. Every denial
/// restamps the retry window.
pub struct WithdrawalLimiter {
    policy: ThrottlePolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl WithdrawalLimiter {
    pub fn new(policy: ThrottlePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn policy(&self) -> ThrottlePolicy {
        self.policy
    }

    /// Allows the withdrawal and records it, or returns the remaining wait.
    pub fn acquire(
        &self,
        applicant: &UserId,
        replacement: &ReplacementId,
    ) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut state = self
            .state
            .lock()
            .expect("withdrawal limiter mutex poisoned");
        let LimiterState {
            per_key,
            per_actor_success,
        } = &mut *state;

        let key = (applicant.clone(), replacement.clone());
        let record = per_key.entry(key).or_default();

        let mut wait = Duration::ZERO;
        if let Some(denied_at) = record.last_denied {
            if let Some(pending) = remaining(denied_at, self.policy.retry_cooldown, now) {
                wait = wait.max(pending);
            }
        }
        if let Some(success_at) = record.last_success {
            if let Some(pending) = remaining(success_at, self.policy.retry_cooldown, now) {
                wait = wait.max(pending);
            }
        }
        if let Some(actor_success_at) = per_actor_success.get(applicant) {
            if let Some(pending) = remaining(*actor_success_at, self.policy.min_spacing, now) {
                wait = wait.max(pending);
            }
        }

        if wait > Duration::ZERO {
            record.last_denied = Some(now);
            return Err(wait);
        }

        record.last_success = Some(now);
        record.last_denied = None;
        per_actor_success.insert(applicant.clone(), now);
        Ok(())
    }
}

fn remaining(since: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> Option<Duration> {
    let elapsed = now
        .signed_duration_since(since)
        .to_std()
        .unwrap_or_default();
    if elapsed >= window {
        None
    } else {
        Some(window - elapsed)
    }
}
