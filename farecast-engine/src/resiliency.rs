use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use farecast_core::{Clock, FailureKind, UpstreamError};
use farecast_store::app_config::BreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Cooling down, serving fallback
    HalfOpen, // One trial request is probing the upstream
}

/// Exponential backoff curve for one failure class
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base_minutes: f64,
    pub cap_minutes: f64,
    pub factor: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerPolicy {
    pub server_error: Backoff,
    pub rate_limit: Backoff,
    pub max_exponent: u32,
    /// How long a half-open trial may run before another caller may probe
    pub trial_lease: Duration,
}

impl BreakerPolicy {
    /// Cooldown after the `failures`-th consecutive failure of `kind`
    pub fn backoff(&self, kind: FailureKind, failures: u32) -> Duration {
        let curve = match kind {
            FailureKind::RateLimit => self.rate_limit,
            FailureKind::ServerError | FailureKind::Unknown => self.server_error,
        };
        let exponent = failures.saturating_sub(1).min(self.max_exponent);
        let minutes = (curve.base_minutes * curve.factor.powi(exponent as i32)).min(curve.cap_minutes);
        minutes_to_duration(minutes)
    }

    /// Longest Retry-After hint that is honored
    pub fn max_retry_after(&self) -> Duration {
        minutes_to_duration(self.rate_limit.cap_minutes)
    }
}

fn minutes_to_duration(minutes: f64) -> Duration {
    Duration::try_milliseconds((minutes * 60_000.0).round() as i64).unwrap_or(Duration::MAX)
}

/// `at + by`, saturating at the latest representable instant
fn saturating_add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::from(&BreakerConfig::default())
    }
}

impl From<&BreakerConfig> for BreakerPolicy {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            server_error: Backoff {
                base_minutes: config.server_error_base_minutes,
                cap_minutes: config.server_error_cap_minutes,
                factor: config.server_error_factor,
            },
            rate_limit: Backoff {
                base_minutes: config.rate_limit_base_minutes,
                cap_minutes: config.rate_limit_cap_minutes,
                factor: config.rate_limit_factor,
            },
            max_exponent: config.max_exponent,
            trial_lease: i64::try_from(config.half_open_trial_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureState {
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub circuit_state: CircuitState,
    pub last_failure_kind: Option<FailureKind>,
    pub trial_started_at: Option<DateTime<Utc>>,
}

impl Default for FailureState {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_failure_at: None,
            cooldown_until: None,
            circuit_state: CircuitState::Closed,
            last_failure_kind: None,
            trial_started_at: None,
        }
    }
}

/// Point-in-time view of the breaker for health reporting
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BreakerSnapshot {
    pub configured: bool,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_failure_kind: Option<FailureKind>,
}

/// Circuit breaker guarding the live upstream.
///
/// One instance per upstream, shared by every request through an `Arc`.
/// All reads and writes happen under a single mutex so that concurrent
/// branches of the same fan-out never lose a failure.
pub struct FailureTracker {
    state: Mutex<FailureState>,
    policy: BreakerPolicy,
    configured: bool,
    clock: Arc<dyn Clock>,
}

impl FailureTracker {
    pub fn new(policy: BreakerPolicy, configured: bool, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(FailureState::default()),
            policy,
            configured,
            clock,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// True when the caller must not contact the upstream.
    ///
    /// Once a cooldown has elapsed the first caller is admitted as the
    /// half-open trial; everyone else keeps falling back until the trial
    /// resolves or its lease runs out.
    pub async fn should_use_fallback(&self) -> bool {
        if !self.configured {
            return true;
        }

        let now = self.clock.now();
        let mut state = self.state.lock().await;

        if state.circuit_state == CircuitState::Closed && state.consecutive_failures == 0 {
            return false;
        }
        if state.cooldown_until.is_some_and(|until| now < until) {
            return true;
        }

        if state.circuit_state == CircuitState::HalfOpen {
            let trial_running = state
                .trial_started_at
                .is_some_and(|started| now < saturating_add(started, self.policy.trial_lease));
            if trial_running {
                return true;
            }
            tracing::warn!("Half-open trial lease expired, admitting a new trial");
        } else {
            tracing::info!(
                failures = state.consecutive_failures,
                "Upstream cooldown elapsed, moving to Half-Open"
            );
        }

        state.circuit_state = CircuitState::HalfOpen;
        state.trial_started_at = Some(now);
        false
    }

    /// Count one failure and push the cooldown out. Returns the new
    /// `cooldown_until`.
    pub async fn register_failure(&self, kind: FailureKind) -> DateTime<Utc> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        Self::apply_failure(&mut state, &self.policy, kind, now)
    }

    /// Feed a classified upstream error into the breaker. Credential errors
    /// are ignored; a rate limit's Retry-After hint extends the cooldown.
    pub async fn record_upstream_error(&self, error: &UpstreamError) -> Option<DateTime<Utc>> {
        let kind = error.failure_kind()?;
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let mut until = Self::apply_failure(&mut state, &self.policy, kind, now);

        if let Some(retry_after) = error.retry_after() {
            let cap = self.policy.max_retry_after();
            let wait = Duration::from_std(retry_after).map_or(cap, |wait| wait.min(cap));
            let hinted = saturating_add(now, wait);
            if hinted > until {
                tracing::info!(retry_after_secs = retry_after.as_secs(), "Honoring upstream Retry-After");
                until = hinted;
                state.cooldown_until = Some(hinted);
            }
        }
        Some(until)
    }

    pub async fn register_success(&self) {
        let mut state = self.state.lock().await;
        if state.circuit_state != CircuitState::Closed {
            tracing::info!(
                failures = state.consecutive_failures,
                "Upstream recovered, breaker Closed"
            );
        }
        Self::close(&mut state);
    }

    /// Close the breaker regardless of its state
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        tracing::warn!(previous = ?state.circuit_state, "Breaker manually reset");
        Self::close(&mut state);
    }

    pub async fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock().await;
        BreakerSnapshot {
            configured: self.configured,
            state: state.circuit_state,
            consecutive_failures: state.consecutive_failures,
            last_failure_at: state.last_failure_at,
            cooldown_until: state.cooldown_until,
            last_failure_kind: state.last_failure_kind,
        }
    }

    fn apply_failure(
        state: &mut FailureState,
        policy: &BreakerPolicy,
        kind: FailureKind,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure_at = Some(now);
        state.last_failure_kind = Some(kind);
        state.trial_started_at = None;

        let candidate = saturating_add(now, policy.backoff(kind, state.consecutive_failures));
        let until = match state.cooldown_until {
            Some(previous) if previous > candidate => previous,
            _ => candidate,
        };
        state.cooldown_until = Some(until);
        state.circuit_state = CircuitState::Open;

        tracing::error!(
            kind = ?kind,
            failures = state.consecutive_failures,
            cooldown_until = %until,
            "Upstream breaker tripped to Open"
        );
        until
    }

    fn close(state: &mut FailureState) {
        state.consecutive_failures = 0;
        state.cooldown_until = None;
        state.trial_started_at = None;
        state.circuit_state = CircuitState::Closed;
    }
}
