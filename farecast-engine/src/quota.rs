use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use farecast_core::Clock;
use farecast_store::app_config::QuotaConfig;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct QuotaUsage {
    pub last_minute: usize,
    pub last_hour: usize,
    pub per_minute: usize,
    pub per_hour: usize,
}

/// Local sliding-window budget of upstream calls, so we stop short of the
/// provider's own rate limit instead of tripping it.
pub struct RequestQuota {
    per_minute: usize,
    per_hour: usize,
    calls: Mutex<VecDeque<DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
}

impl RequestQuota {
    pub fn new(config: &QuotaConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            per_minute: config.per_minute,
            per_hour: config.per_hour,
            calls: Mutex::new(VecDeque::new()),
            clock,
        }
    }

    /// Reserve up to `wanted` calls and return how many were granted
    pub async fn acquire_up_to(&self, wanted: usize) -> usize {
        let now = self.clock.now();
        let mut calls = self.calls.lock().await;
        prune(&mut calls, now);

        let minute = count_since(&calls, now - Duration::minutes(1));
        let granted = wanted
            .min(self.per_minute.saturating_sub(minute))
            .min(self.per_hour.saturating_sub(calls.len()));

        for _ in 0..granted {
            calls.push_back(now);
        }
        if granted < wanted {
            tracing::warn!(wanted, granted, "Local upstream quota exhausted");
        }
        granted
    }

    pub async fn usage(&self) -> QuotaUsage {
        let now = self.clock.now();
        let mut calls = self.calls.lock().await;
        prune(&mut calls, now);
        QuotaUsage {
            last_minute: count_since(&calls, now - Duration::minutes(1)),
            last_hour: calls.len(),
            per_minute: self.per_minute,
            per_hour: self.per_hour,
        }
    }
}

fn prune(calls: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
    let horizon = now - Duration::hours(1);
    while calls.front().is_some_and(|at| *at <= horizon) {
        calls.pop_front();
    }
}

fn count_since(calls: &VecDeque<DateTime<Utc>>, since: DateTime<Utc>) -> usize {
    calls.iter().rev().take_while(|at| **at > since).count()
}
