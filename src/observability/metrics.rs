//! Thread-safe metrics collection
//!
//! Atomic counters for session outcomes and dispatches, plus mutex-protected
//! per-profile statistics and session durations.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MAX_DURATION_SAMPLES: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

#[derive(Debug, Default, Clone)]
struct ProfileDispatchStats {
    dispatches: u64,
    failures: u64,
    timeouts: u64,
    unverified: u64,
    durations_ms: Vec<u64>,
}

pub struct MetricsCollector {
    sessions_started: AtomicU64,
    sessions_completed: AtomicU64,
    sessions_aborted: AtomicU64,
    direct_answers: AtomicU64,
    clarifications: AtomicU64,
    delegations: AtomicU64,
    retries: AtomicU64,
    verification_failures: AtomicU64,
    handoffs_refused: AtomicU64,
    max_depth_reached: AtomicU64,
    started_at: AtomicU64,

    session_durations: Mutex<Vec<u64>>,
    profile_stats: Mutex<HashMap<String, ProfileDispatchStats>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            sessions_aborted: AtomicU64::new(0),
            direct_answers: AtomicU64::new(0),
            clarifications: AtomicU64::new(0),
            delegations: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            verification_failures: AtomicU64::new(0),
            handoffs_refused: AtomicU64::new(0),
            max_depth_reached: AtomicU64::new(0),
            started_at: AtomicU64::new(current_timestamp()),
            session_durations: Mutex::new(Vec::new()),
            profile_stats: Mutex::new(HashMap::new()),
        }
    }

    pub fn session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_completed(&self, duration: Duration) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
        self.record_session_duration(duration);
    }

    pub fn session_aborted(&self, duration: Duration) {
        self.sessions_aborted.fetch_add(1, Ordering::Relaxed);
        self.record_session_duration(duration);
    }

    pub fn direct_answer(&self) {
        self.direct_answers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clarification_requested(&self) {
        self.clarifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a delegation and track the deepest session seen
    pub fn delegation_started(&self, profile: &str, depth: u32) {
        self.delegations.fetch_add(1, Ordering::Relaxed);
        self.max_depth_reached
            .fetch_max(u64::from(depth), Ordering::Relaxed);
        self.with_profile(profile, |stats| stats.dispatches += 1);
    }

    pub fn dispatch_finished(&self, profile: &str, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.with_profile(profile, |stats| {
            stats.durations_ms.push(millis);
            if stats.durations_ms.len() > MAX_DURATION_SAMPLES {
                stats.durations_ms.remove(0);
            }
        });
    }

    pub fn dispatch_failed(&self, profile: &str, timed_out: bool) {
        self.with_profile(profile, |stats| {
            stats.failures += 1;
            if timed_out {
                stats.timeouts += 1;
            }
        });
    }

    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn verification_failed(&self, profile: &str) {
        self.verification_failures.fetch_add(1, Ordering::Relaxed);
        self.with_profile(profile, |stats| stats.unverified += 1);
    }

    pub fn handoff_refused(&self) {
        self.handoffs_refused.fetch_add(1, Ordering::Relaxed);
    }

    fn with_profile<F: FnOnce(&mut ProfileDispatchStats)>(&self, profile: &str, update: F) {
        if let Ok(mut stats) = self.profile_stats.lock() {
            update(stats.entry(profile.to_string()).or_default());
        }
    }

    fn record_session_duration(&self, duration: Duration) {
        if let Ok(mut durations) = self.session_durations.lock() {
            durations.push(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX));
            if durations.len() > MAX_DURATION_SAMPLES {
                durations.remove(0);
            }
        }
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.sessions_started,
            &self.sessions_completed,
            &self.sessions_aborted,
            &self.direct_answers,
            &self.clarifications,
            &self.delegations,
            &self.retries,
            &self.verification_failures,
            &self.handoffs_refused,
            &self.max_depth_reached,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.started_at.store(current_timestamp(), Ordering::Relaxed);
        if let Ok(mut durations) = self.session_durations.lock() {
            durations.clear();
        }
        if let Ok(mut stats) = self.profile_stats.lock() {
            stats.clear();
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (avg, p50, p95) = self
            .session_durations
            .lock()
            .map(|d| duration_statistics(&d))
            .unwrap_or((0.0, 0.0, 0.0));

        let profiles: HashMap<String, ProfileStatsSnapshot> = self
            .profile_stats
            .lock()
            .map(|stats| {
                stats
                    .iter()
                    .map(|(name, s)| (name.clone(), ProfileStatsSnapshot::from_stats(s)))
                    .collect()
            })
            .unwrap_or_default();

        let now = current_timestamp();
        MetricsSnapshot {
            timestamp: now,
            uptime_seconds: now.saturating_sub(self.started_at.load(Ordering::Relaxed)),
            sessions: SessionMetrics {
                started: self.sessions_started.load(Ordering::Relaxed),
                completed: self.sessions_completed.load(Ordering::Relaxed),
                aborted: self.sessions_aborted.load(Ordering::Relaxed),
                direct_answers: self.direct_answers.load(Ordering::Relaxed),
                clarifications: self.clarifications.load(Ordering::Relaxed),
                avg_duration_ms: avg,
                p50_duration_ms: p50,
                p95_duration_ms: p95,
            },
            delegation: DelegationMetrics {
                delegations: self.delegations.load(Ordering::Relaxed),
                retries: self.retries.load(Ordering::Relaxed),
                verification_failures: self.verification_failures.load(Ordering::Relaxed),
                handoffs_refused: self.handoffs_refused.load(Ordering::Relaxed),
                max_depth_reached: self.max_depth_reached.load(Ordering::Relaxed),
                profiles,
            },
        }
    }
}

/// Point-in-time view of all metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub sessions: SessionMetrics,
    pub delegation: DelegationMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionMetrics {
    pub started: u64,
    pub completed: u64,
    pub aborted: u64,
    pub direct_answers: u64,
    pub clarifications: u64,
    pub avg_duration_ms: f64,
    pub p50_duration_ms: f64,
    pub p95_duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelegationMetrics {
    pub delegations: u64,
    pub retries: u64,
    pub verification_failures: u64,
    pub handoffs_refused: u64,
    pub max_depth_reached: u64,
    pub profiles: HashMap<String, ProfileStatsSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileStatsSnapshot {
    pub dispatches: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub unverified: u64,
    pub avg_dispatch_ms: f64,
}

impl ProfileStatsSnapshot {
    fn from_stats(stats: &ProfileDispatchStats) -> Self {
        let avg = if stats.durations_ms.is_empty() {
            0.0
        } else {
            stats.durations_ms.iter().sum::<u64>() as f64 / stats.durations_ms.len() as f64
        };
        Self {
            dispatches: stats.dispatches,
            failures: stats.failures,
            timeouts: stats.timeouts,
            unverified: stats.unverified,
            avg_dispatch_ms: avg,
        }
    }
}

fn duration_statistics(samples: &[u64]) -> (f64, f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
    (avg, percentile(&sorted, 50.0), percentile(&sorted, 95.0))
}

fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)] as f64
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
