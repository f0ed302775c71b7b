//! Background maintenance loop
//!
//! Periodically sweeps expired sessions and conversations, enforces the
//! session capacity ceiling, prunes idle rate-limiter windows, and logs
//! memory statistics. Spawned once at startup and runs for the lifetime
//! of the process.

use crate::limiter::RateLimiter;
use crate::store::SessionStore;
use std::sync::Arc;
use std::time::Duration;

/// Maintenance knobs for one reaper pass
#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    pub interval: Duration,
    pub max_sessions: usize,
    /// Total payload bytes above which a warning is logged
    pub memory_warn_bytes: usize,
}

/// Runs maintenance passes forever at the configured interval
pub async fn run_reaper(store: Arc<SessionStore>, limiter: Arc<RateLimiter>, config: ReaperConfig) {
    let mut ticker = tokio::time::interval(config.interval);
    // The first tick fires immediately; skip it so startup stays quiet.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        run_pass(&store, &limiter, &config);
    }
}

/// One maintenance pass: sweep, evict, prune, report
pub fn run_pass(store: &SessionStore, limiter: &RateLimiter, config: &ReaperConfig) {
    let report = store.sweep_expired();
    let evicted = store.enforce_capacity(config.max_sessions);
    limiter.prune_idle();

    let usage = store.memory_usage();
    if report.expired_sessions > 0 || report.expired_conversations > 0 || evicted > 0 {
        tracing::info!(
            "Cleanup completed - Sessions: {}, Conversations: {}, Evicted: {} | Memory: {} sessions, {} conversations, {}B",
            report.expired_sessions,
            report.expired_conversations,
            evicted,
            usage.sessions,
            usage.conversations,
            usage.total_bytes()
        );
    }

    if usage.total_bytes() > config.memory_warn_bytes {
        tracing::warn!(
            "Store memory above threshold: {}B across {} sessions",
            usage.total_bytes(),
            usage.sessions
        );
    }
}
