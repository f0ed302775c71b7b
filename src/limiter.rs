//! Sliding-window rate limiting
//!
//! One window per client key plus one global window. The global window is
//! checked first so a saturated system rejects before consuming per-client
//! budget. Health-check routes bypass this component entirely (see
//! `server.rs`).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted; timestamps were recorded
    Allowed,
    /// Per-client ceiling reached; carries a wait-window hint
    LimitedPerClient {
        /// The configured per-client ceiling
        limit: u32,
        /// Window size in seconds
        window_secs: u64,
    },
    /// Global ceiling reached
    Overloaded,
}

#[derive(Debug, Default)]
struct Windows {
    per_client: HashMap<String, Vec<Instant>>,
    global: Vec<Instant>,
}

/// Thread-safe sliding-window rate limiter
///
/// Maintains an ordered sequence of request timestamps per client key and
/// one global sequence. On every check, entries older than the window are
/// pruned; a timestamp is only recorded when the corresponding window
/// admits the request.
pub struct RateLimiter {
    windows: Mutex<Windows>,
    per_client_limit: u32,
    global_limit: u32,
    window: Duration,
}

impl RateLimiter {
    /// Creates a rate limiter with the given ceilings and window size
    pub fn new(per_client_limit: u32, global_limit: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(Windows::default()),
            per_client_limit,
            global_limit,
            window,
        }
    }

    /// Checks whether a request from `client_key` may proceed
    ///
    /// The global window is checked (and on success recorded) first; a
    /// rejection never records a timestamp in the rejecting window.
    pub fn admit(&self, client_key: &str) -> Admission {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();

        prune(&mut windows.global, now, self.window);
        if windows.global.len() >= self.global_limit as usize {
            return Admission::Overloaded;
        }
        windows.global.push(now);

        let entries = windows.per_client.entry(client_key.to_string()).or_default();
        prune(entries, now, self.window);
        if entries.len() >= self.per_client_limit as usize {
            return Admission::LimitedPerClient {
                limit: self.per_client_limit,
                window_secs: self.window.as_secs(),
            };
        }
        entries.push(now);

        Admission::Allowed
    }

    /// Drops per-client windows that have gone fully idle
    ///
    /// Called by the background reaper so abandoned client keys do not
    /// accumulate.
    pub fn prune_idle(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let window = self.window;
        windows.per_client.retain(|_, entries| {
            prune(entries, now, window);
            !entries.is_empty()
        });
        prune(&mut windows.global, now, window);
    }

    /// Number of client keys with recent activity
    pub fn active_clients(&self) -> usize {
        self.windows.lock().unwrap().per_client.len()
    }
}

fn prune(entries: &mut Vec<Instant>, now: Instant, window: Duration) {
    entries.retain(|t| now.duration_since(*t) < window);
}
