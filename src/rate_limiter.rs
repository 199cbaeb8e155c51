//! Module for rate limiting contact submissions.

use crate::error::Error;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Decision taken for one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The attempt was recorded; `remaining` more fit into the current window.
    Admitted { remaining: usize },
    /// The identifier is over its quota until the oldest attempt leaves the window.
    Limited { retry_after: Duration },
}

impl Admission {
    #[cfg(test)]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Admission control in front of the submission handler.
///
/// Timestamps are epoch milliseconds supplied by the caller.
pub trait AdmissionGate: Send + Sync {
    /// Decides whether `identifier` may submit at `now`, recording the attempt if so.
    fn admit(&self, identifier: &str, now: u64) -> Result<Admission, Error>;
}

/// A rate limiter tracking admitted submission timestamps per client identifier.
#[derive(Debug)]
pub struct SubmissionRateLimiter {
    client_timestamps: Mutex<HashMap<String, Vec<u64>>>,
    max_per_window: usize,
    window_ms: u64,
}

impl SubmissionRateLimiter {
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            client_timestamps: Mutex::new(HashMap::new()),
            max_per_window,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn is_recent(&self, timestamp: u64, now: u64) -> bool {
        now.saturating_sub(timestamp) < self.window_ms
    }

    /// Drops every identifier without an attempt inside the window.
    ///
    /// Returns the number of identifiers still tracked.
    pub fn retain_recent(&self, now: u64) -> Result<usize, Error> {
        let mut clients = self
            .client_timestamps
            .lock()
            .map_err(|_| Error::LockPoisoned)?;
        clients.retain(|_, timestamps| {
            timestamps.retain(|&t| self.is_recent(t, now));
            !timestamps.is_empty()
        });
        Ok(clients.len())
    }

    #[cfg(test)]
    fn tracked(&self, identifier: &str) -> Vec<u64> {
        self.client_timestamps
            .lock()
            .map(|clients| clients.get(identifier).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl AdmissionGate for SubmissionRateLimiter {
    fn admit(&self, identifier: &str, now: u64) -> Result<Admission, Error> {
        let mut clients = self
            .client_timestamps
            .lock()
            .map_err(|_| Error::LockPoisoned)?;

        let timestamps = clients.entry(identifier.to_string()).or_default();
        timestamps.retain(|&t| self.is_recent(t, now));

        if timestamps.len() >= self.max_per_window {
            // Wall-clock time may step backwards, so the log is not necessarily sorted.
            let oldest = timestamps.iter().min().copied().unwrap_or(now);
            let expires_in = oldest.saturating_add(self.window_ms).saturating_sub(now);
            return Ok(Admission::Limited {
                retry_after: Duration::from_millis(expires_in),
            });
        }

        timestamps.push(now);
        Ok(Admission::Admitted {
            remaining: self.max_per_window - timestamps.len(),
        })
    }
}
