//! Per-credential rate limiting
//!
//! Tracks, per consumer key, the time before which posting must not resume.
//! Entries are only written after a post attempt reveals a limiting signal,
//! and expire lazily when they are next checked.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::RateLimitParseError;
use crate::types::PostResponse;

/// Body phrase signalling short-term throttling (exact, case-sensitive)
pub const TOO_MANY_REQUESTS: &str = "Too Many Requests";

/// How long a key stays blocked after a "Too Many Requests" response
pub const THROTTLE_WINDOW_SECS: i64 = 3600;

/// Requests left in the rolling 24-hour app window
pub const REMAINING_HEADER: &str = "x-app-limit-24hour-remaining";

/// Epoch second at which the 24-hour app window resets
pub const RESET_HEADER: &str = "x-app-limit-24hour-reset";

/// Registry of blocked consumer keys
///
/// Internally synchronized so dispatches delivered concurrently cannot lose
/// throttle updates.
#[derive(Debug, Default)]
pub struct RateLimitRegistry {
    /// consumer key -> reset timestamp (seconds since epoch)
    entries: Mutex<HashMap<String, i64>>,
}

impl RateLimitRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        // The map holds plain integers, so a poisoned lock still holds valid state
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check whether a key is blocked at `now`
    ///
    /// Returns the reset timestamp while the key is blocked. An entry whose
    /// reset is at or before `now` is removed and `None` is returned.
    pub fn is_blocked(&self, key: &str, now: i64) -> Option<i64> {
        let mut entries = self.entries();

        match entries.get(key).copied() {
            Some(reset) if reset > now => Some(reset),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Block a key until `reset_at`, replacing any existing entry
    pub fn record_throttle(&self, key: &str, reset_at: i64) {
        self.entries().insert(key.to_string(), reset_at);
    }

    /// Drop every entry that has expired at `now`, returning how many were removed
    pub fn purge_expired(&self, now: i64) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, reset| *reset > now);
        before - entries.len()
    }

    /// Number of entries currently stored (expired or not)
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Daily app quota reported by a post response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyQuota {
    pub remaining: i64,
    pub reset_at: Option<i64>,
}

/// Limiting signals extracted from one post response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitSignals {
    /// The body contained [`TOO_MANY_REQUESTS`]
    pub too_many_requests: bool,
    /// Present when the response carried the remaining-count header
    pub daily_quota: Option<DailyQuota>,
}

impl RateLimitSignals {
    /// Extract signals from a post response
    ///
    /// Absent quota headers are not an error (error responses often omit
    /// them). Present but non-numeric values are, as is an exhausted quota
    /// without a reset time.
    pub fn from_response(response: &PostResponse) -> Result<Self, RateLimitParseError> {
        let too_many_requests = response.body.contains(TOO_MANY_REQUESTS);

        let remaining = parse_header(response, REMAINING_HEADER)?;
        let reset_at = parse_header(response, RESET_HEADER)?;

        let daily_quota = match remaining {
            Some(remaining) => {
                if remaining <= 0 && reset_at.is_none() {
                    return Err(RateLimitParseError::Missing {
                        header: RESET_HEADER,
                    });
                }
                Some(DailyQuota {
                    remaining,
                    reset_at,
                })
            }
            None => None,
        };

        Ok(Self {
            too_many_requests,
            daily_quota,
        })
    }

    /// Reset time of the daily window when the quota is used up
    pub fn daily_reset(&self) -> Option<i64> {
        self.daily_quota
            .filter(|quota| quota.remaining <= 0)
            .and_then(|quota| quota.reset_at)
    }
}

fn parse_header(
    response: &PostResponse,
    header: &'static str,
) -> Result<Option<i64>, RateLimitParseError> {
    let Some(raw) = response.headers.get(header) else {
        return Ok(None);
    };
    let not_an_integer = || RateLimitParseError::NotAnInteger {
        header,
        value: String::from_utf8_lossy(raw.as_bytes()).into_owned(),
    };

    let value = raw.to_str().map_err(|_| not_an_integer())?;
    value
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| not_an_integer())
}
