//! Retry classification and backoff for CRM transport failures.

use serde::{Deserialize, Serialize};

/// Retry policy classification for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Classify HTTP status into retry behavior.
pub fn classify_http_status(status: u16) -> SyncRetryClass {
    match status {
        401 | 403 => SyncRetryClass::ReauthRequired,
        408 | 423 | 425 | 429 => SyncRetryClass::Retryable,
        500..=599 => SyncRetryClass::Retryable,
        _ => SyncRetryClass::Permanent,
    }
}

/// Fixed-attempt retry budget with capped exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: usize, class: SyncRetryClass) -> bool {
        class == SyncRetryClass::Retryable && attempt < self.max_attempts
    }

    /// Backoff before the attempt following `attempt`, without jitter.
    pub fn backoff_ms(&self, attempt: usize) -> u64 {
        let exp = (attempt.saturating_sub(1) as u32).min(8);
        self.base_backoff_ms
            .saturating_mul(1_u64 << exp)
            .min(self.max_backoff_ms)
    }
}

impl From<&crate::settings::SyncSettings> for RetryPolicy {
    fn from(settings: &crate::settings::SyncSettings) -> Self {
        Self::new(
            settings.max_attempts,
            settings.base_backoff_ms,
            settings.max_backoff_ms,
        )
    }
}
