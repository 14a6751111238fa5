//! Backoff policy for blocked or failing page fetches.
//!
//! Maps a block classification and a retry attempt count to either a wait
//! duration or an instruction to abandon the page. Rate limits and hard
//! blocks escalate exponentially; plain server errors are retried briefly
//! with a linear delay.

use std::time::Duration;

use crate::block::BlockKind;

/// Outcome of a backoff decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Sleep this long, then retry the same page.
    Wait(Duration),
    /// Retries exhausted; give up on this page.
    Abandon,
}

/// Configurable backoff schedule.
///
/// Defaults match the crawl's production tuning:
/// rate limit 60 s · 2^attempt, IP block 300 s · 2^attempt (both capped at
/// 5 attempts), server errors 10 s · (attempt+1) capped at 2 attempts.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub rate_limited_base: Duration,
    pub hard_blocked_base: Duration,
    pub server_error_base: Duration,
    pub max_retries_blocked: u32,
    pub max_retries_server: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            rate_limited_base: Duration::from_secs(60),
            hard_blocked_base: Duration::from_secs(300),
            server_error_base: Duration::from_secs(10),
            max_retries_blocked: 5,
            max_retries_server: 2,
        }
    }
}

impl BackoffPolicy {
    /// Decide what to do after observing `kind` on retry number `attempt`
    /// (0-based) for a page.
    pub fn decide(&self, kind: BlockKind, attempt: u32) -> BackoffDecision {
        match kind {
            BlockKind::RateLimited => {
                exponential(self.rate_limited_base, attempt, self.max_retries_blocked)
            }
            BlockKind::HardBlocked => {
                exponential(self.hard_blocked_base, attempt, self.max_retries_blocked)
            }
            BlockKind::ServerError | BlockKind::Unknown => {
                if attempt >= self.max_retries_server {
                    BackoffDecision::Abandon
                } else {
                    BackoffDecision::Wait(self.server_error_base * (attempt + 1))
                }
            }
            // Successful responses and auth walls never reach the backoff
            // loop; answering Abandon keeps the policy total.
            BlockKind::Ok | BlockKind::AuthWall => BackoffDecision::Abandon,
        }
    }

    /// Upper bound on retry attempts for a given classification.
    pub fn max_retries(&self, kind: BlockKind) -> u32 {
        match kind {
            BlockKind::RateLimited | BlockKind::HardBlocked => self.max_retries_blocked,
            BlockKind::ServerError | BlockKind::Unknown => self.max_retries_server,
            BlockKind::Ok | BlockKind::AuthWall => 0,
        }
    }
}

fn exponential(base: Duration, attempt: u32, max_retries: u32) -> BackoffDecision {
    if attempt >= max_retries {
        return BackoffDecision::Abandon;
    }
    // Cap the exponent so pathological configs cannot overflow.
    let factor = 1u64 << attempt.min(20);
    BackoffDecision::Wait(Duration::from_secs(base.as_secs().saturating_mul(factor)))
}
