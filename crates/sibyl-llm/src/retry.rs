//! Retry parameters and backoff math for upstream calls.
//!
//! The async retry loop itself lives in [`client`](crate::client); this
//! module holds the sync building blocks so the policy can be tested
//! without a clock.

/// Default maximum retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 500;
/// Default cap on the delay between attempts in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

/// Retry behavior for transient upstream failures.
///
/// A policy of [`RetryPolicy::none`] turns every failure into an immediate
/// error, which is what tests asserting on raw error mapping want.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on the delay between attempts in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay in milliseconds before the given zero-based retry attempt.
    ///
    /// A server-advertised retry-after wins over the computed backoff when
    /// it is larger.
    #[must_use]
    pub fn delay_ms_for(&self, attempt: u32, retry_after_ms: Option<u64>) -> u64 {
        let backoff = backoff_delay_ms(attempt, self.base_delay_ms, self.max_delay_ms);
        retry_after_ms.map_or(backoff, |advertised| backoff.max(advertised))
    }
}

/// Exponential backoff delay: `base * 2^attempt`, capped at `max`.
///
/// The shift saturates, so large attempt counts cannot overflow.
#[must_use]
pub fn backoff_delay_ms(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1_u64 << attempt.min(31))
        .min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
