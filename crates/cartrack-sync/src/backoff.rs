//! Reconnect backoff calculation.
//!
//! Pure math, separately testable; the session task wraps
//! [`backoff_delay`] with `rand` for real jitter.

/// Calculate an exponential backoff delay with jitter.
///
/// Formula: `min(max_ms, base_ms * 2^attempt) * (1 + (2*random - 1) * jitter)`
///
/// `random` should be a value in `[0.0, 1.0)` from a PRNG; a jitter factor
/// of 0.2 spreads the delay by ±20% around the capped exponential value.
/// `attempt` is the zero-based retry index.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay(
    attempt: u32,
    base_ms: u64,
    max_ms: u64,
    jitter: f64,
    random: f64,
) -> u64 {
    let exponential = base_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(max_ms);

    // Maps random [0,1) to [-jitter, +jitter]
    let factor = 1.0 + (random * 2.0 - 1.0) * jitter;
    let with_jitter = (capped as f64) * factor;

    with_jitter.round().max(0.0) as u64
}

/// [`backoff_delay`] with thread-local randomness.
#[must_use]
pub fn jittered_backoff_delay(attempt: u32, base_ms: u64, max_ms: u64, jitter: f64) -> u64 {
    backoff_delay(attempt, base_ms, max_ms, jitter, rand::random::<f64>())
}
