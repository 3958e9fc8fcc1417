//! Reconnection backoff policy
//!
//! Pure state machine: no I/O, no clock access beyond the jitter draw.
//! The delay starts at the configured minimum, doubles after every draw,
//! and resets to a 1-second floor on success. Exceeding the maximum does
//! not give up: the delay wraps back to the floor and retries continue
//! indefinitely.

use std::time::Duration;
use tracing::warn;

/// Exponential backoff state owned by the lifecycle controller.
///
/// The engaged flag records "the next iteration should wait before
/// reconnecting". It is set by failure events and cleared only by a
/// confirmed connection, never by drawing a delay.
#[derive(Debug)]
pub struct ExponentialBackoff {
    current: Duration,
    maximum: Duration,
    engaged: bool,
}

impl ExponentialBackoff {
    /// Delay floor the policy resets to on success or exhaustion
    pub const FLOOR: Duration = Duration::from_secs(1);

    /// Upper bound of the uniform jitter added to every drawn delay
    pub const JITTER_CEILING: Duration = Duration::from_secs(1);

    /// Create a policy starting at `minimum`, wrapping past `maximum`
    pub fn new(minimum: Duration, maximum: Duration) -> Self {
        Self {
            current: minimum,
            maximum,
            engaged: false,
        }
    }

    /// A confirmed connection: back to the floor, stop backing off
    pub fn on_connect_success(&mut self) {
        self.current = Self::FLOOR;
        self.engaged = false;
    }

    /// A failed connection attempt
    pub fn on_connect_failure(&mut self) {
        self.engaged = true;
    }

    /// A transport error surfaced while pumping an established session
    pub fn on_transport_error(&mut self) {
        self.engaged = true;
    }

    /// Whether the next iteration should wait before reconnecting
    pub fn should_back_off(&self) -> bool {
        self.engaged
    }

    /// Draw the next delay: jittered current value, then double.
    ///
    /// Past the maximum the delay wraps to the floor instead of aborting,
    /// so the agent keeps retrying forever.
    pub fn next_delay(&mut self) -> Duration {
        if self.current > self.maximum {
            warn!(
                maximum_secs = self.maximum.as_secs(),
                "exceeded maximum backoff, resetting delay to floor"
            );
            self.current = Self::FLOOR;
        }

        let delay = self.current + uniform_jitter(Self::JITTER_CEILING);
        self.current = self.current.saturating_mul(2);
        delay
    }

    #[cfg(test)]
    pub(crate) fn current_delay(&self) -> Duration {
        self.current
    }
}

/// Uniform random jitter in [0, ceiling], millisecond granularity
fn uniform_jitter(ceiling: Duration) -> Duration {
    let jitter_ms = rand::random_range(0..=ceiling.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}
