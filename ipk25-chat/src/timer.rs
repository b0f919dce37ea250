//! Timing parameters for delivery and reply waits.
//!
//! UDP delivery is stop-and-wait per message: send, then race the CONFIRM
//! against [`TimerConfig::confirm_timeout`]; on timeout resend the identical
//! datagram, at most [`TimerConfig::max_retries`] times.  The timeout is
//! fixed; there is no RTT estimation or back-off.

use std::time::Duration;

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_RETRIES: u8 = 3;
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_ERROR_PAUSE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// How long one UDP attempt waits for its CONFIRM.
    pub confirm_timeout: Duration,
    /// Retransmissions after the first attempt.
    pub max_retries: u8,
    /// How long AUTH/JOIN wait for a REPLY after delivery (both transports).
    pub reply_timeout: Duration,
    /// Receiver back-off after raising an error, so the ERR goes out first.
    pub error_pause: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            error_pause: DEFAULT_ERROR_PAUSE,
        }
    }
}

impl TimerConfig {
    /// Total transmissions of one datagram, first attempt included.
    pub fn attempts(&self) -> u32 {
        u32::from(self.max_retries) + 1
    }

    /// Longest time a UDP delivery can take before it fails.
    pub fn delivery_budget(&self) -> Duration {
        self.confirm_timeout * self.attempts()
    }
}
