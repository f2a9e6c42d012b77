/*!
Bounded busy-waiting on a status value.

Hardware signals completion by flipping bits in a status register.
Instead of spinning forever the wait is limited by an iteration count, a timeout, or both.
Whichever bound is hit first ends the wait with a [`Timeout`](crate::error::ErrorKind::Timeout) error.

Timing uses the [coarsetime](https://docs.rs/coarsetime) crate, so the timeout has a
granularity of a few milliseconds.
*/

use crate::dump::RegisterBits;
use crate::error::{Error, ErrorKind, ErrorOrigin, Result};

use coarsetime::{Duration, Instant};
use log::{debug, trace};

/// Bounds of a polling loop.
///
/// The default allows one million reads or one second, whichever comes first,
/// without sleeping between reads.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PollConfig {
    /// Maximum number of reads, `None` for no limit.
    pub max_iterations: Option<u64>,
    /// Maximum time spent waiting in milliseconds, `None` for no limit.
    pub timeout_ms: Option<u64>,
    /// Pause between two reads in microseconds.
    pub interval_us: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_iterations: Some(1_000_000),
            timeout_ms: Some(1000),
            interval_us: 0,
        }
    }
}

impl PollConfig {
    /// A configuration without any bound.
    ///
    /// This reproduces a plain spin loop and will hang if the device never completes.
    pub fn unbounded() -> Self {
        Self {
            max_iterations: None,
            timeout_ms: None,
            interval_us: 0,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_interval(mut self, interval: std::time::Duration) -> Self {
        self.interval_us = interval.as_micros() as u64;
        self
    }

    /// Returns the timeout as a duration, if any.
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_ms.map(std::time::Duration::from_millis)
    }

    /// Returns the pause between two reads.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(self.interval_us)
    }
}

/// Calls `read` until `done` accepts the returned value and returns that value.
///
/// Errors of `read` are passed through untouched.
///
/// # Examples
///
/// ```
/// use memprobe::poll::{poll_until, PollConfig};
///
/// let mut status = 0b1000u32;
/// let value = poll_until(
///     &PollConfig::default(),
///     || {
///         status >>= 1;
///         Ok(status)
///     },
///     |value| value & 1 == 1,
/// )
/// .unwrap();
/// assert_eq!(value, 1);
/// ```
pub fn poll_until<R, D>(config: &PollConfig, mut read: R, mut done: D) -> Result<u32>
where
    R: FnMut() -> Result<u32>,
    D: FnMut(u32) -> bool,
{
    let start = Instant::now();
    let timeout = config.timeout_ms.map(Duration::from_millis);
    let interval = config.interval();

    let mut iterations = 0u64;
    loop {
        let value = read()?;
        iterations += 1;
        trace!("poll #{}: {}", iterations, RegisterBits(value));

        if done(value) {
            debug!("poll finished after {} reads", iterations);
            return Ok(value);
        }

        if let Some(max_iterations) = config.max_iterations {
            if iterations >= max_iterations {
                return Err(Error(ErrorOrigin::Poll, ErrorKind::Timeout).log_error(format!(
                    "gave up after {} reads, last value {:08x}",
                    iterations, value
                )));
            }
        }

        if let Some(timeout) = timeout {
            if start.elapsed() >= timeout {
                return Err(Error(ErrorOrigin::Poll, ErrorKind::Timeout).log_error(format!(
                    "gave up after {}ms and {} reads, last value {:08x}",
                    timeout.as_millis(),
                    iterations,
                    value
                )));
            }
        }

        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
}
