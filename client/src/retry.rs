//! Bounded retry for transient failures

use log::warn;
use std::thread::sleep;
use std::time::Duration;

use crate::error::SwapError;

/// Outcome of [`retry_bounded`]
#[derive(Debug, Clone, PartialEq)]
pub enum Retried<T> {
    Succeeded(T),
    /// Gave up after `attempts` calls
    Exhausted { attempts: u32 },
}

impl<T> Retried<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Retried::Succeeded(v) => Some(v),
            Retried::Exhausted { .. } => None,
        }
    }
}

/// Call `op` up to `max_retries + 1` times with exponential backoff
///
/// Only transient errors are retried; any other error stops immediately.
/// The calling thread sleeps `initial_backoff` before the first retry and
/// twice as long before each one after. `op` receives the 1-based attempt
/// number.
pub fn retry_bounded<T, F>(max_retries: u32, initial_backoff: Duration, mut op: F) -> Retried<T>
where
    F: FnMut(u32) -> Result<T, SwapError>,
{
    let max_attempts = max_retries.saturating_add(1);
    let mut delay = initial_backoff;
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(v) => return Retried::Succeeded(v),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    "attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => {
                warn!("giving up after {} attempt(s): {}", attempt, e);
                return Retried::Exhausted { attempts: attempt };
            }
        }
    }
}
