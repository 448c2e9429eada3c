//! Bounded retry with a fixed delay for remote calls.
//!
//! The gateway and messenger endpoints routinely lag right after a spawn, so
//! the create path retries its Eval message and its confirming transaction
//! read a fixed number of times. There is no jitter and no exponential
//! backoff, and every failure is retried, including not-yet-indexed reads.
//! Callers must only wrap operations that are safe to re-issue.

use crate::error::{Error, Result};
use std::thread;
use std::time::Duration;

/// Attempt budget used by the create path.
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Fixed delay between attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Run `operation` up to `attempts` times, sleeping `delay` between
/// failures. Exhausting the budget re-raises the last error.
pub fn retry_with_delay<T, F>(attempts: u32, delay: Duration, mut operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = attempts.max(1);
    let mut last_error: Option<Error> = None;

    for attempt in 1..=attempts {
        match operation() {
            Ok(result) => return Ok(result),
            Err(e) => {
                log::debug!("attempt {attempt}/{attempts} failed: {e}");
                last_error = Some(e);
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Other("retry budget exhausted".to_string())))
}

/// Retry with the default fixed delay.
pub fn retry<T, F>(attempts: u32, operation: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    retry_with_delay(attempts, DEFAULT_DELAY, operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FAST: Duration = Duration::from_millis(1);

    #[test]
    fn test_success_first_try_calls_once() {
        let calls = Cell::new(0);
        let result = retry_with_delay(5, FAST, || {
            calls.set(calls.get() + 1);
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_fails_twice_then_succeeds_calls_three_times() {
        let calls = Cell::new(0);
        let result = retry_with_delay(5, FAST, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::Network {
                    message: "timeout".to_string(),
                })
            } else {
                Ok("ok")
            }
        });
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_exhaustion_reraises_last_error() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_with_delay(3, FAST, || {
            calls.set(calls.get() + 1);
            Err(Error::Network {
                message: format!("failure {}", calls.get()),
            })
        });
        assert_eq!(calls.get(), 3);
        match result {
            Err(Error::Network { message }) => assert_eq!(message, "failure 3"),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let calls = Cell::new(0);
        let result = retry_with_delay(0, FAST, || {
            calls.set(calls.get() + 1);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(calls.get(), 1);
    }
}
