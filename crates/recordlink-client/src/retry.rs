//! Opt-in bounded retry for the connect step.
//!
//! Nothing else in the client retries. The default policy makes exactly one
//! attempt.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::duration_secs;
use crate::error::Error;

/// Retry policy applied to `Session::connect`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectRetry {
    /// Total connect attempts, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later attempt.
    #[serde(with = "duration_secs")]
    pub backoff: Duration,
    /// Upper bound for the delay between attempts.
    #[serde(with = "duration_secs")]
    pub max_backoff: Duration,
}

impl ConnectRetry {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }

    /// Retry up to `max_attempts` attempts in total.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::none()
        }
    }

    /// Set the initial backoff.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the maximum backoff.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run `attempt` until it succeeds, fails permanently, or the attempt
    /// budget runs out. The closure receives the 1-based attempt number.
    pub fn run<T>(&self, mut attempt: impl FnMut(u32) -> Result<T, Error>) -> Result<T, Error> {
        let max_attempts = self.max_attempts.max(1);
        let mut current = 1;
        loop {
            match attempt(current) {
                Ok(value) => return Ok(value),
                Err(error) if current < max_attempts && error.is_transient() => {
                    let delay = self.delay_after(current);
                    warn!(
                        attempt = current,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "connect attempt failed, retrying"
                    );
                    std::thread::sleep(delay);
                    current += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::client_codes;

    fn refused() -> Error {
        Error::Connection {
            code: client_codes::TRANSPORT,
            message: "connection refused".into(),
        }
    }

    #[test]
    fn test_default_is_single_attempt() {
        let mut calls = 0;
        let result: Result<(), Error> = ConnectRetry::default().run(|_| {
            calls += 1;
            Err(refused())
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_retries_transient_failures() {
        let policy = ConnectRetry::attempts(3).with_backoff(Duration::from_millis(1));
        let mut calls = 0;
        let result = policy.run(|attempt| {
            calls += 1;
            if attempt < 3 {
                Err(refused())
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_does_not_retry_rejected_login() {
        let policy = ConnectRetry::attempts(5).with_backoff(Duration::from_millis(1));
        let mut calls = 0;
        let result: Result<(), Error> = policy.run(|_| {
            calls += 1;
            Err(Error::Connection {
                code: recordlink_proto::error_codes::AUTH_FAILED,
                message: "bad password".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = ConnectRetry::attempts(10)
            .with_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(350));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(policy.delay_after(40), Duration::from_millis(350));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(ConnectRetry::attempts(0).max_attempts, 1);
    }
}
