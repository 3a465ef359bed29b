use std::thread;
use std::time::Duration;

use log::warn;
use quill_core::LlmConfig;

use crate::error::AdapterError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub sleep: Duration,
}

impl RetryConfig {
    pub const fn new(max_retries: usize, sleep: Duration) -> Self {
        Self { max_retries, sleep }
    }

    pub fn from_profile(profile: &LlmConfig) -> Self {
        Self::new(
            profile.max_retries.max(1),
            Duration::from_secs(profile.retry_delay_secs),
        )
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            sleep: Duration::from_secs(2),
        }
    }
}

/// Runs `f` until it succeeds or `max_retries` attempts have failed; the last
/// failure is returned wrapped in `RetryExhausted`. Configuration errors are
/// not retried.
pub fn call_with_retry<F, T>(mut f: F, config: &RetryConfig) -> Result<T, AdapterError>
where
    F: FnMut() -> Result<T, AdapterError>,
{
    let max_retries = config.max_retries.max(1);
    let mut last_error: Option<AdapterError> = None;

    for attempt in 1..=max_retries {
        match f() {
            Ok(value) => return Ok(value),
            Err(err @ AdapterError::InvalidConfig(_)) => return Err(err),
            Err(err) => {
                warn!(
                    "[call_with_retry] attempt {}/{} failed: {}",
                    attempt, max_retries, err
                );
                if attempt < max_retries {
                    thread::sleep(config.sleep);
                }
                last_error = Some(err);
            }
        }
    }

    let err = last_error.unwrap_or(AdapterError::EmptyResponse);
    Err(AdapterError::retry_exhausted(max_retries, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_WAIT: RetryConfig = RetryConfig::new(3, Duration::ZERO);

    #[test]
    fn returns_first_success() {
        let mut calls = 0;
        let value = call_with_retry(
            || {
                calls += 1;
                if calls < 2 {
                    Err(AdapterError::EmptyResponse)
                } else {
                    Ok(calls)
                }
            },
            &NO_WAIT,
        )
        .unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn wraps_last_error_when_exhausted() {
        let mut calls = 0;
        let err = call_with_retry::<_, ()>(
            || {
                calls += 1;
                Err(AdapterError::EmptyResponse)
            },
            &NO_WAIT,
        )
        .unwrap_err();
        assert_eq!(calls, 3);
        assert!(matches!(
            err,
            AdapterError::RetryExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn config_errors_are_not_retried() {
        let mut calls = 0;
        let err = call_with_retry::<_, ()>(
            || {
                calls += 1;
                Err(AdapterError::InvalidConfig("bad".into()))
            },
            &NO_WAIT,
        )
        .unwrap_err();
        assert_eq!(calls, 1);
        assert!(matches!(err, AdapterError::InvalidConfig(_)));
    }

    #[test]
    fn profile_settings_drive_retries() {
        let profile = LlmConfig {
            max_retries: 0,
            retry_delay_secs: 7,
            ..LlmConfig::default()
        };
        assert_eq!(
            RetryConfig::from_profile(&profile),
            RetryConfig::new(1, Duration::from_secs(7))
        );
    }
}
