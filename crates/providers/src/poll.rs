//! Bounded, cancellable polling.

use crate::PollError;
use core::{future::Future, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How often to poll and for how long. There is no default; callers always choose both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    interval: Duration,
    timeout: Duration,
}

impl PollConfig {
    /// Creates a config. Both durations must be non-zero.
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self, PollError> {
        if interval.is_zero() || timeout.is_zero() {
            return Err(PollError::InvalidConfig { interval, timeout });
        }
        Ok(Self { interval, timeout })
    }

    /// Creates a config from millisecond values.
    pub fn from_millis(interval_ms: u64, timeout_ms: u64) -> Result<Self, PollError> {
        Self::new(Duration::from_millis(interval_ms), Duration::from_millis(timeout_ms))
    }

    /// The delay between two checks.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// The overall deadline, measured from the first check.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Runs `check` every `config.interval` until it yields a value.
///
/// Fails with [PollError::Timeout] once `config.timeout` has elapsed (including while a check is
/// in flight) and with [PollError::Cancelled] as soon as `cancel` fires. Errors returned by the
/// check end the wait immediately.
pub async fn poll_until<T, E, F, Fut>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, E>
where
    E: From<PollError>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + config.timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled.into());
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled.into()),
            outcome = tokio::time::timeout_at(deadline, check()) => outcome,
        };
        match outcome {
            Ok(Ok(Some(value))) => return Ok(value),
            Ok(Ok(None)) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(PollError::Timeout(config.timeout).into()),
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::Timeout(config.timeout).into());
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled.into()),
            _ = tokio::time::sleep(config.interval.min(deadline - now)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderError;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    #[test]
    fn test_config_rejects_zero_durations() {
        assert!(PollConfig::from_millis(0, 100).is_err());
        assert!(PollConfig::from_millis(100, 0).is_err());
        let config = PollConfig::from_millis(10, 100).unwrap();
        assert_eq!(config.interval(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_returns_first_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let config = PollConfig::from_millis(10, 1_000).unwrap();
        let counter = Arc::clone(&calls);
        let value = poll_until::<_, ProviderError, _, _>(
            &config,
            &CancellationToken::new(),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Ok((n == 3).then_some(n))
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out() {
        let config = PollConfig::from_millis(10, 100).unwrap();
        let err = poll_until::<(), ProviderError, _, _>(&config, &CancellationToken::new(), || {
            async { Ok(None) }
        })
        .await
        .unwrap_err();
        assert_eq!(err, ProviderError::Poll(PollError::Timeout(Duration::from_millis(100))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_observes_cancellation() {
        let config = PollConfig::from_millis(10, 10_000).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            trigger.cancel();
        });
        let err = poll_until::<(), ProviderError, _, _>(&config, &cancel, || async { Ok(None) })
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Poll(PollError::Cancelled));
    }
}
