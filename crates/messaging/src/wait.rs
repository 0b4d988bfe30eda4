//! Waiting for a message to reach a terminal status.

use crate::{BridgeError, BridgeResult, StatusOracle};
use core::future::Future;
use nitro_bridge_primitives::{CrossDomainMessage, MessageStatus};
use nitro_bridge_providers::PollConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Polls `oracle` until `message` reaches a terminal status.
///
/// See [wait_for_status_with] for the failure modes.
pub async fn wait_for_status<M, O>(
    oracle: &O,
    message: &M,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> BridgeResult<M::Status>
where
    M: CrossDomainMessage,
    O: StatusOracle<M>,
{
    let (status, ()) = wait_for_status_with(message, config, cancel, || async {
        Ok::<_, BridgeError>((oracle.status(message).await?, ()))
    })
    .await?;
    Ok(status)
}

/// Runs `check` every `config.interval` until the status it reports is terminal, returning the
/// terminal status with whatever the check attached to it.
///
/// - [BridgeError::Timeout] once `config.timeout` elapsed while the status is not terminal.
/// - [BridgeError::Cancelled] as soon as `cancel` fires. No check is started afterwards.
/// - [BridgeError::StatusRegression] if a status ranks below one observed earlier.
/// - TestMessage errors are returned as is. Polling does not retry them.
pub async fn wait_for_status_with<M, T, F, Fut>(
    message: &M,
    config: &PollConfig,
    cancel: &CancellationToken,
    check: F,
) -> BridgeResult<(M::Status, T)>
where
    M: CrossDomainMessage,
    F: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<(M::Status, T)>>,
{
    wait_until(message, config, cancel, check, |status, _| status.is_terminal()).await
}

/// Like [wait_for_status_with], but stops as soon as `settled` accepts an observation.
pub(crate) async fn wait_until<M, T, F, Fut, S>(
    message: &M,
    config: &PollConfig,
    cancel: &CancellationToken,
    mut check: F,
    settled: S,
) -> BridgeResult<(M::Status, T)>
where
    M: CrossDomainMessage,
    F: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<(M::Status, T)>>,
    S: Fn(&M::Status, &T) -> bool,
{
    let id = message.id();
    let deadline = Instant::now() + config.timeout();
    let mut last: Option<M::Status> = None;
    let timed_out = |last: Option<M::Status>| BridgeError::Timeout {
        id,
        timeout: config.timeout(),
        last_status: last.map_or_else(|| "UNKNOWN".to_string(), |s| s.to_string()),
    };

    loop {
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled(id));
        }

        let observed = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::Cancelled(id)),
            observed = tokio::time::timeout_at(deadline, check()) => observed,
        };
        let Ok(observed) = observed else {
            return Err(timed_out(last));
        };
        let (status, attached) = observed?;

        match last {
            Some(previous) if status.rank() < previous.rank() => {
                return Err(BridgeError::StatusRegression {
                    id,
                    from: previous.to_string(),
                    to: status.to_string(),
                });
            }
            Some(previous) if previous == status => {
                debug!(target: "oracle", %id, %status, "Status unchanged");
            }
            _ => info!(target: "oracle", %id, %status, "Status changed"),
        }

        if settled(&status, &attached) {
            return Ok((status, attached));
        }
        last = Some(status);

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out(last));
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::Cancelled(id)),
            _ = tokio::time::sleep(config.interval().min(deadline - now)) => {}
        }
    }
}
