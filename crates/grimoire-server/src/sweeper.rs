//! Periodic expiry sweep.
//!
//! The sweeper only enqueues [`RelayInput::Sweep`]; the relay loop does the
//! actual work so sweeps are serialized with client requests.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::relay::RelayInput;

/// Spawn a task that enqueues a sweep every `period`, starting one period
/// from now.
pub fn spawn_sweeper(
    period: Duration,
    relay: mpsc::Sender<RelayInput>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "expiry sweeper started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if relay.send(RelayInput::Sweep).await.is_err() {
                        break;
                    }
                    debug!("sweep queued");
                }
            }
        }
        debug!("expiry sweeper stopped");
    })
}
