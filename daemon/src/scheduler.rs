//! Periodic network checks.

use alert_modem::Modem;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs [`Modem::start_network_monitoring`] every `interval`, the first one
/// after a full interval. Checks never overlap and are skipped while a call
/// is being watched.
pub fn spawn(
    modem: Arc<Modem>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    task::spawn(async move {
        info!(?interval, "scheduling network checks");
        let running = Arc::new(Mutex::new(()));
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if modem.call_active() {
                warn!("call in progress, skipping network check");
                continue;
            }

            let Ok(guard) = running.clone().try_lock_owned() else {
                warn!("previous network check still running, skipping");
                continue;
            };

            let modem = modem.clone();
            task::spawn(async move {
                let _guard = guard;
                if let Err(e) = modem.start_network_monitoring().await {
                    error!("network check failed: {e}");
                }
            });
        }

        info!("network check scheduler stopped");
    })
}
