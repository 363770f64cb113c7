//! Finalized event feed
//!
//! Polls a [`ChainObserver`] and logs every finalized bridge event once, as
//! a JSON line relayers can tail. Observer failures are logged and retried on
//! the next tick.

use std::time::Duration;

use bridge_core::{ChainObserver, FinalizedEvents};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::server::SharedMetrics;

pub async fn run_event_feed<O: ChainObserver>(
    observer: O,
    metrics: SharedMetrics,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut events = FinalizedEvents::new(observer);
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                debug!(cursor = events.cursor(), "Event feed stopping");
                return;
            }
        }

        match events.next_batch().await {
            Ok(batch) => {
                for observed in batch {
                    match observed.event.to_json() {
                        Ok(json) => info!(
                            sequence = observed.sequence,
                            event = %json,
                            "Finalized bridge event"
                        ),
                        Err(e) => warn!(sequence = observed.sequence, error = %e, "Failed to encode event"),
                    }
                    metrics.last_event_sequence.set(observed.sequence as i64);
                }
            }
            Err(e) => warn!(error = %e, "Observer poll failed"),
        }
    }
}
