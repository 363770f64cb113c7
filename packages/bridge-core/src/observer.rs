//! Chain observation interface
//!
//! The bridge does not watch chains itself. An observer reports events it
//! has seen on a chain together with their finality; relayers only act on
//! finalized ones.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::events::{BridgeEvent, EventLog};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("Observer unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Finality {
    Pending,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObservedEvent {
    pub sequence: u64,
    pub finality: Finality,
    pub event: BridgeEvent,
}

#[async_trait]
pub trait ChainObserver: Send + Sync {
    /// Events known to the observer with a sequence above `after`, in any
    /// order. Repeats across polls are expected.
    async fn poll(&self, after: u64) -> Result<Vec<ObservedEvent>, ObserverError>;
}

/// Events in the local log are committed, so they are reported finalized.
#[async_trait]
impl ChainObserver for EventLog {
    async fn poll(&self, after: u64) -> Result<Vec<ObservedEvent>, ObserverError> {
        Ok(self
            .since(after)
            .into_iter()
            .map(|e| ObservedEvent {
                sequence: e.sequence,
                finality: Finality::Finalized,
                event: e.event,
            })
            .collect())
    }
}

#[async_trait]
impl<O: ChainObserver + ?Sized> ChainObserver for std::sync::Arc<O> {
    async fn poll(&self, after: u64) -> Result<Vec<ObservedEvent>, ObserverError> {
        (**self).poll(after).await
    }
}

/// Adapter yielding each finalized event exactly once, in sequence order.
///
/// A pending event holds back everything after it, so consumers never see a
/// gap that is filled in later.
pub struct FinalizedEvents<O> {
    observer: O,
    cursor: u64,
}

impl<O: ChainObserver> FinalizedEvents<O> {
    pub fn new(observer: O) -> Self {
        Self::starting_after(observer, 0)
    }

    /// Resume after a sequence already processed.
    pub fn starting_after(observer: O, cursor: u64) -> Self {
        Self { observer, cursor }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub async fn next_batch(&mut self) -> Result<Vec<ObservedEvent>, ObserverError> {
        let mut observed = self.observer.poll(self.cursor).await?;
        observed.retain(|e| e.sequence > self.cursor);
        observed.sort_by_key(|e| e.sequence);
        observed.dedup_by_key(|e| e.sequence);

        let mut batch = Vec::new();
        for event in observed {
            if event.finality != Finality::Finalized {
                debug!(sequence = event.sequence, "Waiting for finality");
                break;
            }
            self.cursor = event.sequence;
            batch.push(event);
        }
        Ok(batch)
    }
}
