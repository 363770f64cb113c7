//! Replay ledger
//!
//! Append-only set of consumed intent hashes. Records are never evicted: an
//! intent that executed once stays executed.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::types::{IntentHash, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRecord {
    pub intent_hash: IntentHash,
    pub executed: bool,
    pub executed_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// This call consumed the hash.
    Reserved(ReplayRecord),
    /// Somebody already did; carries their record.
    AlreadyExecuted(ReplayRecord),
}

impl ReserveOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved(_))
    }
}

#[derive(Debug, Default)]
pub struct ReplayLedger {
    records: Mutex<HashMap<IntentHash, ReplayRecord>>,
}

impl ReplayLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically mark `hash` executed. Of any number of concurrent calls for
    /// one hash, exactly one gets `Reserved`.
    pub fn reserve(&self, hash: IntentHash, now: Timestamp) -> ReserveOutcome {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = records.get(&hash) {
            debug!(hash = %hash, "Replay reservation refused");
            return ReserveOutcome::AlreadyExecuted(*existing);
        }
        let record = ReplayRecord {
            intent_hash: hash,
            executed: true,
            executed_at: now,
        };
        records.insert(hash, record);
        ReserveOutcome::Reserved(record)
    }

    pub fn is_executed(&self, hash: &IntentHash) -> bool {
        self.record(hash).is_some()
    }

    pub fn record(&self, hash: &IntentHash) -> Option<ReplayRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_second_reserve_sees_first_record() {
        let ledger = ReplayLedger::new();
        let hash = IntentHash([1u8; 32]);

        let first = ledger.reserve(hash, 10);
        assert!(first.is_reserved());

        match ledger.reserve(hash, 20) {
            ReserveOutcome::AlreadyExecuted(record) => assert_eq!(record.executed_at, 10),
            other => panic!("expected AlreadyExecuted, got {:?}", other),
        }
        assert!(ledger.is_executed(&hash));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_unknown_hash() {
        let ledger = ReplayLedger::new();
        assert!(!ledger.is_executed(&IntentHash([2u8; 32])));
        assert!(ledger.record(&IntentHash([2u8; 32])).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_concurrent_reserve_has_one_winner() {
        let ledger = Arc::new(ReplayLedger::new());
        let hash = IntentHash([7u8; 32]);
        let n = 16;
        let barrier = Arc::new(Barrier::new(n));

        let handles: Vec<_> = (0..n)
            .map(|i| {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    ledger.reserve(hash, i as u64).is_reserved()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(ledger.len(), 1);
    }
}
