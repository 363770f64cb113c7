//! Canonical bridge events
//!
//! Every committed transfer produces one [`BridgeEvent`]. Relayers and
//! indexers consume it in one of two encodings, both bit-stable:
//!
//! - JSON: `{"type","account","amount","intentHash","timestamp"}` in that key
//!   order, hex fields lowercase with `0x`, `amount` as a decimal string.
//! - Binary (89 bytes):
//!
//! ```text
//! type(1) | account(32) | amount(16) | intentHash(32) | timestamp(8)
//! ```
//!
//! with `type` 0x00 for `Locked` and 0x01 for `Unlocked`, integers big-endian.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::BridgeError;
use crate::types::{AccountId, Amount, Direction, IntentHash, Timestamp};

pub const EVENT_BINARY_LEN: usize = 89;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Locked,
    Unlocked,
}

impl EventKind {
    pub fn tag(&self) -> u8 {
        match self {
            EventKind::Locked => 0x00,
            EventKind::Unlocked => 0x01,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, BridgeError> {
        match tag {
            0x00 => Ok(EventKind::Locked),
            0x01 => Ok(EventKind::Unlocked),
            other => Err(BridgeError::InvalidInput(format!(
                "unknown event type 0x{:02x}",
                other
            ))),
        }
    }
}

impl From<Direction> for EventKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Lock => EventKind::Locked,
            Direction::Unlock => EventKind::Unlocked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub account: AccountId,
    pub amount: Amount,
    pub intent_hash: IntentHash,
    pub timestamp: Timestamp,
}

impl BridgeEvent {
    pub fn to_json(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::InvalidInput(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(json)
            .map_err(|e| BridgeError::InvalidInput(format!("invalid event json: {}", e)))
    }

    pub fn encode(&self) -> [u8; EVENT_BINARY_LEN] {
        let mut out = [0u8; EVENT_BINARY_LEN];
        out[0] = self.kind.tag();
        out[1..33].copy_from_slice(self.account.as_bytes());
        out[33..49].copy_from_slice(&self.amount.get().to_be_bytes());
        out[49..81].copy_from_slice(self.intent_hash.as_bytes());
        out[81..89].copy_from_slice(&self.timestamp.to_be_bytes());
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, BridgeError> {
        if data.len() != EVENT_BINARY_LEN {
            return Err(BridgeError::InvalidInput(format!(
                "event must be {} bytes, got {}",
                EVENT_BINARY_LEN,
                data.len()
            )));
        }

        let mut account = [0u8; 32];
        account.copy_from_slice(&data[1..33]);
        let mut amount = [0u8; 16];
        amount.copy_from_slice(&data[33..49]);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&data[49..81]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&data[81..89]);

        Ok(Self {
            kind: EventKind::from_tag(data[0])?,
            account: AccountId::new(account),
            amount: Amount::new(u128::from_be_bytes(amount))?,
            intent_hash: IntentHash(hash),
            timestamp: u64::from_be_bytes(ts),
        })
    }
}

/// Destination for committed events.
///
/// `publish` runs inside the commit path, so implementations must not block
/// for long and must not fail: the transfer is already final.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &BridgeEvent) -> u64;
}

/// An event with its position in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequencedEvent {
    pub sequence: u64,
    #[serde(flatten)]
    pub event: BridgeEvent,
}

/// Append-only in-memory event log. Sequence numbers start at 1.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<BridgeEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events with sequence greater than `after`, in order.
    pub fn since(&self, after: u64) -> Vec<SequencedEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events
            .iter()
            .enumerate()
            .skip(after as usize)
            .map(|(i, event)| SequencedEvent {
                sequence: i as u64 + 1,
                event: *event,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: &BridgeEvent) -> u64 {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push(*event);
        let sequence = events.len() as u64;
        debug!(
            sequence,
            kind = ?event.kind,
            hash = %event.intent_hash,
            "Event appended"
        );
        sequence
    }
}
