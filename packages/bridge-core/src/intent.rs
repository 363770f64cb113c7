//! Transfer intents
//!
//! A [`TransferIntent`] is the unit signers attest to. It is immutable once
//! built and carries its content hash, computed once at construction.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::hash::compute_transfer_hash;
use crate::types::{AccountId, Amount, ChainId, Direction, IntentHash, Timestamp};

/// Wire form of an intent. Deserialization goes through
/// [`TransferIntent::new`], so every decoded intent is validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferIntentFields {
    src_chain: ChainId,
    dest_chain: ChainId,
    account: AccountId,
    amount: Amount,
    nonce: u64,
    direction: Direction,
    expiry: Timestamp,
}

/// A structured, hashable description of a requested transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransferIntentFields", into = "TransferIntentFields")]
pub struct TransferIntent {
    src_chain: ChainId,
    dest_chain: ChainId,
    account: AccountId,
    amount: Amount,
    nonce: u64,
    direction: Direction,
    expiry: Timestamp,
    hash: IntentHash,
}

impl TransferIntent {
    pub fn new(
        src_chain: ChainId,
        dest_chain: ChainId,
        account: AccountId,
        amount: Amount,
        nonce: u64,
        direction: Direction,
        expiry: Timestamp,
    ) -> Result<Self, BridgeError> {
        if src_chain == dest_chain {
            return Err(BridgeError::InvalidInput(format!(
                "source and destination chain are both {}",
                src_chain
            )));
        }

        let hash = IntentHash(compute_transfer_hash(
            src_chain.as_bytes(),
            dest_chain.as_bytes(),
            account.as_bytes(),
            amount.get(),
            nonce,
            direction.tag(),
            expiry,
        ));

        Ok(Self {
            src_chain,
            dest_chain,
            account,
            amount,
            nonce,
            direction,
            expiry,
            hash,
        })
    }

    pub fn src_chain(&self) -> ChainId {
        self.src_chain
    }

    pub fn dest_chain(&self) -> ChainId {
        self.dest_chain
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }

    /// Content hash over every field.
    pub fn hash(&self) -> IntentHash {
        self.hash
    }

    /// An intent is expired strictly after its expiry second.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expiry
    }
}

impl TryFrom<TransferIntentFields> for TransferIntent {
    type Error = BridgeError;

    fn try_from(f: TransferIntentFields) -> Result<Self, Self::Error> {
        TransferIntent::new(
            f.src_chain,
            f.dest_chain,
            f.account,
            f.amount,
            f.nonce,
            f.direction,
            f.expiry,
        )
    }
}

impl From<TransferIntent> for TransferIntentFields {
    fn from(i: TransferIntent) -> Self {
        Self {
            src_chain: i.src_chain,
            dest_chain: i.dest_chain,
            account: i.account,
            amount: i.amount,
            nonce: i.nonce,
            direction: i.direction,
            expiry: i.expiry,
        }
    }
}
