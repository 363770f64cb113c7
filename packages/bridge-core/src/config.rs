//! Bridge settings
//!
//! Chain routing, rate limits and amount bounds for one side of the bridge.
//! The node fills this from the environment; tests build it directly.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::timelock::{TimeLockPolicy, DEFAULT_PERIOD_SECS};
use crate::types::ChainId;

fn default_period() -> u64 {
    DEFAULT_PERIOD_SECS
}

fn default_intent_ttl() -> u64 {
    3_600
}

fn default_min_amount() -> u128 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Chain this ledger runs on. Locks originate here.
    pub this_chain: ChainId,
    /// The other side. Unlock intents must come from it.
    pub counterpart_chain: ChainId,

    #[serde(default = "default_period")]
    pub lock_period_secs: u64,
    #[serde(default = "default_period")]
    pub unlock_period_secs: u64,

    /// Expiry offset for locks built by the controller.
    #[serde(default = "default_intent_ttl")]
    pub intent_ttl_secs: u64,

    #[serde(default = "default_min_amount")]
    pub min_amount: u128,
    /// 0 disables the upper bound.
    #[serde(default)]
    pub max_amount: u128,

    /// Quorum threshold; `None` means a majority of the genesis signers.
    #[serde(default)]
    pub threshold: Option<u32>,
}

impl BridgeSettings {
    pub fn new(this_chain: ChainId, counterpart_chain: ChainId) -> Self {
        Self {
            this_chain,
            counterpart_chain,
            lock_period_secs: DEFAULT_PERIOD_SECS,
            unlock_period_secs: DEFAULT_PERIOD_SECS,
            intent_ttl_secs: default_intent_ttl(),
            min_amount: default_min_amount(),
            max_amount: 0,
            threshold: None,
        }
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.this_chain == self.counterpart_chain {
            return Err(BridgeError::InvalidInput(
                "this_chain and counterpart_chain must differ".to_string(),
            ));
        }
        if self.intent_ttl_secs == 0 {
            return Err(BridgeError::InvalidInput(
                "intent_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_amount != 0 && self.max_amount < self.min_amount {
            return Err(BridgeError::InvalidInput(format!(
                "max_amount {} is below min_amount {}",
                self.max_amount, self.min_amount
            )));
        }
        Ok(())
    }

    pub fn time_lock_policy(&self) -> TimeLockPolicy {
        TimeLockPolicy {
            lock_period: self.lock_period_secs,
            unlock_period: self.unlock_period_secs,
        }
    }

    /// Upper bound for reporting; `u128::MAX` when uncapped.
    pub fn effective_max(&self) -> u128 {
        if self.max_amount == 0 {
            u128::MAX
        } else {
            self.max_amount
        }
    }

    pub fn amount_in_range(&self, amount: u128) -> bool {
        amount >= self.min_amount && amount <= self.effective_max()
    }
}
