//! Administrative intents
//!
//! Signer-set changes and the pause switch go through the same quorum as
//! transfers. Each admin intent names the signer-set version it was built
//! against, so an intent collected for an older set cannot be applied after a
//! rotation.
//!
//! ## Layout
//!
//! ```text
//! tag(1)=0x02 | action(1) | payload | configVersion(8) | expiry(8)
//! ```
//!
//! Payload is the 32-byte signer key for `AddSigner`/`RemoveSigner`, a
//! big-endian u32 for `SetThreshold`, and empty for `Pause`/`Unpause`.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::hash::{keccak256, ADMIN_INTENT_TAG};
use crate::types::{IntentHash, SignerId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdminAction {
    AddSigner { signer: SignerId },
    RemoveSigner { signer: SignerId },
    SetThreshold { threshold: u32 },
    Pause,
    Unpause,
}

impl AdminAction {
    fn tag(&self) -> u8 {
        match self {
            AdminAction::AddSigner { .. } => 0,
            AdminAction::RemoveSigner { .. } => 1,
            AdminAction::SetThreshold { .. } => 2,
            AdminAction::Pause => 3,
            AdminAction::Unpause => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AdminAction::AddSigner { .. } => "add_signer",
            AdminAction::RemoveSigner { .. } => "remove_signer",
            AdminAction::SetThreshold { .. } => "set_threshold",
            AdminAction::Pause => "pause",
            AdminAction::Unpause => "unpause",
        }
    }
}

/// Pack an admin intent into its canonical byte layout.
pub fn encode_admin_intent(action: &AdminAction, config_version: u64, expiry: Timestamp) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 + 32 + 16);
    data.push(ADMIN_INTENT_TAG);
    data.push(action.tag());
    match action {
        AdminAction::AddSigner { signer } | AdminAction::RemoveSigner { signer } => {
            data.extend_from_slice(signer.as_bytes());
        }
        AdminAction::SetThreshold { threshold } => {
            data.extend_from_slice(&threshold.to_be_bytes());
        }
        AdminAction::Pause | AdminAction::Unpause => {}
    }
    data.extend_from_slice(&config_version.to_be_bytes());
    data.extend_from_slice(&expiry.to_be_bytes());
    data
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminIntentFields {
    action: AdminAction,
    config_version: u64,
    expiry: Timestamp,
}

/// A quorum-gated change to the signer set or bridge state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AdminIntentFields", into = "AdminIntentFields")]
pub struct AdminIntent {
    action: AdminAction,
    config_version: u64,
    expiry: Timestamp,
    hash: IntentHash,
}

impl AdminIntent {
    pub fn new(action: AdminAction, config_version: u64, expiry: Timestamp) -> Self {
        let hash = IntentHash(keccak256(&encode_admin_intent(
            &action,
            config_version,
            expiry,
        )));
        Self {
            action,
            config_version,
            expiry,
            hash,
        }
    }

    pub fn action(&self) -> AdminAction {
        self.action
    }

    pub fn config_version(&self) -> u64 {
        self.config_version
    }

    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }

    pub fn hash(&self) -> IntentHash {
        self.hash
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expiry
    }
}

impl From<AdminIntentFields> for AdminIntent {
    fn from(f: AdminIntentFields) -> Self {
        AdminIntent::new(f.action, f.config_version, f.expiry)
    }
}

impl From<AdminIntent> for AdminIntentFields {
    fn from(i: AdminIntent) -> Self {
        Self {
            action: i.action,
            config_version: i.config_version,
            expiry: i.expiry,
        }
    }
}

/// Outcome of an applied admin intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReceipt {
    pub intent_hash: IntentHash,
    pub action: AdminAction,
    pub previous_version: u64,
    pub new_version: u64,
    pub threshold: u32,
    pub active_signers: usize,
    pub paused: bool,
    pub applied_at: Timestamp,
}

/// Reject admin intents that could never be applied, before any signature
/// work is done.
pub(crate) fn check_expiry(intent: &AdminIntent, now: Timestamp) -> Result<(), BridgeError> {
    if intent.is_expired(now) {
        return Err(BridgeError::IntentExpired {
            expiry: intent.expiry(),
            now,
        });
    }
    Ok(())
}
