//! Bridge Core: Authorization and Replay Protection for the Quorum Bridge
//!
//! This crate decides when a lock on one chain may be turned into an unlock
//! on the other:
//!
//! - **Intents** - Hashable transfer and admin intents with a fixed byte layout
//! - **Quorum** - m-of-n Ed25519 verification against a versioned signer set
//! - **Time lock** - Minimum interval between actions per account
//! - **Replay ledger** - Each intent hash executes at most once
//! - **State machine** - Validation order, atomic commit, event emission
//! - **Controller** - `lock`, `unlock`, quorum-gated administration, queries
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! bridge-core = { path = "../bridge-core" }
//! ```

pub mod admin;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod hash;
pub mod intent;
pub mod ledger;
pub mod observer;
pub mod quorum;
pub mod replay;
pub mod signature;
pub mod signer_set;
pub mod state_machine;
pub mod timelock;
pub mod types;

// Re-export commonly used items at the crate root
pub use admin::{AdminAction, AdminIntent, AdminReceipt};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BridgeSettings;
pub use controller::BridgeController;
pub use error::{BridgeError, BridgeResult};
pub use events::{BridgeEvent, EventKind, EventLog, EventSink, SequencedEvent};
pub use hash::{bytes32_to_hex, compute_transfer_hash, keccak256};
pub use intent::TransferIntent;
pub use ledger::AccountView;
pub use observer::{ChainObserver, Finality, FinalizedEvents, ObservedEvent, ObserverError};
pub use quorum::{QuorumApproval, QuorumError, SignatureQuorum};
pub use replay::{ReplayLedger, ReplayRecord, ReserveOutcome};
pub use signature::{IntentSigner, SignatureBytes, SignatureEntry, SignatureSet};
pub use signer_set::{default_threshold, SignerRegistry, SignerSetSnapshot, SignerSetView};
pub use state_machine::{TransferReceipt, TransferStage, TransferStateMachine, TransferStats};
pub use timelock::{TimeLockGuard, TimeLockPolicy};
pub use types::{AccountId, Amount, ChainId, Direction, IntentHash, SignerId, Timestamp};
