//! Error types for the bridge core
//!
//! Every validation failure is reported with its specific kind. Relayers key
//! off [`BridgeError::code`] and [`BridgeError::is_retryable`] to tell a
//! transient rejection (`TimeLocked`) from a permanent one (`AlreadyExecuted`,
//! `IntentExpired`).

use thiserror::Error;

use crate::types::{ChainId, SignerId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // ========================================================================
    // Quorum Errors
    // ========================================================================
    #[error("Insufficient signatures: got {got}, need {required}")]
    InsufficientSignatures { got: usize, required: u32 },

    #[error("Invalid signature from signer {0}")]
    InvalidSignature(SignerId),

    #[error("Unknown or inactive signer {0}")]
    UnknownSigner(SignerId),

    #[error("Signer {0} appears more than once in the signature set")]
    DuplicateSignerInSet(SignerId),

    // ========================================================================
    // Replay & Timing Errors
    // ========================================================================
    #[error("Time locked: retry after {retry_after} seconds")]
    TimeLocked { retry_after: u64 },

    #[error("Intent already executed")]
    AlreadyExecuted,

    #[error("Intent expired at {expiry} (now {now})")]
    IntentExpired { expiry: u64, now: u64 },

    // ========================================================================
    // Account Errors
    // ========================================================================
    #[error("Insufficient locked balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u128, requested: u128 },

    #[error("Invalid nonce: last committed {last}, got {got}")]
    InvalidNonce { last: u64, got: u64 },

    // ========================================================================
    // Bridge State Errors
    // ========================================================================
    #[error("Bridge is paused")]
    BridgePaused,

    #[error("Amount {amount} outside allowed range [{min}, {max}]")]
    AmountOutOfRange { amount: u128, min: u128, max: u128 },

    #[error("Chain mismatch: expected {expected_src} -> {expected_dest}, got {got_src} -> {got_dest}")]
    ChainMismatch {
        expected_src: ChainId,
        expected_dest: ChainId,
        got_src: ChainId,
        got_dest: ChainId,
    },

    #[error("Wrong intent direction for this operation")]
    WrongDirection,

    // ========================================================================
    // Admin Errors
    // ========================================================================
    #[error("Stale signer set version: current {current}, got {got}")]
    StaleConfigVersion { current: u64, got: u64 },

    #[error("Signer {0} is already active")]
    SignerAlreadyActive(SignerId),

    #[error("Signer {0} is not an active signer")]
    SignerNotActive(SignerId),

    #[error("Invalid threshold {threshold} for {active} active signers")]
    InvalidThreshold { threshold: u32, active: usize },

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BridgeError {
    /// Stable snake_case identifier, safe to match on across versions.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InsufficientSignatures { .. } => "insufficient_signatures",
            BridgeError::InvalidSignature(_) => "invalid_signature",
            BridgeError::UnknownSigner(_) => "unknown_signer",
            BridgeError::DuplicateSignerInSet(_) => "duplicate_signer_in_set",
            BridgeError::TimeLocked { .. } => "time_locked",
            BridgeError::AlreadyExecuted => "already_executed",
            BridgeError::IntentExpired { .. } => "intent_expired",
            BridgeError::InsufficientBalance { .. } => "insufficient_balance",
            BridgeError::InvalidNonce { .. } => "invalid_nonce",
            BridgeError::BridgePaused => "bridge_paused",
            BridgeError::AmountOutOfRange { .. } => "amount_out_of_range",
            BridgeError::ChainMismatch { .. } => "chain_mismatch",
            BridgeError::WrongDirection => "wrong_direction",
            BridgeError::StaleConfigVersion { .. } => "stale_config_version",
            BridgeError::SignerAlreadyActive(_) => "signer_already_active",
            BridgeError::SignerNotActive(_) => "signer_not_active",
            BridgeError::InvalidThreshold { .. } => "invalid_threshold",
            BridgeError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Whether resubmitting the same request later can succeed.
    ///
    /// Only the time lock clears on its own. A paused bridge needs an admin
    /// action, so it is not reported as retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::TimeLocked { .. })
    }

    /// Seconds to wait before retrying, for retryable errors.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            BridgeError::TimeLocked { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// True for failures of the signature quorum check.
    pub fn is_quorum_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::InsufficientSignatures { .. }
                | BridgeError::InvalidSignature(_)
                | BridgeError::UnknownSigner(_)
                | BridgeError::DuplicateSignerInSet(_)
        )
    }
}

/// Shorthand for results in this crate.
pub type BridgeResult<T> = Result<T, BridgeError>;
