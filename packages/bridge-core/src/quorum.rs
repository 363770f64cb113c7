//! m-of-n signature quorum
//!
//! Verification is a pure function of the intent hash, the attached
//! signatures and a pinned signer-set snapshot. Checks run in a fixed order
//! and the first failure is reported:
//!
//! 1. count below threshold
//! 2. unknown/inactive or repeated signer (scanned in set order)
//! 3. strict Ed25519 verification of each signature

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use crate::error::BridgeError;
use crate::signature::SignatureSet;
use crate::signer_set::{SignerSetSnapshot, SignerSetVersion};
use crate::types::{IntentHash, SignerId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuorumError {
    #[error("Insufficient signatures: got {got}, need {required}")]
    InsufficientSignatures { got: usize, required: u32 },

    #[error("Unknown or inactive signer {0}")]
    UnknownSigner(SignerId),

    #[error("Signer {0} appears more than once in the signature set")]
    DuplicateSignerInSet(SignerId),

    #[error("Invalid signature from signer {0}")]
    InvalidSignature(SignerId),
}

impl From<QuorumError> for BridgeError {
    fn from(err: QuorumError) -> Self {
        match err {
            QuorumError::InsufficientSignatures { got, required } => {
                BridgeError::InsufficientSignatures { got, required }
            }
            QuorumError::UnknownSigner(id) => BridgeError::UnknownSigner(id),
            QuorumError::DuplicateSignerInSet(id) => BridgeError::DuplicateSignerInSet(id),
            QuorumError::InvalidSignature(id) => BridgeError::InvalidSignature(id),
        }
    }
}

/// Proof that a quorum approved a hash under a given signer-set version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumApproval {
    pub intent_hash: IntentHash,
    pub signer_set_version: SignerSetVersion,
    pub signers: Vec<SignerId>,
}

pub struct SignatureQuorum;

impl SignatureQuorum {
    pub fn verify(
        intent_hash: &IntentHash,
        signatures: &SignatureSet,
        snapshot: &SignerSetSnapshot,
    ) -> Result<QuorumApproval, QuorumError> {
        let required = snapshot.threshold();
        if signatures.len() < required as usize {
            return Err(QuorumError::InsufficientSignatures {
                got: signatures.len(),
                required,
            });
        }

        let mut seen = BTreeSet::new();
        for entry in signatures.iter() {
            if !snapshot.is_active(&entry.signer) {
                return Err(QuorumError::UnknownSigner(entry.signer));
            }
            if !seen.insert(entry.signer) {
                return Err(QuorumError::DuplicateSignerInSet(entry.signer));
            }
        }

        for entry in signatures.iter() {
            let key = entry
                .signer
                .verifying_key()
                .map_err(|_| QuorumError::InvalidSignature(entry.signer))?;
            key.verify_strict(intent_hash.as_bytes(), &entry.signature.to_signature())
                .map_err(|_| QuorumError::InvalidSignature(entry.signer))?;
        }

        debug!(
            hash = %intent_hash,
            signatures = signatures.len(),
            threshold = required,
            version = snapshot.version(),
            "Quorum reached"
        );

        Ok(QuorumApproval {
            intent_hash: *intent_hash,
            signer_set_version: snapshot.version(),
            signers: signatures.signers(),
        })
    }
}
