//! Versioned signer set
//!
//! The active signers, the quorum threshold and the pause switch live in one
//! immutable [`SignerSetSnapshot`]. Changes build a new snapshot with
//! `version + 1` and swap it in; readers hold an `Arc` to the snapshot they
//! started with, so a rotation never changes the rules under an in-flight
//! verification.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::admin::AdminAction;
use crate::error::BridgeError;
use crate::types::SignerId;

/// Signer-set version, incremented on every applied admin action.
pub type SignerSetVersion = u64;

/// Majority threshold for `n` signers: `floor(n / 2) + 1`.
pub fn default_threshold(n: usize) -> u32 {
    (n / 2 + 1) as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerSetSnapshot {
    version: SignerSetVersion,
    signers: BTreeMap<SignerId, bool>,
    threshold: u32,
    paused: bool,
}

impl SignerSetSnapshot {
    /// Initial set at version 1. `threshold` defaults to a majority.
    pub fn genesis(
        signers: impl IntoIterator<Item = SignerId>,
        threshold: Option<u32>,
    ) -> Result<Self, BridgeError> {
        let mut map = BTreeMap::new();
        for signer in signers {
            if map.insert(signer, true).is_some() {
                return Err(BridgeError::InvalidInput(format!(
                    "signer {} listed more than once",
                    signer
                )));
            }
        }
        if map.is_empty() {
            return Err(BridgeError::InvalidInput(
                "signer set must not be empty".to_string(),
            ));
        }

        let threshold = threshold.unwrap_or_else(|| default_threshold(map.len()));
        check_threshold(threshold, map.len())?;

        Ok(Self {
            version: 1,
            signers: map,
            threshold,
            paused: false,
        })
    }

    pub fn version(&self) -> SignerSetVersion {
        self.version
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn is_active(&self, signer: &SignerId) -> bool {
        self.signers.get(signer).copied().unwrap_or(false)
    }

    pub fn active_signers(&self) -> impl Iterator<Item = &SignerId> {
        self.signers
            .iter()
            .filter(|(_, active)| **active)
            .map(|(id, _)| id)
    }

    pub fn active_count(&self) -> usize {
        self.active_signers().count()
    }

    /// Build the successor snapshot for `action`. Does not touch `self`.
    pub fn apply(&self, action: &AdminAction) -> Result<Self, BridgeError> {
        let mut next = self.clone();
        next.version = self.version + 1;

        match *action {
            AdminAction::AddSigner { signer } => {
                if self.is_active(&signer) {
                    return Err(BridgeError::SignerAlreadyActive(signer));
                }
                next.signers.insert(signer, true);
            }
            AdminAction::RemoveSigner { signer } => {
                if !self.is_active(&signer) {
                    return Err(BridgeError::SignerNotActive(signer));
                }
                next.signers.insert(signer, false);
                check_threshold(next.threshold, next.active_count())?;
            }
            AdminAction::SetThreshold { threshold } => {
                check_threshold(threshold, self.active_count())?;
                next.threshold = threshold;
            }
            AdminAction::Pause => next.paused = true,
            AdminAction::Unpause => next.paused = false,
        }

        Ok(next)
    }

    pub fn view(&self) -> SignerSetView {
        SignerSetView {
            version: self.version,
            threshold: self.threshold,
            paused: self.paused,
            active_signers: self.active_count(),
            signers: self
                .signers
                .iter()
                .map(|(signer, active)| SignerStatus {
                    signer: *signer,
                    active: *active,
                })
                .collect(),
        }
    }
}

fn check_threshold(threshold: u32, active: usize) -> Result<(), BridgeError> {
    if threshold == 0 || threshold as usize > active {
        return Err(BridgeError::InvalidThreshold { threshold, active });
    }
    Ok(())
}

/// Serializable form of a snapshot, for queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerSetView {
    pub version: SignerSetVersion,
    pub threshold: u32,
    pub paused: bool,
    pub active_signers: usize,
    pub signers: Vec<SignerStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerStatus {
    pub signer: SignerId,
    pub active: bool,
}

/// Holder of the current snapshot.
#[derive(Debug)]
pub struct SignerRegistry {
    current: RwLock<Arc<SignerSetSnapshot>>,
}

impl SignerRegistry {
    pub fn new(genesis: SignerSetSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(genesis)),
        }
    }

    /// Pin the current snapshot.
    pub fn current(&self) -> Arc<SignerSetSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `f` against the current snapshot while holding the write lock and
    /// install whatever it returns. Concurrent updates are serialized, and a
    /// failed `f` leaves the registry unchanged.
    pub fn update<F>(&self, f: F) -> Result<Arc<SignerSetSnapshot>, BridgeError>
    where
        F: FnOnce(&Arc<SignerSetSnapshot>) -> Result<SignerSetSnapshot, BridgeError>,
    {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(f(&guard)?);
        *guard = next.clone();
        Ok(next)
    }
}
