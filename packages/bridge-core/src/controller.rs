//! Public bridge surface
//!
//! [`BridgeController`] owns the state machine, the signer registry and the
//! event log for one side of the bridge. `lock` and `unlock` are independent
//! calls; they are linked only by the `Locked` event a relayer observes and
//! the intent hash the signers attest to.

use std::sync::Arc;
use tracing::{info, warn};

use crate::admin::{check_expiry, AdminIntent, AdminReceipt};
use crate::clock::Clock;
use crate::config::BridgeSettings;
use crate::error::{BridgeError, BridgeResult};
use crate::events::{EventLog, SequencedEvent};
use crate::intent::TransferIntent;
use crate::ledger::AccountView;
use crate::quorum::SignatureQuorum;
use crate::replay::{ReplayLedger, ReplayRecord, ReserveOutcome};
use crate::signature::SignatureSet;
use crate::signer_set::{SignerRegistry, SignerSetSnapshot};
use crate::state_machine::{TransferReceipt, TransferStateMachine, TransferStats};
use crate::types::{AccountId, Amount, Direction, IntentHash, SignerId};

pub struct BridgeController {
    machine: TransferStateMachine,
    registry: Arc<SignerRegistry>,
    replay: Arc<ReplayLedger>,
    events: Arc<EventLog>,
    clock: Arc<dyn Clock>,
}

impl BridgeController {
    /// Build a controller with `signers` as the version-1 signer set.
    pub fn new(
        settings: BridgeSettings,
        signers: impl IntoIterator<Item = SignerId>,
        clock: Arc<dyn Clock>,
    ) -> BridgeResult<Self> {
        settings.validate()?;
        let genesis = SignerSetSnapshot::genesis(signers, settings.threshold)?;

        info!(
            this_chain = %settings.this_chain,
            counterpart_chain = %settings.counterpart_chain,
            signers = genesis.active_count(),
            threshold = genesis.threshold(),
            "Bridge controller initialized"
        );

        let registry = Arc::new(SignerRegistry::new(genesis));
        let replay = Arc::new(ReplayLedger::new());
        let events = Arc::new(EventLog::new());
        let machine = TransferStateMachine::new(
            settings,
            registry.clone(),
            replay.clone(),
            events.clone(),
            clock.clone(),
        );

        Ok(Self {
            machine,
            registry,
            replay,
            events,
            clock,
        })
    }

    /// The intent `lock` would submit for `caller` right now.
    pub fn lock_intent(&self, caller: AccountId, amount: Amount) -> BridgeResult<TransferIntent> {
        let settings = self.machine.settings();
        let nonce = self
            .machine
            .account(&caller)
            .nonces
            .last_lock_nonce
            .checked_add(1)
            .ok_or_else(|| BridgeError::InvalidInput("lock nonce exhausted".to_string()))?;
        let expiry = self.clock.now().saturating_add(settings.intent_ttl_secs);

        TransferIntent::new(
            settings.this_chain,
            settings.counterpart_chain,
            caller,
            amount,
            nonce,
            Direction::Lock,
            expiry,
        )
    }

    /// Lock `amount` for `caller` on this chain.
    ///
    /// Caller authentication happens in front of this call; the controller
    /// trusts the account it is given.
    pub fn lock(&self, caller: AccountId, amount: Amount) -> BridgeResult<TransferReceipt> {
        let intent = self.lock_intent(caller, amount)?;
        self.machine.submit(&intent, None)
    }

    /// Release funds described by a quorum-signed unlock intent.
    pub fn unlock(
        &self,
        intent: &TransferIntent,
        signatures: &SignatureSet,
    ) -> BridgeResult<TransferReceipt> {
        if intent.direction() != Direction::Unlock {
            return Err(BridgeError::WrongDirection);
        }
        self.machine.submit(intent, Some(signatures))
    }

    /// Apply a quorum-signed admin intent to the signer set.
    pub fn administer(
        &self,
        intent: &AdminIntent,
        signatures: &SignatureSet,
    ) -> BridgeResult<AdminReceipt> {
        let result = self.apply_admin(intent, signatures);
        if let Err(err) = &result {
            warn!(
                hash = %intent.hash(),
                action = intent.action().name(),
                config_version = intent.config_version(),
                error = %err,
                "Admin intent rejected"
            );
        }
        result
    }

    fn apply_admin(
        &self,
        intent: &AdminIntent,
        signatures: &SignatureSet,
    ) -> BridgeResult<AdminReceipt> {
        let hash = intent.hash();
        let now = self.clock.now();

        if self.replay.is_executed(&hash) {
            return Err(BridgeError::AlreadyExecuted);
        }
        check_expiry(intent, now)?;

        let mut previous_version = 0;
        let next = self.registry.update(|current| {
            if intent.config_version() != current.version() {
                return Err(BridgeError::StaleConfigVersion {
                    current: current.version(),
                    got: intent.config_version(),
                });
            }
            SignatureQuorum::verify(&hash, signatures, current)?;
            let next = current.apply(&intent.action())?;
            if let ReserveOutcome::AlreadyExecuted(_) = self.replay.reserve(hash, now) {
                return Err(BridgeError::AlreadyExecuted);
            }
            previous_version = current.version();
            Ok(next)
        })?;

        info!(
            hash = %hash,
            action = intent.action().name(),
            version = next.version(),
            threshold = next.threshold(),
            active_signers = next.active_count(),
            paused = next.paused(),
            "Admin intent applied"
        );

        Ok(AdminReceipt {
            intent_hash: hash,
            action: intent.action(),
            previous_version,
            new_version: next.version(),
            threshold: next.threshold(),
            active_signers: next.active_count(),
            paused: next.paused(),
            applied_at: now,
        })
    }

    pub fn account(&self, account: &AccountId) -> AccountView {
        self.machine.account(account).view()
    }

    pub fn is_executed(&self, hash: &IntentHash) -> bool {
        self.replay.is_executed(hash)
    }

    pub fn replay_record(&self, hash: &IntentHash) -> Option<ReplayRecord> {
        self.replay.record(hash)
    }

    pub fn executed_count(&self) -> usize {
        self.replay.len()
    }

    /// Pinned view of the current signer set.
    pub fn signer_set(&self) -> Arc<SignerSetSnapshot> {
        self.registry.current()
    }

    pub fn stats(&self) -> TransferStats {
        self.machine.stats()
    }

    pub fn total_locked(&self) -> u128 {
        self.machine.total_locked()
    }

    pub fn events_since(&self, sequence: u64) -> Vec<SequencedEvent> {
        self.events.since(sequence)
    }

    /// Shared handle to the event log, e.g. to feed a chain observer.
    pub fn event_log(&self) -> Arc<EventLog> {
        self.events.clone()
    }

    pub fn settings(&self) -> &BridgeSettings {
        self.machine.settings()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }
}
