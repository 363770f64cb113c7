//! Transfer validation and commit
//!
//! Every transfer moves `Received -> Validated -> Committed`, or to
//! `Rejected` at the first failing check. Nothing is written until all
//! checks pass. The final checks, the replay reservation and the balance
//! update run under the account's mutex, so for one account they form a
//! single atomic step.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::BridgeSettings;
use crate::error::{BridgeError, BridgeResult};
use crate::events::{BridgeEvent, EventSink};
use crate::intent::TransferIntent;
use crate::ledger::{lock_account, AccountLedger, AccountState};
use crate::quorum::SignatureQuorum;
use crate::replay::{ReplayLedger, ReserveOutcome};
use crate::signature::SignatureSet;
use crate::signer_set::{SignerRegistry, SignerSetSnapshot, SignerSetVersion};
use crate::timelock::TimeLockGuard;
use crate::types::{AccountId, Amount, Direction, IntentHash, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Received,
    Validated,
    Committed,
    Rejected,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferStage::Received => "received",
            TransferStage::Validated => "validated",
            TransferStage::Committed => "committed",
            TransferStage::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

fn as_decimal<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub intent_hash: IntentHash,
    pub direction: Direction,
    pub account: AccountId,
    pub amount: Amount,
    pub nonce: u64,
    /// Account balance after this transfer.
    #[serde(serialize_with = "as_decimal")]
    pub locked_balance: u128,
    pub committed_at: Timestamp,
    /// Signer set that approved an unlock; for locks, the set current at
    /// validation time.
    pub signer_set_version: SignerSetVersion,
    pub event_sequence: u64,
    pub event: BridgeEvent,
}

/// Running totals. Commit counters and volumes are updated inside the
/// account's commit step; a reader summing balances across accounts may
/// still observe one account ahead of another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    pub committed_locks: u64,
    pub committed_unlocks: u64,
    pub rejected: u64,
    #[serde(serialize_with = "as_decimal")]
    pub total_locked_volume: u128,
    #[serde(serialize_with = "as_decimal")]
    pub total_unlocked_volume: u128,
}

pub struct TransferStateMachine {
    settings: BridgeSettings,
    guard: TimeLockGuard,
    registry: Arc<SignerRegistry>,
    replay: Arc<ReplayLedger>,
    accounts: AccountLedger,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    stats: Mutex<TransferStats>,
}

impl TransferStateMachine {
    pub fn new(
        settings: BridgeSettings,
        registry: Arc<SignerRegistry>,
        replay: Arc<ReplayLedger>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            guard: TimeLockGuard::new(settings.time_lock_policy()),
            settings,
            registry,
            replay,
            accounts: AccountLedger::new(),
            sink,
            clock,
            stats: Mutex::new(TransferStats::default()),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn account(&self, account: &AccountId) -> AccountState {
        self.accounts.snapshot(account)
    }

    pub fn total_locked(&self) -> u128 {
        self.accounts.total_locked()
    }

    pub fn stats(&self) -> TransferStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and, if every check passes, commit `intent`.
    ///
    /// Unlocks need `signatures`; locks ignore them.
    pub fn submit(
        &self,
        intent: &TransferIntent,
        signatures: Option<&SignatureSet>,
    ) -> BridgeResult<TransferReceipt> {
        debug!(
            hash = %intent.hash(),
            account = %intent.account(),
            direction = %intent.direction(),
            nonce = intent.nonce(),
            stage = %TransferStage::Received,
            "Transfer received"
        );

        let result = self.process(intent, signatures);

        if let Err(err) = &result {
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .rejected += 1;
            warn!(
                hash = %intent.hash(),
                account = %intent.account(),
                direction = %intent.direction(),
                stage = %TransferStage::Rejected,
                error = %err,
                code = err.code(),
                "Transfer rejected"
            );
        }

        result
    }

    fn process(
        &self,
        intent: &TransferIntent,
        signatures: Option<&SignatureSet>,
    ) -> BridgeResult<TransferReceipt> {
        let hash = intent.hash();
        let direction = intent.direction();

        // A committed intent is reported as such regardless of its age
        if self.replay.is_executed(&hash) {
            return Err(BridgeError::AlreadyExecuted);
        }

        let now = self.clock.now();

        // A concurrent submission of the same intent may commit while these
        // checks run; its time lock update must not surface as `TimeLocked`.
        let snapshot = match self.precheck(intent, signatures, now) {
            Ok(snapshot) => snapshot,
            Err(_) if self.replay.is_executed(&hash) => {
                return Err(BridgeError::AlreadyExecuted)
            }
            Err(err) => return Err(err),
        };

        debug!(hash = %hash, stage = %TransferStage::Validated, "Transfer validated");

        let cell = self.accounts.cell(&intent.account());
        let mut state = lock_account(&cell);

        if self.replay.is_executed(&hash) {
            return Err(BridgeError::AlreadyExecuted);
        }
        self.guard
            .check(state.lock.last_action_timestamp, direction, now)?;
        state.check_nonce(direction, intent.nonce())?;
        state.check_balance(direction, intent.amount())?;

        if let ReserveOutcome::AlreadyExecuted(_) = self.replay.reserve(hash, now) {
            return Err(BridgeError::AlreadyExecuted);
        }

        state.commit(direction, intent.amount(), intent.nonce(), now);
        let locked_balance = state.lock.locked_balance;

        let event = BridgeEvent {
            kind: direction.into(),
            account: intent.account(),
            amount: intent.amount(),
            intent_hash: hash,
            timestamp: now,
        };
        let event_sequence = self.sink.publish(&event);
        self.record_commit(direction, intent.amount());
        drop(state);

        info!(
            hash = %hash,
            account = %intent.account(),
            direction = %direction,
            amount = %intent.amount(),
            nonce = intent.nonce(),
            locked_balance = %locked_balance,
            signer_set_version = snapshot.version(),
            stage = %TransferStage::Committed,
            "Transfer committed"
        );

        Ok(TransferReceipt {
            intent_hash: hash,
            direction,
            account: intent.account(),
            amount: intent.amount(),
            nonce: intent.nonce(),
            locked_balance,
            committed_at: now,
            signer_set_version: snapshot.version(),
            event_sequence,
            event,
        })
    }

    fn record_commit(&self, direction: Direction, amount: Amount) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        match direction {
            Direction::Lock => {
                stats.committed_locks += 1;
                stats.total_locked_volume = stats.total_locked_volume.saturating_add(amount.get());
            }
            Direction::Unlock => {
                stats.committed_unlocks += 1;
                stats.total_unlocked_volume =
                    stats.total_unlocked_volume.saturating_add(amount.get());
            }
        }
    }

    /// Checks that need no account lock. Returns the signer set the intent
    /// was validated against.
    fn precheck(
        &self,
        intent: &TransferIntent,
        signatures: Option<&SignatureSet>,
        now: Timestamp,
    ) -> BridgeResult<Arc<SignerSetSnapshot>> {
        if intent.is_expired(now) {
            return Err(BridgeError::IntentExpired {
                expiry: intent.expiry(),
                now,
            });
        }

        let snapshot = self.registry.current();
        if snapshot.paused() {
            return Err(BridgeError::BridgePaused);
        }
        self.check_amount(intent.amount())?;
        self.check_route(intent)?;

        let before = self.accounts.snapshot(&intent.account());
        self.guard
            .check(before.lock.last_action_timestamp, intent.direction(), now)?;

        if intent.direction() == Direction::Unlock {
            let signatures = signatures.ok_or(BridgeError::InsufficientSignatures {
                got: 0,
                required: snapshot.threshold(),
            })?;
            SignatureQuorum::verify(&intent.hash(), signatures, &snapshot)?;
        }

        Ok(snapshot)
    }

    fn check_amount(&self, amount: Amount) -> BridgeResult<()> {
        if !self.settings.amount_in_range(amount.get()) {
            return Err(BridgeError::AmountOutOfRange {
                amount: amount.get(),
                min: self.settings.min_amount,
                max: self.settings.effective_max(),
            });
        }
        Ok(())
    }

    /// Locks leave this chain for the counterpart; unlocks arrive from it.
    fn check_route(&self, intent: &TransferIntent) -> BridgeResult<()> {
        let (src, dest) = match intent.direction() {
            Direction::Lock => (self.settings.this_chain, self.settings.counterpart_chain),
            Direction::Unlock => (self.settings.counterpart_chain, self.settings.this_chain),
        };
        if intent.src_chain() != src || intent.dest_chain() != dest {
            return Err(BridgeError::ChainMismatch {
                expected_src: src,
                expected_dest: dest,
                got_src: intent.src_chain(),
                got_dest: intent.dest_chain(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::EventLog;
    use crate::signature::IntentSigner;
    use std::sync::mpsc;
    use std::thread;
    use crate::types::ChainId;

    const T0: u64 = 1_700_000_000;
    const DAY: u64 = 86_400;

    struct Harness {
        machine: TransferStateMachine,
        clock: Arc<ManualClock>,
        log: Arc<EventLog>,
        keys: Vec<IntentSigner>,
    }

    fn harness() -> Harness {
        let keys: Vec<_> = (1..=3u8).map(|i| IntentSigner::from_bytes(&[i; 32])).collect();
        let registry = Arc::new(SignerRegistry::new(
            SignerSetSnapshot::genesis(keys.iter().map(|k| k.signer_id()), None).unwrap(),
        ));
        let clock = Arc::new(ManualClock::new(T0));
        let log = Arc::new(EventLog::new());
        let machine = TransferStateMachine::new(
            BridgeSettings::new(ChainId::from_u32(1), ChainId::from_u32(2)),
            registry,
            Arc::new(ReplayLedger::new()),
            log.clone(),
            clock.clone(),
        );
        Harness {
            machine,
            clock,
            log,
            keys,
        }
    }

    fn account() -> AccountId {
        AccountId::new([0x0a; 32])
    }

    fn lock(amount: u128, nonce: u64, expiry: u64) -> TransferIntent {
        TransferIntent::new(
            ChainId::from_u32(1),
            ChainId::from_u32(2),
            account(),
            Amount::new(amount).unwrap(),
            nonce,
            Direction::Lock,
            expiry,
        )
        .unwrap()
    }

    fn unlock(amount: u128, nonce: u64, expiry: u64) -> TransferIntent {
        TransferIntent::new(
            ChainId::from_u32(2),
            ChainId::from_u32(1),
            account(),
            Amount::new(amount).unwrap(),
            nonce,
            Direction::Unlock,
            expiry,
        )
        .unwrap()
    }

    #[test]
    fn test_lock_commits_and_emits() {
        let h = harness();
        let receipt = h.machine.submit(&lock(500, 1, T0 + 60), None).unwrap();
        assert_eq!(receipt.locked_balance, 500);
        assert_eq!(receipt.event_sequence, 1);
        assert_eq!(h.log.len(), 1);
        assert_eq!(h.machine.stats().committed_locks, 1);
    }

    #[test]
    fn test_unlock_requires_signatures() {
        let h = harness();
        h.machine.submit(&lock(500, 1, T0 + 60), None).unwrap();
        h.clock.advance(DAY);

        let intent = unlock(100, 1, T0 + DAY + 60);
        assert_eq!(
            h.machine.submit(&intent, None),
            Err(BridgeError::InsufficientSignatures {
                got: 0,
                required: 2
            })
        );

        let sigs = SignatureSet::signed_by(&intent.hash(), &h.keys[..2]);
        let receipt = h.machine.submit(&intent, Some(&sigs)).unwrap();
        assert_eq!(receipt.locked_balance, 400);
        assert_eq!(h.machine.stats().rejected, 1);
    }

    #[test]
    fn test_rejections_do_not_mutate() {
        let h = harness();
        h.machine.submit(&lock(500, 1, T0 + 60), None).unwrap();
        let before = h.machine.account(&account());

        h.clock.advance(DAY);
        let too_much = unlock(501, 1, T0 + DAY + 60);
        let sigs = SignatureSet::signed_by(&too_much.hash(), &h.keys);
        assert_eq!(
            h.machine.submit(&too_much, Some(&sigs)),
            Err(BridgeError::InsufficientBalance {
                available: 500,
                requested: 501
            })
        );
        assert_eq!(h.machine.account(&account()), before);
        assert_eq!(h.log.len(), 1);

        // the hash was not consumed, a valid retry of a different intent works
        let ok = unlock(500, 1, T0 + DAY + 60);
        let sigs = SignatureSet::signed_by(&ok.hash(), &h.keys);
        assert!(h.machine.submit(&ok, Some(&sigs)).is_ok());
    }

    #[test]
    fn test_expired_and_replayed() {
        let h = harness();
        let intent = lock(10, 1, T0 + 5);
        h.machine.submit(&intent, None).unwrap();

        h.clock.advance(10);
        assert_eq!(
            h.machine.submit(&intent, None),
            Err(BridgeError::AlreadyExecuted)
        );

        let stale = lock(10, 2, T0 + 5);
        assert_eq!(
            h.machine.submit(&stale, None),
            Err(BridgeError::IntentExpired {
                expiry: T0 + 5,
                now: T0 + 10
            })
        );
    }

    #[test]
    fn test_lock_must_leave_this_chain() {
        let h = harness();
        let wrong_way = TransferIntent::new(
            ChainId::from_u32(2),
            ChainId::from_u32(1),
            account(),
            Amount::new(10).unwrap(),
            1,
            Direction::Lock,
            T0 + 60,
        )
        .unwrap();
        assert!(matches!(
            h.machine.submit(&wrong_way, None),
            Err(BridgeError::ChainMismatch { .. })
        ));
    }

    #[test]
    fn test_nonce_and_timelock() {
        let h = harness();
        h.machine.submit(&lock(10, 5, T0 + 60), None).unwrap();

        h.clock.advance(1);
        assert_eq!(
            h.machine.submit(&lock(10, 6, T0 + 60), None),
            Err(BridgeError::TimeLocked {
                retry_after: DAY - 1
            })
        );

        h.clock.advance(DAY);
        assert_eq!(
            h.machine.submit(&lock(10, 5, T0 + DAY + 60), None),
            Err(BridgeError::InvalidNonce { last: 5, got: 5 })
        );
        assert!(h.machine.submit(&lock(10, 9, T0 + DAY + 60), None).is_ok());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(TransferStage::Validated.to_string(), "validated");
    }

    #[test]
    fn test_receipt_json_uses_strings_for_balances() {
        let h = harness();
        let receipt = h.machine.submit(&lock(7, 1, T0 + 60), None).unwrap();
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["lockedBalance"], "7");
        assert_eq!(json["amount"], "7");
        assert_eq!(json["direction"], "Lock");
        assert_eq!(json["event"]["type"], "Locked");

        let stats = serde_json::to_value(h.machine.stats()).unwrap();
        assert_eq!(stats["totalLockedVolume"], "7");
    }

    /// Clock that parks the first caller after `arm` until released.
    struct ParkingClock {
        inner: ManualClock,
        gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl ParkingClock {
        fn arm(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (parked_tx, parked_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            *self.gate.lock().unwrap() = Some((parked_tx, release_rx));
            (parked_rx, release_tx)
        }
    }

    impl Clock for ParkingClock {
        fn now(&self) -> Timestamp {
            let gate = self.gate.lock().unwrap().take();
            if let Some((parked, release)) = gate {
                parked.send(()).unwrap();
                release.recv().unwrap();
            }
            self.inner.now()
        }
    }

    #[test]
    fn test_loser_past_replay_lookup_reports_already_executed() {
        let keys: Vec<_> = (1..=3u8).map(|i| IntentSigner::from_bytes(&[i; 32])).collect();
        let clock = Arc::new(ParkingClock {
            inner: ManualClock::new(T0),
            gate: Mutex::new(None),
        });
        let machine = TransferStateMachine::new(
            BridgeSettings::new(ChainId::from_u32(1), ChainId::from_u32(2)),
            Arc::new(SignerRegistry::new(
                SignerSetSnapshot::genesis(keys.iter().map(|k| k.signer_id()), None).unwrap(),
            )),
            Arc::new(ReplayLedger::new()),
            Arc::new(EventLog::new()),
            clock.clone(),
        );

        machine.submit(&lock(500, 1, T0 + 60), None).unwrap();
        clock.inner.advance(DAY);

        let intent = unlock(100, 1, T0 + DAY + 60);
        let sigs = SignatureSet::signed_by(&intent.hash(), &keys[..2]);

        thread::scope(|scope| {
            // The loser passes the replay lookup, then waits on the clock
            let (parked, release) = clock.arm();
            let loser = scope.spawn(|| machine.submit(&intent, Some(&sigs)));
            parked.recv().unwrap();

            // The winner commits and stamps the account's last action time
            let receipt = machine.submit(&intent, Some(&sigs)).unwrap();
            assert_eq!(receipt.locked_balance, 400);

            release.send(()).unwrap();
            assert_eq!(loser.join().unwrap(), Err(BridgeError::AlreadyExecuted));
        });

        assert_eq!(machine.account(&account()).lock.locked_balance, 400);
        let stats = machine.stats();
        assert_eq!(stats.committed_unlocks, 1);
        assert_eq!(stats.rejected, 1);
    }
}
