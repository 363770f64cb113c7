//! End-to-end flows through the BridgeController
//!
//! Everything runs in-process against a `ManualClock`, so no infrastructure
//! is needed:
//!
//! ```bash
//! cargo test -p bridge-core --test bridge_flow
//! ```

use std::sync::{Arc, Barrier};
use std::thread;

use bridge_core::{
    AccountId, AdminAction, AdminIntent, Amount, BridgeController, BridgeError, BridgeSettings,
    ChainId, Direction, IntentSigner, ManualClock, SignatureQuorum, SignatureSet,
    TransferIntent,
};

const T0: u64 = 1_700_000_000;
const DAY: u64 = 86_400;
const THIS_CHAIN: u32 = 1;
const COUNTERPART: u32 = 2;

struct Bridge {
    controller: Arc<BridgeController>,
    clock: Arc<ManualClock>,
    keys: Vec<IntentSigner>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bridge_core=debug")
        .with_test_writer()
        .try_init();
}

fn bridge_with(settings: BridgeSettings) -> Bridge {
    init_tracing();
    let keys: Vec<_> = (1..=3u8)
        .map(|i| IntentSigner::from_bytes(&[i; 32]))
        .collect();
    let clock = Arc::new(ManualClock::new(T0));
    let controller = BridgeController::new(
        settings,
        keys.iter().map(|k| k.signer_id()),
        clock.clone(),
    )
    .unwrap();
    Bridge {
        controller: Arc::new(controller),
        clock,
        keys,
    }
}

fn bridge() -> Bridge {
    bridge_with(BridgeSettings::new(
        ChainId::from_u32(THIS_CHAIN),
        ChainId::from_u32(COUNTERPART),
    ))
}

fn alice() -> AccountId {
    AccountId::new([0xa1; 32])
}

fn amount(v: u128) -> Amount {
    Amount::new(v).unwrap()
}

fn unlock_intent(account: AccountId, value: u128, nonce: u64, expiry: u64) -> TransferIntent {
    TransferIntent::new(
        ChainId::from_u32(COUNTERPART),
        ChainId::from_u32(THIS_CHAIN),
        account,
        amount(value),
        nonce,
        Direction::Unlock,
        expiry,
    )
    .unwrap()
}

// ============================================================================
// Worked scenario
// ============================================================================

#[test]
fn test_three_signers_threshold_two() {
    let b = bridge();
    assert_eq!(b.controller.signer_set().threshold(), 2);

    // Fund the account one day before the unlock
    b.controller.lock(alice(), amount(250)).unwrap();
    b.clock.advance(DAY);

    let intent = unlock_intent(alice(), 100, 1, T0 + DAY + 600);
    let s1 = &b.keys[0];
    let s2 = &b.keys[1];

    // Only S1: rejected, nothing consumed
    let only_s1 = SignatureSet::signed_by(&intent.hash(), [s1]);
    assert_eq!(
        b.controller.unlock(&intent, &only_s1),
        Err(BridgeError::InsufficientSignatures {
            got: 1,
            required: 2
        })
    );
    assert!(!b.controller.is_executed(&intent.hash()));

    // S1 + S2: accepted, balance debited, Unlocked event emitted
    let s1_s2 = SignatureSet::signed_by(&intent.hash(), [s1, s2]);
    let receipt = b.controller.unlock(&intent, &s1_s2).unwrap();
    assert_eq!(receipt.locked_balance, 150);
    assert_eq!(b.controller.account(&alice()).locked_balance, "150");
    let events = b.controller.events_since(0);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event.intent_hash, intent.hash());

    // Resubmitted: AlreadyExecuted, no state change
    assert_eq!(
        b.controller.unlock(&intent, &s1_s2),
        Err(BridgeError::AlreadyExecuted)
    );
    assert_eq!(b.controller.account(&alice()).locked_balance, "150");
    assert_eq!(b.controller.events_since(0).len(), 2);

    // Another unlock one second after the previous action
    b.clock.advance(1);
    let next = unlock_intent(alice(), 10, 2, T0 + DAY + 600);
    let sigs = SignatureSet::signed_by(&next.hash(), [s1, s2]);
    assert_eq!(
        b.controller.unlock(&next, &sigs),
        Err(BridgeError::TimeLocked {
            retry_after: 86_399
        })
    );
}

// ============================================================================
// Protocol properties
// ============================================================================

#[test]
fn test_timelock_countdown_and_release() {
    let b = bridge();
    b.controller.lock(alice(), amount(10)).unwrap();

    for elapsed in [1u64, 60, 43_200, DAY - 1] {
        b.clock.set(T0 + elapsed);
        let err = b.controller.lock(alice(), amount(1)).unwrap_err();
        assert_eq!(err.retry_after(), Some(DAY - elapsed));
        assert!(err.is_retryable());
    }

    b.clock.set(T0 + DAY);
    assert!(b.controller.lock(alice(), amount(1)).is_ok());
}

#[test]
fn test_conservation_over_mixed_history() {
    let b = bridge();
    let mut locked = 0u128;
    let mut unlocked = 0u128;
    let mut unlock_nonce = 0;

    for round in 0..6u64 {
        let now = T0 + round * DAY;
        b.clock.set(now);
        if round % 2 == 0 {
            let value = 100 + round as u128;
            b.controller.lock(alice(), amount(value)).unwrap();
            locked += value;
        } else {
            unlock_nonce += 1;
            let value = 50;
            let intent = unlock_intent(alice(), value, unlock_nonce, now + 60);
            let sigs = SignatureSet::signed_by(&intent.hash(), &b.keys);
            b.controller.unlock(&intent, &sigs).unwrap();
            unlocked += value;
        }
        let balance: u128 = b.controller.account(&alice()).locked_balance.parse().unwrap();
        assert_eq!(balance, locked - unlocked);
    }

    // An unlock larger than the balance never drives it negative
    b.clock.set(T0 + 10 * DAY);
    let greedy = unlock_intent(alice(), locked, unlock_nonce + 1, T0 + 11 * DAY);
    let sigs = SignatureSet::signed_by(&greedy.hash(), &b.keys);
    assert_eq!(
        b.controller.unlock(&greedy, &sigs),
        Err(BridgeError::InsufficientBalance {
            available: locked - unlocked,
            requested: locked,
        })
    );

    let stats = b.controller.stats();
    assert_eq!(stats.total_locked_volume - stats.total_unlocked_volume, locked - unlocked);
    assert_eq!(b.controller.total_locked(), locked - unlocked);
}

#[test]
fn test_concurrent_submissions_commit_once() {
    // Default 24h time lock: the winner's commit must not turn losers into
    // retryable TimeLocked rejections
    let b = bridge();

    b.controller.lock(alice(), amount(1_000)).unwrap();
    b.clock.advance(DAY);

    let intent = Arc::new(unlock_intent(alice(), 400, 1, T0 + DAY + 60));
    let sigs = Arc::new(SignatureSet::signed_by(&intent.hash(), &b.keys[..2]));

    let n = 12;
    let barrier = Arc::new(Barrier::new(n));
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let controller = b.controller.clone();
            let intent = intent.clone();
            let sigs = sigs.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                controller.unlock(&intent, &sigs)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let committed = results.iter().filter(|r| r.is_ok()).count();
    let replayed = results
        .iter()
        .filter(|r| matches!(r, Err(BridgeError::AlreadyExecuted)))
        .count();

    assert_eq!(committed, 1);
    assert_eq!(replayed, n - 1);
    assert_eq!(b.controller.account(&alice()).locked_balance, "600");
    assert_eq!(b.controller.events_since(0).len(), 2);
}

#[test]
fn test_disjoint_accounts_commit_in_parallel() {
    let b = bridge();
    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let controller = b.controller.clone();
            thread::spawn(move || controller.lock(AccountId::new([i; 32]), amount(10)))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(b.controller.total_locked(), 80);
    assert_eq!(b.controller.executed_count(), 8);
}

#[test]
fn test_expired_intent_never_commits() {
    let b = bridge();
    b.controller.lock(alice(), amount(100)).unwrap();
    b.clock.set(T0 + 2 * DAY);

    let intent = unlock_intent(alice(), 10, 1, T0 + DAY);
    let sigs = SignatureSet::signed_by(&intent.hash(), &b.keys);
    assert_eq!(
        b.controller.unlock(&intent, &sigs),
        Err(BridgeError::IntentExpired {
            expiry: T0 + DAY,
            now: T0 + 2 * DAY
        })
    );
}

#[test]
fn test_amount_bounds() {
    let mut settings = BridgeSettings::new(ChainId::from_u32(THIS_CHAIN), ChainId::from_u32(COUNTERPART));
    settings.min_amount = 10;
    settings.max_amount = 1_000;
    let b = bridge_with(settings);

    assert_eq!(
        b.controller.lock(alice(), amount(9)),
        Err(BridgeError::AmountOutOfRange {
            amount: 9,
            min: 10,
            max: 1_000
        })
    );
    assert!(b.controller.lock(alice(), amount(1_000)).is_ok());
}

// ============================================================================
// Signer-set administration
// ============================================================================

#[test]
fn test_rotation_requires_majority_of_current_set() {
    let b = bridge();
    let newcomer = IntentSigner::from_bytes(&[0x44; 32]);

    let add = AdminIntent::new(
        AdminAction::AddSigner {
            signer: newcomer.signer_id(),
        },
        1,
        T0 + 60,
    );

    // The newcomer cannot vote itself in
    let sigs = SignatureSet::signed_by(&add.hash(), [&b.keys[0], &newcomer]);
    assert_eq!(
        b.controller.administer(&add, &sigs),
        Err(BridgeError::UnknownSigner(newcomer.signer_id()))
    );

    let sigs = SignatureSet::signed_by(&add.hash(), &b.keys[..2]);
    let receipt = b.controller.administer(&add, &sigs).unwrap();
    assert_eq!(receipt.new_version, 2);
    assert_eq!(receipt.active_signers, 4);

    // Same intent again, now stale and already executed
    assert_eq!(
        b.controller.administer(&add, &sigs),
        Err(BridgeError::AlreadyExecuted)
    );

    // An intent built for version 1 is refused once version 2 is live
    let late = AdminIntent::new(AdminAction::SetThreshold { threshold: 3 }, 1, T0 + 60);
    let sigs = SignatureSet::signed_by(&late.hash(), &b.keys);
    assert_eq!(
        b.controller.administer(&late, &sigs),
        Err(BridgeError::StaleConfigVersion { current: 2, got: 1 })
    );
}

#[test]
fn test_removed_signer_loses_its_vote() {
    let b = bridge();
    b.controller.lock(alice(), amount(100)).unwrap();

    let remove = AdminIntent::new(
        AdminAction::RemoveSigner {
            signer: b.keys[2].signer_id(),
        },
        1,
        T0 + 60,
    );
    let sigs = SignatureSet::signed_by(&remove.hash(), &b.keys[..2]);
    b.controller.administer(&remove, &sigs).unwrap();

    b.clock.advance(DAY);
    let intent = unlock_intent(alice(), 10, 1, T0 + DAY + 60);
    let sigs = SignatureSet::signed_by(&intent.hash(), [&b.keys[0], &b.keys[2]]);
    assert_eq!(
        b.controller.unlock(&intent, &sigs),
        Err(BridgeError::UnknownSigner(b.keys[2].signer_id()))
    );
}

#[test]
fn test_pinned_snapshot_survives_rotation() {
    let b = bridge();
    let intent = unlock_intent(alice(), 10, 1, T0 + 60);
    let sigs = SignatureSet::signed_by(&intent.hash(), [&b.keys[0], &b.keys[2]]);

    let pinned = b.controller.signer_set();

    let remove = AdminIntent::new(
        AdminAction::RemoveSigner {
            signer: b.keys[2].signer_id(),
        },
        1,
        T0 + 60,
    );
    let admin_sigs = SignatureSet::signed_by(&remove.hash(), &b.keys[..2]);
    b.controller.administer(&remove, &admin_sigs).unwrap();

    // Verification that started before the rotation still holds
    let approval = SignatureQuorum::verify(&intent.hash(), &sigs, &pinned).unwrap();
    assert_eq!(approval.signer_set_version, 1);

    // The live set has moved on
    assert!(SignatureQuorum::verify(&intent.hash(), &sigs, &b.controller.signer_set()).is_err());
}

#[test]
fn test_admin_signatures_do_not_authorize_transfers() {
    let b = bridge();
    b.controller.lock(alice(), amount(100)).unwrap();
    b.clock.advance(DAY);

    let intent = unlock_intent(alice(), 10, 1, T0 + DAY + 60);
    let admin = AdminIntent::new(AdminAction::Pause, 1, T0 + DAY + 60);
    let wrong = SignatureSet::signed_by(&admin.hash(), &b.keys);
    assert_eq!(
        b.controller.unlock(&intent, &wrong),
        Err(BridgeError::InvalidSignature(b.keys[0].signer_id()))
    );
}

#[test]
fn test_pause_and_unpause() {
    let b = bridge();
    let pause = AdminIntent::new(AdminAction::Pause, 1, T0 + 60);
    b.controller
        .administer(&pause, &SignatureSet::signed_by(&pause.hash(), &b.keys[..2]))
        .unwrap();
    assert_eq!(
        b.controller.lock(alice(), amount(5)),
        Err(BridgeError::BridgePaused)
    );

    let unpause = AdminIntent::new(AdminAction::Unpause, 2, T0 + 60);
    b.controller
        .administer(&unpause, &SignatureSet::signed_by(&unpause.hash(), &b.keys[1..]))
        .unwrap();
    assert!(b.controller.lock(alice(), amount(5)).is_ok());
}
