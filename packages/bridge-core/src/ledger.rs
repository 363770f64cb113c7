//! Per-account bridge state
//!
//! Each account has its own mutex, so transfers for different accounts
//! commit in parallel while transfers for one account are serialized. The
//! outer map lock is only held to find or create an entry.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::error::BridgeError;
use crate::types::{AccountId, Amount, Direction, Timestamp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockState {
    pub last_action_timestamp: Option<Timestamp>,
    pub locked_balance: u128,
}

/// Highest committed nonce per direction. Zero means none committed yet, so
/// the first usable nonce is 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonceCounters {
    pub last_lock_nonce: u64,
    pub last_unlock_nonce: u64,
}

impl NonceCounters {
    pub fn last(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Lock => self.last_lock_nonce,
            Direction::Unlock => self.last_unlock_nonce,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountState {
    pub lock: LockState,
    pub nonces: NonceCounters,
}

impl AccountState {
    /// Nonces must strictly increase per direction. Gaps are allowed.
    pub fn check_nonce(&self, direction: Direction, nonce: u64) -> Result<(), BridgeError> {
        let last = self.nonces.last(direction);
        if nonce <= last {
            return Err(BridgeError::InvalidNonce { last, got: nonce });
        }
        Ok(())
    }

    pub fn check_balance(&self, direction: Direction, amount: Amount) -> Result<(), BridgeError> {
        let balance = self.lock.locked_balance;
        match direction {
            Direction::Unlock if amount.get() > balance => Err(BridgeError::InsufficientBalance {
                available: balance,
                requested: amount.get(),
            }),
            Direction::Lock if balance.checked_add(amount.get()).is_none() => Err(
                BridgeError::InvalidInput("locked balance would overflow".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Apply a validated transfer. Callers must have run [`check_nonce`] and
    /// [`check_balance`] under the same lock.
    ///
    /// [`check_nonce`]: AccountState::check_nonce
    /// [`check_balance`]: AccountState::check_balance
    pub fn commit(&mut self, direction: Direction, amount: Amount, nonce: u64, now: Timestamp) {
        match direction {
            Direction::Lock => {
                self.lock.locked_balance += amount.get();
                self.nonces.last_lock_nonce = nonce;
            }
            Direction::Unlock => {
                self.lock.locked_balance -= amount.get();
                self.nonces.last_unlock_nonce = nonce;
            }
        }
        self.lock.last_action_timestamp = Some(now);
    }

    pub fn view(&self) -> AccountView {
        AccountView {
            locked_balance: self.lock.locked_balance.to_string(),
            last_action_timestamp: self.lock.last_action_timestamp,
            last_lock_nonce: self.nonces.last_lock_nonce,
            last_unlock_nonce: self.nonces.last_unlock_nonce,
        }
    }
}

/// Query form of an account. The balance is a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub locked_balance: String,
    pub last_action_timestamp: Option<Timestamp>,
    pub last_lock_nonce: u64,
    pub last_unlock_nonce: u64,
}

#[derive(Debug, Default)]
pub struct AccountLedger {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<AccountState>>>>,
}

impl AccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The account's cell, created empty on first use.
    pub fn cell(&self, account: &AccountId) -> Arc<Mutex<AccountState>> {
        if let Some(cell) = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
        {
            return cell.clone();
        }
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(*account)
            .or_default()
            .clone()
    }

    /// Copy of the current state. Unknown accounts read as empty and are not
    /// created.
    pub fn snapshot(&self, account: &AccountId) -> AccountState {
        let cell = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(account)
            .cloned();
        let state = match &cell {
            Some(cell) => *lock_account(cell),
            None => AccountState::default(),
        };
        state
    }

    /// Sum of locked balances across all accounts.
    pub fn total_locked(&self) -> u128 {
        let cells: Vec<_> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        cells
            .iter()
            .map(|cell| lock_account(cell).lock.locked_balance)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn lock_account(cell: &Mutex<AccountState>) -> MutexGuard<'_, AccountState> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}
