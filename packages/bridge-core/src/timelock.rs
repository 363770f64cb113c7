//! Per-account rate limit between bridge actions.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::{Direction, Timestamp};

/// Default period between actions: 24 hours.
pub const DEFAULT_PERIOD_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLockPolicy {
    pub lock_period: u64,
    pub unlock_period: u64,
}

impl Default for TimeLockPolicy {
    fn default() -> Self {
        Self {
            lock_period: DEFAULT_PERIOD_SECS,
            unlock_period: DEFAULT_PERIOD_SECS,
        }
    }
}

impl TimeLockPolicy {
    pub fn period(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Lock => self.lock_period,
            Direction::Unlock => self.unlock_period,
        }
    }
}

/// Stateless checker. The commit step records the action time; the guard
/// only reads it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeLockGuard {
    policy: TimeLockPolicy,
}

impl TimeLockGuard {
    pub fn new(policy: TimeLockPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TimeLockPolicy {
        self.policy
    }

    pub fn check(
        &self,
        last_action: Option<Timestamp>,
        direction: Direction,
        now: Timestamp,
    ) -> Result<(), BridgeError> {
        let Some(last) = last_action else {
            return Ok(());
        };
        let unlocks_at = last.saturating_add(self.policy.period(direction));
        if now < unlocks_at {
            return Err(BridgeError::TimeLocked {
                retry_after: unlocks_at - now,
            });
        }
        Ok(())
    }
}
