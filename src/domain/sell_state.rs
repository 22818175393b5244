//! Sell State Machine
//!
//! Two-level retry for the one-shot sell:
//! - cycle level: `Triggered` / `Failed` persist across poll cycles until the
//!   token is `Sold`
//! - attempt level: each triggered cycle gets a fresh `RetryPolicy` budget
//!
//! `Sold` is terminal for the lifetime of the process.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default sell attempts per triggered cycle
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between failed attempts
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Per-token sell status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SellState {
    /// Threshold not reached yet
    #[default]
    NotTriggered,
    /// Threshold reached, sell sequence pending or in progress
    Triggered,
    /// Sell confirmed (or nothing left to sell); never attempted again
    Sold,
    /// Every attempt of the last triggered cycle failed; eligible to re-arm
    Failed { attempts: u32 },
}

impl SellState {
    /// Returns true once the token has been sold
    pub fn is_sold(&self) -> bool {
        matches!(self, SellState::Sold)
    }

    /// Whether a threshold crossing may still start a sell sequence
    pub fn can_trigger(&self) -> bool {
        !self.is_sold()
    }

    /// Move into `Triggered`. Returns false (and stays put) once sold.
    pub fn arm(&mut self) -> bool {
        if self.is_sold() {
            return false;
        }
        *self = SellState::Triggered;
        true
    }

    /// Record a confirmed sell
    pub fn record_sold(&mut self) {
        *self = SellState::Sold;
    }

    /// Record an exhausted attempt budget. A sold token stays sold.
    pub fn record_failed(&mut self, attempts: u32) {
        if !self.is_sold() {
            *self = SellState::Failed { attempts };
        }
    }
}

impl fmt::Display for SellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellState::NotTriggered => write!(f, "not triggered"),
            SellState::Triggered => write!(f, "triggered"),
            SellState::Sold => write!(f, "sold"),
            SellState::Failed { attempts } => write!(f, "failed after {} attempts", attempts),
        }
    }
}

/// Bounded inner retry for one triggered cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per triggered cycle (at least 1)
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Pause to take after a failed `attempt` (1-based), or None after the last
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SellState::default();
        assert_eq!(state, SellState::NotTriggered);
        assert!(state.can_trigger());
        assert!(!state.is_sold());
    }

    #[test]
    fn test_arm_and_sell() {
        let mut state = SellState::NotTriggered;
        assert!(state.arm());
        assert_eq!(state, SellState::Triggered);

        state.record_sold();
        assert!(state.is_sold());
    }

    #[test]
    fn test_sold_is_terminal() {
        let mut state = SellState::Sold;
        assert!(!state.arm());
        assert!(!state.can_trigger());

        state.record_failed(3);
        assert_eq!(state, SellState::Sold);
    }

    #[test]
    fn test_failed_rearms() {
        let mut state = SellState::Triggered;
        state.record_failed(3);
        assert_eq!(state, SellState::Failed { attempts: 3 });
        assert!(state.can_trigger());

        assert!(state.arm());
        assert_eq!(state, SellState::Triggered);
    }

    #[test]
    fn test_retry_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Some(Duration::from_secs(3)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_secs(3)));
        assert_eq!(policy.delay_after(3), None);
    }

    #[test]
    fn test_retry_policy_needs_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SellState::Failed { attempts: 3 }.to_string(), "failed after 3 attempts");
        assert_eq!(SellState::Sold.to_string(), "sold");
    }
}
