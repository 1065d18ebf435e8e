//! Cooperative heartbeat budget.

use std::cell::Cell;

use crate::engine::SearchError;

/// Monotonic heartbeat counter with an optional limit.
///
/// Ticks are never undone: restoring a snapshot rolls back elaboration
/// state, not the work already spent.
#[derive(Debug)]
pub struct Budget {
    limit: u64,
    used: Cell<u64>,
}

impl Budget {
    /// A budget of `limit` heartbeats; 0 means unlimited.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: Cell::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Spend `n` heartbeats.
    pub fn tick(&self, n: u64) {
        self.used.set(self.used.get().saturating_add(n));
    }

    pub fn used(&self) -> u64 {
        self.used.get()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit > 0 && self.used.get() >= self.limit
    }

    /// `Err(BudgetExceeded)` once the limit is reached.
    pub fn check(&self) -> Result<(), SearchError> {
        if self.is_exhausted() {
            return Err(SearchError::BudgetExceeded {
                used: self.used(),
                limit: self.limit,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_at_limit() {
        let budget = Budget::new(3);
        budget.tick(2);
        assert!(budget.check().is_ok());
        budget.tick(1);
        match budget.check() {
            Err(SearchError::BudgetExceeded { used, limit }) => {
                assert_eq!(used, 3);
                assert_eq!(limit, 3);
            }
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_means_unlimited() {
        let budget = Budget::unlimited();
        budget.tick(u64::MAX);
        budget.tick(1);
        assert!(budget.check().is_ok());
        assert_eq!(budget.used(), u64::MAX);
    }
}
