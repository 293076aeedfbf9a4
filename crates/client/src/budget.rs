//! Hard ceiling on the number of API calls a job may make.

use crate::error::{ClientError, Result};

#[derive(Clone, Debug)]
pub struct CallBudget {
    max: usize,
    used: usize,
}

impl CallBudget {
    pub fn new(max: usize) -> Self {
        Self { max, used: 0 }
    }

    /// Record one call, or fail without recording it once the ceiling is hit.
    ///
    /// Returns the number of calls made so far, including this one.
    pub fn acquire(&mut self) -> Result<usize> {
        if self.used >= self.max {
            return Err(ClientError::BudgetExhausted { max: self.max });
        }
        self.used += 1;
        Ok(self.used)
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn remaining(&self) -> usize {
        self.max - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_ceiling() {
        let mut budget = CallBudget::new(2);
        assert_eq!(budget.acquire().unwrap(), 1);
        assert_eq!(budget.remaining(), 1);
        assert_eq!(budget.acquire().unwrap(), 2);
        assert!(budget.is_exhausted());

        assert!(matches!(
            budget.acquire(),
            Err(ClientError::BudgetExhausted { max: 2 })
        ));
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn test_zero_budget() {
        let mut budget = CallBudget::new(0);
        assert!(budget.is_exhausted());
        assert!(budget.acquire().is_err());
    }
}
