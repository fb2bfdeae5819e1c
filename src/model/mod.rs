//! Data model: variables, sites, and transactions (spec.md §3).

pub mod site;
pub mod transaction;
pub mod variable;

pub use site::{LockState, Site};
pub use transaction::{PendingOp, Transaction, TxnId, TxnKind, TxnStatus};
pub use variable::Variable;

use std::fmt;
use std::str::FromStr;

use crate::error::SimError;

/// Variables are named `xN` for `N` in `1..=20` (spec.md §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl VarId {
    /// Even-indexed variables are replicated to every site; odd-indexed variables
    /// live only on `1 + (n % 10)` (spec.md §3).
    pub fn is_replicated(self) -> bool {
        self.0 % 2 == 0
    }

    /// The single site an odd (non-replicated) variable lives on.
    pub fn home_site(self) -> u32 {
        1 + (self.0 % 10)
    }

    /// Tick-0 initial value: `10 * N`.
    pub fn initial_value(self) -> i64 {
        10 * self.0 as i64
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl FromStr for VarId {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('x')
            .ok_or_else(|| SimError::Parse(format!("variable name '{}' must start with 'x'", s)))?;
        let n: u32 = digits
            .parse()
            .map_err(|_| SimError::Parse(format!("invalid variable name '{}'", s)))?;
        if !(1..=20).contains(&n) {
            return Err(SimError::Parse(format!(
                "variable id {} out of range 1..=20",
                n
            )));
        }
        Ok(VarId(n))
    }
}
