//! Versioned variable storage.
//!
//! Mirrors `Variable` in spec.md §4.1: an ordered committed history plus at most one
//! uncommitted value owned by a single writer. History is kept newest-first so `read`
//! and `dump` never need to re-sort it (the original `variable.py` keeps the same
//! "order by decreasing time" invariant via `list.insert(0, ...)`).

use crate::model::transaction::TxnKind;
use crate::Tick;

/// A single committed version: the tick at which it was committed and its value.
pub type Version = (Tick, i64);

/// A versioned variable. Identified externally by `xN`; this struct only holds state.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Committed history, strictly decreasing by commit tick, newest first.
    /// Invariant: never empty; `history[0]` is tick 0 holding the initial value.
    history: Vec<Version>,
    /// The single pending write, if any transaction currently holds the write lock.
    uncommitted: Option<i64>,
    /// False only for replicated variables on a site that recovered but has not yet
    /// observed a post-recovery commit of this variable (spec.md §4.2 `recover()`).
    available_for_read: bool,
}

impl Variable {
    /// Construct a variable with its tick-0 initial value (`10 * n` per spec.md §3).
    pub fn new(initial_value: i64) -> Self {
        Self {
            history: vec![(0, initial_value)],
            uncommitted: None,
            available_for_read: true,
        }
    }

    pub fn available_for_read(&self) -> bool {
        self.available_for_read
    }

    pub fn set_available_for_read(&mut self, available: bool) {
        self.available_for_read = available;
    }

    pub fn has_uncommitted(&self) -> bool {
        self.uncommitted.is_some()
    }

    /// Latest committed version (tick, value).
    pub fn latest_committed(&self) -> Version {
        self.history[0]
    }

    /// Read per spec.md §4.1. Returns `None` if the read cannot be satisfied right now.
    pub fn read(&self, kind: TxnKind, txn_timestamp: Tick) -> Option<i64> {
        if !self.available_for_read {
            return None;
        }

        match kind {
            TxnKind::ReadWrite => {
                if let Some(v) = self.uncommitted {
                    Some(v)
                } else {
                    Some(self.history[0].1)
                }
            }
            TxnKind::ReadOnly => self
                .history
                .iter()
                .find(|(tick, _)| *tick < txn_timestamp)
                .map(|(_, value)| *value),
        }
    }

    /// Set the single uncommitted slot. Only valid while the caller holds the write lock.
    pub fn write(&mut self, value: i64) {
        self.uncommitted = Some(value);
    }

    /// Commit the pending value at `tick`, and mark available for read again.
    pub fn commit(&mut self, tick: Tick) {
        let value = self
            .uncommitted
            .take()
            .expect("commit called with no uncommitted value");
        debug_assert!(
            self.history.first().map_or(true, |(t, _)| *t < tick),
            "commit ticks must strictly increase"
        );
        self.history.insert(0, (tick, value));
        self.available_for_read = true;
    }

    /// Clear the uncommitted slot without touching history (abort).
    pub fn abort_clear(&mut self) {
        self.uncommitted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_value_is_tick_zero() {
        let v = Variable::new(30);
        assert_eq!(v.latest_committed(), (0, 30));
    }

    #[test]
    fn read_write_txn_sees_uncommitted_over_committed() {
        let mut v = Variable::new(10);
        v.write(99);
        assert_eq!(v.read(TxnKind::ReadWrite, 5), Some(99));
    }

    #[test]
    fn read_write_txn_falls_back_to_committed_without_uncommitted() {
        let v = Variable::new(10);
        assert_eq!(v.read(TxnKind::ReadWrite, 5), Some(10));
    }

    #[test]
    fn read_only_txn_sees_strictly_older_commit() {
        let mut v = Variable::new(10);
        v.write(20);
        v.commit(5);
        // a RO txn started at tick 5 must not see the tick-5 commit
        assert_eq!(v.read(TxnKind::ReadOnly, 5), Some(10));
        assert_eq!(v.read(TxnKind::ReadOnly, 6), Some(20));
    }

    #[test]
    fn read_fails_when_unavailable() {
        let mut v = Variable::new(10);
        v.set_available_for_read(false);
        assert_eq!(v.read(TxnKind::ReadWrite, 1), None);
        assert_eq!(v.read(TxnKind::ReadOnly, 1), None);
    }

    #[test]
    fn abort_clears_only_uncommitted() {
        let mut v = Variable::new(10);
        v.write(50);
        v.abort_clear();
        assert!(!v.has_uncommitted());
        assert_eq!(v.latest_committed(), (0, 10));
    }

    #[test]
    fn commit_prepends_and_reopens_availability() {
        let mut v = Variable::new(10);
        v.set_available_for_read(false);
        v.write(11);
        v.commit(3);
        assert!(v.available_for_read());
        assert_eq!(v.latest_committed(), (3, 11));
    }
}
