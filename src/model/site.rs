//! A single replica: its variables plus the lock table that guards them (spec.md §4.2).

use std::collections::{HashMap, HashSet};

use crate::model::transaction::{TxnId, TxnKind};
use crate::model::{VarId, Variable};
use crate::{SiteId, Tick};

/// Per-(site, variable) lock state. The write-lock holder, if any, is never also a
/// member of `readers` (spec.md §3 invariant).
#[derive(Debug, Clone, Default)]
pub struct LockState {
    pub readers: HashSet<TxnId>,
    pub writer: Option<TxnId>,
}

impl LockState {
    fn holders_except(&self, txn_id: &TxnId) -> Vec<TxnId> {
        let mut holders: Vec<TxnId> = self.readers.iter().filter(|t| *t != txn_id).cloned().collect();
        if let Some(w) = &self.writer {
            if w != txn_id && !holders.contains(w) {
                holders.push(w.clone());
            }
        }
        holders
    }
}

enum LockResult {
    Granted,
    Denied { blockers: Vec<TxnId> },
}

/// Outcome of a read attempt at one site.
pub enum ReadAttempt {
    Success(i64),
    Fail { blockers: Vec<TxnId> },
}

/// Outcome of a write attempt at one site.
pub enum WriteAttempt {
    Success,
    Fail { blockers: Vec<TxnId> },
}

/// One site: its replica of every variable it owns, and the lock table over them.
pub struct Site {
    id: SiteId,
    vars: HashMap<VarId, Variable>,
    locks: HashMap<VarId, LockState>,
    up: bool,
    up_since: Tick,
}

impl Site {
    /// Build a site owning the variables placed on it per spec.md §3's static
    /// replication rule: every even variable, plus the odd variables whose home is `id`.
    pub fn new(id: SiteId, variable_count: u32) -> Self {
        let mut vars = HashMap::new();
        let mut locks = HashMap::new();
        for n in 1..=variable_count {
            let vid = VarId(n);
            let owns = vid.is_replicated() || vid.home_site() == id;
            if owns {
                vars.insert(vid, Variable::new(vid.initial_value()));
                locks.insert(vid, LockState::default());
            }
        }
        Self {
            id,
            vars,
            locks,
            up: true,
            up_since: 0,
        }
    }

    pub fn id(&self) -> SiteId {
        self.id
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn up_since(&self) -> Tick {
        self.up_since
    }

    pub fn owns(&self, var: VarId) -> bool {
        self.vars.contains_key(&var)
    }

    pub fn is_available_for_read(&self, var: VarId) -> bool {
        self.vars.get(&var).map_or(false, Variable::available_for_read)
    }

    fn acquire_read_lock(&mut self, var: VarId, txn_id: &TxnId) -> LockResult {
        let available = self.vars.get(&var).map_or(false, Variable::available_for_read);
        let lock = self.locks.entry(var).or_default();

        if !available {
            let blockers = lock.writer.clone().into_iter().collect();
            return LockResult::Denied { blockers };
        }
        if let Some(writer) = &lock.writer {
            if writer != txn_id {
                return LockResult::Denied {
                    blockers: vec![writer.clone()],
                };
            }
            // T already holds the write lock; it subsumes the read.
            return LockResult::Granted;
        }
        lock.readers.insert(txn_id.clone());
        LockResult::Granted
    }

    fn acquire_write_lock(&mut self, var: VarId, txn_id: &TxnId) -> LockResult {
        let lock = self.locks.entry(var).or_default();

        let readers_ok = lock.readers.is_empty()
            || (lock.readers.len() == 1 && lock.readers.contains(txn_id));
        let writer_ok = lock.writer.is_none() || lock.writer.as_ref() == Some(txn_id);

        if !(readers_ok && writer_ok) {
            return LockResult::Denied {
                blockers: lock.holders_except(txn_id),
            };
        }

        lock.readers.remove(txn_id);
        lock.writer = Some(txn_id.clone());
        LockResult::Granted
    }

    /// Read per spec.md §4.2 "Read at site". Read-only transactions take no locks.
    pub fn read(&mut self, txn_id: &TxnId, kind: TxnKind, start_tick: Tick, var: VarId) -> ReadAttempt {
        if !self.up || !self.vars.contains_key(&var) {
            return ReadAttempt::Fail { blockers: vec![] };
        }

        if kind == TxnKind::ReadWrite {
            if let LockResult::Denied { blockers } = self.acquire_read_lock(var, txn_id) {
                return ReadAttempt::Fail { blockers };
            }
        }

        match self.vars.get(&var).and_then(|v| v.read(kind, start_tick)) {
            Some(value) => ReadAttempt::Success(value),
            None => ReadAttempt::Fail { blockers: vec![] },
        }
    }

    /// Write per spec.md §4.2 "Write at site". Writing does not commit.
    ///
    /// A variable this site doesn't own (out of range for a reduced `--variables`
    /// configuration) is treated the same as a down site: fail with no blockers,
    /// since there is nothing here to contend over.
    pub fn write(&mut self, txn_id: &TxnId, var: VarId, value: i64) -> WriteAttempt {
        if !self.up || !self.vars.contains_key(&var) {
            return WriteAttempt::Fail { blockers: vec![] };
        }

        match self.acquire_write_lock(var, txn_id) {
            LockResult::Denied { blockers } => WriteAttempt::Fail { blockers },
            LockResult::Granted => {
                if let Some(v) = self.vars.get_mut(&var) {
                    v.write(value);
                }
                WriteAttempt::Success
            }
        }
    }

    /// Release a write lock this transaction holds on `var`, undoing its pending write.
    /// Used when a multi-site write fails partway through (spec.md §4.3 `Write`).
    pub fn release_write_lock(&mut self, var: VarId, txn_id: &TxnId) {
        let released = self
            .locks
            .get_mut(&var)
            .map(|lock| {
                if lock.writer.as_ref() == Some(txn_id) {
                    lock.writer = None;
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if released {
            if let Some(v) = self.vars.get_mut(&var) {
                v.abort_clear();
            }
        }
    }

    /// Commit every variable this transaction holds the write lock on, and release
    /// all of its locks (spec.md §4.2 "Commit at site").
    pub fn commit(&mut self, txn_id: &TxnId, tick: Tick) {
        let Site { vars, locks, .. } = self;
        for (var, lock) in locks.iter_mut() {
            if lock.writer.as_ref() == Some(txn_id) {
                if let Some(v) = vars.get_mut(var) {
                    v.commit(tick);
                }
                lock.writer = None;
            }
            lock.readers.remove(txn_id);
        }
    }

    /// Release every lock this transaction holds, undoing any pending write
    /// (spec.md §4.2 "Abort at site").
    pub fn abort(&mut self, txn_id: &TxnId) {
        let Site { vars, locks, .. } = self;
        for (var, lock) in locks.iter_mut() {
            lock.readers.remove(txn_id);
            if lock.writer.as_ref() == Some(txn_id) {
                lock.writer = None;
                if let Some(v) = vars.get_mut(var) {
                    v.abort_clear();
                }
            }
        }
    }

    /// Mark the site down. Locks and uncommitted values are logically cleared.
    pub fn fail(&mut self) {
        self.up = false;
        for lock in self.locks.values_mut() {
            lock.readers.clear();
            lock.writer = None;
        }
        for v in self.vars.values_mut() {
            v.abort_clear();
        }
    }

    /// Recover: empty the lock table, reset availability per spec.md §4.2 `recover()`.
    pub fn recover(&mut self, tick: Tick) {
        for lock in self.locks.values_mut() {
            lock.readers.clear();
            lock.writer = None;
        }
        for (var, v) in self.vars.iter_mut() {
            v.set_available_for_read(!var.is_replicated());
        }
        self.up = true;
        self.up_since = tick;
    }

    /// Diagnostic dump of every variable's latest committed value (spec.md §6).
    pub fn dump(&self) -> String {
        if !self.up {
            return format!("Site {} (down)", self.id);
        }
        let mut ids: Vec<&VarId> = self.vars.keys().collect();
        ids.sort();
        let mut out = format!("Site {}:\n", self.id);
        for var in ids {
            let (tick, value) = self.vars[var].latest_committed();
            out.push_str(&format!("{}: {} at time {}\n", var, value, tick));
        }
        out
    }

    /// The latest committed `(tick, value)` for `var` at this site, regardless of
    /// availability-for-read — a raw introspection hook, unlike [`Site::dump_var`].
    pub fn committed_value(&self, var: VarId) -> Option<(Tick, i64)> {
        self.vars.get(&var).map(crate::model::Variable::latest_committed)
    }

    /// Dump a single variable at this site, if it's owned and available.
    pub fn dump_var(&self, var: VarId) -> Option<String> {
        if !self.up {
            return None;
        }
        let v = self.vars.get(&var)?;
        if !v.available_for_read() {
            return None;
        }
        let (tick, value) = v.latest_committed();
        Some(format!("site {}: {} = {} at time {}", self.id, var, value, tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(id: &str) -> TxnId {
        id.to_string()
    }

    #[test]
    fn site_owns_even_vars_everywhere_and_odd_var_at_home_only() {
        let s2 = Site::new(2, 20);
        assert!(s2.owns(VarId(2)));
        assert!(s2.owns(VarId(1))); // home_site(1) == 1 + (1 % 10) == 2
        let s3 = Site::new(3, 20);
        assert!(s3.owns(VarId(2)));
        assert!(!s3.owns(VarId(1)));
    }

    #[test]
    fn read_write_lock_upgrade_from_sole_reader() {
        let mut s = Site::new(2, 20);
        let txn = t("T1");
        assert!(matches!(s.read(&txn, TxnKind::ReadWrite, 0, VarId(2)), ReadAttempt::Success(_)));
        assert!(matches!(s.write(&txn, VarId(2), 99), WriteAttempt::Success));
        assert!(s.locks[&VarId(2)].readers.is_empty());
        assert_eq!(s.locks[&VarId(2)].writer, Some(txn));
    }

    #[test]
    fn write_lock_idempotent_for_same_holder() {
        let mut s = Site::new(2, 20);
        let txn = t("T1");
        assert!(matches!(s.write(&txn, VarId(2), 1), WriteAttempt::Success));
        assert!(matches!(s.write(&txn, VarId(2), 2), WriteAttempt::Success));
    }

    #[test]
    fn write_denied_by_other_reader_reports_blocker() {
        let mut s = Site::new(2, 20);
        let t1 = t("T1");
        let t2 = t("T2");
        assert!(matches!(s.read(&t1, TxnKind::ReadWrite, 0, VarId(2)), ReadAttempt::Success(_)));
        match s.write(&t2, VarId(2), 5) {
            WriteAttempt::Fail { blockers } => assert_eq!(blockers, vec![t1]),
            _ => panic!("expected denial"),
        }
    }

    #[test]
    fn fail_then_recover_resets_replicated_availability() {
        let mut s = Site::new(2, 20);
        s.fail();
        assert!(!s.is_up());
        s.recover(10);
        assert!(s.is_up());
        assert!(!s.is_available_for_read(VarId(2))); // replicated: needs a post-recovery commit
        assert!(s.is_available_for_read(VarId(1))); // non-replicated: immediately available
    }

    #[test]
    fn release_write_lock_clears_uncommitted_value() {
        let mut s = Site::new(2, 20);
        let txn = t("T1");
        assert!(matches!(s.write(&txn, VarId(2), 123), WriteAttempt::Success));
        s.release_write_lock(VarId(2), &txn);
        assert!(s.locks[&VarId(2)].writer.is_none());
        // committing now should be a no-op since nothing is pending; abort is safe too
        s.abort(&txn);
    }

    #[test]
    fn commit_releases_locks_and_persists_value() {
        let mut s = Site::new(2, 20);
        let txn = t("T1");
        assert!(matches!(s.write(&txn, VarId(2), 42), WriteAttempt::Success));
        s.commit(&txn, 5);
        assert!(s.locks[&VarId(2)].writer.is_none());
        assert_eq!(s.dump_var(VarId(2)).unwrap(), "site 2: x2 = 42 at time 5");
    }
}
