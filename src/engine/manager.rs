//! The Transaction Manager (spec.md §4.3): the busiest component in the simulator.
//!
//! Dispatches reads and writes across a variable's replicas, maintains the FIFO wait
//! list that enforces writer precedence, validates available-copies at commit, and
//! drives deadlock resolution via [`super::cycle::CycleDetector`]. Grounded on the
//! shape of the teacher's `engines/granite/manager.rs` `TransactionManager` (an
//! `active_txns` map plus begin/commit/rollback/recover entry points) generalized from
//! WAL-backed SQL transactions to SS2PL lock-table transactions.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{Result, SimError};
use crate::model::site::{ReadAttempt, Site, WriteAttempt};
use crate::model::transaction::{PendingOp, Transaction, TxnId, TxnKind, TxnStatus};
use crate::model::VarId;
use crate::{SiteId, Tick};

use super::cycle::CycleDetector;

enum ReadOutcome {
    Success { site: SiteId, value: i64 },
    Fail(Vec<TxnId>),
}

enum WriteOutcome {
    Success { sites: Vec<SiteId> },
    Fail(Vec<TxnId>),
}

/// Owns every site and every transaction ever begun.
pub struct TransactionManager {
    sites: HashMap<SiteId, Site>,
    txns: HashMap<TxnId, Transaction>,
    /// FIFO order; retries are re-issued in this order (spec.md §5).
    wait_list: VecDeque<TxnId>,
    cycle_detector: CycleDetector,
}

impl TransactionManager {
    pub fn new(site_count: u32, variable_count: u32) -> Self {
        let sites = (1..=site_count)
            .map(|id| (id, Site::new(id, variable_count)))
            .collect();
        Self {
            sites,
            txns: HashMap::new(),
            wait_list: VecDeque::new(),
            cycle_detector: CycleDetector::new(),
        }
    }

    /// Sites owning `var`, in ascending id order: every site for a replicated (even)
    /// variable, or the single home site for a non-replicated (odd) one (spec.md §4.3).
    fn locate(&self, var: VarId) -> Vec<SiteId> {
        if var.is_replicated() {
            let mut ids: Vec<SiteId> = self.sites.keys().copied().collect();
            ids.sort_unstable();
            ids
        } else {
            vec![var.home_site()]
        }
    }

    pub fn begin(&mut self, id: TxnId, tick: Tick) {
        self.txns.insert(id.clone(), Transaction::new(id, tick, TxnKind::ReadWrite));
    }

    pub fn begin_ro(&mut self, id: TxnId, tick: Tick) {
        self.txns.insert(id.clone(), Transaction::new(id, tick, TxnKind::ReadOnly));
    }

    fn txn_status(&self, txn_id: &TxnId) -> Result<TxnStatus> {
        self.txns
            .get(txn_id)
            .map(|t| t.status)
            .ok_or_else(|| SimError::UnknownTransaction(txn_id.clone()))
    }

    /// The first waiting transaction *before* `txn_id`'s own slot (or, if `txn_id`
    /// isn't queued yet, the whole list) with a pending write on `var`. This is the
    /// FIFO writer-precedence check in spec.md §4.3 step 2.
    fn earlier_writer_blocker(&self, txn_id: &TxnId, var: VarId) -> Option<TxnId> {
        for candidate in &self.wait_list {
            if candidate == txn_id {
                break;
            }
            if let Some(Transaction {
                pending: Some(PendingOp::Write { var: v, .. }),
                ..
            }) = self.txns.get(candidate)
            {
                if *v == var {
                    return Some(candidate.clone());
                }
            }
        }
        None
    }

    fn try_read(&mut self, txn_id: &TxnId, var: VarId, kind: TxnKind, start_tick: Tick) -> ReadOutcome {
        if let Some(blocker) = self.earlier_writer_blocker(txn_id, var) {
            return ReadOutcome::Fail(vec![blocker]);
        }

        for site_id in self.locate(var) {
            let site = self.sites.get_mut(&site_id).expect("locate returns owned sites");
            match site.read(txn_id, kind, start_tick, var) {
                ReadAttempt::Success(value) => return ReadOutcome::Success { site: site_id, value },
                ReadAttempt::Fail { blockers } => {
                    if !blockers.is_empty() {
                        return ReadOutcome::Fail(blockers);
                    }
                    // site down, or variable not yet available for read: keep scanning
                }
            }
        }
        ReadOutcome::Fail(vec![])
    }

    fn try_write(&mut self, txn_id: &TxnId, var: VarId, value: i64) -> WriteOutcome {
        let sites = self.locate(var);
        let mut accepted = Vec::new();
        let mut blockers = HashSet::new();
        let mut conflict = false;

        for site_id in &sites {
            let site = self.sites.get_mut(site_id).expect("locate returns owned sites");
            match site.write(txn_id, var, value) {
                WriteAttempt::Success => accepted.push(*site_id),
                WriteAttempt::Fail { blockers: b } => {
                    if !b.is_empty() {
                        conflict = true;
                        blockers.extend(b);
                    }
                    // empty blockers means the site was down: no contribution either way
                }
            }
        }

        if !conflict && !accepted.is_empty() {
            WriteOutcome::Success { sites: accepted }
        } else {
            for site_id in &accepted {
                self.sites.get_mut(site_id).unwrap().release_write_lock(var, txn_id);
            }
            WriteOutcome::Fail(blockers.into_iter().collect())
        }
    }

    fn mark_running(&mut self, txn_id: &TxnId) {
        self.wait_list.retain(|t| t != txn_id);
        if let Some(txn) = self.txns.get_mut(txn_id) {
            txn.status = TxnStatus::Running;
            txn.pending = None;
            // wait_for reflects who T is *currently* blocked on; a successful retry
            // means T isn't blocked on anyone right now, so the stale set from its
            // last failed attempt must not linger as an outgoing waits-for edge.
            txn.wait_for.clear();
        }
    }

    fn mark_waiting(&mut self, txn_id: &TxnId, op: PendingOp, blockers: Vec<TxnId>) {
        if let Some(txn) = self.txns.get_mut(txn_id) {
            txn.status = TxnStatus::Waiting;
            txn.pending = Some(op);
            for b in blockers {
                if b != *txn_id {
                    txn.wait_for.insert(b);
                }
            }
        }
        if !self.wait_list.contains(txn_id) {
            self.wait_list.push_back(txn_id.clone());
        }
    }

    /// `Read(T, v)` (spec.md §4.3).
    pub fn read(&mut self, txn_id: &TxnId, var: VarId, tick: Tick) -> Result<()> {
        if self.txn_status(txn_id)?.is_terminal() {
            return Ok(());
        }
        let (kind, start_tick) = {
            let t = &self.txns[txn_id];
            (t.kind, t.start_tick)
        };

        match self.try_read(txn_id, var, kind, start_tick) {
            ReadOutcome::Success { site, value } => {
                log::info!("{} reads {} = {} from site {}", txn_id, var, value, site);
                self.mark_running(txn_id);
                if kind == TxnKind::ReadWrite {
                    self.txns.get_mut(txn_id).unwrap().note_first_access(site, tick);
                }
            }
            ReadOutcome::Fail(blockers) => {
                log::debug!("{} blocked reading {}", txn_id, var);
                self.mark_waiting(txn_id, PendingOp::Read { var }, blockers);
            }
        }
        Ok(())
    }

    /// `Write(T, v, val)` (spec.md §4.3).
    pub fn write(&mut self, txn_id: &TxnId, var: VarId, value: i64, tick: Tick) -> Result<()> {
        if self.txn_status(txn_id)?.is_terminal() {
            return Ok(());
        }

        match self.try_write(txn_id, var, value) {
            WriteOutcome::Success { sites } => {
                log::info!("{} writes {} = {} at {} site(s)", txn_id, var, value, sites.len());
                self.mark_running(txn_id);
                let txn = self.txns.get_mut(txn_id).unwrap();
                for site_id in sites {
                    txn.note_first_access(site_id, tick);
                }
            }
            WriteOutcome::Fail(blockers) => {
                log::debug!("{} blocked writing {}", txn_id, var);
                self.mark_waiting(txn_id, PendingOp::Write { var, value }, blockers);
            }
        }
        Ok(())
    }

    fn commit_transaction(&mut self, txn_id: &TxnId, tick: Tick, sites_to_commit: &[SiteId]) {
        for site_id in sites_to_commit {
            self.sites.get_mut(site_id).unwrap().commit(txn_id, tick);
        }
        self.wait_list.retain(|t| t != txn_id);
        for other in self.txns.values_mut() {
            other.wait_for.remove(txn_id);
        }
        if let Some(txn) = self.txns.get_mut(txn_id) {
            txn.status = TxnStatus::Committed;
            txn.pending = None;
        }
        log::info!("{} committed at tick {}", txn_id, tick);
        self.retry(tick);
    }

    /// `end(T)` (spec.md §4.3): commit for a running transaction, abort for one still
    /// on the wait list.
    pub fn end(&mut self, txn_id: &TxnId, tick: Tick) -> Result<()> {
        let (status, queued, is_ro, site_access) = {
            let txn = self
                .txns
                .get(txn_id)
                .ok_or_else(|| SimError::UnknownTransaction(txn_id.clone()))?;
            (
                txn.status,
                self.wait_list.contains(txn_id),
                txn.is_read_only(),
                txn.site_access.clone(),
            )
        };

        if status.is_terminal() {
            return Ok(());
        }
        if queued {
            return self.abort(txn_id, tick);
        }
        if is_ro {
            self.commit_transaction(txn_id, tick, &[]);
            return Ok(());
        }

        for (site_id, first_access) in &site_access {
            let site = self.sites.get(site_id).expect("site in access map exists");
            if !site.is_up() || site.up_since() > *first_access {
                log::info!(
                    "{} fails available-copies validation at site {}",
                    txn_id,
                    site_id
                );
                return self.abort(txn_id, tick);
            }
        }

        let touched: Vec<SiteId> = site_access.keys().copied().collect();
        self.commit_transaction(txn_id, tick, &touched);
        Ok(())
    }

    /// `abort(T)` (spec.md §4.3): used for explicit abort-on-end, deadlock victims, and
    /// commit-validation failures.
    pub fn abort(&mut self, txn_id: &TxnId, tick: Tick) -> Result<()> {
        self.wait_list.retain(|t| t != txn_id);
        let is_rw = self
            .txns
            .get(txn_id)
            .map(|t| !t.is_read_only())
            .ok_or_else(|| SimError::UnknownTransaction(txn_id.clone()))?;

        if is_rw {
            for site in self.sites.values_mut() {
                site.abort(txn_id);
            }
        }
        for other in self.txns.values_mut() {
            other.wait_for.remove(txn_id);
        }
        if let Some(txn) = self.txns.get_mut(txn_id) {
            txn.status = TxnStatus::Aborted;
            txn.pending = None;
        }
        log::info!("{} aborted at tick {}", txn_id, tick);
        self.retry(tick);
        Ok(())
    }

    pub fn fail_site(&mut self, site: SiteId) -> Result<()> {
        self.sites
            .get_mut(&site)
            .ok_or(SimError::UnknownSite(site))?
            .fail();
        Ok(())
    }

    pub fn recover_site(&mut self, site: SiteId, tick: Tick) -> Result<()> {
        self.sites
            .get_mut(&site)
            .ok_or(SimError::UnknownSite(site))?
            .recover(tick);
        self.retry(tick);
        Ok(())
    }

    /// Re-issue every still-waiting transaction's pending operation, in enqueue order.
    /// Triggered by commit, abort, and site recovery (spec.md §4.3 "Retry").
    fn retry(&mut self, tick: Tick) {
        let snapshot: Vec<TxnId> = self.wait_list.iter().cloned().collect();
        for txn_id in snapshot {
            let pending = match self.txns.get(&txn_id) {
                Some(t) if t.status == TxnStatus::Waiting => t.pending.clone(),
                _ => None,
            };
            match pending {
                Some(PendingOp::Read { var }) => {
                    let _ = self.read(&txn_id, var, tick);
                }
                Some(PendingOp::Write { var, value }) => {
                    let _ = self.write(&txn_id, var, value, tick);
                }
                None => {}
            }
        }
    }

    /// Build the waits-for graph from live transactions, find cycles, and abort the
    /// youngest transaction in the first cycle found, repeating until none remain
    /// (spec.md §4.3 "Deadlock detection").
    pub fn detect_and_resolve_deadlocks(&mut self, tick: Tick) {
        loop {
            let graph: HashMap<TxnId, Vec<TxnId>> = self
                .txns
                .iter()
                .filter(|(_, t)| !t.status.is_terminal())
                .map(|(id, t)| (id.clone(), t.wait_for.iter().cloned().collect()))
                .collect();

            let cycles = self.cycle_detector.find_cycles(&graph);
            let Some(cycle) = cycles.into_iter().next() else {
                break;
            };

            let victim = cycle
                .iter()
                .max_by(|a, b| {
                    let ta = self.txns[*a].start_tick;
                    let tb = self.txns[*b].start_tick;
                    ta.cmp(&tb).then_with(|| a.cmp(b))
                })
                .expect("a cycle has at least one node")
                .clone();

            log::info!("deadlock detected in cycle {:?}, aborting youngest {}", cycle, victim);
            let _ = self.abort(&victim, tick);
        }
    }

    pub fn dump_all(&self) -> String {
        let mut ids: Vec<SiteId> = self.sites.keys().copied().collect();
        ids.sort_unstable();
        ids.iter()
            .map(|id| self.sites[id].dump())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn dump_var(&self, var: VarId) -> String {
        let mut ids = self.locate(var);
        ids.sort_unstable();
        let lines: Vec<String> = ids
            .iter()
            .filter_map(|id| self.sites[id].dump_var(var))
            .collect();
        if lines.is_empty() {
            format!("{} not available at any site", var)
        } else {
            lines.join("\n")
        }
    }

    pub fn dump_site(&self, site: SiteId) -> Result<String> {
        self.sites
            .get(&site)
            .map(Site::dump)
            .ok_or(SimError::UnknownSite(site))
    }

    /// Diagnostic listing of every transaction's id, start tick, kind, and status,
    /// in the spirit of the original `Transaction.querystate()` (SPEC_FULL.md §10.5).
    pub fn query_state(&self) {
        let mut ids: Vec<&TxnId> = self.txns.keys().collect();
        ids.sort();
        for id in ids {
            let t = &self.txns[id];
            log::info!(
                "{}: started at {}, kind {:?}, status {:?}",
                t.id,
                t.start_tick,
                t.kind,
                t.status
            );
        }
    }

    /// Current status of a transaction, for introspection (SPEC_FULL.md §10.5).
    pub fn status_of(&self, txn_id: &TxnId) -> Option<TxnStatus> {
        self.txns.get(txn_id).map(|t| t.status)
    }

    /// The latest committed `(tick, value)` of `var` at `site`, for introspection.
    pub fn committed_value(&self, site: SiteId, var: VarId) -> Option<(Tick, i64)> {
        self.sites.get(&site)?.committed_value(var)
    }
}
