//! Transaction metadata (spec.md §3, §4.3).

use std::collections::{HashMap, HashSet};

use crate::model::VarId;
use crate::{SiteId, Tick};

/// Transaction identifiers are the strings the input language uses directly (`"T3"`).
pub type TxnId = String;

/// Read-write vs. read-only, fixed at `begin`/`beginRO` and never changed afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnKind {
    ReadOnly,
    ReadWrite,
}

/// Transaction lifecycle state (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    Running,
    Waiting,
    Aborted,
    Committed,
}

impl TxnStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxnStatus::Aborted | TxnStatus::Committed)
    }
}

/// A read or write waiting to be retried, attached only to a waiting transaction.
#[derive(Debug, Clone)]
pub enum PendingOp {
    Read { var: VarId },
    Write { var: VarId, value: i64 },
}

/// All manager-visible state for one transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TxnId,
    pub start_tick: Tick,
    pub kind: TxnKind,
    pub status: TxnStatus,
    /// Transactions this one is blocked behind; the waits-for graph is this set's union
    /// across all live transactions, computed on demand (spec.md §4.3, §9).
    pub wait_for: HashSet<TxnId>,
    /// The operation to retry once unblocked.
    pub pending: Option<PendingOp>,
    /// Earliest successful access tick per site; never overwritten once set.
    pub site_access: HashMap<SiteId, Tick>,
}

impl Transaction {
    pub fn new(id: TxnId, start_tick: Tick, kind: TxnKind) -> Self {
        Self {
            id,
            start_tick,
            kind,
            status: TxnStatus::Running,
            wait_for: HashSet::new(),
            pending: None,
            site_access: HashMap::new(),
        }
    }

    /// Record the first successful access at `site`, if not already recorded.
    pub fn note_first_access(&mut self, site: SiteId, tick: Tick) {
        self.site_access.entry(site).or_insert(tick);
    }

    pub fn is_read_only(&self) -> bool {
        self.kind == TxnKind::ReadOnly
    }
}
