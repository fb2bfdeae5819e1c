//! Glue between the input stream and the engine (spec.md §4.5).
//!
//! One input line is one tick. Before dispatching a line, deadlock detection runs
//! every `detection_interval` ticks; `end` additionally forces an extra pass first
//! when its own tick isn't already a multiple of the interval, so a transaction
//! never commits on the same tick a cycle through it went undetected.
//!
//! Tick 0 is reserved for the initial state every variable is constructed with
//! (spec.md §3: "Initial value at tick 0"); the counter is advanced before the first
//! line is dispatched, so the first real operation runs at tick 1. Without this, a
//! read-only transaction that began on the very first line would have timestamp 0,
//! and could never satisfy the strict `commit_tick < timestamp` rule against the
//! tick-0 initial version (spec.md §9's flagged "blocks forever" corner) — see
//! DESIGN.md for the full reasoning.

use std::io::BufRead;

use crate::command::{parse_line, Command, DumpTarget};
use crate::engine::TransactionManager;
use crate::error::Result;
use crate::model::transaction::{TxnId, TxnStatus};
use crate::model::VarId;
use crate::{Config, SiteId, Tick};

pub struct Coordinator {
    manager: TransactionManager,
    tick: Tick,
    detection_interval: Tick,
}

impl Coordinator {
    pub fn new(config: &Config) -> Self {
        Self {
            manager: TransactionManager::new(config.site_count, config.variable_count),
            tick: 0,
            detection_interval: config.detection_interval,
        }
    }

    /// Run to completion over every line `reader` yields.
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<()> {
        log::info!("simulation start");
        for line in reader.lines() {
            self.dispatch_line(&line?)?;
        }
        self.manager.query_state();
        log::info!("simulation done at tick {}", self.tick);
        Ok(())
    }

    fn due_for_detection(&self) -> bool {
        self.detection_interval > 0 && self.tick % self.detection_interval == 0
    }

    fn dispatch_line(&mut self, line: &str) -> Result<()> {
        let Some(command) = parse_line(line)? else {
            return Ok(());
        };
        self.tick += 1;

        if self.due_for_detection() {
            self.manager.detect_and_resolve_deadlocks(self.tick);
        }

        match command {
            Command::Begin(id) => {
                self.manager.begin(id.clone(), self.tick);
                log::info!("{} begins at tick {}", id, self.tick);
            }
            Command::BeginRO(id) => {
                self.manager.begin_ro(id.clone(), self.tick);
                log::info!("{} begins read-only at tick {}", id, self.tick);
            }
            Command::Read(id, var) => self.manager.read(&id, var, self.tick)?,
            Command::Write(id, var, value) => self.manager.write(&id, var, value, self.tick)?,
            Command::End(id) => {
                if !self.due_for_detection() {
                    self.manager.detect_and_resolve_deadlocks(self.tick);
                }
                self.manager.end(&id, self.tick)?;
            }
            Command::Fail(site) => {
                self.manager.fail_site(site)?;
                log::info!("site {} fails at tick {}", site, self.tick);
            }
            Command::Recover(site) => {
                self.manager.recover_site(site, self.tick)?;
                log::info!("site {} recovers at tick {}", site, self.tick);
            }
            Command::Dump(target) => self.print_dump(target)?,
        }

        Ok(())
    }

    /// Current status of a transaction, for tests and other embedders that drive the
    /// simulator as a library rather than through `dump`'s text output.
    pub fn status_of(&self, txn_id: &TxnId) -> Option<TxnStatus> {
        self.manager.status_of(txn_id)
    }

    /// The latest committed `(tick, value)` of `var` at `site`.
    pub fn committed_value(&self, site: SiteId, var: VarId) -> Option<(Tick, i64)> {
        self.manager.committed_value(site, var)
    }

    fn print_dump(&self, target: DumpTarget) -> Result<()> {
        match target {
            DumpTarget::All => println!("{}", self.manager.dump_all()),
            DumpTarget::Variable(var) => println!("{}", self.manager.dump_var(var)),
            DumpTarget::Site(site) => println!("{}", self.manager.dump_site(site)?),
        }
        Ok(())
    }
}
