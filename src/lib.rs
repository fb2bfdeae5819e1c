//! repcrec: a deterministic, tick-driven simulator of a replicated database running
//! strict two-phase locking with available-copies recovery (spec.md §1).
//!
//! The crate is organized the way the teacher lays out a small server: a data model
//! (`model`), the concurrency-control engine that sits on top of it (`engine`), an
//! input-language parser (`command`), and a thin glue layer that ties a tick counter
//! to the engine (`coordinator`).

pub mod command;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod model;

pub use coordinator::Coordinator;
pub use error::{Result, SimError};

use std::path::PathBuf;

/// Logical clock tick. Strictly increasing, advanced once per dispatched input line
/// (spec.md §3, §4.5). Never derived from wall-clock time.
pub type Tick = u64;

/// Site identifier, `1..=site_count` (spec.md §3).
pub type SiteId = u32;

/// Runtime configuration (SPEC_FULL.md §10.3). Defaults match spec.md §3's ten sites,
/// twenty variables, and five-tick detection interval.
#[derive(Clone, Debug)]
pub struct Config {
    /// Input file to read commands from; `None` reads stdin.
    pub input: Option<PathBuf>,
    pub site_count: u32,
    pub variable_count: u32,
    /// Run deadlock detection every this many ticks.
    pub detection_interval: Tick,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            site_count: 10,
            variable_count: 20,
            detection_interval: 5,
        }
    }
}
