//! Black-box scenarios driven through the public `Coordinator` API, translating
//! `test_ddbms.py`'s scenarios from `original_source/` into this crate's idiom
//! (spec.md §8 "End-to-end scenarios").

use std::io::{Cursor, Write};

use repcrec::model::transaction::TxnStatus;
use repcrec::model::VarId;
use repcrec::{Config, Coordinator};

fn run(script: &str) -> Coordinator {
    let mut coordinator = Coordinator::new(&Config::default());
    coordinator.run(Cursor::new(script)).expect("script runs cleanly");
    coordinator
}

#[test]
fn read_only_snapshot_does_not_see_a_later_commit() {
    let c = run(
        "beginRO(T1)\n\
         begin(T2)\n\
         W(T2,x1,101)\n\
         end(T2)\n\
         R(T1,x1)\n\
         end(T1)\n",
    );
    assert_eq!(c.status_of(&"T1".to_string()), Some(TxnStatus::Committed));
    assert_eq!(c.status_of(&"T2".to_string()), Some(TxnStatus::Committed));
}

#[test]
fn fifo_writer_precedence_orders_commits_behind_the_queued_writer() {
    let c = run(
        "begin(T1)\n\
         begin(T2)\n\
         begin(T3)\n\
         R(T1,x1)\n\
         W(T2,x1,55)\n\
         R(T3,x1)\n\
         end(T1)\n\
         end(T2)\n\
         end(T3)\n",
    );
    for id in ["T1", "T2", "T3"] {
        assert_eq!(c.status_of(&id.to_string()), Some(TxnStatus::Committed));
    }
    // x1's home site is 1 + (1 % 10) == 2.
    let (_, value) = c.committed_value(2, VarId(1)).unwrap();
    assert_eq!(value, 55);
}

#[test]
fn commit_validation_aborts_when_a_touched_site_fails_before_end() {
    let c = run(
        "begin(T1)\n\
         W(T1,x2,12345)\n\
         fail(2)\n\
         fail(3)\n\
         fail(4)\n\
         fail(5)\n\
         fail(6)\n\
         fail(7)\n\
         fail(8)\n\
         fail(9)\n\
         fail(10)\n\
         fail(1)\n\
         end(T1)\n",
    );
    assert_eq!(c.status_of(&"T1".to_string()), Some(TxnStatus::Aborted));
}

#[test]
fn commit_validation_passes_when_the_failed_site_was_never_touched() {
    let c = run(
        "fail(2)\n\
         begin(T1)\n\
         R(T1,x3)\n\
         recover(2)\n\
         end(T1)\n",
    );
    // x3 is odd; its home site is 1 + (3 % 10) == 4, never touches site 2.
    assert_eq!(c.status_of(&"T1".to_string()), Some(TxnStatus::Committed));
}

#[test]
fn four_way_deadlock_aborts_the_youngest_and_others_eventually_commit() {
    // T1 -> T2 -> T3 -> T4 -> T1. Aborting the youngest (T4) only frees T4's own lock
    // (x8), which unblocks T3; each subsequent `end` in dependency order frees the next
    // link in the chain (T3 releases x6 for T2, T2 releases x4 for T1).
    let c = run(
        "begin(T1)\n\
         begin(T2)\n\
         begin(T3)\n\
         begin(T4)\n\
         W(T1,x2,1)\n\
         W(T2,x4,1)\n\
         W(T3,x6,1)\n\
         W(T4,x8,1)\n\
         W(T1,x4,2)\n\
         W(T2,x6,2)\n\
         W(T3,x8,2)\n\
         W(T4,x2,2)\n\
         end(T3)\n\
         end(T2)\n\
         end(T1)\n\
         end(T4)\n",
    );
    assert_eq!(c.status_of(&"T4".to_string()), Some(TxnStatus::Aborted));
    assert_eq!(c.status_of(&"T1".to_string()), Some(TxnStatus::Committed));
    assert_eq!(c.status_of(&"T2".to_string()), Some(TxnStatus::Committed));
    assert_eq!(c.status_of(&"T3".to_string()), Some(TxnStatus::Committed));
}

#[test]
fn non_replicated_variable_is_readable_immediately_after_recovery() {
    // x5's home site is 1 + (5 % 10) == 6.
    let c = run(
        "fail(6)\n\
         recover(6)\n\
         beginRO(T1)\n\
         R(T1,x5)\n\
         end(T1)\n",
    );
    assert_eq!(c.status_of(&"T1".to_string()), Some(TxnStatus::Committed));
}

#[test]
fn reads_an_input_script_from_a_real_file() {
    let mut file = tempfile::NamedTempFile::new().expect("create temp script");
    writeln!(file, "begin(T1)").unwrap();
    writeln!(file, "W(T1,x2,7)").unwrap();
    writeln!(file, "end(T1)").unwrap();

    let mut coordinator = Coordinator::new(&Config::default());
    let reader = std::io::BufReader::new(std::fs::File::open(file.path()).unwrap());
    coordinator.run(reader).expect("file-backed script runs cleanly");

    assert_eq!(coordinator.status_of(&"T1".to_string()), Some(TxnStatus::Committed));
}
