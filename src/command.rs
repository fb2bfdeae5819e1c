//! Parses one line of the input language into a [`Command`] (spec.md §6).
//!
//! Lines look like `Name(arg1,arg2,...)`; blank lines and surrounding whitespace are
//! ignored. This plays the role the teacher's `protocol/commands.rs` plays for the
//! wire protocol, generalized from a binary frame to a plain-text DSL.

use crate::error::{Result, SimError};
use crate::model::transaction::TxnId;
use crate::model::VarId;
use crate::SiteId;

/// What a single input line asks the simulator to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Begin(TxnId),
    BeginRO(TxnId),
    Read(TxnId, VarId),
    Write(TxnId, VarId, i64),
    End(TxnId),
    Fail(SiteId),
    Recover(SiteId),
    Dump(DumpTarget),
}

/// The three shapes `dump` can take (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTarget {
    All,
    Variable(VarId),
    Site(SiteId),
}

/// Parse one line. Returns `Ok(None)` for a blank line (nothing to dispatch, no tick
/// consumed), `Err` for anything malformed.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let open = line
        .find('(')
        .ok_or_else(|| SimError::Parse(format!("missing '(' in '{}'", line)))?;
    let close = line
        .rfind(')')
        .ok_or_else(|| SimError::Parse(format!("missing ')' in '{}'", line)))?;
    if close < open {
        return Err(SimError::Parse(format!("malformed command '{}'", line)));
    }

    let name = line[..open].trim();
    let raw_args = line[open + 1..close].trim();
    let args: Vec<&str> = if raw_args.is_empty() {
        Vec::new()
    } else {
        raw_args.split(',').map(str::trim).collect()
    };

    let command = match name {
        "begin" => Command::Begin(arg_txn(&args, 0, name)?),
        "beginRO" => Command::BeginRO(arg_txn(&args, 0, name)?),
        "R" => Command::Read(arg_txn(&args, 0, name)?, arg_var(&args, 1, name)?),
        "W" => Command::Write(
            arg_txn(&args, 0, name)?,
            arg_var(&args, 1, name)?,
            arg_int(&args, 2, name)?,
        ),
        "end" => Command::End(arg_txn(&args, 0, name)?),
        "fail" => Command::Fail(arg_site(&args, 0, name)?),
        "recover" => Command::Recover(arg_site(&args, 0, name)?),
        "dump" => Command::Dump(parse_dump_target(&args)?),
        other => return Err(SimError::Parse(format!("unknown command '{}'", other))),
    };
    Ok(Some(command))
}

fn arg(args: &[&str], index: usize, command: &str) -> Result<String> {
    args.get(index)
        .map(|s| s.to_string())
        .ok_or_else(|| SimError::Parse(format!("'{}' missing argument {}", command, index + 1)))
}

fn arg_txn(args: &[&str], index: usize, command: &str) -> Result<TxnId> {
    arg(args, index, command)
}

fn arg_var(args: &[&str], index: usize, command: &str) -> Result<VarId> {
    arg(args, index, command)?.parse()
}

fn arg_int(args: &[&str], index: usize, command: &str) -> Result<i64> {
    let raw = arg(args, index, command)?;
    raw.parse()
        .map_err(|_| SimError::Parse(format!("'{}' is not a valid integer", raw)))
}

fn arg_site(args: &[&str], index: usize, command: &str) -> Result<SiteId> {
    let raw = arg(args, index, command)?;
    raw.parse()
        .map_err(|_| SimError::Parse(format!("'{}' is not a valid site id", raw)))
}

fn parse_dump_target(args: &[&str]) -> Result<DumpTarget> {
    match args {
        [] => Ok(DumpTarget::All),
        [single] => {
            if let Ok(var) = single.parse::<VarId>() {
                Ok(DumpTarget::Variable(var))
            } else if let Ok(site) = single.parse::<SiteId>() {
                Ok(DumpTarget::Site(site))
            } else {
                Err(SimError::Parse(format!("'dump({})' names neither a site nor a variable", single)))
            }
        }
        _ => Err(SimError::Parse("'dump' takes at most one argument".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_yields_nothing() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("").unwrap(), None);
    }

    #[test]
    fn parses_begin_and_read_and_write() {
        assert_eq!(parse_line("begin(T1)").unwrap(), Some(Command::Begin("T1".into())));
        assert_eq!(
            parse_line("R(T1,x3)").unwrap(),
            Some(Command::Read("T1".into(), VarId(3)))
        );
        assert_eq!(
            parse_line("W(T1, x4, 99)").unwrap(),
            Some(Command::Write("T1".into(), VarId(4), 99))
        );
    }

    #[test]
    fn parses_fail_recover_and_dump_variants() {
        assert_eq!(parse_line("fail(3)").unwrap(), Some(Command::Fail(3)));
        assert_eq!(parse_line("recover(3)").unwrap(), Some(Command::Recover(3)));
        assert_eq!(parse_line("dump()").unwrap(), Some(Command::Dump(DumpTarget::All)));
        assert_eq!(
            parse_line("dump(x5)").unwrap(),
            Some(Command::Dump(DumpTarget::Variable(VarId(5))))
        );
        assert_eq!(
            parse_line("dump(2)").unwrap(),
            Some(Command::Dump(DumpTarget::Site(2)))
        );
    }

    #[test]
    fn rejects_unknown_command_and_malformed_syntax() {
        assert!(parse_line("frobnicate(T1)").is_err());
        assert!(parse_line("begin T1").is_err());
        assert!(parse_line("W(T1,x1)").is_err());
    }
}
