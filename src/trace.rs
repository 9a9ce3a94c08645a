//! Trace stream (C2).
//!
//! Parses the captured-log format emitted by the emulator's execution log
//! and groups entries per hart, in the order they were seen.

use std::collections::BTreeMap;
use std::io::BufRead;

use regex::Regex;

use crate::error::TraceError;

/// One recorded instruction: its address and the symbol of the containing
/// function, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub pc: u64,
    pub symbol: Option<String>,
}

/// Per-hart ordered sequence of trace entries, keyed by hart id.
pub type TraceByHart = BTreeMap<u32, Vec<TraceEntry>>;

/// Parse a text stream of trace-log lines into a per-hart trace.
///
/// Recognized lines look like:
/// `Trace <hart>: 0x<hex>...[<hex>/<pc-hex>/<hex>/<hex>] <symbol>`
/// Non-matching lines (diagnostic noise) are ignored. Fails with
/// [`TraceError::Empty`] if no line matched.
pub fn load<R: BufRead>(reader: R) -> Result<TraceByHart, TraceError> {
    // Trace 0: 0x280003d00 [00000000/00008c9a/00101003/ff020000] _boot_start
    let line_re = Regex::new(
        r"^Trace\s(\d+):\s0x[0-9a-fA-F]+\s\[[0-9a-fA-F]+/([0-9a-fA-F]+)/[0-9a-fA-F]+/[0-9a-fA-F]+\]\s(\w+)\s*$",
    )
    .expect("static trace regex is valid");

    let mut by_hart: TraceByHart = BTreeMap::new();
    for (lno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };
        let Some(caps) = line_re.captures(&line) else {
            continue;
        };
        let hart: u32 = caps[1].parse().unwrap_or(0);
        let pc = u64::from_str_radix(&caps[2], 16).unwrap_or(0);
        let symbol = caps[3].to_string();
        if (lno + 1) % 10_000 == 0 {
            log::debug!("parsed {} lines", lno + 1);
        }
        by_hart
            .entry(hart)
            .or_default()
            .push(TraceEntry { pc, symbol: Some(symbol) });
    }

    if by_hart.is_empty() {
        return Err(TraceError::Empty);
    }
    Ok(by_hart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_recognized_lines_and_ignores_noise() {
        let input = "\
some unrelated diagnostic line
Trace 0: 0x280001000 [00000000/00001000/00101003/ff020000] _boot_start
Trace 0: 0x280001002 [00000000/00001002/00101003/ff020000] _boot_start
Trace 1: 0x280002000 [00000000/00002000/00101003/ff020000] other_hart
another noise line\n";
        let trace = load(Cursor::new(input)).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[&0].len(), 2);
        assert_eq!(trace[&0][0].pc, 0x1000);
        assert_eq!(trace[&0][0].symbol.as_deref(), Some("_boot_start"));
        assert_eq!(trace[&1][0].pc, 0x2000);
    }

    #[test]
    fn empty_trace_is_an_error() {
        let err = load(Cursor::new("nothing to see here\n"));
        assert!(matches!(err, Err(TraceError::Empty)));
    }
}
