//! Command dispatcher (C5).
//!
//! A static, non-reflective match over one- and two-byte command
//! prefixes — `bs`/`bc` are checked before the single-letter table so
//! they never fall through to a `b` handler that doesn't exist. Ported
//! from the reference server's `_handle_request`/`_do_*` methods, minus
//! the `getattr`-based reflection.

use crate::cursor::PC_REGISTER_INDEX;
use crate::session::Session;

const SIG_TRAP: u8 = 5;
const SIG_QUIT: u8 = 3;

/// Outcome of dispatching one decoded frame payload.
pub enum DispatchOutcome {
    /// Send this payload back to the client as a reply frame.
    Reply(String),
    /// The `k` command: no reply is sent; the connection is torn down.
    Close,
}

/// Dispatch one frame payload against `session`.
pub fn dispatch(session: &mut Session, payload: &[u8]) -> DispatchOutcome {
    if payload == b"bs" {
        return DispatchOutcome::Reply(do_step(session, true));
    }
    if payload == b"bc" {
        return DispatchOutcome::Reply(do_continue(session, true, None));
    }

    let Some(&cmd) = payload.first() else {
        return DispatchOutcome::Reply(String::new());
    };
    let rest = &payload[1..];

    match cmd {
        b'?' => DispatchOutcome::Reply("S00".to_string()),
        b'g' => DispatchOutcome::Reply(do_read_registers(session)),
        b'm' => DispatchOutcome::Reply(do_read_memory(session, rest)),
        b's' => DispatchOutcome::Reply(if rest.is_empty() {
            do_step(session, false)
        } else {
            "E01".to_string()
        }),
        b'c' => DispatchOutcome::Reply(do_continue_cmd(session, rest)),
        b'k' => {
            session.kill();
            DispatchOutcome::Close
        }
        b'H' => DispatchOutcome::Reply(do_select_thread(session, rest)),
        b'Z' => DispatchOutcome::Reply(do_breakpoint(session, rest, false)),
        b'z' => DispatchOutcome::Reply(do_breakpoint(session, rest, true)),
        b'q' => DispatchOutcome::Reply(do_query(session, rest)),
        _ => DispatchOutcome::Reply(String::new()),
    }
}

fn encode_le_hex(value: u64, width: u8) -> String {
    let bytes = value.to_le_bytes();
    hex::encode(&bytes[..width as usize])
}

/// `T05<reg-idx>:<pc>;` or, on a breakpoint hit, `T05<reg-idx>:<pc>;hwbreak:;`.
fn trap_reply(session: &Session, hit_breakpoint: bool) -> String {
    let pc = session.current_pc_selected();
    let pc_hex = encode_le_hex(pc, session.xlen_bytes);
    let tail = if hit_breakpoint { ";hwbreak:;" } else { ";" };
    format!("T{:02x}{:02x}:{}{}", SIG_TRAP, PC_REGISTER_INDEX, pc_hex, tail)
}

fn do_step(session: &mut Session, back: bool) -> String {
    // A step past either boundary is not an error from the client's point
    // of view: the spec requires a trap reply at the synthetic boundary
    // PC, not E01 (E01 is reserved for the with-argument re-vector case).
    let _ = session.step_selected(back);
    trap_reply(session, false)
}

fn do_continue_cmd(session: &mut Session, rest: &[u8]) -> String {
    if rest.is_empty() {
        return do_continue(session, false, None);
    }
    match std::str::from_utf8(rest)
        .ok()
        .and_then(|s| u64::from_str_radix(s, 16).ok())
    {
        Some(addr) => do_continue(session, false, Some(addr)),
        None => "E01".to_string(),
    }
}

fn do_continue(session: &mut Session, back: bool, addr: Option<u64>) -> String {
    let hit = session.cont_selected(back, addr);
    if hit {
        trap_reply(session, true)
    } else if back {
        "S00".to_string()
    } else {
        format!("S{:02x}", SIG_QUIT)
    }
}

fn do_read_registers(session: &Session) -> String {
    let regs = session.registers_selected();
    regs.iter()
        .map(|r| match r {
            Some(v) => encode_le_hex(*v, session.xlen_bytes),
            None => "xx".repeat(session.xlen_bytes as usize),
        })
        .collect()
}

fn do_read_memory(session: &Session, rest: &[u8]) -> String {
    let Some((addr, len)) = parse_addr_len(rest) else {
        return "E01".to_string();
    };
    match session.memory.read(addr, len) {
        Ok(bytes) => hex::encode(bytes),
        Err(_) => "E01".to_string(),
    }
}

fn parse_addr_len(rest: &[u8]) -> Option<(u64, u64)> {
    let text = std::str::from_utf8(rest).ok()?;
    let (addr, len) = text.split_once(',')?;
    Some((
        u64::from_str_radix(addr, 16).ok()?,
        u64::from_str_radix(len, 16).ok()?,
    ))
}

fn do_select_thread(session: &mut Session, rest: &[u8]) -> String {
    let Some(&op) = rest.first() else {
        return "E03".to_string();
    };
    if !matches!(op, b'G' | b'g' | b'M' | b'm' | b'c') {
        return "E03".to_string();
    }
    let tid_text = std::str::from_utf8(&rest[1..]).unwrap_or("");
    let Ok(tid) = i64::from_str_radix(tid_text, 16) else {
        return "E01".to_string();
    };
    match session.select_thread(tid) {
        Ok(()) => "OK".to_string(),
        Err(_) => "E02".to_string(),
    }
}

fn do_breakpoint(session: &mut Session, rest: &[u8], remove: bool) -> String {
    if rest.contains(&b';') {
        // conditional breakpoints are not supported
        return String::new();
    }
    let Some((kind, addr, len)) = parse_break(rest) else {
        return "E01".to_string();
    };
    if kind != 1 {
        return String::new();
    }
    let result = if remove {
        session.del_hw_break_selected(addr, len)
    } else {
        session.add_hw_break_selected(addr, len)
    };
    match result {
        Ok(()) => "OK".to_string(),
        Err(_) => "E02".to_string(),
    }
}

fn parse_break(rest: &[u8]) -> Option<(u64, u64, u64)> {
    let text = std::str::from_utf8(rest).ok()?;
    let mut parts = text.split(',');
    let kind = u64::from_str_radix(parts.next()?, 16).ok()?;
    let addr = u64::from_str_radix(parts.next()?, 16).ok()?;
    let len = u64::from_str_radix(parts.next()?, 16).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((kind, addr, len))
}

const MAX_PACKET_LENGTH: u64 = 4096;

fn do_query(session: &Session, rest: &[u8]) -> String {
    let text = String::from_utf8_lossy(rest);
    let (name, arg) = match text.split_once(':') {
        Some((n, a)) => (n, a),
        None => (text.as_ref(), ""),
    };
    match name.to_ascii_lowercase().as_str() {
        "c" => format!("QC{}", session.selected_hart_id()),
        "supported" => do_query_supported(arg),
        "symbol" => "OK".to_string(),
        "tstatus" => "T0;tnotrun:0".to_string(),
        "fthreadinfo" => {
            let ids: Vec<String> = session.hart_ids().map(|id| format!("{:x}", id)).collect();
            format!("m{}", ids.join(";"))
        }
        "sthreadinfo" => "l".to_string(),
        "attached" => "0".to_string(),
        _ => String::new(),
    }
}

fn do_query_supported(arg: &str) -> String {
    let mut resp = vec![
        format!("PacketSize={:x}", MAX_PACKET_LENGTH - 16),
        "ReverseStep+".to_string(),
        "ReverseContinue+".to_string(),
    ];
    for cap in arg.split(';') {
        if cap == "hwbreak+" {
            resp.push(cap.to_string());
        }
    }
    resp.join(";")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cursor::HartReplay;
    use crate::memory::MemoryMap;
    use crate::trace::TraceEntry;

    fn session_with_seed_trace() -> Session {
        let seq = vec![
            TraceEntry { pc: 0x1000, symbol: Some("f".into()) },
            TraceEntry { pc: 0x1002, symbol: Some("f".into()) },
            TraceEntry { pc: 0x1006, symbol: Some("f".into()) },
        ];
        let mut mem = MemoryMap::new();
        mem.add(0x1000, vec![0x17, 0x05, 0x00, 0x00, 0x13, 0x05, 0x00, 0x00]);
        let mut harts = BTreeMap::new();
        harts.insert(0, HartReplay::new(seq));
        Session::new(mem, harts, 4)
    }

    fn reply(outcome: DispatchOutcome) -> String {
        match outcome {
            DispatchOutcome::Reply(s) => s,
            DispatchOutcome::Close => panic!("expected a reply, got Close"),
        }
    }

    #[test]
    fn scenario_1_load_and_step_forward() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"qfThreadInfo")), "m0");
        assert_eq!(reply(dispatch(&mut session, b"Hg0")), "OK");
        assert_eq!(reply(dispatch(&mut session, b"s")), "T0520:02100000;");
    }

    #[test]
    fn scenario_2_continue_hits_breakpoint() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"Z1,1006,2")), "OK");
        assert_eq!(reply(dispatch(&mut session, b"c")), "T0520:06100000;hwbreak:;");
    }

    #[test]
    fn scenario_3_continue_falls_off_end() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"c")), "S03");
    }

    #[test]
    fn scenario_4_reverse_continue_to_start() {
        let mut session = session_with_seed_trace();
        dispatch(&mut session, b"c");
        assert_eq!(reply(dispatch(&mut session, b"bc")), "S00");
    }

    #[test]
    fn scenario_5_memory_read_mapped_and_unmapped() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"m1000,4")), "17050000");
        assert_eq!(reply(dispatch(&mut session, b"m2000,4")), "E01");
    }

    #[test]
    fn scenario_6_duplicate_breakpoint() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"Z1,1006,2")), "OK");
        assert_eq!(reply(dispatch(&mut session, b"Z1,1006,2")), "E02");
        assert_eq!(reply(dispatch(&mut session, b"z1,1006,2")), "OK");
        assert_eq!(reply(dispatch(&mut session, b"z1,1006,2")), "E02");
    }

    #[test]
    fn unrecognized_command_replies_empty() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"vMustReplyEmpty")), "");
    }

    #[test]
    fn kill_resets_and_closes() {
        let mut session = session_with_seed_trace();
        dispatch(&mut session, b"s");
        assert!(matches!(dispatch(&mut session, b"k"), DispatchOutcome::Close));
        assert_eq!(session.current_pc_selected(), 0x1000);
    }

    #[test]
    fn step_with_argument_is_rejected() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"s1000")), "E01");
    }

    #[test]
    fn step_back_at_start_of_stream_still_replies_trap() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"bs")), "T0520:00100000;");
    }

    #[test]
    fn step_forward_past_end_of_stream_still_replies_trap() {
        let mut session = session_with_seed_trace();
        dispatch(&mut session, b"s");
        dispatch(&mut session, b"s");
        // cursor is now at the synthetic "past end" position: last recorded
        // PC 0x1006 plus its inferred instruction length (2, compressed)
        assert_eq!(reply(dispatch(&mut session, b"s")), "T0520:08100000;");
        // stepping again stays at the same synthetic boundary, not an error
        assert_eq!(reply(dispatch(&mut session, b"s")), "T0520:08100000;");
    }

    #[test]
    fn conditional_breakpoint_is_unsupported() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"Z1,1006,2;cond")), "");
    }

    #[test]
    fn non_hw_breakpoint_kind_is_unsupported() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"Z0,1006,2")), "");
    }

    #[test]
    fn unknown_thread_selection_is_rejected() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"Hg9")), "E02");
    }

    #[test]
    fn query_supported_advertises_reverse_execution() {
        let mut session = session_with_seed_trace();
        let resp = reply(dispatch(&mut session, b"qSupported:hwbreak+;swbreak+"));
        assert!(resp.contains("ReverseStep+"));
        assert!(resp.contains("ReverseContinue+"));
        assert!(resp.contains("hwbreak+"));
        assert!(!resp.contains("swbreak+"));
    }

    #[test]
    fn query_symbol_and_attached_and_sthreadinfo() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"qSymbol::")), "OK");
        assert_eq!(reply(dispatch(&mut session, b"qAttached")), "0");
        assert_eq!(reply(dispatch(&mut session, b"qsThreadInfo")), "l");
        assert_eq!(reply(dispatch(&mut session, b"qTStatus")), "T0;tnotrun:0");
    }

    #[test]
    fn status_query_reports_s00() {
        let mut session = session_with_seed_trace();
        assert_eq!(reply(dispatch(&mut session, b"?")), "S00");
    }
}
