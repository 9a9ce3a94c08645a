//! Session state.
//!
//! Ties together the memory map, the per-hart replay state, and the small
//! amount of mutable state the wire protocol layers on top (selected
//! thread, XLEN, ack-mode negotiation).

use std::collections::BTreeMap;

use crate::cursor::{HartReplay, REGISTER_COUNT};
use crate::error::CursorError;
use crate::memory::MemoryMap;

/// Everything the dispatcher (C5) needs to answer a debugger session.
pub struct Session {
    pub memory: MemoryMap,
    harts: BTreeMap<u32, HartReplay>,
    /// The hart targeted by operations that accept a thread selector.
    selected_hart: u32,
    /// Raw selector from the debugger's `H` command; a hint only. Values
    /// `<= 0` mean "any".
    selected_thread_for_cmd: i64,
    /// Address width in bytes (4 or 8); 4 unless an ELF established 8.
    pub xlen_bytes: u8,
    /// Whether the client has negotiated out of per-packet acks.
    pub no_ack: bool,
}

impl Session {
    pub fn new(memory: MemoryMap, harts: BTreeMap<u32, HartReplay>, xlen_bytes: u8) -> Self {
        let selected_hart = *harts.keys().next().expect("load fails on an empty trace");
        Self {
            memory,
            harts,
            selected_hart,
            selected_thread_for_cmd: selected_hart as i64,
            xlen_bytes,
            no_ack: false,
        }
    }

    pub fn hart_ids(&self) -> impl Iterator<Item = &u32> {
        self.harts.keys()
    }

    pub fn selected_hart_id(&self) -> u32 {
        self.selected_hart
    }

    pub fn selected_hart(&self) -> &HartReplay {
        self.harts
            .get(&self.selected_hart)
            .expect("selected_hart always names a loaded hart")
    }

    pub fn selected_hart_mut(&mut self) -> &mut HartReplay {
        self.harts
            .get_mut(&self.selected_hart)
            .expect("selected_hart always names a loaded hart")
    }

    /// Apply the debugger's `H<op><tid>` thread-selection command.
    ///
    /// `-1` means "any" and is never checked against the loaded harts,
    /// matching the reference server's `tid != -1` guard. Any other `tid`
    /// must name a loaded hart or this fails with `UnknownHart`. `tid <= 0`
    /// rebinds the operative hart to the smallest loaded hart id; a
    /// positive `tid` rebinds it to that hart directly.
    pub fn select_thread(&mut self, tid: i64) -> Result<(), CursorError> {
        if tid != -1 {
            let known = u32::try_from(tid)
                .ok()
                .is_some_and(|id| self.harts.contains_key(&id));
            if !known {
                return Err(CursorError::UnknownHart(tid));
            }
        }
        self.selected_thread_for_cmd = tid;
        if tid <= 0 {
            self.selected_hart = *self.harts.keys().next().expect("non-empty by construction");
        } else {
            self.selected_hart = tid as u32;
        }
        Ok(())
    }

    /// Reset every hart's cursor to the start of its trace (the `k`
    /// command).
    pub fn kill(&mut self) {
        for hart in self.harts.values_mut() {
            hart.reset();
        }
    }

    /// Step the selected hart. Split out from `selected_hart_mut` so the
    /// dispatcher never needs to borrow `memory` and a hart mutably at once.
    pub fn step_selected(&mut self, back: bool) -> Result<(), CursorError> {
        self.harts
            .get_mut(&self.selected_hart)
            .expect("selected_hart always names a loaded hart")
            .step(back)
    }

    /// Continue the selected hart, with disjoint borrows of `memory` and
    /// the hart map so both can be threaded through in one call.
    pub fn cont_selected(&mut self, back: bool, resume_from: Option<u64>) -> bool {
        let memory = &self.memory;
        self.harts
            .get_mut(&self.selected_hart)
            .expect("selected_hart always names a loaded hart")
            .cont(back, resume_from, memory)
    }

    pub fn current_pc_selected(&self) -> u64 {
        self.selected_hart().current_pc(&self.memory)
    }

    pub fn registers_selected(&self) -> [Option<u64>; REGISTER_COUNT] {
        self.selected_hart().registers(&self.memory)
    }

    pub fn add_hw_break_selected(&mut self, addr: u64, len: u64) -> Result<(), CursorError> {
        self.selected_hart_mut().add_hw_break(addr, len)
    }

    pub fn del_hw_break_selected(&mut self, addr: u64, len: u64) -> Result<(), CursorError> {
        self.selected_hart_mut().del_hw_break(addr, len)
    }
}
