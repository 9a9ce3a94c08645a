//! Replay cursor (C3) — the central algorithmic piece.
//!
//! Each hart owns an immutable trace sequence and a cursor into it. The
//! cursor is a plain index, never a reference into the sequence, so that
//! bidirectional motion, reset, and the synthetic "past end" position are
//! all representable without lifetime gymnastics.

use std::ops::Range;

use crate::error::CursorError;
use crate::memory::MemoryMap;
use crate::trace::TraceEntry;

/// A fixed-length register view: 32 general-purpose registers (always
/// unset) followed by the program counter.
pub const REGISTER_COUNT: usize = 33;
/// Index of the PC within the register view.
pub const PC_REGISTER_INDEX: usize = REGISTER_COUNT - 1;

/// Per-hart replay state: an immutable trace, a cursor into it, and a set
/// of hardware breakpoints.
pub struct HartReplay {
    seq: Vec<TraceEntry>,
    cursor: usize,
    breakpoints: Vec<Range<u64>>,
}

impl HartReplay {
    pub fn new(seq: Vec<TraceEntry>) -> Self {
        Self {
            seq,
            cursor: 0,
            breakpoints: Vec::new(),
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.seq.len()
    }

    /// Advance (or rewind) the cursor by one recorded instruction.
    pub fn step(&mut self, back: bool) -> Result<(), CursorError> {
        if !back {
            if self.cursor + 1 > self.seq.len() {
                return Err(CursorError::EndOfStream);
            }
            self.cursor += 1;
        } else {
            if self.cursor == 0 {
                return Err(CursorError::StartOfStream);
            }
            self.cursor -= 1;
        }
        Ok(())
    }

    /// The PC the debugger would observe right now: the recorded PC at the
    /// cursor, or — once the cursor has walked off the end of the trace —
    /// the address immediately past the final recorded instruction.
    pub fn current_pc(&self, mem: &MemoryMap) -> u64 {
        if self.cursor < self.seq.len() {
            self.seq[self.cursor].pc
        } else {
            let last = self.seq.last().expect("trace is never empty");
            last.pc + self.instr_len(last.pc, mem) as u64
        }
    }

    /// Infer the length (2 or 4 bytes) of the instruction at `pc`.
    ///
    /// Reads up to 4 bytes little-endian; a compressed (16-bit) encoding
    /// is signaled by the low two bits of the word being `0b00`. Unmapped
    /// addresses default to 4 bytes and log an error rather than aborting
    /// the session.
    pub fn instr_len(&self, pc: u64, mem: &MemoryMap) -> u8 {
        match mem.read(pc, 4) {
            Ok(bytes) => {
                let mut word = [0u8; 4];
                word[..bytes.len()].copy_from_slice(&bytes);
                let word = u32::from_le_bytes(word);
                if word & 0x3 == 0 {
                    2
                } else {
                    4
                }
            }
            Err(_) => {
                log::error!("invalid PC @ cursor {}: 0x{:x} is not mapped", self.cursor, pc);
                4
            }
        }
    }

    /// Insert a hardware breakpoint over `[addr, addr+len)`.
    pub fn add_hw_break(&mut self, addr: u64, len: u64) -> Result<(), CursorError> {
        let range = addr..addr + len;
        if self.breakpoints.iter().any(|r| *r == range) {
            return Err(CursorError::Duplicate);
        }
        log::info!("add HW breakpoint on [{:#x}:{:#x}[", range.start, range.end);
        self.breakpoints.push(range);
        Ok(())
    }

    /// Remove a hardware breakpoint over `[addr, addr+len)`.
    pub fn del_hw_break(&mut self, addr: u64, len: u64) -> Result<(), CursorError> {
        let range = addr..addr + len;
        let pos = self
            .breakpoints
            .iter()
            .position(|r| *r == range)
            .ok_or(CursorError::Missing)?;
        self.breakpoints.remove(pos);
        log::info!("remove HW breakpoint from [{:#x}:{:#x}[", range.start, range.end);
        Ok(())
    }

    /// Reposition the cursor to the nearest index in `direction` whose PC
    /// equals `pc`, starting the search from the current cursor.
    fn move_to(&mut self, pc: u64, forward: bool) -> bool {
        if forward {
            let mut pos = self.cursor;
            while pos < self.seq.len() {
                if self.seq[pos].pc == pc {
                    self.cursor = pos;
                    return true;
                }
                pos += 1;
            }
        } else {
            let mut pos = self.cursor as isize;
            while pos >= 0 {
                if self.seq[pos as usize].pc == pc {
                    self.cursor = pos as usize;
                    return true;
                }
                pos -= 1;
            }
        }
        false
    }

    /// Continue execution until either a hardware breakpoint or the end
    /// (or start, for `back`) of the stream is reached.
    ///
    /// Returns `true` if a breakpoint was hit. If `resume_from` is given
    /// but no matching PC exists in the travel direction, the cursor is
    /// forced to the end of the stream (a soft failure, not an error).
    pub fn cont(&mut self, back: bool, resume_from: Option<u64>, mem: &MemoryMap) -> bool {
        if let Some(addr) = resume_from {
            if !self.move_to(addr, !back) {
                log::warn!("cannot resume from {:#x}", addr);
                self.cursor = self.seq.len();
            }
        }

        let mut last_pc: Option<u64> = None;
        loop {
            if self.step(back).is_err() {
                return false;
            }
            let _ = self.instr_len(self.current_pc(mem), mem);
            let pc = self.current_pc(mem);
            if Some(pc) == last_pc {
                continue;
            }
            last_pc = Some(pc);
            for (i, bp) in self.breakpoints.iter().enumerate() {
                if bp.contains(&pc) {
                    log::info!("breakpoint #{} @ {:#x}", i + 1, pc);
                    return true;
                }
            }
        }
    }

    /// Reset the cursor to the start of the trace.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// The fixed-length register view: all `None` except the PC.
    pub fn registers(&self, mem: &MemoryMap) -> [Option<u64>; REGISTER_COUNT] {
        let mut regs = [None; REGISTER_COUNT];
        regs[PC_REGISTER_INDEX] = Some(self.current_pc(mem));
        regs
    }
}
