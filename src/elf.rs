//! ELF/object-file loader (C7).
//!
//! Parses a RISC-V executable ELF file into a `(load_address, bytes,
//! xlen_bits)` triple — the pre-extracted form the replay engine's
//! memory map actually consumes. This sits outside the core replay engine
//! (spec.md calls the object-file loader an external collaborator), but
//! the crate still ships one so the binary is runnable end-to-end.

use goblin::elf::program_header::PT_LOAD;
use goblin::elf::{header, Elf};

use crate::error::LoadError;

/// A contiguous, loadable blob extracted from an ELF file, plus its
/// target load address and the address width it was built for.
pub struct ElfBlob {
    pub load_address: u64,
    pub bytes: Vec<u8>,
    pub xlen_bits: u32,
}

/// Parse `buffer` as a RISC-V executable ELF and extract its loadable
/// segments into one contiguous blob.
///
/// Segments are sorted by physical address; gaps between segments are
/// filled with zero bytes so the result is a single contiguous buffer
/// starting at the lowest segment's physical address, mirroring the
/// reference loader's `ElfBlob._build_payload`.
pub fn load(buffer: &[u8]) -> Result<ElfBlob, LoadError> {
    let elf = Elf::parse(buffer)?;

    if elf.header.e_machine != header::EM_RISCV {
        return Err(LoadError::NotRiscV);
    }
    if elf.header.e_type != header::ET_EXEC {
        return Err(LoadError::NotExecutable);
    }

    let mut segments: Vec<_> = elf
        .program_headers
        .iter()
        .filter(|ph| ph.p_type == PT_LOAD && ph.p_filesz > 0)
        .collect();
    segments.sort_by_key(|ph| ph.p_paddr);

    let mut blob = Vec::new();
    let mut base: Option<u64> = None;
    for ph in segments {
        let paddr = ph.p_paddr;
        match base {
            None => base = Some(paddr),
            Some(start) => {
                let current_end = start + blob.len() as u64;
                if paddr > current_end {
                    blob.resize(blob.len() + (paddr - current_end) as usize, 0);
                }
            }
        }
        let offset = ph.p_offset as usize;
        let size = ph.p_filesz as usize;
        blob.extend_from_slice(&buffer[offset..offset + size]);
    }

    let load_address = base.ok_or(LoadError::NoLoadableSegment)?;
    let xlen_bits = if elf.is_64 { 64 } else { 32 };

    log::debug!(
        "ELF loaded: entry={:#x}, load_address={:#x}, size={}",
        elf.entry,
        load_address,
        blob.len()
    );

    Ok(ElfBlob { load_address, bytes: blob, xlen_bits })
}
