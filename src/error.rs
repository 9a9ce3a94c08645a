//! Error types for each component boundary, composed into a single
//! top-level error for `main`.

use thiserror::Error;

/// Errors from the memory map (C1).
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("address {0:#x} is not mapped by any memory bank")]
    NotMapped(u64),
}

/// Errors from trace-stream loading (C2).
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("no trace entries found in input")]
    Empty,
}

/// Errors from the replay cursor (C3).
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("reached end of execution stream")]
    EndOfStream,
    #[error("reached start of execution stream")]
    StartOfStream,
    #[error("duplicate hardware breakpoint")]
    Duplicate,
    #[error("no such hardware breakpoint")]
    Missing,
    #[error("unknown hart id {0}")]
    UnknownHart(i64),
}

/// Errors from the ELF/object-file loader (C7).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ELF parse error: {0}")]
    Elf(#[from] goblin::error::Error),
    #[error("not a RISC-V ELF file")]
    NotRiscV,
    #[error("not an executable ELF file")]
    NotExecutable,
    #[error("no loadable segment found")]
    NoLoadableSegment,
    #[error("ELF load address width ({found} bits) conflicts with previously established XLEN ({expected} bits)")]
    XlenMismatch { expected: u32, found: u32 },
}

/// Errors from configuration / the invocation layer (C8).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("expected the same count of --address and --bin arguments, got {addresses} address(es) and {bins} bin(s)")]
    AddressBinCountMismatch { addresses: usize, bins: usize },
    #[error("invalid gdb endpoint {0:?}: expected host:port")]
    InvalidEndpoint(String),
    #[error("invalid gdb port in {0:?}")]
    InvalidPort(String),
    #[error("invalid --address value {0:?}: expected a hex address")]
    InvalidAddress(String),
}

/// Top-level error returned from `main`.
#[derive(Debug, Error)]
pub enum GdbReplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
