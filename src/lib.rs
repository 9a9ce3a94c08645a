//! Replay debugger server: exposes a previously captured RISC-V
//! instruction trace to a GDB remote-protocol client, with no live guest
//! behind it.

pub mod config;
pub mod cursor;
pub mod elf;
pub mod error;
pub mod memory;
pub mod rsp;
pub mod server;
pub mod session;
pub mod trace;
