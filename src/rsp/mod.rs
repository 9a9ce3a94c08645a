//! GDB remote serial protocol: framing (C4) and command dispatch (C5).

pub mod dispatch;
pub mod frame;

pub use dispatch::{dispatch, DispatchOutcome};
pub use frame::{encode, FrameOutcome, Framer};
