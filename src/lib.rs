//! Modbus RTU slave protocol engine.
//!
//! A byte-at-a-time Modbus RTU server core meant to run on a constrained
//! microcontroller next to a UART ISR: bytes arrive and leave one at a time
//! through a three-cell [`mailbox`], and [`engine::Engine::process`] is called
//! from the main loop whenever the mailbox says there's work to do.
//!
//! Supports function code 3 (read holding registers) and function code 6
//! (write single holding register) against a user-provided [`registers::HoldingRegisters`].
#![cfg_attr(not(test), no_std)]

pub mod crc;
pub mod engine;
pub mod mailbox;
pub mod registers;

pub use crc::crc16;
pub use engine::{Engine, Phase, FRAME_MAX, MAX_REGISTERS};
pub use mailbox::Mailbox;
pub use registers::{ExceptionCode, HoldingRegisters};

const _: () = assert!(FRAME_MAX < 256, "FRAME_MAX must be < 256");
