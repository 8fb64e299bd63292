//! Framing, CRC validation, and dispatch for Modbus RTU function codes 3 and 6.

use crate::crc::crc16;
use crate::mailbox::Mailbox;
use crate::registers::{ExceptionCode, HoldingRegisters};

/// Frame buffer capacity. Must cover the 8-byte request and the largest reply
/// (`5 + 2*MAX_REGISTERS`). Matches the original engine's `MAX_BUFFER` default.
pub const FRAME_MAX: usize = 20;

/// Largest register count a single read request can ask for without
/// overrunning `FRAME_MAX`.
pub const MAX_REGISTERS: usize = FRAME_MAX / 2;

const REQUEST_LEN: u8 = 8;
const EXCEPTION_LEN: u8 = 4;

/// RECEIVE/REPLY half-duplex phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(not(test), derive(defmt::Format))]
pub enum Phase {
    Receive,
    Reply,
}

/// The Modbus RTU slave engine: frame buffer plus receive/reply state.
///
/// Owns no mailbox — callers pass a `&Mailbox` to every method that needs to
/// cross the ISR boundary, so the engine itself never has to be a global.
pub struct Engine<R: HoldingRegisters> {
    buffer: [u8; FRAME_MAX],
    expected_len: u8,
    cursor: u8,
    phase: Phase,
    error_count: u8,
    registers: R,
}

impl<R: HoldingRegisters> Engine<R> {
    pub fn new(registers: R) -> Self {
        Self {
            buffer: [0; FRAME_MAX],
            expected_len: REQUEST_LEN,
            cursor: 0,
            phase: Phase::Receive,
            error_count: 0,
            registers,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn error_count(&self) -> u8 {
        self.error_count
    }

    /// Access to the backing register store, for callers that need to
    /// inspect or reconfigure it directly (tests, mainly).
    pub fn registers(&self) -> &R {
        &self.registers
    }

    /// Mutable access to the backing register store.
    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.registers
    }

    /// Return to the initial RECEIVE state: mailbox flags and data cells
    /// cleared, frame buffer zeroed, cursor/expected_len/error_count reset.
    pub fn reset(&mut self, mailbox: &Mailbox) {
        mailbox.clear_all();
        self.buffer = [0; FRAME_MAX];
        self.expected_len = REQUEST_LEN;
        self.cursor = 0;
        self.phase = Phase::Receive;
        self.error_count = 0;
    }

    /// Discard a partial frame: resets `expected_len`/`cursor` only. Leaves
    /// phase and mailbox flags untouched. Used on RX silence timeout.
    pub fn rx_clear(&mut self) {
        self.expected_len = REQUEST_LEN;
        self.cursor = 0;
    }

    /// One step of the engine. Call whenever the mailbox suggests there's
    /// work: after the ISR clears `TX_READY`, or after it sets `RX_READY`.
    /// Calling during RECEIVE with neither condition true is treated as an
    /// RX silence timeout.
    pub fn process(&mut self, mailbox: &Mailbox) {
        match self.phase {
            Phase::Receive => self.receive_step(mailbox),
            Phase::Reply => self.transmit_step(mailbox),
        }
    }

    fn receive_step(&mut self, mailbox: &Mailbox) {
        let Some(byte) = mailbox.take_rx_byte() else {
            self.rx_clear();
            return;
        };

        let mut cursor = self.cursor;
        self.buffer[cursor as usize] = byte;
        cursor += 1;

        if cursor == 2 {
            let function = self.buffer[1];
            if function != 3 && function != 6 {
                self.raise_exception(mailbox, ExceptionCode::IllegalFunction as u8);
            }
        }

        if cursor == self.expected_len {
            self.dispatch(mailbox);
        }

        if self.phase == Phase::Reply {
            self.cursor = 1;
            mailbox.begin_tx(self.buffer[0]);
        } else {
            self.cursor = cursor;
        }
    }

    fn transmit_step(&mut self, mailbox: &Mailbox) {
        let next = self.buffer[self.cursor as usize];
        if mailbox.try_queue_tx(next) {
            self.cursor += 1;
        }

        if self.cursor == self.expected_len {
            self.phase = Phase::Receive;
            self.cursor = 0;
            self.expected_len = REQUEST_LEN;
        }
    }

    fn dispatch(&mut self, mailbox: &Mailbox) {
        let len = self.expected_len as usize;
        let computed = crc16(&self.buffer[..len - 2]);
        let received = u16::from_le_bytes([self.buffer[len - 2], self.buffer[len - 1]]);
        if computed != received {
            self.raise_exception(mailbox, ExceptionCode::ServerDeviceFailure as u8);
            return;
        }

        match self.buffer[1] {
            3 => self.dispatch_read(mailbox),
            6 => self.dispatch_write(mailbox),
            // Unreachable in practice: an illegal function is already caught,
            // and turned into a 4-byte exception reply, as soon as byte 2
            // arrives — expected_len can't reach 8 with a function other
            // than 3 or 6 by the time dispatch runs.
            _ => self.raise_exception(mailbox, ExceptionCode::IllegalFunction as u8),
        }

        self.phase = Phase::Reply;
    }

    fn dispatch_read(&mut self, mailbox: &Mailbox) {
        let start_addr = be16(&self.buffer, 2);
        let count = be16(&self.buffer, 4);

        if count as usize > MAX_REGISTERS {
            self.raise_exception(mailbox, ExceptionCode::IllegalDataValue as u8);
            return;
        }
        let count = count as usize;

        let mut values = [0u16; MAX_REGISTERS];
        let result = self.registers.read_holding(start_addr, &mut values[..count]);

        // Write the register values into the reply area in native byte order
        // first, before anything is known to have failed.
        for (i, value) in values[..count].iter().enumerate() {
            let le = value.to_le_bytes();
            self.buffer[3 + 2 * i] = le[0];
            self.buffer[3 + 2 * i + 1] = le[1];
        }

        if let Err(code) = result {
            // Overwrites buffer[1..4], including the low byte of the first
            // register slot at offset 3, with the exception trailer.
            self.raise_exception(mailbox, code as u8);
        }

        // Unconditional native-to-wire byte swap over every requested slot.
        // On success this is the real endianness conversion; on a callback
        // error it also clobbers the trailer byte `raise_exception` just
        // wrote at offset 3 with whatever now sits at offset 4 — the same
        // aliasing this was adapted from produces, preserved bit-for-bit
        // (see DESIGN.md).
        for i in 0..count {
            self.buffer.swap(3 + 2 * i, 3 + 2 * i + 1);
        }

        if result.is_ok() {
            self.buffer[2] = (2 * count) as u8;
            let body_len = 3 + 2 * count;
            let crc = crc16(&self.buffer[..body_len]).to_le_bytes();
            self.buffer[body_len] = crc[0];
            self.buffer[body_len + 1] = crc[1];
            self.expected_len = (body_len + 2) as u8;
        }
    }

    fn dispatch_write(&mut self, mailbox: &Mailbox) {
        let addr = be16(&self.buffer, 2);
        let value = be16(&self.buffer, 4);
        if let Err(code) = self.registers.write_holding(addr, value) {
            self.raise_exception(mailbox, code as u8);
        }
        // Else: the reply is the request, byte-for-byte, already in the buffer.
    }

    /// Rewrite the buffer in place into a 4-byte exception frame, flip to
    /// REPLY, and report `RX_ERROR`. The trailer is a one-byte legacy LRC
    /// (`(~(node + function + code)) + 1`), not a CRC16 — preserved
    /// bit-for-bit from the engine this was adapted from, not "fixed".
    pub fn raise_exception(&mut self, mailbox: &Mailbox, code: u8) {
        let node = self.buffer[0];
        let function = self.buffer[1] | 0x80;
        self.buffer[1] = function;
        self.buffer[2] = code;

        let sum = node.wrapping_add(function).wrapping_add(code);
        self.buffer[3] = (!sum).wrapping_add(1);

        self.expected_len = EXCEPTION_LEN;
        self.phase = Phase::Reply;
        self.error_count = self.error_count.saturating_add(1);
        mailbox.set_rx_error();
    }
}

fn be16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}
