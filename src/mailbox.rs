//! Shared-memory contract between the engine's main-loop side and a UART ISR.
//!
//! Three single-byte cells — `in_byte`, `out_byte`, `status` — hand data
//! across the interrupt boundary. Every read-modify-write against `status`
//! (and its paired read of `in_byte` or write of `out_byte`) happens inside a
//! [`critical_section::with`] block, so the same code works whether the
//! backing target disables interrupts, takes a lock, or (on the host, under
//! `cargo test`) takes the default global critical-section lock.
//!
//! The method set is split in two so the two sides of the boundary can't
//! accidentally swap roles: engine-side methods are the exclusive producer of
//! `TX_READY` and consumer of `RX_READY`; ISR-side methods are the exclusive
//! producer of `RX_READY` and consumer of `TX_READY`.

use core::cell::Cell;
use critical_section::Mutex;

/// Set by the engine when `out_byte` has data to be sent. The ISR clears it
/// after reading `out_byte`.
pub const TX_READY: u8 = 0x01;
/// Set by the ISR after writing `in_byte` with newly received data. Cleared
/// by the engine once it has consumed the byte.
pub const RX_READY: u8 = 0x02;
/// Set on a protocol error (by the engine) or a framing/overrun error (by
/// host glue). Cleared by host glue once the line has been silent long enough.
pub const RX_ERROR: u8 = 0x04;

/// The three-byte shared mailbox.
pub struct Mailbox {
    in_byte: Mutex<Cell<u8>>,
    out_byte: Mutex<Cell<u8>>,
    status: Mutex<Cell<u8>>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            in_byte: Mutex::new(Cell::new(0)),
            out_byte: Mutex::new(Cell::new(0)),
            status: Mutex::new(Cell::new(0)),
        }
    }

    /// Raw status snapshot, for diagnostics and tests. Does not clear anything.
    pub fn status(&self) -> u8 {
        critical_section::with(|cs| self.status.borrow(cs).get())
    }

    // --- engine-side: exclusive producer of TX_READY, consumer of RX_READY ---

    /// If `RX_READY` is set, clear it and return the byte that was waiting.
    /// Otherwise return `None` — the caller should treat this as an RX
    /// silence timeout.
    pub fn take_rx_byte(&self) -> Option<u8> {
        critical_section::with(|cs| {
            let status = self.status.borrow(cs);
            let s = status.get();
            if s & RX_READY != 0 {
                status.set(s & !RX_READY);
                Some(self.in_byte.borrow(cs).get())
            } else {
                None
            }
        })
    }

    /// Unconditionally queue `byte` for transmission and set `TX_READY`.
    /// Used once, to kick off a reply.
    pub fn begin_tx(&self, byte: u8) {
        critical_section::with(|cs| {
            let status = self.status.borrow(cs);
            status.set(status.get() | TX_READY);
            self.out_byte.borrow(cs).set(byte);
        });
    }

    /// Queue `byte` for transmission only if the previous byte has already
    /// been drained by the ISR (`TX_READY` clear). Returns `true` if this
    /// call queued a new byte, `false` if the mailbox was left untouched
    /// because the ISR hasn't caught up yet.
    pub fn try_queue_tx(&self, byte: u8) -> bool {
        critical_section::with(|cs| {
            let status = self.status.borrow(cs);
            let s = status.get();
            if s & TX_READY == 0 {
                status.set(s | TX_READY);
                self.out_byte.borrow(cs).set(byte);
                true
            } else {
                false
            }
        })
    }

    /// Set `RX_ERROR`, reported by the engine on a protocol violation.
    pub fn set_rx_error(&self) {
        critical_section::with(|cs| {
            let status = self.status.borrow(cs);
            status.set(status.get() | RX_ERROR);
        });
    }

    /// Clear all flags and zero both data cells (used by `Engine::reset`).
    pub fn clear_all(&self) {
        critical_section::with(|cs| {
            self.status.borrow(cs).set(0);
            self.in_byte.borrow(cs).set(0);
            self.out_byte.borrow(cs).set(0);
        });
    }

    // --- ISR-side: exclusive producer of RX_READY, consumer of TX_READY ---

    /// Deposit a newly received byte and set `RX_READY`.
    pub fn isr_deliver_rx_byte(&self, byte: u8) {
        critical_section::with(|cs| {
            self.in_byte.borrow(cs).set(byte);
            let status = self.status.borrow(cs);
            status.set(status.get() | RX_READY);
        });
    }

    /// If `TX_READY` is set, clear it and return the byte to transmit.
    /// Otherwise return `None` — nothing is queued right now.
    pub fn isr_take_tx_byte(&self) -> Option<u8> {
        critical_section::with(|cs| {
            let status = self.status.borrow(cs);
            let s = status.get();
            if s & TX_READY != 0 {
                status.set(s & !TX_READY);
                Some(self.out_byte.borrow(cs).get())
            } else {
                None
            }
        })
    }

    /// Set `RX_ERROR`, reported by host glue on a framing/overrun error.
    pub fn isr_set_rx_error(&self) {
        self.set_rx_error();
    }

    /// Clear `RX_ERROR`, done by host glue once the silence interval has elapsed.
    pub fn clear_rx_error(&self) {
        critical_section::with(|cs| {
            let status = self.status.borrow(cs);
            status.set(status.get() & !RX_ERROR);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_round_trip() {
        let mbox = Mailbox::new();
        assert_eq!(mbox.take_rx_byte(), None);
        mbox.isr_deliver_rx_byte(0x42);
        assert_eq!(mbox.status() & RX_READY, RX_READY);
        assert_eq!(mbox.take_rx_byte(), Some(0x42));
        assert_eq!(mbox.status() & RX_READY, 0);
        assert_eq!(mbox.take_rx_byte(), None);
    }

    #[test]
    fn tx_busy_until_isr_drains() {
        let mbox = Mailbox::new();
        assert!(mbox.try_queue_tx(1));
        assert!(!mbox.try_queue_tx(2));
        assert_eq!(mbox.isr_take_tx_byte(), Some(1));
        assert!(mbox.try_queue_tx(3));
        assert_eq!(mbox.isr_take_tx_byte(), Some(3));
    }

    #[test]
    fn rx_error_set_and_cleared() {
        let mbox = Mailbox::new();
        mbox.set_rx_error();
        assert_eq!(mbox.status() & RX_ERROR, RX_ERROR);
        mbox.clear_rx_error();
        assert_eq!(mbox.status() & RX_ERROR, 0);
    }

    #[test]
    fn clear_all_resets_everything() {
        let mbox = Mailbox::new();
        mbox.isr_deliver_rx_byte(9);
        mbox.set_rx_error();
        mbox.clear_all();
        assert_eq!(mbox.status(), 0);
        assert_eq!(mbox.take_rx_byte(), None);
    }
}
