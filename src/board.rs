//! Illustrative peripheral glue — not part of the protocol engine.
//!
//! A status LED that mirrors the original engine's raw-AVR habit of lighting
//! an LED (`PORTB |= _BV(PB5)`) whenever `RX_ERROR` is set, and turning it
//! back off once the silence timeout driving the recovery interval expires.

use embassy_rp::gpio::Output;

pub struct ErrorLed<'a> {
    pin: Output<'a>,
}

impl<'a> ErrorLed<'a> {
    pub fn new(pin: Output<'a>) -> Self {
        Self { pin }
    }

    pub fn set(&mut self, on: bool) {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}
