//! Demonstration firmware binary: wires a blocking UART and a silence-timeout
//! tick to the protocol engine, standing in for the original engine's raw
//! UART ISR + `TIMER0_OVF_vect`. Illustrative glue, not part of the core.
#![no_std]
#![no_main]

#[path = "../sys.rs"]
mod sys;
#[path = "../board.rs"]
mod board;

use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{Config, DataBits, Parity, StopBits, Uart};
use embassy_time::{Duration, Instant};
use {defmt_rtt as _, panic_probe as _};

use mbus_slave::{ExceptionCode, Engine, HoldingRegisters, Mailbox};

/// ~1 second of line silence, matching the original engine's timeout interval.
const SILENCE_TIMEOUT: Duration = Duration::from_secs(1);

/// A fixed bank of in-RAM holding registers, standing in for an EEPROM-backed
/// register file.
struct RamRegisters {
    values: [u16; 64],
}

impl RamRegisters {
    const fn new() -> Self {
        Self { values: [0; 64] }
    }
}

impl HoldingRegisters for RamRegisters {
    fn read_holding(&mut self, addr: u16, out: &mut [u16]) -> Result<(), ExceptionCode> {
        let start = addr as usize;
        let end = start + out.len();
        if end > self.values.len() {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        out.copy_from_slice(&self.values[start..end]);
        Ok(())
    }

    fn write_holding(&mut self, addr: u16, value: u16) -> Result<(), ExceptionCode> {
        let idx = addr as usize;
        let Some(slot) = self.values.get_mut(idx) else {
            return Err(ExceptionCode::IllegalDataAddress);
        };
        *slot = value;
        Ok(())
    }
}

static MAILBOX: Mailbox = Mailbox::new();

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    sys::init();

    let p = embassy_rp::init(Default::default());

    let mut cfg = Config::default();
    cfg.baudrate = 19_200;
    cfg.data_bits = DataBits::Eight;
    cfg.parity = Parity::None;
    cfg.stop_bits = StopBits::One;

    let mut uart: Uart<'_, UART0, embassy_rp::uart::Blocking> =
        Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, cfg);

    let mut error_led = board::ErrorLed::new(Output::new(p.PIN_25, Level::Low));

    let mut engine = Engine::new(RamRegisters::new());
    engine.reset(&MAILBOX);

    let mut rx_buf = [0u8; 1];
    let mut last_rx = Instant::now();

    loop {
        // Drain anything the engine has queued for transmission.
        if let Some(byte) = MAILBOX.isr_take_tx_byte() {
            let _ = uart.write(&[byte]);
            engine.process(&MAILBOX);
        }

        // Half-duplex: only look for new input while not mid-reply.
        match uart.read(&mut rx_buf) {
            Ok(n) if n > 0 => {
                MAILBOX.isr_deliver_rx_byte(rx_buf[0]);
                last_rx = Instant::now();
                engine.process(&MAILBOX);
            }
            Ok(_) => {
                if Instant::now() - last_rx > SILENCE_TIMEOUT {
                    engine.process(&MAILBOX);
                    last_rx = Instant::now();
                }
            }
            Err(_) => {
                MAILBOX.isr_set_rx_error();
            }
        }

        error_led.set(MAILBOX.status() & mbus_slave::mailbox::RX_ERROR != 0);
    }
}
