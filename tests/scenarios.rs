//! End-to-end replays of the documented wire-format fixtures, driven only
//! through `mbus_slave`'s public API — the crate-internal unit tests in
//! `src/engine.rs` cover receive/transmit state-machine details that aren't
//! reachable from outside the crate.

use mbus_slave::{Engine, ExceptionCode, HoldingRegisters, Mailbox, Phase};

/// A register store whose read/write calls can be told to fail, the way
/// `original_source/testmbus.c`'s mock always fills its output buffer before
/// checking a `read_fail`/`write_fail` flag.
struct FixedStore {
    read_values: [u16; 4],
    read_fail: Option<ExceptionCode>,
    write_fail: Option<ExceptionCode>,
    reads: u32,
    writes: u32,
    last_read_addr: u16,
    last_read_count: usize,
    last_write: Option<(u16, u16)>,
}

impl FixedStore {
    fn new() -> Self {
        Self {
            read_values: [0x0001, 0x0203, 0x0405, 0x0607],
            read_fail: None,
            write_fail: None,
            reads: 0,
            writes: 0,
            last_read_addr: 0,
            last_read_count: 0,
            last_write: None,
        }
    }
}

impl HoldingRegisters for FixedStore {
    fn read_holding(&mut self, addr: u16, out: &mut [u16]) -> Result<(), ExceptionCode> {
        self.reads += 1;
        self.last_read_addr = addr;
        self.last_read_count = out.len();
        out.copy_from_slice(&self.read_values[..out.len()]);
        match self.read_fail {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn write_holding(&mut self, addr: u16, value: u16) -> Result<(), ExceptionCode> {
        self.writes += 1;
        self.last_write = Some((addr, value));
        match self.write_fail {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }
}

const RX_ERROR: u8 = 0x04;
const TX_READY: u8 = 0x01;

/// Feed `request` into the engine byte by byte via the mailbox, driving
/// `process` the way a UART ISR + main loop would.
fn feed(engine: &mut Engine<FixedStore>, mailbox: &Mailbox, request: &[u8]) {
    for &b in request {
        mailbox.isr_deliver_rx_byte(b);
        engine.process(mailbox);
    }
}

/// Drain every byte the engine has queued for transmission, alternating
/// "ISR drains one byte" with "main loop calls process() in response" the
/// way real hardware would.
fn drain(engine: &mut Engine<FixedStore>, mailbox: &Mailbox) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        if let Some(b) = mailbox.isr_take_tx_byte() {
            out.push(b);
            if engine.phase() == Phase::Reply {
                engine.process(mailbox);
            }
        } else if engine.phase() == Phase::Reply {
            engine.process(mailbox);
        } else {
            break;
        }
    }
    out
}

fn write_recovers(engine: &mut Engine<FixedStore>, mailbox: &Mailbox) {
    let request = [0x01, 0x06, 0x21, 0x43, 0x56, 0x78, 0xA0, 0x4D];
    feed(engine, mailbox, &request);
    let reply = drain(engine, mailbox);
    assert_eq!(reply.as_slice(), &request);
}

#[test]
fn scenario_read_four_registers() {
    let mailbox = Mailbox::new();
    let mut engine = Engine::new(FixedStore::new());

    feed(
        &mut engine,
        &mailbox,
        &[0x01, 0x03, 0x12, 0x34, 0x00, 0x04, 0xBF, 0x00],
    );
    assert_eq!(engine.registers().reads, 1);
    assert_eq!(engine.registers().writes, 0);
    assert_eq!(engine.registers().last_read_addr, 0x1234);
    assert_eq!(engine.registers().last_read_count, 4);

    let reply = drain(&mut engine, &mailbox);
    assert_eq!(
        reply.as_slice(),
        &[0x01, 0x03, 0x08, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0xA6, 0x93]
    );
    assert_eq!(engine.phase(), Phase::Receive);
}

#[test]
fn scenario_write_single_register() {
    let mailbox = Mailbox::new();
    let mut engine = Engine::new(FixedStore::new());

    let request = [0x01, 0x06, 0x21, 0x43, 0x56, 0x78, 0xA0, 0x4D];
    feed(&mut engine, &mailbox, &request);
    assert_eq!(engine.registers().writes, 1);
    assert_eq!(engine.registers().last_write, Some((0x2143, 0x5678)));

    let reply = drain(&mut engine, &mailbox);
    assert_eq!(reply.as_slice(), &request);
}

#[test]
fn scenario_illegal_function() {
    let mailbox = Mailbox::new();
    let mut engine = Engine::new(FixedStore::new());

    feed(&mut engine, &mailbox, &[0x01, 0x08]);
    assert_eq!(mailbox.status(), RX_ERROR | TX_READY);

    let reply = drain(&mut engine, &mailbox);
    assert_eq!(reply.as_slice(), &[0x01, 0x88, 0x01, 0x76]);
    assert_eq!(engine.registers().reads, 0);
    assert_eq!(engine.registers().writes, 0);

    mailbox.clear_rx_error();
    assert_eq!(mailbox.status(), 0);
    write_recovers(&mut engine, &mailbox);
}

#[test]
fn scenario_bad_crc() {
    let mailbox = Mailbox::new();
    let mut engine = Engine::new(FixedStore::new());

    feed(
        &mut engine,
        &mailbox,
        &[0x01, 0x03, 0x12, 0x34, 0x00, 0x04, 0xFF, 0xFF],
    );
    assert_eq!(mailbox.status(), RX_ERROR | TX_READY);

    let reply = drain(&mut engine, &mailbox);
    assert_eq!(reply.as_slice(), &[0x01, 0x83, 0x04, 0x78]);

    mailbox.clear_rx_error();
    write_recovers(&mut engine, &mailbox);
}

#[test]
fn scenario_store_read_error() {
    let mailbox = Mailbox::new();
    let mut engine = Engine::new(FixedStore::new());
    engine.registers_mut().read_fail = Some(ExceptionCode::IllegalDataAddress);

    feed(
        &mut engine,
        &mailbox,
        &[0x01, 0x03, 0x12, 0x34, 0x00, 0x04, 0xBF, 0x00],
    );
    let reply = drain(&mut engine, &mailbox);
    // The reply area is filled in native byte order from the (fully-populated,
    // per testmbus.c's own mock) register values *before* the store's error is
    // known, so `raise_exception` only overwrites the low byte of that first
    // slot (offset 3) with the LRC trailer (0x7A here). The dispatcher then
    // unconditionally byte-swaps every requested register slot to convert it
    // to wire order, regardless of whether the read succeeded — which clobbers
    // that same offset 3 with whatever sits at offset 4 (the untouched high
    // byte of register 0, 0x00). This reproduces the original engine's
    // read-path union aliasing bit-for-bit: the documented trailer is 0x00,
    // not the 0x7A the LRC formula alone would suggest (see DESIGN.md).
    assert_eq!(reply.as_slice(), &[0x01, 0x83, 0x02, 0x00]);
    assert_eq!(engine.registers().reads, 1);
    assert_eq!(engine.registers().writes, 0);
}

#[test]
fn scenario_store_write_error() {
    let mailbox = Mailbox::new();
    let mut engine = Engine::new(FixedStore::new());
    engine.registers_mut().write_fail = Some(ExceptionCode::IllegalDataValue);

    feed(
        &mut engine,
        &mailbox,
        &[0x01, 0x06, 0x21, 0x43, 0x56, 0x78, 0xA0, 0x4D],
    );
    let reply = drain(&mut engine, &mailbox);
    assert_eq!(reply.as_slice(), &[0x01, 0x86, 0x03, 0x76]);
}
