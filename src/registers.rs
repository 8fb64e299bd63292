//! The register store the engine dispatches against, consumed but not owned.

/// Modbus exception codes the engine can put on the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(not(test), derive(defmt::Format))]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 1,
    IllegalDataAddress = 2,
    IllegalDataValue = 3,
    ServerDeviceFailure = 4,
}

/// A holding-register backing store.
///
/// Both methods work in the store's native byte order; the engine performs
/// the big-endian swap at the wire boundary on the caller's behalf. Returning
/// `Err` is how a store signals a Modbus exception — the engine forms the
/// exception frame from the returned code, so implementations never need to
/// reach back into engine internals.
pub trait HoldingRegisters {
    /// Fill `out` with `out.len()` consecutive register values starting at `addr`.
    fn read_holding(&mut self, addr: u16, out: &mut [u16]) -> Result<(), ExceptionCode>;

    /// Write a single register at `addr`.
    fn write_holding(&mut self, addr: u16, value: u16) -> Result<(), ExceptionCode>;
}
