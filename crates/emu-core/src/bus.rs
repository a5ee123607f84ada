//! Memory-mapped bus interface exposed to an external CPU core.

/// Memory-mapped bus interface.
///
/// The drive CPU itself lives outside this workspace. It reaches RAM, ROM and
/// the controller chips through this trait; the implementor does the address
/// decoding and makes every side effect of a write visible before returning.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);
}
