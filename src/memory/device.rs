use crate::mos65xx::Signal;

/// A memory-mapped peripheral.
///
/// One device object may back several bus addresses; `read`/`write` receive
/// the *full* original address so the device can decode its own sub-ports.
///
/// `housekeeping` runs once per executed instruction, outside any bus access,
/// and is where a device moves data in and out of the outside world. Any
/// control-line signals it raises are routed back to the host by the memory
/// map.
pub trait Device {
    fn read(&mut self, address: u16) -> u8;

    fn write(&mut self, address: u16, value: u8);

    /// A short label for memory-map listings, e.g. `"PIA6820"`.
    fn kind(&self) -> &str;

    fn housekeeping(&mut self) -> Vec<Signal>;
}
