mod device;
mod element;

use std::cell::RefCell;
use std::fmt::Write as _;
use std::path::Path;
use std::rc::Rc;

use log::info;
use thiserror::Error;

use crate::mos65xx::{Bus, Signal};

pub use device::Device;
pub use element::Element;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("invalid address range {start:#06x}:{end:#06x}")]
    OutOfRange { start: u16, end: u16 },

    #[error("address range {start:#06x}:{end:#06x} overlaps with existing map")]
    Overlap { start: u16, end: u16 },

    #[error("data will not fit into memory at start address {start:#06x} (data length {len} bytes)")]
    WontFit { start: u16, len: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<A> = std::result::Result<A, MemoryError>;

/// What to do when a region-mapping call lands on addresses that are already
/// mapped.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum OverlapPolicy {
    /// Silently replace whatever was there (the default).
    #[default]
    Replace,

    /// Fail the mapping call with [`MemoryError::Overlap`].
    Refuse,
}

/// A 16-bit address space where every address independently resolves to one
/// [`Element`]: unmapped, a RAM cell, a ROM cell, or a shared device.
///
/// `read` and `write` can never fail; all the failure modes live in the
/// region-mapping and bulk-load calls. A parallel watchpoint bit per address
/// logs writes for the benefit of debug tooling.
pub struct Memory {
    elements: Vec<Element>,
    watch: Vec<bool>,
    devices: Vec<Rc<RefCell<dyn Device>>>,
    overlap_policy: OverlapPolicy,
}

impl Memory {
    /// Number of addressable bytes behind a 16-bit bus.
    pub const SIZE: usize = 65536;

    pub fn new() -> Memory {
        Memory {
            elements: vec![Element::Unmapped; Memory::SIZE],
            watch: vec![false; Memory::SIZE],
            devices: Vec::new(),
            overlap_policy: OverlapPolicy::default(),
        }
    }

    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Memory {
        self.overlap_policy = policy;
        self
    }

    //////////
    // Bus access

    pub fn read(&self, address: u16) -> u8 {
        self.elements[address as usize].read(address)
    }

    pub fn write(&mut self, address: u16, value: u8) {
        if self.watch[address as usize] {
            info!(
                "mem[{:04x}] {:02x} -> {:02x}",
                address,
                self.read(address),
                value
            );
        }

        self.elements[address as usize].write(address, value);
    }

    //////////
    // Region mapping

    /// Map `start..=end` as RAM, zero-filled.
    pub fn map_ram(&mut self, start: u16, end: u16) -> Result<()> {
        if start > end {
            return Err(MemoryError::OutOfRange { start, end });
        }
        self.check_overlap(start, end)?;

        for address in start..=end {
            self.elements[address as usize] = Element::Ram(0);
        }

        Ok(())
    }

    /// Map a ROM image starting at `start`. Writes to the region are silently
    /// discarded from then on.
    pub fn map_rom(&mut self, start: u16, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if start as usize + data.len() > Memory::SIZE {
            return Err(MemoryError::WontFit {
                start,
                len: data.len(),
            });
        }

        let end = start + (data.len() - 1) as u16;
        self.check_overlap(start, end)?;

        for (offset, &byte) in data.iter().enumerate() {
            self.elements[start as usize + offset] = Element::Rom(byte);
        }

        Ok(())
    }

    /// Map `start..=end` as zero-filled ROM. Useful for reserving a region
    /// that reads as zeroes and swallows writes.
    pub fn map_rom_region(&mut self, start: u16, end: u16) -> Result<()> {
        if start > end {
            return Err(MemoryError::OutOfRange { start, end });
        }

        let size = end as usize - start as usize + 1;
        self.map_rom(start, &vec![0; size])
    }

    /// Map `len` addresses from `base` to a shared device. The device sees
    /// the full original address on every access, so it can decode sub-ports
    /// itself.
    pub fn map_device(&mut self, device: Rc<RefCell<dyn Device>>, base: u16, len: u16) -> Result<()> {
        if len == 0 || base as usize + len as usize > Memory::SIZE {
            return Err(MemoryError::WontFit {
                start: base,
                len: len as usize,
            });
        }

        let end = base + (len - 1);
        self.check_overlap(base, end)?;

        for address in base..=end {
            self.elements[address as usize] = Element::Device(Rc::clone(&device));
        }
        self.devices.push(device);

        Ok(())
    }

    fn check_overlap(&self, start: u16, end: u16) -> Result<()> {
        if self.overlap_policy == OverlapPolicy::Refuse
            && (start..=end).any(|a| self.elements[a as usize].is_mapped())
        {
            return Err(MemoryError::Overlap { start, end });
        }
        Ok(())
    }

    //////////
    // Bulk loads

    /// Write `data` through the current mapping starting at `start`. RAM
    /// cells take the bytes; ROM, unmapped and device addresses keep their
    /// own semantics.
    pub fn load_data(&mut self, data: &[u8], start: u16) -> Result<()> {
        if start as usize + data.len() > Memory::SIZE {
            return Err(MemoryError::WontFit {
                start,
                len: data.len(),
            });
        }

        for (offset, &byte) in data.iter().enumerate() {
            let address = start + offset as u16;
            self.elements[address as usize].write(address, byte);
        }

        Ok(())
    }

    /// Load a raw binary image from `path` through the current mapping.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>, start: u16) -> Result<()> {
        let data = std::fs::read(path)?;
        self.load_data(&data, start)
    }

    /// Load a raw binary image from `path` and map it as ROM.
    pub fn load_rom_from_file(&mut self, path: impl AsRef<Path>, start: u16) -> Result<()> {
        let data = std::fs::read(path)?;
        self.map_rom(start, &data)
    }

    //////////
    // Diagnostics

    /// Find every address where `pattern` matches the memory contents, with
    /// `mask` ANDed onto each read value before comparison. A mask of `0xFF`
    /// is an exact match.
    pub fn find(&self, pattern: &[u8], mask: u8) -> Vec<u16> {
        let mut positions = Vec::new();

        if pattern.is_empty() || pattern.len() > Memory::SIZE {
            return positions;
        }

        for start in 0..=(Memory::SIZE - pattern.len()) {
            let matches = pattern
                .iter()
                .enumerate()
                .all(|(i, &byte)| self.read((start + i) as u16) & mask == byte);

            if matches {
                positions.push(start as u16);
            }
        }

        positions
    }

    /// Render `start..=end` as a classic hexdump: address, up to sixteen hex
    /// bytes, and a printable-ASCII gutter.
    pub fn hexdump(&self, start: u16, end: u16) -> String {
        let mut out = String::new();

        if start > end {
            return out;
        }

        for line_start in (start..=end).step_by(16) {
            let line_end = line_start.saturating_add(15).min(end);

            let mut hex = String::new();
            let mut ascii = String::new();
            for address in line_start..=line_end {
                let value = self.read(address);
                let _ = write!(hex, "{:02x} ", value);
                if value.is_ascii() && !value.is_ascii_control() {
                    ascii.push(value as char);
                } else {
                    ascii.push('.');
                }
            }

            let _ = writeln!(out, "{:04x}  {:<48}{}", line_start, hex, ascii);
        }

        out
    }

    /// Render the memory map as one line per run of same-kind addresses,
    /// with a byte total at the end.
    pub fn print_map(&self) -> String {
        let mut out = String::from("Memory map:\n");
        let mut mapped_bytes = 0usize;

        let mut run_start = 0usize;
        let mut run_kind = self.elements[0].kind();

        for address in 0..=Memory::SIZE {
            let kind = if address < Memory::SIZE {
                if self.elements[address].is_mapped() {
                    mapped_bytes += 1;
                }
                self.elements[address].kind()
            } else {
                String::new()
            };

            if address == Memory::SIZE || kind != run_kind {
                let run_end = address - 1;
                let _ = writeln!(
                    out,
                    "{:04x} - {:04x} {:<9} {:>5} bytes",
                    run_start,
                    run_end,
                    run_kind,
                    run_end - run_start + 1
                );
                run_start = address;
                run_kind = kind;
            }
        }

        let _ = writeln!(out, "Total bytes mapped:   {} bytes", mapped_bytes);
        let _ = writeln!(out, "Total memory size :   {} bytes", Memory::SIZE);

        out
    }

    //////////
    // Watchpoints

    pub fn enable_watch(&mut self, address: u16) {
        self.watch[address as usize] = true;
    }

    pub fn clear_watch(&mut self, address: u16) {
        self.watch[address as usize] = false;
    }

    pub fn clear_all_watches(&mut self) {
        self.watch.iter_mut().for_each(|w| *w = false);
    }

    pub fn watching(&self, address: u16) -> bool {
        self.watch[address as usize]
    }

    pub fn watch_list(&self) -> Vec<u16> {
        self.watch
            .iter()
            .enumerate()
            .filter(|(_, &watching)| watching)
            .map(|(address, _)| address as u16)
            .collect()
    }

    //////////
    // Devices

    /// Run every registered device's housekeeping once and return the
    /// highest-precedence signal raised this pass.
    pub fn run_devices(&mut self) -> Signal {
        let mut winner = Signal::None;

        for device in &self.devices {
            for signal in device.borrow_mut().housekeeping() {
                winner = winner.max(signal);
            }
        }

        winner
    }
}

impl Default for Memory {
    fn default() -> Memory {
        Memory::new()
    }
}

impl Bus for Memory {
    fn write_u8(&mut self, address: u16, data: u8) {
        self.write(address, data);
    }

    fn read_u8(&self, address: u16) -> u8 {
        self.read(address)
    }

    fn housekeeping(&mut self) -> Signal {
        self.run_devices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PortCounter {
        reads: Vec<u16>,
        writes: Vec<(u16, u8)>,
        signals: Vec<Signal>,
    }

    impl PortCounter {
        fn new() -> Rc<RefCell<PortCounter>> {
            Rc::new(RefCell::new(PortCounter {
                reads: Vec::new(),
                writes: Vec::new(),
                signals: Vec::new(),
            }))
        }
    }

    impl Device for PortCounter {
        fn read(&mut self, address: u16) -> u8 {
            self.reads.push(address);
            0x5A
        }

        fn write(&mut self, address: u16, value: u8) {
            self.writes.push((address, value));
        }

        fn kind(&self) -> &str {
            "PortCounter"
        }

        fn housekeeping(&mut self) -> Vec<Signal> {
            self.signals.drain(..).collect()
        }
    }

    #[test]
    pub fn unmapped_reads_zero_and_discards_writes() {
        let mut memory = Memory::new();

        memory.write(0x1234, 0xFF);
        assert_eq!(memory.read(0x1234), 0);
    }

    #[test]
    pub fn ram_roundtrips_data() {
        let mut memory = Memory::new();
        memory.map_ram(0x0000, 0x0FFF).unwrap();

        memory.write(0x0123, 0xBE);
        assert_eq!(memory.read(0x0123), 0xBE);
    }

    #[test]
    pub fn rom_keeps_its_image_and_ignores_writes() {
        let mut memory = Memory::new();
        memory.map_rom(0xFF00, &[0xAA, 0xBB, 0xCC]).unwrap();

        assert_eq!(memory.read(0xFF00), 0xAA);
        assert_eq!(memory.read(0xFF02), 0xCC);

        memory.write(0xFF00, 0x00);
        assert_eq!(memory.read(0xFF00), 0xAA);
    }

    #[test]
    pub fn load_data_roundtrips_through_ram() {
        let mut memory = Memory::new();
        memory.map_ram(0x0000, 0x7FFF).unwrap();

        let data = vec![0x01, 0x02, 0x03, 0x04];
        memory.load_data(&data, 0x0400).unwrap();

        let read_back: Vec<u8> = (0x0400..0x0404).map(|a| memory.read(a)).collect();
        assert_eq!(read_back, data);
    }

    #[test]
    pub fn load_data_honors_rom_semantics() {
        let mut memory = Memory::new();
        memory.map_rom(0x0000, &[0xEE, 0xEE]).unwrap();

        memory.load_data(&[0x11, 0x22], 0x0000).unwrap();
        assert_eq!(memory.read(0x0000), 0xEE);
    }

    #[test]
    pub fn oversized_loads_wont_fit() {
        let mut memory = Memory::new();
        memory.map_ram(0x0000, 0xFFFF).unwrap();

        let result = memory.load_data(&[0; 4], 0xFFFE);
        assert!(matches!(result, Err(MemoryError::WontFit { .. })));

        let result = memory.map_rom(0xFFFF, &[0, 0]);
        assert!(matches!(result, Err(MemoryError::WontFit { .. })));
    }

    #[test]
    pub fn refuse_policy_reports_overlap() {
        let mut memory = Memory::new().with_overlap_policy(OverlapPolicy::Refuse);
        memory.map_ram(0x0000, 0x00FF).unwrap();

        let result = memory.map_ram(0x0080, 0x0180);
        assert!(matches!(result, Err(MemoryError::Overlap { .. })));

        // The default policy replaces silently.
        let mut memory = Memory::new();
        memory.map_ram(0x0000, 0x00FF).unwrap();
        memory.map_rom(0x0000, &[0x42]).unwrap();
        assert_eq!(memory.read(0x0000), 0x42);
    }

    #[test]
    pub fn find_matches_with_mask() {
        let mut memory = Memory::new();
        memory.map_ram(0x0000, 0x0FFF).unwrap();
        memory.load_data(&[0xDE, 0xAD, 0xBE, 0xEF], 0x0200).unwrap();

        assert_eq!(memory.find(&[0xDE, 0xAD], 0xFF), vec![0x0200]);

        // Masking to the high nibble turns 0xBE/0xEF into 0xB0/0xE0.
        assert_eq!(memory.find(&[0xB0, 0xE0], 0xF0), vec![0x0202]);

        assert!(memory.find(&[0x12, 0x34], 0xFF).is_empty());
    }

    #[test]
    pub fn hexdump_formats_address_bytes_and_ascii() {
        let mut memory = Memory::new();
        memory.map_ram(0x0000, 0x00FF).unwrap();
        memory.load_data(b"HELLO", 0x0010).unwrap();

        let dump = memory.hexdump(0x0010, 0x001F);
        let first_line = dump.lines().next().unwrap();

        assert!(first_line.starts_with("0010"));
        assert!(first_line.contains("48 45 4c 4c 4f"));
        assert!(first_line.ends_with("HELLO..........."));
    }

    #[test]
    pub fn print_map_coalesces_regions() {
        let mut memory = Memory::new();
        memory.map_ram(0x0000, 0x1FFF).unwrap();
        memory.map_rom(0xFF00, &[0; 256]).unwrap();

        let map = memory.print_map();

        assert!(map.contains("0000 - 1fff RAM"));
        assert!(map.contains("ff00 - ffff ROM"));
        assert!(map.contains("Total bytes mapped:   8448 bytes"));
    }

    #[test]
    pub fn watchpoints_toggle_and_list() {
        let mut memory = Memory::new();

        memory.enable_watch(0x0042);
        memory.enable_watch(0x0100);
        assert!(memory.watching(0x0042));
        assert_eq!(memory.watch_list(), vec![0x0042, 0x0100]);

        memory.clear_watch(0x0042);
        assert!(!memory.watching(0x0042));

        memory.clear_all_watches();
        assert!(memory.watch_list().is_empty());
    }

    #[test]
    pub fn devices_see_the_full_address() {
        let device = PortCounter::new();
        let mut memory = Memory::new();
        memory.map_device(device.clone(), 0xD010, 4).unwrap();

        memory.read(0xD012);
        memory.write(0xD013, 0x77);

        assert_eq!(device.borrow().reads, vec![0xD012]);
        assert_eq!(device.borrow().writes, vec![(0xD013, 0x77)]);
    }

    #[test]
    pub fn housekeeping_returns_the_highest_precedence_signal() {
        let device = PortCounter::new();
        let mut memory = Memory::new();
        memory.map_device(device.clone(), 0xD010, 4).unwrap();

        assert_eq!(memory.run_devices(), Signal::None);

        device
            .borrow_mut()
            .signals
            .extend([Signal::Debug, Signal::Exit, Signal::Reset]);
        assert_eq!(memory.run_devices(), Signal::Exit);

        // The queue drained; the next pass is quiet again.
        assert_eq!(memory.run_devices(), Signal::None);
    }
}
