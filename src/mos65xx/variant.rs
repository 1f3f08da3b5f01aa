use super::instruction::{mos6502_instructions, wdc65c02_instructions, InstructionTable};

/// Which processor a [`Cpu`](super::Cpu) emulates.
///
/// The variant is fixed at construction: it selects the instruction table and
/// the handful of behavioral differences (JMP indirect bug, BCD timing, BRK
/// clearing `D`, RMW `Absolute,X` timing). Swapping processors means building
/// a new `Cpu`.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Variant {
    /// The original NMOS MOS 6502, documented opcodes only.
    Mos6502,

    /// The CMOS WDC 65C02 including the Rockwell R65C02 bit instructions.
    Wdc65c02,
}

impl Variant {
    pub(super) fn instructions(self) -> InstructionTable {
        match self {
            Variant::Mos6502 => mos6502_instructions(),
            Variant::Wdc65c02 => wdc65c02_instructions(),
        }
    }
}
