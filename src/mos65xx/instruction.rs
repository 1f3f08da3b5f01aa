use super::addressing_mode::AddressingMode;
use super::opcode::Opcode;

/// Cycle-accounting hints attached to an instruction table entry.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum InstructionFlags {
    /// No special cycle handling.
    None,

    /// Conditional branch: one extra cycle when taken, two more when the
    /// branch target is on a different page.
    Branch,

    /// Indexed read: one extra cycle when the indexed address lands on a
    /// different page than the base address.
    PageBoundary,

    /// 65C02 read-modify-write `Absolute,X` quirk: the table carries the NMOS
    /// cost (7) and one cycle is refunded when no page boundary is crossed.
    NoPageBoundary,
}

/// One entry of the opcode table: mnemonic, addressing mode, encoded length,
/// base cycle cost and cycle-accounting flags.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub mode: AddressingMode,
    pub bytes: u8,
    pub cycles: u8,
    pub flags: InstructionFlags,
}

/// Dense lookup from opcode byte to instruction record. Opcodes the selected
/// processor does not document are `None` and route to the invalid-opcode
/// fault.
pub type InstructionTable = [Option<Instruction>; 256];

impl Instruction {
    pub const fn new(
        opcode: Opcode,
        mode: AddressingMode,
        bytes: u8,
        cycles: u8,
        flags: InstructionFlags,
    ) -> Instruction {
        Instruction {
            opcode,
            mode,
            bytes,
            cycles,
            flags,
        }
    }
}

const fn op(
    opcode: Opcode,
    mode: AddressingMode,
    bytes: u8,
    cycles: u8,
    flags: InstructionFlags,
) -> Option<Instruction> {
    Some(Instruction::new(opcode, mode, bytes, cycles, flags))
}

pub(super) fn mos6502_instructions() -> InstructionTable {
    MOS6502_INSTRUCTIONS
}

/// The 65C02 table is the 6502 table with the new opcodes overlaid, the
/// entries the CMOS part changed (`JMP (abs)` timing, `Absolute,X`
/// read-modify-write timing) replaced, and the Rockwell bit instructions
/// filled in from their regular opcode pattern.
pub(super) fn wdc65c02_instructions() -> InstructionTable {
    let mut instructions = MOS6502_INSTRUCTIONS;

    for (byte, instruction) in WDC65C02_OVERLAY {
        instructions[byte as usize] = Some(instruction);
    }

    // RMBn/SMBn/BBRn/BBSn encode the bit number in the opcode's high nibble.
    for n in 0..8u16 {
        let row = n * 0x10;
        instructions[(0x07 + row) as usize] = op(
            Opcode::RMB,
            AddressingMode::ZeroPage,
            2,
            5,
            InstructionFlags::None,
        );
        instructions[(0x87 + row) as usize] = op(
            Opcode::SMB,
            AddressingMode::ZeroPage,
            2,
            5,
            InstructionFlags::None,
        );
        instructions[(0x0F + row) as usize] = op(
            Opcode::BBR,
            AddressingMode::Relative,
            3,
            5,
            InstructionFlags::None,
        );
        instructions[(0x8F + row) as usize] = op(
            Opcode::BBS,
            AddressingMode::Relative,
            3,
            5,
            InstructionFlags::None,
        );
    }

    instructions
}

/// Table entries for all documented NMOS 6502 opcodes.
#[rustfmt::skip]
static MOS6502_INSTRUCTIONS: InstructionTable = [
    /*0x00*/ op(Opcode::BRK, AddressingMode::Implied, 1, 7, InstructionFlags::None),
    /*0x01*/ op(Opcode::ORA, AddressingMode::IndirectX, 2, 6, InstructionFlags::None),
    /*0x02*/ None,
    /*0x03*/ None,
    /*0x04*/ None,
    /*0x05*/ op(Opcode::ORA, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0x06*/ op(Opcode::ASL, AddressingMode::ZeroPage, 2, 5, InstructionFlags::None),
    /*0x07*/ None,
    /*0x08*/ op(Opcode::PHP, AddressingMode::Implied, 1, 3, InstructionFlags::None),
    /*0x09*/ op(Opcode::ORA, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0x0A*/ op(Opcode::ASL, AddressingMode::Accumulator, 1, 2, InstructionFlags::None),
    /*0x0B*/ None,
    /*0x0C*/ None,
    /*0x0D*/ op(Opcode::ORA, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0x0E*/ op(Opcode::ASL, AddressingMode::Absolute, 3, 6, InstructionFlags::None),
    /*0x0F*/ None,
    /*0x10*/ op(Opcode::BPL, AddressingMode::Relative, 2, 2, InstructionFlags::Branch),
    /*0x11*/ op(Opcode::ORA, AddressingMode::IndirectY, 2, 5, InstructionFlags::PageBoundary),
    /*0x12*/ None,
    /*0x13*/ None,
    /*0x14*/ None,
    /*0x15*/ op(Opcode::ORA, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0x16*/ op(Opcode::ASL, AddressingMode::ZeroPageX, 2, 6, InstructionFlags::None),
    /*0x17*/ None,
    /*0x18*/ op(Opcode::CLC, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0x19*/ op(Opcode::ORA, AddressingMode::AbsoluteY, 3, 4, InstructionFlags::PageBoundary),
    /*0x1A*/ None,
    /*0x1B*/ None,
    /*0x1C*/ None,
    /*0x1D*/ op(Opcode::ORA, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary),
    /*0x1E*/ op(Opcode::ASL, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::None),
    /*0x1F*/ None,
    /*0x20*/ op(Opcode::JSR, AddressingMode::Absolute, 3, 6, InstructionFlags::None),
    /*0x21*/ op(Opcode::AND, AddressingMode::IndirectX, 2, 6, InstructionFlags::None),
    /*0x22*/ None,
    /*0x23*/ None,
    /*0x24*/ op(Opcode::BIT, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0x25*/ op(Opcode::AND, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0x26*/ op(Opcode::ROL, AddressingMode::ZeroPage, 2, 5, InstructionFlags::None),
    /*0x27*/ None,
    /*0x28*/ op(Opcode::PLP, AddressingMode::Implied, 1, 4, InstructionFlags::None),
    /*0x29*/ op(Opcode::AND, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0x2A*/ op(Opcode::ROL, AddressingMode::Accumulator, 1, 2, InstructionFlags::None),
    /*0x2B*/ None,
    /*0x2C*/ op(Opcode::BIT, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0x2D*/ op(Opcode::AND, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0x2E*/ op(Opcode::ROL, AddressingMode::Absolute, 3, 6, InstructionFlags::None),
    /*0x2F*/ None,
    /*0x30*/ op(Opcode::BMI, AddressingMode::Relative, 2, 2, InstructionFlags::Branch),
    /*0x31*/ op(Opcode::AND, AddressingMode::IndirectY, 2, 5, InstructionFlags::PageBoundary),
    /*0x32*/ None,
    /*0x33*/ None,
    /*0x34*/ None,
    /*0x35*/ op(Opcode::AND, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0x36*/ op(Opcode::ROL, AddressingMode::ZeroPageX, 2, 6, InstructionFlags::None),
    /*0x37*/ None,
    /*0x38*/ op(Opcode::SEC, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0x39*/ op(Opcode::AND, AddressingMode::AbsoluteY, 3, 4, InstructionFlags::PageBoundary),
    /*0x3A*/ None,
    /*0x3B*/ None,
    /*0x3C*/ None,
    /*0x3D*/ op(Opcode::AND, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary),
    /*0x3E*/ op(Opcode::ROL, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::None),
    /*0x3F*/ None,
    /*0x40*/ op(Opcode::RTI, AddressingMode::Implied, 1, 6, InstructionFlags::None),
    /*0x41*/ op(Opcode::EOR, AddressingMode::IndirectX, 2, 6, InstructionFlags::None),
    /*0x42*/ None,
    /*0x43*/ None,
    /*0x44*/ None,
    /*0x45*/ op(Opcode::EOR, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0x46*/ op(Opcode::LSR, AddressingMode::ZeroPage, 2, 5, InstructionFlags::None),
    /*0x47*/ None,
    /*0x48*/ op(Opcode::PHA, AddressingMode::Implied, 1, 3, InstructionFlags::None),
    /*0x49*/ op(Opcode::EOR, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0x4A*/ op(Opcode::LSR, AddressingMode::Accumulator, 1, 2, InstructionFlags::None),
    /*0x4B*/ None,
    /*0x4C*/ op(Opcode::JMP, AddressingMode::Absolute, 3, 3, InstructionFlags::None),
    /*0x4D*/ op(Opcode::EOR, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0x4E*/ op(Opcode::LSR, AddressingMode::Absolute, 3, 6, InstructionFlags::None),
    /*0x4F*/ None,
    /*0x50*/ op(Opcode::BVC, AddressingMode::Relative, 2, 2, InstructionFlags::Branch),
    /*0x51*/ op(Opcode::EOR, AddressingMode::IndirectY, 2, 5, InstructionFlags::PageBoundary),
    /*0x52*/ None,
    /*0x53*/ None,
    /*0x54*/ None,
    /*0x55*/ op(Opcode::EOR, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0x56*/ op(Opcode::LSR, AddressingMode::ZeroPageX, 2, 6, InstructionFlags::None),
    /*0x57*/ None,
    /*0x58*/ op(Opcode::CLI, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0x59*/ op(Opcode::EOR, AddressingMode::AbsoluteY, 3, 4, InstructionFlags::PageBoundary),
    /*0x5A*/ None,
    /*0x5B*/ None,
    /*0x5C*/ None,
    /*0x5D*/ op(Opcode::EOR, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary),
    /*0x5E*/ op(Opcode::LSR, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::None),
    /*0x5F*/ None,
    /*0x60*/ op(Opcode::RTS, AddressingMode::Implied, 1, 6, InstructionFlags::None),
    /*0x61*/ op(Opcode::ADC, AddressingMode::IndirectX, 2, 6, InstructionFlags::None),
    /*0x62*/ None,
    /*0x63*/ None,
    /*0x64*/ None,
    /*0x65*/ op(Opcode::ADC, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0x66*/ op(Opcode::ROR, AddressingMode::ZeroPage, 2, 5, InstructionFlags::None),
    /*0x67*/ None,
    /*0x68*/ op(Opcode::PLA, AddressingMode::Implied, 1, 4, InstructionFlags::None),
    /*0x69*/ op(Opcode::ADC, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0x6A*/ op(Opcode::ROR, AddressingMode::Accumulator, 1, 2, InstructionFlags::None),
    /*0x6B*/ None,
    /*0x6C*/ op(Opcode::JMP, AddressingMode::Indirect, 3, 5, InstructionFlags::None),
    /*0x6D*/ op(Opcode::ADC, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0x6E*/ op(Opcode::ROR, AddressingMode::Absolute, 3, 6, InstructionFlags::None),
    /*0x6F*/ None,
    /*0x70*/ op(Opcode::BVS, AddressingMode::Relative, 2, 2, InstructionFlags::Branch),
    /*0x71*/ op(Opcode::ADC, AddressingMode::IndirectY, 2, 5, InstructionFlags::PageBoundary),
    /*0x72*/ None,
    /*0x73*/ None,
    /*0x74*/ None,
    /*0x75*/ op(Opcode::ADC, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0x76*/ op(Opcode::ROR, AddressingMode::ZeroPageX, 2, 6, InstructionFlags::None),
    /*0x77*/ None,
    /*0x78*/ op(Opcode::SEI, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0x79*/ op(Opcode::ADC, AddressingMode::AbsoluteY, 3, 4, InstructionFlags::PageBoundary),
    /*0x7A*/ None,
    /*0x7B*/ None,
    /*0x7C*/ None,
    /*0x7D*/ op(Opcode::ADC, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary),
    /*0x7E*/ op(Opcode::ROR, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::None),
    /*0x7F*/ None,
    /*0x80*/ None,
    /*0x81*/ op(Opcode::STA, AddressingMode::IndirectX, 2, 6, InstructionFlags::None),
    /*0x82*/ None,
    /*0x83*/ None,
    /*0x84*/ op(Opcode::STY, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0x85*/ op(Opcode::STA, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0x86*/ op(Opcode::STX, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0x87*/ None,
    /*0x88*/ op(Opcode::DEY, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0x89*/ None,
    /*0x8A*/ op(Opcode::TXA, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0x8B*/ None,
    /*0x8C*/ op(Opcode::STY, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0x8D*/ op(Opcode::STA, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0x8E*/ op(Opcode::STX, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0x8F*/ None,
    /*0x90*/ op(Opcode::BCC, AddressingMode::Relative, 2, 2, InstructionFlags::Branch),
    /*0x91*/ op(Opcode::STA, AddressingMode::IndirectY, 2, 6, InstructionFlags::None),
    /*0x92*/ None,
    /*0x93*/ None,
    /*0x94*/ op(Opcode::STY, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0x95*/ op(Opcode::STA, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0x96*/ op(Opcode::STX, AddressingMode::ZeroPageY, 2, 4, InstructionFlags::None),
    /*0x97*/ None,
    /*0x98*/ op(Opcode::TYA, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0x99*/ op(Opcode::STA, AddressingMode::AbsoluteY, 3, 5, InstructionFlags::None),
    /*0x9A*/ op(Opcode::TXS, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0x9B*/ None,
    /*0x9C*/ None,
    /*0x9D*/ op(Opcode::STA, AddressingMode::AbsoluteX, 3, 5, InstructionFlags::None),
    /*0x9E*/ None,
    /*0x9F*/ None,
    /*0xA0*/ op(Opcode::LDY, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0xA1*/ op(Opcode::LDA, AddressingMode::IndirectX, 2, 6, InstructionFlags::None),
    /*0xA2*/ op(Opcode::LDX, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0xA3*/ None,
    /*0xA4*/ op(Opcode::LDY, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0xA5*/ op(Opcode::LDA, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0xA6*/ op(Opcode::LDX, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0xA7*/ None,
    /*0xA8*/ op(Opcode::TAY, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xA9*/ op(Opcode::LDA, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0xAA*/ op(Opcode::TAX, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xAB*/ None,
    /*0xAC*/ op(Opcode::LDY, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0xAD*/ op(Opcode::LDA, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0xAE*/ op(Opcode::LDX, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0xAF*/ None,
    /*0xB0*/ op(Opcode::BCS, AddressingMode::Relative, 2, 2, InstructionFlags::Branch),
    /*0xB1*/ op(Opcode::LDA, AddressingMode::IndirectY, 2, 5, InstructionFlags::PageBoundary),
    /*0xB2*/ None,
    /*0xB3*/ None,
    /*0xB4*/ op(Opcode::LDY, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0xB5*/ op(Opcode::LDA, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0xB6*/ op(Opcode::LDX, AddressingMode::ZeroPageY, 2, 4, InstructionFlags::None),
    /*0xB7*/ None,
    /*0xB8*/ op(Opcode::CLV, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xB9*/ op(Opcode::LDA, AddressingMode::AbsoluteY, 3, 4, InstructionFlags::PageBoundary),
    /*0xBA*/ op(Opcode::TSX, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xBB*/ None,
    /*0xBC*/ op(Opcode::LDY, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary),
    /*0xBD*/ op(Opcode::LDA, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary),
    /*0xBE*/ op(Opcode::LDX, AddressingMode::AbsoluteY, 3, 4, InstructionFlags::PageBoundary),
    /*0xBF*/ None,
    /*0xC0*/ op(Opcode::CPY, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0xC1*/ op(Opcode::CMP, AddressingMode::IndirectX, 2, 6, InstructionFlags::None),
    /*0xC2*/ None,
    /*0xC3*/ None,
    /*0xC4*/ op(Opcode::CPY, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0xC5*/ op(Opcode::CMP, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0xC6*/ op(Opcode::DEC, AddressingMode::ZeroPage, 2, 5, InstructionFlags::None),
    /*0xC7*/ None,
    /*0xC8*/ op(Opcode::INY, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xC9*/ op(Opcode::CMP, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0xCA*/ op(Opcode::DEX, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xCB*/ None,
    /*0xCC*/ op(Opcode::CPY, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0xCD*/ op(Opcode::CMP, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0xCE*/ op(Opcode::DEC, AddressingMode::Absolute, 3, 6, InstructionFlags::None),
    /*0xCF*/ None,
    /*0xD0*/ op(Opcode::BNE, AddressingMode::Relative, 2, 2, InstructionFlags::Branch),
    /*0xD1*/ op(Opcode::CMP, AddressingMode::IndirectY, 2, 5, InstructionFlags::PageBoundary),
    /*0xD2*/ None,
    /*0xD3*/ None,
    /*0xD4*/ None,
    /*0xD5*/ op(Opcode::CMP, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0xD6*/ op(Opcode::DEC, AddressingMode::ZeroPageX, 2, 6, InstructionFlags::None),
    /*0xD7*/ None,
    /*0xD8*/ op(Opcode::CLD, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xD9*/ op(Opcode::CMP, AddressingMode::AbsoluteY, 3, 4, InstructionFlags::PageBoundary),
    /*0xDA*/ None,
    /*0xDB*/ None,
    /*0xDC*/ None,
    /*0xDD*/ op(Opcode::CMP, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary),
    /*0xDE*/ op(Opcode::DEC, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::None),
    /*0xDF*/ None,
    /*0xE0*/ op(Opcode::CPX, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0xE1*/ op(Opcode::SBC, AddressingMode::IndirectX, 2, 6, InstructionFlags::None),
    /*0xE2*/ None,
    /*0xE3*/ None,
    /*0xE4*/ op(Opcode::CPX, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0xE5*/ op(Opcode::SBC, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None),
    /*0xE6*/ op(Opcode::INC, AddressingMode::ZeroPage, 2, 5, InstructionFlags::None),
    /*0xE7*/ None,
    /*0xE8*/ op(Opcode::INX, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xE9*/ op(Opcode::SBC, AddressingMode::Immediate, 2, 2, InstructionFlags::None),
    /*0xEA*/ op(Opcode::NOP, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xEB*/ None,
    /*0xEC*/ op(Opcode::CPX, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0xED*/ op(Opcode::SBC, AddressingMode::Absolute, 3, 4, InstructionFlags::None),
    /*0xEE*/ op(Opcode::INC, AddressingMode::Absolute, 3, 6, InstructionFlags::None),
    /*0xEF*/ None,
    /*0xF0*/ op(Opcode::BEQ, AddressingMode::Relative, 2, 2, InstructionFlags::Branch),
    /*0xF1*/ op(Opcode::SBC, AddressingMode::IndirectY, 2, 5, InstructionFlags::PageBoundary),
    /*0xF2*/ None,
    /*0xF3*/ None,
    /*0xF4*/ None,
    /*0xF5*/ op(Opcode::SBC, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None),
    /*0xF6*/ op(Opcode::INC, AddressingMode::ZeroPageX, 2, 6, InstructionFlags::None),
    /*0xF7*/ None,
    /*0xF8*/ op(Opcode::SED, AddressingMode::Implied, 1, 2, InstructionFlags::None),
    /*0xF9*/ op(Opcode::SBC, AddressingMode::AbsoluteY, 3, 4, InstructionFlags::PageBoundary),
    /*0xFA*/ None,
    /*0xFB*/ None,
    /*0xFC*/ None,
    /*0xFD*/ op(Opcode::SBC, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary),
    /*0xFE*/ op(Opcode::INC, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::None),
    /*0xFF*/ None,
];

/// New and changed entries for the WDC 65C02.
#[rustfmt::skip]
static WDC65C02_OVERLAY: [(u8, Instruction); 34] = [
    (0x04, Instruction::new(Opcode::TSB, AddressingMode::ZeroPage, 2, 5, InstructionFlags::None)),
    (0x0C, Instruction::new(Opcode::TSB, AddressingMode::Absolute, 3, 6, InstructionFlags::None)),
    (0x12, Instruction::new(Opcode::ORA, AddressingMode::ZeroPageIndirect, 2, 5, InstructionFlags::None)),
    (0x14, Instruction::new(Opcode::TRB, AddressingMode::ZeroPage, 2, 5, InstructionFlags::None)),
    (0x1A, Instruction::new(Opcode::INC, AddressingMode::Accumulator, 1, 2, InstructionFlags::None)),
    (0x1C, Instruction::new(Opcode::TRB, AddressingMode::Absolute, 3, 6, InstructionFlags::None)),
    (0x1E, Instruction::new(Opcode::ASL, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::NoPageBoundary)),
    (0x32, Instruction::new(Opcode::AND, AddressingMode::ZeroPageIndirect, 2, 5, InstructionFlags::None)),
    (0x34, Instruction::new(Opcode::BIT, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None)),
    (0x3A, Instruction::new(Opcode::DEC, AddressingMode::Accumulator, 1, 2, InstructionFlags::None)),
    (0x3C, Instruction::new(Opcode::BIT, AddressingMode::AbsoluteX, 3, 4, InstructionFlags::PageBoundary)),
    (0x3E, Instruction::new(Opcode::ROL, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::NoPageBoundary)),
    (0x52, Instruction::new(Opcode::EOR, AddressingMode::ZeroPageIndirect, 2, 5, InstructionFlags::None)),
    (0x5A, Instruction::new(Opcode::PHY, AddressingMode::Implied, 1, 3, InstructionFlags::None)),
    (0x5E, Instruction::new(Opcode::LSR, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::NoPageBoundary)),
    (0x64, Instruction::new(Opcode::STZ, AddressingMode::ZeroPage, 2, 3, InstructionFlags::None)),
    (0x6C, Instruction::new(Opcode::JMP, AddressingMode::Indirect, 3, 6, InstructionFlags::None)),
    (0x72, Instruction::new(Opcode::ADC, AddressingMode::ZeroPageIndirect, 2, 5, InstructionFlags::None)),
    (0x74, Instruction::new(Opcode::STZ, AddressingMode::ZeroPageX, 2, 4, InstructionFlags::None)),
    (0x7A, Instruction::new(Opcode::PLY, AddressingMode::Implied, 1, 4, InstructionFlags::None)),
    (0x7C, Instruction::new(Opcode::JMP, AddressingMode::AbsoluteIndexedIndirect, 3, 6, InstructionFlags::None)),
    (0x7E, Instruction::new(Opcode::ROR, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::NoPageBoundary)),
    (0x80, Instruction::new(Opcode::BRA, AddressingMode::Relative, 2, 3, InstructionFlags::Branch)),
    (0x89, Instruction::new(Opcode::BIT, AddressingMode::Immediate, 2, 2, InstructionFlags::None)),
    (0x92, Instruction::new(Opcode::STA, AddressingMode::ZeroPageIndirect, 2, 5, InstructionFlags::None)),
    (0x9C, Instruction::new(Opcode::STZ, AddressingMode::Absolute, 3, 4, InstructionFlags::None)),
    (0x9E, Instruction::new(Opcode::STZ, AddressingMode::AbsoluteX, 3, 5, InstructionFlags::None)),
    (0xB2, Instruction::new(Opcode::LDA, AddressingMode::ZeroPageIndirect, 2, 5, InstructionFlags::None)),
    (0xD2, Instruction::new(Opcode::CMP, AddressingMode::ZeroPageIndirect, 2, 5, InstructionFlags::None)),
    (0xDA, Instruction::new(Opcode::PHX, AddressingMode::Implied, 1, 3, InstructionFlags::None)),
    (0xDE, Instruction::new(Opcode::DEC, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::NoPageBoundary)),
    (0xF2, Instruction::new(Opcode::SBC, AddressingMode::ZeroPageIndirect, 2, 5, InstructionFlags::None)),
    (0xFA, Instruction::new(Opcode::PLX, AddressingMode::Implied, 1, 4, InstructionFlags::None)),
    (0xFE, Instruction::new(Opcode::INC, AddressingMode::AbsoluteX, 3, 7, InstructionFlags::NoPageBoundary)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn mos6502_table_has_all_documented_opcodes() {
        let documented = MOS6502_INSTRUCTIONS.iter().flatten().count();
        assert_eq!(documented, 151);
    }

    #[test]
    pub fn wdc65c02_table_extends_the_mos6502_table() {
        let table = wdc65c02_instructions();

        // 151 documented NMOS opcodes, 27 new CMOS opcodes, 32 Rockwell bit
        // instructions. The changed entries replace existing ones.
        let documented = table.iter().flatten().count();
        assert_eq!(documented, 151 + 27 + 32);

        // Everything the 6502 documents is still present.
        for (byte, entry) in MOS6502_INSTRUCTIONS.iter().enumerate() {
            if let Some(instruction) = entry {
                let cmos = table[byte].expect("6502 opcode missing from 65C02 table");
                assert_eq!(cmos.opcode, instruction.opcode, "opcode {:#04x}", byte);
            }
        }
    }

    #[test]
    pub fn rockwell_bit_instructions_follow_the_opcode_pattern() {
        let table = wdc65c02_instructions();

        for n in 0..8usize {
            let rmb = table[0x07 + n * 0x10].unwrap();
            let smb = table[0x87 + n * 0x10].unwrap();
            let bbr = table[0x0F + n * 0x10].unwrap();
            let bbs = table[0x8F + n * 0x10].unwrap();

            assert_eq!(rmb.opcode, Opcode::RMB);
            assert_eq!(smb.opcode, Opcode::SMB);
            assert_eq!(bbr.opcode, Opcode::BBR);
            assert_eq!(bbs.opcode, Opcode::BBS);
            assert_eq!(bbr.mode, AddressingMode::Relative);
            assert_eq!(rmb.mode, AddressingMode::ZeroPage);
        }
    }

    #[test]
    pub fn jmp_indirect_costs_one_more_cycle_on_the_wdc65c02() {
        let nmos = mos6502_instructions()[0x6C].unwrap();
        let cmos = wdc65c02_instructions()[0x6C].unwrap();

        assert_eq!(nmos.cycles, 5);
        assert_eq!(cmos.cycles, 6);
    }

    #[test]
    pub fn undocumented_opcodes_stay_invalid_on_both_variants() {
        // 0x02 is a JAM/KIL encoding on NMOS parts and unallocated on the
        // 65C02 variants this crate models.
        assert!(mos6502_instructions()[0x02].is_none());
        assert!(wdc65c02_instructions()[0x02].is_none());
    }
}
