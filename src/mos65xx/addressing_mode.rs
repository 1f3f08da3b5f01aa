use std::fmt;

/// `AddressingMode` is combined with [`Opcode`](super::Opcode) to decide _where_ the
/// argument of an instruction should be sourced from.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum AddressingMode {
    /// The target is implied by the instruction itself.
    ///
    /// Example: `INX`
    Implied,

    /// The instruction targets the accumulator `A`.
    ///
    /// Example: `ROL A`
    Accumulator,

    /// The argument is the byte following the opcode.
    ///
    /// Example: `LDA #$AA` which loads `0xAA` into `A`
    Immediate,

    /// The argument is an address within the first 256 bytes of memory (page 0).
    ///
    /// Example: `LDA $42`
    ZeroPage,

    /// `ZeroPage` with `X` added to the address before resolving. The sum wraps
    /// within the zero page.
    ZeroPageX,

    /// `ZeroPage` with `Y` added to the address before resolving. The sum wraps
    /// within the zero page.
    ZeroPageY,

    /// The argument is a signed 8-bit offset from the address of the *next*
    /// instruction. Used by branches.
    Relative,

    /// The argument is a little-endian 16-bit address.
    ///
    /// Example: `LDA $BEEF`
    Absolute,

    /// `Absolute` with `X` added to the address. May incur a page-crossing cycle.
    AbsoluteX,

    /// `Absolute` with `Y` added to the address. May incur a page-crossing cycle.
    AbsoluteY,

    /// The argument is a 16-bit pointer to the real 16-bit address. Only `JMP`
    /// uses this mode. On the NMOS 6502 a pointer ending in `0xFF` wraps its
    /// high-byte fetch to the start of the *same* page; the 65C02 fixes this.
    Indirect,

    /// `($zp,X)`: the zero-page argument plus `X` (wrapped) names a zero-page
    /// pointer to the effective address.
    IndirectX,

    /// `($zp),Y`: the zero-page argument names a zero-page pointer; `Y` is added
    /// to the pointed-to address. May incur a page-crossing cycle.
    IndirectY,

    /// `($zp)`: the zero-page argument names a zero-page pointer to the
    /// effective address. 65C02 only.
    ZeroPageIndirect,

    /// `($abs,X)`: the 16-bit argument plus `X` names a pointer to the effective
    /// address. 65C02 only, used by `JMP`.
    AbsoluteIndexedIndirect,
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
