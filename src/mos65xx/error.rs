use thiserror::Error;

use super::addressing_mode::AddressingMode;

/// Fatal CPU faults. Any of these latches the CPU's exception state: the
/// registers stay inspectable but `execute` becomes a no-op until the next
/// reset.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid opcode {opcode:#04x} at pc {pc:#06x}")]
    InvalidOpcode { opcode: u8, pc: u16 },

    #[error("no effective address for addressing mode {0}")]
    InvalidAddressRead(AddressingMode),

    #[error("no operand fetch for addressing mode {0}")]
    InvalidOperandRead(AddressingMode),

    #[error("recursive loop detected at pc {0:#06x}")]
    RecursiveLoop(u16),
}
