mod memory;
mod mos65xx;
mod pia;

pub use memory::{Device, Element, Memory, MemoryError, OverlapPolicy};
pub use mos65xx::{
    AddressingMode, Bus, Cpu, Error, Instruction, InstructionFlags, InterruptLines, Opcode,
    RamBus, Signal, Status, StatusFlag, Variant, IRQ_VECTOR_ADDRESS, NMI_VECTOR_ADDRESS,
    RESET_VECTOR_ADDRESS,
};
pub use pia::{Key, Pia6820};
