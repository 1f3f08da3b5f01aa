mod addressing_mode;
mod bus;
mod error;
mod instruction;
mod interrupt;
mod opcode;
mod status;
mod variant;

use std::sync::Arc;

use log::debug;

use instruction::InstructionTable;
use interrupt::Interrupt;

pub use addressing_mode::AddressingMode;
pub use bus::{Bus, RamBus, Signal};
pub use error::Error;
pub use instruction::{Instruction, InstructionFlags};
pub use opcode::Opcode;
pub use interrupt::{InterruptLines, IRQ_VECTOR_ADDRESS, NMI_VECTOR_ADDRESS, RESET_VECTOR_ADDRESS};
pub use status::{Status, StatusFlag};
pub use variant::Variant;

pub type Result<A> = std::result::Result<A, Error>;

pub type Address = u16;

/// The 6502 stack occupies the fixed page `0x0100..=0x01FF`.
const STACK_PAGE: Address = 0x0100;

/// Stack pointer value loaded by the reset sequence.
const INITIAL_SP: u8 = 0xFF;

/// Cycles consumed by the reset exit sequence.
const RESET_CYCLES: u64 = 7;

/// `Cpu` emulates a MOS 6502 or WDC 65C02 microprocessor at whole-instruction
/// granularity with cycle accounting.
///
/// The CPU owns only its architectural and housekeeping state; memory is
/// reached through a [`Bus`] passed to each call, so one address space can be
/// rewired between runs without touching the processor.
#[derive(Debug)]
pub struct Cpu {
    /// `pc` is the program counter. It points at the next byte of the
    /// instruction stream.
    pub pc: u16,

    /// `sp` is the stack pointer. The 6502 uses a _descending_ stack confined
    /// to page one: the effective address of the top of stack is
    /// `0x0100 | sp`. Pushing post-decrements, pulling pre-increments, and
    /// both wrap at 8 bits so the stack can never leave the page.
    pub sp: u8,

    /// The accumulator. Nearly all arithmetic flows through here.
    pub a: u8,

    /// An 8-bit index register, mostly used for counters and memory offsets.
    pub x: u8,

    /// An 8-bit index register, mostly used for counters and memory offsets.
    pub y: u8,

    pub p: Status,

    variant: Variant,
    instructions: InstructionTable,

    /// Bus cycles consumed by the current instruction. Reset at the start of
    /// every step.
    cycles_used: u64,

    /// The cycles the current instruction is expected to cost: the table's
    /// base cost plus any page-crossing and branch-taken penalties discovered
    /// while executing.
    expected_cycles: u64,

    /// Total cycles since the last reset.
    elapsed_cycles: u64,

    in_reset: bool,
    pending_reset: bool,
    test_reset_override: Option<(u16, u8)>,

    lines: Arc<InterruptLines>,

    halt_address: Option<u16>,

    loop_detection: bool,
    loop_detected: bool,

    debug_mode: bool,

    hit_exception: bool,
    last_fault: Option<Error>,

    irq_count: u64,
    nmi_count: u64,
    brk_count: u64,
}

impl Cpu {
    /// Build a CPU for the given processor variant. The CPU starts with the
    /// reset line asserted; call [`Cpu::reset`] once the bus is wired up to
    /// release it.
    pub fn new(variant: Variant) -> Cpu {
        Cpu {
            pc: 0,
            sp: 0,
            a: 0,
            x: 0,
            y: 0,

            p: Status::default(),

            variant,
            instructions: variant.instructions(),

            cycles_used: 0,
            expected_cycles: 0,
            elapsed_cycles: 0,

            in_reset: true,
            pending_reset: false,
            test_reset_override: None,

            lines: Arc::new(InterruptLines::default()),

            halt_address: None,

            loop_detection: false,
            loop_detected: false,

            debug_mode: false,

            hit_exception: false,
            last_fault: None,

            irq_count: 0,
            nmi_count: 0,
            brk_count: 0,
        }
    }

    //////////
    // Reset handling

    /// Toggle the reset line. Asserting it freezes execution; the next call
    /// releases it and schedules the reset exit sequence, which loads `pc`
    /// from the reset vector on the following [`Cpu::execute`].
    pub fn reset(&mut self) {
        if !self.in_reset {
            self.in_reset = true;
        } else {
            self.in_reset = false;
            self.pending_reset = true;
        }
    }

    pub fn in_reset(&self) -> bool {
        self.in_reset
    }

    /// Arrange for the next `execute` to come out of reset with the given
    /// `pc` and `sp`, bypassing the reset vector. This is for tests.
    pub fn test_reset(&mut self, pc: u16, sp: u8) {
        self.in_reset = false;
        self.pending_reset = true;
        self.test_reset_override = Some((pc, sp));
    }

    fn exit_reset(&mut self, bus: &mut impl Bus) {
        if let Some((pc, sp)) = self.test_reset_override.take() {
            self.pc = pc;
            self.sp = sp;
        } else {
            self.pc = self.read_word(bus, RESET_VECTOR_ADDRESS);
            self.sp = INITIAL_SP;
        }

        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.p = Status(0);

        self.debug_mode = false;
        self.hit_exception = false;
        self.last_fault = None;
        self.loop_detected = false;

        self.in_reset = false;
        self.pending_reset = false;

        self.elapsed_cycles = 0;
        self.cycles_used = RESET_CYCLES;
        self.expected_cycles = RESET_CYCLES;
    }

    /// Write the reset vector at `0xFFFC`.
    pub fn set_reset_vector(&self, bus: &mut impl Bus, address: u16) {
        bus.write_u16(RESET_VECTOR_ADDRESS, address);
    }

    /// Write the IRQ/BRK vector at `0xFFFE`.
    pub fn set_interrupt_vector(&self, bus: &mut impl Bus, address: u16) {
        bus.write_u16(IRQ_VECTOR_ADDRESS, address);
    }

    /// Write the NMI vector at `0xFFFA`.
    pub fn set_nmi_vector(&self, bus: &mut impl Bus, address: u16) {
        bus.write_u16(NMI_VECTOR_ADDRESS, address);
    }

    //////////
    // Interrupt lines

    /// A shared handle to the IRQ/NMI request lines. Devices or other threads
    /// can raise interrupts through it while the CPU runs.
    pub fn interrupt_lines(&self) -> Arc<InterruptLines> {
        Arc::clone(&self.lines)
    }

    pub fn raise_irq(&self) {
        self.lines.raise_irq();
    }

    pub fn raise_nmi(&self) {
        self.lines.raise_nmi();
    }

    pub fn irq_pending(&self) -> bool {
        self.lines.irq_pending()
    }

    pub fn nmi_pending(&self) -> bool {
        self.lines.nmi_pending()
    }

    //////////
    // Halt address & loop detection

    /// Stop executing once `pc` reaches `address`. Functional test suites
    /// publish a success address; this surfaces it.
    pub fn set_halt_address(&mut self, address: u16) {
        self.halt_address = Some(address);
    }

    pub fn clear_halt_address(&mut self) {
        self.halt_address = None;
    }

    pub fn at_halt_address(&self) -> bool {
        self.halt_address == Some(self.pc)
    }

    /// When enabled, an instruction that leaves `pc` unchanged twice in a row
    /// (a `jmp *` style spin) faults instead of spinning forever.
    pub fn enable_loop_detection(&mut self, enabled: bool) {
        self.loop_detection = enabled;
    }

    pub fn loop_detected(&self) -> bool {
        self.loop_detected
    }

    //////////
    // Observers

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn cycles_used(&self) -> u64 {
        self.cycles_used
    }

    pub fn expected_cycles(&self) -> u64 {
        self.expected_cycles
    }

    pub fn elapsed_cycles(&self) -> u64 {
        self.elapsed_cycles
    }

    pub fn hit_exception(&self) -> bool {
        self.hit_exception
    }

    /// The fault that latched the exception state, if any.
    pub fn last_fault(&self) -> Option<Error> {
        self.last_fault
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug_mode = enabled;
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn irq_count(&self) -> u64 {
        self.irq_count
    }

    pub fn nmi_count(&self) -> u64 {
        self.nmi_count
    }

    pub fn brk_count(&self) -> u64 {
        self.brk_count
    }

    //////////
    // Execution

    /// Execute one instruction, then run the bus's device housekeeping and
    /// return the highest-precedence signal the devices raised.
    pub fn execute(&mut self, bus: &mut impl Bus) -> Result<Signal> {
        self.execute_one_instruction(bus)?;
        Ok(bus.housekeeping())
    }

    /// Execute one instruction (or the pending reset exit sequence), then
    /// service any pending NMI or IRQ.
    ///
    /// A no-op while the reset line is asserted, after a fault has latched,
    /// or once `pc` sits at the halt address.
    pub fn execute_one_instruction(&mut self, bus: &mut impl Bus) -> Result<()> {
        let result = self.step(bus);
        self.elapsed_cycles += self.cycles_used;
        result
    }

    fn step(&mut self, bus: &mut impl Bus) -> Result<()> {
        self.cycles_used = 0;
        self.expected_cycles = 0;

        if self.hit_exception || self.in_reset {
            return Ok(());
        }

        if self.pending_reset {
            self.exit_reset(bus);
            return Ok(());
        }

        if self.at_halt_address() {
            return Ok(());
        }

        let start_pc = self.pc;
        let opcode = self.fetch_byte(bus);

        let instruction = match self.instructions[opcode as usize] {
            Some(instruction) => instruction,
            None => {
                // Leave pc pointing at the offending byte for the host.
                self.pc = self.pc.wrapping_sub(1);
                let pc = self.pc;
                return self.fault(Error::InvalidOpcode { opcode, pc });
            }
        };

        self.expected_cycles = instruction.cycles as u64;
        self.execute_instruction(bus, opcode, instruction)?;

        if start_pc == self.pc {
            if self.loop_detected && self.loop_detection {
                return self.fault(Error::RecursiveLoop(self.pc));
            }
            if !self.loop_detected {
                debug!("instruction at {:#06x} did not advance pc", self.pc);
                if self.loop_detection {
                    self.debug_mode = true;
                }
            }
            self.loop_detected = true;
            return Ok(());
        }
        self.loop_detected = false;

        if !self.service_nmi(bus) {
            self.service_irq(bus);
        }

        Ok(())
    }

    fn fault<A>(&mut self, error: Error) -> Result<A> {
        self.hit_exception = true;
        self.last_fault = Some(error);
        Err(error)
    }

    //////////
    // Interrupt servicing

    /// Push `pc` and `p` and jump through the interrupt's vector. The pushed
    /// status copy always carries the `Break` and unused bits set; hardware
    /// interrupts and `BRK` are told apart by `Break` alone.
    fn interrupt(&mut self, bus: &mut impl Bus, interrupt: Interrupt) {
        self.push_word(bus, self.pc);
        self.push_status(bus);

        self.p.set(StatusFlag::InterruptDisable, true);
        self.pc = self.read_word(bus, interrupt.vector_address());
        self.cycles_used += 1;
    }

    fn service_nmi(&mut self, bus: &mut impl Bus) -> bool {
        // NMI is edge triggered: taking the line consumes the edge.
        if !self.lines.take_nmi() {
            return false;
        }

        self.nmi_count += 1;
        self.interrupt(bus, Interrupt::Nmi);
        true
    }

    fn service_irq(&mut self, bus: &mut impl Bus) -> bool {
        if !self.lines.irq_pending() {
            return false;
        }
        if Interrupt::Irq.maskable() && self.p.get(StatusFlag::InterruptDisable) {
            return false;
        }

        self.lines.clear_irq();
        self.irq_count += 1;
        self.interrupt(bus, Interrupt::Irq);
        true
    }

    //////////
    // Memory access. Every bus access costs one clock cycle.

    fn read_byte(&mut self, bus: &mut impl Bus, address: Address) -> u8 {
        let data = bus.read_u8(address);
        self.cycles_used += 1;
        data
    }

    fn write_byte(&mut self, bus: &mut impl Bus, address: Address, value: u8) {
        bus.write_u8(address, value);
        self.cycles_used += 1;
    }

    fn read_word(&mut self, bus: &mut impl Bus, address: Address) -> u16 {
        let lo = self.read_byte(bus, address);
        let hi = self.read_byte(bus, address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Read a pointer out of the zero page. The high byte wraps within the
    /// page: a pointer at `0xFF` takes its high byte from `0x00`.
    fn read_zero_page_word(&mut self, bus: &mut impl Bus, address: u8) -> u16 {
        let lo = self.read_byte(bus, address as Address);
        let hi = self.read_byte(bus, address.wrapping_add(1) as Address);
        u16::from_le_bytes([lo, hi])
    }

    fn fetch_byte(&mut self, bus: &mut impl Bus) -> u8 {
        let data = self.read_byte(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        data
    }

    fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from_le_bytes([lo, hi])
    }

    //////////
    // Stack operations

    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        self.write_byte(bus, STACK_PAGE | self.sp as Address, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.read_byte(bus, STACK_PAGE | self.sp as Address)
    }

    fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();

        // Addresses go on the stack high byte first.
        self.push(bus, hi);
        self.push(bus, lo);
    }

    fn pop_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.pop(bus);
        let hi = self.pop(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn push_status(&mut self, bus: &mut impl Bus) {
        let pushed = self
            .p
            .with(StatusFlag::Break, true)
            .with(StatusFlag::Unused, true);
        self.push(bus, pushed.0);
    }

    fn pop_status(&mut self, bus: &mut impl Bus) {
        let pulled = self.pop(bus);
        self.p = Status(pulled)
            .with(StatusFlag::Break, false)
            .with(StatusFlag::Unused, false);
    }

    //////////
    // Flags

    fn set_nz(&mut self, value: u8) {
        self.p.set(StatusFlag::Zero, value == 0);
        self.p.set(StatusFlag::Negative, is_negative(value));
    }

    //////////
    // Address decoding

    /// Resolve the effective address of the current instruction, advancing
    /// `pc` past the operand bytes and charging the mode's cycle costs.
    ///
    /// Modes without an effective address fault: `JMP` decodes its indirect
    /// forms itself, and `Immediate` operands come from [`Cpu::operand`].
    fn effective_address(&mut self, bus: &mut impl Bus, instruction: Instruction) -> Result<Address> {
        let address = match instruction.mode {
            AddressingMode::ZeroPage => self.fetch_byte(bus) as Address,

            AddressingMode::ZeroPageX => {
                let base = self.fetch_byte(bus);
                self.cycles_used += 1;
                base.wrapping_add(self.x) as Address
            }

            AddressingMode::ZeroPageY => {
                let base = self.fetch_byte(bus);
                self.cycles_used += 1;
                base.wrapping_add(self.y) as Address
            }

            AddressingMode::Relative => {
                let offset = self.fetch_byte(bus) as i8;
                self.pc.wrapping_add(offset as u16)
            }

            AddressingMode::Absolute => self.fetch_word(bus),

            AddressingMode::AbsoluteX => {
                let base = self.fetch_word(bus);
                self.index_cycle_adjust(instruction, base, self.x);
                base.wrapping_add(self.x as Address)
            }

            AddressingMode::AbsoluteY => {
                let base = self.fetch_word(bus);
                self.index_cycle_adjust(instruction, base, self.y);
                base.wrapping_add(self.y as Address)
            }

            AddressingMode::IndirectX => {
                let pointer = self.fetch_byte(bus).wrapping_add(self.x);
                self.cycles_used += 1;
                self.read_zero_page_word(bus, pointer)
            }

            AddressingMode::IndirectY => {
                let pointer = self.fetch_byte(bus);
                let base = self.read_zero_page_word(bus, pointer);
                self.index_cycle_adjust(instruction, base, self.y);
                base.wrapping_add(self.y as Address)
            }

            AddressingMode::ZeroPageIndirect => {
                let pointer = self.fetch_byte(bus);
                self.read_zero_page_word(bus, pointer)
            }

            AddressingMode::AbsoluteIndexedIndirect => {
                let pointer = self.fetch_word(bus).wrapping_add(self.x as Address);
                let address = self.read_word(bus, pointer);
                self.cycles_used += 1;
                address
            }

            mode => return self.fault(Error::InvalidAddressRead(mode)),
        };

        Ok(address)
    }

    /// Indexed-mode cycle adjustments, applied before the index is added:
    /// `PageBoundary` charges one cycle when the indexed address crosses into
    /// another page; `NoPageBoundary` refunds the 65C02 read-modify-write
    /// cycle when it doesn't.
    fn index_cycle_adjust(&mut self, instruction: Instruction, base: Address, index: u8) {
        let crossed = (base.wrapping_add(index as Address) >> 8) != (base >> 8);

        match instruction.flags {
            InstructionFlags::PageBoundary if crossed => {
                self.cycles_used += 1;
                self.expected_cycles += 1;
            }
            InstructionFlags::NoPageBoundary if !crossed => {
                self.cycles_used -= 1;
                self.expected_cycles -= 1;
            }
            _ => {}
        }
    }

    /// Fetch the current instruction's operand value: the immediate byte, or
    /// a read through the effective address.
    fn operand(&mut self, bus: &mut impl Bus, instruction: Instruction) -> Result<u8> {
        match instruction.mode {
            AddressingMode::Implied | AddressingMode::Accumulator => {
                self.fault(Error::InvalidOperandRead(instruction.mode))
            }

            AddressingMode::Immediate => Ok(self.fetch_byte(bus)),

            _ => {
                let address = self.effective_address(bus, instruction)?;
                Ok(self.read_byte(bus, address))
            }
        }
    }

    //////////
    // Instruction dispatch

    fn execute_instruction(
        &mut self,
        bus: &mut impl Bus,
        opcode: u8,
        ins: Instruction,
    ) -> Result<()> {
        match ins.opcode {
            // Register operations
            Opcode::LDA => {
                self.a = self.op_load(bus, ins)?;
            }
            Opcode::LDX => {
                self.x = self.op_load(bus, ins)?;
            }
            Opcode::LDY => {
                self.y = self.op_load(bus, ins)?;
            }
            Opcode::STA => {
                let value = self.a;
                self.op_store(bus, ins, value)?;
            }
            Opcode::STX => {
                let value = self.x;
                self.op_store(bus, ins, value)?;
            }
            Opcode::STY => {
                let value = self.y;
                self.op_store(bus, ins, value)?;
            }
            Opcode::STZ => {
                self.op_store(bus, ins, 0)?;
            }
            Opcode::TAX => {
                self.x = self.op_register(self.a);
            }
            Opcode::TAY => {
                self.y = self.op_register(self.a);
            }
            Opcode::TXA => {
                self.a = self.op_register(self.x);
            }
            Opcode::TYA => {
                self.a = self.op_register(self.y);
            }

            // Stack operations
            Opcode::TSX => {
                self.x = self.op_register(self.sp);
            }
            Opcode::TXS => {
                // The one transfer that leaves the flags alone.
                self.sp = self.x;
                self.cycles_used += 1;
            }
            Opcode::PHA => {
                let value = self.a;
                self.push(bus, value);
                self.cycles_used += 1;
            }
            Opcode::PHX => {
                let value = self.x;
                self.push(bus, value);
                self.cycles_used += 1;
            }
            Opcode::PHY => {
                let value = self.y;
                self.push(bus, value);
                self.cycles_used += 1;
            }
            Opcode::PHP => {
                self.push_status(bus);
                self.cycles_used += 1;
            }
            Opcode::PLA => {
                let value = self.pop(bus);
                self.a = value;
                self.set_nz(value);
                self.cycles_used += 2;
            }
            Opcode::PLX => {
                let value = self.pop(bus);
                self.x = value;
                self.set_nz(value);
                self.cycles_used += 2;
            }
            Opcode::PLY => {
                let value = self.pop(bus);
                self.y = value;
                self.set_nz(value);
                self.cycles_used += 2;
            }
            Opcode::PLP => {
                self.pop_status(bus);
                self.cycles_used += 2;
            }

            // Logical operations
            Opcode::AND => self.op_logical(bus, ins, |a, m| a & m)?,
            Opcode::EOR => self.op_logical(bus, ins, |a, m| a ^ m)?,
            Opcode::ORA => self.op_logical(bus, ins, |a, m| a | m)?,
            Opcode::BIT => self.op_bit(bus, ins)?,
            Opcode::TRB => self.op_test_bits(bus, ins, false)?,
            Opcode::TSB => self.op_test_bits(bus, ins, true)?,

            // Arithmetic
            Opcode::ADC => self.op_adc(bus, ins)?,
            Opcode::SBC => self.op_sbc(bus, ins)?,
            Opcode::CMP => {
                let register = self.a;
                self.op_compare(bus, ins, register)?;
            }
            Opcode::CPX => {
                let register = self.x;
                self.op_compare(bus, ins, register)?;
            }
            Opcode::CPY => {
                let register = self.y;
                self.op_compare(bus, ins, register)?;
            }

            // Increments and decrements
            Opcode::INC => self.op_modify(bus, ins, |value| value.wrapping_add(1))?,
            Opcode::DEC => self.op_modify(bus, ins, |value| value.wrapping_sub(1))?,
            Opcode::INX => {
                self.x = self.op_register(self.x.wrapping_add(1));
            }
            Opcode::INY => {
                self.y = self.op_register(self.y.wrapping_add(1));
            }
            Opcode::DEX => {
                self.x = self.op_register(self.x.wrapping_sub(1));
            }
            Opcode::DEY => {
                self.y = self.op_register(self.y.wrapping_sub(1));
            }

            // Shifts
            Opcode::ASL => self.op_shift(bus, ins, |data, _| (data << 1, data & 0x80 != 0))?,
            Opcode::LSR => self.op_shift(bus, ins, |data, _| (data >> 1, data & 0x01 != 0))?,
            Opcode::ROL => self.op_shift(bus, ins, |data, carry| {
                ((data << 1) | carry as u8, data & 0x80 != 0)
            })?,
            Opcode::ROR => self.op_shift(bus, ins, |data, carry| {
                ((data >> 1) | (carry as u8) << 7, data & 0x01 != 0)
            })?,

            // Jumps and calls
            Opcode::JMP => self.op_jmp(bus, ins)?,
            Opcode::JSR => self.op_jsr(bus)?,
            Opcode::RTS => self.op_rts(bus)?,
            Opcode::RTI => self.op_rti(bus)?,

            // Branches
            Opcode::BCS => self.op_branch(bus, ins, self.p.get(StatusFlag::Carry))?,
            Opcode::BCC => self.op_branch(bus, ins, !self.p.get(StatusFlag::Carry))?,
            Opcode::BEQ => self.op_branch(bus, ins, self.p.get(StatusFlag::Zero))?,
            Opcode::BNE => self.op_branch(bus, ins, !self.p.get(StatusFlag::Zero))?,
            Opcode::BMI => self.op_branch(bus, ins, self.p.get(StatusFlag::Negative))?,
            Opcode::BPL => self.op_branch(bus, ins, !self.p.get(StatusFlag::Negative))?,
            Opcode::BVS => self.op_branch(bus, ins, self.p.get(StatusFlag::Overflow))?,
            Opcode::BVC => self.op_branch(bus, ins, !self.p.get(StatusFlag::Overflow))?,
            Opcode::BRA => self.op_bra(bus, ins)?,
            Opcode::BBR => self.op_branch_on_bit(bus, ins, opcode, false)?,
            Opcode::BBS => self.op_branch_on_bit(bus, ins, opcode, true)?,

            // Status flag changes
            Opcode::CLC => {
                self.p.set(StatusFlag::Carry, false);
                self.cycles_used += 1;
            }
            Opcode::CLD => {
                self.p.set(StatusFlag::DecimalMode, false);
                self.cycles_used += 1;
            }
            Opcode::CLI => {
                self.p.set(StatusFlag::InterruptDisable, false);
                self.cycles_used += 1;
            }
            Opcode::CLV => {
                self.p.set(StatusFlag::Overflow, false);
                self.cycles_used += 1;
            }
            Opcode::SEC => {
                self.p.set(StatusFlag::Carry, true);
                self.cycles_used += 1;
            }
            Opcode::SED => {
                self.p.set(StatusFlag::DecimalMode, true);
                self.cycles_used += 1;
            }
            Opcode::SEI => {
                self.p.set(StatusFlag::InterruptDisable, true);
                self.cycles_used += 1;
            }

            // Memory bit operations
            Opcode::RMB => self.op_modify_bit(bus, opcode, false)?,
            Opcode::SMB => self.op_modify_bit(bus, opcode, true)?,

            // System functions
            Opcode::BRK => self.op_brk(bus),
            Opcode::NOP => {
                self.cycles_used += 1;
            }
        }

        Ok(())
    }

    //////////
    // Instruction implementations

    fn op_load(&mut self, bus: &mut impl Bus, ins: Instruction) -> Result<u8> {
        let value = self.operand(bus, ins)?;
        self.set_nz(value);
        Ok(value)
    }

    fn op_store(&mut self, bus: &mut impl Bus, ins: Instruction, value: u8) -> Result<()> {
        let address = self.effective_address(bus, ins)?;
        self.write_byte(bus, address, value);

        // Indexed stores pay their internal fixup cycle whether or not a page
        // boundary was crossed.
        match ins.mode {
            AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::IndirectY => self.cycles_used += 1,
            _ => {}
        }

        Ok(())
    }

    /// Implied register write: sets `Zero`/`Negative` and charges the
    /// single-byte instruction cycle.
    fn op_register(&mut self, value: u8) -> u8 {
        self.set_nz(value);
        self.cycles_used += 1;
        value
    }

    fn op_logical(&mut self, bus: &mut impl Bus, ins: Instruction, f: fn(u8, u8) -> u8) -> Result<()> {
        let value = self.operand(bus, ins)?;
        self.a = f(self.a, value);
        let a = self.a;
        self.set_nz(a);
        Ok(())
    }

    fn op_bit(&mut self, bus: &mut impl Bus, ins: Instruction) -> Result<()> {
        let value = self.operand(bus, ins)?;
        self.p.set(StatusFlag::Zero, self.a & value == 0);

        // The 65C02 immediate form only affects Zero.
        if ins.mode != AddressingMode::Immediate {
            self.p.set(StatusFlag::Negative, value & (1 << 7) != 0);
            self.p.set(StatusFlag::Overflow, value & (1 << 6) != 0);
        }

        Ok(())
    }

    /// TRB/TSB: `Zero` from `A & M`, then clear or set A's bits in memory.
    fn op_test_bits(&mut self, bus: &mut impl Bus, ins: Instruction, set: bool) -> Result<()> {
        let address = self.effective_address(bus, ins)?;
        let data = self.read_byte(bus, address);

        let result = if set { data | self.a } else { data & !self.a };
        self.write_byte(bus, address, result);
        self.p.set(StatusFlag::Zero, data & self.a == 0);
        self.cycles_used += 1;

        Ok(())
    }

    fn op_adc(&mut self, bus: &mut impl Bus, ins: Instruction) -> Result<()> {
        let operand = self.operand(bus, ins)?;

        if self.p.get(StatusFlag::DecimalMode) {
            self.bcd_adc(operand);
            self.decimal_cycle_penalty();
        } else {
            self.binary_adc(operand);
        }

        Ok(())
    }

    fn op_sbc(&mut self, bus: &mut impl Bus, ins: Instruction) -> Result<()> {
        let operand = self.operand(bus, ins)?;

        if self.p.get(StatusFlag::DecimalMode) {
            self.bcd_sbc(operand);
            self.decimal_cycle_penalty();
        } else {
            // Binary subtraction is addition of the one's complement.
            self.binary_adc(!operand);
        }

        Ok(())
    }

    /// Decimal-mode `ADC`/`SBC` take one cycle longer on the 65C02.
    fn decimal_cycle_penalty(&mut self) {
        if self.variant == Variant::Wdc65c02 {
            self.cycles_used += 1;
            self.expected_cycles += 1;
        }
    }

    /// `A = A + operand + C`, binary mode.
    fn binary_adc(&mut self, operand: u8) {
        let same_sign = is_negative(self.a) == is_negative(operand);
        let carry = self.p.get(StatusFlag::Carry) as u16;

        let result = self.a as u16 + operand as u16 + carry;
        self.a = result as u8;

        let a = self.a;
        self.set_nz(a);
        self.p.set(StatusFlag::Carry, result > 0xFF);
        self.p
            .set(StatusFlag::Overflow, same_sign && is_negative(a) != is_negative(operand));
    }

    /// Packed BCD addition: each nibble is a decimal digit, corrected by
    /// +0x06/+0x60 when it overflows past 9.
    fn bcd_adc(&mut self, operand: u8) {
        let carry = self.p.get(StatusFlag::Carry) as u16;

        let mut low = (self.a as u16 & 0x0F) + (operand as u16 & 0x0F) + carry;
        if low >= 0x0A {
            low = ((low + 0x06) & 0x0F) + 0x10;
        }

        let mut answer = (self.a as u16 & 0xF0) + (operand as u16 & 0xF0) + low;
        if answer >= 0xA0 {
            answer += 0x60;
        }

        self.a = answer as u8;
        let a = self.a;
        self.set_nz(a);
        self.p.set(StatusFlag::Carry, answer >= 0x100);
        self.p.set(StatusFlag::Overflow, answer > 0x7F);
    }

    /// Packed BCD subtraction, with -0x06/-0x60 borrow correction. Only
    /// `Zero` and `Carry` are defined; `Negative`/`Overflow` are left alone
    /// as on the NMOS part.
    fn bcd_sbc(&mut self, subtrahend: u8) {
        let borrow = !self.p.get(StatusFlag::Carry) as i16;

        let mut low = (self.a as i16 & 0x0F) - (subtrahend as i16 & 0x0F) - borrow;
        if low < 0 {
            low = ((low - 0x06) & 0x0F) - 0x10;
        }

        let mut result = (self.a as i16 & 0xF0) - (subtrahend as i16 & 0xF0) + low;
        if result < 0 {
            result -= 0x60;
        }

        self.a = result as u8;
        self.p.set(StatusFlag::Zero, self.a == 0);
        self.p.set(StatusFlag::Carry, result >= 0);
    }

    fn op_compare(&mut self, bus: &mut impl Bus, ins: Instruction, register: u8) -> Result<()> {
        let value = self.operand(bus, ins)?;

        self.p.set(StatusFlag::Carry, register >= value);
        self.p.set(StatusFlag::Zero, register == value);
        self.p
            .set(StatusFlag::Negative, is_negative(register.wrapping_sub(value)));

        Ok(())
    }

    /// Read-modify-write on memory, or on the accumulator for the 65C02
    /// `INC A`/`DEC A` forms.
    fn op_modify(&mut self, bus: &mut impl Bus, ins: Instruction, f: fn(u8) -> u8) -> Result<()> {
        if ins.mode == AddressingMode::Accumulator {
            self.a = f(self.a);
            let a = self.a;
            self.set_nz(a);
            self.cycles_used += 1;
            return Ok(());
        }

        let address = self.effective_address(bus, ins)?;
        let data = f(self.read_byte(bus, address));
        self.write_byte(bus, address, data);
        self.set_nz(data);

        self.cycles_used += 1;
        if ins.mode == AddressingMode::AbsoluteX {
            self.cycles_used += 1;
        }

        Ok(())
    }

    fn op_shift(
        &mut self,
        bus: &mut impl Bus,
        ins: Instruction,
        f: fn(u8, bool) -> (u8, bool),
    ) -> Result<()> {
        let accumulator = ins.mode == AddressingMode::Accumulator;

        let mut address = 0;
        let data = if accumulator {
            self.a
        } else {
            address = self.effective_address(bus, ins)?;
            self.read_byte(bus, address)
        };

        let (result, carry) = f(data, self.p.get(StatusFlag::Carry));
        self.p.set(StatusFlag::Carry, carry);
        self.set_nz(result);

        if accumulator {
            self.a = result;
        } else {
            self.write_byte(bus, address, result);
        }

        self.cycles_used += 1;
        if ins.mode == AddressingMode::AbsoluteX {
            self.cycles_used += 1;
        }

        Ok(())
    }

    fn op_branch(&mut self, bus: &mut impl Bus, ins: Instruction, condition: bool) -> Result<()> {
        let address = self.effective_address(bus, ins)?;

        if condition {
            self.cycles_used += 1;
            self.expected_cycles += 1;

            if (self.pc >> 8) != (address >> 8) {
                self.cycles_used += 2;
                self.expected_cycles += 2;
            }

            self.pc = address;
        }

        Ok(())
    }

    /// Unconditional branch (65C02). Always taken, so the taken cycle is in
    /// the base cost; crossing a page adds one.
    fn op_bra(&mut self, bus: &mut impl Bus, ins: Instruction) -> Result<()> {
        let address = self.effective_address(bus, ins)?;

        if (self.pc >> 8) != (address >> 8) {
            self.cycles_used += 1;
            self.expected_cycles += 1;
        }

        self.pc = address;
        self.cycles_used += 1;

        Ok(())
    }

    /// BBR/BBS: test a bit of a zero-page byte and branch on its state. The
    /// bit number lives in the opcode's high nibble.
    fn op_branch_on_bit(
        &mut self,
        bus: &mut impl Bus,
        ins: Instruction,
        opcode: u8,
        branch_if_set: bool,
    ) -> Result<()> {
        let zp_address = self.fetch_byte(bus) as Address;
        let target = self.effective_address(bus, ins)?;
        let data = self.read_byte(bus, zp_address);

        let bit = if branch_if_set {
            (opcode >> 4) - 8
        } else {
            opcode >> 4
        };

        if (data & (1 << bit) != 0) == branch_if_set {
            self.pc = target;
        }
        self.cycles_used += 1;

        Ok(())
    }

    /// RMB/SMB: clear or set one bit of a zero-page byte. The bit number
    /// lives in the opcode's high nibble.
    fn op_modify_bit(&mut self, bus: &mut impl Bus, opcode: u8, set: bool) -> Result<()> {
        let zp_address = self.fetch_byte(bus) as Address;

        let bit = if set { (opcode >> 4) - 8 } else { opcode >> 4 };
        let mask = 1u8 << bit;

        let data = self.read_byte(bus, zp_address);
        let data = if set { data | mask } else { data & !mask };
        self.write_byte(bus, zp_address, data);
        self.cycles_used += 1;

        Ok(())
    }

    fn op_jmp(&mut self, bus: &mut impl Bus, ins: Instruction) -> Result<()> {
        let mut address = self.read_word(bus, self.pc);

        match ins.mode {
            AddressingMode::Indirect => {
                if self.variant == Variant::Mos6502 && address & 0x00FF == 0x00FF {
                    // NMOS bug: the high byte of the pointer is fetched from
                    // the start of the same page instead of the next one.
                    let lo = self.read_byte(bus, address);
                    let hi = self.read_byte(bus, address & 0xFF00);
                    address = u16::from_le_bytes([lo, hi]);
                } else {
                    address = self.read_word(bus, address);
                    if self.variant == Variant::Wdc65c02 {
                        self.cycles_used += 1;
                    }
                }
            }

            AddressingMode::AbsoluteIndexedIndirect => {
                let pointer = address.wrapping_add(self.x as Address);
                address = self.read_word(bus, pointer);
                self.cycles_used += 1;
            }

            _ => {}
        }

        self.pc = address;
        Ok(())
    }

    fn op_jsr(&mut self, bus: &mut impl Bus) -> Result<()> {
        let address = self.read_word(bus, self.pc);

        // The return address on the stack points at the last byte of the JSR
        // instruction; RTS compensates.
        let return_address = self.pc.wrapping_add(1);
        self.push_word(bus, return_address);
        self.cycles_used += 1;

        self.pc = address;
        Ok(())
    }

    fn op_rts(&mut self, bus: &mut impl Bus) -> Result<()> {
        self.pc = self.pop_word(bus).wrapping_add(1);
        self.cycles_used += 3;
        Ok(())
    }

    fn op_rti(&mut self, bus: &mut impl Bus) -> Result<()> {
        self.pop_status(bus);
        self.pc = self.pop_word(bus);
        self.cycles_used += 2;
        Ok(())
    }

    fn op_brk(&mut self, bus: &mut impl Bus) {
        // The saved pc skips the byte after BRK, leaving room for a one-byte
        // argument.
        self.pc = self.pc.wrapping_add(1);
        self.brk_count += 1;

        self.interrupt(bus, Interrupt::Brk);
        self.p.set(StatusFlag::Break, true);

        // The 65C02 additionally leaves decimal mode.
        if self.variant == Variant::Wdc65c02 {
            self.p.set(StatusFlag::DecimalMode, false);
        }
    }
}

fn is_negative(value: u8) -> bool {
    value & 0x80 != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: u16 = 0x0400;

    /// Build a CPU already out of reset with `program` placed at [`ORIGIN`].
    fn cpu_with_program(variant: Variant, program: Vec<u8>) -> (Cpu, RamBus) {
        let mut bus = RamBus::new().with_memory_at(ORIGIN as usize, program);
        let mut cpu = Cpu::new(variant);
        cpu.test_reset(ORIGIN, 0xFF);
        cpu.execute_one_instruction(&mut bus).expect("reset exit failed");
        (cpu, bus)
    }

    /// Execute one instruction and check the cycle accounting agrees with
    /// itself. Not usable for steps that service an interrupt.
    fn step(cpu: &mut Cpu, bus: &mut RamBus) {
        cpu.execute_one_instruction(bus).expect("execution failed");
        assert_eq!(
            cpu.cycles_used(),
            cpu.expected_cycles(),
            "cycle accounting mismatch at pc {:#06x}",
            cpu.pc
        );
    }

    #[test]
    pub fn test_reset_loads_clean_state() {
        let (cpu, _bus) = cpu_with_program(Variant::Mos6502, vec![]);

        assert_eq!(cpu.pc, ORIGIN);
        assert_eq!(cpu.sp, 0xFF);
        assert_eq!((cpu.a, cpu.x, cpu.y), (0, 0, 0));
        assert_eq!(cpu.p, Status(0));
        assert_eq!(cpu.cycles_used(), 7);
        assert_eq!(cpu.elapsed_cycles(), 7);
    }

    #[test]
    pub fn reset_line_gates_execution() {
        let mut bus = RamBus::new()
            .with_reset_vector(0x8000)
            .with_memory_at(0x8000, vec![0xEA]); // NOP
        let mut cpu = Cpu::new(Variant::Mos6502);

        // Construction leaves the reset line asserted; nothing runs.
        assert!(cpu.in_reset());
        cpu.execute_one_instruction(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.cycles_used(), 0);

        // Releasing the line runs the exit sequence through the vector.
        cpu.reset();
        cpu.execute_one_instruction(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x8000);
        assert_eq!(cpu.sp, 0xFF);
        assert_eq!(cpu.cycles_used(), 7);

        // Asserting it again freezes the CPU mid-run.
        cpu.reset();
        assert!(cpu.in_reset());
        cpu.execute_one_instruction(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x8000);
    }

    #[test]
    pub fn lda_immediate_sets_flags_and_cycles() {
        let mut bus = RamBus::new().with_memory_at(0xFFFC, vec![0xA9, 0x0F]); // LDA #$0F
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(0xFFFC, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();

        step(&mut cpu, &mut bus);

        assert_eq!(cpu.a, 0x0F);
        assert!(!cpu.p.get(StatusFlag::Zero));
        assert!(!cpu.p.get(StatusFlag::Negative));
        assert_eq!(cpu.pc, 0xFFFE);
        assert_eq!(cpu.cycles_used(), 2);
    }

    #[test]
    pub fn pha_places_byte_at_top_of_stack_page() {
        let mut bus = RamBus::new().with_memory_at(0xFFFC, vec![0x48]); // PHA
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(0xFFFC, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();
        cpu.a = 0x42;

        step(&mut cpu, &mut bus);

        assert_eq!(cpu.sp, 0xFE);
        assert_eq!(bus.memory[0x01FF], 0x42);
        assert_eq!(cpu.cycles_used(), 3);
    }

    #[test]
    pub fn jmp_indirect_wraps_within_page_on_the_mos6502() {
        let mut bus = RamBus::new()
            .with_memory_at(0xFFFC, vec![0x6C, 0xFF, 0x10]) // JMP ($10FF)
            .with_memory_at(0x10FF, vec![0x34])
            .with_memory_at(0x1000, vec![0x12])
            .with_memory_at(0x1100, vec![0x56]);
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(0xFFFC, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();

        step(&mut cpu, &mut bus);

        // The high byte comes from 0x1000, not 0x1100.
        assert_eq!(cpu.pc, 0x1234);
        assert_eq!(cpu.cycles_used(), 5);
    }

    #[test]
    pub fn jmp_indirect_is_fixed_on_the_wdc65c02() {
        let mut bus = RamBus::new()
            .with_memory_at(0xFFFC, vec![0x6C, 0xFF, 0x10])
            .with_memory_at(0x10FF, vec![0x34])
            .with_memory_at(0x1000, vec![0x12])
            .with_memory_at(0x1100, vec![0x56]);
        let mut cpu = Cpu::new(Variant::Wdc65c02);
        cpu.test_reset(0xFFFC, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();

        step(&mut cpu, &mut bus);

        assert_eq!(cpu.pc, 0x5634);
        assert_eq!(cpu.cycles_used(), 6);
    }

    #[test]
    pub fn zero_page_x_wraps_within_the_zero_page() {
        let program = vec![
            0xA2, 0x02, // LDX #$02
            0xB5, 0xFF, // LDA $FF,X -> wraps to $01
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        bus.memory[0x0001] = 0x77;

        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);

        assert_eq!(cpu.a, 0x77);
        assert_eq!(cpu.cycles_used(), 4);
    }

    #[test]
    pub fn branch_with_maximum_negative_offset() {
        let mut bus = RamBus::new().with_memory_at(0x2000, vec![0xF0, 0x80]); // BEQ -128
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(0x2000, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();
        cpu.p.set(StatusFlag::Zero, true);

        step(&mut cpu, &mut bus);

        assert_eq!(cpu.pc, 0x1F82);
    }

    #[test]
    pub fn page_crossing_costs_exactly_one_extra_cycle() {
        // LDA $10F0,Y with Y = 0x20 crosses into page 0x11.
        let program = vec![
            0xA0, 0x20, // LDY #$20
            0xB9, 0xF0, 0x10, // LDA $10F0,Y
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.cycles_used(), 5);
        assert_eq!(cpu.expected_cycles(), 5);

        // Same instruction without the crossing.
        let program = vec![
            0xA0, 0x01, // LDY #$01
            0xB9, 0xF0, 0x10, // LDA $10F0,Y
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.cycles_used(), 4);
    }

    #[test]
    pub fn push_pull_roundtrip_restores_the_stack_pointer() {
        let program = vec![
            0xA9, 0xE0, // LDA #$E0
            0x48, // PHA
            0xA9, 0x00, // LDA #$00
            0x68, // PLA
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);

        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.sp, 0xFE);
        assert_eq!(bus.memory[0x01FF], 0xE0);

        step(&mut cpu, &mut bus);
        assert!(cpu.p.get(StatusFlag::Zero));

        step(&mut cpu, &mut bus);
        assert_eq!(cpu.sp, 0xFF);
        assert_eq!(cpu.a, 0xE0);
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    /// `JSR` pushes the return address minus one, high byte first; `RTS`
    /// compensates. This pins down the exact bytes on the stack.
    #[test]
    pub fn jsr_and_rts_agree_on_the_return_address() {
        let main_program = vec![
            0x20, 0x00, 0x02, // 0xF000: JSR $0200
            0xA2, 0xBE, // 0xF003: LDX #$BE
        ];
        let sub_program = vec![
            0xA9, 0xFF, // 0x0200: LDA #$FF
            0x60, // 0x0202: RTS
        ];
        let mut bus = RamBus::new()
            .with_memory_at(0xF000, main_program)
            .with_memory_at(0x0200, sub_program);
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(0xF000, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();

        step(&mut cpu, &mut bus);
        assert_eq!(cpu.pc, 0x0200);
        assert_eq!(bus.memory[0x01FF], 0xF0);
        assert_eq!(bus.memory[0x01FE], 0x02);
        assert_eq!(cpu.cycles_used(), 6);

        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.pc, 0xF003);
        assert_eq!(cpu.sp, 0xFF);

        step(&mut cpu, &mut bus);
        assert_eq!(cpu.x, 0xBE);
    }

    #[test]
    pub fn adc_then_sbc_of_the_same_value_is_identity() {
        for a in [0x00u8, 0x01, 0x40, 0x7F, 0x80, 0xC3, 0xFF] {
            for n in [0x00u8, 0x01, 0x3F, 0x80, 0xFE, 0xFF] {
                let program = vec![
                    0x18, // CLC
                    0xA9, a,   // LDA #a
                    0x69, n,   // ADC #n
                    0xE9, n,   // SBC #n (carry preserved from the ADC)
                ];
                let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
                for _ in 0..4 {
                    step(&mut cpu, &mut bus);
                }

                assert_eq!(cpu.a, a, "a = {:#04x}, n = {:#04x}", a, n);
            }
        }
    }

    #[test]
    pub fn adc_sets_carry_and_signed_overflow() {
        // 0x7F + 0x01 = 0x80: signed overflow, no carry.
        let program = vec![0x18, 0xA9, 0x7F, 0x69, 0x01];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        for _ in 0..3 {
            step(&mut cpu, &mut bus);
        }
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.p.get(StatusFlag::Overflow));
        assert!(!cpu.p.get(StatusFlag::Carry));
        assert!(cpu.p.get(StatusFlag::Negative));

        // 0xFF + 0x01 = 0x00: carry out, no signed overflow.
        let program = vec![0x18, 0xA9, 0xFF, 0x69, 0x01];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        for _ in 0..3 {
            step(&mut cpu, &mut bus);
        }
        assert_eq!(cpu.a, 0x00);
        assert!(!cpu.p.get(StatusFlag::Overflow));
        assert!(cpu.p.get(StatusFlag::Carry));
        assert!(cpu.p.get(StatusFlag::Zero));
    }

    #[test]
    pub fn asl_then_lsr_restores_values_without_bit_seven() {
        for value in [0x00u8, 0x01, 0x2A, 0x7F, 0x80, 0xFF] {
            let program = vec![
                0xA9, value, // LDA #value
                0x0A, // ASL A
                0x4A, // LSR A
            ];
            let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
            for _ in 0..3 {
                step(&mut cpu, &mut bus);
            }

            if value & 0x80 == 0 {
                assert_eq!(cpu.a, value);
            } else {
                assert_eq!(cpu.a, value & 0x7F);
            }
        }
    }

    #[test]
    pub fn rol_and_ror_rotate_through_carry() {
        let program = vec![
            0x38, // SEC
            0xA9, 0x80, // LDA #$80
            0x2A, // ROL A -> 0x01, carry out from bit 7
            0x6A, // ROR A -> 0x80, carry back in
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);

        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a, 0x01);
        assert!(cpu.p.get(StatusFlag::Carry));

        step(&mut cpu, &mut bus);
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.p.get(StatusFlag::Carry));
        assert!(cpu.p.get(StatusFlag::Negative));
    }

    #[test]
    pub fn bcd_sbc_subtracts_packed_decimal() {
        let program = vec![
            0xF8, // SED
            0x38, // SEC
            0xA9, 0x51, // LDA #$51
            0xE9, 0x21, // SBC #$21
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        for _ in 0..4 {
            step(&mut cpu, &mut bus);
        }

        assert_eq!(cpu.a, 0x30);
        assert!(cpu.p.get(StatusFlag::Carry));
        assert!(!cpu.p.get(StatusFlag::Zero));
        assert!(!cpu.p.get(StatusFlag::Negative));
        assert!(!cpu.p.get(StatusFlag::Overflow));
    }

    #[test]
    pub fn bcd_adc_wraps_at_one_hundred() {
        let program = vec![
            0xF8, // SED
            0x18, // CLC
            0xA9, 0x01, // LDA #$01
            0x69, 0x99, // ADC #$99
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        for _ in 0..4 {
            step(&mut cpu, &mut bus);
        }

        assert_eq!(cpu.a, 0x00);
        assert!(cpu.p.get(StatusFlag::Carry));
        assert!(cpu.p.get(StatusFlag::Zero));
    }

    #[test]
    pub fn bit_copies_memory_bits_into_n_and_v() {
        let program = vec![
            0xA9, 0x01, // LDA #$01
            0x24, 0x10, // BIT $10
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        bus.memory[0x0010] = 0xC0;

        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);

        assert!(cpu.p.get(StatusFlag::Zero)); // A & M == 0
        assert!(cpu.p.get(StatusFlag::Negative));
        assert!(cpu.p.get(StatusFlag::Overflow));
    }

    #[test]
    pub fn txs_is_the_only_transfer_that_skips_the_flags() {
        let program = vec![
            0xA2, 0x00, // LDX #$00 -> sets Zero
            0x9A, // TXS -> flags untouched
            0xBA, // TSX -> flags from sp
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);

        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.sp, 0x00);
        assert!(cpu.p.get(StatusFlag::Zero));

        step(&mut cpu, &mut bus);
        assert_eq!(cpu.x, 0x00);
        assert!(cpu.p.get(StatusFlag::Zero));
    }

    #[test]
    pub fn php_pushes_break_and_unused_but_plp_drops_them() {
        let program = vec![
            0x38, // SEC
            0x08, // PHP
            0x18, // CLC
            0x28, // PLP
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);

        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);

        // The pushed copy carries Break | Unused | Carry.
        assert_eq!(bus.memory[0x01FF], 0b0011_0001);

        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);

        // The live register gets Carry back but never Break/Unused.
        assert!(cpu.p.get(StatusFlag::Carry));
        assert!(!cpu.p.get(StatusFlag::Break));
        assert!(!cpu.p.get(StatusFlag::Unused));
    }

    #[test]
    pub fn irq_vectors_through_fffe_and_pushes_state() {
        let mut bus = RamBus::new()
            .with_memory_at(ORIGIN as usize, vec![0xEA]) // NOP
            .with_irq_vector(0x3000);
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(ORIGIN, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();

        cpu.raise_irq();
        cpu.execute_one_instruction(&mut bus).unwrap();

        assert_eq!(cpu.pc, 0x3000);
        assert_eq!(cpu.sp, 0xFC);
        assert!(cpu.p.get(StatusFlag::InterruptDisable));
        assert!(!cpu.irq_pending());
        assert_eq!(cpu.irq_count(), 1);

        // Return address (after the NOP), high byte first, then the status
        // copy with Break | Unused forced.
        assert_eq!(bus.memory[0x01FF], 0x04);
        assert_eq!(bus.memory[0x01FE], 0x01);
        assert_eq!(bus.memory[0x01FD], 0b0011_0000);
    }

    #[test]
    pub fn irq_is_masked_by_the_interrupt_disable_flag() {
        let program = vec![
            0x78, // SEI
            0xEA, // NOP
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);

        cpu.raise_irq();
        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);

        assert_eq!(cpu.pc, ORIGIN + 2);
        assert!(cpu.irq_pending(), "a masked IRQ stays pending");
        assert_eq!(cpu.irq_count(), 0);
    }

    #[test]
    pub fn nmi_services_regardless_of_the_interrupt_mask() {
        let mut bus = RamBus::new()
            .with_memory_at(ORIGIN as usize, vec![0x78]) // SEI
            .with_nmi_vector(0x4000);
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(ORIGIN, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();

        cpu.raise_nmi();
        cpu.execute_one_instruction(&mut bus).unwrap();

        assert_eq!(cpu.pc, 0x4000);
        assert_eq!(cpu.nmi_count(), 1);
        assert!(!cpu.nmi_pending(), "the NMI edge was consumed");
    }

    #[test]
    pub fn nmi_preempts_irq_and_the_irq_survives() {
        let mut bus = RamBus::new()
            .with_memory_at(ORIGIN as usize, vec![0xEA]) // NOP
            .with_memory_at(0x4000, vec![0x40]) // RTI
            .with_irq_vector(0x3000)
            .with_nmi_vector(0x4000);
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(ORIGIN, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();

        cpu.raise_irq();
        cpu.raise_nmi();
        cpu.execute_one_instruction(&mut bus).unwrap();

        // The NMI won; three bytes are on the stack and the IRQ still pends.
        assert_eq!(cpu.pc, 0x4000);
        assert_eq!(cpu.sp, 0xFC);
        assert!(cpu.p.get(StatusFlag::InterruptDisable));
        assert!(cpu.irq_pending());

        // RTI restores the pre-interrupt status (I clear), so the surviving
        // IRQ services at the next boundary.
        cpu.execute_one_instruction(&mut bus).unwrap();
        assert_eq!(cpu.pc, 0x3000);
        assert!(!cpu.irq_pending());
        assert_eq!(cpu.irq_count(), 1);
        assert_eq!(cpu.nmi_count(), 1);
    }

    #[test]
    pub fn brk_pushes_past_its_argument_byte() {
        let mut bus = RamBus::new()
            .with_memory_at(ORIGIN as usize, vec![0x00, 0xFF]) // BRK + padding
            .with_irq_vector(0x3000);
        let mut cpu = Cpu::new(Variant::Mos6502);
        cpu.test_reset(ORIGIN, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();

        step(&mut cpu, &mut bus);

        assert_eq!(cpu.pc, 0x3000);
        assert_eq!(cpu.cycles_used(), 7);
        assert_eq!(cpu.brk_count(), 1);
        assert!(cpu.p.get(StatusFlag::Break));
        assert!(cpu.p.get(StatusFlag::InterruptDisable));

        // Saved pc skips the argument byte; pushed status carries Break.
        assert_eq!(bus.memory[0x01FF], 0x04);
        assert_eq!(bus.memory[0x01FE], 0x02);
        assert_eq!(bus.memory[0x01FD], 0b0011_0000);
    }

    #[test]
    pub fn invalid_opcode_latches_the_exception_state() {
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, vec![0x02]);

        let result = cpu.execute_one_instruction(&mut bus);
        assert_eq!(
            result,
            Err(Error::InvalidOpcode {
                opcode: 0x02,
                pc: ORIGIN
            })
        );
        assert!(cpu.hit_exception());
        assert_eq!(cpu.pc, ORIGIN, "pc points back at the offending byte");

        // Execution is a no-op until reset, but the CPU stays inspectable.
        cpu.execute_one_instruction(&mut bus).unwrap();
        assert_eq!(cpu.pc, ORIGIN);
        assert_eq!(cpu.cycles_used(), 0);

        cpu.test_reset(ORIGIN, 0xFF);
        cpu.execute_one_instruction(&mut bus).unwrap();
        assert!(!cpu.hit_exception());
    }

    #[test]
    pub fn loop_detection_faults_on_the_second_spin() {
        // JMP $0400 at $0400: the classic `jmp *` failure idiom.
        let (mut cpu, mut bus) =
            cpu_with_program(Variant::Mos6502, vec![0x4C, 0x00, 0x04]);
        cpu.enable_loop_detection(true);

        cpu.execute_one_instruction(&mut bus).unwrap();
        assert!(cpu.loop_detected());
        assert!(!cpu.hit_exception());

        let result = cpu.execute_one_instruction(&mut bus);
        assert_eq!(result, Err(Error::RecursiveLoop(ORIGIN)));
        assert!(cpu.hit_exception());
    }

    #[test]
    pub fn loop_detection_off_still_latches_the_flag() {
        let (mut cpu, mut bus) =
            cpu_with_program(Variant::Mos6502, vec![0x4C, 0x00, 0x04]);

        cpu.execute_one_instruction(&mut bus).unwrap();
        cpu.execute_one_instruction(&mut bus).unwrap();

        assert!(cpu.loop_detected());
        assert!(!cpu.hit_exception());
    }

    #[test]
    pub fn halt_address_freezes_the_cpu() {
        let program = vec![
            0xA9, 0x01, // LDA #$01
            0xEA, // NOP (never reached)
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);
        cpu.set_halt_address(ORIGIN + 2);

        step(&mut cpu, &mut bus);
        assert!(cpu.at_halt_address());

        cpu.execute_one_instruction(&mut bus).unwrap();
        assert_eq!(cpu.pc, ORIGIN + 2);
        assert_eq!(cpu.cycles_used(), 0);

        cpu.clear_halt_address();
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.pc, ORIGIN + 3);
    }

    #[test]
    pub fn elapsed_cycles_accumulate_across_instructions() {
        let program = vec![
            0xA9, 0x01, // LDA #$01 (2 cycles)
            0xEA, // NOP (2 cycles)
        ];
        let (mut cpu, mut bus) = cpu_with_program(Variant::Mos6502, program);

        step(&mut cpu, &mut bus);
        step(&mut cpu, &mut bus);

        // 7 for the reset exit plus the two instructions.
        assert_eq!(cpu.elapsed_cycles(), 11);
    }

    /// Every non-control-flow opcode advances `pc` by its encoded length and
    /// spends exactly the cycles it promised.
    #[test]
    pub fn pc_and_cycle_accounting_hold_across_the_whole_table() {
        for variant in [Variant::Mos6502, Variant::Wdc65c02] {
            let table = variant.instructions();

            for byte in 0..=0xFFu8 {
                let Some(ins) = table[byte as usize] else {
                    continue;
                };
                if matches!(
                    ins.opcode,
                    Opcode::JMP
                        | Opcode::JSR
                        | Opcode::RTS
                        | Opcode::RTI
                        | Opcode::BRK
                        | Opcode::BCC
                        | Opcode::BCS
                        | Opcode::BEQ
                        | Opcode::BNE
                        | Opcode::BMI
                        | Opcode::BPL
                        | Opcode::BVC
                        | Opcode::BVS
                        | Opcode::BRA
                        | Opcode::BBR
                        | Opcode::BBS
                ) {
                    continue;
                }

                let mut bus = RamBus::new();
                bus.memory[ORIGIN as usize] = byte;
                let mut cpu = Cpu::new(variant);
                cpu.test_reset(ORIGIN, 0xFF);
                cpu.execute_one_instruction(&mut bus).unwrap();

                cpu.execute_one_instruction(&mut bus)
                    .unwrap_or_else(|e| panic!("opcode {:#04x} faulted: {}", byte, e));

                assert_eq!(
                    cpu.pc,
                    ORIGIN + ins.bytes as u16,
                    "pc delta for opcode {:#04x} ({:?} {})",
                    byte,
                    ins.opcode,
                    ins.mode
                );
                assert_eq!(
                    cpu.cycles_used(),
                    cpu.expected_cycles(),
                    "cycles for opcode {:#04x} ({:?} {})",
                    byte,
                    ins.opcode,
                    ins.mode
                );
            }
        }
    }
}
