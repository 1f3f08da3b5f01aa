use std::sync::atomic::{AtomicBool, Ordering};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Interrupt {
    Nmi,
    Irq,
    Brk,
}

pub const NMI_VECTOR_ADDRESS: u16 = 0xFFFA;
pub const RESET_VECTOR_ADDRESS: u16 = 0xFFFC;
pub const IRQ_VECTOR_ADDRESS: u16 = 0xFFFE;

impl Interrupt {
    /// Only `IRQ` honors the `InterruptDisable` flag. `BRK` is a software
    /// request and always services.
    pub fn maskable(self) -> bool {
        self == Interrupt::Irq
    }

    pub fn vector_address(self) -> u16 {
        match self {
            Interrupt::Nmi => NMI_VECTOR_ADDRESS,
            Interrupt::Irq => IRQ_VECTOR_ADDRESS,
            Interrupt::Brk => IRQ_VECTOR_ADDRESS,
        }
    }
}

/// The asynchronous interrupt request lines of the CPU.
///
/// Devices, signal handlers or other threads raise these; the CPU polls them
/// at instruction boundaries. Coalescing multiple raises into one service is
/// the intended hardware semantics, so a plain atomic boolean per line is all
/// that's needed.
///
/// [`Cpu::interrupt_lines`](super::Cpu::interrupt_lines) hands out a shared
/// handle.
#[derive(Debug, Default)]
pub struct InterruptLines {
    irq: AtomicBool,
    nmi: AtomicBool,
}

impl InterruptLines {
    pub fn raise_irq(&self) {
        self.irq.store(true, Ordering::Release);
    }

    pub fn raise_nmi(&self) {
        self.nmi.store(true, Ordering::Release);
    }

    pub fn irq_pending(&self) -> bool {
        self.irq.load(Ordering::Acquire)
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi.load(Ordering::Acquire)
    }

    pub(super) fn clear_irq(&self) {
        self.irq.store(false, Ordering::Release);
    }

    /// Consume a pending NMI edge, returning whether one was pending.
    pub(super) fn take_nmi(&self) -> bool {
        self.nmi.swap(false, Ordering::AcqRel)
    }
}
