/// `Status` represents the processor status register, `p` on the [`Cpu`](super::Cpu).
///
/// Each bit in `p` has a different meaning:
///
/// ```text
/// +---+---+---+---+---+---+---+---+
/// | N | V |   | B | D | I | Z | C |
/// +---+---+---+---+---+---+---+---+
/// ```
///
/// - `C` is the carry flag, the "ninth bit" of arithmetic and shift operations.
/// - `Z` is set whenever an operation produces a zero result.
/// - `I` disables servicing of the maskable interrupt request line while set.
/// - `D` selects packed binary-coded-decimal behavior for `ADC`/`SBC`.
/// - `B` distinguishes a `BRK`/`PHP` push from a hardware interrupt push.
/// - bit 5 is unused on the 6502 and has no storage of its own.
/// - `V` is set when addition/subtraction overflows as a signed operation.
/// - `N` mirrors bit 7 of the result of most data movements and arithmetic.
///
/// Gotchas:
///
/// - `B` and the unused bit only really exist in *pushed* copies of `p`. Every
///   push (`PHP`, `BRK`, hardware interrupts) forces both bits set in the copy
///   on the stack; every pull (`PLP`, `RTI`) forces both clear in the live
///   register.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub struct Status(pub u8);

impl Status {
    pub fn get(&self, flag: StatusFlag) -> bool {
        (self.0 & flag.mask()) != 0
    }

    pub fn set(&mut self, flag: StatusFlag, value: bool) {
        if value {
            self.0 |= flag.mask();
        } else {
            self.0 &= !flag.mask();
        }
    }

    pub fn with(mut self, flag: StatusFlag, value: bool) -> Status {
        self.set(flag, value);
        self
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum StatusFlag {
    Carry = 0,
    Zero = 1,
    InterruptDisable = 2,
    DecimalMode = 3,
    Break = 4,
    Unused = 5,
    Overflow = 6,
    Negative = 7,
}

impl StatusFlag {
    pub fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn set_and_get_roundtrip() {
        let mut p = Status(0);
        p.set(StatusFlag::Carry, true);
        p.set(StatusFlag::Negative, true);

        assert_eq!(p.0, 0b1000_0001);
        assert!(p.get(StatusFlag::Carry));
        assert!(p.get(StatusFlag::Negative));
        assert!(!p.get(StatusFlag::Zero));

        p.set(StatusFlag::Carry, false);
        assert_eq!(p.0, 0b1000_0000);
    }

    #[test]
    pub fn with_builds_pushed_copies() {
        let p = Status(0)
            .with(StatusFlag::Break, true)
            .with(StatusFlag::Unused, true);

        assert_eq!(p.0, 0b0011_0000);
    }
}
