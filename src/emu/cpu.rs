// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;
use utils::arithmetic;

// Flag constants that allow easy bitwise getting and setting of flag values.
pub const CARRY_FLAG       : u8 = 0x1;
pub const ZERO_FLAG        : u8 = 0x2;
pub const INTERRUPT_DISABLE: u8 = 0x4;
pub const DECIMAL_MODE     : u8 = 0x8;
pub const UNUSED_FLAG      : u8 = 0x20; // Always set.
pub const OVERFLOW_FLAG    : u8 = 0x40;
pub const NEGATIVE_FLAG    : u8 = 0x80;

/// Register file of the 65C02. The memory and the profiler live beside it in
/// the emulator context; the CPU itself only knows its registers and the
/// number of cycles elapsed since the run started.
#[derive(Debug, Clone, PartialEq)]
pub struct CPU {
    // The program counter is a 16-bit register which points to the next
    // instruction to be executed.
    pub pc: u16,

    // The processor supports a 256 byte stack located between $0100 and $01FF.
    // The stack pointer holds the next free location on the stack and grows
    // downwards. Pushing with the pointer at 0 or pulling with the pointer at
    // 0xFF stops the emulator instead of wrapping around.
    pub sp: u8,

    // Accumulator and index registers.
    pub a: u8,
    pub x: u8,
    pub y: u8,

    // The Processor Status register. Bit 5 is always set and the break bit is
    // never produced by the emulated instructions.
    pub p: u8,

    // Total amount of cycles executed. Never reset during a run.
    pub total_cycles: u64,
}

impl CPU {
    pub fn new(start_pc: u16) -> CPU {
        CPU {
            pc: start_pc,
            sp: 0xFF,
            a: 0,
            x: 0,
            y: 0,
            p: UNUSED_FLAG,
            total_cycles: 0,
        }
    }

    /// Sets or clears the given flag bits.
    #[inline(always)]
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        self.p &= !flag;
        if value {
            self.p |= flag;
        }
    }

    /// Returns true if all of the given flag bits are set.
    #[inline(always)]
    pub fn flag_set(&self, flag: u8) -> bool {
        self.p & flag == flag
    }

    /// The carry flag as the 0 or 1 fed into arithmetic and rotations.
    #[inline(always)]
    pub fn carry(&self) -> u8 {
        if self.flag_set(CARRY_FLAG) { 1 } else { 0 }
    }

    /// Updates the zero and negative flags from a freshly produced value
    /// (typically the new content of a register).
    #[inline(always)]
    pub fn toggle_zero_negative(&mut self, value: u8) {
        self.set_flag(ZERO_FLAG, value == 0);
        self.set_flag(NEGATIVE_FLAG, arithmetic::is_negative(value));
    }

    /// Returns "SET" if the passed boolean is true, otherwise "UNSET". This
    /// function is used to display flags when the CPU crashes.
    fn fmt_flag(flag: bool) -> &'static str {
        if flag { "SET" } else { "UNSET" }
    }
}

impl fmt::Display for CPU {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "\nCPU Crash State:")?;
        writeln!(f, "    Program Counter: {:#X}", self.pc)?;
        writeln!(f, "    Stack Pointer:   {:#X}", self.sp)?;
        writeln!(f, "    Accumulator:     {:#X}", self.a)?;
        writeln!(f, "    X Register:      {:#X}", self.x)?;
        writeln!(f, "    Y Register:      {:#X}", self.y)?;
        writeln!(f, "    Total Cycles:    {}", self.total_cycles)?;
        writeln!(f, "")?;
        writeln!(f, "Status Register: {:#X}", self.p)?;
        writeln!(f, "    Carry Flag:        {}", CPU::fmt_flag(self.flag_set(CARRY_FLAG)))?;
        writeln!(f, "    Zero Flag:         {}", CPU::fmt_flag(self.flag_set(ZERO_FLAG)))?;
        writeln!(f, "    Interrupt Disable: {}", CPU::fmt_flag(self.flag_set(INTERRUPT_DISABLE)))?;
        writeln!(f, "    Decimal Mode:      {}", CPU::fmt_flag(self.flag_set(DECIMAL_MODE)))?;
        writeln!(f, "    Overflow Flag:     {}", CPU::fmt_flag(self.flag_set(OVERFLOW_FLAG)))?;
        writeln!(f, "    Negative Flag:     {}", CPU::fmt_flag(self.flag_set(NEGATIVE_FLAG)))
    }
}
