// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use byteorder::{ByteOrder, LittleEndian};
use emu::cpu::CPU;
use std::mem;

pub const MEMORY_SIZE: usize = 0x10000;

// Location of the first byte on the bottom of the stack. The stack lives on
// memory page 1 (0x100).
const STACK_OFFSET: usize = 0x100;

/// Failure of a stack operation. The instruction that caused it turns this
/// into an error carrying its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackFault {
    Overflow,
    Underrun,
}

/// Flat 64kB of memory. There is no ROM or mirroring; every address can be
/// read and written. Writes can optionally be recorded so observers can react
/// to them once the instruction has finished.
pub struct Memory {
    ram: Vec<u8>,

    // Addresses written since the last call to `take_writes`. Only recorded
    // while write tracking is on.
    writes: Option<Vec<u16>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory {
            ram: vec![0; MEMORY_SIZE],
            writes: None,
        }
    }

    /// Reads an unsigned 8-bit byte value located at the given address.
    #[inline(always)]
    pub fn read_u8(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    /// Writes an unsigned 8-bit byte value to the given address.
    #[inline(always)]
    pub fn write_u8(&mut self, addr: u16, val: u8) {
        self.ram[addr as usize] = val;
        if let Some(ref mut writes) = self.writes {
            writes.push(addr);
        }
    }

    /// Reads an unsigned 16-bit value at the given address (little-endian).
    /// The second byte is read from the following address, wrapping from
    /// 0xFFFF to 0x0000 and crossing page boundaries freely.
    #[inline(always)]
    pub fn read_u16(&self, addr: u16) -> u16 {
        let bytes = [self.read_u8(addr), self.read_u8(addr.wrapping_add(1))];
        LittleEndian::read_u16(&bytes)
    }

    /// Writes an unsigned 16-bit value to the given address (little-endian).
    pub fn write_u16(&mut self, addr: u16, val: u16) {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, val);
        self.write_u8(addr, bytes[0]);
        self.write_u8(addr.wrapping_add(1), bytes[1]);
    }

    /// Copies an image into memory starting at the given offset. Whatever does
    /// not fit below 0x10000 is dropped. Returns the number of bytes loaded.
    pub fn load(&mut self, offset: u16, image: &[u8]) -> usize {
        let start = offset as usize;
        let len = image.len().min(MEMORY_SIZE - start);
        self.ram[start..start + len].copy_from_slice(&image[..len]);
        len
    }

    /// Starts or stops recording written addresses.
    pub fn track_writes(&mut self, enabled: bool) {
        self.writes = if enabled { Some(Vec::new()) } else { None };
    }

    /// Returns the addresses written since the last call, oldest first.
    pub fn take_writes(&mut self) -> Vec<u16> {
        match self.writes {
            Some(ref mut writes) => mem::replace(writes, Vec::new()),
            None => Vec::new(),
        }
    }

    // Utility functions for managing the stack.

    /// Pushes an 8-bit number onto the stack.
    pub fn stack_push_u8(&mut self, cpu: &mut CPU, value: u8) -> Result<(), StackFault> {
        if cpu.sp == 0 {
            return Err(StackFault::Overflow);
        }
        self.write_u8((STACK_OFFSET + cpu.sp as usize) as u16, value);
        cpu.sp -= 1;
        Ok(())
    }

    /// Pops an 8-bit number off the stack.
    pub fn stack_pop_u8(&mut self, cpu: &mut CPU) -> Result<u8, StackFault> {
        if cpu.sp == 0xFF {
            return Err(StackFault::Underrun);
        }
        cpu.sp += 1;
        Ok(self.read_u8((STACK_OFFSET + cpu.sp as usize) as u16))
    }

    /// Pushes a 16-bit number (usually an address) onto the stack, high byte
    /// first so it ends up little-endian in memory.
    pub fn stack_push_u16(&mut self, cpu: &mut CPU, value: u16) -> Result<(), StackFault> {
        self.stack_push_u8(cpu, (value >> 8) as u8)?;
        self.stack_push_u8(cpu, value as u8)
    }

    /// Pops a 16-bit number (usually an address) off the stack.
    pub fn stack_pop_u16(&mut self, cpu: &mut CPU) -> Result<u16, StackFault> {
        let lo = self.stack_pop_u8(cpu)?;
        let hi = self.stack_pop_u8(cpu)?;
        Ok(LittleEndian::read_u16(&[lo, hi]))
    }
}

impl Default for Memory {
    fn default() -> Memory {
        Memory::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_initialized() {
        let memory = Memory::new();
        assert!((0..MEMORY_SIZE).all(|addr| memory.read_u8(addr as u16) == 0));
    }

    #[test]
    fn words_are_little_endian() {
        let mut memory = Memory::new();
        memory.write_u16(0x1000, 0xBEEF);
        assert_eq!(memory.read_u8(0x1000), 0xEF);
        assert_eq!(memory.read_u8(0x1001), 0xBE);
        assert_eq!(memory.read_u16(0x1000), 0xBEEF);
    }

    #[test]
    fn word_read_wraps_at_top_of_memory() {
        let mut memory = Memory::new();
        memory.write_u8(0xFFFF, 0x34);
        memory.write_u8(0x0000, 0x12);
        assert_eq!(memory.read_u16(0xFFFF), 0x1234);
    }

    #[test]
    fn load_truncates_at_end_of_memory() {
        let mut memory = Memory::new();
        assert_eq!(memory.load(0xFFFE, &[1, 2, 3, 4]), 2);
        assert_eq!(memory.read_u8(0xFFFE), 1);
        assert_eq!(memory.read_u8(0xFFFF), 2);
        assert_eq!(memory.read_u8(0x0000), 0);
    }

    #[test]
    fn write_tracking() {
        let mut memory = Memory::new();
        memory.write_u8(0x10, 1);
        assert!(memory.take_writes().is_empty());

        memory.track_writes(true);
        memory.write_u8(0x10, 1);
        memory.write_u16(0x20, 0xFFFF);
        assert_eq!(memory.take_writes(), vec![0x10, 0x20, 0x21]);
        assert!(memory.take_writes().is_empty());
    }

    #[test]
    fn stack_round_trip() {
        let mut memory = Memory::new();
        let mut cpu = CPU::new(0);
        memory.stack_push_u16(&mut cpu, 0x1234).unwrap();
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!(memory.read_u8(0x1FF), 0x12);
        assert_eq!(memory.read_u8(0x1FE), 0x34);
        assert_eq!(memory.stack_pop_u16(&mut cpu).unwrap(), 0x1234);
        assert_eq!(cpu.sp, 0xFF);
    }

    #[test]
    fn stack_bounds() {
        let mut memory = Memory::new();
        let mut cpu = CPU::new(0);
        assert_eq!(memory.stack_pop_u8(&mut cpu), Err(StackFault::Underrun));

        cpu.sp = 0;
        assert_eq!(memory.stack_push_u8(&mut cpu, 1), Err(StackFault::Overflow));
        assert_eq!(cpu.sp, 0);
    }
}
