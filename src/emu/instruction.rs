// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use emu::cpu::{CPU, CARRY_FLAG, DECIMAL_MODE, INTERRUPT_DISABLE, NEGATIVE_FLAG, OVERFLOW_FLAG,
               UNUSED_FLAG, ZERO_FLAG};
use emu::memory::{Memory, StackFault};
use emu::opcode::{AddressingMode, Mnemonic, OpcodeTable};
use emu::tracer::{CallEvent, CallTracer};
use io::errors::{EmulatorError, Result};
use utils::{arithmetic, paging};

/// The operand of an instruction once its addressing mode has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    Immediate(u8),
    Relative(i8),
    Address(u16),
}

/// A fetched and resolved instruction. Instructions are at most 3 bytes: the
/// opcode followed by up to 2 operand bytes, all kept in `raw` for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub addr: u16,
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    pub operand: Operand,
    pub raw: [u8; 3],

    // Base cost plus the indexing penalty found while resolving the operand.
    pub cycles: u8,
}

/// Outcome of executing an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    // Final cost, including any branch penalty.
    pub cycles: u8,

    // Set when the instruction entered or left a traced routine.
    pub call: Option<CallEvent>,
}

impl Instruction {
    /// Decodes the instruction at the program counter and resolves its
    /// operand. The program counter is left pointing past the instruction.
    /// Bytes that are not in the table are a fatal decode error.
    pub fn fetch(cpu: &mut CPU, memory: &Memory, table: &OpcodeTable) -> Result<Instruction> {
        let addr = cpu.pc;
        let byte = next_u8(cpu, memory);
        let info = match table.lookup(byte) {
            Some(info) => *info,
            None => return Err(EmulatorError::Decode { pc: addr, opcode: byte }),
        };

        let mut raw = [byte, 0, 0];
        for i in 0..info.mode.operand_len() {
            raw[1 + i as usize] = memory.read_u8(addr.wrapping_add(1 + i));
        }

        let (operand, penalty) = resolve(info.mode, cpu, memory);
        Ok(Instruction {
            addr: addr,
            mnemonic: info.mnemonic,
            mode: info.mode,
            operand: operand,
            raw: raw,
            cycles: info.cycles + penalty,
        })
    }

    /// Applies the instruction to the registers and memory. Calls and returns
    /// are reported to the tracer; the caller adds the returned cycle cost to
    /// the CPU and charges it to the profiler.
    pub fn execute(&self, cpu: &mut CPU, memory: &mut Memory, tracer: &mut CallTracer) -> Result<Execution> {
        use emu::opcode::Mnemonic::*;

        let mut cycles = self.cycles;
        let mut call = None;

        match self.mnemonic {
            ADC => {
                let value = self.read_operand(memory);
                adc(cpu, value);
            },
            SBC => {
                let value = self.read_operand(memory);
                sbc(cpu, value);
            },
            AND => {
                cpu.a &= self.read_operand(memory);
                let a = cpu.a;
                cpu.toggle_zero_negative(a);
            },
            ORA => {
                cpu.a |= self.read_operand(memory);
                let a = cpu.a;
                cpu.toggle_zero_negative(a);
            },
            EOR => {
                cpu.a ^= self.read_operand(memory);
                let a = cpu.a;
                cpu.toggle_zero_negative(a);
            },
            ASL => self.modify(cpu, memory, |cpu, value| {
                cpu.set_flag(CARRY_FLAG, value & 0x80 != 0);
                value << 1
            }),
            LSR => self.modify(cpu, memory, |cpu, value| {
                cpu.set_flag(CARRY_FLAG, value & 0x01 != 0);
                value >> 1
            }),
            ROL => self.modify(cpu, memory, |cpu, value| {
                let carry_in = cpu.carry();
                cpu.set_flag(CARRY_FLAG, value & 0x80 != 0);
                (value << 1) | carry_in
            }),
            ROR => self.modify(cpu, memory, |cpu, value| {
                let carry_in = cpu.carry();
                cpu.set_flag(CARRY_FLAG, value & 0x01 != 0);
                (value >> 1) | (carry_in << 7)
            }),
            INC => self.modify(cpu, memory, |_, value| value.wrapping_add(1)),
            DEC => self.modify(cpu, memory, |_, value| value.wrapping_sub(1)),
            BIT => {
                let value = self.read_operand(memory);
                cpu.set_flag(ZERO_FLAG, cpu.a & value == 0);
                cpu.set_flag(NEGATIVE_FLAG, value & 0x80 != 0);
                cpu.set_flag(OVERFLOW_FLAG, value & 0x40 != 0);
            },
            CMP => {
                let (register, value) = (cpu.a, self.read_operand(memory));
                compare(cpu, register, value);
            },
            CPX => {
                let (register, value) = (cpu.x, self.read_operand(memory));
                compare(cpu, register, value);
            },
            CPY => {
                let (register, value) = (cpu.y, self.read_operand(memory));
                compare(cpu, register, value);
            },

            BCC => { let taken = !cpu.flag_set(CARRY_FLAG); cycles += self.branch(cpu, taken); },
            BCS => { let taken = cpu.flag_set(CARRY_FLAG); cycles += self.branch(cpu, taken); },
            BEQ => { let taken = cpu.flag_set(ZERO_FLAG); cycles += self.branch(cpu, taken); },
            BNE => { let taken = !cpu.flag_set(ZERO_FLAG); cycles += self.branch(cpu, taken); },
            BMI => { let taken = cpu.flag_set(NEGATIVE_FLAG); cycles += self.branch(cpu, taken); },
            BPL => { let taken = !cpu.flag_set(NEGATIVE_FLAG); cycles += self.branch(cpu, taken); },
            BVC => { let taken = !cpu.flag_set(OVERFLOW_FLAG); cycles += self.branch(cpu, taken); },
            BVS => { let taken = cpu.flag_set(OVERFLOW_FLAG); cycles += self.branch(cpu, taken); },
            BRA => cycles += self.branch(cpu, true),

            JMP => cpu.pc = self.target(),
            JSR => {
                let routine = self.target();
                let sp = cpu.sp;
                let return_addr = cpu.pc.wrapping_sub(1);
                memory.stack_push_u16(cpu, return_addr).map_err(|fault| self.stack_error(fault))?;
                tracer.enter(routine, sp);
                call = Some(CallEvent::Enter { routine: routine, cycles: cpu.total_cycles });
                cpu.pc = routine;
            },
            RTS => {
                if tracer.leave(cpu.sp) {
                    call = Some(CallEvent::Leave { cycles: cpu.total_cycles });
                }
                let return_addr = memory.stack_pop_u16(cpu).map_err(|fault| self.stack_error(fault))?;
                cpu.pc = return_addr.wrapping_add(1);
            },
            RTI => {
                let p = self.pull(cpu, memory)?;
                cpu.p = p | UNUSED_FLAG;
                let return_addr = memory.stack_pop_u16(cpu).map_err(|fault| self.stack_error(fault))?;
                cpu.pc = return_addr;
            },

            LDA => { cpu.a = self.read_operand(memory); let a = cpu.a; cpu.toggle_zero_negative(a); },
            LDX => { cpu.x = self.read_operand(memory); let x = cpu.x; cpu.toggle_zero_negative(x); },
            LDY => { cpu.y = self.read_operand(memory); let y = cpu.y; cpu.toggle_zero_negative(y); },
            STA => memory.write_u8(self.target(), cpu.a),
            STX => memory.write_u8(self.target(), cpu.x),
            STY => memory.write_u8(self.target(), cpu.y),
            STZ => memory.write_u8(self.target(), 0),

            TAX => { cpu.x = cpu.a; let x = cpu.x; cpu.toggle_zero_negative(x); },
            TAY => { cpu.y = cpu.a; let y = cpu.y; cpu.toggle_zero_negative(y); },
            TXA => { cpu.a = cpu.x; let a = cpu.a; cpu.toggle_zero_negative(a); },
            TYA => { cpu.a = cpu.y; let a = cpu.a; cpu.toggle_zero_negative(a); },
            TSX => { cpu.x = cpu.sp; let x = cpu.x; cpu.toggle_zero_negative(x); },
            TXS => cpu.sp = cpu.x,

            INA => { cpu.a = cpu.a.wrapping_add(1); let a = cpu.a; cpu.toggle_zero_negative(a); },
            INX => { cpu.x = cpu.x.wrapping_add(1); let x = cpu.x; cpu.toggle_zero_negative(x); },
            INY => { cpu.y = cpu.y.wrapping_add(1); let y = cpu.y; cpu.toggle_zero_negative(y); },
            DEA => { cpu.a = cpu.a.wrapping_sub(1); let a = cpu.a; cpu.toggle_zero_negative(a); },
            DEX => { cpu.x = cpu.x.wrapping_sub(1); let x = cpu.x; cpu.toggle_zero_negative(x); },
            DEY => { cpu.y = cpu.y.wrapping_sub(1); let y = cpu.y; cpu.toggle_zero_negative(y); },

            PHA => { let a = cpu.a; self.push(cpu, memory, a)?; },
            PHX => { let x = cpu.x; self.push(cpu, memory, x)?; },
            PHY => { let y = cpu.y; self.push(cpu, memory, y)?; },
            PHP => { let p = cpu.p; self.push(cpu, memory, p)?; },
            PLA => { let a = self.pull(cpu, memory)?; cpu.a = a; cpu.toggle_zero_negative(a); },
            PLX => { let x = self.pull(cpu, memory)?; cpu.x = x; cpu.toggle_zero_negative(x); },
            PLY => { let y = self.pull(cpu, memory)?; cpu.y = y; cpu.toggle_zero_negative(y); },
            PLP => { let p = self.pull(cpu, memory)?; cpu.p = p | UNUSED_FLAG; },

            CLC => cpu.set_flag(CARRY_FLAG, false),
            SEC => cpu.set_flag(CARRY_FLAG, true),
            CLD => cpu.set_flag(DECIMAL_MODE, false),
            SED => cpu.set_flag(DECIMAL_MODE, true),
            CLI => cpu.set_flag(INTERRUPT_DISABLE, false),
            SEI => cpu.set_flag(INTERRUPT_DISABLE, true),
            CLV => cpu.set_flag(OVERFLOW_FLAG, false),

            NOP => {},

            // Interrupts are not emulated, so there is nothing BRK could do.
            BRK => {
                return Err(EmulatorError::UnimplementedOpcode { pc: self.addr, mnemonic: self.mnemonic });
            },
        }

        Ok(Execution { cycles: cycles, call: call })
    }

    /// Disassembles the instruction, e.g. `LDA ($12),Y`.
    pub fn disassemble(&self) -> String {
        use emu::opcode::AddressingMode::*;

        let byte = self.raw[1];
        let word = (self.raw[2] as u16) << 8 | self.raw[1] as u16;
        let operand = match self.mode {
            Accumulator      => String::from("A"),
            Implied          => String::new(),
            Immediate        => format!("#${:02X}", byte),
            Relative         => {
                let target = arithmetic::add_relative(self.addr.wrapping_add(2), byte as i8);
                format!("${:04X}", target)
            },
            Absolute         => format!("${:04X}", word),
            ZeroPage         => format!("${:02X}", byte),
            ZeroPageIndirect => format!("(${:02X})", byte),
            Indirect         => format!("(${:04X})", word),
            ZeroPageX        => format!("${:02X},X", byte),
            ZeroPageY        => format!("${:02X},Y", byte),
            AbsoluteX        => format!("${:04X},X", word),
            AbsoluteY        => format!("${:04X},Y", word),
            IndexedIndirectX => format!("(${:02X},X)", byte),
            IndirectIndexedY => format!("(${:02X}),Y", byte),
        };

        if operand.is_empty() {
            format!("{}", self.mnemonic)
        } else {
            format!("{} {}", self.mnemonic, operand)
        }
    }

    /// Total length of the instruction in bytes.
    pub fn len(&self) -> u16 {
        1 + self.mode.operand_len()
    }

    /// Value the instruction operates on: the immediate byte, or the byte at
    /// the effective address.
    #[inline(always)]
    fn read_operand(&self, memory: &Memory) -> u8 {
        match self.operand {
            Operand::Immediate(value) => value,
            Operand::Address(addr) => memory.read_u8(addr),
            Operand::Relative(_) | Operand::None => 0,
        }
    }

    /// Effective address of the instruction.
    #[inline(always)]
    fn target(&self) -> u16 {
        match self.operand {
            Operand::Address(addr) => addr,
            _ => 0,
        }
    }

    /// Read-modify-write on the accumulator or on memory, depending on the
    /// addressing mode. The zero and negative flags follow the result.
    fn modify<F>(&self, cpu: &mut CPU, memory: &mut Memory, op: F) where F: FnOnce(&mut CPU, u8) -> u8 {
        if self.mode == AddressingMode::Accumulator {
            let value = cpu.a;
            let result = op(cpu, value);
            cpu.a = result;
            cpu.toggle_zero_negative(result);
        } else {
            let addr = self.target();
            let value = memory.read_u8(addr);
            let result = op(cpu, value);
            memory.write_u8(addr, result);
            cpu.toggle_zero_negative(result);
        }
    }

    /// Takes the branch if the condition holds. Returns the extra cycles: one
    /// for a taken branch and another one if the target is in a different 4kB
    /// window than the instruction that follows the branch.
    fn branch(&self, cpu: &mut CPU, condition: bool) -> u8 {
        if !condition {
            return 0;
        }

        let offset = match self.operand {
            Operand::Relative(offset) => offset,
            _ => 0,
        };
        let target = arithmetic::add_relative(cpu.pc, offset);
        let extra = if paging::branch_crosses_window(cpu.pc, target) { 2 } else { 1 };
        cpu.pc = target;
        extra
    }

    fn push(&self, cpu: &mut CPU, memory: &mut Memory, value: u8) -> Result<()> {
        memory.stack_push_u8(cpu, value).map_err(|fault| self.stack_error(fault))
    }

    fn pull(&self, cpu: &mut CPU, memory: &mut Memory) -> Result<u8> {
        memory.stack_pop_u8(cpu).map_err(|fault| self.stack_error(fault))
    }

    fn stack_error(&self, fault: StackFault) -> EmulatorError {
        match fault {
            StackFault::Overflow => EmulatorError::StackOverflow { pc: self.addr },
            StackFault::Underrun => EmulatorError::StackUnderrun { pc: self.addr },
        }
    }
}

/// Reads the byte at the program counter and advances it.
#[inline(always)]
fn next_u8(cpu: &mut CPU, memory: &Memory) -> u8 {
    let value = memory.read_u8(cpu.pc);
    cpu.pc = cpu.pc.wrapping_add(1);
    value
}

/// Reads the little-endian word at the program counter and advances it.
#[inline(always)]
fn next_u16(cpu: &mut CPU, memory: &Memory) -> u16 {
    let lo = next_u8(cpu, memory) as u16;
    let hi = next_u8(cpu, memory) as u16;
    hi << 8 | lo
}

/// Consumes the operand bytes of an addressing mode and returns the resolved
/// operand together with the penalty cycles for crossing a 4kB window while
/// indexing.
fn resolve(mode: AddressingMode, cpu: &mut CPU, memory: &Memory) -> (Operand, u8) {
    use emu::opcode::AddressingMode::*;

    match mode {
        Accumulator | Implied => (Operand::None, 0),
        Immediate => (Operand::Immediate(next_u8(cpu, memory)), 0),
        Relative => (Operand::Relative(next_u8(cpu, memory) as i8), 0),
        Absolute => (Operand::Address(next_u16(cpu, memory)), 0),
        ZeroPage => (Operand::Address(next_u8(cpu, memory) as u16), 0),
        Indirect => {
            let pointer = next_u16(cpu, memory);
            (Operand::Address(memory.read_u16(pointer)), 0)
        },
        ZeroPageIndirect => {
            let pointer = next_u8(cpu, memory) as u16;
            (Operand::Address(memory.read_u16(pointer)), 0)
        },
        // Zero page indexing wraps within page zero.
        ZeroPageX => {
            let base = next_u8(cpu, memory);
            (Operand::Address(base.wrapping_add(cpu.x) as u16), 0)
        },
        ZeroPageY => {
            let base = next_u8(cpu, memory);
            (Operand::Address(base.wrapping_add(cpu.y) as u16), 0)
        },
        AbsoluteX => {
            let base = next_u16(cpu, memory);
            indexed(base, cpu.x)
        },
        AbsoluteY => {
            let base = next_u16(cpu, memory);
            indexed(base, cpu.y)
        },
        IndexedIndirectX => {
            let pointer = next_u8(cpu, memory).wrapping_add(cpu.x);
            (Operand::Address(memory.read_u16(pointer as u16)), 0)
        },
        IndirectIndexedY => {
            let pointer = next_u8(cpu, memory) as u16;
            let base = memory.read_u16(pointer);
            indexed(base, cpu.y)
        },
    }
}

#[inline(always)]
fn indexed(base: u16, index: u8) -> (Operand, u8) {
    let penalty = if paging::index_crosses_window(base, index as u16) { 1 } else { 0 };
    (Operand::Address(base.wrapping_add(index as u16)), penalty)
}

/// Add with carry. Decimal mode is a correction applied to the binary
/// result: each nibble above 9 gets 6 added and the carry is recomputed from
/// the high nibble only.
fn adc(cpu: &mut CPU, value: u8) {
    let a = cpu.a;
    let sum = a as u16 + value as u16 + cpu.carry() as u16;
    binary_result(cpu, a, value, sum);
    if cpu.flag_set(DECIMAL_MODE) {
        decimal_adjust(cpu);
    }
}

/// Subtract with borrow, computed as an addition of the inverted operand.
/// Decimal mode takes a flat 0x66 off before running the same correction as
/// `adc`.
fn sbc(cpu: &mut CPU, value: u8) {
    let a = cpu.a;
    let inverted = value ^ 0xFF;
    let sum = a as u16 + inverted as u16 + cpu.carry() as u16;
    binary_result(cpu, a, inverted, sum);
    if cpu.flag_set(DECIMAL_MODE) {
        cpu.a = cpu.a.wrapping_sub(0x66);
        decimal_adjust(cpu);
    }
}

#[inline(always)]
fn binary_result(cpu: &mut CPU, a: u8, addend: u8, sum: u16) {
    let result = sum as u8;
    cpu.a = result;
    cpu.set_flag(CARRY_FLAG, sum > 0xFF);
    cpu.toggle_zero_negative(result);
    cpu.set_flag(OVERFLOW_FLAG, (sum ^ a as u16) & (sum ^ addend as u16) & 0x80 != 0);
}

#[inline(always)]
fn decimal_adjust(cpu: &mut CPU) {
    cpu.set_flag(CARRY_FLAG, false);
    if cpu.a & 0x0F > 0x09 {
        cpu.a = cpu.a.wrapping_add(0x06);
    }
    if cpu.a & 0xF0 > 0x90 {
        cpu.a = cpu.a.wrapping_add(0x60);
        cpu.set_flag(CARRY_FLAG, true);
    }
}

/// Unsigned comparison of a register against a value.
#[inline(always)]
fn compare(cpu: &mut CPU, register: u8, value: u8) {
    cpu.set_flag(CARRY_FLAG, register >= value);
    cpu.set_flag(ZERO_FLAG, register == value);
    cpu.set_flag(NEGATIVE_FLAG, arithmetic::is_negative(register.wrapping_sub(value)));
}
