// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use emu::cpu::CPU;
use emu::memory::Memory;
use emu::tracer::CallTracer;
use io::binutils;
use io::errors::{EmulatorError, Result};
use std::fmt;
use std::io::BufRead;
use utils::arithmetic;

// One slot per program counter and phase.
const INDEX_SIZE: usize = 0x20000;

/// Whether a watch samples before or after the instruction at its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre = 0,
    Post = 1,
}

/// How the sampled bytes are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    U8,
    S8,
    U16,
    S16,
}

/// Where a watch reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchSource {
    Memory(u16),
    RegisterA,
    RegisterX,
    RegisterY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watch {
    // Caller supplied group id. Consecutive watches sharing it end up in the
    // same record.
    pub index: i32,
    pub pc: u16,
    pub phase: Phase,
    pub kind: ValueKind,
    pub source: WatchSource,
}

impl Watch {
    #[inline(always)]
    fn key(&self) -> usize {
        slot(self.pc, self.phase)
    }

    /// Reads the watched value. Registers are 8 bits wide: `u8` reads them
    /// unsigned and every other kind reads them as signed bytes.
    pub fn sample(&self, cpu: &CPU, memory: &Memory) -> i32 {
        let register = match self.source {
            WatchSource::Memory(addr) => {
                return match self.kind {
                    ValueKind::U8 => memory.read_u8(addr) as i32,
                    ValueKind::S8 => arithmetic::signed_u8(memory.read_u8(addr)),
                    ValueKind::U16 => memory.read_u16(addr) as i32,
                    ValueKind::S16 => arithmetic::signed_u16(memory.read_u16(addr)),
                };
            },
            WatchSource::RegisterA => cpu.a,
            WatchSource::RegisterX => cpu.x,
            WatchSource::RegisterY => cpu.y,
        };

        match self.kind {
            ValueKind::U8 => register as i32,
            _ => arithmetic::signed_u8(register),
        }
    }
}

#[inline(always)]
fn slot(pc: u16, phase: Phase) -> usize {
    (pc as usize) << 1 | phase as usize
}

/// One output line of the watch engine: every value sampled for one group at
/// one point of execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRecord {
    pub routine: u16,
    pub index: i32,
    pub cycles: u64,
    pub values: Vec<i32>,
}

impl fmt::Display for WatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "watch 0x{:04x} {} {}", self.routine, self.index, self.cycles)?;
        for value in &self.values {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

/// Watches ordered by program counter and phase, with a lookup table from
/// (pc, phase) to the first matching watch.
pub struct WatchTable {
    watches: Vec<Watch>,
    first: Vec<Option<usize>>,
}

impl WatchTable {
    pub fn new() -> WatchTable {
        WatchTable::from_watches(Vec::new())
    }

    /// Builds the table. Watches at the same point keep their relative order.
    pub fn from_watches(mut watches: Vec<Watch>) -> WatchTable {
        watches.sort_by_key(|watch| watch.key());

        let mut first = vec![None; INDEX_SIZE];
        for (i, watch) in watches.iter().enumerate() {
            let key = watch.key();
            if first[key].is_none() {
                first[key] = Some(i);
            }
        }

        WatchTable {
            watches: watches,
            first: first,
        }
    }

    /// Reads a watch table. The first line holds the number of watches and
    /// each following line describes one watch:
    ///
    /// ```text
    /// 3
    /// 0,0x6010,0,u8,reg,A
    /// 0,0x6010,0,s16,mem,0x008d
    /// 1,0x6020,1,u16,mem,0x0091
    /// ```
    ///
    /// Reading stops at the first empty line or at the end of input. Any line
    /// that cannot be parsed, or a count that does not match the number of
    /// descriptors, rejects the whole table.
    pub fn parse<R: BufRead>(reader: R) -> Result<WatchTable> {
        let mut expected: Option<usize> = None;
        let mut watches = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = i + 1;
            let text = line.trim();
            if text.is_empty() {
                break;
            }

            match expected {
                None => {
                    let count = text.parse::<usize>()
                        .map_err(|_| invalid(line_no, format!("invalid watch count '{}'", text)))?;
                    expected = Some(count);
                },
                Some(count) => {
                    if watches.len() == count {
                        return Err(invalid(line_no, format!("more than {} watches", count)));
                    }
                    watches.push(parse_watch(text, line_no)?);
                },
            }
        }

        let count = expected.unwrap_or(0);
        if watches.len() != count {
            return Err(invalid(watches.len() + 2, format!("expected {} watches, found {}", count, watches.len())));
        }

        Ok(WatchTable::from_watches(watches))
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    /// Samples every watch registered for `pc` in the given phase. The
    /// returned records are tagged with the routine owning the current stack
    /// frame (0 when none does) and the current cycle count. A new record
    /// starts whenever the group index changes.
    pub fn fire(&self, pc: u16, phase: Phase, cpu: &CPU, memory: &Memory, tracer: &CallTracer) -> Vec<WatchRecord> {
        let start = match self.first[slot(pc, phase)] {
            Some(start) => start,
            None => return Vec::new(),
        };

        let routine = tracer.routine_for_sp(cpu.sp).unwrap_or(0);
        let mut records: Vec<WatchRecord> = Vec::new();

        for watch in self.watches[start..].iter().take_while(|w| w.pc == pc && w.phase == phase) {
            let value = watch.sample(cpu, memory);
            let same_group = match records.last() {
                Some(record) => record.index == watch.index,
                None => false,
            };

            if same_group {
                if let Some(record) = records.last_mut() {
                    record.values.push(value);
                }
            } else {
                records.push(WatchRecord {
                    routine: routine,
                    index: watch.index,
                    cycles: cpu.total_cycles,
                    values: vec![value],
                });
            }
        }

        records
    }
}

impl Default for WatchTable {
    fn default() -> WatchTable {
        WatchTable::new()
    }
}

fn invalid(line: usize, reason: String) -> EmulatorError {
    EmulatorError::WatchConfig { line: line, reason: reason }
}

/// Parses `index,pc,phase,kind,source...` where the source is either
/// `mem,<addr>` or a register letter, optionally preceded by a placeholder
/// field (`reg,A`).
fn parse_watch(text: &str, line: usize) -> Result<Watch> {
    let fields: Vec<&str> = text.split(',').map(|f| f.trim()).collect();
    if fields.len() < 5 || fields.len() > 6 {
        return Err(invalid(line, format!("expected 5 or 6 fields, found {}", fields.len())));
    }

    let index = fields[0].parse::<i32>()
        .map_err(|_| invalid(line, format!("invalid index '{}'", fields[0])))?;
    let pc = parse_addr(fields[1], line)?;
    let phase = match fields[2] {
        "0" => Phase::Pre,
        "1" => Phase::Post,
        other => return Err(invalid(line, format!("invalid phase '{}'", other))),
    };
    let kind = match fields[3] {
        "u8" => ValueKind::U8,
        "s8" => ValueKind::S8,
        "u16" => ValueKind::U16,
        "s16" => ValueKind::S16,
        other => return Err(invalid(line, format!("invalid data type '{}'", other))),
    };

    let source = if fields[4] == "mem" {
        match fields.get(5) {
            Some(addr) => WatchSource::Memory(parse_addr(addr, line)?),
            None => return Err(invalid(line, String::from("missing memory address"))),
        }
    } else {
        let register = if fields.len() == 6 { fields[5] } else { fields[4] };
        match register {
            "A" => WatchSource::RegisterA,
            "X" => WatchSource::RegisterX,
            "Y" => WatchSource::RegisterY,
            other => return Err(invalid(line, format!("invalid register '{}'", other))),
        }
    };

    Ok(Watch {
        index: index,
        pc: pc,
        phase: phase,
        kind: kind,
        source: source,
    })
}

fn parse_addr(text: &str, line: usize) -> Result<u16> {
    binutils::parse_hex(text).ok_or_else(|| invalid(line, format!("invalid address '{}'", text)))
}
