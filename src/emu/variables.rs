// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use emu::memory::Memory;
use emu::watch::ValueKind;
use io::binutils;
use io::errors::{EmulatorError, Result};
use std::fs::OpenOptions;
use std::io::{BufRead, BufWriter, ErrorKind, Write};
use std::path::Path;
use utils::arithmetic;

/// A named location in memory whose writes get logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub label: String,
    pub addr: u16,
    pub kind: ValueKind,
}

impl Variable {
    fn is_wide(&self) -> bool {
        self.kind == ValueKind::U16 || self.kind == ValueKind::S16
    }

    /// True if a write to `addr` changes this variable.
    pub fn covers(&self, addr: u16) -> bool {
        addr == self.addr || (self.is_wide() && addr == self.addr.wrapping_add(1))
    }

    pub fn value(&self, memory: &Memory) -> i32 {
        match self.kind {
            ValueKind::U8 => memory.read_u8(self.addr) as i32,
            ValueKind::S8 => arithmetic::signed_u8(memory.read_u8(self.addr)),
            ValueKind::U16 => memory.read_u16(self.addr) as i32,
            ValueKind::S16 => arithmetic::signed_u16(memory.read_u16(self.addr)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    variables: Vec<Variable>,
}

impl VariableTable {
    pub fn new(variables: Vec<Variable>) -> VariableTable {
        VariableTable { variables: variables }
    }

    /// Reads `LABEL,ADDR,TYPE` lines, e.g. `RX,0x008d,s16`. Empty lines and
    /// lines starting with `#` are skipped.
    pub fn parse<R: BufRead>(reader: R) -> Result<VariableTable> {
        let mut variables = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let invalid = |reason: String| EmulatorError::VariableConfig { line: i + 1, reason: reason };
            let fields: Vec<&str> = text.split(',').map(|f| f.trim()).collect();
            if fields.len() != 3 || fields[0].is_empty() {
                return Err(invalid(format!("expected LABEL,ADDR,TYPE, found '{}'", text)));
            }

            let addr = match binutils::parse_number(fields[1]) {
                Some(addr) if addr <= 0xFFFF => addr as u16,
                _ => return Err(invalid(format!("invalid address '{}'", fields[1]))),
            };
            let kind = match fields[2] {
                "u8" => ValueKind::U8,
                "s8" => ValueKind::S8,
                "u16" => ValueKind::U16,
                "s16" => ValueKind::S16,
                other => return Err(invalid(format!("invalid data type '{}'", other))),
            };

            variables.push(Variable {
                label: String::from(fields[0]),
                addr: addr,
                kind: kind,
            });
        }

        Ok(VariableTable::new(variables))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

/// Appends one `0x<pc> <label> <value>` line for every variable changed by an
/// instruction.
pub struct VariableLog<W: Write> {
    table: VariableTable,
    out: W,
}

impl VariableLog<Box<dyn Write>> {
    /// Opens a fresh output file. An existing file is never overwritten.
    pub fn create<P: AsRef<Path>>(path: P, table: VariableTable) -> Result<VariableLog<Box<dyn Write>>> {
        let path = path.as_ref();
        let file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(ref err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(EmulatorError::WatchFileExists(path.display().to_string()));
            },
            Err(err) => return Err(EmulatorError::Io(err)),
        };
        Ok(VariableLog::new(table, Box::new(BufWriter::new(file))))
    }
}

impl<W: Write> VariableLog<W> {
    pub fn new(table: VariableTable, out: W) -> VariableLog<W> {
        VariableLog {
            table: table,
            out: out,
        }
    }

    /// Logs the variables touched by `writes`, each at most once, in table
    /// order. `pc` is the address of the instruction following the one that
    /// did the writes.
    pub fn record(&mut self, pc: u16, writes: &[u16], memory: &Memory) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        for variable in &self.table.variables {
            if writes.iter().any(|&addr| variable.covers(addr)) {
                writeln!(self.out, "0x{:04x} {} {}", pc, variable.label, variable.value(memory))?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::io::Cursor;

    fn table() -> VariableTable {
        VariableTable::parse(Cursor::new("# registers\nRX,0x008d,s16\n\nFLAG,0x0090,u8\n")).unwrap()
    }

    #[test]
    fn parses_table() {
        let table = table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.variables()[0], Variable {
            label: String::from("RX"),
            addr: 0x8D,
            kind: ValueKind::S16,
        });
    }

    #[test]
    fn rejects_bad_lines() {
        for text in &["RX,0x008d\n", "RX,zz,u8\n", "RX,0x8d,f32\n", ",0x8d,u8\n"] {
            match VariableTable::parse(Cursor::new(*text)) {
                Err(EmulatorError::VariableConfig { line: 1, .. }) => {},
                other => panic!("{:?} gave {:?}", text, other),
            }
        }
    }

    #[test]
    fn wide_variables_cover_both_bytes() {
        let table = table();
        let rx = &table.variables()[0];
        assert!(rx.covers(0x8D));
        assert!(rx.covers(0x8E));
        assert!(!rx.covers(0x8C));
        assert!(!table.variables()[1].covers(0x91));
    }

    #[test]
    fn logs_each_touched_variable_once() {
        let mut memory = Memory::new();
        memory.write_u16(0x8D, 0xFFFF);
        memory.write_u8(0x90, 7);

        let mut log = VariableLog::new(table(), Vec::new());
        log.record(0x6003, &[0x8D, 0x8E], &memory).unwrap();
        log.record(0x6005, &[], &memory).unwrap();
        log.record(0x6007, &[0x90, 0x1234], &memory).unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(text, "0x6003 RX -1\n0x6007 FLAG 7\n");
    }

    #[test]
    fn refuses_to_overwrite_output() {
        let path = env::temp_dir().join(format!("champ-variables-{}.txt", ::std::process::id()));
        let _ = fs::remove_file(&path);

        let log = VariableLog::create(&path, table());
        assert!(log.is_ok());
        match VariableLog::create(&path, table()) {
            Err(EmulatorError::WatchFileExists(_)) => {},
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        fs::remove_file(&path).unwrap();
    }
}
