// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use emu::watch::WatchRecord;
use io::errors::Result;
use std::fmt;
use std::io::Write;

/// One line of the trace stream read by external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// Registers after an instruction, with the address it was fetched from.
    Log { old_pc: u16, a: u8, x: u8, y: u8, pc: u16, sp: u8, p: u8 },
    Jsr { routine: u16, cycles: u64 },
    Rts { cycles: u64 },
    /// Total cycles, rounded down to the 100000 boundary just crossed.
    Cycles(u64),
    Screen { cycles: u64, bytes: Option<Vec<u8>> },
    Watch(WatchRecord),
    Error { pc: u16, message: String },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TraceEvent::Log { old_pc, a, x, y, pc, sp, p } => {
                write!(f, "log {:04x} {:02x} {:02x} {:02x} {:04x} {:02x} {:02x}", old_pc, a, x, y, pc, sp, p)
            },
            TraceEvent::Jsr { routine, cycles } => write!(f, "jsr 0x{:04x} {}", routine, cycles),
            TraceEvent::Rts { cycles } => write!(f, "rts {}", cycles),
            TraceEvent::Cycles(cycles) => write!(f, "cycles {}", cycles),
            TraceEvent::Screen { cycles, ref bytes } => {
                write!(f, "screen {}", cycles)?;
                if let Some(ref bytes) = *bytes {
                    for byte in bytes {
                        write!(f, " {}", byte)?;
                    }
                }
                Ok(())
            },
            TraceEvent::Watch(ref record) => write!(f, "{}", record),
            TraceEvent::Error { pc, ref message } => write!(f, "error {:04x} {}", pc, message),
        }
    }
}

/// Receives the events produced while the emulator runs.
pub trait EventSink {
    fn emit(&mut self, event: TraceEvent) -> Result<()>;

    /// Whether `log` events are wanted. Building them for every instruction
    /// is skipped otherwise.
    fn wants_log(&self) -> bool {
        true
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes events as text lines. Watch, screen and error lines are flushed
/// right away so a reader on the other end of a pipe sees them immediately.
pub struct TraceWriter<W: Write> {
    out: W,
    show_log: bool,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W, show_log: bool) -> TraceWriter<W> {
        TraceWriter {
            out: out,
            show_log: show_log,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for TraceWriter<W> {
    fn emit(&mut self, event: TraceEvent) -> Result<()> {
        if let TraceEvent::Log { .. } = event {
            if !self.show_log {
                return Ok(());
            }
        }

        writeln!(self.out, "{}", event)?;
        match event {
            TraceEvent::Watch(_) | TraceEvent::Screen { .. } | TraceEvent::Error { .. } => self.out.flush()?,
            _ => {},
        }
        Ok(())
    }

    fn wants_log(&self) -> bool {
        self.show_log
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Drops every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _: TraceEvent) -> Result<()> {
        Ok(())
    }

    fn wants_log(&self) -> bool {
        false
    }
}

impl EventSink for Vec<TraceEvent> {
    fn emit(&mut self, event: TraceEvent) -> Result<()> {
        self.push(event);
        Ok(())
    }
}
