// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use display::Frontend;
use emu::cpu::CPU;
use emu::instruction::Instruction;
use emu::memory::Memory;
use emu::opcode::OpcodeTable;
use emu::screen::{self, Frame, Screen};
use emu::tracer::{CallEvent, CallTracer, RoutineProfile};
use emu::variables::VariableLog;
use emu::watch::{Phase, WatchTable};
use io::errors::Result;
use io::log;
use io::trace::{EventSink, TraceEvent};
use std::io::Write;

/// Address execution starts at unless told otherwise.
pub const DEFAULT_START_PC: u16 = 0x6000;

// A `cycles` event is emitted each time the total crosses a multiple of this.
const HEARTBEAT_CYCLES: u64 = 100000;

/// Settings chosen on the command line.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub start_pc: u16,

    // Address marking the start of a frame. Arrivals there are counted.
    pub start_frame: Option<u16>,

    // Stop after this many complete frames. 0 runs forever.
    pub max_frames: u64,

    pub load_offset: u16,
    pub show_log: bool,
    pub show_screen: bool,
    pub verbose: bool,
}

impl Default for RuntimeOptions {
    fn default() -> RuntimeOptions {
        RuntimeOptions {
            start_pc: DEFAULT_START_PC,
            start_frame: None,
            max_frames: 0,
            load_offset: 0,
            show_log: true,
            show_screen: false,
            verbose: false,
        }
    }
}

/// What happened during a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    ScreenChanged,
    FrameLimit,
}

/// Why a run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FrameLimit,
    Quit,
}

/// Everything a run needs: registers, memory, the profiler and the observers
/// hooked into the instruction loop.
pub struct Emulator {
    pub cpu: CPU,
    pub memory: Memory,
    pub tracer: CallTracer,
    table: OpcodeTable,
    watches: WatchTable,
    variables: Option<VariableLog<Box<dyn Write>>>,
    screen: Screen,
    options: RuntimeOptions,

    // Frame accounting. Timing starts with the first arrival at the frame
    // start address.
    frames: u64,
    frame_cycles: u64,
    last_frame_cycle: u64,

    heartbeat: Option<u64>,
}

impl Emulator {
    pub fn new(options: RuntimeOptions) -> Emulator {
        Emulator {
            cpu: CPU::new(options.start_pc),
            memory: Memory::new(),
            tracer: CallTracer::new(),
            table: OpcodeTable::new(),
            watches: WatchTable::new(),
            variables: None,
            screen: Screen::new(),
            options: options,
            frames: 0,
            frame_cycles: 0,
            last_frame_cycle: 0,
            heartbeat: None,
        }
    }

    /// Copies a memory image to the configured load offset. Returns the
    /// number of bytes that fit.
    pub fn load(&mut self, image: &[u8]) -> usize {
        let offset = self.options.load_offset;
        self.memory.load(offset, image)
    }

    pub fn set_watches(&mut self, watches: WatchTable) {
        self.watches = watches;
    }

    /// Starts logging writes to memory variables.
    pub fn set_variable_log(&mut self, variables: VariableLog<Box<dyn Write>>) {
        self.memory.track_writes(true);
        self.variables = Some(variables);
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Complete frames seen so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Average cycles per complete frame, 0 before the first one finished.
    pub fn cycles_per_frame(&self) -> u64 {
        if self.frames == 0 { 0 } else { self.frame_cycles / self.frames }
    }

    pub fn report(&self) -> Vec<RoutineProfile> {
        self.tracer.report(self.cpu.total_cycles)
    }

    /// Runs until an error, a quit request from the front end, or the frame
    /// limit. Fatal errors are reported on the trace stream before being
    /// returned.
    pub fn run(&mut self, sink: &mut dyn EventSink, frontend: &mut dyn Frontend) -> Result<StopReason> {
        let result = self.run_loop(sink, frontend);

        if let Err(ref err) = result {
            if let Some(pc) = err.pc() {
                sink.emit(TraceEvent::Error { pc: pc, message: err.message() })?;
            }
            log::log("emu", format!("Stopped: {}", err), &self.options);
        }

        sink.flush()?;
        if let Some(ref mut variables) = self.variables {
            variables.flush()?;
        }
        result
    }

    fn run_loop(&mut self, sink: &mut dyn EventSink, frontend: &mut dyn Frontend) -> Result<StopReason> {
        loop {
            if frontend.poll_quit()? {
                return Ok(StopReason::Quit);
            }

            match self.step(sink)? {
                Step::Continue => {},
                Step::ScreenChanged => frontend.present(&Frame::from_memory(&self.memory))?,
                Step::FrameLimit => return Ok(StopReason::FrameLimit),
            }
        }
    }

    /// Executes one instruction along with everything observing it.
    pub fn step(&mut self, sink: &mut dyn EventSink) -> Result<Step> {
        let old_pc = self.cpu.pc;
        self.fire_watches(old_pc, Phase::Pre, sink)?;

        let instr = Instruction::fetch(&mut self.cpu, &self.memory, &self.table)?;
        if self.options.verbose {
            log::log("cpu", self.describe(&instr), &self.options);
        }

        let next_pc = self.cpu.pc;
        let execution = instr.execute(&mut self.cpu, &mut self.memory, &mut self.tracer)?;
        match execution.call {
            Some(CallEvent::Enter { routine, cycles }) => {
                sink.emit(TraceEvent::Jsr { routine: routine, cycles: cycles })?;
            },
            Some(CallEvent::Leave { cycles }) => sink.emit(TraceEvent::Rts { cycles: cycles })?,
            None => {},
        }

        self.cpu.total_cycles += execution.cycles as u64;
        self.tracer.attribute(execution.cycles as u64);

        if sink.wants_log() {
            sink.emit(TraceEvent::Log {
                old_pc: old_pc,
                a: self.cpu.a,
                x: self.cpu.x,
                y: self.cpu.y,
                pc: self.cpu.pc,
                sp: self.cpu.sp,
                p: self.cpu.p,
            })?;
        }

        if let Some(ref mut variables) = self.variables {
            let writes = self.memory.take_writes();
            variables.record(next_pc, &writes, &self.memory)?;
        }

        self.fire_watches(old_pc, Phase::Post, sink)?;

        if self.options.start_frame == Some(self.cpu.pc) && self.count_frame() {
            return Ok(Step::FrameLimit);
        }

        let bucket = self.cpu.total_cycles / HEARTBEAT_CYCLES;
        if self.heartbeat != Some(bucket) {
            self.heartbeat = Some(bucket);
            sink.emit(TraceEvent::Cycles(bucket * HEARTBEAT_CYCLES))?;
        }

        if self.screen.changed(&self.memory) {
            let bytes = if self.options.show_screen { Some(screen::raw_bytes(&self.memory)) } else { None };
            sink.emit(TraceEvent::Screen { cycles: self.cpu.total_cycles, bytes: bytes })?;
            return Ok(Step::ScreenChanged);
        }

        Ok(Step::Continue)
    }

    fn fire_watches(&self, pc: u16, phase: Phase, sink: &mut dyn EventSink) -> Result<()> {
        if self.watches.is_empty() {
            return Ok(());
        }
        for record in self.watches.fire(pc, phase, &self.cpu, &self.memory, &self.tracer) {
            sink.emit(TraceEvent::Watch(record))?;
        }
        Ok(())
    }

    /// Accounts for an arrival at the frame start. Returns true once the
    /// frame limit is reached.
    fn count_frame(&mut self) -> bool {
        let total = self.cpu.total_cycles;
        let mut limit_reached = false;
        if self.last_frame_cycle > 0 {
            self.frame_cycles += total - self.last_frame_cycle;
            self.frames += 1;
            limit_reached = self.options.max_frames > 0 && self.frames >= self.options.max_frames;
        }
        self.last_frame_cycle = total;
        limit_reached
    }

    /// Disassembly line for the verbose log, printed before the instruction
    /// executes.
    fn describe(&self, instr: &Instruction) -> String {
        let bytes: Vec<String> = instr.raw[..instr.len() as usize].iter()
            .map(|byte| format!("{:02X}", byte))
            .collect();
        format!("{:04X}  {:<8}  {:<14} {:<18} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
                instr.addr, bytes.join(" "), instr.disassemble(), instr.mode.name(),
                self.cpu.a, self.cpu.x, self.cpu.y, self.cpu.p, self.cpu.sp, self.cpu.total_cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use display::Headless;
    use emu::variables::{VariableLog, VariableTable};
    use emu::watch::WatchTable;
    use io::errors::EmulatorError;
    use io::trace::NullSink;
    use std::io::Cursor;

    fn emulator(start_pc: u16, program: &[u8]) -> Emulator {
        let options = RuntimeOptions { start_pc: start_pc, load_offset: start_pc, ..RuntimeOptions::default() };
        let mut emu = Emulator::new(options);
        emu.load(program);
        emu
    }

    #[test]
    fn emits_log_and_heartbeat() {
        let mut emu = emulator(0x6000, &[0xA9, 0x05, 0xEA]);
        let mut events: Vec<TraceEvent> = Vec::new();
        assert_eq!(emu.step(&mut events).unwrap(), Step::Continue);
        assert_eq!(emu.step(&mut events).unwrap(), Step::Continue);
        assert_eq!(events, vec![
            TraceEvent::Log { old_pc: 0x6000, a: 5, x: 0, y: 0, pc: 0x6002, sp: 0xFF, p: 0x20 },
            TraceEvent::Cycles(0),
            TraceEvent::Log { old_pc: 0x6002, a: 5, x: 0, y: 0, pc: 0x6003, sp: 0xFF, p: 0x20 },
        ]);
    }

    #[test]
    fn heartbeat_on_each_boundary() {
        // JMP $6000 forever, 3 cycles each.
        let mut emu = emulator(0x6000, &[0x4C, 0x00, 0x60]);
        let mut events: Vec<TraceEvent> = Vec::new();
        while emu.cpu.total_cycles < 200001 {
            emu.step(&mut events).unwrap();
        }
        let beats: Vec<u64> = events.iter().filter_map(|event| match *event {
            TraceEvent::Cycles(n) => Some(n),
            _ => None,
        }).collect();
        assert_eq!(beats, vec![0, 100000, 200000]);
    }

    #[test]
    fn call_events_precede_log_line() {
        let mut emu = emulator(0x6000, &[0x20, 0x10, 0x60]);
        emu.memory.load(0x6010, &[0x60]);
        let mut events: Vec<TraceEvent> = Vec::new();
        emu.step(&mut events).unwrap();
        emu.step(&mut events).unwrap();
        assert_eq!(events[0], TraceEvent::Jsr { routine: 0x6010, cycles: 0 });
        assert!(match events[1] { TraceEvent::Log { .. } => true, _ => false });
        assert_eq!(events[3], TraceEvent::Rts { cycles: 6 });
        assert_eq!(emu.cpu.pc, 0x6003);
        assert_eq!(emu.report().len(), 1);
        assert_eq!(emu.report()[0].cycles, 6);
    }

    #[test]
    fn frame_accounting_and_limit() {
        // $6000: NOP; NOP; JMP $6000
        let options = RuntimeOptions {
            start_pc: 0x6000,
            load_offset: 0x6000,
            start_frame: Some(0x6000),
            max_frames: 2,
            show_log: false,
            ..RuntimeOptions::default()
        };
        let mut emu = Emulator::new(options);
        emu.load(&[0xEA, 0xEA, 0x4C, 0x00, 0x60]);

        let stop = emu.run(&mut NullSink, &mut Headless).unwrap();
        assert_eq!(stop, StopReason::FrameLimit);
        assert_eq!(emu.frames(), 2);
        assert_eq!(emu.cycles_per_frame(), 7);
        assert_eq!(emu.cpu.total_cycles, 21);
    }

    #[test]
    fn screen_switch_is_reported() {
        // LDA #$01; STA $030B
        let mut emu = emulator(0x6000, &[0xA9, 0x01, 0x8D, 0x0B, 0x03]);
        let mut events: Vec<TraceEvent> = Vec::new();
        assert_eq!(emu.step(&mut NullSink).unwrap(), Step::Continue);
        assert_eq!(emu.step(&mut events).unwrap(), Step::ScreenChanged);
        assert_eq!(events.last(), Some(&TraceEvent::Screen { cycles: 6, bytes: None }));
    }

    #[test]
    fn screen_bytes_when_requested() {
        let options = RuntimeOptions { show_screen: true, ..RuntimeOptions::default() };
        let mut emu = Emulator::new(options);
        emu.memory.load(0x6000, &[0x8D, 0x0B, 0x03]);
        emu.memory.write_u8(0x4000, 0x7F);
        emu.cpu.a = 2;
        let mut events: Vec<TraceEvent> = Vec::new();
        emu.step(&mut events).unwrap();
        match events.last() {
            Some(&TraceEvent::Screen { bytes: Some(ref bytes), .. }) => {
                assert_eq!(bytes.len(), 192 * 40);
                assert_eq!(bytes[0], 0x7F);
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn errors_end_up_on_the_trace() {
        let mut emu = emulator(0x0000, &[0xA9, 0x05, 0x00]);
        let mut events: Vec<TraceEvent> = Vec::new();
        match emu.run(&mut events, &mut Headless) {
            Err(EmulatorError::UnimplementedOpcode { pc: 2, .. }) => {},
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(events.last(), Some(&TraceEvent::Error {
            pc: 2,
            message: String::from("Opcode BRK not implemented yet."),
        }));
    }

    #[test]
    fn post_watch_sees_result() {
        let mut emu = emulator(0x1000, &[0xA9, 0x2A]);
        emu.set_watches(WatchTable::parse(Cursor::new("2\n0,0x1000,0,u8,reg,A\n1,0x1000,1,u8,reg,A\n")).unwrap());
        emu.cpu.a = 7;
        let mut events: Vec<TraceEvent> = Vec::new();
        emu.step(&mut events).unwrap();
        let lines: Vec<String> = events.iter()
            .filter(|event| match **event { TraceEvent::Watch(_) => true, _ => false })
            .map(|event| event.to_string())
            .collect();
        assert_eq!(lines, vec!["watch 0x0000 0 0 7", "watch 0x0000 1 2 42"]);
    }

    #[test]
    fn variable_writes_are_logged() {
        // LDA #$FF; STA $8E; STA $10
        let mut emu = emulator(0x6000, &[0xA9, 0xFF, 0x85, 0x8E, 0x85, 0x10]);
        let table = VariableTable::parse(Cursor::new("RX,0x008d,s16\n")).unwrap();
        let out: Box<dyn Write> = Box::new(Vec::new());
        emu.set_variable_log(VariableLog::new(table, out));
        for _ in 0..3 {
            emu.step(&mut NullSink).unwrap();
        }
        assert_eq!(emu.memory.read_u16(0x8D), 0xFF00);
    }
}
