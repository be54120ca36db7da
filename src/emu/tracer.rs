// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use emu::memory::MEMORY_SIZE;
use std::fmt;

/// Maximum number of outstanding calls the shadow stack remembers.
pub const SHADOW_STACK_DEPTH: usize = 256;

/// One outstanding call: the routine that was entered and the stack pointer
/// as it was right before the return address got pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub routine: u16,
    pub sp: u8,
}

/// Call or return observed while executing an instruction. `cycles` is the
/// total cycle count before the instruction's own cost is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Enter { routine: u16, cycles: u64 },
    Leave { cycles: u64 },
}

/// Shadow call stack and per-routine counters.
///
/// Programs are free to fiddle with the real stack (dropping a return address
/// to exit two levels at once, pushing a fake one to jump through RTS). The
/// tracer therefore only pairs a return with a call when the stack pointer at
/// the return is back to exactly where it was at the call. A return that does
/// not match leaves the shadow stack alone. The attribution is best effort
/// and says nothing about what the hardware does.
pub struct CallTracer {
    // Outermost call first.
    frames: Vec<Frame>,

    // Cycles spent while a routine was the innermost outstanding call.
    cycles: Vec<u64>,

    // Number of times a routine was entered with JSR.
    calls: Vec<u64>,
}

impl CallTracer {
    pub fn new() -> CallTracer {
        CallTracer {
            frames: Vec::with_capacity(SHADOW_STACK_DEPTH),
            cycles: vec![0; MEMORY_SIZE],
            calls: vec![0; MEMORY_SIZE],
        }
    }

    /// Records a call to `routine` made with the stack pointer at `sp`. When
    /// unmatched calls have filled the shadow stack the oldest one is
    /// forgotten.
    pub fn enter(&mut self, routine: u16, sp: u8) {
        if self.frames.len() == SHADOW_STACK_DEPTH {
            self.frames.remove(0);
        }
        self.frames.push(Frame { routine: routine, sp: sp });
        self.calls[routine as usize] += 1;
    }

    /// Handles a return executed with the stack pointer at `sp` (before the
    /// return address is pulled). Returns true if it closed the innermost call.
    pub fn leave(&mut self, sp: u8) -> bool {
        let matched = match self.frames.last() {
            Some(frame) => frame.sp as u16 == sp as u16 + 2,
            None => false,
        };
        if matched {
            self.frames.pop();
        }
        matched
    }

    /// Charges cycles to the innermost outstanding call. Cycles spent outside
    /// of every tracked call are not attributed to anything.
    pub fn attribute(&mut self, cycles: u64) {
        if let Some(frame) = self.frames.last() {
            self.cycles[frame.routine as usize] += cycles;
        }
    }

    /// The routine currently executing, if any call is outstanding.
    pub fn innermost(&self) -> Option<u16> {
        self.frames.last().map(|frame| frame.routine)
    }

    /// Finds the routine whose frame belongs to the stack pointer `sp`,
    /// searching from the innermost call outwards.
    pub fn routine_for_sp(&self, sp: u8) -> Option<u16> {
        self.frames.iter().rev()
            .find(|frame| frame.sp as u16 == sp as u16 + 2)
            .map(|frame| frame.routine)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn cycles_for(&self, routine: u16) -> u64 {
        self.cycles[routine as usize]
    }

    pub fn calls_for(&self, routine: u16) -> u64 {
        self.calls[routine as usize]
    }

    /// Builds the profiling table: every routine that accumulated cycles, by
    /// ascending address.
    pub fn report(&self, total_cycles: u64) -> Vec<RoutineProfile> {
        self.cycles.iter().enumerate()
            .filter(|&(_, &cycles)| cycles > 0)
            .map(|(addr, &cycles)| RoutineProfile {
                addr: addr as u16,
                cycles: cycles,
                calls: self.calls[addr],
                total_cycles: total_cycles,
            })
            .collect()
    }
}

impl Default for CallTracer {
    fn default() -> CallTracer {
        CallTracer::new()
    }
}

/// One line of the profiling report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutineProfile {
    pub addr: u16,
    pub cycles: u64,
    pub calls: u64,
    pub total_cycles: u64,
}

impl RoutineProfile {
    /// Share of all executed cycles, in percent.
    pub fn share(&self) -> f64 {
        if self.total_cycles == 0 {
            0.0
        } else {
            self.cycles as f64 * 100.0 / self.total_cycles as f64
        }
    }

    pub fn cycles_per_call(&self) -> u64 {
        if self.calls == 0 { 0 } else { self.cycles / self.calls }
    }

    /// Column headings matching the `Display` output.
    pub fn header() -> String {
        format!("{:>12} {:>6} {:>8} {:>8} {:>4}", "Total CC", "% CC", "Calls", "CC/Call", "Addr")
    }
}

impl fmt::Display for RoutineProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:>12} {:>5.2}% {:>8} {:>8} {:04x}",
               self.cycles, self.share(), self.calls, self.cycles_per_call(), self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_calls() {
        let mut tracer = CallTracer::new();
        tracer.enter(0x6100, 0xFF);
        tracer.enter(0x6200, 0xFD);
        assert_eq!(tracer.innermost(), Some(0x6200));
        assert!(tracer.leave(0xFB));
        assert_eq!(tracer.innermost(), Some(0x6100));
        assert!(tracer.leave(0xFD));
        assert_eq!(tracer.depth(), 0);
        assert_eq!(tracer.calls_for(0x6100), 1);
        assert_eq!(tracer.calls_for(0x6200), 1);
    }

    #[test]
    fn unbalanced_return_keeps_frame() {
        let mut tracer = CallTracer::new();
        tracer.enter(0x6100, 0xFF);
        // The routine pulled its own return address and returns one level up.
        assert!(!tracer.leave(0xFF));
        assert_eq!(tracer.innermost(), Some(0x6100));
        assert!(!CallTracer::new().leave(0xFD));
    }

    #[test]
    fn return_with_stack_pointer_near_top_never_matches() {
        let mut tracer = CallTracer::new();
        tracer.enter(0x6100, 0x00);
        assert!(!tracer.leave(0xFE));
        assert_eq!(tracer.depth(), 1);
    }

    #[test]
    fn attribution_goes_to_innermost() {
        let mut tracer = CallTracer::new();
        tracer.attribute(10);
        tracer.enter(0x6100, 0xFF);
        tracer.attribute(6);
        tracer.enter(0x6200, 0xFD);
        tracer.attribute(4);
        tracer.leave(0xFB);
        tracer.attribute(2);
        assert_eq!(tracer.cycles_for(0x6100), 8);
        assert_eq!(tracer.cycles_for(0x6200), 4);

        let report = tracer.report(20);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].addr, 0x6100);
        assert_eq!(report[1].cycles_per_call(), 4);
        assert!((report[0].share() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn full_shadow_stack_forgets_oldest() {
        let mut tracer = CallTracer::new();
        for i in 0..SHADOW_STACK_DEPTH + 1 {
            tracer.enter(i as u16, 0xFF);
        }
        assert_eq!(tracer.depth(), SHADOW_STACK_DEPTH);
        assert_eq!(tracer.frames()[0].routine, 1);
        assert_eq!(tracer.innermost(), Some(SHADOW_STACK_DEPTH as u16));
    }

    #[test]
    fn routine_lookup_by_stack_pointer() {
        let mut tracer = CallTracer::new();
        tracer.enter(0x6100, 0xFF);
        tracer.enter(0x6200, 0xFD);
        assert_eq!(tracer.routine_for_sp(0xFB), Some(0x6200));
        assert_eq!(tracer.routine_for_sp(0xFD), Some(0x6100));
        assert_eq!(tracer.routine_for_sp(0xF0), None);
    }

    #[test]
    fn report_line() {
        let line = RoutineProfile { addr: 0x6100, cycles: 500, calls: 4, total_cycles: 1000 };
        assert_eq!(format!("{}", line), "         500 50.00%        4      125 6100");
    }
}
