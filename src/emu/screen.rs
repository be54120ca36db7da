// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The hi-res framebuffer as the profiled programs draw it: two 8kB banks of
//! 192 interleaved scan lines, 40 bytes each, 7 pixels per byte.

use emu::memory::Memory;

pub const SCREEN_WIDTH: usize = 280;
pub const SCREEN_HEIGHT: usize = 192;
pub const BYTES_PER_LINE: usize = 40;

/// The byte the program flips to show the other bank.
pub const SCREEN_SELECT_ADDR: u16 = 0x30B;

const BANK_1: u16 = 0x2000;
const BANK_2: u16 = 0x4000;

/// Offset of scan line `y` inside a bank.
#[inline(always)]
pub fn line_offset(y: usize) -> u16 {
    let y = y as u16;
    ((y & 7) << 10) | (((y >> 3) & 7) << 7) | (y >> 6) * 0x28
}

/// Bank shown for a value of the select byte. Only 1 selects the first bank.
#[inline(always)]
pub fn bank(select: u8) -> u16 {
    if select == 1 { BANK_1 } else { BANK_2 }
}

/// Bytes of the visible bank in scan-line order.
pub fn raw_bytes(memory: &Memory) -> Vec<u8> {
    let base = bank(memory.read_u8(SCREEN_SELECT_ADDR));
    let mut bytes = Vec::with_capacity(SCREEN_HEIGHT * BYTES_PER_LINE);
    for y in 0..SCREEN_HEIGHT {
        let line = base | line_offset(y);
        for x in 0..BYTES_PER_LINE {
            bytes.push(memory.read_u8(line + x as u16));
        }
    }
    bytes
}

/// One bit per pixel picture of the visible bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<bool>,
}

impl Frame {
    pub fn from_memory(memory: &Memory) -> Frame {
        let mut pixels = Vec::with_capacity(SCREEN_WIDTH * SCREEN_HEIGHT);
        for line in raw_bytes(memory).chunks(BYTES_PER_LINE) {
            for byte in line {
                // Bit 7 selects a color palette on the real machine.
                for bit in 0..7 {
                    pixels.push((byte >> bit) & 1 == 1);
                }
            }
        }
        Frame { pixels: pixels }
    }

    #[inline(always)]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[y * SCREEN_WIDTH + x]
    }
}

/// Notices changes of the select byte between instructions.
pub struct Screen {
    select: u8,
}

impl Screen {
    pub fn new() -> Screen {
        Screen { select: 0 }
    }

    /// True if the select byte differs from the last time it was checked.
    pub fn changed(&mut self, memory: &Memory) -> bool {
        let select = memory.read_u8(SCREEN_SELECT_ADDR);
        if select == self.select {
            return false;
        }
        self.select = select;
        true
    }
}

impl Default for Screen {
    fn default() -> Screen {
        Screen::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_line_layout() {
        assert_eq!(line_offset(0), 0x0000);
        assert_eq!(line_offset(1), 0x0400);
        assert_eq!(line_offset(8), 0x0080);
        assert_eq!(line_offset(63), 0x1F80);
        assert_eq!(line_offset(64), 0x0028);
        assert_eq!(line_offset(191), 0x1FD0);
    }

    #[test]
    fn every_line_is_distinct() {
        let mut offsets: Vec<u16> = (0..SCREEN_HEIGHT).map(line_offset).collect();
        offsets.sort();
        offsets.dedup();
        assert_eq!(offsets.len(), SCREEN_HEIGHT);
        assert!(offsets.iter().all(|&o| o as usize + BYTES_PER_LINE <= 0x2000));
    }

    #[test]
    fn select_byte_picks_bank() {
        assert_eq!(bank(1), 0x2000);
        assert_eq!(bank(0), 0x4000);
        assert_eq!(bank(2), 0x4000);
    }

    #[test]
    fn frame_pixels() {
        let mut memory = Memory::new();
        memory.write_u8(SCREEN_SELECT_ADDR, 1);
        memory.write_u8(0x2000 + line_offset(1) + 2, 0x81);
        let frame = Frame::from_memory(&memory);
        assert!(frame.pixel(14, 1));
        assert!(!frame.pixel(15, 1));
        assert!(!frame.pixel(20, 1));
        let lit = (0..SCREEN_HEIGHT)
            .flat_map(|y| (0..SCREEN_WIDTH).map(move |x| (x, y)))
            .filter(|&(x, y)| frame.pixel(x, y))
            .count();
        assert_eq!(lit, 1);

        let bytes = raw_bytes(&memory);
        assert_eq!(bytes.len(), 192 * 40);
        assert_eq!(bytes[40 + 2], 0x81);
    }

    #[test]
    fn change_detection() {
        let mut memory = Memory::new();
        let mut screen = Screen::new();
        assert!(!screen.changed(&memory));
        memory.write_u8(SCREEN_SELECT_ADDR, 1);
        assert!(screen.changed(&memory));
        assert!(!screen.changed(&memory));
        memory.write_u8(SCREEN_SELECT_ADDR, 2);
        assert!(screen.changed(&memory));
    }
}
