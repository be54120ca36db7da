// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// Returns the 4kB window index (the high nibble) of the given address.
///
/// The profiler charges its indexing and branch penalties per 4kB window
/// rather than per 256 byte page. Profiles recorded with the reference tool
/// depend on this, so the coarse granularity is kept.
#[inline(always)]
pub fn window(addr: u32) -> u32 {
    addr >> 12
}

/// Determine if an indexed address computation leaves the window of its base
/// address. The sum is not wrapped, so indexing past 0xFFFF counts as a cross.
#[inline(always)]
pub fn index_crosses_window(base: u16, index: u16) -> bool {
    window(base as u32) != window(base as u32 + index as u32)
}

/// Determine if a branch from `from` to `to` lands in a different window.
#[inline(always)]
pub fn branch_crosses_window(from: u16, to: u16) -> bool {
    window(from as u32) != window(to as u32)
}
