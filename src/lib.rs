// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Instruction-level 65C02 emulator that runs memory dumps of 8-bit programs
//! and profiles where their cycles go.

extern crate byteorder;
extern crate chrono;
#[macro_use]
extern crate enum_primitive;
extern crate thiserror;

#[cfg(feature = "display")]
extern crate sdl2;

pub mod display;
pub mod emu;
pub mod io;
pub mod utils;
