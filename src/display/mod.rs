// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use emu::screen::Frame;
use io::errors::Result;

#[cfg(feature = "display")]
pub mod sdl;

/// Whatever shows the screen to a user. It is polled between instructions,
/// so polling must never block.
pub trait Frontend {
    /// True once the user asked to quit.
    fn poll_quit(&mut self) -> Result<bool>;

    /// Called whenever the program switched screen banks.
    fn present(&mut self, frame: &Frame) -> Result<()>;
}

/// No window at all. Runs until the program stops by itself.
pub struct Headless;

impl Frontend for Headless {
    fn poll_quit(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn present(&mut self, _: &Frame) -> Result<()> {
        Ok(())
    }
}
