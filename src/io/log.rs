// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use chrono::{DateTime, Local};
use emu::emulator::RuntimeOptions;

/// Logs a message to stderr with a given prefix if the emulator was started
/// with the verbose flag set. Stdout belongs to the trace stream and the
/// profiling report, so diagnostics never go there.
pub fn log<P, T>(prefix: P, text: T, runtime_options: &RuntimeOptions) where P: Into<String>, T: Into<String> {
    if runtime_options.verbose {
        let local: DateTime<Local> = Local::now();
        eprintln!("[{}] -- [{}] {}", local, prefix.into(), text.into());
    }
}

/// Prints a notice the user always gets to see, regardless of verbosity.
pub fn notice<T>(text: T) where T: Into<String> {
    eprintln!("{}", text.into());
}
