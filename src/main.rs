// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

extern crate champ;
extern crate getopts;

use champ::display::{Frontend, Headless};
use champ::emu::emulator::{Emulator, RuntimeOptions, DEFAULT_START_PC};
use champ::emu::tracer::RoutineProfile;
use champ::emu::variables::{VariableLog, VariableTable};
use champ::emu::watch::WatchTable;
use champ::io::binutils;
use champ::io::errors::*;
use champ::io::log;
use champ::io::trace::{EventSink, NullSink, TraceWriter};
use getopts::{Matches, Options};
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

/// Prints usage information to stderr.
fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options] <memory dump>", program);
    eprint!("{}", opts.usage(&brief));
}

/// Reads an optional address flag.
fn address(matches: &Matches, name: &str) -> std::result::Result<Option<u16>, String> {
    match matches.opt_str(name) {
        Some(text) => match binutils::parse_number(&text) {
            Some(value) if value <= 0xFFFF => Ok(Some(value as u16)),
            _ => Err(format!("invalid address for --{}: {}", name, text)),
        },
        None => Ok(None),
    }
}

/// Builds the runtime options out of the parsed command-line flags.
fn runtime_options(matches: &Matches) -> std::result::Result<RuntimeOptions, String> {
    let max_frames = match matches.opt_str("max-frames") {
        Some(text) => binutils::parse_number(&text)
            .ok_or_else(|| format!("invalid frame count: {}", text))?,
        None => 0,
    };

    Ok(RuntimeOptions {
        start_pc: address(matches, "start-pc")?.unwrap_or(DEFAULT_START_PC),
        start_frame: address(matches, "start-frame")?,
        max_frames: max_frames,
        load_offset: address(matches, "load-offset")?.unwrap_or(0),
        show_log: !matches.opt_present("hide-log"),
        show_screen: matches.opt_present("headless") && !matches.opt_present("no-screen"),
        verbose: matches.opt_present("v"),
    })
}

/// Reads the watch table from a file, or from stdin when the path is `-`.
fn load_watches(path: &str) -> Result<WatchTable> {
    if path == "-" {
        let stdin = io::stdin();
        let table = WatchTable::parse(stdin.lock());
        table
    } else {
        WatchTable::parse(BufReader::new(File::open(path)?))
    }
}

/// Opens the display window when one was compiled in.
#[cfg(feature = "display")]
fn frontend(headless: bool) -> Result<Box<dyn Frontend>> {
    if headless {
        return Ok(Box::new(Headless));
    }
    let display = champ::display::sdl::SdlDisplay::new("champ")?;
    Ok(Box::new(display))
}

#[cfg(not(feature = "display"))]
fn frontend(_: bool) -> Result<Box<dyn Frontend>> {
    Ok(Box::new(Headless))
}

/// Prints the profiling table, one line per routine that used any cycles.
fn print_report(profile: &[RoutineProfile]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", RoutineProfile::header())?;
    for line in profile {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

/// Declares the command-line flags.
fn command_line() -> Options {
    let mut opts = Options::new();
    opts.optopt("", "start-pc", "address execution starts at (default 0x6000)", "ADDR");
    opts.optopt("", "start-frame", "address marking the start of each frame", "ADDR");
    opts.optopt("", "max-frames", "stop after this many frames", "N");
    opts.optopt("", "load-offset", "address the memory dump is loaded to (default 0)", "ADDR");
    opts.optflag("", "hide-log", "leave per-instruction log lines out of the trace");
    opts.optflag("", "no-screen", "leave the screen contents out of headless screen events");
    opts.optflag("", "headless", "stream trace events to stdout instead of profiling");
    opts.optopt("", "watch-config", "watch table to read, - for stdin", "PATH");
    opts.optopt("", "variables", "table of memory variables to log writes of", "PATH");
    opts.optopt("", "watches", "file variable writes are logged to (must not exist)", "PATH");
    opts.optflag("v", "verbose", "log every instruction to stderr");
    opts.optflag("h", "help", "print this help menu");
    opts
}

/// Initializes and starts the emulator. Returns an exit code after which the
/// program unwinds and stops executing.
fn init() -> i32 {
    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| String::from("champ"));

    let opts = command_line();
    let matches = match opts.parse(args.iter().skip(1)) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("champ: {}", err);
            print_usage(&program, &opts);
            return EXIT_FAILURE;
        },
    };

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return EXIT_SUCCESS;
    }

    let image_path = match matches.free.last() {
        Some(path) => path.clone(),
        None => {
            print_usage(&program, &opts);
            return EXIT_FAILURE;
        },
    };

    let options = match runtime_options(&matches) {
        Ok(options) => options,
        Err(reason) => {
            eprintln!("champ: {}", reason);
            return EXIT_FAILURE;
        },
    };
    let headless = matches.opt_present("headless");

    log::notice(format!("Using start PC: 0x{:04x}", options.start_pc));
    if let Some(start_frame) = options.start_frame {
        log::notice(format!("Using frame start: 0x{:04x}", start_frame));
    }
    if options.max_frames > 0 {
        log::notice(format!("Max frames: {}", options.max_frames));
    }

    let image = match binutils::read_bin(&image_path) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("champ: cannot read {}: {}", image_path, err);
            return EXIT_INVALID_IMAGE;
        },
    };

    let mut emulator = Emulator::new(options.clone());
    let loaded = emulator.load(&image);
    log::notice(format!("Read 0x{:04x} bytes from {}, saved to 0x{:04x}.", loaded, image_path, options.load_offset));

    if let Some(path) = matches.opt_str("watch-config") {
        match load_watches(&path) {
            Ok(watches) => {
                log::log("main", format!("Loaded {} watches", watches.len()), &options);
                emulator.set_watches(watches);
            },
            Err(err) => {
                eprintln!("champ: {}", err);
                return EXIT_INVALID_WATCHES;
            },
        }
    }

    match (matches.opt_str("variables"), matches.opt_str("watches")) {
        (Some(table_path), Some(out_path)) => {
            let table = match File::open(&table_path).map_err(EmulatorError::from)
                .and_then(|file| VariableTable::parse(BufReader::new(file))) {
                Ok(table) => table,
                Err(err) => {
                    eprintln!("champ: {}", err);
                    return EXIT_INVALID_WATCHES;
                },
            };
            match VariableLog::create(&out_path, table) {
                Ok(variables) => {
                    log::notice(format!("Writing watches to {}.", out_path));
                    emulator.set_variable_log(variables);
                },
                Err(EmulatorError::WatchFileExists(path)) => {
                    eprintln!("Watch output file exists: {}, exiting...", path);
                    return EXIT_FAILURE;
                },
                Err(err) => {
                    eprintln!("champ: {}", err);
                    return EXIT_FAILURE;
                },
            }
        },
        (None, None) => {},
        _ => {
            eprintln!("champ: --variables and --watches must be given together");
            return EXIT_FAILURE;
        },
    }

    let mut sink: Box<dyn EventSink> = if headless {
        Box::new(TraceWriter::new(BufWriter::new(io::stdout()), options.show_log))
    } else {
        Box::new(NullSink)
    };
    let mut frontend = match frontend(headless) {
        Ok(frontend) => frontend,
        Err(err) => {
            eprintln!("champ: {}", err);
            return EXIT_FAILURE;
        },
    };

    match emulator.run(&mut *sink, &mut *frontend) {
        Ok(reason) => log::log("main", format!("Stopped: {:?}", reason), &options),
        Err(err) => {
            eprintln!("champ: {}", err);
            if err.pc().is_some() {
                eprint!("{}", emulator.cpu);
            }
            return EXIT_RUNTIME_FAILURE;
        },
    }

    log::notice(format!("Total cycles: {}", emulator.cpu.total_cycles));
    log::notice(format!("Cycles per frame: {}", emulator.cycles_per_frame()));

    if !headless {
        if let Err(err) = print_report(&emulator.report()) {
            eprintln!("champ: {}", err);
            return EXIT_FAILURE;
        }
    }

    EXIT_SUCCESS
}

/// Entry point of the program and wrapper of init. Takes the exit code returned
/// from init and exits with it.
fn main() {
    let exit_code = init();
    std::process::exit(exit_code); // Unwinding done, safe to exit.
}
