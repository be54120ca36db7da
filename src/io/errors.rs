// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use emu::opcode::Mnemonic;
use std::result;
use thiserror::Error;

// Exit codes used throughout the application. These exit codes has specific
// meanings and are used when no OS error codes are available.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1; // Generic error ¯\_(ツ)_/¯.
pub const EXIT_INVALID_IMAGE: i32 = 2; // Memory image could not be read.
pub const EXIT_INVALID_WATCHES: i32 = 3; // Watch or variable table rejected.
pub const EXIT_RUNTIME_FAILURE: i32 = 101;

pub type Result<T> = result::Result<T, EmulatorError>;

/// Everything that can stop the emulator. None of these are recoverable: a
/// trace that continued past any of them could not be trusted.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("Unhandled opcode at {pc:04x}: {opcode:02x}")]
    Decode { pc: u16, opcode: u8 },

    #[error("Opcode {mnemonic} not implemented yet at PC 0x{pc:04x}.")]
    UnimplementedOpcode { pc: u16, mnemonic: Mnemonic },

    #[error("Stack overflow at {pc:04x}")]
    StackOverflow { pc: u16 },

    #[error("Stack underrun at {pc:04x}")]
    StackUnderrun { pc: u16 },

    #[error("{0}")]
    Io(#[from] ::std::io::Error),

    #[error("watch table line {line}: {reason}")]
    WatchConfig { line: usize, reason: String },

    #[error("variable table line {line}: {reason}")]
    VariableConfig { line: usize, reason: String },

    #[error("Watch output file exists: {0}")]
    WatchFileExists(String),

    #[error("display error: {0}")]
    Display(String),
}

impl EmulatorError {
    /// Address of the instruction that failed, if the error came from the
    /// running program rather than from the host.
    pub fn pc(&self) -> Option<u16> {
        match *self {
            EmulatorError::Decode { pc, .. } |
            EmulatorError::UnimplementedOpcode { pc, .. } |
            EmulatorError::StackOverflow { pc } |
            EmulatorError::StackUnderrun { pc } => Some(pc),
            _ => None,
        }
    }

    /// The message carried by an `error` line of the trace stream.
    pub fn message(&self) -> String {
        match *self {
            EmulatorError::Decode { opcode, .. } => format!("Unhandled opcode: {:02x}", opcode),
            EmulatorError::UnimplementedOpcode { mnemonic, .. } => {
                format!("Opcode {} not implemented yet.", mnemonic)
            },
            EmulatorError::StackOverflow { .. } => String::from("Stack overflow"),
            EmulatorError::StackUnderrun { .. } => String::from("Stack underrun"),
            ref other => other.to_string(),
        }
    }
}
