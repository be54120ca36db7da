// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use emu::memory::MEMORY_SIZE;
use io::errors::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads a memory image at a given path. At most a full address space worth
/// of bytes is read; anything past that could never be loaded anyway.
pub fn read_bin<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::new();
    let file = File::open(path)?;
    file.take(MEMORY_SIZE as u64).read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Parses an address or count given either as `0x` prefixed hex or as plain
/// decimal, the way addresses are written on the command-line.
pub fn parse_number(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.starts_with("0x") || text.starts_with("0X") {
        u64::from_str_radix(&text[2..], 16).ok()
    } else if text.starts_with('$') {
        u64::from_str_radix(&text[1..], 16).ok()
    } else {
        text.parse::<u64>().ok()
    }
}

/// Parses a 16-bit hex address, with or without a `0x` or `$` prefix.
pub fn parse_hex(text: &str) -> Option<u16> {
    let text = text.trim();
    let digits = if text.starts_with("0x") || text.starts_with("0X") {
        &text[2..]
    } else if text.starts_with('$') {
        &text[1..]
    } else {
        text
    };
    u16::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::io::Write;

    #[test]
    fn numbers() {
        assert_eq!(parse_number("0x6000"), Some(0x6000));
        assert_eq!(parse_number("$30B"), Some(0x30B));
        assert_eq!(parse_number("250"), Some(250));
        assert_eq!(parse_number("label"), None);
    }

    #[test]
    fn hex_addresses() {
        assert_eq!(parse_hex("1000"), Some(0x1000));
        assert_eq!(parse_hex("0x008d"), Some(0x8D));
        assert_eq!(parse_hex("$FFFF"), Some(0xFFFF));
        assert_eq!(parse_hex("10000"), None);
        assert_eq!(parse_hex("0x"), None);
        assert_eq!(parse_hex("zz"), None);
    }

    #[test]
    fn oversized_images_are_truncated() {
        let path = env::temp_dir().join(format!("champ-oversized-{}.bin", ::std::process::id()));
        {
            let mut file = fs::File::create(&path).unwrap();
            file.write_all(&vec![0xEAu8; MEMORY_SIZE + 10]).unwrap();
        }
        let image = read_bin(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(image.len(), MEMORY_SIZE);
    }

    #[test]
    fn missing_image_is_an_io_error() {
        let result = read_bin("/nonexistent/champ/image.bin");
        match result {
            Err(::io::errors::EmulatorError::Io(_)) => {},
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
    }
}
