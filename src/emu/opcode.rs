// Copyright 2016 Walter Kuppens.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use enum_primitive::FromPrimitive;
use std::fmt;

/// Operations understood by the executor. This covers the documented 6502
/// instruction set plus the 65C02 additions the profiled programs use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC,
    BVS, CLC, CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR,
    INC, INX, INY, JMP, JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA,
    PHP, PLA, PLP, ROL, ROR, RTI, RTS, SBC, SEC, SED, SEI, STA,
    STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
    BRA, PHX, PHY, PLX, PLY, STZ, DEA, INA,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The rule used to find the operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Accumulator,
    Immediate,
    Implied,
    Relative,
    Absolute,
    ZeroPage,
    ZeroPageIndirect,
    Indirect, // JMP only.
    ZeroPageX,
    ZeroPageY,
    AbsoluteX,
    AbsoluteY,
    IndexedIndirectX,
    IndirectIndexedY,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode byte.
    pub fn operand_len(&self) -> u16 {
        use self::AddressingMode::*;

        match *self {
            Accumulator | Implied => 0,
            Immediate | Relative | ZeroPage | ZeroPageIndirect |
            ZeroPageX | ZeroPageY | IndexedIndirectX | IndirectIndexedY => 1,
            Absolute | Indirect | AbsoluteX | AbsoluteY => 2,
        }
    }

    /// Name used in verbose disassembly.
    pub fn name(&self) -> &'static str {
        use self::AddressingMode::*;

        match *self {
            Accumulator      => "accumulator",
            Immediate        => "immediate",
            Implied          => "implied",
            Relative         => "relative",
            Absolute         => "absolute",
            ZeroPage         => "zero_page",
            ZeroPageIndirect => "zero_page_indirect",
            Indirect         => "indirect",
            ZeroPageX        => "zero_page_x",
            ZeroPageY        => "zero_page_y",
            AbsoluteX        => "absolute_x",
            AbsoluteY        => "absolute_y",
            IndexedIndirectX => "indexed_indirect_x",
            IndirectIndexedY => "indirect_indexed_y",
        }
    }
}

enum_from_primitive! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Opcode {
        ADCImm   = 0x69,
        ADCZero  = 0x65,
        ADCZeroX = 0x75,
        ADCAbs   = 0x6D,
        ADCAbsX  = 0x7D,
        ADCAbsY  = 0x79,
        ADCIndX  = 0x61,
        ADCIndY  = 0x71,

        ANDImm   = 0x29,
        ANDZero  = 0x25,
        ANDZeroX = 0x35,
        ANDAbs   = 0x2D,
        ANDAbsX  = 0x3D,
        ANDAbsY  = 0x39,
        ANDIndX  = 0x21,
        ANDIndY  = 0x31,

        ASLAcc   = 0x0A,
        ASLZero  = 0x06,
        ASLZeroX = 0x16,
        ASLAbs   = 0x0E,
        ASLAbsX  = 0x1E,

        BITZero  = 0x24,
        BITAbs   = 0x2C,

        BPLRel   = 0x10,
        BRARel   = 0x80,
        BMIRel   = 0x30,
        BVCRel   = 0x50,
        BVSRel   = 0x70,
        BCCRel   = 0x90,
        BCSRel   = 0xB0,
        BNERel   = 0xD0,
        BEQRel   = 0xF0,

        BRKImpl  = 0x00,

        CMPImm   = 0xC9,
        CMPZero  = 0xC5,
        CMPZeroX = 0xD5,
        CMPAbs   = 0xCD,
        CMPAbsX  = 0xDD,
        CMPAbsY  = 0xD9,
        CMPIndX  = 0xC1,
        CMPIndY  = 0xD1,

        CPXImm   = 0xE0,
        CPXZero  = 0xE4,
        CPXAbs   = 0xEC,

        CPYImm   = 0xC0,
        CPYZero  = 0xC4,
        CPYAbs   = 0xCC,

        DECZero  = 0xC6,
        DECZeroX = 0xD6,
        DECAbs   = 0xCE,
        DECAbsX  = 0xDE,

        EORImm   = 0x49,
        EORZero  = 0x45,
        EORZeroX = 0x55,
        EORAbs   = 0x4D,
        EORAbsX  = 0x5D,
        EORAbsY  = 0x59,
        EORIndX  = 0x41,
        EORIndY  = 0x51,

        CLCImpl  = 0x18,
        SECImpl  = 0x38,
        CLIImpl  = 0x58,
        SEIImpl  = 0x78,
        CLVImpl  = 0xB8,
        CLDImpl  = 0xD8,
        SEDImpl  = 0xF8,

        INCZero  = 0xE6,
        INCZeroX = 0xF6,
        INCAbs   = 0xEE,
        INCAbsX  = 0xFE,

        JMPAbs   = 0x4C,
        JMPInd   = 0x6C,

        JSRAbs   = 0x20,

        LDAImm   = 0xA9,
        LDAZero  = 0xA5,
        LDAZeroX = 0xB5,
        LDAAbs   = 0xAD,
        LDAAbsX  = 0xBD,
        LDAAbsY  = 0xB9,
        LDAIndX  = 0xA1,
        LDAIndY  = 0xB1,

        LDXImm   = 0xA2,
        LDXZero  = 0xA6,
        LDXZeroY = 0xB6,
        LDXAbs   = 0xAE,
        LDXAbsY  = 0xBE,

        LDYImm   = 0xA0,
        LDYZero  = 0xA4,
        LDYZeroX = 0xB4,
        LDYAbs   = 0xAC,
        LDYAbsX  = 0xBC,

        LSRAcc   = 0x4A,
        LSRZero  = 0x46,
        LSRZeroX = 0x56,
        LSRAbs   = 0x4E,
        LSRAbsX  = 0x5E,

        NOPImpl  = 0xEA,

        ORAImm   = 0x09,
        ORAZero  = 0x05,
        ORAZeroX = 0x15,
        ORAAbs   = 0x0D,
        ORAAbsX  = 0x1D,
        ORAAbsY  = 0x19,
        ORAIndX  = 0x01,
        ORAIndY  = 0x11,

        TAXImpl  = 0xAA,
        TXAImpl  = 0x8A,
        DEAImpl  = 0x3A,
        INAImpl  = 0x1A,
        DEXImpl  = 0xCA,
        INXImpl  = 0xE8,
        TAYImpl  = 0xA8,
        TYAImpl  = 0x98,
        DEYImpl  = 0x88,
        INYImpl  = 0xC8,

        ROLAcc   = 0x2A,
        ROLZero  = 0x26,
        ROLZeroX = 0x36,
        ROLAbs   = 0x2E,
        ROLAbsX  = 0x3E,

        RORAcc   = 0x6A,
        RORZero  = 0x66,
        RORZeroX = 0x76,
        RORAbs   = 0x6E,
        RORAbsX  = 0x7E,

        RTIImpl  = 0x40,
        RTSImpl  = 0x60,

        SBCImm   = 0xE9,
        SBCZero  = 0xE5,
        SBCZeroX = 0xF5,
        SBCAbs   = 0xED,
        SBCAbsX  = 0xFD,
        SBCAbsY  = 0xF9,
        SBCIndX  = 0xE1,
        SBCIndY  = 0xF1,

        STAZero  = 0x85,
        STAZeroX = 0x95,
        STAAbs   = 0x8D,
        STAAbsX  = 0x9D,
        STAAbsY  = 0x99,
        STAIndX  = 0x81,
        STAIndY  = 0x91,
        STAZeroInd = 0x92,

        TXSImpl  = 0x9A,
        TSXImpl  = 0xBA,

        PHAImpl  = 0x48,
        PLAImpl  = 0x68,
        PLXImpl  = 0xFA,
        PLYImpl  = 0x7A,
        PHPImpl  = 0x08,
        PHXImpl  = 0xDA,
        PHYImpl  = 0x5A,
        PLPImpl  = 0x28,

        STXZero  = 0x86,
        STXZeroY = 0x96,
        STXAbs   = 0x8E,

        STYZero  = 0x84,
        STYZeroX = 0x94,
        STYAbs   = 0x8C,

        STZZero  = 0x64,
        STZZeroX = 0x74,
        STZAbs   = 0x9C,
        STZAbsX  = 0x9E,
    }
}

impl Opcode {
    /// Returns the operation, addressing mode and base cycle cost of the
    /// opcode. Page crossing and branch penalties are added on top of the
    /// base cost while the instruction is resolved and executed.
    pub fn describe(&self) -> (Mnemonic, AddressingMode, u8) {
        use self::AddressingMode::*;
        use self::Mnemonic::*;
        use self::Opcode::*;

        match *self {
            ADCImm   => (ADC, Immediate, 2),
            ADCZero  => (ADC, ZeroPage, 3),
            ADCZeroX => (ADC, ZeroPageX, 4),
            ADCAbs   => (ADC, Absolute, 4),
            ADCAbsX  => (ADC, AbsoluteX, 4),
            ADCAbsY  => (ADC, AbsoluteY, 4),
            ADCIndX  => (ADC, IndexedIndirectX, 6),
            ADCIndY  => (ADC, IndirectIndexedY, 6),

            ANDImm   => (AND, Immediate, 2),
            ANDZero  => (AND, ZeroPage, 2),
            ANDZeroX => (AND, ZeroPageX, 3),
            ANDAbs   => (AND, Absolute, 4),
            ANDAbsX  => (AND, AbsoluteX, 4),
            ANDAbsY  => (AND, AbsoluteY, 4),
            ANDIndX  => (AND, IndexedIndirectX, 6),
            ANDIndY  => (AND, IndirectIndexedY, 5),

            ASLAcc   => (ASL, Accumulator, 2),
            ASLZero  => (ASL, ZeroPage, 5),
            ASLZeroX => (ASL, ZeroPageX, 6),
            ASLAbs   => (ASL, Absolute, 6),
            ASLAbsX  => (ASL, AbsoluteX, 7),

            BITZero  => (BIT, ZeroPage, 3),
            BITAbs   => (BIT, Absolute, 4),

            BPLRel   => (BPL, Relative, 2),
            BRARel   => (BRA, Relative, 2),
            BMIRel   => (BMI, Relative, 2),
            BVCRel   => (BVC, Relative, 2),
            BVSRel   => (BVS, Relative, 2),
            BCCRel   => (BCC, Relative, 2),
            BCSRel   => (BCS, Relative, 2),
            BNERel   => (BNE, Relative, 2),
            BEQRel   => (BEQ, Relative, 2),

            BRKImpl  => (BRK, Implied, 7),

            CMPImm   => (CMP, Immediate, 2),
            CMPZero  => (CMP, ZeroPage, 3),
            CMPZeroX => (CMP, ZeroPageX, 4),
            CMPAbs   => (CMP, Absolute, 4),
            CMPAbsX  => (CMP, AbsoluteX, 4),
            CMPAbsY  => (CMP, AbsoluteY, 4),
            CMPIndX  => (CMP, IndexedIndirectX, 6),
            CMPIndY  => (CMP, IndirectIndexedY, 5),

            CPXImm   => (CPX, Immediate, 2),
            CPXZero  => (CPX, ZeroPage, 3),
            CPXAbs   => (CPX, Absolute, 4),

            CPYImm   => (CPY, Immediate, 2),
            CPYZero  => (CPY, ZeroPage, 3),
            CPYAbs   => (CPY, Absolute, 4),

            DECZero  => (DEC, ZeroPage, 5),
            DECZeroX => (DEC, ZeroPageX, 6),
            DECAbs   => (DEC, Absolute, 6),
            DECAbsX  => (DEC, AbsoluteX, 7),

            EORImm   => (EOR, Immediate, 2),
            EORZero  => (EOR, ZeroPage, 3),
            EORZeroX => (EOR, ZeroPageX, 4),
            EORAbs   => (EOR, Absolute, 4),
            EORAbsX  => (EOR, AbsoluteX, 4),
            EORAbsY  => (EOR, AbsoluteY, 4),
            EORIndX  => (EOR, IndexedIndirectX, 6),
            EORIndY  => (EOR, IndirectIndexedY, 5),

            CLCImpl  => (CLC, Implied, 2),
            SECImpl  => (SEC, Implied, 2),
            CLIImpl  => (CLI, Implied, 2),
            SEIImpl  => (SEI, Implied, 2),
            CLVImpl  => (CLV, Implied, 2),
            CLDImpl  => (CLD, Implied, 2),
            SEDImpl  => (SED, Implied, 2),

            INCZero  => (INC, ZeroPage, 5),
            INCZeroX => (INC, ZeroPageX, 6),
            INCAbs   => (INC, Absolute, 6),
            INCAbsX  => (INC, AbsoluteX, 7),

            JMPAbs   => (JMP, Absolute, 3),
            JMPInd   => (JMP, Indirect, 5),

            JSRAbs   => (JSR, Absolute, 6),

            LDAImm   => (LDA, Immediate, 2),
            LDAZero  => (LDA, ZeroPage, 3),
            LDAZeroX => (LDA, ZeroPageX, 4),
            LDAAbs   => (LDA, Absolute, 4),
            LDAAbsX  => (LDA, AbsoluteX, 4),
            LDAAbsY  => (LDA, AbsoluteY, 4),
            LDAIndX  => (LDA, IndexedIndirectX, 6),
            LDAIndY  => (LDA, IndirectIndexedY, 5),

            LDXImm   => (LDX, Immediate, 2),
            LDXZero  => (LDX, ZeroPage, 3),
            LDXZeroY => (LDX, ZeroPageY, 4),
            LDXAbs   => (LDX, Absolute, 4),
            LDXAbsY  => (LDX, AbsoluteY, 4),

            LDYImm   => (LDY, Immediate, 2),
            LDYZero  => (LDY, ZeroPage, 3),
            LDYZeroX => (LDY, ZeroPageX, 4),
            LDYAbs   => (LDY, Absolute, 4),
            LDYAbsX  => (LDY, AbsoluteX, 4),

            LSRAcc   => (LSR, Accumulator, 2),
            LSRZero  => (LSR, ZeroPage, 5),
            LSRZeroX => (LSR, ZeroPageX, 6),
            LSRAbs   => (LSR, Absolute, 6),
            LSRAbsX  => (LSR, AbsoluteX, 7),

            NOPImpl  => (NOP, Implied, 2),

            ORAImm   => (ORA, Immediate, 2),
            ORAZero  => (ORA, ZeroPage, 2),
            ORAZeroX => (ORA, ZeroPageX, 3),
            ORAAbs   => (ORA, Absolute, 4),
            ORAAbsX  => (ORA, AbsoluteX, 4),
            ORAAbsY  => (ORA, AbsoluteY, 4),
            ORAIndX  => (ORA, IndexedIndirectX, 6),
            ORAIndY  => (ORA, IndirectIndexedY, 5),

            TAXImpl  => (TAX, Implied, 2),
            TXAImpl  => (TXA, Implied, 2),
            DEAImpl  => (DEA, Implied, 2),
            INAImpl  => (INA, Implied, 2),
            DEXImpl  => (DEX, Implied, 2),
            INXImpl  => (INX, Implied, 2),
            TAYImpl  => (TAY, Implied, 2),
            TYAImpl  => (TYA, Implied, 2),
            DEYImpl  => (DEY, Implied, 2),
            INYImpl  => (INY, Implied, 2),

            ROLAcc   => (ROL, Accumulator, 2),
            ROLZero  => (ROL, ZeroPage, 5),
            ROLZeroX => (ROL, ZeroPageX, 6),
            ROLAbs   => (ROL, Absolute, 6),
            ROLAbsX  => (ROL, AbsoluteX, 7),

            RORAcc   => (ROR, Accumulator, 2),
            RORZero  => (ROR, ZeroPage, 5),
            RORZeroX => (ROR, ZeroPageX, 6),
            RORAbs   => (ROR, Absolute, 6),
            RORAbsX  => (ROR, AbsoluteX, 7),

            RTIImpl  => (RTI, Implied, 6),
            RTSImpl  => (RTS, Implied, 6),

            SBCImm   => (SBC, Immediate, 2),
            SBCZero  => (SBC, ZeroPage, 3),
            SBCZeroX => (SBC, ZeroPageX, 4),
            SBCAbs   => (SBC, Absolute, 4),
            SBCAbsX  => (SBC, AbsoluteX, 4),
            SBCAbsY  => (SBC, AbsoluteY, 4),
            SBCIndX  => (SBC, IndexedIndirectX, 6),
            SBCIndY  => (SBC, IndirectIndexedY, 5),

            STAZero  => (STA, ZeroPage, 3),
            STAZeroX => (STA, ZeroPageX, 4),
            STAAbs   => (STA, Absolute, 4),
            STAAbsX  => (STA, AbsoluteX, 5),
            STAAbsY  => (STA, AbsoluteY, 5),
            STAIndX  => (STA, IndexedIndirectX, 6),
            STAIndY  => (STA, IndirectIndexedY, 6),
            STAZeroInd => (STA, ZeroPageIndirect, 5),

            TXSImpl  => (TXS, Implied, 2),
            TSXImpl  => (TSX, Implied, 2),

            PHAImpl  => (PHA, Implied, 3),
            PLAImpl  => (PLA, Implied, 4),
            PLXImpl  => (PLX, Implied, 4),
            PLYImpl  => (PLY, Implied, 4),
            PHPImpl  => (PHP, Implied, 3),
            PHXImpl  => (PHX, Implied, 3),
            PHYImpl  => (PHY, Implied, 3),
            PLPImpl  => (PLP, Implied, 4),

            STXZero  => (STX, ZeroPage, 3),
            STXZeroY => (STX, ZeroPageY, 4),
            STXAbs   => (STX, Absolute, 4),

            STYZero  => (STY, ZeroPage, 3),
            STYZeroX => (STY, ZeroPageX, 4),
            STYAbs   => (STY, Absolute, 4),

            STZZero  => (STZ, ZeroPage, 3),
            STZZeroX => (STZ, ZeroPageX, 4),
            STZAbs   => (STZ, Absolute, 4),
            STZAbsX  => (STZ, AbsoluteX, 5),
        }
    }
}

/// A decoded table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    pub mnemonic: Mnemonic,
    pub mode: AddressingMode,
    pub cycles: u8,
}

/// Direct lookup table from opcode byte to its decoded form. It is built once
/// when the emulator starts; every byte maps to at most one entry because the
/// `Opcode` discriminants are unique.
pub struct OpcodeTable {
    entries: [Option<OpcodeInfo>; 256],
}

impl OpcodeTable {
    pub fn new() -> OpcodeTable {
        let mut entries = [None; 256];
        for byte in 0..256usize {
            if let Some(opcode) = Opcode::from_u8(byte as u8) {
                let (mnemonic, mode, cycles) = opcode.describe();
                entries[byte] = Some(OpcodeInfo {
                    opcode: opcode,
                    mnemonic: mnemonic,
                    mode: mode,
                    cycles: cycles,
                });
            }
        }

        OpcodeTable { entries: entries }
    }

    /// Looks up an opcode byte. Returns `None` for bytes with no instruction.
    #[inline(always)]
    pub fn lookup(&self, byte: u8) -> Option<&OpcodeInfo> {
        self.entries[byte as usize].as_ref()
    }

    /// Number of opcode bytes that decode to an instruction.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }
}

impl Default for OpcodeTable {
    fn default() -> OpcodeTable {
        OpcodeTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_documented_and_65c02_opcodes() {
        // 151 documented opcodes plus BRA, PHX, PHY, PLX, PLY, STZ (4),
        // STA (zp), DEA and INA.
        assert_eq!(OpcodeTable::new().len(), 163);
    }

    #[test]
    fn entries_describe_their_byte() {
        let table = OpcodeTable::new();
        for byte in 0..256usize {
            if let Some(info) = table.lookup(byte as u8) {
                assert_eq!(info.opcode as usize, byte);
                assert_eq!(info.opcode.describe(), (info.mnemonic, info.mode, info.cycles));
            }
        }
    }

    #[test]
    fn inc_absolute_x_has_a_single_encoding() {
        let table = OpcodeTable::new();
        let encodings: Vec<u8> = (0..256usize)
            .filter_map(|byte| table.lookup(byte as u8).map(|info| (byte as u8, *info)))
            .filter(|&(_, info)| info.mnemonic == Mnemonic::INC && info.mode == AddressingMode::AbsoluteX)
            .map(|(byte, _)| byte)
            .collect();
        assert_eq!(encodings, vec![0xFE]);
    }

    #[test]
    fn unknown_bytes() {
        let table = OpcodeTable::new();
        for &byte in &[0x02u8, 0x03, 0x89, 0xFF, 0x04, 0x0C, 0x14, 0x1C] {
            assert!(table.lookup(byte).is_none(), "byte {:02X}", byte);
        }
    }

    #[test]
    fn selected_entries() {
        let table = OpcodeTable::new();
        let lda = table.lookup(0xA9).unwrap();
        assert_eq!((lda.mnemonic, lda.mode, lda.cycles), (Mnemonic::LDA, AddressingMode::Immediate, 2));
        let jmp = table.lookup(0x6C).unwrap();
        assert_eq!((jmp.mnemonic, jmp.mode, jmp.cycles), (Mnemonic::JMP, AddressingMode::Indirect, 5));
        let sta = table.lookup(0x92).unwrap();
        assert_eq!((sta.mnemonic, sta.mode), (Mnemonic::STA, AddressingMode::ZeroPageIndirect));
        let bra = table.lookup(0x80).unwrap();
        assert_eq!(bra.mnemonic, Mnemonic::BRA);
        assert_eq!(table.lookup(0x1A).unwrap().mnemonic, Mnemonic::INA);
        assert_eq!(table.lookup(0x3A).unwrap().mnemonic, Mnemonic::DEA);
    }

    #[test]
    fn operand_lengths() {
        assert_eq!(AddressingMode::Implied.operand_len(), 0);
        assert_eq!(AddressingMode::Accumulator.operand_len(), 0);
        assert_eq!(AddressingMode::IndirectIndexedY.operand_len(), 1);
        assert_eq!(AddressingMode::Indirect.operand_len(), 2);
        assert_eq!(AddressingMode::AbsoluteY.operand_len(), 2);
    }
}
