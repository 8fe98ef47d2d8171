//! 6809 instruction table.
//!
//! Memory-addressing instructions are stored once with a base code; the
//! direct, indexed and extended codes are derived from it (see
//! [`Opcode::direct`], [`Opcode::indexed`], [`Opcode::extended`]).

/// Non-memory operand shape an instruction accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No operand.
    Inherent,
    /// `#` 8-bit immediate.
    Immediate8,
    /// `#` 16-bit immediate.
    Immediate16,
    /// 8-bit PC-relative branch.
    Relative8,
    /// 16-bit PC-relative branch.
    Relative16,
    /// Register list pushed to / pulled from S.
    StackS,
    /// Register list pushed to / pulled from U.
    StackU,
    /// Register pair (EXG / TFR).
    Pair,
    /// Memory operands only.
    None,
}

/// How an instruction addresses memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mem {
    /// No memory operand.
    None,
    /// Page-zero group: `code` is the direct form, indexed `+0x60`,
    /// extended `+0x70`.
    Page0,
    /// Accumulator/register group: `code` is the immediate slot, direct
    /// `+0x10`, indexed `+0x20`, extended `+0x30`.
    Full,
    /// Indexed only (LEA): `code` is the indexed form.
    IndexedOnly,
}

/// One instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    /// Upper-case mnemonic.
    pub name: &'static str,
    /// Base code; values above 0xFF carry the 0x10 / 0x11 page prefix.
    pub code: u16,
    /// Non-memory operand shape.
    pub mode: Mode,
    /// Memory addressing group.
    pub mem: Mem,
}

impl Opcode {
    /// Direct-page form, if the instruction has one.
    #[must_use]
    pub fn direct(&self) -> Option<u16> {
        match self.mem {
            Mem::Page0 => Some(self.code),
            Mem::Full => Some(self.code + 0x10),
            Mem::None | Mem::IndexedOnly => None,
        }
    }

    /// Indexed form, if the instruction has one.
    #[must_use]
    pub fn indexed(&self) -> Option<u16> {
        match self.mem {
            Mem::Page0 => Some(self.code + 0x60),
            Mem::Full => Some(self.code + 0x20),
            Mem::IndexedOnly => Some(self.code),
            Mem::None => None,
        }
    }

    /// Extended form, if the instruction has one.
    #[must_use]
    pub fn extended(&self) -> Option<u16> {
        match self.mem {
            Mem::Page0 => Some(self.code + 0x70),
            Mem::Full => Some(self.code + 0x30),
            Mem::None | Mem::IndexedOnly => None,
        }
    }
}

const fn op(name: &'static str, code: u16, mode: Mode, mem: Mem) -> Opcode {
    Opcode {
        name,
        code,
        mode,
        mem,
    }
}

const fn inh(name: &'static str, code: u16) -> Opcode {
    op(name, code, Mode::Inherent, Mem::None)
}

const fn page0(name: &'static str, code: u16) -> Opcode {
    op(name, code, Mode::None, Mem::Page0)
}

const fn imm8(name: &'static str, code: u16) -> Opcode {
    op(name, code, Mode::Immediate8, Mem::Full)
}

const fn imm16(name: &'static str, code: u16) -> Opcode {
    op(name, code, Mode::Immediate16, Mem::Full)
}

const fn store(name: &'static str, code: u16) -> Opcode {
    op(name, code, Mode::None, Mem::Full)
}

const fn rel8(name: &'static str, code: u16) -> Opcode {
    op(name, code, Mode::Relative8, Mem::None)
}

const fn rel16(name: &'static str, code: u16) -> Opcode {
    op(name, code, Mode::Relative16, Mem::None)
}

/// Every 6809 instruction.
pub static OPCODES: &[Opcode] = &[
    // Inherent
    inh("NOP", 0x12),
    inh("SYNC", 0x13),
    inh("DAA", 0x19),
    inh("SEX", 0x1d),
    inh("RTS", 0x39),
    inh("ABX", 0x3a),
    inh("RTI", 0x3b),
    inh("MUL", 0x3d),
    inh("SWI", 0x3f),
    inh("SWI2", 0x103f),
    inh("SWI3", 0x113f),
    inh("NEGA", 0x40),
    inh("COMA", 0x43),
    inh("LSRA", 0x44),
    inh("RORA", 0x46),
    inh("ASRA", 0x47),
    inh("ASLA", 0x48),
    inh("LSLA", 0x48),
    inh("ROLA", 0x49),
    inh("DECA", 0x4a),
    inh("INCA", 0x4c),
    inh("TSTA", 0x4d),
    inh("CLRA", 0x4f),
    inh("NEGB", 0x50),
    inh("COMB", 0x53),
    inh("LSRB", 0x54),
    inh("RORB", 0x56),
    inh("ASRB", 0x57),
    inh("ASLB", 0x58),
    inh("LSLB", 0x58),
    inh("ROLB", 0x59),
    inh("DECB", 0x5a),
    inh("INCB", 0x5c),
    inh("TSTB", 0x5d),
    inh("CLRB", 0x5f),
    // Read-modify-write memory
    page0("NEG", 0x00),
    page0("COM", 0x03),
    page0("LSR", 0x04),
    page0("ROR", 0x06),
    page0("ASR", 0x07),
    page0("ASL", 0x08),
    page0("LSL", 0x08),
    page0("ROL", 0x09),
    page0("DEC", 0x0a),
    page0("INC", 0x0c),
    page0("TST", 0x0d),
    page0("JMP", 0x0e),
    page0("CLR", 0x0f),
    // Accumulator A / register X group
    imm8("SUBA", 0x80),
    imm8("CMPA", 0x81),
    imm8("SBCA", 0x82),
    imm16("SUBD", 0x83),
    imm8("ANDA", 0x84),
    imm8("BITA", 0x85),
    imm8("LDA", 0x86),
    store("STA", 0x87),
    imm8("EORA", 0x88),
    imm8("ADCA", 0x89),
    imm8("ORA", 0x8a),
    imm8("ADDA", 0x8b),
    imm16("CMPX", 0x8c),
    store("JSR", 0x8d),
    imm16("LDX", 0x8e),
    store("STX", 0x8f),
    // Accumulator B / register U group
    imm8("SUBB", 0xc0),
    imm8("CMPB", 0xc1),
    imm8("SBCB", 0xc2),
    imm16("ADDD", 0xc3),
    imm8("ANDB", 0xc4),
    imm8("BITB", 0xc5),
    imm8("LDB", 0xc6),
    store("STB", 0xc7),
    imm8("EORB", 0xc8),
    imm8("ADCB", 0xc9),
    imm8("ORB", 0xca),
    imm8("ADDB", 0xcb),
    imm16("LDD", 0xcc),
    store("STD", 0xcd),
    imm16("LDU", 0xce),
    store("STU", 0xcf),
    // Pages 2 and 3
    imm16("CMPD", 0x1083),
    imm16("CMPY", 0x108c),
    imm16("LDY", 0x108e),
    store("STY", 0x108f),
    imm16("LDS", 0x10ce),
    store("STS", 0x10cf),
    imm16("CMPU", 0x1183),
    imm16("CMPS", 0x118c),
    // Load effective address
    op("LEAX", 0x30, Mode::None, Mem::IndexedOnly),
    op("LEAY", 0x31, Mode::None, Mem::IndexedOnly),
    op("LEAS", 0x32, Mode::None, Mem::IndexedOnly),
    op("LEAU", 0x33, Mode::None, Mem::IndexedOnly),
    // Condition code immediates
    op("ORCC", 0x1a, Mode::Immediate8, Mem::None),
    op("ANDCC", 0x1c, Mode::Immediate8, Mem::None),
    op("CWAI", 0x3c, Mode::Immediate8, Mem::None),
    // Register pairs and stacks
    op("EXG", 0x1e, Mode::Pair, Mem::None),
    op("TFR", 0x1f, Mode::Pair, Mem::None),
    op("PSHS", 0x34, Mode::StackS, Mem::None),
    op("PULS", 0x35, Mode::StackS, Mem::None),
    op("PSHU", 0x36, Mode::StackU, Mem::None),
    op("PULU", 0x37, Mode::StackU, Mem::None),
    // Short branches
    rel8("BRA", 0x20),
    rel8("BRN", 0x21),
    rel8("BHI", 0x22),
    rel8("BLS", 0x23),
    rel8("BCC", 0x24),
    rel8("BHS", 0x24),
    rel8("BCS", 0x25),
    rel8("BLO", 0x25),
    rel8("BNE", 0x26),
    rel8("BEQ", 0x27),
    rel8("BVC", 0x28),
    rel8("BVS", 0x29),
    rel8("BPL", 0x2a),
    rel8("BMI", 0x2b),
    rel8("BGE", 0x2c),
    rel8("BLT", 0x2d),
    rel8("BGT", 0x2e),
    rel8("BLE", 0x2f),
    rel8("BSR", 0x8d),
    // Long branches
    rel16("LBRA", 0x16),
    rel16("LBSR", 0x17),
    rel16("LBRN", 0x1021),
    rel16("LBHI", 0x1022),
    rel16("LBLS", 0x1023),
    rel16("LBCC", 0x1024),
    rel16("LBHS", 0x1024),
    rel16("LBCS", 0x1025),
    rel16("LBLO", 0x1025),
    rel16("LBNE", 0x1026),
    rel16("LBEQ", 0x1027),
    rel16("LBVC", 0x1028),
    rel16("LBVS", 0x1029),
    rel16("LBPL", 0x102a),
    rel16("LBMI", 0x102b),
    rel16("LBGE", 0x102c),
    rel16("LBLT", 0x102d),
    rel16("LBGT", 0x102e),
    rel16("LBLE", 0x102f),
];

/// Look up an instruction by mnemonic (case-insensitive).
#[must_use]
pub fn lookup(name: &str) -> Option<&'static Opcode> {
    OPCODES.iter().find(|o| o.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_case_insensitive() {
        assert_eq!(lookup("lda").map(|o| o.code), Some(0x86));
        assert_eq!(lookup("LdA").map(|o| o.code), Some(0x86));
        assert!(lookup("mov").is_none());
    }

    #[test]
    fn derived_codes() {
        let lda = lookup("LDA").unwrap();
        assert_eq!(lda.direct(), Some(0x96));
        assert_eq!(lda.indexed(), Some(0xa6));
        assert_eq!(lda.extended(), Some(0xb6));

        let neg = lookup("NEG").unwrap();
        assert_eq!(neg.direct(), Some(0x00));
        assert_eq!(neg.indexed(), Some(0x60));
        assert_eq!(neg.extended(), Some(0x70));

        let sty = lookup("STY").unwrap();
        assert_eq!(sty.direct(), Some(0x109f));
        assert_eq!(sty.extended(), Some(0x10bf));

        let jsr = lookup("JSR").unwrap();
        assert_eq!(jsr.direct(), Some(0x9d));
        assert_eq!(jsr.extended(), Some(0xbd));

        let leax = lookup("LEAX").unwrap();
        assert_eq!(leax.indexed(), Some(0x30));
        assert_eq!(leax.direct(), None);
    }

    #[test]
    fn aliases_share_codes() {
        assert_eq!(lookup("ASL").unwrap().code, lookup("LSL").unwrap().code);
        assert_eq!(lookup("BHS").unwrap().code, lookup("BCC").unwrap().code);
        assert_eq!(lookup("LBLO").unwrap().code, lookup("LBCS").unwrap().code);
    }

    #[test]
    fn mnemonics_upper_case() {
        for o in OPCODES {
            assert_eq!(o.name, o.name.to_ascii_uppercase());
        }
    }
}
