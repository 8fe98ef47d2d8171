//! The per-line assembly driver.
//!
//! [`Context`] carries everything one run needs: the pass number, the
//! section set, symbols, the program registry, the positional-argument
//! stack of active macro calls and the macro-capture state.  A pass walks
//! the top-level program with [`Context::assemble`], which recurses into
//! included files and macro bodies.

use alloc::rc::Rc;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::assembler::ResourceLimits;
use crate::error::{AsmError, Location};
use crate::instr;
use crate::listing::{Listing, ListingCollector};
use crate::opcode::{self, Mem, Mode, Opcode};
use crate::program::{Program, ProgramLine, Programs};
use crate::section::{ADDRESS_MASK, Emit, Sections};
use crate::symbol::SymbolTable;
use crate::value::{Attr, Node, Reg, Value};

/// Pseudo-operations understood by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoOp {
    Macro,
    Endm,
    Export,
    Section,
    Equ,
    Org,
    Fcc,
    Fcb,
    Fdb,
    Rzb,
    Rmb,
    Put,
    Setdp,
    Include,
    IncludeBin,
}

impl PseudoOp {
    /// Resolve a pseudo-op name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        const NAMES: &[(&str, PseudoOp)] = &[
            ("MACRO", PseudoOp::Macro),
            ("ENDM", PseudoOp::Endm),
            ("EXPORT", PseudoOp::Export),
            ("SECTION", PseudoOp::Section),
            ("EQU", PseudoOp::Equ),
            ("ORG", PseudoOp::Org),
            ("FCC", PseudoOp::Fcc),
            ("FCB", PseudoOp::Fcb),
            ("FDB", PseudoOp::Fdb),
            ("RZB", PseudoOp::Rzb),
            ("RMB", PseudoOp::Rmb),
            ("PUT", PseudoOp::Put),
            ("SETDP", PseudoOp::Setdp),
            ("INCLUDE", PseudoOp::Include),
            ("INCLUDEBIN", PseudoOp::IncludeBin),
        ];
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, op)| op)
    }

    fn name(self) -> &'static str {
        match self {
            PseudoOp::Macro => "MACRO",
            PseudoOp::Endm => "ENDM",
            PseudoOp::Export => "EXPORT",
            PseudoOp::Section => "SECTION",
            PseudoOp::Equ => "EQU",
            PseudoOp::Org => "ORG",
            PseudoOp::Fcc => "FCC",
            PseudoOp::Fcb => "FCB",
            PseudoOp::Fdb => "FDB",
            PseudoOp::Rzb => "RZB",
            PseudoOp::Rmb => "RMB",
            PseudoOp::Put => "PUT",
            PseudoOp::Setdp => "SETDP",
            PseudoOp::Include => "INCLUDE",
            PseudoOp::IncludeBin => "INCLUDEBIN",
        }
    }
}

/// A label after evaluation.
#[derive(Debug, Clone)]
enum Label {
    /// Numeric local label.
    Local(i64),
    /// Global symbol.
    Global(String),
}

/// Largest block RZB will reserve in one go.
const MAX_RZB: i64 = 0x10000;

/// Assembly state for one run.
#[derive(Debug)]
pub struct Context {
    pub(crate) limits: ResourceLimits,
    pub(crate) pass: u32,
    pub(crate) sections: Sections,
    pub(crate) symbols: SymbolTable,
    pub(crate) programs: Programs,
    pub(crate) listing: Option<ListingCollector>,
    pub(crate) args_stack: Vec<Value>,
    pub(crate) loc: Location,
    macro_level: u32,
    macro_name: Option<String>,
    capturing: bool,
    depth: usize,
    errors: Vec<AsmError>,
}

impl Context {
    /// Fresh state.  With `listing_enabled` every pass records a listing;
    /// only the last one survives.
    #[must_use]
    pub fn new(limits: ResourceLimits, programs: Programs, listing_enabled: bool) -> Self {
        Self {
            limits,
            pass: 0,
            sections: Sections::new(),
            symbols: SymbolTable::new(),
            programs,
            listing: listing_enabled.then(ListingCollector::new),
            args_stack: Vec::new(),
            loc: Location::default(),
            macro_level: 0,
            macro_name: None,
            capturing: false,
            depth: 0,
            errors: Vec::new(),
        }
    }

    /// Reset per-pass state.  Symbols, macros and section end addresses
    /// carry over; diagnostics and the listing do not.
    pub fn begin_pass(&mut self, pass: u32) {
        log::debug!("starting pass {}", pass);
        self.pass = pass;
        self.errors.clear();
        if let Some(l) = self.listing.as_mut() {
            l.clear();
        }
        self.args_stack.clear();
        self.macro_level = 0;
        self.macro_name = None;
        self.capturing = false;
        self.depth = 0;
        self.sections.start_pass(pass);
    }

    /// Check state that must be balanced at the end of a pass.
    pub fn end_pass(&mut self) {
        if self.macro_level > 0 {
            let e = self.syntax("MACRO without ENDM");
            self.error(e);
            self.macro_level = 0;
        }
    }

    /// Record a diagnostic for this pass.
    pub fn error(&mut self, e: AsmError) {
        if self.errors.len() < self.limits.max_errors {
            self.errors.push(e);
        }
    }

    /// A syntax error at the current line.
    #[must_use]
    pub fn syntax(&self, msg: &str) -> AsmError {
        AsmError::Syntax {
            msg: String::from(msg),
            loc: self.loc.clone(),
        }
    }

    /// Diagnostics recorded so far in this pass.
    #[must_use]
    pub fn errors(&self) -> &[AsmError] {
        &self.errors
    }

    /// Take this pass's diagnostics.
    pub fn take_errors(&mut self) -> Vec<AsmError> {
        core::mem::take(&mut self.errors)
    }

    /// Make `args` the positional arguments (`&1`, `&2`, ...).
    pub fn push_args(&mut self, args: Value) {
        self.args_stack.push(args);
    }

    /// Restore the previous positional arguments.
    pub fn pop_args(&mut self) {
        debug_assert!(!self.args_stack.is_empty(), "positional stack underflow");
        self.args_stack.pop();
    }

    /// Assemble every line of `program` in `pass`.
    ///
    /// Recoverable errors are recorded and the next line is processed; a
    /// fatal error abandons the rest of `program`.  Nesting deeper than
    /// [`ResourceLimits::max_program_depth`] records a fatal error and
    /// returns without assembling anything.
    pub fn assemble(&mut self, program: &Program, pass: u32) {
        if self.depth >= self.limits.max_program_depth {
            let e = AsmError::DepthExceeded {
                limit: self.limits.max_program_depth,
                loc: self.loc.clone(),
            };
            self.error(e);
            return;
        }
        self.pass = pass;
        self.depth += 1;
        for line in &program.lines {
            self.sections.current_mut().line_number += 1;
            self.loc = line.location();
            if let Err(e) = self.assemble_line(line) {
                let fatal = e.is_fatal();
                self.error(e);
                if fatal {
                    log::debug!("abandoning {} after fatal error", program.name);
                    break;
                }
            }
        }
        self.depth -= 1;
    }

    fn list(&mut self, address: Option<i64>, text: &str) {
        if let Some(l) = self.listing.as_mut() {
            l.record(address.map(|a| (a & 0xffff) as u16), 0, &[], text);
        }
    }

    /// List a line that moved the PC from `old_pc`, with its bytes if they
    /// were emitted contiguously.
    fn list_emitted(&mut self, old_pc: i64, text: &str) {
        if let Some(l) = self.listing.as_mut() {
            let section = self.sections.current();
            let length = usize::try_from(section.pc.wrapping_sub(old_pc)).unwrap_or(0);
            let bytes = section.tail(length).unwrap_or(&[]);
            l.record(Some((old_pc & 0xffff) as u16), length, bytes, text);
        }
    }

    fn assemble_line(&mut self, line: &ProgramLine) -> Result<(), AsmError> {
        if line.is_empty() {
            self.list(None, &line.text);
            return Ok(());
        }

        let opcode = match &line.opcode {
            Some(o) => self.eval_string(o),
            None => None,
        };
        let pseudo = opcode.as_deref().and_then(PseudoOp::from_name);
        let raw_args = line.args.as_ref().and_then(Value::as_array).unwrap_or(&[]);

        if pseudo == Some(PseudoOp::Macro) {
            self.macro_level += 1;
            if self.macro_level == 1 {
                self.list(None, &line.text);
                return self.begin_macro(line.label.as_ref(), raw_args);
            }
        }
        if pseudo == Some(PseudoOp::Endm) {
            if self.macro_level == 0 {
                return Err(self.syntax("ENDM without beginning MACRO"));
            }
            self.macro_level -= 1;
            if self.macro_level == 0 {
                self.list(None, &line.text);
                return self.end_macro(raw_args);
            }
        }
        if self.macro_level > 0 {
            if self.capturing {
                if let Some(name) = &self.macro_name {
                    self.programs.add_macro_line(name, line.clone());
                }
            }
            self.list(None, &line.text);
            return Ok(());
        }

        let label = match &line.label {
            Some(l) => self.label(l),
            None => None,
        };

        match pseudo {
            Some(PseudoOp::Export) => {
                self.list(None, &line.text);
                return self.export(raw_args);
            }
            Some(PseudoOp::Section) => {
                self.list(None, &line.text);
                return self.section(raw_args);
            }
            _ => {}
        }

        let args: Vec<Value> = raw_args.iter().map(|a| self.eval(a)).collect();

        match pseudo {
            Some(PseudoOp::Equ) => return self.equ(label, &args, &line.text),
            Some(PseudoOp::Org) => return self.org(label, &args, &line.text),
            _ => {}
        }

        let pc = self.sections.current().pc;
        if let Some(label) = &label {
            self.set_label(label, Value::int(pc));
        }

        let Some(opcode) = opcode else {
            if label.is_some() {
                self.list(Some(pc), &line.text);
            }
            return Ok(());
        };

        if let Some(op) = pseudo {
            return match op {
                PseudoOp::Fcc | PseudoOp::Fcb | PseudoOp::Fdb | PseudoOp::Rzb | PseudoOp::Rmb => {
                    let result = self.data(op, &args);
                    self.list_emitted(pc, &line.text);
                    result
                }
                _ => {
                    self.list(None, &line.text);
                    self.directive(op, &args)
                }
            };
        }

        if let Some(op) = opcode::lookup(&opcode) {
            let immediate = raw_args.first().map(Value::attr) == Some(Attr::Immediate);
            let args: Vec<Value> = args.iter().map(Value::float_to_int).collect();
            let result = self.instruction(op, &args, immediate);
            self.list_emitted(pc, &line.text);
            return result;
        }

        if let Some(body) = self.programs.macro_by_name(&opcode) {
            log::trace!("expanding macro {} at {}", opcode, self.loc);
            self.list(Some(pc), &line.text);
            self.push_args(Value::array(args));
            self.assemble(&body, self.pass);
            self.pop_args();
            return Ok(());
        }

        Err(AsmError::UnknownInstruction {
            mnemonic: opcode,
            loc: self.loc.clone(),
        })
    }

    fn instruction(&mut self, op: &Opcode, args: &[Value], immediate: bool) -> Result<(), AsmError> {
        match op.mode {
            Mode::Inherent => instr::inherent(self, op, args),
            Mode::Immediate8 | Mode::Immediate16 if immediate => {
                instr::immediate(self, op, args, op.mode == Mode::Immediate16)
            }
            _ if immediate => Err(AsmError::InvalidAddressingMode {
                mnemonic: String::from(op.name),
                loc: self.loc.clone(),
            }),
            _ if op.mem != Mem::None => instr::address(self, op, args),
            Mode::Relative8 => instr::relative(self, op, args, false),
            Mode::Relative16 => instr::relative(self, op, args, true),
            Mode::StackS => instr::stack(self, op, args, Reg::S),
            Mode::StackU => instr::stack(self, op, args, Reg::U),
            Mode::Pair => instr::pair(self, op, args),
            Mode::Immediate8 | Mode::Immediate16 | Mode::None => {
                Err(AsmError::InvalidAddressingMode {
                    mnemonic: String::from(op.name),
                    loc: self.loc.clone(),
                })
            }
        }
    }

    /// Numbers name local labels, including numbers substituted from a
    /// macro argument; anything else names a global symbol.
    fn label(&mut self, l: &Value) -> Option<Label> {
        let interpolated = match l.node() {
            Node::Int(id) => return Some(Label::Local(*id)),
            Node::Interp(_) => true,
            Node::Id(parts) => {
                matches!(parts.as_slice(), [only] if matches!(only.node(), Node::Interp(_)))
            }
            _ => false,
        };
        if interpolated {
            if let Some(id) = self.eval_int(l) {
                return Some(Label::Local(id));
            }
        }
        self.eval_string(l).map(Label::Global)
    }

    fn set_label(&mut self, label: &Label, value: Value) {
        match label {
            Label::Local(id) => {
                let section = self.sections.current_mut();
                let line = section.line_number;
                if section.local_labels.set(*id, line, value, self.pass) {
                    self.symbols.note_change();
                }
            }
            Label::Global(name) => self.symbols.set(name, value, self.pass),
        }
    }

    /// A name-like argument: identifiers give their own text, strings their
    /// contents.
    fn eval_name(&mut self, v: &Value) -> Option<String> {
        match v.node() {
            Node::Int(_) | Node::Float(_) => None,
            _ => self.eval_string(v),
        }
    }

    fn exactly_one<'a>(&self, op: PseudoOp, args: &'a [Value]) -> Result<&'a Value, AsmError> {
        match args {
            [arg] => Ok(arg),
            _ => Err(self.syntax(&alloc::format!("{} requires exactly one argument", op.name()))),
        }
    }

    fn invalid_argument(&self, op: PseudoOp) -> AsmError {
        self.syntax(&alloc::format!("invalid argument to {}", op.name()))
    }

    fn begin_macro(&mut self, label: Option<&Value>, args: &[Value]) -> Result<(), AsmError> {
        self.macro_name = None;
        self.capturing = false;
        let label = match label {
            Some(l) => self.eval_name(l),
            None => None,
        };
        let name = match (args, label) {
            ([arg], None) => self.eval_name(arg),
            ([], Some(label)) => Some(label),
            _ => None,
        };
        let Some(name) = name else {
            return Err(self.syntax("macro name must either be label OR argument"));
        };
        if self.programs.macro_pass(&name) == Some(self.pass) {
            return Err(AsmError::MacroRedefined {
                name,
                loc: self.loc.clone(),
            });
        }
        self.capturing = self.programs.new_macro(&name, self.pass);
        if self.capturing {
            log::trace!("defining macro {}", name);
        }
        self.macro_name = Some(name);
        Ok(())
    }

    fn end_macro(&mut self, args: &[Value]) -> Result<(), AsmError> {
        let defining = self.macro_name.take();
        self.capturing = false;
        match args {
            [] => Ok(()),
            [arg] => {
                let Some(name) = self.eval_name(arg) else {
                    return Err(self.invalid_argument(PseudoOp::Endm));
                };
                match defining {
                    Some(d) if d != name => Err(self.syntax(&alloc::format!(
                        "ENDM '{}' does not match MACRO '{}'",
                        name, d
                    ))),
                    _ => Ok(()),
                }
            }
            _ => Err(self.syntax("invalid number of arguments to ENDM")),
        }
    }

    fn export(&mut self, args: &[Value]) -> Result<(), AsmError> {
        if args.is_empty() {
            return Err(self.syntax("EXPORT requires one or more arguments"));
        }
        for a in args {
            match self.eval_name(a) {
                Some(name) => self.programs.export(&name),
                None => {
                    let e = self.invalid_argument(PseudoOp::Export);
                    self.error(e);
                }
            }
        }
        Ok(())
    }

    fn section(&mut self, args: &[Value]) -> Result<(), AsmError> {
        let arg = self.exactly_one(PseudoOp::Section, args)?;
        match self.eval_name(arg) {
            Some(name) => {
                self.sections.select(&name, self.pass);
                Ok(())
            }
            None => Err(self.invalid_argument(PseudoOp::Section)),
        }
    }

    fn equ(&mut self, label: Option<Label>, args: &[Value], text: &str) -> Result<(), AsmError> {
        let value = self.exactly_one(PseudoOp::Equ, args)?.clone();
        let Some(label) = label else {
            self.list(None, text);
            return Err(self.syntax("EQU requires a label"));
        };
        let address = match value.node() {
            Node::Int(v) => Some(*v),
            Node::Float(f) => Some(*f as i64),
            _ => None,
        };
        self.set_label(&label, value);
        self.list(address, text);
        Ok(())
    }

    fn org(&mut self, label: Option<Label>, args: &[Value], text: &str) -> Result<(), AsmError> {
        let arg = self.exactly_one(PseudoOp::Org, args)?.float_to_int();
        match arg.node() {
            Node::Undefined => Ok(()),
            Node::Int(v) => {
                let v = *v;
                let section = self.sections.current_mut();
                section.pc = v & ADDRESS_MASK;
                section.put_offset = 0;
                if let Some(label) = &label {
                    self.set_label(label, Value::int(v));
                }
                self.list(Some(v), text);
                Ok(())
            }
            _ => Err(self.invalid_argument(PseudoOp::Org)),
        }
    }

    /// FCC, FCB, FDB, RZB and RMB.
    fn data(&mut self, op: PseudoOp, args: &[Value]) -> Result<(), AsmError> {
        match op {
            PseudoOp::Fcc | PseudoOp::Fcb => {
                for a in args.iter().map(Value::float_to_int) {
                    match a.node() {
                        Node::Undefined => self.sections.emit(Emit::Pad(1)),
                        Node::Empty => self.sections.emit(Emit::Byte(0)),
                        Node::Int(v) => self.sections.emit(Emit::Byte(*v as u8)),
                        Node::String(s) => self.sections.emit_slice(s.as_bytes()),
                        _ => {
                            let e = self.syntax("invalid argument to FCB/FCC");
                            self.error(e);
                        }
                    }
                }
                Ok(())
            }
            PseudoOp::Fdb => {
                for a in args.iter().map(Value::float_to_int) {
                    match a.node() {
                        Node::Undefined => self.sections.emit(Emit::Pad(2)),
                        Node::Empty => self.sections.emit(Emit::Word(0)),
                        Node::Int(v) => self.sections.emit(Emit::Word(*v as u16)),
                        _ => {
                            let e = self.invalid_argument(op);
                            self.error(e);
                        }
                    }
                }
                Ok(())
            }
            PseudoOp::Rzb | PseudoOp::Rmb => {
                let arg = self.exactly_one(op, args)?.float_to_int();
                let n = match arg.node() {
                    Node::Undefined => return Ok(()),
                    Node::Int(n) => *n,
                    _ => return Err(self.invalid_argument(op)),
                };
                if n < 0 {
                    return Err(AsmError::OutOfRange {
                        msg: alloc::format!("negative argument to {}", op.name()),
                        loc: self.loc.clone(),
                    });
                }
                if op == PseudoOp::Rmb {
                    let section = self.sections.current_mut();
                    section.pc = section.pc.wrapping_add(n) & ADDRESS_MASK;
                    return Ok(());
                }
                if n > MAX_RZB {
                    return Err(AsmError::OutOfRange {
                        msg: alloc::format!("RZB argument {} too large", n),
                        loc: self.loc.clone(),
                    });
                }
                self.sections.emit(Emit::Pad(n as usize));
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// PUT, SETDP, INCLUDE and INCLUDEBIN.
    fn directive(&mut self, op: PseudoOp, args: &[Value]) -> Result<(), AsmError> {
        match op {
            PseudoOp::Put => {
                let arg = self.exactly_one(op, args)?.float_to_int();
                match arg.node() {
                    Node::Undefined => Ok(()),
                    Node::Int(v) => {
                        let section = self.sections.current_mut();
                        section.put_offset = v.wrapping_sub(section.pc);
                        Ok(())
                    }
                    _ => Err(self.invalid_argument(op)),
                }
            }
            PseudoOp::Setdp => {
                let arg = self.exactly_one(op, args)?.float_to_int();
                let dp = match arg.node() {
                    Node::Undefined => None,
                    Node::Int(v) if *v < 0 => None,
                    Node::Int(v) => Some((*v & 0xff) as u8),
                    _ => return Err(self.invalid_argument(op)),
                };
                self.sections.current_mut().dp = dp;
                Ok(())
            }
            PseudoOp::Include | PseudoOp::IncludeBin => {
                let Some(first) = args.first() else {
                    return Err(self.syntax(&alloc::format!("{} requires a filename", op.name())));
                };
                let Some(path) = first.as_str().map(String::from) else {
                    return Err(self.invalid_argument(op));
                };
                let loc = self.loc.clone();
                let not_found = || AsmError::FileNotFound {
                    path: path.clone(),
                    loc,
                };
                if op == PseudoOp::Include {
                    let file: Rc<Program> = self.programs.file(&path).ok_or_else(not_found)?;
                    self.assemble(&file, self.pass);
                } else {
                    let data = self.programs.binary(&path).ok_or_else(not_found)?;
                    self.sections.emit_slice(&data);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
