//! Instruction encoders, one per addressing-mode family.
//!
//! Each encoder receives fully evaluated arguments.  Undefined operands are
//! encoded with placeholder bytes of the widest form, so a pass that cannot
//! resolve a forward reference still lays out code conservatively.  When a
//! value is out of range the bytes are still emitted before the error is
//! returned, which keeps addresses stable for the rest of the pass.

use alloc::string::String;

use crate::driver::Context;
use crate::error::AsmError;
use crate::opcode::Opcode;
use crate::section::Emit;
use crate::value::{Attr, Node, Reg, Value};

/// Bytes taken by the opcode itself.
fn opcode_len(code: u16) -> i64 {
    if code > 0xff {
        2
    } else {
        1
    }
}

fn invalid_mode(ctx: &Context, op: &Opcode) -> AsmError {
    AsmError::InvalidAddressingMode {
        mnemonic: String::from(op.name),
        loc: ctx.loc.clone(),
    }
}

fn out_of_range(ctx: &Context, msg: String) -> AsmError {
    AsmError::OutOfRange {
        msg,
        loc: ctx.loc.clone(),
    }
}

/// Instructions without operands.
///
/// # Errors
///
/// Returns a syntax error if any operand was given.
pub fn inherent(ctx: &mut Context, op: &Opcode, args: &[Value]) -> Result<(), AsmError> {
    ctx.sections.emit(Emit::Opcode(op.code));
    if args.iter().any(|a| !a.is_empty()) {
        return Err(invalid_mode(ctx, op));
    }
    Ok(())
}

/// `#value` operands, 8 or 16 bits wide.
///
/// # Errors
///
/// Syntax error for a wrong operand count or type; out-of-range error for
/// values that do not fit.
pub fn immediate(
    ctx: &mut Context,
    op: &Opcode,
    args: &[Value],
    wide: bool,
) -> Result<(), AsmError> {
    let [arg] = args else {
        return Err(invalid_mode(ctx, op));
    };
    match arg.node() {
        Node::Undefined => {
            ctx.sections.emit(Emit::Opcode(op.code));
            ctx.sections.emit(Emit::Pad(if wide { 2 } else { 1 }));
            Ok(())
        }
        Node::Int(v) => {
            let v = *v;
            ctx.sections.emit(Emit::Opcode(op.code));
            if wide {
                ctx.sections.emit(Emit::Word(v as u16));
                if !(-32768..=65535).contains(&v) {
                    return Err(out_of_range(
                        ctx,
                        alloc::format!("immediate value {} out of 16-bit range", v),
                    ));
                }
            } else {
                ctx.sections.emit(Emit::Byte(v as u8));
                if !(-128..=255).contains(&v) {
                    return Err(out_of_range(
                        ctx,
                        alloc::format!("immediate value {} out of 8-bit range", v),
                    ));
                }
            }
            Ok(())
        }
        _ => Err(ctx.syntax(&alloc::format!("invalid argument to {}", op.name))),
    }
}

/// Direct, extended and indexed memory operands.
///
/// # Errors
///
/// Invalid addressing mode when the operand shape has no encoding for this
/// instruction; out-of-range errors for oversized offsets.
pub fn address(ctx: &mut Context, op: &Opcode, args: &[Value]) -> Result<(), AsmError> {
    match args {
        [arg] if arg.attr() == Attr::Indirect => match arg.as_array() {
            Some([addr]) => extended_indirect(ctx, op, addr),
            Some([offset, reg]) => indexed(ctx, op, offset, reg, true),
            _ => Err(invalid_mode(ctx, op)),
        },
        [arg] => match arg.node() {
            Node::Int(_) | Node::Undefined => direct_or_extended(ctx, op, arg),
            _ => Err(invalid_mode(ctx, op)),
        },
        [offset, reg] => indexed(ctx, op, offset, reg, false),
        _ => Err(invalid_mode(ctx, op)),
    }
}

fn direct_or_extended(ctx: &mut Context, op: &Opcode, arg: &Value) -> Result<(), AsmError> {
    let addr = arg.as_int();
    let dp = ctx.sections.current().dp;
    let use_direct = match arg.attr() {
        Attr::Bits8 => true,
        Attr::Bits16 => false,
        _ => match (addr, dp) {
            (Some(a), Some(dp)) => ((a >> 8) & 0xff) as u8 == dp,
            _ => false,
        },
    };
    let code = if use_direct {
        op.direct()
    } else {
        op.extended()
    };
    let Some(code) = code else {
        return Err(invalid_mode(ctx, op));
    };
    ctx.sections.emit(Emit::Opcode(code));
    match (addr, use_direct) {
        (Some(a), true) => ctx.sections.emit(Emit::Byte(a as u8)),
        (Some(a), false) => ctx.sections.emit(Emit::Word(a as u16)),
        (None, true) => ctx.sections.emit(Emit::Pad(1)),
        (None, false) => ctx.sections.emit(Emit::Pad(2)),
    }
    Ok(())
}

fn extended_indirect(ctx: &mut Context, op: &Opcode, addr: &Value) -> Result<(), AsmError> {
    let Some(code) = op.indexed() else {
        return Err(invalid_mode(ctx, op));
    };
    match addr.node() {
        Node::Int(a) => {
            let a = *a;
            ctx.sections.emit(Emit::Opcode(code));
            ctx.sections.emit(Emit::Byte(0x9f));
            ctx.sections.emit(Emit::Word(a as u16));
            Ok(())
        }
        Node::Undefined => {
            ctx.sections.emit(Emit::Opcode(code));
            ctx.sections.emit(Emit::Byte(0x9f));
            ctx.sections.emit(Emit::Pad(2));
            Ok(())
        }
        _ => Err(invalid_mode(ctx, op)),
    }
}

/// Register field (bits 5-6) of an indexed postbyte.
fn index_reg_bits(r: Reg) -> Option<u8> {
    match r {
        Reg::X => Some(0x00),
        Reg::Y => Some(0x20),
        Reg::U => Some(0x40),
        Reg::S => Some(0x60),
        _ => None,
    }
}

/// Offset size chosen for a constant offset.
#[derive(Clone, Copy, PartialEq, Eq)]
enum OffsetSize {
    Zero,
    Five,
    Eight,
    Sixteen,
}

fn indexed(
    ctx: &mut Context,
    op: &Opcode,
    offset: &Value,
    reg: &Value,
    indirect: bool,
) -> Result<(), AsmError> {
    let Some(code) = op.indexed() else {
        return Err(invalid_mode(ctx, op));
    };
    let Some(r) = reg.as_reg() else {
        return Err(invalid_mode(ctx, op));
    };
    let ind: u8 = if indirect { 0x10 } else { 0 };

    if matches!(r, Reg::Pc | Reg::Pcr) {
        return pc_relative(ctx, op, code, offset, r == Reg::Pcr, ind);
    }
    let Some(rr) = index_reg_bits(r) else {
        return Err(invalid_mode(ctx, op));
    };

    let auto = match reg.attr() {
        Attr::PostInc if !indirect => Some(0x80),
        Attr::PostInc2 => Some(0x81),
        Attr::PreDec if !indirect => Some(0x82),
        Attr::PreDec2 => Some(0x83),
        Attr::PostInc | Attr::PreDec | Attr::PostDec => return Err(invalid_mode(ctx, op)),
        _ => None,
    };
    if let Some(mode) = auto {
        if !offset.is_empty() {
            return Err(invalid_mode(ctx, op));
        }
        ctx.sections.emit(Emit::Opcode(code));
        ctx.sections.emit(Emit::Byte(mode | rr | ind));
        return Ok(());
    }

    match offset.node() {
        Node::Empty => {
            ctx.sections.emit(Emit::Opcode(code));
            ctx.sections.emit(Emit::Byte(0x84 | rr | ind));
            Ok(())
        }
        Node::Register(acc) => {
            let post = match acc {
                Reg::A => 0x86,
                Reg::B => 0x85,
                Reg::D => 0x8b,
                _ => return Err(invalid_mode(ctx, op)),
            };
            ctx.sections.emit(Emit::Opcode(code));
            ctx.sections.emit(Emit::Byte(post | rr | ind));
            Ok(())
        }
        Node::Undefined => {
            ctx.sections.emit(Emit::Opcode(code));
            ctx.sections.emit(Emit::Byte(0x89 | rr | ind));
            ctx.sections.emit(Emit::Pad(2));
            Ok(())
        }
        Node::Int(n) => {
            let n = *n;
            let size = match offset.attr() {
                Attr::Bits5 if !indirect => OffsetSize::Five,
                Attr::Bits5 | Attr::Bits8 => OffsetSize::Eight,
                Attr::Bits16 => OffsetSize::Sixteen,
                _ if n == 0 => OffsetSize::Zero,
                _ if !indirect && (-16..=15).contains(&n) => OffsetSize::Five,
                _ if (-128..=127).contains(&n) => OffsetSize::Eight,
                _ => OffsetSize::Sixteen,
            };
            ctx.sections.emit(Emit::Opcode(code));
            match size {
                OffsetSize::Zero => ctx.sections.emit(Emit::Byte(0x84 | rr | ind)),
                OffsetSize::Five => ctx.sections.emit(Emit::Byte(rr | (n as u8 & 0x1f))),
                OffsetSize::Eight => {
                    ctx.sections.emit(Emit::Byte(0x88 | rr | ind));
                    ctx.sections.emit(Emit::Byte(n as u8));
                }
                OffsetSize::Sixteen => {
                    ctx.sections.emit(Emit::Byte(0x89 | rr | ind));
                    ctx.sections.emit(Emit::Word(n as u16));
                }
            }
            let fits = match size {
                OffsetSize::Zero | OffsetSize::Sixteen => true,
                OffsetSize::Five => (-16..=15).contains(&n),
                OffsetSize::Eight => (-128..=127).contains(&n),
            };
            if fits {
                Ok(())
            } else {
                Err(out_of_range(
                    ctx,
                    alloc::format!("offset {} does not fit the forced size", n),
                ))
            }
        }
        _ => Err(invalid_mode(ctx, op)),
    }
}

/// `n,PC` (raw offset) and `addr,PCR` (offset computed from the address).
fn pc_relative(
    ctx: &mut Context,
    op: &Opcode,
    code: u16,
    offset: &Value,
    relative: bool,
    ind: u8,
) -> Result<(), AsmError> {
    let pc = ctx.sections.current().pc;
    let end8 = pc.wrapping_add(opcode_len(code) + 2);
    let end16 = end8.wrapping_add(1);
    let value = match offset.node() {
        Node::Int(n) => Some(*n),
        Node::Undefined => None,
        Node::Empty if !relative => Some(0),
        _ => return Err(invalid_mode(ctx, op)),
    };
    let off8 = value.map(|v| if relative { v.wrapping_sub(end8) } else { v });
    let short = match (offset.attr(), off8) {
        (Attr::Bits8 | Attr::Bits5, _) => true,
        (Attr::Bits16, _) | (_, None) => false,
        (_, Some(o)) => (-128..=127).contains(&o),
    };
    ctx.sections.emit(Emit::Opcode(code));
    if short {
        ctx.sections.emit(Emit::Byte(0x8c | ind));
        match off8 {
            Some(o) => {
                ctx.sections.emit(Emit::Byte(o as u8));
                if !(-128..=127).contains(&o) {
                    return Err(out_of_range(
                        ctx,
                        alloc::format!("PC-relative offset {} out of 8-bit range", o),
                    ));
                }
            }
            None => ctx.sections.emit(Emit::Pad(1)),
        }
    } else {
        ctx.sections.emit(Emit::Byte(0x8d | ind));
        match value {
            Some(v) => {
                let o = if relative { v.wrapping_sub(end16) } else { v };
                ctx.sections.emit(Emit::Word(o as u16));
            }
            None => ctx.sections.emit(Emit::Pad(2)),
        }
    }
    Ok(())
}

/// Relative branches.
///
/// # Errors
///
/// Out-of-range error when a short branch target is more than 128 bytes
/// away.
pub fn relative(
    ctx: &mut Context,
    op: &Opcode,
    args: &[Value],
    wide: bool,
) -> Result<(), AsmError> {
    let [target] = args else {
        return Err(invalid_mode(ctx, op));
    };
    let target = match target.node() {
        Node::Int(t) => Some(*t),
        Node::Undefined => None,
        _ => return Err(invalid_mode(ctx, op)),
    };
    let len = opcode_len(op.code) + if wide { 2 } else { 1 };
    let end = ctx.sections.current().pc.wrapping_add(len);
    ctx.sections.emit(Emit::Opcode(op.code));
    match (target, wide) {
        (None, true) => ctx.sections.emit(Emit::Pad(2)),
        (None, false) => ctx.sections.emit(Emit::Pad(1)),
        (Some(t), true) => ctx.sections.emit(Emit::Word(t.wrapping_sub(end) as u16)),
        (Some(t), false) => {
            let off = t.wrapping_sub(end);
            ctx.sections.emit(Emit::Byte(off as u8));
            if !(-128..=127).contains(&off) {
                return Err(out_of_range(
                    ctx,
                    alloc::format!("branch offset {} out of range", off),
                ));
            }
        }
    }
    Ok(())
}

/// Register bit for PSHS/PULS/PSHU/PULU.
fn stack_bit(r: Reg, stack: Reg) -> Option<u8> {
    match r {
        Reg::Pc => Some(0x80),
        Reg::U | Reg::S if r == stack => None,
        Reg::U | Reg::S => Some(0x40),
        Reg::Y => Some(0x20),
        Reg::X => Some(0x10),
        Reg::Dp => Some(0x08),
        Reg::B => Some(0x04),
        Reg::A => Some(0x02),
        Reg::Cc => Some(0x01),
        Reg::D => Some(0x06),
        Reg::Pcr => None,
    }
}

/// Push / pull register lists.  `stack` is the instruction's own stack
/// pointer, which cannot appear in its list.
///
/// # Errors
///
/// Syntax error for non-register entries and for the instruction's own
/// stack pointer.
pub fn stack(ctx: &mut Context, op: &Opcode, args: &[Value], stack: Reg) -> Result<(), AsmError> {
    let mut post = 0u8;
    for a in args {
        if a.is_empty() {
            continue;
        }
        let bit = a.as_reg().and_then(|r| stack_bit(r, stack));
        match bit {
            Some(b) => post |= b,
            None => {
                ctx.sections.emit(Emit::Opcode(op.code));
                ctx.sections.emit(Emit::Byte(post));
                return Err(ctx.syntax(&alloc::format!("invalid register '{}' in {}", a, op.name)));
            }
        }
    }
    ctx.sections.emit(Emit::Opcode(op.code));
    ctx.sections.emit(Emit::Byte(post));
    Ok(())
}

/// EXG/TFR register code, and whether the register is 16 bits wide.
fn pair_code(r: Reg) -> Option<(u8, bool)> {
    match r {
        Reg::D => Some((0x0, true)),
        Reg::X => Some((0x1, true)),
        Reg::Y => Some((0x2, true)),
        Reg::U => Some((0x3, true)),
        Reg::S => Some((0x4, true)),
        Reg::Pc => Some((0x5, true)),
        Reg::A => Some((0x8, false)),
        Reg::B => Some((0x9, false)),
        Reg::Cc => Some((0xa, false)),
        Reg::Dp => Some((0xb, false)),
        Reg::Pcr => None,
    }
}

/// EXG / TFR.
///
/// # Errors
///
/// Syntax error unless given exactly two registers of the same size.
pub fn pair(ctx: &mut Context, op: &Opcode, args: &[Value]) -> Result<(), AsmError> {
    let codes = match args {
        [a, b] => a
            .as_reg()
            .and_then(pair_code)
            .zip(b.as_reg().and_then(pair_code)),
        _ => None,
    };
    ctx.sections.emit(Emit::Opcode(op.code));
    match codes {
        Some(((src, wide_src), (dst, wide_dst))) => {
            ctx.sections.emit(Emit::Byte(src << 4 | dst));
            if wide_src != wide_dst {
                return Err(ctx.syntax(&alloc::format!("register size mismatch in {}", op.name)));
            }
            Ok(())
        }
        None => {
            ctx.sections.emit(Emit::Pad(1));
            Err(invalid_mode(ctx, op))
        }
    }
}
