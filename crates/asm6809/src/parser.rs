//! 6809 source parser.
//!
//! Converts source lines into [`ProgramLine`]s whose label, opcode and
//! argument fields are [`Value`] syntax trees.  Nothing is evaluated here:
//! identifiers stay identifiers until the driver resolves them in a pass.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{AsmError, Location};
use crate::lexer::{self, Part, Token, TokenKind};
use crate::program::{Program, ProgramLine};
use crate::value::{Attr, Op, Reg, Value};

/// Parse a whole source text into a [`Program`].
///
/// Lines that fail to parse are kept as empty lines so that line numbering
/// stays identical from pass to pass; their errors are returned alongside.
#[must_use]
pub fn parse_program(name: &str, source: &str) -> (Program, Vec<AsmError>) {
    let mut program = Program::new(name);
    let mut errors = Vec::new();
    let source_name: Rc<str> = Rc::from(name);
    for (idx, text) in source.lines().enumerate() {
        let line_no = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        match parse_line(text, &source_name, line_no) {
            Ok(line) => program.lines.push(line),
            Err(e) => {
                errors.push(e);
                program.lines.push(ProgramLine {
                    label: None,
                    opcode: None,
                    args: None,
                    text: Rc::from(text),
                    source: Rc::clone(&source_name),
                    line: line_no,
                });
            }
        }
    }
    (program, errors)
}

/// Parse a single source line.
///
/// # Errors
///
/// Returns `Err(AsmError::Syntax)` for malformed labels, opcodes or
/// operand expressions.
pub fn parse_line(text: &str, source: &Rc<str>, line: u32) -> Result<ProgramLine, AsmError> {
    let loc = Location::new(source, line);
    let fields = lexer::split_line(text);

    let label = fields.label.map(|l| parse_label(l, &loc)).transpose()?;
    let opcode = fields.opcode.map(|o| parse_name(o, &loc)).transpose()?;
    let args = match (fields.opcode, fields.operands) {
        (Some(op), Some(field)) => Some(parse_operands(op, field, &loc)?),
        _ => None,
    };

    Ok(ProgramLine {
        label,
        opcode,
        args,
        text: Rc::from(text),
        source: Rc::clone(source),
        line,
    })
}

/// A label is either a numeric local label or an identifier.
fn parse_label(text: &str, loc: &Location) -> Result<Value, AsmError> {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<i64>().map(Value::int).map_err(|_| AsmError::Syntax {
            msg: alloc::format!("invalid local label '{}'", text),
            loc: loc.clone(),
        });
    }
    parse_name(text, loc)
}

/// Parse an identifier field (label or opcode), keeping interpolations.
fn parse_name(text: &str, loc: &Location) -> Result<Value, AsmError> {
    let tokens = lexer::tokenize(text, loc)?;
    match tokens.as_slice() {
        [Token {
            kind: TokenKind::Ident(parts),
            ..
        }, Token {
            kind: TokenKind::Eof,
            ..
        }] => Ok(Value::id(parts_to_values(parts))),
        [Token {
            kind: TokenKind::Interp(name),
            ..
        }, Token {
            kind: TokenKind::Eof,
            ..
        }] => Ok(Value::id(alloc::vec![Value::interp(name.clone())])),
        _ => Err(AsmError::Syntax {
            msg: alloc::format!("invalid name '{}'", text),
            loc: loc.clone(),
        }),
    }
}

fn parts_to_values(parts: &[Part]) -> Vec<Value> {
    parts
        .iter()
        .map(|p| match p {
            Part::Lit(s) => Value::string(s.clone()),
            Part::Interp(s) => Value::interp(s.clone()),
        })
        .collect()
}

/// Parse an operand field into an argument array.
fn parse_operands(opcode: &str, field: &str, loc: &Location) -> Result<Value, AsmError> {
    if opcode.eq_ignore_ascii_case("fcc") {
        if let Some(text) = delimited_string(field) {
            return Ok(Value::array(alloc::vec![Value::string(text)]));
        }
    }
    let tokens = lexer::tokenize(field, loc)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        loc,
    };
    let items = parser.parse_list()?;
    if !parser.at_end() {
        return Err(parser.unexpected());
    }
    Ok(Value::array(items))
}

/// `/text/` style string, for FCC.
fn delimited_string(field: &str) -> Option<&str> {
    let delim = field.chars().next()?;
    if !delim.is_ascii_punctuation() || "\"(&$%@-+<>#*~[,_.".contains(delim) {
        return None;
    }
    let inner = field[1..].strip_suffix(delim)?;
    Some(inner)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    loc: &'a Location,
}

impl<'a> Parser<'a> {
    #[inline]
    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    #[inline]
    fn peek_at(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    #[inline]
    fn advance(&mut self) -> &TokenKind {
        let idx = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[idx].kind
    }

    #[inline]
    fn at_end(&self) -> bool {
        *self.peek() == TokenKind::Eof
    }

    fn unexpected(&self) -> AsmError {
        let idx = self.pos.min(self.tokens.len() - 1);
        let what = match &self.tokens[idx].kind {
            TokenKind::Eof => String::from("unexpected end of operand"),
            other => alloc::format!("unexpected {:?} at column {}", other, self.tokens[idx].pos + 1),
        };
        AsmError::Syntax {
            msg: what,
            loc: self.loc.clone(),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), AsmError> {
        if self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Whether the token `n` ahead closes an argument item.
    fn is_item_end(&self, n: usize) -> bool {
        matches!(
            self.peek_at(n),
            TokenKind::Comma | TokenKind::CloseBracket | TokenKind::Eof
        )
    }

    /// Register named by the identifier `n` tokens ahead.
    fn reg_at(&self, n: usize) -> Option<Reg> {
        match self.peek_at(n) {
            TokenKind::Ident(parts) => match parts.as_slice() {
                [Part::Lit(name)] => Reg::from_name(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Comma separated items; empty items become [`Value::empty`].
    fn parse_list(&mut self) -> Result<Vec<Value>, AsmError> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_item()?);
            if *self.peek() == TokenKind::Comma {
                self.advance();
            } else {
                return Ok(items);
            }
        }
    }

    fn parse_item(&mut self) -> Result<Value, AsmError> {
        if self.is_item_end(0) {
            return Ok(Value::empty());
        }

        // Auto increment / decrement register forms.
        if let Some(r) = self.reg_at(0) {
            let mode = match (self.peek_at(1), self.peek_at(2)) {
                (TokenKind::Plus, TokenKind::Plus) if self.is_item_end(3) => Some((Attr::PostInc2, 3)),
                (TokenKind::Plus, _) if self.is_item_end(2) => Some((Attr::PostInc, 2)),
                (TokenKind::Minus, _) if self.is_item_end(2) => Some((Attr::PostDec, 2)),
                _ => None,
            };
            if let Some((attr, n)) = mode {
                self.pos += n;
                return Ok(Value::reg(r).with_attr(attr));
            }
        }
        if *self.peek() == TokenKind::Minus {
            if let Some(r) = self.reg_at(1) {
                if self.is_item_end(2) {
                    self.pos += 2;
                    return Ok(Value::reg(r).with_attr(Attr::PreDec));
                }
            }
            if *self.peek_at(1) == TokenKind::Minus {
                if let Some(r) = self.reg_at(2) {
                    if self.is_item_end(3) {
                        self.pos += 3;
                        return Ok(Value::reg(r).with_attr(Attr::PreDec2));
                    }
                }
            }
        }

        let attr = match self.peek() {
            TokenKind::Hash => Some(Attr::Immediate),
            TokenKind::Shl => Some(Attr::Bits5),
            TokenKind::Lt => Some(Attr::Bits8),
            TokenKind::Gt => Some(Attr::Bits16),
            TokenKind::OpenBracket => {
                self.advance();
                let items = self.parse_list()?;
                self.expect(&TokenKind::CloseBracket)?;
                return Ok(Value::array(items).with_attr(Attr::Indirect));
            }
            _ => None,
        };
        if let Some(attr) = attr {
            self.advance();
            return Ok(self.parse_expr()?.with_attr(attr));
        }
        self.parse_expr()
    }

    fn parse_expr(&mut self) -> Result<Value, AsmError> {
        self.expr_or()
    }

    // ── Precedence levels ──────────────────────────────────

    fn expr_or(&mut self) -> Result<Value, AsmError> {
        let mut val = self.expr_xor()?;
        while *self.peek() == TokenKind::Pipe {
            self.advance();
            val = Value::binary(Op::Or, val, self.expr_xor()?);
        }
        Ok(val)
    }

    fn expr_xor(&mut self) -> Result<Value, AsmError> {
        let mut val = self.expr_and()?;
        while *self.peek() == TokenKind::Caret {
            self.advance();
            val = Value::binary(Op::Xor, val, self.expr_and()?);
        }
        Ok(val)
    }

    fn expr_and(&mut self) -> Result<Value, AsmError> {
        let mut val = self.expr_shift()?;
        while *self.peek() == TokenKind::Amp {
            self.advance();
            val = Value::binary(Op::And, val, self.expr_shift()?);
        }
        Ok(val)
    }

    fn expr_shift(&mut self) -> Result<Value, AsmError> {
        let mut val = self.expr_add()?;
        loop {
            let op = match self.peek() {
                TokenKind::Shl => Op::Shl,
                TokenKind::Shr => Op::Shr,
                _ => return Ok(val),
            };
            self.advance();
            val = Value::binary(op, val, self.expr_add()?);
        }
    }

    fn expr_add(&mut self) -> Result<Value, AsmError> {
        let mut val = self.expr_mul()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => Op::Add,
                TokenKind::Minus => Op::Sub,
                _ => return Ok(val),
            };
            self.advance();
            val = Value::binary(op, val, self.expr_mul()?);
        }
    }

    fn expr_mul(&mut self) -> Result<Value, AsmError> {
        let mut val = self.expr_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => Op::Mul,
                TokenKind::Slash => Op::Div,
                TokenKind::Percent => Op::Mod,
                _ => return Ok(val),
            };
            self.advance();
            val = Value::binary(op, val, self.expr_unary()?);
        }
    }

    fn expr_unary(&mut self) -> Result<Value, AsmError> {
        let op = match self.peek() {
            TokenKind::Minus => Op::Sub,
            TokenKind::Plus => Op::Add,
            TokenKind::Tilde => Op::Not,
            TokenKind::Bang => Op::LogicalNot,
            _ => return self.expr_primary(),
        };
        self.advance();
        Ok(Value::unary(op, self.expr_unary()?))
    }

    fn expr_primary(&mut self) -> Result<Value, AsmError> {
        let val = match self.peek() {
            TokenKind::Number(n) => Value::int(*n),
            TokenKind::Float(f) => Value::float(*f),
            TokenKind::Char(c) => Value::int(i64::from(*c)),
            TokenKind::BackRef(n) => Value::back_ref(*n),
            TokenKind::FwdRef(n) => Value::fwd_ref(*n),
            TokenKind::Interp(name) => Value::interp(name.clone()),
            TokenKind::Pc => Value::pc(),
            TokenKind::Str(parts) => match parts.as_slice() {
                [Part::Lit(s)] => Value::string(s.clone()),
                _ => Value::text(parts_to_values(parts)),
            },
            TokenKind::Ident(parts) => match self.reg_at(0) {
                Some(r) => Value::reg(r),
                None => Value::id(parts_to_values(parts)),
            },
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::CloseParen)?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(val)
    }
}
