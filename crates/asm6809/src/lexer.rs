//! Lexer for 6809 assembly source text.
//!
//! Source is line oriented and column sensitive: a label starts in the
//! first column, the opcode follows whitespace, then the operand field,
//! and anything after the operand field is a comment.  [`split_line`]
//! carves a line into those fields and [`tokenize`] turns an operand field
//! into [`Token`]s for the expression parser.

use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{AsmError, Location};

/// Fields of one source line, borrowed from the line text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineFields<'src> {
    /// Label text without any trailing `:`.
    pub label: Option<&'src str>,
    /// Opcode / pseudo-op / macro name.
    pub opcode: Option<&'src str>,
    /// Raw operand field.
    pub operands: Option<&'src str>,
}

/// One literal or interpolated piece of an identifier or string.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Literal text.
    Lit(String),
    /// `&{name}` or `&n`: interpolated at evaluation time.
    Interp(String),
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token classification.
    pub kind: TokenKind,
    /// Byte offset of the token within the tokenized field.
    pub pos: usize,
}

/// The type of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier, possibly glued to `&{...}` interpolations.
    Ident(Vec<Part>),
    /// Integer literal.
    Number(i64),
    /// Floating-point literal.
    Float(f64),
    /// Double-quoted string.
    Str(Vec<Part>),
    /// `'c` character literal.
    Char(u8),
    /// `nB` backward local label reference.
    BackRef(i64),
    /// `nF` forward local label reference.
    FwdRef(i64),
    /// Bare `&n` / `&{name}` in operand position.
    Interp(String),
    /// `*` in operand position: the program counter.
    Pc,
    /// `,`
    Comma,
    /// `#`
    Hash,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*` in operator position.
    Star,
    /// `/`
    Slash,
    /// `%` in operator position.
    Percent,
    /// `&` in operator position.
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `!`
    Bang,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// End of field.
    Eof,
}

impl TokenKind {
    /// Whether a token of this kind ends an operand, so that a following
    /// `*`, `%` or `&` is read as an operator.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Number(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::Char(_)
                | TokenKind::BackRef(_)
                | TokenKind::FwdRef(_)
                | TokenKind::Interp(_)
                | TokenKind::Pc
                | TokenKind::CloseParen
                | TokenKind::CloseBracket
        )
    }
}

#[inline]
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'.' || b == b'?'
}

#[inline]
fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'?' || b == b'$' || b == b'@'
}

/// Whether a byte is blank for field splitting.
#[inline]
fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\r'
}

/// Whether `opcode` takes a delimited string (`FCC /text/`).
fn takes_delimited(opcode: &str) -> bool {
    opcode.eq_ignore_ascii_case("fcc")
}

/// Skip blanks, then return the word at `pos` unless a comment starts.
fn next_word<'src>(line: &'src str, pos: &mut usize) -> Option<&'src str> {
    let bytes = line.as_bytes();
    let len = bytes.len();
    while *pos < len && is_blank(bytes[*pos]) {
        *pos += 1;
    }
    if *pos >= len || bytes[*pos] == b';' {
        return None;
    }
    let start = *pos;
    while *pos < len && !is_blank(bytes[*pos]) && bytes[*pos] != b';' {
        *pos += 1;
    }
    Some(&line[start..*pos])
}

/// Split a source line into label, opcode and operand fields.
///
/// Lines starting with `*` or `;` are comments.  A label starts in the
/// first column; a first word ending in `:` is also a label when the line
/// is indented.  The operand field ends at the first blank outside quotes,
/// parentheses or brackets, or at a `;`.
#[must_use]
pub fn split_line(line: &str) -> LineFields<'_> {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut fields = LineFields::default();
    if len == 0 || bytes[0] == b'*' || bytes[0] == b';' {
        return fields;
    }

    let mut pos = 0;
    if !is_blank(bytes[0]) {
        let start = pos;
        while pos < len && !is_blank(bytes[pos]) && bytes[pos] != b';' {
            pos += 1;
        }
        let word = &line[start..pos];
        let word = word.strip_suffix(':').unwrap_or(word);
        if !word.is_empty() {
            fields.label = Some(word);
        }
    }

    let mut opcode = next_word(line, &mut pos);
    if fields.label.is_none() {
        if let Some(word) = opcode {
            if let Some(label) = word.strip_suffix(':') {
                if !label.is_empty() {
                    fields.label = Some(label);
                    opcode = next_word(line, &mut pos);
                }
            }
        }
    }
    let Some(opcode) = opcode else {
        return fields;
    };
    fields.opcode = Some(opcode);

    while pos < len && is_blank(bytes[pos]) {
        pos += 1;
    }
    if pos >= len || bytes[pos] == b';' {
        return fields;
    }
    let start = pos;

    if takes_delimited(opcode) {
        let delim = bytes[pos];
        if delim.is_ascii_punctuation() && !b"\"(&$%@-+<>#*~[,_.".contains(&delim) {
            if let Some(end) = line[pos + 1..].find(delim as char) {
                let end = pos + 1 + end + 1;
                fields.operands = Some(&line[start..end]);
                return fields;
            }
        }
    }

    let mut depth = 0i32;
    while pos < len {
        match bytes[pos] {
            b'"' => {
                pos += 1;
                while pos < len && bytes[pos] != b'"' {
                    if bytes[pos] == b'\\' {
                        pos += 1;
                    }
                    pos += 1;
                }
            }
            b'\'' => {
                // Character literal: the next byte is taken verbatim.
                pos += 1;
                if pos < len && bytes[pos] == b'\\' {
                    pos += 1;
                }
                if pos + 1 < len && bytes[pos + 1] == b'\'' {
                    pos += 1;
                }
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b';' if depth <= 0 => break,
            b if is_blank(b) && depth <= 0 => break,
            _ => {}
        }
        pos += 1;
    }
    let end = pos.min(len);
    fields.operands = Some(&line[start..end]);
    fields
}

fn syntax(msg: String, loc: &Location) -> AsmError {
    AsmError::Syntax {
        msg,
        loc: loc.clone(),
    }
}

/// Read an interpolation body after `&`: either `{name}` or a run of digits.
fn interp_at(bytes: &[u8], pos: &mut usize, loc: &Location) -> Result<String, AsmError> {
    let len = bytes.len();
    if *pos < len && bytes[*pos] == b'{' {
        let start = *pos + 1;
        let mut end = start;
        while end < len && bytes[end] != b'}' {
            end += 1;
        }
        if end >= len {
            return Err(syntax(String::from("unterminated '&{' interpolation"), loc));
        }
        *pos = end + 1;
        return Ok(String::from_utf8_lossy(&bytes[start..end]).into_owned());
    }
    let start = *pos;
    while *pos < len && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    if *pos == start {
        return Err(syntax(String::from("expected argument number after '&'"), loc));
    }
    Ok(String::from_utf8_lossy(&bytes[start..*pos]).into_owned())
}

fn parse_radix(digits: &str, radix: u32, prefix: &str, loc: &Location) -> Result<i64, AsmError> {
    if digits.is_empty() {
        return Err(syntax(alloc::format!("expected digits after '{}'", prefix), loc));
    }
    u64::from_str_radix(digits, radix)
        .map(|v| v as i64)
        .map_err(|_| syntax(alloc::format!("invalid number '{}{}'", prefix, digits), loc))
}

fn escape(b: u8) -> u8 {
    match b {
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'0' => 0,
        b'e' => 0x1b,
        other => other,
    }
}

/// Tokenize an operand field.
///
/// Recognises identifiers (with `&{...}` interpolation glued on), numbers
/// in decimal, `$`/`0x` hex, `%` binary and `@` octal, floats, `nB`/`nF`
/// local label references, strings, `'c` characters, `&n` arguments and
/// the operator punctuation.  `*`, `%` and `&` read as operators after an
/// operand and as the PC, a binary number or an interpolation otherwise.
///
/// # Errors
///
/// Returns `Err(AsmError::Syntax)` for unrecognised characters and
/// malformed literals.
pub fn tokenize(field: &str, loc: &Location) -> Result<Vec<Token>, AsmError> {
    let bytes = field.as_bytes();
    let len = bytes.len();
    let mut tokens: Vec<Token> = Vec::with_capacity(len / 2 + 1);
    let mut pos = 0;

    while pos < len {
        let ch = bytes[pos];
        let start = pos;
        let after_operand = tokens.last().is_some_and(|t| t.kind.ends_operand());

        if is_blank(ch) {
            pos += 1;
            continue;
        }

        let kind = match ch {
            b',' => TokenKind::Comma,
            b'#' => TokenKind::Hash,
            b'[' => TokenKind::OpenBracket,
            b']' => TokenKind::CloseBracket,
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'/' => TokenKind::Slash,
            b'|' => TokenKind::Pipe,
            b'^' => TokenKind::Caret,
            b'~' => TokenKind::Tilde,
            b'!' => TokenKind::Bang,
            b'*' if after_operand => TokenKind::Star,
            b'*' => TokenKind::Pc,
            b'%' if after_operand => TokenKind::Percent,
            b'&' if after_operand => TokenKind::Amp,
            b'<' if pos + 1 < len && bytes[pos + 1] == b'<' => {
                pos += 1;
                TokenKind::Shl
            }
            b'<' => TokenKind::Lt,
            b'>' if pos + 1 < len && bytes[pos + 1] == b'>' => {
                pos += 1;
                TokenKind::Shr
            }
            b'>' => TokenKind::Gt,
            b'%' => {
                pos += 1;
                let s = pos;
                while pos < len && (bytes[pos] == b'0' || bytes[pos] == b'1') {
                    pos += 1;
                }
                let v = parse_radix(&field[s..pos], 2, "%", loc)?;
                tokens.push(Token {
                    kind: TokenKind::Number(v),
                    pos: start,
                });
                continue;
            }
            b'$' => {
                pos += 1;
                let s = pos;
                while pos < len && bytes[pos].is_ascii_hexdigit() {
                    pos += 1;
                }
                let v = parse_radix(&field[s..pos], 16, "$", loc)?;
                tokens.push(Token {
                    kind: TokenKind::Number(v),
                    pos: start,
                });
                continue;
            }
            b'@' => {
                pos += 1;
                let s = pos;
                while pos < len && (b'0'..=b'7').contains(&bytes[pos]) {
                    pos += 1;
                }
                let v = parse_radix(&field[s..pos], 8, "@", loc)?;
                tokens.push(Token {
                    kind: TokenKind::Number(v),
                    pos: start,
                });
                continue;
            }
            b'&' => {
                pos += 1;
                let name = interp_at(bytes, &mut pos, loc)?;
                let kind = if pos < len && is_ident_char(bytes[pos]) {
                    let mut parts = vec![Part::Interp(name)];
                    lex_ident_parts(bytes, &mut pos, &mut parts, loc)?;
                    TokenKind::Ident(parts)
                } else {
                    TokenKind::Interp(name)
                };
                tokens.push(Token { kind, pos: start });
                continue;
            }
            b'\'' => {
                pos += 1;
                if pos >= len {
                    return Err(syntax(String::from("missing character after '"), loc));
                }
                let mut c = bytes[pos];
                if c == b'\\' && pos + 1 < len {
                    pos += 1;
                    c = escape(bytes[pos]);
                }
                pos += 1;
                if pos < len && bytes[pos] == b'\'' {
                    pos += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Char(c),
                    pos: start,
                });
                continue;
            }
            b'"' => {
                pos += 1;
                let mut parts = Vec::new();
                let mut lit: Vec<u8> = Vec::new();
                loop {
                    if pos >= len {
                        return Err(syntax(String::from("unterminated string literal"), loc));
                    }
                    match bytes[pos] {
                        b'"' => {
                            pos += 1;
                            break;
                        }
                        b'\\' if pos + 1 < len => {
                            lit.push(escape(bytes[pos + 1]));
                            pos += 2;
                        }
                        b'&' if pos + 1 < len && bytes[pos + 1] == b'{' => {
                            if !lit.is_empty() {
                                parts.push(Part::Lit(String::from_utf8_lossy(&lit).into_owned()));
                                lit.clear();
                            }
                            pos += 1;
                            parts.push(Part::Interp(interp_at(bytes, &mut pos, loc)?));
                        }
                        b => {
                            lit.push(b);
                            pos += 1;
                        }
                    }
                }
                if !lit.is_empty() || parts.is_empty() {
                    parts.push(Part::Lit(String::from_utf8_lossy(&lit).into_owned()));
                }
                tokens.push(Token {
                    kind: TokenKind::Str(parts),
                    pos: start,
                });
                continue;
            }
            b'0'..=b'9' => {
                let kind = lex_number(field, &mut pos, loc)?;
                tokens.push(Token { kind, pos: start });
                continue;
            }
            b if is_ident_start(b) => {
                let mut parts = Vec::new();
                lex_ident_parts(bytes, &mut pos, &mut parts, loc)?;
                tokens.push(Token {
                    kind: TokenKind::Ident(parts),
                    pos: start,
                });
                continue;
            }
            other => {
                return Err(syntax(
                    alloc::format!("unexpected character '{}'", other as char),
                    loc,
                ));
            }
        };
        pos += 1;
        tokens.push(Token { kind, pos: start });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: len,
    });
    Ok(tokens)
}

/// Continue an identifier at `pos`, gluing literal runs and `&{...}`
/// interpolations into `parts`.
fn lex_ident_parts(
    bytes: &[u8],
    pos: &mut usize,
    parts: &mut Vec<Part>,
    loc: &Location,
) -> Result<(), AsmError> {
    let len = bytes.len();
    loop {
        let s = *pos;
        while *pos < len && is_ident_char(bytes[*pos]) {
            *pos += 1;
        }
        if *pos > s {
            parts.push(Part::Lit(String::from_utf8_lossy(&bytes[s..*pos]).into_owned()));
        }
        if *pos + 1 < len && bytes[*pos] == b'&' && bytes[*pos + 1] == b'{' {
            *pos += 1;
            parts.push(Part::Interp(interp_at(bytes, pos, loc)?));
            continue;
        }
        return Ok(());
    }
}

/// Lex a literal starting with a digit: decimal, `0x` hex, float, or a
/// `nB` / `nF` local label reference.
fn lex_number(field: &str, pos: &mut usize, loc: &Location) -> Result<TokenKind, AsmError> {
    let bytes = field.as_bytes();
    let len = bytes.len();
    let start = *pos;

    if bytes[start] == b'0' && start + 1 < len && (bytes[start + 1] | 0x20) == b'x' {
        *pos += 2;
        let s = *pos;
        while *pos < len && bytes[*pos].is_ascii_hexdigit() {
            *pos += 1;
        }
        return parse_radix(&field[s..*pos], 16, "0x", loc).map(TokenKind::Number);
    }

    while *pos < len && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    let digits = &field[start..*pos];

    let ends_word = |p: usize| p >= len || !is_ident_char(bytes[p]);
    if *pos < len && ends_word(*pos + 1) {
        let n = parse_radix(digits, 10, "", loc)?;
        match bytes[*pos] {
            b'b' | b'B' => {
                *pos += 1;
                return Ok(TokenKind::BackRef(n));
            }
            b'f' | b'F' => {
                *pos += 1;
                return Ok(TokenKind::FwdRef(n));
            }
            _ => {}
        }
    }

    let mut is_float = false;
    if *pos + 1 < len && bytes[*pos] == b'.' && bytes[*pos + 1].is_ascii_digit() {
        is_float = true;
        *pos += 1;
        while *pos < len && bytes[*pos].is_ascii_digit() {
            *pos += 1;
        }
    }
    if *pos < len && (bytes[*pos] | 0x20) == b'e' {
        let mut p = *pos + 1;
        if p < len && (bytes[p] == b'+' || bytes[p] == b'-') {
            p += 1;
        }
        if p < len && bytes[p].is_ascii_digit() {
            is_float = true;
            while p < len && bytes[p].is_ascii_digit() {
                p += 1;
            }
            *pos = p;
        }
    }
    if is_float {
        let text = &field[start..*pos];
        return text
            .parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| syntax(alloc::format!("invalid number '{}'", text), loc));
    }
    if *pos < len && is_ident_char(bytes[*pos]) {
        return Err(syntax(
            alloc::format!("invalid number '{}{}'", digits, bytes[*pos] as char),
            loc,
        ));
    }
    parse_radix(digits, 10, "", loc).map(TokenKind::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src, &Location::new("t.s", 1))
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lit(s: &str) -> Part {
        Part::Lit(String::from(s))
    }

    #[test]
    fn split_full_line() {
        let f = split_line("start   lda   #$10,x   load it");
        assert_eq!(f.label, Some("start"));
        assert_eq!(f.opcode, Some("lda"));
        assert_eq!(f.operands, Some("#$10,x"));
    }

    #[test]
    fn split_comment_lines() {
        assert_eq!(split_line("* banner"), LineFields::default());
        assert_eq!(split_line("; note"), LineFields::default());
        assert_eq!(split_line(""), LineFields::default());
        let f = split_line("        nop ; trailing");
        assert_eq!(f.opcode, Some("nop"));
        assert_eq!(f.operands, None);
    }

    #[test]
    fn split_label_with_colon() {
        let f = split_line("loop:");
        assert_eq!(f.label, Some("loop"));
        assert_eq!(f.opcode, None);
        let f = split_line("  here: rts");
        assert_eq!(f.label, Some("here"));
        assert_eq!(f.opcode, Some("rts"));
    }

    #[test]
    fn split_keeps_quoted_blanks() {
        let f = split_line(" fcc \"a b\",' ',0 rest");
        assert_eq!(f.operands, Some("\"a b\",' ',0"));
        let f = split_line(" fcc /hello world/ comment");
        assert_eq!(f.operands, Some("/hello world/"));
        let f = split_line(" ldd (1 + 2)*3 comment");
        assert_eq!(f.operands, Some("(1 + 2)*3"));
    }

    #[test]
    fn number_bases() {
        assert_eq!(
            kinds("$ff,0x10,%101,@17,42"),
            vec![
                TokenKind::Number(255),
                TokenKind::Comma,
                TokenKind::Number(16),
                TokenKind::Comma,
                TokenKind::Number(5),
                TokenKind::Comma,
                TokenKind::Number(15),
                TokenKind::Comma,
                TokenKind::Number(42),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn floats_and_local_refs() {
        assert_eq!(
            kinds("1.5,2b,3F"),
            vec![
                TokenKind::Float(1.5),
                TokenKind::Comma,
                TokenKind::BackRef(2),
                TokenKind::Comma,
                TokenKind::FwdRef(3),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn star_percent_amp_by_position() {
        assert_eq!(
            kinds("*+2*3"),
            vec![
                TokenKind::Pc,
                TokenKind::Plus,
                TokenKind::Number(2),
                TokenKind::Star,
                TokenKind::Number(3),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("7%%11&&1"),
            vec![
                TokenKind::Number(7),
                TokenKind::Percent,
                TokenKind::Number(3),
                TokenKind::Amp,
                TokenKind::Interp(String::from("1")),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn identifiers_glue_interpolation() {
        assert_eq!(
            kinds("lbl&{1}x"),
            vec![
                TokenKind::Ident(vec![lit("lbl"), Part::Interp(String::from("1")), lit("x")]),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_and_chars() {
        assert_eq!(
            kinds("\"hi\\n\",'A"),
            vec![
                TokenKind::Str(vec![lit("hi\n")]),
                TokenKind::Comma,
                TokenKind::Char(b'A'),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("\"v&{n}\""),
            vec![
                TokenKind::Str(vec![lit("v"), Part::Interp(String::from("n"))]),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn shift_and_attr_punctuation() {
        assert_eq!(
            kinds("<<a>>1"),
            vec![
                TokenKind::Shl,
                TokenKind::Ident(vec![lit("a")]),
                TokenKind::Shr,
                TokenKind::Number(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn errors_on_bad_input() {
        let loc = Location::new("t.s", 3);
        assert!(tokenize("\"open", &loc).is_err());
        assert!(tokenize("12z", &loc).is_err());
        assert!(tokenize("`", &loc).is_err());
        assert!(tokenize("$", &loc).is_err());
    }
}
