//! # asm6809: Multi-pass Motorola 6809 Cross-Assembler
//!
//! `asm6809` turns 6809 assembly source into machine code.  Passes are
//! repeated until every symbol and section layout is stable, so forward
//! references resolve and addressing modes settle on their shortest form.
//!
//! ## Quick Start
//!
//! ```rust
//! use asm6809::assemble;
//!
//! let code = assemble(" lda #1\n rts").unwrap();
//! assert_eq!(code, vec![0x86, 0x01, 0x39]);
//! ```
//!
//! ## Features
//!
//! - **Full 6809 instruction set**: inherent, immediate, direct, extended,
//!   indexed (including indirect and PC-relative), branches, stack and
//!   register-pair forms.
//! - **Macros** with positional arguments (`&1`, `&{name}` interpolation).
//! - **Sections, ORG and PUT**: assemble at one address, load at another.
//! - **Numeric local labels** with `1B` / `1F` references.
//! - **Output** as raw binary, DECB or Intel HEX, plus listings and
//!   exported-symbol tables.
//! - **`no_std` + `alloc`**: the `std` feature adds the filesystem loader.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An assembler performs many narrowing casts between integer widths
// (i64→u8, i64→u16) and uses dense hex literals.  The lints below are
// expected and acceptable in this context.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::wildcard_imports,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::unnecessary_wraps,
    clippy::missing_errors_doc
)]

extern crate alloc;

/// Public assembler API: builder pattern, pass scheduling and `AssemblyResult`.
pub mod assembler;
/// Per-line driver: pseudo-ops, macro capture and invocation, inclusion.
pub mod driver;
/// Error types and source-location diagnostics.
pub mod error;
mod eval;
/// Instruction encoders for each addressing-mode family.
pub mod instr;
/// Line splitter and operand tokenizer.
pub mod lexer;
/// Listing sink and text renderer.
pub mod listing;
/// 6809 instruction table.
pub mod opcode;
/// Binary, DECB, Intel HEX and exported-symbol writers.
pub mod output;
/// Operand parser producing expression trees.
pub mod parser;
/// Programs, macro registry and source loaders.
pub mod program;
/// Sections, spans and coalescing.
pub mod section;
/// Symbol table and numeric local labels.
pub mod symbol;
/// Expression tree nodes and values.
pub mod value;

// Re-exports
pub use assembler::{Assembler, AssemblyResult, ResourceLimits};
pub use error::{AsmError, ErrorKind, Location};
pub use listing::{Listing, ListingCollector, ListingLine};
#[cfg(feature = "std")]
pub use program::FsLoader;
pub use program::{MemoryLoader, SourceLoader};
pub use section::{Section, Span};

use alloc::vec::Vec;

/// Assemble source text into a raw binary image.
///
/// Spans are sorted by load address and concatenated without padding.
///
/// # Errors
///
/// Returns [`AsmError`] if the final pass reported any diagnostic:
/// syntax errors, unknown instructions, values out of range, undefined
/// symbols or an unstable layout.
///
/// # Examples
///
/// ```rust
/// use asm6809::assemble;
///
/// let code = assemble("loop bra loop").unwrap();
/// assert_eq!(code, vec![0x20, 0xfe]);
/// ```
pub fn assemble(source: &str) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    asm.emit(source);
    Ok(asm.finish()?.to_binary(false))
}

/// Assemble with symbols predefined.
///
/// # Errors
///
/// Returns [`AsmError`] on assembly failure (see [`assemble`] for details).
///
/// # Examples
///
/// ```rust
/// use asm6809::assemble_with;
///
/// let code = assemble_with(" jsr putc", &[("putc", 0xa002)]).unwrap();
/// assert_eq!(code, vec![0xbd, 0xa0, 0x02]);
/// ```
pub fn assemble_with(source: &str, symbols: &[(&str, i64)]) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    for &(name, value) in symbols {
        asm.define(name, value);
    }
    asm.emit(source);
    Ok(asm.finish()?.to_binary(false))
}
