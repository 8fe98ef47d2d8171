//! Serde round-trip tests for the configuration, diagnostic and layout
//! types.

#![cfg(feature = "serde")]

use asm6809::value::{Attr, Reg};
use asm6809::{AsmError, Assembler, ErrorKind, ListingLine, Location, ResourceLimits, Span};

/// Helper: serialize to JSON, deserialize back, assert equality.
fn round_trip<T>(val: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + core::fmt::Debug,
{
    let json = serde_json::to_string(val).expect("serialize");
    let back: T = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(val, &back, "round-trip mismatch for JSON: {json}");
}

// ─── ResourceLimits ─────────────────────────────────────────────────────────

#[test]
fn serde_resource_limits() {
    round_trip(&ResourceLimits::default());
    round_trip(&ResourceLimits {
        max_program_depth: 2,
        max_passes: 40,
        max_errors: 1,
    });
}

#[test]
fn resource_limits_from_config_text() {
    let json = r#"{"max_program_depth":3,"max_passes":5,"max_errors":10}"#;
    let limits: ResourceLimits = serde_json::from_str(json).expect("deserialize");
    assert_eq!(limits.max_program_depth, 3);
    assert_eq!(limits.max_passes, 5);
    assert_eq!(limits.max_errors, 10);
}

// ─── Diagnostics ────────────────────────────────────────────────────────────

#[test]
fn serde_location() {
    round_trip(&Location::new("main.s", 42));
    round_trip(&Location::default());
}

#[test]
fn serde_error_kind() {
    for kind in [ErrorKind::Syntax, ErrorKind::OutOfRange, ErrorKind::Fatal] {
        round_trip(&kind);
    }
}

#[test]
fn serde_errors_from_real_run() {
    let mut asm = Assembler::new();
    asm.emit(" bogus\n lda #300\n lda nowhere\n");
    let err = asm.finish().unwrap_err();
    assert!(matches!(err, AsmError::Multiple { ref errors } if errors.len() == 3));
    round_trip(&err);
}

#[test]
fn serde_layout_errors() {
    round_trip(&AsmError::LayoutDiverged {
        section: "CODE".into(),
        previous: 0x4000,
        current: 0x4002,
    });
    round_trip(&AsmError::PassLimit { max: 12 });
}

// ─── Layout & Listing ───────────────────────────────────────────────────────

#[test]
fn serde_span() {
    let mut asm = Assembler::new();
    asm.emit(" org $4000\n put $8000\n fcb 1,2,3\n");
    let image = asm.finish().unwrap().image(false);
    let span: &Span = &image.spans()[0];
    round_trip(span);
}

#[test]
fn serde_listing_line() {
    let mut asm = Assembler::new();
    asm.listing(true).emit("* title\n org $10\n lda #1\n");
    let result = asm.finish().unwrap();
    for line in result.listing_lines() {
        round_trip::<ListingLine>(line);
    }
}

// ─── Operand decorations ────────────────────────────────────────────────────

#[test]
fn serde_registers_and_attrs() {
    for reg in [Reg::Cc, Reg::A, Reg::B, Reg::Dp, Reg::D, Reg::X, Reg::Pcr] {
        round_trip(&reg);
    }
    for attr in [Attr::None, Attr::Immediate, Attr::Indirect, Attr::PreDec2] {
        round_trip(&attr);
    }
}
