//! Regression tests for bug fixes.
//!
//! Each test documents a specific bug that was found and fixed, ensuring the
//! fix is never accidentally reverted.

use asm6809::{assemble, AsmError, Assembler, ErrorKind, ResourceLimits};

fn run(src: &str) -> asm6809::AssemblyResult {
    let mut asm = Assembler::new();
    asm.emit(src);
    asm.run()
}

/// Regression: an EQU whose value does not fit in 16 bits must be listed at
/// the truncated address instead of panicking on the cast.
#[test]
fn equ_listed_at_truncated_value() {
    let mut asm = Assembler::new();
    asm.listing(true).emit("big equ $12345\n");
    let r = asm.finish().unwrap();
    assert_eq!(r.symbol("big"), Some(0x12345));
    assert_eq!(r.listing_lines()[0].address, Some(0x2345));
}

/// Regression: ORG with a forward reference was treated as ORG 0 on the
/// first pass and never moved.  It must be ignored until defined.
#[test]
fn org_forward_reference_converges() {
    let r = run(" org start\n nop\nstart equ $100\n");
    assert!(r.errors().is_empty(), "{:?}", r.errors());
    let image = r.image(false);
    assert_eq!(image.spans().len(), 1);
    assert_eq!(image.spans()[0].org, 0x100);
    assert_eq!(image.spans()[0].data, vec![0x12]);
}

/// Regression: SETDP with a negative value must disable direct-page
/// selection instead of wrapping to page $FF.
#[test]
fn negative_setdp_disables_direct_page() {
    let code = assemble(" setdp 0\n setdp -1\n lda $10\n").unwrap();
    assert_eq!(code, vec![0xb6, 0x00, 0x10]);
}

/// Regression: a forward local-label reference that lets an instruction
/// shrink to direct mode moves the label itself; the change must trigger
/// another pass.
#[test]
fn forward_local_reference_settles_on_direct() {
    let r = run(" setdp 0\n lda 1F\n nop\n1 fcb 0\n");
    assert!(r.errors().is_empty(), "{:?}", r.errors());
    assert_eq!(r.to_binary(false), vec![0x96, 0x03, 0x12, 0x00]);
    assert!(r.passes() >= 3);
}

/// Regression: two passes must be run even when the first pass produced
/// no forward references, so the second pass can report final errors.
#[test]
fn minimum_two_passes() {
    let r = run(" rts\n");
    assert_eq!(r.passes(), 2);
}

/// Regression: an RZB large enough to exhaust memory must be rejected.
#[test]
fn oversized_rzb_rejected() {
    let r = run(" rzb $10001\n nop\n");
    assert_eq!(r.errors().len(), 1);
    assert_eq!(r.errors()[0].kind(), ErrorKind::OutOfRange);
    assert_eq!(r.to_binary(false), vec![0x12]);
}

/// Regression: an empty FDB item must emit a zero word, not be skipped.
#[test]
fn empty_fdb_item_is_zero() {
    assert_eq!(assemble(" fdb ,1").unwrap(), vec![0, 0, 0, 1]);
}

/// Regression: FCC text containing blanks was cut at the first space.
#[test]
fn fcc_keeps_embedded_blanks() {
    assert_eq!(assemble(" fcc \"a b\"").unwrap(), b"a b".to_vec());
    assert_eq!(
        assemble(" fcc /x y/ ; trailing comment").unwrap(),
        b"x y".to_vec()
    );
}

/// Regression: a 16-bit immediate out of range must still occupy its bytes
/// so that later labels do not move between passes.
#[test]
fn wide_immediate_out_of_range_still_emitted() {
    let r = run(" ldx #$10000\nafter nop\n");
    assert_eq!(r.errors().len(), 1);
    assert_eq!(r.symbol("after"), Some(3));
    assert_eq!(r.to_binary(false), vec![0x8e, 0x00, 0x00, 0x12]);
}

/// Regression: backward short branch range check used the instruction
/// start rather than its end.
#[test]
fn backward_branch_limits() {
    // -128 from the end of the branch is the furthest reachable target
    assert_eq!(
        assemble("top rzb 126\n bra top").unwrap()[126..].to_vec(),
        vec![0x20, 0x80]
    );
    let r = run("top rzb 127\n bra top\n");
    assert!(matches!(r.errors()[0], AsmError::OutOfRange { .. }));
}

/// Regression: a label on a line with no opcode must take the PC.
#[test]
fn bare_label_takes_pc() {
    let r = run(" nop\nhere\n nop\n");
    assert_eq!(r.symbol("here"), Some(1));
}

/// Regression: indented labels written with a trailing colon.
#[test]
fn colon_label_when_indented() {
    assert_eq!(assemble(" loop: bra loop").unwrap(), vec![0x20, 0xfe]);
}

/// Regression: mnemonics and pseudo-ops are case-insensitive.
#[test]
fn mixed_case_mnemonics() {
    assert_eq!(assemble(" LDA #1\n Fcb 2\n RtS").unwrap(), vec![0x86, 1, 2, 0x39]);
}

/// Regression: comment lines and trailing comments must not be parsed as
/// operands.
#[test]
fn comments_ignored() {
    let src = "* header\n; note\n nop ; trailing\n fcb 1,2 comment without semicolon\n";
    assert_eq!(assemble(src).unwrap(), vec![0x12, 1, 2]);
}

/// Regression: the `*` marker means the PC at the start of the line.
#[test]
fn pc_marker_in_data() {
    assert_eq!(assemble(" org $10\n fdb *,*+2").unwrap(), vec![0, 0x10, 0, 0x12]);
}

/// Regression: diagnostics beyond `max_errors` are dropped.
#[test]
fn error_cap_respected() {
    let mut asm = Assembler::new();
    asm.limits(ResourceLimits {
        max_errors: 2,
        ..ResourceLimits::default()
    });
    asm.emit(" bad1\n bad2\n bad3\n bad4\n");
    assert_eq!(asm.run().errors().len(), 2);
}

/// Regression: a macro defined on one pass must not be reported as
/// redefined when the definition is met again on the next pass.
#[test]
fn macro_definition_survives_passes() {
    let src = "m macro\n fcb &1\n endm\n m later\nlater equ 7\n";
    let r = run(src);
    assert!(r.errors().is_empty(), "{:?}", r.errors());
    assert_eq!(r.to_binary(false), vec![7]);
}

/// Regression: an unknown mnemonic inside a macro body is located at the
/// macro line, not the call site.
#[test]
fn macro_error_location_is_body_line() {
    let mut asm = Assembler::new();
    asm.emit_named("m.s", "m macro\n nop\n bogus\n endm\n m\n");
    let r = asm.run();
    assert_eq!(r.errors().len(), 1);
    assert!(r.errors()[0].to_string().starts_with("m.s:3:"), "{}", r.errors()[0]);
}

/// Regression: layout that never settles reports the section that moved.
#[test]
fn unstable_layout_reported() {
    let mut asm = Assembler::new();
    asm.limits(ResourceLimits {
        max_passes: 4,
        ..ResourceLimits::default()
    });
    // The RZB size depends on where it ends up, flipping every pass.
    asm.emit(" rzb 1-(end&1)\nend\n");
    let r = asm.run();
    assert_eq!(r.passes(), 4);
    assert!(r.errors().iter().any(AsmError::is_fatal));
}

/// Regression: ORG far outside the 6809 address space made padded output
/// index past its buffer.  Addresses fold into 16 bits.
#[test]
fn huge_org_folds_into_address_space() {
    let r = run(" org 0\n fcb 1\n org $7fffffffffffffff\n fcb 2,3\n");
    assert!(r.errors().is_empty(), "{:?}", r.errors());
    let image = r.to_binary(true);
    assert_eq!(image.len(), 0x10001);
    assert_eq!(image[0], 1);
    assert_eq!(&image[0xffff..], &[2, 3]);

    let r = run(" org -2\n fdb $abcd\n");
    assert_eq!(r.image(false).spans()[0].put, 0xfffe);
    assert_eq!(
        r.to_decb(0),
        vec![0x00, 0x00, 0x02, 0xff, 0xfe, 0xab, 0xcd, 0xff, 0x00, 0x00, 0x00, 0x00]
    );
}

/// Regression: RMB past the top of memory wraps the PC.
#[test]
fn rmb_wraps_pc() {
    let r = run(" org $fff0\n rmb $20\nhere fcb 1\n");
    assert!(r.errors().is_empty(), "{:?}", r.errors());
    assert_eq!(r.symbol("here"), Some(0x10));
}

/// Regression: a number substituted into a label from a macro argument
/// defined a global symbol named after the digits instead of a local label.
#[test]
fn interpolated_numeric_label_is_local() {
    let r = run("m macro\n&1 nop\n bra &1B\n endm\n m 3\n");
    assert!(r.errors().is_empty(), "{:?}", r.errors());
    assert_eq!(r.symbol("3"), None);
    assert_eq!(r.to_binary(false), vec![0x12, 0x20, 0xfd]);

    let r = run("m macro\n bra &1F\n&1 nop\n endm\n m 4\n");
    assert!(r.errors().is_empty(), "{:?}", r.errors());
    assert_eq!(r.to_binary(false), vec![0x20, 0x00, 0x12]);
}

/// Regression: a macro used before its definition only expands from the
/// second pass, shifting line numbers.  A forward local reference resolved
/// to the label's stale first-pass entry and produced a wrong branch.
#[test]
fn forward_local_ignores_stale_line_numbers() {
    let r = run(" m\n bra 1F\n nop\n nop\n1 nop\nm macro\n nop\n nop\n endm\n");
    assert!(r.errors().is_empty(), "{:?}", r.errors());
    assert_eq!(r.to_binary(false), vec![0x12, 0x12, 0x20, 0x02, 0x12, 0x12, 0x12]);
}

/// Regression: EQU without a label is reported rather than dropped.
#[test]
fn equ_without_label_is_syntax_error() {
    let r = run(" equ 5\n nop\n");
    assert_eq!(r.errors().len(), 1);
    assert_eq!(r.errors()[0].kind(), ErrorKind::Syntax);
    assert!(r.errors()[0].to_string().contains("EQU requires a label"));
}
