#![cfg(not(target_arch = "wasm32"))]
//! Property-based tests using proptest.
//!
//! These tests verify assembler invariants across large, randomly generated
//! input spaces, complementing the targeted unit/integration tests and the
//! libfuzzer-based fuzz targets.

use asm6809::section::Sections;
use asm6809::{assemble, Assembler};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

/// Generates arbitrary ASCII strings (the assembler only accepts text input).
fn arb_asm_input() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::char::range('\0', '\x7f'), 0..256)
        .prop_map(|v| v.into_iter().collect())
}

/// Valid 6809 lines that never reference a label.
fn valid_line() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        " nop",
        " rts",
        " swi2",
        " lda #$41",
        " ldb #-1",
        " ldd #$1234",
        " ldx #0",
        " ldy #$8000",
        " cmpu #1",
        " andcc #$fe",
        " lda $1234",
        " lda <$12",
        " sta >$12",
        " jmp [$fffe]",
        " lda ,x",
        " lda ,x+",
        " ldd ,--s",
        " lda 5,y",
        " lda -100,u",
        " lda 1000,x",
        " lda [,y++]",
        " lda [5,x]",
        " lda b,x",
        " leax d,y",
        " leay 10,pcr",
        " bra *",
        " lbra *",
        " lbeq *",
        " pshs a,b,x",
        " puls pc,u",
        " tfr a,b",
        " exg d,x",
        " fcb 1,2,3",
        " fdb $abcd",
        " fcc \"hi\"",
        " rzb 4",
    ])
}

/// Small chunks written at arbitrary addresses.
fn arb_writes() -> impl Strategy<Value = Vec<(u16, Vec<u8>)>> {
    prop::collection::vec(
        (0u16..0x200, prop::collection::vec(any::<u8>(), 1..16)),
        1..12,
    )
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    /// The assembler must never panic, whatever the input.
    #[test]
    fn never_panics_on_arbitrary_input(src in arb_asm_input()) {
        let _ = assemble(&src);
    }

    /// Random line soup made of individually valid lines never panics and
    /// never exceeds two passes when nothing refers forward.
    #[test]
    fn valid_lines_assemble(lines in prop::collection::vec(valid_line(), 1..32)) {
        let src = lines.join("\n");
        let mut asm = Assembler::new();
        asm.emit(&src);
        let r = asm.run();
        prop_assert!(r.errors().is_empty(), "{:?}", r.errors());
        prop_assert_eq!(r.passes(), 2);
    }

    /// The listing accounts for every emitted byte.
    #[test]
    fn listing_matches_image(lines in prop::collection::vec(valid_line(), 1..32)) {
        let src = lines.join("\n");
        let mut asm = Assembler::new();
        asm.listing(true).emit(&src);
        let r = asm.run();
        let listed: usize = r.listing_lines().iter().map(|l| l.bytes.len()).sum();
        prop_assert_eq!(listed, r.to_binary(false).len());
    }

    /// Coalescing paints spans in emission order: every address holds the
    /// byte that was written to it last.
    #[test]
    fn coalesce_last_write_wins(writes in arb_writes()) {
        let mut sections = Sections::new();
        sections.start_pass(1);
        let mut expect = [None::<u8>; 0x210];
        for (addr, data) in &writes {
            sections.current_mut().pc = i64::from(*addr);
            sections.emit_slice(data);
            for (i, b) in data.iter().enumerate() {
                expect[usize::from(*addr) + i] = Some(*b);
            }
        }
        let image = sections.coalesce_all(false);
        let spans = image.spans();
        for pair in spans.windows(2) {
            prop_assert!(pair[0].end() <= pair[1].put);
        }
        for span in spans {
            for (i, b) in span.data.iter().enumerate() {
                let at = usize::try_from(span.put).unwrap() + i;
                prop_assert_eq!(Some(*b), expect[at]);
            }
        }
        let covered: usize = spans.iter().map(|s| s.data.len()).sum();
        prop_assert_eq!(covered, expect.iter().filter(|b| b.is_some()).count());
    }
}
