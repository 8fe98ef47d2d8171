#![no_main]
use asm6809::section::Sections;
use libfuzzer_sys::fuzz_target;

// Each record is `addr_hi addr_lo len data...`; coalescing must never panic
// and must leave sorted, disjoint spans.
fuzz_target!(|data: &[u8]| {
    let mut sections = Sections::new();
    sections.start_pass(1);
    let mut rest = data;
    while let [hi, lo, len, tail @ ..] = rest {
        let n = usize::from(*len).min(tail.len());
        sections.current_mut().pc = i64::from(u16::from_be_bytes([*hi, *lo]));
        sections.emit_slice(&tail[..n]);
        rest = &tail[n..];
    }
    let image = sections.coalesce_all(false);
    for pair in image.spans().windows(2) {
        assert!(pair[0].end() <= pair[1].put);
    }
    let _ = sections.coalesce_all(true);
});
