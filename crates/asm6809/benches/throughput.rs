//! Performance benchmarks for `asm6809`.
//!
//! Measures:
//! - Single instruction latency per addressing mode
//! - Multi-instruction throughput (KB/s of source text)
//! - Label-heavy workloads with forward references
//! - Pass convergence when forward references shrink instructions
//! - Macro expansion
//! - Output writers
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use asm6809::{assemble, Assembler};

// ─── Single-Instruction Latency ──────────────────────────────────────────────

fn bench_single_instruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_instruction");

    for (name, src) in [
        ("inherent", " nop"),
        ("immediate16", " ldy #$1234"),
        ("extended", " lda $1234"),
        ("indexed_offset", " lda 1000,x"),
        ("indexed_indirect", " lda [,y++]"),
        ("pcr", " leax 10,pcr"),
        ("long_branch", " lbeq *"),
        ("stack", " pshs pc,u,y,x,dp,b,a,cc"),
        ("pair", " tfr d,x"),
    ] {
        group.bench_function(name, |b| b.iter(|| assemble(black_box(src)).unwrap()));
    }

    group.finish();
}

// ─── Multi-Instruction Throughput ─────────────────────────────────────────────

/// Generate a block of N mixed instructions (no labels).
fn gen_block(n: usize) -> String {
    let mut s = String::with_capacity(n * 14);
    for i in 0..n {
        match i % 6 {
            0 => s.push_str(" lda #$41\n"),
            1 => s.push_str(" sta $0400,x\n"),
            2 => s.push_str(" ldd ,u++\n"),
            3 => s.push_str(" addd #1\n"),
            4 => s.push_str(" pshs a,b\n"),
            5 => s.push_str(" puls a,b\n"),
            _ => unreachable!(),
        }
    }
    s
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    for n in [100, 1000, 5000] {
        let src = gen_block(n);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_function(format!("{n}_insn"), |b| {
            b.iter(|| assemble(black_box(&src)).unwrap())
        });
    }

    group.finish();
}

// ─── Label-Heavy Workloads ────────────────────────────────────────────────────

/// Generate code with many labels, local labels and forward references.
fn gen_label_heavy(n_labels: usize) -> String {
    let mut s = String::with_capacity(n_labels * 40);
    s.push_str(" org $4000\n");
    for i in 0..n_labels {
        let target = (i + n_labels / 2) % n_labels;
        s.push_str(&format!("label_{i} nop\n"));
        s.push_str("1 leax 1,x\n bne 1B\n");
        s.push_str(&format!(" jsr label_{target}\n"));
    }
    s
}

fn bench_labels(c: &mut Criterion) {
    let mut group = c.benchmark_group("labels");

    for n in [50, 200, 500] {
        let src = gen_label_heavy(n);
        group.bench_function(format!("{n}_labels"), |b| {
            b.iter(|| assemble(black_box(&src)).unwrap())
        });
    }

    group.finish();
}

// ─── Pass Convergence ─────────────────────────────────────────────────────────

/// Forward references into the direct page: every load starts extended and
/// shrinks once the targets are known, moving the labels again.
fn gen_convergence_workload(n: usize) -> String {
    let mut s = String::with_capacity(n * 24);
    s.push_str(" setdp 0\n");
    for i in 0..n {
        s.push_str(&format!(" lda var_{i}\n"));
    }
    for i in 0..n {
        s.push_str(&format!("var_{i} fcb {}\n", i & 0xff));
    }
    s
}

fn bench_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("convergence");

    for n in [10, 40] {
        let src = gen_convergence_workload(n);
        group.bench_function(format!("direct_page_{n}"), |b| {
            b.iter(|| assemble(black_box(&src)).unwrap())
        });
    }

    group.finish();
}

// ─── Macro Expansion ──────────────────────────────────────────────────────────

fn bench_macros(c: &mut Criterion) {
    let mut group = c.benchmark_group("macros");

    let src_macro = "\
putc macro
 lda #&1
 jsr [$a002]
 endm
 putc 'H
 putc 'e
 putc 'l
 putc 'l
 putc 'o
 putc 13
";
    group.bench_function("putc_6x", |b| {
        b.iter(|| assemble(black_box(src_macro)).unwrap())
    });

    let mut src_nested = String::from("inner macro\n fcb &1\n endm\nouter macro\n inner &1\n inner &1+1\n endm\n");
    for i in 0..100 {
        src_nested.push_str(&format!(" outer {i}\n"));
    }
    group.bench_function("nested_100x", |b| {
        b.iter(|| assemble(black_box(&src_nested)).unwrap())
    });

    group.finish();
}

// ─── Output Writers ───────────────────────────────────────────────────────────

fn bench_output(c: &mut Criterion) {
    let mut group = c.benchmark_group("output");

    let mut asm = Assembler::new();
    asm.emit(&format!(" org $4000\n{}", gen_block(2000)));
    let result = asm.finish().unwrap();

    group.bench_function("binary", |b| b.iter(|| black_box(&result).to_binary(false)));
    group.bench_function("decb", |b| b.iter(|| black_box(&result).to_decb(0x4000)));
    group.bench_function("intel_hex", |b| {
        b.iter(|| black_box(&result).to_intel_hex(Some(0x4000)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_instruction,
    bench_throughput,
    bench_labels,
    bench_convergence,
    bench_macros,
    bench_output,
);
criterion_main!(benches);
