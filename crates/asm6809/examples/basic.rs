//! Basic assembly example: one-shot and builder APIs, macros and output
//! formats.
//!
//! Run with: `cargo run --example basic`

use asm6809::{assemble, Assembler, MemoryLoader};

fn main() {
    println!("=== asm6809 basic example ===\n");

    // --- One-shot assembly ---
    println!("1. One-shot assembly (lda #42; rts):");
    let bytes = assemble(" lda #42\n rts").unwrap();
    print_hex("   ", &bytes);

    // --- Builder API ---
    println!("\n2. Builder API (clear the text screen):");
    let mut asm = Assembler::new();
    asm.listing(true).define("screen", 0x0400).emit(
        r#"
        org $4000
start   ldx #screen
        ldd #$6060          ; two green blanks
1       std ,x++
        cmpx #screen+512
        blo 1B
        rts
"#,
    );
    let result = asm.finish().unwrap();
    print_hex("   ", &result.to_binary(false));
    println!("   settled after {} passes", result.passes());

    println!("\n   Symbols:");
    for (name, value) in result.symbols().iter() {
        println!("   {}: {}", name, value);
    }

    println!("\n   Listing:");
    for line in result.listing().lines() {
        println!("   {}", line);
    }

    // --- Macros and data ---
    println!("\n3. Macros and data:");
    let bytes = assemble(
        r#"
string  macro
        fcb 2f-1f
1       fcc &1
2
        endm
        string "HELLO"
        fdb $dead,$beef
"#,
    )
    .unwrap();
    print_hex("   ", &bytes);

    // --- Forward references settle on direct page ---
    println!("\n4. Direct page selection:");
    let bytes = assemble(" setdp 0\n lda var\n rts\nvar fcb 7").unwrap();
    print_hex("   ", &bytes);

    // --- Includes and output formats ---
    println!("\n5. DECB and Intel HEX:");
    let mut asm = Assembler::new();
    asm.loader(MemoryLoader::new().with_source("vectors.s", " org $fffe\n fdb reset\n"));
    asm.emit(" org $c000\nreset bra reset\n include \"vectors.s\"\n");
    let result = asm.finish().unwrap();
    print_hex("   ", &result.to_decb(0xc000));
    for line in result.to_intel_hex(Some(0xc000)).lines() {
        println!("   {}", line);
    }

    println!("\n=== Done! ===");
}

fn print_hex(prefix: &str, bytes: &[u8]) {
    print!("{}", prefix);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && i % 16 == 0 {
            println!();
            print!("{}", prefix);
        }
        print!("{:02X} ", b);
    }
    println!();
}
