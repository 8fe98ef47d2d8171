#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = asm6809::assemble(data);

    // Same text split across inputs, with listings and every writer.
    let mut asm = asm6809::Assembler::new();
    asm.loader(asm6809::MemoryLoader::new().with_source("self.s", data));
    asm.listing(true);
    for line in data.lines() {
        asm.emit(line);
    }
    asm.emit(" include \"self.s\"");
    let result = asm.run();
    let _ = result.listing();
    let _ = result.to_decb(0);
    let _ = result.to_intel_hex(Some(0));
    let _ = result.exported_symbols();
});
