use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use asm6809::{AsmError, Assembler, AssemblyResult, ResourceLimits};
use clap::{ArgGroup, Parser};
use log::{error, info};

/// Multi-pass 6809 cross-assembler
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(group(ArgGroup::new("format").args(["bin", "decb", "hex"])))]
struct Args {
    /// Source files, assembled in order as one program
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output file (default: first source with the format's extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Raw binary, gaps zero-filled (default)
    #[arg(long)]
    bin: bool,

    /// DECB (Dragon / CoCo DOS) binary
    #[arg(long)]
    decb: bool,

    /// Intel HEX
    #[arg(long)]
    hex: bool,

    /// Write a listing of the final pass
    #[arg(short, long, value_name = "FILE")]
    listing: Option<PathBuf>,

    /// Write EXPORTed symbols as EQU lines
    #[arg(short = 'E', long, value_name = "FILE")]
    exports: Option<PathBuf>,

    /// Entry point: a number or a symbol (default: lowest load address)
    #[arg(short, long, value_name = "ADDR")]
    exec: Option<String>,

    /// Predefine a symbol
    #[arg(short, long, value_name = "NAME=VALUE", value_parser = parse_define)]
    define: Vec<(String, i64)>,

    /// Maximum nesting of includes and macro expansions
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Maximum number of passes
    #[arg(long, value_name = "N")]
    max_passes: Option<u32>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Format {
    Bin,
    Decb,
    Hex,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Bin => "bin",
            Format::Decb => "decb.bin",
            Format::Hex => "hex",
        }
    }
}

/// Parse `$1234`, `0x1234`, `%1010`, `@17` or decimal.
fn parse_number(s: &str) -> Option<i64> {
    let (digits, radix) = if let Some(h) = s.strip_prefix('$') {
        (h, 16)
    } else if let Some(h) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (h, 16)
    } else if let Some(b) = s.strip_prefix('%') {
        (b, 2)
    } else if let Some(o) = s.strip_prefix('@') {
        (o, 8)
    } else {
        return s.parse().ok();
    };
    i64::from_str_radix(digits, radix).ok()
}

fn parse_define(s: &str) -> Result<(String, i64), String> {
    let (name, value) = s.split_once('=').unwrap_or((s, "1"));
    if name.is_empty() {
        return Err(format!("missing symbol name in '{s}'"));
    }
    let value = parse_number(value).ok_or_else(|| format!("invalid value '{value}'"))?;
    Ok((name.to_string(), value))
}

fn exec_address(arg: Option<&str>, result: &AssemblyResult) -> Result<u16> {
    let value = match arg {
        Some(s) => match parse_number(s).or_else(|| result.symbol(s)) {
            Some(v) => v,
            None => bail!("entry point '{s}' is neither a number nor a defined symbol"),
        },
        None => result
            .image(false)
            .spans()
            .first()
            .map_or(0, |span| span.put),
    };
    Ok((value & 0xffff) as u16)
}

fn write(path: &Path, data: impl AsRef<[u8]>) -> Result<()> {
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn report(err: &AsmError) {
    match err {
        AsmError::Multiple { errors } => errors.iter().for_each(report),
        e => error!("{e}"),
    }
}

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("ASM6809_LOG", "info")
        .write_style_or("ASM6809_LOG", "always");
    env_logger::init_from_env(env);

    let args = Args::parse();
    let format = if args.decb {
        Format::Decb
    } else if args.hex {
        Format::Hex
    } else {
        Format::Bin
    };

    let defaults = ResourceLimits::default();
    let mut asm = Assembler::new();
    asm.limits(ResourceLimits {
        max_program_depth: args.max_depth.unwrap_or(defaults.max_program_depth),
        max_passes: args.max_passes.unwrap_or(defaults.max_passes),
        ..defaults
    })
    .listing(args.listing.is_some());
    for (name, value) in &args.define {
        asm.define(name, *value);
    }
    for file in &args.files {
        asm.file(&file.to_string_lossy());
    }

    let result = asm.run();
    info!("{} passes", result.passes());
    if let Some(err) = AsmError::from_list(result.errors().to_vec()) {
        report(&err);
        if let Some(path) = &args.listing {
            write(path, result.listing())?;
        }
        std::process::exit(1);
    }

    let output = match &args.output {
        Some(p) => p.clone(),
        None => args.files[0].with_extension(format.extension()),
    };
    match format {
        Format::Bin => write(&output, result.to_binary(true))?,
        Format::Decb => {
            let exec = exec_address(args.exec.as_deref(), &result)?;
            write(&output, result.to_decb(exec))?;
        }
        Format::Hex => {
            let exec = match &args.exec {
                Some(s) => Some(exec_address(Some(s), &result)?),
                None => None,
            };
            write(&output, result.to_intel_hex(exec))?;
        }
    }
    if let Some(path) = &args.listing {
        write(path, result.listing())?;
    }
    if let Some(path) = &args.exports {
        write(path, result.exported_symbols())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_in_every_radix() {
        assert_eq!(parse_number("$c000"), Some(0xc000));
        assert_eq!(parse_number("0x10"), Some(16));
        assert_eq!(parse_number("%101"), Some(5));
        assert_eq!(parse_number("@17"), Some(15));
        assert_eq!(parse_number("-3"), Some(-3));
        assert_eq!(parse_number("start"), None);
    }

    #[test]
    fn defines() {
        assert_eq!(parse_define("DEBUG"), Ok((String::from("DEBUG"), 1)));
        assert_eq!(parse_define("base=$4000"), Ok((String::from("base"), 0x4000)));
        assert!(parse_define("=1").is_err());
        assert!(parse_define("x=zz").is_err());
    }

    #[test]
    fn exec_from_symbol_or_lowest_address() {
        let mut asm = Assembler::new();
        asm.emit(" org $3000\n fcb 0\n org $4000\nstart rts\n");
        let result = asm.finish().unwrap();
        assert_eq!(exec_address(Some("start"), &result).unwrap(), 0x4000);
        assert_eq!(exec_address(Some("$1234"), &result).unwrap(), 0x1234);
        assert_eq!(exec_address(None, &result).unwrap(), 0x3000);
        assert!(exec_address(Some("nowhere"), &result).is_err());
    }

    #[test]
    fn cli_parses() {
        let args = Args::try_parse_from([
            "asm6809", "--decb", "-o", "out.bin", "-d", "x=2", "--max-passes", "5", "a.s", "b.s",
        ])
        .unwrap();
        assert!(args.decb);
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.define, vec![(String::from("x"), 2)]);
        assert_eq!(args.max_passes, Some(5));
        assert!(Args::try_parse_from(["asm6809", "--bin", "--hex", "a.s"]).is_err());
    }
}
