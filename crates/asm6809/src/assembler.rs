//! Public assembler API: builder pattern, pass scheduling and results.
//!
//! An [`Assembler`] collects source inputs and settings, then runs passes
//! over them until every symbol and section end address is stable.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::driver::Context;
use crate::error::{AsmError, Location};
use crate::listing::{ListingCollector, ListingLine};
use crate::output;
use crate::program::{Program, Programs, SourceLoader};
use crate::section::{Section, Sections};
use crate::symbol::SymbolTable;
use crate::value::Value;

/// Configurable resource limits.
///
/// Bound how deep macro expansion and file inclusion may nest, how many
/// passes are attempted before giving up, and how many diagnostics are kept
/// per pass.
///
/// # Examples
///
/// ```rust
/// use asm6809::{Assembler, ResourceLimits};
///
/// let mut asm = Assembler::new();
/// asm.limits(ResourceLimits {
///     max_program_depth: 4,
///     max_passes: 6,
///     max_errors: 16,
/// });
/// asm.emit(" nop");
/// assert_eq!(asm.finish()?.to_binary(false), vec![0x12]);
/// # Ok::<(), asm6809::AsmError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimits {
    /// Maximum nesting of included files and macro expansions, counting the
    /// top-level program. Default: 8.
    pub max_program_depth: usize,
    /// Maximum number of passes. Values below 2 are treated as 2.
    /// Default: 12.
    pub max_passes: u32,
    /// Maximum diagnostics kept per pass. Default: 64.
    pub max_errors: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_program_depth: 8,
            max_passes: 12,
            max_errors: 64,
        }
    }
}

/// One top-level input.
#[derive(Debug, Clone)]
enum Input {
    Text { name: String, source: String },
    File(String),
}

/// Builder-pattern assembler.
///
/// # Examples
///
/// ```rust
/// use asm6809::Assembler;
///
/// let mut asm = Assembler::new();
/// asm.emit(" org $4000\nstart lda #$41\n bra start");
/// let result = asm.finish()?;
/// assert_eq!(result.symbol("start"), Some(0x4000));
/// assert_eq!(result.to_binary(false), vec![0x86, 0x41, 0x20, 0xfc]);
/// # Ok::<(), asm6809::AsmError>(())
/// ```
pub struct Assembler {
    limits: ResourceLimits,
    loader: Option<Box<dyn SourceLoader>>,
    inputs: Vec<Input>,
    defines: Vec<(String, i64)>,
    listing_enabled: bool,
}

impl core::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Assembler")
            .field("limits", &self.limits)
            .field("inputs", &self.inputs)
            .field("defines", &self.defines)
            .field("listing_enabled", &self.listing_enabled)
            .finish_non_exhaustive()
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
fn default_loader() -> Box<dyn SourceLoader> {
    Box::new(crate::program::FsLoader)
}

#[cfg(not(feature = "std"))]
fn default_loader() -> Box<dyn SourceLoader> {
    Box::new(crate::program::MemoryLoader::new())
}

impl Assembler {
    /// A new assembler with default limits.  INCLUDE and INCLUDEBIN read
    /// from the filesystem when the `std` feature is enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            limits: ResourceLimits::default(),
            loader: None,
            inputs: Vec::new(),
            defines: Vec::new(),
            listing_enabled: false,
        }
    }

    /// Set resource limits.
    pub fn limits(&mut self, limits: ResourceLimits) -> &mut Self {
        self.limits = limits;
        self
    }

    /// Read included files through `loader`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use asm6809::{Assembler, MemoryLoader};
    ///
    /// let mut asm = Assembler::new();
    /// asm.loader(MemoryLoader::new().with_source("defs.s", "ten equ 10\n"));
    /// asm.emit(" include \"defs.s\"\n fcb ten");
    /// assert_eq!(asm.finish()?.to_binary(false), vec![10]);
    /// # Ok::<(), asm6809::AsmError>(())
    /// ```
    pub fn loader(&mut self, loader: impl SourceLoader + 'static) -> &mut Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Record a listing of the final pass.
    pub fn listing(&mut self, enabled: bool) -> &mut Self {
        self.listing_enabled = enabled;
        self
    }

    /// Predefine a global symbol.
    pub fn define(&mut self, name: &str, value: i64) -> &mut Self {
        self.defines.push((String::from(name), value));
        self
    }

    /// Add source text.  Inputs are assembled in the order they are added.
    pub fn emit(&mut self, source: &str) -> &mut Self {
        let name = alloc::format!("<input {}>", self.inputs.len() + 1);
        self.emit_named(&name, source)
    }

    /// Add source text under a name used in diagnostics.
    pub fn emit_named(&mut self, name: &str, source: &str) -> &mut Self {
        self.inputs.push(Input::Text {
            name: String::from(name),
            source: String::from(source),
        });
        self
    }

    /// Add a source file, read through the loader.
    pub fn file(&mut self, path: &str) -> &mut Self {
        self.inputs.push(Input::File(String::from(path)));
        self
    }

    /// Run passes until symbols and layout are stable, returning whatever
    /// was produced together with the final pass's diagnostics.
    #[must_use]
    pub fn run(self) -> AssemblyResult {
        let Assembler {
            limits,
            loader,
            inputs,
            defines,
            listing_enabled,
        } = self;
        let mut programs = Programs::new(loader.unwrap_or_else(default_loader));
        let mut tops: Vec<Rc<Program>> = Vec::new();
        let mut load_errors = Vec::new();
        for input in inputs {
            match input {
                Input::Text { name, source } => tops.push(programs.add_source(&name, &source)),
                Input::File(path) => match programs.file(&path) {
                    Some(p) => tops.push(p),
                    None => load_errors.push(AsmError::FileNotFound {
                        path,
                        loc: Location::default(),
                    }),
                },
            }
        }

        let mut ctx = Context::new(limits, programs, listing_enabled);
        for (name, value) in &defines {
            ctx.symbols.set(name, Value::int(*value), 0);
        }

        let max_passes = limits.max_passes.max(2);
        let mut pass = 0;
        loop {
            pass += 1;
            ctx.begin_pass(pass);
            for program in &tops {
                ctx.assemble(program, pass);
            }
            ctx.end_pass();
            let changed = ctx.symbols.take_changed();
            let layout = ctx.sections.finish_pass(pass);
            log::debug!(
                "pass {}: {} errors, symbols {}",
                pass,
                ctx.errors().len(),
                if changed { "changed" } else { "stable" }
            );
            if pass > 1 && !changed && layout.is_ok() {
                break;
            }
            if pass >= max_passes {
                log::warn!("no stable layout after {} passes", pass);
                ctx.error(layout.err().unwrap_or(AsmError::PassLimit { max: pass }));
                break;
            }
        }

        let mut errors = ctx.programs.take_parse_errors();
        errors.extend(load_errors);
        errors.extend(ctx.take_errors());
        AssemblyResult {
            exports: ctx.programs.exports().to_vec(),
            sections: ctx.sections,
            symbols: ctx.symbols,
            listing: ctx.listing,
            errors,
            passes: pass,
        }
    }

    /// Run passes and fail if the final pass reported any diagnostic.
    ///
    /// # Errors
    ///
    /// Returns the single error, or [`AsmError::Multiple`] when there were
    /// several.
    pub fn finish(self) -> Result<AssemblyResult, AsmError> {
        let mut result = self.run();
        match AsmError::from_list(core::mem::take(&mut result.errors)) {
            None => Ok(result),
            Some(e) => Err(e),
        }
    }
}

/// Everything produced by a run.
#[derive(Debug, Clone)]
pub struct AssemblyResult {
    sections: Sections,
    symbols: SymbolTable,
    exports: Vec<String>,
    listing: Option<ListingCollector>,
    errors: Vec<AsmError>,
    passes: u32,
}

impl AssemblyResult {
    /// Diagnostics from the final pass.
    #[must_use]
    pub fn errors(&self) -> &[AsmError] {
        &self.errors
    }

    /// Number of passes run.
    #[must_use]
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Named sections in creation order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Section by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Integer value of a global symbol.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use asm6809::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.emit("size equ 4*8\n nop\nend nop");
    /// let result = asm.finish()?;
    /// assert_eq!(result.symbol("size"), Some(32));
    /// assert_eq!(result.symbol("end"), Some(1));
    /// assert_eq!(result.symbol("missing"), None);
    /// # Ok::<(), asm6809::AsmError>(())
    /// ```
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<i64> {
        self.symbols.get(name).and_then(Value::as_int)
    }

    /// The symbol table.
    #[must_use]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// All sections merged into one, sorted by load address.  With `pad`
    /// the gaps are zero-filled so the result is a single span.
    #[must_use]
    pub fn image(&self, pad: bool) -> Section {
        self.sections.coalesce_all(pad)
    }

    /// Raw binary image.
    #[must_use]
    pub fn to_binary(&self, pad: bool) -> Vec<u8> {
        output::binary(&self.image(pad))
    }

    /// DECB (Dragon / CoCo DOS) binary with `exec` as the entry point.
    #[must_use]
    pub fn to_decb(&self, exec: u16) -> Vec<u8> {
        output::decb(&self.image(false), exec)
    }

    /// Intel HEX text.
    #[must_use]
    pub fn to_intel_hex(&self, exec: Option<u16>) -> String {
        output::intel_hex(&self.image(false), exec)
    }

    /// `name equ $XXXX` lines for every EXPORTed symbol.
    #[must_use]
    pub fn exported_symbols(&self) -> String {
        output::exports(&self.exports, &self.symbols)
    }

    /// Rendered listing of the final pass; empty unless enabled with
    /// [`Assembler::listing`].
    #[must_use]
    pub fn listing(&self) -> String {
        self.listing
            .as_ref()
            .map(ListingCollector::render)
            .unwrap_or_default()
    }

    /// Listing records of the final pass.
    #[must_use]
    pub fn listing_lines(&self) -> &[ListingLine] {
        self.listing
            .as_ref()
            .map(ListingCollector::lines)
            .unwrap_or(&[])
    }
}
