//! Programs: parsed source files and macro bodies, and their registry.
//!
//! A [`Program`] is an immutable, replayable list of [`ProgramLine`]s.
//! Source files are parsed once and cached for the whole run; macro bodies
//! are captured line by line while the driver walks a `MACRO` block.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{AsmError, Location};
use crate::value::Value;

/// One parsed source line.
///
/// Label, opcode and arguments are raw syntax trees; the driver evaluates
/// them each time the line is assembled.
#[derive(Debug, Clone)]
pub struct ProgramLine {
    /// Label field.
    pub label: Option<Value>,
    /// Opcode field.
    pub opcode: Option<Value>,
    /// Argument list (always a [`Node::Array`](crate::value::Node::Array)).
    pub args: Option<Value>,
    /// Original source text, for the listing.
    pub text: Rc<str>,
    /// Name of the file the line was read from.
    pub source: Rc<str>,
    /// 1-based line number within `source`.
    pub line: u32,
}

impl ProgramLine {
    /// Whether the line has no label, opcode or arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.opcode.is_none() && self.args.is_none()
    }

    /// Location of this line for diagnostics.
    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(&self.source, self.line)
    }
}

/// A source file or macro body.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// File path or macro name.
    pub name: String,
    /// Lines in order.
    pub lines: Vec<ProgramLine>,
    /// Pass in which a macro definition was last encountered.
    pub pass: u32,
}

impl Program {
    /// An empty program.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            lines: Vec::new(),
            pass: 0,
        }
    }
}

/// Access to included source and binary files.
pub trait SourceLoader {
    /// Read a source file as text.
    fn load_source(&mut self, path: &str) -> Option<String>;
    /// Read a binary file.
    fn load_binary(&mut self, path: &str) -> Option<Vec<u8>>;
}

/// In-memory file set.  Useful for tests and for embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: BTreeMap<String, String>,
    binaries: BTreeMap<String, Vec<u8>>,
}

impl MemoryLoader {
    /// Empty file set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file.
    #[must_use]
    pub fn with_source(mut self, path: &str, text: &str) -> Self {
        self.sources.insert(String::from(path), String::from(text));
        self
    }

    /// Add a binary file.
    #[must_use]
    pub fn with_binary(mut self, path: &str, data: &[u8]) -> Self {
        self.binaries.insert(String::from(path), data.to_vec());
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn load_source(&mut self, path: &str) -> Option<String> {
        self.sources.get(path).cloned()
    }

    fn load_binary(&mut self, path: &str) -> Option<Vec<u8>> {
        self.binaries
            .get(path)
            .cloned()
            .or_else(|| self.sources.get(path).map(|s| s.as_bytes().to_vec()))
    }
}

/// Loader reading from the filesystem, relative to the working directory.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

#[cfg(feature = "std")]
impl SourceLoader for FsLoader {
    fn load_source(&mut self, path: &str) -> Option<String> {
        match std::fs::read(path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                log::debug!("cannot read {}: {}", path, e);
                None
            }
        }
    }

    fn load_binary(&mut self, path: &str) -> Option<Vec<u8>> {
        std::fs::read(path).ok()
    }
}

/// Registry of files, macros and exported names.
pub struct Programs {
    loader: Box<dyn SourceLoader>,
    files: BTreeMap<String, Rc<Program>>,
    binaries: BTreeMap<String, Rc<[u8]>>,
    macros: BTreeMap<String, Rc<Program>>,
    exports: Vec<String>,
    parse_errors: Vec<AsmError>,
}

impl core::fmt::Debug for Programs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Programs")
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("macros", &self.macros.keys().collect::<Vec<_>>())
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}

impl Programs {
    /// Registry reading files through `loader`.
    #[must_use]
    pub fn new(loader: Box<dyn SourceLoader>) -> Self {
        Self {
            loader,
            files: BTreeMap::new(),
            binaries: BTreeMap::new(),
            macros: BTreeMap::new(),
            exports: Vec::new(),
            parse_errors: Vec::new(),
        }
    }

    /// Register an already available source text under `name`, replacing
    /// any cached file of that name.
    pub fn add_source(&mut self, name: &str, text: &str) -> Rc<Program> {
        let (program, errors) = crate::parser::parse_program(name, text);
        self.parse_errors.extend(errors);
        let program = Rc::new(program);
        self.files.insert(String::from(name), Rc::clone(&program));
        program
    }

    /// Parsed source file, loaded and parsed on first use.
    pub fn file(&mut self, path: &str) -> Option<Rc<Program>> {
        if let Some(p) = self.files.get(path) {
            return Some(Rc::clone(p));
        }
        let text = self.loader.load_source(path)?;
        log::debug!("loaded {} ({} bytes)", path, text.len());
        Some(self.add_source(path, &text))
    }

    /// Binary file contents, loaded on first use.
    pub fn binary(&mut self, path: &str) -> Option<Rc<[u8]>> {
        if let Some(b) = self.binaries.get(path) {
            return Some(Rc::clone(b));
        }
        let data: Rc<[u8]> = self.loader.load_binary(path)?.into();
        self.binaries.insert(String::from(path), Rc::clone(&data));
        Some(data)
    }

    /// Start a macro definition.  Returns `false` if `name` already exists;
    /// the existing body is kept and its pass marker updated.
    pub fn new_macro(&mut self, name: &str, pass: u32) -> bool {
        if let Some(existing) = self.macros.get_mut(name) {
            Rc::make_mut(existing).pass = pass;
            return false;
        }
        let mut program = Program::new(name);
        program.pass = pass;
        self.macros.insert(String::from(name), Rc::new(program));
        true
    }

    /// Append a captured line to a macro body.
    pub fn add_macro_line(&mut self, name: &str, line: ProgramLine) {
        if let Some(m) = self.macros.get_mut(name) {
            Rc::make_mut(m).lines.push(line);
        }
    }

    /// Look up a macro (case-sensitive).
    #[must_use]
    pub fn macro_by_name(&self, name: &str) -> Option<Rc<Program>> {
        self.macros.get(name).cloned()
    }

    /// Pass in which a macro definition was last encountered.
    #[must_use]
    pub fn macro_pass(&self, name: &str) -> Option<u32> {
        self.macros.get(name).map(|m| m.pass)
    }

    /// Flag a symbol for the exported-symbol table.
    pub fn export(&mut self, name: &str) {
        if !self.exports.iter().any(|e| e == name) {
            self.exports.push(String::from(name));
        }
    }

    /// Exported names in first-export order.
    #[must_use]
    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    /// Take the errors produced while parsing files.
    pub fn take_parse_errors(&mut self) -> Vec<AsmError> {
        core::mem::take(&mut self.parse_errors)
    }
}
