//! Error types and source location tracking for diagnostics.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// Source location for diagnostics.
///
/// Names the program (source file or macro) a line came from and its
/// 1-based line number within that program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    /// Source file path or macro name.
    pub source: String,
    /// 1-based line number within `source`.
    pub line: u32,
}

impl Location {
    /// Create a new location.
    #[must_use]
    pub fn new(source: &str, line: u32) -> Self {
        Self {
            source: String::from(source),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "{}", self.line)
        } else {
            write!(f, "{}:{}", self.source, self.line)
        }
    }
}

/// Severity class of an [`AsmError`].
///
/// Recoverable classes skip the rest of the offending line and assembly
/// continues with the next one.  A fatal error aborts the file or macro
/// body currently being interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// Malformed line, bad pseudo-op arity or type, unknown opcode.
    Syntax,
    /// A value does not fit where it is used.
    OutOfRange,
    /// Unrecoverable for the current program.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::OutOfRange => write!(f, "out of range"),
            ErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Assembly error with source location and descriptive message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsmError {
    /// Generic syntax error: bad arity, invalid argument type, stray ENDM.
    Syntax {
        /// The syntax error message.
        msg: String,
        /// Location of the offending line.
        loc: Location,
    },

    /// A value is outside the range accepted by the instruction or pseudo-op.
    OutOfRange {
        /// Description of the value and its limits.
        msg: String,
        /// Location of the offending line.
        loc: Location,
    },

    /// Opcode is neither a pseudo-op, a 6809 instruction, nor a macro.
    UnknownInstruction {
        /// The opcode as written.
        mnemonic: String,
        /// Location of the offending line.
        loc: Location,
    },

    /// Instruction does not support the operand shape it was given.
    InvalidAddressingMode {
        /// The instruction mnemonic.
        mnemonic: String,
        /// Location of the offending line.
        loc: Location,
    },

    /// Referenced symbol has no value in this pass.
    UndefinedSymbol {
        /// The symbol name, or `1B` / `1F` style local reference.
        name: String,
        /// Location of the reference.
        loc: Location,
    },

    /// Macro defined twice within the same pass.
    MacroRedefined {
        /// The macro name.
        name: String,
        /// Location of the second definition.
        loc: Location,
    },

    /// Nested macro expansion / file inclusion went too deep.
    DepthExceeded {
        /// Configured maximum program depth.
        limit: usize,
        /// Location of the line that requested the expansion.
        loc: Location,
    },

    /// A source or binary file could not be loaded.
    FileNotFound {
        /// Path as given to INCLUDE / INCLUDEBIN.
        path: String,
        /// Location of the including line.
        loc: Location,
    },

    /// A section ended at a different address than on the previous pass.
    LayoutDiverged {
        /// Section name.
        section: String,
        /// End address recorded on the previous pass.
        previous: i64,
        /// End address reached on this pass.
        current: i64,
    },

    /// Symbols were still changing when the pass limit was reached.
    PassLimit {
        /// Maximum number of passes allowed.
        max: u32,
    },

    /// Multiple errors collected during assembly.
    Multiple {
        /// The collected assembly errors.
        errors: Vec<AsmError>,
    },
}

impl AsmError {
    /// Severity class of this error.
    ///
    /// A [`AsmError::Multiple`] reports the most severe of its members.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AsmError::Syntax { .. }
            | AsmError::UnknownInstruction { .. }
            | AsmError::InvalidAddressingMode { .. }
            | AsmError::UndefinedSymbol { .. }
            | AsmError::MacroRedefined { .. } => ErrorKind::Syntax,
            AsmError::OutOfRange { .. } => ErrorKind::OutOfRange,
            AsmError::DepthExceeded { .. }
            | AsmError::FileNotFound { .. }
            | AsmError::LayoutDiverged { .. }
            | AsmError::PassLimit { .. } => ErrorKind::Fatal,
            AsmError::Multiple { errors } => {
                if errors.iter().any(|e| e.kind() == ErrorKind::Fatal) {
                    ErrorKind::Fatal
                } else if errors.iter().any(|e| e.kind() == ErrorKind::OutOfRange) {
                    ErrorKind::OutOfRange
                } else {
                    ErrorKind::Syntax
                }
            }
        }
    }

    /// Whether this error aborts the program being interpreted.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Collapse a list of errors: `None` when empty, the error itself when
    /// there is exactly one, [`AsmError::Multiple`] otherwise.
    #[must_use]
    pub fn from_list(mut errors: Vec<AsmError>) -> Option<AsmError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(AsmError::Multiple { errors }),
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::Syntax { msg, loc } => write!(f, "{}: {}", loc, msg),
            AsmError::OutOfRange { msg, loc } => write!(f, "{}: {}", loc, msg),
            AsmError::UnknownInstruction { mnemonic, loc } => {
                write!(f, "{}: unknown instruction '{}'", loc, mnemonic)
            }
            AsmError::InvalidAddressingMode { mnemonic, loc } => {
                write!(f, "{}: invalid addressing mode for '{}'", loc, mnemonic)
            }
            AsmError::UndefinedSymbol { name, loc } => {
                write!(f, "{}: symbol '{}' undefined", loc, name)
            }
            AsmError::MacroRedefined { name, loc } => {
                write!(f, "{}: macro '{}' redefined", loc, name)
            }
            AsmError::DepthExceeded { limit, loc } => {
                write!(f, "{}: maximum program depth exceeded (limit: {})", loc, limit)
            }
            AsmError::FileNotFound { path, loc } => {
                write!(f, "{}: file not found: {}", loc, path)
            }
            AsmError::LayoutDiverged {
                section,
                previous,
                current,
            } => {
                write!(
                    f,
                    "section '{}' ended at ${:04X} but ended at ${:04X} on the previous pass",
                    section, current, previous
                )
            }
            AsmError::PassLimit { max } => {
                write!(
                    f,
                    "symbols still changing after {} passes (possible oscillation)",
                    max
                )
            }
            AsmError::Multiple { errors } => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AsmError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("demo.s", 12)
    }

    #[test]
    fn location_display() {
        assert_eq!(format!("{}", loc()), "demo.s:12");
        assert_eq!(format!("{}", Location::default()), "0");
    }

    #[test]
    fn error_unknown_instruction_display() {
        let err = AsmError::UnknownInstruction {
            mnemonic: "frob".into(),
            loc: loc(),
        };
        assert_eq!(format!("{}", err), "demo.s:12: unknown instruction 'frob'");
    }

    #[test]
    fn error_syntax_display() {
        let err = AsmError::Syntax {
            msg: "ENDM without beginning MACRO".into(),
            loc: loc(),
        };
        assert_eq!(format!("{}", err), "demo.s:12: ENDM without beginning MACRO");
    }

    #[test]
    fn error_layout_diverged_display() {
        let err = AsmError::LayoutDiverged {
            section: "CODE".into(),
            previous: 0x4010,
            current: 0x4012,
        };
        assert_eq!(
            format!("{}", err),
            "section 'CODE' ended at $4012 but ended at $4010 on the previous pass"
        );
    }

    #[test]
    fn kinds_follow_taxonomy() {
        let syntax = AsmError::MacroRedefined {
            name: "m".into(),
            loc: loc(),
        };
        let range = AsmError::OutOfRange {
            msg: "negative argument to RMB".into(),
            loc: loc(),
        };
        let fatal = AsmError::DepthExceeded {
            limit: 8,
            loc: loc(),
        };
        assert_eq!(syntax.kind(), ErrorKind::Syntax);
        assert_eq!(range.kind(), ErrorKind::OutOfRange);
        assert!(fatal.is_fatal());
        let all = AsmError::Multiple {
            errors: vec![syntax.clone(), range.clone()],
        };
        assert_eq!(all.kind(), ErrorKind::OutOfRange);
        let all = AsmError::Multiple {
            errors: vec![syntax, range, fatal],
        };
        assert_eq!(all.kind(), ErrorKind::Fatal);
    }

    #[test]
    fn from_list_collapses() {
        assert_eq!(AsmError::from_list(Vec::new()), None);
        let one = AsmError::PassLimit { max: 12 };
        assert_eq!(AsmError::from_list(vec![one.clone()]), Some(one.clone()));
        let many = AsmError::from_list(vec![one.clone(), one]);
        assert!(matches!(many, Some(AsmError::Multiple { ref errors }) if errors.len() == 2));
    }

    #[test]
    fn error_multiple_display() {
        let err = AsmError::Multiple {
            errors: vec![
                AsmError::Syntax {
                    msg: "err1".into(),
                    loc: Location::new("a.s", 1),
                },
                AsmError::Syntax {
                    msg: "err2".into(),
                    loc: Location::new("a.s", 2),
                },
            ],
        };
        let s = format!("{}", err);
        assert!(s.contains("err1"));
        assert!(s.contains("err2"));
    }
}
