//! Source positions shared by the lexer, parser and validator.

use std::fmt;

/// A 1-based line/column position in a source file.
///
/// Line and column numbers are 1-based, matching the convention of every
/// other diagnostic-producing tool in this codebase (`protobuf`'s own
/// text-format `Loc`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub const fn new(line: u32, column: u32) -> SourceLocation {
        SourceLocation { line, column }
    }

    /// The position at the very start of a file.
    pub const fn start() -> SourceLocation {
        SourceLocation { line: 1, column: 1 }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Wraps a value together with the source location it was parsed from.
///
/// Used for AST nodes where callers (the validator, descriptor summary
/// builder) need to report errors pointing back at the original text
/// without every node type re-declaring a `loc` field.
#[derive(Debug, Clone, PartialEq)]
pub struct WithLoc<T> {
    pub loc: SourceLocation,
    pub value: T,
}

impl<T> WithLoc<T> {
    pub fn new(loc: SourceLocation, value: T) -> WithLoc<T> {
        WithLoc { loc, value }
    }
}
