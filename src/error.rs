//! The structural (`ParseError`) and semantic (`ValidationError`) error
//! sums, following this codebase's hand-rolled `Display`-impl error
//! convention (see `protobuf::error::ProtobufError`) rather than a
//! derive-macro error crate.

use std::fmt;

use crate::lexer::LexError;
use crate::span::SourceLocation;

/// A structural error raised by the lexer or parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    LexError(LexError),
    UnexpectedToken { found: String, expected: String },
    UnexpectedEndOfInput { expected: String },
    MissingRequiredElement(String),
    DuplicateElement(String),
    InvalidSyntax(String),
    InvalidMessageName(String),
    InvalidEnumName(String),
    InvalidEnumValueName(String),
    InvalidServiceName(String),
    InvalidRpcName(String),
    InvalidFieldName(String),
    InvalidFieldNumber(i32, String),
    ReservedFieldNumber(i32),
    FieldNumberOutOfRange(i32),
    DuplicateFieldNumber(i32),
    DuplicateFieldName(String, String),
    DuplicateMessageFieldNumber(i32, String),
    DuplicatePackageName(String),
    InvalidMapKeyType(String),
    RepeatedMapField(String),
    EmptyOneof(String),
    MixedReservedKinds,
    RequiredFieldInProto3,
    Custom(String),
    InternalError(String),
    TooManyErrors,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::LexError(e) => write!(f, "{}", e.message),
            ParseErrorKind::UnexpectedToken { found, expected } => {
                write!(f, "unexpected token {}, expected {}", found, expected)
            }
            ParseErrorKind::UnexpectedEndOfInput { expected } => {
                write!(f, "unexpected end of input, expected {}", expected)
            }
            ParseErrorKind::MissingRequiredElement(name) => {
                write!(f, "missing required element '{}'", name)
            }
            ParseErrorKind::DuplicateElement(name) => write!(f, "duplicate element '{}'", name),
            ParseErrorKind::InvalidSyntax(msg) => write!(f, "invalid syntax: {}", msg),
            ParseErrorKind::InvalidMessageName(s) => {
                write!(f, "invalid message name '{}': must match [A-Za-z_][A-Za-z0-9_]* and start with an uppercase letter", s)
            }
            ParseErrorKind::InvalidEnumName(s) => {
                write!(f, "invalid enum name '{}': must match [A-Za-z_][A-Za-z0-9_]* and start with an uppercase letter", s)
            }
            ParseErrorKind::InvalidEnumValueName(s) => {
                write!(f, "invalid enum value name '{}'", s)
            }
            ParseErrorKind::InvalidServiceName(s) => {
                write!(f, "invalid service name '{}': must match [A-Za-z_][A-Za-z0-9_]* and start with an uppercase letter", s)
            }
            ParseErrorKind::InvalidRpcName(s) => write!(f, "invalid rpc name '{}'", s),
            ParseErrorKind::InvalidFieldName(s) => write!(f, "invalid field name '{}'", s),
            ParseErrorKind::InvalidFieldNumber(n, msg) => {
                write!(f, "invalid field number {}: {}", n, msg)
            }
            ParseErrorKind::ReservedFieldNumber(n) => {
                write!(f, "field number {} is in the reserved range [19000, 19999]", n)
            }
            ParseErrorKind::FieldNumberOutOfRange(n) => {
                write!(f, "field number {} is out of the permitted range [1, 536870911]", n)
            }
            ParseErrorKind::DuplicateFieldNumber(n) => {
                write!(f, "duplicate field number {}", n)
            }
            ParseErrorKind::DuplicateFieldName(name, msg) => {
                write!(f, "duplicate field name '{}': {}", name, msg)
            }
            ParseErrorKind::DuplicateMessageFieldNumber(n, msg) => {
                write!(f, "duplicate field number {} in message: {}", n, msg)
            }
            ParseErrorKind::DuplicatePackageName(s) => {
                write!(f, "duplicate package declaration '{}'", s)
            }
            ParseErrorKind::InvalidMapKeyType(s) => {
                write!(f, "invalid map key type '{}': must be an integral scalar, bool, or string", s)
            }
            ParseErrorKind::RepeatedMapField(s) => write!(
                f,
                "map field '{}' may not be declared repeated, and map fields may not appear in a oneof",
                s
            ),
            ParseErrorKind::EmptyOneof(name) => write!(f, "oneof '{}' must have at least one field", name),
            ParseErrorKind::MixedReservedKinds => write!(
                f,
                "a single 'reserved' statement may not mix field numbers/ranges and names"
            ),
            ParseErrorKind::RequiredFieldInProto3 => {
                write!(f, "'required' fields are not allowed in proto3")
            }
            ParseErrorKind::Custom(msg) => write!(f, "{}", msg),
            ParseErrorKind::InternalError(msg) => write!(f, "internal error: {}", msg),
            ParseErrorKind::TooManyErrors => write!(f, "too many errors, further errors suppressed"),
        }
    }
}

/// A structural error with its source location (`None` only for
/// `UnexpectedEndOfInput`/`InternalError`, per spec).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: Option<SourceLocation>,
}

impl ParseError {
    pub fn at(position: SourceLocation, kind: ParseErrorKind) -> ParseError {
        ParseError {
            kind,
            position: Some(position),
        }
    }

    pub fn without_position(kind: ParseErrorKind) -> ParseError {
        ParseError { kind, position: None }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} at {}", self.kind, pos),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ParseError {}

/// A semantic error raised by a validator pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    InvalidSyntaxVersion(String),
    InvalidPackageName(String),
    InvalidImport(String),
    InvalidMessageName(String),
    InvalidEnumName(String),
    InvalidEnumValueName(String),
    InvalidServiceName(String),
    InvalidRpcName(String),
    InvalidFieldName(String),
    FirstEnumValueNotZero(String),
    EmptyEnum(String),
    EmptyOneof(String),
    DuplicateEnumValue(String, i32),
    DuplicateTypeName(String),
    DuplicateNestedTypeName(String),
    UndefinedType(String, String),
    UnknownOption(String),
    DuplicateOption(String),
    InvalidOptionValue(String),
    RepeatedMapField(String),
    MissingEnumZeroValue(String),
    DuplicateMessageFieldNumber(i32, String),
    DuplicatePackageName(String),
    Custom(String),
    InternalError(String),
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationErrorKind::InvalidSyntaxVersion(s) => {
                write!(f, "unsupported syntax version '{}': only \"proto3\" is supported", s)
            }
            ValidationErrorKind::InvalidPackageName(s) => write!(f, "invalid package name '{}'", s),
            ValidationErrorKind::InvalidImport(s) => write!(f, "invalid import path '{}'", s),
            ValidationErrorKind::InvalidMessageName(s) => write!(f, "invalid message name '{}'", s),
            ValidationErrorKind::InvalidEnumName(s) => write!(f, "invalid enum name '{}'", s),
            ValidationErrorKind::InvalidEnumValueName(s) => write!(f, "invalid enum value name '{}'", s),
            ValidationErrorKind::InvalidServiceName(s) => write!(f, "invalid service name '{}'", s),
            ValidationErrorKind::InvalidRpcName(s) => write!(f, "invalid rpc name '{}'", s),
            ValidationErrorKind::InvalidFieldName(s) => write!(f, "invalid field name '{}'", s),
            ValidationErrorKind::FirstEnumValueNotZero(name) => {
                write!(f, "the first value of enum '{}' must have number 0", name)
            }
            ValidationErrorKind::EmptyEnum(name) => write!(f, "enum '{}' must have at least one value", name),
            ValidationErrorKind::EmptyOneof(name) => write!(f, "oneof '{}' must have at least one field", name),
            ValidationErrorKind::DuplicateEnumValue(name, n) => {
                write!(f, "duplicate enum value number {} in enum '{}' (allow_alias is not set)", n, name)
            }
            ValidationErrorKind::DuplicateTypeName(name) => write!(f, "duplicate type name '{}'", name),
            ValidationErrorKind::DuplicateNestedTypeName(name) => {
                write!(f, "duplicate nested type name '{}'", name)
            }
            ValidationErrorKind::UndefinedType(name, referenced_in) => {
                write!(f, "undefined type '{}', referenced in '{}'", name, referenced_in)
            }
            ValidationErrorKind::UnknownOption(name) => write!(f, "unknown option '{}'", name),
            ValidationErrorKind::DuplicateOption(name) => write!(f, "duplicate option '{}'", name),
            ValidationErrorKind::InvalidOptionValue(msg) => write!(f, "invalid option value: {}", msg),
            ValidationErrorKind::RepeatedMapField(name) => {
                write!(f, "map field '{}' may not be repeated or appear in a oneof", name)
            }
            ValidationErrorKind::MissingEnumZeroValue(name) => {
                write!(f, "enum '{}' is missing a value with number 0", name)
            }
            ValidationErrorKind::DuplicateMessageFieldNumber(n, msg) => {
                write!(f, "duplicate field number {}: {}", n, msg)
            }
            ValidationErrorKind::DuplicatePackageName(s) => write!(f, "duplicate package declaration '{}'", s),
            ValidationErrorKind::Custom(msg) => write!(f, "{}", msg),
            ValidationErrorKind::InternalError(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub position: Option<SourceLocation>,
}

impl ValidationError {
    pub fn at(position: SourceLocation, kind: ValidationErrorKind) -> ValidationError {
        ValidationError {
            kind,
            position: Some(position),
        }
    }

    pub fn without_position(kind: ValidationErrorKind) -> ValidationError {
        ValidationError { kind, position: None }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} at {}", self.kind, pos),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ValidationError {}

/// The error type returned to external callers: either stage can fail,
/// and a multi-file pipeline built on top of `parse_proto_file_with_imports`
/// needs to distinguish "couldn't read the file" from "read it fine but it
/// didn't parse/validate".
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Parse(Vec<ParseError>),
    Validation(Vec<ValidationError>),
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(errors) => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
            Error::Validation(errors) => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
            Error::Io(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_is_pure_function_of_value() {
        let a = ParseError::at(
            SourceLocation::new(3, 5),
            ParseErrorKind::DuplicateFieldNumber(7),
        );
        let b = ParseError::at(
            SourceLocation::new(3, 5),
            ParseErrorKind::DuplicateFieldNumber(7),
        );
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn unequal_errors_render_differently() {
        let a = ParseError::at(SourceLocation::new(1, 1), ParseErrorKind::DuplicateFieldNumber(1));
        let b = ParseError::at(SourceLocation::new(1, 1), ParseErrorKind::DuplicateFieldNumber(2));
        assert_ne!(a.to_string(), b.to_string());
    }
}
