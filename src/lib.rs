//! A pure Rust lexer, recursive-descent parser and multi-pass semantic
//! validator for proto3 interface definition files.
//!
//! This crate does not generate code and does not serialize to the
//! protobuf wire format; it turns proto3 source text into a validated
//! [`ast::FileNode`] and, optionally, a [`descriptor::FileDescriptorSummary`].
//!
//! ```
//! let file = proto3_parser::parse_proto_string(
//!     r#"syntax = "proto3"; message Greeting { string text = 1; }"#.to_string(),
//! ).unwrap();
//! assert_eq!(file.messages().next().unwrap().name, "Greeting");
//! ```

pub mod ast;
pub mod descriptor;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod symbol_table;
pub mod validator;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub use ast::FileNode;
pub use error::{Error, ParseError, ValidationError};
pub use parser::ParserConfig;
pub use validator::Validator;

/// Parses and validates proto3 source text, per `parse_proto_string` in
/// the public interface: lex, parse, then run every validator pass. On
/// success returns the validated [`FileNode`]; on failure, every error
/// collected (structural and/or semantic) is returned together.
pub fn parse_proto_string(source: String) -> Result<FileNode, Vec<Error>> {
    parse_proto_string_with_config(source, ParserConfig::default())
}

pub fn parse_proto_string_with_config(source: String, config: ParserConfig) -> Result<FileNode, Vec<Error>> {
    log::debug!("parsing {} byte(s) of proto3 source", source.len());
    let parser = parser::Parser::with_config(&source, config).map_err(|errors| vec![Error::Parse(errors)])?;
    let file = parser.parse_file().map_err(|errors| vec![Error::Parse(errors)])?;

    Validator::new()
        .validate(&file)
        .map(|()| file)
        .map_err(|errors| vec![Error::Validation(errors)])
}

/// Reads `path` into a `String` and delegates to [`parse_proto_string`],
/// populating `FileNode::file_path` with the source path. File I/O beyond
/// this single read is out of scope for this crate.
pub fn parse_proto_file(path: impl AsRef<Path>) -> Result<FileNode, Vec<Error>> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| vec![Error::Io(e.to_string())])?;
    let mut file = parse_proto_string(source)?;
    file.file_path = Some(path.to_string_lossy().into_owned());
    Ok(file)
}

/// Parses `path`, additionally pre-populating `imported_types` from its
/// declared imports. Import resolution is first-match search over
/// `import_paths`; a missing import is a hard error. This performs a
/// single level of import parsing (collecting the imported file's own
/// top-level type names) rather than a full transitive dependency graph,
/// matching this crate's single-file validation model.
pub fn parse_proto_file_with_imports(
    path: impl AsRef<Path>,
    import_paths: &[String],
) -> Result<FileNode, Vec<Error>> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| vec![Error::Io(e.to_string())])?;

    let file = parser::Parser::new(&source)
        .map_err(|errors| vec![Error::Parse(errors)])?
        .parse_file()
        .map_err(|errors| vec![Error::Parse(errors)])?;

    let mut imported_types: HashMap<String, String> = HashMap::new();
    for import in &file.imports {
        let resolved_path = import_paths
            .iter()
            .map(|base| Path::new(base).join(&import.path))
            .find(|candidate| candidate.is_file());
        let resolved_path = match resolved_path {
            Some(p) => p,
            None => {
                return Err(vec![Error::Io(format!(
                    "import '{}' not found in any of the given import paths",
                    import.path
                ))]);
            }
        };
        let imported_source = fs::read_to_string(&resolved_path).map_err(|e| vec![Error::Io(e.to_string())])?;
        let imported_file = parser::Parser::new(&imported_source)
            .map_err(|errors| vec![Error::Parse(errors)])?
            .parse_file()
            .map_err(|errors| vec![Error::Parse(errors)])?;
        let package = imported_file.package.clone().unwrap_or_default();
        let qualify = |name: &str| -> String {
            if package.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", package, name)
            }
        };
        for m in imported_file.messages() {
            imported_types.insert(qualify(&m.name), resolved_path.to_string_lossy().into_owned());
        }
        for e in imported_file.enums() {
            imported_types.insert(qualify(&e.name), resolved_path.to_string_lossy().into_owned());
        }
    }

    let mut validator = Validator::new();
    validator.set_imported_types(imported_types);
    match validator.validate(&file) {
        Ok(()) => {
            let mut file = file;
            file.file_path = Some(path.to_string_lossy().into_owned());
            Ok(file)
        }
        Err(errors) => Err(vec![Error::Validation(errors)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_validates_a_minimal_file() {
        let file = parse_proto_string(
            r#"syntax = "proto3"; message Greeting { string text = 1; }"#.to_string(),
        )
        .unwrap();
        assert_eq!(file.messages().next().unwrap().name, "Greeting");
    }

    #[test]
    fn collects_semantic_errors_for_an_invalid_message_name() {
        let err = parse_proto_string("message lower_case_name { int32 x = 1; }".to_string()).unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = parse_proto_file("/no/such/path.proto").unwrap_err();
        assert!(matches!(err.as_slice(), [Error::Io(_)]));
    }
}
