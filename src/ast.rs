//! Abstract syntax tree produced by the parser.
//!
//! Node shapes mirror `protobuf_codegen_pure::model` (this codebase's
//! existing proto-file-to-descriptor AST) generalised to the field names
//! and invariants this crate's validator enforces.

use crate::span::SourceLocation;

/// The closed set of proto3 scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub fn from_name(s: &str) -> Option<ScalarType> {
        Some(match s {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "sint32" => ScalarType::Sint32,
            "sint64" => ScalarType::Sint64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::Sfixed32,
            "sfixed64" => ScalarType::Sfixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    /// Permitted map key scalars: integral types, `bool`, `string`.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(self, ScalarType::Float | ScalarType::Double | ScalarType::Bytes)
    }
}

/// A field's declared type, exactly as written (a `Named` reference keeps
/// its original spelling, relative or absolute, for later resolution).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Scalar(ScalarType),
    Named(String),
    Map(ScalarType, Box<TypeRef>),
}

impl TypeRef {
    pub fn is_map(&self) -> bool {
        matches!(self, TypeRef::Map(..))
    }
}

/// A dynamically-typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Number(f64),
    Identifier(String),
    Array(Vec<OptionValue>),
    Map(Vec<(String, OptionValue)>),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Identifier(s) if s == "true" => Some(true),
            OptionValue::Identifier(s) if s == "false" => Some(false),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            OptionValue::String(_) => "string",
            OptionValue::Number(_) => "number",
            OptionValue::Identifier(_) => "identifier",
            OptionValue::Array(_) => "array",
            OptionValue::Map(_) => "map",
        }
    }
}

/// One dotted/extension segment of an option's name, e.g. in
/// `(my.ext).field1.field2` the parts are `(my.ext)` (extension) and
/// `field1`, `field2` (plain).
#[derive(Debug, Clone, PartialEq)]
pub struct PathPart {
    pub name: String,
    pub is_extension: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionNode {
    pub name: String,
    pub path_parts: Vec<PathPart>,
    pub value: OptionValue,
    pub is_custom: bool,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OneofId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub typ: TypeRef,
    pub number: i32,
    pub is_repeated: bool,
    pub is_optional: bool,
    pub oneof_parent: Option<OneofId>,
    pub options: Vec<OptionNode>,
    pub json_name: Option<String>,
    pub loc: SourceLocation,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OneofNode {
    pub id: OneofId,
    pub name: String,
    pub fields: Vec<FieldNode>,
    pub loc: SourceLocation,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReservedRange {
    Single(i32),
    Range(i32, i32),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReservedNode {
    pub ranges: Vec<ReservedRange>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct MessageNode {
    pub id: MessageId,
    pub name: String,
    pub fields: Vec<FieldNode>,
    pub oneofs: Vec<OneofNode>,
    pub options: Vec<OptionNode>,
    pub reserved: Vec<ReservedNode>,
    pub messages: Vec<MessageNode>,
    pub enums: Vec<EnumNode>,
    pub extends: Vec<ExtendNode>,
    pub loc: SourceLocation,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueNode {
    pub name: String,
    pub number: i32,
    pub options: Vec<OptionNode>,
    pub loc: SourceLocation,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumNode {
    pub name: String,
    pub values: Vec<EnumValueNode>,
    pub options: Vec<OptionNode>,
    /// Cached from an `allow_alias = true` option on this enum.
    pub allow_alias: bool,
    pub loc: SourceLocation,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendNode {
    pub type_name: String,
    pub fields: Vec<FieldNode>,
    pub is_top_level: bool,
    pub parent: Option<MessageId>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcNode {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: Vec<OptionNode>,
    pub loc: SourceLocation,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceNode {
    pub name: String,
    pub rpcs: Vec<RpcNode>,
    pub options: Vec<OptionNode>,
    pub loc: SourceLocation,
    pub leading_comments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportModifier {
    None,
    Public,
    Weak,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportNode {
    pub path: String,
    pub modifier: ImportModifier,
    pub loc: SourceLocation,
}

/// A top-level declaration, in source order. `FileNode` keeps both this
/// ordered sequence (for diagnostics and the dependency/registration
/// passes, which want source order) and the by-kind slices callers
/// usually want (`messages`, `enums`, ...), which are views built at
/// parse time rather than copies.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Message(MessageNode),
    Enum(EnumNode),
    Service(ServiceNode),
    Extend(ExtendNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    pub syntax: String,
    pub package: Option<String>,
    pub imports: Vec<ImportNode>,
    pub options: Vec<OptionNode>,
    pub definitions: Vec<Definition>,
    pub file_path: Option<String>,
}

impl FileNode {
    pub fn messages(&self) -> impl Iterator<Item = &MessageNode> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Message(m) => Some(m),
            _ => None,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumNode> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Enum(e) => Some(e),
            _ => None,
        })
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceNode> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Service(s) => Some(s),
            _ => None,
        })
    }

    pub fn extends(&self) -> impl Iterator<Item = &ExtendNode> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Extend(e) => Some(e),
            _ => None,
        })
    }
}

impl MessageNode {
    /// All fields owned directly by this message, including those that
    /// live inside a `oneof` (they still occupy the message's field
    /// number space).
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldNode> {
        self.fields
            .iter()
            .chain(self.oneofs.iter().flat_map(|o| o.fields.iter()))
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldNode> {
        self.all_fields().find(|f| f.name == name)
    }
}
