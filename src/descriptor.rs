//! In-memory descriptor summary: a reduced, allocation-simple echo of
//! this codebase's `protobuf::descriptor` `FileDescriptorProto` shape,
//! built from a validated AST instead of decoded from wire bytes.
//!
//! No varint/wire encoding happens here; this is a structural
//! transcription of the AST plus whatever the symbol table already
//! knows about type resolution.

use crate::ast::*;
use crate::symbol_table::SymbolTable;

pub const TYPE_DOUBLE: &str = "TYPE_DOUBLE";
pub const TYPE_FLOAT: &str = "TYPE_FLOAT";
pub const TYPE_INT64: &str = "TYPE_INT64";
pub const TYPE_UINT64: &str = "TYPE_UINT64";
pub const TYPE_INT32: &str = "TYPE_INT32";
pub const TYPE_FIXED64: &str = "TYPE_FIXED64";
pub const TYPE_FIXED32: &str = "TYPE_FIXED32";
pub const TYPE_BOOL: &str = "TYPE_BOOL";
pub const TYPE_STRING: &str = "TYPE_STRING";
pub const TYPE_BYTES: &str = "TYPE_BYTES";
pub const TYPE_UINT32: &str = "TYPE_UINT32";
pub const TYPE_SFIXED32: &str = "TYPE_SFIXED32";
pub const TYPE_SFIXED64: &str = "TYPE_SFIXED64";
pub const TYPE_SINT32: &str = "TYPE_SINT32";
pub const TYPE_SINT64: &str = "TYPE_SINT64";
pub const TYPE_MESSAGE: &str = "TYPE_MESSAGE";
pub const TYPE_ENUM: &str = "TYPE_ENUM";

#[derive(Debug, Clone, PartialEq)]
pub struct UninterpretedOptionSummary {
    pub name_parts: Vec<String>,
    pub value: OptionValue,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptionsSummary {
    pub uninterpreted: Vec<UninterpretedOptionSummary>,
}

fn summarize_options(options: &[OptionNode]) -> OptionsSummary {
    OptionsSummary {
        uninterpreted: options
            .iter()
            .map(|o| UninterpretedOptionSummary {
                name_parts: o.path_parts.iter().map(|p| p.name.clone()).collect(),
                value: o.value.clone(),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptorSummary {
    pub name: String,
    pub number: i32,
    pub type_name: Option<String>,
    pub type_: &'static str,
    pub label_repeated: bool,
    pub oneof_index: Option<usize>,
    pub options: OptionsSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDescriptorSummary {
    pub name: String,
    pub number: i32,
    pub options: OptionsSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDescriptorSummary {
    pub name: String,
    pub values: Vec<EnumValueDescriptorSummary>,
    pub options: OptionsSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSummary {
    pub name: String,
    pub fields: Vec<FieldDescriptorSummary>,
    pub nested_types: Vec<DescriptorSummary>,
    pub enum_types: Vec<EnumDescriptorSummary>,
    pub extensions: Vec<FieldDescriptorSummary>,
    pub oneof_names: Vec<String>,
    pub options: OptionsSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptorSummary {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: OptionsSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptorSummary {
    pub name: String,
    pub methods: Vec<MethodDescriptorSummary>,
    pub options: OptionsSummary,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileDescriptorSummary {
    pub package: Option<String>,
    pub message_types: Vec<DescriptorSummary>,
    pub enum_types: Vec<EnumDescriptorSummary>,
    pub services: Vec<ServiceDescriptorSummary>,
    pub extensions: Vec<FieldDescriptorSummary>,
    pub options: OptionsSummary,
}

fn resolve_field_type(typ: &TypeRef, symbols: &SymbolTable) -> (&'static str, Option<String>, bool) {
    match typ {
        TypeRef::Scalar(s) => (scalar_descriptor_type(*s), None, false),
        TypeRef::Named(name) => {
            let resolved = symbols.lookup_type(name.trim_start_matches('.'));
            match resolved {
                Some(sym) if sym.kind == crate::symbol_table::Kind::Enum => {
                    (TYPE_ENUM, Some(sym.full_name.clone()), false)
                }
                Some(sym) => (TYPE_MESSAGE, Some(sym.full_name.clone()), false),
                None => (TYPE_MESSAGE, Some(name.trim_start_matches('.').to_string()), false),
            }
        }
        TypeRef::Map(_, value) => {
            let (t, n, _) = resolve_field_type(value, symbols);
            (t, n, true)
        }
    }
}

fn scalar_descriptor_type(s: ScalarType) -> &'static str {
    match s {
        ScalarType::Double => TYPE_DOUBLE,
        ScalarType::Float => TYPE_FLOAT,
        ScalarType::Int64 => TYPE_INT64,
        ScalarType::Uint64 => TYPE_UINT64,
        ScalarType::Int32 => TYPE_INT32,
        ScalarType::Fixed64 => TYPE_FIXED64,
        ScalarType::Fixed32 => TYPE_FIXED32,
        ScalarType::Bool => TYPE_BOOL,
        ScalarType::String => TYPE_STRING,
        ScalarType::Bytes => TYPE_BYTES,
        ScalarType::Uint32 => TYPE_UINT32,
        ScalarType::Sfixed32 => TYPE_SFIXED32,
        ScalarType::Sfixed64 => TYPE_SFIXED64,
        ScalarType::Sint32 => TYPE_SINT32,
        ScalarType::Sint64 => TYPE_SINT64,
    }
}

fn build_field(field: &FieldNode, symbols: &SymbolTable) -> FieldDescriptorSummary {
    let (type_, type_name, map_forced_repeated) = resolve_field_type(&field.typ, symbols);
    FieldDescriptorSummary {
        name: field.name.clone(),
        number: field.number,
        type_name,
        type_,
        label_repeated: field.is_repeated || field.typ.is_map() || map_forced_repeated,
        oneof_index: None,
        options: summarize_options(&field.options),
    }
}

fn build_message(message: &MessageNode, symbols: &SymbolTable) -> DescriptorSummary {
    let mut fields: Vec<FieldDescriptorSummary> = message.fields.iter().map(|f| build_field(f, symbols)).collect();
    for (idx, oneof) in message.oneofs.iter().enumerate() {
        for f in &oneof.fields {
            let mut summary = build_field(f, symbols);
            summary.oneof_index = Some(idx);
            fields.push(summary);
        }
    }
    DescriptorSummary {
        name: message.name.clone(),
        fields,
        nested_types: message.messages.iter().map(|m| build_message(m, symbols)).collect(),
        enum_types: message.enums.iter().map(build_enum).collect(),
        extensions: message
            .extends
            .iter()
            .flat_map(|ex| ex.fields.iter())
            .map(|f| build_field(f, symbols))
            .collect(),
        oneof_names: message.oneofs.iter().map(|o| o.name.clone()).collect(),
        options: summarize_options(&message.options),
    }
}

fn build_enum(e: &EnumNode) -> EnumDescriptorSummary {
    EnumDescriptorSummary {
        name: e.name.clone(),
        values: e
            .values
            .iter()
            .map(|v| EnumValueDescriptorSummary {
                name: v.name.clone(),
                number: v.number,
                options: summarize_options(&v.options),
            })
            .collect(),
        options: summarize_options(&e.options),
    }
}

fn build_service(s: &ServiceNode) -> ServiceDescriptorSummary {
    ServiceDescriptorSummary {
        name: s.name.clone(),
        methods: s
            .rpcs
            .iter()
            .map(|rpc| MethodDescriptorSummary {
                name: rpc.name.clone(),
                input_type: rpc.input_type.clone(),
                output_type: rpc.output_type.clone(),
                client_streaming: rpc.client_streaming,
                server_streaming: rpc.server_streaming,
                options: summarize_options(&rpc.options),
            })
            .collect(),
        options: summarize_options(&s.options),
    }
}

/// Builds the descriptor summary for an already-validated file. Callers
/// are expected to have run the validator first; this function does no
/// validation of its own, it only transcribes.
pub fn build(file: &FileNode, symbols: &SymbolTable) -> FileDescriptorSummary {
    log::trace!("building descriptor summary");
    FileDescriptorSummary {
        package: file.package.clone(),
        message_types: file.messages().map(|m| build_message(m, symbols)).collect(),
        enum_types: file.enums().map(build_enum).collect(),
        services: file.services().map(build_service).collect(),
        extensions: file
            .extends()
            .flat_map(|ex| ex.fields.iter())
            .map(|f| build_field(f, symbols))
            .collect(),
        options: summarize_options(&file.options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::validator::Validator;

    fn build_summary(src: &str) -> FileDescriptorSummary {
        let file = Parser::new(src).unwrap().parse_file().unwrap();
        let mut validator = Validator::new();
        validator.validate(&file).unwrap();
        build(&file, &validator.state.symbol_table)
    }

    #[test]
    fn scalar_field_resolves_to_its_type_constant() {
        let summary = build_summary("message M { int32 x = 1; }");
        assert_eq!(summary.message_types[0].fields[0].type_, TYPE_INT32);
        assert_eq!(summary.message_types[0].fields[0].type_name, None);
    }

    #[test]
    fn message_field_resolves_through_the_symbol_table() {
        let summary = build_summary("message A { B b = 1; } message B { int32 x = 1; }");
        let field = &summary.message_types[0].fields[0];
        assert_eq!(field.type_, TYPE_MESSAGE);
        assert_eq!(field.type_name.as_deref(), Some("B"));
    }

    #[test]
    fn enum_field_resolves_to_type_enum() {
        let summary = build_summary("message M { Color c = 1; } enum Color { UNKNOWN = 0; }");
        let field = &summary.message_types[0].fields[0];
        assert_eq!(field.type_, TYPE_ENUM);
    }

    #[test]
    fn oneof_fields_carry_their_oneof_index() {
        let summary = build_summary("message M { oneof x { int32 a = 1; string b = 2; } }");
        let fields = &summary.message_types[0].fields;
        assert!(fields.iter().all(|f| f.oneof_index == Some(0)));
    }

    #[test]
    fn map_fields_are_reported_as_repeated() {
        let summary = build_summary("message M { map<string, int32> m = 1; }");
        assert!(summary.message_types[0].fields[0].label_repeated);
    }

    #[test]
    fn unknown_custom_option_is_carried_uninterpreted() {
        let summary = build_summary(
            r#"
            extend google.protobuf.FileOptions { string my_option = 50000; }
            option (my_option) = "hello";
            message M {}
            "#,
        );
        assert_eq!(summary.options.uninterpreted.len(), 1);
    }
}
