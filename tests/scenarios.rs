//! End-to-end scenarios exercising the full lex -> parse -> validate
//! pipeline through the public API.

use proto3_parser::ast::{Definition, TypeRef};
use proto3_parser::error::{Error, ParseErrorKind, ValidationErrorKind};
use proto3_parser::parse_proto_string;

fn ok(src: &str) -> proto3_parser::FileNode {
    parse_proto_string(src.to_string()).unwrap_or_else(|errors| panic!("expected success, got {:?}", errors))
}

fn err(src: &str) -> Vec<Error> {
    parse_proto_string(src.to_string()).expect_err("expected an error")
}

#[test]
fn scenario_a_minimal_valid_file() {
    let file = ok(r#"syntax = "proto3"; message M { string s = 1; }"#);
    assert_eq!(file.syntax, "proto3");
    let m = file.messages().next().unwrap();
    assert_eq!(m.name, "M");
    assert_eq!(m.fields.len(), 1);
    assert_eq!(m.fields[0].name, "s");
    assert_eq!(m.fields[0].number, 1);
    assert!(matches!(m.fields[0].typ, TypeRef::Scalar(_)));
}

#[test]
fn scenario_b_enum_with_alias() {
    let file = ok("enum E { option allow_alias = true; U = 0; A = 1; B = 1; }");
    let e = file.enums().next().unwrap();
    assert!(e.allow_alias);
    assert_eq!(e.values.len(), 3);
}

#[test]
fn scenario_c_field_number_in_reserved_range() {
    let errors = err("message M { string s = 19500; }");
    let Error::Parse(parse_errors) = &errors[0] else {
        panic!("expected a parse error, got {:?}", errors)
    };
    assert!(parse_errors
        .iter()
        .any(|e| matches!(e.kind, ParseErrorKind::ReservedFieldNumber(19500))));
}

#[test]
fn scenario_d_map_inside_oneof_is_rejected() {
    let errors = err("message M { oneof o { map<string,string> m = 1; } }");
    let Error::Parse(parse_errors) = &errors[0] else {
        panic!("expected a parse error, got {:?}", errors)
    };
    assert!(parse_errors
        .iter()
        .any(|e| matches!(&e.kind, ParseErrorKind::RepeatedMapField(_))));
}

#[test]
fn scenario_e_unresolved_type() {
    let errors = err("message M { UndefinedType x = 1; }");
    let Error::Validation(validation_errors) = &errors[0] else {
        panic!("expected a validation error, got {:?}", errors)
    };
    assert!(validation_errors.iter().any(|e| matches!(
        &e.kind,
        ValidationErrorKind::UndefinedType(name, owner) if name == "UndefinedType" && owner == "M"
    )));
}

#[test]
fn scenario_f_streaming_rpc_round_trip() {
    let file = ok("message Req {} message Resp {} service S { rpc Chat(stream Req) returns (stream Resp); }");
    let s = file.services().next().unwrap();
    let rpc = &s.rpcs[0];
    assert_eq!(rpc.name, "Chat");
    assert!(rpc.client_streaming);
    assert!(rpc.server_streaming);
}

#[test]
fn scenario_g_duplicate_package() {
    let errors = err(r#"syntax = "proto3"; package a; package b;"#);
    let Error::Parse(parse_errors) = &errors[0] else {
        panic!("expected a parse error, got {:?}", errors)
    };
    assert!(parse_errors
        .iter()
        .any(|e| matches!(e.kind, ParseErrorKind::DuplicatePackageName(_))));
}

#[test]
fn field_number_boundaries() {
    for n in [1, 18999, 536_870_911] {
        ok(&format!("message M {{ int32 x = {}; }}", n));
    }
    for n in [0, -1, 19000, 19999, 536_870_912] {
        err(&format!("message M {{ int32 x = {}; }}", n));
    }
}

#[test]
fn empty_file_is_valid() {
    let file = ok("");
    assert_eq!(file.syntax, "proto3");
    assert!(file.definitions.is_empty());
}

#[test]
fn whitespace_only_file_is_valid() {
    let file = ok("   \n\t\n  ");
    assert!(file.definitions.is_empty());
}

#[test]
fn file_with_only_a_syntax_declaration_is_valid() {
    let file = ok(r#"syntax = "proto3";"#);
    assert!(file.definitions.is_empty());
}

#[test]
fn every_permitted_map_key_scalar_is_accepted() {
    for key in ["int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32", "fixed64", "sfixed32", "sfixed64", "bool", "string"] {
        ok(&format!("message M {{ map<{}, string> m = 1; }}", key));
    }
}

#[test]
fn forbidden_map_key_scalars_are_rejected() {
    for key in ["float", "double", "bytes"] {
        err(&format!("message M {{ map<{}, string> m = 1; }}", key));
    }
}

#[test]
fn enum_aliasing_toggle() {
    ok("enum E { option allow_alias = true; A = 0; B = 0; }");
    err("enum E { A = 0; B = 0; }");
}

#[test]
fn nested_messages_and_enums_resolve_and_register() {
    let file = ok(
        r#"
        message Outer {
            message Inner { int32 x = 1; }
            enum Status { UNKNOWN = 0; }
            Inner i = 1;
            Status s = 2;
        }
        "#,
    );
    let outer = file.messages().next().unwrap();
    assert_eq!(outer.messages.len(), 1);
    assert_eq!(outer.enums.len(), 1);
}

#[test]
fn duplicate_top_level_type_name_is_a_validation_error() {
    let errors = err("message M {} enum M { A = 0; }");
    let Error::Validation(validation_errors) = &errors[0] else {
        panic!("expected a validation error, got {:?}", errors)
    };
    assert!(validation_errors
        .iter()
        .any(|e| matches!(&e.kind, ValidationErrorKind::DuplicateTypeName(n) if n == "M")));
}

#[test]
fn extension_of_a_well_known_option_type_is_usable_as_a_custom_option() {
    let file = ok(
        r#"
        extend google.protobuf.FileOptions { string my_option = 50000; }
        option (my_option) = "hello";
        message M {}
        "#,
    );
    assert_eq!(file.options.len(), 1);
    assert!(file.options[0].is_custom);
}

#[test]
fn parsing_is_deterministic() {
    let src = r#"syntax = "proto3"; message M { string s = 1; } enum E { A = 0; }"#;
    let first = ok(src);
    let second = ok(src);
    assert_eq!(first, second);
}

#[test]
fn definitions_preserve_source_order() {
    let file = ok("message A {} enum B { X = 0; } message C {}");
    let kinds: Vec<&str> = file
        .definitions
        .iter()
        .map(|d| match d {
            Definition::Message(_) => "message",
            Definition::Enum(_) => "enum",
            Definition::Service(_) => "service",
            Definition::Extend(_) => "extend",
        })
        .collect();
    assert_eq!(kinds, vec!["message", "enum", "message"]);
}
