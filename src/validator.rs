//! Multi-pass semantic validator: the nine ordered passes (V1-V9) that
//! enforce everything not already enforced structurally by the parser.
//!
//! Each pass owns a disjoint slice of the proto3 rule set; see the module
//! doc on `crate::parser` for the structural/semantic split this codebase
//! treats as a contract between the two components.

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::error::{ValidationError, ValidationErrorKind};
use crate::symbol_table::{Kind, SymbolNode, SymbolTable};

/// Shared, mutable state threaded through every pass.
pub struct ValidationState<'a> {
    pub current_package: Option<String>,
    pub defined_types: HashSet<String>,
    pub scope_stack: Vec<String>,
    pub imported_types: HashMap<String, String>,
    /// Reserved for full imported-definition bookkeeping (beyond the
    /// name-to-path map `imported_types` carries); unused until
    /// multi-file descriptor emission needs more than name resolution.
    pub imported_definitions: HashMap<String, String>,
    pub dependencies: HashMap<String, HashSet<String>>,
    pub symbol_table: SymbolTable<'a>,
}

impl<'a> Default for ValidationState<'a> {
    fn default() -> ValidationState<'a> {
        ValidationState {
            current_package: None,
            defined_types: HashSet::new(),
            scope_stack: Vec::new(),
            imported_types: HashMap::new(),
            imported_definitions: HashMap::new(),
            dependencies: HashMap::new(),
            symbol_table: SymbolTable::new(),
        }
    }
}

pub struct Validator<'a> {
    pub state: ValidationState<'a>,
    errors: Vec<ValidationError>,
}

impl<'a> Validator<'a> {
    pub fn new() -> Validator<'a> {
        Validator {
            state: ValidationState::default(),
            errors: Vec::new(),
        }
    }

    /// Threads symbols resolved from another file's validation into this
    /// one, so references to imported types can resolve without
    /// re-parsing the importing file's whole dependency graph.
    pub fn set_imported_types(&mut self, types: HashMap<String, String>) {
        self.state.imported_types = types.clone();
        self.state.symbol_table.set_imported_types(types);
    }

    /// Runs all nine passes over `file` in order, returning the collected
    /// errors. Every pass runs regardless of earlier failures, which keeps
    /// each pass's findings independent of one another.
    pub fn validate(&mut self, file: &'a FileNode) -> Result<(), Vec<ValidationError>> {
        log::trace!("running validator passes V1-V9");
        self.state.current_package = file.package.clone();

        self.run_syntax_pass(file);
        self.run_package_pass(file);
        self.run_registration_pass(file);
        self.run_enum_pass(file);
        self.run_message_pass(file);
        self.run_reference_pass(file);
        self.run_option_pass(file);
        self.run_service_pass(file);
        self.run_dependency_pass(file);

        if self.errors.is_empty() {
            Ok(())
        } else {
            log::debug!("validation produced {} error(s)", self.errors.len());
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn push(&mut self, kind: ValidationErrorKind) {
        self.errors.push(ValidationError::without_position(kind));
    }

    fn push_at(&mut self, loc: crate::span::SourceLocation, kind: ValidationErrorKind) {
        self.errors.push(ValidationError::at(loc, kind));
    }

    // --- V1: syntax -----------------------------------------------------

    fn run_syntax_pass(&mut self, file: &FileNode) {
        if file.syntax != "proto3" {
            self.push(ValidationErrorKind::InvalidSyntaxVersion(file.syntax.clone()));
        }
    }

    // --- V2: package -----------------------------------------------------

    fn run_package_pass(&mut self, file: &FileNode) {
        if let Some(package) = &file.package {
            if !is_valid_package_name(package) {
                self.push(ValidationErrorKind::InvalidPackageName(package.clone()));
            }
        }
    }

    // --- V3: registration --------------------------------------------------

    fn run_registration_pass(&mut self, file: &'a FileNode) {
        let package = file.package.clone();
        let root_scope = package.clone().unwrap_or_default();

        for message in file.messages() {
            self.register_message(message, None, &root_scope);
        }
        for e in file.enums() {
            self.register_enum(e, None, &root_scope);
        }
        for s in file.services() {
            self.register_service(s, &root_scope);
        }
        for ex in file.extends() {
            self.register_extend(ex, None, &root_scope);
        }
    }

    fn register_message(
        &mut self,
        message: &'a MessageNode,
        parent: Option<crate::symbol_table::SymbolId>,
        scope: &str,
    ) {
        let full_name = qualify(scope, &message.name);
        match self
            .state
            .symbol_table
            .add(SymbolNode::Message(message), full_name.clone(), Kind::Message, parent)
        {
            Ok(id) => {
                self.state.defined_types.insert(full_name.clone());
                for nested in &message.messages {
                    self.register_message(nested, Some(id), &full_name);
                }
                for e in &message.enums {
                    self.register_enum(e, Some(id), &full_name);
                }
                for ex in &message.extends {
                    self.register_extend(ex, Some(id), &full_name);
                }
            }
            Err(dup) => {
                let kind = if parent.is_some() {
                    ValidationErrorKind::DuplicateNestedTypeName(dup.0)
                } else {
                    ValidationErrorKind::DuplicateTypeName(dup.0)
                };
                self.push_at(message.loc, kind);
            }
        }
    }

    fn register_enum(&mut self, e: &'a EnumNode, parent: Option<crate::symbol_table::SymbolId>, scope: &str) {
        let full_name = qualify(scope, &e.name);
        match self
            .state
            .symbol_table
            .add(SymbolNode::Enum(e), full_name.clone(), Kind::Enum, parent)
        {
            Ok(_) => {
                self.state.defined_types.insert(full_name);
            }
            Err(dup) => {
                let kind = if parent.is_some() {
                    ValidationErrorKind::DuplicateNestedTypeName(dup.0)
                } else {
                    ValidationErrorKind::DuplicateTypeName(dup.0)
                };
                self.push_at(e.loc, kind);
            }
        }
    }

    fn register_service(&mut self, s: &'a ServiceNode, scope: &str) {
        let full_name = qualify(scope, &s.name);
        match self
            .state
            .symbol_table
            .add(SymbolNode::Service(s), full_name.clone(), Kind::Service, None)
        {
            Ok(_) => {
                self.state.defined_types.insert(full_name);
            }
            Err(dup) => self.push_at(s.loc, ValidationErrorKind::DuplicateTypeName(dup.0)),
        }
    }

    fn register_extend(&mut self, ex: &'a ExtendNode, parent: Option<crate::symbol_table::SymbolId>, scope: &str) {
        let extended_type = ex.type_name.trim_start_matches('.').to_string();
        for field in &ex.fields {
            let full_name = qualify(scope, &field.name);
            if let Err(dup) =
                self.state
                    .symbol_table
                    .add_extension(field, full_name, extended_type.clone(), parent)
            {
                self.push_at(field.loc, ValidationErrorKind::DuplicateTypeName(dup.0));
            }
        }
    }

    // --- V4: enum ----------------------------------------------------------

    fn run_enum_pass(&mut self, file: &FileNode) {
        for e in walk_enums(file) {
            if !is_upper_camel(&e.name) {
                self.push_at(e.loc, ValidationErrorKind::InvalidEnumName(e.name.clone()));
            }
            if e.values.is_empty() {
                self.push_at(e.loc, ValidationErrorKind::EmptyEnum(e.name.clone()));
                continue;
            }
            for v in &e.values {
                if !is_screaming_snake(&v.name) {
                    self.push_at(v.loc, ValidationErrorKind::InvalidEnumValueName(v.name.clone()));
                }
            }
            if e.values[0].number != 0 {
                self.push_at(e.loc, ValidationErrorKind::FirstEnumValueNotZero(e.name.clone()));
            }
            let mut seen_names = HashSet::new();
            for v in &e.values {
                if !seen_names.insert(&v.name) {
                    self.push_at(v.loc, ValidationErrorKind::InvalidEnumValueName(v.name.clone()));
                }
            }
            if !e.allow_alias {
                let mut seen_numbers = HashSet::new();
                for v in &e.values {
                    if !seen_numbers.insert(v.number) {
                        self.push_at(
                            v.loc,
                            ValidationErrorKind::DuplicateEnumValue(e.name.clone(), v.number),
                        );
                    }
                }
            }
        }
    }

    // --- V5: message ---------------------------------------------------

    fn run_message_pass(&mut self, file: &FileNode) {
        for m in walk_messages(file) {
            if !is_upper_camel(&m.name) {
                self.push_at(m.loc, ValidationErrorKind::InvalidMessageName(m.name.clone()));
            }

            let mut numbers: HashMap<i32, &str> = HashMap::new();
            for f in m.all_fields() {
                if f.number <= 0 || f.number > 536_870_911 {
                    self.push_at(
                        f.loc,
                        ValidationErrorKind::Custom(format!(
                            "field '{}' has out-of-range number {}",
                            f.name, f.number
                        )),
                    );
                } else if (19000..=19999).contains(&f.number) {
                    self.push_at(
                        f.loc,
                        ValidationErrorKind::Custom(format!(
                            "field '{}' uses reserved number {}",
                            f.name, f.number
                        )),
                    );
                }
                if let Some(prev) = numbers.insert(f.number, &f.name) {
                    self.push_at(
                        f.loc,
                        ValidationErrorKind::DuplicateMessageFieldNumber(
                            f.number,
                            format!("'{}' conflicts with '{}'", f.name, prev),
                        ),
                    );
                }
                if !is_identifier(&f.name) {
                    self.push_at(f.loc, ValidationErrorKind::InvalidFieldName(f.name.clone()));
                }
                if f.typ.is_map() && (f.is_repeated || f.oneof_parent.is_some()) {
                    self.push_at(f.loc, ValidationErrorKind::RepeatedMapField(f.name.clone()));
                }
                if let TypeRef::Map(key, _) = &f.typ {
                    if !key.is_valid_map_key() {
                        self.push_at(
                            f.loc,
                            ValidationErrorKind::Custom(format!(
                                "map field '{}' has invalid key type '{}'",
                                f.name,
                                key.name()
                            )),
                        );
                    }
                }
            }

            let mut reserved_numbers: Vec<(i32, i32)> = Vec::new();
            let mut reserved_names: Vec<&str> = Vec::new();
            for r in &m.reserved {
                for range in &r.ranges {
                    match range {
                        ReservedRange::Single(n) => reserved_numbers.push((*n, *n)),
                        ReservedRange::Range(a, b) => reserved_numbers.push((*a, *b)),
                        ReservedRange::Name(n) => reserved_names.push(n),
                    }
                }
            }
            for f in m.all_fields() {
                if reserved_numbers.iter().any(|(lo, hi)| f.number >= *lo && f.number <= *hi) {
                    self.push_at(
                        f.loc,
                        ValidationErrorKind::Custom(format!(
                            "field '{}' number {} collides with a reserved range",
                            f.name, f.number
                        )),
                    );
                }
                if reserved_names.contains(&f.name.as_str()) {
                    self.push_at(
                        f.loc,
                        ValidationErrorKind::Custom(format!("field name '{}' is reserved", f.name)),
                    );
                }
            }

            let mut nested_names: HashSet<&str> = HashSet::new();
            for nested in &m.messages {
                if !nested_names.insert(&nested.name) {
                    self.push_at(
                        nested.loc,
                        ValidationErrorKind::DuplicateNestedTypeName(nested.name.clone()),
                    );
                }
            }
            for e in &m.enums {
                if !nested_names.insert(&e.name) {
                    self.push_at(e.loc, ValidationErrorKind::DuplicateNestedTypeName(e.name.clone()));
                }
            }

            for oneof in &m.oneofs {
                if oneof.fields.is_empty() {
                    self.push_at(oneof.loc, ValidationErrorKind::EmptyOneof(oneof.name.clone()));
                }
            }
        }
    }

    // --- V6: reference -------------------------------------------------

    fn run_reference_pass(&mut self, file: &FileNode) {
        let package = file.package.clone();
        for m in walk_messages_with_scope(file, package.as_deref()) {
            for f in m.node.all_fields() {
                if let Some(name) = named_type_of(&f.typ) {
                    if self.state.symbol_table.resolve(name, &m.scope_stack, package.as_deref()).is_none() {
                        self.push_at(
                            f.loc,
                            ValidationErrorKind::UndefinedType(name.to_string(), m.node.name.clone()),
                        );
                    }
                }
            }
            for ex in &m.node.extends {
                let target = ex.type_name.trim_start_matches('.');
                if !is_well_known_option_type(target)
                    && self
                        .state
                        .symbol_table
                        .resolve(target, &m.scope_stack, package.as_deref())
                        .is_none()
                {
                    self.push_at(
                        ex.loc,
                        ValidationErrorKind::UndefinedType(ex.type_name.clone(), m.node.name.clone()),
                    );
                }
                self.check_extension_field_types(ex, &m.scope_stack, package.as_deref(), &m.node.name);
            }
        }
        for ex in file.extends() {
            let target = ex.type_name.trim_start_matches('.');
            if !is_well_known_option_type(target) && self.state.symbol_table.resolve(target, &[], package.as_deref()).is_none() {
                self.push_at(
                    ex.loc,
                    ValidationErrorKind::UndefinedType(ex.type_name.clone(), "file".to_string()),
                );
            }
            self.check_extension_field_types(ex, &[], package.as_deref(), "file");
        }
        for s in file.services() {
            for rpc in &s.rpcs {
                for (label, type_name) in [("input", &rpc.input_type), ("output", &rpc.output_type)] {
                    let target = type_name.trim_start_matches('.');
                    if self.state.symbol_table.resolve(target, &[], package.as_deref()).is_none() {
                        let _ = label;
                        self.push_at(
                            rpc.loc,
                            ValidationErrorKind::UndefinedType(type_name.clone(), "service".to_string()),
                        );
                    }
                }
            }
        }
    }

    fn check_extension_field_types(&mut self, ex: &ExtendNode, scope_stack: &[String], package: Option<&str>, owner: &str) {
        for f in &ex.fields {
            if let Some(name) = named_type_of(&f.typ) {
                if self.state.symbol_table.resolve(name, scope_stack, package).is_none() {
                    self.push_at(f.loc, ValidationErrorKind::UndefinedType(name.to_string(), owner.to_string()));
                }
            }
        }
    }

    // --- V7: option ------------------------------------------------------

    fn run_option_pass(&mut self, file: &FileNode) {
        self.check_option_site(&file.options, OptionSite::File, "file", true);
        for m in walk_messages(file) {
            self.check_option_site(&m.options, OptionSite::Message, &m.name, true);
            for f in m.all_fields() {
                self.check_option_site(&f.options, OptionSite::Field, &f.name, true);
                if let Some(packed) = f.options.iter().find(|o| o.name == "packed") {
                    if !f.is_repeated || f.typ.is_map() || matches!(f.typ, TypeRef::Named(_)) {
                        self.push_at(
                            packed.loc,
                            ValidationErrorKind::InvalidOptionValue(
                                "'packed' is only valid on repeated scalar fields".to_string(),
                            ),
                        );
                    }
                }
            }
        }
        for e in walk_enums(file) {
            self.check_option_site(&e.options, OptionSite::Enum, &e.name, true);
            for v in &e.values {
                self.check_option_site(&v.options, OptionSite::EnumValue, &v.name, true);
            }
        }
        for s in file.services() {
            self.check_option_site(&s.options, OptionSite::Service, &s.name, false);
            for rpc in &s.rpcs {
                self.check_option_site(&rpc.options, OptionSite::Method, &rpc.name, false);
            }
        }
    }

    fn check_option_site(&mut self, options: &[OptionNode], site: OptionSite, owner: &str, strict: bool) {
        let mut seen = HashSet::new();
        for opt in options {
            if !seen.insert(&opt.name) {
                self.push_at(opt.loc, ValidationErrorKind::DuplicateOption(opt.name.clone()));
            }
            if opt.is_custom {
                let extended_type = site.descriptor_type_name();
                let extension_name = opt
                    .path_parts
                    .first()
                    .map(|p| p.name.trim_start_matches('.').to_string());
                let resolved = extension_name.as_deref().and_then(|n| {
                    self.state
                        .symbol_table
                        .lookup_extensions(extended_type)
                        .into_iter()
                        .find(|s| s.full_name.ends_with(n))
                });
                if resolved.is_none() {
                    self.push_at(opt.loc, ValidationErrorKind::UnknownOption(opt.name.clone()));
                }
                continue;
            }
            match site.expected_type(&opt.name) {
                Some(expected) => {
                    if !expected.matches(&opt.value) {
                        self.push_at(
                            opt.loc,
                            ValidationErrorKind::InvalidOptionValue(format!(
                                "option '{}' on {} '{}' expects {}, found {}",
                                opt.name,
                                site.label(),
                                owner,
                                expected.describe(),
                                opt.value.kind_name()
                            )),
                        );
                    }
                }
                None => {
                    // `strict` distinguishes sites a future caller might
                    // want to treat unknown options on as warnings-only
                    // (service/method) from sites where it should always be
                    // a hard error (file/message/field/enum/enum-value).
                    // Both record the same error today since no pass here
                    // short-circuits on an earlier one's findings.
                    let _ = strict;
                    self.push_at(opt.loc, ValidationErrorKind::UnknownOption(opt.name.clone()));
                }
            }
        }
    }

    // --- V8: service -----------------------------------------------------

    fn run_service_pass(&mut self, file: &FileNode) {
        for s in file.services() {
            if !is_upper_camel(&s.name) {
                self.push_at(s.loc, ValidationErrorKind::InvalidServiceName(s.name.clone()));
            }
            let mut seen = HashSet::new();
            for rpc in &s.rpcs {
                if !is_upper_camel(&rpc.name) {
                    self.push_at(rpc.loc, ValidationErrorKind::InvalidRpcName(rpc.name.clone()));
                }
                if !seen.insert(&rpc.name) {
                    self.push_at(rpc.loc, ValidationErrorKind::Custom(format!(
                        "duplicate rpc name '{}' in service '{}'",
                        rpc.name, s.name
                    )));
                }
                if let Some(timeout) = rpc.options.iter().find(|o| o.name == "timeout") {
                    if !is_valid_timeout(&timeout.value) {
                        self.push_at(
                            timeout.loc,
                            ValidationErrorKind::InvalidOptionValue(
                                "Invalid RPC option: timeout".to_string(),
                            ),
                        );
                    }
                }
            }
        }
    }

    // --- V9: dependency ----------------------------------------------------

    fn run_dependency_pass(&mut self, file: &FileNode) {
        let package = file.package.clone();
        for m in walk_messages_with_scope(file, package.as_deref()) {
            let from = m.full_name.clone();
            let mut edges = HashSet::new();
            for f in m.node.all_fields() {
                if let Some(name) = named_type_of(&f.typ) {
                    if let Some(target) = self.state.symbol_table.resolve(name, &m.scope_stack, package.as_deref()) {
                        edges.insert(target);
                    }
                }
            }
            self.state.dependencies.entry(from).or_insert_with(HashSet::new).extend(edges);
        }
    }
}

fn named_type_of(typ: &TypeRef) -> Option<&str> {
    match typ {
        TypeRef::Named(n) => Some(n.trim_start_matches('.')),
        TypeRef::Map(_, value) => named_type_of(value),
        TypeRef::Scalar(_) => None,
    }
}

/// The well-known `google.protobuf.*Options` messages are never declared in
/// user source, so the symbol table has no entry for them. An `extend`
/// targeting one of these is the standard custom-option idiom and must not
/// be flagged as an undefined type.
const WELL_KNOWN_OPTION_TYPES: &[&str] = &[
    "google.protobuf.FileOptions",
    "google.protobuf.MessageOptions",
    "google.protobuf.FieldOptions",
    "google.protobuf.EnumOptions",
    "google.protobuf.EnumValueOptions",
    "google.protobuf.ServiceOptions",
    "google.protobuf.MethodOptions",
];

fn is_well_known_option_type(name: &str) -> bool {
    WELL_KNOWN_OPTION_TYPES.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionSite {
    File,
    Message,
    Field,
    Enum,
    EnumValue,
    Service,
    Method,
}

enum ExpectedOptionType {
    String,
    Bool,
    IdentifierIn(&'static [&'static str]),
    /// Accepted here for duplicate/shape bookkeeping; its value is
    /// validated separately (e.g. `timeout`, checked against the
    /// unit-suffix rule by the service pass).
    CheckedElsewhere,
}

impl ExpectedOptionType {
    fn matches(&self, value: &OptionValue) -> bool {
        match self {
            ExpectedOptionType::String => matches!(value, OptionValue::String(_)),
            ExpectedOptionType::Bool => value.as_bool().is_some(),
            ExpectedOptionType::IdentifierIn(allowed) => {
                matches!(value, OptionValue::Identifier(s) if allowed.contains(&s.as_str()))
            }
            ExpectedOptionType::CheckedElsewhere => true,
        }
    }

    fn describe(&self) -> String {
        match self {
            ExpectedOptionType::String => "a string".to_string(),
            ExpectedOptionType::Bool => "a boolean".to_string(),
            ExpectedOptionType::IdentifierIn(allowed) => format!("one of {:?}", allowed),
            ExpectedOptionType::CheckedElsewhere => "a valid value".to_string(),
        }
    }
}

impl OptionSite {
    fn label(&self) -> &'static str {
        match self {
            OptionSite::File => "file",
            OptionSite::Message => "message",
            OptionSite::Field => "field",
            OptionSite::Enum => "enum",
            OptionSite::EnumValue => "enum value",
            OptionSite::Service => "service",
            OptionSite::Method => "method",
        }
    }

    fn descriptor_type_name(&self) -> &'static str {
        match self {
            OptionSite::File => "google.protobuf.FileOptions",
            OptionSite::Message => "google.protobuf.MessageOptions",
            OptionSite::Field => "google.protobuf.FieldOptions",
            OptionSite::Enum => "google.protobuf.EnumOptions",
            OptionSite::EnumValue => "google.protobuf.EnumValueOptions",
            OptionSite::Service => "google.protobuf.ServiceOptions",
            OptionSite::Method => "google.protobuf.MethodOptions",
        }
    }

    fn expected_type(&self, name: &str) -> Option<ExpectedOptionType> {
        match (self, name) {
            (OptionSite::File, "java_package") => Some(ExpectedOptionType::String),
            (OptionSite::File, "java_outer_classname") => Some(ExpectedOptionType::String),
            (OptionSite::File, "optimize_for") => {
                Some(ExpectedOptionType::IdentifierIn(&["SPEED", "CODE_SIZE", "LITE_RUNTIME"]))
            }
            (OptionSite::File, "cc_enable_arenas") => Some(ExpectedOptionType::Bool),
            (OptionSite::Message, "deprecated") => Some(ExpectedOptionType::Bool),
            (OptionSite::Message, "map_entry") => Some(ExpectedOptionType::Bool),
            (OptionSite::Field, "deprecated") => Some(ExpectedOptionType::Bool),
            (OptionSite::Field, "packed") => Some(ExpectedOptionType::Bool),
            (OptionSite::Field, "json_name") => Some(ExpectedOptionType::String),
            (OptionSite::Enum, "allow_alias") => Some(ExpectedOptionType::Bool),
            (OptionSite::Enum, "deprecated") => Some(ExpectedOptionType::Bool),
            (OptionSite::EnumValue, "deprecated") => Some(ExpectedOptionType::Bool),
            (OptionSite::Service, "deprecated") => Some(ExpectedOptionType::Bool),
            (OptionSite::Method, "deprecated") => Some(ExpectedOptionType::Bool),
            (OptionSite::Method, "idempotency_level") => Some(ExpectedOptionType::IdentifierIn(&[
                "IDEMPOTENCY_UNKNOWN",
                "NO_SIDE_EFFECTS",
                "IDEMPOTENT",
            ])),
            (OptionSite::Method, "timeout") => Some(ExpectedOptionType::CheckedElsewhere),
            _ => None,
        }
    }
}

/// Accepts only a quoted string ending in a duration unit suffix; see
/// DESIGN.md for why a bare numeric literal is rejected.
fn is_valid_timeout(value: &OptionValue) -> bool {
    match value {
        OptionValue::String(s) => {
            const UNITS: &[&str] = &["ns", "us", "ms", "s", "m", "h"];
            UNITS.iter().any(|unit| {
                s.len() > unit.len() && s.ends_with(unit) && s[..s.len() - unit.len()].chars().all(|c| c.is_ascii_digit() || c == '.')
            })
        }
        _ => false,
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_upper_camel(s: &str) -> bool {
    is_identifier(s) && s.chars().next().map_or(false, |c| c.is_ascii_uppercase())
}

fn is_screaming_snake(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().map_or(false, |c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_valid_package_name(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.split('.').all(|segment| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    })
}

/// Depth-first, pre-order, left-to-right walk over every message in the
/// file, including nested messages.
fn walk_messages(file: &FileNode) -> Vec<&MessageNode> {
    let mut out = Vec::new();
    fn visit<'a>(m: &'a MessageNode, out: &mut Vec<&'a MessageNode>) {
        out.push(m);
        for nested in &m.messages {
            visit(nested, out);
        }
    }
    for m in file.messages() {
        visit(m, &mut out);
    }
    out
}

fn walk_enums(file: &FileNode) -> Vec<&EnumNode> {
    let mut out: Vec<&EnumNode> = file.enums().collect();
    for m in walk_messages(file) {
        out.extend(m.enums.iter());
    }
    out
}

struct ScopedMessage<'a> {
    node: &'a MessageNode,
    full_name: String,
    scope_stack: Vec<String>,
}

fn walk_messages_with_scope<'a>(file: &'a FileNode, package: Option<&str>) -> Vec<ScopedMessage<'a>> {
    let mut out = Vec::new();
    let root = package.unwrap_or("").to_string();
    fn visit<'a>(m: &'a MessageNode, scope: &str, scope_stack: &[String], out: &mut Vec<ScopedMessage<'a>>) {
        let full_name = qualify(scope, &m.name);
        let mut next_stack = scope_stack.to_vec();
        next_stack.push(full_name.clone());
        out.push(ScopedMessage {
            node: m,
            full_name: full_name.clone(),
            scope_stack: next_stack.clone(),
        });
        for nested in &m.messages {
            visit(nested, &full_name, &next_stack, out);
        }
    }
    let base_stack: Vec<String> = if root.is_empty() { Vec::new() } else { vec![root.clone()] };
    for m in file.messages() {
        visit(m, &root, &base_stack, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn validate(src: &str) -> Result<(), Vec<ValidationError>> {
        let file = Parser::new(src).unwrap().parse_file().unwrap();
        Validator::new().validate(&file)
    }

    #[test]
    fn scenario_a_minimal_valid_file_has_no_errors() {
        assert!(validate(r#"syntax = "proto3"; message M { string s = 1; }"#).is_ok());
    }

    #[test]
    fn scenario_e_unresolved_type_is_reported() {
        let errors = validate("message M { UndefinedType x = 1; }").unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            &e.kind,
            ValidationErrorKind::UndefinedType(name, owner) if name == "UndefinedType" && owner == "M"
        )));
    }

    #[test]
    fn resolves_forward_references_within_the_same_file() {
        assert!(validate("message A { B b = 1; } message B { int32 x = 1; }").is_ok());
    }

    #[test]
    fn lowercase_message_name_is_rejected() {
        let errors = validate("message lower { int32 x = 1; }").unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(&e.kind, ValidationErrorKind::InvalidMessageName(n) if n == "lower")));
    }

    #[test]
    fn invalid_package_name_is_rejected() {
        let errors = validate("package Invalid.Pkg; message M {}").unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(&e.kind, ValidationErrorKind::InvalidPackageName(_))));
    }

    #[test]
    fn unknown_file_option_is_a_hard_error() {
        let errors = validate(r#"option totally_made_up = "x"; message M {}"#).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(&e.kind, ValidationErrorKind::UnknownOption(n) if n == "totally_made_up")));
    }

    #[test]
    fn optimize_for_accepts_only_known_identifiers() {
        let errors = validate(r#"option optimize_for = NONSENSE; message M {}"#).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(&e.kind, ValidationErrorKind::InvalidOptionValue(_))));
        assert!(validate(r#"option optimize_for = SPEED; message M {}"#).is_ok());
    }

    #[test]
    fn empty_service_is_accepted() {
        assert!(validate("service S {}").is_ok());
    }

    #[test]
    fn timeout_requires_a_unit_suffixed_string() {
        let errors =
            validate(r#"message Req {} message Resp {} service S { rpc M(Req) returns (Resp) { option timeout = 5; } }"#)
                .unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(&e.kind, ValidationErrorKind::InvalidOptionValue(msg) if msg.contains("timeout"))));
        assert!(validate(
            r#"message Req {} message Resp {} service S { rpc M(Req) returns (Resp) { option timeout = "30s"; } }"#
        )
        .is_ok());
    }

    #[test]
    fn nested_type_resolution_prefers_innermost_scope() {
        let src = "message Outer { message Inner {} Inner i = 1; }";
        assert!(validate(src).is_ok());
    }
}
