//! Fully-qualified name registry shared by the validator's passes.
//!
//! Mirrors the scope-stack/fully-qualified-name bookkeeping this codebase's
//! descriptor tooling already does when it composes `FileDescriptorProto`
//! paths, generalised into a standalone lookup structure.

use std::collections::HashMap;

use crate::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Message,
    Enum,
    Service,
    Field,
    Extension,
}

/// A borrowed reference back to the AST node a symbol was registered
/// from. Kept as a reference rather than an owned copy so the symbol
/// table never drifts from the tree the parser actually produced.
#[derive(Debug, Clone, Copy)]
pub enum SymbolNode<'a> {
    Message(&'a MessageNode),
    Enum(&'a EnumNode),
    Service(&'a ServiceNode),
    Field(&'a FieldNode),
}

#[derive(Debug, Clone)]
pub struct Symbol<'a> {
    pub id: SymbolId,
    pub full_name: String,
    pub kind: Kind,
    pub node: SymbolNode<'a>,
    pub parent: Option<SymbolId>,
    pub children: Vec<SymbolId>,
    pub extended_type: Option<String>,
    pub field_number: Option<i32>,
    pub field_type: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSymbol(pub String);

/// The fully-qualified-name registry populated by the validator's
/// registration pass (V3) and consulted by every later pass.
#[derive(Default)]
pub struct SymbolTable<'a> {
    symbols: Vec<Symbol<'a>>,
    by_name: HashMap<String, SymbolId>,
    extensions_by_extended_type: HashMap<String, Vec<SymbolId>>,
    /// Types resolved from a prior parse/validate invocation and threaded
    /// in via `set_imported_types`, keyed by fully qualified name to the
    /// source path that defined them.
    imported_types: HashMap<String, String>,
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> SymbolTable<'a> {
        SymbolTable::default()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
        self.by_name.clear();
        self.extensions_by_extended_type.clear();
        self.imported_types.clear();
    }

    pub fn set_imported_types(&mut self, types: HashMap<String, String>) {
        self.imported_types = types;
    }

    pub fn is_imported(&self, full_name: &str) -> bool {
        self.imported_types.contains_key(full_name)
    }

    fn next_id(&self) -> SymbolId {
        SymbolId(self.symbols.len())
    }

    pub fn add(
        &mut self,
        node: SymbolNode<'a>,
        full_name: String,
        kind: Kind,
        parent: Option<SymbolId>,
    ) -> Result<SymbolId, DuplicateSymbol> {
        if self.by_name.contains_key(&full_name) {
            return Err(DuplicateSymbol(full_name));
        }
        let id = self.next_id();
        self.symbols.push(Symbol {
            id,
            full_name: full_name.clone(),
            kind,
            node,
            parent,
            children: Vec::new(),
            extended_type: None,
            field_number: None,
            field_type: None,
        });
        self.by_name.insert(full_name, id);
        if let Some(parent_id) = parent {
            self.symbols[parent_id.0].children.push(id);
        }
        Ok(id)
    }

    pub fn add_extension(
        &mut self,
        field: &'a FieldNode,
        full_name: String,
        extended_type: String,
        parent: Option<SymbolId>,
    ) -> Result<SymbolId, DuplicateSymbol> {
        let id = self.add(SymbolNode::Field(field), full_name, Kind::Extension, parent)?;
        self.symbols[id.0].extended_type = Some(extended_type.clone());
        self.symbols[id.0].field_number = Some(field.number);
        self.symbols[id.0].field_type = Some(field.typ.clone());
        self.extensions_by_extended_type
            .entry(extended_type)
            .or_insert_with(Vec::new)
            .push(id);
        Ok(id)
    }

    pub fn lookup(&self, full_name: &str) -> Option<&Symbol<'a>> {
        self.by_name.get(full_name).map(|id| &self.symbols[id.0])
    }

    pub fn lookup_type(&self, full_name: &str) -> Option<&Symbol<'a>> {
        self.lookup(full_name)
            .filter(|s| matches!(s.kind, Kind::Message | Kind::Enum))
    }

    pub fn lookup_extensions(&self, extended_type: &str) -> Vec<&Symbol<'a>> {
        self.extensions_by_extended_type
            .get(extended_type)
            .map(|ids| ids.iter().map(|id| &self.symbols[id.0]).collect())
            .unwrap_or_default()
    }

    pub fn has_field(&self, type_name: &str, field_name: &str) -> bool {
        self.lookup(type_name)
            .map(|s| match s.node {
                SymbolNode::Message(m) => m.field_by_name(field_name).is_some(),
                _ => false,
            })
            .unwrap_or(false)
    }

    pub fn resolve_field_type(&self, type_name: &str, field_name: &str) -> Option<TypeRef> {
        self.lookup(type_name).and_then(|s| match s.node {
            SymbolNode::Message(m) => m.field_by_name(field_name).map(|f| f.typ.clone()),
            _ => None,
        })
    }

    pub fn resolve_option_type(&self, extension_full_name: &str) -> Option<TypeRef> {
        self.lookup(extension_full_name)
            .and_then(|s| s.field_type.clone())
    }

    pub fn get_symbols(&self, kind: Kind) -> Vec<&Symbol<'a>> {
        self.symbols.iter().filter(|s| s.kind == kind).collect()
    }

    /// The relative-name-resolution algorithm: tries the scope stack from
    /// innermost to outermost, then the package, then verbatim against
    /// imported types.
    pub fn resolve(&self, reference: &str, scope_stack: &[String], package: Option<&str>) -> Option<String> {
        if let Some(stripped) = reference.strip_prefix('.') {
            if self.lookup_type(stripped).is_some() || self.imported_types.contains_key(stripped) {
                return Some(stripped.to_string());
            }
            return None;
        }

        for i in (0..scope_stack.len()).rev() {
            let candidate = format!("{}.{}", scope_stack[i], reference);
            if self.lookup_type(&candidate).is_some() {
                return Some(candidate);
            }
        }
        if let Some(pkg) = package {
            if !pkg.is_empty() {
                let candidate = format!("{}.{}", pkg, reference);
                if self.lookup_type(&candidate).is_some() {
                    return Some(candidate);
                }
            }
        }
        if self.lookup_type(reference).is_some() {
            return Some(reference.to_string());
        }
        if self.imported_types.contains_key(reference) {
            return Some(reference.to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SourceLocation;

    fn dummy_message(name: &str) -> MessageNode {
        MessageNode {
            id: MessageId(0),
            name: name.to_string(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            options: Vec::new(),
            reserved: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            extends: Vec::new(),
            loc: SourceLocation::start(),
            leading_comments: Vec::new(),
        }
    }

    #[test]
    fn registers_and_looks_up_by_full_name() {
        let m = dummy_message("Foo");
        let mut table = SymbolTable::new();
        let id = table
            .add(SymbolNode::Message(&m), "pkg.Foo".to_string(), Kind::Message, None)
            .unwrap();
        assert_eq!(table.lookup("pkg.Foo").unwrap().id, id);
        assert!(table.lookup_type("pkg.Foo").is_some());
    }

    #[test]
    fn duplicate_registration_fails() {
        let m = dummy_message("Foo");
        let mut table = SymbolTable::new();
        table
            .add(SymbolNode::Message(&m), "pkg.Foo".to_string(), Kind::Message, None)
            .unwrap();
        let err = table
            .add(SymbolNode::Message(&m), "pkg.Foo".to_string(), Kind::Message, None)
            .unwrap_err();
        assert_eq!(err, DuplicateSymbol("pkg.Foo".to_string()));
    }

    #[test]
    fn resolve_walks_scope_stack_innermost_first() {
        let inner = dummy_message("Inner");
        let outer = dummy_message("Outer");
        let mut table = SymbolTable::new();
        table
            .add(SymbolNode::Message(&outer), "pkg.Outer".to_string(), Kind::Message, None)
            .unwrap();
        table
            .add(SymbolNode::Message(&inner), "pkg.Outer.Inner".to_string(), Kind::Message, None)
            .unwrap();
        let scopes = vec!["pkg".to_string(), "pkg.Outer".to_string()];
        assert_eq!(
            table.resolve("Inner", &scopes, Some("pkg")),
            Some("pkg.Outer.Inner".to_string())
        );
    }

    #[test]
    fn resolve_absolute_reference_strips_leading_dot() {
        let m = dummy_message("Foo");
        let mut table = SymbolTable::new();
        table
            .add(SymbolNode::Message(&m), "pkg.Foo".to_string(), Kind::Message, None)
            .unwrap();
        assert_eq!(table.resolve(".pkg.Foo", &[], None), Some("pkg.Foo".to_string()));
    }

    #[test]
    fn resolve_falls_back_to_imported_types() {
        let mut table = SymbolTable::new();
        let mut imported = HashMap::new();
        imported.insert("other.Thing".to_string(), "other.proto".to_string());
        table.set_imported_types(imported);
        assert_eq!(table.resolve("other.Thing", &[], None), Some("other.Thing".to_string()));
    }

    #[test]
    fn unresolved_reference_returns_none() {
        let table = SymbolTable::new();
        assert_eq!(table.resolve("Nope", &[], None), None);
    }
}
