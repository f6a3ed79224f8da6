//! Predictive recursive-descent parser: token stream to [`FileNode`].
//!
//! The parser is authoritative for *structural* errors (duplicate field
//! numbers/names within a message, reserved-range conflicts, malformed
//! grammar); cross-cutting checks (undefined types, option typing) are the
//! validator's job. See `crate::validator` for that half of the contract.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Keyword, LexError, Lexer, Token, TokenKind};
use crate::span::SourceLocation;

/// Parser configuration. Mirrors the `ParseOptions`/`Customize`
/// builder-struct pattern this codebase already uses for the JSON parser
/// and Rust codegen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParserConfig {
    /// Upper bound on accumulated errors before the parser stops.
    pub max_errors: usize,
    /// Whether the parser resynchronises after a recoverable error
    /// instead of stopping at the first one.
    pub continue_on_error: bool,
}

impl Default for ParserConfig {
    fn default() -> ParserConfig {
        ParserConfig {
            max_errors: 100,
            continue_on_error: true,
        }
    }
}

/// Raised internally to unwind out of the current production when a
/// parse error is irrecoverable (EOF mid-construct) or the error budget
/// is exhausted.
struct Abort;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    config: ParserConfig,
    next_oneof_id: usize,
    next_message_id: usize,
}

type PResult<T> = Result<T, Abort>;

const TOP_LEVEL_KEYWORDS: &[Keyword] = &[
    Keyword::Message,
    Keyword::Enum,
    Keyword::Service,
    Keyword::Extend,
    Keyword::Option,
    Keyword::Import,
    Keyword::Package,
    Keyword::Syntax,
];

impl Parser {
    pub fn new(source: &str) -> Result<Parser, Vec<ParseError>> {
        Self::with_config(source, ParserConfig::default())
    }

    pub fn with_config(source: &str, config: ParserConfig) -> Result<Parser, Vec<ParseError>> {
        let tokens = Lexer::new(source).tokenize().map_err(|e: LexError| {
            vec![ParseError::at(e.position, ParseErrorKind::LexError(e))]
        })?;
        Ok(Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
            config,
            next_oneof_id: 0,
            next_message_id: 0,
        })
    }

    // --- cursor primitives -------------------------------------------------

    fn current(&self) -> &Token {
        // The token stream always ends in Eof, so this never runs past the end.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn current_pos(&self) -> SourceLocation {
        self.current().position
    }

    fn bump(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn is_eof(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn is_keyword(&self, k: Keyword) -> bool {
        matches!(self.current_kind(), TokenKind::Keyword(x) if *x == k)
    }

    fn is_symbol(&self, c: char) -> bool {
        matches!(self.current_kind(), TokenKind::Symbol(x) if *x == c)
    }

    fn eat_keyword(&mut self, k: Keyword) -> bool {
        if self.is_keyword(k) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_symbol(&mut self, c: char) -> bool {
        if self.is_symbol(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn record(&mut self, err: ParseError) -> PResult<()> {
        if self.errors.len() >= self.config.max_errors {
            if self.errors.last().map(|e| &e.kind) != Some(&ParseErrorKind::TooManyErrors) {
                self.errors.push(ParseError::without_position(ParseErrorKind::TooManyErrors));
            }
            return Err(Abort);
        }
        self.errors.push(err);
        if self.config.continue_on_error {
            Ok(())
        } else {
            Err(Abort)
        }
    }

    fn error_here(&mut self, kind: ParseErrorKind) -> PResult<()> {
        let pos = self.current_pos();
        self.record(ParseError::at(pos, kind))
    }

    fn expect_symbol(&mut self, c: char) -> PResult<()> {
        if self.eat_symbol(c) {
            Ok(())
        } else if self.is_eof() {
            self.record(ParseError::without_position(ParseErrorKind::UnexpectedEndOfInput {
                expected: format!("'{}'", c),
            }))
        } else {
            let found = self.current_kind().to_string();
            self.error_here(ParseErrorKind::UnexpectedToken {
                found,
                expected: format!("'{}'", c),
            })
        }
    }

    fn expect_keyword(&mut self, k: Keyword) -> PResult<()> {
        if self.eat_keyword(k) {
            Ok(())
        } else if self.is_eof() {
            self.record(ParseError::without_position(ParseErrorKind::UnexpectedEndOfInput {
                expected: format!("'{}'", k.text()),
            }))
        } else {
            let found = self.current_kind().to_string();
            self.error_here(ParseErrorKind::UnexpectedToken {
                found,
                expected: format!("'{}'", k.text()),
            })
        }
    }

    fn expect_identifier(&mut self) -> PResult<(String, SourceLocation)> {
        let pos = self.current_pos();
        if let TokenKind::Identifier(s) = self.current_kind().clone() {
            self.bump();
            Ok((s, pos))
        } else if self.is_eof() {
            self.record(ParseError::without_position(ParseErrorKind::UnexpectedEndOfInput {
                expected: "identifier".to_string(),
            }))?;
            Err(Abort)
        } else {
            let found = self.current_kind().to_string();
            self.error_here(ParseErrorKind::UnexpectedToken {
                found,
                expected: "identifier".to_string(),
            })?;
            Err(Abort)
        }
    }

    fn expect_string_literal(&mut self) -> PResult<(String, SourceLocation)> {
        let pos = self.current_pos();
        if let TokenKind::StringLiteral(s) = self.current_kind().clone() {
            self.bump();
            Ok((s, pos))
        } else {
            let found = self.current_kind().to_string();
            self.error_here(ParseErrorKind::UnexpectedToken {
                found,
                expected: "string literal".to_string(),
            })?;
            Err(Abort)
        }
    }

    /// Parses an integer literal, consuming an optional leading unary `-`.
    fn expect_integer(&mut self) -> PResult<(i64, SourceLocation)> {
        let pos = self.current_pos();
        let negative = self.eat_symbol('-');
        if let TokenKind::IntegerLiteral(n) = *self.current_kind() {
            self.bump();
            Ok((if negative { -n } else { n }, pos))
        } else {
            let found = self.current_kind().to_string();
            self.error_here(ParseErrorKind::UnexpectedToken {
                found,
                expected: "integer literal".to_string(),
            })?;
            Err(Abort)
        }
    }

    /// Advances past tokens until the next top-level sentinel: a
    /// semicolon at nesting depth 0, or a keyword that begins a new
    /// top-level declaration. Used to recover from a structural error so
    /// that multiple independent errors can be reported per file.
    fn synchronize_top_level(&mut self) {
        let mut depth = 0i32;
        loop {
            if self.is_eof() {
                return;
            }
            if depth == 0 {
                if self.is_symbol(';') {
                    self.bump();
                    return;
                }
                if TOP_LEVEL_KEYWORDS.iter().any(|k| self.is_keyword(*k)) {
                    return;
                }
            }
            if self.is_symbol('{') {
                depth += 1;
            } else if self.is_symbol('}') {
                if depth == 0 {
                    self.bump();
                    return;
                }
                depth -= 1;
            }
            self.bump();
        }
    }

    /// Advances past tokens until a semicolon or closing brace at the
    /// current nesting level, for recovery inside a message/enum/service
    /// body without unwinding the whole file.
    fn synchronize_in_block(&mut self) {
        let mut depth = 0i32;
        loop {
            if self.is_eof() {
                return;
            }
            if depth == 0 && self.is_symbol(';') {
                self.bump();
                return;
            }
            if depth == 0 && self.is_symbol('}') {
                return;
            }
            if self.is_symbol('{') {
                depth += 1;
            } else if self.is_symbol('}') {
                depth -= 1;
            }
            self.bump();
        }
    }

    // --- top level -----------------------------------------------------

    pub fn parse_file(mut self) -> Result<FileNode, Vec<ParseError>> {
        log::trace!("parsing file, {} tokens", self.tokens.len());
        let mut syntax = "proto3".to_string();
        let mut package: Option<String> = None;
        let mut imports = Vec::new();
        let mut file_options = Vec::new();
        let mut definitions = Vec::new();
        let mut seen_any_declaration = false;

        if self.is_keyword(Keyword::Syntax) {
            if let Ok(s) = self.parse_syntax_decl() {
                syntax = s;
            } else {
                self.synchronize_top_level();
            }
            seen_any_declaration = true;
        }

        while !self.is_eof() {
            if self.errors.len() >= self.config.max_errors {
                break;
            }
            if self.is_keyword(Keyword::Syntax) {
                let pos = self.current_pos();
                if self
                    .record(ParseError::at(
                        pos,
                        ParseErrorKind::InvalidSyntax("'syntax' must be the first declaration in the file".to_string()),
                    ))
                    .is_err()
                {
                    break;
                }
                self.synchronize_top_level();
                continue;
            } else if self.is_keyword(Keyword::Package) {
                match self.parse_package_decl() {
                    Ok(name) => {
                        if package.is_some() {
                            let pos = self.current_pos();
                            if self
                                .record(ParseError::at(pos, ParseErrorKind::DuplicatePackageName(name)))
                                .is_err()
                            {
                                break;
                            }
                        } else {
                            package = Some(name);
                        }
                    }
                    Err(Abort) => self.synchronize_top_level(),
                }
            } else if self.is_keyword(Keyword::Import) {
                match self.parse_import_decl() {
                    Ok(import) => imports.push(import),
                    Err(Abort) => self.synchronize_top_level(),
                }
            } else if self.is_keyword(Keyword::Option) {
                match self.parse_option_statement() {
                    Ok(opt) => file_options.push(opt),
                    Err(Abort) => self.synchronize_top_level(),
                }
            } else if self.is_keyword(Keyword::Message) {
                match self.parse_message() {
                    Ok(m) => definitions.push(Definition::Message(m)),
                    Err(Abort) => self.synchronize_top_level(),
                }
            } else if self.is_keyword(Keyword::Enum) {
                match self.parse_enum() {
                    Ok(e) => definitions.push(Definition::Enum(e)),
                    Err(Abort) => self.synchronize_top_level(),
                }
            } else if self.is_keyword(Keyword::Service) {
                match self.parse_service() {
                    Ok(s) => definitions.push(Definition::Service(s)),
                    Err(Abort) => self.synchronize_top_level(),
                }
            } else if self.is_keyword(Keyword::Extend) {
                match self.parse_extend(true, None) {
                    Ok(e) => definitions.push(Definition::Extend(e)),
                    Err(Abort) => self.synchronize_top_level(),
                }
            } else {
                let found = self.current_kind().to_string();
                if self
                    .error_here(ParseErrorKind::UnexpectedToken {
                        found,
                        expected: "a top-level declaration".to_string(),
                    })
                    .is_err()
                {
                    break;
                }
                self.synchronize_top_level();
            }
            seen_any_declaration = true;
        }
        let _ = seen_any_declaration;

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        Ok(FileNode {
            syntax,
            package,
            imports,
            options: file_options,
            definitions,
            file_path: None,
        })
    }

    fn parse_syntax_decl(&mut self) -> PResult<String> {
        self.expect_keyword(Keyword::Syntax)?;
        self.expect_symbol('=')?;
        let (value, _) = self.expect_string_literal()?;
        self.expect_symbol(';')?;
        Ok(value)
    }

    fn parse_package_decl(&mut self) -> PResult<String> {
        self.expect_keyword(Keyword::Package)?;
        let name = self.parse_dotted_name()?;
        self.expect_symbol(';')?;
        Ok(name)
    }

    fn parse_dotted_name(&mut self) -> PResult<String> {
        let (mut name, _) = self.expect_identifier()?;
        while self.is_symbol('.') {
            self.bump();
            let (part, _) = self.expect_identifier()?;
            name.push('.');
            name.push_str(&part);
        }
        Ok(name)
    }

    fn parse_import_decl(&mut self) -> PResult<ImportNode> {
        let start = self.current_pos();
        self.expect_keyword(Keyword::Import)?;
        let modifier = if self.eat_keyword(Keyword::Public) {
            ImportModifier::Public
        } else if self.eat_keyword(Keyword::Weak) {
            ImportModifier::Weak
        } else {
            ImportModifier::None
        };
        let (path, _) = self.expect_string_literal()?;
        self.expect_symbol(';')?;
        Ok(ImportNode {
            path,
            modifier,
            loc: start,
        })
    }

    // --- options ---------------------------------------------------------

    fn parse_option_statement(&mut self) -> PResult<OptionNode> {
        let start = self.current_pos();
        self.expect_keyword(Keyword::Option)?;
        let opt = self.parse_option_name_and_value(start)?;
        self.expect_symbol(';')?;
        Ok(opt)
    }

    /// Parses `name = value` (without the leading `option` keyword or
    /// trailing `;`), used both for standalone option statements and for
    /// the bracketed `[...]` option lists on fields/enum values/rpcs.
    fn parse_option_name_and_value(&mut self, start: SourceLocation) -> PResult<OptionNode> {
        let (path_parts, text_name, is_custom) = self.parse_option_name()?;
        self.expect_symbol('=')?;
        let value = self.parse_option_value()?;
        Ok(OptionNode {
            name: text_name,
            path_parts,
            value,
            is_custom,
            loc: start,
        })
    }

    fn parse_option_name(&mut self) -> PResult<(Vec<PathPart>, String, bool)> {
        let mut parts = Vec::new();
        let mut is_custom = false;
        if self.is_symbol('(') {
            is_custom = true;
            self.bump();
            let name = self.parse_dotted_name()?;
            self.expect_symbol(')')?;
            parts.push(PathPart {
                name,
                is_extension: true,
            });
        } else {
            let (name, _) = self.expect_identifier()?;
            parts.push(PathPart {
                name,
                is_extension: false,
            });
        }
        while self.is_symbol('.') {
            self.bump();
            let (name, _) = self.expect_identifier()?;
            parts.push(PathPart {
                name,
                is_extension: false,
            });
        }
        let text_name = parts
            .iter()
            .map(|p| if p.is_extension { format!("({})", p.name) } else { p.name.clone() })
            .collect::<Vec<_>>()
            .join(".");
        Ok((parts, text_name, is_custom))
    }

    fn parse_option_value(&mut self) -> PResult<OptionValue> {
        if self.is_symbol('{') {
            self.parse_option_value_map()
        } else if self.is_symbol('[') {
            self.bump();
            let mut items = Vec::new();
            if !self.is_symbol(']') {
                loop {
                    items.push(self.parse_option_value()?);
                    if self.eat_symbol(',') {
                        continue;
                    }
                    break;
                }
            }
            self.expect_symbol(']')?;
            Ok(OptionValue::Array(items))
        } else {
            match self.current_kind().clone() {
                TokenKind::StringLiteral(s) => {
                    self.bump();
                    Ok(OptionValue::String(s))
                }
                TokenKind::IntegerLiteral(n) => {
                    self.bump();
                    Ok(OptionValue::Number(n as f64))
                }
                TokenKind::FloatLiteral(n) => {
                    self.bump();
                    Ok(OptionValue::Number(n))
                }
                TokenKind::BoolLiteral(b) => {
                    self.bump();
                    Ok(OptionValue::Identifier(b.to_string()))
                }
                TokenKind::Identifier(_) => {
                    let name = self.parse_dotted_name()?;
                    Ok(OptionValue::Identifier(name))
                }
                TokenKind::Symbol('-') => {
                    self.bump();
                    match self.current_kind().clone() {
                        TokenKind::IntegerLiteral(n) => {
                            self.bump();
                            Ok(OptionValue::Number(-(n as f64)))
                        }
                        TokenKind::FloatLiteral(n) => {
                            self.bump();
                            Ok(OptionValue::Number(-n))
                        }
                        _ => {
                            let found = self.current_kind().to_string();
                            self.error_here(ParseErrorKind::UnexpectedToken {
                                found,
                                expected: "number after '-'".to_string(),
                            })?;
                            Err(Abort)
                        }
                    }
                }
                other => {
                    let found = other.to_string();
                    self.error_here(ParseErrorKind::UnexpectedToken {
                        found,
                        expected: "an option value".to_string(),
                    })?;
                    Err(Abort)
                }
            }
        }
    }

    fn parse_option_value_map(&mut self) -> PResult<OptionValue> {
        self.expect_symbol('{')?;
        let mut entries = Vec::new();
        while !self.is_symbol('}') && !self.is_eof() {
            let (key, _) = self.expect_identifier()?;
            if !self.eat_symbol(':') {
                // protobuf text-format allows omitting ':' before a nested message value
            }
            let value = self.parse_option_value()?;
            entries.push((key, value));
            self.eat_symbol(',');
            self.eat_symbol(';');
        }
        self.expect_symbol('}')?;
        Ok(OptionValue::Map(entries))
    }

    fn parse_bracketed_options(&mut self) -> PResult<Vec<OptionNode>> {
        let mut out = Vec::new();
        if self.eat_symbol('[') {
            loop {
                let start = self.current_pos();
                out.push(self.parse_option_name_and_value(start)?);
                if self.eat_symbol(',') {
                    continue;
                }
                break;
            }
            self.expect_symbol(']')?;
        }
        Ok(out)
    }

    // --- type references ---------------------------------------------------

    fn parse_type_ref(&mut self) -> PResult<TypeRef> {
        if self.eat_keyword(Keyword::Map) {
            self.expect_symbol('<')?;
            let key_name_pos = self.current_pos();
            let key_name = self.parse_dotted_name()?;
            let key = match ScalarType::from_name(&key_name) {
                Some(s) => s,
                None => {
                    self.record(ParseError::at(
                        key_name_pos,
                        ParseErrorKind::InvalidMapKeyType(key_name),
                    ))?;
                    ScalarType::String
                }
            };
            self.expect_symbol(',')?;
            let value = self.parse_type_ref()?;
            self.expect_symbol('>')?;
            return Ok(TypeRef::Map(key, Box::new(value)));
        }
        let leading_dot = self.eat_symbol('.');
        let name = self.parse_dotted_name()?;
        if let Some(scalar) = ScalarType::from_name(&name) {
            if !leading_dot {
                return Ok(TypeRef::Scalar(scalar));
            }
        }
        let full = if leading_dot { format!(".{}", name) } else { name };
        Ok(TypeRef::Named(full))
    }

    // --- messages ------------------------------------------------------

    fn next_message_id(&mut self) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        id
    }

    fn next_oneof_id(&mut self) -> OneofId {
        let id = OneofId(self.next_oneof_id);
        self.next_oneof_id += 1;
        id
    }

    fn parse_message(&mut self) -> PResult<MessageNode> {
        let start = self.current_pos();
        let leading_comments = self.current().leading_comments.clone();
        self.expect_keyword(Keyword::Message)?;
        let (name, _name_pos) = self.expect_identifier()?;
        let id = self.next_message_id();
        self.expect_symbol('{')?;
        let body = self.parse_message_body(id)?;
        self.expect_symbol('}')?;
        Ok(MessageNode {
            id,
            name,
            fields: body.fields,
            oneofs: body.oneofs,
            options: body.options,
            reserved: body.reserved,
            messages: body.messages,
            enums: body.enums,
            extends: body.extends,
            loc: start,
            leading_comments,
        })
    }

    fn parse_message_body(&mut self, owner: MessageId) -> PResult<MessageBody> {
        let mut body = MessageBody::default();

        while !self.is_symbol('}') && !self.is_eof() {
            if self.errors.len() >= self.config.max_errors {
                break;
            }
            let outcome: PResult<()> = (|| {
                if self.eat_symbol(';') {
                    // stray semicolon; harmless
                } else if self.is_keyword(Keyword::Option) {
                    let opt = self.parse_option_statement()?;
                    body.options.push(opt);
                } else if self.is_keyword(Keyword::Reserved) {
                    let r = self.parse_reserved()?;
                    body.reserved.push(r);
                } else if self.is_keyword(Keyword::Oneof) {
                    let oneof = self.parse_oneof()?;
                    body.oneofs.push(oneof);
                } else if self.is_keyword(Keyword::Message) {
                    let m = self.parse_message()?;
                    body.messages.push(m);
                } else if self.is_keyword(Keyword::Enum) {
                    let e = self.parse_enum()?;
                    body.enums.push(e);
                } else if self.is_keyword(Keyword::Extend) {
                    let e = self.parse_extend(false, Some(owner))?;
                    body.extends.push(e);
                } else if self.is_keyword(Keyword::Map) {
                    let field = self.parse_map_field()?;
                    body.push_field(field);
                } else if self.is_keyword(Keyword::Required) {
                    self.error_here(ParseErrorKind::RequiredFieldInProto3)?;
                    self.bump();
                    self.synchronize_in_block();
                } else if self.is_keyword(Keyword::Repeated) || self.is_keyword(Keyword::Optional) || looks_like_field_start(self) {
                    let field = self.parse_field()?;
                    body.push_field(field);
                } else {
                    let found = self.current_kind().to_string();
                    self.error_here(ParseErrorKind::UnexpectedToken {
                        found,
                        expected: "a field, nested type, oneof, reserved, or option declaration".to_string(),
                    })?;
                    self.synchronize_in_block();
                }
                Ok(())
            })();
            if outcome.is_err() {
                self.synchronize_in_block();
            }
        }

        body.check_reserved_collisions(self)?;
        Ok(body)
    }

    fn parse_field(&mut self) -> PResult<FieldNode> {
        let start = self.current_pos();
        let leading_comments = self.current().leading_comments.clone();
        let is_repeated = self.eat_keyword(Keyword::Repeated);
        let is_optional = !is_repeated && self.eat_keyword(Keyword::Optional);
        let typ = self.parse_type_ref()?;
        let (name, name_pos) = self.expect_identifier()?;
        if !is_snake_or_ident(&name) {
            self.record(ParseError::at(name_pos, ParseErrorKind::InvalidFieldName(name.clone())))?;
        }
        self.expect_symbol('=')?;
        let (number, number_pos) = self.expect_integer()?;
        self.check_field_number(number, number_pos)?;
        let options = self.parse_bracketed_options()?;
        self.expect_symbol(';')?;
        if typ.is_map() && (is_repeated || is_optional) {
            self.error_here(ParseErrorKind::RepeatedMapField(name.clone()))?;
        }
        Ok(FieldNode {
            name,
            typ,
            number: number as i32,
            is_repeated,
            is_optional,
            oneof_parent: None,
            options,
            json_name: None,
            loc: start,
            leading_comments,
        })
    }

    fn parse_map_field(&mut self) -> PResult<FieldNode> {
        let start = self.current_pos();
        let leading_comments = self.current().leading_comments.clone();
        let typ = self.parse_type_ref()?;
        let (name, _) = self.expect_identifier()?;
        self.expect_symbol('=')?;
        let (number, number_pos) = self.expect_integer()?;
        self.check_field_number(number, number_pos)?;
        let options = self.parse_bracketed_options()?;
        self.expect_symbol(';')?;
        Ok(FieldNode {
            name,
            typ,
            number: number as i32,
            is_repeated: false,
            is_optional: false,
            oneof_parent: None,
            options,
            json_name: None,
            loc: start,
            leading_comments,
        })
    }

    fn check_field_number(&mut self, number: i64, pos: SourceLocation) -> PResult<()> {
        if number <= 0 || number > 536_870_911 {
            self.record(ParseError::at(
                pos,
                ParseErrorKind::FieldNumberOutOfRange(number as i32),
            ))?;
        } else if (19000..=19999).contains(&number) {
            self.record(ParseError::at(pos, ParseErrorKind::ReservedFieldNumber(number as i32)))?;
        }
        Ok(())
    }

    fn parse_oneof(&mut self) -> PResult<OneofNode> {
        let start = self.current_pos();
        let leading_comments = self.current().leading_comments.clone();
        self.expect_keyword(Keyword::Oneof)?;
        let (name, _) = self.expect_identifier()?;
        let id = self.next_oneof_id();
        self.expect_symbol('{')?;
        let mut fields = Vec::new();
        while !self.is_symbol('}') && !self.is_eof() {
            if self.eat_symbol(';') {
                continue;
            }
            if self.is_keyword(Keyword::Map) {
                let map_pos = self.current_pos();
                // consume it anyway so recovery stays local to this field
                let _ = self.parse_map_field();
                self.record(ParseError::at(
                    map_pos,
                    ParseErrorKind::RepeatedMapField(name.clone()),
                ))?;
                continue;
            }
            if self.is_keyword(Keyword::Repeated) {
                let rep_pos = self.current_pos();
                self.bump();
                self.record(ParseError::at(
                    rep_pos,
                    ParseErrorKind::Custom("repeated fields are not allowed inside a oneof".to_string()),
                ))?;
            }
            match self.parse_field() {
                Ok(mut field) => {
                    field.oneof_parent = Some(id);
                    fields.push(field);
                }
                Err(Abort) => self.synchronize_in_block(),
            }
        }
        self.expect_symbol('}')?;
        if fields.is_empty() {
            self.record(ParseError::at(start, ParseErrorKind::EmptyOneof(name.clone())))?;
        }
        Ok(OneofNode {
            id,
            name,
            fields,
            loc: start,
            leading_comments,
        })
    }

    fn parse_reserved(&mut self) -> PResult<ReservedNode> {
        let start = self.current_pos();
        self.expect_keyword(Keyword::Reserved)?;
        let mut ranges = Vec::new();
        let is_names = matches!(self.current_kind(), TokenKind::StringLiteral(_));
        loop {
            if is_names {
                let (name, _) = self.expect_string_literal()?;
                ranges.push(ReservedRange::Name(name));
            } else {
                let (from, from_pos) = self.expect_integer()?;
                if self.eat_keyword(Keyword::To) {
                    let (to, _) = self.expect_integer()?;
                    ranges.push(ReservedRange::Range(from as i32, to as i32));
                } else {
                    let _ = from_pos;
                    ranges.push(ReservedRange::Single(from as i32));
                }
            }
            if self.eat_symbol(',') {
                let now_string = matches!(self.current_kind(), TokenKind::StringLiteral(_));
                if now_string != is_names {
                    self.error_here(ParseErrorKind::MixedReservedKinds)?;
                }
                continue;
            }
            break;
        }
        self.expect_symbol(';')?;
        Ok(ReservedNode { ranges, loc: start })
    }

    // --- enums -----------------------------------------------------------

    fn parse_enum(&mut self) -> PResult<EnumNode> {
        let start = self.current_pos();
        let leading_comments = self.current().leading_comments.clone();
        self.expect_keyword(Keyword::Enum)?;
        let (name, _name_pos) = self.expect_identifier()?;
        self.expect_symbol('{')?;
        let mut values = Vec::new();
        let mut options = Vec::new();
        while !self.is_symbol('}') && !self.is_eof() {
            let outcome: PResult<()> = (|| {
                if self.eat_symbol(';') {
                } else if self.is_keyword(Keyword::Option) {
                    options.push(self.parse_option_statement()?);
                } else if self.is_keyword(Keyword::Reserved) {
                    let _ = self.parse_reserved()?;
                } else {
                    let value_start = self.current_pos();
                    let leading = self.current().leading_comments.clone();
                    let (vname, _vname_pos) = self.expect_identifier()?;
                    self.expect_symbol('=')?;
                    let (number, _) = self.expect_integer()?;
                    let voptions = self.parse_bracketed_options()?;
                    self.expect_symbol(';')?;
                    values.push(EnumValueNode {
                        name: vname,
                        number: number as i32,
                        options: voptions,
                        loc: value_start,
                        leading_comments: leading,
                    });
                }
                Ok(())
            })();
            if outcome.is_err() {
                self.synchronize_in_block();
            }
        }
        self.expect_symbol('}')?;

        // Whether the first value is 0 and whether values alias the same
        // number are semantic rules owned by the enum validation pass, not
        // the parser; `allow_alias` is still captured here since it comes
        // straight off the options the parser already parsed.
        let allow_alias = options
            .iter()
            .find(|o| o.name == "allow_alias")
            .and_then(|o| o.value.as_bool())
            .unwrap_or(false);

        Ok(EnumNode {
            name,
            values,
            options,
            allow_alias,
            loc: start,
            leading_comments,
        })
    }

    // --- services ----------------------------------------------------------

    fn parse_service(&mut self) -> PResult<ServiceNode> {
        let start = self.current_pos();
        let leading_comments = self.current().leading_comments.clone();
        self.expect_keyword(Keyword::Service)?;
        let (name, _name_pos) = self.expect_identifier()?;
        self.expect_symbol('{')?;
        let mut rpcs = Vec::new();
        let mut options = Vec::new();
        while !self.is_symbol('}') && !self.is_eof() {
            let outcome: PResult<()> = (|| {
                if self.eat_symbol(';') {
                } else if self.is_keyword(Keyword::Option) {
                    options.push(self.parse_option_statement()?);
                } else if self.is_keyword(Keyword::Rpc) {
                    rpcs.push(self.parse_rpc()?);
                } else {
                    let found = self.current_kind().to_string();
                    self.error_here(ParseErrorKind::UnexpectedToken {
                        found,
                        expected: "an 'rpc' or 'option' declaration".to_string(),
                    })?;
                }
                Ok(())
            })();
            if outcome.is_err() {
                self.synchronize_in_block();
            }
        }
        self.expect_symbol('}')?;
        Ok(ServiceNode {
            name,
            rpcs,
            options,
            loc: start,
            leading_comments,
        })
    }

    fn parse_rpc(&mut self) -> PResult<RpcNode> {
        let start = self.current_pos();
        let leading_comments = self.current().leading_comments.clone();
        self.expect_keyword(Keyword::Rpc)?;
        let (name, _name_pos) = self.expect_identifier()?;
        self.expect_symbol('(')?;
        let client_streaming = self.eat_keyword(Keyword::Stream);
        let input_type = self.parse_dotted_type_name()?;
        self.expect_symbol(')')?;
        self.expect_keyword(Keyword::Returns)?;
        self.expect_symbol('(')?;
        let server_streaming = self.eat_keyword(Keyword::Stream);
        let output_type = self.parse_dotted_type_name()?;
        self.expect_symbol(')')?;

        let mut options = Vec::new();
        if self.is_symbol('{') {
            self.bump();
            while !self.is_symbol('}') && !self.is_eof() {
                if self.eat_symbol(';') {
                    continue;
                }
                if self.is_keyword(Keyword::Option) {
                    match self.parse_option_statement() {
                        Ok(opt) => options.push(opt),
                        Err(Abort) => self.synchronize_in_block(),
                    }
                } else {
                    let found = self.current_kind().to_string();
                    self.error_here(ParseErrorKind::UnexpectedToken {
                        found,
                        expected: "an 'option' declaration".to_string(),
                    })?;
                    self.synchronize_in_block();
                }
            }
            self.expect_symbol('}')?;
        } else {
            self.expect_symbol(';')?;
        }

        Ok(RpcNode {
            name,
            input_type,
            output_type,
            client_streaming,
            server_streaming,
            options,
            loc: start,
            leading_comments,
        })
    }

    fn parse_dotted_type_name(&mut self) -> PResult<String> {
        let leading_dot = self.eat_symbol('.');
        let name = self.parse_dotted_name()?;
        Ok(if leading_dot { format!(".{}", name) } else { name })
    }

    // --- extend ------------------------------------------------------------

    fn parse_extend(&mut self, is_top_level: bool, parent: Option<MessageId>) -> PResult<ExtendNode> {
        let start = self.current_pos();
        self.expect_keyword(Keyword::Extend)?;
        let type_name = self.parse_dotted_type_name()?;
        self.expect_symbol('{')?;
        let mut fields = Vec::new();
        while !self.is_symbol('}') && !self.is_eof() {
            if self.eat_symbol(';') {
                continue;
            }
            match self.parse_field() {
                Ok(field) => fields.push(field),
                Err(Abort) => self.synchronize_in_block(),
            }
        }
        self.expect_symbol('}')?;
        Ok(ExtendNode {
            type_name,
            fields,
            is_top_level,
            parent,
            loc: start,
        })
    }
}

#[derive(Default)]
struct MessageBody {
    fields: Vec<FieldNode>,
    oneofs: Vec<OneofNode>,
    options: Vec<OptionNode>,
    reserved: Vec<ReservedNode>,
    messages: Vec<MessageNode>,
    enums: Vec<EnumNode>,
    extends: Vec<ExtendNode>,
}

impl MessageBody {
    /// Duplicate field number/name checks run once over the whole body in
    /// `check_reserved_collisions`, after every field and oneof has been
    /// collected; this just appends.
    fn push_field(&mut self, field: FieldNode) {
        self.fields.push(field);
    }

    fn all_fields(&self) -> impl Iterator<Item = &FieldNode> {
        self.fields.iter().chain(self.oneofs.iter().flat_map(|o| o.fields.iter()))
    }

    /// Runs the message-level duplicate/reserved checks once the whole
    /// body (fields, oneofs, reserved statements) has been collected, and
    /// records any violations onto the parser's error list.
    fn check_reserved_collisions(&self, parser: &mut Parser) -> PResult<()> {
        let mut numbers: HashMap<i32, String> = HashMap::new();
        let mut names: HashMap<String, SourceLocation> = HashMap::new();
        for f in self.all_fields() {
            if let Some(prev) = numbers.insert(f.number, f.name.clone()) {
                parser.record(ParseError::at(
                    f.loc,
                    ParseErrorKind::DuplicateMessageFieldNumber(
                        f.number,
                        format!("'{}' conflicts with '{}'", f.name, prev),
                    ),
                ))?;
            }
            if let Some(_prev_loc) = names.insert(f.name.clone(), f.loc) {
                parser.record(ParseError::at(
                    f.loc,
                    ParseErrorKind::DuplicateFieldName(f.name.clone(), "field name already used in this message".to_string()),
                ))?;
            }
        }

        let mut reserved_numbers: Vec<(i32, i32, SourceLocation)> = Vec::new();
        let mut reserved_names: Vec<(String, SourceLocation)> = Vec::new();
        for r in &self.reserved {
            for range in &r.ranges {
                match range {
                    ReservedRange::Single(n) => reserved_numbers.push((*n, *n, r.loc)),
                    ReservedRange::Range(a, b) => reserved_numbers.push((*a, *b, r.loc)),
                    ReservedRange::Name(n) => reserved_names.push((n.clone(), r.loc)),
                }
            }
        }

        for f in self.all_fields() {
            for (lo, hi, rloc) in &reserved_numbers {
                if f.number >= *lo && f.number <= *hi {
                    parser.record(ParseError::at(
                        f.loc,
                        ParseErrorKind::Custom(format!(
                            "field '{}' uses number {} which is reserved at {}",
                            f.name, f.number, rloc
                        )),
                    ))?;
                }
            }
            for (rname, rloc) in &reserved_names {
                if &f.name == rname {
                    parser.record(ParseError::at(
                        f.loc,
                        ParseErrorKind::Custom(format!(
                            "field name '{}' is reserved at {}",
                            f.name, rloc
                        )),
                    ))?;
                }
            }
        }

        let mut nested_names: HashMap<String, SourceLocation> = HashMap::new();
        for m in &self.messages {
            if let Some(_prev) = nested_names.insert(m.name.clone(), m.loc) {
                parser.record(ParseError::at(
                    m.loc,
                    ParseErrorKind::DuplicateElement(m.name.clone()),
                ))?;
            }
        }
        for e in &self.enums {
            if let Some(_prev) = nested_names.insert(e.name.clone(), e.loc) {
                parser.record(ParseError::at(
                    e.loc,
                    ParseErrorKind::DuplicateElement(e.name.clone()),
                ))?;
            }
        }
        Ok(())
    }
}

fn looks_like_field_start(parser: &Parser) -> bool {
    matches!(parser.current_kind(), TokenKind::Identifier(_) | TokenKind::Symbol('.'))
}

fn is_snake_or_ident(s: &str) -> bool {
    is_identifier(s)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> FileNode {
        Parser::new(src).unwrap().parse_file().unwrap_or_else(|e| panic!("{:#?}", e))
    }

    fn parse_err(src: &str) -> Vec<ParseError> {
        Parser::new(src).unwrap().parse_file().unwrap_err()
    }

    #[test]
    fn scenario_a_minimal_valid_file() {
        let file = parse_ok(r#"syntax = "proto3"; message M { string s = 1; }"#);
        assert_eq!(file.syntax, "proto3");
        let m = file.messages().next().unwrap();
        assert_eq!(m.name, "M");
        assert_eq!(m.fields.len(), 1);
        assert_eq!(m.fields[0].name, "s");
        assert_eq!(m.fields[0].number, 1);
        assert_eq!(m.fields[0].typ, TypeRef::Scalar(ScalarType::String));
    }

    #[test]
    fn scenario_b_enum_with_alias() {
        let file = parse_ok("enum E { option allow_alias = true; U = 0; A = 1; B = 1; }");
        let e = file.enums().next().unwrap();
        assert!(e.allow_alias);
        assert_eq!(e.values.len(), 3);
    }

    #[test]
    fn scenario_c_reserved_field_number() {
        let errors = parse_err("message M { string s = 19500; }");
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, ParseErrorKind::ReservedFieldNumber(19500))));
    }

    #[test]
    fn scenario_d_map_inside_oneof_rejected() {
        let errors = parse_err("message M { oneof o { map<string,string> m = 1; } }");
        assert!(errors
            .iter()
            .any(|e| matches!(&e.kind, ParseErrorKind::RepeatedMapField(n) if n == "o")));
    }

    #[test]
    fn scenario_f_streaming_rpc() {
        let file = parse_ok(
            "message Req {} message Resp {} service S { rpc Chat(stream Req) returns (stream Resp); }",
        );
        let s = file.services().next().unwrap();
        let rpc = &s.rpcs[0];
        assert!(rpc.client_streaming && rpc.server_streaming);
    }

    #[test]
    fn scenario_g_duplicate_package() {
        let errors = parse_err("syntax = \"proto3\"; package a; package b;");
        assert!(errors
            .iter()
            .any(|e| matches!(&e.kind, ParseErrorKind::DuplicatePackageName(n) if n == "b")));
    }

    #[test]
    fn default_syntax_is_proto3() {
        let file = parse_ok("message M {}");
        assert_eq!(file.syntax, "proto3");
    }

    #[test]
    fn required_is_rejected_in_proto3() {
        let errors = parse_err("message M { required string s = 1; }");
        assert!(errors.iter().any(|e| matches!(e.kind, ParseErrorKind::RequiredFieldInProto3)));
    }

    #[test]
    fn duplicate_field_number_is_caught_at_parse_time() {
        let errors = parse_err("message M { string a = 1; string b = 1; }");
        assert!(errors
            .iter()
            .any(|e| matches!(e.kind, ParseErrorKind::DuplicateMessageFieldNumber(1, _))));
    }

    #[test]
    fn reserved_mixed_kinds_is_an_error() {
        let errors = parse_err(r#"message M { reserved 1, "foo"; }"#);
        assert!(errors.iter().any(|e| matches!(e.kind, ParseErrorKind::MixedReservedKinds)));
    }

    #[test]
    fn synchronization_reports_more_than_one_error() {
        let errors = parse_err("message M { @ string a = 1; @ string b = 2; }");
        assert!(errors.len() >= 2);
    }

    #[test]
    fn error_budget_is_respected() {
        let mut src = String::from("message M {");
        for _ in 0..200 {
            src.push_str(" @");
        }
        src.push_str(" }");
        let config = ParserConfig {
            max_errors: 5,
            continue_on_error: true,
        };
        let errors = Parser::with_config(&src, config).unwrap().parse_file().unwrap_err();
        assert!(errors.len() <= 6);
    }

    #[test]
    fn absolute_and_relative_type_names_are_preserved_verbatim() {
        let file = parse_ok("message M { .pkg.Foo f = 1; pkg.Bar b = 2; }");
        let m = file.messages().next().unwrap();
        assert_eq!(m.fields[0].typ, TypeRef::Named(".pkg.Foo".to_string()));
        assert_eq!(m.fields[1].typ, TypeRef::Named("pkg.Bar".to_string()));
    }

    #[test]
    fn map_field_parses_key_and_value() {
        let file = parse_ok("message M { map<string, int32> counts = 1; }");
        let m = file.messages().next().unwrap();
        assert_eq!(
            m.fields[0].typ,
            TypeRef::Map(ScalarType::String, Box::new(TypeRef::Scalar(ScalarType::Int32)))
        );
    }

    #[test]
    fn custom_option_path_is_recorded() {
        let file = parse_ok(r#"option (my.custom).field = "x";"#);
        assert!(file.options[0].is_custom);
        assert_eq!(file.options[0].name, "(my.custom).field");
    }
}
