//! Deterministic character-stream to token-stream conversion.
//!
//! The lexer has no knowledge of proto3 grammar beyond the closed set of
//! keywords in [`Keyword`]; everything else is produced as an identifier,
//! literal or symbol and it is the parser's job to make sense of it.

use std::char;
use std::fmt;

use crate::span::SourceLocation;

/// The closed set of reserved words recognised by the lexer.
///
/// An identifier matching one of these spellings is always emitted as
/// `TokenKind::Keyword`, never as `TokenKind::Identifier`; the parser
/// decides whether a given keyword is legal in the position it appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Syntax,
    Package,
    Import,
    Option,
    Message,
    Enum,
    Service,
    Rpc,
    Returns,
    Stream,
    Repeated,
    Optional,
    Required,
    Oneof,
    Map,
    Reserved,
    Extensions,
    Extend,
    Public,
    Weak,
    To,
}

impl Keyword {
    fn from_ident(s: &str) -> Option<Keyword> {
        Some(match s {
            "syntax" => Keyword::Syntax,
            "package" => Keyword::Package,
            "import" => Keyword::Import,
            "option" => Keyword::Option,
            "message" => Keyword::Message,
            "enum" => Keyword::Enum,
            "service" => Keyword::Service,
            "rpc" => Keyword::Rpc,
            "returns" => Keyword::Returns,
            "stream" => Keyword::Stream,
            "repeated" => Keyword::Repeated,
            "optional" => Keyword::Optional,
            "required" => Keyword::Required,
            "oneof" => Keyword::Oneof,
            "map" => Keyword::Map,
            "reserved" => Keyword::Reserved,
            "extensions" => Keyword::Extensions,
            "extend" => Keyword::Extend,
            "public" => Keyword::Public,
            "weak" => Keyword::Weak,
            "to" => Keyword::To,
            _ => return None,
        })
    }

    pub fn text(self) -> &'static str {
        match self {
            Keyword::Syntax => "syntax",
            Keyword::Package => "package",
            Keyword::Import => "import",
            Keyword::Option => "option",
            Keyword::Message => "message",
            Keyword::Enum => "enum",
            Keyword::Service => "service",
            Keyword::Rpc => "rpc",
            Keyword::Returns => "returns",
            Keyword::Stream => "stream",
            Keyword::Repeated => "repeated",
            Keyword::Optional => "optional",
            Keyword::Required => "required",
            Keyword::Oneof => "oneof",
            Keyword::Map => "map",
            Keyword::Reserved => "reserved",
            Keyword::Extensions => "extensions",
            Keyword::Extend => "extend",
            Keyword::Public => "public",
            Keyword::Weak => "weak",
            Keyword::To => "to",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// A single lexical token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier(String),
    StringLiteral(String),
    IntegerLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    Symbol(char),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(k) => write!(f, "'{}'", k.text()),
            TokenKind::Identifier(s) => write!(f, "identifier '{}'", s),
            TokenKind::StringLiteral(s) => write!(f, "string \"{}\"", s),
            TokenKind::IntegerLiteral(n) => write!(f, "integer '{}'", n),
            TokenKind::FloatLiteral(n) => write!(f, "float '{}'", n),
            TokenKind::BoolLiteral(b) => write!(f, "bool '{}'", b),
            TokenKind::Symbol(c) => write!(f, "'{}'", c),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token plus the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: SourceLocation,
    /// Comment lines immediately preceding this token, in source order,
    /// with comment markers stripped. Populated for doc-comment capture;
    /// empty for tokens with no leading comment.
    pub leading_comments: Vec<String>,
}

/// A lexical error: an unexpected character, unterminated string, or
/// malformed numeric literal. The lexer halts token production on the
/// first such error; there is no lexical-level recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub position: SourceLocation,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.position)
    }
}

impl std::error::Error for LexError {}

const SYMBOLS: &[char] = &['=', ';', ',', '.', '{', '}', '[', ']', '(', ')', '<', '>', '+', '-', '/'];

/// Converts a UTF-8 source string into a finite token stream terminated
/// by an explicit `Eof` token.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    pending_comments: Vec<String>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            source,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            pending_comments: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Skips whitespace and comments, buffering line-comments as leading
    /// comments for the next produced token.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    let start = self.pos;
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    let text: String = self.chars[start + 2..self.pos].iter().collect();
                    self.pending_comments.push(text.trim().to_string());
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start_loc = self.loc();
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.peek() {
                        if c == '*' && self.peek_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            closed = true;
                            break;
                        }
                        self.advance();
                    }
                    if !closed {
                        return Err(LexError {
                            message: "unterminated block comment".to_string(),
                            position: start_loc,
                        });
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Some(k) = Keyword::from_ident(&text) {
            TokenKind::Keyword(k)
        } else if text == "true" {
            TokenKind::BoolLiteral(true)
        } else if text == "false" {
            TokenKind::BoolLiteral(false)
        } else {
            TokenKind::Identifier(text)
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let start_loc = self.loc();
        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.pos == digits_start {
                return Err(LexError {
                    message: "invalid hexadecimal literal".to_string(),
                    position: start_loc,
                });
            }
            let digits: String = self.chars[digits_start..self.pos].iter().collect();
            return i64::from_str_radix(&digits, 16)
                .map(TokenKind::IntegerLiteral)
                .map_err(|_| LexError {
                    message: "hexadecimal literal out of range".to_string(),
                    position: start_loc,
                });
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            let save_line = self.line;
            let save_col = self.column;
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            if self.peek().map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        self.advance();
                    } else {
                        break;
                    }
                }
            } else {
                self.pos = save;
                self.line = save_line;
                self.column = save_col;
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::FloatLiteral)
                .map_err(|_| LexError {
                    message: format!("invalid float literal '{}'", text),
                    position: start_loc,
                })
        } else if text.starts_with('0') && text.len() > 1 {
            i64::from_str_radix(&text, 8)
                .map(TokenKind::IntegerLiteral)
                .map_err(|_| LexError {
                    message: format!("invalid octal literal '{}'", text),
                    position: start_loc,
                })
        } else {
            text.parse::<i64>()
                .map(TokenKind::IntegerLiteral)
                .map_err(|_| LexError {
                    message: format!("invalid integer literal '{}'", text),
                    position: start_loc,
                })
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, LexError> {
        let start_loc = self.loc();
        let quote = self.advance().unwrap();
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        message: "unterminated string literal".to_string(),
                        position: start_loc,
                    })
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\n') => {
                    return Err(LexError {
                        message: "unterminated string literal".to_string(),
                        position: start_loc,
                    })
                }
                Some('\\') => {
                    let esc_loc = self.loc();
                    self.advance();
                    match self.peek() {
                        Some('n') => {
                            out.push('\n');
                            self.advance();
                        }
                        Some('t') => {
                            out.push('\t');
                            self.advance();
                        }
                        Some('r') => {
                            out.push('\r');
                            self.advance();
                        }
                        Some('\\') => {
                            out.push('\\');
                            self.advance();
                        }
                        Some('\'') => {
                            out.push('\'');
                            self.advance();
                        }
                        Some('"') => {
                            out.push('"');
                            self.advance();
                        }
                        Some('0') => {
                            out.push('\0');
                            self.advance();
                        }
                        Some('x') => {
                            self.advance();
                            let digits_start = self.pos;
                            for _ in 0..2 {
                                if self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
                                    self.advance();
                                }
                            }
                            let digits: String = self.chars[digits_start..self.pos].iter().collect();
                            let code = u32::from_str_radix(&digits, 16).map_err(|_| LexError {
                                message: "invalid hex escape".to_string(),
                                position: esc_loc,
                            })?;
                            out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        }
                        Some(other) => {
                            return Err(LexError {
                                message: format!("invalid escape sequence '\\{}'", other),
                                position: esc_loc,
                            })
                        }
                        None => {
                            return Err(LexError {
                                message: "unterminated string literal".to_string(),
                                position: start_loc,
                            })
                        }
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::StringLiteral(out))
    }

    /// Produces the next token, or an `Eof` token once the input is
    /// exhausted. Returns `Err` and stops producing further tokens on a
    /// lexical error.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_trivia()?;
        let leading_comments = std::mem::take(&mut self.pending_comments);
        let position = self.loc();

        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.lex_identifier_or_keyword(),
            Some(c) if c.is_ascii_digit() => self.lex_number()?,
            Some('"') | Some('\'') => self.lex_string()?,
            Some(c) if SYMBOLS.contains(&c) => {
                self.advance();
                TokenKind::Symbol(c)
            }
            Some(c) if !c.is_ascii() => {
                return Err(LexError {
                    message: format!("non-ASCII character '{}' is not permitted here", c),
                    position,
                })
            }
            Some(c) => {
                return Err(LexError {
                    message: format!("unexpected character '{}'", c),
                    position,
                })
            }
        };

        Ok(Token {
            kind,
            position,
            leading_comments,
        })
    }

    /// Lexes the entire source into a token vector terminated by `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            out.push(token);
            if is_eof {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_minimal_file() {
        let kinds = kinds(r#"syntax = "proto3";"#);
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Syntax),
                TokenKind::Symbol('='),
                TokenKind::StringLiteral("proto3".to_string()),
                TokenKind::Symbol(';'),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_identifiers_not_matching_keywords() {
        let kinds = kinds("message_field returns_value");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("message_field".to_string()),
                TokenKind::Identifier("returns_value".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_hex_and_octal_integers() {
        assert_eq!(kinds("0x1F")[0], TokenKind::IntegerLiteral(31));
        assert_eq!(kinds("017")[0], TokenKind::IntegerLiteral(15));
        assert_eq!(kinds("0")[0], TokenKind::IntegerLiteral(0));
    }

    #[test]
    fn lexes_float_literals() {
        assert_eq!(kinds("3.14")[0], TokenKind::FloatLiteral(3.14));
        assert_eq!(kinds("1e10")[0], TokenKind::FloatLiteral(1e10));
    }

    #[test]
    fn skips_line_and_block_comments() {
        let kinds = kinds("// a comment\nmessage /* inline */ Foo");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Message),
                TokenKind::Identifier("Foo".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn captures_leading_comment_as_doc_comment() {
        let tokens = Lexer::new("// doc comment\nmessage Foo {}").tokenize().unwrap();
        assert_eq!(tokens[0].leading_comments, vec!["doc comment".to_string()]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = Lexer::new("\"unterminated").tokenize().unwrap_err();
        assert_eq!(err.position, SourceLocation::new(1, 1));
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let err = Lexer::new("message Foo { @ }").tokenize().unwrap_err();
        assert_eq!(err.position, SourceLocation::new(1, 15));
    }

    #[test]
    fn decodes_escape_sequences() {
        let kinds = kinds(r#""a\nb\t\"c""#);
        assert_eq!(kinds[0], TokenKind::StringLiteral("a\nb\t\"c".to_string()));
    }

    #[test]
    fn positions_are_one_based_and_track_newlines() {
        let tokens = Lexer::new("message\n  Foo {}").tokenize().unwrap();
        assert_eq!(tokens[1].position, SourceLocation::new(2, 3));
    }
}
