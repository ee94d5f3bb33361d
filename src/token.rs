//! # Token Module
//!
//! Defines all token types for the Quill language. Tokens are produced by
//! the lexer and consumed by the parser. Each token carries a [`Span`] for
//! source location tracking; literal and identifier tokens also carry their
//! exact lexical text, which the analyzer compares for name equality and
//! literal pooling.

use std::fmt;

use crate::error::Span;

// -----------------------------------------------------------------------------
// TOKEN KIND: All Lexical Categories
// -----------------------------------------------------------------------------

/// Represents every possible token type in the Quill language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // -- Literals --
    /// Decimal integer literal, kept as written (`"007"` stays `"007"`).
    Int(String),

    // -- Identifiers & Keywords --
    /// User-defined identifier.
    Ident(String),
    /// `var`
    Var,

    // -- Operators --
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `=`
    Eq,

    // -- Delimiters --
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `;`
    Semicolon,

    // -- Special --
    /// End of file marker.
    Eof,
}

impl TokenKind {
    /// Short category name, used by the token dump.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Int(_) => "INT_LITERAL",
            TokenKind::Ident(_) => "IDENTIFIER",
            TokenKind::Var => "VAR_KEYWORD",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Eq => "EQUAL",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Eof => "EOF",
        }
    }
}

// -----------------------------------------------------------------------------
// TOKEN: Token with Source Location
// -----------------------------------------------------------------------------

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The classification and payload of this token.
    pub kind: TokenKind,
    /// Source location of this token.
    pub span: Span,
}

impl Token {
    /// Creates a new token with the given kind and span.
    #[inline]
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The exact source text of this token.
    pub fn lexeme(&self) -> &str {
        match &self.kind {
            TokenKind::Int(text) | TokenKind::Ident(text) => text,
            TokenKind::Var => "var",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Eq => "=",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Semicolon => ";",
            TokenKind::Eof => "",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.kind.name(), self.lexeme())
    }
}

// -----------------------------------------------------------------------------
// KEYWORD LOOKUP
// -----------------------------------------------------------------------------

/// Resolves an identifier string to its keyword token kind, if it matches
/// a reserved keyword. Returns `None` for non-keyword identifiers.
#[inline]
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    match ident {
        "var" => Some(TokenKind::Var),
        _ => None,
    }
}
