//! # Error Module
//!
//! Unified error types for all stages of the Quill pipeline. Every error
//! carries a source span (when one exists) so the driver can render a
//! diagnostic pinpointing the offending text.

use std::fmt;

// -----------------------------------------------------------------------------
// POS & SPAN: Source Location
// -----------------------------------------------------------------------------

/// A single position in a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    /// 0-based byte index into the source text.
    pub index: usize,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub col: u32,
}

impl Pos {
    /// The first position of every source buffer.
    pub const START: Pos = Pos {
        index: 0,
        line: 1,
        col: 1,
    };

    #[inline]
    pub fn new(index: usize, line: u32, col: u32) -> Self {
        Self { index, line, col }
    }
}

/// A half-open `[start, end)` region of a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    /// Creates a new span between two positions.
    #[inline]
    pub fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    /// Joins `self` with `other`, producing a span that covers both.
    #[inline]
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }

    /// Returns the text covered by this span, or `""` if the span does not
    /// lie within `text`.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start.index..self.end.index).unwrap_or("")
    }
}

// -----------------------------------------------------------------------------
// ERROR KIND: Failure Classification
// -----------------------------------------------------------------------------

/// Classifies what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error during lexical analysis (tokenization).
    Lexer,
    /// Error during parsing (syntax analysis).
    Parser,
    /// An identifier was declared twice in the same name scope.
    DuplicateDeclaration,
    /// An identifier was not found in any enclosing name scope.
    UnresolvedName,
    /// An operand finished analysis without a resolved type.
    MissingType,
    /// A tree walk met a node it has no rule for.
    UnexpectedNodeKind,
    /// A literal node holds a token that is not a literal.
    UnknownLiteralKind,
    /// Error during IR execution.
    Runtime,
}

/// Broad grouping of error kinds, used to pick the diagnostic heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Syntax,
    Semantic,
    /// A contract violation inside the compiler itself, not a user error.
    Internal,
    Runtime,
}

impl ErrorKind {
    pub fn category(self) -> Category {
        match self {
            ErrorKind::Lexer | ErrorKind::Parser => Category::Syntax,
            ErrorKind::DuplicateDeclaration | ErrorKind::UnresolvedName => Category::Semantic,
            ErrorKind::MissingType
            | ErrorKind::UnexpectedNodeKind
            | ErrorKind::UnknownLiteralKind => Category::Internal,
            ErrorKind::Runtime => Category::Runtime,
        }
    }

    /// Returns `true` for errors that indicate a compiler bug.
    #[inline]
    pub fn is_internal(self) -> bool {
        self.category() == Category::Internal
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Lexer => write!(f, "LexerError"),
            ErrorKind::Parser => write!(f, "ParseError"),
            ErrorKind::DuplicateDeclaration => write!(f, "DuplicateDeclaration"),
            ErrorKind::UnresolvedName => write!(f, "UnresolvedName"),
            ErrorKind::MissingType => write!(f, "MissingType"),
            ErrorKind::UnexpectedNodeKind => write!(f, "UnexpectedNodeKind"),
            ErrorKind::UnknownLiteralKind => write!(f, "UnknownLiteralKind"),
            ErrorKind::Runtime => write!(f, "RuntimeError"),
        }
    }
}

// -----------------------------------------------------------------------------
// ERROR: Unified Error Type
// -----------------------------------------------------------------------------

/// The unified error type for the entire pipeline.
///
/// Every error carries a classification (`kind`), a human-readable
/// `message`, and an optional `span` pointing to the source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Source location where the error occurred, if available.
    pub span: Option<Span>,
}

impl Error {
    /// Creates a new error with a source location.
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span: Some(span),
        }
    }

    #[inline]
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Lexer, message, span)
    }

    #[inline]
    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Parser, message, span)
    }

    /// Creates a runtime error, attaching `span` when the failing
    /// instruction has one.
    #[inline]
    pub fn runtime(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind: ErrorKind::Runtime,
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(
                f,
                "{} [line {}:{}]: {}",
                self.kind, span.start.line, span.start.col, self.message
            ),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for Error {}

/// Convenience type alias for Results throughout the crate.
pub type QuillResult<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------
// DIAGNOSTIC RENDERING
// -----------------------------------------------------------------------------

/// Columns a tab expands to when echoing source lines.
const TAB_WIDTH: usize = 8;

/// Renders `err` as a multi-line diagnostic against `source`.
///
/// ```text
/// main.ql:1:16: DuplicateDeclaration: variable already declared in this scope
///         |                       v
/// 1       >        var x = 1; var x = 2;
///         |
/// ```
///
/// The marker row flags the columns of the first spanned line that fall
/// inside the span; every line the span touches is echoed below it.
pub fn format_error(err: &Error, source: &str, path: &str) -> String {
    let heading = match err.kind.category() {
        Category::Internal => format!("internal error ({})", err.kind),
        _ => err.kind.to_string(),
    };

    let span = match err.span {
        Some(span) => span,
        None => return format!("{}: {}: {}", path, heading, err.message),
    };

    let bytes = source.as_bytes();
    let mut out = format!(
        "{}:{}:{}: {}: {}\n",
        path, span.start.line, span.start.col, heading, err.message
    );

    let start = span.start.index.min(bytes.len());
    let line_start = bytes[..start]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |nl| nl + 1);

    out.push_str(&format!("{:<8}|{:8}", "", ""));
    let mut i = line_start;
    while i < bytes.len() && bytes[i] != b'\n' {
        let sign = if span.start.index <= i && i < span.end.index {
            'v'
        } else {
            ' '
        };
        let width = if bytes[i] == b'\t' { TAB_WIDTH } else { 1 };
        for _ in 0..width {
            out.push(sign);
        }
        i += 1;
    }
    out.push('\n');

    let mut index = line_start;
    for line in span.start.line..=span.end.line.max(span.start.line) {
        out.push_str(&format!("{:<8}>{:8}", line, ""));
        let end = memchr::memchr(b'\n', &bytes[index..]).map_or(bytes.len(), |o| index + o);
        for ch in source[index..end].chars() {
            if ch == '\t' {
                out.push_str(&" ".repeat(TAB_WIDTH));
            } else {
                out.push(ch);
            }
        }
        out.push('\n');
        index = (end + 1).min(bytes.len());
        if end == bytes.len() {
            break;
        }
    }
    out.push_str(&format!("{:<8}|", ""));
    out
}
