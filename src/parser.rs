//! # Parser Module
//!
//! Recursive descent parser. Consumes a flat token stream from the lexer
//! and produces the [`Program`] tree the analyzer annotates.
//!
//! ```text
//! program    := stmt+ EOF
//! stmt       := block | var_stmt | expr_stmt
//! block      := '{' stmt* '}'
//! var_stmt   := 'var' IDENT ('=' expr)? ';'
//! expr_stmt  := expr ';'
//! expr       := primary (('+' | '-') primary)*
//! primary    := INT | IDENT
//! ```

use std::rc::Rc;

use crate::ast::*;
use crate::error::{Error, Pos, QuillResult, Span};
use crate::token::{Token, TokenKind};

/// Deepest block nesting accepted. The analyzer and compiler recurse once
/// per level, so this also bounds their stack use.
pub const MAX_BLOCK_DEPTH: usize = 256;

// -----------------------------------------------------------------------------
// PARSER STATE
// -----------------------------------------------------------------------------

/// Turns tokens into an abstract syntax tree.
pub struct Parser {
    /// Token stream produced by the lexer; always ends with `Eof`.
    tokens: Vec<Token>,
    /// Current position in the token stream.
    current: usize,
    /// Blocks currently open.
    depth: usize,
    source: Rc<SourceFile>,
}

impl Parser {
    /// Creates a new parser for the given token stream.
    pub fn new(mut tokens: Vec<Token>, source: Rc<SourceFile>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let end = tokens.last().map_or(Pos::START, |t| t.span.end);
            tokens.push(Token::new(TokenKind::Eof, Span::new(end, end)));
        }
        Self {
            tokens,
            current: 0,
            depth: 0,
            source,
        }
    }

    /// Parses the entire token stream into a program.
    ///
    /// # Errors
    /// Returns a parser error on any syntax error, and for a program with
    /// no statements at all.
    pub fn parse(&mut self) -> QuillResult<Program> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.statement()?);
        }

        let (first, last) = match (stmts.first(), stmts.last()) {
            (Some(first), Some(last)) => (first.span, last.span),
            _ => return Err(Error::parser("empty program", self.peek().span)),
        };

        log::debug!("parsed {} top-level statements", stmts.len());
        Ok(Program {
            stmts,
            span: first.to(last),
            source: Rc::clone(&self.source),
            info: Annotation::default(),
        })
    }

    // -------------------------------------------------------------------------
    // STATEMENT PARSING
    // -------------------------------------------------------------------------

    fn statement(&mut self) -> QuillResult<Stmt> {
        match self.peek_kind() {
            TokenKind::LBrace => self.block_statement(),
            TokenKind::Var => self.var_statement(),
            _ => self.expression_statement(),
        }
    }

    /// Parses `{ statements... }`
    fn block_statement(&mut self) -> QuillResult<Stmt> {
        let open = self.advance().span; // consume '{'
        if self.depth >= MAX_BLOCK_DEPTH {
            return Err(Error::parser("blocks nested too deeply", open));
        }

        self.depth += 1;
        let mut stmts = Vec::new();
        while !self.check_kind(&TokenKind::RBrace) {
            if self.is_at_end() {
                return Err(Error::parser(
                    "expected '}' but reached end of file",
                    self.peek().span,
                ));
            }
            stmts.push(self.statement()?);
        }
        self.depth -= 1;

        let close = self.advance().span; // consume '}'
        Ok(Stmt::new(StmtKind::Block(stmts), open.to(close)))
    }

    /// Parses `var name = expr;` or `var name;`
    fn var_statement(&mut self) -> QuillResult<Stmt> {
        let keyword = self.advance(); // consume 'var'
        let name = self.expect_ident("expected identifier after 'var'")?;

        let initializer = if self.match_kind(&TokenKind::Eq) {
            Some(self.expression()?)
        } else {
            None
        };

        let semicolon = self.expect_kind(&TokenKind::Semicolon, "expected ';' after var statement")?;
        let span = keyword.span.to(semicolon.span);
        Ok(Stmt::new(
            StmtKind::Var {
                keyword,
                name,
                initializer,
            },
            span,
        ))
    }

    /// Parses an expression statement: `expr;`
    fn expression_statement(&mut self) -> QuillResult<Stmt> {
        let expr = self.expression()?;
        if !self.check_kind(&TokenKind::Semicolon) {
            return Err(Error::parser("expected ';' after expression", expr.span));
        }
        let semicolon = self.advance();
        let span = expr.span.to(semicolon.span);
        Ok(Stmt::new(StmtKind::Expr(expr), span))
    }

    // -------------------------------------------------------------------------
    // EXPRESSION PARSING
    // -------------------------------------------------------------------------

    /// Parses a left-associative chain of `+` and `-`.
    fn expression(&mut self) -> QuillResult<Expr> {
        let mut left = self.primary()?;

        while matches!(self.peek_kind(), TokenKind::Plus | TokenKind::Minus) {
            let op = self.advance();
            let right = self.primary()?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    fn primary(&mut self) -> QuillResult<Expr> {
        match self.peek_kind() {
            TokenKind::Int(_) => {
                let t = self.advance();
                let span = t.span;
                Ok(Expr::new(ExprKind::Literal(t), span))
            }
            TokenKind::Ident(_) => {
                let t = self.advance();
                let span = t.span;
                Ok(Expr::new(ExprKind::Ident(t), span))
            }
            _ => Err(Error::parser("expected expression", self.peek().span)),
        }
    }

    // -------------------------------------------------------------------------
    // TOKEN HELPERS
    // -------------------------------------------------------------------------

    /// Returns a reference to the current token without consuming it.
    #[inline]
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Returns the kind of the current token.
    #[inline]
    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.current].kind
    }

    /// Consumes and returns the current token.
    #[inline]
    fn advance(&mut self) -> Token {
        let token = self.tokens[self.current].clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    /// Returns `true` if the current token is `Eof`.
    #[inline]
    fn is_at_end(&self) -> bool {
        matches!(self.tokens[self.current].kind, TokenKind::Eof)
    }

    /// Returns `true` if the current token matches the given kind.
    fn check_kind(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    /// Consumes the current token if it matches `kind`, returning `true`.
    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check_kind(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects the current token to match `kind`, returning an error otherwise.
    fn expect_kind(&mut self, kind: &TokenKind, msg: &str) -> QuillResult<Token> {
        if self.check_kind(kind) {
            Ok(self.advance())
        } else {
            Err(Error::parser(msg, self.peek().span))
        }
    }

    /// Expects an identifier token and returns it.
    fn expect_ident(&mut self, msg: &str) -> QuillResult<Token> {
        if let TokenKind::Ident(_) = self.peek_kind() {
            Ok(self.advance())
        } else {
            Err(Error::parser(msg, self.peek().span))
        }
    }
}
