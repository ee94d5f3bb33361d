use std::fmt::Write;
use std::rc::Rc;

use crate::error::Span;
use crate::scope::ScopeId;
use crate::token::Token;
use crate::types::Type;

/// A source buffer and the path it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            path: path.into(),
            text: text.into(),
        })
    }
}

/// Facts the analyzer stamps onto a node. Everything is `None` until the
/// node has been analyzed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub ty: Option<Type>,
    pub memory_scope: Option<ScopeId>,
    pub name_scope: Option<ScopeId>,
    /// Byte offset of the node's storage slot in the global memory scope.
    /// Set for literals, identifiers and var statements.
    pub offset: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
    pub span: Span,
    pub source: Rc<SourceFile>,
    pub info: Annotation,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub info: Annotation,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Block(Vec<Stmt>),
    Var {
        keyword: Token,
        name: Token,
        initializer: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub info: Annotation,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Token),
    Ident(Token),
    Binary {
        left: Box<Expr>,
        op: Token,
        right: Box<Expr>,
    },
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self {
            kind,
            span,
            info: Annotation::default(),
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            info: Annotation::default(),
        }
    }
}

// -----------------------------------------------------------------------------
// TREE PRINTER
// -----------------------------------------------------------------------------

/// Renders the tree with one node per line:
///
/// ```text
/// +-- PROGRAM
///     +-- VAR_STMT(IDENTIFIER | x)
///         +-- LITERAL(INT_LITERAL | 1)
/// ```
pub fn print_tree(program: &Program) -> String {
    let mut out = String::from("+-- PROGRAM\n");
    let mut guides = Vec::new();
    print_stmts(&mut out, &program.stmts, &mut guides);
    out
}

fn print_stmts(out: &mut String, stmts: &[Stmt], guides: &mut Vec<bool>) {
    for (i, stmt) in stmts.iter().enumerate() {
        guides.push(i + 1 < stmts.len());
        print_stmt(out, stmt, guides);
        guides.pop();
    }
}

fn print_stmt(out: &mut String, stmt: &Stmt, guides: &mut Vec<bool>) {
    indent(out, guides);
    match &stmt.kind {
        StmtKind::Expr(expr) => {
            out.push_str("+-- EXPR_STMT\n");
            guides.push(false);
            print_expr(out, expr, guides);
            guides.pop();
        }
        StmtKind::Block(stmts) => {
            out.push_str("+-- BLOCK_STMT\n");
            print_stmts(out, stmts, guides);
        }
        StmtKind::Var {
            name, initializer, ..
        } => {
            let _ = writeln!(out, "+-- VAR_STMT({})", name);
            if let Some(init) = initializer {
                guides.push(false);
                print_expr(out, init, guides);
                guides.pop();
            }
        }
    }
}

fn print_expr(out: &mut String, expr: &Expr, guides: &mut Vec<bool>) {
    indent(out, guides);
    match &expr.kind {
        ExprKind::Literal(token) => {
            let _ = writeln!(out, "+-- LITERAL({})", token);
        }
        ExprKind::Ident(token) => {
            let _ = writeln!(out, "+-- IDENTIFIER({})", token);
        }
        ExprKind::Binary { left, op, right } => {
            let _ = writeln!(out, "+-- BINARY({})", op);
            guides.push(true);
            print_expr(out, left, guides);
            guides.pop();
            guides.push(false);
            print_expr(out, right, guides);
            guides.pop();
        }
    }
}

/// The last guide belongs to the node being printed; only its ancestors
/// draw a rail.
fn indent(out: &mut String, guides: &[bool]) {
    if guides.is_empty() {
        return;
    }
    out.push_str("    ");
    for &rail in &guides[..guides.len() - 1] {
        out.push_str(if rail { "|   " } else { "    " });
    }
}
