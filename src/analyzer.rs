//! # Analyzer Module
//!
//! Single top-down walk over the parsed [`Program`] that resolves types,
//! lays out storage and binds names. Every visited node is stamped with the
//! memory scope and name scope active at that point; literals, identifiers
//! and var statements also get the byte offset of their storage slot, which
//! the compiler reads back when lowering.
//!
//! The first semantic error stops the walk and is returned to the caller.

use crate::ast::*;
use crate::error::{Error, ErrorKind, QuillResult};
use crate::scope::{ScopeId, ScopeKind, ScopeTable};
use crate::token::{Token, TokenKind};
use crate::types::Type;

/// Side output of analysis: the scope arena plus the two root scopes.
#[derive(Debug)]
pub struct Analysis {
    pub table: ScopeTable,
    /// The single global memory scope.
    pub memory_scope: ScopeId,
    /// Name scope of the top-level statements.
    pub name_scope: ScopeId,
}

/// Analyzes `program` in place.
///
/// # Errors
/// `DuplicateDeclaration` and `UnresolvedName` for user mistakes; the
/// internal kinds (`MissingType`, `UnknownLiteralKind`) for malformed
/// trees.
pub fn analyze(program: &mut Program) -> QuillResult<Analysis> {
    let mut table = ScopeTable::new();
    let memory_scope = table.create_scope(ScopeKind::Memory, None);
    let name_scope = table.create_scope(ScopeKind::Name, Some(memory_scope));

    let mut analyzer = Analyzer {
        table,
        global: memory_scope,
    };
    analyzer.program(program, name_scope)?;

    log::debug!(
        "analysis done: {} bytes of global storage",
        analyzer.table.size(memory_scope)
    );
    Ok(Analysis {
        table: analyzer.table,
        memory_scope,
        name_scope,
    })
}

/// Per-compilation analysis context.
struct Analyzer {
    table: ScopeTable,
    /// Memory scope every literal is pooled into.
    global: ScopeId,
}

impl Analyzer {
    fn program(&mut self, program: &mut Program, names: ScopeId) -> QuillResult<()> {
        let memory = self.global;
        program.info.memory_scope = Some(memory);
        program.info.name_scope = Some(names);

        for stmt in &mut program.stmts {
            self.stmt(stmt, memory, names)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // STATEMENTS
    // -------------------------------------------------------------------------

    fn stmt(&mut self, stmt: &mut Stmt, memory: ScopeId, names: ScopeId) -> QuillResult<()> {
        stmt.info.memory_scope = Some(memory);
        stmt.info.name_scope = Some(names);

        let Stmt { kind, info, .. } = stmt;
        match kind {
            StmtKind::Expr(expr) => self.expr(expr, memory, names),
            StmtKind::Block(stmts) => {
                let block = self.table.create_scope(ScopeKind::Name, Some(names));
                info.name_scope = Some(block);
                for inner in stmts {
                    self.stmt(inner, memory, block)?;
                }
                Ok(())
            }
            StmtKind::Var {
                name, initializer, ..
            } => self.var_stmt(info, name, initializer.as_mut(), memory, names),
        }
    }

    fn var_stmt(
        &mut self,
        info: &mut Annotation,
        name: &Token,
        initializer: Option<&mut Expr>,
        memory: ScopeId,
        names: ScopeId,
    ) -> QuillResult<()> {
        if self.table.find_var(names, name).is_some() {
            return Err(Error::new(
                ErrorKind::DuplicateDeclaration,
                format!("variable '{}' already declared in this scope", name.lexeme()),
                name.span,
            ));
        }

        let ty = match initializer {
            Some(init) => {
                self.expr(init, memory, names)?;
                init.info.ty.ok_or_else(|| missing_type(&*init))?
            }
            None => Type::Int,
        };

        let slot = self.table.declare_var(memory, name, ty);
        let offset = self.table.symbol(slot).offset();
        let binding = self.table.declare_var(names, name, ty);
        self.table.relocate(binding, offset);

        info.ty = Some(ty);
        info.offset = Some(offset);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // EXPRESSIONS
    // -------------------------------------------------------------------------

    fn expr(&mut self, expr: &mut Expr, memory: ScopeId, names: ScopeId) -> QuillResult<()> {
        expr.info.memory_scope = Some(memory);
        expr.info.name_scope = Some(names);

        let Expr { kind, info, .. } = expr;
        match kind {
            ExprKind::Binary { left, right, .. } => {
                self.expr(left, memory, names)?;
                self.expr(right, memory, names)?;

                if right.info.ty.is_none() {
                    return Err(missing_type(&**right));
                }
                // The left operand decides; there is no promotion rule.
                info.ty = Some(left.info.ty.ok_or_else(|| missing_type(&**left))?);
                Ok(())
            }
            ExprKind::Literal(token) => self.literal(info, token),
            ExprKind::Ident(token) => self.identifier(info, token, names),
        }
    }

    fn literal(&mut self, info: &mut Annotation, token: &Token) -> QuillResult<()> {
        let ty = match &token.kind {
            TokenKind::Int(_) => Type::Int,
            other => {
                return Err(Error::new(
                    ErrorKind::UnknownLiteralKind,
                    format!("{} token used as a literal", other.name()),
                    token.span,
                ))
            }
        };

        let global = self.global;
        let symbol = match self.table.find_literal(global, token, ty) {
            Some(pooled) => pooled,
            None => self.table.declare_literal(global, token, ty),
        };

        info.ty = Some(ty);
        info.offset = Some(self.table.symbol(symbol).offset());
        Ok(())
    }

    fn identifier(&mut self, info: &mut Annotation, token: &Token, names: ScopeId) -> QuillResult<()> {
        let mut cursor = Some(names);
        while let Some(scope) = cursor {
            if self.table.kind(scope) == ScopeKind::Name {
                if let Some(found) = self.table.find_var(scope, token) {
                    let symbol = self.table.symbol(found);
                    info.ty = Some(symbol.ty());
                    info.offset = Some(symbol.offset());
                    return Ok(());
                }
            }
            cursor = self.table.parent(scope);
        }

        Err(Error::new(
            ErrorKind::UnresolvedName,
            format!("variable '{}' not defined", token.lexeme()),
            token.span,
        ))
    }
}

fn missing_type(expr: &Expr) -> Error {
    Error::new(
        ErrorKind::MissingType,
        "expression should have a type after analysis",
        expr.span,
    )
}
