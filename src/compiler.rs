use crate::analyzer::Analysis;
use crate::ast::*;
use crate::error::{Error, ErrorKind, QuillResult, Span};
use crate::opcode::{Instruction, Module};
use crate::scope::Symbol;
use crate::token::TokenKind;

/// Lowers an analyzed program into a flat [`Module`].
///
/// Memory is laid out by the analyzer; the compiler only reads offsets back
/// off the tree. Every expression result lands in a fresh register.
pub struct Compiler<'a> {
    analysis: &'a Analysis,
    instructions: Vec<Instruction>,
    spans: Vec<Option<Span>>,
    current_span: Option<Span>,
    last_reg: i64,
}

impl<'a> Compiler<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self {
            analysis,
            instructions: Vec::new(),
            spans: Vec::new(),
            current_span: None,
            last_reg: 0,
        }
    }

    pub fn compile(mut self, program: &Program) -> QuillResult<Module> {
        let analysis = self.analysis;
        let table = &analysis.table;
        let memory = analysis.memory_scope;

        self.emit(Instruction::GlobalAlloc {
            size: table.size(memory) as i64,
        });

        for symbol in table.symbols(memory) {
            self.current_span = Some(symbol.token().span);
            let value = match symbol {
                Symbol::Literal { token, .. } => token.lexeme().parse::<i64>().map_err(|_| {
                    Error::new(
                        ErrorKind::UnknownLiteralKind,
                        format!("'{}' is not a decimal integer", token.lexeme()),
                        token.span,
                    )
                })?,
                Symbol::Var { .. } => 0,
            };
            self.emit(Instruction::GlobalLoadConst {
                offset: symbol.offset() as i64,
                size: symbol.ty().size() as i64,
                value,
            });
        }

        for stmt in &program.stmts {
            self.compile_stmt(stmt)?;
        }

        log::debug!(
            "lowered {} instructions using {} registers",
            self.instructions.len(),
            self.last_reg
        );
        Ok(Module {
            instructions: self.instructions,
            spans: self.spans,
            register_count: self.last_reg,
        })
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> QuillResult<()> {
        self.current_span = Some(stmt.span);
        match &stmt.kind {
            StmtKind::Var {
                initializer: Some(init),
                ..
            } => {
                let (offset, size) = slot(&stmt.info, stmt.span)?;
                let src = self.compile_expr(init)?;
                self.current_span = Some(stmt.span);
                self.emit(Instruction::GlobalLoad { offset, size, src });
                Ok(())
            }
            // Already zeroed by the pre-seed.
            StmtKind::Var {
                initializer: None, ..
            } => Ok(()),
            StmtKind::Block(stmts) => {
                for s in stmts {
                    self.compile_stmt(s)?;
                }
                Ok(())
            }
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                Ok(())
            }
        }
    }

    /// Lowers `expr` and returns the register holding its value.
    fn compile_expr(&mut self, expr: &Expr) -> QuillResult<i64> {
        self.current_span = Some(expr.span);
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Ident(_) => {
                let (offset, size) = slot(&expr.info, expr.span)?;
                let dst = self.alloc_reg();
                self.emit(Instruction::LoadGlobal { dst, offset, size });
                Ok(dst)
            }
            ExprKind::Binary { left, op, right } => {
                let a = self.compile_expr(left)?;
                let b = self.compile_expr(right)?;
                self.current_span = Some(expr.span);

                let instr: fn(i64, i64, i64) -> Instruction = match op.kind {
                    TokenKind::Plus => |dst, a, b| Instruction::Add { dst, a, b },
                    TokenKind::Minus => |dst, a, b| Instruction::Sub { dst, a, b },
                    _ => {
                        return Err(Error::new(
                            ErrorKind::UnexpectedNodeKind,
                            format!("'{}' is not a binary operator", op.lexeme()),
                            op.span,
                        ))
                    }
                };
                let dst = self.alloc_reg();
                self.emit(instr(dst, a, b));
                Ok(dst)
            }
        }
    }

    #[inline]
    fn alloc_reg(&mut self) -> i64 {
        self.last_reg += 1;
        self.last_reg
    }

    #[inline]
    fn emit(&mut self, instr: Instruction) {
        log::trace!("emit {}", instr);
        self.instructions.push(instr);
        self.spans.push(self.current_span);
    }
}

/// Reads the storage slot the analyzer assigned to a node.
fn slot(info: &Annotation, span: Span) -> QuillResult<(i64, i64)> {
    match (info.offset, info.ty) {
        (Some(offset), Some(ty)) => Ok((offset as i64, ty.size() as i64)),
        _ => Err(Error::new(
            ErrorKind::MissingType,
            "node has no storage slot; was the program analyzed?",
            span,
        )),
    }
}
