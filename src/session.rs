//! Incremental REPL session.
//!
//! The language has no incremental storage model, so every accepted entry
//! is appended to the session source and the whole program is compiled and
//! run again from scratch. A rejected entry leaves the session untouched.

use std::io;

use crate::ast::{SourceFile, Stmt, StmtKind};
use crate::driver::{self, Compilation};
use crate::error::{Error, QuillResult};
use crate::vm::Vm;

/// Path shown in diagnostics for REPL input.
pub const REPL_PATH: &str = "<repl>";

/// An entry that failed somewhere in the pipeline, with the full session
/// text the error's span points into.
#[derive(Debug)]
pub struct Rejected {
    pub error: Error,
    pub source: String,
}

#[derive(Default)]
pub struct Session {
    source: String,
    last: Option<(Compilation, Vm)>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source of every accepted entry so far.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compiles and runs the session extended by `entry`.
    ///
    /// On success the entry is kept and the variables it declared are
    /// returned as `(name, value)` pairs, in declaration order.
    pub fn submit(&mut self, entry: &str) -> Result<Vec<(String, i64)>, Rejected> {
        let mut candidate = self.source.clone();
        if !candidate.is_empty() {
            candidate.push('\n');
        }
        let entry_start = candidate.len();
        candidate.push_str(entry);

        let reject = |error: Error, source: &str| Rejected {
            error,
            source: source.to_string(),
        };

        let compilation = driver::compile(SourceFile::new(REPL_PATH, candidate.as_str()))
            .map_err(|e| reject(e, &candidate))?;
        let vm = driver::execute(&compilation, Box::new(io::stdout()))
            .map_err(|e| reject(e, &candidate))?;

        let mut declared = Vec::new();
        collect_declared(&compilation.program.stmts, entry_start, &mut declared);
        let bindings = declared
            .into_iter()
            .map(|(name, offset, size)| Ok((name, vm.read_global(offset, size)?)))
            .collect::<QuillResult<Vec<_>>>()
            .map_err(|e| reject(e, &candidate))?;

        log::debug!("session accepted entry, {} bytes of source", candidate.len());
        self.source = candidate;
        self.last = Some((compilation, vm));
        Ok(bindings)
    }

    /// IR of the last accepted program.
    pub fn listing(&self) -> Option<String> {
        self.last.as_ref().map(|(c, _)| c.module.listing())
    }

    /// Memory image of the last accepted program.
    pub fn state(&self) -> Option<QuillResult<String>> {
        self.last
            .as_ref()
            .map(|(c, vm)| driver::format_state(vm, &c.module))
    }
}

/// Gathers `(name, offset, size)` for every var statement starting at or
/// after byte `from`.
fn collect_declared(stmts: &[Stmt], from: usize, out: &mut Vec<(String, i64, i64)>) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Var { name, .. } if stmt.span.start.index >= from => {
                if let (Some(offset), Some(ty)) = (stmt.info.offset, stmt.info.ty) {
                    out.push((name.lexeme().to_string(), offset as i64, ty.size() as i64));
                }
            }
            StmtKind::Block(inner) => collect_declared(inner, from, out),
            _ => {}
        }
    }
}
