//! # Driver Module
//!
//! Wires the passes together: source → tokens → tree → analysis → IR → VM.
//! Each call owns its own scope arena, module and VM, so independent
//! compilations never share state.

use std::fmt::Write as _;
use std::io::Write;
use std::rc::Rc;

use crate::analyzer::{self, Analysis};
use crate::ast::{self, Program, SourceFile};
use crate::compiler::Compiler;
use crate::error::QuillResult;
use crate::lexer::Lexer;
use crate::opcode::Module;
use crate::parser::Parser;
use crate::token::Token;
use crate::vm::Vm;

/// What the driver should print and whether it should execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub dump_tokens: bool,
    pub dump_ast: bool,
    pub dump_scopes: bool,
    pub dump_ir: bool,
    pub dump_state: bool,
    /// Stop after lowering.
    pub no_run: bool,
}

/// Every artifact of one compilation.
#[derive(Debug)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub program: Program,
    pub analysis: Analysis,
    pub module: Module,
}

/// Runs every pass up to and including IR generation.
pub fn compile(source: Rc<SourceFile>) -> QuillResult<Compilation> {
    let tokens = Lexer::new(&source.text).tokenize()?;
    let mut program = Parser::new(tokens.clone(), source).parse()?;
    let analysis = analyzer::analyze(&mut program)?;
    let module = Compiler::new(&analysis).compile(&program)?;

    Ok(Compilation {
        tokens,
        program,
        analysis,
        module,
    })
}

/// Executes a compiled module on a fresh VM and returns the VM so the
/// caller can inspect its final memory.
pub fn execute(compilation: &Compilation, out: Box<dyn Write>) -> QuillResult<Vm> {
    let mut vm = Vm::with_output(out);
    vm.execute(&compilation.module)?;
    log::debug!(
        "executed {} instructions; {} registers lowered, {} touched",
        compilation.module.instructions.len(),
        compilation.module.register_count,
        vm.register_count()
    );
    Ok(vm)
}

impl Compilation {
    /// Renders the dumps `config` asks for that exist before execution.
    pub fn dumps(&self, config: &Config) -> String {
        let mut out = String::new();
        if config.dump_tokens {
            out.push_str("========== TOKENS ==========\n");
            for token in &self.tokens {
                let _ = writeln!(
                    out,
                    "{}:{}\t{}",
                    token.span.start.line, token.span.start.col, token
                );
            }
        }
        if config.dump_ast {
            out.push_str("========== AST ==========\n");
            out.push_str(&ast::print_tree(&self.program));
        }
        if config.dump_scopes {
            out.push_str("========== SCOPES ==========\n");
            out.push_str(&self.analysis.table.describe(self.analysis.memory_scope));
        }
        if config.dump_ir {
            out.push_str("========== IR ==========\n");
            out.push_str(&self.module.listing());
        }
        out
    }
}

/// Renders the final memory image, one line per pre-seeded slot.
pub fn format_state(vm: &Vm, module: &Module) -> QuillResult<String> {
    let mut out = String::from("========== GLOBAL STATE ==========\n");
    for (offset, size, value) in vm.state(module)? {
        let _ = writeln!(out, "{} {}: {}", offset, size, value);
    }
    Ok(out)
}
