//! # Quill: Scoped Integer Language with a Register-Based Micro-Runtime
//!
//! Quill compiles a tiny block-scoped language (integer literals, `var`
//! declarations, nested blocks, `+`/`-`) down to a flat, branch-free IR and
//! interprets it.
//!
//! ## Architecture
//! Source → Lexer → Parser → AST → Analyzer → Compiler → IR → VM
//!
//! ## Key Features
//! - Two scope hierarchies: one flat memory scope that lays out storage,
//!   and nested name scopes (one per block) that resolve identifiers.
//! - Literal pooling: equal literals of equal type share a storage slot.
//! - Unbounded virtual registers and a single big-endian global memory blob.
//! - Fail-fast errors carrying spans, rendered by [`error::format_error`].

pub mod analyzer;
pub mod ast;
pub mod compiler;
pub mod driver;
pub mod error;
pub mod lexer;
pub mod opcode;
pub mod parser;
pub mod scope;
pub mod session;
pub mod token;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;
