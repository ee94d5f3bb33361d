//! # Opcode Module
//!
//! Linear, branch-free instruction set shared by the compiler and the VM.
//! Instructions are encoded as Rust enums for type safety during lowering,
//! then dispatched via `match` in the VM's loop.
//!
//! ## Design Notes
//! - Every instruction carries up to three 64-bit arguments; see
//!   [`Instruction::operands`] for the flat `{opcode, arg1, arg2, arg3}` form.
//! - Registers are unbounded and never reused.
//! - Memory is one global byte blob; values are stored big-endian, at most
//!   8 bytes wide.

use std::fmt;

use crate::error::Span;

// -----------------------------------------------------------------------------
// INSTRUCTION SET
// -----------------------------------------------------------------------------

/// Opcode of an [`Instruction`], without its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    GlobalAlloc,
    GlobalLoadConst,
    GlobalLoad,
    LoadGlobal,
    Add,
    Sub,
    Print,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::GlobalAlloc => "GLOBAL_ALLOC",
            Opcode::GlobalLoadConst => "GLOBAL_LOAD_CONST",
            Opcode::GlobalLoad => "GLOBAL_LOAD",
            Opcode::LoadGlobal => "LOAD_GLOBAL",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Print => "PRINT",
        }
    }

    /// How many of the three argument slots carry meaning.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Nop => 0,
            Opcode::GlobalAlloc | Opcode::Print => 1,
            _ => 3,
        }
    }
}

/// A single register-based IR instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Does nothing.
    Nop,

    // -- Memory --
    /// Allocates the global memory blob, discarding any previous one.
    GlobalAlloc { size: i64 },
    /// `memory[offset..offset + size] = value`
    GlobalLoadConst { offset: i64, size: i64, value: i64 },
    /// `memory[offset..offset + size] = regs[src]`
    GlobalLoad { offset: i64, size: i64, src: i64 },
    /// `regs[dst] = memory[offset..offset + size]`
    LoadGlobal { dst: i64, offset: i64, size: i64 },

    // -- Arithmetic (dst = a op b) --
    /// `dst = a + b`
    Add { dst: i64, a: i64, b: i64 },
    /// `dst = a - b`
    Sub { dst: i64, a: i64, b: i64 },

    // -- Output --
    /// Writes `regs[src]` to standard output, one value per line.
    Print { src: i64 },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Nop => Opcode::Nop,
            Instruction::GlobalAlloc { .. } => Opcode::GlobalAlloc,
            Instruction::GlobalLoadConst { .. } => Opcode::GlobalLoadConst,
            Instruction::GlobalLoad { .. } => Opcode::GlobalLoad,
            Instruction::LoadGlobal { .. } => Opcode::LoadGlobal,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Sub { .. } => Opcode::Sub,
            Instruction::Print { .. } => Opcode::Print,
        }
    }

    /// The `arg1, arg2, arg3` triple; unused slots are zero.
    pub fn operands(&self) -> [i64; 3] {
        match *self {
            Instruction::Nop => [0, 0, 0],
            Instruction::GlobalAlloc { size } => [size, 0, 0],
            Instruction::GlobalLoadConst {
                offset,
                size,
                value,
            } => [offset, size, value],
            Instruction::GlobalLoad { offset, size, src } => [offset, size, src],
            Instruction::LoadGlobal { dst, offset, size } => [dst, offset, size],
            Instruction::Add { dst, a, b } | Instruction::Sub { dst, a, b } => [dst, a, b],
            Instruction::Print { src } => [src, 0, 0],
        }
    }

    /// Rebuilds an instruction from its flat form.
    pub fn from_parts(opcode: Opcode, [arg1, arg2, arg3]: [i64; 3]) -> Self {
        match opcode {
            Opcode::Nop => Instruction::Nop,
            Opcode::GlobalAlloc => Instruction::GlobalAlloc { size: arg1 },
            Opcode::GlobalLoadConst => Instruction::GlobalLoadConst {
                offset: arg1,
                size: arg2,
                value: arg3,
            },
            Opcode::GlobalLoad => Instruction::GlobalLoad {
                offset: arg1,
                size: arg2,
                src: arg3,
            },
            Opcode::LoadGlobal => Instruction::LoadGlobal {
                dst: arg1,
                offset: arg2,
                size: arg3,
            },
            Opcode::Add => Instruction::Add {
                dst: arg1,
                a: arg2,
                b: arg3,
            },
            Opcode::Sub => Instruction::Sub {
                dst: arg1,
                a: arg2,
                b: arg3,
            },
            Opcode::Print => Instruction::Print { src: arg1 },
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opcode = self.opcode();
        write!(f, "{}", opcode.name())?;
        for arg in &self.operands()[..opcode.arity()] {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// COMPILED MODULE
// -----------------------------------------------------------------------------

/// A lowered program: the instruction list plus, for each instruction, the
/// source span it was lowered from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    /// Instructions in execution order.
    pub instructions: Vec<Instruction>,
    /// `spans[i]` locates `instructions[i]`; `None` for the allocation.
    pub spans: Vec<Option<Span>>,
    /// Highest register index the module uses.
    pub register_count: i64,
}

impl Module {
    /// Renders one instruction per line.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for instr in &self.instructions {
            out.push_str(&instr.to_string());
            out.push('\n');
        }
        out
    }
}
