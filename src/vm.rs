use std::io::{self, Write};

use crate::error::{Error, QuillResult, Span};
use crate::opcode::{Instruction, Module};

/// Widest value a single memory access may move, in bytes.
const MAX_WIDTH: i64 = 8;

/// Straight-line interpreter for a lowered [`Module`].
///
/// Owns the global memory blob and the register file. Both start out
/// absent: memory appears on `GLOBAL_ALLOC`, registers grow (zero-filled)
/// the first time an index is touched.
pub struct Vm {
    memory: Option<Vec<u8>>,
    registers: Vec<i64>,
    out: Box<dyn Write>,
    /// Span of the instruction currently executing, for error reports.
    current_span: Option<Span>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Creates a VM whose `PRINT` output goes to standard output.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates a VM whose `PRINT` output goes to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            memory: None,
            registers: Vec::new(),
            out,
            current_span: None,
        }
    }

    /// Runs every instruction of `module` in order.
    pub fn execute(&mut self, module: &Module) -> QuillResult<()> {
        for (ip, instr) in module.instructions.iter().enumerate() {
            self.current_span = module.spans.get(ip).copied().flatten();
            log::trace!("{:>4}: {}", ip, instr);
            self.step(*instr)?;
        }
        self.out
            .flush()
            .map_err(|e| self.runtime_error(format!("failed to flush output: {}", e)))?;
        Ok(())
    }

    fn step(&mut self, instr: Instruction) -> QuillResult<()> {
        match instr {
            Instruction::Nop => {}
            Instruction::GlobalAlloc { size } => {
                let size = usize::try_from(size).map_err(|_| {
                    self.runtime_error(format!("cannot allocate {} bytes", size))
                })?;
                log::debug!("allocating {} bytes of global memory", size);
                self.memory = Some(vec![0; size]);
            }
            Instruction::GlobalLoadConst {
                offset,
                size,
                value,
            } => self.store(offset, size, value)?,
            Instruction::GlobalLoad { offset, size, src } => {
                let value = self.register(src)?;
                self.store(offset, size, value)?;
            }
            Instruction::LoadGlobal { dst, offset, size } => {
                let value = self.load(offset, size)?;
                self.set_register(dst, value)?;
            }
            Instruction::Add { dst, a, b } => {
                let value = self.register(a)?.wrapping_add(self.register(b)?);
                self.set_register(dst, value)?;
            }
            Instruction::Sub { dst, a, b } => {
                let value = self.register(a)?.wrapping_sub(self.register(b)?);
                self.set_register(dst, value)?;
            }
            Instruction::Print { src } => {
                let value = self.register(src)?;
                writeln!(self.out, "{}", value)
                    .map_err(|e| self.runtime_error(format!("failed to print: {}", e)))?;
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // MEMORY
    // -------------------------------------------------------------------------

    /// Writes the low `size` bytes of `value` big-endian at `offset`.
    /// Higher bits are dropped.
    fn store(&mut self, offset: i64, size: i64, value: i64) -> QuillResult<()> {
        let range = self.checked_range(offset, size)?;
        let width = range.len();
        let memory = self.memory_mut()?;
        memory[range].copy_from_slice(&value.to_be_bytes()[8 - width..]);
        Ok(())
    }

    /// Reads `size` bytes big-endian from `offset`, zero-extended.
    fn load(&self, offset: i64, size: i64) -> QuillResult<i64> {
        let range = self.checked_range(offset, size)?;
        let memory = self
            .memory
            .as_deref()
            .ok_or_else(|| self.runtime_error("global memory accessed before allocation"))?;
        let mut bytes = [0u8; 8];
        bytes[8 - range.len()..].copy_from_slice(&memory[range]);
        Ok(i64::from_be_bytes(bytes))
    }

    fn checked_range(&self, offset: i64, size: i64) -> QuillResult<std::ops::Range<usize>> {
        if !(1..=MAX_WIDTH).contains(&size) {
            return Err(self.runtime_error(format!(
                "access width {} outside 1..={}",
                size, MAX_WIDTH
            )));
        }
        let len = self.memory.as_ref().map_or(0, Vec::len);
        let start = usize::try_from(offset).ok();
        match start.and_then(|s| s.checked_add(size as usize)) {
            Some(end) if end <= len => Ok(offset as usize..end),
            _ if self.memory.is_none() => {
                Err(self.runtime_error("global memory accessed before allocation"))
            }
            _ => Err(self.runtime_error(format!(
                "access [{}, {}) outside global memory of {} bytes",
                offset,
                offset.saturating_add(size),
                len
            ))),
        }
    }

    fn memory_mut(&mut self) -> QuillResult<&mut Vec<u8>> {
        match self.memory {
            Some(ref mut memory) => Ok(memory),
            None => Err(Error::runtime(
                "global memory accessed before allocation",
                self.current_span,
            )),
        }
    }

    /// Decodes `size` bytes at `offset` without touching any register.
    pub fn read_global(&self, offset: i64, size: i64) -> QuillResult<i64> {
        self.load(offset, size)
    }

    /// `(offset, size, value)` for every slot `module` pre-seeds, decoded
    /// from current memory.
    pub fn state(&self, module: &Module) -> QuillResult<Vec<(i64, i64, i64)>> {
        module
            .instructions
            .iter()
            .filter_map(|instr| match *instr {
                Instruction::GlobalLoadConst { offset, size, .. } => Some((offset, size)),
                _ => None,
            })
            .map(|(offset, size)| Ok((offset, size, self.load(offset, size)?)))
            .collect()
    }

    // -------------------------------------------------------------------------
    // REGISTERS
    // -------------------------------------------------------------------------

    pub fn register(&mut self, index: i64) -> QuillResult<i64> {
        let slot = self.grow_to(index)?;
        Ok(self.registers[slot])
    }

    fn set_register(&mut self, index: i64, value: i64) -> QuillResult<()> {
        let slot = self.grow_to(index)?;
        self.registers[slot] = value;
        Ok(())
    }

    /// Makes `index` addressable, zero-filling any new slots.
    fn grow_to(&mut self, index: i64) -> QuillResult<usize> {
        let slot = usize::try_from(index)
            .map_err(|_| self.runtime_error(format!("invalid register r{}", index)))?;
        if slot >= self.registers.len() {
            self.registers.resize(slot + 1, 0);
        }
        Ok(slot)
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    fn runtime_error(&self, message: impl Into<String>) -> Error {
        Error::runtime(message, self.current_span)
    }
}
