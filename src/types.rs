//! Primitive types of the language.
//!
//! There is exactly one value per primitive kind, and two types are
//! compatible only when they are the same kind. Literal pooling relies on
//! this: `1` as an `Int` and `1` as some future 8-byte kind must land in
//! different slots.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Signed integer stored in 4 bytes.
    Int,
}

impl Type {
    /// Storage width in bytes. Never larger than 8, the width of an IR
    /// argument.
    #[inline]
    pub fn size(self) -> u32 {
        match self {
            Type::Int => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Type::Int => "int",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} bytes)", self.name(), self.size())
    }
}
