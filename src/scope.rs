//! # Scope Module
//!
//! Symbol table for the analyzer, organised as two parallel hierarchies:
//!
//! - one flat **memory scope** that owns storage layout. Every literal and
//!   every variable of the program gets a permanent byte offset here, no
//!   matter how deeply nested its declaration is.
//! - a chain of **name scopes**, one per block, used only to resolve
//!   identifiers. The root name scope's parent is the memory scope, so a
//!   walk up the parent chain always terminates.
//!
//! Scopes and symbols live in a single arena and refer to each other by
//! [`ScopeId`] / [`SymbolId`] handles.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::token::Token;
use crate::types::Type;

// -----------------------------------------------------------------------------
// HANDLES
// -----------------------------------------------------------------------------

/// Handle to a scope in a [`ScopeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// Handle to a symbol in a [`ScopeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Storage layout.
    Memory,
    /// Identifier lookup.
    Name,
}

// -----------------------------------------------------------------------------
// SYMBOLS
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Literal { token: Token, ty: Type, offset: u32 },
    Var { token: Token, ty: Type, offset: u32 },
}

impl Symbol {
    pub fn token(&self) -> &Token {
        match self {
            Symbol::Literal { token, .. } | Symbol::Var { token, .. } => token,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Symbol::Literal { ty, .. } | Symbol::Var { ty, .. } => *ty,
        }
    }

    pub fn offset(&self) -> u32 {
        match self {
            Symbol::Literal { offset, .. } | Symbol::Var { offset, .. } => *offset,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Symbol::Literal { .. })
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_literal() { "literal" } else { "var" };
        write!(
            f,
            "{:<8} {:<12} offset {:<6} {}",
            kind,
            self.token().lexeme(),
            self.offset(),
            self.ty()
        )
    }
}

// -----------------------------------------------------------------------------
// SCOPES
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    /// Running byte size: the offset the next appended symbol receives.
    size: u32,
    /// Every symbol appended to this scope, in declaration order.
    symbols: Vec<SymbolId>,
    /// First variable declared under each name.
    vars: FxHashMap<String, SymbolId>,
    /// First literal declared for each `(text, type)` pair.
    literals: FxHashMap<(String, Type), SymbolId>,
}

/// Arena owning every scope and symbol created during analysis.
#[derive(Debug, Default)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an empty scope of the given kind.
    pub fn create_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent,
            size: 0,
            symbols: Vec::new(),
            vars: FxHashMap::default(),
            literals: FxHashMap::default(),
        });
        log::debug!("created {:?} scope {:?} (parent {:?})", kind, id, parent);
        id
    }

    /// Looks for a literal with the same text and type in `scope` itself.
    /// Parents are never consulted.
    pub fn find_literal(&self, scope: ScopeId, token: &Token, ty: Type) -> Option<SymbolId> {
        self.scope(scope)
            .literals
            .get(&(token.lexeme().to_string(), ty))
            .copied()
    }

    /// Appends a literal to `scope` at the scope's current size.
    ///
    /// No duplicate check happens here; pool through
    /// [`find_literal`](Self::find_literal) first.
    pub fn declare_literal(&mut self, scope: ScopeId, token: &Token, ty: Type) -> SymbolId {
        let offset = self.scope(scope).size;
        let id = self.append(
            scope,
            Symbol::Literal {
                token: token.clone(),
                ty,
                offset,
            },
        );
        self.scope_mut(scope)
            .literals
            .entry((token.lexeme().to_string(), ty))
            .or_insert(id);
        id
    }

    /// Looks for a variable named like `token` in `scope` itself.
    pub fn find_var(&self, scope: ScopeId, token: &Token) -> Option<SymbolId> {
        self.scope(scope).vars.get(token.lexeme()).copied()
    }

    /// Appends a variable to `scope` at the scope's current size.
    pub fn declare_var(&mut self, scope: ScopeId, token: &Token, ty: Type) -> SymbolId {
        let offset = self.scope(scope).size;
        let id = self.append(
            scope,
            Symbol::Var {
                token: token.clone(),
                ty,
                offset,
            },
        );
        self.scope_mut(scope)
            .vars
            .entry(token.lexeme().to_string())
            .or_insert(id);
        id
    }

    /// Points a symbol at a different storage slot. Used to make a
    /// name-scope binding refer to the slot its memory-scope twin owns.
    pub fn relocate(&mut self, symbol: SymbolId, to: u32) {
        match &mut self.symbols[symbol.0 as usize] {
            Symbol::Literal { offset, .. } | Symbol::Var { offset, .. } => *offset = to,
        }
    }

    // -------------------------------------------------------------------------
    // ACCESSORS
    // -------------------------------------------------------------------------

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scope(scope).kind
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scope(scope).parent
    }

    /// Cumulative byte size of everything appended to `scope`.
    pub fn size(&self, scope: ScopeId) -> u32 {
        self.scope(scope).size
    }

    /// Symbols of `scope` in declaration order.
    pub fn symbols(&self, scope: ScopeId) -> impl Iterator<Item = &Symbol> + '_ {
        self.scope(scope).symbols.iter().map(|&id| self.symbol(id))
    }

    /// One line per symbol of `scope`, in declaration order.
    pub fn describe(&self, scope: ScopeId) -> String {
        let mut out = format!(
            "{:?} scope {} ({} bytes)\n",
            self.kind(scope),
            scope.0,
            self.size(scope)
        );
        for symbol in self.symbols(scope) {
            out.push_str(&format!("  {}\n", symbol));
        }
        out
    }

    fn append(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        let size = symbol.ty().size();
        log::debug!("declared {} in scope {:?}", symbol, scope);
        self.symbols.push(symbol);

        let scope = self.scope_mut(scope);
        scope.symbols.push(id);
        scope.size += size;
        id
    }

    #[inline]
    fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    #[inline]
    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }
}

