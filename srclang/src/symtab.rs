//! Scoped symbol table.
//!
//! Scopes form a tree: the root is the global scope holding one
//! `function:<ret>` symbol per method, and each method contributes exactly
//! one child scope that holds its parameters and locals. Scopes are stored
//! in an arena (`Vec`) and referenced by index, so the tree carries no
//! lifetimes and no back-pointers.

use crate::types::Ty;
use std::fmt;
use thiserror::Error;

/// Stable identifier of a scope inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The global scope.
    pub const ROOT: ScopeId = ScopeId(0);
}

/// A declared name.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub ty: Ty,
    /// Depth of the declaring scope (root = 0)
    pub scope_level: usize,
    pub is_param: bool,
}

/// One scope in the tree.
#[derive(Debug)]
pub struct Scope {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    symbols: Vec<Symbol>,
    /// Set on the child scope a method pushes for itself
    function_name: Option<String>,
    level: usize,
}

impl Scope {
    /// Symbols in declaration order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.is_param)
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }
}

/// Attempt to declare a name twice in the same scope.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("'{name}' is already declared in this scope")]
pub struct DuplicateSymbol {
    pub name: String,
}

/// The scope tree plus a cursor for the currently open scope.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Create a table containing only the empty global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                children: Vec::new(),
                symbols: Vec::new(),
                function_name: None,
                level: 0,
            }],
            current: ScopeId::ROOT,
        }
    }

    /// Open a new scope as a child of the current one and make it current.
    ///
    /// `function_name` is attached when the scope belongs to a method, so
    /// the analyzer and emitter can find it again via [`function_scope`].
    ///
    /// [`function_scope`]: SymbolTable::function_scope
    pub fn push_scope(&mut self, function_name: Option<&str>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        let level = self.scopes[self.current.0].level + 1;
        self.scopes.push(Scope {
            parent: Some(self.current),
            children: Vec::new(),
            symbols: Vec::new(),
            function_name: function_name.map(str::to_string),
            level,
        });
        self.scopes[self.current.0].children.push(id);
        self.current = id;
        id
    }

    /// Close the current scope, returning to its parent.
    ///
    /// Popping the global scope is a no-op.
    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current.0].parent {
            self.current = parent;
        }
    }

    /// The currently open scope.
    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    /// Make `scope` current (used when re-entering a method body).
    pub fn set_current(&mut self, scope: ScopeId) {
        debug_assert!(scope.0 < self.scopes.len());
        self.current = scope;
    }

    /// Depth of the current scope (root = 0).
    pub fn current_level(&self) -> usize {
        self.scopes[self.current.0].level
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Insert a symbol into the current scope.
    pub fn insert(&mut self, name: &str, ty: Ty, is_param: bool) -> Result<(), DuplicateSymbol> {
        let scope = &mut self.scopes[self.current.0];
        if scope.symbols.iter().any(|s| s.name == name) {
            return Err(DuplicateSymbol {
                name: name.to_string(),
            });
        }
        let level = scope.level;
        scope.symbols.push(Symbol {
            name: name.to_string(),
            ty,
            scope_level: level,
            is_param,
        });
        Ok(())
    }

    /// Look a name up from the current scope outwards; the shallowest
    /// enclosing binding wins.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let s = &self.scopes[id.0];
            if let Some(sym) = s.symbols.iter().find(|sym| sym.name == name) {
                return Some(sym);
            }
            scope = s.parent;
        }
        None
    }

    /// Look a name up in one specific scope only.
    pub fn lookup_in(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.scopes[scope.0].symbols.iter().find(|s| s.name == name)
    }

    /// The scope a method pushed for itself, searched among the root's
    /// immediate children.
    pub fn function_scope(&self, name: &str) -> Option<ScopeId> {
        self.scopes[ScopeId::ROOT.0]
            .children
            .iter()
            .copied()
            .find(|id| self.scopes[id.0].function_name.as_deref() == Some(name))
    }

    /// Parameter types of a method in declaration order.
    pub fn param_types(&self, name: &str) -> Option<Vec<Ty>> {
        let scope = self.function_scope(name)?;
        Some(
            self.scopes[scope.0]
                .params()
                .map(|s| s.ty.clone())
                .collect(),
        )
    }

    fn fmt_scope(&self, f: &mut fmt::Formatter<'_>, id: ScopeId) -> fmt::Result {
        let scope = &self.scopes[id.0];
        if scope.symbols.is_empty() && scope.children.is_empty() {
            return Ok(());
        }
        match &scope.function_name {
            Some(name) => writeln!(f, "--- scope level {} ({}) ---", scope.level, name)?,
            None => writeln!(f, "--- scope level {} ---", scope.level)?,
        }
        for sym in &scope.symbols {
            let kind = if sym.is_param { " (param)" } else { "" };
            writeln!(f, "  {}: {}{}", sym.name, sym.ty, kind)?;
        }
        for child in &scope.children {
            self.fmt_scope(f, *child)?;
        }
        Ok(())
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_scope(f, ScopeId::ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut table = SymbolTable::new();
        table.insert("x", Ty::Integer, false).unwrap();
        let sym = table.lookup("x").unwrap();
        assert_eq!(sym.ty, Ty::Integer);
        assert_eq!(sym.scope_level, 0);
        assert!(table.lookup("y").is_none());
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut table = SymbolTable::new();
        table.insert("x", Ty::Integer, false).unwrap();
        let err = table.insert("x", Ty::Bool, false).unwrap_err();
        assert_eq!(err.name, "x");
    }

    #[test]
    fn test_shadowing_inner_wins() {
        let mut table = SymbolTable::new();
        table.insert("x", Ty::Integer, false).unwrap();
        table.push_scope(Some("f"));
        table.insert("x", Ty::Bool, false).unwrap();
        assert_eq!(table.lookup("x").unwrap().ty, Ty::Bool);
        assert_eq!(table.current_level(), 1);
        table.pop_scope();
        assert_eq!(table.lookup("x").unwrap().ty, Ty::Integer);
    }

    #[test]
    fn test_lookup_walks_parent_chain() {
        let mut table = SymbolTable::new();
        table
            .insert("global", Ty::Function(Box::new(Ty::Void)), false)
            .unwrap();
        table.push_scope(Some("f"));
        assert!(table.lookup("global").is_some());
    }

    #[test]
    fn test_function_scope_finds_only_root_children() {
        let mut table = SymbolTable::new();
        table.push_scope(Some("f"));
        table.insert("a", Ty::Integer, true).unwrap();
        table.insert("local", Ty::Bool, false).unwrap();
        table.pop_scope();
        table.push_scope(Some("g"));
        table.pop_scope();

        let f_scope = table.function_scope("f").unwrap();
        let params: Vec<_> = table.scope(f_scope).params().collect();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "a");
        assert!(table.function_scope("missing").is_none());
    }

    #[test]
    fn test_param_types_in_order() {
        let mut table = SymbolTable::new();
        table.push_scope(Some("f"));
        table.insert("a", Ty::Integer, true).unwrap();
        table.insert("b", Ty::Bool, true).unwrap();
        table.insert("tmp", Ty::Integer, false).unwrap();
        table.pop_scope();
        assert_eq!(
            table.param_types("f").unwrap(),
            vec![Ty::Integer, Ty::Bool]
        );
    }

    #[test]
    fn test_pop_global_is_noop() {
        let mut table = SymbolTable::new();
        table.pop_scope();
        assert_eq!(table.current_scope(), ScopeId::ROOT);
    }

    #[test]
    fn test_display_lists_scopes() {
        let mut table = SymbolTable::new();
        table
            .insert("main", Ty::Function(Box::new(Ty::Integer)), false)
            .unwrap();
        table.push_scope(Some("main"));
        table.insert("x", Ty::Integer, false).unwrap();
        table.pop_scope();
        let printed = table.to_string();
        assert!(printed.contains("main: function:integer"));
        assert!(printed.contains("scope level 1 (main)"));
        assert!(printed.contains("x: integer"));
    }
}
