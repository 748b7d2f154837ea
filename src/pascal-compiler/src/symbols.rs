//! Scoped symbol table
//!
//! A stack of scopes whose bottom entry is the global scope. Lookups only
//! ever consult the innermost scope and then the global one; intermediate
//! enclosing scopes are not searched.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Integer,
    Real,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Integer => f.write_str("integer"),
            ScalarType::Real => f.write_str("real"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Array,
    Program,
    Function,
    Procedure,
}

impl SymbolKind {
    pub fn is_callable(self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Procedure)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SymbolKind::Variable => "variable",
            SymbolKind::Array => "array",
            SymbolKind::Program => "program",
            SymbolKind::Function => "function",
            SymbolKind::Procedure => "procedure",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayBounds {
    pub start: i64,
    pub end: i64,
}

/// The type written in a declaration: a scalar, or an array of scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    Scalar(ScalarType),
    Array {
        bounds: ArrayBounds,
        element: ScalarType,
    },
}

impl DeclaredType {
    pub fn scalar(self) -> ScalarType {
        match self {
            DeclaredType::Scalar(ty) => ty,
            DeclaredType::Array { element, .. } => element,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Option<ScalarType>,
    pub bounds: Option<ArrayBounds>,
    pub return_type: Option<ScalarType>,
    pub params: Vec<ScalarType>,
}

impl Symbol {
    pub fn program(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Program,
            ty: None,
            bounds: None,
            return_type: None,
            params: vec![],
        }
    }

    /// A variable or array, depending on the declared type.
    pub fn declared(name: impl Into<String>, declared: DeclaredType) -> Self {
        let (kind, bounds) = match declared {
            DeclaredType::Scalar(_) => (SymbolKind::Variable, None),
            DeclaredType::Array { bounds, .. } => (SymbolKind::Array, Some(bounds)),
        };
        Self {
            name: name.into(),
            kind,
            ty: Some(declared.scalar()),
            bounds,
            return_type: None,
            params: vec![],
        }
    }

    pub fn function(
        name: impl Into<String>,
        params: Vec<ScalarType>,
        return_type: ScalarType,
    ) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Function,
            ty: None,
            bounds: None,
            return_type: Some(return_type),
            params,
        }
    }

    pub fn procedure(name: impl Into<String>, params: Vec<ScalarType>) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Procedure,
            ty: None,
            bounds: None,
            return_type: None,
            params,
        }
    }

    /// Scalar type an occurrence of this name evaluates to.
    ///
    /// Procedures have no value and count as integer.
    pub fn value_type(&self) -> ScalarType {
        self.ty
            .or(self.return_type)
            .unwrap_or(ScalarType::Integer)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.kind)?;
        if let Some(bounds) = self.bounds {
            write!(f, " [{}:{}]", bounds.start, bounds.end)?;
        }
        if let Some(ty) = self.ty {
            write!(f, " of {ty}")?;
        }
        if self.kind.is_callable() {
            let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
            write!(f, " ({})", params.join(", "))?;
        }
        if let Some(return_type) = self.return_type {
            write!(f, " -> {return_type}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    symbols: HashMap<String, Symbol>,
    order: Vec<String>,
}

impl Scope {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: HashMap::new(),
            order: vec![],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Symbols in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(|name| self.symbols.get(name))
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub const GLOBAL: &'static str = "global";

    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(Self::GLOBAL)],
        }
    }

    /// Inserts into the innermost scope, replacing any same-named entry there.
    pub fn insert(&mut self, symbol: Symbol) {
        let scope = self.current_mut();
        if !scope.symbols.contains_key(&symbol.name) {
            scope.order.push(symbol.name.clone());
        }
        scope.symbols.insert(symbol.name.clone(), symbol);
    }

    pub fn push_scope(&mut self, name: impl Into<String>) {
        self.scopes.push(Scope::new(name));
    }

    /// Pops the innermost scope. The global scope is never removed.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.current().get(name).or_else(|| self.global().get(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn type_of(&self, name: &str) -> Option<ScalarType> {
        self.lookup(name).and_then(|symbol| symbol.ty)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn global(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn current(&self) -> &Scope {
        // the global scope is never popped, so the stack is never empty
        &self.scopes[self.scopes.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, scope) in self.scopes.iter().enumerate() {
            writeln!(f, "{}scope {}", "  ".repeat(depth), scope.name)?;
            for symbol in scope.symbols() {
                writeln!(f, "{}  {symbol}", "  ".repeat(depth))?;
            }
        }
        Ok(())
    }
}
