//! Symbol tables attached to scope nodes

use super::{NodeId, NodeRef};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A definition recorded in a symbol table.
///
/// Definitions built with the module are stored by id; definitions that
/// live in another module (an attribute assigned from elsewhere, a name
/// pulled in by a wildcard import) carry their own module handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefNode {
    Local(NodeId),
    Foreign(NodeRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub node: DefNode,
    /// Effective line used for ordering
    pub line: u32,
}

/// Name → definitions, definitions kept in ascending effective line
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    entries: IndexMap<String, Vec<Definition>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a definition and restore line order (stable for equal lines)
    pub fn insert(&mut self, name: &str, def: Definition) {
        let defs = self.entries.entry(name.to_string()).or_default();
        if defs.contains(&def) {
            return;
        }
        defs.push(def);
        defs.sort_by_key(|d| d.line);
    }

    /// Insert ahead of every existing definition of `name`
    pub fn insert_first(&mut self, name: &str, def: Definition) {
        let defs = self.entries.entry(name.to_string()).or_default();
        if defs.contains(&def) {
            return;
        }
        defs.insert(0, def);
    }

    pub fn get(&self, name: &str) -> Option<&[Definition]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tables owned by one scope node
#[derive(Debug, Default)]
pub struct Scope {
    locals: RwLock<SymbolTable>,
    instance_attrs: RwLock<SymbolTable>,
    known_bases: OnceLock<bool>,
}

impl Scope {
    pub fn new(locals: SymbolTable) -> Self {
        Self {
            locals: RwLock::new(locals),
            instance_attrs: RwLock::new(SymbolTable::new()),
            known_bases: OnceLock::new(),
        }
    }

    pub fn locals(&self) -> &RwLock<SymbolTable> {
        &self.locals
    }

    pub fn instance_attrs(&self) -> &RwLock<SymbolTable> {
        &self.instance_attrs
    }

    /// Memoized "every base is a known class" flag (classes only)
    pub fn known_bases(&self) -> &OnceLock<bool> {
        &self.known_bases
    }
}

/// All scope tables of a module, keyed by scope node
#[derive(Debug, Default)]
pub struct ScopeTables {
    scopes: HashMap<NodeId, Scope>,
}

impl ScopeTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: NodeId, scope: Scope) {
        self.scopes.insert(id, scope);
    }

    pub fn get(&self, id: NodeId) -> Option<&Scope> {
        self.scopes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
