//! Lexical name lookup over the scope chain

use super::{NodeKind, NodeRef};

impl NodeRef {
    /// Resolve `name` as seen from this node.
    ///
    /// Walks the enclosing scopes outward; class bodies are only consulted
    /// when the lookup starts inside them. Returns the scope that defines the
    /// name together with the definitions that can reach this point, or
    /// `None` when no enclosing scope binds it.
    pub fn scope_lookup(&self, name: &str) -> Option<(NodeRef, Vec<NodeRef>)> {
        let origin = self.scope_node();
        let mut scope = origin.clone();
        loop {
            let skip = matches!(scope.kind(), NodeKind::ClassDef { .. }) && scope != origin;
            if !skip {
                let defs = scope.local_defs(name);
                if !defs.is_empty() {
                    let defs = filter_definitions(self, &scope, scope == origin, defs);
                    return Some((scope, defs));
                }
            }
            if scope.is_module_root() {
                return None;
            }
            scope = scope.scope_node();
        }
    }
}

/// Keep the definitions that may be live at `lookup`.
///
/// Inside the defining scope only definitions whose statement starts before
/// the lookup statement are kept (all of them when none does). The last
/// definition made directly in the scope body shadows everything before it.
fn filter_definitions(lookup: &NodeRef, scope: &NodeRef, same_scope: bool, defs: Vec<NodeRef>) -> Vec<NodeRef> {
    let mut candidates = defs;

    if same_scope {
        let stmt = lookup.statement();
        let before: Vec<NodeRef> = candidates
            .iter()
            .filter(|def| {
                if is_foreign(def, lookup) {
                    return true;
                }
                let def_stmt = def.statement();
                def_stmt != stmt && def_stmt.location() < stmt.location()
            })
            .cloned()
            .collect();
        if !before.is_empty() {
            candidates = before;
        }
    }

    if let Some(last) = candidates
        .iter()
        .rposition(|def| !is_foreign(def, lookup) && is_unconditional(def, scope))
    {
        candidates.drain(..last);
    }
    candidates
}

fn is_foreign(def: &NodeRef, lookup: &NodeRef) -> bool {
    def.module().id() != lookup.module().id()
}

fn is_unconditional(def: &NodeRef, scope: &NodeRef) -> bool {
    def.statement().parent().is_some_and(|parent| parent == *scope)
}
