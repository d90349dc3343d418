use super::{DefNode, Definition, Location, Module, ModuleId, Node, NodeId, NodeKind, Scope};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Hashable identity of a node across modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub module: ModuleId,
    pub node: NodeId,
}

/// Shared handle to a node inside a built module
#[derive(Clone)]
pub struct NodeRef {
    module: Arc<Module>,
    id: NodeId,
}

impl NodeRef {
    pub fn new(module: Arc<Module>, id: NodeId) -> Self {
        Self { module, id }
    }

    pub fn root(module: &Arc<Module>) -> Self {
        Self::new(Arc::clone(module), NodeId::ROOT)
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn key(&self) -> NodeKey {
        NodeKey {
            module: self.module.id(),
            node: self.id,
        }
    }

    pub fn node(&self) -> &Node {
        self.module.node(self.id)
    }

    pub fn kind(&self) -> &NodeKind {
        &self.node().kind
    }

    pub fn location(&self) -> Location {
        self.node().location
    }

    /// Effective line of this node
    pub fn line(&self) -> u32 {
        self.node().from_line
    }

    /// Another node of the same module
    pub fn at(&self, id: NodeId) -> NodeRef {
        NodeRef::new(Arc::clone(&self.module), id)
    }

    pub fn module_root(&self) -> NodeRef {
        self.at(NodeId::ROOT)
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.node().parent.map(|id| self.at(id))
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.node().children.iter().map(|id| self.at(*id)).collect()
    }

    /// Scope resolving names used at this node
    pub fn scope_node(&self) -> NodeRef {
        self.at(self.node().scope)
    }

    pub fn name(&self) -> Option<&str> {
        self.kind().def_name()
    }

    pub fn is_scope(&self) -> bool {
        self.kind().is_scope()
    }

    pub fn is_module_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    /// Nearest statement containing this node (itself included)
    pub fn statement(&self) -> NodeRef {
        let mut current = self.clone();
        loop {
            if current.kind().is_statement() {
                return current;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Nearest enclosing function, lambda, class or module (itself included)
    pub fn frame(&self) -> NodeRef {
        let mut current = self.clone();
        loop {
            if current.is_scope() {
                return current;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Class a function is defined in, when it is a method
    pub fn defining_class(&self) -> Option<NodeRef> {
        match self.kind() {
            NodeKind::FunctionDef { .. } => {
                let scope = self.scope_node();
                matches!(scope.kind(), NodeKind::ClassDef { .. }).then_some(scope)
            }
            _ => None,
        }
    }

    pub fn scope_tables(&self) -> Option<&Scope> {
        self.module.scope(self.id)
    }

    pub fn resolve(&self, def: &DefNode) -> NodeRef {
        match def {
            DefNode::Local(id) => self.at(*id),
            DefNode::Foreign(node) => node.clone(),
        }
    }

    fn definition_for(&self, def: &NodeRef) -> Definition {
        let node = if def.module.id() == self.module.id() {
            DefNode::Local(def.id)
        } else {
            DefNode::Foreign(def.clone())
        };
        Definition {
            node,
            line: def.line(),
        }
    }

    /// Definitions of `name` in this scope's locals, in line order
    pub fn local_defs(&self, name: &str) -> Vec<NodeRef> {
        let Some(scope) = self.scope_tables() else {
            return Vec::new();
        };
        let locals = scope.locals().read();
        locals
            .get(name)
            .map(|defs| defs.iter().map(|d| self.resolve(&d.node)).collect())
            .unwrap_or_default()
    }

    pub fn local_names(&self) -> Vec<String> {
        self.scope_tables()
            .map(|scope| scope.locals().read().names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.scope_tables()
            .map(|scope| scope.locals().read().contains(name))
            .unwrap_or(false)
    }

    pub fn set_local(&self, name: &str, def: &NodeRef) {
        if let Some(scope) = self.scope_tables() {
            scope.locals().write().insert(name, self.definition_for(def));
        }
    }

    pub fn instance_attr_defs(&self, name: &str) -> Vec<NodeRef> {
        let Some(scope) = self.scope_tables() else {
            return Vec::new();
        };
        let attrs = scope.instance_attrs().read();
        attrs
            .get(name)
            .map(|defs| defs.iter().map(|d| self.resolve(&d.node)).collect())
            .unwrap_or_default()
    }

    pub fn set_instance_attr(&self, name: &str, def: &NodeRef) {
        if let Some(scope) = self.scope_tables() {
            scope.instance_attrs().write().insert(name, self.definition_for(def));
        }
    }

    pub fn set_instance_attr_first(&self, name: &str, def: &NodeRef) {
        if let Some(scope) = self.scope_tables() {
            scope
                .instance_attrs()
                .write()
                .insert_first(name, self.definition_for(def));
        }
    }

    /// Preorder walk of descendants that stays inside this node's scope
    pub fn descendants_in_scope(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.node().children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.module.node(id);
            out.push(self.at(id));
            if node.kind.is_scope() {
                continue;
            }
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.module.id() == other.module.id()
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind();
        match kind.def_name() {
            Some(name) => write!(f, "{}({})", kind.label(), name)?,
            None => write!(f, "{}", kind.label())?,
        }
        write!(f, " at {}:{}", self.module.name(), self.location())
    }
}
