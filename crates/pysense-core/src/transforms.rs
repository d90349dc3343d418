//! Transform pipeline run over every freshly built module

use crate::tree::{Module, NodeKind, NodeRef};
use std::sync::Arc;
use tracing::debug;

/// Selects the nodes a transform applies to
pub type Predicate = Arc<dyn Fn(&NodeRef) -> bool + Send + Sync>;

/// Rewrites a node's payload; `None` leaves it untouched
pub type Action = Arc<dyn Fn(&NodeRef) -> Option<NodeKind> + Send + Sync>;

/// Handle returned by [`TransformRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformId(u64);

#[derive(Clone)]
struct Transform {
    id: TransformId,
    predicate: Predicate,
    action: Action,
}

/// Ordered (predicate, action) pairs
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: Vec<Transform>,
    next_id: u64,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, predicate: Predicate, action: Action) -> TransformId {
        let id = TransformId(self.next_id);
        self.next_id += 1;
        self.transforms.push(Transform { id, predicate, action });
        id
    }

    /// Remove a transform; `false` when it was not registered
    pub fn unregister(&mut self, id: TransformId) -> bool {
        let before = self.transforms.len();
        self.transforms.retain(|t| t.id != id);
        self.transforms.len() != before
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Apply every matching action to every node of `module`.
    ///
    /// Predicates and actions see the module as it was built; when several
    /// actions rewrite the same node the last registered one wins. A module
    /// nothing rewrites is returned as is.
    pub fn visit(&self, module: &Arc<Module>) -> Arc<Module> {
        if self.transforms.is_empty() {
            return Arc::clone(module);
        }
        let mut replacements = Vec::new();
        for id in module.node_ids() {
            let node = NodeRef::new(Arc::clone(module), id);
            for transform in &self.transforms {
                if !(transform.predicate)(&node) {
                    continue;
                }
                if let Some(kind) = (transform.action)(&node) {
                    replacements.push((id, kind));
                }
            }
        }
        if replacements.is_empty() {
            return Arc::clone(module);
        }
        debug!("Transforms rewrote {} nodes of {}", replacements.len(), module.name());
        Arc::new(module.with_replaced_kinds(replacements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_source, RustPythonAdapter, SourceInfo};
    use crate::tree::Constant;

    fn module(text: &str) -> Arc<Module> {
        let built = build_source(&RustPythonAdapter, text, "t", SourceInfo::default(), true).unwrap();
        Arc::new(Module::new(built.parts))
    }

    fn is_int(node: &NodeRef) -> bool {
        matches!(node.kind(), NodeKind::Const(Constant::Int(_)))
    }

    #[test]
    fn test_visit_rewrites_matching_nodes() {
        let mut registry = TransformRegistry::new();
        registry.register(
            Arc::new(is_int),
            Arc::new(|_: &NodeRef| Some(NodeKind::Const(Constant::Int(42)))),
        );
        let original = module("x = 1\ny = 'a'\n");
        let rewritten = registry.visit(&original);

        assert_eq!(rewritten.id(), original.id());
        let ints: Vec<_> = rewritten
            .node_ids()
            .filter(|id| matches!(rewritten.node(*id).kind, NodeKind::Const(Constant::Int(42))))
            .collect();
        assert_eq!(ints.len(), 1);
        // the original is untouched
        assert!(original
            .node_ids()
            .all(|id| !matches!(original.node(id).kind, NodeKind::Const(Constant::Int(42)))));
    }

    #[test]
    fn test_later_transform_wins_on_same_node() {
        let mut registry = TransformRegistry::new();
        registry.register(Arc::new(is_int), Arc::new(|_: &NodeRef| Some(NodeKind::Const(Constant::Int(1)))));
        registry.register(Arc::new(is_int), Arc::new(|_: &NodeRef| Some(NodeKind::Const(Constant::Int(2)))));
        let rewritten = registry.visit(&module("x = 0\n"));
        assert!(rewritten
            .node_ids()
            .any(|id| matches!(rewritten.node(id).kind, NodeKind::Const(Constant::Int(2)))));
    }

    #[test]
    fn test_unregister() {
        let mut registry = TransformRegistry::new();
        let id = registry.register(Arc::new(is_int), Arc::new(|_: &NodeRef| None));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_untouched_module_is_shared() {
        let mut registry = TransformRegistry::new();
        registry.register(Arc::new(|_: &NodeRef| true), Arc::new(|_: &NodeRef| None));
        let original = module("x = 1\n");
        assert!(Arc::ptr_eq(&registry.visit(&original), &original));
    }
}
