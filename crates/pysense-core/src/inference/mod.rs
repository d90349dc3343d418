//! Inference engine
//!
//! [`infer`] lazily produces the possible values of a node. Every step is
//! wrapped so that it (a) refuses to re-enter a `(node, lookup name)` pair
//! already on the current path, which is what makes self-referential
//! definitions terminate, and (b) draws one unit from the session budget per
//! value yielded, stopping the whole session once the cap is reached.
//!
//! A step whose values were drained without error is remembered for the rest
//! of the session and replayed when the same node is asked for again under
//! the same lookup name, call and bound node.

mod attributes;
mod calls;
pub(crate) mod classes;
pub mod context;
mod imports;
mod names;
mod operators;
pub mod tips;
pub mod values;

pub use attributes::igetattr;
pub use calls::infer_call_result;
pub use classes::{ancestors, class_lookup, function_kind, metaclass, mro, FunctionKind};
pub use context::{CallContext, InferenceContext, MAX_INFERENCE_DEPTH};
pub use imports::absolute_modname;
pub use tips::{CallTip, CallTipRegistry};
pub use values::{ProxyClass, Value};

use crate::error::InferenceError;
use crate::manager::AstManager;
use crate::tree::{ComprehensionKind, NodeKind, NodeRef};
use context::{Budget, ResultSlot};
use std::sync::Arc;
use tracing::trace;

pub type InferResult = Result<Value, InferenceError>;

/// Lazy stream of inferred values
pub type InferIter = Box<dyn Iterator<Item = InferResult>>;

pub(crate) fn empty() -> InferIter {
    Box::new(std::iter::empty())
}

pub(crate) fn once(value: Value) -> InferIter {
    Box::new(std::iter::once(Ok(value)))
}

pub(crate) fn fail(err: InferenceError) -> InferIter {
    Box::new(std::iter::once(Err(err)))
}

/// Defer building an iterator until the first value is requested
pub(crate) fn lazy<F>(build: F) -> InferIter
where
    F: FnOnce() -> InferIter + 'static,
{
    Box::new(std::iter::once_with(build).flatten())
}

/// Infer `node`, starting a fresh session when no context is given
pub fn infer(mgr: &Arc<AstManager>, node: &NodeRef, ctx: Option<InferenceContext>) -> InferIter {
    let ctx = ctx.unwrap_or_else(|| mgr.new_context());
    infer_node(mgr, node, ctx)
}

pub(crate) fn infer_node(mgr: &Arc<AstManager>, node: &NodeRef, mut ctx: InferenceContext) -> InferIter {
    if !ctx.descend() {
        trace!("Inference stops at depth {} before {:?}", ctx.depth(), node);
        return empty();
    }
    let budget = ctx.budget();
    let slot = ctx.result_slot(node);
    if let Some(values) = slot.lookup() {
        trace!("Replaying {} cached values for {:?}", values.len(), node);
        let values: InferIter = Box::new((0..values.len()).map(move |i| Ok(values[i].clone())));
        return Box::new(Budgeted { values, budget, done: false });
    }
    if is_guarded(node.kind()) && !ctx.enter(node) {
        trace!("Inference cycle at {:?} (lookup {:?})", node, ctx.lookup_name);
        return empty();
    }
    let values = Box::new(Recorded {
        values: dispatch(mgr, node, ctx),
        seen: Vec::new(),
        failed: false,
        slot: Some(slot),
    });
    Box::new(Budgeted { values, budget, done: false })
}

/// Stores the values of a stream that runs to its end without an error
struct Recorded {
    values: InferIter,
    seen: Vec<Value>,
    failed: bool,
    slot: Option<ResultSlot>,
}

impl Iterator for Recorded {
    type Item = InferResult;

    fn next(&mut self) -> Option<InferResult> {
        match self.values.next() {
            Some(Ok(value)) => {
                if self.slot.is_some() {
                    self.seen.push(value.clone());
                }
                Some(Ok(value))
            }
            Some(Err(err)) => {
                self.failed = true;
                Some(Err(err))
            }
            None => {
                if let Some(slot) = self.slot.take() {
                    if !self.failed {
                        slot.store(std::mem::take(&mut self.seen));
                    }
                }
                None
            }
        }
    }
}

/// Node kinds whose inference can recurse into other nodes
fn is_guarded(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Name { .. }
            | NodeKind::AssignName { .. }
            | NodeKind::AssignAttr { .. }
            | NodeKind::Attribute { .. }
            | NodeKind::Call { .. }
            | NodeKind::BinOp { .. }
            | NodeKind::AugAssign { .. }
            | NodeKind::UnaryOp { .. }
            | NodeKind::BoolOp { .. }
            | NodeKind::Compare { .. }
            | NodeKind::Subscript { .. }
            | NodeKind::IfExp { .. }
            | NodeKind::NamedExpr { .. }
            | NodeKind::Import { .. }
            | NodeKind::ImportFrom { .. }
    )
}

fn dispatch(mgr: &Arc<AstManager>, node: &NodeRef, ctx: InferenceContext) -> InferIter {
    match node.kind() {
        NodeKind::Module => once(Value::Module(node.clone())),
        NodeKind::ClassDef { .. } => once(Value::Class(node.clone())),
        NodeKind::FunctionDef { .. } | NodeKind::Lambda { .. } => once(Value::Function(node.clone())),
        NodeKind::Const(constant) => once(Value::Const(constant.clone())),
        NodeKind::Sequence { kind, elts } => once(Value::Sequence {
            kind: *kind,
            elts: elts.iter().map(|id| node.at(*id)).collect(),
        }),
        NodeKind::Dict { keys, values } => once(Value::Dict {
            items: keys
                .iter()
                .zip(values)
                .map(|(k, v)| (node.at(*k), node.at(*v)))
                .filter(|(k, _)| !matches!(k.kind(), NodeKind::DictUnpack))
                .collect(),
        }),
        NodeKind::Unknown { .. } => once(Value::Unknown(node.clone())),
        NodeKind::Name { id } => names::infer_name(mgr, node, id, ctx),
        NodeKind::AssignName { .. } | NodeKind::AssignAttr { .. } => names::infer_assigned(mgr, node, ctx),
        NodeKind::Attribute { value, attr } => attributes::infer_attribute(mgr, &node.at(*value), attr, ctx),
        NodeKind::Call { func, args, keywords } => calls::infer_call(mgr, node, *func, args, keywords, ctx),
        NodeKind::BinOp { .. } => operators::infer_binop(mgr, node, ctx),
        NodeKind::AugAssign { .. } => operators::infer_augassign(mgr, node, ctx),
        NodeKind::UnaryOp { .. } => operators::infer_unaryop(mgr, node, ctx),
        NodeKind::BoolOp { values, .. } => operators::infer_boolop(mgr, node, values, ctx),
        NodeKind::Compare { .. } => operators::infer_compare(mgr, node, ctx),
        NodeKind::Subscript { .. } => operators::infer_subscript(mgr, node, ctx),
        NodeKind::IfExp { test, body, orelse } => operators::infer_ifexp(mgr, node, *test, *body, *orelse, ctx),
        NodeKind::NamedExpr { value, .. } | NodeKind::Expr { value } | NodeKind::Keyword { value, .. } => {
            infer_node(mgr, &node.at(*value), ctx)
        }
        NodeKind::Import { .. } | NodeKind::ImportFrom { .. } => imports::infer_import(mgr, node, ctx),
        NodeKind::Comprehension { kind } => {
            let class = match kind {
                ComprehensionKind::List => "list",
                ComprehensionKind::Set => "set",
                ComprehensionKind::Dict => "dict",
                ComprehensionKind::Generator => return once(Value::Uninferable),
            };
            once(builtin_instance(mgr, class))
        }
        NodeKind::JoinedStr => once(builtin_instance(mgr, "str")),
        NodeKind::Starred { .. } | NodeKind::Slice { .. } | NodeKind::Opaque { .. } | NodeKind::DictUnpack => {
            once(Value::Uninferable)
        }
        other => fail(InferenceError::NotInferable { kind: other.label() }),
    }
}

/// Instance of a builtin class, or `Uninferable` without builtins
pub(crate) fn builtin_instance(mgr: &Arc<AstManager>, class: &str) -> Value {
    mgr.builtin_class(class)
        .map(Value::Instance)
        .unwrap_or(Value::Uninferable)
}

/// Counts each yielded value against the session budget
struct Budgeted {
    values: InferIter,
    budget: Budget,
    done: bool,
}

impl Iterator for Budgeted {
    type Item = InferResult;

    fn next(&mut self) -> Option<InferResult> {
        if self.done {
            return None;
        }
        if self.budget.exhausted() {
            trace!("Inference budget exhausted, truncating results");
            self.done = true;
            return None;
        }
        match self.values.next() {
            Some(Ok(value)) => {
                if self.budget.consume() {
                    Some(Ok(value))
                } else {
                    self.done = true;
                    None
                }
            }
            Some(Err(err)) => Some(Err(err)),
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Yields `err` when the wrapped stream turns out to be empty
pub(crate) struct OrElse {
    values: InferIter,
    err: Option<InferenceError>,
}

impl OrElse {
    pub fn new(values: InferIter, err: InferenceError) -> Self {
        Self { values, err: Some(err) }
    }
}

impl Iterator for OrElse {
    type Item = InferResult;

    fn next(&mut self) -> Option<InferResult> {
        match self.values.next() {
            Some(item) => {
                self.err = None;
                Some(item)
            }
            None => self.err.take().map(Err),
        }
    }
}

/// First value when inference yields exactly one, else `None`
pub(crate) fn single_value(mut values: InferIter) -> Option<Value> {
    let first = values.next()?.ok()?;
    match values.next() {
        None => Some(first),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_else_on_empty() {
        let mut iter = OrElse::new(
            empty(),
            InferenceError::UninferableCallee {
                location: "m:1:0".to_string(),
            },
        );
        assert!(matches!(iter.next(), Some(Err(InferenceError::UninferableCallee { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_or_else_passes_values_through() {
        let mut iter = OrElse::new(once(Value::Uninferable), InferenceError::NotInferable { kind: "x" });
        assert!(matches!(iter.next(), Some(Ok(Value::Uninferable))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_lazy_defers_construction() {
        let built = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&built);
        let mut iter = lazy(move || {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            once(Value::Uninferable)
        });
        assert!(!built.load(std::sync::atomic::Ordering::SeqCst));
        assert!(iter.next().is_some());
        assert!(built.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_budgeted_truncates() {
        let ctx = InferenceContext::with_max_inferred(2);
        let values: InferIter = Box::new((0..5).map(|i| Ok(Value::Const(crate::tree::Constant::Int(i)))));
        let iter = Budgeted {
            values,
            budget: ctx.budget(),
            done: false,
        };
        assert_eq!(iter.count(), 2);
        assert_eq!(ctx.nodes_inferred(), 2);
    }

    #[test]
    fn test_single_value() {
        assert_eq!(single_value(once(Value::Uninferable)), Some(Value::Uninferable));
        assert_eq!(single_value(empty()), None);
        let two: InferIter = Box::new(vec![Ok(Value::Uninferable), Ok(Value::Uninferable)].into_iter());
        assert_eq!(single_value(two), None);
        assert_eq!(single_value(fail(InferenceError::NotInferable { kind: "x" })), None);
    }
}
