//! Inference tips for builtin functions
//!
//! Each tip answers a call of one builtin from the type relations in
//! [`crate::relations`] instead of the (opaque) stub body. Tips are tried in registration
//! order; a tip returning `None` passes the call on to the regular rules.

use super::classes::class_lookup;
use super::{infer_node, single_value, CallContext, InferenceContext, Value};
use crate::manager::AstManager;
use crate::relations::{is_subtype, object_len, type_of};
use crate::tree::{Constant, NodeRef, SequenceKind};
use std::sync::Arc;

/// Answers calls of one builtin function
pub trait CallTip: Send + Sync {
    /// Name of the builtin this tip handles (e.g., "len")
    fn function_name(&self) -> &'static str;

    /// Check if this tip applies to the given callee
    fn applies_to(&self, callee: &Value) -> bool {
        match callee {
            Value::Function(function) => {
                function.module().name() == "builtins" && function.name() == Some(self.function_name())
            }
            _ => false,
        }
    }

    /// Compute the call result, `None` to fall back to regular inference
    fn infer(&self, mgr: &Arc<AstManager>, call: &CallContext, ctx: &InferenceContext) -> Option<Value>;
}

/// Registry of all call tips
#[derive(Clone)]
pub struct CallTipRegistry {
    tips: Vec<Arc<dyn CallTip>>,
}

impl CallTipRegistry {
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(LenTip));
        registry.register(Arc::new(TypeTip));
        registry.register(Arc::new(IsInstanceTip));
        registry.register(Arc::new(IsSubclassTip));
        registry.register(Arc::new(CallableTip));

        registry
    }

    pub fn empty() -> Self {
        Self { tips: Vec::new() }
    }

    pub fn register(&mut self, tip: Arc<dyn CallTip>) {
        self.tips.push(tip);
    }

    pub fn len(&self) -> usize {
        self.tips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    /// Find and apply the first tip that answers this call
    pub fn infer(
        &self,
        mgr: &Arc<AstManager>,
        callee: &Value,
        call: &CallContext,
        ctx: &InferenceContext,
    ) -> Option<Value> {
        self.tips
            .iter()
            .filter(|tip| tip.applies_to(callee))
            .find_map(|tip| tip.infer(mgr, call, ctx))
    }
}

impl Default for CallTipRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Context in which an argument of the call is inferred
fn arg_context(call_ctx: &InferenceContext) -> InferenceContext {
    call_ctx.with_lookup_name(None)
}

fn single_arg(call: &CallContext) -> Option<&NodeRef> {
    match (call.args.as_slice(), call.keywords.is_empty()) {
        ([arg], true) => Some(arg),
        _ => None,
    }
}

/// Classes named by the second argument of `isinstance` / `issubclass`
fn class_targets(mgr: &Arc<AstManager>, node: &NodeRef, ctx: &InferenceContext) -> Option<Vec<NodeRef>> {
    match single_value(infer_node(mgr, node, arg_context(ctx)))? {
        Value::Class(class) => Some(vec![class]),
        Value::Sequence {
            kind: SequenceKind::Tuple,
            elts,
        } => elts
            .iter()
            .map(|elt| match single_value(infer_node(mgr, elt, arg_context(ctx))) {
                Some(Value::Class(class)) => Some(class),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn any_subtype(mgr: &Arc<AstManager>, class: &NodeRef, targets: &[NodeRef]) -> Option<Value> {
    let mut result = false;
    for target in targets {
        result |= is_subtype(mgr, class, target).ok()?;
    }
    Some(Value::Const(Constant::Bool(result)))
}

/// `len(obj)`
pub struct LenTip;

impl CallTip for LenTip {
    fn function_name(&self) -> &'static str {
        "len"
    }

    fn infer(&self, mgr: &Arc<AstManager>, call: &CallContext, ctx: &InferenceContext) -> Option<Value> {
        let arg = single_arg(call)?;
        let len = object_len(mgr, arg, Some(arg_context(ctx))).ok()?;
        Some(Value::Const(Constant::Int(i64::try_from(len).ok()?)))
    }
}

/// One-argument `type(obj)`
pub struct TypeTip;

impl CallTip for TypeTip {
    fn function_name(&self) -> &'static str {
        "type"
    }

    fn applies_to(&self, callee: &Value) -> bool {
        matches!(callee, Value::Class(class) if class.module().name() == "builtins" && class.name() == Some("type"))
    }

    fn infer(&self, mgr: &Arc<AstManager>, call: &CallContext, ctx: &InferenceContext) -> Option<Value> {
        let arg = single_arg(call)?;
        match type_of(mgr, arg, Some(arg_context(ctx))) {
            Value::Uninferable => None,
            ty => Some(ty),
        }
    }
}

/// `isinstance(obj, class_or_tuple)`
pub struct IsInstanceTip;

impl CallTip for IsInstanceTip {
    fn function_name(&self) -> &'static str {
        "isinstance"
    }

    fn infer(&self, mgr: &Arc<AstManager>, call: &CallContext, ctx: &InferenceContext) -> Option<Value> {
        let [obj, classes] = call.args.as_slice() else {
            return None;
        };
        let Value::Class(obj_type) = type_of(mgr, obj, Some(arg_context(ctx))) else {
            return None;
        };
        let targets = class_targets(mgr, classes, ctx)?;
        any_subtype(mgr, &obj_type, &targets)
    }
}

/// `issubclass(cls, class_or_tuple)`
pub struct IsSubclassTip;

impl CallTip for IsSubclassTip {
    fn function_name(&self) -> &'static str {
        "issubclass"
    }

    fn infer(&self, mgr: &Arc<AstManager>, call: &CallContext, ctx: &InferenceContext) -> Option<Value> {
        let [cls, classes] = call.args.as_slice() else {
            return None;
        };
        let Some(Value::Class(cls)) = single_value(infer_node(mgr, cls, arg_context(ctx))) else {
            return None;
        };
        let targets = class_targets(mgr, classes, ctx)?;
        any_subtype(mgr, &cls, &targets)
    }
}

/// `callable(obj)`
pub struct CallableTip;

impl CallTip for CallableTip {
    fn function_name(&self) -> &'static str {
        "callable"
    }

    fn infer(&self, mgr: &Arc<AstManager>, call: &CallContext, ctx: &InferenceContext) -> Option<Value> {
        let arg = single_arg(call)?;
        let callable = match single_value(infer_node(mgr, arg, arg_context(ctx)))? {
            Value::Function(_) | Value::BoundMethod { .. } | Value::Class(_) | Value::Proxy(_) => true,
            Value::Instance(class) => !class_lookup(mgr, &class, "__call__").is_empty(),
            Value::Const(_) | Value::Sequence { .. } | Value::Dict { .. } | Value::Module(_) => false,
            Value::Uninferable | Value::Unknown(_) => return None,
        };
        Some(Value::Const(Constant::Bool(callable)))
    }
}
