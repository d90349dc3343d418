//! Call expressions and call results

use super::attributes::igetattr;
use super::classes::class_lookup;
use super::{fail, infer_node, once, CallContext, InferIter, InferenceContext, OrElse, Value};
use crate::error::InferenceError;
use crate::manager::AstManager;
use crate::tree::{Constant, NodeId, NodeKind, NodeRef};
use std::sync::Arc;
use tracing::trace;

pub(crate) fn infer_call(
    mgr: &Arc<AstManager>,
    node: &NodeRef,
    func: NodeId,
    args: &[NodeId],
    keywords: &[NodeId],
    ctx: InferenceContext,
) -> InferIter {
    let args = args.iter().map(|id| node.at(*id)).collect();
    // `**mapping` keywords carry no name and are not matched to parameters
    let keywords = keywords
        .iter()
        .filter_map(|id| match node.at(*id).kind() {
            NodeKind::Keyword { arg: Some(arg), value } => Some((arg.clone(), node.at(*value))),
            _ => None,
        })
        .collect();
    let call = CallContext::new(args, keywords);

    let callees = OrElse::new(
        infer_node(mgr, &node.at(func), ctx.clone()),
        InferenceError::UninferableCallee {
            location: format!("{}:{}", node.module().name(), node.location()),
        },
    );
    let mgr = Arc::clone(mgr);
    Box::new(callees.flat_map(move |callee| match callee {
        Ok(Value::Uninferable) => once(Value::Uninferable),
        Ok(callee) => infer_call_result(&mgr, &callee, &call, ctx.clone()),
        Err(err) => fail(err),
    }))
}

/// Values produced by calling `callee` with `call`
pub fn infer_call_result(mgr: &Arc<AstManager>, callee: &Value, call: &CallContext, ctx: InferenceContext) -> InferIter {
    if let Some(value) = mgr.call_tips().infer(mgr, callee, call, &ctx) {
        trace!("Call tip answered call of {}", callee);
        return once(value);
    }
    match callee {
        Value::Class(class) => once(Value::Instance(class.clone())),
        Value::Function(function) | Value::BoundMethod { function, .. } => {
            let mut call = call.clone();
            call.callee = Some(callee.clone());
            let mut callee_ctx = ctx.with_lookup_name(None);
            for arg in call.args.iter().chain(call.keywords.iter().map(|(_, value)| value)) {
                callee_ctx.set_extra_context(arg, ctx.clone());
            }
            callee_ctx.call_context = Some(Arc::new(call));
            if let Value::BoundMethod { bound, .. } = callee {
                callee_ctx.bound_node = Some((**bound).clone());
            }
            function_result(mgr, function, callee_ctx)
        }
        Value::Instance(class) => {
            if class_lookup(mgr, class, "__call__").is_empty() {
                return fail(InferenceError::NotCallable {
                    value: callee.to_string(),
                });
            }
            let mgr = Arc::clone(mgr);
            let call = call.clone();
            let methods = igetattr(&mgr, callee, "__call__", ctx.clone());
            Box::new(methods.flat_map(move |method| match method {
                Ok(Value::Uninferable) => once(Value::Uninferable),
                Ok(method) => infer_call_result(&mgr, &method, &call, ctx.clone()),
                Err(err) => fail(err),
            }))
        }
        Value::Uninferable | Value::Proxy(_) | Value::Unknown(_) => once(Value::Uninferable),
        Value::Const(_) | Value::Sequence { .. } | Value::Dict { .. } | Value::Module(_) => {
            fail(InferenceError::NotCallable {
                value: callee.to_string(),
            })
        }
    }
}

/// Values returned by the body of `function`
fn function_result(mgr: &Arc<AstManager>, function: &NodeRef, ctx: InferenceContext) -> InferIter {
    let body = match function.kind() {
        NodeKind::Lambda { body, .. } => return infer_node(mgr, &function.at(*body), ctx),
        NodeKind::FunctionDef {
            introspected: true, ..
        }
        | NodeKind::FunctionDef { is_generator: true, .. }
        | NodeKind::FunctionDef { is_async: true, .. } => return once(Value::Uninferable),
        NodeKind::FunctionDef { body, .. } => body,
        _ => return once(Value::Uninferable),
    };

    let returns: Vec<NodeRef> = function
        .descendants_in_scope()
        .into_iter()
        .filter(|node| matches!(node.kind(), NodeKind::Return { .. }))
        .collect();
    if returns.is_empty() {
        if is_stub_body(function, body) {
            return once(Value::Uninferable);
        }
        return once(Value::Const(Constant::None));
    }

    let mgr = Arc::clone(mgr);
    Box::new(returns.into_iter().flat_map(move |ret| match ret.kind() {
        NodeKind::Return { value: Some(value) } => infer_node(&mgr, &ret.at(*value), ctx.clone()),
        _ => once(Value::Const(Constant::None)),
    }))
}

/// A body made only of a docstring and `...`, as written in stubs
fn is_stub_body(function: &NodeRef, body: &[NodeId]) -> bool {
    let mut saw_ellipsis = false;
    for stmt in body {
        let stmt = function.at(*stmt);
        let NodeKind::Expr { value } = stmt.kind() else {
            return false;
        };
        match function.at(*value).kind() {
            NodeKind::Const(Constant::Ellipsis) => saw_ellipsis = true,
            NodeKind::Const(Constant::Str(_)) => {}
            _ => return false,
        }
    }
    saw_ellipsis
}
