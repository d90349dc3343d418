//! Type relations built on inference: type of a node, subtype checks,
//! `len()` of a node and single-value inference.
//!
//! Everything here degrades to [`Value::Uninferable`] or `None` instead of
//! failing, except [`is_subtype`] / [`is_supertype`], which report
//! [`NotDecidable`] rather than answering `false`, and [`object_len`].

use crate::error::{InferenceError, LenError, NotDecidable};
use crate::inference::classes::{explicit_bases, mro};
use crate::inference::{igetattr, infer, infer_call_result, metaclass, CallContext, InferenceContext, ProxyClass, Value};
use crate::manager::AstManager;
use crate::tree::{Constant, NodeKind, NodeRef};
use std::sync::Arc;
use tracing::trace;

/// The single value `node` infers to, or `None`
pub fn safe_infer(mgr: &Arc<AstManager>, node: &NodeRef, ctx: Option<InferenceContext>) -> Option<Value> {
    let mut values = infer(mgr, node, ctx);
    let first = values.next()?.ok()?;
    match values.next() {
        None => Some(first),
        Some(_) => None,
    }
}

/// Runtime type of the value `node` evaluates to
pub fn type_of(mgr: &Arc<AstManager>, node: &NodeRef, ctx: Option<InferenceContext>) -> Value {
    let mut types: Vec<Value> = Vec::new();
    for value in infer(mgr, node, ctx) {
        let ty = match value.and_then(|value| value_type(mgr, &value)) {
            Ok(ty) => ty,
            Err(err) => {
                trace!("type_of({:?}) failed: {}", node, err);
                return Value::Uninferable;
            }
        };
        if !types.contains(&ty) {
            types.push(ty);
        }
    }
    match types.len() {
        1 => types.swap_remove(0),
        _ => Value::Uninferable,
    }
}

/// Type of one inferred value
pub fn value_type(mgr: &Arc<AstManager>, value: &Value) -> Result<Value, InferenceError> {
    let builtin = |name: &str| mgr.builtin_class(name).map(Value::Class).unwrap_or(Value::Uninferable);
    Ok(match value {
        Value::Uninferable => Value::Uninferable,
        Value::Class(class) => match metaclass(mgr, class) {
            Some(meta) => Value::Class(meta),
            None => mgr
                .builtin_class("type")
                .map(Value::Class)
                .unwrap_or(Value::Proxy(ProxyClass::Type)),
        },
        Value::Function(function) if function.module().name() == "builtins" => {
            Value::Proxy(ProxyClass::BuiltinFunction)
        }
        Value::Function(_) => Value::Proxy(ProxyClass::Function),
        Value::BoundMethod { .. } => Value::Proxy(ProxyClass::Method),
        Value::Module(_) => Value::Proxy(ProxyClass::Module),
        Value::Proxy(proxy) => Value::Proxy(*proxy),
        Value::Instance(class) => Value::Class(class.clone()),
        Value::Const(_) | Value::Sequence { .. } | Value::Dict { .. } => {
            value.builtin_type_name().map(builtin).unwrap_or(Value::Uninferable)
        }
        Value::Unknown(node) => {
            return Err(InferenceError::UnknownNode {
                name: node.name().unwrap_or("?").to_string(),
            })
        }
    })
}

/// Whether every base of `class` is a known class, all the way up.
///
/// Memoized on the class scope: base lists do not change once built.
pub fn has_known_bases(mgr: &Arc<AstManager>, class: &NodeRef) -> bool {
    known_bases(mgr, class, &mut Vec::new())
}

fn known_bases(mgr: &Arc<AstManager>, class: &NodeRef, visiting: &mut Vec<NodeRef>) -> bool {
    if let Some(known) = class.scope_tables().and_then(|scope| scope.known_bases().get()) {
        return *known;
    }
    if visiting.contains(class) {
        return false;
    }
    visiting.push(class.clone());
    let known = explicit_bases(mgr, class).iter().all(|base| match base {
        Some(base) => known_bases(mgr, base, visiting),
        None => false,
    });
    visiting.pop();
    if let Some(scope) = class.scope_tables() {
        let _ = scope.known_bases().set(known);
    }
    known
}

fn decidable_class(mgr: &Arc<AstManager>, class: &NodeRef) -> Result<(), NotDecidable> {
    let name = || class.name().unwrap_or("?").to_string();
    if !matches!(class.kind(), NodeKind::ClassDef { .. }) {
        return Err(NotDecidable::NotAClass(name()));
    }
    if !has_known_bases(mgr, class) {
        return Err(NotDecidable::UnknownBases(name()));
    }
    Ok(())
}

/// Whether `sub` is `sup` or derives from it
pub fn is_subtype(mgr: &Arc<AstManager>, sub: &NodeRef, sup: &NodeRef) -> Result<bool, NotDecidable> {
    decidable_class(mgr, sub)?;
    decidable_class(mgr, sup)?;
    Ok(mro(mgr, sub)?.contains(sup))
}

pub fn is_supertype(mgr: &Arc<AstManager>, sup: &NodeRef, sub: &NodeRef) -> Result<bool, NotDecidable> {
    is_subtype(mgr, sub, sup)
}

/// What `len(node)` evaluates to.
///
/// A `__len__` known only to return some `int` counts as zero.
pub fn object_len(mgr: &Arc<AstManager>, node: &NodeRef, ctx: Option<InferenceContext>) -> Result<usize, LenError> {
    let ctx = ctx.unwrap_or_else(|| mgr.new_context());
    let no_value = || InferenceError::NoValue { node: format!("{:?}", node) };
    let value = {
        let mut values = infer(mgr, node, Some(ctx.clone()));
        let first = values.next().ok_or_else(no_value)??;
        if values.next().is_some() {
            return Err(no_value().into());
        }
        first
    };

    // `len(self)` inside the class's own `__len__`
    let frame = node.frame();
    if let (NodeKind::FunctionDef { name, .. }, Value::Instance(class)) = (frame.kind(), &value) {
        if name == "__len__" && frame.defining_class().as_ref() == Some(class) {
            return Err(LenError::RecursionHazard {
                location: format!("{}:{}", node.module().name(), node.location()),
            });
        }
    }

    match &value {
        Value::Const(Constant::Str(s)) => return Ok(s.chars().count()),
        Value::Const(Constant::Bytes(b)) => return Ok(b.len()),
        Value::Sequence { elts, .. } => return Ok(elts.len()),
        Value::Dict { items } => return Ok(items.len()),
        _ => {}
    }

    let type_name = value.type_name();
    let no_len = || LenError::NoLen {
        type_name: type_name.clone(),
    };
    if !matches!(value_type(mgr, &value)?, Value::Class(_)) {
        return Err(no_len());
    }
    let method = igetattr(mgr, &value, "__len__", ctx.clone())
        .find_map(Result::ok)
        .ok_or_else(no_len)?;
    let result = infer_call_result(mgr, &method, &CallContext::default(), ctx)
        .next()
        .ok_or_else(no_value)??;
    match result {
        Value::Const(Constant::Int(n)) => usize::try_from(n).map_err(|_| LenError::Negative { value: n }),
        Value::Const(Constant::Bool(b)) => Ok(usize::from(b)),
        Value::Instance(class) if is_int_class(mgr, &class) => Ok(0),
        other => Err(LenError::NotAnInteger {
            type_name: other.type_name(),
        }),
    }
}

fn is_int_class(mgr: &Arc<AstManager>, class: &NodeRef) -> bool {
    let Some(int) = mgr.builtin_class("int") else {
        return false;
    };
    match mro(mgr, class) {
        Ok(order) => order.contains(&int),
        Err(_) => *class == int,
    }
}
