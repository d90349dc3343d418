//! Attribute access on modules, classes and instances

use super::calls::infer_call_result;
use super::classes::{class_lookup, function_kind, instance_attr_defs, is_property_modifier, metaclass, FunctionKind};
use super::names::infer_definitions;
use super::{empty, fail, infer_node, once, CallContext, InferIter, InferenceContext, Value};
use crate::error::InferenceError;
use crate::manager::AstManager;
use crate::tree::{Constant, NodeRef};
use std::sync::Arc;

pub(crate) fn infer_attribute(mgr: &Arc<AstManager>, owner: &NodeRef, attr: &str, ctx: InferenceContext) -> InferIter {
    let mgr = Arc::clone(mgr);
    let attr = attr.to_string();
    let owners = infer_node(&mgr, owner, ctx.with_lookup_name(None));
    Box::new(owners.flat_map(move |owner| match owner {
        Ok(Value::Uninferable) => once(Value::Uninferable),
        Ok(owner) => igetattr(&mgr, &owner, &attr, ctx.clone()),
        Err(err) => fail(err),
    }))
}

/// How a class attribute was reached, which decides how functions bind
enum Through {
    Class(NodeRef),
    Instance { class: NodeRef, value: Value },
}

impl Through {
    fn class(&self) -> &NodeRef {
        match self {
            Through::Class(class) | Through::Instance { class, .. } => class,
        }
    }
}

/// Values of attribute `name` on `owner`
pub fn igetattr(mgr: &Arc<AstManager>, owner: &Value, name: &str, ctx: InferenceContext) -> InferIter {
    let not_found = || {
        fail(InferenceError::AttributeNotFound {
            owner: owner.to_string(),
            attr: name.to_string(),
        })
    };
    match owner {
        Value::Uninferable | Value::Proxy(_) | Value::Unknown(_) => once(Value::Uninferable),
        Value::Module(root) => module_getattr(mgr, root, name, ctx).unwrap_or_else(not_found),
        Value::Class(class) => match name {
            "__name__" => once(Value::Const(Constant::Str(class.name().unwrap_or_default().to_string()))),
            "__class__" => once(
                metaclass(mgr, class)
                    .or_else(|| mgr.builtin_class("type"))
                    .map(Value::Class)
                    .unwrap_or(Value::Uninferable),
            ),
            _ => class_getattr(mgr, &Through::Class(class.clone()), name, ctx).unwrap_or_else(not_found),
        },
        Value::Instance(class) => {
            if name == "__class__" {
                return once(Value::Class(class.clone()));
            }
            let defs = instance_attr_defs(mgr, class, name);
            if !defs.is_empty() {
                return infer_definitions(mgr, defs, name, ctx.with_bound_node(owner.clone()));
            }
            let through = Through::Instance {
                class: class.clone(),
                value: owner.clone(),
            };
            class_getattr(mgr, &through, name, ctx)
                .or_else(|| {
                    // dynamic attributes we cannot see
                    (!class_lookup(mgr, class, "__getattr__").is_empty()).then(|| once(Value::Uninferable))
                })
                .unwrap_or_else(not_found)
        }
        Value::Const(_) | Value::Sequence { .. } | Value::Dict { .. } => {
            let Some(class) = owner.builtin_type_name().and_then(|type_name| mgr.builtin_class(type_name)) else {
                return once(Value::Uninferable);
            };
            let through = Through::Instance {
                class,
                value: owner.clone(),
            };
            class_getattr(mgr, &through, name, ctx).unwrap_or_else(not_found)
        }
        Value::Function(function) => function_getattr(mgr, function, name, ctx).unwrap_or_else(not_found),
        Value::BoundMethod { function, bound } => match name {
            "__self__" => once((**bound).clone()),
            "__func__" => once(Value::Function(function.clone())),
            _ => function_getattr(mgr, function, name, ctx).unwrap_or_else(not_found),
        },
    }
}

fn module_getattr(mgr: &Arc<AstManager>, root: &NodeRef, name: &str, ctx: InferenceContext) -> Option<InferIter> {
    let defs = root.local_defs(name);
    if !defs.is_empty() {
        return Some(infer_definitions(mgr, defs, name, ctx));
    }
    let module = root.module();
    match name {
        "__name__" => return Some(once(Value::Const(Constant::Str(module.name().to_string())))),
        "__file__" => {
            return module
                .file()
                .map(|path| once(Value::Const(Constant::Str(path.display().to_string()))))
        }
        _ => {}
    }
    if !module.is_package() {
        return None;
    }
    let submodule = format!("{}.{}", module.name(), name);
    match mgr.import_module(&submodule, module.file()) {
        Ok(found) => Some(once(Value::Module(NodeRef::root(&found)))),
        Err(_) => None,
    }
}

fn class_getattr(mgr: &Arc<AstManager>, through: &Through, name: &str, ctx: InferenceContext) -> Option<InferIter> {
    let class = through.class();
    let mut defs = class_lookup(mgr, class, name);
    let mut through_meta = None;
    if defs.is_empty() {
        if let Through::Class(_) = through {
            let meta = metaclass(mgr, class)?;
            defs = class_lookup(mgr, &meta, name);
            through_meta = Some(Through::Instance {
                class: meta,
                value: Value::Class(class.clone()),
            });
        }
    }
    if defs.is_empty() {
        return None;
    }

    let (bind_through, bound) = match (through_meta, through) {
        (Some(meta), _) => (meta, Value::Class(class.clone())),
        (None, Through::Class(class)) => (Through::Class(class.clone()), Value::Class(class.clone())),
        (None, Through::Instance { class, value }) => (
            Through::Instance {
                class: class.clone(),
                value: value.clone(),
            },
            value.clone(),
        ),
    };
    let mgr = Arc::clone(mgr);
    let ctx = ctx.with_bound_node(bound);
    let values = infer_definitions(&mgr, defs, name, ctx.clone());
    Some(Box::new(values.flat_map(move |value| match value {
        Ok(value) => bind(&mgr, value, &bind_through, &ctx),
        Err(err) => fail(err),
    })))
}

/// Turn a function found on a class into what the access actually yields
fn bind(mgr: &Arc<AstManager>, found: Value, through: &Through, ctx: &InferenceContext) -> InferIter {
    let Value::Function(function) = &found else {
        return once(found);
    };
    match (function_kind(function), through) {
        (FunctionKind::ClassMethod, _) => once(Value::BoundMethod {
            function: function.clone(),
            bound: Box::new(Value::Class(through.class().clone())),
        }),
        (FunctionKind::Method, Through::Instance { value, .. }) => once(Value::BoundMethod {
            function: function.clone(),
            bound: Box::new(value.clone()),
        }),
        (FunctionKind::Property, Through::Instance { value, .. }) => {
            if is_property_modifier(function) {
                return empty();
            }
            let getter = Value::BoundMethod {
                function: function.clone(),
                bound: Box::new(value.clone()),
            };
            infer_call_result(mgr, &getter, &CallContext::default(), ctx.with_bound_node(value.clone()))
        }
        _ => once(found),
    }
}

fn function_getattr(mgr: &Arc<AstManager>, function: &NodeRef, name: &str, ctx: InferenceContext) -> Option<InferIter> {
    let defs = function.instance_attr_defs(name);
    if !defs.is_empty() {
        return Some(infer_definitions(mgr, defs, name, ctx));
    }
    match name {
        "__name__" | "__qualname__" => Some(once(Value::Const(Constant::Str(
            function.name().unwrap_or("<lambda>").to_string(),
        )))),
        "__module__" => Some(once(Value::Const(Constant::Str(function.module().name().to_string())))),
        "__doc__" | "__defaults__" => Some(once(Value::Uninferable)),
        _ => None,
    }
}
