//! Names, assignment targets and parameters

use super::classes::{function_kind, FunctionKind};
use super::{builtin_instance, fail, infer_node, lazy, once, operators, InferIter, InferenceContext, Value};
use crate::error::InferenceError;
use crate::manager::AstManager;
use crate::tree::{Constant, NodeId, NodeKind, NodeRef, SequenceKind};
use std::sync::Arc;

/// Definitions visible for `name` at `node`, falling back to builtins
pub(crate) fn lookup(mgr: &Arc<AstManager>, node: &NodeRef, name: &str) -> Option<Vec<NodeRef>> {
    if let Some((_, defs)) = node.scope_lookup(name) {
        return Some(defs);
    }
    let builtins = mgr.builtins_module()?;
    let defs = NodeRef::root(&builtins).local_defs(name);
    (!defs.is_empty()).then_some(defs)
}

pub(crate) fn infer_name(mgr: &Arc<AstManager>, node: &NodeRef, name: &str, ctx: InferenceContext) -> InferIter {
    match lookup(mgr, node, name) {
        Some(defs) => infer_definitions(mgr, defs, name, ctx),
        None if name == "__name__" => once(Value::Const(Constant::Str(node.module().name().to_string()))),
        None => fail(InferenceError::NameNotFound {
            name: name.to_string(),
            location: format!("{}:{}", node.module().name(), node.location()),
        }),
    }
}

/// Infer every definition of `name`, each on its own branch
pub(crate) fn infer_definitions(
    mgr: &Arc<AstManager>,
    defs: Vec<NodeRef>,
    name: &str,
    ctx: InferenceContext,
) -> InferIter {
    let mgr = Arc::clone(mgr);
    let name = name.to_string();
    Box::new(defs.into_iter().flat_map(move |def| {
        let ctx = ctx.with_lookup_name(Some(name.clone()));
        infer_node(&mgr, &def, ctx)
    }))
}

/// Value bound to an `AssignName` / `AssignAttr` by its owning statement
pub(crate) fn infer_assigned(mgr: &Arc<AstManager>, node: &NodeRef, ctx: InferenceContext) -> InferIter {
    // indices from the outermost target sequence down to `node`
    let mut path = Vec::new();
    let mut child = node.clone();
    let mut owner = match node.parent() {
        Some(parent) => parent,
        None => return once(Value::Uninferable),
    };
    loop {
        match owner.kind() {
            NodeKind::Sequence { elts, .. } => {
                let Some(index) = elts.iter().position(|id| *id == child.id()) else {
                    return once(Value::Uninferable);
                };
                let starred_before = elts[..index]
                    .iter()
                    .any(|id| matches!(owner.at(*id).kind(), NodeKind::Starred { .. }));
                if starred_before {
                    return once(Value::Uninferable);
                }
                path.push(index);
            }
            NodeKind::Starred { .. } => return once(Value::Uninferable),
            _ => break,
        }
        child = owner.clone();
        owner = match owner.parent() {
            Some(parent) => parent,
            None => return once(Value::Uninferable),
        };
    }
    path.reverse();

    match owner.kind() {
        NodeKind::Assign { value, .. } | NodeKind::AnnAssign { value: Some(value), .. } => {
            let values = infer_node(mgr, &owner.at(*value), ctx.clone());
            unpack(mgr, values, path, ctx)
        }
        NodeKind::NamedExpr { value, .. } => infer_node(mgr, &owner.at(*value), ctx),
        NodeKind::AugAssign { .. } if path.is_empty() => operators::infer_augassign(mgr, &owner, ctx),
        NodeKind::For { iter, .. } => {
            let iter = owner.at(*iter);
            iterated(mgr, &iter, path, ctx)
        }
        NodeKind::Arguments { .. } => infer_parameter(mgr, node, &owner, ctx),
        NodeKind::ExceptHandler { type_: Some(type_), .. } => {
            let type_ = owner.at(*type_);
            let mgr = Arc::clone(mgr);
            lazy(move || -> InferIter {
                let values: Vec<_> = infer_node(&mgr, &type_, ctx)
                    .map(|value| {
                        value.map(|value| match value {
                            Value::Class(class) => Value::Instance(class),
                            _ => Value::Uninferable,
                        })
                    })
                    .collect();
                Box::new(values.into_iter())
            })
        }
        _ => once(Value::Uninferable),
    }
}

/// Select `path` inside each sequence value
fn unpack(mgr: &Arc<AstManager>, values: InferIter, path: Vec<usize>, ctx: InferenceContext) -> InferIter {
    if path.is_empty() {
        return values;
    }
    let mgr = Arc::clone(mgr);
    Box::new(values.flat_map(move |value| match value {
        Ok(Value::Sequence {
            kind: SequenceKind::Tuple | SequenceKind::List,
            elts,
        }) => match elts.get(path[0]) {
            Some(elt) => {
                let inner = infer_node(&mgr, elt, ctx.clone());
                unpack(&mgr, inner, path[1..].to_vec(), ctx.clone())
            }
            None => once(Value::Uninferable),
        },
        Ok(_) => once(Value::Uninferable),
        Err(err) => fail(err),
    }))
}

/// Values taken by a `for` target iterating over `iter`
fn iterated(mgr: &Arc<AstManager>, iter: &NodeRef, path: Vec<usize>, ctx: InferenceContext) -> InferIter {
    let mgr = Arc::clone(mgr);
    let containers = infer_node(&mgr, iter, ctx.clone());
    Box::new(containers.flat_map(move |container| -> InferIter {
        match container {
            Ok(Value::Sequence { elts, .. }) => {
                let mgr = Arc::clone(&mgr);
                let ctx = ctx.clone();
                let path = path.clone();
                Box::new(elts.into_iter().flat_map(move |elt| {
                    let inner = infer_node(&mgr, &elt, ctx.clone());
                    unpack(&mgr, inner, path.clone(), ctx.clone())
                }))
            }
            Ok(Value::Dict { items }) => {
                let mgr = Arc::clone(&mgr);
                let ctx = ctx.clone();
                let path = path.clone();
                Box::new(items.into_iter().flat_map(move |(key, _)| {
                    let inner = infer_node(&mgr, &key, ctx.clone());
                    unpack(&mgr, inner, path.clone(), ctx.clone())
                }))
            }
            Ok(Value::Const(Constant::Str(text))) if path.is_empty() => Box::new(
                text.chars()
                    .map(|c| Ok(Value::Const(Constant::Str(c.to_string()))))
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Ok(_) => once(Value::Uninferable),
            Err(err) => fail(err),
        }
    }))
}

/// Value of a parameter, from the active call when it targets this function
pub(crate) fn infer_parameter(
    mgr: &Arc<AstManager>,
    param: &NodeRef,
    arguments: &NodeRef,
    ctx: InferenceContext,
) -> InferIter {
    let NodeKind::Arguments {
        posonly,
        args,
        vararg,
        kwonly,
        kwarg,
        defaults,
        kw_defaults,
    } = arguments.kind()
    else {
        return once(Value::Uninferable);
    };
    let Some(function) = arguments.parent() else {
        return once(Value::Uninferable);
    };
    let name = param.name().unwrap_or_default().to_string();
    let positional: Vec<NodeId> = posonly.iter().chain(args).copied().collect();
    let position = positional.iter().position(|id| *id == param.id());
    let default = position
        .and_then(|i| defaults.get(i).copied().flatten())
        .or_else(|| {
            kwonly
                .iter()
                .position(|id| *id == param.id())
                .and_then(|i| kw_defaults.get(i).copied().flatten())
        })
        .map(|id| arguments.at(id));

    let call = ctx.call_context.clone().filter(|call| match &call.callee {
        Some(Value::Function(f)) => *f == function,
        Some(Value::BoundMethod { function: f, .. }) => *f == function,
        _ => false,
    });

    if let Some(call) = call {
        let bound = match &call.callee {
            Some(Value::BoundMethod { bound, .. }) => Some((**bound).clone()),
            _ => None,
        };
        let offset = usize::from(bound.is_some());
        if let Some(bound) = bound {
            if position == Some(0) {
                return once(bound);
            }
        }

        if Some(param.id()) == *vararg {
            let rest: Vec<NodeRef> = call.args.iter().skip(positional.len().saturating_sub(offset)).cloned().collect();
            return once(Value::Sequence {
                kind: SequenceKind::Tuple,
                elts: rest,
            });
        }
        if Some(param.id()) == *kwarg {
            return once(builtin_instance(mgr, "dict"));
        }

        if let Some(index) = position.and_then(|p| p.checked_sub(offset)) {
            if call.args[..index.min(call.args.len())]
                .iter()
                .any(|arg| matches!(arg.kind(), NodeKind::Starred { .. }))
            {
                return once(Value::Uninferable);
            }
            if let Some(arg) = call.args.get(index) {
                return infer_argument(mgr, arg, &ctx);
            }
        }
        if let Some(arg) = call.keyword(&name) {
            return infer_argument(mgr, arg, &ctx);
        }
        return match default {
            Some(default) => infer_node(mgr, &default, ctx.with_lookup_name(None)),
            None => once(Value::Uninferable),
        };
    }

    if position == Some(0) {
        if let Some(class) = function.defining_class() {
            match function_kind(&function) {
                FunctionKind::Method | FunctionKind::Property => {
                    return once(ctx.bound_node.clone().unwrap_or(Value::Instance(class)));
                }
                FunctionKind::ClassMethod => return once(Value::Class(class)),
                FunctionKind::StaticMethod | FunctionKind::Function => {}
            }
        }
    }
    if Some(param.id()) == *vararg {
        return once(builtin_instance(mgr, "tuple"));
    }
    if Some(param.id()) == *kwarg {
        return once(builtin_instance(mgr, "dict"));
    }
    match default {
        Some(default) => infer_node(mgr, &default, ctx.with_lookup_name(None)),
        None => once(Value::Uninferable),
    }
}

/// Arguments are inferred in the context of their call site
fn infer_argument(mgr: &Arc<AstManager>, arg: &NodeRef, ctx: &InferenceContext) -> InferIter {
    let caller = ctx
        .extra_context(arg)
        .cloned()
        .unwrap_or_else(|| ctx.with_lookup_name(None));
    infer_node(mgr, arg, caller)
}
