//! Resolution steps that need the finished, cached module
//!
//! Both passes are best effort: one item that cannot be resolved is logged
//! and skipped, never failing the build.

use super::DeferredWork;
use crate::inference::classes::ancestors;
use crate::inference::{absolute_modname, infer, Value};
use crate::manager::AstManager;
use crate::relations::safe_infer;
use crate::tree::{Constant, Module, NodeKind, NodeRef, SequenceKind};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) fn run(mgr: &Arc<AstManager>, module: &Arc<Module>, deferred: &DeferredWork) {
    for id in &deferred.import_froms {
        add_from_names_to_locals(mgr, &NodeRef::new(Arc::clone(module), *id));
    }
    for id in &deferred.assign_attrs {
        delayed_assattr(mgr, &NodeRef::new(Arc::clone(module), *id));
    }
}

/// Bind the names of a `from X import ...` statement in its scope
fn add_from_names_to_locals(mgr: &Arc<AstManager>, node: &NodeRef) {
    let NodeKind::ImportFrom { module, names, level } = node.kind() else {
        return;
    };
    let scope = node.scope_node();
    for alias in names {
        if alias.name != "*" {
            scope.set_local(alias.bound_name(), node);
            continue;
        }

        let modname = match absolute_modname(node.module(), module.as_deref().unwrap_or_default(), *level) {
            Ok(modname) => modname,
            Err(err) => {
                warn!("Skipping star import in {}: {}", node.module().name(), err);
                continue;
            }
        };
        let imported = match mgr.import_module(&modname, node.module().file()) {
            Ok(imported) => imported,
            Err(err) => {
                warn!("Skipping star import of {} in {}: {}", modname, node.module().name(), err);
                continue;
            }
        };
        let exported = public_names(mgr, &NodeRef::root(&imported));
        debug!("Star import of {} binds {} names", modname, exported.len());
        for name in exported {
            scope.set_local(&name, node);
        }
    }
}

/// `__all__` when it is a literal list of strings, else every name not
/// starting with an underscore
fn public_names(mgr: &Arc<AstManager>, root: &NodeRef) -> Vec<String> {
    let declared = root
        .local_defs("__all__")
        .last()
        .and_then(|def| safe_infer(mgr, def, None))
        .and_then(|value| match value {
            Value::Sequence {
                kind: SequenceKind::List | SequenceKind::Tuple,
                elts,
            } => elts
                .iter()
                .map(|elt| match elt.kind() {
                    NodeKind::Const(Constant::Str(name)) => Some(name.clone()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>(),
            _ => None,
        });
    declared.unwrap_or_else(|| {
        root.local_names()
            .into_iter()
            .filter(|name| !name.starts_with('_'))
            .collect()
    })
}

/// Record `obj.attr = ...` on whatever `obj` turns out to be
fn delayed_assattr(mgr: &Arc<AstManager>, node: &NodeRef) {
    let NodeKind::AssignAttr { value, attr } = node.kind() else {
        return;
    };
    let frame = node.frame();
    for owner in infer(mgr, &node.at(*value), None) {
        let owner = match owner {
            Ok(owner) => owner,
            Err(err) => {
                debug!("Cannot resolve owner of attribute `{}`: {}", attr, err);
                continue;
            }
        };
        match owner {
            Value::Instance(class) => {
                if !can_assign_attr(mgr, &class, attr) {
                    continue;
                }
                let existing = class.instance_attr_defs(attr);
                if existing.contains(node) {
                    continue;
                }
                let in_init = frame.name() == Some("__init__");
                let first_in_init = existing.first().is_some_and(|def| def.frame().name() == Some("__init__"));
                if in_init && !existing.is_empty() && !first_in_init {
                    class.set_instance_attr_first(attr, node);
                } else {
                    class.set_instance_attr(attr, node);
                }
            }
            Value::Class(class) => class.set_local(attr, node),
            Value::Module(root) => root.set_local(attr, node),
            Value::Function(function) => function.set_instance_attr(attr, node),
            // literals, proxies and unknowns do not take attributes
            _ => {}
        }
    }
}

/// `__slots__` of `class`, `None` when it declares none or they are not literal
fn slots(mgr: &Arc<AstManager>, class: &NodeRef) -> Option<Vec<String>> {
    let def = class.local_defs("__slots__").last().cloned()?;
    match safe_infer(mgr, &def, None)? {
        Value::Const(Constant::Str(name)) => Some(vec![name]),
        Value::Sequence { elts, .. } => elts
            .iter()
            .map(|elt| match safe_infer(mgr, elt, None) {
                Some(Value::Const(Constant::Str(name))) => Some(name),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// Whether instances may carry `attr`: any class in the hierarchy without
/// `__slots__` provides a `__dict__`
fn can_assign_attr(mgr: &Arc<AstManager>, class: &NodeRef, attr: &str) -> bool {
    let mut declared = Vec::new();
    let hierarchy = std::iter::once(class.clone()).chain(ancestors(mgr, class));
    for cls in hierarchy {
        if crate::inference::classes::is_builtin_object(&cls) {
            continue;
        }
        match slots(mgr, &cls) {
            Some(names) => declared.extend(names),
            None => return true,
        }
    }
    declared.iter().any(|name| name == attr)
}
