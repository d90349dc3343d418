//! Class hierarchy: bases, ancestors, method resolution order

use super::{infer_node, single_value, Value};
use crate::error::MroError;
use crate::manager::AstManager;
use crate::tree::{NodeKind, NodeRef};
use std::sync::Arc;

/// How a function behaves when reached through a class or instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Function,
    Method,
    ClassMethod,
    StaticMethod,
    Property,
}

pub fn function_kind(function: &NodeRef) -> FunctionKind {
    let NodeKind::FunctionDef { name, decorators, .. } = function.kind() else {
        return FunctionKind::Function;
    };
    for decorator in decorators {
        let decorator = function.at(*decorator);
        let label = match decorator.kind() {
            NodeKind::Name { id } => id.as_str(),
            NodeKind::Attribute { attr, .. } => attr.as_str(),
            _ => continue,
        };
        match label {
            "classmethod" => return FunctionKind::ClassMethod,
            "staticmethod" => return FunctionKind::StaticMethod,
            "property" | "cached_property" | "abstractproperty" | "setter" | "getter" | "deleter" => {
                return FunctionKind::Property
            }
            _ => {}
        }
    }
    if function.defining_class().is_none() {
        return FunctionKind::Function;
    }
    match name.as_str() {
        "__new__" => FunctionKind::StaticMethod,
        "__init_subclass__" | "__class_getitem__" => FunctionKind::ClassMethod,
        _ => FunctionKind::Method,
    }
}

/// `@x.setter` / `@x.deleter` functions, which never produce the attribute value
pub(crate) fn is_property_modifier(function: &NodeRef) -> bool {
    let NodeKind::FunctionDef { decorators, .. } = function.kind() else {
        return false;
    };
    decorators.iter().any(|decorator| {
        matches!(
            function.at(*decorator).kind(),
            NodeKind::Attribute { attr, .. } if attr == "setter" || attr == "deleter"
        )
    })
}

pub(crate) fn is_builtin_object(class: &NodeRef) -> bool {
    class.module().name() == "builtins" && class.name() == Some("object")
}

/// Written bases of `class`; `None` where a base is not a known class
pub(crate) fn explicit_bases(mgr: &Arc<AstManager>, class: &NodeRef) -> Vec<Option<NodeRef>> {
    let NodeKind::ClassDef { bases, .. } = class.kind() else {
        return Vec::new();
    };
    bases
        .iter()
        .map(|base| match single_value(infer_node(mgr, &class.at(*base), mgr.new_context())) {
            Some(Value::Class(base)) => Some(base),
            _ => None,
        })
        .collect()
}

/// Bases including the implicit `object`
pub(crate) fn bases(mgr: &Arc<AstManager>, class: &NodeRef) -> Vec<Option<NodeRef>> {
    let explicit = explicit_bases(mgr, class);
    if !explicit.is_empty() || is_builtin_object(class) {
        return explicit;
    }
    mgr.builtin_class("object")
        .filter(|object| object != class)
        .into_iter()
        .map(Some)
        .collect()
}

/// Every known ancestor, depth first, each listed once
pub fn ancestors(mgr: &Arc<AstManager>, class: &NodeRef) -> Vec<NodeRef> {
    let mut seen = vec![class.clone()];
    let mut out = Vec::new();
    collect_ancestors(mgr, class, &mut seen, &mut out);
    out
}

fn collect_ancestors(mgr: &Arc<AstManager>, class: &NodeRef, seen: &mut Vec<NodeRef>, out: &mut Vec<NodeRef>) {
    for base in bases(mgr, class).into_iter().flatten() {
        if seen.contains(&base) {
            continue;
        }
        seen.push(base.clone());
        out.push(base.clone());
        collect_ancestors(mgr, &base, seen, out);
    }
}

/// C3 linearization of `class`
pub fn mro(mgr: &Arc<AstManager>, class: &NodeRef) -> Result<Vec<NodeRef>, MroError> {
    mro_inner(mgr, class, &mut Vec::new())
}

fn mro_inner(mgr: &Arc<AstManager>, class: &NodeRef, visiting: &mut Vec<NodeRef>) -> Result<Vec<NodeRef>, MroError> {
    let name = class.name().unwrap_or("?").to_string();
    if visiting.contains(class) {
        return Err(MroError::Cycle { class: name });
    }
    let bases: Vec<NodeRef> = bases(mgr, class)
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| MroError::UnknownBases { class: name.clone() })?;
    for (i, base) in bases.iter().enumerate() {
        if bases[..i].contains(base) {
            return Err(MroError::DuplicateBases { class: name });
        }
    }

    visiting.push(class.clone());
    let mut sequences = Vec::with_capacity(bases.len() + 1);
    for base in &bases {
        match mro_inner(mgr, base, visiting) {
            Ok(seq) => sequences.push(seq),
            Err(err) => {
                visiting.pop();
                return Err(err);
            }
        }
    }
    visiting.pop();
    sequences.push(bases);

    let merged = c3_merge(sequences).ok_or(MroError::Inconsistent { class: name })?;
    let mut order = Vec::with_capacity(merged.len() + 1);
    order.push(class.clone());
    order.extend(merged);
    Ok(order)
}

fn c3_merge(mut sequences: Vec<Vec<NodeRef>>) -> Option<Vec<NodeRef>> {
    let mut result = Vec::new();
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            return Some(result);
        }
        let candidate = sequences
            .iter()
            .map(|seq| &seq[0])
            .find(|head| !sequences.iter().any(|seq| seq[1..].contains(head)))?
            .clone();
        for seq in sequences.iter_mut() {
            if seq[0] == candidate {
                seq.remove(0);
            }
        }
        result.push(candidate);
    }
}

/// Definitions of `name` on the first class of the MRO that has any
pub fn class_lookup(mgr: &Arc<AstManager>, class: &NodeRef, name: &str) -> Vec<NodeRef> {
    let order = mro(mgr, class).unwrap_or_else(|_| {
        let mut order = vec![class.clone()];
        order.extend(ancestors(mgr, class));
        order
    });
    order
        .iter()
        .map(|c| c.local_defs(name))
        .find(|defs| !defs.is_empty())
        .unwrap_or_default()
}

/// Instance attributes assigned on `class` or one of its ancestors
pub(crate) fn instance_attr_defs(mgr: &Arc<AstManager>, class: &NodeRef, name: &str) -> Vec<NodeRef> {
    let defs = class.instance_attr_defs(name);
    if !defs.is_empty() {
        return defs;
    }
    ancestors(mgr, class)
        .iter()
        .map(|c| c.instance_attr_defs(name))
        .find(|defs| !defs.is_empty())
        .unwrap_or_default()
}

fn explicit_metaclass(mgr: &Arc<AstManager>, class: &NodeRef) -> Option<NodeRef> {
    let NodeKind::ClassDef { keywords, .. } = class.kind() else {
        return None;
    };
    keywords.iter().find_map(|keyword| match class.at(*keyword).kind() {
        NodeKind::Keyword { arg: Some(arg), value } if arg == "metaclass" => {
            match single_value(infer_node(mgr, &class.at(*value), mgr.new_context())) {
                Some(Value::Class(meta)) => Some(meta),
                _ => None,
            }
        }
        _ => None,
    })
}

/// Declared or inherited metaclass
pub fn metaclass(mgr: &Arc<AstManager>, class: &NodeRef) -> Option<NodeRef> {
    explicit_metaclass(mgr, class).or_else(|| {
        ancestors(mgr, class)
            .iter()
            .find_map(|ancestor| explicit_metaclass(mgr, ancestor))
    })
}
