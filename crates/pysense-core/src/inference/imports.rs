//! Import statements

use super::attributes::igetattr;
use super::{fail, lazy, once, InferIter, InferenceContext, Value};
use crate::error::{ImportError, InferenceError};
use crate::manager::AstManager;
use crate::tree::{ImportAlias, Module, NodeKind, NodeRef};
use std::sync::Arc;

/// Value bound by an import statement for the name being looked up
pub(crate) fn infer_import(mgr: &Arc<AstManager>, node: &NodeRef, ctx: InferenceContext) -> InferIter {
    let lookup = ctx.lookup_name.clone();
    match node.kind() {
        NodeKind::Import { names } => {
            let Some(alias) = pick_alias(names, lookup.as_deref()) else {
                return once(Value::Uninferable);
            };
            let target = match &alias.asname {
                Some(_) => alias.name.clone(),
                None => alias.bound_name().to_string(),
            };
            let mgr = Arc::clone(mgr);
            let node = node.clone();
            lazy(move || match mgr.import_module(&target, node.module().file()) {
                Ok(module) => once(Value::Module(NodeRef::root(&module))),
                Err(err) => fail(err.into()),
            })
        }
        NodeKind::ImportFrom { module, names, level } => {
            let attr = match pick_alias(names, lookup.as_deref()) {
                Some(alias) if alias.name != "*" => alias.name.clone(),
                // star imports bind whatever name is looked up
                _ => match lookup {
                    Some(name) => name,
                    None => return once(Value::Uninferable),
                },
            };
            let modname = match absolute_modname(node.module(), module.as_deref().unwrap_or_default(), *level) {
                Ok(modname) => modname,
                Err(err) => return fail(err.into()),
            };
            let mgr = Arc::clone(mgr);
            let node = node.clone();
            lazy(move || {
                let context_file = node.module().file();
                if modname.is_empty() {
                    return match mgr.import_module(&attr, context_file) {
                        Ok(module) => once(Value::Module(NodeRef::root(&module))),
                        Err(err) => fail(err.into()),
                    };
                }
                match mgr.import_module(&modname, context_file) {
                    Ok(module) => {
                        let owner = Value::Module(NodeRef::root(&module));
                        igetattr(&mgr, &owner, &attr, ctx.with_lookup_name(Some(attr.clone())))
                    }
                    Err(err) => fail(InferenceError::from(err)),
                }
            })
        }
        _ => once(Value::Uninferable),
    }
}

fn pick_alias<'a>(names: &'a [ImportAlias], lookup: Option<&str>) -> Option<&'a ImportAlias> {
    match lookup {
        Some(lookup) => names
            .iter()
            .find(|alias| alias.bound_name() == lookup)
            .or_else(|| names.iter().find(|alias| alias.name == "*")),
        None => names.first(),
    }
}

/// Absolute name for `modname` imported from `module` with `level` leading dots.
///
/// Returns an empty string when a relative import names no package, in which
/// case the imported names are themselves modules next to `module`.
pub fn absolute_modname(module: &Module, modname: &str, level: u32) -> Result<String, ImportError> {
    if level == 0 {
        return Ok(modname.to_string());
    }
    let mut parts: Vec<&str> = module.name().split('.').filter(|part| !part.is_empty()).collect();
    if !module.is_package() {
        parts.pop();
    }
    let extra = (level - 1) as usize;
    if extra > parts.len() {
        return Err(ImportError::BeyondTopLevel {
            from: module.name().to_string(),
        });
    }
    parts.truncate(parts.len() - extra);
    if !modname.is_empty() {
        parts.push(modname);
    }
    Ok(parts.join("."))
}
