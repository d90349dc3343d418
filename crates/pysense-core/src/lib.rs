//! # Pysense Core
//!
//! Static inference for Python source. Modules are parsed into an immutable
//! node arena with per-scope symbol tables; inference walks that arena
//! lazily, yielding every value an expression might take at run time.
//!
//! ## Modules
//!
//! - **[`builder`]** - source and live-module lowering, deferred resolution
//! - **[`manager`]** - module lookup, caching and the build pipeline
//! - **[`inference`]** - the inference engine and its context
//! - **[`relations`]** - type-of, subtype and length queries on top of inference
//! - **[`transforms`]** - node rewrites applied to freshly built modules
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pysense_core::{extract_node, AstManager, ManagerConfig, Value};
//!
//! let mgr = AstManager::new(ManagerConfig::default());
//! let node = extract_node(&mgr, "x = (1, 2) + (3,)\nx #@\n").unwrap();
//! let values: Vec<Value> = mgr.infer(&node, None).filter_map(Result::ok).collect();
//! assert_eq!(values.len(), 1);
//! ```

pub mod builder;
pub mod builtins;
pub mod config;
pub mod error;
pub mod inference;
pub mod manager;
pub mod relations;
pub mod transforms;
pub mod tree;

pub use config::{ManagerConfig, DEFAULT_MAX_INFERRED};
pub use error::{BuildError, ImportError, InferenceError, LenError, MroError, NotDecidable, ResolutionError};
pub use inference::{CallContext, CallTip, CallTipRegistry, InferIter, InferResult, InferenceContext, ProxyClass, Value};
pub use manager::{AstManager, FailedImportHook, ManagerBuilder, ModuleCaches};
pub use relations::{has_known_bases, is_subtype, is_supertype, object_len, safe_infer, type_of, value_type};
pub use transforms::{TransformId, TransformRegistry};
pub use tree::{Constant, Module, NodeKind, NodeRef};

use std::path::Path;
use std::sync::Arc;
use tree::{Location, NodeId};

/// Marker selecting statements in [`extract_nodes`]
pub const EXTRACT_MARKER: &str = "#@";

/// Name of the call wrapping an expression for [`extract_nodes`]
pub const EXTRACT_WRAPPER: &str = "__";

/// Parse `code` as module `modname` after removing its common indentation
pub fn parse(mgr: &Arc<AstManager>, code: &str, modname: &str, path: Option<&Path>) -> Result<Arc<Module>, BuildError> {
    mgr.parse_source(&textwrap::dedent(code), modname, path)
}

/// Nodes selected in `source`, which is dedented first:
///
/// - statements on lines ending in `#@`
/// - then expressions wrapped as `__(expr)`, in source order
///
/// The wrapper calls are removed from the tree that is returned. When
/// nothing is selected the last statement is used. Expression statements
/// give their expression.
pub fn extract_nodes(mgr: &Arc<AstManager>, source: &str) -> Result<Vec<NodeRef>, BuildError> {
    let mut source = textwrap::dedent(source);
    let marked: Vec<u32> = source
        .lines()
        .enumerate()
        .filter(|(_, line)| line.trim_end().ends_with(EXTRACT_MARKER))
        .map(|(index, _)| index as u32 + 1)
        .collect();

    let wrapped = wrapped_expressions(mgr, &source)?;
    for call in &wrapped {
        if let Some(offset) = byte_offset(&source, call.call_location) {
            source.replace_range(offset..offset + EXTRACT_WRAPPER.len(), &" ".repeat(EXTRACT_WRAPPER.len()));
        }
    }
    let module = mgr.parse_source(&source, "extracted", None)?;
    let root = NodeRef::root(&module);

    let mut selected: Vec<NodeRef> = marked
        .iter()
        .filter_map(|line| {
            module.node_ids().map(|id| root.at(id)).find(|node| {
                !node.is_module_root() && node.kind().is_statement() && node.location().line == *line
            })
        })
        .collect();
    selected.extend(wrapped.iter().filter_map(|call| call.find_in(&root, &wrapped)));
    if selected.is_empty() {
        selected.extend(root.children().into_iter().filter(|node| node.kind().is_statement()).last());
    }

    Ok(selected
        .into_iter()
        .map(|node| match node.kind() {
            NodeKind::Expr { value } => node.at(*value),
            _ => node,
        })
        .collect())
}

/// The first node [`extract_nodes`] selects
pub fn extract_node(mgr: &Arc<AstManager>, source: &str) -> Option<NodeRef> {
    extract_nodes(mgr, source).ok()?.into_iter().next()
}

/// A `__(expr)` call found in the unmodified source
struct WrappedExpr {
    call: NodeId,
    call_location: Location,
    arg: NodeId,
    arg_location: Location,
    arg_kind: std::mem::Discriminant<NodeKind>,
}

impl WrappedExpr {
    /// The argument in the tree parsed without wrappers, where it moves up
    /// by the call and name nodes of every wrapper allocated before it
    fn find_in(&self, root: &NodeRef, wrapped: &[WrappedExpr]) -> Option<NodeRef> {
        let removed = wrapped.iter().filter(|other| other.call < self.arg).count();
        let shifted = self.arg.0.checked_sub(2 * removed).map(NodeId);
        let matches = |node: &NodeRef| {
            node.location() == self.arg_location && std::mem::discriminant(node.kind()) == self.arg_kind
        };
        shifted
            .filter(|id| id.0 < root.module().len())
            .map(|id| root.at(id))
            .filter(matches)
            .or_else(|| root.module().node_ids().map(|id| root.at(id)).find(matches))
    }
}

fn wrapped_expressions(mgr: &Arc<AstManager>, source: &str) -> Result<Vec<WrappedExpr>, BuildError> {
    if !source.contains(EXTRACT_WRAPPER) {
        return Ok(Vec::new());
    }
    let module = mgr.parse_source_with(source, "extracted", None, false)?;
    let root = NodeRef::root(&module);
    Ok(module
        .node_ids()
        .map(|id| root.at(id))
        .filter_map(|call| {
            let NodeKind::Call { func, args, keywords } = call.kind() else {
                return None;
            };
            let is_wrapper = matches!(call.at(*func).kind(), NodeKind::Name { id } if id == EXTRACT_WRAPPER);
            if !is_wrapper || args.len() != 1 || !keywords.is_empty() {
                return None;
            }
            let offset = byte_offset(source, call.location())?;
            if !source[offset..].starts_with(EXTRACT_WRAPPER) {
                return None;
            }
            let arg = call.at(args[0]);
            Some(WrappedExpr {
                call: call.id(),
                call_location: call.location(),
                arg: arg.id(),
                arg_location: arg.location(),
                arg_kind: std::mem::discriminant(arg.kind()),
            })
        })
        .collect())
}

fn byte_offset(source: &str, location: Location) -> Option<usize> {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(location.line.checked_sub(1)? as usize)
        .map(str::len)
        .sum();
    let offset = line_start + location.column as usize;
    source.is_char_boundary(offset).then_some(offset)
}
