//! Tree builder
//!
//! Lowers a primitive parse tree into a [`Module`] arena, filling each
//! scope's locals table as definitions are met. Work that needs the finished
//! module (names bound by `from X import ...`, attribute assignments) is
//! recorded in [`DeferredWork`] and run by the manager once the module is
//! cached.

pub mod adapter;
pub(crate) mod deferred;
pub mod live;
mod lower;
pub mod source;

pub use adapter::{LineIndex, RustPythonAdapter, SyntaxAdapter, SyntaxError};
pub use live::{build_members, LiveMember, LiveModule, LiveObject, MemberKind};

use crate::error::BuildError;
use crate::tree::{
    Definition, DefNode, Location, ModuleParts, Node, NodeId, NodeKind, Scope, ScopeTables, SymbolTable,
};
use rustpython_parser::text_size::TextSize;
use rustpython_parser::{lexer, Mode, Tok};
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Nodes whose resolution waits for the finished module
#[derive(Debug, Default, Clone)]
pub struct DeferredWork {
    pub import_froms: Vec<NodeId>,
    pub assign_attrs: Vec<NodeId>,
}

/// Builder output before it becomes a shared [`Module`]
#[derive(Debug)]
pub struct BuiltModule {
    pub parts: ModuleParts,
    pub deferred: DeferredWork,
}

/// Source metadata recorded on the module
#[derive(Debug, Default, Clone)]
pub struct SourceInfo {
    pub path: Option<PathBuf>,
    pub bytes: Option<Vec<u8>>,
    pub encoding: Option<String>,
}

/// Arena under construction
pub(crate) struct TreeBuilder<'src> {
    source: &'src str,
    index: LineIndex,
    nodes: Vec<Node>,
    scope_stack: Vec<NodeId>,
    locals: HashMap<NodeId, SymbolTable>,
    globals: HashMap<NodeId, HashSet<String>>,
    generators: HashSet<NodeId>,
    deferred: DeferredWork,
    future_imports: BTreeSet<String>,
}

pub(crate) struct BuiltTree {
    pub nodes: Vec<Node>,
    pub tables: ScopeTables,
    pub deferred: DeferredWork,
    pub future_imports: BTreeSet<String>,
}

impl<'src> TreeBuilder<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            index: LineIndex::new(source),
            nodes: Vec::new(),
            scope_stack: Vec::new(),
            locals: HashMap::new(),
            globals: HashMap::new(),
            generators: HashSet::new(),
            deferred: DeferredWork::default(),
            future_imports: BTreeSet::new(),
        }
    }

    /// Allocate the module root and make it the current scope
    pub fn start_module(&mut self) -> NodeId {
        let root = self.alloc_scoped(None, Location::default(), NodeId::ROOT);
        self.set_kind(root, NodeKind::Module);
        self.scope_stack.push(root);
        root
    }

    fn current_scope(&self) -> NodeId {
        self.scope_stack.last().copied().unwrap_or(NodeId::ROOT)
    }

    pub fn alloc(&mut self, parent: Option<NodeId>, location: Location) -> NodeId {
        let scope = self.current_scope();
        self.alloc_scoped(parent, location, scope)
    }

    pub fn alloc_scoped(&mut self, parent: Option<NodeId>, location: Location, scope: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::Pass,
            parent,
            scope,
            location,
            from_line: location.line,
            children: SmallVec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0].kind = kind;
    }

    pub fn location(&self, offset: usize) -> Location {
        self.index.location(offset)
    }

    pub fn enter_scope(&mut self, scope: NodeId) {
        self.locals.entry(scope).or_default();
        self.scope_stack.push(scope);
    }

    pub fn leave_scope(&mut self) {
        self.scope_stack.pop();
    }

    /// Bind `name` in the current scope, honouring `global` declarations
    pub fn define(&mut self, name: &str, def: NodeId) {
        let scope = self.current_scope();
        let redirected = self.globals.get(&scope).is_some_and(|names| names.contains(name));
        let target = if redirected { NodeId::ROOT } else { scope };
        self.define_in(target, name, def);
    }

    pub fn define_in(&mut self, scope: NodeId, name: &str, def: NodeId) {
        let line = self.nodes[def.0].from_line;
        self.locals.entry(scope).or_default().insert(
            name,
            Definition {
                node: DefNode::Local(def),
                line,
            },
        );
    }

    pub fn declare_global(&mut self, name: &str) {
        let scope = self.current_scope();
        self.globals.entry(scope).or_default().insert(name.to_string());
    }

    pub fn mark_generator(&mut self) {
        let scope = self.current_scope();
        self.generators.insert(scope);
    }

    pub fn is_generator(&self, scope: NodeId) -> bool {
        self.generators.contains(&scope)
    }

    /// Line of the first `async`/`def`/`class` token after the decorators,
    /// which end at byte offset `decorators_end`
    pub fn effective_line(&self, start: Location, decorators_end: Option<usize>) -> u32 {
        let Some(end) = decorators_end.filter(|end| self.source.is_char_boundary(*end)) else {
            return start.line;
        };
        let Ok(offset) = u32::try_from(end) else {
            return start.line;
        };
        lexer::lex_starts_at(&self.source[end..], Mode::Module, TextSize::from(offset))
            .map_while(Result::ok)
            .find(|(tok, _)| matches!(tok, Tok::Async | Tok::Def | Tok::Class))
            .map(|(_, range)| self.location(usize::from(range.start())).line)
            .unwrap_or(start.line)
    }

    pub fn set_from_line(&mut self, id: NodeId, line: u32) {
        self.nodes[id.0].from_line = line;
    }

    pub fn node_location(&self, id: NodeId) -> Location {
        self.nodes[id.0].location
    }

    pub fn defer_import_from(&mut self, id: NodeId) {
        self.deferred.import_froms.push(id);
    }

    pub fn defer_assign_attr(&mut self, id: NodeId) {
        self.deferred.assign_attrs.push(id);
    }

    pub fn add_future_import(&mut self, name: &str) {
        self.future_imports.insert(name.to_string());
    }

    pub fn finish(mut self) -> BuiltTree {
        let mut tables = ScopeTables::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.kind.is_scope() {
                let id = NodeId(index);
                let locals = self.locals.remove(&id).unwrap_or_default();
                tables.add(id, Scope::new(locals));
            }
        }
        BuiltTree {
            nodes: self.nodes,
            tables,
            deferred: self.deferred,
            future_imports: self.future_imports,
        }
    }
}

/// Derive a module name from its path when the caller gave none
pub fn modname_from_path(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    if stem == "__init__" {
        if let Some(dir) = path.parent().and_then(|p| p.file_name()).and_then(|s| s.to_str()) {
            return dir.to_string();
        }
    }
    stem.to_string()
}

fn is_package_path(path: Option<&Path>) -> bool {
    path.and_then(|p| p.file_stem())
        .is_some_and(|stem| stem == "__init__")
}

/// Parse `text` and lower it into module parts.
///
/// A parse failure caused by a misplaced annotation comment is retried once
/// with annotation comments disabled.
pub fn build_source(
    adapter: &dyn SyntaxAdapter,
    text: &str,
    modname: &str,
    info: SourceInfo,
    type_comments: bool,
) -> Result<BuiltModule, BuildError> {
    let path_display = info
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| crate::tree::NO_FILE.to_string());

    let parsed = match adapter.parse(text, &path_display, type_comments) {
        Err(err) if type_comments && err.misplaced_type_annotation => {
            debug!("Retrying {} without annotation comments: {}", modname, err);
            adapter.parse(text, &path_display, false)
        }
        other => other,
    };
    let suite = parsed.map_err(|err| syntax_error(modname, &path_display, err))?;

    let mut builder = TreeBuilder::new(text);
    builder.lower_module(&suite);
    let tree = builder.finish();
    debug!("Built module {} ({} nodes)", modname, tree.nodes.len());

    Ok(BuiltModule {
        parts: ModuleParts {
            name: modname.to_string(),
            package: is_package_path(info.path.as_deref()),
            file: info.path,
            file_bytes: info.bytes,
            file_encoding: info.encoding,
            pure_python: true,
            future_imports: tree.future_imports,
            nodes: tree.nodes,
            tables: tree.tables,
        },
        deferred: tree.deferred,
    })
}

/// Empty package module for a directory without `__init__.py`
pub fn build_namespace_package(modname: &str) -> BuiltModule {
    let mut builder = TreeBuilder::new("");
    builder.start_module();
    let tree = builder.finish();
    BuiltModule {
        parts: ModuleParts {
            name: modname.to_string(),
            file: None,
            file_bytes: None,
            file_encoding: None,
            package: true,
            pure_python: true,
            future_imports: tree.future_imports,
            nodes: tree.nodes,
            tables: tree.tables,
        },
        deferred: tree.deferred,
    }
}

fn syntax_error(modname: &str, path: &str, err: SyntaxError) -> BuildError {
    BuildError::Syntax {
        modname: modname.to_string(),
        path: path.to_string(),
        location: err.location,
        message: err.message,
    }
}
