//! Arena-backed syntax tree
//!
//! A [`Module`] owns every node built from one source file in a flat `Vec`,
//! addressed by [`NodeId`]. Parent links are plain ids (non-owning), and
//! [`NodeRef`] pairs an id with the `Arc<Module>` that owns it so that values
//! produced by inference can point into any cached module.
//!
//! Scope nodes (module, class, function, lambda) additionally own symbol
//! tables, kept in [`ScopeTables`] so they can receive late insertions from
//! deferred resolution after the module has been shared.

mod lookup;
mod node_ref;
mod symbols;

pub use node_ref::{NodeKey, NodeRef};
pub use symbols::{DefNode, Definition, Scope, ScopeTables, SymbolTable};

use rustpython_ast::{BoolOp, CmpOp, Operator, UnaryOp};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sentinel printed in place of a file path for modules built from strings.
pub const NO_FILE: &str = "<?>";

/// Index of a node inside its module's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

/// Process-unique module identity, stable across transform rewrites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u64);

static NEXT_MODULE_ID: AtomicU64 = AtomicU64::new(1);

impl ModuleId {
    fn fresh() -> Self {
        ModuleId(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Source position: 1-based line, 0-based byte column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Literal constant carried by a `Const` node or produced by folding
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex { real: f64, imag: f64 },
    Str(String),
    Bytes(Vec<u8>),
    Ellipsis,
}

impl Constant {
    /// Name of the builtin class instances of this constant belong to
    pub fn type_name(&self) -> &'static str {
        match self {
            Constant::None => "NoneType",
            Constant::Bool(_) => "bool",
            Constant::Int(_) => "int",
            Constant::Float(_) => "float",
            Constant::Complex { .. } => "complex",
            Constant::Str(_) => "str",
            Constant::Bytes(_) => "bytes",
            Constant::Ellipsis => "ellipsis",
        }
    }

    /// Python truth value
    pub fn truthy(&self) -> bool {
        match self {
            Constant::None => false,
            Constant::Bool(b) => *b,
            Constant::Int(i) => *i != 0,
            Constant::Float(f) => *f != 0.0,
            Constant::Complex { real, imag } => *real != 0.0 || *imag != 0.0,
            Constant::Str(s) => !s.is_empty(),
            Constant::Bytes(b) => !b.is_empty(),
            Constant::Ellipsis => true,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => write!(f, "None"),
            Constant::Bool(true) => write!(f, "True"),
            Constant::Bool(false) => write!(f, "False"),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Float(x) => write!(f, "{:?}", x),
            Constant::Complex { real, imag } => write!(f, "({}+{}j)", real, imag),
            Constant::Str(s) => write!(f, "{:?}", s),
            Constant::Bytes(b) => write!(f, "b{:?}", String::from_utf8_lossy(b)),
            Constant::Ellipsis => write!(f, "Ellipsis"),
        }
    }
}

/// Literal container shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    List,
    Tuple,
    Set,
}

impl SequenceKind {
    pub fn type_name(self) -> &'static str {
        match self {
            SequenceKind::List => "list",
            SequenceKind::Tuple => "tuple",
            SequenceKind::Set => "set",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

/// One `name [as alias]` entry of an import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAlias {
    pub name: String,
    pub asname: Option<String>,
}

impl ImportAlias {
    /// Name bound in the importing scope
    pub fn bound_name(&self) -> &str {
        match &self.asname {
            Some(alias) => alias,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

/// Node variants. Child references are ids into the owning module.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Module,
    ClassDef {
        name: String,
        bases: Vec<NodeId>,
        keywords: Vec<NodeId>,
        decorators: Vec<NodeId>,
        body: Vec<NodeId>,
    },
    FunctionDef {
        name: String,
        args: NodeId,
        decorators: Vec<NodeId>,
        returns: Option<NodeId>,
        body: Vec<NodeId>,
        is_async: bool,
        is_generator: bool,
        /// Built by introspection: no body to infer a result from
        introspected: bool,
    },
    Lambda {
        args: NodeId,
        body: NodeId,
    },
    Arguments {
        posonly: Vec<NodeId>,
        args: Vec<NodeId>,
        vararg: Option<NodeId>,
        kwonly: Vec<NodeId>,
        kwarg: Option<NodeId>,
        /// Aligned with `posonly` followed by `args`
        defaults: Vec<Option<NodeId>>,
        /// Aligned with `kwonly`
        kw_defaults: Vec<Option<NodeId>>,
    },
    Assign {
        targets: Vec<NodeId>,
        value: NodeId,
    },
    AugAssign {
        target: NodeId,
        op: Operator,
        value: NodeId,
    },
    AnnAssign {
        target: NodeId,
        annotation: NodeId,
        value: Option<NodeId>,
    },
    Expr {
        value: NodeId,
    },
    Return {
        value: Option<NodeId>,
    },
    If {
        test: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
    },
    While {
        test: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
    },
    For {
        target: NodeId,
        iter: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
    },
    With {
        items: Vec<(NodeId, Option<NodeId>)>,
        body: Vec<NodeId>,
    },
    Try {
        body: Vec<NodeId>,
        handlers: Vec<NodeId>,
        orelse: Vec<NodeId>,
        finalbody: Vec<NodeId>,
    },
    ExceptHandler {
        type_: Option<NodeId>,
        name: Option<NodeId>,
        body: Vec<NodeId>,
    },
    Import {
        names: Vec<ImportAlias>,
    },
    ImportFrom {
        module: Option<String>,
        names: Vec<ImportAlias>,
        level: u32,
    },
    Global {
        names: Vec<String>,
    },
    Pass,
    Break,
    Continue,
    /// Statement with no inference semantics of its own (raise, del, assert, match, ...)
    Statement {
        label: &'static str,
    },
    Name {
        id: String,
    },
    AssignName {
        name: String,
    },
    Attribute {
        value: NodeId,
        attr: String,
    },
    AssignAttr {
        value: NodeId,
        attr: String,
    },
    Call {
        func: NodeId,
        args: Vec<NodeId>,
        keywords: Vec<NodeId>,
    },
    Keyword {
        arg: Option<String>,
        value: NodeId,
    },
    Const(Constant),
    Sequence {
        kind: SequenceKind,
        elts: Vec<NodeId>,
    },
    Dict {
        keys: Vec<NodeId>,
        values: Vec<NodeId>,
    },
    /// `**mapping` entry inside a dict display
    DictUnpack,
    BinOp {
        op: Operator,
        left: NodeId,
        right: NodeId,
    },
    UnaryOp {
        op: UnaryOp,
        operand: NodeId,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<NodeId>,
    },
    Compare {
        left: NodeId,
        ops: Vec<CmpOp>,
        comparators: Vec<NodeId>,
    },
    Subscript {
        value: NodeId,
        slice: NodeId,
    },
    Slice {
        lower: Option<NodeId>,
        upper: Option<NodeId>,
        step: Option<NodeId>,
    },
    IfExp {
        test: NodeId,
        body: NodeId,
        orelse: NodeId,
    },
    Starred {
        value: NodeId,
    },
    NamedExpr {
        target: NodeId,
        value: NodeId,
    },
    Comprehension {
        kind: ComprehensionKind,
    },
    JoinedStr,
    /// Expression with no inference semantics (await, yield, ...)
    Opaque {
        label: &'static str,
    },
    /// Placeholder for an introspected member of unknown shape
    Unknown {
        name: String,
    },
}

impl NodeKind {
    /// Short label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Module => "Module",
            NodeKind::ClassDef { .. } => "ClassDef",
            NodeKind::FunctionDef { .. } => "FunctionDef",
            NodeKind::Lambda { .. } => "Lambda",
            NodeKind::Arguments { .. } => "Arguments",
            NodeKind::Assign { .. } => "Assign",
            NodeKind::AugAssign { .. } => "AugAssign",
            NodeKind::AnnAssign { .. } => "AnnAssign",
            NodeKind::Expr { .. } => "Expr",
            NodeKind::Return { .. } => "Return",
            NodeKind::If { .. } => "If",
            NodeKind::While { .. } => "While",
            NodeKind::For { .. } => "For",
            NodeKind::With { .. } => "With",
            NodeKind::Try { .. } => "Try",
            NodeKind::ExceptHandler { .. } => "ExceptHandler",
            NodeKind::Import { .. } => "Import",
            NodeKind::ImportFrom { .. } => "ImportFrom",
            NodeKind::Global { .. } => "Global",
            NodeKind::Pass => "Pass",
            NodeKind::Break => "Break",
            NodeKind::Continue => "Continue",
            NodeKind::Statement { label } => label,
            NodeKind::Name { .. } => "Name",
            NodeKind::AssignName { .. } => "AssignName",
            NodeKind::Attribute { .. } => "Attribute",
            NodeKind::AssignAttr { .. } => "AssignAttr",
            NodeKind::Call { .. } => "Call",
            NodeKind::Keyword { .. } => "Keyword",
            NodeKind::Const(_) => "Const",
            NodeKind::Sequence { kind, .. } => match kind {
                SequenceKind::List => "List",
                SequenceKind::Tuple => "Tuple",
                SequenceKind::Set => "Set",
            },
            NodeKind::Dict { .. } => "Dict",
            NodeKind::DictUnpack => "DictUnpack",
            NodeKind::BinOp { .. } => "BinOp",
            NodeKind::UnaryOp { .. } => "UnaryOp",
            NodeKind::BoolOp { .. } => "BoolOp",
            NodeKind::Compare { .. } => "Compare",
            NodeKind::Subscript { .. } => "Subscript",
            NodeKind::Slice { .. } => "Slice",
            NodeKind::IfExp { .. } => "IfExp",
            NodeKind::Starred { .. } => "Starred",
            NodeKind::NamedExpr { .. } => "NamedExpr",
            NodeKind::Comprehension { .. } => "Comprehension",
            NodeKind::JoinedStr => "JoinedStr",
            NodeKind::Opaque { label } => label,
            NodeKind::Unknown { .. } => "Unknown",
        }
    }

    /// Whether this node owns a symbol table
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            NodeKind::Module | NodeKind::ClassDef { .. } | NodeKind::FunctionDef { .. } | NodeKind::Lambda { .. }
        )
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Module
                | NodeKind::ClassDef { .. }
                | NodeKind::FunctionDef { .. }
                | NodeKind::Assign { .. }
                | NodeKind::AugAssign { .. }
                | NodeKind::AnnAssign { .. }
                | NodeKind::Expr { .. }
                | NodeKind::Return { .. }
                | NodeKind::If { .. }
                | NodeKind::While { .. }
                | NodeKind::For { .. }
                | NodeKind::With { .. }
                | NodeKind::Try { .. }
                | NodeKind::ExceptHandler { .. }
                | NodeKind::Import { .. }
                | NodeKind::ImportFrom { .. }
                | NodeKind::Global { .. }
                | NodeKind::Pass
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Statement { .. }
                | NodeKind::Unknown { .. }
        )
    }

    /// Name bound by a definition-like node
    pub fn def_name(&self) -> Option<&str> {
        match self {
            NodeKind::ClassDef { name, .. } | NodeKind::FunctionDef { name, .. } => Some(name),
            NodeKind::AssignName { name } => Some(name),
            NodeKind::Unknown { name } => Some(name),
            _ => None,
        }
    }
}

/// One entry of a module's arena
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Scope whose symbol table resolves names used in this node
    pub scope: NodeId,
    pub location: Location,
    /// Line at which the definition becomes effective (the `def`/`class`
    /// line for decorated constructs)
    pub from_line: u32,
    pub children: SmallVec<[NodeId; 4]>,
}

/// A built module: node arena, metadata and shared scope tables
#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    name: String,
    file: Option<PathBuf>,
    file_bytes: Option<Vec<u8>>,
    file_encoding: Option<String>,
    package: bool,
    pure_python: bool,
    future_imports: BTreeSet<String>,
    nodes: Vec<Node>,
    tables: Arc<ScopeTables>,
}

/// Everything the builder hands over to create a [`Module`]
#[derive(Debug)]
pub struct ModuleParts {
    pub name: String,
    pub file: Option<PathBuf>,
    pub file_bytes: Option<Vec<u8>>,
    pub file_encoding: Option<String>,
    pub package: bool,
    pub pure_python: bool,
    pub future_imports: BTreeSet<String>,
    pub nodes: Vec<Node>,
    pub tables: ScopeTables,
}

impl Module {
    pub fn new(parts: ModuleParts) -> Self {
        Self {
            id: ModuleId::fresh(),
            name: parts.name,
            file: parts.file,
            file_bytes: parts.file_bytes,
            file_encoding: parts.file_encoding,
            package: parts.package,
            pure_python: parts.pure_python,
            future_imports: parts.future_imports,
            nodes: parts.nodes,
            tables: Arc::new(parts.tables),
        }
    }

    /// Copy of this module with some node payloads replaced.
    ///
    /// Identity, metadata and scope tables are shared with `self`.
    pub fn with_replaced_kinds(&self, replacements: Vec<(NodeId, NodeKind)>) -> Self {
        let mut nodes = self.nodes.clone();
        for (id, kind) in replacements {
            if let Some(node) = nodes.get_mut(id.0) {
                node.kind = kind;
            }
        }
        Self {
            id: self.id,
            name: self.name.clone(),
            file: self.file.clone(),
            file_bytes: self.file_bytes.clone(),
            file_encoding: self.file_encoding.clone(),
            package: self.package,
            pure_python: self.pure_python,
            future_imports: self.future_imports.clone(),
            nodes,
            tables: Arc::clone(&self.tables),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// File path for diagnostics, or the `<?>` sentinel
    pub fn file_display(&self) -> String {
        self.file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| NO_FILE.to_string())
    }

    pub fn file_bytes(&self) -> Option<&[u8]> {
        self.file_bytes.as_deref()
    }

    pub fn file_encoding(&self) -> Option<&str> {
        self.file_encoding.as_deref()
    }

    pub fn is_package(&self) -> bool {
        self.package
    }

    /// False for modules reconstructed by introspection
    pub fn is_pure_python(&self) -> bool {
        self.pure_python
    }

    pub fn future_imports(&self) -> &BTreeSet<String> {
        &self.future_imports
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn tables(&self) -> &ScopeTables {
        &self.tables
    }

    /// Symbol tables of a scope node
    pub fn scope(&self, id: NodeId) -> Option<&Scope> {
        self.tables.get(id)
    }
}
