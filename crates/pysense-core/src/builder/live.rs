//! Partial trees for already-loaded modules
//!
//! A [`LiveModule`] describes a module that exists outside the source tree
//! (a native extension, the builtins). When it can hand over source text the
//! manager parses that; otherwise its members are turned into skeleton
//! definitions here.

use super::{BuiltModule, TreeBuilder};
use crate::tree::{Constant, Location, ModuleParts, NodeId, NodeKind};
use std::path::PathBuf;

/// A loaded module as seen by its loader
pub trait LiveModule {
    fn name(&self) -> &str;

    /// Location reported by the module's `__file__`
    fn file(&self) -> Option<PathBuf> {
        None
    }

    /// Source text supplied by the module's loader
    fn source(&self) -> Option<String> {
        None
    }

    fn members(&self) -> Vec<LiveMember> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveMember {
    pub name: String,
    pub kind: MemberKind,
}

impl LiveMember {
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Class { bases: Vec<String>, methods: Vec<String> },
    Function { params: Vec<String> },
    Constant(Constant),
    /// Something introspection cannot classify
    Unknown,
}

/// A loaded class or instance, named by where its class is defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveObject {
    Class { module: String, name: String },
    Instance { module: String, name: String },
}

impl LiveObject {
    pub fn class(module: impl Into<String>, name: impl Into<String>) -> Self {
        LiveObject::Class {
            module: module.into(),
            name: name.into(),
        }
    }

    pub fn instance(module: impl Into<String>, name: impl Into<String>) -> Self {
        LiveObject::Instance {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Module and class name
    pub fn class_path(&self) -> (&str, &str) {
        match self {
            LiveObject::Class { module, name } | LiveObject::Instance { module, name } => (module, name),
        }
    }
}

/// Skeleton module from a member listing
pub fn build_members(modname: &str, members: &[LiveMember]) -> BuiltModule {
    let mut builder = TreeBuilder::new("");
    let root = builder.start_module();
    for member in members {
        builder.live_member(root, member);
    }
    let tree = builder.finish();
    BuiltModule {
        parts: ModuleParts {
            name: modname.to_string(),
            file: None,
            file_bytes: None,
            file_encoding: None,
            package: false,
            pure_python: false,
            future_imports: tree.future_imports,
            nodes: tree.nodes,
            tables: tree.tables,
        },
        deferred: tree.deferred,
    }
}

impl TreeBuilder<'_> {
    fn live_member(&mut self, parent: NodeId, member: &LiveMember) {
        let loc = Location::default();
        match &member.kind {
            MemberKind::Class { bases, methods } => {
                let id = self.alloc(Some(parent), loc);
                let bases = bases
                    .iter()
                    .map(|base| {
                        let base_id = self.alloc(Some(id), loc);
                        self.set_kind(base_id, NodeKind::Name { id: base.clone() });
                        base_id
                    })
                    .collect();
                self.define(&member.name, id);
                self.enter_scope(id);
                let body = methods
                    .iter()
                    .map(|method| self.live_function(id, method, &["self".to_string()]))
                    .collect();
                self.leave_scope();
                self.set_kind(
                    id,
                    NodeKind::ClassDef {
                        name: member.name.clone(),
                        bases,
                        keywords: Vec::new(),
                        decorators: Vec::new(),
                        body,
                    },
                );
            }
            MemberKind::Function { params } => {
                self.live_function(parent, &member.name, params);
            }
            MemberKind::Constant(value) => {
                let id = self.alloc(Some(parent), loc);
                let target = self.alloc(Some(id), loc);
                self.set_kind(
                    target,
                    NodeKind::AssignName {
                        name: member.name.clone(),
                    },
                );
                self.define(&member.name, target);
                let value_id = self.alloc(Some(id), loc);
                self.set_kind(value_id, NodeKind::Const(value.clone()));
                self.set_kind(
                    id,
                    NodeKind::Assign {
                        targets: vec![target],
                        value: value_id,
                    },
                );
            }
            MemberKind::Unknown => {
                let id = self.alloc(Some(parent), loc);
                self.set_kind(
                    id,
                    NodeKind::Unknown {
                        name: member.name.clone(),
                    },
                );
                self.define(&member.name, id);
            }
        }
    }

    fn live_function(&mut self, parent: NodeId, name: &str, params: &[String]) -> NodeId {
        let loc = Location::default();
        let id = self.alloc(Some(parent), loc);
        self.define(name, id);
        let args = self.alloc(Some(id), loc);
        let params: Vec<NodeId> = params
            .iter()
            .map(|param| {
                let param_id = self.alloc_scoped(Some(args), loc, id);
                self.set_kind(param_id, NodeKind::AssignName { name: param.clone() });
                self.define_in(id, param, param_id);
                param_id
            })
            .collect();
        self.set_kind(
            args,
            NodeKind::Arguments {
                defaults: vec![None; params.len()],
                posonly: Vec::new(),
                args: params,
                vararg: None,
                kwonly: Vec::new(),
                kwarg: None,
                kw_defaults: Vec::new(),
            },
        );
        self.set_kind(
            id,
            NodeKind::FunctionDef {
                name: name.to_string(),
                args,
                decorators: Vec::new(),
                returns: None,
                body: Vec::new(),
                is_async: false,
                is_generator: false,
                introspected: true,
            },
        );
        id
    }
}
