//! Lowering of rustpython statements and expressions into arena nodes

use super::TreeBuilder;
use crate::tree::{ComprehensionKind, Constant, ImportAlias, Location, NodeId, NodeKind, SequenceKind};
use rustpython_ast::{self as ast, Expr, Ranged, Stmt};

impl TreeBuilder<'_> {
    pub fn lower_module(&mut self, suite: &[Stmt]) {
        let root = self.start_module();
        for stmt in suite {
            self.stmt(stmt, root);
        }
    }

    fn loc(&self, node: &impl Ranged) -> Location {
        self.location(usize::from(node.start()))
    }

    fn block(&mut self, body: &[Stmt], parent: NodeId) -> Vec<NodeId> {
        body.iter().map(|stmt| self.stmt(stmt, parent)).collect()
    }

    fn stmt(&mut self, stmt: &Stmt, parent: NodeId) -> NodeId {
        let loc = self.loc(stmt);
        match stmt {
            Stmt::FunctionDef(f) => self.function_def(
                parent,
                loc,
                FunctionParts {
                    name: f.name.as_str(),
                    args: &f.args,
                    body: &f.body,
                    decorators: &f.decorator_list,
                    returns: f.returns.as_deref(),
                    is_async: false,
                },
            ),
            Stmt::AsyncFunctionDef(f) => self.function_def(
                parent,
                loc,
                FunctionParts {
                    name: f.name.as_str(),
                    args: &f.args,
                    body: &f.body,
                    decorators: &f.decorator_list,
                    returns: f.returns.as_deref(),
                    is_async: true,
                },
            ),
            Stmt::ClassDef(c) => self.class_def(parent, loc, c),
            _ => {
                let id = self.alloc(Some(parent), loc);
                let kind = self.simple_stmt(stmt, id);
                self.set_kind(id, kind);
                id
            }
        }
    }

    fn simple_stmt(&mut self, stmt: &Stmt, id: NodeId) -> NodeKind {
        match stmt {
            Stmt::Return(s) => NodeKind::Return {
                value: s.value.as_deref().map(|v| self.expr(v, id)),
            },
            Stmt::Assign(s) => {
                let targets = s.targets.iter().map(|t| self.target(t, id)).collect();
                let value = self.expr(&s.value, id);
                NodeKind::Assign { targets, value }
            }
            Stmt::AugAssign(s) => {
                let target = self.target(&s.target, id);
                let value = self.expr(&s.value, id);
                NodeKind::AugAssign {
                    target,
                    op: s.op,
                    value,
                }
            }
            Stmt::AnnAssign(s) => {
                let target = self.target(&s.target, id);
                let annotation = self.expr(&s.annotation, id);
                let value = s.value.as_deref().map(|v| self.expr(v, id));
                NodeKind::AnnAssign {
                    target,
                    annotation,
                    value,
                }
            }
            Stmt::For(s) => self.for_stmt(id, &s.target, &s.iter, &s.body, &s.orelse),
            Stmt::AsyncFor(s) => self.for_stmt(id, &s.target, &s.iter, &s.body, &s.orelse),
            Stmt::While(s) => NodeKind::While {
                test: self.expr(&s.test, id),
                body: self.block(&s.body, id),
                orelse: self.block(&s.orelse, id),
            },
            Stmt::If(s) => NodeKind::If {
                test: self.expr(&s.test, id),
                body: self.block(&s.body, id),
                orelse: self.block(&s.orelse, id),
            },
            Stmt::With(s) => self.with_stmt(id, &s.items, &s.body),
            Stmt::AsyncWith(s) => self.with_stmt(id, &s.items, &s.body),
            Stmt::Try(s) => self.try_stmt(id, &s.body, &s.handlers, &s.orelse, &s.finalbody),
            Stmt::TryStar(s) => self.try_stmt(id, &s.body, &s.handlers, &s.orelse, &s.finalbody),
            Stmt::Import(s) => {
                let names: Vec<ImportAlias> = s.names.iter().map(alias).collect();
                for name in &names {
                    self.define(name.bound_name(), id);
                }
                NodeKind::Import { names }
            }
            Stmt::ImportFrom(s) => {
                let module = s.module.as_ref().map(|m| m.as_str().to_string());
                let level = s.level.as_ref().map(|l| l.to_u32()).unwrap_or(0);
                let names: Vec<ImportAlias> = s.names.iter().map(alias).collect();
                if level == 0 && module.as_deref() == Some("__future__") {
                    for name in &names {
                        self.add_future_import(&name.name);
                    }
                }
                self.defer_import_from(id);
                NodeKind::ImportFrom { module, names, level }
            }
            Stmt::Global(s) => {
                let names: Vec<String> = s.names.iter().map(|n| n.as_str().to_string()).collect();
                for name in &names {
                    self.declare_global(name);
                }
                NodeKind::Global { names }
            }
            Stmt::Expr(s) => NodeKind::Expr {
                value: self.expr(&s.value, id),
            },
            Stmt::Pass(_) => NodeKind::Pass,
            Stmt::Break(_) => NodeKind::Break,
            Stmt::Continue(_) => NodeKind::Continue,
            Stmt::Match(s) => {
                for case in &s.cases {
                    self.block(&case.body, id);
                }
                NodeKind::Statement { label: "Match" }
            }
            Stmt::Raise(_) => NodeKind::Statement { label: "Raise" },
            Stmt::Delete(_) => NodeKind::Statement { label: "Delete" },
            Stmt::Assert(_) => NodeKind::Statement { label: "Assert" },
            Stmt::Nonlocal(_) => NodeKind::Statement { label: "Nonlocal" },
            _ => NodeKind::Statement { label: "Statement" },
        }
    }

    fn for_stmt(&mut self, id: NodeId, target: &Expr, iter: &Expr, body: &[Stmt], orelse: &[Stmt]) -> NodeKind {
        let target = self.target(target, id);
        let iter = self.expr(iter, id);
        NodeKind::For {
            target,
            iter,
            body: self.block(body, id),
            orelse: self.block(orelse, id),
        }
    }

    fn with_stmt(&mut self, id: NodeId, items: &[ast::WithItem], body: &[Stmt]) -> NodeKind {
        let items = items
            .iter()
            .map(|item| {
                let context = self.expr(&item.context_expr, id);
                let target = item.optional_vars.as_deref().map(|t| self.target(t, id));
                (context, target)
            })
            .collect();
        NodeKind::With {
            items,
            body: self.block(body, id),
        }
    }

    fn try_stmt(
        &mut self,
        id: NodeId,
        body: &[Stmt],
        handlers: &[ast::ExceptHandler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
    ) -> NodeKind {
        let body = self.block(body, id);
        let handlers = handlers
            .iter()
            .map(|handler| match handler {
                ast::ExceptHandler::ExceptHandler(h) => {
                    let hid = self.alloc(Some(id), self.loc(h));
                    let type_ = h.type_.as_deref().map(|t| self.expr(t, hid));
                    let name = h.name.as_ref().map(|n| {
                        let nid = self.alloc(Some(hid), self.node_location(hid));
                        self.set_kind(
                            nid,
                            NodeKind::AssignName {
                                name: n.as_str().to_string(),
                            },
                        );
                        self.define(n.as_str(), nid);
                        nid
                    });
                    let body = self.block(&h.body, hid);
                    self.set_kind(hid, NodeKind::ExceptHandler { type_, name, body });
                    hid
                }
            })
            .collect();
        NodeKind::Try {
            body,
            handlers,
            orelse: self.block(orelse, id),
            finalbody: self.block(finalbody, id),
        }
    }

    fn function_def(&mut self, parent: NodeId, loc: Location, parts: FunctionParts<'_>) -> NodeId {
        let id = self.alloc(Some(parent), loc);
        let decorators: Vec<NodeId> = parts.decorators.iter().map(|d| self.expr(d, id)).collect();
        let line = self.effective_line(loc, parts.decorators.last().map(|d| usize::from(d.end())));
        self.set_from_line(id, line);
        let returns = parts.returns.map(|r| self.expr(r, id));
        self.define(parts.name, id);

        let args = self.arguments(parts.args, id);
        self.enter_scope(id);
        let body = self.block(parts.body, id);
        self.leave_scope();

        let is_generator = self.is_generator(id);
        self.set_kind(
            id,
            NodeKind::FunctionDef {
                name: parts.name.to_string(),
                args,
                decorators,
                returns,
                body,
                is_async: parts.is_async,
                is_generator,
                introspected: false,
            },
        );
        id
    }

    fn class_def(&mut self, parent: NodeId, loc: Location, class: &ast::StmtClassDef) -> NodeId {
        let id = self.alloc(Some(parent), loc);
        let decorators: Vec<NodeId> = class.decorator_list.iter().map(|d| self.expr(d, id)).collect();
        let line = self.effective_line(loc, class.decorator_list.last().map(|d| usize::from(d.end())));
        self.set_from_line(id, line);
        let bases = class.bases.iter().map(|b| self.expr(b, id)).collect();
        let keywords = class.keywords.iter().map(|k| self.keyword(k, id)).collect();
        self.define(class.name.as_str(), id);

        self.enter_scope(id);
        let body = self.block(&class.body, id);
        self.leave_scope();

        self.set_kind(
            id,
            NodeKind::ClassDef {
                name: class.name.as_str().to_string(),
                bases,
                keywords,
                decorators,
                body,
            },
        );
        id
    }

    /// Parameters bind in `func`'s scope; defaults and annotations resolve
    /// in the enclosing one.
    fn arguments(&mut self, args: &ast::Arguments, func: NodeId) -> NodeId {
        let id = self.alloc(Some(func), self.node_location(func));

        let mut defaults = Vec::new();
        for arg in args.posonlyargs.iter().chain(&args.args) {
            defaults.push(arg.default.as_deref().map(|d| self.expr(d, id)));
        }
        let kw_defaults = args
            .kwonlyargs
            .iter()
            .map(|arg| arg.default.as_deref().map(|d| self.expr(d, id)))
            .collect();
        let annotations = args
            .posonlyargs
            .iter()
            .chain(&args.args)
            .chain(&args.kwonlyargs)
            .filter_map(|a| a.def.annotation.as_deref())
            .chain(args.vararg.iter().filter_map(|a| a.annotation.as_deref()))
            .chain(args.kwarg.iter().filter_map(|a| a.annotation.as_deref()))
            .collect::<Vec<_>>();
        for annotation in annotations {
            self.expr(annotation, id);
        }

        let posonly = args.posonlyargs.iter().map(|a| self.param(&a.def, id, func)).collect();
        let params = args.args.iter().map(|a| self.param(&a.def, id, func)).collect();
        let vararg = args.vararg.as_deref().map(|a| self.param(a, id, func));
        let kwonly = args.kwonlyargs.iter().map(|a| self.param(&a.def, id, func)).collect();
        let kwarg = args.kwarg.as_deref().map(|a| self.param(a, id, func));

        self.set_kind(
            id,
            NodeKind::Arguments {
                posonly,
                args: params,
                vararg,
                kwonly,
                kwarg,
                defaults,
                kw_defaults,
            },
        );
        id
    }

    fn param(&mut self, arg: &ast::Arg, parent: NodeId, func: NodeId) -> NodeId {
        let id = self.alloc_scoped(Some(parent), self.loc(arg), func);
        let name = arg.arg.as_str();
        self.set_kind(id, NodeKind::AssignName { name: name.to_string() });
        self.define_in(func, name, id);
        id
    }

    fn keyword(&mut self, keyword: &ast::Keyword, parent: NodeId) -> NodeId {
        let id = self.alloc(Some(parent), self.loc(keyword));
        let value = self.expr(&keyword.value, id);
        self.set_kind(
            id,
            NodeKind::Keyword {
                arg: keyword.arg.as_ref().map(|a| a.as_str().to_string()),
                value,
            },
        );
        id
    }

    /// Expression in store position
    fn target(&mut self, expr: &Expr, parent: NodeId) -> NodeId {
        let loc = self.loc(expr);
        match expr {
            Expr::Name(name) => {
                let id = self.alloc(Some(parent), loc);
                self.set_kind(
                    id,
                    NodeKind::AssignName {
                        name: name.id.as_str().to_string(),
                    },
                );
                self.define(name.id.as_str(), id);
                id
            }
            Expr::Attribute(attr) => {
                let id = self.alloc(Some(parent), loc);
                let value = self.expr(&attr.value, id);
                self.set_kind(
                    id,
                    NodeKind::AssignAttr {
                        value,
                        attr: attr.attr.as_str().to_string(),
                    },
                );
                self.defer_assign_attr(id);
                id
            }
            Expr::Tuple(seq) => self.target_sequence(parent, loc, SequenceKind::Tuple, &seq.elts),
            Expr::List(seq) => self.target_sequence(parent, loc, SequenceKind::List, &seq.elts),
            Expr::Starred(starred) => {
                let id = self.alloc(Some(parent), loc);
                let value = self.target(&starred.value, id);
                self.set_kind(id, NodeKind::Starred { value });
                id
            }
            _ => self.expr(expr, parent),
        }
    }

    fn target_sequence(&mut self, parent: NodeId, loc: Location, kind: SequenceKind, elts: &[Expr]) -> NodeId {
        let id = self.alloc(Some(parent), loc);
        let elts = elts.iter().map(|e| self.target(e, id)).collect();
        self.set_kind(id, NodeKind::Sequence { kind, elts });
        id
    }

    /// Expression in load position
    fn expr(&mut self, expr: &Expr, parent: NodeId) -> NodeId {
        let id = self.alloc(Some(parent), self.loc(expr));
        let kind = match expr {
            Expr::Name(e) => NodeKind::Name {
                id: e.id.as_str().to_string(),
            },
            Expr::Attribute(e) => NodeKind::Attribute {
                value: self.expr(&e.value, id),
                attr: e.attr.as_str().to_string(),
            },
            Expr::Call(e) => NodeKind::Call {
                func: self.expr(&e.func, id),
                args: e.args.iter().map(|a| self.expr(a, id)).collect(),
                keywords: e.keywords.iter().map(|k| self.keyword(k, id)).collect(),
            },
            Expr::Constant(e) => self.constant(&e.value, id),
            Expr::List(e) => self.sequence(id, SequenceKind::List, &e.elts),
            Expr::Tuple(e) => self.sequence(id, SequenceKind::Tuple, &e.elts),
            Expr::Set(e) => self.sequence(id, SequenceKind::Set, &e.elts),
            Expr::Dict(e) => {
                let mut keys = Vec::with_capacity(e.keys.len());
                for key in &e.keys {
                    let key = match key {
                        Some(key) => self.expr(key, id),
                        None => {
                            let unpack = self.alloc(Some(id), self.node_location(id));
                            self.set_kind(unpack, NodeKind::DictUnpack);
                            unpack
                        }
                    };
                    keys.push(key);
                }
                let values = e.values.iter().map(|v| self.expr(v, id)).collect();
                NodeKind::Dict { keys, values }
            }
            Expr::BinOp(e) => NodeKind::BinOp {
                op: e.op,
                left: self.expr(&e.left, id),
                right: self.expr(&e.right, id),
            },
            Expr::UnaryOp(e) => NodeKind::UnaryOp {
                op: e.op,
                operand: self.expr(&e.operand, id),
            },
            Expr::BoolOp(e) => NodeKind::BoolOp {
                op: e.op,
                values: e.values.iter().map(|v| self.expr(v, id)).collect(),
            },
            Expr::Compare(e) => NodeKind::Compare {
                left: self.expr(&e.left, id),
                ops: e.ops.clone(),
                comparators: e.comparators.iter().map(|c| self.expr(c, id)).collect(),
            },
            Expr::Subscript(e) => NodeKind::Subscript {
                value: self.expr(&e.value, id),
                slice: self.expr(&e.slice, id),
            },
            Expr::Slice(e) => NodeKind::Slice {
                lower: e.lower.as_deref().map(|x| self.expr(x, id)),
                upper: e.upper.as_deref().map(|x| self.expr(x, id)),
                step: e.step.as_deref().map(|x| self.expr(x, id)),
            },
            Expr::IfExp(e) => NodeKind::IfExp {
                test: self.expr(&e.test, id),
                body: self.expr(&e.body, id),
                orelse: self.expr(&e.orelse, id),
            },
            Expr::Starred(e) => NodeKind::Starred {
                value: self.expr(&e.value, id),
            },
            Expr::NamedExpr(e) => NodeKind::NamedExpr {
                target: self.target(&e.target, id),
                value: self.expr(&e.value, id),
            },
            Expr::Lambda(e) => {
                let args = self.arguments(&e.args, id);
                self.enter_scope(id);
                let body = self.expr(&e.body, id);
                self.leave_scope();
                NodeKind::Lambda { args, body }
            }
            Expr::ListComp(_) => NodeKind::Comprehension {
                kind: ComprehensionKind::List,
            },
            Expr::SetComp(_) => NodeKind::Comprehension {
                kind: ComprehensionKind::Set,
            },
            Expr::DictComp(_) => NodeKind::Comprehension {
                kind: ComprehensionKind::Dict,
            },
            Expr::GeneratorExp(_) => NodeKind::Comprehension {
                kind: ComprehensionKind::Generator,
            },
            Expr::JoinedStr(_) => NodeKind::JoinedStr,
            Expr::Yield(_) | Expr::YieldFrom(_) => {
                self.mark_generator();
                NodeKind::Opaque { label: "Yield" }
            }
            Expr::Await(_) => NodeKind::Opaque { label: "Await" },
            _ => NodeKind::Opaque { label: "Expr" },
        };
        self.set_kind(id, kind);
        id
    }

    fn sequence(&mut self, id: NodeId, kind: SequenceKind, elts: &[Expr]) -> NodeKind {
        NodeKind::Sequence {
            kind,
            elts: elts.iter().map(|e| self.expr(e, id)).collect(),
        }
    }

    fn constant(&mut self, value: &ast::Constant, id: NodeId) -> NodeKind {
        let constant = match value {
            ast::Constant::None => Constant::None,
            ast::Constant::Bool(b) => Constant::Bool(*b),
            ast::Constant::Str(s) => Constant::Str(s.clone()),
            ast::Constant::Bytes(b) => Constant::Bytes(b.clone()),
            ast::Constant::Int(i) => match i.to_string().parse::<i64>() {
                Ok(i) => Constant::Int(i),
                Err(_) => return NodeKind::Opaque { label: "BigInt" },
            },
            ast::Constant::Float(f) => Constant::Float(*f),
            ast::Constant::Complex { real, imag } => Constant::Complex {
                real: *real,
                imag: *imag,
            },
            ast::Constant::Ellipsis => Constant::Ellipsis,
            ast::Constant::Tuple(items) => {
                let loc = self.node_location(id);
                let elts = items
                    .iter()
                    .map(|item| {
                        let child = self.alloc(Some(id), loc);
                        let kind = self.constant(item, child);
                        self.set_kind(child, kind);
                        child
                    })
                    .collect();
                return NodeKind::Sequence {
                    kind: SequenceKind::Tuple,
                    elts,
                };
            }
        };
        NodeKind::Const(constant)
    }
}

struct FunctionParts<'a> {
    name: &'a str,
    args: &'a ast::Arguments,
    body: &'a [Stmt],
    decorators: &'a [Expr],
    returns: Option<&'a Expr>,
    is_async: bool,
}

fn alias(alias: &ast::Alias) -> ImportAlias {
    ImportAlias {
        name: alias.name.as_str().to_string(),
        asname: alias.asname.as_ref().map(|a| a.as_str().to_string()),
    }
}
