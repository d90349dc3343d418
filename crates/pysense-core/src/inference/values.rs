//! Values produced by inference

use crate::tree::{Constant, NodeRef, SequenceKind};
use std::fmt;

/// Runtime category without a source definition of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyClass {
    Function,
    BuiltinFunction,
    Method,
    Module,
    Type,
}

impl ProxyClass {
    pub fn name(self) -> &'static str {
        match self {
            ProxyClass::Function => "function",
            ProxyClass::BuiltinFunction => "builtin_function_or_method",
            ProxyClass::Method => "method",
            ProxyClass::Module => "module",
            ProxyClass::Type => "type",
        }
    }
}

/// One possible runtime value of an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Known to exist, but nothing more can be said
    Uninferable,
    Const(Constant),
    Sequence { kind: SequenceKind, elts: Vec<NodeRef> },
    Dict { items: Vec<(NodeRef, NodeRef)> },
    Module(NodeRef),
    Class(NodeRef),
    Function(NodeRef),
    BoundMethod { function: NodeRef, bound: Box<Value> },
    Instance(NodeRef),
    Proxy(ProxyClass),
    /// Introspected member of unknown shape
    Unknown(NodeRef),
}

impl Value {
    pub fn is_uninferable(&self) -> bool {
        matches!(self, Value::Uninferable)
    }

    /// Class node when this value is a class
    pub fn as_class(&self) -> Option<&NodeRef> {
        match self {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Name of the builtin class for literal values
    pub fn builtin_type_name(&self) -> Option<&'static str> {
        match self {
            Value::Const(c) => Some(c.type_name()),
            Value::Sequence { kind, .. } => Some(kind.type_name()),
            Value::Dict { .. } => Some("dict"),
            _ => None,
        }
    }

    /// Python-level type name for diagnostics
    pub fn type_name(&self) -> String {
        match self {
            Value::Uninferable => "Uninferable".to_string(),
            Value::Const(_) | Value::Sequence { .. } | Value::Dict { .. } => {
                self.builtin_type_name().unwrap_or("object").to_string()
            }
            Value::Module(_) => "module".to_string(),
            Value::Class(_) => "type".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::BoundMethod { .. } => "method".to_string(),
            Value::Instance(class) => class.name().unwrap_or("object").to_string(),
            Value::Proxy(_) => "type".to_string(),
            Value::Unknown(_) => "unknown".to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uninferable => write!(f, "Uninferable"),
            Value::Const(c) => write!(f, "{}", c),
            Value::Sequence { kind, elts } => write!(f, "<{} of {} elements>", kind.type_name(), elts.len()),
            Value::Dict { items } => write!(f, "<dict of {} items>", items.len()),
            Value::Module(m) => write!(f, "<module '{}'>", m.module().name()),
            Value::Class(c) => write!(f, "<class '{}'>", c.name().unwrap_or("?")),
            Value::Function(func) => write!(f, "<function {}>", func.name().unwrap_or("<lambda>")),
            Value::BoundMethod { function, bound } => {
                write!(f, "<bound method {} of {}>", function.name().unwrap_or("<lambda>"), bound)
            }
            Value::Instance(c) => write!(f, "<{} instance>", c.name().unwrap_or("?")),
            Value::Proxy(p) => write!(f, "<class '{}'>", p.name()),
            Value::Unknown(n) => write!(f, "<unknown {}>", n.name().unwrap_or("?")),
        }
    }
}
