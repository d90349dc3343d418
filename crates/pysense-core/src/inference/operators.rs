//! Operators, comparisons, subscripts and conditional expressions

use super::attributes::{igetattr, infer_attribute};
use super::calls::infer_call_result;
use super::classes::class_lookup;
use super::names::infer_name;
use super::{fail, infer_node, lazy, once, single_value, CallContext, InferIter, InferenceContext, Value};
use crate::error::InferenceError;
use crate::manager::AstManager;
use crate::tree::{Constant, NodeId, NodeKind, NodeRef, SequenceKind};
use rustpython_ast::{CmpOp, Operator, UnaryOp};
use std::sync::Arc;

/// Folded sequences and strings larger than this are left uninferred
const MAX_FOLDED_LEN: usize = 10_000;

/// Ok values of a stream, or its first error when it produced nothing else
fn collect_values(values: InferIter) -> Result<Vec<Value>, InferenceError> {
    let mut collected = Vec::new();
    let mut first_err = None;
    for value in values {
        match value {
            Ok(value) => collected.push(value),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) if collected.is_empty() => Err(err),
        _ => Ok(collected),
    }
}

fn operand_values(mgr: &Arc<AstManager>, node: &NodeRef, ctx: &InferenceContext) -> Result<Vec<Value>, InferenceError> {
    collect_values(infer_node(mgr, node, ctx.clone()))
}

pub(crate) fn infer_binop(mgr: &Arc<AstManager>, node: &NodeRef, ctx: InferenceContext) -> InferIter {
    let NodeKind::BinOp { op, left, right } = node.kind() else {
        return once(Value::Uninferable);
    };
    let (op, left, right) = (*op, node.at(*left), node.at(*right));
    let mgr = Arc::clone(mgr);
    lazy(move || {
        let lefts = operand_values(&mgr, &left, &ctx);
        let rights = operand_values(&mgr, &right, &ctx);
        combine(&mgr, op, lefts, rights, Some(left), right, false, &ctx)
    })
}

pub(crate) fn infer_augassign(mgr: &Arc<AstManager>, node: &NodeRef, ctx: InferenceContext) -> InferIter {
    let NodeKind::AugAssign { target, op, value } = node.kind() else {
        return once(Value::Uninferable);
    };
    let (op, target, value) = (*op, node.at(*target), node.at(*value));
    let mgr = Arc::clone(mgr);
    lazy(move || {
        // the target's value before this statement
        let before: InferIter = match target.kind() {
            NodeKind::AssignName { name } => infer_name(&mgr, &target, name, ctx.clone()),
            NodeKind::AssignAttr { value, attr } => infer_attribute(&mgr, &target.at(*value), attr, ctx.clone()),
            _ => infer_node(&mgr, &target, ctx.clone()),
        };
        let lefts = collect_values(before);
        let rights = operand_values(&mgr, &value, &ctx);
        combine(&mgr, op, lefts, rights, None, value, true, &ctx)
    })
}

#[allow(clippy::too_many_arguments)]
fn combine(
    mgr: &Arc<AstManager>,
    op: Operator,
    lefts: Result<Vec<Value>, InferenceError>,
    rights: Result<Vec<Value>, InferenceError>,
    left_node: Option<NodeRef>,
    right_node: NodeRef,
    augmented: bool,
    ctx: &InferenceContext,
) -> InferIter {
    let (lefts, rights) = match (lefts, rights) {
        (Ok(lefts), Ok(rights)) => (lefts, rights),
        (Err(err), _) | (_, Err(err)) => return fail(err),
    };
    let mut results: Vec<InferIter> = Vec::with_capacity(lefts.len() * rights.len());
    for left in &lefts {
        for right in &rights {
            results.push(binary(mgr, op, left, right, left_node.as_ref(), &right_node, augmented, ctx));
        }
    }
    Box::new(results.into_iter().flatten())
}

#[allow(clippy::too_many_arguments)]
fn binary(
    mgr: &Arc<AstManager>,
    op: Operator,
    left: &Value,
    right: &Value,
    left_node: Option<&NodeRef>,
    right_node: &NodeRef,
    augmented: bool,
    ctx: &InferenceContext,
) -> InferIter {
    match (left, right) {
        (Value::Uninferable, _) | (_, Value::Uninferable) => once(Value::Uninferable),
        (Value::Const(a), Value::Const(b)) => once(fold(op, a, b).map(Value::Const).unwrap_or(Value::Uninferable)),
        (Value::Sequence { kind: lk, elts: le }, Value::Sequence { kind: rk, elts: re })
            if op == Operator::Add && lk == rk && *lk != SequenceKind::Set =>
        {
            let elts: Vec<NodeRef> = le.iter().chain(re).cloned().collect();
            once(Value::Sequence { kind: *lk, elts })
        }
        (Value::Sequence { kind, elts }, Value::Const(count)) | (Value::Const(count), Value::Sequence { kind, elts })
            if op == Operator::Mult && *kind != SequenceKind::Set =>
        {
            match as_int(count).and_then(|n| repeat(elts, n)) {
                Some(elts) => once(Value::Sequence { kind: *kind, elts }),
                None => once(Value::Uninferable),
            }
        }
        (Value::Instance(_), _) => {
            let mut methods = Vec::new();
            if augmented {
                methods.push(inplace_dunder(op));
            }
            methods.push(dunder(op).to_string());
            for method in methods {
                if let Some(values) = call_dunder(mgr, left, &method, vec![right_node.clone()], ctx) {
                    return values;
                }
            }
            reflected(mgr, right, op, left_node, ctx)
        }
        _ => reflected(mgr, right, op, left_node, ctx),
    }
}

fn reflected(
    mgr: &Arc<AstManager>,
    right: &Value,
    op: Operator,
    left_node: Option<&NodeRef>,
    ctx: &InferenceContext,
) -> InferIter {
    match (right, left_node) {
        (Value::Instance(_), Some(left_node)) => {
            call_dunder(mgr, right, &reflected_dunder(op), vec![left_node.clone()], ctx)
                .unwrap_or_else(|| once(Value::Uninferable))
        }
        _ => once(Value::Uninferable),
    }
}

/// Call `method` on an instance when its class defines it
fn call_dunder(
    mgr: &Arc<AstManager>,
    instance: &Value,
    method: &str,
    args: Vec<NodeRef>,
    ctx: &InferenceContext,
) -> Option<InferIter> {
    let Value::Instance(class) = instance else {
        return None;
    };
    if class_lookup(mgr, class, method).is_empty() {
        return None;
    }
    let mgr = Arc::clone(mgr);
    let call = CallContext::new(args, Vec::new());
    let ctx = ctx.clone();
    let methods = igetattr(&mgr, instance, method, ctx.clone());
    Some(Box::new(methods.flat_map(move |method| match method {
        Ok(Value::Uninferable) => once(Value::Uninferable),
        Ok(method) => infer_call_result(&mgr, &method, &call, ctx.clone()),
        Err(err) => fail(err),
    })))
}

fn dunder(op: Operator) -> &'static str {
    match op {
        Operator::Add => "__add__",
        Operator::Sub => "__sub__",
        Operator::Mult => "__mul__",
        Operator::MatMult => "__matmul__",
        Operator::Div => "__truediv__",
        Operator::Mod => "__mod__",
        Operator::Pow => "__pow__",
        Operator::LShift => "__lshift__",
        Operator::RShift => "__rshift__",
        Operator::BitOr => "__or__",
        Operator::BitXor => "__xor__",
        Operator::BitAnd => "__and__",
        Operator::FloorDiv => "__floordiv__",
    }
}

fn reflected_dunder(op: Operator) -> String {
    format!("__r{}", &dunder(op)[2..])
}

fn inplace_dunder(op: Operator) -> String {
    format!("__i{}", &dunder(op)[2..])
}

fn as_int(c: &Constant) -> Option<i64> {
    match c {
        Constant::Int(n) => Some(*n),
        Constant::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn as_float(c: &Constant) -> Option<f64> {
    match c {
        Constant::Float(x) => Some(*x),
        other => as_int(other).map(|n| n as f64),
    }
}

fn repeat<T: Clone>(items: &[T], count: i64) -> Option<Vec<T>> {
    let count = usize::try_from(count).unwrap_or(0);
    if items.len().saturating_mul(count) > MAX_FOLDED_LEN {
        return None;
    }
    Some(items.iter().cloned().cycle().take(items.len() * count).collect())
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

/// Evaluate `a op b` on constants, `None` when Python would raise or the
/// result falls outside what a constant can hold
pub(crate) fn fold(op: Operator, a: &Constant, b: &Constant) -> Option<Constant> {
    use Constant::*;
    match (a, b) {
        (Str(x), Str(y)) if op == Operator::Add => Some(Str(format!("{}{}", x, y))),
        (Bytes(x), Bytes(y)) if op == Operator::Add => Some(Bytes([x.as_slice(), y.as_slice()].concat())),
        (Str(s), n) | (n, Str(s)) if op == Operator::Mult => {
            let chars: Vec<char> = s.chars().collect();
            repeat(&chars, as_int(n)?).map(|chars| Str(chars.into_iter().collect()))
        }
        (Bytes(s), n) | (n, Bytes(s)) if op == Operator::Mult => repeat(s, as_int(n)?).map(Bytes),
        (Bool(x), Bool(y)) => match op {
            Operator::BitAnd => Some(Bool(*x & *y)),
            Operator::BitOr => Some(Bool(*x | *y)),
            Operator::BitXor => Some(Bool(*x ^ *y)),
            _ => fold_int(op, i64::from(*x), i64::from(*y)),
        },
        _ => match (as_int(a), as_int(b)) {
            (Some(x), Some(y)) => fold_int(op, x, y),
            _ => fold_float(op, as_float(a)?, as_float(b)?),
        },
    }
}

fn fold_int(op: Operator, x: i64, y: i64) -> Option<Constant> {
    let value = match op {
        Operator::Add => x.checked_add(y)?,
        Operator::Sub => x.checked_sub(y)?,
        Operator::Mult => x.checked_mul(y)?,
        Operator::FloorDiv => floor_div(x, y)?,
        Operator::Mod => floor_mod(x, y)?,
        Operator::Pow => match u32::try_from(y) {
            Ok(exp) => x.checked_pow(exp)?,
            Err(_) => return fold_float(op, x as f64, y as f64),
        },
        Operator::Div => return fold_float(op, x as f64, y as f64),
        Operator::LShift => x.checked_mul(2i64.checked_pow(u32::try_from(y).ok()?)?)?,
        Operator::RShift => x.checked_shr(u32::try_from(y).ok()?.min(63))?,
        Operator::BitAnd => x & y,
        Operator::BitOr => x | y,
        Operator::BitXor => x ^ y,
        Operator::MatMult => return None,
    };
    Some(Constant::Int(value))
}

fn fold_float(op: Operator, x: f64, y: f64) -> Option<Constant> {
    let value = match op {
        Operator::Add => x + y,
        Operator::Sub => x - y,
        Operator::Mult => x * y,
        Operator::Div if y != 0.0 => x / y,
        Operator::FloorDiv if y != 0.0 => (x / y).floor(),
        Operator::Mod if y != 0.0 => x - y * (x / y).floor(),
        Operator::Pow => x.powf(y),
        _ => return None,
    };
    value.is_finite().then_some(Constant::Float(value))
}

pub(crate) fn infer_unaryop(mgr: &Arc<AstManager>, node: &NodeRef, ctx: InferenceContext) -> InferIter {
    let NodeKind::UnaryOp { op, operand } = node.kind() else {
        return once(Value::Uninferable);
    };
    let op = *op;
    let mgr = Arc::clone(mgr);
    let operands = infer_node(&mgr, &node.at(*operand), ctx.clone());
    Box::new(operands.flat_map(move |operand| -> InferIter {
        let operand = match operand {
            Ok(operand) => operand,
            Err(err) => return fail(err),
        };
        match (&operand, op) {
            (Value::Const(c), UnaryOp::Not) => once(Value::Const(Constant::Bool(!c.truthy()))),
            (Value::Sequence { elts, .. }, UnaryOp::Not) => once(Value::Const(Constant::Bool(elts.is_empty()))),
            (Value::Dict { items }, UnaryOp::Not) => once(Value::Const(Constant::Bool(items.is_empty()))),
            (Value::Const(c), _) => once(fold_unary(op, c).map(Value::Const).unwrap_or(Value::Uninferable)),
            (Value::Instance(_), UnaryOp::USub | UnaryOp::UAdd | UnaryOp::Invert) => {
                let method = match op {
                    UnaryOp::USub => "__neg__",
                    UnaryOp::UAdd => "__pos__",
                    _ => "__invert__",
                };
                call_dunder(&mgr, &operand, method, Vec::new(), &ctx).unwrap_or_else(|| once(Value::Uninferable))
            }
            _ => once(Value::Uninferable),
        }
    }))
}

fn fold_unary(op: UnaryOp, c: &Constant) -> Option<Constant> {
    match (op, c) {
        (UnaryOp::Not, c) => Some(Constant::Bool(!c.truthy())),
        (UnaryOp::USub, Constant::Float(x)) => Some(Constant::Float(-x)),
        (UnaryOp::UAdd, Constant::Float(x)) => Some(Constant::Float(*x)),
        (UnaryOp::USub, c) => as_int(c)?.checked_neg().map(Constant::Int),
        (UnaryOp::UAdd, c) => as_int(c).map(Constant::Int),
        (UnaryOp::Invert, c) => as_int(c).map(|n| Constant::Int(!n)),
    }
}

/// Union of the values of every operand
pub(crate) fn infer_boolop(mgr: &Arc<AstManager>, node: &NodeRef, values: &[NodeId], ctx: InferenceContext) -> InferIter {
    let mgr = Arc::clone(mgr);
    let operands: Vec<NodeRef> = values.iter().map(|id| node.at(*id)).collect();
    Box::new(
        operands
            .into_iter()
            .flat_map(move |operand| infer_node(&mgr, &operand, ctx.clone())),
    )
}

pub(crate) fn infer_compare(mgr: &Arc<AstManager>, node: &NodeRef, ctx: InferenceContext) -> InferIter {
    let NodeKind::Compare { left, ops, comparators } = node.kind() else {
        return once(Value::Uninferable);
    };
    let operands: Vec<NodeRef> = std::iter::once(*left)
        .chain(comparators.iter().copied())
        .map(|id| node.at(id))
        .collect();
    let ops = ops.clone();
    let mgr = Arc::clone(mgr);
    lazy(move || {
        let mut constants = Vec::with_capacity(operands.len());
        for operand in &operands {
            match single_value(infer_node(&mgr, operand, ctx.clone())) {
                Some(Value::Const(c)) => constants.push(c),
                _ => return once(Value::Uninferable),
            }
        }
        let mut result = true;
        for (op, pair) in ops.iter().zip(constants.windows(2)) {
            match compare(*op, &pair[0], &pair[1]) {
                Some(true) => {}
                Some(false) => {
                    result = false;
                    break;
                }
                None => return once(Value::Uninferable),
            }
        }
        once(Value::Const(Constant::Bool(result)))
    })
}

fn compare(op: CmpOp, a: &Constant, b: &Constant) -> Option<bool> {
    use std::cmp::Ordering;
    let ordering = match (a, b) {
        (Constant::Str(x), Constant::Str(y)) => Some(x.cmp(y)),
        (Constant::Bytes(x), Constant::Bytes(y)) => Some(x.cmp(y)),
        _ => match (as_float(a), as_float(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    let equal = match ordering {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    };
    match op {
        CmpOp::Eq => Some(equal),
        CmpOp::NotEq => Some(!equal),
        CmpOp::Lt => ordering.map(|o| o == Ordering::Less),
        CmpOp::LtE => ordering.map(|o| o != Ordering::Greater),
        CmpOp::Gt => ordering.map(|o| o == Ordering::Greater),
        CmpOp::GtE => ordering.map(|o| o != Ordering::Less),
        CmpOp::Is | CmpOp::IsNot => {
            let singleton = matches!(a, Constant::None | Constant::Bool(_) | Constant::Ellipsis);
            if !singleton {
                return None;
            }
            Some((a == b) == (op == CmpOp::Is))
        }
        CmpOp::In | CmpOp::NotIn => {
            let contained = match (a, b) {
                (Constant::Str(x), Constant::Str(y)) => y.contains(x.as_str()),
                (Constant::Bytes(x), Constant::Bytes(y)) => x.is_empty() || y.windows(x.len()).any(|w| w == x.as_slice()),
                _ => return None,
            };
            Some(contained == (op == CmpOp::In))
        }
    }
}

pub(crate) fn infer_subscript(mgr: &Arc<AstManager>, node: &NodeRef, ctx: InferenceContext) -> InferIter {
    let NodeKind::Subscript { value, slice } = node.kind() else {
        return once(Value::Uninferable);
    };
    let (value, slice) = (node.at(*value), node.at(*slice));
    let mgr = Arc::clone(mgr);
    lazy(move || {
        let containers = match operand_values(&mgr, &value, &ctx) {
            Ok(containers) => containers,
            Err(err) => return fail(err),
        };
        let index = match slice.kind() {
            NodeKind::Slice { lower, upper, step } => {
                let bound = |id: &Option<NodeId>| slice_bound(&mgr, id.map(|id| slice.at(id)), &ctx);
                match (bound(lower), bound(upper), bound(step)) {
                    (Some(lower), Some(upper), Some(step)) => Index::Slice(lower, upper, step),
                    _ => Index::Unknown,
                }
            }
            _ => match single_value(infer_node(&mgr, &slice, ctx.clone())) {
                Some(Value::Const(c)) => Index::Key(c),
                _ => Index::Unknown,
            },
        };
        let results: Vec<InferIter> = containers
            .iter()
            .map(|container| subscript(&mgr, container, &index, &slice, &ctx))
            .collect();
        Box::new(results.into_iter().flatten())
    })
}

enum Index {
    Key(Constant),
    Slice(Option<i64>, Option<i64>, Option<i64>),
    Unknown,
}

/// Constant integer bound of a slice, `Some(None)` when omitted or `None`
fn slice_bound(mgr: &Arc<AstManager>, node: Option<NodeRef>, ctx: &InferenceContext) -> Option<Option<i64>> {
    let Some(node) = node else {
        return Some(None);
    };
    match single_value(infer_node(mgr, &node, ctx.clone()))? {
        Value::Const(Constant::None) => Some(None),
        Value::Const(c) => as_int(&c).map(Some),
        _ => None,
    }
}

fn subscript(
    mgr: &Arc<AstManager>,
    container: &Value,
    index: &Index,
    slice: &NodeRef,
    ctx: &InferenceContext,
) -> InferIter {
    let out_of_range = |type_name: &str| {
        fail(InferenceError::Subscript {
            message: format!("{} index out of range", type_name),
        })
    };
    match (container, index) {
        (Value::Uninferable, _) => once(Value::Uninferable),
        (Value::Sequence { kind, elts }, Index::Key(key)) if *kind != SequenceKind::Set => {
            let Some(i) = as_int(key) else {
                return once(Value::Uninferable);
            };
            match normalize(i, elts.len()).and_then(|i| elts.get(i)) {
                Some(elt) => infer_node(mgr, elt, ctx.clone()),
                None => out_of_range(kind.type_name()),
            }
        }
        (Value::Sequence { kind, elts }, Index::Slice(lower, upper, step)) if *kind != SequenceKind::Set => {
            match slice_indices(elts.len(), *lower, *upper, *step) {
                Some(indices) => once(Value::Sequence {
                    kind: *kind,
                    elts: indices.into_iter().map(|i| elts[i].clone()).collect(),
                }),
                None => once(Value::Uninferable),
            }
        }
        (Value::Const(Constant::Str(s)), Index::Key(key)) => {
            let chars: Vec<char> = s.chars().collect();
            let Some(i) = as_int(key) else {
                return once(Value::Uninferable);
            };
            match normalize(i, chars.len()) {
                Some(i) => once(Value::Const(Constant::Str(chars[i].to_string()))),
                None => out_of_range("string"),
            }
        }
        (Value::Const(Constant::Str(s)), Index::Slice(lower, upper, step)) => {
            let chars: Vec<char> = s.chars().collect();
            match slice_indices(chars.len(), *lower, *upper, *step) {
                Some(indices) => once(Value::Const(Constant::Str(indices.into_iter().map(|i| chars[i]).collect()))),
                None => once(Value::Uninferable),
            }
        }
        (Value::Const(Constant::Bytes(b)), Index::Key(key)) => {
            let Some(i) = as_int(key) else {
                return once(Value::Uninferable);
            };
            match normalize(i, b.len()) {
                Some(i) => once(Value::Const(Constant::Int(i64::from(b[i])))),
                None => out_of_range("bytes"),
            }
        }
        (Value::Dict { items }, Index::Key(key)) => dict_lookup(mgr, items, key, ctx),
        (Value::Instance(_), _) => call_dunder(mgr, container, "__getitem__", vec![slice.clone()], ctx)
            .unwrap_or_else(|| once(Value::Uninferable)),
        _ => once(Value::Uninferable),
    }
}

fn dict_lookup(mgr: &Arc<AstManager>, items: &[(NodeRef, NodeRef)], key: &Constant, ctx: &InferenceContext) -> InferIter {
    // later keys win, as in a dict display
    for (k, v) in items.iter().rev() {
        match single_value(infer_node(mgr, k, ctx.clone())) {
            Some(Value::Const(candidate)) if compare(CmpOp::Eq, &candidate, key) == Some(true) => {
                return infer_node(mgr, v, ctx.clone());
            }
            Some(Value::Const(_)) => {}
            _ => return once(Value::Uninferable),
        }
    }
    fail(InferenceError::Subscript {
        message: format!("key {} not found", key),
    })
}

fn normalize(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// Indices selected by `[lower:upper:step]` on a sequence of `len` items
fn slice_indices(len: usize, lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> Option<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return None;
    }
    let len = i64::try_from(len).ok()?;
    let (low, high) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let adjust = |bound: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };
    let start = lower.map_or(if step > 0 { 0 } else { len - 1 }, adjust);
    let stop = upper.map_or(if step > 0 { len } else { -1 }, adjust);
    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        indices.push(i as usize);
        i += step;
    }
    Some(indices)
}

pub(crate) fn infer_ifexp(
    mgr: &Arc<AstManager>,
    node: &NodeRef,
    test: NodeId,
    body: NodeId,
    orelse: NodeId,
    ctx: InferenceContext,
) -> InferIter {
    let (test, body, orelse) = (node.at(test), node.at(body), node.at(orelse));
    let mgr = Arc::clone(mgr);
    lazy(move || {
        let truth = match single_value(infer_node(&mgr, &test, ctx.clone())) {
            Some(Value::Const(c)) => Some(c.truthy()),
            Some(Value::Sequence { elts, .. }) => Some(!elts.is_empty()),
            Some(Value::Dict { items }) => Some(!items.is_empty()),
            _ => None,
        };
        match truth {
            Some(true) => infer_node(&mgr, &body, ctx),
            Some(false) => infer_node(&mgr, &orelse, ctx),
            None => {
                let first = infer_node(&mgr, &body, ctx.clone());
                let second = infer_node(&mgr, &orelse, ctx);
                Box::new(first.chain(second)) as InferIter
            }
        }
    })
}
