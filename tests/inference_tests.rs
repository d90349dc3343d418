use pysense_core::tree::SequenceKind;
use pysense_core::{
    extract_node, extract_nodes, parse, AstManager, Constant, InferenceError, ManagerConfig, NodeRef, Value,
};
use std::sync::Arc;

fn manager() -> Arc<AstManager> {
    AstManager::new(ManagerConfig::default())
}

/// Successful values for the node marked in `source`
fn infer_marked(mgr: &Arc<AstManager>, source: &str) -> Vec<Value> {
    let node = extract_node(mgr, source).unwrap();
    mgr.infer(&node, None).filter_map(Result::ok).collect()
}

fn int(value: i64) -> Value {
    Value::Const(Constant::Int(value))
}

fn string(value: &str) -> Value {
    Value::Const(Constant::Str(value.to_string()))
}

fn instance_of(value: &Value) -> Option<&str> {
    match value {
        Value::Instance(class) => class.name(),
        _ => None,
    }
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn test_tuple_concatenation_end_to_end() {
    let mgr = manager();
    let values = infer_marked(&mgr, "a = (1,)\nb = (2,)\nc = a + b\nc #@\n");
    assert_eq!(values.len(), 1);
    let Value::Sequence { kind, elts } = &values[0] else {
        panic!("expected a tuple, got {:?}", values[0]);
    };
    assert_eq!(*kind, SequenceKind::Tuple);
    assert_eq!(elts.len(), 2);
    let inferred: Vec<Value> = elts
        .iter()
        .flat_map(|elt| mgr.infer(elt, None).filter_map(Result::ok))
        .collect();
    assert_eq!(inferred, vec![int(1), int(2)]);
}

// ============================================================================
// Cycles
// ============================================================================

#[test]
fn test_self_assignment_terminates() {
    let mgr = manager();
    let values = infer_marked(&mgr, "a = a\na #@\n");
    assert!(values.iter().all(Value::is_uninferable));
}

#[test]
fn test_mutual_assignment_terminates() {
    let mgr = manager();
    let values = infer_marked(&mgr, "a = b\nb = a\na #@\n");
    assert!(values.iter().all(Value::is_uninferable));
}

#[test]
fn test_recursive_function_terminates() {
    let mgr = manager();
    let source = "def f(n):\n    return f(n - 1)\nf(3) #@\n";
    let node = extract_node(&mgr, source).unwrap();
    let count = mgr.infer(&node, None).count();
    assert!(count <= mgr.config().max_inferred);
}

// ============================================================================
// Result cache
// ============================================================================

#[test]
fn test_session_remembers_finished_results() {
    let mgr = manager();
    let node = extract_node(&mgr, "x = 1\nx #@\n").unwrap();
    let ctx = mgr.new_context();
    assert!(ctx.cached_results(&node).is_none());

    let values: Vec<Value> = mgr.infer(&node, Some(ctx.clone())).filter_map(Result::ok).collect();
    assert_eq!(values, vec![int(1)]);
    assert_eq!(ctx.cached_results(&node), Some(vec![int(1)]));
    assert!(mgr.new_context().cached_results(&node).is_none());

    // replayed values still draw on the budget
    let before = ctx.nodes_inferred();
    let again: Vec<Value> = mgr.infer(&node, Some(ctx.clone())).filter_map(Result::ok).collect();
    assert_eq!(again, vec![int(1)]);
    assert_eq!(ctx.nodes_inferred(), before + 1);
}

#[test]
fn test_unfinished_or_failed_results_are_not_remembered() {
    let mgr = manager();
    let node = extract_node(&mgr, "if c:\n    y = 1\nelse:\n    y = 2\ny #@\n").unwrap();
    let ctx = mgr.new_context();
    assert_eq!(mgr.infer(&node, Some(ctx.clone())).next(), Some(Ok(int(1))));
    assert!(ctx.cached_results(&node).is_none());

    let missing = extract_node(&mgr, "missing #@\n").unwrap();
    let ctx = mgr.new_context();
    assert_eq!(mgr.infer(&missing, Some(ctx.clone())).count(), 1);
    assert!(ctx.cached_results(&missing).is_none());
}

#[test]
fn test_cached_results_are_keyed_by_lookup_name() {
    let mgr = manager();
    let node = extract_node(&mgr, "x = 1\nx #@\n").unwrap();
    let ctx = mgr.new_context();
    mgr.infer(&node, Some(ctx.clone())).for_each(drop);
    assert!(ctx.cached_results(&node).is_some());
    assert!(ctx.with_lookup_name(Some("other".to_string())).cached_results(&node).is_none());
}

// ============================================================================
// Names and assignments
// ============================================================================

#[test]
fn test_reassignment_uses_latest_definition() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "x = 1\nx = x + 1\nx #@\n"), vec![int(2)]);
}

#[test]
fn test_conditional_definitions_all_candidates() {
    let mgr = manager();
    let source = "if flag:\n    x = 1\nelse:\n    x = 'a'\nx #@\n";
    assert_eq!(infer_marked(&mgr, source), vec![int(1), string("a")]);
}

#[test]
fn test_tuple_unpacking() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "a, b = 1, 'x'\nb #@\n"), vec![string("x")]);
    assert_eq!(infer_marked(&mgr, "(a, (b, c)) = (1, (2, 3))\nc #@\n"), vec![int(3)]);
}

#[test]
fn test_for_target_over_literal() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "for i in (1, 2):\n    pass\ni #@\n"), vec![int(1), int(2)]);
}

#[test]
fn test_undefined_name_is_an_error() {
    let mgr = manager();
    let node = extract_node(&mgr, "undefined_name #@\n").unwrap();
    let results: Vec<_> = mgr.infer(&node, None).collect();
    assert!(matches!(
        results.as_slice(),
        [Err(InferenceError::NameNotFound { name, .. })] if name == "undefined_name"
    ));
}

#[test]
fn test_builtin_name_resolves_to_builtins() {
    let mgr = manager();
    let values = infer_marked(&mgr, "int #@\n");
    assert!(matches!(&values[..], [Value::Class(class)] if class.module().name() == "builtins"));
}

#[test]
fn test_global_statement_binds_module_name() {
    let mgr = manager();
    let source = "def set_it():\n    global counter\n    counter = 5\nset_it()\ncounter #@\n";
    assert_eq!(infer_marked(&mgr, source), vec![int(5)]);
}

// ============================================================================
// Calls
// ============================================================================

#[test]
fn test_call_binds_arguments() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "def f(x):\n    return x\nf(3) #@\n"), vec![int(3)]);
    assert_eq!(infer_marked(&mgr, "def f(x, y=2):\n    return y\nf(1) #@\n"), vec![int(2)]);
    assert_eq!(infer_marked(&mgr, "def f(x, y=2):\n    return y\nf(1, y=7) #@\n"), vec![int(7)]);
}

#[test]
fn test_function_without_return_gives_none() {
    let mgr = manager();
    let values = infer_marked(&mgr, "def f():\n    pass\nf() #@\n");
    assert_eq!(values, vec![Value::Const(Constant::None)]);
}

#[test]
fn test_stub_body_call_is_uninferable() {
    let mgr = manager();
    let values = infer_marked(&mgr, "def f():\n    'doc'\n    ...\nf() #@\n");
    assert_eq!(values, vec![Value::Uninferable]);
    // a docstring alone is an ordinary body returning None
    let values = infer_marked(&mgr, "def g():\n    'doc'\ng() #@\n");
    assert_eq!(values, vec![Value::Const(Constant::None)]);
}

#[test]
fn test_class_call_gives_instance() {
    let mgr = manager();
    let values = infer_marked(&mgr, "class A:\n    pass\nA() #@\n");
    assert_eq!(values.len(), 1);
    assert_eq!(instance_of(&values[0]), Some("A"));
}

#[test]
fn test_empty_callee_is_uninferable_callee_error() {
    let mgr = manager();
    let node = extract_node(&mgr, "a = a\na() #@\n").unwrap();
    let results: Vec<_> = mgr.infer(&node, None).collect();
    assert!(matches!(results.as_slice(), [Err(InferenceError::UninferableCallee { .. })]));
}

#[test]
fn test_lambda_call() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "f = lambda: 'x'\nf() #@\n"), vec![string("x")]);
}

// ============================================================================
// Attributes and methods
// ============================================================================

#[test]
fn test_method_reads_instance_attribute() {
    let mgr = manager();
    let source = r#"
class A:
    def __init__(self):
        self.v = 'x'

    def get(self):
        return self.v

A().get() #@
"#;
    assert_eq!(infer_marked(&mgr, source), vec![string("x")]);
}

#[test]
fn test_property_yields_getter_result() {
    let mgr = manager();
    let source = "class A:\n    @property\n    def p(self):\n        return 42\nA().p #@\n";
    assert_eq!(infer_marked(&mgr, source), vec![int(42)]);
}

#[test]
fn test_classmethod_binds_class() {
    let mgr = manager();
    let source = "class A:\n    @classmethod\n    def make(cls):\n        return cls()\nA.make() #@\n";
    let values = infer_marked(&mgr, source);
    assert_eq!(values.len(), 1);
    assert_eq!(instance_of(&values[0]), Some("A"));
}

#[test]
fn test_inherited_method_found_through_mro() {
    let mgr = manager();
    let source = r#"
class Base:
    def name(self):
        return 'base'

class Child(Base):
    pass

Child().name() #@
"#;
    assert_eq!(infer_marked(&mgr, source), vec![string("base")]);
}

#[test]
fn test_bound_method_value() {
    let mgr = manager();
    let values = infer_marked(&mgr, "class A:\n    def m(self):\n        pass\nA().m #@\n");
    assert!(matches!(&values[..], [Value::BoundMethod { function, .. }] if function.name() == Some("m")));
}

#[test]
fn test_missing_attribute_is_an_error() {
    let mgr = manager();
    let node = extract_node(&mgr, "class A:\n    pass\nA().missing #@\n").unwrap();
    let results: Vec<_> = mgr.infer(&node, None).collect();
    assert!(matches!(
        results.as_slice(),
        [Err(InferenceError::AttributeNotFound { attr, .. })] if attr == "missing"
    ));
}

#[test]
fn test_builtin_method_on_literal() {
    let mgr = manager();
    let values = infer_marked(&mgr, "'a'.upper() #@\n");
    assert_eq!(values.len(), 1);
    assert_eq!(instance_of(&values[0]), Some("str"));
}

#[test]
fn test_user_dunder_add() {
    let mgr = manager();
    let source = r#"
class Money:
    def __add__(self, other):
        return 'sum'

Money() + Money() #@
"#;
    assert_eq!(infer_marked(&mgr, source), vec![string("sum")]);
}

#[test]
fn test_reflected_dunder() {
    let mgr = manager();
    let source = "class V:\n    def __radd__(self, other):\n        return 'r'\n1 + V() #@\n";
    assert_eq!(infer_marked(&mgr, source), vec![string("r")]);
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_constant_folding() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "2 * 3 + 1 #@\n"), vec![int(7)]);
    assert_eq!(infer_marked(&mgr, "-7 // 2 #@\n"), vec![int(-4)]);
    assert_eq!(infer_marked(&mgr, "'ab' * 2 #@\n"), vec![string("abab")]);
    assert_eq!(infer_marked(&mgr, "-(3) #@\n"), vec![int(-3)]);
    assert_eq!(infer_marked(&mgr, "not 0 #@\n"), vec![Value::Const(Constant::Bool(true))]);
}

#[test]
fn test_augmented_assignment() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "x = 1\nx += 2\nx #@\n"), vec![int(3)]);
}

#[test]
fn test_boolop_is_union_of_operands() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "0 or 'a' #@\n"), vec![int(0), string("a")]);
}

#[test]
fn test_compare_folding() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "1 < 2 #@\n"), vec![Value::Const(Constant::Bool(true))]);
    assert_eq!(infer_marked(&mgr, "'a' in 'cat' #@\n"), vec![Value::Const(Constant::Bool(true))]);
}

#[test]
fn test_ifexp_with_constant_test() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "1 if True else 'a' #@\n"), vec![int(1)]);
}

#[test]
fn test_subscripts() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "x = [1, 2, 3]\nx[1] #@\n"), vec![int(2)]);
    assert_eq!(infer_marked(&mgr, "x = [1, 2, 3]\nx[-1] #@\n"), vec![int(3)]);
    assert_eq!(infer_marked(&mgr, "{'a': 1, 'b': 2}['b'] #@\n"), vec![int(2)]);
    assert_eq!(infer_marked(&mgr, "'hello'[1:3] #@\n"), vec![string("el")]);
}

#[test]
fn test_out_of_range_subscript_is_an_error() {
    let mgr = manager();
    let node = extract_node(&mgr, "(1, 2)[5] #@\n").unwrap();
    let results: Vec<_> = mgr.infer(&node, None).collect();
    assert!(matches!(results.as_slice(), [Err(InferenceError::Subscript { .. })]));
}

// ============================================================================
// Call tips
// ============================================================================

#[test]
fn test_builtin_call_tips() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "len('abcd') #@\n"), vec![int(4)]);
    assert_eq!(
        infer_marked(&mgr, "isinstance('a', (int, str)) #@\n"),
        vec![Value::Const(Constant::Bool(true))]
    );
    assert_eq!(
        infer_marked(&mgr, "class A: pass\nclass B(A): pass\nissubclass(B, A) #@\n"),
        vec![Value::Const(Constant::Bool(true))]
    );
    assert_eq!(
        infer_marked(&mgr, "callable(len) #@\n"),
        vec![Value::Const(Constant::Bool(true))]
    );
    let types = infer_marked(&mgr, "type('a') #@\n");
    assert!(matches!(&types[..], [Value::Class(class)] if class.name() == Some("str")));
}

#[test]
fn test_extract_nodes_returns_every_marked_line() {
    let mgr = manager();
    let nodes: Vec<NodeRef> = extract_nodes(&mgr, "a = 1 #@\nb = 2\nb #@\n").unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].kind().label(), "Assign");
    assert_eq!(nodes[1].kind().label(), "Name");
}

#[test]
fn test_extract_node_defaults_to_last_statement() {
    let mgr = manager();
    let node = extract_node(&mgr, "a = 1\na\n").unwrap();
    assert_eq!(node.kind().label(), "Name");
    assert_eq!(node.location().line, 2);
}

#[test]
fn test_wrapped_expression_is_extracted_without_wrapper() {
    let mgr = manager();
    let nodes = extract_nodes(&mgr, "x = 2\ny = __(x) + 1\ny #@\n").unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].location().line, 3);
    assert_eq!(nodes[1].kind().label(), "Name");
    assert_eq!(nodes[1].parent().unwrap().kind().label(), "BinOp");

    let values: Vec<Value> = nodes.iter().flat_map(|node| mgr.infer(node, None).filter_map(Result::ok)).collect();
    assert_eq!(values, vec![int(3), int(2)]);
}

#[test]
fn test_wrapped_attribute_keeps_whole_expression() {
    let mgr = manager();
    let node = extract_node(&mgr, "class A:\n    b = 1\nprint(__(A.b))\n").unwrap();
    assert_eq!(node.kind().label(), "Attribute");
    assert_eq!(node.parent().unwrap().kind().label(), "Call");
    assert_eq!(mgr.infer(&node, None).filter_map(Result::ok).collect::<Vec<_>>(), vec![int(1)]);
}

#[test]
fn test_extraction_dedents_source() {
    let mgr = manager();
    assert_eq!(infer_marked(&mgr, "    a = 1\n    a #@\n"), vec![int(1)]);
}

#[test]
fn test_parse_dedents_source() {
    let mgr = manager();
    let module = parse(&mgr, "\n    def f():\n        return 1\n    F = f()\n", "dedented", None).unwrap();
    let root = NodeRef::root(&module);
    assert!(root.has_local("f"));
    let def = root.local_defs("F").pop().unwrap();
    let ctx = mgr.new_context().with_lookup_name(Some("F".to_string()));
    assert_eq!(mgr.infer(&def, Some(ctx)).filter_map(Result::ok).collect::<Vec<_>>(), vec![int(1)]);
}
