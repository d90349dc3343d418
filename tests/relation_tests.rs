use pysense_core::{
    extract_node, extract_nodes, is_subtype, is_supertype, object_len, safe_infer, type_of, AstManager, Constant,
    LenError, ManagerConfig, NodeRef, NotDecidable, ProxyClass, Value,
};
use std::sync::Arc;

fn manager() -> Arc<AstManager> {
    AstManager::new(ManagerConfig::default())
}

fn class_name(value: &Value) -> Option<&str> {
    match value {
        Value::Class(class) => class.name(),
        _ => None,
    }
}

fn classes(mgr: &Arc<AstManager>, source: &str) -> Vec<NodeRef> {
    extract_nodes(mgr, source)
        .unwrap()
        .into_iter()
        .map(|node| match safe_infer(mgr, &node, None) {
            Some(Value::Class(class)) => class,
            other => panic!("expected a class, got {:?}", other),
        })
        .collect()
}

// ============================================================================
// type_of
// ============================================================================

#[test]
fn test_type_of_collapses_mixed_kinds() {
    let mgr = manager();
    let node = extract_node(&mgr, "if flag:\n    x = [1]\nelse:\n    x = 'a'\nx #@\n").unwrap();
    assert_eq!(type_of(&mgr, &node, None), Value::Uninferable);
}

#[test]
fn test_type_of_single_kind() {
    let mgr = manager();
    let node = extract_node(&mgr, "if flag:\n    x = 'b'\nelse:\n    x = 'a'\nx #@\n").unwrap();
    assert_eq!(class_name(&type_of(&mgr, &node, None)), Some("str"));
}

#[test]
fn test_type_of_values() {
    let mgr = manager();
    let check = |source: &str| type_of(&mgr, &extract_node(&mgr, source).unwrap(), None);

    assert_eq!(class_name(&check("class A: pass\nA() #@\n")), Some("A"));
    assert_eq!(class_name(&check("class A: pass\nA #@\n")), Some("type"));
    assert_eq!(class_name(&check("class M(type): pass\nclass A(metaclass=M): pass\nA #@\n")), Some("M"));
    assert_eq!(check("def f(): pass\nf #@\n"), Value::Proxy(ProxyClass::Function));
    assert_eq!(check("len #@\n"), Value::Proxy(ProxyClass::BuiltinFunction));
    assert_eq!(check("undefined #@\n"), Value::Uninferable);
}

// ============================================================================
// safe_infer
// ============================================================================

#[test]
fn test_safe_infer() {
    let mgr = manager();
    let single = extract_node(&mgr, "x = 1\nx #@\n").unwrap();
    assert_eq!(safe_infer(&mgr, &single, None), Some(Value::Const(Constant::Int(1))));

    let ambiguous = extract_node(&mgr, "if c:\n    x = 1\nelse:\n    x = 2\nx #@\n").unwrap();
    assert_eq!(safe_infer(&mgr, &ambiguous, None), None);

    let failing = extract_node(&mgr, "missing #@\n").unwrap();
    assert_eq!(safe_infer(&mgr, &failing, None), None);

    let empty = extract_node(&mgr, "a = a\na #@\n").unwrap();
    assert_eq!(safe_infer(&mgr, &empty, None), None);
}

// ============================================================================
// is_subtype / is_supertype
// ============================================================================

#[test]
fn test_builtin_subtypes() {
    let mgr = manager();
    let str_class = mgr.builtin_class("str").unwrap();
    let object = mgr.builtin_class("object").unwrap();
    let int = mgr.builtin_class("int").unwrap();
    let bool_class = mgr.builtin_class("bool").unwrap();

    assert_eq!(is_subtype(&mgr, &str_class, &object), Ok(true));
    assert_eq!(is_subtype(&mgr, &object, &str_class), Ok(false));
    assert_eq!(is_subtype(&mgr, &bool_class, &int), Ok(true));
    assert_eq!(is_supertype(&mgr, &int, &bool_class), Ok(true));
    assert_eq!(is_subtype(&mgr, &str_class, &int), Ok(false));
}

#[test]
fn test_user_hierarchy() {
    let mgr = manager();
    let source = "class A: pass\nclass B(A): pass\nclass C(B): pass\nA #@\nC #@\n";
    let found = classes(&mgr, source);
    let (a, c) = (&found[0], &found[1]);
    assert_eq!(is_subtype(&mgr, c, a), Ok(true));
    assert_eq!(is_supertype(&mgr, a, c), Ok(true));
    assert_eq!(is_subtype(&mgr, a, c), Ok(false));
    assert_eq!(is_subtype(&mgr, a, a), Ok(true));
}

#[test]
fn test_unknown_base_is_not_decidable() {
    let mgr = manager();
    let source = "from nowhere import Base\nclass X(Base): pass\nclass Y: pass\nX #@\nY #@\n";
    let found = classes(&mgr, source);
    let (x, y) = (&found[0], &found[1]);
    assert!(matches!(is_subtype(&mgr, x, y), Err(NotDecidable::UnknownBases(name)) if name == "X"));
    assert!(matches!(is_supertype(&mgr, y, x), Err(NotDecidable::UnknownBases(_))));
}

#[test]
fn test_inherits_from_unknown_class_is_not_decidable() {
    let mgr = manager();
    let source = "from nowhere import Base\nclass X(Base): pass\nclass Z(X): pass\nZ #@\n";
    let z = classes(&mgr, source).remove(0);
    let object = mgr.builtin_class("object").unwrap();
    assert!(is_subtype(&mgr, &z, &object).is_err());
}

#[test]
fn test_non_class_is_not_decidable() {
    let mgr = manager();
    let func = extract_node(&mgr, "def f(): pass\n").unwrap();
    let object = mgr.builtin_class("object").unwrap();
    assert!(matches!(is_subtype(&mgr, &func, &object), Err(NotDecidable::NotAClass(_))));
}

// ============================================================================
// object_len
// ============================================================================

fn len_of(mgr: &Arc<AstManager>, source: &str) -> Result<usize, LenError> {
    let node = extract_node(mgr, source).unwrap();
    object_len(mgr, &node, None)
}

#[test]
fn test_len_of_literals() {
    let mgr = manager();
    assert_eq!(len_of(&mgr, "(1, 2, 3) #@\n"), Ok(3));
    assert_eq!(len_of(&mgr, "'abcd' #@\n"), Ok(4));
    assert_eq!(len_of(&mgr, "b'ab' #@\n"), Ok(2));
    assert_eq!(len_of(&mgr, "{} #@\n"), Ok(0));
    assert_eq!(len_of(&mgr, "{'a': 1, 'b': 2} #@\n"), Ok(2));
    assert_eq!(len_of(&mgr, "x = [1, 2]\nx + [3] #@\n"), Ok(3));
}

#[test]
fn test_len_through_dunder_len() {
    let mgr = manager();
    let source = "class Bag:\n    def __len__(self):\n        return 5\nBag() #@\n";
    assert_eq!(len_of(&mgr, source), Ok(5));
}

#[test]
fn test_len_of_int_typed_result_is_zero() {
    let mgr = manager();
    let source = "class Bag:\n    def __len__(self):\n        return int()\nBag() #@\n";
    assert_eq!(len_of(&mgr, source), Ok(0));
}

#[test]
fn test_len_of_non_integer_result() {
    let mgr = manager();
    let source = "class Bag:\n    def __len__(self):\n        return 'five'\nBag() #@\n";
    assert!(matches!(len_of(&mgr, source), Err(LenError::NotAnInteger { type_name }) if type_name == "str"));
}

#[test]
fn test_len_of_negative_result_is_an_error() {
    let mgr = manager();
    let source = "class Bag:\n    def __len__(self):\n        return -3\nBag() #@\n";
    assert!(matches!(len_of(&mgr, source), Err(LenError::Negative { value: -3 })));
}

#[test]
fn test_len_without_dunder_len() {
    let mgr = manager();
    assert!(matches!(len_of(&mgr, "1 #@\n"), Err(LenError::NoLen { type_name }) if type_name == "int"));
}

#[test]
fn test_len_of_ambiguous_value_is_an_error() {
    let mgr = manager();
    let source = "if c:\n    x = 'a'\nelse:\n    x = 'bb'\nx #@\n";
    assert!(matches!(len_of(&mgr, source), Err(LenError::Inference(_))));
}

#[test]
fn test_self_referential_len_is_a_recursion_hazard() {
    let mgr = manager();
    let source = "class A:\n    def __len__(self):\n        return len(self #@\n        )\n";
    let node = extract_node(&mgr, source).unwrap();
    // the marked statement is the return; take the argument of len()
    let arg = match node.kind() {
        pysense_core::NodeKind::Return { value: Some(call) } => match node.at(*call).kind() {
            pysense_core::NodeKind::Call { args, .. } => node.at(args[0]),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    };
    assert!(matches!(
        object_len(&mgr, &arg, None),
        Err(LenError::RecursionHazard { .. })
    ));
}
