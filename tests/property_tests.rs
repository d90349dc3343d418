use proptest::prelude::*;
use pysense_core::tree::{DefNode, Definition, NodeId, SymbolTable};
use pysense_core::{extract_node, AstManager, Constant, InferenceContext, ManagerConfig, Value};
use pysense_core::inference::MAX_INFERENCE_DEPTH;

// ============================================================================
// Symbol tables
// ============================================================================

proptest! {
    #[test]
    fn prop_definitions_stay_line_ordered(lines in prop::collection::vec(1u32..50, 1..40)) {
        let mut table = SymbolTable::new();
        for (i, line) in lines.iter().enumerate() {
            table.insert("x", Definition { node: DefNode::Local(NodeId(i + 1)), line: *line });
        }
        let defs = table.get("x").unwrap();
        prop_assert_eq!(defs.len(), lines.len());
        for pair in defs.windows(2) {
            prop_assert!(pair[0].line <= pair[1].line);
            // equal lines keep insertion order
            if pair[0].line == pair[1].line {
                match (&pair[0].node, &pair[1].node) {
                    (DefNode::Local(a), DefNode::Local(b)) => prop_assert!(a < b),
                    _ => prop_assert!(false),
                }
            }
        }
    }

    #[test]
    fn prop_module_locals_follow_source_order(count in 1usize..15) {
        let mgr = AstManager::new(ManagerConfig::default());
        let source: String = (0..count).map(|i| format!("x = {}\n", i)).collect();
        let module = mgr.parse_source(&source, "ordered", None).unwrap();
        let defs = pysense_core::NodeRef::root(&module).local_defs("x");
        prop_assert_eq!(defs.len(), count);
        for pair in defs.windows(2) {
            prop_assert!(pair[0].location().line < pair[1].location().line);
        }
    }
}

// ============================================================================
// Budget
// ============================================================================

fn conditional_source(count: usize) -> String {
    let mut source: String = (0..count)
        .map(|i| format!("if c{}:\n    x = {}\n", i, i))
        .collect();
    source.push_str("x #@\n");
    source
}

proptest! {
    #[test]
    fn prop_budget_bounds_yielded_values(count in 1usize..25, cap in 1usize..60, preset in 0usize..60) {
        let preset = preset.min(cap);
        let mgr = AstManager::new(ManagerConfig::default());
        let node = extract_node(&mgr, &conditional_source(count)).unwrap();

        let ctx = InferenceContext::with_max_inferred(cap);
        ctx.set_nodes_inferred(preset);
        let yielded = mgr.infer(&node, Some(ctx.clone())).count();

        prop_assert!(yielded <= cap - preset);
        prop_assert!(ctx.nodes_inferred() <= cap);
    }

    #[test]
    fn prop_ample_budget_yields_every_definition(count in 1usize..25) {
        let mgr = AstManager::new(ManagerConfig::default());
        let node = extract_node(&mgr, &conditional_source(count)).unwrap();
        let ctx = InferenceContext::with_max_inferred(10_000);
        let values: Vec<Value> = mgr.infer(&node, Some(ctx)).filter_map(Result::ok).collect();
        let expected: Vec<Value> = (0..count).map(|i| Value::Const(Constant::Int(i as i64))).collect();
        prop_assert_eq!(values, expected);
    }
}

// ============================================================================
// Depth
// ============================================================================

/// `x0 = 1`, then `x{i} = x{i-1}`, probing the last name
fn name_chain(length: usize) -> String {
    let mut source = String::from("x0 = 1\n");
    for i in 1..length {
        source.push_str(&format!("x{} = x{}\n", i, i - 1));
    }
    source.push_str(&format!("x{} #@\n", length - 1));
    source
}

#[test]
fn test_deep_name_chain_stops_without_overflow() {
    let mgr = AstManager::new(ManagerConfig::default());
    let node = extract_node(&mgr, &name_chain(1500)).unwrap();
    let values: Vec<Value> = mgr.infer(&node, None).filter_map(Result::ok).collect();
    assert!(values.is_empty());

    // an unlimited budget still stops at the depth limit
    let ctx = InferenceContext::with_max_inferred(usize::MAX);
    let values: Vec<Value> = mgr.infer(&node, Some(ctx.clone())).filter_map(Result::ok).collect();
    assert!(values.is_empty());
    assert!(ctx.nodes_inferred() < MAX_INFERENCE_DEPTH);
}

proptest! {
    #[test]
    fn prop_short_name_chains_resolve(length in 1usize..60) {
        let mgr = AstManager::new(ManagerConfig::default());
        let node = extract_node(&mgr, &name_chain(length)).unwrap();
        let ctx = InferenceContext::with_max_inferred(10_000);
        let values: Vec<Value> = mgr.infer(&node, Some(ctx)).filter_map(Result::ok).collect();
        prop_assert_eq!(values, vec![Value::Const(Constant::Int(1))]);
    }
}

// ============================================================================
// Cycles
// ============================================================================

proptest! {
    #[test]
    fn prop_assignment_graphs_terminate(targets in prop::collection::vec(0usize..6, 1..6), queried in 0usize..6) {
        let count = targets.len();
        let queried = queried % count;
        let mut source: String = (0..count).map(|i| format!("v{} = {}\n", i, i)).collect();
        for (i, target) in targets.iter().enumerate() {
            source.push_str(&format!("if c{}:\n    v{} = v{}\n", i, i, target % count));
        }
        source.push_str(&format!("v{} #@\n", queried));

        let mgr = AstManager::new(ManagerConfig::default());
        let node = extract_node(&mgr, &source).unwrap();
        let values: Vec<Value> = mgr.infer(&node, None).filter_map(Result::ok).collect();

        prop_assert_eq!(values.first(), Some(&Value::Const(Constant::Int(queried as i64))));
        for value in &values {
            match value {
                Value::Const(Constant::Int(n)) => prop_assert!((*n as usize) < count),
                other => prop_assert!(false, "unexpected value {:?}", other),
            }
        }
    }
}
