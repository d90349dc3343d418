//! Inference session state

use super::Value;
use crate::config::DEFAULT_MAX_INFERRED;
use crate::tree::{NodeKey, NodeRef};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Arguments captured at a call site
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    pub args: Vec<NodeRef>,
    pub keywords: Vec<(String, NodeRef)>,
    pub callee: Option<Value>,
}

impl CallContext {
    pub fn new(args: Vec<NodeRef>, keywords: Vec<(String, NodeRef)>) -> Self {
        Self {
            args,
            keywords,
            callee: None,
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&NodeRef> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

type ResultKey = (NodeKey, Option<String>);

#[derive(Debug, Clone)]
struct CachedResult {
    call_context: Option<Arc<CallContext>>,
    bound_node: Option<Value>,
    values: Arc<[Value]>,
}

/// Values of inference steps that ran to completion in one session.
///
/// Entries are keyed by node, lookup name, call context (by identity) and
/// bound node.
#[derive(Debug, Default)]
pub(crate) struct ResultCache {
    entries: Mutex<HashMap<ResultKey, Vec<CachedResult>>>,
}

fn same_call(a: &Option<Arc<CallContext>>, b: &Option<Arc<CallContext>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Where the result of one inference step is looked up and stored
pub(crate) struct ResultSlot {
    cache: Arc<ResultCache>,
    key: ResultKey,
    call_context: Option<Arc<CallContext>>,
    bound_node: Option<Value>,
}

impl ResultSlot {
    pub fn lookup(&self) -> Option<Arc<[Value]>> {
        let entries = self.cache.entries.lock();
        entries
            .get(&self.key)?
            .iter()
            .find(|entry| same_call(&entry.call_context, &self.call_context) && entry.bound_node == self.bound_node)
            .map(|entry| Arc::clone(&entry.values))
    }

    pub fn store(self, values: Vec<Value>) {
        let mut entries = self.cache.entries.lock();
        let slot = entries.entry(self.key).or_default();
        if slot
            .iter()
            .any(|entry| same_call(&entry.call_context, &self.call_context) && entry.bound_node == self.bound_node)
        {
            return;
        }
        slot.push(CachedResult {
            call_context: self.call_context,
            bound_node: self.bound_node,
            values: values.into(),
        });
    }
}

/// Nesting of inference steps one branch may reach, whatever the budget
pub const MAX_INFERENCE_DEPTH: usize = 256;

/// Per-session inference state.
///
/// Cloning copies the visited path and depth (cycle detection is per branch)
/// while the inferred-values counter and the result cache stay shared, so
/// every clone draws on one budget and reuses finished results.
#[derive(Clone)]
pub struct InferenceContext {
    path: HashSet<(NodeKey, Option<String>)>,
    pub lookup_name: Option<String>,
    pub call_context: Option<Arc<CallContext>>,
    pub bound_node: Option<Value>,
    extra_context: Arc<HashMap<NodeKey, InferenceContext>>,
    nodes_inferred: Arc<AtomicUsize>,
    max_inferred: usize,
    depth: usize,
    results: Arc<ResultCache>,
}

impl InferenceContext {
    pub fn new() -> Self {
        Self::with_max_inferred(DEFAULT_MAX_INFERRED)
    }

    pub fn with_max_inferred(max_inferred: usize) -> Self {
        Self {
            path: HashSet::new(),
            lookup_name: None,
            call_context: None,
            bound_node: None,
            extra_context: Arc::new(HashMap::new()),
            nodes_inferred: Arc::new(AtomicUsize::new(0)),
            max_inferred,
            depth: 0,
            results: Arc::new(ResultCache::default()),
        }
    }

    /// Record that inference enters `node` for the current lookup name.
    ///
    /// Returns `false` when the pair is already on this path: a cycle.
    pub fn enter(&mut self, node: &NodeRef) -> bool {
        self.path.insert((node.key(), self.lookup_name.clone()))
    }

    pub fn is_visited(&self, node: &NodeRef) -> bool {
        self.path.contains(&(node.key(), self.lookup_name.clone()))
    }

    pub fn with_bound_node(&self, bound: Value) -> Self {
        let mut ctx = self.clone();
        ctx.bound_node = Some(bound);
        ctx
    }

    pub fn with_lookup_name(&self, name: Option<String>) -> Self {
        let mut ctx = self.clone();
        ctx.lookup_name = name;
        ctx
    }

    /// Context recorded for inferring `node` (arguments remember their caller)
    pub fn extra_context(&self, node: &NodeRef) -> Option<&InferenceContext> {
        self.extra_context.get(&node.key())
    }

    pub fn set_extra_context(&mut self, node: &NodeRef, ctx: InferenceContext) {
        Arc::make_mut(&mut self.extra_context).insert(node.key(), ctx);
    }

    pub fn nodes_inferred(&self) -> usize {
        self.nodes_inferred.load(Ordering::SeqCst)
    }

    /// Preset the shared counter (every clone observes the new value)
    pub fn set_nodes_inferred(&self, count: usize) {
        self.nodes_inferred.store(count, Ordering::SeqCst);
    }

    pub fn max_inferred(&self) -> usize {
        self.max_inferred
    }

    pub fn budget_exhausted(&self) -> bool {
        self.nodes_inferred() >= self.max_inferred
    }

    /// Inference steps between the session's first node and this branch
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Step one level deeper; `false` once the budget is spent or the branch
    /// is [`MAX_INFERENCE_DEPTH`] levels deep
    pub(crate) fn descend(&mut self) -> bool {
        if self.budget_exhausted() || self.depth >= MAX_INFERENCE_DEPTH {
            return false;
        }
        self.depth += 1;
        true
    }

    /// Values recorded for `node` under this context's lookup name, call
    /// context and bound node, when an earlier step of the session finished
    /// inferring it
    pub fn cached_results(&self, node: &NodeRef) -> Option<Vec<Value>> {
        self.result_slot(node).lookup().map(|values| values.to_vec())
    }

    pub(crate) fn result_slot(&self, node: &NodeRef) -> ResultSlot {
        ResultSlot {
            cache: Arc::clone(&self.results),
            key: (node.key(), self.lookup_name.clone()),
            call_context: self.call_context.clone(),
            bound_node: self.bound_node.clone(),
        }
    }

    pub(crate) fn budget(&self) -> Budget {
        Budget {
            counter: Arc::clone(&self.nodes_inferred),
            cap: self.max_inferred,
        }
    }
}

impl Default for InferenceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InferenceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceContext")
            .field("path_len", &self.path.len())
            .field("lookup_name", &self.lookup_name)
            .field("call_context", &self.call_context.is_some())
            .field("bound_node", &self.bound_node)
            .field("nodes_inferred", &self.nodes_inferred())
            .field("max_inferred", &self.max_inferred)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Handle on a session's shared counter
#[derive(Debug, Clone)]
pub(crate) struct Budget {
    counter: Arc<AtomicUsize>,
    cap: usize,
}

impl Budget {
    pub fn exhausted(&self) -> bool {
        self.counter.load(Ordering::SeqCst) >= self.cap
    }

    /// Take one unit; `false` once the cap is reached
    pub fn consume(&self) -> bool {
        self.counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < self.cap).then_some(n + 1))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_counter_but_not_path() {
        let ctx = InferenceContext::new();
        let clone = ctx.clone();
        clone.budget().consume();
        clone.budget().consume();
        assert_eq!(ctx.nodes_inferred(), 2);
        assert_eq!(ctx.max_inferred(), 100);
    }

    #[test]
    fn test_budget_stops_at_cap() {
        let ctx = InferenceContext::with_max_inferred(3);
        let budget = ctx.budget();
        assert!(budget.consume());
        assert!(budget.consume());
        assert!(budget.consume());
        assert!(!budget.consume());
        assert_eq!(ctx.nodes_inferred(), 3);
        assert!(ctx.budget_exhausted());
    }

    #[test]
    fn test_preset_counter() {
        let ctx = InferenceContext::new();
        ctx.set_nodes_inferred(99);
        let clone = ctx.clone();
        assert!(clone.budget().consume());
        assert!(ctx.budget_exhausted());
    }

    #[test]
    fn test_descend_is_per_branch() {
        let mut ctx = InferenceContext::new();
        assert!(ctx.descend());
        let branch = ctx.clone();
        assert!(ctx.descend());
        assert_eq!(ctx.depth(), 2);
        assert_eq!(branch.depth(), 1);

        ctx.set_nodes_inferred(100);
        assert!(!ctx.descend());
        assert_eq!(ctx.depth(), 2);
    }

    #[test]
    fn test_descend_capped_by_depth_limit() {
        let mut ctx = InferenceContext::with_max_inferred(usize::MAX);
        for _ in 0..MAX_INFERENCE_DEPTH {
            assert!(ctx.descend());
        }
        assert!(!ctx.descend());
    }

    #[test]
    fn test_call_context_keyword() {
        let call = CallContext::new(Vec::new(), Vec::new());
        assert!(call.keyword("x").is_none());
    }
}
