//! Dependency & SCC Analyzer
//!
//! Finds left-recursion groups. A rule depends on every rule it can enter
//! without consuming input first (its prefix dependencies); a strongly
//! connected component of that graph is a left-recursive cycle.
//!
//! Step 1 settles, once per graph, which rules are solid (cannot match the
//! empty input), then walks each rule body left to right, collecting
//! references until a term is proven non-nullable. A sequence stops at the
//! first such term; a choice inspects every branch and is nullable when any
//! branch is.
//!
//! Step 2 runs Tarjan's algorithm over the dependency graph and keeps only
//! genuine cycles: components with more than one member, or a single member
//! that depends on itself.

use crate::grammar::graph::Graph;
use crate::grammar::node::{Item, NodeArena, NodeId, NodeKind, RuleKey};
use crate::grammar::operators::OpMask;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

pub type ComponentId = usize;

/// Prefix-dependency edges, keyed in graph order.
pub type DepGraph = IndexMap<RuleKey, IndexSet<RuleKey>>;

/// Cycle membership for the rules of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SccInfo {
    scc_of: IndexMap<RuleKey, ComponentId>,
    scc_members: Vec<Vec<RuleKey>>,
}

impl SccInfo {
    /// The component holding `key`, if `key` is part of a cycle.
    pub fn scc_of(&self, key: &str) -> Option<ComponentId> {
        self.scc_of.get(key).copied()
    }

    /// Members of a component, in discovery order.
    pub fn scc_members(&self, id: ComponentId) -> Option<&[RuleKey]> {
        self.scc_members.get(id).map(Vec::as_slice)
    }

    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &[RuleKey])> {
        self.scc_members
            .iter()
            .enumerate()
            .map(|(id, members)| (id, members.as_slice()))
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.scc_members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scc_members.is_empty()
    }
}

/// Recompute the cycle information of a built graph.
pub fn compute_scc_info(graph: &Graph) -> SccInfo {
    let deps = build_dependency_graph(graph.arena(), graph.rules());
    compute_sccs(&deps)
}

pub(crate) fn analyze(arena: &NodeArena, rules: &IndexMap<RuleKey, NodeId>) -> (DepGraph, SccInfo) {
    let deps = build_dependency_graph(arena, rules);
    let info = compute_sccs(&deps);
    debug!(
        rules = deps.len(),
        edges = deps.values().map(IndexSet::len).sum::<usize>(),
        components = info.len(),
        "prefix dependency analysis done"
    );
    (deps, info)
}

pub(crate) fn build_dependency_graph(arena: &NodeArena, rules: &IndexMap<RuleKey, NodeId>) -> DepGraph {
    let walker = PrefixWalker::new(arena, rules);
    rules
        .iter()
        .map(|(key, &id)| (key.clone(), walker.sequence(id).deps.into_iter().collect()))
        .collect()
}

/// Result of a prefix walk: whether the node can match without consuming
/// input, and the rules reachable at its entry.
#[derive(Debug, Default)]
struct PrefixDeps {
    nullable: bool,
    deps: Vec<RuleKey>,
}

struct PrefixWalker<'a> {
    arena: &'a NodeArena,
    rules: &'a IndexMap<RuleKey, NodeId>,
    /// Per rule, in graph order: true when the rule cannot match the empty
    /// input at its entry.
    solid: Vec<bool>,
}

impl<'a> PrefixWalker<'a> {
    /// Settle rule solidity as a least fixpoint. Every rule starts out
    /// nullable; a rule turns solid once its body is solid under the
    /// current assignment, which requeues the rules referencing it. Each
    /// rule turns solid at most once, and rule references are never
    /// followed recursively.
    fn new(arena: &'a NodeArena, rules: &'a IndexMap<RuleKey, NodeId>) -> Self {
        let mut walker = PrefixWalker {
            arena,
            rules,
            solid: vec![false; rules.len()],
        };

        let mut users: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];
        for (user, &id) in rules.values().enumerate() {
            let mut refs = IndexSet::new();
            walker.references(id, &mut refs);
            for target in refs {
                users[target].push(user);
            }
        }

        let mut queue: Vec<usize> = (0..rules.len()).rev().collect();
        let mut rounds = 0usize;
        while let Some(v) = queue.pop() {
            rounds += 1;
            if walker.solid[v] {
                continue;
            }
            let Some((_, &id)) = rules.get_index(v) else {
                continue;
            };
            if walker.is_solid(id) {
                walker.solid[v] = true;
                queue.extend(users[v].iter().copied().filter(|&u| !walker.solid[u]));
            }
        }
        trace!(
            rules = rules.len(),
            solid = walker.solid.iter().filter(|&&s| s).count(),
            rounds,
            "rule solidity settled"
        );
        walker
    }

    /// Indices of the rules referenced anywhere in the node.
    fn references(&self, id: NodeId, out: &mut IndexSet<usize>) {
        for term in &self.arena.operators(id).body {
            match term {
                Item::Rule(key) => {
                    if let Some(index) = self.rules.get_index_of(key) {
                        out.insert(index);
                    }
                }
                Item::Node(child) => self.references(*child, out),
                Item::Pattern(_) | Item::Generic(_) | Item::Operator(_) => {}
            }
        }
    }

    fn node(&self, id: NodeId) -> PrefixDeps {
        match self.arena.get(id).kind() {
            NodeKind::Sequence => self.sequence(id),
            NodeKind::Choice => self.choice(id),
        }
    }

    fn sequence(&self, id: NodeId) -> PrefixDeps {
        let ops = self.arena.operators(id);
        let mut out = PrefixDeps {
            nullable: ops.mask.intersects(OpMask::NULLABLE),
            deps: Vec::new(),
        };

        for term in &ops.body {
            match term {
                Item::Pattern(pattern) => {
                    if !pattern.matches_empty() {
                        return out;
                    }
                }
                Item::Rule(key) => {
                    out.deps.push(key.clone());
                    if self.rule_is_solid(key) {
                        return out;
                    }
                }
                Item::Generic(_) => {}
                Item::Node(child) => {
                    let inner = self.node(*child);
                    out.deps.extend(inner.deps);
                    if !inner.nullable {
                        return out;
                    }
                }
                Item::Operator(_) => {}
            }
        }

        out.nullable = true;
        out
    }

    fn choice(&self, id: NodeId) -> PrefixDeps {
        let ops = self.arena.operators(id);
        let mut out = PrefixDeps {
            nullable: ops.mask.intersects(OpMask::NULLABLE),
            deps: Vec::new(),
        };

        for term in &ops.body {
            let branch = match term {
                Item::Pattern(pattern) => PrefixDeps {
                    nullable: pattern.matches_empty(),
                    deps: Vec::new(),
                },
                Item::Generic(_) => PrefixDeps {
                    nullable: true,
                    deps: Vec::new(),
                },
                Item::Rule(key) => PrefixDeps {
                    nullable: !self.rule_is_solid(key),
                    deps: vec![key.clone()],
                },
                Item::Node(child) => self.node(*child),
                Item::Operator(_) => continue,
            };
            out.nullable |= branch.nullable;
            out.deps.extend(branch.deps);
        }
        out
    }

    fn rule_is_solid(&self, key: &str) -> bool {
        self.rules
            .get_index_of(key)
            .map_or(false, |index| self.solid[index])
    }

    /// True when the node cannot match the empty input at its entry, given
    /// the rule solidity settled so far. A sequence needs one solid term; a
    /// choice needs every branch solid.
    fn is_solid(&self, id: NodeId) -> bool {
        let ops = self.arena.operators(id);
        if ops.mask.intersects(OpMask::NULLABLE) {
            return false;
        }
        let mut terms = ops.body.iter().filter_map(|term| match term {
            Item::Pattern(pattern) => Some(!pattern.matches_empty()),
            Item::Rule(key) => Some(self.rule_is_solid(key)),
            Item::Generic(_) => Some(false),
            Item::Node(child) => Some(self.is_solid(*child)),
            Item::Operator(_) => None,
        });
        match self.arena.get(id).kind() {
            NodeKind::Sequence => terms.any(|solid| solid),
            NodeKind::Choice => terms.all(|solid| solid),
        }
    }
}

/// Tarjan's algorithm over `deps`, keeping only genuine cycles.
pub(crate) fn compute_sccs(deps: &DepGraph) -> SccInfo {
    let mut tarjan = Tarjan {
        deps,
        next_index: 0,
        index: vec![None; deps.len()],
        lowlink: vec![0; deps.len()],
        on_stack: vec![false; deps.len()],
        stack: Vec::new(),
        info: SccInfo::default(),
    };
    for v in 0..deps.len() {
        if tarjan.index[v].is_none() {
            tarjan.strongconnect(v);
        }
    }
    tarjan.info
}

struct Tarjan<'a> {
    deps: &'a DepGraph,
    next_index: usize,
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    info: SccInfo,
}

impl Tarjan<'_> {
    /// Depth-first search from `root`, driven by an explicit frame stack of
    /// `(vertex, next edge)` so long dependency chains cannot exhaust the
    /// call stack.
    fn strongconnect(&mut self, root: usize) {
        let deps = self.deps;
        self.visit(root);
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = frames.last_mut() {
            let (v, next) = *frame;
            frame.1 += 1;

            let Some((_, edges)) = deps.get_index(v) else {
                frames.pop();
                continue;
            };
            if let Some(target) = edges.get_index(next) {
                // Edges to keys outside the graph carry no cycle.
                let Some(w) = deps.get_index_of(target) else {
                    continue;
                };
                match self.index[w] {
                    None => {
                        self.visit(w);
                        frames.push((w, 0));
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if Some(self.lowlink[v]) == self.index[v] {
                self.pop_component(v);
            }
        }
    }

    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    fn pop_component(&mut self, v: usize) {
        let mut group = Vec::new();
        while let Some(w) = self.stack.pop() {
            self.on_stack[w] = false;
            group.push(w);
            if w == v {
                break;
            }
        }

        let deps = self.deps;
        let self_edge = deps
            .get_index(v)
            .map_or(false, |(key, edges)| edges.contains(key));
        if group.len() == 1 && !self_edge {
            return;
        }

        let id = self.info.scc_members.len();
        let members: Vec<RuleKey> = group
            .into_iter()
            .filter_map(|w| deps.get_index(w).map(|(key, _)| key.clone()))
            .collect();
        for key in &members {
            self.info.scc_of.insert(key.clone(), id);
        }
        self.info.scc_members.push(members);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(value: serde_json::Value) -> Graph {
        Graph::from_json(&value).unwrap()
    }

    fn dep_graph(edges: &[(&str, &[&str])]) -> DepGraph {
        edges
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    fn deps_of(g: &Graph, key: &str) -> Vec<String> {
        g.dependencies(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_sequence_stops_at_solid_term() {
        let g = graph(json!({
            "A": ["B", "C"],
            "B": {"pattern": "b"},
            "C": {"pattern": "c"}
        }));
        assert_eq!(deps_of(&g, "A"), ["B"]);
    }

    #[test]
    fn test_sequence_continues_past_nullable_term() {
        let g = graph(json!({
            "A": ["?B", "C", "D"],
            "B": {"pattern": "b"},
            "C": {"pattern": "c"},
            "D": {"pattern": "d"}
        }));
        assert_eq!(deps_of(&g, "A"), ["B", "C"]);
    }

    #[test]
    fn test_empty_matching_pattern_is_skipped() {
        let g = graph(json!({
            "A": [{"pattern": "x*"}, "B", {"pattern": "y"}, "C"],
            "B": [{"pattern": "b?"}],
            "C": {"pattern": "c"}
        }));
        assert_eq!(deps_of(&g, "A"), ["B"]);
    }

    #[test]
    fn test_choice_collects_every_branch() {
        let g = graph(json!({
            "A": [["B", "C"], "D"],
            "B": {"pattern": "b"},
            "C": {"pattern": "c"},
            "D": {"pattern": "d"}
        }));
        assert_eq!(deps_of(&g, "A"), ["B", "C"]);
    }

    #[test]
    fn test_rule_solidity_follows_references() {
        let g = graph(json!({
            "A": ["B", "C"],
            "B": ["?E"],
            "C": ["E"],
            "E": {"pattern": "e"}
        }));
        assert_eq!(deps_of(&g, "A"), ["B", "C"]);
        assert_eq!(deps_of(&g, "C"), ["E"]);
    }

    #[test]
    fn test_self_reference_after_solid_token_is_no_cycle() {
        let g = graph(json!({"A": ["x", "A"], "x": {"pattern": "x"}}));
        assert_eq!(g.scc_of("A"), None);
        assert!(g.scc_info().is_empty());
    }

    #[test]
    fn test_self_reference_after_nullable_prefix() {
        let g = graph(json!({"A": [["?", "x"], "A"], "x": {"pattern": "x"}}));
        let id = g.scc_of("A").unwrap();
        assert_eq!(g.scc_members(id).unwrap(), ["A"]);
    }

    #[test]
    fn test_mutual_reference() {
        let g = graph(json!({"A": ["B"], "B": ["A"]}));
        let id = g.scc_of("A").unwrap();
        assert_eq!(g.scc_of("B"), Some(id));
        assert_eq!(g.scc_members(id).unwrap().len(), 2);
    }

    #[test]
    fn test_tarjan_keeps_only_cycles() {
        let deps = dep_graph(&[
            ("A", &["B"]),
            ("B", &["C"]),
            ("C", &["A", "D"]),
            ("D", &[]),
            ("E", &["E"]),
            ("F", &["A"]),
        ]);
        let info = compute_sccs(&deps);
        assert_eq!(info.len(), 2);
        assert_eq!(info.scc_members(0).unwrap(), ["C", "B", "A"]);
        assert_eq!(info.scc_members(1).unwrap(), ["E"]);
        assert_eq!(info.scc_of("D"), None);
        assert_eq!(info.scc_of("F"), None);
    }

    #[test]
    fn test_tarjan_ignores_edges_outside_graph() {
        let deps = dep_graph(&[("A", &["Z"])]);
        assert!(compute_sccs(&deps).is_empty());
    }

    /// `R0 .. R{n-1}` each referring to the next through `body`, ending in a
    /// terminal `R{n}`.
    fn chain(n: usize, body: impl Fn(String) -> serde_json::Value) -> serde_json::Value {
        let mut rules = serde_json::Map::new();
        for i in 0..n {
            rules.insert(format!("R{}", i), body(format!("R{}", i + 1)));
        }
        rules.insert(format!("R{}", n), json!({"pattern": "r"}));
        serde_json::Value::Object(rules)
    }

    #[test]
    fn test_fan_out_references_settle_once() {
        let g = graph(chain(30, |next| json!([[next.clone(), next]])));
        assert_eq!(deps_of(&g, "R0"), ["R1"]);
        assert_eq!(deps_of(&g, "R29"), ["R30"]);
        assert!(g.scc_info().is_empty());
    }

    #[test]
    fn test_long_reference_chain() {
        let n = 20_000;
        let g = graph(chain(n, |next| json!([next])));
        assert_eq!(g.len(), n + 1);
        assert_eq!(deps_of(&g, "R0"), ["R1"]);
        assert!(g.scc_info().is_empty());
    }

    #[test]
    fn test_long_cycle_is_one_component() {
        let n = 20_000;
        let mut value = chain(n, |next| json!([next]));
        value[format!("R{}", n)] = json!(["R0"]);
        let g = graph(value);
        assert_eq!(g.scc_info().len(), 1);
        assert_eq!(g.scc_members(0).unwrap().len(), n + 1);
        assert_eq!(g.scc_of("R0"), g.scc_of(&format!("R{}", n)));
    }

    #[test]
    fn test_solidity_through_nullable_cycle() {
        let g = graph(json!({
            "A": ["B", "C"],
            "B": [["?", "B"]],
            "C": [["D", {"pattern": "c"}]],
            "D": ["C", {"pattern": "d"}]
        }));
        assert_eq!(deps_of(&g, "A"), ["B", "C"]);
        assert_eq!(deps_of(&g, "D"), ["C"]);
    }

    #[test]
    fn test_recompute_matches_stored_info() {
        let g = graph(json!({
            "Expr": [["Sum", "Num"]],
            "Sum": ["Expr", {"pattern": "\\+"}, "Num"],
            "Num": {"pattern": "[0-9]+"}
        }));
        assert_eq!(&compute_scc_info(&g), g.scc_info());
        let id = g.scc_of("Expr").unwrap();
        assert_eq!(g.scc_members(id).unwrap().len(), 2);
    }
}
