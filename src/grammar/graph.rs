//! The built grammar graph
//!
//! A [`Graph`] owns every rule (declared, expanded and instantiated) along
//! with the analysis computed while it was built. It is only produced by a
//! successful build, so every node in it is validated, frozen and has its
//! arity cached. After construction it is read-only and may be shared across
//! threads.

use crate::grammar::arity::cached_arity;
use crate::grammar::config::BuildConfig;
use crate::grammar::error::GrammarError;
use crate::grammar::finalize::finalize;
use crate::grammar::input::RuleMap;
use crate::grammar::node::{Item, NodeArena, NodeId, NodeKind, Operators, RuleKey};
use crate::grammar::normalize::normalize;
use crate::grammar::scc::{analyze, ComponentId, DepGraph, SccInfo};
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use tracing::debug;

#[derive(Debug)]
pub struct Graph {
    arena: NodeArena,
    rules: IndexMap<RuleKey, NodeId>,
    dependencies: DepGraph,
    scc: SccInfo,
}

impl Graph {
    /// Finalize the rules and run the dependency analysis.
    pub(crate) fn build(
        mut arena: NodeArena,
        rules: IndexMap<RuleKey, NodeId>,
        config: &BuildConfig,
    ) -> Result<Graph, GrammarError> {
        debug!(rules = rules.len(), nodes = arena.len(), "finalizing grammar");
        finalize(&mut arena, &rules, config)?;
        let (dependencies, scc) = analyze(&arena, &rules);
        Ok(Graph {
            arena,
            rules,
            dependencies,
            scc,
        })
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Graph, GrammarError> {
        normalize(&RuleMap::from_json(value)?)
    }

    pub fn from_json_str(text: &str) -> Result<Graph, GrammarError> {
        normalize(&RuleMap::from_json_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Graph, GrammarError> {
        normalize(&RuleMap::from_yaml_str(text)?)
    }

    pub fn get(&self, key: &str) -> Option<NodeRef<'_>> {
        self.rules.get(key).map(|&id| self.node(id))
    }

    pub fn has(&self, key: &str) -> bool {
        self.rules.contains_key(key)
    }

    /// Rule keys in build order: declarations (expanded sub-rules before
    /// their parent), then instantiations.
    pub fn keys(&self) -> impl Iterator<Item = &RuleKey> {
        self.rules.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuleKey, NodeRef<'_>)> {
        self.rules.iter().map(|(key, &id)| (key, self.node(id)))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn scc_of(&self, key: &str) -> Option<ComponentId> {
        self.scc.scc_of(key)
    }

    pub fn scc_members(&self, id: ComponentId) -> Option<&[RuleKey]> {
        self.scc.scc_members(id)
    }

    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &[RuleKey])> {
        self.scc.components()
    }

    pub fn scc_info(&self) -> &SccInfo {
        &self.scc
    }

    /// Rules that `key` can enter without consuming input.
    pub fn dependencies(&self, key: &str) -> Option<&IndexSet<RuleKey>> {
        self.dependencies.get(key)
    }

    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub(crate) fn rules(&self) -> &IndexMap<RuleKey, NodeId> {
        &self.rules
    }

    pub(crate) fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef {
            arena: &self.arena,
            id,
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, node) in self.iter() {
            writeln!(f, "{} = {}", key, node)?;
        }
        Ok(())
    }
}

/// Borrowed view of one node of a [`Graph`].
#[derive(Clone, Copy)]
pub struct NodeRef<'g> {
    arena: &'g NodeArena,
    id: NodeId,
}

impl<'g> NodeRef<'g> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.arena.get(self.id).kind()
    }

    pub fn items(&self) -> &'g [Item] {
        self.arena.get(self.id).items()
    }

    pub fn arity(&self) -> usize {
        cached_arity(self.arena, self.id)
            .expect("arity is computed for every node during finalization")
    }

    pub fn operators(&self) -> &'g Operators {
        self.arena.operators(self.id)
    }

    pub fn is_generic(&self) -> bool {
        self.arena.is_generic(self.id)
    }

    /// Whether an ancestor carries an iteration operator.
    pub fn inside_iteration(&self) -> bool {
        self.arena
            .facts(self.id)
            .inside_iteration
            .get()
            .copied()
            .unwrap_or(false)
    }

    pub fn is_frozen(&self) -> bool {
        self.arena.get(self.id).is_frozen()
    }

    /// Nested nodes, in item order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'g>> + 'g {
        let arena = self.arena;
        self.items().iter().filter_map(move |item| match item {
            Item::Node(id) => Some(NodeRef { arena, id: *id }),
            _ => None,
        })
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.arena.render(self.id))
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({}, {})", self.id, self)
    }
}
