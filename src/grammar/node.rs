//! Sequence/Choice nodes and their arena
//!
//! All nodes of a grammar live in one [`NodeArena`] and refer to their
//! children by [`NodeId`]. Derived properties (arity, operator summary,
//! generic flag, inside-iteration flag) are held in a side table of
//! `OnceCell`s indexed like the nodes: computed on first read, then fixed.
//!
//! Nodes are built by pushing items and then allocated. The finalizer freezes
//! each node after validating it; pushing into a frozen node panics.

use crate::grammar::operators::{OpMask, Operator};
use crate::grammar::pattern::Pattern;
use once_cell::sync::OnceCell;
use std::fmt;

/// A rule key: a declared name, an expansion key `Parent_Sub`, or an
/// instantiation key `Target@N`.
pub type RuleKey = String;

/// Index of a node in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Concatenation
    Sequence,
    /// Alternation
    Choice,
}

impl NodeKind {
    /// The kind of a list nested one level inside this one.
    pub fn nested(self) -> NodeKind {
        match self {
            NodeKind::Sequence => NodeKind::Choice,
            NodeKind::Choice => NodeKind::Sequence,
        }
    }
}

/// One child of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Pattern(Pattern),
    Rule(RuleKey),
    Node(NodeId),
    Operator(Operator),
    /// Unresolved generic placeholder `@name`
    Generic(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    items: Vec<Item>,
    frozen: bool,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            frozen: false,
        }
    }

    pub fn with_items(kind: NodeKind, items: Vec<Item>) -> Self {
        Self {
            kind,
            items,
            frozen: false,
        }
    }

    pub fn push(&mut self, item: Item) {
        assert!(
            !self.frozen,
            "attempted to mutate a frozen {:?} node",
            self.kind
        );
        self.items.push(item);
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// A node's operator summary: the operator set, the generic placeholder
/// names, and the body (every item that is not an operator).
#[derive(Debug, Clone, PartialEq)]
pub struct Operators {
    pub mask: OpMask,
    pub generics: Vec<String>,
    pub body: Vec<Item>,
}

impl Operators {
    fn extract(node: &Node) -> Self {
        let mut mask = OpMask::EMPTY;
        let mut generics = Vec::new();
        let mut body = Vec::new();
        for item in node.items() {
            match item {
                Item::Operator(op) => mask.insert(*op),
                Item::Generic(name) => {
                    generics.push(name.clone());
                    body.push(item.clone());
                }
                _ => body.push(item.clone()),
            }
        }
        Self {
            mask,
            generics,
            body,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct NodeFacts {
    pub(crate) arity: OnceCell<usize>,
    operators: OnceCell<Operators>,
    generic: OnceCell<bool>,
    pub(crate) inside_iteration: OnceCell<bool>,
}

#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    facts: Vec<NodeFacts>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.facts.push(NodeFacts::default());
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn facts(&self, id: NodeId) -> &NodeFacts {
        &self.facts[id.index()]
    }

    pub(crate) fn freeze(&mut self, id: NodeId) {
        self.nodes[id.index()].frozen = true;
    }

    /// Push into a node that is still under construction.
    pub fn push(&mut self, id: NodeId, item: Item) {
        self.nodes[id.index()].push(item);
    }

    pub fn operators(&self, id: NodeId) -> &Operators {
        self.facts(id)
            .operators
            .get_or_init(|| Operators::extract(self.get(id)))
    }

    /// True when the node or any nested node holds a generic placeholder.
    pub fn is_generic(&self, id: NodeId) -> bool {
        *self.facts(id).generic.get_or_init(|| {
            self.get(id).items().iter().any(|item| match item {
                Item::Generic(_) => true,
                Item::Node(child) => self.is_generic(*child),
                _ => false,
            })
        })
    }

    /// Borrowing display adapter for a node.
    pub fn render(&self, id: NodeId) -> Rendered<'_> {
        Rendered { arena: self, id }
    }

    pub fn render_item<'a>(&'a self, item: &'a Item) -> RenderedItem<'a> {
        RenderedItem { arena: self, item }
    }
}

/// Display notation for nodes: `[a, b]` for sequences, `(a | b)` for
/// choices.
pub struct Rendered<'a> {
    arena: &'a NodeArena,
    id: NodeId,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.arena.get(self.id);
        let (open, sep, close) = match node.kind() {
            NodeKind::Sequence => ("[", ", ", "]"),
            NodeKind::Choice => ("(", " | ", ")"),
        };
        f.write_str(open)?;
        for (i, item) in node.items().iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            write!(f, "{}", self.arena.render_item(item))?;
        }
        f.write_str(close)
    }
}

pub struct RenderedItem<'a> {
    arena: &'a NodeArena,
    item: &'a Item,
}

impl fmt::Display for RenderedItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            Item::Pattern(pattern) => write!(f, "{}", pattern),
            Item::Rule(key) => f.write_str(key),
            Item::Node(id) => write!(f, "{}", self.arena.render(*id)),
            Item::Operator(op) => f.write_str(op.symbol()),
            Item::Generic(name) => write!(f, "@{}", name),
        }
    }
}
