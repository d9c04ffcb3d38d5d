//! Graph to input projection
//!
//! [`graph_to_input`] rebuilds a plain [`RuleMap`] from a built graph. Every
//! rule becomes a body whose nested lists mirror the node nesting, so
//! normalizing the result again yields an equivalent graph. The projection
//! copies everything and leaves the graph untouched.

use crate::grammar::graph::{Graph, NodeRef};
use crate::grammar::input::{RuleDef, RuleMap, Token};
use crate::grammar::node::Item;

pub fn graph_to_input(graph: &Graph) -> RuleMap {
    graph.iter().fold(RuleMap::new(), |rules, (key, node)| {
        rules.with(key.clone(), RuleDef::Body(node_token(graph, node)))
    })
}

fn node_token(graph: &Graph, node: NodeRef<'_>) -> Token {
    Token::List(
        node.items()
            .iter()
            .map(|item| match item {
                Item::Pattern(pattern) => Token::Pattern(pattern.clone()),
                Item::Rule(key) => Token::Name(key.clone()),
                Item::Operator(op) => Token::Name(op.symbol().to_string()),
                Item::Generic(name) => Token::Name(format!("@{}", name)),
                Item::Node(id) => node_token(graph, graph.node(*id)),
            })
            .collect(),
    )
}
