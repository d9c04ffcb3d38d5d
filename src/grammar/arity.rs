//! Arity Calculator
//!
//! The arity of a node is the number of semantic values it yields to an
//! evaluator. Computed once per node and cached in the arena side table.
//!
//! Sequence: items are read left to right.
//! - `&` / `!`: the whole sequence yields nothing (0)
//! - `*` / `+` / `?` / `@`: the whole sequence yields one list (1)
//! - `#` / `%` / `$` / `/`: transparent
//! - nested node: adds its own arity
//! - pattern, rule reference, generic placeholder: 1
//!
//! Choice: every branch must agree. A lookahead branch makes the whole choice
//! 0, an iteration branch makes it 1, and conflicting branch arities are an
//! error naming both branches. An empty choice yields 0.

use crate::grammar::error::GrammarError;
use crate::grammar::node::{Item, NodeArena, NodeId, NodeKind};

/// Arity of `id`, computing and caching it on first use. `rule` is the rule
/// being finalized, for error context.
pub fn arity(arena: &NodeArena, id: NodeId, rule: &str) -> Result<usize, GrammarError> {
    arena
        .facts(id)
        .arity
        .get_or_try_init(|| match arena.get(id).kind() {
            NodeKind::Sequence => sequence_arity(arena, id, rule),
            NodeKind::Choice => choice_arity(arena, id, rule),
        })
        .copied()
}

/// The cached arity, if it has been computed.
pub fn cached_arity(arena: &NodeArena, id: NodeId) -> Option<usize> {
    arena.facts(id).arity.get().copied()
}

fn sequence_arity(arena: &NodeArena, id: NodeId, rule: &str) -> Result<usize, GrammarError> {
    let mut total = 0;
    for item in arena.get(id).items() {
        match item {
            Item::Operator(op) if op.is_lookahead() => return Ok(0),
            Item::Operator(op) if op.is_iteration() => return Ok(1),
            Item::Operator(_) => continue,
            Item::Node(child) => total += arity(arena, *child, rule)?,
            Item::Pattern(_) | Item::Rule(_) | Item::Generic(_) => total += 1,
        }
    }
    Ok(total)
}

fn choice_arity(arena: &NodeArena, id: NodeId, rule: &str) -> Result<usize, GrammarError> {
    let mut expected: Option<(usize, &Item)> = None;

    for branch in arena.get(id).items() {
        let branch_arity = match branch {
            Item::Operator(op) if op.is_lookahead() => return Ok(0),
            Item::Operator(op) if op.is_iteration() => return Ok(1),
            Item::Operator(_) => continue,
            Item::Node(child) => arity(arena, *child, rule)?,
            Item::Pattern(_) | Item::Rule(_) | Item::Generic(_) => 1,
        };

        match expected {
            None => expected = Some((branch_arity, branch)),
            Some((first_arity, first)) if first_arity != branch_arity => {
                return Err(GrammarError::ArityConflict {
                    rule: rule.to_string(),
                    node: arena.render(id).to_string(),
                    first: arena.render_item(first).to_string(),
                    first_arity,
                    second: arena.render_item(branch).to_string(),
                    second_arity: branch_arity,
                });
            }
            Some(_) => {}
        }
    }

    Ok(expected.map(|(a, _)| a).unwrap_or(0))
}
