//! Validator/Finalizer
//!
//! One depth-first walk over every rule, run once after all rules (including
//! instantiations) exist. At each node:
//! 1. force the cached arity (arity conflicts surface here)
//! 2. check the operator set for forbidden combinations
//! 3. check children: patterns must be anchored, references must name an
//!    existing non-generic rule, nested nodes are walked recursively
//! 4. record the inside-iteration flag and freeze the node

use crate::grammar::arity::arity;
use crate::grammar::config::BuildConfig;
use crate::grammar::error::GrammarError;
use crate::grammar::node::{Item, NodeArena, NodeId, NodeKind, RuleKey};
use crate::grammar::operators::{OpMask, Operator};
use indexmap::IndexMap;
use tracing::trace;

pub(crate) fn finalize(
    arena: &mut NodeArena,
    rules: &IndexMap<RuleKey, NodeId>,
    config: &BuildConfig,
) -> Result<(), GrammarError> {
    let mut walker = Finalizer {
        arena,
        rules,
        config,
    };
    for (key, &id) in rules {
        walker.node(key, id, false, 0)?;
    }
    Ok(())
}

struct Finalizer<'a> {
    arena: &'a mut NodeArena,
    rules: &'a IndexMap<RuleKey, NodeId>,
    config: &'a BuildConfig,
}

impl Finalizer<'_> {
    fn node(&mut self, rule: &str, id: NodeId, inside: bool, depth: usize) -> Result<(), GrammarError> {
        if depth > self.config.max_depth {
            return Err(GrammarError::DepthLimitExceeded {
                limit: self.config.max_depth,
                context: format!("finalizing rule `{}`", rule),
            });
        }

        arity(self.arena, id, rule)?;
        let mask = self.arena.operators(id).mask;
        self.check_mask(rule, id, mask)?;

        let nested_inside = inside || mask.intersects(OpMask::ITERATION);
        let items = self.arena.get(id).items().to_vec();
        for item in items {
            match item {
                Item::Pattern(pattern) => {
                    if !pattern.is_anchored() {
                        return Err(GrammarError::NonAnchoredPattern {
                            rule: rule.to_string(),
                            pattern: pattern.to_string(),
                        });
                    }
                }
                Item::Rule(reference) => match self.rules.get(&reference) {
                    None => {
                        return Err(GrammarError::UnknownRule {
                            rule: rule.to_string(),
                            reference,
                        })
                    }
                    Some(&target) if self.arena.is_generic(target) => {
                        return Err(GrammarError::UnresolvedGenericReference {
                            rule: rule.to_string(),
                            reference,
                        })
                    }
                    Some(_) => {}
                },
                Item::Node(child) => self.node(rule, child, nested_inside, depth + 1)?,
                Item::Operator(_) | Item::Generic(_) => {}
            }
        }

        let first_visit = self.arena.facts(id).inside_iteration.set(inside).is_ok();
        assert!(first_visit, "node {} reached twice while finalizing rule `{}`", id, rule);
        self.arena.freeze(id);
        trace!(rule, node = %id, "frozen");
        Ok(())
    }

    fn check_mask(&self, rule: &str, id: NodeId, mask: OpMask) -> Result<(), GrammarError> {
        let rule = rule.to_string();
        let node = || self.arena.render(id).to_string();

        if mask.contains_all(OpMask::LOOKAHEAD) {
            return Err(GrammarError::ConflictingLookahead {
                rule,
                node: node(),
                graph: self.render_graph(),
            });
        }
        if (mask & OpMask::REPETITION).len() > 1 {
            return Err(GrammarError::ConflictingRepetition {
                rule,
                node: node(),
                graph: self.render_graph(),
            });
        }
        if mask.has(Operator::OrderedChoice) && self.arena.get(id).kind() == NodeKind::Sequence {
            return Err(GrammarError::OrderedChoiceOnSequence {
                rule,
                node: node(),
                graph: self.render_graph(),
            });
        }
        if mask.contains_all(OpMask::MODE) {
            return Err(GrammarError::ConflictingLexicalMode {
                rule,
                node: node(),
                graph: self.render_graph(),
            });
        }
        Ok(())
    }

    fn render_graph(&self) -> String {
        self.rules
            .iter()
            .map(|(key, &id)| format!("{} = {}\n", key, self.arena.render(id)))
            .collect()
    }
}
