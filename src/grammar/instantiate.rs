//! Generic Instantiation
//!
//! Every queued Call `Target@N` becomes a concrete rule: a structural copy of
//! `Target`'s body in which each placeholder `@name` is replaced by a copy of
//! the caller's argument sequence, wrapped in the synthetic `@` group.
//!
//! The wrapper keeps the Sequence/Choice alternation intact. At an even
//! depth the placeholder sits in a Sequence, so the argument is wrapped as
//! `(@ | [arg])`; at an odd depth it sits in a Choice and is wrapped as
//! `[@, ([arg])]`.

use crate::grammar::error::GrammarError;
use crate::grammar::node::{Item, Node, NodeId, NodeKind};
use crate::grammar::normalize::{Normalizer, PendingCall};
use crate::grammar::operators::Operator;
use tracing::debug;

impl Normalizer<'_> {
    /// Instantiate every queued call, including calls queued while this
    /// loop runs.
    pub(crate) fn instantiate_pending(&mut self) -> Result<(), GrammarError> {
        let mut next = 0;
        while let Some((key, call)) = self
            .pending
            .get_index(next)
            .map(|(key, call)| (key.clone(), call.clone()))
        {
            next += 1;
            debug!(call = %key, target = %call.target, "instantiating generic rule");

            let Some(&source) = self.rules.get(&call.target) else {
                return Err(GrammarError::UnknownTargetRule {
                    call: key,
                    target: call.target,
                });
            };
            let id = self.copy_substituted(source, 0, &key, &call)?;
            self.add(key, id)?;
        }
        Ok(())
    }

    fn copy_substituted(
        &mut self,
        source: NodeId,
        depth: usize,
        key: &str,
        call: &PendingCall,
    ) -> Result<NodeId, GrammarError> {
        self.check_depth(depth, &format!("instantiating `{}`", key))?;
        let node = self.arena.get(source);
        let mut out = Node::new(node.kind());
        let items = node.items().to_vec();

        for item in items {
            let item = match item {
                Item::Generic(name) => {
                    let Some(&arg) = call.args.get(&name) else {
                        return Err(GrammarError::MissingCallArgument {
                            call: key.to_string(),
                            target: call.target.clone(),
                            name,
                        });
                    };
                    Item::Node(self.wrap_argument(arg, depth, key)?)
                }
                Item::Node(child) => Item::Node(self.copy_substituted(child, depth + 1, key, call)?),
                other => other,
            };
            out.push(item);
        }
        Ok(self.arena.alloc(out))
    }

    fn wrap_argument(&mut self, arg: NodeId, depth: usize, key: &str) -> Result<NodeId, GrammarError> {
        let group = Item::Operator(Operator::Group);
        if depth % 2 == 0 {
            let copy = self.copy_tree(arg, depth + 2, key)?;
            Ok(self.arena.alloc(Node::with_items(
                NodeKind::Choice,
                vec![group, Item::Node(copy)],
            )))
        } else {
            let copy = self.copy_tree(arg, depth + 3, key)?;
            let inner = self
                .arena
                .alloc(Node::with_items(NodeKind::Choice, vec![Item::Node(copy)]));
            Ok(self.arena.alloc(Node::with_items(
                NodeKind::Sequence,
                vec![group, Item::Node(inner)],
            )))
        }
    }

    /// Plain structural copy: every node is freshly allocated.
    fn copy_tree(&mut self, source: NodeId, depth: usize, key: &str) -> Result<NodeId, GrammarError> {
        self.check_depth(depth, &format!("instantiating `{}`", key))?;
        let node = self.arena.get(source);
        let mut out = Node::new(node.kind());
        let items = node.items().to_vec();
        for item in items {
            let item = match item {
                Item::Node(child) => Item::Node(self.copy_tree(child, depth + 1, key)?),
                other => other,
            };
            out.push(item);
        }
        Ok(self.arena.alloc(out))
    }
}
