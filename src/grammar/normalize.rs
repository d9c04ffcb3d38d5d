//! Token Normalizer
//!
//! Converts a [`RuleMap`] into arena nodes and hands the result to
//! [`Graph::build`] for validation and analysis.
//!
//! Conversion rules:
//! 1. A rule body is a Sequence. Lists nested inside it alternate Choice,
//!    Sequence, Choice, ...
//! 2. Operator prefixes are peeled off token strings one at a time in the
//!    fixed scanning order and become operator items of a fresh nested node,
//!    so `!$Name` inside a sequence becomes the choice `(!, $, Name)`.
//! 3. A named-object rule `P: {a: .., b: ..}` registers `P_a` and `P_b` and
//!    becomes `[(P_a | P_b)]`. The splice sub-name appends its alternatives
//!    to that choice instead of registering a key.
//! 4. A Call is replaced by the key `Target@N` (smallest unused N for that
//!    target) and queued for instantiation.
//! 5. Patterns are stored normalized: sticky, non-global.

use crate::grammar::config::BuildConfig;
use crate::grammar::error::GrammarError;
use crate::grammar::graph::Graph;
use crate::grammar::input::{CallToken, RuleDef, RuleMap, Token};
use crate::grammar::node::{Item, Node, NodeArena, NodeId, NodeKind, RuleKey};
use crate::grammar::operators::{is_generic, parse_generic, Operator, PREFIX_OPERATORS};
use indexmap::IndexMap;
use tracing::{debug, trace};

/// Build a graph with the default configuration.
pub fn normalize(input: &RuleMap) -> Result<Graph, GrammarError> {
    normalize_with(input, &BuildConfig::default())
}

pub fn normalize_with(input: &RuleMap, config: &BuildConfig) -> Result<Graph, GrammarError> {
    debug!(rules = input.len(), "normalizing grammar");

    let mut normalizer = Normalizer::new(config);
    for (name, def) in input.iter() {
        normalizer.declare(name, def)?;
    }
    normalizer.instantiate_pending()?;

    let Normalizer { arena, rules, .. } = normalizer;
    let graph = Graph::build(arena, rules, config)?;
    debug!(
        rules = graph.len(),
        components = graph.scc_info().len(),
        "grammar graph built"
    );
    Ok(graph)
}

/// A queued Call, keyed by its `Target@N` instantiation key.
#[derive(Debug, Clone)]
pub(crate) struct PendingCall {
    pub(crate) target: RuleKey,
    pub(crate) args: IndexMap<String, NodeId>,
}

/// In-progress construction state, owned by a single `normalize` call.
pub(crate) struct Normalizer<'c> {
    pub(crate) config: &'c BuildConfig,
    pub(crate) arena: NodeArena,
    pub(crate) rules: IndexMap<RuleKey, NodeId>,
    pub(crate) pending: IndexMap<RuleKey, PendingCall>,
    current: RuleKey,
}

impl<'c> Normalizer<'c> {
    fn new(config: &'c BuildConfig) -> Self {
        Self {
            config,
            arena: NodeArena::new(),
            rules: IndexMap::new(),
            pending: IndexMap::new(),
            current: RuleKey::new(),
        }
    }

    fn declare(&mut self, name: &str, def: &RuleDef) -> Result<(), GrammarError> {
        self.current = name.to_string();
        match def {
            RuleDef::Body(token) => {
                let id = self.convert_sequence(token, 0)?;
                self.add(name.to_string(), id)
            }
            RuleDef::Named(subs) => {
                let mut choice = Node::new(NodeKind::Choice);
                for (sub, body) in subs {
                    if *sub == self.config.splice_key {
                        for item in self.splice_items(name, sub, body)? {
                            choice.push(item);
                        }
                        continue;
                    }
                    let key = format!("{}_{}", name, sub);
                    self.current = key.clone();
                    let id = self.convert_sequence(body, 0)?;
                    self.add(key.clone(), id)?;
                    choice.push(Item::Rule(key));
                }
                self.current = name.to_string();
                let choice = self.arena.alloc(choice);
                let seq = self
                    .arena
                    .alloc(Node::with_items(NodeKind::Sequence, vec![Item::Node(choice)]));
                self.add(name.to_string(), seq)
            }
        }
    }

    /// Alternatives of a splice entry, which must look like `[[alt, alt, ..]]`.
    fn splice_items(
        &mut self,
        parent: &str,
        sub: &str,
        body: &Token,
    ) -> Result<Vec<Item>, GrammarError> {
        match body {
            Token::List(outer) if outer.len() == 1 && matches!(outer[0], Token::List(_)) => {
                self.expr_items(&outer[0], 1)
            }
            _ => Err(GrammarError::InvalidSplice {
                key: format!("{}_{}", parent, sub),
                fragment: body.to_json().to_string(),
            }),
        }
    }

    pub(crate) fn add(&mut self, key: RuleKey, id: NodeId) -> Result<(), GrammarError> {
        if let Some(existing) = self.rules.get(&key) {
            return Err(GrammarError::ConflictingKey {
                existing: self.arena.render(*existing).to_string(),
                incoming: self.arena.render(id).to_string(),
                key,
            });
        }
        self.rules.insert(key, id);
        Ok(())
    }

    pub(crate) fn check_depth(&self, depth: usize, context: &str) -> Result<(), GrammarError> {
        if depth > self.config.max_depth {
            return Err(GrammarError::DepthLimitExceeded {
                limit: self.config.max_depth,
                context: context.to_string(),
            });
        }
        Ok(())
    }

    fn check_convert_depth(&self, depth: usize) -> Result<(), GrammarError> {
        self.check_depth(depth, &format!("normalizing rule `{}`", self.current))
    }

    fn convert_sequence(&mut self, token: &Token, depth: usize) -> Result<NodeId, GrammarError> {
        self.check_convert_depth(depth)?;
        let items = self.sequence_items(token, depth)?;
        Ok(self.arena.alloc(Node::with_items(NodeKind::Sequence, items)))
    }

    fn convert_expr(&mut self, token: &Token, depth: usize) -> Result<NodeId, GrammarError> {
        self.check_convert_depth(depth)?;
        let items = self.expr_items(token, depth)?;
        Ok(self.arena.alloc(Node::with_items(NodeKind::Choice, items)))
    }

    fn sequence_items(&mut self, token: &Token, depth: usize) -> Result<Vec<Item>, GrammarError> {
        match token {
            Token::Name(_) | Token::Pattern(_) => {
                Ok(vec![self.primitive(token, NodeKind::Choice, depth)?])
            }
            Token::Call(call) => Ok(vec![Item::Rule(self.register_call(call, depth)?)]),
            Token::List(items) => items
                .iter()
                .map(|item| match item {
                    Token::Name(_) | Token::Pattern(_) => {
                        self.primitive(item, NodeKind::Choice, depth)
                    }
                    Token::Call(call) => self.register_call(call, depth).map(Item::Rule),
                    Token::List(_) => self.convert_expr(item, depth + 1).map(Item::Node),
                })
                .collect(),
        }
    }

    fn expr_items(&mut self, token: &Token, depth: usize) -> Result<Vec<Item>, GrammarError> {
        match token {
            Token::Name(_) | Token::Pattern(_) => {
                Ok(vec![self.primitive(token, NodeKind::Sequence, depth)?])
            }
            Token::Call(call) => Ok(vec![Item::Rule(self.register_call(call, depth)?)]),
            Token::List(items) => items
                .iter()
                .map(|item| match item {
                    Token::Name(_) | Token::Pattern(_) => {
                        self.primitive(item, NodeKind::Sequence, depth)
                    }
                    Token::Call(call) => self.register_call(call, depth).map(Item::Rule),
                    Token::List(_) => self.convert_sequence(item, depth + 1).map(Item::Node),
                })
                .collect(),
        }
    }

    /// Convert a name or pattern. Operator prefixes produce a node of
    /// `nested` kind holding the peeled operators followed by the residue.
    fn primitive(
        &mut self,
        token: &Token,
        nested: NodeKind,
        depth: usize,
    ) -> Result<Item, GrammarError> {
        let text = match token {
            Token::Pattern(pattern) => return Ok(Item::Pattern(pattern.normalized())),
            Token::Name(text) => text,
            Token::List(_) | Token::Call(_) => {
                return Err(GrammarError::InvalidTokenType {
                    fragment: token.to_json().to_string(),
                })
            }
        };

        if let Some(op) = Operator::from_symbol(text) {
            return Ok(Item::Operator(op));
        }
        if is_generic(text) {
            return Ok(Item::Generic(parse_generic(text)?.to_string()));
        }

        let mut node = Node::new(nested);
        let mut rest = text.as_str();
        'scan: loop {
            for op in PREFIX_OPERATORS {
                if let Some(tail) = rest.strip_prefix(op.symbol()) {
                    node.push(Item::Operator(op));
                    rest = tail;
                    continue 'scan;
                }
            }
            break;
        }

        if node.items().is_empty() {
            return Ok(Item::Rule(text.clone()));
        }
        if rest.is_empty() {
            return Err(GrammarError::EmptyReference {
                token: text.clone(),
            });
        }

        let residue = if is_generic(rest) {
            Item::Generic(parse_generic(rest)?.to_string())
        } else if let Some(op) = Operator::from_symbol(rest) {
            Item::Operator(op)
        } else {
            Item::Rule(rest.to_string())
        };
        node.push(residue);

        self.check_convert_depth(depth + 1)?;
        Ok(Item::Node(self.arena.alloc(node)))
    }

    /// Queue a Call under a fresh `Target@N` key and return that key.
    fn register_call(&mut self, call: &CallToken, depth: usize) -> Result<RuleKey, GrammarError> {
        let mut n = 0;
        while self.pending.contains_key(&format!("{}@{}", call.target, n)) {
            n += 1;
        }
        let key = format!("{}@{}", call.target, n);

        // Reserve the key before converting arguments, which may hold further
        // calls to the same target.
        self.pending.insert(
            key.clone(),
            PendingCall {
                target: call.target.clone(),
                args: IndexMap::new(),
            },
        );

        let mut args = IndexMap::new();
        for (name, value) in &call.args {
            if args.contains_key(name) {
                return Err(GrammarError::DuplicateCallArgument {
                    target: call.target.clone(),
                    name: name.clone(),
                });
            }
            let id = self.convert_sequence(value, depth + 1)?;
            args.insert(name.clone(), id);
        }

        trace!(call = %key, target = %call.target, args = args.len(), "registered call");
        if let Some(pending) = self.pending.get_mut(&key) {
            pending.args = args;
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::error::ErrorCategory;
    use crate::grammar::pattern::Pattern;
    use serde_json::json;

    fn graph(value: serde_json::Value) -> Result<Graph, GrammarError> {
        normalize(&RuleMap::from_json(&value)?)
    }

    fn rendered(graph: &Graph, key: &str) -> String {
        graph.get(key).map(|n| n.to_string()).unwrap_or_default()
    }

    #[test]
    fn test_plain_sequence() {
        let g = graph(json!({"A": [{"pattern": "a"}, "B"], "B": {"pattern": "b"}})).unwrap();
        assert_eq!(rendered(&g, "A"), "[/a/y, B]");
        assert_eq!(rendered(&g, "B"), "[/b/y]");
    }

    #[test]
    fn test_stacked_prefixes_decompose() {
        let g = graph(json!({"A": ["!$B", "B"], "B": {"pattern": "b"}})).unwrap();
        assert_eq!(rendered(&g, "A"), "[(! | $ | B), B]");
    }

    #[test]
    fn test_prefixes_keep_source_order() {
        let g = graph(json!({"A": ["$!B", "B"], "B": {"pattern": "b"}})).unwrap();
        assert_eq!(rendered(&g, "A"), "[($ | ! | B), B]");
    }

    #[test]
    fn test_prefixed_choice_branch_is_sequence() {
        let g = graph(json!({"A": [["*B", "C"]], "B": {"pattern": "b"}, "C": {"pattern": "c"}}))
            .unwrap();
        assert_eq!(rendered(&g, "A"), "[([*, B] | C)]");
    }

    #[test]
    fn test_standalone_operators_stay_in_place() {
        let g = graph(json!({"A": ["*", "B", ["?", {"pattern": ";"}]], "B": {"pattern": "b"}}))
            .unwrap();
        assert_eq!(rendered(&g, "A"), "[*, B, (? | /;/y)]");
    }

    #[test]
    fn test_named_object_expansion() {
        let g = graph(json!({
            "Value": {"num": "number", "null": {"pattern": "null"}},
            "number": {"pattern": "[0-9]+"}
        }))
        .unwrap();
        let keys: Vec<_> = g.keys().cloned().collect();
        assert_eq!(keys, ["Value_num", "Value_null", "Value", "number"]);
        assert_eq!(rendered(&g, "Value"), "[(Value_num | Value_null)]");
    }

    #[test]
    fn test_splice_appends_alternatives() {
        let g = graph(json!({
            "Value": {"num": "number", "_": [["word", "number"]]},
            "number": {"pattern": "[0-9]+"},
            "word": {"pattern": "[a-z]+"}
        }))
        .unwrap();
        assert_eq!(rendered(&g, "Value"), "[(Value_num | word | number)]");
        assert!(!g.has("Value__"));
    }

    #[test]
    fn test_splice_shape_is_checked() {
        let err = graph(json!({"Value": {"_": ["word"]}, "word": {"pattern": "w"}})).unwrap_err();
        assert!(matches!(err, GrammarError::InvalidSplice { .. }));
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[test]
    fn test_expansion_key_conflict() {
        let err = graph(json!({
            "A_b": {"pattern": "x"},
            "A": {"b": {"pattern": "y"}}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            GrammarError::ConflictingKey {
                key: "A_b".into(),
                existing: "[/x/y]".into(),
                incoming: "[/y/y]".into(),
            }
        );
    }

    #[test]
    fn test_duplicate_declaration_conflicts() {
        let input = RuleMap::new()
            .rule("A", Pattern::new("a", "").unwrap())
            .rule("A", Pattern::new("b", "").unwrap());
        let err = normalize(&input).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::KeyConflict);
    }

    #[test]
    fn test_global_flag_is_stripped() {
        let g = graph(json!({"A": {"pattern": "a+", "flags": "gi"}})).unwrap();
        assert_eq!(rendered(&g, "A"), "[/a+/iy]");
    }

    #[test]
    fn test_empty_reference() {
        let err = graph(json!({"A": ["**"]})).unwrap_err();
        assert_eq!(
            err,
            GrammarError::EmptyReference {
                token: "**".into()
            }
        );
    }

    #[test]
    fn test_duplicate_call_argument() {
        let input = RuleMap::new()
            .rule("T", Token::list([Token::name("@x")]))
            .rule(
                "A",
                CallToken::new("T")
                    .arg("x", Token::Pattern(Pattern::new("a", "").unwrap()))
                    .arg("x", Token::Pattern(Pattern::new("b", "").unwrap())),
            );
        let err = normalize(&input).unwrap_err();
        assert_eq!(
            err,
            GrammarError::DuplicateCallArgument {
                target: "T".into(),
                name: "x".into()
            }
        );
    }

    #[test]
    fn test_repeated_calls_get_distinct_keys() {
        let g = graph(json!({
            "T": ["@x"],
            "A": [{"state": "T", "args": {"x": {"pattern": "a"}}},
                  {"state": "T", "args": {"x": {"pattern": "b"}}}]
        }))
        .unwrap();
        assert_eq!(rendered(&g, "A"), "[T@0, T@1]");
        assert!(g.has("T@0"));
        assert!(g.has("T@1"));
    }

    #[test]
    fn test_nested_call_to_same_target() {
        let g = graph(json!({
            "T": ["@x"],
            "A": [{"state": "T", "args": {"x": {"state": "T", "args": {"x": {"pattern": "a"}}}}}]
        }))
        .unwrap();
        assert_eq!(rendered(&g, "A"), "[T@0]");
        assert_eq!(rendered(&g, "T@0"), "[(@ | [T@1])]");
        assert_eq!(rendered(&g, "T@1"), "[(@ | [/a/y])]");
    }

    #[test]
    fn test_depth_limit() {
        let config = BuildConfig::default().with_max_depth(2);
        let input = RuleMap::from_json(&json!({"A": [[[[["x"]]]]], "x": {"pattern": "x"}})).unwrap();
        let err = normalize_with(&input, &config).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ResourceLimit);
    }
}
