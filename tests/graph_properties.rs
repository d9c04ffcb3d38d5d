//! End-to-end properties of built graphs

use rstest::rstest;
use rulegraph::grammar::testing::{build, call, re, re_flags};
use rulegraph::{ErrorCategory, GrammarError, Graph, RuleMap, Token};
use serde_json::{json, Value};

fn graph(value: Value) -> Result<Graph, GrammarError> {
    Graph::from_json(&value)
}

/// Components as sorted member lists, sorted.
fn cycles(graph: &Graph) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = graph
        .components()
        .map(|(_, members)| {
            let mut members = members.to_vec();
            members.sort();
            members
        })
        .collect();
    out.sort();
    out
}

#[rstest(
    grammar,
    expected,
    case(json!({"A": ["x", "A"], "x": {"pattern": "x"}}), vec![]),
    case(json!({"A": [["?", "x"], "A"], "x": {"pattern": "x"}}), vec![vec!["A"]]),
    case(json!({"A": ["B"], "B": ["A"]}), vec![vec!["A", "B"]]),
    case(json!({"A": ["*x", "B"], "B": ["!x", "A"], "x": {"pattern": "x"}}), vec![vec!["A", "B"]]),
    case(json!({"A": [{"pattern": "a*"}, "A"]}), vec![vec!["A"]]),
    case(json!({"A": [{"pattern": "a+"}, "A"]}), vec![]),
    case(
        json!({"A": ["B", "C"], "B": ["C", "B"], "C": [["A", {"pattern": "c"}]]}),
        vec![vec!["A", "B", "C"]]
    )
)]
fn test_left_recursion_groups(grammar: Value, expected: Vec<Vec<&str>>) {
    let graph = graph(grammar).unwrap();
    assert_eq!(cycles(&graph), expected);
    for (id, members) in graph.components() {
        for key in members {
            assert_eq!(graph.scc_of(key), Some(id));
        }
    }
}

#[rstest(
    grammar,
    category,
    case(json!({"A": [1]}), ErrorCategory::Input),
    case(json!({"A": [{"state": ["T"]}]}), ErrorCategory::Input),
    case(json!({"A": [{"pattern": "("}]}), ErrorCategory::Input),
    case(json!({"A": [{"pattern": "a", "flags": "q"}]}), ErrorCategory::Input),
    case(json!({"A": [{"pattern": "a", "name": "A"}]}), ErrorCategory::Input),
    case(json!({"A_b": ["x"], "A": {"b": "x"}, "x": {"pattern": "x"}}), ErrorCategory::KeyConflict),
    case(json!({"A": [{"state": "T", "args": {}}]}), ErrorCategory::Generic),
    case(json!({"T": ["@x"], "A": [{"state": "T", "args": {}}]}), ErrorCategory::Generic),
    case(json!({"T": ["@x"], "A": ["T"]}), ErrorCategory::Generic),
    case(json!({"A": [["x", ["x", "x"]]], "x": {"pattern": "x"}}), ErrorCategory::Invariant),
    case(json!({"A": ["&!x"], "x": {"pattern": "x"}}), ErrorCategory::Invariant),
    case(json!({"A": ["nope"]}), ErrorCategory::Invariant)
)]
fn test_error_categories(grammar: Value, category: ErrorCategory) {
    let err = graph(grammar).unwrap_err();
    assert_eq!(err.category(), category, "{}", err);
}

#[test]
fn test_arity_conflict_names_both_branches() {
    let err = graph(json!({
        "A": [[["x", "x"], ["x", "x", "x"]]],
        "x": {"pattern": "x"}
    }))
    .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("[x, x]"), "{}", message);
    assert!(message.contains("[x, x, x]"), "{}", message);
}

#[rstest(
    body,
    arity,
    case(json!(["x", "x"]), 2),
    case(json!(["!x", "x"]), 1),
    case(json!(["&", "x", "x"]), 0),
    case(json!(["*", "x", "x"]), 1),
    case(json!(["#", "x", "x"]), 2),
    case(json!(["$x", "x"]), 2),
    case(json!([["x", ["x"]], "x"]), 2),
    case(json!([["&", "x"]]), 0),
    case(json!([["*", ["x", "x"], "x"]]), 1),
    case(json!([[]]), 0)
)]
fn test_arity(body: Value, arity: usize) {
    let graph = graph(json!({"A": body, "x": {"pattern": "x"}})).unwrap();
    let node = graph.get("A").unwrap();
    assert_eq!(node.arity(), arity);
    assert_eq!(node.arity(), arity);
}

#[test]
fn test_generic_instantiation() {
    let graph = build(
        RuleMap::new()
            .rule("T", Token::list([Token::name("@x"), Token::name("bar")]))
            .rule("bar", re("bar"))
            .rule("foo", re("foo"))
            .rule("A", call("T", [("x", Token::name("foo"))])),
    )
    .unwrap();
    assert_eq!(graph.get("T@0").unwrap().to_string(), "[(@ | [foo]), bar]");
    assert_eq!(graph.get("A").unwrap().to_string(), "[T@0]");

    let direct = build(
        RuleMap::new()
            .rule("T", Token::list([Token::name("@x"), Token::name("bar")]))
            .rule("bar", re("bar"))
            .rule("A", Token::name("T")),
    )
    .unwrap_err();
    assert_eq!(
        direct,
        GrammarError::UnresolvedGenericReference {
            rule: "A".into(),
            reference: "T".into()
        }
    );
}

#[test]
fn test_named_rule_with_pattern_sub_rule() {
    let graph = graph(json!({
        "Value": {"pattern": "Object", "str": "string"},
        "Object": {"pattern": "\\{\\}"},
        "string": {"pattern": "\"[^\"]*\""}
    }))
    .unwrap();
    assert_eq!(graph.get("Value").unwrap().to_string(), "[(Value_pattern | Value_str)]");
    assert_eq!(graph.get("Value_pattern").unwrap().to_string(), "[Object]");
    assert_eq!(graph.get("Value_str").unwrap().to_string(), "[string]");
}

#[test]
fn test_global_pattern_is_normalized() {
    let graph = build(RuleMap::new().rule("A", re_flags("ab+", "g"))).unwrap();
    let node = graph.get("A").unwrap();
    let [rulegraph::grammar::Item::Pattern(pattern)] = node.items() else {
        panic!("expected a single pattern, got {}", node);
    };
    assert!(!pattern.flags().global);
    assert!(pattern.flags().sticky);
    assert!(pattern.is_anchored());

    let declared = rulegraph::Pattern::new("ab+", "g").unwrap();
    let text = "xxabbby";
    assert_eq!(pattern.find_at(text, 2), Some(2..6));
    assert_eq!(declared.find_at(text, 2), Some(2..6));
    assert_eq!(pattern.find_at(text, 0), None);
}

#[test]
fn test_depth_limit_is_a_resource_error() {
    let mut body = json!("x");
    for _ in 0..40 {
        body = json!([body]);
    }
    let config = rulegraph::BuildConfig::default().with_max_depth(16);
    let input = RuleMap::from_json(&json!({"A": body, "x": {"pattern": "x"}})).unwrap();
    let err = rulegraph::normalize_with(&input, &config).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ResourceLimit);
    assert!(matches!(err, GrammarError::DepthLimitExceeded { limit: 16, .. }));
}

#[test]
fn test_config_from_yaml() {
    let config = rulegraph::BuildConfig::from_yaml_str("splice_key: more\n").unwrap();
    let input = RuleMap::from_json(&json!({
        "V": {"a": "x", "more": [["y"]]},
        "x": {"pattern": "x"},
        "y": {"pattern": "y"}
    }))
    .unwrap();
    let graph = rulegraph::normalize_with(&input, &config).unwrap();
    assert_eq!(graph.get("V").unwrap().to_string(), "[(V_a | y)]");
}
