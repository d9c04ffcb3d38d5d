//! The JSON grammar fixture, built from both of its encodings

use rulegraph::grammar::testing::fixture_graph;
use rulegraph::{graph_to_input, normalize, Graph};

fn json_graph() -> Graph {
    fixture_graph("json.grammar.json").unwrap()
}

#[test]
fn test_rendered_graph() {
    let graph = json_graph();
    insta::assert_snapshot!(graph.to_string().trim_end(), @r#"
    Entry = [Value]
    Value_obj = [Object]
    Value_arr = [Array]
    Value_str = [string]
    Value_num = [number]
    Value_bool = [boolean]
    Value_null = [/null/y]
    Value = [(Value_obj | Value_arr | Value_str | Value_num | Value_bool | Value_null)]
    Object = [/\{/y, Items@0, /\}/y]
    Array = [/\[/y, Items@1, /\]/y]
    string = [/"/y, (* | stringBody), /"/y]
    stringBody = [/([^"\\]|\\(["\\/bfnrt]|u[0-9a-fA-F]{4}))+/y]
    number = [/-?(?:0|[1-9]\d*)(?:\.\d+)?(?:[eE][+-]?\d+)?/y]
    boolean = [/true|false/y]
    Items = [?, @Value, ([*, @Sep, @Value])]
    Items@0 = [?, (@ | [string, /:/y, Value]), ([*, (@ | [/,/y]), (@ | [string, /:/y, Value])])]
    Items@1 = [?, (@ | [Value]), ([*, (@ | [/,/y]), (@ | [Value])])]
    "#);
}

#[test]
fn test_yaml_fixture_matches_json() {
    let yaml = fixture_graph("json.grammar.yaml").unwrap();
    assert_eq!(yaml.to_string(), json_graph().to_string());
}

#[test]
fn test_arities() {
    let graph = json_graph();
    let arity = |key: &str| graph.get(key).unwrap().arity();
    assert_eq!(arity("Entry"), 1);
    assert_eq!(arity("Value"), 1);
    assert_eq!(arity("Object"), 3);
    assert_eq!(arity("string"), 3);
    assert_eq!(arity("Items"), 1);
    assert_eq!(arity("Items@0"), 1);
}

#[test]
fn test_only_generic_rule_is_items() {
    let graph = json_graph();
    let generic: Vec<_> = graph
        .iter()
        .filter(|(_, node)| node.is_generic())
        .map(|(key, _)| key.as_str())
        .collect();
    assert_eq!(generic, ["Items"]);
}

#[test]
fn test_no_left_recursion() {
    let graph = json_graph();
    assert!(graph.scc_info().is_empty());
    let deps: Vec<_> = graph.dependencies("Value").unwrap().iter().cloned().collect();
    assert_eq!(
        deps,
        ["Value_obj", "Value_arr", "Value_str", "Value_num", "Value_bool", "Value_null"]
    );
    let deps: Vec<_> = graph.dependencies("Items@0").unwrap().iter().cloned().collect();
    assert_eq!(deps, ["string"]);
}

#[test]
fn test_roundtrip() {
    let graph = json_graph();
    let again = normalize(&graph_to_input(&graph)).unwrap();
    assert_eq!(again.to_string(), graph.to_string());
}
