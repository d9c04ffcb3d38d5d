//! # rulegraph
//!
//! Compiles a declarative grammar description into a validated, analyzed
//! rule graph for a parsing runtime to consume.
//!
//! A grammar is a map of rule names to token lists: terminal patterns, rule
//! references, operator-prefixed references, nested choice/sequence lists,
//! named sub-rule objects, and calls of parameterized rules. Building a
//! [`Graph`] normalizes all of that into `Sequence`/`Choice` nodes, checks
//! well-formedness, computes each node's arity, and finds left-recursive rule
//! groups.
//!
//! ```rust-example
//! use rulegraph::Graph;
//!
//! let graph = Graph::from_json_str(r#"{
//!     "Sum": [["Sum", "Num"], {"pattern": "\\+"}, "Num"],
//!     "Num": {"pattern": "[0-9]+"}
//! }"#)?;
//! assert_eq!(graph.get("Sum").unwrap().arity(), 3);
//! assert!(graph.scc_of("Sum").is_some());
//! ```
//!
//! ## Testing
//!
//! Inline grammar builders and fixture access live in the
//! [testing module](grammar::testing).

pub mod grammar;

pub use grammar::{
    compute_scc_info, graph_to_input, normalize, normalize_with, BuildConfig, CallToken,
    ErrorCategory, GrammarError, Graph, NodeRef, OpMask, Operator, Pattern, RuleDef, RuleMap,
    SccInfo, Token,
};
