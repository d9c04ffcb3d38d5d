//! Test helpers
//!
//! Small builders for writing grammars inline in tests, plus access to the
//! grammar fixtures under `tests/fixtures/`.
//!
//! ```rust-example
//! use rulegraph::grammar::testing::{build, call, re};
//! use rulegraph::{RuleMap, Token};
//!
//! let graph = build(
//!     RuleMap::new()
//!         .rule("T", Token::list([Token::name("@x"), re("bar")]))
//!         .rule("A", call("T", [("x", re("foo"))])),
//! )?;
//! ```

use crate::grammar::error::GrammarError;
use crate::grammar::graph::Graph;
use crate::grammar::input::{CallToken, RuleMap, Token};
use crate::grammar::normalize::normalize;
use crate::grammar::pattern::Pattern;
use std::fs;
use std::path::PathBuf;

/// A pattern token with no flags. Panics on an invalid source.
pub fn re(source: &str) -> Token {
    re_flags(source, "")
}

pub fn re_flags(source: &str, flags: &str) -> Token {
    match Pattern::new(source, flags) {
        Ok(pattern) => Token::Pattern(pattern),
        Err(err) => panic!("invalid test pattern /{}/{}: {}", source, flags, err),
    }
}

/// A call token with the given arguments.
pub fn call<'a>(target: &str, args: impl IntoIterator<Item = (&'a str, Token)>) -> Token {
    let call = args
        .into_iter()
        .fold(CallToken::new(target), |call, (name, value)| call.arg(name, value));
    Token::Call(call)
}

pub fn build(rules: RuleMap) -> Result<Graph, GrammarError> {
    normalize(&rules)
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load_fixture(name: &str) -> std::io::Result<String> {
    fs::read_to_string(fixture_path(name))
}

/// Build a fixture grammar, choosing the decoder by file extension.
pub fn fixture_graph(name: &str) -> Result<Graph, GrammarError> {
    let text = load_fixture(name).map_err(|e| GrammarError::InvalidDocument {
        message: format!("failed to read {}: {}", fixture_path(name).display(), e),
    })?;
    if name.ends_with(".yaml") || name.ends_with(".yml") {
        Graph::from_yaml_str(&text)
    } else {
        Graph::from_json_str(&text)
    }
}
