//! Grammar graph construction and analysis
//!
//! Pipeline: [`input`] description → [`normalize`] (operator peeling,
//! named-object expansion, call registration) → [`instantiate`] (generic
//! calls) → [`finalize`] (validation, arity, freezing) → [`scc`]
//! (left-recursion groups), producing an immutable [`graph::Graph`].

pub mod arity;
pub mod config;
pub mod error;
mod finalize;
pub mod graph;
pub mod input;
mod instantiate;
pub mod node;
pub mod normalize;
pub mod operators;
pub mod pattern;
pub mod scc;
pub mod serialize;
pub mod testing;

pub use config::BuildConfig;
pub use error::{ErrorCategory, GrammarError};
pub use graph::{Graph, NodeRef};
pub use input::{CallToken, RuleDef, RuleMap, RuleName, Token};
pub use node::{Item, NodeId, NodeKind, Operators, RuleKey};
pub use normalize::{normalize, normalize_with};
pub use operators::{is_generic, is_operator, parse_generic, OpMask, Operator};
pub use pattern::{Pattern, PatternFlags};
pub use scc::{compute_scc_info, ComponentId, DepGraph, SccInfo};
pub use serialize::graph_to_input;
