//! Error types for grammar graph construction
//!
//! Every failure aborts the construction call; no partial graph is returned.
//! Node and rule context is carried as rendered text (see the `Display`
//! notation in `graph`), so errors stay `Clone` and independent of the
//! arena they were raised against. Operator conflicts also carry the whole
//! graph, one `key = node` line per rule, in their `graph` field; it is left
//! out of the message.

use thiserror::Error;

/// Broad classes of construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed token shapes and non-string names
    Input,
    /// Duplicate rule keys from declaration or expansion
    KeyConflict,
    /// Call and generic placeholder failures
    Generic,
    /// Well-formedness violations found by the finalizer
    Invariant,
    /// Nesting deeper than the configured limit
    ResourceLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("Invalid grammar document: {message}")]
    InvalidDocument { message: String },

    #[error("Invalid token type: {fragment}")]
    InvalidTokenType { fragment: String },

    #[error("Call target must be a string, got: {fragment}")]
    InvalidCallTarget { fragment: String },

    #[error("Token `{token}` has operators but no rule reference")]
    EmptyReference { token: String },

    #[error("Invalid pattern /{pattern}/: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid pattern flags: {flags:?}")]
    InvalidPatternFlags { flags: String },

    #[error("Not a generic placeholder: {token:?}")]
    MalformedGeneric { token: String },

    #[error("Splice entry `{key}` must be a doubly-nested single-element list, got: {fragment}")]
    InvalidSplice { key: String, fragment: String },

    #[error("Conflicting rule key `{key}`: {existing} vs {incoming}")]
    ConflictingKey {
        key: String,
        existing: String,
        incoming: String,
    },

    #[error("Duplicate argument `{name}` in call to `{target}`")]
    DuplicateCallArgument { target: String, name: String },

    #[error("Call `{call}` targets unknown rule `{target}`")]
    UnknownTargetRule { call: String, target: String },

    #[error("Missing generic argument `{name}` in call `{call}` to `{target}`")]
    MissingCallArgument {
        call: String,
        target: String,
        name: String,
    },

    #[error("Rule `{rule}` references `{reference}`, which contains generics, without a call")]
    UnresolvedGenericReference { rule: String, reference: String },

    #[error("Rule `{rule}` references unknown rule `{reference}`")]
    UnknownRule { rule: String, reference: String },

    #[error(
        "Choice in rule `{rule}` has conflicting arities: {first_arity} vs {second_arity} \
         (branches {first} and {second} in {node})"
    )]
    ArityConflict {
        rule: String,
        node: String,
        first: String,
        first_arity: usize,
        second: String,
        second_arity: usize,
    },

    #[error("Cannot have both positive and negative lookahead in rule `{rule}`: {node}")]
    ConflictingLookahead {
        rule: String,
        node: String,
        graph: String,
    },

    #[error("Cannot have both lexical and syntactic operator in rule `{rule}`: {node}")]
    ConflictingLexicalMode {
        rule: String,
        node: String,
        graph: String,
    },

    #[error("Cannot have multiple types of repetition in rule `{rule}`: {node}")]
    ConflictingRepetition {
        rule: String,
        node: String,
        graph: String,
    },

    #[error("Ordered choice operator '/' can only be applied to Choice, in rule `{rule}`: {node}")]
    OrderedChoiceOnSequence {
        rule: String,
        node: String,
        graph: String,
    },

    #[error("Expected sticky and non-global pattern in rule `{rule}`, got: {pattern}")]
    NonAnchoredPattern { rule: String, pattern: String },

    #[error("Nesting depth limit of {limit} exceeded while {context}")]
    DepthLimitExceeded { limit: usize, context: String },
}

impl GrammarError {
    pub fn category(&self) -> ErrorCategory {
        use GrammarError::*;
        match self {
            InvalidDocument { .. }
            | InvalidTokenType { .. }
            | InvalidCallTarget { .. }
            | EmptyReference { .. }
            | InvalidPattern { .. }
            | InvalidPatternFlags { .. }
            | MalformedGeneric { .. }
            | InvalidSplice { .. } => ErrorCategory::Input,
            ConflictingKey { .. } => ErrorCategory::KeyConflict,
            DuplicateCallArgument { .. }
            | UnknownTargetRule { .. }
            | MissingCallArgument { .. }
            | UnresolvedGenericReference { .. } => ErrorCategory::Generic,
            UnknownRule { .. }
            | ArityConflict { .. }
            | ConflictingLookahead { .. }
            | ConflictingLexicalMode { .. }
            | ConflictingRepetition { .. }
            | OrderedChoiceOnSequence { .. }
            | NonAnchoredPattern { .. } => ErrorCategory::Invariant,
            DepthLimitExceeded { .. } => ErrorCategory::ResourceLimit,
        }
    }
}
