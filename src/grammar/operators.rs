//! Operator Model
//!
//! The closed vocabulary of single-character grammar operators, plus the
//! generic placeholder marker `@name`. Each operator owns one bit of an
//! [`OpMask`], so set membership and conflict checks are single mask tests.
//!
//! Prefix scanning order (used when peeling operators off token strings):
//!
//! ```text
//! #  %  !  &  *  ?  +  $  /
//! ```
//!
//! The synthetic group marker `@` is never a prefix; it only appears as a
//! standalone item produced by generic instantiation.

use crate::grammar::error::GrammarError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// A single grammar operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    /// `#` lexical (atomic) mode: no implicit whitespace skipping inside
    Lexical,
    /// `%` syntactic mode
    Syntactic,
    /// `!` negative lookahead
    NegativeLookahead,
    /// `&` positive lookahead
    PositiveLookahead,
    /// `*` zero or more
    ZeroOrMore,
    /// `?` optional
    Optional,
    /// `+` one or more
    OneOrMore,
    /// `$` rewind/backtrack marker
    Rewind,
    /// `/` ordered choice (Choice only)
    OrderedChoice,
    /// `@` synthetic grouping marker inserted by generic instantiation
    Group,
}

/// Operators that may prefix a token string, in scanning order.
pub const PREFIX_OPERATORS: [Operator; 9] = [
    Operator::Lexical,
    Operator::Syntactic,
    Operator::NegativeLookahead,
    Operator::PositiveLookahead,
    Operator::ZeroOrMore,
    Operator::Optional,
    Operator::OneOrMore,
    Operator::Rewind,
    Operator::OrderedChoice,
];

/// Symbol table, built once before any grammar is normalized.
static OPERATOR_TABLE: Lazy<HashMap<&'static str, Operator>> = Lazy::new(|| {
    PREFIX_OPERATORS
        .iter()
        .chain(std::iter::once(&Operator::Group))
        .map(|op| (op.symbol(), *op))
        .collect()
});

impl Operator {
    /// The source symbol of this operator.
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Lexical => "#",
            Operator::Syntactic => "%",
            Operator::NegativeLookahead => "!",
            Operator::PositiveLookahead => "&",
            Operator::ZeroOrMore => "*",
            Operator::Optional => "?",
            Operator::OneOrMore => "+",
            Operator::Rewind => "$",
            Operator::OrderedChoice => "/",
            Operator::Group => "@",
        }
    }

    /// Look an operator up by its exact symbol.
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        OPERATOR_TABLE.get(symbol).copied()
    }

    /// The bit this operator occupies in an [`OpMask`].
    pub const fn bit(self) -> OpMask {
        OpMask(1 << self as u16)
    }

    pub fn is_lookahead(self) -> bool {
        OpMask::LOOKAHEAD.has(self)
    }

    pub fn is_iteration(self) -> bool {
        OpMask::ITERATION.has(self)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A set of operators encoded as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpMask(u16);

impl OpMask {
    pub const EMPTY: OpMask = OpMask(0);

    /// `&` and `!`
    pub const LOOKAHEAD: OpMask =
        OpMask(Operator::PositiveLookahead.bit().0 | Operator::NegativeLookahead.bit().0);

    /// `*`, `+` and `?`
    pub const REPETITION: OpMask = OpMask(
        Operator::ZeroOrMore.bit().0 | Operator::OneOrMore.bit().0 | Operator::Optional.bit().0,
    );

    /// Repetition plus the synthetic `@` group
    pub const ITERATION: OpMask = OpMask(Self::REPETITION.0 | Operator::Group.bit().0);

    /// Operators that make a node match the empty input regardless of its body
    pub const NULLABLE: OpMask = OpMask(
        Operator::ZeroOrMore.bit().0
            | Operator::Optional.bit().0
            | Operator::PositiveLookahead.bit().0
            | Operator::NegativeLookahead.bit().0,
    );

    /// `#` and `%`
    pub const MODE: OpMask = OpMask(Operator::Lexical.bit().0 | Operator::Syntactic.bit().0);

    pub fn has(self, op: Operator) -> bool {
        self.0 & op.bit().0 != 0
    }

    pub fn insert(&mut self, op: Operator) {
        self.0 |= op.bit().0;
    }

    /// True when any operator of `other` is present.
    pub fn intersects(self, other: OpMask) -> bool {
        self.0 & other.0 != 0
    }

    /// True when every operator of `other` is present.
    pub fn contains_all(self, other: OpMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    /// Operators in this set, in declaration order of [`Operator`].
    pub fn iter(self) -> impl Iterator<Item = Operator> {
        PREFIX_OPERATORS
            .into_iter()
            .chain(std::iter::once(Operator::Group))
            .filter(move |op| self.has(*op))
    }
}

impl BitOr for OpMask {
    type Output = OpMask;

    fn bitor(self, rhs: OpMask) -> OpMask {
        OpMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpMask {
    fn bitor_assign(&mut self, rhs: OpMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for OpMask {
    type Output = OpMask;

    fn bitand(self, rhs: OpMask) -> OpMask {
        OpMask(self.0 & rhs.0)
    }
}

impl FromIterator<Operator> for OpMask {
    fn from_iter<I: IntoIterator<Item = Operator>>(iter: I) -> Self {
        let mut mask = OpMask::EMPTY;
        for op in iter {
            mask.insert(op);
        }
        mask
    }
}

impl fmt::Display for OpMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in self.iter() {
            f.write_str(op.symbol())?;
        }
        Ok(())
    }
}

/// True for standalone operator tokens: a bare operator symbol or a generic
/// placeholder.
pub fn is_operator(token: &str) -> bool {
    Operator::from_symbol(token).is_some() || is_generic(token)
}

/// True for a generic placeholder `@name` (the bare `@` group marker is not
/// a placeholder).
pub fn is_generic(token: &str) -> bool {
    token.starts_with('@') && token != "@"
}

/// Extract the placeholder name from `@name`.
pub fn parse_generic(token: &str) -> Result<&str, GrammarError> {
    if !is_generic(token) {
        return Err(GrammarError::MalformedGeneric {
            token: token.to_string(),
        });
    }
    let name = token[1..].trim();
    if name.is_empty() {
        return Err(GrammarError::MalformedGeneric {
            token: token.to_string(),
        });
    }
    Ok(name)
}
