//! Grammar input model
//!
//! The plain nested description a grammar author writes, before
//! normalization:
//!
//! ```text
//! Object: [/\{/, { state: Items, args: { Sep: /,/, Value: Member } }, /\}/]
//! Value:  { obj: Object, str: string }
//! Items:  [?, @Value, [[*, @Sep, @Value]]]
//! ```
//!
//! Nested lists alternate between sequence and choice levels: a rule body is
//! a sequence, a list inside it is a choice, a list inside that is a sequence
//! again, and so on.
//!
//! The same model is produced by `graph_to_input`, and has a JSON/YAML
//! encoding:
//! - string: rule reference, operator, or operator-prefixed reference
//! - array: nested list
//! - `{"pattern": "...", "flags": "..."}`: terminal pattern
//! - `{"state": "Target", "args": {...}}`: call of a parameterized rule

use crate::grammar::error::GrammarError;
use crate::grammar::pattern::Pattern;
use serde_json::{Map, Value};

/// A user-declared rule name.
pub type RuleName = String;

/// One token of the input description.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Rule reference, standalone operator, generic placeholder, or any of
    /// those with operator prefixes (`!$Name`, `?@Value`)
    Name(String),
    Pattern(Pattern),
    List(Vec<Token>),
    Call(CallToken),
}

/// A call of a parameterized rule with named argument sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct CallToken {
    pub target: String,
    pub args: Vec<(String, Token)>,
}

impl CallToken {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: Token) -> Self {
        self.args.push((name.into(), value));
        self
    }
}

/// The body of one declared rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleDef {
    /// A token or sequence
    Body(Token),
    /// Mutually exclusive named sub-rules, expanded to `Parent_Sub` keys
    Named(Vec<(String, Token)>),
}

/// An ordered collection of declared rules.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleMap {
    rules: Vec<(RuleName, RuleDef)>,
}

impl Token {
    pub fn name(name: impl Into<String>) -> Self {
        Token::Name(name.into())
    }

    pub fn list(items: impl IntoIterator<Item = Token>) -> Self {
        Token::List(items.into_iter().collect())
    }

    /// Decode a token from its JSON encoding.
    pub fn from_json(value: &Value) -> Result<Token, GrammarError> {
        match value {
            Value::String(s) => Ok(Token::Name(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Token::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Token::List),
            Value::Object(map) => {
                if let Some(pattern) = pattern_from_json(map) {
                    return pattern.map(Token::Pattern);
                }
                if map.contains_key("state") {
                    return call_from_json(map).map(Token::Call);
                }
                Err(invalid_token(value))
            }
            _ => Err(invalid_token(value)),
        }
    }

    /// Encode this token as JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Token::Name(name) => Value::String(name.clone()),
            Token::Pattern(pattern) => pattern_to_json(pattern),
            Token::List(items) => Value::Array(items.iter().map(Token::to_json).collect()),
            Token::Call(call) => {
                let mut args = Map::new();
                for (name, value) in &call.args {
                    args.insert(name.clone(), value.to_json());
                }
                let mut map = Map::new();
                map.insert("state".into(), Value::String(call.target.clone()));
                map.insert("args".into(), Value::Object(args));
                Value::Object(map)
            }
        }
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Token::Name(name.to_string())
    }
}

impl From<Pattern> for Token {
    fn from(pattern: Pattern) -> Self {
        Token::Pattern(pattern)
    }
}

impl From<CallToken> for Token {
    fn from(call: CallToken) -> Self {
        Token::Call(call)
    }
}

impl RuleDef {
    pub fn to_json(&self) -> Value {
        match self {
            RuleDef::Body(token) => token.to_json(),
            RuleDef::Named(subs) => {
                let mut map = Map::new();
                for (name, token) in subs {
                    map.insert(name.clone(), token.to_json());
                }
                Value::Object(map)
            }
        }
    }
}

impl RuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule declaration. Duplicates are kept and rejected later by
    /// the normalizer as conflicting keys.
    pub fn insert(&mut self, name: impl Into<RuleName>, def: RuleDef) {
        self.rules.push((name.into(), def));
    }

    pub fn with(mut self, name: impl Into<RuleName>, def: RuleDef) -> Self {
        self.insert(name, def);
        self
    }

    pub fn rule(self, name: impl Into<RuleName>, body: impl Into<Token>) -> Self {
        self.with(name, RuleDef::Body(body.into()))
    }

    pub fn get(&self, name: &str) -> Option<&RuleDef> {
        self.rules.iter().find(|(n, _)| n == name).map(|(_, def)| def)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuleName, &RuleDef)> {
        self.rules.iter().map(|(name, def)| (name, def))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decode a grammar from its JSON encoding: an object mapping rule
    /// names to bodies. A body object that is not pattern-shaped is a
    /// named-object rule.
    pub fn from_json(value: &Value) -> Result<RuleMap, GrammarError> {
        let Value::Object(map) = value else {
            return Err(invalid_token(value));
        };
        let mut rules = RuleMap::new();
        for (name, body) in map {
            let def = match body {
                Value::Object(sub) if pattern_from_json(sub).is_none() => {
                    let subs = sub
                        .iter()
                        .map(|(k, v)| Token::from_json(v).map(|t| (k.clone(), t)))
                        .collect::<Result<Vec<_>, _>>()?;
                    RuleDef::Named(subs)
                }
                other => RuleDef::Body(Token::from_json(other)?),
            };
            rules.insert(name.clone(), def);
        }
        Ok(rules)
    }

    pub fn from_json_str(text: &str) -> Result<RuleMap, GrammarError> {
        let value: Value = serde_json::from_str(text).map_err(|e| GrammarError::InvalidDocument {
            message: e.to_string(),
        })?;
        Self::from_json(&value)
    }

    /// YAML grammars use the same shapes as JSON.
    pub fn from_yaml_str(text: &str) -> Result<RuleMap, GrammarError> {
        let value: Value = serde_yaml::from_str(text).map_err(|e| GrammarError::InvalidDocument {
            message: e.to_string(),
        })?;
        Self::from_json(&value)
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, def) in &self.rules {
            map.insert(name.clone(), def.to_json());
        }
        Value::Object(map)
    }
}

fn invalid_token(value: &Value) -> GrammarError {
    GrammarError::InvalidTokenType {
        fragment: value.to_string(),
    }
}

/// True when every key of `map` is one of `allowed`.
fn has_only_keys(map: &Map<String, Value>, allowed: &[&str]) -> bool {
    map.keys().all(|key| allowed.contains(&key.as_str()))
}

/// `None` when the object is not pattern-shaped: a `pattern` key, an
/// optional `flags` key and nothing else.
fn pattern_from_json(map: &Map<String, Value>) -> Option<Result<Pattern, GrammarError>> {
    if !has_only_keys(map, &["pattern", "flags"]) {
        return None;
    }
    let source = map.get("pattern")?;
    let whole = Value::Object(map.clone());
    let Value::String(source) = source else {
        return Some(Err(invalid_token(&whole)));
    };
    let flags = match map.get("flags") {
        None => "",
        Some(Value::String(flags)) => flags.as_str(),
        Some(_) => return Some(Err(invalid_token(&whole))),
    };
    Some(Pattern::new(source, flags))
}

fn pattern_to_json(pattern: &Pattern) -> Value {
    let mut map = Map::new();
    map.insert("pattern".into(), Value::String(pattern.source().to_string()));
    map.insert("flags".into(), Value::String(pattern.flags().to_string()));
    Value::Object(map)
}

fn call_from_json(map: &Map<String, Value>) -> Result<CallToken, GrammarError> {
    let whole = Value::Object(map.clone());
    if !has_only_keys(map, &["state", "args"]) {
        return Err(invalid_token(&whole));
    }
    let target = match map.get("state") {
        Some(Value::String(target)) => target.clone(),
        _ => {
            return Err(GrammarError::InvalidCallTarget {
                fragment: whole.to_string(),
            })
        }
    };
    let args = match map.get("args") {
        None => Vec::new(),
        Some(Value::Object(args)) => args
            .iter()
            .map(|(name, v)| Token::from_json(v).map(|t| (name.clone(), t)))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(invalid_token(&whole)),
    };
    Ok(CallToken { target, args })
}
