//! Terminal patterns
//!
//! A [`Pattern`] is a regex source plus JS-style flags. Grammars may declare
//! patterns with any flags; the graph only ever stores the normalized form,
//! which is sticky (anchored at the match position) and non-global.
//!
//! Two compiled regexes are kept per pattern: one anchored with `\A` for
//! sticky matching against `haystack[pos..]`, and one unanchored for forward
//! search. The anchored one also answers [`Pattern::matches_empty`], which the
//! prefix-dependency walk uses to decide nullability.

use crate::grammar::error::GrammarError;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::ops::Range;

/// Flags carried by a pattern, named after their JS letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PatternFlags {
    /// `g`
    pub global: bool,
    /// `y`
    pub sticky: bool,
    /// `i`
    pub ignore_case: bool,
    /// `m`
    pub multi_line: bool,
    /// `s`
    pub dot_all: bool,
    /// `u`. Kept for round-tripping only: matching is always Unicode-aware,
    /// with or without it.
    pub unicode: bool,
}

impl PatternFlags {
    /// Parse a flag string such as `"gi"`.
    pub fn parse(flags: &str) -> Result<Self, GrammarError> {
        let mut out = PatternFlags::default();
        for c in flags.chars() {
            let slot = match c {
                'g' => &mut out.global,
                'y' => &mut out.sticky,
                'i' => &mut out.ignore_case,
                'm' => &mut out.multi_line,
                's' => &mut out.dot_all,
                'u' => &mut out.unicode,
                _ => {
                    return Err(GrammarError::InvalidPatternFlags {
                        flags: flags.to_string(),
                    })
                }
            };
            if *slot {
                return Err(GrammarError::InvalidPatternFlags {
                    flags: flags.to_string(),
                });
            }
            *slot = true;
        }
        Ok(out)
    }
}

impl fmt::Display for PatternFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters = [
            (self.global, 'g'),
            (self.ignore_case, 'i'),
            (self.multi_line, 'm'),
            (self.dot_all, 's'),
            (self.unicode, 'u'),
            (self.sticky, 'y'),
        ];
        for (set, letter) in letters {
            if set {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

/// A compiled terminal matcher.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    flags: PatternFlags,
    anchored: Regex,
    search: Regex,
}

impl Pattern {
    /// Compile a pattern from its source and a JS-style flag string.
    pub fn new(source: &str, flags: &str) -> Result<Self, GrammarError> {
        Self::with_flags(source, PatternFlags::parse(flags)?)
    }

    pub fn with_flags(source: &str, flags: PatternFlags) -> Result<Self, GrammarError> {
        let anchored = Self::compile(&format!(r"\A(?:{})", source), source, flags)?;
        let search = Self::compile(source, source, flags)?;
        Ok(Self {
            source: source.to_string(),
            flags,
            anchored,
            search,
        })
    }

    fn compile(expr: &str, source: &str, flags: PatternFlags) -> Result<Regex, GrammarError> {
        RegexBuilder::new(expr)
            .case_insensitive(flags.ignore_case)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_all)
            .build()
            .map_err(|e| GrammarError::InvalidPattern {
                pattern: source.to_string(),
                message: e.to_string(),
            })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> PatternFlags {
        self.flags
    }

    /// The form stored in a graph: global flag cleared, sticky set.
    pub fn normalized(&self) -> Pattern {
        let mut out = self.clone();
        out.flags.global = false;
        out.flags.sticky = true;
        out
    }

    /// Anchored at the match position and non-global.
    pub fn is_anchored(&self) -> bool {
        self.flags.sticky && !self.flags.global
    }

    /// True when the pattern can match the empty string.
    pub fn matches_empty(&self) -> bool {
        self.anchored.is_match("")
    }

    /// Match against `haystack` starting at byte offset `pos`.
    ///
    /// Sticky patterns only match starting exactly at `pos`; other patterns
    /// search forward. Returns the matched byte range in `haystack`.
    pub fn find_at(&self, haystack: &str, pos: usize) -> Option<Range<usize>> {
        if pos > haystack.len() || !haystack.is_char_boundary(pos) {
            return None;
        }
        if self.flags.sticky {
            self.anchored
                .find(&haystack[pos..])
                .map(|m| pos + m.start()..pos + m.end())
        } else {
            self.search.find_at(haystack, pos).map(|m| m.range())
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}
