//! `Matcher` — A compiled rule, judging one leaf [`Value`]
//!
//! A [`RuleDecl`] is what a user wrote; a `Matcher` is what evaluates at check
//! time. Compilation happens once, when the owning type is indexed, so every
//! malformed rule surfaces as a [`RuleError`] before the first value is judged.
//!
//! # Hits vs. passes
//!
//! [`Matcher::hits`] answers "is the value in this matcher's set?". Polarity
//! decides what a hit means: an [`Polarity::Include`] matcher is a whitelist
//! entry, an [`Polarity::Exclude`] matcher a blacklist entry. The registry files
//! matchers by polarity and the validator applies white-over-black precedence,
//! so matchers themselves never combine.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::interval::{self, Interval};
use crate::schema::{RuleDecl, RuleKind};
use crate::{RuleError, Value, MAX_PATTERN_LENGTH, MAX_VALUES_PER_RULE, NULL_LITERAL};

// ═══════════════════════════════════════════════════════════════════════════════
// LiteralSet
// ═══════════════════════════════════════════════════════════════════════════════

/// An ordered, de-duplicated set of literal texts.
///
/// The [`NULL_LITERAL`] token admits [`Value::Null`]; every other entry is
/// compared against [`Value::literal_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralSet {
    values: Vec<String>,
    admits_null: bool,
}

impl LiteralSet {
    /// Build a set, keeping first-seen order.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self {
            values: Vec::new(),
            admits_null: false,
        };
        for value in values {
            let value = value.into();
            if value == NULL_LITERAL {
                set.admits_null = true;
            }
            if !set.values.contains(&value) {
                set.values.push(value);
            }
        }
        set
    }

    /// Whether `value` is a member.
    #[must_use]
    pub fn contains(&self, value: &Value<'_>) -> bool {
        if value.is_null() {
            return self.admits_null;
        }
        value
            .literal_text()
            .is_some_and(|text| self.values.iter().any(|v| *v == *text))
    }

    /// Members in declaration order.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for LiteralSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if v == NULL_LITERAL {
                f.write_str(v)?;
            } else {
                write!(f, "\"{v}\"")?;
            }
        }
        f.write_str("]")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Matcher
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether a hit admits or rejects the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    /// White: the value must hit.
    Include,
    /// Black: the value must not hit.
    Exclude,
}

impl Polarity {
    /// `accept = true` → `Include`.
    #[must_use]
    pub fn from_accept(accept: bool) -> Self {
        if accept {
            Self::Include
        } else {
            Self::Exclude
        }
    }
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Literal-set membership.
    Literal {
        /// Accepted (or rejected) literals.
        set: LiteralSet,
        /// Meaning of a hit.
        polarity: Polarity,
    },
    /// Interval membership. Always [`Polarity::Include`].
    Interval(Interval),
    /// Full-string regular expression over the value's literal text.
    Pattern {
        /// Pattern as written.
        source: String,
        /// Compiled, anchored form of `source`.
        regex: Regex,
        /// Meaning of a hit.
        polarity: Polarity,
    },
}

impl Matcher {
    /// Compile a declared rule for `owner.field`.
    ///
    /// # Errors
    ///
    /// - [`RuleError::EmptyValues`] for a literal rule with no values
    /// - [`RuleError::TooManyValues`] when a literal rule exceeds [`MAX_VALUES_PER_RULE`]
    /// - [`RuleError::RejectingRange`] for an interval rule with `accept = false`
    /// - [`RuleError::Syntax`] when the interval expression does not parse
    /// - [`RuleError::PatternTooLong`] / [`RuleError::InvalidPattern`] for bad patterns
    pub fn compile(rule: &RuleDecl, owner: &str, field: &str) -> Result<Self, RuleError> {
        let polarity = Polarity::from_accept(rule.accept);
        match &rule.kind {
            RuleKind::Values(values) => {
                if values.is_empty() {
                    return Err(RuleError::EmptyValues {
                        owner: owner.to_owned(),
                        field: field.to_owned(),
                    });
                }
                if values.len() > MAX_VALUES_PER_RULE {
                    return Err(RuleError::TooManyValues {
                        owner: owner.to_owned(),
                        field: field.to_owned(),
                        count: values.len(),
                        max: MAX_VALUES_PER_RULE,
                    });
                }
                Ok(Self::Literal {
                    set: LiteralSet::new(values.iter().map(String::as_str)),
                    polarity,
                })
            }
            RuleKind::Range(expr) => {
                if polarity == Polarity::Exclude {
                    return Err(RuleError::RejectingRange {
                        owner: owner.to_owned(),
                        field: field.to_owned(),
                        range: expr.clone(),
                    });
                }
                interval::parse(expr)
                    .map(Self::Interval)
                    .map_err(|source| RuleError::Syntax {
                        owner: owner.to_owned(),
                        field: field.to_owned(),
                        source,
                    })
            }
            RuleKind::Pattern(pattern) => {
                if pattern.len() > MAX_PATTERN_LENGTH {
                    return Err(RuleError::PatternTooLong {
                        owner: owner.to_owned(),
                        field: field.to_owned(),
                        len: pattern.len(),
                        max: MAX_PATTERN_LENGTH,
                    });
                }
                let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                    RuleError::InvalidPattern {
                        owner: owner.to_owned(),
                        field: field.to_owned(),
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Self::Pattern {
                    source: pattern.clone(),
                    regex,
                    polarity,
                })
            }
        }
    }

    /// Meaning of a hit.
    #[must_use]
    pub fn polarity(&self) -> Polarity {
        match self {
            Self::Literal { polarity, .. } | Self::Pattern { polarity, .. } => *polarity,
            Self::Interval(_) => Polarity::Include,
        }
    }

    /// Whether `value` is in this matcher's set, with `now` standing in for
    /// the `now` keyword and for `past` / `future`.
    #[must_use]
    pub fn hits(&self, value: &Value<'_>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Literal { set, .. } => set.contains(value),
            Self::Interval(interval) => interval.matches_at(value, now),
            Self::Pattern { regex, .. } => value
                .literal_text()
                .is_some_and(|text| regex.is_match(&text)),
        }
    }

    /// Whether `value` passes this matcher alone: a hit for `Include`, a miss
    /// for `Exclude`.
    #[must_use]
    pub fn passes(&self, value: &Value<'_>, now: DateTime<Utc>) -> bool {
        match self.polarity() {
            Polarity::Include => self.hits(value, now),
            Polarity::Exclude => !self.hits(value, now),
        }
    }

    /// Whether the outcome can change over time (interval mentions `now`).
    #[must_use]
    pub fn is_time_dependent(&self) -> bool {
        matches!(self, Self::Interval(i) if i.is_time_dependent())
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal { set, .. } => write!(f, "values {set}"),
            Self::Interval(interval) => write!(f, "range {interval}"),
            Self::Pattern { source, .. } => write!(f, "pattern \"{source}\""),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FieldRule
// ═══════════════════════════════════════════════════════════════════════════════

/// A compiled matcher bound to a field and filed under one group.
///
/// A declaration naming several groups compiles once and yields one
/// `FieldRule` per group, all sharing the same matcher.
#[derive(Debug, Clone)]
pub struct FieldRule {
    /// Group the rule is filed under.
    pub group: String,
    /// Field the rule judges.
    pub field: String,
    /// The compiled rule.
    pub matcher: Arc<Matcher>,
}
