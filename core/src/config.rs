//! Declarative rule documents.
//!
//! A [`RuleBook`] carries field rules for types that do not (or cannot) declare
//! them in their [`TypeSchema`](crate::TypeSchema). It is parsed once, handed
//! to [`Validator::with_rule_book`](crate::Validator::with_rule_book), and
//! merged with declared rules when each type is first indexed.
//!
//! # Document shape
//!
//! ```yaml
//! types:
//!   Order:                  # short type name
//!     status:
//!       - values: [open, paid, null]
//!       - values: [cancelled]
//!         group: [admin]
//!     code:
//!       - pattern: "^[A-Z]{3}$"
//!         accept: false
//!     qty:
//!       - range: "[1, 99]"
//!         disable: true
//! ```
//!
//! Types are keyed by short name (last path segment, no generics). Two checked
//! types sharing a short name, such as `billing::Order` and `shipping::Order`,
//! both receive that entry's rules; indexing the second one logs a warning.
//!
//! | Key | Meaning | Default |
//! |-----|---------|---------|
//! | `values` | literal set | — |
//! | `range` | interval expression | — |
//! | `pattern` | full-match regex | — |
//! | `group` | one group or a list | default group |
//! | `accept` | `false` turns the rule into a blacklist entry | `true` |
//! | `disable` | keep but ignore | `false` |

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::schema::{RuleDecl, RuleKind};
use crate::{RuleError, NULL_LITERAL};

// ═══════════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════════

/// Serde form of a rule document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleBookConfig {
    /// Type name → field name → rules.
    #[serde(default)]
    pub types: BTreeMap<String, BTreeMap<String, Vec<RuleConfig>>>,
}

/// Serde form of one rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Literal set.
    #[serde(default)]
    pub values: Option<Vec<LiteralConfig>>,

    /// Interval expression.
    #[serde(default)]
    pub range: Option<String>,

    /// Regular expression.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Groups, as a single name or a list.
    #[serde(default)]
    pub group: GroupConfig,

    /// Polarity.
    #[serde(default = "default_accept")]
    pub accept: bool,

    /// Ignore this rule.
    #[serde(default)]
    pub disable: bool,
}

fn default_accept() -> bool {
    true
}

/// A literal as written in a document. Bare YAML scalars are accepted, so
/// `values: [1, true, null]` means the texts `"1"`, `"true"` and the null token.
/// A bare float is rendered the way a float field is (`1.0` becomes `"1"`); a
/// quoted `"1.0"` stays as written and never matches a float field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LiteralConfig {
    /// Quoted or bare text.
    Text(String),
    /// Bare integer.
    Int(i64),
    /// Bare float.
    Float(f64),
    /// Bare boolean.
    Bool(bool),
    /// Bare `null` / `~`.
    Null,
}

impl LiteralConfig {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Int(i) => i.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Null => NULL_LITERAL.to_owned(),
        }
    }
}

/// `group: admin` or `group: [admin, audit]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GroupConfig {
    /// No `group` key.
    #[default]
    None,
    /// A single group.
    One(String),
    /// Several groups.
    Many(Vec<String>),
}

impl GroupConfig {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::One(g) => vec![g],
            Self::Many(gs) => gs,
        }
    }
}

impl RuleConfig {
    /// Convert to a [`RuleDecl`] for `owner.field`.
    ///
    /// # Errors
    ///
    /// [`RuleError::MissingKind`] or [`RuleError::AmbiguousRule`] unless exactly
    /// one of `values`, `range`, `pattern` is present.
    pub fn into_decl(self, owner: &str, field: &str) -> Result<RuleDecl, RuleError> {
        let present: Vec<&str> = [
            self.values.is_some().then_some("values"),
            self.range.is_some().then_some("range"),
            self.pattern.is_some().then_some("pattern"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if present.len() > 1 {
            return Err(RuleError::AmbiguousRule {
                owner: owner.to_owned(),
                field: field.to_owned(),
                kinds: present.join(", "),
            });
        }

        let kind = match (self.values, self.range, self.pattern) {
            (Some(values), _, _) => {
                RuleKind::Values(values.into_iter().map(LiteralConfig::into_text).collect())
            }
            (_, Some(range), _) => RuleKind::Range(range),
            (_, _, Some(pattern)) => RuleKind::Pattern(pattern),
            (None, None, None) => {
                return Err(RuleError::MissingKind {
                    owner: owner.to_owned(),
                    field: field.to_owned(),
                })
            }
        };

        Ok(RuleDecl {
            kind,
            groups: self.group.into_vec(),
            accept: self.accept,
            disabled: self.disable,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RuleBook
// ═══════════════════════════════════════════════════════════════════════════════

/// Loaded rule document, keyed by short type name then field name.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    types: HashMap<String, HashMap<String, Vec<RuleDecl>>>,
}

/// Failure loading a rule document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed YAML or wrong shape.
    #[error("rule document is not valid YAML for this schema: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Malformed JSON or wrong shape.
    #[error("rule document is not valid JSON for this schema: {0}")]
    Json(#[from] serde_json::Error),
    /// Well-formed document with an unusable rule.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl RuleBook {
    /// Empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a deserialized document.
    ///
    /// # Errors
    ///
    /// The first rule that fails [`RuleConfig::into_decl`].
    pub fn from_config(config: RuleBookConfig) -> Result<Self, RuleError> {
        let mut book = Self::new();
        for (owner, fields) in config.types {
            for (field, rules) in fields {
                for rule in rules {
                    let decl = rule.into_decl(&owner, &field)?;
                    book.insert(&owner, &field, decl);
                }
            }
        }
        Ok(book)
    }

    /// Parse a YAML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Yaml`] for a malformed document, [`ConfigError::Rule`]
    /// for an unusable rule.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: RuleBookConfig = serde_yaml::from_str(text)?;
        Ok(Self::from_config(config)?)
    }

    /// Parse a JSON document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] for a malformed document, [`ConfigError::Rule`]
    /// for an unusable rule.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RuleBookConfig = serde_json::from_str(text)?;
        Ok(Self::from_config(config)?)
    }

    /// Add a rule for `owner.field`.
    pub fn insert(&mut self, owner: &str, field: &str, rule: RuleDecl) {
        self.types
            .entry(owner.to_owned())
            .or_default()
            .entry(field.to_owned())
            .or_default()
            .push(rule);
    }

    /// Rules for `owner.field`, in document order.
    #[must_use]
    pub fn rules_for(&self, owner: &str, field: &str) -> &[RuleDecl] {
        self.types
            .get(owner)
            .and_then(|fields| fields.get(field))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Field names mentioned for `owner`.
    pub fn fields_for<'a>(&'a self, owner: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.types
            .get(owner)
            .into_iter()
            .flat_map(|fields| fields.keys().map(String::as_str))
    }

    /// Returns `true` if the book holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
