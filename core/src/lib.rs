//! sieve - rule engine for object-graph field values
//!
//! Types declare, per field, which values are acceptable; a [`Validator`]
//! walks an object (and everything it reaches through checked fields) and
//! reports whether every applicable rule holds, with an error chain leading
//! from the outermost field to the innermost cause.
//!
//! # Architecture
//!
//! - [`Checkable`] — how a type describes its fields and hands out their [`Value`]s
//! - [`Matcher`] — a compiled rule: literal set, [`Interval`] or pattern
//! - [`MatcherRegistry`] — matchers by group, type and field, white and black kept apart
//! - [`FieldIndex`] — per type, which fields have rules and which are walked
//! - [`GraphWalker`] — first-time indexing, safe on cyclic type graphs
//! - [`Validator`] — the entry points; [`Verdict`] / [`ValidationFailure`] carry results
//! - [`RuleBook`] — rules loaded from YAML or JSON instead of declared in code
//!
//! # Key Design Insights
//!
//! 1. **Groups partition rules**: a field with no rule in the active group
//!    is not checked. Rules without a group live in [`DEFAULT_GROUP`].
//!
//! 2. **White beats black**: when a field has any accepting rule in the active
//!    group, only accepting rules decide; rejecting rules are consulted only
//!    when there are none.
//!
//! 3. **Errors surface at indexing**: a malformed rule fails the first check
//!    of its type with [`Error::Rule`]; it is never silently dropped.
//!
//! # Example
//!
//! ```
//! use sieve::prelude::*;
//!
//! struct Account { role: String, age: i64 }
//!
//! impl Checkable for Account {
//!     fn schema() -> TypeSchema {
//!         TypeSchema::new()
//!             .field(FieldDecl::leaf("role").rule(RuleDecl::values(["admin", "user"])))
//!             .field(FieldDecl::leaf("age").rule(RuleDecl::range("[0, 150]")))
//!     }
//!
//!     fn field(&self, name: &str) -> Result<Value<'_>, AccessError> {
//!         match name {
//!             "role" => Ok(Value::from(&self.role)),
//!             "age" => Ok(Value::from(self.age)),
//!             _ => Err(AccessError::unknown_field::<Self>(name)),
//!         }
//!     }
//! }
//!
//! let validator = Validator::new();
//! assert!(validator.check(&Account { role: "user".into(), age: 30 }).unwrap());
//! assert!(!validator.check(&Account { role: "root".into(), age: 30 }).unwrap());
//! ```

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod config;
mod context;
mod index;
pub mod interval;
mod matcher;
mod registry;
mod schema;
mod validator;
mod value;
mod walker;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Core types
pub use context::{ValidationContext, ValidationFailure, Verdict};
pub use index::{ClassIndex, FieldIndex, FieldKind, IndexedField};
pub use interval::{Bound, Domain, Interval, Scalar, SyntaxError};
pub use matcher::{FieldRule, LiteralSet, Matcher, Polarity};
pub use registry::{Decision, MatcherRegistry, Resolved};
pub use validator::Validator;
pub use value::Value;
pub use walker::GraphWalker;

// Type description
pub use schema::{
    AnyCheckable, Checkable, ContainerShape, FieldDecl, FieldType, RuleDecl, RuleKind, TypeKey,
    TypeRef, TypeSchema,
};

// Config types
pub use config::{ConfigError, GroupConfig, LiteralConfig, RuleBook, RuleBookConfig, RuleConfig};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use sieve::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Errors
        AccessError,
        // Traits
        AnyCheckable,
        Checkable,
        Error,
        // Type description
        FieldDecl,
        FieldType,
        Interval,
        RuleBook,
        RuleDecl,
        RuleError,
        TypeSchema,
        ValidationFailure,
        // Core types
        Validator,
        Value,
        Verdict,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Group for rules that name none, and for checks that pass an empty group.
pub const DEFAULT_GROUP: &str = "_default_";

/// Literal-set token admitting an absent (`Null`) value.
pub const NULL_LITERAL: &str = "null";

/// Separator between entries of [`Verdict::err_msg_chain`].
pub const CHAIN_SEPARATOR: &str = " --> ";

/// Maximum length for pattern rules.
///
/// Regex compilation is expensive even with the linear-time Rust `regex` crate,
/// and rule documents may come from outside the program.
pub const MAX_PATTERN_LENGTH: usize = 4096;

/// Maximum number of literals in one values rule.
pub const MAX_VALUES_PER_RULE: usize = 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// A rule that cannot be compiled.
///
/// Raised the first time the declaring type is indexed; nothing from that type
/// is registered. Fix the declaration (or rule document) and retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The interval expression does not parse.
    #[error("{owner}.{field}: {source}")]
    Syntax {
        /// Declaring type.
        owner: String,
        /// Declaring field.
        field: String,
        /// Parser diagnosis.
        source: SyntaxError,
    },
    /// The pattern is not a valid regular expression.
    #[error("{owner}.{field}: invalid pattern \"{pattern}\": {reason}")]
    InvalidPattern {
        /// Declaring type.
        owner: String,
        /// Declaring field.
        field: String,
        /// The pattern as written.
        pattern: String,
        /// Regex compiler message.
        reason: String,
    },
    /// The pattern exceeds [`MAX_PATTERN_LENGTH`].
    #[error("{owner}.{field}: pattern length is {len}, but maximum allowed is {max}")]
    PatternTooLong {
        /// Declaring type.
        owner: String,
        /// Declaring field.
        field: String,
        /// Actual length.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// A values rule with nothing in it.
    #[error("{owner}.{field}: values rule is empty; list at least one value, or \"null\" to admit absence")]
    EmptyValues {
        /// Declaring type.
        owner: String,
        /// Declaring field.
        field: String,
    },
    /// A values rule over [`MAX_VALUES_PER_RULE`].
    #[error("{owner}.{field}: values rule has {count} values, but maximum allowed is {max}")]
    TooManyValues {
        /// Declaring type.
        owner: String,
        /// Declaring field.
        field: String,
        /// Actual count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// A range rule with `accept = false`; intervals only ever accept.
    #[error("{owner}.{field}: range \"{range}\" cannot reject; drop `accept: false` or use a values or pattern rule")]
    RejectingRange {
        /// Declaring type.
        owner: String,
        /// Declaring field.
        field: String,
        /// The interval expression.
        range: String,
    },
    /// A document rule declaring more than one of `values` / `range` / `pattern`.
    #[error("{owner}.{field}: rule declares {kinds}; declare exactly one of values, range, pattern")]
    AmbiguousRule {
        /// Declaring type.
        owner: String,
        /// Declaring field.
        field: String,
        /// The kinds present, comma-separated.
        kinds: String,
    },
    /// A document rule declaring none of `values` / `range` / `pattern`.
    #[error("{owner}.{field}: rule declares none of values, range, pattern")]
    MissingKind {
        /// Declaring type.
        owner: String,
        /// Declaring field.
        field: String,
    },
}

/// A field value that cannot be read.
///
/// Returned by [`Checkable::field`]; always a programming or declaration
/// defect (the schema names a field the accessor does not handle).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot read {type_name}.{field}: {reason}")]
pub struct AccessError {
    /// Type being read.
    pub type_name: String,
    /// Field being read.
    pub field: String,
    /// What went wrong.
    pub reason: String,
}

impl AccessError {
    /// Build an access error.
    pub fn new(
        type_name: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// `T` has no field called `field`.
    pub fn unknown_field<T: ?Sized + 'static>(field: &str) -> Self {
        Self::new(TypeKey::of::<T>().short_name(), field, "no such field")
    }
}

/// Anything a check can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A rule reachable from the checked type is malformed.
    #[error(transparent)]
    Rule(#[from] RuleError),
    /// A field could not be read.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// The object violates its rules (only from the `validate*` entry points).
    #[error(transparent)]
    Failed(#[from] ValidationFailure),
}

impl Error {
    /// The failure, if this is [`Error::Failed`].
    #[must_use]
    pub fn as_failure(&self) -> Option<&ValidationFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
