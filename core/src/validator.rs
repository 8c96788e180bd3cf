//! `Validator` — the entry point.
//!
//! A validator owns its [`MatcherRegistry`], [`FieldIndex`] and [`RuleBook`].
//! Types are indexed lazily on their first check; after that a check is a
//! read-only walk over the object graph.
//!
//! # Entry points
//!
//! | Method | Group | Fields | Returns |
//! |--------|-------|--------|---------|
//! | [`check`](Validator::check) | default | all | `bool` |
//! | [`check_fields`](Validator::check_fields) | default | listed | `bool` |
//! | [`check_group`](Validator::check_group) | given | all | `bool` |
//! | [`check_group_fields`](Validator::check_group_fields) | given | listed | `bool` |
//! | `validate*` | as above | as above | `()` or [`Error::Failed`] |
//! | [`evaluate`](Validator::evaluate) | given | optional | [`Verdict`] |
//!
//! Field lists only narrow the top-level object; nested objects are always
//! checked in full.
//!
//! # Example
//!
//! ```
//! use sieve::prelude::*;
//!
//! struct Order { status: String }
//!
//! impl Checkable for Order {
//!     fn schema() -> TypeSchema {
//!         TypeSchema::new().field(
//!             FieldDecl::leaf("status")
//!                 .rule(RuleDecl::values(["open", "paid"]))
//!                 .rule(RuleDecl::values(["cancelled"]).group("admin")),
//!         )
//!     }
//!
//!     fn field(&self, name: &str) -> Result<Value<'_>, AccessError> {
//!         match name {
//!             "status" => Ok(Value::from(&self.status)),
//!             _ => Err(AccessError::unknown_field::<Self>(name)),
//!         }
//!     }
//! }
//!
//! let validator = Validator::new();
//! let order = Order { status: "cancelled".into() };
//!
//! assert!(!validator.check(&order).unwrap());
//! assert!(validator.check_group("admin", &order).unwrap());
//!
//! let err = validator.validate(&order).unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     r#"validation failed in group "_default_": Order.status: value "cancelled" is not accepted by values ["open", "paid"]"#
//! );
//! ```

use chrono::Utc;
use once_cell::sync::Lazy;
use tracing::trace;

use crate::config::RuleBook;
use crate::context::{ValidationContext, Verdict};
use crate::index::{ClassIndex, FieldIndex, FieldKind, IndexedField};
use crate::registry::{Decision, MatcherRegistry};
use crate::schema::{AnyCheckable, Checkable, TypeRef};
use crate::walker::GraphWalker;
use crate::{Error, RuleError, Value, DEFAULT_GROUP};

static GLOBAL: Lazy<Validator> = Lazy::new(Validator::new);

/// Rule engine instance.
#[derive(Debug, Default)]
pub struct Validator {
    registry: MatcherRegistry,
    index: FieldIndex,
    book: RuleBook,
}

impl Validator {
    /// Validator using only rules declared in type schemas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator that also applies the rules in `book`.
    #[must_use]
    pub fn with_rule_book(book: RuleBook) -> Self {
        Self {
            book,
            ..Self::default()
        }
    }

    /// The process-wide validator, created on first use.
    ///
    /// It carries no rule book; use [`with_rule_book`](Self::with_rule_book)
    /// for document-driven rules.
    pub fn global() -> &'static Validator {
        &GLOBAL
    }

    /// Registered matchers.
    #[must_use]
    pub fn registry(&self) -> &MatcherRegistry {
        &self.registry
    }

    /// Indexed types.
    #[must_use]
    pub fn index(&self) -> &FieldIndex {
        &self.index
    }

    /// Index `T` ahead of its first check, surfacing rule errors early.
    ///
    /// # Errors
    ///
    /// The first malformed rule reachable from `T`.
    pub fn prepare<T: Checkable>(&self) -> Result<(), RuleError> {
        self.walker().ensure_indexed(TypeRef::of::<T>()).map(drop)
    }

    fn walker(&self) -> GraphWalker<'_> {
        GraphWalker::new(&self.index, &self.registry, &self.book)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Boolean entry points
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check every indexed field of `object` in the default group.
    ///
    /// # Errors
    ///
    /// [`Error::Rule`] for a malformed rule, [`Error::Access`] when a field
    /// cannot be read. A failed check is `Ok(false)`, not an error.
    pub fn check<T: Checkable>(&self, object: &T) -> Result<bool, Error> {
        self.check_group_fields(DEFAULT_GROUP, object, &[])
    }

    /// Check the listed fields of `object` in the default group.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn check_fields<T: Checkable>(&self, object: &T, fields: &[&str]) -> Result<bool, Error> {
        self.check_group_fields(DEFAULT_GROUP, object, fields)
    }

    /// Check every indexed field of `object` in `group`.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn check_group<T: Checkable>(&self, group: &str, object: &T) -> Result<bool, Error> {
        self.check_group_fields(group, object, &[])
    }

    /// Check the listed fields of `object` in `group`. An empty list means all.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn check_group_fields<T: Checkable>(
        &self,
        group: &str,
        object: &T,
        fields: &[&str],
    ) -> Result<bool, Error> {
        let verdict = self.evaluate(group, &Value::object(object), narrow(fields))?;
        Ok(verdict.is_pass())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Raising entry points
    // ═══════════════════════════════════════════════════════════════════════════

    /// Like [`check`](Self::check), failing with [`Error::Failed`].
    ///
    /// # Errors
    ///
    /// [`Error::Failed`] carrying the error chain, or any error `check` returns.
    pub fn validate<T: Checkable>(&self, object: &T) -> Result<(), Error> {
        self.validate_group_fields(DEFAULT_GROUP, object, &[])
    }

    /// Like [`check_fields`](Self::check_fields), failing with [`Error::Failed`].
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn validate_fields<T: Checkable>(&self, object: &T, fields: &[&str]) -> Result<(), Error> {
        self.validate_group_fields(DEFAULT_GROUP, object, fields)
    }

    /// Like [`check_group`](Self::check_group), failing with [`Error::Failed`].
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn validate_group<T: Checkable>(&self, group: &str, object: &T) -> Result<(), Error> {
        self.validate_group_fields(group, object, &[])
    }

    /// Like [`check_group_fields`](Self::check_group_fields), failing with
    /// [`Error::Failed`].
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn validate_group_fields<T: Checkable>(
        &self,
        group: &str,
        object: &T,
        fields: &[&str],
    ) -> Result<(), Error> {
        self.evaluate(group, &Value::object(object), narrow(fields))?
            .into_result()
            .map_err(Error::Failed)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Evaluation
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check any value.
    ///
    /// `Null` and leaf values pass. A `Seq` passes when every element does; the
    /// first failing element stops the walk. An `Object` is checked field by
    /// field, restricted to `fields` when given.
    ///
    /// # Errors
    ///
    /// [`Error::Rule`] for a malformed rule, [`Error::Access`] when a field
    /// cannot be read.
    pub fn evaluate(
        &self,
        group: &str,
        target: &Value<'_>,
        fields: Option<&[&str]>,
    ) -> Result<Verdict, Error> {
        let mut ctx = ValidationContext::new(group);
        let passed = self.check_value(&mut ctx, target, fields)?;
        Ok(ctx.finish(passed))
    }

    fn check_value(
        &self,
        ctx: &mut ValidationContext,
        value: &Value<'_>,
        fields: Option<&[&str]>,
    ) -> Result<bool, Error> {
        match value {
            Value::Object(object) => self.check_object(ctx, *object, fields),
            Value::Seq(items) => {
                for item in items {
                    if !self.check_value(ctx, item, fields)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(true),
        }
    }

    fn check_object(
        &self,
        ctx: &mut ValidationContext,
        object: &dyn AnyCheckable,
        fields: Option<&[&str]>,
    ) -> Result<bool, Error> {
        let class = self.walker().ensure_indexed(object.type_ref())?;
        for field in class.fields() {
            if fields.is_some_and(|wanted| !wanted.contains(&field.name.as_str())) {
                continue;
            }
            if !self.check_field(ctx, object, &class, field)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check_field(
        &self,
        ctx: &mut ValidationContext,
        object: &dyn AnyCheckable,
        class: &ClassIndex,
        field: &IndexedField,
    ) -> Result<bool, Error> {
        let owner = class.key().short_name();
        match field.kind {
            FieldKind::Rules => {
                let resolved = self.registry.resolve(ctx.group(), class.key(), &field.name);
                if resolved.is_empty() {
                    return Ok(true);
                }
                let value = object.field_value(&field.name)?;
                let failure = match resolved.decide(&value, Utc::now()) {
                    Decision::Pass => None,
                    Decision::NotAccepted => Some(format!(
                        "{owner}.{}: value {value} is not accepted by {}",
                        field.name,
                        resolved
                            .white
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(" or ")
                    )),
                    Decision::Rejected(hit) => Some(format!(
                        "{owner}.{}: value {value} is rejected by {hit}",
                        field.name
                    )),
                };
                trace!(
                    type_name = owner,
                    field = %field.name,
                    group = ctx.group(),
                    passed = failure.is_none(),
                    "checked field"
                );
                match failure {
                    None => Ok(true),
                    Some(entry) => {
                        ctx.fail(entry);
                        Ok(false)
                    }
                }
            }
            FieldKind::Nested | FieldKind::Container => {
                let value = object.field_value(&field.name)?;
                self.check_nested(ctx, &format!("{owner}.{}", field.name), &value)
            }
        }
    }

    /// Walk a nested object or container; on failure put `path` in front of
    /// the inner cause.
    fn check_nested(
        &self,
        ctx: &mut ValidationContext,
        path: &str,
        value: &Value<'_>,
    ) -> Result<bool, Error> {
        match value {
            Value::Object(object) => {
                let mark = ctx.mark();
                if self.check_object(ctx, *object, None)? {
                    return Ok(true);
                }
                ctx.fail_at(
                    mark,
                    format!("{path}: nested {} failed", object.type_ref().key().short_name()),
                );
                Ok(false)
            }
            Value::Seq(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !self.check_nested(ctx, &format!("{path}[{i}]"), item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(true),
        }
    }
}

/// An empty field list means "all fields".
fn narrow<'f>(fields: &'f [&'f str]) -> Option<&'f [&'f str]> {
    (!fields.is_empty()).then_some(fields)
}
