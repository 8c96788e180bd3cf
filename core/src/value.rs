//! `Value` — Type-erased field data that flows from a [`Checkable`] to a [`Matcher`]
//!
//! The field-access side ([`Checkable::field`]) produces `Value`s, and matchers
//! consume them. Matchers never see the concrete field type, which keeps them
//! non-generic and shareable across every checked type.
//!
//! # Leaf vs. non-leaf
//!
//! Every variant except [`Value::Object`] and [`Value::Seq`] is a *leaf*: it is
//! judged directly by literal, interval and pattern matchers and never recursed
//! into. `Object` and `Seq` are only ever walked by the validator.
//!
//! [`Checkable`]: crate::Checkable
//! [`Checkable::field`]: crate::Checkable::field
//! [`Matcher`]: crate::Matcher

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::schema::{AnyCheckable, Checkable};

/// Canonical text format for timestamps, shared by literal rendering and
/// interval literals. Millisecond resolution.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// The erased value of one field.
///
/// # Variants
///
/// - `Null` — the field holds no value (`None`)
/// - `Str` — strings, and enums reported by variant name
/// - `Int` / `UInt` / `Float` — numbers
/// - `Bool` — booleans
/// - `Timestamp` — instants, always UTC
/// - `Object` — a nested checkable object
/// - `Seq` — container contents (sequences, sets, arrays, and the values of maps)
///
/// # Example
///
/// ```
/// use sieve::Value;
///
/// let value = Value::from("hello");
/// assert_eq!(value.as_str(), Some("hello"));
/// assert!(value.is_leaf());
///
/// let missing: Value<'_> = Option::<i64>::None.into();
/// assert!(missing.is_null());
/// ```
#[derive(Clone, Default)]
pub enum Value<'a> {
    /// No value present.
    #[default]
    Null,

    /// String data.
    Str(Cow<'a, str>),

    /// Signed integer data.
    Int(i64),

    /// Unsigned integer data.
    UInt(u64),

    /// Floating-point data.
    Float(f64),

    /// Boolean data.
    Bool(bool),

    /// An instant in time.
    Timestamp(DateTime<Utc>),

    /// A nested object whose own fields may carry rules.
    Object(&'a dyn AnyCheckable),

    /// The elements of a container, in iteration order.
    Seq(Vec<Value<'a>>),
}

impl<'a> Value<'a> {
    /// Wrap a checkable object.
    pub fn object<T: Checkable>(object: &'a T) -> Self {
        Self::Object(object)
    }

    /// Collect container elements into a `Seq`.
    ///
    /// ```ignore
    /// "lines" => Ok(Value::seq(self.lines.iter().map(Value::object))),
    /// "labels" => Ok(Value::seq(self.labels.values().map(Value::from))),
    /// ```
    pub fn seq<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value<'a>>,
    {
        Self::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if this is the `Null` variant.
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for values judged directly by matchers.
    ///
    /// `Null` counts as a leaf: it is matched (by the `"null"` token), not walked.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Self::Object(_) | Self::Seq(_))
    }

    /// Try to get the value as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Try to get the value as a nested object.
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&'a dyn AnyCheckable> {
        match self {
            Self::Object(o) => Some(*o),
            _ => None,
        }
    }

    /// Canonical text used for literal-set membership.
    ///
    /// Returns `None` for `Null` and for non-leaf values; those never equal a
    /// literal (absence is matched by the `"null"` token instead).
    #[must_use]
    pub fn literal_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Str(s) => Some(Cow::Borrowed(s.as_ref())),
            Self::Int(i) => Some(Cow::Owned(i.to_string())),
            Self::UInt(u) => Some(Cow::Owned(u.to_string())),
            Self::Float(f) => Some(Cow::Owned(f.to_string())),
            Self::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Self::Timestamp(t) => Some(Cow::Owned(t.format(TIMESTAMP_FORMAT).to_string())),
            Self::Null | Self::Object(_) | Self::Seq(_) => None,
        }
    }

    /// Returns a string describing the kind of this value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Str(_) => "string",
            Self::Int(_) | Self::UInt(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Timestamp(_) => "timestamp",
            Self::Object(_) => "object",
            Self::Seq(_) => "sequence",
        }
    }
}

// Display is what lands in error chains: strings quoted, objects by type name.
impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Str(s) => write!(f, "\"{s}\""),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Timestamp(t) => write!(f, "'{}'", t.format(TIMESTAMP_FORMAT)),
            Self::Object(o) => f.write_str(o.type_ref().key().short_name()),
            Self::Seq(items) => write!(f, "[{} elements]", items.len()),
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(items) => f.debug_list().entries(items).finish(),
            other => write!(f, "{}({other})", other.type_name()),
        }
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(s: &'a str) -> Self {
        Self::Str(Cow::Borrowed(s))
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(s: &'a String) -> Self {
        Self::Str(Cow::Borrowed(s.as_str()))
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Self::Str(Cow::Owned(s))
    }
}

impl From<i64> for Value<'_> {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value<'_> {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u64> for Value<'_> {
    fn from(u: u64) -> Self {
        Self::UInt(u)
    }
}

impl From<u32> for Value<'_> {
    fn from(u: u32) -> Self {
        Self::UInt(u64::from(u))
    }
}

impl From<f64> for Value<'_> {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<f32> for Value<'_> {
    fn from(x: f32) -> Self {
        Self::Float(f64::from(x))
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value<'_> {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<NaiveDateTime> for Value<'_> {
    fn from(t: NaiveDateTime) -> Self {
        Self::Timestamp(t.and_utc())
    }
}

impl<'a, T> From<Option<T>> for Value<'a>
where
    T: Into<Value<'a>>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
