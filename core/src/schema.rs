//! Type structure — how a checked type describes its fields
//!
//! Rust has no runtime reflection, so every checked type implements
//! [`Checkable`]: a static [`TypeSchema`] (field names, declared types, rules
//! and nested-check markers) plus a field accessor returning erased
//! [`Value`]s. The engine only ever consumes this contract.
//!
//! # Example
//!
//! ```
//! use sieve::prelude::*;
//!
//! struct Line { sku: String, qty: i64 }
//! struct Order { status: String, lines: Vec<Line> }
//!
//! impl Checkable for Line {
//!     fn schema() -> TypeSchema {
//!         TypeSchema::new()
//!             .field(FieldDecl::leaf("sku").rule(RuleDecl::pattern("[A-Z]{3}-[0-9]+")))
//!             .field(FieldDecl::leaf("qty").rule(RuleDecl::range("[1, 99]")))
//!     }
//!
//!     fn field(&self, name: &str) -> Result<Value<'_>, AccessError> {
//!         match name {
//!             "sku" => Ok(Value::from(&self.sku)),
//!             "qty" => Ok(Value::from(self.qty)),
//!             _ => Err(AccessError::unknown_field::<Self>(name)),
//!         }
//!     }
//! }
//!
//! impl Checkable for Order {
//!     fn schema() -> TypeSchema {
//!         TypeSchema::new()
//!             .field(FieldDecl::leaf("status").rule(RuleDecl::values(["open", "paid"])))
//!             .field(FieldDecl::new("lines", FieldType::list(FieldType::nested::<Line>())).check())
//!     }
//!
//!     fn field(&self, name: &str) -> Result<Value<'_>, AccessError> {
//!         match name {
//!             "status" => Ok(Value::from(&self.status)),
//!             "lines" => Ok(Value::seq(self.lines.iter().map(Value::object))),
//!             _ => Err(AccessError::unknown_field::<Self>(name)),
//!         }
//!     }
//! }
//!
//! let order = Order {
//!     status: "open".into(),
//!     lines: vec![Line { sku: "ABC-1".into(), qty: 100 }],
//! };
//! let verdict = Validator::new().evaluate("", &Value::object(&order), None).unwrap();
//! assert!(!verdict.is_pass());
//! assert!(verdict.err_msg().unwrap().starts_with("Line.qty"));
//! ```

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{AccessError, Value, DEFAULT_GROUP};

// ═══════════════════════════════════════════════════════════════════════════════
// Checkable
// ═══════════════════════════════════════════════════════════════════════════════

/// A type whose fields can carry rules.
///
/// `schema` is called at most once per [`Validator`](crate::Validator) per
/// type (the result is indexed and cached); `field` is called on every
/// validation of a field that has rules or a nested-check marker.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Checkable`",
    label = "this type cannot be validated",
    note = "implement `schema()` to declare fields and rules, and `field()` to read field values"
)]
pub trait Checkable: 'static {
    /// Static description of this type's fields.
    fn schema() -> TypeSchema;

    /// Current value of the named field.
    ///
    /// # Errors
    ///
    /// Return [`AccessError`] for a field name the type does not have. The
    /// validator treats it as a configuration defect and propagates it.
    fn field(&self, name: &str) -> Result<Value<'_>, AccessError>;
}

/// Object-safe view of a [`Checkable`], used for nested values.
///
/// Implemented for every `Checkable`; there is no reason to implement it by hand.
pub trait AnyCheckable {
    /// Identity and schema of the concrete type.
    fn type_ref(&self) -> TypeRef;

    /// See [`Checkable::field`].
    ///
    /// # Errors
    ///
    /// Propagates the [`AccessError`] returned by the concrete type.
    fn field_value(&self, name: &str) -> Result<Value<'_>, AccessError>;
}

impl<T: Checkable> AnyCheckable for T {
    fn type_ref(&self) -> TypeRef {
        TypeRef::of::<T>()
    }

    fn field_value(&self, name: &str) -> Result<Value<'_>, AccessError> {
        Checkable::field(self, name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Type identity
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity of a checked type. Equality and hashing use the `TypeId` only.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type path, e.g. `"shop::model::Order"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment without generics, e.g. `"Order"`.
    ///
    /// Used in error messages and as the type key of rule documents.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A type key plus a way to obtain its schema.
///
/// Holding a function pointer rather than the schema itself is what lets
/// self-referential and mutually referential types describe each other.
#[derive(Clone, Copy)]
pub struct TypeRef {
    key: TypeKey,
    schema: fn() -> TypeSchema,
}

impl TypeRef {
    /// Reference to `T`.
    #[must_use]
    pub fn of<T: Checkable>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            schema: T::schema,
        }
    }

    /// The type's identity.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Build the type's schema.
    #[must_use]
    pub fn schema(&self) -> TypeSchema {
        (self.schema)()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.key).finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Declared structure
// ═══════════════════════════════════════════════════════════════════════════════

/// Shape of a container field.
///
/// Descriptive only: every shape is walked the same way, element by element
/// over the [`Value::Seq`] the accessor returns. The shape shows up in
/// indexing logs and is available through [`FieldType::shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerShape {
    /// `Vec`, `VecDeque`, slices.
    Sequence,
    /// `HashSet`, `BTreeSet`.
    Set,
    /// `HashMap`, `BTreeMap` — only values are walked.
    MapValues,
    /// `[T; N]`.
    Array,
}

/// Declared (static) type of a field.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Numbers, strings, timestamps, booleans, enums.
    Leaf,
    /// Non-leaf, but not checkable either. Never walked.
    Opaque,
    /// A checkable type.
    Nested(TypeRef),
    /// A container of some element type.
    Container {
        /// Container kind.
        shape: ContainerShape,
        /// Element type; may itself be a container.
        element: Box<FieldType>,
    },
}

impl FieldType {
    /// Nested checkable `T`.
    #[must_use]
    pub fn nested<T: Checkable>() -> Self {
        Self::Nested(TypeRef::of::<T>())
    }

    /// Ordered sequence of `element`.
    #[must_use]
    pub fn list(element: FieldType) -> Self {
        Self::container(ContainerShape::Sequence, element)
    }

    /// Set of `element`.
    #[must_use]
    pub fn set(element: FieldType) -> Self {
        Self::container(ContainerShape::Set, element)
    }

    /// Map whose values are `element`.
    #[must_use]
    pub fn map_values(element: FieldType) -> Self {
        Self::container(ContainerShape::MapValues, element)
    }

    /// Fixed-size array of `element`.
    #[must_use]
    pub fn array(element: FieldType) -> Self {
        Self::container(ContainerShape::Array, element)
    }

    fn container(shape: ContainerShape, element: FieldType) -> Self {
        Self::Container {
            shape,
            element: Box::new(element),
        }
    }

    /// Container shape, or `None` for non-containers.
    #[must_use]
    pub fn shape(&self) -> Option<ContainerShape> {
        match self {
            Self::Container { shape, .. } => Some(*shape),
            _ => None,
        }
    }

    /// Returns `true` for [`FieldType::Leaf`].
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf)
    }

    /// The checkable type found by unwrapping containers, if any.
    ///
    /// `list(map_values(nested::<A>()))` yields `A`.
    #[must_use]
    pub fn checkable_element(&self) -> Option<TypeRef> {
        match self {
            Self::Nested(ty) => Some(*ty),
            Self::Container { element, .. } => element.checkable_element(),
            Self::Leaf | Self::Opaque => None,
        }
    }
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    name: String,
    ty: FieldType,
    rules: Vec<RuleDecl>,
    check: bool,
}

impl FieldDecl {
    /// Field `name` of declared type `ty`.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            rules: Vec::new(),
            check: false,
        }
    }

    /// Leaf field `name`.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Leaf)
    }

    /// Field `name` holding a nested `T`. Call [`check`](Self::check) to walk it.
    pub fn nested<T: Checkable>(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::nested::<T>())
    }

    /// Attach a rule. Rules on one field OR-combine within a group.
    #[must_use]
    pub fn rule(mut self, rule: RuleDecl) -> Self {
        self.rules.push(rule);
        self
    }

    /// Set the nested-check marker: walk this field's value with its own rules.
    #[must_use]
    pub fn check(mut self) -> Self {
        self.check = true;
        self
    }

    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Declared rules, including disabled ones.
    #[must_use]
    pub fn rules(&self) -> &[RuleDecl] {
        &self.rules
    }

    /// Whether the nested-check marker is set.
    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.check
    }
}

/// The declared fields of a type, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TypeSchema {
    fields: Vec<FieldDecl>,
}

impl TypeSchema {
    /// Empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Declared fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Rule declarations
// ═══════════════════════════════════════════════════════════════════════════════

/// What a rule matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Literal set. The `"null"` token admits an absent value.
    Values(Vec<String>),
    /// Interval expression, see [`interval`](crate::interval).
    Range(String),
    /// Regular expression over the value's literal text (full match).
    Pattern(String),
}

/// A rule as declared on a field, before compilation.
///
/// ```
/// use sieve::RuleDecl;
///
/// let rule = RuleDecl::values(["a", "b"]).group("create").group("update");
/// assert_eq!(rule.effective_groups().collect::<Vec<_>>(), ["create", "update"]);
///
/// let rule = RuleDecl::range("[0, 10]");
/// assert_eq!(rule.effective_groups().collect::<Vec<_>>(), [sieve::DEFAULT_GROUP]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecl {
    /// What to match.
    pub kind: RuleKind,
    /// Groups the rule is filed under. Empty means the default group.
    pub groups: Vec<String>,
    /// `true`: value must match (white). `false`: value must not match (black).
    pub accept: bool,
    /// Disabled rules are ignored at indexing time.
    pub disabled: bool,
}

impl RuleDecl {
    fn with_kind(kind: RuleKind) -> Self {
        Self {
            kind,
            groups: Vec::new(),
            accept: true,
            disabled: false,
        }
    }

    /// Value must be one of `values`.
    ///
    /// Values are compared as text. Floats use Rust's `Display`, so a field
    /// holding `1.0` is the text `"1"` and only `values(["1"])` admits it;
    /// `"1.0"` never matches. Use a range rule to compare floats numerically.
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_kind(RuleKind::Values(values.into_iter().map(Into::into).collect()))
    }

    /// Value must not be any of `values`.
    pub fn reject<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::values(values).rejecting()
    }

    /// Value must fall inside the interval `expr`.
    pub fn range(expr: impl Into<String>) -> Self {
        Self::with_kind(RuleKind::Range(expr.into()))
    }

    /// Value's literal text must fully match `pattern`.
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::with_kind(RuleKind::Pattern(pattern.into()))
    }

    /// File this rule under `group` as well.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// File this rule under each of `groups` as well.
    #[must_use]
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Invert polarity: a match fails the field.
    #[must_use]
    pub fn rejecting(mut self) -> Self {
        self.accept = false;
        self
    }

    /// Keep the declaration but ignore it.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Groups this rule applies to; blank names become [`DEFAULT_GROUP`].
    pub fn effective_groups(&self) -> impl Iterator<Item = &str> + '_ {
        let fallback = self.groups.is_empty().then_some(DEFAULT_GROUP);
        self.groups
            .iter()
            .map(|g| if g.trim().is_empty() { DEFAULT_GROUP } else { g.as_str() })
            .chain(fallback)
    }
}
