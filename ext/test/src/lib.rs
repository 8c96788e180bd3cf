//! sieve-test: Test domain for conformance testing
//!
//! Two deserializable types with a cyclic shape, so fixtures can describe
//! object graphs in YAML:
//!
//! ```text
//! Account ──parent──► Account
//! Account ──team────► Team ──owner──────► Account
//!                          ──members────► [Account]
//!                          ──by_role────► {role: [Account]}
//! ```
//!
//! Every leaf field is declared without rules. Rules come from the fixture's
//! rule document, so one pair of types serves every fixture.
//!
//! # Example
//!
//! ```
//! use sieve_test::prelude::*;
//!
//! let book = RuleBook::from_yaml("types: {Account: {role: [{values: [admin, user]}]}}").unwrap();
//! let validator = Validator::with_rule_book(book);
//!
//! let account = Account { role: Some("root".into()), ..Account::default() };
//! assert!(!validator.check(&account).unwrap());
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sieve::prelude::*;

#[cfg(feature = "fixtures")]
pub mod fixture;

/// Account tier; reported to matchers by variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Free plan.
    Free,
    /// Paid plan.
    Pro,
    /// Contract plan.
    Enterprise,
}

impl Tier {
    /// Variant name as seen by rules.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

/// A user account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Account {
    pub name: Option<String>,
    pub role: Option<String>,
    pub tier: Option<Tier>,
    pub email: Option<String>,
    pub age: Option<i64>,
    pub score: Option<f64>,
    pub active: Option<bool>,
    pub created: Option<DateTime<Utc>>,
    /// Milliseconds since the Unix epoch.
    pub expires_ms: Option<i64>,
    /// Container of leaves; marked for checking but never walked.
    pub tags: Vec<String>,
    /// Walked.
    pub parent: Option<Box<Account>>,
    /// Not marked, so never walked.
    pub mentor: Option<Box<Account>>,
    /// Walked.
    pub team: Option<Box<Team>>,
}

/// A team of accounts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Team {
    pub name: Option<String>,
    pub code: Option<String>,
    pub owner: Option<Account>,
    pub members: Vec<Account>,
    pub by_role: BTreeMap<String, Vec<Account>>,
}

impl Checkable for Account {
    fn schema() -> TypeSchema {
        TypeSchema::new()
            .field(FieldDecl::leaf("name"))
            .field(FieldDecl::leaf("role"))
            .field(FieldDecl::leaf("tier"))
            .field(FieldDecl::leaf("email"))
            .field(FieldDecl::leaf("age"))
            .field(FieldDecl::leaf("score"))
            .field(FieldDecl::leaf("active"))
            .field(FieldDecl::leaf("created"))
            .field(FieldDecl::leaf("expires_ms"))
            .field(FieldDecl::new("tags", FieldType::list(FieldType::Leaf)).check())
            .field(FieldDecl::nested::<Account>("parent").check())
            .field(FieldDecl::nested::<Account>("mentor"))
            .field(FieldDecl::nested::<Team>("team").check())
    }

    fn field(&self, name: &str) -> Result<Value<'_>, AccessError> {
        let value = match name {
            "name" => Value::from(self.name.as_deref()),
            "role" => Value::from(self.role.as_deref()),
            "tier" => Value::from(self.tier.map(Tier::as_str)),
            "email" => Value::from(self.email.as_deref()),
            "age" => Value::from(self.age),
            "score" => Value::from(self.score),
            "active" => Value::from(self.active),
            "created" => Value::from(self.created),
            "expires_ms" => Value::from(self.expires_ms),
            "tags" => Value::seq(self.tags.iter()),
            "parent" => self.parent.as_deref().map_or(Value::Null, Value::object),
            "mentor" => self.mentor.as_deref().map_or(Value::Null, Value::object),
            "team" => self.team.as_deref().map_or(Value::Null, Value::object),
            _ => return Err(AccessError::unknown_field::<Self>(name)),
        };
        Ok(value)
    }
}

impl Checkable for Team {
    fn schema() -> TypeSchema {
        TypeSchema::new()
            .field(FieldDecl::leaf("name"))
            .field(FieldDecl::leaf("code"))
            .field(FieldDecl::nested::<Account>("owner").check())
            .field(FieldDecl::new("members", FieldType::list(FieldType::nested::<Account>())).check())
            .field(
                FieldDecl::new(
                    "by_role",
                    FieldType::map_values(FieldType::list(FieldType::nested::<Account>())),
                )
                .check(),
            )
    }

    fn field(&self, name: &str) -> Result<Value<'_>, AccessError> {
        let value = match name {
            "name" => Value::from(self.name.as_deref()),
            "code" => Value::from(self.code.as_deref()),
            "owner" => self.owner.as_ref().map_or(Value::Null, Value::object),
            "members" => Value::seq(self.members.iter().map(Value::object)),
            "by_role" => Value::seq(
                self.by_role
                    .values()
                    .map(|accounts| Value::seq(accounts.iter().map(Value::object))),
            ),
            _ => return Err(AccessError::unknown_field::<Self>(name)),
        };
        Ok(value)
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{Account, Team, Tier};
    pub use sieve::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(rules: &str) -> Validator {
        Validator::with_rule_book(RuleBook::from_yaml(rules).unwrap())
    }

    #[test]
    fn test_enum_reported_by_name() {
        let v = validator("types: {Account: {tier: [{values: [pro, enterprise]}]}}");
        let mut account = Account {
            tier: Some(Tier::Pro),
            ..Account::default()
        };
        assert!(v.check(&account).unwrap());
        account.tier = Some(Tier::Free);
        assert!(!v.check(&account).unwrap());
    }

    #[test]
    fn test_leaf_container_not_walked() {
        let v = validator("types: {Account: {role: [{values: [admin]}]}}");
        let account = Account {
            role: Some("admin".into()),
            tags: vec!["anything".into()],
            ..Account::default()
        };
        assert!(v.check(&account).unwrap());
        let class = v.index().get(sieve::TypeKey::of::<Account>()).unwrap();
        assert!(class.get("tags").is_none());
        assert!(class.get("mentor").is_none());
    }

    #[test]
    fn test_mutual_recursion_indexes() {
        let v = Validator::new();
        v.prepare::<Account>().unwrap();
        assert_eq!(v.index().len(), 2);
    }

    #[test]
    fn test_deserialize_graph() {
        let team: Team = serde_json::from_str(
            r#"{"name": "core", "members": [{"role": "admin", "parent": {"role": "user"}}],
                "by_role": {"admin": [{"name": "a"}]}}"#,
        )
        .unwrap();
        assert_eq!(team.members.len(), 1);
        assert!(team.members[0].parent.is_some());
        assert_eq!(team.by_role["admin"][0].name.as_deref(), Some("a"));
    }

    #[test]
    fn test_unknown_field_rejected_by_accessor() {
        let account = Account::default();
        let err = Checkable::field(&account, "nope").unwrap_err();
        assert_eq!(err.type_name, "Account");
    }
}
