//! Conformance test fixture runner
//!
//! Loads YAML fixtures and runs them against a fresh [`Validator`] each.
//!
//! ```yaml
//! name: literal_include
//! description: role must be one of the listed values
//! rules:
//!   types:
//!     Account:
//!       role:
//!         - values: [admin, user]
//! cases:
//!   - name: listed value passes
//!     account: { role: admin }
//!     expect: true
//!   - name: other value fails
//!     account: { role: root }
//!     expect: false
//!     err_msg: 'Account.role: value "root" is not accepted by values ["admin", "user"]'
//! ```
//!
//! A case supplies exactly one subject (`account`, `team` or `accounts`) and
//! either `expect` (the check result) or `error` (a substring of the error the
//! check must fail with). A fixture whose rule document itself must be
//! rejected sets `rules_error` and has no cases.

use serde::Deserialize;
use sieve::{RuleBook, RuleBookConfig, Validator, Value, Verdict};

use crate::{Account, Team};

/// A complete test fixture
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: RuleBookConfig,
    /// Substring of the error loading `rules` must fail with.
    #[serde(default)]
    pub rules_error: Option<String>,
    #[serde(default)]
    pub cases: Vec<FixtureCase>,
}

/// Test case
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureCase {
    pub name: String,
    /// Empty means the default group.
    #[serde(default)]
    pub group: String,
    /// Empty means every field.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub account: Option<Account>,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub accounts: Option<Vec<Account>>,
    #[serde(default)]
    pub expect: Option<bool>,
    /// Exact most-specific message.
    #[serde(default)]
    pub err_msg: Option<String>,
    /// Substrings the full chain must contain, in order.
    #[serde(default)]
    pub err_chain: Vec<String>,
    /// Substring of an evaluation error (malformed rule, unreadable field).
    #[serde(default)]
    pub error: Option<String>,
}

impl FixtureCase {
    fn subject(&self) -> Result<Value<'_>, String> {
        match (&self.account, &self.team, &self.accounts) {
            (Some(account), None, None) => Ok(Value::object(account)),
            (None, Some(team), None) => Ok(Value::object(team)),
            (None, None, Some(accounts)) => Ok(Value::seq(accounts.iter().map(Value::object))),
            _ => Err("case needs exactly one of account, team, accounts".to_owned()),
        }
    }

    fn evaluate(&self, validator: &Validator) -> Result<(), String> {
        let subject = self.subject()?;
        let fields: Vec<&str> = self.fields.iter().map(String::as_str).collect();
        let fields = (!fields.is_empty()).then_some(fields.as_slice());

        match (validator.evaluate(&self.group, &subject, fields), &self.error) {
            (Ok(verdict), None) => self.compare(&verdict),
            (Ok(verdict), Some(expected)) => Err(format!(
                "expected error containing {expected:?}, got verdict {}",
                verdict.is_pass()
            )),
            (Err(err), Some(expected)) if err.to_string().contains(expected.as_str()) => Ok(()),
            (Err(err), _) => Err(format!("unexpected error: {err}")),
        }
    }

    fn compare(&self, verdict: &Verdict) -> Result<(), String> {
        let Some(expect) = self.expect else {
            return Err("case needs `expect` or `error`".to_owned());
        };
        if verdict.is_pass() != expect {
            return Err(format!(
                "expected {expect}, got {} (chain: {:?})",
                verdict.is_pass(),
                verdict.err_msg_chain()
            ));
        }
        if let Some(expected) = &self.err_msg {
            if verdict.err_msg() != Some(expected.as_str()) {
                return Err(format!(
                    "expected message {expected:?}, got {:?}",
                    verdict.err_msg()
                ));
            }
        }
        let chain = verdict.err_msg_chain();
        let mut rest = chain.as_str();
        for expected in &self.err_chain {
            let Some(at) = rest.find(expected.as_str()) else {
                return Err(format!("chain {chain:?} lacks {expected:?} (or has it out of order)"));
            };
            rest = &rest[at + expected.len()..];
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of running a single test case
#[derive(Debug)]
pub struct CaseResult {
    pub case_name: String,
    pub passed: bool,
    pub detail: Option<String>,
}

impl Fixture {
    /// Parse a fixture from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse multiple fixtures from a YAML file with `---` separators
    pub fn from_yaml_multi(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        let mut fixtures = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(yaml) {
            fixtures.push(Self::deserialize(doc)?);
        }
        Ok(fixtures)
    }

    /// Run all test cases and return results
    pub fn run(&self) -> Vec<CaseResult> {
        let book = match (RuleBook::from_config(self.rules.clone()), &self.rules_error) {
            (Ok(book), None) => book,
            (Err(err), Some(expected)) if err.to_string().contains(expected.as_str()) => {
                return Vec::new();
            }
            (Ok(_), Some(expected)) => {
                return vec![CaseResult {
                    case_name: "<rules>".to_owned(),
                    passed: false,
                    detail: Some(format!("rule document loaded, expected error {expected:?}")),
                }];
            }
            (Err(err), _) => {
                return vec![CaseResult {
                    case_name: "<rules>".to_owned(),
                    passed: false,
                    detail: Some(format!("rule document rejected: {err}")),
                }];
            }
        };

        let validator = Validator::with_rule_book(book);
        self.cases
            .iter()
            .map(|case| {
                let outcome = case.evaluate(&validator);
                CaseResult {
                    case_name: case.name.clone(),
                    passed: outcome.is_ok(),
                    detail: outcome.err(),
                }
            })
            .collect()
    }

    /// Run all test cases and panic on first failure
    pub fn run_and_assert(&self) {
        let results = self.run();
        for result in results {
            assert!(
                result.passed,
                "Fixture '{}' case '{}' failed: {}",
                self.name,
                result.case_name,
                result.detail.unwrap_or_default()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_runs() {
        let fixture = Fixture::from_yaml(
            r#"
name: inline
rules:
  types:
    Account:
      role:
        - values: [admin]
cases:
  - name: pass
    account: { role: admin }
    expect: true
  - name: fail
    account: { role: root }
    expect: false
    err_msg: 'Account.role: value "root" is not accepted by values ["admin"]'
"#,
        )
        .unwrap();
        fixture.run_and_assert();
    }

    #[test]
    fn test_wrong_expectation_reported() {
        let fixture = Fixture::from_yaml(
            r#"
name: inverted
rules: { types: { Account: { role: [ { values: [admin] } ] } } }
cases:
  - name: wrong
    account: { role: root }
    expect: true
"#,
        )
        .unwrap();
        let results = fixture.run();
        assert_eq!(results.len(), 1);
        assert!(!results[0].passed);
        assert!(results[0].detail.as_deref().unwrap().contains("expected true"));
    }

    #[test]
    fn test_case_needs_one_subject() {
        let fixture = Fixture::from_yaml(
            r#"
name: no subject
cases:
  - name: empty
    expect: true
"#,
        )
        .unwrap();
        assert!(!fixture.run()[0].passed);
    }

    #[test]
    fn test_multi_document() {
        let fixtures = Fixture::from_yaml_multi("name: a\n---\nname: b\n").unwrap();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[1].name, "b");
    }
}
