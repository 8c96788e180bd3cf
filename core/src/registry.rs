//! `MatcherRegistry` — compiled rules by group, type and field.
//!
//! Two maps with the same shape, one per polarity:
//!
//! ```text
//! group ──► type ──► field ──► [Matcher, ...]
//! ```
//!
//! Whitelist entries ([`Polarity::Include`]) and blacklist entries
//! ([`Polarity::Exclude`]) never share a map, so [`resolve`](MatcherRegistry::resolve)
//! hands the validator both lists and [`Resolved::admits`] applies the
//! precedence rule:
//!
//! | white | black | field passes when |
//! |-------|-------|-------------------|
//! | some  | any   | the value hits at least one white matcher |
//! | none  | some  | the value hits no black matcher |
//! | none  | none  | always |
//!
//! Both maps are sharded concurrent maps. Writes happen only while a type is
//! first indexed; reads happen on every check.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::matcher::{FieldRule, Matcher, Polarity};
use crate::schema::TypeKey;
use crate::Value;

type FieldMatchers = HashMap<String, Vec<Arc<Matcher>>>;
type GroupMap = DashMap<String, DashMap<TypeKey, FieldMatchers>>;

/// Registered matchers for every indexed type.
#[derive(Debug, Default)]
pub struct MatcherRegistry {
    white: GroupMap,
    black: GroupMap,
}

impl MatcherRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// File `matcher` under `(group, ty, field)` in the map its polarity selects.
    ///
    /// Per-group and per-type buckets are created on first use and appended to
    /// afterwards; concurrent registrations for different types never clobber
    /// each other's buckets.
    pub fn register(&self, group: &str, ty: TypeKey, field: &str, matcher: Arc<Matcher>) {
        let map = match matcher.polarity() {
            Polarity::Include => &self.white,
            Polarity::Exclude => &self.black,
        };
        map.entry(group.to_owned())
            .or_default()
            .entry(ty)
            .or_default()
            .entry(field.to_owned())
            .or_default()
            .push(matcher);
    }

    /// Register a batch of compiled rules for `ty`.
    pub fn register_all(&self, ty: TypeKey, rules: impl IntoIterator<Item = FieldRule>) {
        for rule in rules {
            self.register(&rule.group, ty, &rule.field, rule.matcher);
        }
    }

    /// Matchers applying to `ty.field` under `group`.
    #[must_use]
    pub fn resolve(&self, group: &str, ty: TypeKey, field: &str) -> Resolved {
        Resolved {
            white: lookup(&self.white, group, ty, field),
            black: lookup(&self.black, group, ty, field),
        }
    }

    /// Groups that have at least one matcher of either polarity.
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .white
            .iter()
            .chain(self.black.iter())
            .map(|entry| entry.key().clone())
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }

    /// Total number of registered matchers.
    #[must_use]
    pub fn len(&self) -> usize {
        count(&self.white) + count(&self.black)
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lookup(map: &GroupMap, group: &str, ty: TypeKey, field: &str) -> Vec<Arc<Matcher>> {
    let Some(by_type) = map.get(group) else {
        return Vec::new();
    };
    let Some(by_field) = by_type.get(&ty) else {
        return Vec::new();
    };
    by_field.get(field).cloned().unwrap_or_default()
}

fn count(map: &GroupMap) -> usize {
    map.iter()
        .map(|by_type| {
            by_type
                .iter()
                .map(|by_field| by_field.values().map(Vec::len).sum::<usize>())
                .sum::<usize>()
        })
        .sum()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolved
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a precedence decision.
#[derive(Debug, Clone, Copy)]
pub enum Decision<'r> {
    /// The field passes.
    Pass,
    /// White matchers exist and none was hit.
    NotAccepted,
    /// No white matchers; this black matcher was hit.
    Rejected(&'r Matcher),
}

/// The white and black matchers for one `(group, type, field)`.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    /// Whitelist entries; any hit admits the value.
    pub white: Vec<Arc<Matcher>>,
    /// Blacklist entries; consulted only when `white` is empty.
    pub black: Vec<Arc<Matcher>>,
}

impl Resolved {
    /// Returns `true` if no matcher applies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.white.is_empty() && self.black.is_empty()
    }

    /// Apply white-over-black precedence to `value`.
    #[must_use]
    pub fn decide(&self, value: &Value<'_>, now: DateTime<Utc>) -> Decision<'_> {
        if !self.white.is_empty() {
            return if self.white.iter().any(|m| m.hits(value, now)) {
                Decision::Pass
            } else {
                Decision::NotAccepted
            };
        }
        self.black
            .iter()
            .find(|m| m.hits(value, now))
            .map_or(Decision::Pass, |m| Decision::Rejected(m))
    }

    /// Shorthand for `decide(..)` being [`Decision::Pass`].
    #[must_use]
    pub fn admits(&self, value: &Value<'_>, now: DateTime<Utc>) -> bool {
        matches!(self.decide(value, now), Decision::Pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RuleDecl;

    // Stand-ins; only their type identity matters here.
    type Order = String;
    type Line = Vec<u8>;

    fn key<T: 'static>() -> TypeKey {
        TypeKey::of::<T>()
    }

    fn compiled(rule: RuleDecl) -> Arc<Matcher> {
        Arc::new(Matcher::compile(&rule, "Order", "f").unwrap())
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn register_and_resolve() {
        let registry = MatcherRegistry::new();
        registry.register("g", key::<Order>(), "status", compiled(RuleDecl::values(["a"])));
        registry.register("g", key::<Order>(), "status", compiled(RuleDecl::reject(["b"])));

        let resolved = registry.resolve("g", key::<Order>(), "status");
        assert_eq!(resolved.white.len(), 1);
        assert_eq!(resolved.black.len(), 1);
        assert_eq!(registry.len(), 2);

        assert!(registry.resolve("other", key::<Order>(), "status").is_empty());
        assert!(registry.resolve("g", key::<Line>(), "status").is_empty());
        assert!(registry.resolve("g", key::<Order>(), "code").is_empty());
    }

    #[test]
    fn white_takes_precedence_over_black() {
        let registry = MatcherRegistry::new();
        registry.register("g", key::<Order>(), "f", compiled(RuleDecl::values(["a", "b"])));
        registry.register("g", key::<Order>(), "f", compiled(RuleDecl::reject(["a"])));
        let resolved = registry.resolve("g", key::<Order>(), "f");

        // "a" is blacklisted too, but the whitelist decides.
        assert!(resolved.admits(&Value::from("a"), now()));
        assert!(matches!(
            resolved.decide(&Value::from("z"), now()),
            Decision::NotAccepted
        ));
    }

    #[test]
    fn black_only() {
        let registry = MatcherRegistry::new();
        registry.register("g", key::<Order>(), "f", compiled(RuleDecl::reject(["x"])));
        registry.register("g", key::<Order>(), "f", compiled(RuleDecl::pattern("y+").rejecting()));
        let resolved = registry.resolve("g", key::<Order>(), "f");

        assert!(resolved.admits(&Value::from("a"), now()));
        assert!(!resolved.admits(&Value::from("x"), now()));
        let Decision::Rejected(hit) = resolved.decide(&Value::from("yyy"), now()) else {
            panic!("expected rejection");
        };
        assert!(matches!(hit, Matcher::Pattern { .. }));
    }

    #[test]
    fn multiple_white_rules_or_combine() {
        let registry = MatcherRegistry::new();
        registry.register("g", key::<Order>(), "f", compiled(RuleDecl::values(["a"])));
        registry.register("g", key::<Order>(), "f", compiled(RuleDecl::range("[10, 20]")));
        let resolved = registry.resolve("g", key::<Order>(), "f");

        assert!(resolved.admits(&Value::from("a"), now()));
        assert!(resolved.admits(&Value::from(15i64), now()));
        assert!(!resolved.admits(&Value::from(25i64), now()));
    }

    #[test]
    fn no_rules_passes() {
        assert!(Resolved::default().admits(&Value::from("anything"), now()));
    }

    #[test]
    fn groups_lists_both_maps() {
        let registry = MatcherRegistry::new();
        registry.register("b", key::<Order>(), "f", compiled(RuleDecl::reject(["x"])));
        registry.register("a", key::<Order>(), "f", compiled(RuleDecl::values(["x"])));
        registry.register("a", key::<Line>(), "f", compiled(RuleDecl::values(["x"])));
        assert_eq!(registry.groups(), ["a", "b"]);
    }

    #[test]
    fn concurrent_registration_keeps_every_bucket() {
        let registry = MatcherRegistry::new();
        std::thread::scope(|s| {
            for i in 0..8 {
                let registry = &registry;
                s.spawn(move || {
                    let field = format!("f{i}");
                    registry.register("g", key::<Order>(), &field, compiled(RuleDecl::values(["a"])));
                    registry.register("g", key::<Line>(), &field, compiled(RuleDecl::values(["a"])));
                });
            }
        });
        assert_eq!(registry.len(), 16);
        for i in 0..8 {
            let field = format!("f{i}");
            assert_eq!(registry.resolve("g", key::<Order>(), &field).white.len(), 1);
        }
    }
}
