//! `GraphWalker` — first-time indexing of a type and everything it reaches.
//!
//! Indexing a type means:
//!
//! 1. compile every enabled rule it declares (plus matching [`RuleBook`] rules),
//! 2. descend into nested and container fields carrying the check marker,
//! 3. publish the [`ClassIndex`] and register the compiled rules, once.
//!
//! Type graphs may be cyclic (`Account.parent: Account`,
//! `Team.members: [Account]` with `Account.team: Team`). An in-progress stack
//! short-circuits re-entrant requests for a type whose indexing is already on
//! the call stack; the outer frame finishes it.
//!
//! Rules are compiled into a local list first and only reach the registry from
//! inside [`FieldIndex::publish`], so a type indexed concurrently by several
//! threads has its rules registered exactly once, and a type whose rules fail
//! to compile registers nothing.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::RuleBook;
use crate::index::{ClassIndex, FieldIndex, FieldKind, IndexedField};
use crate::matcher::{FieldRule, Matcher};
use crate::registry::MatcherRegistry;
use crate::schema::{FieldDecl, FieldType, TypeKey, TypeRef};
use crate::RuleError;

/// Indexes types into a [`FieldIndex`] and a [`MatcherRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct GraphWalker<'a> {
    index: &'a FieldIndex,
    registry: &'a MatcherRegistry,
    book: &'a RuleBook,
}

impl<'a> GraphWalker<'a> {
    /// Walker writing into `index` and `registry`, merging rules from `book`.
    #[must_use]
    pub fn new(index: &'a FieldIndex, registry: &'a MatcherRegistry, book: &'a RuleBook) -> Self {
        Self {
            index,
            registry,
            book,
        }
    }

    /// Index `ty` (and every type it reaches) unless already indexed.
    ///
    /// # Errors
    ///
    /// The first [`RuleError`] met while compiling rules of `ty` or of a type it
    /// reaches. Types fully indexed before the failure stay indexed.
    pub fn ensure_indexed(&self, ty: TypeRef) -> Result<Arc<ClassIndex>, RuleError> {
        if let Some(class) = self.index.get(ty.key()) {
            return Ok(class);
        }
        let mut in_progress = Vec::new();
        self.build(ty, &mut in_progress)
    }

    fn visit(&self, ty: TypeRef, in_progress: &mut Vec<TypeKey>) -> Result<(), RuleError> {
        if in_progress.contains(&ty.key()) {
            debug!(
                type_name = ty.key().short_name(),
                depth = in_progress.len(),
                "type already being indexed, skipping re-entrant request"
            );
            return Ok(());
        }
        if self.index.contains(ty.key()) {
            return Ok(());
        }
        self.build(ty, in_progress).map(drop)
    }

    fn build(
        &self,
        ty: TypeRef,
        in_progress: &mut Vec<TypeKey>,
    ) -> Result<Arc<ClassIndex>, RuleError> {
        in_progress.push(ty.key());
        let collected = self.collect(ty, in_progress);
        in_progress.pop();
        let (fields, rules) = collected?;

        let key = ty.key();
        let class = self.index.publish(key, || {
            let rule_count = rules.len();
            self.registry.register_all(key, rules);
            debug!(
                type_name = key.short_name(),
                fields = fields.len(),
                rules = rule_count,
                "indexed type"
            );
            ClassIndex::new(key, fields)
        });
        Ok(class)
    }

    fn collect(
        &self,
        ty: TypeRef,
        in_progress: &mut Vec<TypeKey>,
    ) -> Result<(Vec<IndexedField>, Vec<FieldRule>), RuleError> {
        let schema = ty.schema();
        let owner = ty.key().short_name();

        if self.book.fields_for(owner).next().is_some() {
            if let Some(other) = self.index.namesake(ty.key()) {
                warn!(
                    type_name = ty.key().name(),
                    other = other.name(),
                    "rule document entry `{owner}` applies to both types sharing that name"
                );
            }
        }

        for name in self.book.fields_for(owner) {
            if schema.get(name).is_none() {
                warn!(
                    type_name = owner,
                    field = name,
                    "rule document names a field the type does not declare; ignoring"
                );
            }
        }

        let mut fields = Vec::new();
        let mut rules = Vec::new();

        for decl in schema.fields() {
            let compiled = self.compile_field(owner, decl)?;
            if !compiled.is_empty() {
                trace!(type_name = owner, field = decl.name(), rules = compiled.len(), "field has rules");
                rules.extend(compiled);
                fields.push(IndexedField {
                    name: decl.name().to_owned(),
                    kind: FieldKind::Rules,
                });
                continue;
            }

            if !decl.is_checked() {
                continue;
            }

            let kind = match decl.ty() {
                FieldType::Nested(nested) => {
                    self.visit(*nested, in_progress)?;
                    FieldKind::Nested
                }
                container @ FieldType::Container { .. } => {
                    let Some(element) = container.checkable_element() else {
                        trace!(type_name = owner, field = decl.name(), "container of leaves, nothing to walk");
                        continue;
                    };
                    trace!(
                        type_name = owner,
                        field = decl.name(),
                        shape = ?container.shape(),
                        element = element.key().short_name(),
                        "walking container"
                    );
                    self.visit(element, in_progress)?;
                    FieldKind::Container
                }
                FieldType::Leaf | FieldType::Opaque => {
                    trace!(type_name = owner, field = decl.name(), "check marker on a non-checkable field");
                    continue;
                }
            };
            fields.push(IndexedField {
                name: decl.name().to_owned(),
                kind,
            });
        }

        Ok((fields, rules))
    }

    /// Compile the enabled rules of one field, declared rules first.
    fn compile_field(&self, owner: &str, decl: &FieldDecl) -> Result<Vec<FieldRule>, RuleError> {
        let configured = self.book.rules_for(owner, decl.name());
        let mut compiled = Vec::new();

        for rule in decl.rules().iter().chain(configured).filter(|r| !r.disabled) {
            let matcher = Arc::new(Matcher::compile(rule, owner, decl.name())?);
            for group in rule.effective_groups() {
                compiled.push(FieldRule {
                    group: group.to_owned(),
                    field: decl.name().to_owned(),
                    matcher: Arc::clone(&matcher),
                });
            }
        }
        Ok(compiled)
    }
}
