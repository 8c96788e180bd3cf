//! Per-call validation state and its result.
//!
//! A [`ValidationContext`] lives for one top-level check. It carries the
//! group being checked and the error chain built up on failure. The chain
//! reads outermost first: a nested failure inserts its own entry in front of
//! whatever the inner check recorded.
//!
//! ```text
//! Team.members[1]: nested Account failed --> Account.role: value "root" is not accepted by values ["admin", "user"]
//! ```

use crate::{CHAIN_SEPARATOR, DEFAULT_GROUP};

/// Working state of one check.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    group: String,
    chain: Vec<String>,
}

impl ValidationContext {
    /// Context for `group`; a blank group means [`DEFAULT_GROUP`].
    #[must_use]
    pub fn new(group: &str) -> Self {
        let group = if group.trim().is_empty() {
            DEFAULT_GROUP
        } else {
            group
        };
        Self {
            group: group.to_owned(),
            chain: Vec::new(),
        }
    }

    /// Group being checked.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Position to insert an outer entry at once an inner check has failed.
    pub(crate) fn mark(&self) -> usize {
        self.chain.len()
    }

    /// Record an innermost failure.
    pub(crate) fn fail(&mut self, entry: String) {
        self.chain.push(entry);
    }

    /// Record an outer failure in front of everything recorded since `mark`.
    pub(crate) fn fail_at(&mut self, mark: usize, entry: String) {
        self.chain.insert(mark.min(self.chain.len()), entry);
    }

    /// Finish the check.
    #[must_use]
    pub fn finish(self, passed: bool) -> Verdict {
        Verdict {
            passed,
            group: self.group,
            chain: self.chain,
        }
    }
}

/// Result of a check: pass/fail plus the error chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    passed: bool,
    group: String,
    chain: Vec<String>,
}

impl Verdict {
    /// Returns `true` if every applicable rule passed.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.passed
    }

    /// Group that was checked.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The most specific failure: the last chain entry.
    #[must_use]
    pub fn err_msg(&self) -> Option<&str> {
        self.chain.last().map(String::as_str)
    }

    /// The whole chain, outermost first, joined by [`CHAIN_SEPARATOR`].
    #[must_use]
    pub fn err_msg_chain(&self) -> String {
        self.chain.join(CHAIN_SEPARATOR)
    }

    /// Chain entries, outermost first.
    #[must_use]
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    /// `Ok(())` on pass, the failure otherwise.
    ///
    /// # Errors
    ///
    /// [`ValidationFailure`] when the check failed.
    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.passed {
            Ok(())
        } else {
            Err(ValidationFailure::new(self.group, self.chain))
        }
    }
}

/// A failed check, as an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed in group \"{group}\": {message}")]
pub struct ValidationFailure {
    group: String,
    message: String,
    chain: Vec<String>,
}

impl ValidationFailure {
    fn new(group: String, chain: Vec<String>) -> Self {
        let message = chain.last().cloned().unwrap_or_default();
        Self {
            group,
            message,
            chain,
        }
    }

    /// Group that was checked.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The most specific failure.
    #[must_use]
    pub fn err_msg(&self) -> &str {
        &self.message
    }

    /// The whole chain, outermost first, joined by [`CHAIN_SEPARATOR`].
    #[must_use]
    pub fn err_msg_chain(&self) -> String {
        self.chain.join(CHAIN_SEPARATOR)
    }

    /// Chain entries, outermost first.
    #[must_use]
    pub fn chain(&self) -> &[String] {
        &self.chain
    }
}
