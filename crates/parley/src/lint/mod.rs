//! Offline protocol linter for stored conversation corpora.
//!
//! Each [`Check`] runs independently over every record. By default a check
//! stops at its first offending record; in exhaustive mode it reports all of
//! them. Either way the corpus passes only if every enabled check passes.
//!
//! A record with unbalanced protocol tags fails the tag-balance check and is
//! skipped by every other check.

use crate::config::LintConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

mod checks;
mod record;
mod tags;

pub use record::{DatasetRecord, RecordRef, StoredMessage, load_dataset, parse_dataset};
pub use tags::{PLACEHOLDER_TAGS, PROTOCOL_TAGS, TagError, check_balance};

/// A structural check over stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    /// No two adjacent messages share a role.
    RoleAlternation,
    /// Every role is `user` or `assistant`.
    RoleNames,
    /// Protocol tags nest properly and are closed.
    TagBalance,
    /// Calls in assistant messages parse and match the record's functions.
    ArgumentSchema,
    /// Every stored function has a name, a description and parameters.
    FunctionFormat,
    /// No two records hold the same conversation.
    DuplicateContent,
    /// No text keeps `\u` escape sequences.
    EscapedText,
}

impl Check {
    /// Every check, in reporting order.
    pub const ALL: [Check; 7] = [
        Check::RoleAlternation,
        Check::RoleNames,
        Check::TagBalance,
        Check::ArgumentSchema,
        Check::FunctionFormat,
        Check::DuplicateContent,
        Check::EscapedText,
    ];

    /// Returns the check name.
    pub fn as_str(self) -> &'static str {
        match self {
            Check::RoleAlternation => "role-alternation",
            Check::RoleNames => "role-names",
            Check::TagBalance => "tag-balance",
            Check::ArgumentSchema => "argument-schema",
            Check::FunctionFormat => "function-format",
            Check::DuplicateContent => "duplicate-content",
            Check::EscapedText => "escaped-text",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Check {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Check::ALL
            .into_iter()
            .find(|check| check.as_str() == s)
            .ok_or_else(|| format!("unknown check `{s}`"))
    }
}

/// An offending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// The record.
    pub record: RecordRef,
    /// What is wrong with it.
    pub reason: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.record, self.reason)
    }
}

/// Result of one check over the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    /// The check.
    pub check: Check,
    /// Offending records; at most one unless the linter is exhaustive.
    pub failures: Vec<Failure>,
}

impl CheckOutcome {
    /// Returns `true` if no record failed.
    #[inline]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Results of every enabled check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    /// One outcome per enabled check.
    pub outcomes: Vec<CheckOutcome>,
}

impl LintReport {
    /// Returns `true` if every check passed.
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(CheckOutcome::passed)
    }

    /// Returns the failed checks.
    pub fn failed(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed())
    }
}

/// Runs a set of checks over a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linter {
    checks: Vec<Check>,
    exhaustive: bool,
}

impl Default for Linter {
    fn default() -> Self {
        Self::new(Check::ALL)
    }
}

impl Linter {
    /// Creates a fail-fast linter running `checks`, each at most once.
    pub fn new(checks: impl IntoIterator<Item = Check>) -> Self {
        let mut enabled = Vec::new();
        for check in checks {
            if !enabled.contains(&check) {
                enabled.push(check);
            }
        }
        Self {
            checks: enabled,
            exhaustive: false,
        }
    }

    /// Creates a linter from its configuration.
    pub fn from_config(config: &LintConfig) -> Self {
        Self::new(config.checks.iter().copied()).exhaustive(config.exhaustive)
    }

    /// Reports every offending record instead of the first one.
    #[inline]
    pub fn exhaustive(mut self, exhaustive: bool) -> Self {
        self.exhaustive = exhaustive;
        self
    }

    /// Returns the enabled checks.
    #[inline]
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Runs every enabled check over `records`.
    pub fn run(&self, records: &[DatasetRecord]) -> LintReport {
        let balanced = records
            .iter()
            .map(checks::has_balanced_tags)
            .collect::<Vec<_>>();
        let outcomes = self
            .checks
            .iter()
            .map(|&check| self.run_check(check, records, &balanced))
            .collect();
        LintReport { outcomes }
    }

    fn run_check(
        &self,
        check: Check,
        records: &[DatasetRecord],
        balanced: &[bool],
    ) -> CheckOutcome {
        let mut seen = HashSet::new();
        let mut failures = Vec::new();
        for (record, &balanced) in records.iter().zip(balanced) {
            if !balanced && check != Check::TagBalance {
                tracing::debug!(
                    check = check.as_str(),
                    record = %record.reference(),
                    "skipping a record with unbalanced tags"
                );
                continue;
            }
            let verdict = match check {
                Check::RoleAlternation => checks::role_alternation(record),
                Check::RoleNames => checks::role_names(record),
                Check::TagBalance => checks::tag_balance(record),
                Check::ArgumentSchema => checks::argument_schema(record),
                Check::FunctionFormat => checks::function_format(record),
                Check::DuplicateContent => checks::duplicate_content(record, &mut seen),
                Check::EscapedText => checks::escaped_text(record),
            };
            if let Err(reason) = verdict {
                tracing::warn!(check = check.as_str(), record = %record.reference(), "{reason}");
                failures.push(Failure {
                    record: record.reference().clone(),
                    reason,
                });
                if !self.exhaustive {
                    break;
                }
            }
        }
        tracing::debug!(check = check.as_str(), failures = failures.len(), "check finished");
        CheckOutcome { check, failures }
    }
}
