//! Experiment identity and the change bundle that defines one batch member.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::changes::{AttributeChange, AttributeChangeSet, ElementAdd, ElementAddList};
use super::error::{DomainError, DomainResult};

/// Filesystem-safe experiment directory name.
///
/// Allowed characters are ASCII alphanumerics and `_ . + -`; the name may
/// not start with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentName(String);

impl ExperimentName {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        let invalid = |reason: &str| DomainError::InvalidExperimentName {
            name: name.clone(),
            reason: reason.into(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.starts_with('.') {
            return Err(invalid("name cannot start with '.'"));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-')))
        {
            return Err(invalid(&format!("character '{}' is not allowed", c)));
        }
        Ok(Self(name))
    }

    /// Default name of the `index`-th experiment: `exp<index>`.
    pub fn indexed(index: usize) -> Self {
        Self(format!("exp{}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Replace every character that may not appear in a univariate experiment
/// name with `_`.
pub fn sanitize_name_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExperimentName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ExperimentName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentName> for String {
    fn from(name: ExperimentName) -> Self {
        name.0
    }
}

impl AsRef<str> for ExperimentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One generated batch member: its name and the changes that turn the
/// template into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentDef {
    pub name: ExperimentName,
    pub attr_changes: AttributeChangeSet,
    pub element_adds: ElementAddList,
}

impl ExperimentDef {
    pub fn new(name: ExperimentName) -> Self {
        Self {
            name,
            attr_changes: AttributeChangeSet::new(),
            element_adds: ElementAddList::new(),
        }
    }

    pub fn with_change(mut self, change: AttributeChange) -> Self {
        self.attr_changes.insert(change);
        self
    }

    pub fn with_add(mut self, add: ElementAdd) -> Self {
        self.element_adds.push(add);
        self
    }
}
