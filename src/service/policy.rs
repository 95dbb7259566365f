//! Selective persistence policy
//!
//! Durability is decided per namespace, once, from configuration.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::Namespace;
use crate::error::Result;

// == State Category ==
/// Durability class of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateCategory {
    /// Persisted to the remote store synchronously on every write
    Critical,
    /// Cache only; lost on restart
    Ephemeral,
}

// == Persistence Policy ==
/// Maps each namespace to its [`StateCategory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistencePolicy {
    critical: BTreeSet<Namespace>,
}

impl PersistencePolicy {
    /// Builds a policy where exactly `critical` namespaces are persisted.
    pub fn new(critical: impl IntoIterator<Item = Namespace>) -> Self {
        Self {
            critical: critical.into_iter().collect(),
        }
    }

    /// Parses a comma separated namespace list, e.g. `"conversation,role"`.
    pub fn parse(list: &str) -> Result<Self> {
        let critical = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .collect::<Result<BTreeSet<Namespace>>>()?;
        Ok(Self { critical })
    }

    pub fn category(&self, namespace: Namespace) -> StateCategory {
        if self.critical.contains(&namespace) {
            StateCategory::Critical
        } else {
            StateCategory::Ephemeral
        }
    }
}

impl Default for PersistencePolicy {
    /// Conversation checkpoints, language and role are critical; UI state is not.
    fn default() -> Self {
        Self::new([Namespace::Conversation, Namespace::Language, Namespace::Role])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PersistencePolicy::default();
        assert_eq!(policy.category(Namespace::Conversation), StateCategory::Critical);
        assert_eq!(policy.category(Namespace::Language), StateCategory::Critical);
        assert_eq!(policy.category(Namespace::Role), StateCategory::Critical);
        assert_eq!(policy.category(Namespace::Ui), StateCategory::Ephemeral);
    }

    #[test]
    fn test_parse_policy() {
        let policy = PersistencePolicy::parse("role, ui,").unwrap();
        assert_eq!(policy.category(Namespace::Role), StateCategory::Critical);
        assert_eq!(policy.category(Namespace::Ui), StateCategory::Critical);
        assert_eq!(policy.category(Namespace::Language), StateCategory::Ephemeral);

        assert!(PersistencePolicy::parse("role,typo").is_err());
        assert_eq!(PersistencePolicy::parse("").unwrap(), PersistencePolicy::new([]));
    }
}
