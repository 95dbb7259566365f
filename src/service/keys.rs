//! State keys
//!
//! A state key is a user identity scoped to a namespace. The namespace
//! decides the remote collection a record lives in and, through the
//! [`PersistencePolicy`](super::PersistencePolicy), its durability.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError};

/// Maximum allowed user id length in bytes
pub const MAX_USER_ID_LENGTH: usize = 256;

// == Namespace ==
/// Kinds of per-user state the bot keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Active conversation checkpoint (step, collected form data, mode)
    Conversation,
    /// Preferred interface language
    Language,
    /// Admin role flag
    Role,
    /// Intermediate UI state (pagination offsets, open menus)
    Ui,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Conversation,
        Namespace::Language,
        Namespace::Role,
        Namespace::Ui,
    ];

    /// Remote collection holding this namespace's records.
    pub fn collection(self) -> &'static str {
        match self {
            Namespace::Conversation => "user_states",
            Namespace::Language => "user_langs",
            Namespace::Role => "user_roles",
            Namespace::Ui => "ui_states",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Conversation => "conversation",
            Namespace::Language => "language",
            Namespace::Role => "role",
            Namespace::Ui => "ui",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StateError::InvalidRequest(format!("Unknown namespace '{}'", s)))
    }
}

// == State Key ==
/// Identity of one piece of user state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    namespace: Namespace,
    user_id: String,
}

impl StateKey {
    /// Builds a key, rejecting empty or oversized user ids.
    pub fn new(namespace: Namespace, user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.is_empty() {
            return Err(StateError::InvalidRequest(
                "User id cannot be empty".to_string(),
            ));
        }
        if user_id.len() > MAX_USER_ID_LENGTH {
            return Err(StateError::InvalidRequest(format!(
                "User id exceeds maximum length of {} bytes",
                MAX_USER_ID_LENGTH
            )));
        }
        Ok(Self { namespace, user_id })
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_round_trips_through_str() {
        for ns in Namespace::ALL {
            assert_eq!(ns.as_str().parse::<Namespace>().unwrap(), ns);
        }
        assert_eq!(" Language ".parse::<Namespace>().unwrap(), Namespace::Language);
        assert!("billing".parse::<Namespace>().is_err());
    }

    #[test]
    fn test_namespace_serde_is_lowercase() {
        let json = serde_json::to_string(&Namespace::Conversation).unwrap();
        assert_eq!(json, "\"conversation\"");
        let ns: Namespace = serde_json::from_str("\"ui\"").unwrap();
        assert_eq!(ns, Namespace::Ui);
    }

    #[test]
    fn test_collections_are_distinct() {
        let collections: std::collections::HashSet<_> =
            Namespace::ALL.iter().map(|ns| ns.collection()).collect();
        assert_eq!(collections.len(), Namespace::ALL.len());
    }

    #[test]
    fn test_state_key_validation() {
        assert!(StateKey::new(Namespace::Language, "").is_err());
        assert!(StateKey::new(Namespace::Language, "x".repeat(MAX_USER_ID_LENGTH + 1)).is_err());

        let key = StateKey::new(Namespace::Language, "42").unwrap();
        assert_eq!(key.user_id(), "42");
        assert_eq!(key.to_string(), "language/42");
    }
}
