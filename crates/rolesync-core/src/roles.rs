//! Role scoping for updates and events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which roles an update applies to, or which roles an event is delivered to.
///
/// `All` means every role that currently has a partition when used for an
/// update, and every connected client when used for delivery.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Roles {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Roles {
    /// Scope to a single role.
    pub fn one(role: impl Into<String>) -> Self {
        let mut set = BTreeSet::new();
        set.insert(role.into());
        Roles::Only(set)
    }

    /// Scope to the given roles.
    pub fn only<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Roles::Only(roles.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Roles::All)
    }

    /// Whether `role` falls inside this scope.
    pub fn includes(&self, role: &str) -> bool {
        match self {
            Roles::All => true,
            Roles::Only(set) => set.contains(role),
        }
    }
}

impl From<&str> for Roles {
    fn from(role: &str) -> Self {
        Roles::one(role)
    }
}

impl From<&[&str]> for Roles {
    fn from(roles: &[&str]) -> Self {
        Roles::only(roles.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Roles {
    fn from(roles: [&str; N]) -> Self {
        Roles::only(roles)
    }
}

impl From<Vec<String>> for Roles {
    fn from(roles: Vec<String>) -> Self {
        Roles::only(roles)
    }
}

/// `None` is the "every current role" sentinel.
impl From<Option<Vec<String>>> for Roles {
    fn from(roles: Option<Vec<String>>) -> Self {
        match roles {
            Some(roles) => Roles::only(roles),
            None => Roles::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_includes() {
        assert!(Roles::All.includes("anyone"));
        let scoped = Roles::from(["admin", "viewer"]);
        assert!(scoped.includes("admin"));
        assert!(!scoped.includes("guest"));
    }

    #[test]
    fn test_empty_set_includes_nobody() {
        let none = Roles::only(Vec::<String>::new());
        assert!(!none.is_all());
        assert!(!none.includes("admin"));
    }

    #[test]
    fn test_none_is_all() {
        assert_eq!(Roles::from(None::<Vec<String>>), Roles::All);
        assert_eq!(
            Roles::from(Some(vec!["r1".to_string()])),
            Roles::one("r1")
        );
    }
}
