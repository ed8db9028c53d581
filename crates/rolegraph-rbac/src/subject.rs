//! Subjects and grantees
//!
//! A [`Subject`] is the identity a caller presents when asking a question or
//! performing a mutation. A [`Grantee`] is what a stored grant can name. The
//! two differ by exactly one case: `Superuser` bypasses every check and is
//! therefore never stored.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::ids::UserId;

/// The identity of a caller, resolved by the embedding application.
///
/// The engine never authenticates anyone; it trusts whatever subject it is
/// handed.
///
/// # Examples
///
/// ```
/// use rolegraph_rbac::{Grantee, Subject, UserId};
///
/// let user = UserId::new();
/// let subject = Subject::User(user);
///
/// // A user is matched by grants to that user and by public grants
/// assert_eq!(subject.grantees(), vec![Grantee::Public, Grantee::User(user)]);
///
/// // An anonymous caller is only matched by public grants
/// assert_eq!(Subject::Public.grantees(), vec![Grantee::Public]);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    /// Bypasses all checks regardless of stored grants
    Superuser,

    /// A specific authenticated user
    User(UserId),

    /// Anyone, including unauthenticated callers
    Public,
}

impl Subject {
    /// Whether this caller bypasses every check.
    pub fn is_superuser(&self) -> bool {
        matches!(self, Subject::Superuser)
    }

    /// The grantees whose rows apply to this caller, public first.
    ///
    /// Public grants apply to everybody. A user grant applies only to that
    /// user. Empty for `Superuser`, which callers short-circuit on
    /// [`is_superuser`](Self::is_superuser) before consulting grants.
    pub fn grantees(&self) -> Vec<Grantee> {
        match self {
            Subject::Superuser => Vec::new(),
            Subject::User(id) => vec![Grantee::Public, Grantee::User(*id)],
            Subject::Public => vec![Grantee::Public],
        }
    }
}

impl From<Grantee> for Subject {
    fn from(grantee: Grantee) -> Self {
        match grantee {
            Grantee::Public => Subject::Public,
            Grantee::User(id) => Subject::User(id),
        }
    }
}

/// The holder of a stored grant.
///
/// Unlike a nullable user column, the public population and each user have
/// disjoint keys, so uniqueness of `(target, grantee, role)` holds for both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Grantee {
    /// Anyone
    Public,

    /// A specific user
    User(UserId),
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grantee::Public => f.write_str("public"),
            Grantee::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Returned when a grant is addressed to `Superuser`, which cannot hold one.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("superuser cannot be the holder of a grant")]
pub struct SuperuserGrantee;

impl TryFrom<Subject> for Grantee {
    type Error = SuperuserGrantee;

    fn try_from(subject: Subject) -> Result<Self, Self::Error> {
        match subject {
            Subject::Superuser => Err(SuperuserGrantee),
            Subject::User(id) => Ok(Grantee::User(id)),
            Subject::Public => Ok(Grantee::Public),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superuser_is_not_a_grantee() {
        assert_eq!(Grantee::try_from(Subject::Superuser), Err(SuperuserGrantee));
        assert!(Subject::Superuser.grantees().is_empty());

        let id = UserId::new();
        assert_eq!(Grantee::try_from(Subject::User(id)), Ok(Grantee::User(id)));
        assert_eq!(Grantee::try_from(Subject::Public), Ok(Grantee::Public));
    }

    #[test]
    fn test_grantees_for_subject() {
        let id = UserId::new();
        assert_eq!(
            Subject::User(id).grantees(),
            vec![Grantee::Public, Grantee::User(id)]
        );
        assert_eq!(Subject::Public.grantees(), vec![Grantee::Public]);
        assert!(!Subject::User(id).grantees().contains(&Grantee::User(UserId::new())));
    }

    #[test]
    fn test_grantee_serde() {
        let json = serde_json::to_value(Grantee::Public).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "public"}));

        let id = UserId::new();
        let json = serde_json::to_value(Grantee::User(id)).unwrap();
        assert_eq!(json["kind"], "user");
        let back: Grantee = serde_json::from_value(json).unwrap();
        assert_eq!(back, Grantee::User(id));
    }
}
