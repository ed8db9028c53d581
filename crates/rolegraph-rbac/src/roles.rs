//! Role types
//!
//! This module defines the privilege levels that can be granted on a target.
//! What a role implies, and whether it flows down the hierarchy, is not a
//! property of the role itself but of the [`RoleAlgebra`](crate::RoleAlgebra).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A privilege level on a target.
///
/// # Permission Model
///
/// - **Master**: Full administrative access. Not called "owner", because it
///   carries over to every sub-object; it is what deleting a non-leaf object
///   (say, a wiki article with sections) requires.
/// - **Editor**: May modify the object and add children to it.
/// - **Viewer**: May see the object.
///
/// # Examples
///
/// ```
/// use rolegraph_rbac::Role;
///
/// assert_eq!(Role::parse("EDITOR"), Some(Role::Editor));
/// assert_eq!(Role::Master.as_str(), "master");
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full, transitive administrative access
    Master,

    /// Can edit and add children
    Editor,

    /// Can see
    Viewer,
}

impl Role {
    /// Parse role from string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive)
    ///
    /// # Returns
    ///
    /// `Some(Role)` if valid, `None` otherwise
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "master" => Some(Self::Master),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Get string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    /// Get all roles.
    pub fn all() -> [Self; 3] {
        [Self::Master, Self::Editor, Self::Viewer]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("master"), Some(Role::Master));
        assert_eq!(Role::parse("Editor"), Some(Role::Editor));
        assert_eq!(Role::parse("VIEWER"), Some(Role::Viewer));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::all() {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_role_serde_is_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Master).unwrap(), "\"master\"");
        let role: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, Role::Viewer);
    }
}
