//! Grant records
//!
//! A grant is the fact "`grantee` holds `role` on `target`". Explicit grants
//! are authored by callers; implicit ones are derived by the engine and are
//! read-only until promoted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::TargetId;
use crate::roles::Role;
use crate::subject::Grantee;

/// The unique key of a grant. At most one row exists per key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GrantKey {
    /// The target the role is held on
    pub target: TargetId,
    /// Who holds it
    pub grantee: Grantee,
    /// The role held
    pub role: Role,
}

impl GrantKey {
    /// Create a new grant key.
    pub fn new(target: TargetId, grantee: Grantee, role: Role) -> Self {
        Self {
            target,
            grantee,
            role,
        }
    }
}

impl fmt::Display for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on {}", self.grantee, self.role, self.target)
    }
}

/// A stored grant row.
///
/// # Example
///
/// ```
/// use rolegraph_rbac::{Grant, Grantee, Role, TargetId};
///
/// let mut grant = Grant::implicit(TargetId::new(), Grantee::Public, Role::Viewer);
/// assert!(!grant.explicit);
///
/// grant.promote();
/// assert!(grant.explicit);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Grant {
    /// The target the role is held on
    pub target: TargetId,
    /// Who holds it
    pub grantee: Grantee,
    /// The role held
    pub role: Role,
    /// Whether a caller authored this row. If false, the row is inherited or implied.
    pub explicit: bool,
}

impl Grant {
    /// A caller-authored grant.
    pub fn explicit(target: TargetId, grantee: Grantee, role: Role) -> Self {
        Self {
            target,
            grantee,
            role,
            explicit: true,
        }
    }

    /// A derived grant.
    pub fn implicit(target: TargetId, grantee: Grantee, role: Role) -> Self {
        Self {
            target,
            grantee,
            role,
            explicit: false,
        }
    }

    /// Build a row from its key and explicit flag.
    pub fn from_key(key: GrantKey, explicit: bool) -> Self {
        Self {
            target: key.target,
            grantee: key.grantee,
            role: key.role,
            explicit,
        }
    }

    /// The unique key of this row.
    pub fn key(&self) -> GrantKey {
        GrantKey::new(self.target, self.grantee, self.role)
    }

    /// Turn a derived row into an ordinary explicit one.
    pub fn promote(&mut self) {
        self.explicit = true;
    }

    /// Check if this row was derived by the engine.
    pub fn is_implicit(&self) -> bool {
        !self.explicit
    }
}
