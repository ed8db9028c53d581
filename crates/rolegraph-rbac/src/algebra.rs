//! # Role Algebra
//!
//! The static configuration that turns explicit grants into their closure:
//!
//! - **Implication**: a grant of one role also counts as specific weaker roles
//!   on the same target (`Master` implies `Editor` and `Viewer`).
//! - **Recursion**: some roles, once held on a target, also hold on every
//!   descendant target (`Master`).
//!
//! The algebra is an immutable value handed to the engine at construction, so
//! alternate algebras can be tested side by side.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::roles::Role;

/// Role algebra errors.
#[derive(Debug, Error)]
pub enum AlgebraError {
    /// A role was configured to imply itself
    #[error("role '{0}' may not imply itself")]
    SelfImplication(Role),

    /// The algebra document could not be parsed
    #[error("invalid role algebra: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serialized form of an algebra, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlgebraDocument {
    /// Role -> roles it directly implies
    #[serde(default)]
    pub implies: BTreeMap<Role, BTreeSet<Role>>,

    /// Roles inherited by descendant targets
    #[serde(default)]
    pub recursive: BTreeSet<Role>,
}

/// Implication table plus the set of recursive roles.
///
/// The implication table is stored transitively closed: if `A` implies `B`
/// and `B` implies `C`, then `A` implies `C` even if only the two direct edges
/// were configured.
///
/// # Example
///
/// ```
/// use rolegraph_rbac::{Role, RoleAlgebra};
/// use std::collections::{BTreeMap, BTreeSet};
///
/// // Editor is also inherited in this variant
/// let mut implies = BTreeMap::new();
/// implies.insert(Role::Master, BTreeSet::from([Role::Editor]));
/// implies.insert(Role::Editor, BTreeSet::from([Role::Viewer]));
/// let recursive = BTreeSet::from([Role::Master, Role::Editor]);
///
/// let algebra = RoleAlgebra::new(implies, recursive).unwrap();
/// assert!(algebra.implies(Role::Master, Role::Viewer));
/// assert!(algebra.is_recursive(Role::Editor));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AlgebraDocument", into = "AlgebraDocument")]
pub struct RoleAlgebra {
    implies: BTreeMap<Role, BTreeSet<Role>>,
    recursive: BTreeSet<Role>,
}

impl RoleAlgebra {
    /// Build an algebra from a direct implication table and a recursive set.
    ///
    /// # Errors
    ///
    /// [`AlgebraError::SelfImplication`] if any role lists itself.
    pub fn new(
        implies: BTreeMap<Role, BTreeSet<Role>>,
        recursive: BTreeSet<Role>,
    ) -> Result<Self, AlgebraError> {
        if let Some((role, _)) = implies.iter().find(|(role, set)| set.contains(*role)) {
            return Err(AlgebraError::SelfImplication(*role));
        }

        let mut closed = implies;
        for role in Role::all() {
            closed.entry(role).or_default();
        }

        // Roles are few; iterate to a fixpoint.
        loop {
            let mut changed = false;
            for role in Role::all() {
                let direct: Vec<Role> = closed[&role].iter().copied().collect();
                for implied in direct {
                    let further: Vec<Role> = closed[&implied].iter().copied().collect();
                    let set = closed.entry(role).or_default();
                    for r in further {
                        if r != role && set.insert(r) {
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }

        Ok(Self {
            implies: closed,
            recursive,
        })
    }

    /// The algebra of the reference deployment.
    ///
    /// - `Master` implies `Editor` and `Viewer`
    /// - `Editor` implies `Viewer`
    /// - Only `Master` is recursive
    pub fn standard() -> Self {
        let mut implies = BTreeMap::new();
        implies.insert(Role::Master, BTreeSet::from([Role::Editor, Role::Viewer]));
        implies.insert(Role::Editor, BTreeSet::from([Role::Viewer]));
        implies.insert(Role::Viewer, BTreeSet::new());

        Self {
            implies,
            recursive: BTreeSet::from([Role::Master]),
        }
    }

    /// Parse an algebra from JSON.
    ///
    /// ```json
    /// { "implies": { "master": ["editor"], "editor": ["viewer"] }, "recursive": ["master"] }
    /// ```
    pub fn from_json(s: &str) -> Result<Self, AlgebraError> {
        let document: AlgebraDocument = serde_json::from_str(s)?;
        Self::new(document.implies, document.recursive)
    }

    /// Roles strictly implied by `role` (never includes `role` itself).
    pub fn implied(&self, role: Role) -> &BTreeSet<Role> {
        static EMPTY: BTreeSet<Role> = BTreeSet::new();
        self.implies.get(&role).unwrap_or(&EMPTY)
    }

    /// Check if holding `role` also counts as holding `other`.
    pub fn implies(&self, role: Role, other: Role) -> bool {
        self.implied(role).contains(&other)
    }

    /// `role` together with everything it implies.
    pub fn closure(&self, role: Role) -> BTreeSet<Role> {
        let mut set = self.implied(role).clone();
        set.insert(role);
        set
    }

    /// Union of the closures of `roles`.
    pub fn expand<I>(&self, roles: I) -> BTreeSet<Role>
    where
        I: IntoIterator<Item = Role>,
    {
        let mut set = BTreeSet::new();
        for role in roles {
            set.extend(self.closure(role));
        }
        set
    }

    /// Check if `role` is inherited by descendant targets.
    pub fn is_recursive(&self, role: Role) -> bool {
        self.recursive.contains(&role)
    }

    /// The roles a grant of `role` makes descendants inherit.
    ///
    /// This is `closure(role) ∩ recursive`, so a non-recursive role that
    /// implies a recursive one still reaches descendants through it.
    pub fn inherited_from(&self, role: Role) -> BTreeSet<Role> {
        self.closure(role)
            .into_iter()
            .filter(|r| self.is_recursive(*r))
            .collect()
    }

    /// Check if granting or revoking `role` can affect descendant targets.
    pub fn reaches_descendants(&self, role: Role) -> bool {
        !self.inherited_from(role).is_empty()
    }
}

impl Default for RoleAlgebra {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<AlgebraDocument> for RoleAlgebra {
    type Error = AlgebraError;

    fn try_from(document: AlgebraDocument) -> Result<Self, Self::Error> {
        Self::new(document.implies, document.recursive)
    }
}

impl From<RoleAlgebra> for AlgebraDocument {
    fn from(algebra: RoleAlgebra) -> Self {
        Self {
            implies: algebra.implies,
            recursive: algebra.recursive,
        }
    }
}
