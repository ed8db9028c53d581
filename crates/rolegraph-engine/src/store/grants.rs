//! Grant store
//!
//! Rows are keyed by `(target, grantee, role)` and carry only the explicit
//! flag. Because `Grantee` is a non-nullable sum type, public rows and user
//! rows live in disjoint key spaces and the two uniqueness rules reduce to
//! map-key uniqueness.
//!
//! A secondary index by `(grantee, role)` serves set-filter queries without
//! scanning every target.

use rolegraph_rbac::{Grant, GrantKey, Grantee, Role, TargetId};
use std::collections::{BTreeMap, BTreeSet};

type Rows = BTreeMap<(Grantee, Role), bool>;

/// Materialized grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantStore {
    rows: BTreeMap<TargetId, Rows>,
    by_grantee: BTreeMap<(Grantee, Role), BTreeSet<TargetId>>,
    len: usize,
}

impl GrantStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The explicit flag of a row, if it exists.
    pub fn get(&self, key: &GrantKey) -> Option<bool> {
        self.rows
            .get(&key.target)
            .and_then(|rows| rows.get(&(key.grantee, key.role)))
            .copied()
    }

    /// Check if a row exists.
    pub fn contains(&self, target: TargetId, grantee: Grantee, role: Role) -> bool {
        self.rows
            .get(&target)
            .is_some_and(|rows| rows.contains_key(&(grantee, role)))
    }

    /// Look up a full row.
    pub fn record(&self, key: &GrantKey) -> Option<Grant> {
        self.get(key).map(|explicit| Grant::from_key(*key, explicit))
    }

    /// Rows on one target, ordered by grantee then role.
    pub fn on_target(&self, target: TargetId) -> impl Iterator<Item = Grant> + '_ {
        self.rows.get(&target).into_iter().flat_map(move |rows| {
            rows.iter().map(move |(&(grantee, role), &explicit)| Grant {
                target,
                grantee,
                role,
                explicit,
            })
        })
    }

    /// Explicit `(grantee, role)` pairs on one target.
    pub fn explicit_on(&self, target: TargetId) -> Vec<(Grantee, Role)> {
        self.on_target(target)
            .filter(|grant| grant.explicit)
            .map(|grant| (grant.grantee, grant.role))
            .collect()
    }

    /// Roles a grantee holds on a target, explicit or not.
    pub fn roles_of(&self, target: TargetId, grantee: Grantee) -> BTreeSet<Role> {
        self.on_target(target)
            .filter(|grant| grant.grantee == grantee)
            .map(|grant| grant.role)
            .collect()
    }

    /// Targets on which a grantee holds a role.
    pub fn targets_with(&self, grantee: Grantee, role: Role) -> impl Iterator<Item = TargetId> + '_ {
        self.by_grantee
            .get(&(grantee, role))
            .into_iter()
            .flat_map(|targets| targets.iter().copied())
    }

    /// Every row, ordered by target, grantee, role.
    pub fn iter(&self) -> impl Iterator<Item = Grant> + '_ {
        self.rows.keys().flat_map(move |&target| self.on_target(target))
    }

    /// Number of implicit rows.
    pub fn implicit_count(&self) -> usize {
        self.iter().filter(Grant::is_implicit).count()
    }

    /// Insert or overwrite a row, returning the previous explicit flag.
    pub(crate) fn insert(&mut self, key: GrantKey, explicit: bool) -> Option<bool> {
        let previous = self
            .rows
            .entry(key.target)
            .or_default()
            .insert((key.grantee, key.role), explicit);
        if previous.is_none() {
            self.len += 1;
            self.by_grantee
                .entry((key.grantee, key.role))
                .or_default()
                .insert(key.target);
        }
        previous
    }

    /// Remove a row, returning its explicit flag.
    pub(crate) fn remove(&mut self, key: &GrantKey) -> Option<bool> {
        let rows = self.rows.get_mut(&key.target)?;
        let removed = rows.remove(&(key.grantee, key.role))?;
        if rows.is_empty() {
            self.rows.remove(&key.target);
        }

        self.len -= 1;
        let index_key = (key.grantee, key.role);
        if let Some(targets) = self.by_grantee.get_mut(&index_key) {
            targets.remove(&key.target);
            if targets.is_empty() {
                self.by_grantee.remove(&index_key);
            }
        }
        Some(removed)
    }
}
