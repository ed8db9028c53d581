//! Read-side queries over the materialized grant store
//!
//! Because the store is always closed, every question is a direct lookup.
//! Nothing here walks the tree.

use rolegraph_rbac::{Role, Subject, TargetId};
use std::collections::BTreeSet;

use crate::store::State;

/// An object whose permissions are governed by a target.
///
/// Domain objects implement this to be filtered with
/// [`PermissionEngine::filter_with_role`](crate::PermissionEngine::filter_with_role).
///
/// # Example
///
/// ```
/// use rolegraph_engine::Governed;
/// use rolegraph_rbac::TargetId;
///
/// struct Article {
///     title: String,
///     target: TargetId,
/// }
///
/// impl Governed for Article {
///     fn governing_target(&self) -> TargetId {
///         self.target
///     }
/// }
/// ```
pub trait Governed {
    /// The target that holds this object's grants.
    fn governing_target(&self) -> TargetId;
}

impl Governed for TargetId {
    fn governing_target(&self) -> TargetId {
        *self
    }
}

impl<T: Governed + ?Sized> Governed for &T {
    fn governing_target(&self) -> TargetId {
        (**self).governing_target()
    }
}

impl<T: Governed + ?Sized> Governed for Box<T> {
    fn governing_target(&self) -> TargetId {
        (**self).governing_target()
    }
}

/// Check a single fact for a caller.
pub(crate) fn has_role(state: &State, target: TargetId, subject: &Subject, role: Role) -> bool {
    if subject.is_superuser() {
        return true;
    }
    subject
        .grantees()
        .into_iter()
        .any(|grantee| state.grants.contains(target, grantee, role))
}

/// Keep the candidates the caller holds `role` on, in their original order.
pub(crate) fn filter_with_role<I>(state: &State, candidates: I, subject: &Subject, role: Role) -> Vec<I::Item>
where
    I: IntoIterator,
    I::Item: Governed,
{
    if subject.is_superuser() {
        return candidates.into_iter().collect();
    }
    candidates
        .into_iter()
        .filter(|candidate| has_role(state, candidate.governing_target(), subject, role))
        .collect()
}

/// Every target the caller holds `role` on.
pub(crate) fn targets_with_role(state: &State, subject: &Subject, role: Role) -> BTreeSet<TargetId> {
    if subject.is_superuser() {
        return state.targets.ids().collect();
    }
    subject
        .grantees()
        .into_iter()
        .flat_map(|grantee| state.grants.targets_with(grantee, role))
        .collect()
}

/// Every role the caller holds on a target.
pub(crate) fn roles_on(state: &State, target: TargetId, subject: &Subject) -> BTreeSet<Role> {
    if subject.is_superuser() {
        return Role::all().into_iter().collect();
    }
    subject
        .grantees()
        .into_iter()
        .flat_map(|grantee| state.grants.roles_of(target, grantee))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::Transaction;
    use rolegraph_rbac::{GrantKey, Grantee, UserId};

    fn state_with(rows: &[(TargetId, Grantee, Role)]) -> State {
        let mut state = State::default();
        let mut txn = Transaction::begin(&mut state);
        for &(target, grantee, role) in rows {
            if !txn.state().targets.contains(target) {
                txn.insert_target(target, None);
            }
            txn.put_grant(GrantKey::new(target, grantee, role), true);
        }
        txn.commit();
        state
    }

    #[test]
    fn test_has_role_by_subject() {
        let target = TargetId::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let state = state_with(&[
            (target, Grantee::User(alice), Role::Editor),
            (target, Grantee::Public, Role::Viewer),
        ]);

        assert!(has_role(&state, target, &Subject::User(alice), Role::Editor));
        assert!(!has_role(&state, target, &Subject::User(bob), Role::Editor));
        assert!(has_role(&state, target, &Subject::User(bob), Role::Viewer));
        assert!(has_role(&state, target, &Subject::Public, Role::Viewer));
        assert!(!has_role(&state, target, &Subject::Public, Role::Editor));
        assert!(has_role(&state, target, &Subject::Superuser, Role::Master));
    }

    #[test]
    fn test_unknown_target() {
        let state = State::default();
        let target = TargetId::new();

        assert!(!has_role(&state, target, &Subject::Public, Role::Viewer));
        assert!(has_role(&state, target, &Subject::Superuser, Role::Viewer));
    }

    #[test]
    fn test_filter_preserves_order_without_duplicates() {
        let a = TargetId::new();
        let b = TargetId::new();
        let c = TargetId::new();
        let alice = UserId::new();
        let state = state_with(&[
            (a, Grantee::User(alice), Role::Viewer),
            (a, Grantee::Public, Role::Viewer),
            (c, Grantee::Public, Role::Viewer),
            (b, Grantee::User(UserId::new()), Role::Viewer),
        ]);

        let visible = filter_with_role(&state, vec![c, b, a], &Subject::User(alice), Role::Viewer);
        assert_eq!(visible, vec![c, a]);

        let all = filter_with_role(&state, vec![c, b, a], &Subject::Superuser, Role::Master);
        assert_eq!(all, vec![c, b, a]);
    }

    #[test]
    fn test_targets_with_role_and_roles_on() {
        let a = TargetId::new();
        let b = TargetId::new();
        let alice = UserId::new();
        let state = state_with(&[
            (a, Grantee::User(alice), Role::Editor),
            (b, Grantee::Public, Role::Editor),
            (b, Grantee::Public, Role::Viewer),
        ]);

        assert_eq!(
            targets_with_role(&state, &Subject::User(alice), Role::Editor),
            BTreeSet::from([a, b])
        );
        assert_eq!(
            targets_with_role(&state, &Subject::Public, Role::Editor),
            BTreeSet::from([b])
        );
        assert_eq!(targets_with_role(&state, &Subject::Superuser, Role::Master).len(), 2);

        assert_eq!(
            roles_on(&state, b, &Subject::User(alice)),
            BTreeSet::from([Role::Editor, Role::Viewer])
        );
        assert_eq!(roles_on(&state, a, &Subject::Superuser).len(), 3);
    }
}
