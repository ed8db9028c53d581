//! # Consistency maintenance
//!
//! Keeps the implicit grants equal to the closure of the explicit ones. A
//! fact is in the closure when it is explicit, implied by another fact on the
//! same target, or a recursive role held on the parent target.
//!
//! Two strategies share the same derivation rule:
//!
//! - **Propagation** after a grant only adds rows. It expands the granted role
//!   on its target, then walks the subtree with an explicit stack carrying the
//!   inherited roles down. A descendant that already holds every inherited
//!   role has a closed subtree below it and is skipped.
//! - **Re-derivation** after a revoke or reparent drops the implicit rows of a
//!   region and derives them again, parents before children, from the
//!   remaining explicit rows and the inherited roles of the region's parent.
//!
//! `rebuild_all` is re-derivation with every root as its region.

use rolegraph_rbac::{GrantKey, Grantee, Role, RoleAlgebra, TargetId};
use std::collections::{BTreeMap, BTreeSet};

use crate::store::State;
use crate::txn::Transaction;

/// Ensure every role in `roles` is held by `grantee` on `target`.
fn ensure_all(
    txn: &mut Transaction<'_>,
    target: TargetId,
    grantee: Grantee,
    roles: &BTreeSet<Role>,
) -> usize {
    roles
        .iter()
        .filter(|&&role| txn.ensure_implicit(target, grantee, role))
        .count()
}

/// Derive the implied and inherited rows that follow from a new explicit row.
///
/// Returns the number of implicit rows created.
pub(crate) fn propagate(txn: &mut Transaction<'_>, algebra: &RoleAlgebra, key: GrantKey) -> usize {
    let mut created = ensure_all(txn, key.target, key.grantee, algebra.implied(key.role));

    let inherited = algebra.inherited_from(key.role);
    if inherited.is_empty() {
        return created;
    }
    let expanded = algebra.expand(inherited.iter().copied());

    let mut stack: Vec<TargetId> = txn.state().targets.children(key.target).rev().collect();
    while let Some(current) = stack.pop() {
        let closed = inherited
            .iter()
            .all(|&role| txn.state().grants.contains(current, key.grantee, role));
        if closed {
            continue;
        }

        created += ensure_all(txn, current, key.grantee, &expanded);
        stack.extend(txn.state().targets.children(current).rev());
    }

    tracing::debug!(
        target_id = %key.target,
        grantee = %key.grantee,
        role = %key.role,
        created,
        "Propagated grant"
    );
    created
}

/// Roles each grantee holds on `target` before expansion: its explicit rows
/// plus the recursive roles held on the parent.
fn seeds(state: &State, algebra: &RoleAlgebra, target: TargetId) -> BTreeMap<Grantee, BTreeSet<Role>> {
    let mut held: BTreeMap<Grantee, BTreeSet<Role>> = BTreeMap::new();

    for (grantee, role) in state.grants.explicit_on(target) {
        held.entry(grantee).or_default().insert(role);
    }

    if let Some(parent) = state.targets.parent(target) {
        for grant in state.grants.on_target(parent) {
            if algebra.is_recursive(grant.role) {
                held.entry(grant.grantee).or_default().insert(grant.role);
            }
        }
    }

    held
}

/// Derive the implicit rows of one target, assuming its parent is closed.
fn derive_target(txn: &mut Transaction<'_>, algebra: &RoleAlgebra, target: TargetId) -> usize {
    let held = seeds(txn.state(), algebra, target);
    let mut created = 0;
    for (grantee, roles) in held {
        let expanded = algebra.expand(roles);
        created += ensure_all(txn, target, grantee, &expanded);
    }
    created
}

/// Drop and re-derive the implicit rows of `root`, or of its whole subtree.
///
/// Returns the number of implicit rows present in the region afterwards.
pub(crate) fn rederive(
    txn: &mut Transaction<'_>,
    algebra: &RoleAlgebra,
    root: TargetId,
    include_subtree: bool,
) -> usize {
    let region = if include_subtree {
        txn.state().targets.subtree(root)
    } else {
        vec![root]
    };

    let removed: usize = region.iter().map(|&target| txn.clear_grants(target, false)).sum();
    let created: usize = region
        .iter()
        .map(|&target| derive_target(txn, algebra, target))
        .sum();

    tracing::debug!(
        root = %root,
        region = region.len(),
        removed,
        created,
        "Re-derived implicit grants"
    );
    created
}

/// Derive the rows of a freshly created target from its parent.
pub(crate) fn inherit(txn: &mut Transaction<'_>, algebra: &RoleAlgebra, target: TargetId) -> usize {
    derive_target(txn, algebra, target)
}

/// Drop every implicit row and derive the whole store again.
///
/// Returns the number of implicit rows afterwards.
pub(crate) fn rebuild_all(txn: &mut Transaction<'_>, algebra: &RoleAlgebra) -> usize {
    let order = txn.state().targets.topological();
    for &target in &order {
        txn.clear_grants(target, false);
    }
    order
        .iter()
        .map(|&target| derive_target(txn, algebra, target))
        .sum()
}

/// The store as it would look after `rebuild_all`, computed on a copy.
pub(crate) fn closed_copy(state: &State, algebra: &RoleAlgebra) -> State {
    let mut copy = state.clone();
    let mut txn = Transaction::begin(&mut copy);
    rebuild_all(&mut txn, algebra);
    txn.commit();
    copy
}
