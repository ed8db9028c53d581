//! # Permission Engine
//!
//! The entry point of the crate. A [`PermissionEngine`] owns the target and
//! grant stores and is the only way to change them.
//!
//! ## Mutations
//!
//! Every mutating call takes the write lock, runs its whole cascade inside
//! one journaled transaction, and either commits or leaves the stores
//! exactly as they were. Change events are published after the lock is
//! released and only for committed work. Each commit is numbered while the
//! lock is still held, and its events carry that number, so subscribers can
//! restore commit order when concurrent publishers interleave.
//!
//! ## Queries
//!
//! Queries take the read lock and answer from the materialized grants with
//! direct lookups. They never observe a half-applied cascade.

use parking_lot::RwLock;
use rolegraph_events::{EventBus, EventBusError, EventBusResult, MemoryEventBus, PermissionEvent, Subscription};
use rolegraph_rbac::{Grant, GrantKey, Grantee, OwnerId, Role, RoleAlgebra, Subject, TargetId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::consistency;
use crate::error::{EngineError, EngineResult};
use crate::query::{self, Governed};
use crate::snapshot::{ConsistencyReport, Snapshot};
use crate::store::State;
use crate::txn::Transaction;

/// What happened to a target when one of its owners let go of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Nothing referenced the target anymore, so it was deleted with its subtree
    Deleted,
    /// The owner did not reference the target, or the target or a target
    /// below it is still referenced
    Retained,
}

/// Hierarchical permission engine.
///
/// # Example
///
/// ```
/// use rolegraph_engine::PermissionEngine;
/// use rolegraph_rbac::{Role, Subject, UserId};
///
/// let engine = PermissionEngine::default();
/// let world = engine.create_target(None).unwrap();
/// let article = engine.create_target(Some(world)).unwrap();
///
/// let alice = Subject::User(UserId::new());
/// engine.grant(world, alice, Role::Master).unwrap();
///
/// // Master is inherited by the article and implies editor there
/// assert!(engine.has_role(article, alice, Role::Editor));
/// assert!(!engine.has_role(article, Subject::Public, Role::Viewer));
/// ```
pub struct PermissionEngine {
    algebra: RoleAlgebra,
    config: EngineConfig,
    state: RwLock<State>,
    events: Option<Arc<dyn EventBus>>,
    commits: AtomicU64,
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine")
            .field("algebra", &self.algebra)
            .field("config", &self.config)
            .field("publishes_events", &self.events.is_some())
            .finish()
    }
}

impl Default for PermissionEngine {
    fn default() -> Self {
        Self::new(RoleAlgebra::standard())
    }
}

impl PermissionEngine {
    /// Create an empty engine with the default configuration.
    pub fn new(algebra: RoleAlgebra) -> Self {
        Self::with_config(algebra, EngineConfig::default())
    }

    /// Create an empty engine.
    ///
    /// An in-memory event bus is attached when `publish_events` is set.
    pub fn with_config(algebra: RoleAlgebra, config: EngineConfig) -> Self {
        Self::with_state(algebra, config, State::default())
    }

    /// Create an empty engine, loading the algebra the configuration names.
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let algebra = config.load_algebra()?;
        Ok(Self::with_config(algebra, config))
    }

    /// Restore an engine from a snapshot.
    ///
    /// The hierarchy is validated and implicit grants are derived again. With
    /// `verify_on_load`, a snapshot whose implicit grants differ from that
    /// derivation is rejected.
    pub fn from_snapshot(algebra: RoleAlgebra, config: EngineConfig, snapshot: &Snapshot) -> EngineResult<Self> {
        let state = snapshot.restore(&algebra, config.verify_on_load)?;
        debug!(
            targets = state.targets.len(),
            grants = state.grants.len(),
            "Restored engine from snapshot"
        );
        Ok(Self::with_state(algebra, config, state))
    }

    fn with_state(algebra: RoleAlgebra, config: EngineConfig, state: State) -> Self {
        let events: Option<Arc<dyn EventBus>> = if config.publish_events {
            Some(Arc::new(MemoryEventBus::with_capacity(config.event_capacity)))
        } else {
            None
        };
        Self {
            algebra,
            config,
            state: RwLock::new(state),
            events,
            commits: AtomicU64::new(0),
        }
    }

    /// Replace the event bus.
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// The role algebra in use.
    pub fn algebra(&self) -> &RoleAlgebra {
        &self.algebra
    }

    /// The configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The bus committed changes are published on.
    pub fn event_bus(&self) -> Option<&Arc<dyn EventBus>> {
        self.events.as_ref()
    }

    /// Subscribe to change events by topic pattern.
    pub fn subscribe(&self, pattern: &str) -> EventBusResult<Subscription> {
        match &self.events {
            Some(bus) => bus.subscribe(pattern),
            None => Err(EventBusError::SubscribeError(
                "event publishing is disabled".to_string(),
            )),
        }
    }

    // =========================================================================
    // Targets
    // =========================================================================

    /// Create a target, optionally under a parent.
    ///
    /// The new target immediately inherits the recursive roles held on its
    /// parent.
    ///
    /// # Errors
    ///
    /// [`EngineError::ParentNotFound`] if `parent` does not exist.
    #[instrument(skip(self))]
    pub fn create_target(&self, parent: Option<TargetId>) -> EngineResult<TargetId> {
        self.transact(|txn, algebra| create_in(txn, algebra, parent))
    }

    /// Create a target and attach its first owner in one step.
    #[instrument(skip(self))]
    pub fn create_target_for(&self, owner: OwnerId, parent: Option<TargetId>) -> EngineResult<TargetId> {
        self.transact(|txn, algebra| {
            let target = create_in(txn, algebra, parent)?;
            txn.attach_owner(target, owner);
            txn.emit(PermissionEvent::OwnerAttached { target, owner });
            Ok(target)
        })
    }

    /// Delete a target, its subtree, and every grant on them.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TargetNotFound`] if `id` does not exist
    /// - [`EngineError::TargetInUse`] if any target in the subtree still has
    ///   an owner
    #[instrument(skip(self))]
    pub fn delete_target(&self, id: TargetId) -> EngineResult<()> {
        self.transact(|txn, _| delete_in(txn, id))
    }

    /// Move a target under a new parent, or make it a root.
    ///
    /// Every implicit grant in the moved subtree is derived again from the new
    /// ancestry.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TargetNotFound`] if `id` does not exist
    /// - [`EngineError::ParentNotFound`] if `new_parent` does not exist
    /// - [`EngineError::CycleDetected`] if `new_parent` is `id` or below it
    #[instrument(skip(self))]
    pub fn reparent_target(&self, id: TargetId, new_parent: Option<TargetId>) -> EngineResult<()> {
        self.transact(|txn, algebra| {
            let targets = &txn.state().targets;
            if !targets.contains(id) {
                return Err(EngineError::TargetNotFound(id));
            }
            if let Some(parent) = new_parent {
                if !targets.contains(parent) {
                    return Err(EngineError::ParentNotFound(parent));
                }
                if targets.is_ancestor_or_self(id, parent) {
                    warn!(target_id = %id, parent = %parent, "Rejected cyclic reparent");
                    return Err(EngineError::CycleDetected { target: id, parent });
                }
            }

            let old_parent = targets.parent(id);
            if old_parent == new_parent {
                return Ok(());
            }

            txn.set_parent(id, new_parent);
            consistency::rederive(txn, algebra, id, true);
            txn.emit(PermissionEvent::TargetReparented {
                target: id,
                old_parent,
                new_parent,
            });
            Ok(())
        })
    }

    /// Check if a target exists.
    pub fn contains_target(&self, id: TargetId) -> bool {
        self.state.read().targets.contains(id)
    }

    /// Parent of a target.
    pub fn parent_of(&self, id: TargetId) -> Option<TargetId> {
        self.state.read().targets.parent(id)
    }

    /// Direct children of a target, in id order.
    pub fn children_of(&self, id: TargetId) -> Vec<TargetId> {
        self.state.read().targets.children(id).collect()
    }

    /// The subtree rooted at a target, parents before children.
    pub fn subtree(&self, id: TargetId) -> Vec<TargetId> {
        self.state.read().targets.subtree(id)
    }

    /// Number of targets.
    pub fn target_count(&self) -> usize {
        self.state.read().targets.len()
    }

    // =========================================================================
    // Owners
    // =========================================================================

    /// Record that `owner` is governed by `target`.
    ///
    /// Returns false if it already was.
    #[instrument(skip(self))]
    pub fn attach_owner(&self, target: TargetId, owner: OwnerId) -> EngineResult<bool> {
        self.transact(|txn, _| {
            require_target(txn, target)?;
            let attached = txn.attach_owner(target, owner);
            if attached {
                txn.emit(PermissionEvent::OwnerAttached { target, owner });
            }
            Ok(attached)
        })
    }

    /// Record that `owner` no longer references `target`. The target stays.
    ///
    /// Returns false if it was not attached.
    #[instrument(skip(self))]
    pub fn detach_owner(&self, target: TargetId, owner: OwnerId) -> EngineResult<bool> {
        self.transact(|txn, _| {
            require_target(txn, target)?;
            Ok(detach_in(txn, target, owner))
        })
    }

    /// Detach an owner and delete the target once nothing references it.
    ///
    /// A target still referenced by another owner, or with a referenced
    /// target somewhere below it, is retained rather than reported as an
    /// error. An owner that was not attached releases nothing.
    #[instrument(skip(self))]
    pub fn release_owner(&self, target: TargetId, owner: OwnerId) -> EngineResult<ReleaseOutcome> {
        self.transact(|txn, _| {
            require_target(txn, target)?;
            if !detach_in(txn, target, owner) {
                debug!(target_id = %target, owner = %owner, "Owner was not attached");
                return Ok(ReleaseOutcome::Retained);
            }

            match delete_in(txn, target) {
                Ok(()) => Ok(ReleaseOutcome::Deleted),
                Err(EngineError::TargetInUse { target: held, owners }) => {
                    debug!(target_id = %target, held = %held, owners, "Target still referenced");
                    Ok(ReleaseOutcome::Retained)
                }
                Err(e) => Err(e),
            }
        })
    }

    /// Owners of a target. Empty for unknown targets.
    pub fn owners(&self, target: TargetId) -> Vec<OwnerId> {
        self.state
            .read()
            .targets
            .owners(target)
            .map(|owners| owners.iter().copied().collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // Grants
    // =========================================================================

    /// Grant `role` on `target` explicitly.
    ///
    /// Granting a fact that is already explicit does nothing. Granting a fact
    /// that is currently implicit promotes the row; the closure is unchanged.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SuperuserGrant`] if `subject` is the superuser
    /// - [`EngineError::TargetNotFound`] if `target` does not exist
    #[instrument(skip(self))]
    pub fn grant(&self, target: TargetId, subject: Subject, role: Role) -> EngineResult<()> {
        let key = GrantKey::new(target, Grantee::try_from(subject)?, role);
        self.transact(|txn, algebra| grant_in(txn, algebra, key))
    }

    /// Revoke an explicit grant and re-derive what depended on it.
    ///
    /// Revoking a fact that is not stored does nothing. If the fact is still
    /// implied by something else it survives as an implicit row.
    ///
    /// # Errors
    ///
    /// - [`EngineError::SuperuserGrant`] if `subject` is the superuser
    /// - [`EngineError::TargetNotFound`] if `target` does not exist
    /// - [`EngineError::ImmutableRecord`] if the stored row is implicit
    #[instrument(skip(self))]
    pub fn revoke(&self, target: TargetId, subject: Subject, role: Role) -> EngineResult<()> {
        let key = GrantKey::new(target, Grantee::try_from(subject)?, role);
        self.transact(|txn, algebra| revoke_in(txn, algebra, key))
    }

    /// Store a grant row as given.
    ///
    /// Only explicit rows may be saved. Saving an explicit row over an
    /// implicit one promotes it.
    ///
    /// # Errors
    ///
    /// [`EngineError::ImmutableRecord`] if `grant.explicit` is false.
    #[instrument(skip(self))]
    pub fn save_grant(&self, grant: &Grant) -> EngineResult<()> {
        let key = grant.key();
        if grant.is_implicit() {
            warn!(grant = %key, "Rejected save of implicit grant");
            return Err(EngineError::ImmutableRecord(key));
        }
        self.transact(|txn, algebra| grant_in(txn, algebra, key))
    }

    /// Delete a grant row.
    ///
    /// # Errors
    ///
    /// [`EngineError::ImmutableRecord`] if the stored row is implicit.
    #[instrument(skip(self))]
    pub fn delete_grant(&self, grant: &Grant) -> EngineResult<()> {
        let key = grant.key();
        self.transact(|txn, algebra| revoke_in(txn, algebra, key))
    }

    /// Look up a stored row.
    pub fn grant_record(&self, target: TargetId, grantee: Grantee, role: Role) -> Option<Grant> {
        self.state
            .read()
            .grants
            .record(&GrantKey::new(target, grantee, role))
    }

    /// Every row on a target, explicit and implicit.
    pub fn grants_on(&self, target: TargetId) -> Vec<Grant> {
        self.state.read().grants.on_target(target).collect()
    }

    /// Total number of rows.
    pub fn grant_count(&self) -> usize {
        self.state.read().grants.len()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Check if `subject` holds `role` on `target`.
    ///
    /// The superuser holds every role everywhere. Anyone else holds a role if
    /// a row exists for them or for the public. Unknown targets grant nothing.
    pub fn has_role(&self, target: TargetId, subject: Subject, role: Role) -> bool {
        query::has_role(&self.state.read(), target, &subject, role)
    }

    /// Check for [`Role::Master`].
    pub fn is_master(&self, target: TargetId, subject: Subject) -> bool {
        self.has_role(target, subject, Role::Master)
    }

    /// Check for [`Role::Editor`].
    pub fn is_editor(&self, target: TargetId, subject: Subject) -> bool {
        self.has_role(target, subject, Role::Editor)
    }

    /// Check for [`Role::Viewer`].
    pub fn is_viewer(&self, target: TargetId, subject: Subject) -> bool {
        self.has_role(target, subject, Role::Viewer)
    }

    /// Keep the candidates on whose target `subject` holds `role`.
    ///
    /// Candidate order is preserved and no candidate appears twice, even when
    /// both a user row and a public row match.
    pub fn filter_with_role<I>(&self, candidates: I, subject: Subject, role: Role) -> Vec<I::Item>
    where
        I: IntoIterator,
        I::Item: Governed,
    {
        query::filter_with_role(&self.state.read(), candidates, &subject, role)
    }

    /// Candidates `subject` is master of.
    pub fn mastered_by<I>(&self, candidates: I, subject: Subject) -> Vec<I::Item>
    where
        I: IntoIterator,
        I::Item: Governed,
    {
        self.filter_with_role(candidates, subject, Role::Master)
    }

    /// Candidates `subject` may edit.
    pub fn editable_by<I>(&self, candidates: I, subject: Subject) -> Vec<I::Item>
    where
        I: IntoIterator,
        I::Item: Governed,
    {
        self.filter_with_role(candidates, subject, Role::Editor)
    }

    /// Candidates `subject` may view.
    pub fn visible_to<I>(&self, candidates: I, subject: Subject) -> Vec<I::Item>
    where
        I: IntoIterator,
        I::Item: Governed,
    {
        self.filter_with_role(candidates, subject, Role::Viewer)
    }

    /// Every target `subject` holds `role` on.
    pub fn targets_with_role(&self, subject: Subject, role: Role) -> BTreeSet<TargetId> {
        query::targets_with_role(&self.state.read(), &subject, role)
    }

    /// Every role `subject` holds on `target`.
    pub fn roles_on(&self, target: TargetId, subject: Subject) -> BTreeSet<Role> {
        query::roles_on(&self.state.read(), target, &subject)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Drop every implicit grant and derive them all again, ancestors first.
    ///
    /// Returns the number of implicit grants afterwards. On a consistent store
    /// this changes nothing.
    #[instrument(skip(self))]
    pub fn rebuild_all(&self) -> usize {
        let (count, events) = {
            let mut state = self.state.write();
            let mut txn = Transaction::begin(&mut state);
            let count = consistency::rebuild_all(&mut txn, &self.algebra);
            txn.emit(PermissionEvent::GrantsRebuilt { implicit_grants: count });
            (count, txn.commit())
        };
        debug!(implicit_grants = count, "Rebuilt implicit grants");
        self.publish(events);
        count
    }

    /// Compare the store against a from-scratch derivation without changing it.
    pub fn verify(&self) -> ConsistencyReport {
        let state = self.state.read();
        let expected = consistency::closed_copy(&state, &self.algebra);
        let report = ConsistencyReport::compare(&state, &expected);
        if !report.is_consistent() {
            warn!(
                missing = report.missing.len(),
                extraneous = report.extraneous.len(),
                "Grant store differs from its derivation"
            );
        }
        report
    }

    /// Capture the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.state.read())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Run `f` as one transaction under the write lock, then publish.
    fn transact<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Transaction<'_>, &RoleAlgebra) -> EngineResult<T>,
    {
        let (value, events, sequence) = {
            let mut state = self.state.write();
            let mut txn = Transaction::begin(&mut state);
            let value = f(&mut txn, &self.algebra)?;
            let events = txn.commit();
            // Numbered under the lock so the order matches commit order
            let sequence = self.commits.fetch_add(1, Ordering::Relaxed) + 1;
            (value, events, sequence)
        };
        self.publish(events, sequence);
        Ok(value)
    }

    fn publish(&self, events: Vec<PermissionEvent>, sequence: u64) {
        let Some(bus) = &self.events else {
            return;
        };
        for event in events {
            let envelope = event
                .to_event()
                .with_source(self.config.event_source.as_str())
                .with_sequence(sequence);
            if let Err(e) = bus.publish(envelope) {
                warn!(error = %e, event_type = event.event_type(), "Failed to publish event");
            }
        }
    }
}

fn require_target(txn: &Transaction<'_>, target: TargetId) -> EngineResult<()> {
    if txn.state().targets.contains(target) {
        Ok(())
    } else {
        Err(EngineError::TargetNotFound(target))
    }
}

fn create_in(txn: &mut Transaction<'_>, algebra: &RoleAlgebra, parent: Option<TargetId>) -> EngineResult<TargetId> {
    if let Some(parent) = parent {
        if !txn.state().targets.contains(parent) {
            return Err(EngineError::ParentNotFound(parent));
        }
    }

    let target = TargetId::new();
    txn.insert_target(target, parent);
    let inherited = consistency::inherit(txn, algebra, target);
    txn.emit(PermissionEvent::TargetCreated { target, parent });

    debug!(target_id = %target, inherited, "Created target");
    Ok(target)
}

fn delete_in(txn: &mut Transaction<'_>, target: TargetId) -> EngineResult<()> {
    require_target(txn, target)?;

    let removed = txn.state().targets.subtree(target);
    for &id in &removed {
        let owners = txn.state().targets.owners(id).map_or(0, |owners| owners.len());
        if owners > 0 {
            return Err(EngineError::TargetInUse { target: id, owners });
        }
    }

    // Pre-order reversed puts every target after its descendants
    let mut grants_removed = 0;
    for &id in removed.iter().rev() {
        grants_removed += txn.clear_grants(id, true);
        txn.remove_target(id);
    }

    debug!(
        target_id = %target,
        targets = removed.len(),
        grants_removed,
        "Deleted subtree"
    );
    txn.emit(PermissionEvent::TargetDeleted {
        target,
        removed,
        grants_removed,
    });
    Ok(())
}

fn detach_in(txn: &mut Transaction<'_>, target: TargetId, owner: OwnerId) -> bool {
    let detached = txn.detach_owner(target, owner);
    if detached {
        txn.emit(PermissionEvent::OwnerDetached { target, owner });
    }
    detached
}

fn grant_in(txn: &mut Transaction<'_>, algebra: &RoleAlgebra, key: GrantKey) -> EngineResult<()> {
    require_target(txn, key.target)?;

    match txn.put_grant(key, true) {
        Some(true) => {}
        Some(false) => txn.emit(PermissionEvent::GrantPromoted {
            target: key.target,
            grantee: key.grantee,
            role: key.role,
        }),
        None => {
            consistency::propagate(txn, algebra, key);
            txn.emit(PermissionEvent::GrantCreated {
                target: key.target,
                grantee: key.grantee,
                role: key.role,
            });
        }
    }
    Ok(())
}

fn revoke_in(txn: &mut Transaction<'_>, algebra: &RoleAlgebra, key: GrantKey) -> EngineResult<()> {
    require_target(txn, key.target)?;

    match txn.state().grants.get(&key) {
        None => Ok(()),
        Some(false) => {
            warn!(grant = %key, "Rejected revoke of implicit grant");
            Err(EngineError::ImmutableRecord(key))
        }
        Some(true) => {
            txn.remove_grant(&key);
            consistency::rederive(txn, algebra, key.target, algebra.reaches_descendants(key.role));
            txn.emit(PermissionEvent::GrantRevoked {
                target: key.target,
                grantee: key.grantee,
                role: key.role,
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegraph_rbac::UserId;

    fn engine() -> PermissionEngine {
        PermissionEngine::default()
    }

    #[test]
    fn test_create_requires_parent() {
        let engine = engine();
        let missing = TargetId::new();

        let err = engine.create_target(Some(missing)).unwrap_err();
        assert!(matches!(err, EngineError::ParentNotFound(id) if id == missing));
        assert_eq!(engine.target_count(), 0);
    }

    #[test]
    fn test_new_child_inherits_master() {
        let engine = engine();
        let alice = Subject::User(UserId::new());
        let root = engine.create_target(None).unwrap();
        engine.grant(root, alice, Role::Master).unwrap();

        let child = engine.create_target(Some(root)).unwrap();
        assert!(engine.is_master(child, alice));
        assert!(engine.verify().is_consistent());
    }

    #[test]
    fn test_grant_to_superuser_is_rejected() {
        let engine = engine();
        let root = engine.create_target(None).unwrap();

        let err = engine.grant(root, Subject::Superuser, Role::Viewer).unwrap_err();
        assert!(matches!(err, EngineError::SuperuserGrant));
        assert_eq!(engine.grant_count(), 0);
    }

    #[test]
    fn test_grant_on_unknown_target() {
        let engine = engine();
        let err = engine
            .grant(TargetId::new(), Subject::Public, Role::Viewer)
            .unwrap_err();
        assert_eq!(err.error_code(), "TARGET_NOT_FOUND");
    }

    #[test]
    fn test_grant_promotes_implicit_row() {
        let engine = engine();
        let alice = Subject::User(UserId::new());
        let grantee = Grantee::try_from(alice).unwrap();
        let root = engine.create_target(None).unwrap();

        engine.grant(root, alice, Role::Master).unwrap();
        assert!(engine.grant_record(root, grantee, Role::Viewer).unwrap().is_implicit());

        engine.grant(root, alice, Role::Viewer).unwrap();
        assert!(engine.grant_record(root, grantee, Role::Viewer).unwrap().explicit);
        assert_eq!(engine.grant_count(), 3);

        // Viewer is explicit now and survives the master revoke
        engine.revoke(root, alice, Role::Master).unwrap();
        assert_eq!(engine.roles_on(root, alice), BTreeSet::from([Role::Viewer]));
    }

    #[test]
    fn test_revoked_viewer_survives_as_implicit() {
        let engine = engine();
        let alice = Subject::User(UserId::new());
        let grantee = Grantee::try_from(alice).unwrap();
        let root = engine.create_target(None).unwrap();

        engine.grant(root, alice, Role::Viewer).unwrap();
        engine.grant(root, alice, Role::Editor).unwrap();
        engine.revoke(root, alice, Role::Viewer).unwrap();

        let viewer = engine.grant_record(root, grantee, Role::Viewer).unwrap();
        assert!(viewer.is_implicit());
        assert!(engine.is_viewer(root, alice));
    }

    #[test]
    fn test_revoke_implicit_is_rejected() {
        let engine = engine();
        let alice = Subject::User(UserId::new());
        let root = engine.create_target(None).unwrap();
        engine.grant(root, alice, Role::Master).unwrap();
        let before = engine.snapshot();

        let err = engine.revoke(root, alice, Role::Editor).unwrap_err();
        assert!(matches!(err, EngineError::ImmutableRecord(_)));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_reparent_rejects_cycles() {
        let engine = engine();
        let root = engine.create_target(None).unwrap();
        let child = engine.create_target(Some(root)).unwrap();
        let grandchild = engine.create_target(Some(child)).unwrap();

        assert!(matches!(
            engine.reparent_target(root, Some(grandchild)),
            Err(EngineError::CycleDetected { .. })
        ));
        assert!(matches!(
            engine.reparent_target(root, Some(root)),
            Err(EngineError::CycleDetected { .. })
        ));
        assert!(matches!(
            engine.reparent_target(child, Some(TargetId::new())),
            Err(EngineError::ParentNotFound(_))
        ));
        assert_eq!(engine.parent_of(grandchild), Some(child));
    }

    #[test]
    fn test_delete_refuses_owned_descendant() {
        let engine = engine();
        let root = engine.create_target(None).unwrap();
        let owner = OwnerId::new();
        let child = engine.create_target_for(owner, Some(root)).unwrap();

        let err = engine.delete_target(root).unwrap_err();
        assert!(matches!(err, EngineError::TargetInUse { target, owners: 1 } if target == child));
        assert_eq!(err.status_code(), 409);
        assert_eq!(engine.target_count(), 2);
    }

    #[test]
    fn test_release_owner() {
        let engine = engine();
        let world = OwnerId::new();
        let article = OwnerId::new();
        let target = engine.create_target_for(world, None).unwrap();
        engine.attach_owner(target, article).unwrap();

        assert_eq!(engine.release_owner(target, world).unwrap(), ReleaseOutcome::Retained);
        assert!(engine.contains_target(target));
        assert_eq!(engine.owners(target), vec![article]);

        assert_eq!(engine.release_owner(target, article).unwrap(), ReleaseOutcome::Deleted);
        assert!(!engine.contains_target(target));
    }

    #[test]
    fn test_release_by_unattached_owner_deletes_nothing() {
        let engine = engine();
        let alice = Subject::User(UserId::new());
        let root = engine.create_target(None).unwrap();
        let child = engine.create_target(Some(root)).unwrap();
        engine.grant(root, alice, Role::Master).unwrap();
        let before = engine.snapshot();

        // Neither an owner-less target nor an owned one is released by a stranger
        assert_eq!(engine.release_owner(root, OwnerId::new()).unwrap(), ReleaseOutcome::Retained);
        assert_eq!(engine.snapshot(), before);
        assert!(engine.is_master(child, alice));

        let owner = OwnerId::new();
        engine.attach_owner(child, owner).unwrap();
        assert_eq!(engine.release_owner(child, OwnerId::new()).unwrap(), ReleaseOutcome::Retained);
        assert_eq!(engine.owners(child), vec![owner]);
    }

    #[test]
    fn test_save_and_delete_grant_records() {
        let engine = engine();
        let alice = Subject::User(UserId::new());
        let grantee = Grantee::try_from(alice).unwrap();
        let root = engine.create_target(None).unwrap();
        engine.grant(root, alice, Role::Master).unwrap();

        let mut editor = engine.grant_record(root, grantee, Role::Editor).unwrap();
        assert!(matches!(
            engine.save_grant(&editor),
            Err(EngineError::ImmutableRecord(_))
        ));
        assert!(matches!(
            engine.delete_grant(&editor),
            Err(EngineError::ImmutableRecord(_))
        ));

        editor.promote();
        engine.save_grant(&editor).unwrap();
        assert!(engine.grant_record(root, grantee, Role::Editor).unwrap().explicit);

        engine.delete_grant(&editor).unwrap();
        assert!(engine.grant_record(root, grantee, Role::Editor).unwrap().is_implicit());
    }

    #[test]
    fn test_disabled_events() {
        let config = EngineConfig {
            publish_events: false,
            ..EngineConfig::default()
        };
        let engine = PermissionEngine::with_config(RoleAlgebra::standard(), config);

        assert!(engine.event_bus().is_none());
        assert!(engine.subscribe("#").is_err());
        assert!(engine.create_target(None).is_ok());
    }
}
