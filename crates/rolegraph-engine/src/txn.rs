//! Transactions over the engine state
//!
//! Every mutation goes through a [`Transaction`], which records an undo entry
//! for each change. Committing discards the journal and hands back the events
//! collected along the way. Dropping an uncommitted transaction, whether by an
//! early `?` return or by unwinding, replays the journal in reverse and
//! restores the exact pre-call state.

use rolegraph_events::PermissionEvent;
use rolegraph_rbac::{GrantKey, Grantee, OwnerId, Role, TargetId};

use crate::store::{State, TargetNode};

#[derive(Debug)]
enum Undo {
    GrantInserted(GrantKey),
    GrantRemoved(GrantKey, bool),
    GrantFlagChanged(GrantKey, bool),
    TargetInserted(TargetId),
    TargetRemoved(TargetNode),
    ParentChanged(TargetId, Option<TargetId>),
    OwnerAttached(TargetId, OwnerId),
    OwnerDetached(TargetId, OwnerId),
}

/// A journaled set of changes to [`State`].
pub(crate) struct Transaction<'a> {
    state: &'a mut State,
    journal: Vec<Undo>,
    events: Vec<PermissionEvent>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    /// Start a transaction.
    pub fn begin(state: &'a mut State) -> Self {
        Self {
            state,
            journal: Vec::new(),
            events: Vec::new(),
            committed: false,
        }
    }

    /// Read access to the state as modified so far.
    pub fn state(&self) -> &State {
        self.state
    }

    /// Queue an event for publication after commit.
    pub fn emit(&mut self, event: PermissionEvent) {
        self.events.push(event);
    }

    /// Make the changes permanent and return the queued events.
    pub fn commit(mut self) -> Vec<PermissionEvent> {
        self.committed = true;
        self.journal.clear();
        std::mem::take(&mut self.events)
    }

    /// Insert a row or overwrite its flag. Returns the previous flag.
    pub fn put_grant(&mut self, key: GrantKey, explicit: bool) -> Option<bool> {
        let previous = self.state.grants.insert(key, explicit);
        match previous {
            None => self.journal.push(Undo::GrantInserted(key)),
            Some(old) if old != explicit => self.journal.push(Undo::GrantFlagChanged(key, old)),
            Some(_) => {}
        }
        previous
    }

    /// Insert an implicit row unless the fact is already present.
    ///
    /// Returns true if a row was created.
    pub fn ensure_implicit(&mut self, target: TargetId, grantee: Grantee, role: Role) -> bool {
        if self.state.grants.contains(target, grantee, role) {
            return false;
        }
        self.put_grant(GrantKey::new(target, grantee, role), false);
        true
    }

    /// Remove a row, returning its flag.
    pub fn remove_grant(&mut self, key: &GrantKey) -> Option<bool> {
        let removed = self.state.grants.remove(key);
        if let Some(explicit) = removed {
            self.journal.push(Undo::GrantRemoved(*key, explicit));
        }
        removed
    }

    /// Remove the rows on a target, only the implicit ones unless `all`.
    ///
    /// Returns how many rows were removed.
    pub fn clear_grants(&mut self, target: TargetId, all: bool) -> usize {
        let doomed: Vec<GrantKey> = self
            .state
            .grants
            .on_target(target)
            .filter(|grant| all || grant.is_implicit())
            .map(|grant| grant.key())
            .collect();
        for key in &doomed {
            self.remove_grant(key);
        }
        doomed.len()
    }

    /// Add a target. The parent must exist.
    pub fn insert_target(&mut self, id: TargetId, parent: Option<TargetId>) {
        self.state.targets.insert(id, parent);
        self.journal.push(Undo::TargetInserted(id));
    }

    /// Remove a target whose children are already gone.
    pub fn remove_target(&mut self, id: TargetId) -> Option<TargetNode> {
        let node = self.state.targets.remove(id)?;
        self.journal.push(Undo::TargetRemoved(node.clone()));
        Some(node)
    }

    /// Move a target, returning its old parent.
    pub fn set_parent(&mut self, id: TargetId, parent: Option<TargetId>) -> Option<TargetId> {
        let old = self.state.targets.set_parent(id, parent);
        self.journal.push(Undo::ParentChanged(id, old));
        old
    }

    /// Attach an owner. Returns false if it was already attached.
    pub fn attach_owner(&mut self, id: TargetId, owner: OwnerId) -> bool {
        let attached = self.state.targets.attach_owner(id, owner);
        if attached {
            self.journal.push(Undo::OwnerAttached(id, owner));
        }
        attached
    }

    /// Detach an owner. Returns false if it was not attached.
    pub fn detach_owner(&mut self, id: TargetId, owner: OwnerId) -> bool {
        let detached = self.state.targets.detach_owner(id, owner);
        if detached {
            self.journal.push(Undo::OwnerDetached(id, owner));
        }
        detached
    }

    fn rollback(&mut self) {
        let steps = self.journal.len();
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::GrantInserted(key) => {
                    self.state.grants.remove(&key);
                }
                Undo::GrantRemoved(key, explicit) | Undo::GrantFlagChanged(key, explicit) => {
                    self.state.grants.insert(key, explicit);
                }
                Undo::TargetInserted(id) => {
                    self.state.targets.remove(id);
                }
                Undo::TargetRemoved(node) => self.state.targets.restore(node),
                Undo::ParentChanged(id, old) => {
                    self.state.targets.set_parent(id, old);
                }
                Undo::OwnerAttached(id, owner) => {
                    self.state.targets.detach_owner(id, owner);
                }
                Undo::OwnerDetached(id, owner) => {
                    self.state.targets.attach_owner(id, owner);
                }
            }
        }
        self.events.clear();
        if steps > 0 {
            tracing::debug!(steps, "Rolled back transaction");
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}
