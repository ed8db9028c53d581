//! # Snapshots
//!
//! A snapshot is the complete persisted form of an engine: every target with
//! its parent and owners, and every grant row. Targets are listed ancestors
//! first and grants in key order, so two engines holding the same state
//! serialize to identical JSON.
//!
//! Loading re-validates the hierarchy and recomputes the implicit rows from
//! the explicit ones; the implicit rows in the document are only compared,
//! never trusted.

use rolegraph_rbac::{Grant, GrantKey, Grantee, OwnerId, RoleAlgebra, TargetId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::consistency;
use crate::error::{EngineError, EngineResult};
use crate::store::State;
use crate::txn::Transaction;

/// A persisted target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Target id
    pub id: TargetId,
    /// Parent target
    #[serde(default)]
    pub parent: Option<TargetId>,
    /// Owners referencing the target
    #[serde(default)]
    pub owners: Vec<OwnerId>,
}

/// Persisted engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version
    pub version: u32,
    /// Targets, ancestors first
    pub targets: Vec<TargetRecord>,
    /// Grant rows in key order
    pub grants: Vec<Grant>,
}

impl Snapshot {
    /// Current format version.
    pub const VERSION: u32 = 1;

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON. The result is not validated until it is loaded.
    pub fn from_json(s: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Number of implicit rows in the document.
    pub fn implicit_count(&self) -> usize {
        self.grants.iter().filter(|grant| grant.is_implicit()).count()
    }

    pub(crate) fn capture(state: &State) -> Self {
        let targets = state
            .targets
            .topological()
            .into_iter()
            .filter_map(|id| state.targets.get(id))
            .map(|node| TargetRecord {
                id: node.id,
                parent: node.parent,
                owners: node.owners.iter().copied().collect(),
            })
            .collect();

        Self {
            version: Self::VERSION,
            targets,
            grants: state.grants.iter().collect(),
        }
    }

    /// Build a closed state from this snapshot.
    pub(crate) fn restore(&self, algebra: &RoleAlgebra, verify: bool) -> EngineResult<State> {
        if self.version != Self::VERSION {
            return Err(invalid(format!(
                "unsupported version {} (expected {})",
                self.version,
                Self::VERSION
            )));
        }

        let order = self.load_order()?;
        let mut state = State::default();
        let mut txn = Transaction::begin(&mut state);

        for record in order {
            txn.insert_target(record.id, record.parent);
            for &owner in &record.owners {
                txn.attach_owner(record.id, owner);
            }
        }

        let mut seen: BTreeSet<GrantKey> = BTreeSet::new();
        let mut stored_implicit: BTreeSet<GrantKey> = BTreeSet::new();
        for grant in &self.grants {
            let key = grant.key();
            if !txn.state().targets.contains(key.target) {
                return Err(invalid(format!("grant {key} references an unknown target")));
            }
            if !seen.insert(key) {
                return Err(invalid(match key.grantee {
                    Grantee::Public => format!("duplicate public grant {key}"),
                    Grantee::User(_) => format!("duplicate user grant {key}"),
                }));
            }
            if grant.explicit {
                txn.put_grant(key, true);
            } else {
                stored_implicit.insert(key);
            }
        }

        consistency::rebuild_all(&mut txn, algebra);

        if verify {
            let derived: BTreeSet<GrantKey> = txn
                .state()
                .grants
                .iter()
                .filter(Grant::is_implicit)
                .map(|grant| grant.key())
                .collect();
            if derived != stored_implicit {
                let missing = derived.difference(&stored_implicit).count();
                let extraneous = stored_implicit.difference(&derived).count();
                return Err(invalid(format!(
                    "stored implicit grants differ from their derivation: {missing} missing, {extraneous} extraneous"
                )));
            }
        }

        txn.commit();
        Ok(state)
    }

    /// Targets ordered so every parent precedes its children.
    fn load_order(&self) -> EngineResult<Vec<&TargetRecord>> {
        let mut by_id: BTreeMap<TargetId, &TargetRecord> = BTreeMap::new();
        let mut children: BTreeMap<TargetId, Vec<TargetId>> = BTreeMap::new();
        for record in &self.targets {
            if by_id.insert(record.id, record).is_some() {
                return Err(invalid(format!("duplicate target {}", record.id)));
            }
        }

        let mut roots = Vec::new();
        for record in &self.targets {
            match record.parent {
                None => roots.push(record.id),
                Some(parent) if by_id.contains_key(&parent) => {
                    children.entry(parent).or_default().push(record.id)
                }
                Some(parent) => {
                    return Err(invalid(format!(
                        "target {} has unknown parent {parent}",
                        record.id
                    )))
                }
            }
        }

        let mut order = Vec::with_capacity(by_id.len());
        let mut stack = roots;
        while let Some(id) = stack.pop() {
            if let Some(record) = by_id.get(&id) {
                order.push(*record);
            }
            if let Some(kids) = children.get(&id) {
                stack.extend(kids.iter().copied());
            }
        }

        // Anything not reachable from a root sits on a parent cycle
        if order.len() != by_id.len() {
            return Err(invalid(format!(
                "{} target(s) form a parent cycle",
                by_id.len() - order.len()
            )));
        }
        Ok(order)
    }
}

/// Result of comparing the store with a from-scratch derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Rows the derivation has that the store lacks
    pub missing: Vec<Grant>,
    /// Rows the store has that the derivation does not
    pub extraneous: Vec<Grant>,
}

impl ConsistencyReport {
    pub(crate) fn compare(actual: &State, expected: &State) -> Self {
        let actual: BTreeSet<Grant> = actual.grants.iter().collect();
        let expected: BTreeSet<Grant> = expected.grants.iter().collect();
        Self {
            missing: expected.difference(&actual).copied().collect(),
            extraneous: actual.difference(&expected).copied().collect(),
        }
    }

    /// Check if the store matched its derivation.
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.extraneous.is_empty()
    }
}

fn invalid(message: String) -> EngineError {
    EngineError::InvalidSnapshot(message)
}
