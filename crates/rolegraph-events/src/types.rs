//! Event types for permission changes
//!
//! This module defines the event envelope and the typed events the engine
//! publishes after each committed mutation.

use chrono::{DateTime, Utc};
use rolegraph_rbac::{Grantee, OwnerId, Role, TargetId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source used when none is configured.
pub const DEFAULT_SOURCE: &str = "rolegraph";

/// Event envelope.
///
/// All events are wrapped in this envelope which provides metadata
/// for routing, tracing, and processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "grant.created", "target.deleted")
    pub event_type: String,

    /// Publishing engine instance
    pub source: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// Commit sequence number, increasing in commit order
    ///
    /// Events from one commit share a number. Delivery across concurrent
    /// commits may interleave, so subscribers that need commit order sort
    /// on this.
    #[serde(default)]
    pub sequence: Option<u64>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,
}

impl Event {
    /// Create a new event from the default source.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            source: DEFAULT_SOURCE.to_string(),
            timestamp: Utc::now(),
            sequence: None,
            version: 1,
            payload,
        }
    }

    /// Set the source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Stamp the commit sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Get the topic for this event.
    ///
    /// Topics are structured as: `{source}.{event_type}`
    pub fn topic(&self) -> String {
        format!("{}.{}", self.source, self.event_type)
    }

    /// Parse the payload as a [`PermissionEvent`].
    pub fn permission_event(&self) -> Result<PermissionEvent, serde_json::Error> {
        PermissionEvent::deserialize(&self.payload)
    }
}

/// A committed change to the permission store.
///
/// Implicit rows derived during a cascade are not reported one by one; a
/// subscriber that needs them re-reads the affected targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PermissionEvent {
    /// A target was created
    TargetCreated {
        target: TargetId,
        parent: Option<TargetId>,
    },
    /// A target and its subtree were deleted, together with their grants
    TargetDeleted {
        target: TargetId,
        removed: Vec<TargetId>,
        grants_removed: usize,
    },
    /// A target was moved under another parent
    TargetReparented {
        target: TargetId,
        old_parent: Option<TargetId>,
        new_parent: Option<TargetId>,
    },
    /// A domain object started referencing a target
    OwnerAttached { target: TargetId, owner: OwnerId },
    /// A domain object stopped referencing a target
    OwnerDetached { target: TargetId, owner: OwnerId },
    /// An explicit grant was created
    GrantCreated {
        target: TargetId,
        grantee: Grantee,
        role: Role,
    },
    /// An implicit grant was made explicit
    GrantPromoted {
        target: TargetId,
        grantee: Grantee,
        role: Role,
    },
    /// An explicit grant was revoked
    GrantRevoked {
        target: TargetId,
        grantee: Grantee,
        role: Role,
    },
    /// Every implicit grant was recomputed
    GrantsRebuilt { implicit_grants: usize },
}

impl PermissionEvent {
    /// The event type string used in topics.
    pub fn event_type(&self) -> &'static str {
        match self {
            PermissionEvent::TargetCreated { .. } => "target.created",
            PermissionEvent::TargetDeleted { .. } => "target.deleted",
            PermissionEvent::TargetReparented { .. } => "target.reparented",
            PermissionEvent::OwnerAttached { .. } => "target.owner_attached",
            PermissionEvent::OwnerDetached { .. } => "target.owner_detached",
            PermissionEvent::GrantCreated { .. } => "grant.created",
            PermissionEvent::GrantPromoted { .. } => "grant.promoted",
            PermissionEvent::GrantRevoked { .. } => "grant.revoked",
            PermissionEvent::GrantsRebuilt { .. } => "grants.rebuilt",
        }
    }

    /// The target whose permissions changed, if the event concerns one.
    ///
    /// For deletions and reparenting this is the root of the affected subtree.
    pub fn target(&self) -> Option<TargetId> {
        match self {
            PermissionEvent::TargetCreated { target, .. }
            | PermissionEvent::TargetDeleted { target, .. }
            | PermissionEvent::TargetReparented { target, .. }
            | PermissionEvent::OwnerAttached { target, .. }
            | PermissionEvent::OwnerDetached { target, .. }
            | PermissionEvent::GrantCreated { target, .. }
            | PermissionEvent::GrantPromoted { target, .. }
            | PermissionEvent::GrantRevoked { target, .. } => Some(*target),
            PermissionEvent::GrantsRebuilt { .. } => None,
        }
    }

    /// Convert to generic event.
    pub fn to_event(&self) -> Event {
        Event::new(
            self.event_type(),
            serde_json::to_value(self).unwrap_or_default(),
        )
    }
}
