//! Error types for engine operations
//!
//! Every engine entry point runs as one transaction; any of these errors
//! aborts it and rolls the stores back to their pre-call state. Nothing is
//! recovered internally.

use rolegraph_rbac::{GrantKey, SuperuserGrantee, TargetId};
use thiserror::Error;

/// Engine error types.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A parent target does not exist
    #[error("Parent target not found: {0}")]
    ParentNotFound(TargetId),

    /// Reparenting would make a target its own ancestor
    #[error("Cannot move {target} under {parent}: it would become its own ancestor")]
    CycleDetected {
        /// The target being moved
        target: TargetId,
        /// The requested parent (the target itself or one of its descendants)
        parent: TargetId,
    },

    /// The addressed target does not exist
    #[error("Target not found: {0}")]
    TargetNotFound(TargetId),

    /// The target, or a target in its subtree, is still referenced by an owner
    #[error("Target {target} is still referenced by {owners} owner(s)")]
    TargetInUse {
        /// The referenced target
        target: TargetId,
        /// How many owners still reference it
        owners: usize,
    },

    /// Attempt to alter or delete an implicit grant without promoting it
    #[error("Implicit grant ({0}) cannot be modified; set explicit first")]
    ImmutableRecord(GrantKey),

    /// Grants cannot be addressed to the superuser
    #[error("Superuser cannot hold grants")]
    SuperuserGrant,

    /// A snapshot failed validation
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Snapshot serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The hierarchy would become invalid (cycle, missing parent)
    Structural,
    /// A target is still referenced by an owner
    Referential,
    /// An implicit grant was addressed directly
    ImmutableRecord,
    /// The addressed target does not exist
    NotFound,
    /// The request itself is malformed
    InvalidInput,
}

impl From<SuperuserGrantee> for EngineError {
    fn from(_: SuperuserGrantee) -> Self {
        EngineError::SuperuserGrant
    }
}

impl EngineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ParentNotFound(_) | EngineError::CycleDetected { .. } => ErrorKind::Structural,
            EngineError::TargetInUse { .. } => ErrorKind::Referential,
            EngineError::ImmutableRecord(_) => ErrorKind::ImmutableRecord,
            EngineError::TargetNotFound(_) => ErrorKind::NotFound,
            EngineError::SuperuserGrant
            | EngineError::InvalidSnapshot(_)
            | EngineError::Serialization(_) => ErrorKind::InvalidInput,
        }
    }

    /// Get HTTP status code for this error.
    ///
    /// Structural problems are bad requests, referential ones conflicts,
    /// and touching an implicit grant is a permission failure.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Structural | ErrorKind::InvalidInput => 400,
            ErrorKind::ImmutableRecord => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Referential => 409,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::ParentNotFound(_) => "PARENT_NOT_FOUND",
            EngineError::CycleDetected { .. } => "CYCLE_DETECTED",
            EngineError::TargetNotFound(_) => "TARGET_NOT_FOUND",
            EngineError::TargetInUse { .. } => "TARGET_IN_USE",
            EngineError::ImmutableRecord(_) => "IMMUTABLE_RECORD",
            EngineError::SuperuserGrant => "SUPERUSER_GRANT",
            EngineError::InvalidSnapshot(_) => "INVALID_SNAPSHOT",
            EngineError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegraph_rbac::{Grantee, Role};

    #[test]
    fn test_error_kinds() {
        let target = TargetId::new();

        assert_eq!(EngineError::ParentNotFound(target).kind(), ErrorKind::Structural);
        assert_eq!(
            EngineError::CycleDetected { target, parent: target }.kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            EngineError::TargetInUse { target, owners: 1 }.kind(),
            ErrorKind::Referential
        );
        assert_eq!(
            EngineError::ImmutableRecord(GrantKey::new(target, Grantee::Public, Role::Viewer)).kind(),
            ErrorKind::ImmutableRecord
        );
        assert_eq!(EngineError::TargetNotFound(target).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_status_codes() {
        let target = TargetId::new();
        assert_eq!(EngineError::ParentNotFound(target).status_code(), 400);
        assert_eq!(EngineError::TargetInUse { target, owners: 2 }.status_code(), 409);
        assert_eq!(EngineError::SuperuserGrant.status_code(), 400);
        assert_eq!(EngineError::TargetNotFound(target).error_code(), "TARGET_NOT_FOUND");
    }

    #[test]
    fn test_superuser_conversion() {
        let err: EngineError = SuperuserGrantee.into();
        assert!(matches!(err, EngineError::SuperuserGrant));
    }
}
