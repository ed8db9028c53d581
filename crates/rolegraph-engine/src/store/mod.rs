//! In-memory stores for targets and grants.

mod grants;
mod targets;

pub use grants::GrantStore;
pub use targets::{TargetNode, TargetStore};

/// Everything the engine persists. Guarded as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// The target forest
    pub targets: TargetStore,
    /// Materialized grants
    pub grants: GrantStore,
}
