//! # Rolegraph RBAC
//!
//! This crate provides the value types of the rolegraph permission engine:
//! everything that can be reasoned about without a store.
//!
//! ## Overview
//!
//! The rolegraph-rbac crate handles:
//! - **Identifiers**: `TargetId`, `UserId`, `OwnerId`
//! - **Roles**: The privilege levels that can be granted (`Master`, `Editor`, `Viewer`)
//! - **Subjects**: Who is asking (`Superuser`, a user, or the public) and who may hold a grant
//! - **Role Algebra**: Which roles imply which, and which roles flow down the tree
//! - **Grants**: `(target, grantee, role, explicit)` records
//!
//! ## Architecture
//!
//! ```text
//! Grant = Target + Grantee + Role [+ explicit flag]
//!
//! Examples:
//!   (world, user:alice, master, explicit)   - Granted by a caller
//!   (world, user:alice, editor, implicit)   - Implied by master
//!   (plane, user:alice, master, implicit)   - Inherited from world
//!   (plane, public, viewer, explicit)       - Anyone may view the plane
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use rolegraph_rbac::{Role, RoleAlgebra};
//!
//! let algebra = RoleAlgebra::standard();
//!
//! // Master counts as editor and viewer on the same target
//! assert!(algebra.implies(Role::Master, Role::Editor));
//! assert!(algebra.implies(Role::Master, Role::Viewer));
//!
//! // Only master flows down to descendant targets
//! assert!(algebra.is_recursive(Role::Master));
//! assert!(!algebra.is_recursive(Role::Editor));
//! ```
//!
//! ## Integration with rolegraph-engine
//!
//! The engine takes a `RoleAlgebra` by value at construction, stores `Grant`
//! rows keyed by `(TargetId, Grantee, Role)`, and answers queries for a `Subject`.

pub mod algebra;
pub mod grant;
pub mod ids;
pub mod roles;
pub mod subject;

// Re-export main types for convenience
pub use algebra::{AlgebraError, RoleAlgebra};
pub use grant::{Grant, GrantKey};
pub use ids::{OwnerId, TargetId, UserId};
pub use roles::Role;
pub use subject::{Grantee, Subject, SuperuserGrantee};
