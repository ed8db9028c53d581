//! # Rolegraph Engine
//!
//! This crate provides a hierarchical permission engine: users (or anyone)
//! are granted roles on nodes of a tree, weaker roles and downward
//! inheritance are derived automatically, and every derived fact is kept
//! consistent as the tree and the grants change.
//!
//! ## Overview
//!
//! The rolegraph-engine crate handles:
//! - **Target Store**: The forest of permission nodes and the owners attached to them
//! - **Grant Store**: Explicit and implicit `(target, grantee, role)` rows
//! - **Consistency**: Incremental derivation on grant, re-derivation on revoke and reparent
//! - **Queries**: Point lookups and collection filtering against materialized rows
//! - **Snapshots**: Deterministic persistence with re-validation on load
//!
//! ## Architecture
//!
//! ```text
//! grant / revoke / create / delete / reparent
//!         │
//!         ▼
//! ┌──────────────────────────────┐      ┌───────────────┐
//! │ Transaction (write lock)     │─────▶│ EventBus      │
//! │  TargetStore + GrantStore    │commit│ (after lock)  │
//! │  consistency cascade         │      └───────────────┘
//! └──────────────────────────────┘
//!         ▲
//!         │ read lock, no tree walks
//! has_role / filter_with_role
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use rolegraph_engine::PermissionEngine;
//! use rolegraph_rbac::{Role, Subject, UserId};
//!
//! let engine = PermissionEngine::default();
//! let world = engine.create_target(None).unwrap();
//! let plane = engine.create_target(Some(world)).unwrap();
//! let article = engine.create_target(Some(plane)).unwrap();
//!
//! let alice = Subject::User(UserId::new());
//! engine.grant(world, alice, Role::Master).unwrap();
//! assert!(engine.is_master(article, alice));
//!
//! engine.grant(plane, Subject::Public, Role::Viewer).unwrap();
//! let visible = engine.visible_to(vec![world, plane, article], Subject::Public);
//! assert_eq!(visible, vec![plane]);
//!
//! engine.revoke(world, alice, Role::Master).unwrap();
//! assert!(!engine.is_viewer(article, alice));
//! ```

pub mod config;
mod consistency;
pub mod engine;
pub mod error;
pub mod query;
pub mod snapshot;
pub mod store;
mod txn;

// Re-export main types
pub use config::{ConfigError, EngineConfig};
pub use engine::{PermissionEngine, ReleaseOutcome};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use query::Governed;
pub use snapshot::{ConsistencyReport, Snapshot, TargetRecord};
