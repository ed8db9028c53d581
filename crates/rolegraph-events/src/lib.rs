//! # Rolegraph Events
//!
//! This crate provides change notifications for the rolegraph permission
//! engine, so that caches, audit logs and search indexes can follow permission
//! changes without polling.
//!
//! ## Overview
//!
//! The rolegraph-events crate handles:
//! - **Event Types**: Strongly-typed `PermissionEvent`s for targets and grants
//! - **Event Envelope**: Id, timestamp, commit sequence and JSON payload
//! - **Event Bus**: Publish/subscribe with topic patterns
//! - **Event Handlers**: Synchronous callbacks run after each commit
//!
//! Events are only ever published for committed mutations. A rolled-back
//! cascade produces nothing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rolegraph_events::{EventBus, MemoryEventBus, PermissionEvent};
//! use rolegraph_rbac::{Grantee, Role, TargetId};
//!
//! async fn subscribe_example() {
//!     let bus = MemoryEventBus::new();
//!
//!     // Every grant change from any source
//!     let mut sub = bus.subscribe("*.grant.*").unwrap();
//!
//!     let event = PermissionEvent::GrantCreated {
//!         target: TargetId::new(),
//!         grantee: Grantee::Public,
//!         role: Role::Viewer,
//!     };
//!     bus.publish(event.to_event()).unwrap();
//!
//!     while let Ok(event) = sub.recv().await {
//!         println!("Received: {}", event.event_type);
//!     }
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are structured as `{source}.{event_type}`:
//! - `rolegraph.grant.created` - Specific event
//! - `rolegraph.target.*` - All target events
//! - `*.grant.#` - All grant events from any source
//! - `#` - All events
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{EventBus, EventBusError, EventBusResult, EventBusStats, EventHandler, MemoryEventBus, Subscription};
pub use types::{Event, PermissionEvent, DEFAULT_SOURCE};
