//! Change events published by the engine.

use rolegraph_engine::{EngineConfig, PermissionEngine};
use rolegraph_events::{Event, EventBus, EventBusResult, EventHandler, MemoryEventBus, PermissionEvent};
use rolegraph_rbac::{Grantee, OwnerId, Role, RoleAlgebra, Subject, UserId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn kinds(events: &[Event]) -> Vec<String> {
    events.iter().map(|event| event.event_type.clone()).collect()
}

#[tokio::test]
async fn test_grant_events_are_published() {
    let engine = PermissionEngine::default();
    let mut sub = engine.subscribe("rolegraph.grant.*").unwrap();

    let root = engine.create_target(None).unwrap();
    let user = UserId::new();
    engine.grant(root, Subject::User(user), Role::Master).unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(event.event_type, "grant.created");
    assert_eq!(
        event.permission_event().unwrap(),
        PermissionEvent::GrantCreated {
            target: root,
            grantee: Grantee::User(user),
            role: Role::Master,
        }
    );

    // Implied rows are not reported individually
    assert!(sub.try_recv().unwrap().is_none());
}

#[tokio::test]
async fn test_failed_mutations_publish_nothing() {
    let engine = PermissionEngine::default();
    let mut sub = engine.subscribe("#").unwrap();

    let root = engine.create_target_for(OwnerId::new(), None).unwrap();
    assert_eq!(kinds(&sub.drain()), vec!["target.created", "target.owner_attached"]);

    assert!(engine.delete_target(root).is_err());
    assert!(engine.reparent_target(root, Some(root)).is_err());
    assert!(engine.grant(root, Subject::Superuser, Role::Viewer).is_err());
    assert!(sub.drain().is_empty());
}

#[tokio::test]
async fn test_lifecycle_event_sequence() {
    let engine = PermissionEngine::default();
    let mut sub = engine.subscribe("rolegraph.#").unwrap();
    let alice = Subject::User(UserId::new());

    let root = engine.create_target(None).unwrap();
    let child = engine.create_target(Some(root)).unwrap();
    engine.grant(root, alice, Role::Master).unwrap();
    engine.grant(child, alice, Role::Editor).unwrap();
    engine.revoke(root, alice, Role::Master).unwrap();
    engine.reparent_target(child, None).unwrap();
    engine.rebuild_all();
    engine.delete_target(root).unwrap();

    assert_eq!(
        kinds(&sub.drain()),
        vec![
            "target.created",
            "target.created",
            "grant.created",
            "grant.promoted",
            "grant.revoked",
            "target.reparented",
            "grants.rebuilt",
            "target.deleted",
        ]
    );
}

#[tokio::test]
async fn test_event_source_from_config() {
    let config = EngineConfig {
        event_source: "tenant-a".to_string(),
        ..EngineConfig::default()
    };
    let engine = PermissionEngine::with_config(RoleAlgebra::standard(), config);
    let mut ours = engine.subscribe("tenant-a.target.*").unwrap();
    let mut default = engine.subscribe("rolegraph.#").unwrap();

    engine.create_target(None).unwrap();

    let event = tokio::time::timeout(Duration::from_secs(1), ours.recv())
        .await
        .expect("timed out")
        .unwrap();
    assert_eq!(event.topic(), "tenant-a.target.created");
    assert!(default.try_recv().unwrap().is_none());
}

#[test]
fn test_events_of_one_commit_share_a_sequence() {
    let engine = PermissionEngine::default();
    let mut sub = engine.subscribe("#").unwrap();

    let root = engine.create_target_for(OwnerId::new(), None).unwrap();
    engine.grant(root, Subject::Public, Role::Viewer).unwrap();

    let sequences: Vec<Option<u64>> = sub.drain().iter().map(|event| event.sequence).collect();
    assert_eq!(sequences.len(), 3);
    assert_eq!(sequences[0], sequences[1]);
    assert!(sequences[1] < sequences[2]);
}

#[test]
fn test_sequences_follow_commit_order_across_threads() {
    let engine = Arc::new(PermissionEngine::default());
    let mut sub = engine.subscribe("#").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let user = Subject::User(UserId::new());
                for _ in 0..25 {
                    let target = engine.create_target(None).unwrap();
                    engine.grant(target, user, Role::Editor).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let events = sub.drain();
    assert_eq!(events.len(), 200);

    let mut sequences: Vec<u64> = events.iter().map(|event| event.sequence.unwrap()).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=200).collect::<Vec<u64>>());

    // Ordered by sequence, every target is created before it is granted on
    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by_key(|event| event.sequence);
    let mut created = BTreeMap::new();
    for event in ordered {
        match event.permission_event().unwrap() {
            PermissionEvent::TargetCreated { target, .. } => {
                created.insert(target, event.sequence);
            }
            PermissionEvent::GrantCreated { target, .. } => {
                assert!(created.contains_key(&target));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(created.len(), 100);
}

struct CountingHandler {
    count: AtomicUsize,
}

impl EventHandler for CountingHandler {
    fn handle(&self, _event: &Event) -> EventBusResult<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn topics(&self) -> Vec<String> {
        vec!["*.target.#".to_string()]
    }
}

#[test]
fn test_shared_bus_with_handler() {
    let bus = Arc::new(MemoryEventBus::new());
    let handler = Arc::new(CountingHandler {
        count: AtomicUsize::new(0),
    });
    bus.register_handler(handler.clone()).unwrap();

    let engine = PermissionEngine::default().with_event_bus(bus.clone());
    let root = engine.create_target(None).unwrap();
    engine.create_target(Some(root)).unwrap();
    engine.grant(root, Subject::Public, Role::Viewer).unwrap();

    assert_eq!(handler.count.load(Ordering::SeqCst), 2);
    assert_eq!(bus.stats().events_published, 3);
}
