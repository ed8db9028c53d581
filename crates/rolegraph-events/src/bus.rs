//! Event bus implementation
//!
//! This module provides the event bus abstraction and an in-memory
//! implementation for publishing permission changes to subscribers.
//!
//! Publishing is synchronous: the engine publishes from inside its own
//! (synchronous) entry points, after the transaction has committed.
//! Subscribers may still consume asynchronously through [`Subscription::recv`].

use crate::types::Event;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Failed to publish event
    #[error("Failed to publish event: {0}")]
    PublishError(String),

    /// Failed to subscribe
    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    /// A handler rejected an event
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// The subscriber fell behind and missed events
    #[error("Subscriber lagged behind by {0} events")]
    Lagged(u64),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Subscription ID
    pub id: String,
    /// Topic pattern
    pub topic: String,
    /// Event receiver
    pub receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event.
    pub async fn recv(&mut self) -> EventBusResult<Event> {
        self.receiver.recv().await.map_err(|e| match e {
            RecvError::Closed => EventBusError::ChannelClosed,
            RecvError::Lagged(n) => EventBusError::Lagged(n),
        })
    }

    /// Receive the next event if one is already queued.
    pub fn try_recv(&mut self) -> EventBusResult<Option<Event>> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Closed) => Err(EventBusError::ChannelClosed),
            Err(TryRecvError::Lagged(n)) => Err(EventBusError::Lagged(n)),
        }
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Event handler trait for processing events.
///
/// Handlers run inline on the publishing thread, after commit. They cannot
/// veto the change they are told about.
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    fn handle(&self, event: &Event) -> EventBusResult<()>;

    /// Get the topics this handler is interested in.
    fn topics(&self) -> Vec<String>;
}

/// Event bus trait for publish/subscribe operations.
pub trait EventBus: Send + Sync {
    /// Publish an event.
    fn publish(&self, event: Event) -> EventBusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Topic patterns support wildcards:
    /// - `*` matches any single segment
    /// - `#` matches zero or more segments
    ///
    /// Examples:
    /// - `rolegraph.grant.*` matches `rolegraph.grant.created`, `rolegraph.grant.revoked`
    /// - `*.target.#` matches any source's target events
    fn subscribe(&self, topic: &str) -> EventBusResult<Subscription>;

    /// Register an event handler.
    fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()>;

    /// Unsubscribe.
    fn unsubscribe(&self, subscription_id: &str) -> EventBusResult<()>;

    /// Get event bus stats.
    fn stats(&self) -> EventBusStats;
}

/// Event bus statistics.
#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Total events delivered to subscribers and handlers
    pub events_delivered: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
    /// Registered handlers
    pub registered_handlers: usize,
}

/// In-memory event bus implementation.
///
/// Suitable for a single process, which is where the engine lives.
pub struct MemoryEventBus {
    /// Topic pattern -> channel
    subscribers: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    /// Subscription ID -> topic pattern
    subscriptions: RwLock<HashMap<String, String>>,
    /// Registered handlers
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    /// Statistics
    stats: RwLock<EventBusStats>,
    /// Default channel capacity
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventBus")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl MemoryEventBus {
    /// Create a new in-memory event bus.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
            stats: RwLock::new(EventBusStats::default()),
            channel_capacity: capacity.max(1),
        }
    }

    /// Check if a topic matches a pattern.
    fn topic_matches(pattern: &str, topic: &str) -> bool {
        let pattern_parts: Vec<&str> = pattern.split('.').collect();
        let topic_parts: Vec<&str> = topic.split('.').collect();

        let mut p_idx = 0;
        let mut t_idx = 0;

        while p_idx < pattern_parts.len() && t_idx < topic_parts.len() {
            match pattern_parts[p_idx] {
                "*" => {
                    p_idx += 1;
                    t_idx += 1;
                }
                "#" => {
                    if p_idx == pattern_parts.len() - 1 {
                        // # at end matches everything remaining
                        return true;
                    }
                    for i in t_idx..=topic_parts.len() {
                        if Self::topic_matches(
                            &pattern_parts[p_idx + 1..].join("."),
                            &topic_parts[i..].join("."),
                        ) {
                            return true;
                        }
                    }
                    return false;
                }
                segment => {
                    if segment != topic_parts[t_idx] {
                        return false;
                    }
                    p_idx += 1;
                    t_idx += 1;
                }
            }
        }

        // Handle trailing # in pattern
        if p_idx < pattern_parts.len() && pattern_parts[p_idx] == "#" {
            p_idx += 1;
        }

        p_idx == pattern_parts.len() && t_idx == topic_parts.len()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for MemoryEventBus {
    fn publish(&self, event: Event) -> EventBusResult<()> {
        let topic = event.topic();
        let mut delivered = 0u64;

        {
            let subscribers = self.subscribers.read();
            for (pattern, sender) in subscribers.iter() {
                if Self::topic_matches(pattern, &topic) {
                    // No receivers left is not an error for the publisher.
                    if let Ok(n) = sender.send(event.clone()) {
                        delivered += n as u64;
                    }
                }
            }
        }

        let handlers: Vec<Arc<dyn EventHandler>> = self.handlers.read().clone();
        for handler in handlers {
            if handler
                .topics()
                .iter()
                .any(|pattern| Self::topic_matches(pattern, &topic))
            {
                match handler.handle(&event) {
                    Ok(()) => delivered += 1,
                    Err(e) => tracing::warn!(topic = %topic, error = %e, "Event handler failed"),
                }
            }
        }

        let mut stats = self.stats.write();
        stats.events_published += 1;
        stats.events_delivered += delivered;

        tracing::debug!(topic = %topic, event_id = %event.id, delivered, "Published event");
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> EventBusResult<Subscription> {
        if topic.is_empty() {
            return Err(EventBusError::SubscribeError("empty topic pattern".to_string()));
        }

        let id = uuid::Uuid::now_v7().to_string();

        let receiver = {
            let mut subscribers = self.subscribers.write();

            if let Some(sender) = subscribers.get(topic) {
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(self.channel_capacity);
                subscribers.insert(topic.to_string(), sender);
                receiver
            }
        };

        self.subscriptions.write().insert(id.clone(), topic.to_string());
        self.stats.write().active_subscriptions += 1;

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        })
    }

    fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()> {
        self.handlers.write().push(handler);
        self.stats.write().registered_handlers += 1;
        Ok(())
    }

    fn unsubscribe(&self, subscription_id: &str) -> EventBusResult<()> {
        let Some(topic) = self.subscriptions.write().remove(subscription_id) else {
            return Ok(());
        };

        {
            let mut stats = self.stats.write();
            if stats.active_subscriptions > 0 {
                stats.active_subscriptions -= 1;
            }
        }

        // Drop the channel once no subscription references its pattern.
        let still_used = self.subscriptions.read().values().any(|t| *t == topic);
        if !still_used {
            self.subscribers.write().remove(&topic);
        }

        Ok(())
    }

    fn stats(&self) -> EventBusStats {
        self.stats.read().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
