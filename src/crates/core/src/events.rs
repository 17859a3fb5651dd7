//! Events module - Supervisor event definitions and subscriber dispatch
//!
//! The supervisor is the single publisher; subscribers are data consumers
//! only. Callbacks run on the supervisor's forwarding context and must not
//! mutate supervisor state re-entrantly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Events published by the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SupervisorEvent {
    /// Raw bytes from a terminal-tab session, unchanged from the PTY
    RawPtyData { session_id: String, bytes: Vec<u8> },

    /// Raw bytes from an agent-process session (separate stream from tabs)
    AgentData { session_id: String, bytes: Vec<u8> },

    /// Session exited; its record has already been removed from the map
    Exit { session_id: String, exit_code: i32 },
}

impl SupervisorEvent {
    /// Get the session ID associated with this event.
    pub fn session_id(&self) -> &str {
        match self {
            SupervisorEvent::RawPtyData { session_id, .. } => session_id,
            SupervisorEvent::AgentData { session_id, .. } => session_id,
            SupervisorEvent::Exit { session_id, .. } => session_id,
        }
    }

    /// Check if this is a byte-stream event.
    pub fn is_data_event(&self) -> bool {
        matches!(
            self,
            SupervisorEvent::RawPtyData { .. } | SupervisorEvent::AgentData { .. }
        )
    }
}

/// Handle identifying a registered subscriber.
pub type SubscriptionId = u64;

/// Callback-based event subscriber.
pub type EventCallback = Box<dyn Fn(&SupervisorEvent) + Send + Sync>;

/// Registry of event subscribers.
///
/// Dispatch iterates subscribers under a read lock, so callbacks must not
/// call `on`/`off` from inside themselves.
pub struct EventDispatcher {
    subscribers: RwLock<Vec<(SubscriptionId, EventCallback)>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback. Returns a handle usable with `off`.
    pub fn on<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SupervisorEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a subscriber. Returns `false` if the handle is unknown.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut subscribers = match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Dispatch an event to all subscribers, in registration order.
    pub fn dispatch(&self, event: &SupervisorEvent) {
        let subscribers = match self.subscribers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, callback) in subscribers.iter() {
            callback(event);
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn data_event(session_id: &str, bytes: &[u8]) -> SupervisorEvent {
        SupervisorEvent::RawPtyData {
            session_id: session_id.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn dispatch_reaches_every_subscriber() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            dispatcher.on(move |_| {
                count.fetch_add(1, Ordering::Relaxed);
            });
        }

        dispatcher.dispatch(&data_event("s1", b"x"));
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn off_removes_exactly_one_subscriber() {
        let dispatcher = EventDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_a = count.clone();
        let a = dispatcher.on(move |_| {
            count_a.fetch_add(1, Ordering::Relaxed);
        });
        let count_b = count.clone();
        let _b = dispatcher.on(move |_| {
            count_b.fetch_add(1, Ordering::Relaxed);
        });

        assert!(dispatcher.off(a));
        assert!(!dispatcher.off(a));
        dispatcher.dispatch(&data_event("s1", b"x"));
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(dispatcher.subscriber_count(), 1);
    }

    #[test]
    fn event_accessors() {
        let data = data_event("s1", b"x");
        assert_eq!(data.session_id(), "s1");
        assert!(data.is_data_event());

        let exit = SupervisorEvent::Exit {
            session_id: "s2".to_string(),
            exit_code: 130,
        };
        assert_eq!(exit.session_id(), "s2");
        assert!(!exit.is_data_event());
    }
}
