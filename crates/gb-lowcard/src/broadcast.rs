use async_trait::async_trait;
use gb_core::ID;
use gb_core::Room;
use std::sync::Mutex;

/// Event sink the engine emits through.
///
/// Delivery is at-least-once; clients are assumed idempotent. The
/// production implementation fans room events out to the chat transport
/// and mirrors chat/credit events onto the cross-replica channels.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Emit an event scoped to one room's subscribers.
    async fn emit_to(&self, room: ID<Room>, event: &str, payload: serde_json::Value);
    /// Emit an event to every subscriber.
    async fn emit(&self, event: &str, payload: serde_json::Value);
}

/// One captured emission.
#[derive(Debug, Clone)]
pub struct Emitted {
    pub room: Option<ID<Room>>,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Captures emissions for assertions in tests.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<Emitted>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn emitted(&self) -> Vec<Emitted> {
        self.events.lock().expect("events").clone()
    }
    pub fn named(&self, event: &str) -> Vec<Emitted> {
        self.emitted()
            .into_iter()
            .filter(|e| e.event == event)
            .collect()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn emit_to(&self, room: ID<Room>, event: &str, payload: serde_json::Value) {
        self.events.lock().expect("events").push(Emitted {
            room: Some(room),
            event: event.to_string(),
            payload,
        });
    }
    async fn emit(&self, event: &str, payload: serde_json::Value) {
        self.events.lock().expect("events").push(Emitted {
            room: None,
            event: event.to_string(),
            payload,
        });
    }
}
