use async_trait::async_trait;
use gb_core::ID;
use gb_core::Room;
use gb_keyed::KeyedStore;
use gb_lowcard::Broadcaster;
use std::sync::Arc;

/// Cross-room chat fanout channel.
pub const CHAT_CHANNEL: &str = "game:chat:message";
/// Balance update fanout channel.
pub const CREDITS_CHANNEL: &str = "game:credits:update";
/// Private message fanout channel.
pub const PRIVATE_CHANNEL: &str = "game:private:message";
/// Everything else rides the generic domain-event channel.
pub const EVENTS_CHANNEL: &str = "game:events";

/// Broadcaster over the keyed store's pub/sub channels.
///
/// The chat transport (websocket namespace) subscribes to these channels
/// and relays to room members. Chat messages, credit updates, and private
/// messages each ride their dedicated cross-replica channel; remaining
/// domain events share one. Delivery is at-least-once.
pub struct PubSubBroadcaster {
    store: Arc<dyn KeyedStore>,
}

impl PubSubBroadcaster {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    async fn publish(&self, channel: &str, payload: serde_json::Value) {
        let body = payload.to_string();
        if let Err(e) = self.store.publish(channel, &body).await {
            log::error!("[broadcast] publish to {} failed: {}", channel, e);
        }
    }
}

#[async_trait]
impl Broadcaster for PubSubBroadcaster {
    async fn emit_to(&self, room: ID<Room>, event: &str, payload: serde_json::Value) {
        match event {
            "chat:message" => {
                let private = payload.get("type").and_then(|t| t.as_str()) == Some("private");
                match private {
                    true => {
                        let user = payload.get("user_id").cloned().unwrap_or_default();
                        self.publish(
                            PRIVATE_CHANNEL,
                            serde_json::json!({
                                "room_id": room,
                                "user_id": user,
                                "message_data": payload,
                            }),
                        )
                        .await
                    }
                    false => {
                        self.publish(
                            CHAT_CHANNEL,
                            serde_json::json!({
                                "room_id": room,
                                "message_data": payload,
                            }),
                        )
                        .await
                    }
                }
            }
            "credits:updated" => self.publish(CREDITS_CHANNEL, payload).await,
            _ => {
                self.publish(
                    EVENTS_CHANNEL,
                    serde_json::json!({
                        "room_id": room,
                        "event": event,
                        "payload": payload,
                    }),
                )
                .await
            }
        }
    }

    async fn emit(&self, event: &str, payload: serde_json::Value) {
        self.publish(
            EVENTS_CHANNEL,
            serde_json::json!({
                "event": event,
                "payload": payload,
            }),
        )
        .await
    }
}
