use super::router::Router;
use gb_core::ID;
use gb_core::Room;
use gb_core::User;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

/// Cross-replica command channel.
pub const COMMAND_CHANNEL: &str = "game:command";

/// One command delivered over the `game:command` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingCommand {
    #[serde(alias = "roomId")]
    pub room_id: ID<Room>,
    #[serde(alias = "userId")]
    pub user_id: ID<User>,
    pub username: String,
    pub message: String,
    #[serde(default, alias = "socketId")]
    pub socket_id: Option<String>,
}

/// FIFO queue per room with a single drain task each.
///
/// Commands for one room are handled strictly in arrival order while
/// rooms progress in parallel. A room's queue (and its task) disappears
/// once drained; the next command re-creates both.
pub struct RoomSerializer {
    router: Arc<Router>,
    queues: Mutex<HashMap<ID<Room>, UnboundedSender<IncomingCommand>>>,
}

impl RoomSerializer {
    pub fn new(router: Arc<Router>) -> Arc<Self> {
        Arc::new(Self {
            router,
            queues: Mutex::new(HashMap::new()),
        })
    }

    /// Enqueues a command for its room, spawning a drain task if the room
    /// has none. Never blocks.
    pub fn submit(self: &Arc<Self>, command: IncomingCommand) {
        let room = command.room_id;
        let mut queues = self.queues.lock().expect("queues mutex");
        let command = match queues.get(&room) {
            Some(tx) => match tx.send(command) {
                Ok(()) => return,
                Err(tokio::sync::mpsc::error::SendError(command)) => {
                    log::warn!("[serializer] dead queue for room {}, respawning", room);
                    queues.remove(&room);
                    command
                }
            },
            None => command,
        };
        let (tx, rx) = unbounded_channel();
        tx.send(command).expect("fresh channel accepts");
        queues.insert(room, tx);
        let this = self.clone();
        tokio::spawn(this.drain(room, rx));
    }

    async fn drain(self: Arc<Self>, room: ID<Room>, mut rx: UnboundedReceiver<IncomingCommand>) {
        loop {
            let Some(command) = rx.recv().await else {
                break;
            };
            self.router
                .dispatch(
                    command.room_id,
                    command.user_id,
                    &command.username,
                    &command.message,
                )
                .await;
            // Remove the queue under the map lock so a concurrent submit
            // either lands before this check or creates a fresh queue.
            let mut queues = self.queues.lock().expect("queues mutex");
            if rx.is_empty() {
                queues.remove(&room);
                break;
            }
        }
    }

    /// Number of rooms with a live queue. Diagnostic.
    pub fn active_rooms(&self) -> usize {
        self.queues.lock().expect("queues mutex").len()
    }
}
