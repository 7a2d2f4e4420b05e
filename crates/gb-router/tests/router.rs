//! Routing and per-room serialization against in-memory backends.

use gb_core::Coins;
use gb_core::ID;
use gb_core::Room;
use gb_core::User;
use gb_keyed::ActiveGames;
use gb_keyed::KeyedStore;
use gb_keyed::MemoryStore;
use gb_ledger::Ledger;
use gb_ledger::MemoryCredits;
use gb_ledger::NoMerchants;
use gb_lowcard::BotManager;
use gb_lowcard::Game;
use gb_lowcard::LowCard;
use gb_lowcard::MemoryGames;
use gb_lowcard::RecordingBroadcaster;
use gb_lowcard::game_key;
use gb_router::IncomingCommand;
use gb_router::RoomSerializer;
use gb_router::Router;
use std::sync::Arc;
use std::time::Duration;

const BALANCE: Coins = 500;

struct World {
    store: Arc<MemoryStore>,
    credits: Arc<MemoryCredits>,
    broadcast: Arc<RecordingBroadcaster>,
    router: Arc<Router>,
    room: ID<Room>,
    admin: ID<User>,
    alice: ID<User>,
}

fn world() -> World {
    let room: ID<Room> = ID::default();
    let admin: ID<User> = ID::default();
    let alice: ID<User> = ID::default();
    let store = Arc::new(MemoryStore::new());
    let credits = Arc::new(
        MemoryCredits::new()
            .with_balance(admin, BALANCE)
            .with_balance(alice, BALANCE),
    );
    let games = Arc::new(
        MemoryGames::new()
            .with_room_name(room, "Lounge")
            .with_admin(room, admin),
    );
    let broadcast = Arc::new(RecordingBroadcaster::new());
    let ledger = Arc::new(Ledger::new(
        credits.clone(),
        Arc::new(NoMerchants),
        store.clone(),
    ));
    let engine = Arc::new(LowCard::new(
        store.clone(),
        ledger,
        games.clone(),
        broadcast.clone(),
    ));
    let bots = Arc::new(BotManager::new(store.clone(), games.clone(), engine.clone()));
    let router = Arc::new(Router::new(
        engine,
        bots,
        games,
        ActiveGames::new(store.clone()),
    ));
    World {
        store,
        credits,
        broadcast,
        router,
        room,
        admin,
        alice,
    }
}

impl World {
    async fn snapshot(&self) -> Option<Game> {
        self.store
            .get(&game_key(self.room))
            .await
            .unwrap()
            .map(|json| serde_json::from_str(&json).unwrap())
    }
    fn whispers(&self) -> Vec<String> {
        self.broadcast
            .named("chat:message")
            .into_iter()
            .filter(|e| e.payload["type"] == "private")
            .filter_map(|e| e.payload["message"].as_str().map(str::to_string))
            .collect()
    }
    fn command(&self, user: ID<User>, username: &str, message: &str) -> IncomingCommand {
        serde_json::from_value(serde_json::json!({
            "room_id": self.room,
            "user_id": user,
            "username": username,
            "message": message,
        }))
        .unwrap()
    }
}

async fn drained(serializer: &Arc<RoomSerializer>) {
    for _ in 0..100 {
        if serializer.active_rooms() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("serializer never drained");
}

#[tokio::test]
async fn lifecycle_needs_an_installed_bot() {
    let w = world();
    w.router.dispatch(w.room, w.alice, "alice", "!start 10").await;
    assert!(w.snapshot().await.is_none());
    assert_eq!(w.credits.balance_of(w.alice), BALANCE);
}

#[tokio::test]
async fn admin_installs_bot_then_games_run() {
    let w = world();
    // Non-admins may not manage bots.
    w.router.dispatch(w.room, w.alice, "alice", "/bot lowcard add").await;
    assert!(w.whispers().iter().any(|m| m.contains("room admins")));

    w.router.dispatch(w.room, w.admin, "admin", "/bot lowcard add").await;
    assert!(w.whispers().iter().any(|m| m == "Bot is running"));

    w.router.dispatch(w.room, w.alice, "alice", "!start 10").await;
    let game = w.snapshot().await.expect("game started");
    assert_eq!(game.entry_amount, 10);
    assert_eq!(w.credits.balance_of(w.alice), BALANCE - 10);
}

#[tokio::test]
async fn draw_needs_matching_affinity() {
    let w = world();
    w.router.dispatch(w.room, w.admin, "admin", "/bot lowcard add").await;
    w.router.dispatch(w.room, w.alice, "alice", "!start 10").await;
    // A foreign-game play command is consumed without output.
    let before = w.broadcast.emitted().len();
    w.router.dispatch(w.room, w.alice, "alice", "!roll").await;
    assert_eq!(w.broadcast.emitted().len(), before);
}

#[tokio::test]
async fn unknown_chatter_is_ignored() {
    let w = world();
    w.router.dispatch(w.room, w.admin, "admin", "/bot lowcard add").await;
    let before = w.broadcast.emitted().len();
    w.router.dispatch(w.room, w.alice, "alice", "good luck all!").await;
    assert_eq!(w.broadcast.emitted().len(), before);
}

#[tokio::test]
async fn serializer_preserves_per_room_order() {
    let w = world();
    w.router.dispatch(w.room, w.admin, "admin", "/bot lowcard add").await;
    let serializer = RoomSerializer::new(w.router.clone());
    // If these two raced, the join would see no game and vanish silently;
    // in order, the second command hits "already joined".
    serializer.submit(w.command(w.alice, "alice", "!start 10"));
    serializer.submit(w.command(w.alice, "alice", "!j"));
    drained(&serializer).await;
    let game = w.snapshot().await.expect("game started");
    assert_eq!(game.players.len(), 1);
    assert!(w.whispers().iter().any(|m| m.contains("already joined")));
    assert_eq!(w.credits.balance_of(w.alice), BALANCE - 10);
}

#[tokio::test]
async fn bot_removal_refunds_waiting_game() {
    let w = world();
    w.router.dispatch(w.room, w.admin, "admin", "/bot lowcard add").await;
    w.router.dispatch(w.room, w.alice, "alice", "!start 25").await;
    assert_eq!(w.credits.balance_of(w.alice), BALANCE - 25);
    w.router.dispatch(w.room, w.admin, "admin", "/bot lowcard remove").await;
    assert_eq!(w.credits.balance_of(w.alice), BALANCE);
    assert!(w.snapshot().await.is_none());
}
