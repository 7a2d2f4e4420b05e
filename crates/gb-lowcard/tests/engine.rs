//! End-to-end engine scenarios against in-memory backends.
//!
//! Determinism comes from data, not mocked clocks: decks are preloaded
//! into the keyed store (draws pop the tail), and deadlines are rewritten
//! to the past before driving the poller by hand.

use async_trait::async_trait;
use gb_cards::Card;
use gb_core::Coins;
use gb_core::ID;
use gb_core::Room;
use gb_core::User;
use gb_core::now_ms;
use gb_keyed::KeyedStore;
use gb_keyed::MemoryStore;
use gb_keyed::StoreError;
use gb_ledger::Ledger;
use gb_ledger::MemoryCredits;
use gb_ledger::NoMerchants;
use gb_ledger::StaticMerchants;
use gb_lowcard::Game;
use gb_lowcard::LowCard;
use gb_lowcard::MemoryGames;
use gb_lowcard::Poller;
use gb_lowcard::RecordingBroadcaster;
use gb_lowcard::Status;
use gb_lowcard::deck_key;
use gb_lowcard::game_key;
use gb_lowcard::recovery;
use gb_lowcard::timer_key;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const BALANCE: Coins = 1_000;

struct Harness {
    store: Arc<MemoryStore>,
    credits: Arc<MemoryCredits>,
    games: Arc<MemoryGames>,
    broadcast: Arc<RecordingBroadcaster>,
    ledger: Arc<Ledger>,
    engine: Arc<LowCard>,
    poller: Poller,
    room: ID<Room>,
    alice: ID<User>,
    bob: ID<User>,
    carol: ID<User>,
}

fn harness() -> Harness {
    harness_with(|_, _| {})
}

fn harness_with(customize: impl FnOnce(&mut MemoryCredits, &mut MemoryGames)) -> Harness {
    let room: ID<Room> = ID::default();
    let alice: ID<User> = ID::default();
    let bob: ID<User> = ID::default();
    let carol: ID<User> = ID::default();
    let mut credits = MemoryCredits::new()
        .with_balance(alice, BALANCE)
        .with_balance(bob, BALANCE)
        .with_balance(carol, BALANCE);
    let mut games = MemoryGames::new().with_room_name(room, "Lounge");
    customize(&mut credits, &mut games);
    let store = Arc::new(MemoryStore::new());
    let credits = Arc::new(credits);
    let games = Arc::new(games);
    let broadcast = Arc::new(RecordingBroadcaster::new());
    let ledger = Arc::new(Ledger::new(
        credits.clone(),
        Arc::new(NoMerchants),
        store.clone(),
    ));
    let engine = Arc::new(LowCard::new(
        store.clone(),
        ledger.clone(),
        games.clone(),
        broadcast.clone(),
    ));
    let poller = Poller::new(engine.clone(), store.clone());
    Harness {
        store,
        credits,
        games,
        broadcast,
        ledger,
        engine,
        poller,
        room,
        alice,
        bob,
        carol,
    }
}

impl Harness {
    async fn snapshot(&self) -> Option<Game> {
        self.store
            .get(&game_key(self.room))
            .await
            .unwrap()
            .map(|json| serde_json::from_str(&json).unwrap())
    }

    async fn rewrite(&self, f: impl FnOnce(&mut Game)) {
        let mut game = self.snapshot().await.expect("game present");
        f(&mut game);
        self.store
            .set(
                &game_key(self.room),
                &serde_json::to_string(&game).unwrap(),
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
    }

    /// Back-dates the live timer so the next poller tick fires it.
    async fn expire_timer(&self) {
        let key = timer_key(self.room);
        let raw = self.store.get(&key).await.unwrap().expect("timer present");
        let mut timer: serde_json::Value = serde_json::from_str(&raw).unwrap();
        timer["expires_at"] = serde_json::json!(now_ms() - 1);
        self.store
            .set(&key, &timer.to_string(), Duration::from_secs(120))
            .await
            .unwrap();
    }

    /// Preloads the persisted deck; the LAST code listed is drawn FIRST.
    async fn preload_deck(&self, codes: &[&str]) {
        let cards: Vec<Card> = codes.iter().map(|c| Card::try_from(*c).unwrap()).collect();
        self.store
            .set(
                &deck_key(self.room),
                &serde_json::to_string(&cards).unwrap(),
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
    }

    /// Opens the draw window without waiting out the countdown.
    async fn open_draws(&self) {
        self.rewrite(|game| {
            game.countdown_ends_at = Some(now_ms() - 1_000);
            game.round_deadline = Some(now_ms() + 20_000);
        })
        .await;
    }

    /// Starts a three-player game and runs the join deadline.
    async fn seated_game(&self, entry: Coins) {
        assert!(
            self.engine
                .start_game(self.room, self.alice, "alice", Some(entry))
                .await
                .success
        );
        assert!(self.engine.join_game(self.room, self.bob, "bob").await.success);
        assert!(self.engine.join_game(self.room, self.carol, "carol").await.success);
        self.expire_timer().await;
        self.poller.tick().await.unwrap();
        assert_eq!(self.snapshot().await.unwrap().status, Status::Playing);
    }

    fn chat_lines(&self) -> Vec<String> {
        self.broadcast
            .named("chat:message")
            .into_iter()
            .filter_map(|e| {
                e.payload
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .collect()
    }
}

// ============================================================================
// S1 — single-game happy path
// ============================================================================

#[tokio::test]
async fn happy_path_lowest_card_loses() {
    let h = harness();
    h.seated_game(10).await;
    // Round 1: alice 5h, bob 9d, carol Ks; round 2: bob 4c, carol 7h.
    h.preload_deck(&["7h", "4c", "Ks", "9d", "5h"]).await;
    h.open_draws().await;
    assert!(h.engine.draw_card(h.room, h.alice, "alice").await.success);
    assert!(h.engine.draw_card(h.room, h.bob, "bob").await.success);
    assert!(h.engine.draw_card(h.room, h.carol, "carol").await.success);

    // Alice (5) is out; survivors' draw state reset for round 2.
    let game = h.snapshot().await.unwrap();
    assert_eq!(game.current_round, 2);
    assert!(game.player(h.alice).unwrap().is_eliminated);
    assert!(!game.player(h.bob).unwrap().has_drawn);
    assert!(game.player(h.carol).unwrap().current_card.is_none());

    h.open_draws().await;
    assert!(h.engine.draw_card(h.room, h.bob, "bob").await.success);
    assert!(h.engine.draw_card(h.room, h.carol, "carol").await.success);

    // Bob (4) is out; carol wins pot 30 minus fee 3.
    assert_eq!(h.credits.balance_of(h.alice), BALANCE - 10);
    assert_eq!(h.credits.balance_of(h.bob), BALANCE - 10);
    assert_eq!(h.credits.balance_of(h.carol), BALANCE + 17);
    let finished = h.games.finished();
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].winner, h.carol);
    assert_eq!(finished[0].pot, 30);
    assert_eq!(finished[0].fee, 3);

    // Cleanup: no game, deck, or timer keys remain.
    assert!(h.snapshot().await.is_none());
    assert!(h.store.get(&deck_key(h.room)).await.unwrap().is_none());
    assert!(h.store.get(&timer_key(h.room)).await.unwrap().is_none());

    let wins = h.broadcast.named("game:finished");
    assert_eq!(wins.len(), 1);
    assert_eq!(wins[0].payload["winnings"], 27);
}

// ============================================================================
// S2 — tie resolution
// ============================================================================

#[tokio::test]
async fn tie_breaker_narrows_to_tied_players() {
    let h = harness();
    h.seated_game(20).await;
    // R1: alice 5h, bob 5c, carol 9d (tie at 5).
    // R2 (tie): alice 6h out, bob 8s. R3: bob Td, carol 9c out.
    h.preload_deck(&["9c", "Td", "8s", "6h", "9d", "5c", "5h"]).await;
    h.open_draws().await;
    assert!(h.engine.draw_card(h.room, h.alice, "alice").await.success);
    assert!(h.engine.draw_card(h.room, h.bob, "bob").await.success);
    assert!(h.engine.draw_card(h.room, h.carol, "carol").await.success);

    let game = h.snapshot().await.unwrap();
    assert!(game.is_tie_breaker);
    assert!(game.player(h.alice).unwrap().in_tie_breaker);
    assert!(game.player(h.bob).unwrap().in_tie_breaker);
    assert!(!game.player(h.carol).unwrap().in_tie_breaker);
    // The bystander keeps waiting; their card stays until the tie resolves.
    assert!(game.player(h.carol).unwrap().has_drawn);

    h.open_draws().await;
    // Carol is not tied and may not draw.
    let refused = h.engine.draw_card(h.room, h.carol, "carol").await;
    assert!(!refused.success);
    assert!(h.engine.draw_card(h.room, h.alice, "alice").await.success);
    assert!(h.engine.draw_card(h.room, h.bob, "bob").await.success);

    // Tie broken: alice (6) eliminated, everyone reset for round 3.
    let game = h.snapshot().await.unwrap();
    assert!(!game.is_tie_breaker);
    assert!(game.player(h.alice).unwrap().is_eliminated);
    assert!(game.player(h.carol).unwrap().current_card.is_none());
    assert!(h.chat_lines().iter().any(|l| l.starts_with("Tie broken!")));

    h.open_draws().await;
    assert!(h.engine.draw_card(h.room, h.bob, "bob").await.success);
    assert!(h.engine.draw_card(h.room, h.carol, "carol").await.success);

    // Carol (9) eliminated; bob takes 60 - 6 = 54.
    assert_eq!(h.credits.balance_of(h.bob), BALANCE - 20 + 54);
    assert_eq!(h.credits.balance_of(h.alice), BALANCE - 20);
    assert_eq!(h.credits.balance_of(h.carol), BALANCE - 20);
}

// ============================================================================
// S3 — not-enough-players refund
// ============================================================================

#[tokio::test]
async fn solo_start_refunds_at_deadline() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(5))
            .await
            .success
    );
    assert_eq!(h.credits.balance_of(h.alice), BALANCE - 5);
    h.expire_timer().await;
    h.poller.tick().await.unwrap();
    assert_eq!(h.credits.balance_of(h.alice), BALANCE);
    assert!(h.snapshot().await.is_none());
    assert!(h.store.get(&deck_key(h.room)).await.unwrap().is_none());
    assert_eq!(h.broadcast.named("game:cancelled").len(), 1);
}

// ============================================================================
// S4 — lost snapshot write rolls the deduction back
// ============================================================================

/// Store whose game-snapshot writes vanish immediately, simulating a crash
/// between the write and the verification read.
struct LostWrites {
    inner: MemoryStore,
}

#[async_trait]
impl KeyedStore for LostWrites {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.set(key, value, ttl).await?;
        if key.starts_with("lowcard:game:") {
            self.inner.del(key).await?;
        }
        Ok(())
    }
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.inner.set_nx(key, value, ttl).await
    }
    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.inner.del(key).await
    }
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.inner.compare_and_delete(key, expected).await
    }
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(pattern).await
    }
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.expire(key, ttl).await
    }
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.inner.hget(key, field).await
    }
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.inner.hset(key, field, value).await
    }
    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        self.inner.hdel(key, field).await
    }
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        self.inner.publish(channel, payload).await
    }
    async fn subscribe(&self, channel: &str) -> Result<UnboundedReceiver<String>, StoreError> {
        self.inner.subscribe(channel).await
    }
}

#[tokio::test]
async fn failed_snapshot_write_refunds_starter() {
    let room: ID<Room> = ID::default();
    let alice: ID<User> = ID::default();
    let store: Arc<dyn KeyedStore> = Arc::new(LostWrites {
        inner: MemoryStore::new(),
    });
    let credits = Arc::new(MemoryCredits::new().with_balance(alice, BALANCE));
    let ledger = Arc::new(Ledger::new(credits.clone(), Arc::new(NoMerchants), store.clone()));
    let engine = LowCard::new(
        store,
        ledger,
        Arc::new(MemoryGames::new()),
        Arc::new(RecordingBroadcaster::new()),
    );
    let reply = engine.start_game(room, alice, "alice", Some(25)).await;
    assert!(!reply.success);
    assert!(reply.message.unwrap().contains("credits refunded"));
    assert_eq!(credits.balance_of(alice), BALANCE);
}

// ============================================================================
// S5 — cross-replica join idempotence
// ============================================================================

#[tokio::test]
async fn concurrent_joins_deduct_once() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(10))
            .await
            .success
    );
    // Two replicas share the same stores; both see bob's !j.
    let replica = Arc::new(LowCard::new(
        h.store.clone(),
        h.ledger.clone(),
        h.games.clone(),
        h.broadcast.clone(),
    ));
    let (a, b) = tokio::join!(
        h.engine.join_game(h.room, h.bob, "bob"),
        replica.join_game(h.room, h.bob, "bob"),
    );
    assert!(a.success != b.success, "exactly one join must win");
    let loser = if a.success { b } else { a };
    assert!(loser.message.unwrap().contains("already joined"));
    assert_eq!(h.credits.balance_of(h.bob), BALANCE - 10);
    assert_eq!(h.snapshot().await.unwrap().players.len(), 2);
}

// ============================================================================
// S6 — cancel rights
// ============================================================================

#[tokio::test]
async fn only_starter_cancels() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(10))
            .await
            .success
    );
    assert!(h.engine.join_game(h.room, h.bob, "bob").await.success);
    let reply = h.engine.cancel_by_starter(h.room, h.bob).await;
    assert!(!reply.success);
    assert_eq!(
        reply.message.unwrap(),
        "Only the game starter can cancel."
    );
    assert!(h.snapshot().await.is_some());

    let reply = h.engine.cancel_by_starter(h.room, h.alice).await;
    assert!(reply.success);
    assert_eq!(h.credits.balance_of(h.alice), BALANCE);
    assert_eq!(h.credits.balance_of(h.bob), BALANCE);
    assert!(h.snapshot().await.is_none());
}

// ============================================================================
// Boundaries
// ============================================================================

#[tokio::test]
async fn entry_bounds_are_enforced() {
    let h = harness();
    let low = h.engine.start_game(h.room, h.alice, "alice", Some(0)).await;
    assert!(!low.success);
    assert!(low.message.unwrap().contains("minimal"));
    let negative = h.engine.start_game(h.room, h.alice, "alice", Some(-5)).await;
    assert!(!negative.success);
    let high = h
        .engine
        .start_game(h.room, h.alice, "alice", Some(1_000_000_000))
        .await;
    assert!(!high.success);
    assert!(high.message.unwrap().contains("maximal"));
    assert_eq!(h.credits.balance_of(h.alice), BALANCE);
}

#[tokio::test]
async fn big_game_room_raises_minimum_and_lifts_cap() {
    let room: ID<Room> = ID::default();
    let whale: ID<User> = ID::default();
    let h = harness_with(|credits, games| {
        *credits = std::mem::take(credits).with_balance(whale, 2_000_000_000);
        *games = std::mem::take(games).with_room_name(room, "VIP Big Game Arena");
    });
    let small = h.engine.start_game(room, whale, "whale", Some(10)).await;
    assert!(!small.success);
    assert!(small.message.unwrap().contains("minimal 50"));
    let huge = h
        .engine
        .start_game(room, whale, "whale", Some(1_000_000_000))
        .await;
    assert!(huge.success);
}

#[tokio::test]
async fn join_after_deadline_is_rejected() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(10))
            .await
            .success
    );
    h.rewrite(|game| game.join_deadline = now_ms() - 1).await;
    let reply = h.engine.join_game(h.room, h.bob, "bob").await;
    assert!(!reply.success);
    assert_eq!(reply.message.unwrap(), "Join window closed.");
    assert_eq!(h.credits.balance_of(h.bob), BALANCE);
}

#[tokio::test]
async fn draw_before_countdown_is_silent() {
    let h = harness();
    h.seated_game(10).await;
    // countdown_ends_at is still in the future straight after begin
    let reply = h.engine.draw_card(h.room, h.alice, "alice").await;
    assert!(!reply.success);
    assert!(reply.silent);
}

#[tokio::test]
async fn second_start_is_rejected_while_waiting() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(10))
            .await
            .success
    );
    let reply = h.engine.start_game(h.room, h.bob, "bob", Some(10)).await;
    assert!(!reply.success);
    assert!(reply.message.unwrap().contains("in progress"));
    assert_eq!(h.credits.balance_of(h.bob), BALANCE);
}

#[tokio::test]
async fn stuck_waiting_game_is_cleared_by_next_start() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(10))
            .await
            .success
    );
    // Waiting, created >40s ago, and no live timer: stuck.
    h.rewrite(|game| game.created_at = now_ms() - 50_000).await;
    h.store.del(&timer_key(h.room)).await.unwrap();
    let reply = h.engine.start_game(h.room, h.bob, "bob", Some(20)).await;
    assert!(reply.success);
    assert_eq!(h.credits.balance_of(h.alice), BALANCE);
    let game = h.snapshot().await.unwrap();
    assert_eq!(game.started_by, h.bob);
    assert_eq!(game.entry_amount, 20);
}

// ============================================================================
// Conservation and recovery
// ============================================================================

#[tokio::test]
async fn finished_game_conserves_coins_with_commission() {
    let merchant: ID<User> = ID::default();
    let mut h = harness();
    // Rebuild the engine with a merchant tagged to the starter.
    let merchants = StaticMerchants::new().with_merchant(h.alice, merchant);
    let ledger = Arc::new(Ledger::new(h.credits.clone(), Arc::new(merchants), h.store.clone()));
    h.engine = Arc::new(LowCard::new(
        h.store.clone(),
        ledger,
        h.games.clone(),
        h.broadcast.clone(),
    ));
    h.poller = Poller::new(h.engine.clone(), h.store.clone());

    h.seated_game(100).await;
    h.preload_deck(&["7h", "4c", "Ks", "9d", "5h"]).await;
    h.open_draws().await;
    assert!(h.engine.draw_card(h.room, h.alice, "alice").await.success);
    assert!(h.engine.draw_card(h.room, h.bob, "bob").await.success);
    assert!(h.engine.draw_card(h.room, h.carol, "carol").await.success);
    h.open_draws().await;
    assert!(h.engine.draw_card(h.room, h.bob, "bob").await.success);
    assert!(h.engine.draw_card(h.room, h.carol, "carol").await.success);

    // pot 300, fee 30, commission 3 to alice's merchant.
    let delta_alice = h.credits.balance_of(h.alice) - BALANCE;
    let delta_bob = h.credits.balance_of(h.bob) - BALANCE;
    let delta_carol = h.credits.balance_of(h.carol) - BALANCE;
    let delta_merchant = h.credits.balance_of(merchant);
    assert_eq!(delta_carol, 170);
    assert_eq!(delta_merchant, 3);
    // Σ player deltas + house retention = 0
    assert_eq!(delta_alice + delta_bob + delta_carol + delta_merchant, -27);
    assert_eq!(h.games.summaries()[0].2, 3);
}

#[tokio::test]
async fn timed_out_players_are_auto_drawn() {
    let h = harness();
    h.seated_game(10).await;
    h.preload_deck(&["Ks", "9d", "5h"]).await;
    h.open_draws().await;
    assert!(h.engine.draw_card(h.room, h.alice, "alice").await.success);
    // Bob and carol never type !d; the round deadline fires instead.
    h.rewrite(|game| game.round_deadline = Some(now_ms() - 1)).await;
    h.engine.auto_draw_for_timeout(h.room).await;
    h.engine.tally_round(h.room, true).await;

    let game = h.snapshot().await.unwrap();
    assert_eq!(game.current_round, 2);
    assert!(game.player(h.alice).unwrap().is_eliminated);
    assert!(
        h.chat_lines()
            .iter()
            .any(|l| l.starts_with("Bot draws - bob:"))
    );
}

#[tokio::test]
async fn restart_recovery_refunds_once() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(40))
            .await
            .success
    );
    assert!(h.engine.join_game(h.room, h.bob, "bob").await.success);
    assert_eq!(h.credits.balance_of(h.alice), BALANCE - 40);

    let store: Arc<dyn KeyedStore> = h.store.clone();
    let refunded = recovery::sweep(&store, &h.ledger).await.unwrap();
    assert_eq!(refunded, 2);
    assert_eq!(h.credits.balance_of(h.alice), BALANCE);
    assert_eq!(h.credits.balance_of(h.bob), BALANCE);
    assert!(h.snapshot().await.is_none());

    // Idempotent: a second sweep finds nothing to refund.
    let again = recovery::sweep(&store, &h.ledger).await.unwrap();
    assert_eq!(again, 0);
    assert_eq!(h.credits.balance_of(h.alice), BALANCE);
}

#[tokio::test]
async fn reset_refunds_active_players_only() {
    let h = harness();
    h.seated_game(10).await;
    h.preload_deck(&["Ks", "9d", "5h"]).await;
    h.open_draws().await;
    assert!(h.engine.draw_card(h.room, h.alice, "alice").await.success);
    assert!(h.engine.draw_card(h.room, h.bob, "bob").await.success);
    assert!(h.engine.draw_card(h.room, h.carol, "carol").await.success);
    // Alice is eliminated; a reset refunds only bob and carol.
    let reply = h.engine.reset_game(h.room, "moderator").await;
    assert!(reply.success);
    assert_eq!(h.credits.balance_of(h.alice), BALANCE - 10);
    assert_eq!(h.credits.balance_of(h.bob), BALANCE);
    assert_eq!(h.credits.balance_of(h.carol), BALANCE);
    assert!(h.snapshot().await.is_none());
}

#[tokio::test]
async fn stale_waiting_game_is_refunded_before_new_start() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(10))
            .await
            .success
    );
    assert!(h.engine.join_game(h.room, h.bob, "bob").await.success);
    // Past join deadline plus the 120s grace period.
    h.rewrite(|game| game.join_deadline = now_ms() - 121_000).await;
    h.engine.check_and_cleanup_stale_game(h.room).await.unwrap();
    assert_eq!(h.credits.balance_of(h.alice), BALANCE);
    assert_eq!(h.credits.balance_of(h.bob), BALANCE);
    assert!(h.snapshot().await.is_none());
}

#[tokio::test]
async fn poller_double_fire_is_noop() {
    let h = harness();
    assert!(
        h.engine
            .start_game(h.room, h.alice, "alice", Some(10))
            .await
            .success
    );
    assert!(h.engine.join_game(h.room, h.bob, "bob").await.success);
    h.expire_timer().await;
    h.poller.tick().await.unwrap();
    let game = h.snapshot().await.unwrap();
    assert_eq!(game.status, Status::Playing);
    let round_one_countdown = game.countdown_ends_at;
    // A second begin (replica raced the same deadline) changes nothing.
    h.engine.begin_game(h.room).await;
    let game = h.snapshot().await.unwrap();
    assert_eq!(game.countdown_ends_at, round_one_countdown);
    assert_eq!(game.current_round, 1);
}
