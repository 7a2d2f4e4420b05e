use super::broadcast::Broadcaster;
use super::deck::Decks;
use super::events::ChatMessage;
use super::events::GameEvent;
use super::events::Tally;
use super::game::Game;
use super::game::Player;
use super::game::Status;
use super::keys;
use super::repository::GameRepository;
use super::repository::Outcome;
use super::timer::Phase;
use super::timer::Timers;
use gb_core::BIG_GAME_MARKER;
use gb_core::BIG_GAME_MIN_ENTRY;
use gb_core::COUNTDOWN_SECS;
use gb_core::Coins;
use gb_core::DRAW_LOCK_TTL_SECS;
use gb_core::GAME_TTL_SECS;
use gb_core::HOUSE_FEE_PERCENT;
use gb_core::ID;
use gb_core::JOIN_LOCK_TTL_SECS;
use gb_core::LOCK_RETRY_ATTEMPTS;
use gb_core::LOCK_RETRY_DELAY_MS;
use gb_core::MAX_ENTRY;
use gb_core::MERCHANT_COMMISSION_PERCENT;
use gb_core::MIN_ENTRY;
use gb_core::ROUND_TIMEOUT_SECS;
use gb_core::Room;
use gb_core::STALE_GRACE_SECS;
use gb_core::START_LOCK_TTL_SECS;
use gb_core::STUCK_GAME_SECS;
use gb_core::User;
use gb_core::now_ms;
use gb_keyed::KeyedStore;
use gb_keyed::LockGuard;
use gb_keyed::LockManager;
use gb_keyed::StoreError;
use gb_ledger::Ledger;
use gb_ledger::LedgerError;
use gb_pg::DbError;
use std::sync::Arc;
use std::time::Duration;

/// Result object returned by every engine entry point.
///
/// Validation failures carry a private message for the caller; silent
/// rejects produce no chat output at all. Infrastructure faults never
/// escape an entry point.
#[derive(Debug, Clone)]
pub struct Reply {
    pub success: bool,
    pub message: Option<String>,
    pub private: bool,
    pub silent: bool,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            private: false,
            silent: false,
        }
    }
    /// Success with a message for the caller (e.g. the card display token).
    pub fn announce(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            private: false,
            silent: false,
        }
    }
    /// Validation failure shown privately to the caller.
    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            private: true,
            silent: false,
        }
    }
    /// Success with a private message for the caller.
    pub fn confide(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            private: true,
            silent: false,
        }
    }
    /// Dropped with no chat output.
    pub fn silent() -> Self {
        Self {
            success: false,
            message: None,
            private: false,
            silent: true,
        }
    }
    pub fn busy() -> Self {
        Self::reject("Server busy, please try again.")
    }
}

/// Infrastructure fault inside an entry point. Converted to a refund plus
/// a user-facing failure reply at the boundary; never propagated out.
#[derive(Debug)]
pub enum Fault {
    Store(StoreError),
    Db(DbError),
    Ledger(LedgerError),
    /// Snapshot write could not be read back.
    Verification,
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{}", e),
            Self::Db(e) => write!(f, "{}", e),
            Self::Ledger(e) => write!(f, "{}", e),
            Self::Verification => write!(f, "snapshot verification failed"),
        }
    }
}

impl std::error::Error for Fault {}

impl From<StoreError> for Fault {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
impl From<DbError> for Fault {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}
impl From<LedgerError> for Fault {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}

/// The LowCard engine.
///
/// Entry points are serialized behind per-room keyed-store locks; within
/// one process the per-room command queue serializes further. The timer
/// poller is the only clock: no player action advances state past a
/// deadline on its own.
pub struct LowCard {
    store: Arc<dyn KeyedStore>,
    locks: LockManager,
    ledger: Arc<Ledger>,
    games: Arc<dyn GameRepository>,
    decks: Decks,
    timers: Timers,
    broadcast: Arc<dyn Broadcaster>,
}

impl LowCard {
    pub fn new(
        store: Arc<dyn KeyedStore>,
        ledger: Arc<Ledger>,
        games: Arc<dyn GameRepository>,
        broadcast: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            locks: LockManager::new(store.clone()),
            decks: Decks::new(store.clone()),
            timers: Timers::new(store.clone()),
            store,
            ledger,
            games,
            broadcast,
        }
    }

    // ========================================================================
    // START
    // ========================================================================

    /// `!start [amount]` — stakes the starter and opens the join window.
    pub async fn start_game(
        &self,
        room: ID<Room>,
        user: ID<User>,
        username: &str,
        amount: Option<Coins>,
    ) -> Reply {
        let Some(guard) = self
            .try_lock(&keys::start_lock_key(room), START_LOCK_TTL_SECS)
            .await
        else {
            return Reply::busy();
        };
        let reply = match self.start_locked(room, user, username, amount).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] start failed: {}", room, fault);
                Reply::reject("Server error, please try again.")
            }
        };
        guard.release().await;
        reply
    }

    async fn start_locked(
        &self,
        room: ID<Room>,
        user: ID<User>,
        username: &str,
        amount: Option<Coins>,
    ) -> Result<Reply, Fault> {
        self.check_and_cleanup_stale_game(room).await?;
        if let Some(game) = self.load(room).await? {
            let no_timer = self.timers.read(room).await?.is_none();
            let stuck = game.status == Status::Waiting
                && no_timer
                && now_ms() - game.created_at > (STUCK_GAME_SECS * 1000) as i64;
            if stuck {
                log::warn!("[lowcard {}] clearing stuck game {}", room, game.id);
                self.refund_all(&game, &format!("LowCard Refund - Stuck Game (Room {})", room), false)
                    .await;
                self.cleanup(room).await;
            } else if matches!(game.status, Status::Waiting | Status::Playing) {
                return Ok(Reply::reject("A LowCard game is already in progress."));
            } else {
                self.cleanup(room).await;
            }
        }
        let name = self.games.room_name(room).await?;
        let big = name
            .map(|n| n.to_lowercase().contains(BIG_GAME_MARKER))
            .unwrap_or(false);
        let (min, max) = match big {
            true => (BIG_GAME_MIN_ENTRY, Coins::MAX),
            false => (MIN_ENTRY, MAX_ENTRY),
        };
        let entry = amount.unwrap_or(min);
        if entry < min {
            return Ok(Reply::reject(format!("Invalid amount, minimal {} COINS.", min)));
        }
        if entry > max {
            return Ok(Reply::reject(format!("Invalid amount, maximal {} COINS.", max)));
        }
        let game = Game::new(room, user, username, entry);
        let debit = self
            .ledger
            .deduct(
                user,
                entry,
                username,
                &format!("LowCard Entry (Room {})", room),
                &game.id.to_string(),
            )
            .await?;
        if !debit.success {
            return Ok(Reply::reject("Not enough credits."));
        }
        self.emit_credits(room, user, debit.balance).await;
        // Everything past the deduction rolls back through a refund.
        match self.create_started(room, game, username).await {
            Ok(reply) => Ok(reply),
            Err(fault) => {
                log::error!("[lowcard {}] rollback after failed start: {}", room, fault);
                let starter = Player::new(user, username);
                self.refund_player(
                    room,
                    &starter,
                    entry,
                    &format!("LowCard Refund - Game Creation Failed (Room {})", room),
                )
                .await;
                self.cleanup(room).await;
                Ok(Reply::reject("Game creation failed, credits refunded. Try again."))
            }
        }
    }

    async fn create_started(
        &self,
        room: ID<Room>,
        mut game: Game,
        username: &str,
    ) -> Result<Reply, Fault> {
        self.games
            .record_history(game.started_by, username, Outcome::Lose, 0)
            .await?;
        let db_id = self.games.create_game(&game).await?;
        game.db_id = Some(db_id);
        self.save(&game).await?;
        // Verify by reading the snapshot back before trusting the write.
        match self.load(room).await? {
            Some(stored) if stored.id == game.id => {}
            _ => return Err(Fault::Verification),
        }
        self.timers.set(room, Phase::Join, game.join_deadline, 0).await?;
        self.emit(room, GameEvent::started(&game)).await;
        self.say(
            room,
            format!(
                "{} started LowCard! Entry {} COINS. Type !j to join ({}s).",
                username,
                game.entry_amount,
                gb_core::JOIN_WINDOW_SECS
            ),
        )
        .await;
        log::info!(
            "[lowcard {}] game {} started by {} for {} COINS",
            room,
            game.id,
            username,
            game.entry_amount
        );
        Ok(Reply::ok())
    }

    // ========================================================================
    // JOIN
    // ========================================================================

    /// `!j` — stakes the caller and seats them before the deadline.
    pub async fn join_game(&self, room: ID<Room>, user: ID<User>, username: &str) -> Reply {
        let Some(guard) = self.try_join_lock(room).await else {
            return Reply::busy();
        };
        let reply = match self.join_locked(room, user, username).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] join failed: {}", room, fault);
                Reply::reject("Server error, please try again.")
            }
        };
        guard.release().await;
        reply
    }

    async fn join_locked(
        &self,
        room: ID<Room>,
        user: ID<User>,
        username: &str,
    ) -> Result<Reply, Fault> {
        let Some(mut game) = self.load(room).await? else {
            return Ok(Reply::silent());
        };
        if game.status != Status::Waiting {
            return Ok(Reply::reject("The game already started."));
        }
        if now_ms() > game.join_deadline {
            return Ok(Reply::reject("Join window closed."));
        }
        if game.has_player(user) {
            return Ok(Reply::reject("You already joined this game."));
        }
        let debit = self
            .ledger
            .deduct(
                user,
                game.entry_amount,
                username,
                &format!("LowCard Entry (Room {})", room),
                &game.id.to_string(),
            )
            .await?;
        if !debit.success {
            return Ok(Reply::reject("Not enough credits."));
        }
        if debit.used_tagged > 0 {
            log::debug!(
                "[lowcard {}] {} used {} tagged credits",
                room,
                username,
                debit.used_tagged
            );
        }
        self.emit_credits(room, user, debit.balance).await;
        match self.commit_join(room, &mut game, user, username).await {
            Ok(reply) => Ok(reply),
            Err(fault) => {
                log::error!("[lowcard {}] rollback after failed join: {}", room, fault);
                let joiner = Player::new(user, username);
                self.refund_player(
                    room,
                    &joiner,
                    game.entry_amount,
                    &format!("LowCard Refund - Join Failed (Room {})", room),
                )
                .await;
                Ok(Reply::reject("Join failed, credits refunded. Try again."))
            }
        }
    }

    async fn commit_join(
        &self,
        room: ID<Room>,
        game: &mut Game,
        user: ID<User>,
        username: &str,
    ) -> Result<Reply, Fault> {
        game.add_player(user, username);
        self.save(game).await?;
        self.emit(room, GameEvent::joined(game, user, username)).await;
        self.say(
            room,
            format!(
                "{} joined! {} players, pot {} COINS.",
                username,
                game.players.len(),
                game.pot
            ),
        )
        .await;
        Ok(Reply::ok())
    }

    // ========================================================================
    // BEGIN (join deadline fired)
    // ========================================================================

    /// Join window closed: start round 1 or refund a short table.
    /// Invoked by the timer poller.
    pub async fn begin_game(&self, room: ID<Room>) -> Reply {
        let Some(guard) = self.try_join_lock(room).await else {
            // Timer stays in place; the next tick retries.
            return Reply::silent();
        };
        let reply = match self.begin_locked(room).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] begin failed: {}", room, fault);
                Reply::silent()
            }
        };
        guard.release().await;
        reply
    }

    async fn begin_locked(&self, room: ID<Room>) -> Result<Reply, Fault> {
        let Some(mut game) = self.load(room).await? else {
            self.timers.clear(room).await?;
            return Ok(Reply::silent());
        };
        if game.status != Status::Waiting {
            return Ok(Reply::silent());
        }
        if game.players.len() < 2 {
            let refunded = self
                .refund_all(
                    &game,
                    &format!("LowCard Refund - Not Enough Players (Room {})", room),
                    false,
                )
                .await;
            self.cleanup(room).await;
            self.emit(room, GameEvent::cancelled(&game, "not_enough_players", refunded))
                .await;
            self.say(room, "Not enough players. Entries refunded.").await;
            log::info!("[lowcard {}] game {} cancelled, short table", room, game.id);
            return Ok(Reply::ok());
        }
        game.status = Status::Playing;
        game.current_round = 1;
        game.reset_round();
        self.decks.reset(room).await?;
        self.schedule_round(room, &mut game).await?;
        self.emit(room, GameEvent::countdown(&game)).await;
        self.say(
            room,
            format!(
                "Game starting with {} players! Round 1 in {}s...",
                game.players.len(),
                COUNTDOWN_SECS
            ),
        )
        .await;
        Ok(Reply::ok())
    }

    /// Sets fresh countdown and round deadlines, persists, and arms the
    /// countdown timer. The round deadline is fixed here, atomically with
    /// the countdown, so the countdown transition never re-derives it.
    async fn schedule_round(&self, room: ID<Room>, game: &mut Game) -> Result<(), Fault> {
        let countdown = now_ms() + (COUNTDOWN_SECS * 1000) as i64;
        game.countdown_ends_at = Some(countdown);
        game.round_deadline = Some(countdown + (ROUND_TIMEOUT_SECS * 1000) as i64);
        game.is_round_started = false;
        self.save(game).await?;
        self.timers
            .set(room, Phase::Countdown, countdown, game.current_round)
            .await?;
        Ok(())
    }

    // ========================================================================
    // ROUND OPEN (countdown fired)
    // ========================================================================

    /// Countdown ended: announce the draw window and arm the round timer.
    /// Invoked by the timer poller; idempotent via `is_round_started`.
    pub async fn open_round(&self, room: ID<Room>) -> Reply {
        let Some(guard) = self
            .try_lock(&keys::draw_lock_key(room), DRAW_LOCK_TTL_SECS)
            .await
        else {
            return Reply::silent();
        };
        let reply = match self.open_locked(room).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] round open failed: {}", room, fault);
                Reply::silent()
            }
        };
        guard.release().await;
        reply
    }

    async fn open_locked(&self, room: ID<Room>) -> Result<Reply, Fault> {
        let Some(mut game) = self.load(room).await? else {
            self.timers.clear(room).await?;
            return Ok(Reply::silent());
        };
        if game.status != Status::Playing || game.is_round_started {
            return Ok(Reply::silent());
        }
        game.is_round_started = true;
        self.save(&game).await?;
        let deadline = game
            .round_deadline
            .unwrap_or_else(|| now_ms() + (ROUND_TIMEOUT_SECS * 1000) as i64);
        self.timers
            .set(room, Phase::Round, deadline, game.current_round)
            .await?;
        self.emit(room, GameEvent::round_started(&game)).await;
        let line = match game.is_tie_breaker {
            true => format!(
                "Tie-breaker round {}! Tied players, type !d to draw ({}s).",
                game.current_round, ROUND_TIMEOUT_SECS
            ),
            false => format!(
                "Round {}! Type !d to draw your card ({}s).",
                game.current_round, ROUND_TIMEOUT_SECS
            ),
        };
        self.say(room, line).await;
        Ok(Reply::ok())
    }

    // ========================================================================
    // DRAW
    // ========================================================================

    /// `!d` — draw one card for the caller.
    pub async fn draw_card(&self, room: ID<Room>, user: ID<User>, username: &str) -> Reply {
        let Some(guard) = self.try_draw_lock(room).await else {
            return Reply::busy();
        };
        let reply = match self.draw_locked(room, user, username).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] draw failed: {}", room, fault);
                Reply::reject("Server error, please try again.")
            }
        };
        guard.release().await;
        reply
    }

    async fn draw_locked(
        &self,
        room: ID<Room>,
        user: ID<User>,
        username: &str,
    ) -> Result<Reply, Fault> {
        let Some(mut game) = self.load(room).await? else {
            return Ok(Reply::silent());
        };
        if game.status != Status::Playing {
            return Ok(Reply::silent());
        }
        // Draws refuse early; only the poller advances past a deadline.
        match game.countdown_ends_at {
            Some(countdown) if now_ms() >= countdown => {}
            _ => return Ok(Reply::silent()),
        }
        let is_tie_breaker = game.is_tie_breaker;
        let Some(player) = game.player_mut(user) else {
            return Ok(Reply::reject("You are not in this game."));
        };
        if player.is_eliminated {
            return Ok(Reply::reject("You are eliminated."));
        }
        if is_tie_breaker && !player.in_tie_breaker {
            return Ok(Reply::reject("Only tied players draw this round."));
        }
        if player.has_drawn {
            return Ok(Reply::silent());
        }
        let card = self.decks.draw(room).await?;
        player.has_drawn = true;
        player.current_card = Some(card);
        self.save(&game).await?;
        self.emit(room, GameEvent::draw(&game, user, username, card, false))
            .await;
        self.say(room, format!("{}: [CARD:{}]", username, card.code())).await;
        if game.all_scoped_drawn() {
            self.tally_locked(room, &mut game, false).await?;
        }
        Ok(Reply::announce(format!("[CARD:{}]", card.code())))
    }

    // ========================================================================
    // TIMEOUT DRAWS (round deadline fired)
    // ========================================================================

    /// Draws for every in-scope player who missed the deadline. No lock:
    /// only the timer poller calls this, and the poller serializes itself.
    pub async fn auto_draw_for_timeout(&self, room: ID<Room>) -> Reply {
        match self.auto_draw_inner(room).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] auto-draw failed: {}", room, fault);
                Reply::silent()
            }
        }
    }

    async fn auto_draw_inner(&self, room: ID<Room>) -> Result<Reply, Fault> {
        let Some(mut game) = self.load(room).await? else {
            self.timers.clear(room).await?;
            return Ok(Reply::silent());
        };
        if game.status != Status::Playing {
            return Ok(Reply::silent());
        }
        let undrawn: Vec<ID<User>> = game
            .scoped()
            .filter(|p| !p.has_drawn)
            .map(|p| p.user_id)
            .collect();
        if undrawn.is_empty() {
            return Ok(Reply::ok());
        }
        let mut drawn = Vec::new();
        for user in undrawn {
            let card = self.decks.draw(room).await?;
            let player = game.player_mut(user).expect("scoped player exists");
            player.has_drawn = true;
            player.current_card = Some(card);
            drawn.push((user, player.username.clone(), card));
        }
        self.save(&game).await?;
        for (user, username, card) in drawn {
            self.emit(room, GameEvent::draw(&game, user, &username, card, true))
                .await;
            self.say(room, format!("Bot draws - {}: [CARD:{}]", username, card.code()))
                .await;
        }
        Ok(Reply::ok())
    }

    // ========================================================================
    // TALLY
    // ========================================================================

    /// Resolves the round once every in-scope player holds a card.
    /// Phase-bound: reached from a completing draw (under the draw lock)
    /// or from the poller after auto-draws.
    pub async fn tally_round(&self, room: ID<Room>, timed_out: bool) -> Reply {
        let mut game = match self.load(room).await {
            Ok(Some(game)) => game,
            Ok(None) => {
                let _ = self.timers.clear(room).await;
                return Reply::silent();
            }
            Err(fault) => {
                log::error!("[lowcard {}] tally load failed: {}", room, fault);
                return Reply::silent();
            }
        };
        match self.tally_locked(room, &mut game, timed_out).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] tally failed: {}", room, fault);
                Reply::silent()
            }
        }
    }

    async fn tally_locked(
        &self,
        room: ID<Room>,
        game: &mut Game,
        timed_out: bool,
    ) -> Result<Reply, Fault> {
        if game.status != Status::Playing {
            return Ok(Reply::silent());
        }
        if !timed_out && !game.all_scoped_drawn() {
            return Ok(Reply::silent());
        }
        let drawn: Vec<(ID<User>, u8)> = game
            .scoped()
            .filter_map(|p| p.current_card.map(|c| (p.user_id, c.value())))
            .collect();
        let Some(lowest) = drawn.iter().map(|(_, v)| *v).min() else {
            log::warn!("[lowcard {}] tally with no cards drawn", room);
            return Ok(Reply::silent());
        };
        let losers: Vec<ID<User>> = drawn
            .iter()
            .filter(|(_, v)| *v == lowest)
            .map(|(u, _)| *u)
            .collect();
        match losers.as_slice() {
            [loser] => self.eliminate(room, game, *loser).await,
            tied => self.tie_break(room, game, tied, lowest).await,
        }
    }

    async fn eliminate(
        &self,
        room: ID<Room>,
        game: &mut Game,
        loser: ID<User>,
    ) -> Result<Reply, Fault> {
        let tie_broken = game.was_tie_breaker;
        game.is_tie_breaker = false;
        game.was_tie_breaker = false;
        for player in game.players.iter_mut() {
            player.in_tie_breaker = false;
        }
        let (username, card) = {
            let player = game.player_mut(loser).expect("loser is seated");
            player.is_eliminated = true;
            (
                player.username.clone(),
                player.current_card.expect("loser drew"),
            )
        };
        let remaining = game.survivors();
        self.emit(
            room,
            GameEvent::tallied(
                game,
                Tally::Eliminated {
                    user_id: loser,
                    username: username.clone(),
                    card,
                    remaining,
                    tie_broken,
                },
            ),
        )
        .await;
        let prefix = match tie_broken {
            true => "Tie broken! ",
            false => "",
        };
        self.say(
            room,
            format!(
                "{}{} drew the lowest card ({}) and is eliminated! {} remain.",
                prefix,
                username,
                card.code(),
                remaining
            ),
        )
        .await;
        if remaining < 2 {
            return self.finish(room, game).await;
        }
        game.current_round += 1;
        game.reset_round();
        self.schedule_round(room, game).await?;
        self.emit(room, GameEvent::countdown(game)).await;
        Ok(Reply::ok())
    }

    async fn tie_break(
        &self,
        room: ID<Room>,
        game: &mut Game,
        tied: &[ID<User>],
        value: u8,
    ) -> Result<Reply, Fault> {
        game.is_tie_breaker = true;
        game.was_tie_breaker = true;
        let mut names = Vec::new();
        for player in game.players.iter_mut() {
            let in_tie = tied.contains(&player.user_id);
            player.in_tie_breaker = in_tie && !player.is_eliminated;
            if player.in_tie_breaker {
                player.has_drawn = false;
                player.current_card = None;
                names.push(player.username.clone());
            }
        }
        game.current_round += 1;
        self.schedule_round(room, game).await?;
        self.emit(
            room,
            GameEvent::tallied(
                game,
                Tally::Tie {
                    value,
                    tied: names.clone(),
                },
            ),
        )
        .await;
        self.say(
            room,
            format!("Tie at {}! {} draw again.", value, names.join(", ")),
        )
        .await;
        Ok(Reply::ok())
    }

    // ========================================================================
    // FINISH
    // ========================================================================

    async fn finish(&self, room: ID<Room>, game: &mut Game) -> Result<Reply, Fault> {
        let Some(winner) = game.players.iter().find(|p| !p.is_eliminated).cloned() else {
            log::error!("[lowcard {}] finish with no survivor, voiding game", room);
            self.void(room, game).await;
            return Ok(Reply::silent());
        };
        let fee = game.pot * HOUSE_FEE_PERCENT / 100;
        let winnings = game.pot - fee;
        game.status = Status::Finished;
        game.winner_id = Some(winner.user_id);
        game.winner_username = Some(winner.username.clone());
        game.winnings = Some(winnings);
        game.house_fee = Some(fee);
        game.finished_at = Some(now_ms());
        let paid = self
            .ledger
            .credit(
                winner.user_id,
                winnings,
                &winner.username,
                &format!("LowCard Win (Room {})", room),
            )
            .await;
        let balance = match paid {
            Ok(balance) => balance,
            Err(e) => {
                // The pot cannot be paid out; void the game instead.
                log::error!("[lowcard {}] CRITICAL: payout failed: {}, voiding game", room, e);
                self.void(room, game).await;
                return Ok(Reply::silent());
            }
        };
        self.emit_credits(room, winner.user_id, balance).await;
        // Record-keeping failures are logged, not compensated: the payout
        // already happened and must stand.
        if let Err(e) = self
            .games
            .record_history(winner.user_id, &winner.username, Outcome::Win, winnings)
            .await
        {
            log::error!("[lowcard {}] history write failed: {}", room, e);
        }
        if let Some(db_id) = game.db_id {
            if let Err(e) = self.games.finish_game(db_id, winner.user_id, game.pot, fee).await {
                log::error!("[lowcard {}] game row update failed: {}", room, e);
            }
        }
        let commission = fee * MERCHANT_COMMISSION_PERCENT / 100;
        let commission = match commission > 0 {
            true => match self.ledger.active_merchant(game.started_by).await {
                Ok(Some(merchant)) => {
                    match self
                        .ledger
                        .credit(
                            merchant,
                            commission,
                            "merchant",
                            &format!("LowCard Commission (Room {})", room),
                        )
                        .await
                    {
                        Ok(_) => commission,
                        Err(e) => {
                            log::error!("[lowcard {}] commission payout failed: {}", room, e);
                            0
                        }
                    }
                }
                Ok(None) => 0,
                Err(e) => {
                    log::error!("[lowcard {}] merchant lookup failed: {}", room, e);
                    0
                }
            },
            false => 0,
        };
        if let Err(e) = self
            .games
            .record_summary(game, &winner.username, commission)
            .await
        {
            log::error!("[lowcard {}] summary write failed: {}", room, e);
        }
        self.cleanup(room).await;
        self.emit(room, GameEvent::finished(game)).await;
        self.say(
            room,
            format!(
                "{} wins {} COINS! (pot {}, house fee {})",
                winner.username, winnings, game.pot, fee
            ),
        )
        .await;
        log::info!(
            "[lowcard {}] game {} finished, {} won {} of {}",
            room,
            game.id,
            winner.username,
            winnings,
            game.pot
        );
        Ok(Reply::ok())
    }

    /// Refund every entry and erase the game. Last resort when the pot
    /// cannot be settled.
    async fn void(&self, room: ID<Room>, game: &Game) {
        let refunded = self
            .refund_all(game, &format!("LowCard Refund - Game Voided (Room {})", room), false)
            .await;
        self.cleanup(room).await;
        self.emit(room, GameEvent::cancelled(game, "voided", refunded)).await;
        self.say(room, "Game voided. Entries refunded.").await;
    }

    // ========================================================================
    // CANCEL / STOP / RESET / STALE
    // ========================================================================

    /// `!cancel` — only the starter, only while waiting.
    pub async fn cancel_by_starter(&self, room: ID<Room>, user: ID<User>) -> Reply {
        let Some(guard) = self.try_join_lock(room).await else {
            return Reply::busy();
        };
        let reply = match self.cancel_locked(room, user).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] cancel failed: {}", room, fault);
                Reply::reject("Server error, please try again.")
            }
        };
        guard.release().await;
        reply
    }

    async fn cancel_locked(&self, room: ID<Room>, user: ID<User>) -> Result<Reply, Fault> {
        let Some(game) = self.load(room).await? else {
            return Ok(Reply::silent());
        };
        if game.status != Status::Waiting {
            return Ok(Reply::reject("You can only cancel while waiting for players."));
        }
        if game.started_by != user {
            return Ok(Reply::reject("Only the game starter can cancel."));
        }
        let refunded = self
            .refund_all(&game, &format!("LowCard Refund - Game Cancelled (Room {})", room), false)
            .await;
        self.cleanup(room).await;
        self.emit(room, GameEvent::cancelled(&game, "cancelled_by_starter", refunded))
            .await;
        self.say(room, "Game cancelled. Entries refunded.").await;
        Ok(Reply::ok())
    }

    /// `!stop` — anyone, only while waiting.
    pub async fn stop_game(&self, room: ID<Room>) -> Reply {
        let Some(guard) = self.try_join_lock(room).await else {
            return Reply::busy();
        };
        let reply = match self.stop_locked(room).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] stop failed: {}", room, fault);
                Reply::reject("Server error, please try again.")
            }
        };
        guard.release().await;
        reply
    }

    async fn stop_locked(&self, room: ID<Room>) -> Result<Reply, Fault> {
        let Some(game) = self.load(room).await? else {
            return Ok(Reply::silent());
        };
        if game.status != Status::Waiting {
            return Ok(Reply::reject("You can only stop a waiting game."));
        }
        let refunded = self
            .refund_all(&game, &format!("LowCard Refund - Game Stopped (Room {})", room), false)
            .await;
        self.cleanup(room).await;
        self.emit(room, GameEvent::cancelled(&game, "stopped", refunded)).await;
        self.say(room, "Game stopped. Entries refunded.").await;
        Ok(Reply::ok())
    }

    /// `!reset` — unconditional; refunds everyone still in the game.
    pub async fn reset_game(&self, room: ID<Room>, by_username: &str) -> Reply {
        let Some(guard) = self.try_join_lock(room).await else {
            return Reply::busy();
        };
        let reply = match self.reset_locked(room, by_username).await {
            Ok(reply) => reply,
            Err(fault) => {
                log::error!("[lowcard {}] reset failed: {}", room, fault);
                Reply::reject("Server error, please try again.")
            }
        };
        guard.release().await;
        reply
    }

    async fn reset_locked(&self, room: ID<Room>, by_username: &str) -> Result<Reply, Fault> {
        let Some(game) = self.load(room).await? else {
            // Nothing to refund; still scrub residue keys.
            self.cleanup(room).await;
            return Ok(Reply::silent());
        };
        let refunded = self
            .refund_all(&game, &format!("LowCard Refund - Game Reset (Room {})", room), true)
            .await;
        self.cleanup(room).await;
        self.emit(room, GameEvent::cancelled(&game, "reset", refunded)).await;
        self.say(room, format!("Game reset by {}. Entries refunded.", by_username))
            .await;
        Ok(Reply::ok())
    }

    /// Refund and erase a waiting game stranded past its join deadline.
    /// Runs at the top of `start_game`, under the start lock.
    pub async fn check_and_cleanup_stale_game(&self, room: ID<Room>) -> Result<(), Fault> {
        let Some(game) = self.load(room).await? else {
            return Ok(());
        };
        let expired = game.status == Status::Waiting
            && now_ms() > game.join_deadline + (STALE_GRACE_SECS * 1000) as i64;
        if !expired {
            return Ok(());
        }
        log::warn!("[lowcard {}] cleaning stale game {}", room, game.id);
        let refunded = self
            .refund_all(&game, &format!("LowCard Refund - Stale Game (Room {})", room), false)
            .await;
        self.cleanup(room).await;
        self.emit(room, GameEvent::cancelled(&game, "stale", refunded)).await;
        Ok(())
    }

    // ========================================================================
    // SHARED PLUMBING
    // ========================================================================

    async fn load(&self, room: ID<Room>) -> Result<Option<Game>, Fault> {
        let raw = self.store.get(&keys::game_key(room)).await?;
        match raw {
            None => Ok(None),
            Some(json) => match serde_json::from_str(&json) {
                Ok(game) => Ok(Some(game)),
                Err(e) => {
                    log::warn!("[lowcard {}] unreadable snapshot dropped: {}", room, e);
                    self.store.del(&keys::game_key(room)).await?;
                    Ok(None)
                }
            },
        }
    }

    async fn save(&self, game: &Game) -> Result<(), Fault> {
        let json = serde_json::to_string(game).expect("serialize game");
        self.store
            .set(
                &keys::game_key(game.room_id),
                &json,
                Duration::from_secs(GAME_TTL_SECS),
            )
            .await?;
        Ok(())
    }

    /// Deletes game, deck, and timer keys for the room.
    async fn cleanup(&self, room: ID<Room>) {
        if let Err(e) = self.store.del(&keys::game_key(room)).await {
            log::error!("[lowcard {}] cleanup of game key failed: {}", room, e);
        }
        if let Err(e) = self.decks.delete(room).await {
            log::error!("[lowcard {}] cleanup of deck failed: {}", room, e);
        }
        if let Err(e) = self.timers.clear(room).await {
            log::error!("[lowcard {}] cleanup of timer failed: {}", room, e);
        }
    }

    /// Refunds the entry to every (optionally only non-eliminated) player,
    /// logging each success or failure individually. Returns the count of
    /// successful refunds.
    async fn refund_all(&self, game: &Game, reason: &str, only_active: bool) -> usize {
        let mut refunded = 0;
        for player in &game.players {
            if only_active && player.is_eliminated {
                continue;
            }
            if self
                .refund_player(game.room_id, player, game.entry_amount, reason)
                .await
            {
                refunded += 1;
            }
        }
        refunded
    }

    async fn refund_player(
        &self,
        room: ID<Room>,
        player: &Player,
        amount: Coins,
        reason: &str,
    ) -> bool {
        match self
            .ledger
            .credit(player.user_id, amount, &player.username, reason)
            .await
        {
            Ok(balance) => {
                log::info!(
                    "[lowcard {}] refunded {} COINS to {}",
                    room,
                    amount,
                    player.username
                );
                self.ledger.invalidate(player.user_id).await;
                self.emit_credits(room, player.user_id, balance).await;
                true
            }
            Err(e) => {
                log::error!(
                    "[lowcard {}] CRITICAL: refund of {} to {} failed: {}",
                    room,
                    amount,
                    player.username,
                    e
                );
                false
            }
        }
    }

    async fn try_lock(&self, key: &str, ttl_secs: u64) -> Option<LockGuard> {
        match self.locks.acquire(key, Duration::from_secs(ttl_secs)).await {
            Ok(guard) => guard,
            Err(e) => {
                log::error!("[lock] acquire of {} failed: {}", key, e);
                None
            }
        }
    }

    async fn try_join_lock(&self, room: ID<Room>) -> Option<LockGuard> {
        match self
            .locks
            .acquire_with_retry(
                &keys::join_lock_key(room),
                Duration::from_secs(JOIN_LOCK_TTL_SECS),
                LOCK_RETRY_ATTEMPTS,
                Duration::from_millis(LOCK_RETRY_DELAY_MS),
            )
            .await
        {
            Ok(guard) => guard,
            Err(e) => {
                log::error!("[lock] join lock for {} failed: {}", room, e);
                None
            }
        }
    }

    async fn try_draw_lock(&self, room: ID<Room>) -> Option<LockGuard> {
        match self
            .locks
            .acquire_with_retry(
                &keys::draw_lock_key(room),
                Duration::from_secs(DRAW_LOCK_TTL_SECS),
                LOCK_RETRY_ATTEMPTS,
                Duration::from_millis(LOCK_RETRY_DELAY_MS),
            )
            .await
        {
            Ok(guard) => guard,
            Err(e) => {
                log::error!("[lock] draw lock for {} failed: {}", room, e);
                None
            }
        }
    }

    async fn emit(&self, room: ID<Room>, event: GameEvent) {
        self.broadcast.emit_to(room, event.name(), event.to_value()).await;
    }

    async fn say(&self, room: ID<Room>, message: impl Into<String>) {
        let chat = ChatMessage::public(message);
        self.broadcast.emit_to(room, "chat:message", chat.to_value()).await;
    }

    /// Private chat line to one user in the room.
    pub async fn whisper(&self, room: ID<Room>, user: ID<User>, message: impl Into<String>) {
        let chat = ChatMessage::private(user, message);
        self.broadcast.emit_to(room, "chat:message", chat.to_value()).await;
    }

    async fn emit_credits(&self, room: ID<Room>, user: ID<User>, balance: Coins) {
        self.broadcast
            .emit_to(
                room,
                "credits:updated",
                serde_json::json!({
                    "room_id": room,
                    "user_id": user,
                    "balance": balance,
                }),
            )
            .await;
    }
}
