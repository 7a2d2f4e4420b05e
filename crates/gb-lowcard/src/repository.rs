use super::game::Game;
use async_trait::async_trait;
use gb_core::Coins;
use gb_core::ID;
use gb_core::Room;
use gb_core::User;
use gb_core::now_ms;
use gb_pg::DbError;
use gb_pg::GAME_HISTORY;
use gb_pg::LOWCARD_GAMES;
use gb_pg::LOWCARD_HISTORY;
use gb_pg::ROOMS;
use gb_pg::ROOM_ADMINS;
use gb_pg::Schema;
use gb_pg::USERS;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::Arc;
use tokio_postgres::Client;

/// Per-player outcome recorded in `game_history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Lose,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Win => write!(f, "win"),
            Self::Lose => write!(f, "lose"),
        }
    }
}

/// Durable-store operations for game records and room metadata.
#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn room_name(&self, room: ID<Room>) -> Result<Option<String>, DbError>;
    /// Room owner, per-room admin grant, or system admin role.
    async fn is_room_admin(&self, room: ID<Room>, user: ID<User>) -> Result<bool, DbError>;
    /// One `game_history` row: lose/0 at start, win/reward at finish.
    async fn record_history(
        &self,
        user: ID<User>,
        username: &str,
        outcome: Outcome,
        reward: Coins,
    ) -> Result<(), DbError>;
    /// Insert the `lowcard_games` row at start; returns its id.
    async fn create_game(&self, game: &Game) -> Result<i64, DbError>;
    /// Mark the `lowcard_games` row finished with winner and fee.
    async fn finish_game(
        &self,
        db_id: i64,
        winner: ID<User>,
        pot: Coins,
        fee: Coins,
    ) -> Result<(), DbError>;
    /// Insert the `lowcard_history` summary on finish.
    async fn record_summary(
        &self,
        game: &Game,
        winner_username: &str,
        commission: Coins,
    ) -> Result<(), DbError>;
}

#[async_trait]
impl GameRepository for Arc<Client> {
    async fn room_name(&self, room: ID<Room>) -> Result<Option<String>, DbError> {
        let row = self
            .query_opt(
                const_format::concatcp!("SELECT name FROM ", ROOMS, " WHERE id = $1"),
                &[&room.inner()],
            )
            .await?;
        Ok(row.map(|row| row.get::<_, String>(0)))
    }
    async fn is_room_admin(&self, room: ID<Room>, user: ID<User>) -> Result<bool, DbError> {
        let row = self
            .query_one(
                const_format::concatcp!(
                    "SELECT EXISTS(SELECT 1 FROM ",
                    ROOMS,
                    " WHERE id = $1 AND owner_id = $2)",
                    " OR EXISTS(SELECT 1 FROM ",
                    ROOM_ADMINS,
                    " WHERE room_id = $1 AND user_id = $2)",
                    " OR EXISTS(SELECT 1 FROM ",
                    USERS,
                    " WHERE id = $2 AND role = 'admin')"
                ),
                &[&room.inner(), &user.inner()],
            )
            .await?;
        Ok(row.get::<_, bool>(0))
    }
    async fn record_history(
        &self,
        user: ID<User>,
        username: &str,
        outcome: Outcome,
        reward: Coins,
    ) -> Result<(), DbError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                GAME_HISTORY,
                " (user_id, username, game, result, reward, at) VALUES ($1, $2, 'lowcard', $3, $4, $5)"
            ),
            &[
                &user.inner(),
                &username,
                &outcome.to_string(),
                &reward,
                &now_ms(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(DbError::from)
    }
    async fn create_game(&self, game: &Game) -> Result<i64, DbError> {
        let row = self
            .query_one(
                const_format::concatcp!(
                    "INSERT INTO ",
                    LOWCARD_GAMES,
                    " (room_id, entry_amount, pot, status, started_by, created_at)",
                    " VALUES ($1, $2, $3, 'waiting', $4, $5) RETURNING id"
                ),
                &[
                    &game.room_id.inner(),
                    &game.entry_amount,
                    &game.pot,
                    &game.started_by.inner(),
                    &game.created_at,
                ],
            )
            .await?;
        Ok(row.get::<_, i64>(0))
    }
    async fn finish_game(
        &self,
        db_id: i64,
        winner: ID<User>,
        pot: Coins,
        fee: Coins,
    ) -> Result<(), DbError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                LOWCARD_GAMES,
                " SET status = 'finished', winner_id = $2, pot = $3, house_fee = $4, finished_at = $5",
                " WHERE id = $1"
            ),
            &[&db_id, &winner.inner(), &pot, &fee, &now_ms()],
        )
        .await
        .map(|_| ())
        .map_err(DbError::from)
    }
    async fn record_summary(
        &self,
        game: &Game,
        winner_username: &str,
        commission: Coins,
    ) -> Result<(), DbError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                LOWCARD_HISTORY,
                " (game_id, room_id, winner_id, winner_username, pot, commission, players, finished_at)",
                " VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            ),
            &[
                &game.db_id.unwrap_or_default(),
                &game.room_id.inner(),
                &game.winner_id.map(|id| id.inner()),
                &winner_username,
                &game.pot,
                &commission,
                &(game.players.len() as i32),
                &game.finished_at.unwrap_or_else(now_ms),
            ],
        )
        .await
        .map(|_| ())
        .map_err(DbError::from)
    }
}

// ============================================================================
// DDL
// ============================================================================

/// Chat rooms. Row ownership is external; the engine reads names for the
/// big-game rule and owner ids for admin checks.
pub struct Rooms;

impl Schema for Rooms {
    fn name() -> &'static str {
        ROOMS
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            ROOMS,
            " (
                id       UUID PRIMARY KEY,
                name     TEXT NOT NULL,
                owner_id UUID
            );"
        )
    }
    fn indices() -> &'static str {
        ""
    }
}

pub struct RoomAdmins;

impl Schema for RoomAdmins {
    fn name() -> &'static str {
        ROOM_ADMINS
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            ROOM_ADMINS,
            " (
                room_id UUID NOT NULL,
                user_id UUID NOT NULL,
                PRIMARY KEY (room_id, user_id)
            );"
        )
    }
    fn indices() -> &'static str {
        ""
    }
}

pub struct History;

impl Schema for History {
    fn name() -> &'static str {
        GAME_HISTORY
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            GAME_HISTORY,
            " (
                id       BIGSERIAL PRIMARY KEY,
                user_id  UUID NOT NULL,
                username TEXT NOT NULL,
                game     TEXT NOT NULL,
                result   TEXT NOT NULL,
                reward   BIGINT NOT NULL,
                at       BIGINT NOT NULL
            );"
        )
    }
    fn indices() -> &'static str {
        const_format::concatcp!(
            "CREATE INDEX IF NOT EXISTS game_history_user_idx ON ",
            GAME_HISTORY,
            " (user_id);"
        )
    }
}

pub struct Games;

impl Schema for Games {
    fn name() -> &'static str {
        LOWCARD_GAMES
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            LOWCARD_GAMES,
            " (
                id           BIGSERIAL PRIMARY KEY,
                room_id      UUID NOT NULL,
                entry_amount BIGINT NOT NULL,
                pot          BIGINT NOT NULL,
                status       TEXT NOT NULL,
                started_by   UUID NOT NULL,
                winner_id    UUID,
                house_fee    BIGINT,
                created_at   BIGINT NOT NULL,
                finished_at  BIGINT
            );"
        )
    }
    fn indices() -> &'static str {
        const_format::concatcp!(
            "CREATE INDEX IF NOT EXISTS lowcard_games_room_idx ON ",
            LOWCARD_GAMES,
            " (room_id);"
        )
    }
}

pub struct Summaries;

impl Schema for Summaries {
    fn name() -> &'static str {
        LOWCARD_HISTORY
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            LOWCARD_HISTORY,
            " (
                id              BIGSERIAL PRIMARY KEY,
                game_id         BIGINT NOT NULL,
                room_id         UUID NOT NULL,
                winner_id       UUID,
                winner_username TEXT NOT NULL,
                pot             BIGINT NOT NULL,
                commission      BIGINT NOT NULL,
                players         INT NOT NULL,
                finished_at     BIGINT NOT NULL
            );"
        )
    }
    fn indices() -> &'static str {
        ""
    }
}

// ============================================================================
// IN-MEMORY FAKE
// ============================================================================

/// Recorded finish for assertions.
#[derive(Debug, Clone)]
pub struct FinishedRecord {
    pub db_id: i64,
    pub winner: ID<User>,
    pub pot: Coins,
    pub fee: Coins,
}

/// In-memory game repository for tests and single-node runs.
#[derive(Default)]
pub struct MemoryGames {
    room_names: Mutex<HashMap<ID<Room>, String>>,
    admins: Mutex<HashMap<ID<Room>, Vec<ID<User>>>>,
    histories: Mutex<Vec<(ID<User>, String, Coins)>>,
    next_id: Mutex<i64>,
    finished: Mutex<Vec<FinishedRecord>>,
    summaries: Mutex<Vec<(i64, String, Coins)>>,
}

impl MemoryGames {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_room_name(self, room: ID<Room>, name: &str) -> Self {
        self.room_names
            .lock()
            .expect("rooms")
            .insert(room, name.to_string());
        self
    }
    pub fn with_admin(self, room: ID<Room>, user: ID<User>) -> Self {
        self.admins
            .lock()
            .expect("admins")
            .entry(room)
            .or_default()
            .push(user);
        self
    }
    pub fn histories(&self) -> Vec<(ID<User>, String, Coins)> {
        self.histories.lock().expect("histories").clone()
    }
    pub fn finished(&self) -> Vec<FinishedRecord> {
        self.finished.lock().expect("finished").clone()
    }
    pub fn summaries(&self) -> Vec<(i64, String, Coins)> {
        self.summaries.lock().expect("summaries").clone()
    }
}

#[async_trait]
impl GameRepository for MemoryGames {
    async fn room_name(&self, room: ID<Room>) -> Result<Option<String>, DbError> {
        Ok(self.room_names.lock().expect("rooms").get(&room).cloned())
    }
    async fn is_room_admin(&self, room: ID<Room>, user: ID<User>) -> Result<bool, DbError> {
        Ok(self
            .admins
            .lock()
            .expect("admins")
            .get(&room)
            .map(|users| users.contains(&user))
            .unwrap_or(false))
    }
    async fn record_history(
        &self,
        user: ID<User>,
        _username: &str,
        outcome: Outcome,
        reward: Coins,
    ) -> Result<(), DbError> {
        self.histories
            .lock()
            .expect("histories")
            .push((user, outcome.to_string(), reward));
        Ok(())
    }
    async fn create_game(&self, _game: &Game) -> Result<i64, DbError> {
        let mut next = self.next_id.lock().expect("next_id");
        *next += 1;
        Ok(*next)
    }
    async fn finish_game(
        &self,
        db_id: i64,
        winner: ID<User>,
        pot: Coins,
        fee: Coins,
    ) -> Result<(), DbError> {
        self.finished.lock().expect("finished").push(FinishedRecord {
            db_id,
            winner,
            pot,
            fee,
        });
        Ok(())
    }
    async fn record_summary(
        &self,
        game: &Game,
        winner_username: &str,
        commission: Coins,
    ) -> Result<(), DbError> {
        self.summaries.lock().expect("summaries").push((
            game.db_id.unwrap_or_default(),
            winner_username.to_string(),
            commission,
        ));
        Ok(())
    }
}
