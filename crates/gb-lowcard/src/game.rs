use gb_cards::Card;
use gb_core::Coins;
use gb_core::EpochMs;
use gb_core::ID;
use gb_core::JOIN_WINDOW_SECS;
use gb_core::Room;
use gb_core::Round;
use gb_core::Unique;
use gb_core::User;
use gb_core::now_ms;
use serde::Deserialize;
use serde::Serialize;

/// Game lifecycle status. Transitions only run forward; terminal deletion
/// of the snapshot stands in for every cancel path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Waiting,
    Playing,
    Finished,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// One seated player. `current_card` and `has_drawn` reset every round the
/// player is in scope for; `in_tie_breaker` marks the tied subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub user_id: ID<User>,
    pub username: String,
    pub is_eliminated: bool,
    pub has_drawn: bool,
    pub current_card: Option<Card>,
    pub in_tie_breaker: bool,
}

impl Player {
    pub fn new(user_id: ID<User>, username: &str) -> Self {
        Self {
            user_id,
            username: username.to_string(),
            is_eliminated: false,
            has_drawn: false,
            current_card: None,
            in_tie_breaker: false,
        }
    }
}

/// Full per-room game snapshot, persisted as JSON in the keyed store.
///
/// Invariants the engine maintains at every persisted snapshot:
/// `pot == entry_amount * players.len()`, no duplicate `user_id`, and
/// `countdown_ends_at <= round_deadline` while playing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: ID<Game>,
    pub db_id: Option<i64>,
    pub room_id: ID<Room>,
    pub status: Status,
    pub entry_amount: Coins,
    pub pot: Coins,
    pub current_round: Round,
    pub players: Vec<Player>,
    pub started_by: ID<User>,
    pub started_by_username: String,
    pub created_at: EpochMs,
    pub join_deadline: EpochMs,
    #[serde(default)]
    pub countdown_ends_at: Option<EpochMs>,
    #[serde(default)]
    pub round_deadline: Option<EpochMs>,
    pub is_tie_breaker: bool,
    pub was_tie_breaker: bool,
    pub is_round_started: bool,
    #[serde(default)]
    pub winner_id: Option<ID<User>>,
    #[serde(default)]
    pub winner_username: Option<String>,
    #[serde(default)]
    pub winnings: Option<Coins>,
    #[serde(default)]
    pub house_fee: Option<Coins>,
    #[serde(default)]
    pub finished_at: Option<EpochMs>,
}

impl Game {
    /// A fresh waiting game with the starter seated and debited.
    pub fn new(room: ID<Room>, started_by: ID<User>, username: &str, entry: Coins) -> Self {
        let now = now_ms();
        Self {
            id: ID::default(),
            db_id: None,
            room_id: room,
            status: Status::Waiting,
            entry_amount: entry,
            pot: entry,
            current_round: 0,
            players: vec![Player::new(started_by, username)],
            started_by,
            started_by_username: username.to_string(),
            created_at: now,
            join_deadline: now + (JOIN_WINDOW_SECS * 1000) as EpochMs,
            countdown_ends_at: None,
            round_deadline: None,
            is_tie_breaker: false,
            was_tie_breaker: false,
            is_round_started: false,
            winner_id: None,
            winner_username: None,
            winnings: None,
            house_fee: None,
            finished_at: None,
        }
    }

    pub fn player(&self, user: ID<User>) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user)
    }
    pub fn player_mut(&mut self, user: ID<User>) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.user_id == user)
    }
    pub fn has_player(&self, user: ID<User>) -> bool {
        self.player(user).is_some()
    }
    /// Seats a new player and grows the pot by one entry.
    pub fn add_player(&mut self, user: ID<User>, username: &str) {
        debug_assert!(!self.has_player(user));
        self.players.push(Player::new(user, username));
        self.pot += self.entry_amount;
    }

    /// Whether a player draws this round: the tied subset during a
    /// tie-breaker, every survivor otherwise.
    pub fn in_scope(&self, player: &Player) -> bool {
        !player.is_eliminated && (!self.is_tie_breaker || player.in_tie_breaker)
    }
    pub fn scoped(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| self.in_scope(p))
    }
    pub fn all_scoped_drawn(&self) -> bool {
        self.scoped().all(|p| p.has_drawn)
    }
    pub fn survivors(&self) -> usize {
        self.players.iter().filter(|p| !p.is_eliminated).count()
    }

    /// Clears draw state on every survivor ahead of a normal round.
    pub fn reset_round(&mut self) {
        for player in self.players.iter_mut().filter(|p| !p.is_eliminated) {
            player.has_drawn = false;
            player.current_card = None;
        }
    }
}

impl Unique for Game {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> Game {
        Game::new(ID::default(), ID::default(), "alice", 10)
    }

    #[test]
    fn starter_is_seated() {
        let game = game();
        assert_eq!(game.players.len(), 1);
        assert_eq!(game.pot, 10);
        assert_eq!(game.status, Status::Waiting);
        assert_eq!(game.current_round, 0);
    }

    #[test]
    fn pot_tracks_entries() {
        let mut game = game();
        game.add_player(ID::default(), "bob");
        game.add_player(ID::default(), "carol");
        assert_eq!(game.pot, game.entry_amount * game.players.len() as Coins);
    }

    #[test]
    fn scope_narrows_to_tied_players() {
        let mut game = game();
        game.add_player(ID::default(), "bob");
        game.add_player(ID::default(), "carol");
        game.is_tie_breaker = true;
        game.players[0].in_tie_breaker = true;
        game.players[1].in_tie_breaker = true;
        assert_eq!(game.scoped().count(), 2);
        game.is_tie_breaker = false;
        assert_eq!(game.scoped().count(), 3);
    }

    #[test]
    fn reset_round_skips_eliminated() {
        let mut game = game();
        game.add_player(ID::default(), "bob");
        for p in game.players.iter_mut() {
            p.has_drawn = true;
            p.current_card = Some(Card::try_from("5h").unwrap());
        }
        game.players[0].is_eliminated = true;
        game.reset_round();
        assert!(game.players[0].has_drawn);
        assert!(!game.players[1].has_drawn);
        assert!(game.players[1].current_card.is_none());
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut game = game();
        game.players[0].current_card = Some(Card::try_from("As").unwrap());
        let json = serde_json::to_string(&game).unwrap();
        let back: Game = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, game.id);
        assert_eq!(back.players[0].current_card, game.players[0].current_card);
        assert_eq!(back.pot, game.pot);
    }
}
