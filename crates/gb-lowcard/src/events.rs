use super::game::Game;
use gb_cards::Card;
use gb_core::Coins;
use gb_core::EpochMs;
use gb_core::ID;
use gb_core::Room;
use gb_core::Round;
use gb_core::User;
use gb_core::now_ms;
use serde::Serialize;

/// Domain events emitted to the broadcaster.
///
/// Each variant maps to a named broadcast event via [`GameEvent::name`];
/// the serialized variant is the payload. At-least-once delivery, so
/// payloads carry the game id for client-side dedup.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Started {
        game_id: ID<Game>,
        room_id: ID<Room>,
        entry_amount: Coins,
        started_by: ID<User>,
        started_by_username: String,
        join_deadline: EpochMs,
    },
    PlayerJoined {
        game_id: ID<Game>,
        user_id: ID<User>,
        username: String,
        pot: Coins,
        players: usize,
    },
    Countdown {
        game_id: ID<Game>,
        round: Round,
        countdown_ends_at: EpochMs,
        round_deadline: EpochMs,
    },
    RoundStarted {
        game_id: ID<Game>,
        round: Round,
        is_tie_breaker: bool,
        round_deadline: EpochMs,
    },
    Draw {
        game_id: ID<Game>,
        user_id: ID<User>,
        username: String,
        card: Card,
        auto: bool,
    },
    RoundTallied {
        game_id: ID<Game>,
        round: Round,
        #[serde(flatten)]
        tally: Tally,
    },
    Finished {
        game_id: ID<Game>,
        winner_id: ID<User>,
        winner_username: String,
        pot: Coins,
        winnings: Coins,
        house_fee: Coins,
    },
    Cancelled {
        game_id: ID<Game>,
        reason: String,
        refunded: usize,
    },
}

/// Round outcome inside a `RoundTallied` event.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Tally {
    Eliminated {
        user_id: ID<User>,
        username: String,
        card: Card,
        remaining: usize,
        tie_broken: bool,
    },
    Tie {
        value: u8,
        tied: Vec<String>,
    },
}

impl GameEvent {
    /// The broadcast event this payload rides on.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "game:started",
            Self::PlayerJoined { .. } => "game:player:joined",
            Self::Countdown { .. } => "game:countdown",
            Self::RoundStarted { .. } => "game:round:started",
            Self::Draw { .. } => "game:draw",
            Self::RoundTallied { .. } => "game:round:tallied",
            Self::Finished { .. } => "game:finished",
            Self::Cancelled { .. } => "game:cancelled",
        }
    }
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("serialize game event")
    }

    pub fn started(game: &Game) -> Self {
        Self::Started {
            game_id: game.id,
            room_id: game.room_id,
            entry_amount: game.entry_amount,
            started_by: game.started_by,
            started_by_username: game.started_by_username.clone(),
            join_deadline: game.join_deadline,
        }
    }
    pub fn joined(game: &Game, user: ID<User>, username: &str) -> Self {
        Self::PlayerJoined {
            game_id: game.id,
            user_id: user,
            username: username.to_string(),
            pot: game.pot,
            players: game.players.len(),
        }
    }
    pub fn countdown(game: &Game) -> Self {
        Self::Countdown {
            game_id: game.id,
            round: game.current_round,
            countdown_ends_at: game.countdown_ends_at.unwrap_or_default(),
            round_deadline: game.round_deadline.unwrap_or_default(),
        }
    }
    pub fn round_started(game: &Game) -> Self {
        Self::RoundStarted {
            game_id: game.id,
            round: game.current_round,
            is_tie_breaker: game.is_tie_breaker,
            round_deadline: game.round_deadline.unwrap_or_default(),
        }
    }
    pub fn draw(game: &Game, user: ID<User>, username: &str, card: Card, auto: bool) -> Self {
        Self::Draw {
            game_id: game.id,
            user_id: user,
            username: username.to_string(),
            card,
            auto,
        }
    }
    pub fn tallied(game: &Game, tally: Tally) -> Self {
        Self::RoundTallied {
            game_id: game.id,
            round: game.current_round,
            tally,
        }
    }
    pub fn finished(game: &Game) -> Self {
        Self::Finished {
            game_id: game.id,
            winner_id: game.winner_id.unwrap_or_default(),
            winner_username: game.winner_username.clone().unwrap_or_default(),
            pot: game.pot,
            winnings: game.winnings.unwrap_or_default(),
            house_fee: game.house_fee.unwrap_or_default(),
        }
    }
    pub fn cancelled(game: &Game, reason: &str, refunded: usize) -> Self {
        Self::Cancelled {
            game_id: game.id,
            reason: reason.to_string(),
            refunded,
        }
    }
}

/// User-visible chat line emitted as a `chat:message` event.
#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
    pub message: String,
    pub username: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ID<User>>,
    pub timestamp: EpochMs,
}

impl ChatMessage {
    const BOT_NAME: &'static str = "LowCardBot";

    pub fn public(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            username: Self::BOT_NAME.to_string(),
            kind: "bot".to_string(),
            user_id: None,
            timestamp: now_ms(),
        }
    }
    pub fn private(user: ID<User>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            username: Self::BOT_NAME.to_string(),
            kind: "private".to_string(),
            user_id: Some(user),
            timestamp: now_ms(),
        }
    }
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("serialize chat message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_stable() {
        let game = Game::new(ID::default(), ID::default(), "alice", 5);
        assert_eq!(GameEvent::started(&game).name(), "game:started");
        assert_eq!(
            GameEvent::tallied(&game, Tally::Tie { value: 5, tied: vec![] }).name(),
            "game:round:tallied"
        );
    }

    #[test]
    fn tally_flattens_into_payload() {
        let game = Game::new(ID::default(), ID::default(), "alice", 5);
        let event = GameEvent::tallied(
            &game,
            Tally::Tie {
                value: 5,
                tied: vec!["alice".into(), "bob".into()],
            },
        );
        let value = event.to_value();
        assert_eq!(value["type"], "round_tallied");
        assert_eq!(value["outcome"], "tie");
        assert_eq!(value["value"], 5);
    }

    #[test]
    fn private_chat_carries_user() {
        let user: ID<User> = ID::default();
        let value = ChatMessage::private(user, "Not enough credits.").to_value();
        assert_eq!(value["type"], "private");
        assert_eq!(value["user_id"], serde_json::json!(user.inner()));
    }
}
