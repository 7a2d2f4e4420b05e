use super::command::AdminCmd;
use super::command::Command;
use super::command::LifeCmd;
use super::command::PlayCmd;
use gb_core::GameKind;
use gb_core::ID;
use gb_core::Room;
use gb_core::User;
use gb_keyed::ActiveGames;
use gb_lowcard::BotManager;
use gb_lowcard::GameRepository;
use gb_lowcard::LowCard;
use gb_lowcard::Reply;
use std::sync::Arc;

/// Maps parsed commands to engine entry points.
///
/// Scoped play commands are honored only when the room's active game type
/// matches. Lifecycle commands go to the active game; with no affinity
/// recorded, each game is polled for an installed bot and the first match
/// handles. Only LowCard runs in this process; foreign-game commands are
/// consumed silently.
pub struct Router {
    engine: Arc<LowCard>,
    bots: Arc<BotManager>,
    games: Arc<dyn GameRepository>,
    active: ActiveGames,
}

impl Router {
    pub fn new(
        engine: Arc<LowCard>,
        bots: Arc<BotManager>,
        games: Arc<dyn GameRepository>,
        active: ActiveGames,
    ) -> Self {
        Self {
            engine,
            bots,
            games,
            active,
        }
    }

    /// Handles one chat line from one user in one room.
    pub async fn dispatch(&self, room: ID<Room>, user: ID<User>, username: &str, raw: &str) {
        let reply = match Command::parse(raw) {
            Command::Unknown => return,
            Command::Admin(cmd) => self.admin(room, user, cmd).await,
            Command::Play(cmd) => self.play(room, user, username, cmd).await,
            Command::Life(cmd) => self.lifecycle(room, user, username, cmd).await,
        };
        self.render(room, user, reply).await;
    }

    async fn admin(&self, room: ID<Room>, user: ID<User>, cmd: AdminCmd) -> Reply {
        match cmd {
            AdminCmd::BotAdd(GameKind::LowCard) => self.bots.add(room, user).await,
            AdminCmd::BotRemove(GameKind::LowCard) => self.bots.remove(room, user).await,
            AdminCmd::BotAdd(kind) | AdminCmd::BotRemove(kind) => {
                Reply::reject(format!("The {} bot is not available here.", kind))
            }
            AdminCmd::BotStop => {
                match self.games.is_room_admin(room, user).await {
                    Ok(true) => self.engine.stop_game(room).await,
                    Ok(false) => Reply::reject("Only room admins can manage bots."),
                    Err(e) => {
                        log::error!("[router {}] admin check failed: {}", room, e);
                        Reply::reject("Server error, please try again.")
                    }
                }
            }
        }
    }

    async fn play(&self, room: ID<Room>, user: ID<User>, username: &str, cmd: PlayCmd) -> Reply {
        let active = self.active.get(room).await.unwrap_or_else(|e| {
            log::warn!("[router {}] affinity read failed: {}", room, e);
            None
        });
        match (cmd, active) {
            (PlayCmd::Draw, Some(GameKind::LowCard)) => {
                self.engine.draw_card(room, user, username).await
            }
            // DiceBot and FlagBot commands are recognized so they never
            // leak into chat, but this process does not run those games.
            (PlayCmd::Roll | PlayCmd::Flag | PlayCmd::Bet(_) | PlayCmd::Lock, _) => {
                Reply::silent()
            }
            (PlayCmd::Draw, _) => Reply::silent(),
        }
    }

    async fn lifecycle(
        &self,
        room: ID<Room>,
        user: ID<User>,
        username: &str,
        cmd: LifeCmd,
    ) -> Reply {
        let active = self.active.get(room).await.unwrap_or_else(|e| {
            log::warn!("[router {}] affinity read failed: {}", room, e);
            None
        });
        let ours = match active {
            Some(GameKind::LowCard) => true,
            Some(_) => false,
            None => self.bots.is_active(room).await,
        };
        if !ours {
            return Reply::silent();
        }
        match cmd {
            LifeCmd::Start(amount) => self.engine.start_game(room, user, username, amount).await,
            LifeCmd::Join => self.engine.join_game(room, user, username).await,
            LifeCmd::Cancel => self.engine.cancel_by_starter(room, user).await,
            LifeCmd::Next => Reply::silent(),
            LifeCmd::Stop => self.engine.stop_game(room).await,
            LifeCmd::Reset => self.engine.reset_game(room, username).await,
        }
    }

    async fn render(&self, room: ID<Room>, user: ID<User>, reply: Reply) {
        if reply.silent {
            return;
        }
        // Public outcomes are already broadcast by the engine; only the
        // caller's private feedback is rendered here.
        if reply.private {
            if let Some(message) = reply.message {
                self.engine.whisper(room, user, message).await;
            }
        }
    }
}
