use gb_core::Coins;
use gb_core::GameKind;

/// A parsed chat command.
///
/// Matching is on the trimmed, lowercased input; anything that does not
/// match a known shape is [`Command::Unknown`] and consumed silently.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Admin(AdminCmd),
    Play(PlayCmd),
    Life(LifeCmd),
    Unknown,
}

/// `/bot …` and `/add bot …` — require room-admin or system-admin.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCmd {
    BotAdd(GameKind),
    BotRemove(GameKind),
    BotStop,
}

/// Scoped play commands, honored only under matching game affinity.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayCmd {
    /// `!d` — LowCard draw.
    Draw,
    /// `!r` / `!roll` — DiceBot.
    Roll,
    /// `!fg` — FlagBot.
    Flag,
    /// `!b <arg>` — FlagBot bet.
    Bet(String),
    /// `!lock` — FlagBot.
    Lock,
}

/// Lifecycle commands, dispatched to whichever game is active.
#[derive(Debug, Clone, PartialEq)]
pub enum LifeCmd {
    Start(Option<Coins>),
    Join,
    Cancel,
    Next,
    Stop,
    Reset,
}

impl Command {
    /// Parses a raw chat line. The original string is preserved by the
    /// caller for echo; matching happens on a normalized copy.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        match words.as_slice() {
            ["/bot", "stop"] => Self::Admin(AdminCmd::BotStop),
            ["/bot", game, "add"] => Self::bot_admin(game, true),
            ["/bot", game, "remove"] => Self::bot_admin(game, false),
            ["/add", "bot", game] => Self::bot_admin(game, true),
            ["!d"] => Self::Play(PlayCmd::Draw),
            ["!r"] | ["!roll"] => Self::Play(PlayCmd::Roll),
            ["!fg"] => Self::Play(PlayCmd::Flag),
            ["!b", arg @ ..] if !arg.is_empty() => Self::Play(PlayCmd::Bet(arg.join(" "))),
            ["!lock"] => Self::Play(PlayCmd::Lock),
            ["!start"] => Self::Life(LifeCmd::Start(None)),
            ["!start", amount] => Self::Life(LifeCmd::Start(amount.parse::<Coins>().ok())),
            ["!j"] | ["!join"] => Self::Life(LifeCmd::Join),
            ["!cancel"] => Self::Life(LifeCmd::Cancel),
            ["!n"] => Self::Life(LifeCmd::Next),
            ["!stop"] => Self::Life(LifeCmd::Stop),
            ["!reset"] | ["!rezet"] => Self::Life(LifeCmd::Reset),
            _ => Self::Unknown,
        }
    }

    fn bot_admin(game: &str, add: bool) -> Self {
        match GameKind::try_from(game) {
            Ok(kind) if add => Self::Admin(AdminCmd::BotAdd(kind)),
            Ok(kind) => Self::Admin(AdminCmd::BotRemove(kind)),
            Err(_) => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_commands() {
        assert_eq!(
            Command::parse("/bot lowcard add"),
            Command::Admin(AdminCmd::BotAdd(GameKind::LowCard))
        );
        assert_eq!(
            Command::parse("/add bot flagh"),
            Command::Admin(AdminCmd::BotAdd(GameKind::Flag))
        );
        assert_eq!(
            Command::parse("/bot dice remove"),
            Command::Admin(AdminCmd::BotRemove(GameKind::Dice))
        );
        assert_eq!(Command::parse("/bot stop"), Command::Admin(AdminCmd::BotStop));
        assert_eq!(Command::parse("/bot chess add"), Command::Unknown);
    }

    #[test]
    fn lifecycle_commands() {
        assert_eq!(
            Command::parse("!start 10"),
            Command::Life(LifeCmd::Start(Some(10)))
        );
        assert_eq!(Command::parse("!start"), Command::Life(LifeCmd::Start(None)));
        assert_eq!(
            Command::parse("!start lots"),
            Command::Life(LifeCmd::Start(None))
        );
        assert_eq!(Command::parse("!j"), Command::Life(LifeCmd::Join));
        assert_eq!(Command::parse("!join"), Command::Life(LifeCmd::Join));
        assert_eq!(Command::parse("!rezet"), Command::Life(LifeCmd::Reset));
    }

    #[test]
    fn play_commands() {
        assert_eq!(Command::parse("!d"), Command::Play(PlayCmd::Draw));
        assert_eq!(Command::parse("!roll"), Command::Play(PlayCmd::Roll));
        assert_eq!(
            Command::parse("!b red 50"),
            Command::Play(PlayCmd::Bet("red 50".to_string()))
        );
    }

    #[test]
    fn normalization_is_forgiving() {
        assert_eq!(Command::parse("  !D  "), Command::Play(PlayCmd::Draw));
        assert_eq!(
            Command::parse("!START 5"),
            Command::Life(LifeCmd::Start(Some(5)))
        );
    }

    #[test]
    fn unknown_is_consumed() {
        assert_eq!(Command::parse("hello everyone"), Command::Unknown);
        assert_eq!(Command::parse("!draw"), Command::Unknown);
        assert_eq!(Command::parse(""), Command::Unknown);
    }
}
