use super::rank::Rank;
use super::suit::Suit;

/// A playing card encoded as a single byte.
///
/// The 52 cards are bijectively mapped to `0..52` where the encoding is
/// `rank * 4 + suit`. Comparison in LowCard is by rank only; suits never
/// break ties, so [`Card::value`] (2..=14) is the game-relevant ordering.
///
/// # Parsing
///
/// Cards parse from two-character codes like `"5h"` (five of hearts) or
/// `"As"` (ace of spades). The same code is the wire form: snapshots
/// serialize cards as their code string, and chat clients render the
/// `[CARD:<code>]` token from it.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Card(u8);

impl Card {
    /// Extracts the rank component (2 through Ace).
    pub fn rank(&self) -> Rank {
        Rank::from(self.0 / 4)
    }
    /// Extracts the suit component (clubs, diamonds, hearts, spades).
    pub fn suit(&self) -> Suit {
        Suit::from(self.0 % 4)
    }
    /// LowCard comparison value: 2..=14, lowest loses.
    pub fn value(&self) -> u8 {
        self.rank().value()
    }
    /// Two-character wire code, e.g. `"5h"` or `"As"`.
    pub fn code(&self) -> String {
        self.to_string()
    }
    /// Client-side image path for this card.
    pub fn image(&self) -> String {
        format!("/cards/{}.png", self.code())
    }
}

/// (Rank, Suit) isomorphism
impl From<(Rank, Suit)> for Card {
    fn from((r, s): (Rank, Suit)) -> Self {
        Self(u8::from(r) * 4 + u8::from(s))
    }
}

/// u8 isomorphism
/// each card is mapped to its location in a sorted deck 0-51
impl From<Card> for u8 {
    fn from(c: Card) -> u8 {
        c.0
    }
}
impl From<u8> for Card {
    fn from(n: u8) -> Self {
        debug_assert!(n < 52);
        Self(n)
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", self.rank(), self.suit())
    }
}

/// str isomorphism
impl TryFrom<&str> for Card {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().len() {
            2 => {
                let rank = Rank::try_from(&s.trim()[0..1])?;
                let suit = Suit::try_from(&s.trim()[1..2])?;
                Ok(Card::from((rank, suit)))
            }
            _ => Err("2 characters".into()),
        }
    }
}

/// Cards cross the wire and the keyed store as their two-character code.
impl serde::Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.code())
    }
}
impl<'de> serde::Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Card::try_from(s.as_str()).map_err(serde::de::Error::custom)
    }
}

impl gb_core::Arbitrary for Card {
    fn random() -> Self {
        Self(rand::random_range(0..52))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_core::Arbitrary;

    #[test]
    fn bijective_rank_suit() {
        let card = Card::random();
        let suit = card.suit();
        let rank = card.rank();
        assert!(card == Card::from((rank, suit)));
    }

    #[test]
    fn bijective_u8() {
        let card = Card::random();
        assert!(card == Card::from(u8::from(card)));
    }

    #[test]
    fn bijective_code() {
        let card = Card::random();
        assert!(card == Card::try_from(card.code().as_str()).unwrap());
    }

    #[test]
    fn serde_as_code() {
        let card = Card::try_from("5h").unwrap();
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, "\"5h\"");
        let back: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(card, back);
    }
}
