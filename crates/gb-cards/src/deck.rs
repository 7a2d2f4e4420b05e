use super::card::Card;
use super::rank::Rank;
use super::suit::Suit;
use rand::seq::SliceRandom;

/// An ordered deck of cards drawn from the tail.
///
/// Unlike a sampling deck, the order is fixed at shuffle time so the whole
/// sequence can be persisted externally and popped one card at a time.
/// [`Deck::shuffled`] runs a Fisher–Yates shuffle over the full 52.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck(Vec<Card>);

impl Default for Deck {
    fn default() -> Self {
        Self::shuffled()
    }
}

impl Deck {
    /// The full 52-card deck in sorted order.
    pub fn ordered() -> Self {
        Self(
            (0u8..13)
                .map(Rank::from)
                .flat_map(|r| Suit::ALL.into_iter().map(move |s| Card::from((r, s))))
                .collect(),
        )
    }
    /// A freshly shuffled 52-card deck.
    pub fn shuffled() -> Self {
        let mut deck = Self::ordered();
        deck.0.shuffle(&mut rand::rng());
        deck
    }
    /// Draws the tail card, if any remain.
    pub fn draw(&mut self) -> Option<Card> {
        self.0.pop()
    }
    /// Number of cards remaining.
    pub fn remaining(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// The remaining cards in draw order (tail drawn first).
    pub fn cards(&self) -> &[Card] {
        &self.0
    }
}

impl From<Vec<Card>> for Deck {
    fn from(cards: Vec<Card>) -> Self {
        Self(cards)
    }
}
impl From<Deck> for Vec<Card> {
    fn from(deck: Deck) -> Self {
        deck.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fifty_two_distinct() {
        let deck = Deck::shuffled();
        let distinct: HashSet<Card> = deck.cards().iter().copied().collect();
        assert_eq!(deck.remaining(), 52);
        assert_eq!(distinct.len(), 52);
    }

    #[test]
    fn draw_pops_tail() {
        let mut deck = Deck::ordered();
        let tail = *deck.cards().last().unwrap();
        assert_eq!(deck.draw(), Some(tail));
        assert_eq!(deck.remaining(), 51);
    }

    #[test]
    fn draw_exhausts() {
        let mut deck = Deck::shuffled();
        for _ in 0..52 {
            assert!(deck.draw().is_some());
        }
        assert!(deck.draw().is_none());
        assert!(deck.is_empty());
    }
}
