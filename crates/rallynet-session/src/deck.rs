//! The program-card deck.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rallynet_protocol::{ProgramCard, Rotation};

/// An ordered deck of program cards plus a discard pile.
///
/// Cards are drawn from the front. The deck is owned by the session
/// coordinator; every participant receives a transmitted copy at
/// handshake time and whenever the coordinator regenerates it.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    draw: VecDeque<ProgramCard>,
    discard: Vec<ProgramCard>,
}

impl Deck {
    /// Builds the standard 84-card deck, unshuffled:
    ///
    /// - 6 × U-turn (priorities 10–60)
    /// - 18 × Rotate left (70–410, step 20)
    /// - 18 × Rotate right (80–420, step 20)
    /// - 6 × Back up (430–480)
    /// - 18 × Move 1 (490–660)
    /// - 12 × Move 2 (670–780)
    /// - 6 × Move 3 (790–840)
    pub fn standard() -> Self {
        let mut draw = VecDeque::with_capacity(84);

        for i in 0..6 {
            draw.push_back(ProgramCard::new(
                10 + i * 10,
                0,
                Rotation::Uturn,
                "U-turn",
            ));
        }
        for i in 0..18 {
            draw.push_back(ProgramCard::new(
                70 + i * 20,
                0,
                Rotation::Left,
                "Rotate left",
            ));
        }
        for i in 0..18 {
            draw.push_back(ProgramCard::new(
                80 + i * 20,
                0,
                Rotation::Right,
                "Rotate right",
            ));
        }
        for i in 0..6 {
            draw.push_back(ProgramCard::new(
                430 + i * 10,
                -1,
                Rotation::None,
                "Back up",
            ));
        }
        for i in 0..18 {
            draw.push_back(ProgramCard::new(
                490 + i * 10,
                1,
                Rotation::None,
                "Move 1",
            ));
        }
        for i in 0..12 {
            draw.push_back(ProgramCard::new(
                670 + i * 10,
                2,
                Rotation::None,
                "Move 2",
            ));
        }
        for i in 0..6 {
            draw.push_back(ProgramCard::new(
                790 + i * 10,
                3,
                Rotation::None,
                "Move 3",
            ));
        }

        Self {
            draw,
            discard: Vec::new(),
        }
    }

    /// Builds the standard deck and shuffles it.
    pub fn shuffled() -> Self {
        let mut deck = Self::standard();
        deck.shuffle();
        deck
    }

    /// Shuffles the remaining draw pile in place.
    pub fn shuffle(&mut self) {
        let mut rng = rand::rng();
        self.draw.make_contiguous().shuffle(&mut rng);
    }

    /// Draws the next card from the front of the deck.
    pub fn draw(&mut self) -> Option<ProgramCard> {
        self.draw.pop_front()
    }

    /// Draws up to `n` cards (a dealt hand).
    pub fn draw_hand(&mut self, n: usize) -> Vec<ProgramCard> {
        let mut hand = Vec::with_capacity(n);
        for _ in 0..n {
            match self.draw() {
                Some(card) => hand.push(card),
                None => break,
            }
        }
        hand
    }

    /// Places a played card on the discard pile.
    pub fn discard(&mut self, card: ProgramCard) {
        self.discard.push(card);
    }

    /// Iterates the remaining draw pile in order, front first. Used
    /// for the deck-transfer sub-protocol.
    pub fn cards(&self) -> impl Iterator<Item = &ProgramCard> {
        self.draw.iter()
    }

    /// Number of cards left in the draw pile.
    pub fn len(&self) -> usize {
        self.draw.len()
    }

    /// `true` if the draw pile is exhausted.
    pub fn is_empty(&self) -> bool {
        self.draw.is_empty()
    }

    /// Number of cards on the discard pile.
    pub fn discarded(&self) -> usize {
        self.discard.len()
    }
}
