//! The session manager: the live participant set and their queued
//! selections.

use std::collections::BTreeMap;
use std::collections::VecDeque;

use rallynet_protocol::{ParticipantId, ProgramCard};

use crate::{Deck, SessionError};

/// Cards per selection set, and rounds per turn. A turn is a group of
/// five rounds in which every participant plays one queued card per
/// round, in global priority order.
pub const REGISTER_COUNT: usize = 5;

/// A participant's queued plays for the current round-group, in
/// submission order. Never holds more than [`REGISTER_COUNT`] cards
/// between drains.
#[derive(Debug, Default)]
struct SelectionSet {
    cards: VecDeque<ProgramCard>,
}

/// Owns the live participant set, each participant's selection set,
/// and the deck.
///
/// All mutation happens through this type so that one outer mutex is
/// enough to serialize handler tasks, the coordinator, and the
/// turn-resolution routine against each other. In particular,
/// [`all_selections_in`](Self::all_selections_in) is always computed
/// from the *current* live set — there is no separately tracked
/// participant count that could drift when someone quits mid-round.
pub struct SessionManager {
    participants: BTreeMap<ParticipantId, SelectionSet>,
    deck: Deck,
}

impl SessionManager {
    /// Creates a manager with no participants and the given deck.
    pub fn new(deck: Deck) -> Self {
        Self {
            participants: BTreeMap::new(),
            deck,
        }
    }

    // -- Registry --------------------------------------------------------

    /// Adds a participant to the live set.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyRegistered`] if the number is
    /// taken; numbers are never reused while their connection is open.
    pub fn register(
        &mut self,
        participant: ParticipantId,
    ) -> Result<(), SessionError> {
        if self.participants.contains_key(&participant) {
            return Err(SessionError::AlreadyRegistered(participant));
        }
        self.participants.insert(participant, SelectionSet::default());
        tracing::info!(%participant, live = self.participants.len(), "participant joined");
        Ok(())
    }

    /// Removes a participant and its queued selections. Idempotent:
    /// returns `false` if the participant was already gone.
    pub fn remove(&mut self, participant: ParticipantId) -> bool {
        let removed = self.participants.remove(&participant).is_some();
        if removed {
            tracing::info!(%participant, live = self.participants.len(), "participant removed");
        }
        removed
    }

    /// `true` if the participant is in the live set.
    pub fn is_live(&self, participant: ParticipantId) -> bool {
        self.participants.contains_key(&participant)
    }

    /// The live participants, in ascending number order.
    pub fn live_participants(&self) -> Vec<ParticipantId> {
        self.participants.keys().copied().collect()
    }

    /// Number of live participants.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    // -- Selections ------------------------------------------------------

    /// Appends a card to a participant's selection set and returns the
    /// new set size.
    ///
    /// # Errors
    /// - [`SessionError::UnknownParticipant`] if the sender is not live
    /// - [`SessionError::SelectionSetFull`] if five cards are already
    ///   queued; the card is rejected, never stored
    pub fn append_selection(
        &mut self,
        participant: ParticipantId,
        card: ProgramCard,
    ) -> Result<usize, SessionError> {
        let set = self
            .participants
            .get_mut(&participant)
            .ok_or(SessionError::UnknownParticipant(participant))?;
        if set.cards.len() >= REGISTER_COUNT {
            return Err(SessionError::SelectionSetFull(participant));
        }
        set.cards.push_back(card);
        Ok(set.cards.len())
    }

    /// Number of cards the participant has queued, or `None` if the
    /// participant is not live.
    pub fn selection_count(
        &self,
        participant: ParticipantId,
    ) -> Option<usize> {
        self.participants
            .get(&participant)
            .map(|set| set.cards.len())
    }

    /// The participant's queued cards in submission order.
    pub fn selections_of(
        &self,
        participant: ParticipantId,
    ) -> Option<impl Iterator<Item = &ProgramCard>> {
        self.participants
            .get(&participant)
            .map(|set| set.cards.iter())
    }

    /// `true` when every live participant has a full selection set.
    ///
    /// Recomputed from the current live set on every call; with no
    /// participants left there is nothing to resolve, so this is
    /// `false` rather than vacuously true.
    pub fn all_selections_in(&self) -> bool {
        !self.participants.is_empty()
            && self
                .participants
                .values()
                .all(|set| set.cards.len() >= REGISTER_COUNT)
    }

    /// Takes one round of plays: the front card of every non-empty
    /// selection set, ordered by ascending priority across
    /// participants (lower plays first; duplicate priorities keep
    /// participant-number order). Drained cards go to the discard pile.
    pub fn drain_round(&mut self) -> Vec<(ParticipantId, ProgramCard)> {
        let mut round: Vec<(ParticipantId, ProgramCard)> = self
            .participants
            .iter_mut()
            .filter_map(|(id, set)| {
                set.cards.pop_front().map(|card| (*id, card))
            })
            .collect();
        round.sort_by_key(|(_, card)| card.priority);
        for (_, card) in &round {
            self.deck.discard(card.clone());
        }
        round
    }

    /// Discards any cards left queued, e.g. from a participant who
    /// quit after the round-group was published.
    pub fn clear_selections(&mut self) {
        for set in self.participants.values_mut() {
            for card in set.cards.drain(..) {
                self.deck.discard(card);
            }
        }
    }

    // -- Deck ------------------------------------------------------------

    /// The current deck.
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Mutable access to the current deck (dealing hands).
    pub fn deck_mut(&mut self) -> &mut Deck {
        &mut self.deck
    }

    /// Replaces the deck, discard pile included.
    pub fn set_deck(&mut self, deck: Deck) {
        self.deck = deck;
    }
}
