//! Core protocol types: everything that travels on the wire.

use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A unique identifier for a participant in a session.
///
/// Newtype over `u32` so a participant number can't be confused with a
/// card priority or distance in a signature. The hosting peer is always
/// participant 1; remote peers are assigned 2, 3, ... in accept order.
///
/// `Display` prints the bare decimal because the number is written
/// verbatim as the leading token of tagged wire lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// The rotation a program card applies to a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// No rotation (pure movement card).
    None,
    /// Quarter turn counter-clockwise.
    Left,
    /// Quarter turn clockwise.
    Right,
    /// Half turn.
    Uturn,
}

impl Rotation {
    /// The exact wire token for this rotation.
    pub fn as_str(self) -> &'static str {
        match self {
            Rotation::None => "NONE",
            Rotation::Left => "LEFT",
            Rotation::Right => "RIGHT",
            Rotation::Uturn => "UTURN",
        }
    }
}

impl FromStr for Rotation {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Rotation::None),
            "LEFT" => Ok(Rotation::Left),
            "RIGHT" => Ok(Rotation::Right),
            "UTURN" => Ok(Rotation::Uturn),
            other => Err(ProtocolError::decode(
                other,
                "unrecognized rotation token",
            )),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProgramCard
// ---------------------------------------------------------------------------

/// One unit of player intent for a single round.
///
/// A card is immutable once constructed. `priority` decides execution
/// order across participants within a round (lower plays first);
/// `distance` may be negative, meaning "move backward"; `name` is a
/// display label and may contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramCard {
    /// Execution order within a round. Lower plays first. Duplicate
    /// priorities are impossible in a well-formed deck but tolerated.
    pub priority: i32,
    /// Movement distance in tiles; negative moves backward.
    pub distance: i32,
    /// Rotation applied to the robot.
    pub rotation: Rotation,
    /// Display label, possibly containing spaces.
    pub name: String,
}

impl ProgramCard {
    /// Creates a new card.
    pub fn new(
        priority: i32,
        distance: i32,
        rotation: Rotation,
        name: impl Into<String>,
    ) -> Self {
        Self {
            priority,
            distance,
            rotation,
            name: name.into(),
        }
    }
}

impl fmt::Display for ProgramCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (prio {}, dist {}, rot {})",
            self.name, self.priority, self.distance, self.rotation
        )
    }
}

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// A reserved bare-text line used as a protocol marker rather than
/// game data.
///
/// `DECK_BEGIN` / `DECK_END` frame the deck-transfer sub-protocol
/// (untagged card lines between them); `START_TURN` tells every peer
/// that all selections have been broadcast and the turn may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Start of a deck transfer; untagged card lines follow.
    DeckBegin,
    /// End of a deck transfer.
    DeckEnd,
    /// All selections have been broadcast; apply the turn.
    StartTurn,
}

impl Sentinel {
    /// The exact wire form of this sentinel.
    pub fn as_str(self) -> &'static str {
        match self {
            Sentinel::DeckBegin => "DECK_BEGIN",
            Sentinel::DeckEnd => "DECK_END",
            Sentinel::StartTurn => "START_TURN",
        }
    }

    /// Matches a received line against the sentinels (exact match).
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "DECK_BEGIN" => Some(Sentinel::DeckBegin),
            "DECK_END" => Some(Sentinel::DeckEnd),
            "START_TURN" => Some(Sentinel::StartTurn),
            _ => None,
        }
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_id_displays_bare_decimal() {
        assert_eq!(ParticipantId(3).to_string(), "3");
        assert_eq!(ParticipantId(12).to_string(), "12");
    }

    #[test]
    fn test_rotation_round_trips_through_tokens() {
        for rot in [
            Rotation::None,
            Rotation::Left,
            Rotation::Right,
            Rotation::Uturn,
        ] {
            assert_eq!(rot.as_str().parse::<Rotation>().unwrap(), rot);
        }
    }

    #[test]
    fn test_rotation_rejects_unknown_token() {
        assert!("SPIN".parse::<Rotation>().is_err());
        assert!("left".parse::<Rotation>().is_err());
    }

    #[test]
    fn test_sentinel_requires_exact_match() {
        assert_eq!(
            Sentinel::from_line("DECK_BEGIN"),
            Some(Sentinel::DeckBegin)
        );
        assert_eq!(
            Sentinel::from_line("START_TURN"),
            Some(Sentinel::StartTurn)
        );
        assert_eq!(Sentinel::from_line("START_TURN "), None);
        assert_eq!(Sentinel::from_line("deck_begin"), None);
    }
}
