//! Encoding and decoding of the line grammar.
//!
//! Two card line forms exist:
//!
//! - **untagged** (deck transfer): `<priority> <distance> <ROTATION> <name>`
//! - **tagged** (selections):
//!   `<participant> <priority> <distance> <ROTATION> <name>`
//!
//! All integer fields are decimal, `<ROTATION>` is one of
//! `NONE|LEFT|RIGHT|UTURN`, and `<name>` is the remainder of the line —
//! it may itself contain spaces and is reconstructed by re-joining
//! every token after the rotation.
//!
//! Quit notices are their own grammar: the sender's decimal participant
//! number immediately followed by the literal token `quit` (no
//! separator), e.g. `3quit`. Detection is by substring, not equality.
//!
//! Every function here is pure and safe to call concurrently.

use crate::{ParticipantId, ProgramCard, ProtocolError, Rotation};

/// The literal token marking a quit notice. Any line containing it
/// anywhere is treated as one.
pub const QUIT_TOKEN: &str = "quit";

/// Encodes a card in the untagged form used for deck transfer.
pub fn encode_card(card: &ProgramCard) -> String {
    format!(
        "{} {} {} {}",
        card.priority,
        card.distance,
        card.rotation.as_str(),
        card.name
    )
}

/// Encodes a card selection tagged with its owner's participant number.
pub fn encode_selection(
    participant: ParticipantId,
    card: &ProgramCard,
) -> String {
    format!("{participant} {}", encode_card(card))
}

/// Encodes a quit notice for the given participant.
pub fn encode_quit(participant: ParticipantId) -> String {
    format!("{participant}{QUIT_TOKEN}")
}

/// Decodes an untagged card line.
///
/// # Errors
/// Returns [`ProtocolError::Decode`] if the line does not split into
/// an integer priority, an integer distance, a rotation token, and a
/// non-empty trailing name.
pub fn decode_card(line: &str) -> Result<ProgramCard, ProtocolError> {
    let mut tokens = line.split_whitespace();

    let priority: i32 = tokens
        .next()
        .ok_or_else(|| ProtocolError::decode(line, "empty line"))?
        .parse()
        .map_err(|_| {
            ProtocolError::decode(line, "priority is not an integer")
        })?;

    let distance: i32 = tokens
        .next()
        .ok_or_else(|| ProtocolError::decode(line, "missing distance"))?
        .parse()
        .map_err(|_| {
            ProtocolError::decode(line, "distance is not an integer")
        })?;

    let rotation: Rotation = tokens
        .next()
        .ok_or_else(|| ProtocolError::decode(line, "missing rotation"))?
        .parse()
        .map_err(|_| {
            ProtocolError::decode(line, "unrecognized rotation token")
        })?;

    // The name is everything after the rotation, spaces restored.
    let name = tokens.collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(ProtocolError::decode(line, "missing card name"));
    }

    Ok(ProgramCard {
        priority,
        distance,
        rotation,
        name,
    })
}

/// Decodes a tagged selection line: a participant number followed by
/// the four card fields.
///
/// # Errors
/// Returns [`ProtocolError::Decode`] if the participant token is
/// missing or non-numeric, or the remainder does not parse as a card.
pub fn decode_tagged_selection(
    line: &str,
) -> Result<(ParticipantId, ProgramCard), ProtocolError> {
    let trimmed = line.trim_start();
    let (tag, rest) = trimmed.split_once(' ').ok_or_else(|| {
        ProtocolError::decode(line, "missing participant number")
    })?;

    let participant: u32 = tag.parse().map_err(|_| {
        ProtocolError::decode(line, "participant number is not an integer")
    })?;

    let card = decode_card(rest)?;
    Ok((ParticipantId(participant), card))
}

/// Recognizes a quit notice and extracts the departing participant.
///
/// Returns `None` if the line is not a quit notice at all. Returns
/// `Some(Err(_))` for a quit notice whose leading digit run is missing
/// or does not parse — the line is a quit by the substring rule but
/// names no sender.
///
/// The sender number is the full leading decimal digit run, so
/// participant numbers of two or more digits parse correctly.
pub fn parse_quit(
    line: &str,
) -> Option<Result<ParticipantId, ProtocolError>> {
    if !line.contains(QUIT_TOKEN) {
        return None;
    }
    let end = line
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(line.len());
    let digits = &line[..end];
    if digits.is_empty() {
        return Some(Err(ProtocolError::decode(
            line,
            "quit notice without a participant number",
        )));
    }
    Some(
        digits
            .parse()
            .map(ParticipantId)
            .map_err(|_| {
                ProtocolError::decode(line, "participant number out of range")
            }),
    )
}
