//! Wire protocol for Rallynet.
//!
//! This crate defines the "language" that the session host and its
//! remote peers speak: newline-terminated text lines carrying program
//! cards, tagged card selections, and a handful of bare control
//! sentinels. There is no length prefix, no checksum, and no message
//! versioning — one reliable byte stream per connection, one message
//! per line.
//!
//! - **Types** ([`ProgramCard`], [`Rotation`], [`ParticipantId`],
//!   [`Sentinel`]) — the values that travel on the wire.
//! - **Codec** ([`encode_card`], [`decode_tagged_selection`], ...) —
//!   pure functions converting between those values and lines.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw lines) and session
//! (participant state). It knows nothing about sockets or turns — it
//! only knows how to read and write the grammar.
//!
//! ```text
//! Transport (lines) → Protocol (cards, sentinels) → Session (turn state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{
    decode_card, decode_tagged_selection, encode_card, encode_quit,
    encode_selection, parse_quit, QUIT_TOKEN,
};
pub use error::ProtocolError;
pub use types::{ParticipantId, ProgramCard, Rotation, Sentinel};
