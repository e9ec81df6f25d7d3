//! Remote peer side: connect, consume the join handshake, listen.
//!
//! A remote peer owns exactly one upstream connection to the session
//! host. [`RallyClient::connect`] performs the join handshake eagerly
//! (assigned participant number, total count, initial deck), then
//! [`RallyClient::events`] spawns the listener task that decodes
//! broadcasts for the lifetime of the session. There is no reconnect:
//! when the host closes the stream, the listener ends quietly.

use std::sync::Arc;

use rallynet_protocol::{
    decode_card, decode_tagged_selection, encode_quit, encode_selection,
    parse_quit, ParticipantId, ProgramCard, ProtocolError, Sentinel,
};
use rallynet_transport::LineConnection;
use tokio::sync::mpsc;

use crate::RallyError;

/// A broadcast from the session host, decoded for local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Another participant's (or our own echoed) card selection.
    Selection {
        /// The selection's owner.
        participant: ParticipantId,
        /// The selected card.
        card: ProgramCard,
    },
    /// All selections have been broadcast; apply the turn locally.
    TurnStart,
    /// The host regenerated the deck; replace the local copy.
    NewDeck(Vec<ProgramCard>),
    /// A participant left the session.
    PeerQuit(ParticipantId),
}

/// A connected remote peer.
pub struct RallyClient {
    conn: Arc<LineConnection>,
    participant: ParticipantId,
    participant_count: u32,
    deck: Vec<ProgramCard>,
}

impl RallyClient {
    /// Connects to a session host and consumes the join handshake:
    /// two decimal lines (own participant number, total participant
    /// count) followed by the deck transfer.
    ///
    /// # Errors
    /// Transport errors, or [`ProtocolError::InvalidMessage`] if the
    /// stream ends or carries non-numeric lines mid-handshake.
    pub async fn connect(addr: &str) -> Result<Self, RallyError> {
        let conn = Arc::new(LineConnection::connect(addr).await?);

        let participant =
            ParticipantId(read_handshake_int(&conn, "participant number").await?);
        let participant_count =
            read_handshake_int(&conn, "participant count").await?;
        let deck = read_deck_transfer(&conn).await?;

        tracing::info!(
            %participant, participant_count, deck = deck.len(),
            "joined session"
        );

        Ok(Self {
            conn,
            participant,
            participant_count,
            deck,
        })
    }

    /// The participant number the host assigned to this peer.
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Total number of participants in the session, the host included.
    pub fn participant_count(&self) -> u32 {
        self.participant_count
    }

    /// The deck received at handshake time, in transfer order.
    pub fn deck(&self) -> &[ProgramCard] {
        &self.deck
    }

    /// Sends one of this peer's own card selections, tagged with its
    /// participant number.
    pub async fn send_selection(
        &self,
        card: &ProgramCard,
    ) -> Result<(), RallyError> {
        self.conn
            .send_line(&encode_selection(self.participant, card))
            .await?;
        Ok(())
    }

    /// Sends this peer's quit notice. The host relays it to everyone
    /// else and drops this connection.
    pub async fn send_quit(&self) -> Result<(), RallyError> {
        self.conn.send_line(&encode_quit(self.participant)).await?;
        Ok(())
    }

    /// Writes one raw line upstream.
    pub async fn send_line(&self, line: &str) -> Result<(), RallyError> {
        self.conn.send_line(line).await?;
        Ok(())
    }

    /// Spawns the listener task and returns its event stream.
    ///
    /// The task reads lines for the lifetime of the session, decoding
    /// selections, sentinels, deck transfers, and quit notices.
    /// Undecodable lines are logged and dropped. The task ends when
    /// the host closes the stream or the receiver is dropped.
    pub fn events(&self) -> mpsc::UnboundedReceiver<PeerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::clone(&self.conn);
        tokio::spawn(listen(conn, tx));
        rx
    }
}

/// Reads one decimal handshake line.
async fn read_handshake_int(
    conn: &LineConnection,
    what: &str,
) -> Result<u32, RallyError> {
    let line = read_handshake_line(conn, what).await?;
    line.trim().parse().map_err(|_| {
        ProtocolError::InvalidMessage(format!(
            "expected {what}, got {line:?}"
        ))
        .into()
    })
}

async fn read_handshake_line(
    conn: &LineConnection,
    what: &str,
) -> Result<String, RallyError> {
    match conn.recv_line().await? {
        Some(line) => Ok(line),
        None => Err(ProtocolError::InvalidMessage(format!(
            "stream ended while waiting for {what}"
        ))
        .into()),
    }
}

/// Consumes one deck transfer: `DECK_BEGIN`, untagged card lines,
/// `DECK_END`. Card lines that fail to decode are logged and skipped.
async fn read_deck_transfer(
    conn: &LineConnection,
) -> Result<Vec<ProgramCard>, RallyError> {
    let begin = read_handshake_line(conn, "deck transfer").await?;
    if Sentinel::from_line(&begin) != Some(Sentinel::DeckBegin) {
        return Err(ProtocolError::InvalidMessage(format!(
            "expected DECK_BEGIN, got {begin:?}"
        ))
        .into());
    }

    let mut deck = Vec::new();
    loop {
        let line = read_handshake_line(conn, "deck card").await?;
        if Sentinel::from_line(&line) == Some(Sentinel::DeckEnd) {
            return Ok(deck);
        }
        match decode_card(&line) {
            Ok(card) => deck.push(card),
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable deck line");
            }
        }
    }
}

/// The listener loop: decodes host broadcasts into [`PeerEvent`]s.
async fn listen(
    conn: Arc<LineConnection>,
    tx: mpsc::UnboundedSender<PeerEvent>,
) {
    loop {
        let line = match conn.recv_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("host closed the stream, listener ending");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "listener read failed");
                break;
            }
        };

        let event = match Sentinel::from_line(&line) {
            Some(Sentinel::StartTurn) => Some(PeerEvent::TurnStart),
            Some(Sentinel::DeckBegin) => {
                match read_deck_body(&conn).await {
                    Some(deck) => Some(PeerEvent::NewDeck(deck)),
                    None => break,
                }
            }
            Some(Sentinel::DeckEnd) => {
                tracing::debug!("stray DECK_END, ignoring");
                None
            }
            None => decode_data_line(&line),
        };

        if let Some(event) = event {
            if tx.send(event).is_err() {
                // Receiver gone: nobody is listening any more.
                break;
            }
        }
    }
}

/// Decodes a non-sentinel line: quit notice or tagged selection.
/// Returns `None` for undecodable lines (logged and dropped).
fn decode_data_line(line: &str) -> Option<PeerEvent> {
    if let Some(quit) = parse_quit(line) {
        return match quit {
            Ok(participant) => Some(PeerEvent::PeerQuit(participant)),
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed quit notice");
                None
            }
        };
    }
    match decode_tagged_selection(line) {
        Ok((participant, card)) => {
            Some(PeerEvent::Selection { participant, card })
        }
        Err(e) => {
            tracing::debug!(error = %e, "dropping undecodable line");
            None
        }
    }
}

/// Reads the card lines of an in-flight deck transfer up to
/// `DECK_END`. Returns `None` if the stream ends first.
async fn read_deck_body(
    conn: &LineConnection,
) -> Option<Vec<ProgramCard>> {
    let mut deck = Vec::new();
    loop {
        let line = match conn.recv_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => {
                tracing::debug!("stream ended mid deck transfer");
                return None;
            }
        };
        if Sentinel::from_line(&line) == Some(Sentinel::DeckEnd) {
            return Some(deck);
        }
        match decode_card(&line) {
            Ok(card) => deck.push(card),
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable deck line");
            }
        }
    }
}
