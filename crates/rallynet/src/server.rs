//! `RallyServer` builder, accept loop, and session coordination.
//!
//! The hosting peer is the entry point for a LAN session. It ties the
//! layers together: transport → protocol → session state → per-peer
//! handlers. The host itself is always participant 1; remote peers are
//! numbered 2, 3, ... in accept order.

use std::collections::BTreeMap;
use std::sync::Arc;

use rallynet_protocol::{encode_card, encode_selection, ParticipantId, ProgramCard, Sentinel};
use rallynet_session::{Deck, SessionManager, TurnBarrier, TurnStart};
use rallynet_transport::{LineConnection, TcpLineTransport};
use tokio::sync::{mpsc, Mutex};

use crate::handler::handle_peer;
use crate::RallyError;

/// The default service address (port 9000).
pub const DEFAULT_ADDR: &str = "127.0.0.1:9000";

/// The hosting peer's own participant number.
pub const HOST_PARTICIPANT: ParticipantId = ParticipantId(1);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// session registry and the peer map are both mutated from many
/// handler tasks, so each sits behind its own `Mutex`; the barrier is
/// internally synchronized.
pub(crate) struct ServerState {
    pub(crate) session: Mutex<SessionManager>,
    pub(crate) peers: Mutex<BTreeMap<ParticipantId, Arc<LineConnection>>>,
    pub(crate) barrier: TurnBarrier,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a session host.
///
/// # Example
///
/// ```rust,ignore
/// use rallynet::prelude::*;
///
/// let server = RallyServer::builder()
///     .bind("0.0.0.0:9000")
///     .expected_peers(2)
///     .build()
///     .await?;
/// let handle = server.start().await?;
/// ```
pub struct RallyServerBuilder {
    bind_addr: String,
    expected_peers: usize,
    deck: Option<Deck>,
}

impl RallyServerBuilder {
    /// Creates a new builder with default settings: the default
    /// address, one expected remote peer, and a fresh shuffled deck.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            expected_peers: 1,
            deck: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets how many remote peers join before the session starts.
    /// The total participant count is this plus the host.
    pub fn expected_peers(mut self, count: usize) -> Self {
        self.expected_peers = count;
        self
    }

    /// Supplies a prepared deck instead of a fresh shuffled one.
    pub fn deck(mut self, deck: Deck) -> Self {
        self.deck = Some(deck);
        self
    }

    /// Binds the listening socket and sets up session state.
    ///
    /// # Errors
    /// A bind failure is fatal at session start and surfaced here; it
    /// is never retried.
    pub async fn build(self) -> Result<RallyServer, RallyError> {
        let transport = TcpLineTransport::bind(&self.bind_addr).await?;

        let deck = self.deck.unwrap_or_else(Deck::shuffled);
        let mut session = SessionManager::new(deck);
        session.register(HOST_PARTICIPANT)?;

        let (barrier, turn_rx) = TurnBarrier::new();
        let state = Arc::new(ServerState {
            session: Mutex::new(session),
            peers: Mutex::new(BTreeMap::new()),
            barrier,
        });

        Ok(RallyServer {
            transport,
            state,
            turn_rx,
            expected_peers: self.expected_peers,
        })
    }
}

impl Default for RallyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A bound session host, ready to accept its peers.
pub struct RallyServer {
    transport: TcpLineTransport,
    state: Arc<ServerState>,
    turn_rx: mpsc::Receiver<TurnStart>,
    expected_peers: usize,
}

impl RallyServer {
    /// Creates a new builder.
    pub fn builder() -> RallyServerBuilder {
        RallyServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop: accepts exactly the expected number of
    /// peers, sends each the join handshake, and spawns its handler.
    ///
    /// Each peer receives the full handshake burst (participant
    /// number, total count, deck transfer) *before* it is added to the
    /// broadcast set, so no broadcast can interleave with a handshake
    /// in progress. Transient accept errors are logged and retried.
    ///
    /// Returns once every expected peer has joined — this is the
    /// "setup complete" signal to the hosting peer. The listening
    /// socket is closed on return.
    pub async fn start(self) -> Result<SessionHandle, RallyError> {
        let total = self.expected_peers + 1;
        let mut connected = 0;

        while connected < self.expected_peers {
            let conn = match self.transport.accept().await {
                Ok(conn) => Arc::new(conn),
                Err(e) => {
                    tracing::error!(error = %e, "accept failed, retrying");
                    continue;
                }
            };

            let participant = ParticipantId(connected as u32 + 2);

            if let Err(e) =
                send_handshake(&self.state, &conn, participant, total).await
            {
                tracing::warn!(
                    %participant, error = %e,
                    "handshake failed, dropping connection"
                );
                let _ = conn.close().await;
                continue;
            }

            {
                let mut session = self.state.session.lock().await;
                session.register(participant)?;
            }
            self.state
                .peers
                .lock()
                .await
                .insert(participant, Arc::clone(&conn));

            let state = Arc::clone(&self.state);
            tokio::spawn(handle_peer(conn, participant, state));

            connected += 1;
            tracing::info!(%participant, "peer connected");
        }

        tracing::info!(total, "all peers connected, session starting");
        // `self.transport` drops here: the welcoming socket closes.
        Ok(SessionHandle {
            state: self.state,
            turn_rx: Some(self.turn_rx),
        })
    }
}

/// Writes the join handshake burst: assigned number, total count, and
/// the deck-transfer sub-protocol.
async fn send_handshake(
    state: &Arc<ServerState>,
    conn: &LineConnection,
    participant: ParticipantId,
    total: usize,
) -> Result<(), RallyError> {
    conn.send_line(&participant.to_string()).await?;
    conn.send_line(&total.to_string()).await?;

    let deck_lines = {
        let session = state.session.lock().await;
        deck_transfer_lines(&session)
    };
    for line in &deck_lines {
        conn.send_line(line).await?;
    }
    Ok(())
}

/// The deck-transfer sub-protocol as a burst of lines:
/// `DECK_BEGIN`, one untagged card line per card, `DECK_END`.
fn deck_transfer_lines(session: &SessionManager) -> Vec<String> {
    let deck = session.deck();
    let mut lines = Vec::with_capacity(deck.len() + 2);
    lines.push(Sentinel::DeckBegin.as_str().to_string());
    lines.extend(deck.cards().map(encode_card));
    lines.push(Sentinel::DeckEnd.as_str().to_string());
    lines
}

// ---------------------------------------------------------------------------
// Shared coordination helpers (used by handlers and the handle)
// ---------------------------------------------------------------------------

/// Writes a line to every live peer. Peers whose write fails are
/// dropped from the session afterwards; the failure never propagates
/// to other connections.
pub(crate) async fn broadcast(state: &Arc<ServerState>, line: &str) {
    let failed = {
        let peers = state.peers.lock().await;
        let mut failed = Vec::new();
        for (participant, conn) in peers.iter() {
            if let Err(e) = conn.send_line(line).await {
                tracing::debug!(%participant, error = %e, "broadcast write failed");
                failed.push(*participant);
            }
        }
        failed
    };
    for participant in failed {
        remove_participant(state, participant).await;
    }
}

/// As [`broadcast`], skipping one participant — used to relay a quit
/// notice to everyone but the departing peer.
pub(crate) async fn broadcast_except(
    state: &Arc<ServerState>,
    skip: ParticipantId,
    line: &str,
) {
    let failed = {
        let peers = state.peers.lock().await;
        let mut failed = Vec::new();
        for (participant, conn) in peers.iter() {
            if *participant == skip {
                continue;
            }
            if let Err(e) = conn.send_line(line).await {
                tracing::debug!(%participant, error = %e, "broadcast write failed");
                failed.push(*participant);
            }
        }
        failed
    };
    for participant in failed {
        remove_participant(state, participant).await;
    }
}

/// Closes a participant's connection and drops it from the live set
/// and the registry. Idempotent.
pub(crate) async fn remove_participant(
    state: &Arc<ServerState>,
    participant: ParticipantId,
) {
    let conn = state.peers.lock().await.remove(&participant);
    if let Some(conn) = conn {
        let _ = conn.close().await;
    }
    state.session.lock().await.remove(participant);
}

/// Checks the round-group for completeness and, if every live
/// participant has a full selection set, runs the turn start:
/// broadcast every selection, then open the resolve-gate.
///
/// The completeness check and the resolve-slot claim happen under the
/// session lock, so concurrent handlers (or a removal that completes
/// the round) can never start the same turn twice. The broadcast
/// finishes before the gate opens.
pub(crate) async fn maybe_begin_turn(
    state: &Arc<ServerState>,
) -> Result<bool, RallyError> {
    {
        let session = state.session.lock().await;
        if !session.all_selections_in() {
            return Ok(false);
        }
        if state.barrier.begin_resolution().is_err() {
            return Ok(false);
        }
    }

    publish_turn_result(state).await;
    state.barrier.signal_turn_start()?;
    tracing::info!("turn started");
    Ok(true)
}

/// Broadcasts every participant's full selection set (tagged with its
/// owner, in submission order) to every peer, followed by the
/// start-of-turn sentinel. All writes are flushed before this returns;
/// the caller opens the resolve-gate only afterwards.
pub(crate) async fn publish_turn_result(state: &Arc<ServerState>) {
    let mut lines: Vec<String> = {
        let session = state.session.lock().await;
        let mut lines = Vec::new();
        for participant in session.live_participants() {
            if let Some(cards) = session.selections_of(participant) {
                lines.extend(
                    cards.map(|card| encode_selection(participant, card)),
                );
            }
        }
        lines
    };
    lines.push(Sentinel::StartTurn.as_str().to_string());
    broadcast_burst(state, &lines).await;
}

/// Writes a contiguous burst of lines to every live peer. The peer map
/// stays locked for the whole burst so no other broadcast interleaves
/// with it. A peer whose write fails is dropped afterwards and the
/// rest of its burst skipped.
pub(crate) async fn broadcast_burst(
    state: &Arc<ServerState>,
    lines: &[String],
) {
    let failed = {
        let peers = state.peers.lock().await;
        let mut failed = Vec::new();
        'peer: for (participant, conn) in peers.iter() {
            for line in lines {
                if let Err(e) = conn.send_line(line).await {
                    tracing::debug!(%participant, error = %e, "burst write failed");
                    failed.push(*participant);
                    continue 'peer;
                }
            }
        }
        failed
    };
    for participant in failed {
        remove_participant(state, participant).await;
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// The hosting peer's handle to a running session.
///
/// Returned by [`RallyServer::start`] once every expected peer has
/// joined. The host submits its own selections through it, the
/// external turn-resolution routine takes the resolve-gate receiver
/// from it and reports completion through it.
pub struct SessionHandle {
    state: Arc<ServerState>,
    turn_rx: Option<mpsc::Receiver<TurnStart>>,
}

impl SessionHandle {
    /// Takes the resolve-gate receiver. The turn-resolution routine
    /// awaits it to learn when a round-group is ready to apply.
    /// Yields `None` after the first call.
    pub fn take_turn_starts(
        &mut self,
    ) -> Option<mpsc::Receiver<TurnStart>> {
        self.turn_rx.take()
    }

    /// Queues one of the host's own cards, exactly as a handler does
    /// for a remote selection — including the completeness check, so a
    /// host finishing last still starts the turn.
    ///
    /// # Errors
    /// Propagates registry errors (e.g. a sixth card in one
    /// round-group) and barrier signalling failures.
    pub async fn submit_local_selection(
        &self,
        card: ProgramCard,
    ) -> Result<(), RallyError> {
        {
            let mut session = self.state.session.lock().await;
            session.append_selection(HOST_PARTICIPANT, card)?;
        }
        maybe_begin_turn(&self.state).await?;
        Ok(())
    }

    /// Draws `n` cards from the session deck (dealing the host's
    /// hand).
    pub async fn draw_cards(&self, n: usize) -> Vec<ProgramCard> {
        self.state.session.lock().await.deck_mut().draw_hand(n)
    }

    /// Writes a raw line to every connected peer.
    pub async fn broadcast(&self, line: &str) {
        broadcast(&self.state, line).await;
    }

    /// Writes a raw line to every connected peer except one.
    pub async fn broadcast_except(
        &self,
        skip: ParticipantId,
        line: &str,
    ) {
        broadcast_except(&self.state, skip, line).await;
    }

    /// Broadcasts the aggregated turn result followed by `START_TURN`.
    /// Normally driven by the completeness check; exposed for hosts
    /// that need to force a turn.
    pub async fn publish_turn_result(&self) {
        publish_turn_result(&self.state).await;
    }

    /// Takes one round of plays in global priority order. Called five
    /// times per turn by the resolution routine.
    pub async fn drain_round(
        &self,
    ) -> Vec<(ParticipantId, ProgramCard)> {
        self.state.session.lock().await.drain_round()
    }

    /// Reports the five-round turn fully applied: discards any
    /// leftover selections and opens every handler's continue-gate so
    /// reading resumes for the next round-group.
    pub async fn complete_turn(&self) {
        self.state.session.lock().await.clear_selections();
        self.state.barrier.release_all();
        tracing::info!("turn complete, handlers released");
    }

    /// Regenerates a shuffled deck, updates shared state, and
    /// transmits it to every peer via the deck-transfer sub-protocol.
    pub async fn new_deck_for_all(&self) {
        let lines = {
            let mut session = self.state.session.lock().await;
            session.set_deck(Deck::shuffled());
            deck_transfer_lines(&session)
        };
        broadcast_burst(&self.state, &lines).await;
        tracing::info!("new deck transmitted to all peers");
    }

    /// Closes a participant's connection and removes it from the
    /// session. Idempotent.
    pub async fn disconnect(&self, participant: ParticipantId) {
        remove_participant(&self.state, participant).await;
    }

    /// Number of live participants, the host included.
    pub async fn participant_count(&self) -> usize {
        self.state.session.lock().await.participant_count()
    }

    /// How many cards a participant has queued this round-group.
    pub async fn selection_count(
        &self,
        participant: ParticipantId,
    ) -> Option<usize> {
        self.state.session.lock().await.selection_count(participant)
    }
}
