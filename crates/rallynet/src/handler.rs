//! Per-connection handler: one task per connected peer.
//!
//! Each accepted connection gets its own Tokio task running this
//! handler. The loop is a small state machine:
//!
//! ```text
//! READING ──(selection)──→ append; block on continue-gate when full
//!    │
//!    ├──(quit line)──→ relay to others, remove peer, terminate
//!    └──(EOF / read error)──→ remove peer, terminate
//! ```
//!
//! Undecodable lines are logged and dropped; the connection stays
//! open. A handler terminating for any reason re-checks round
//! completeness, because the departed peer may have been the only one
//! the barrier was still waiting on.

use std::sync::Arc;

use rallynet_protocol::{
    decode_tagged_selection, encode_quit, parse_quit, ParticipantId,
};
use rallynet_session::REGISTER_COUNT;
use rallynet_transport::LineConnection;

use crate::server::{
    broadcast_except, maybe_begin_turn, remove_participant, ServerState,
};

/// Handles a single peer connection from session start to close.
pub(crate) async fn handle_peer(
    conn: Arc<LineConnection>,
    participant: ParticipantId,
    state: Arc<ServerState>,
) {
    tracing::debug!(%participant, conn = %conn.id(), "handler started");

    loop {
        let line = match conn.recv_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!(%participant, "peer closed connection");
                break;
            }
            Err(e) => {
                tracing::debug!(%participant, error = %e, "read failed");
                break;
            }
        };

        // Quit notices terminate the handler.
        if let Some(quit) = parse_quit(&line) {
            let sender = match quit {
                Ok(sender) => sender,
                Err(e) => {
                    tracing::debug!(
                        %participant, error = %e,
                        "malformed quit notice, using connection owner"
                    );
                    participant
                }
            };
            tracing::info!(%sender, "participant is leaving");
            broadcast_except(&state, sender, &encode_quit(sender)).await;
            remove_participant(&state, sender).await;
            break;
        }

        // Everything else must be a tagged selection.
        let (sender, card) = match decode_tagged_selection(&line) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(
                    %participant, error = %e,
                    "dropping undecodable line"
                );
                continue;
            }
        };

        // The continue-gate is registered under the same lock as the
        // append: a turn cannot be claimed or released between this
        // handler's fifth card landing and its gate existing.
        let (count, gate) = {
            let mut session = state.session.lock().await;
            match session.append_selection(sender, card) {
                Ok(count) => {
                    let gate = (count >= REGISTER_COUNT)
                        .then(|| state.barrier.continue_gate());
                    (count, gate)
                }
                Err(e) => {
                    drop(session);
                    tracing::warn!(
                        %participant, %sender, error = %e,
                        "selection rejected"
                    );
                    continue;
                }
            }
        };
        tracing::debug!(%sender, count, "selection queued");

        if let Some(gate) = gate {
            // Trigger the turn if this was the last missing set, then
            // stop reading until the turn has been fully applied.
            if let Err(e) = maybe_begin_turn(&state).await {
                tracing::warn!(%participant, error = %e, "turn start failed");
            }
            let _ = gate.await;
        }
    }

    // Terminal cleanup: drop this peer and re-check completeness so
    // the barrier never waits on a participant who no longer exists.
    remove_participant(&state, participant).await;
    if let Err(e) = maybe_begin_turn(&state).await {
        tracing::warn!(%participant, error = %e, "turn start failed");
    }
    tracing::debug!(%participant, "handler stopped");
}
