//! # Rallynet
//!
//! LAN synchronization layer for a turn-based robot-rally board game.
//!
//! One participant hosts the session ([`RallyServer`]); the others join
//! as remote peers ([`RallyClient`]). All traffic is newline-delimited
//! text over TCP: card selections tagged with their owner's participant
//! number, a handful of sentinel lines, and quit notices. The host
//! collects every participant's five-card selection set, broadcasts the
//! aggregated result, and gates its per-peer reader tasks behind a
//! two-phase turn barrier while the turn is applied.
//!
//! ## Layers
//!
//! - [`rallynet_transport`] — TCP listener and line-framed connections
//! - [`rallynet_protocol`] — wire grammar: cards, sentinels, quits
//! - [`rallynet_session`] — registry, deck, and the turn barrier
//! - this crate — the host server, per-peer handlers, and the client
//!
//! ## Hosting a session
//!
//! ```rust,ignore
//! use rallynet::prelude::*;
//!
//! let server = RallyServer::builder()
//!     .bind("0.0.0.0:9000")
//!     .expected_peers(2)
//!     .build()
//!     .await?;
//! let mut handle = server.start().await?;
//!
//! let mut turns = handle.take_turn_starts().unwrap();
//! while turns.recv().await.is_some() {
//!     for _ in 0..REGISTER_COUNT {
//!         let plays = handle.drain_round().await;
//!         // apply `plays` to the board, lowest priority first
//!     }
//!     handle.complete_turn().await;
//! }
//! ```
//!
//! ## Joining a session
//!
//! ```rust,ignore
//! use rallynet::prelude::*;
//!
//! let client = RallyClient::connect("192.168.0.10:9000").await?;
//! let mut events = client.events();
//! while let Some(event) = events.recv().await {
//!     // feed selections / turn starts into the local game state
//! }
//! ```

mod client;
mod error;
mod handler;
mod server;

pub use client::{PeerEvent, RallyClient};
pub use error::RallyError;
pub use server::{
    RallyServer, RallyServerBuilder, SessionHandle, DEFAULT_ADDR,
    HOST_PARTICIPANT,
};

/// Convenience re-exports for the common case.
pub mod prelude {
    pub use crate::{
        PeerEvent, RallyClient, RallyError, RallyServer,
        RallyServerBuilder, SessionHandle, DEFAULT_ADDR, HOST_PARTICIPANT,
    };
    pub use rallynet_protocol::{
        ParticipantId, ProgramCard, ProtocolError, Rotation, Sentinel,
    };
    pub use rallynet_session::{
        Deck, SessionError, SessionManager, TurnBarrier, TurnStart,
        REGISTER_COUNT,
    };
    pub use rallynet_transport::{
        ConnectionId, LineConnection, TcpLineTransport, TransportError,
    };
}
