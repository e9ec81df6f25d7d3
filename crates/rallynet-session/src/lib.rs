//! Session state for Rallynet.
//!
//! This crate owns everything the host shares between connection
//! handlers and the turn-resolution routine:
//!
//! 1. **Registry** — which participants are live and what each has
//!    selected this round-group ([`SessionManager`])
//! 2. **Deck** — the shuffled program-card deck and its discard pile
//!    ([`Deck`])
//! 3. **Barrier** — the resolve-gate / continue-gate pair ordering
//!    "all selections in → resolve turn → resume reading"
//!    ([`TurnBarrier`])
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself — it uses plain maps,
//! not concurrent ones. It is owned by the server state and accessed
//! through one `tokio::sync::Mutex` at a higher level, which is what
//! makes the "all selections in" check atomic with respect to joins
//! and removals. [`TurnBarrier`] is internally synchronized and safe
//! to share directly.

mod barrier;
mod deck;
mod error;
mod manager;

pub use barrier::{TurnBarrier, TurnStart};
pub use deck::Deck;
pub use error::SessionError;
pub use manager::{SessionManager, REGISTER_COUNT};
