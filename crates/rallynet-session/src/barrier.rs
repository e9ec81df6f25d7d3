//! The turn barrier: the two gates ordering network I/O against turn
//! resolution.
//!
//! - **resolve-gate**: opened once per round-group when every live
//!   participant has a full selection set; the external
//!   turn-resolution routine waits on it to begin.
//! - **continue-gate**: one per blocked handler; opened when the
//!   five-round turn has been fully applied, letting handlers resume
//!   reading their connections.
//!
//! The original rendezvous was a pair of binary semaphores, which a
//! stray release could silently double-open. Here the resolve-gate is
//! a claimed flag plus a bounded channel, and each continue-gate is a
//! oneshot registered before the waiter blocks, so a gate cannot fire
//! twice and a waiter that vanishes only drops its receiver.

use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};

use crate::SessionError;

/// Signal carried through the resolve-gate: one per round-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnStart {
    /// Monotonically increasing round-group number, starting at 1.
    pub round_group: u64,
}

struct BarrierInner {
    resolving: bool,
    round_group: u64,
    waiters: Vec<oneshot::Sender<()>>,
}

/// The per-session synchronization primitive gating
/// "all selections collected → resolve turn → resume collection".
///
/// Usage discipline, in order:
/// 1. a handler (or the coordinator) calls
///    [`begin_resolution`](Self::begin_resolution) while holding the
///    session lock, atomically with the completeness check;
/// 2. the turn result is broadcast to every peer;
/// 3. [`signal_turn_start`](Self::signal_turn_start) opens the
///    resolve-gate — broadcast-before-execute is the caller's
///    responsibility and the reason these two steps are split;
/// 4. when the turn is fully applied,
///    [`release_all`](Self::release_all) opens every continue-gate and
///    re-arms the barrier for the next round-group.
pub struct TurnBarrier {
    inner: Mutex<BarrierInner>,
    turn_tx: mpsc::Sender<TurnStart>,
}

impl TurnBarrier {
    /// Creates a barrier and the receiving end of its resolve-gate,
    /// which belongs to the turn-resolution routine.
    pub fn new() -> (Self, mpsc::Receiver<TurnStart>) {
        let (turn_tx, turn_rx) = mpsc::channel(1);
        let barrier = Self {
            inner: Mutex::new(BarrierInner {
                resolving: false,
                round_group: 0,
                waiters: Vec::new(),
            }),
            turn_tx,
        };
        (barrier, turn_rx)
    }

    /// Registers a continue-gate for the calling handler. Must be
    /// called *before* the handler opens (or could observe) the
    /// resolve-gate, so the subsequent [`release_all`] cannot be
    /// missed.
    ///
    /// [`release_all`]: Self::release_all
    pub fn continue_gate(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .lock()
            .expect("barrier mutex poisoned")
            .waiters
            .push(tx);
        rx
    }

    /// Claims the resolve slot for a new round-group.
    ///
    /// # Errors
    /// Returns [`SessionError::ResolutionInProgress`] if a turn is
    /// already being resolved — the gate opens at most once per
    /// round-group.
    pub fn begin_resolution(&self) -> Result<(), SessionError> {
        let mut inner =
            self.inner.lock().expect("barrier mutex poisoned");
        if inner.resolving {
            return Err(SessionError::ResolutionInProgress);
        }
        inner.resolving = true;
        inner.round_group += 1;
        Ok(())
    }

    /// Opens the resolve-gate for the claimed round-group. Call only
    /// after the turn result has been fully broadcast.
    ///
    /// # Errors
    /// Returns [`SessionError::ResolverUnavailable`] if the resolution
    /// routine has dropped its receiver.
    pub fn signal_turn_start(&self) -> Result<(), SessionError> {
        let round_group = {
            let inner =
                self.inner.lock().expect("barrier mutex poisoned");
            debug_assert!(inner.resolving, "signal without begin_resolution");
            inner.round_group
        };
        self.turn_tx
            .try_send(TurnStart { round_group })
            .map_err(|_| SessionError::ResolverUnavailable)
    }

    /// Opens every registered continue-gate and re-arms the barrier.
    /// Called by the turn-resolution routine once the five-round turn
    /// is fully applied. Waiters that already vanished are skipped.
    pub fn release_all(&self) {
        let waiters = {
            let mut inner =
                self.inner.lock().expect("barrier mutex poisoned");
            inner.resolving = false;
            std::mem::take(&mut inner.waiters)
        };
        tracing::debug!(waiters = waiters.len(), "continue-gates opened");
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    /// `true` while a claimed round-group has not been released yet.
    pub fn is_resolving(&self) -> bool {
        self.inner
            .lock()
            .expect("barrier mutex poisoned")
            .resolving
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_gate_opens_once_per_round_group() {
        let (barrier, mut turn_rx) = TurnBarrier::new();

        barrier.begin_resolution().unwrap();
        assert!(matches!(
            barrier.begin_resolution(),
            Err(SessionError::ResolutionInProgress)
        ));

        barrier.signal_turn_start().unwrap();
        assert_eq!(
            turn_rx.recv().await,
            Some(TurnStart { round_group: 1 })
        );
        assert!(turn_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_release_all_rearms_the_barrier() {
        let (barrier, mut turn_rx) = TurnBarrier::new();

        barrier.begin_resolution().unwrap();
        barrier.signal_turn_start().unwrap();
        turn_rx.recv().await.unwrap();
        barrier.release_all();

        barrier.begin_resolution().unwrap();
        barrier.signal_turn_start().unwrap();
        assert_eq!(
            turn_rx.recv().await,
            Some(TurnStart { round_group: 2 })
        );
    }

    #[tokio::test]
    async fn test_continue_gates_open_on_release() {
        let (barrier, _turn_rx) = TurnBarrier::new();
        let a = barrier.continue_gate();
        let b = barrier.continue_gate();

        barrier.release_all();
        assert!(a.await.is_ok());
        assert!(b.await.is_ok());
    }

    #[tokio::test]
    async fn test_vanished_waiter_does_not_stall_release() {
        let (barrier, _turn_rx) = TurnBarrier::new();
        let a = barrier.continue_gate();
        let b = barrier.continue_gate();
        drop(b);

        barrier.release_all();
        assert!(a.await.is_ok());
        assert!(!barrier.is_resolving());
    }

    #[tokio::test]
    async fn test_signal_fails_when_resolver_is_gone() {
        let (barrier, turn_rx) = TurnBarrier::new();
        drop(turn_rx);
        barrier.begin_resolution().unwrap();
        assert!(matches!(
            barrier.signal_turn_start(),
            Err(SessionError::ResolverUnavailable)
        ));
    }
}
