//! Integration tests for the session host, per-peer handlers, and the
//! full join → select → turn → quit flow over real TCP connections.

use std::time::Duration;

use rallynet::prelude::*;
use tokio::task::JoinHandle;
use tokio::time::timeout;

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(2);

/// Binds a host on a random port and runs its accept loop in the
/// background. Returns the address and a handle resolving to the
/// `SessionHandle` once every expected peer has joined.
async fn start_host(
    expected_peers: usize,
) -> (String, JoinHandle<SessionHandle>) {
    let server = RallyServer::builder()
        .bind("127.0.0.1:0")
        .expected_peers(expected_peers)
        .build()
        .await
        .expect("host should bind");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    let join = tokio::spawn(async move {
        server.start().await.expect("session should start")
    });
    (addr, join)
}

fn card(priority: i32, name: &str) -> ProgramCard {
    ProgramCard::new(priority, 1, Rotation::None, name)
}

/// Polls until the session sees the expected participant count.
async fn wait_for_participant_count(handle: &SessionHandle, n: usize) {
    timeout(WAIT, async {
        while handle.participant_count().await != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("participant count should settle before timeout");
}

/// Polls until a participant has the expected number of queued cards.
async fn wait_for_selection_count(
    handle: &SessionHandle,
    participant: ParticipantId,
    n: usize,
) {
    timeout(WAIT, async {
        while handle.selection_count(participant).await != Some(n) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("selection count should settle before timeout");
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_assigns_ascending_participant_numbers() {
    let (addr, host) = start_host(2).await;

    let first = RallyClient::connect(&addr).await.expect("first join");
    let second = RallyClient::connect(&addr).await.expect("second join");
    let handle = host.await.expect("host task");

    assert_eq!(first.participant(), ParticipantId(2));
    assert_eq!(second.participant(), ParticipantId(3));
    assert_eq!(first.participant_count(), 3);
    assert_eq!(second.participant_count(), 3);
    assert_eq!(handle.participant_count().await, 3);
}

#[tokio::test]
async fn test_handshake_transfers_full_deck() {
    let (addr, host) = start_host(1).await;

    let client = RallyClient::connect(&addr).await.expect("join");
    let _handle = host.await.expect("host task");

    // The standard deck is 84 cards; the transfer carries all of them.
    assert_eq!(client.deck().len(), 84);
    assert!(client.deck().iter().all(|c| c.priority > 0));
}

// =========================================================================
// Full turn flow
// =========================================================================

#[tokio::test]
async fn test_full_turn_selections_broadcast_then_resolved() {
    let (addr, host) = start_host(1).await;
    let client = RallyClient::connect(&addr).await.expect("join");
    let mut handle = host.await.expect("host task");
    let mut events = client.events();
    let mut turns = handle.take_turn_starts().expect("first take");

    // Host plays priorities 10..50, the remote peer 15..55. Interleaved
    // ascending order is then strictly alternating.
    for i in 0..REGISTER_COUNT as i32 {
        handle
            .submit_local_selection(card(10 + i * 10, "Move 1"))
            .await
            .expect("host selection");
    }
    for i in 0..REGISTER_COUNT as i32 {
        client
            .send_selection(&card(15 + i * 10, "Move 1"))
            .await
            .expect("peer selection");
    }

    // The host's resolve-gate opens once, after the broadcast.
    let start = timeout(WAIT, turns.recv())
        .await
        .expect("turn should start")
        .expect("channel open");
    assert_eq!(start.round_group, 1);

    // The remote peer sees all ten tagged selections, then START_TURN.
    let mut selections = 0;
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("event should arrive")
            .expect("stream open");
        match event {
            PeerEvent::Selection { participant, .. } => {
                assert!(
                    participant == HOST_PARTICIPANT
                        || participant == ParticipantId(2)
                );
                selections += 1;
            }
            PeerEvent::TurnStart => break,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(selections, 2 * REGISTER_COUNT);

    // Five rounds, two plays each, lowest priority first.
    for round in 0..REGISTER_COUNT as i32 {
        let plays = handle.drain_round().await;
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[0].0, HOST_PARTICIPANT);
        assert_eq!(plays[0].1.priority, 10 + round * 10);
        assert_eq!(plays[1].0, ParticipantId(2));
        assert_eq!(plays[1].1.priority, 15 + round * 10);
    }

    handle.complete_turn().await;
    assert_eq!(handle.selection_count(HOST_PARTICIPANT).await, Some(0));
    assert_eq!(handle.selection_count(ParticipantId(2)).await, Some(0));
}

#[tokio::test]
async fn test_sixth_local_selection_rejected() {
    let (addr, host) = start_host(1).await;
    let _client = RallyClient::connect(&addr).await.expect("join");
    let handle = host.await.expect("host task");

    for i in 0..REGISTER_COUNT as i32 {
        handle
            .submit_local_selection(card(100 + i, "Move 1"))
            .await
            .expect("selection should queue");
    }
    let err = handle
        .submit_local_selection(card(200, "Move 1"))
        .await
        .expect_err("sixth card should be rejected");
    assert!(matches!(
        err,
        RallyError::Session(SessionError::SelectionSetFull(_))
    ));
    assert_eq!(
        handle.selection_count(HOST_PARTICIPANT).await,
        Some(REGISTER_COUNT)
    );
}

#[tokio::test]
async fn test_undecodable_line_dropped_connection_stays_up() {
    let (addr, host) = start_host(1).await;
    let client = RallyClient::connect(&addr).await.expect("join");
    let handle = host.await.expect("host task");

    client
        .send_line("This is not a card")
        .await
        .expect("raw send");
    client
        .send_selection(&card(70, "Rotate left"))
        .await
        .expect("valid selection");

    wait_for_selection_count(&handle, ParticipantId(2), 1).await;
}

#[tokio::test]
async fn test_turn_starts_exactly_once_under_concurrent_completion() {
    let (addr, host) = start_host(3).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(RallyClient::connect(&addr).await.expect("join"));
    }
    let mut handle = host.await.expect("host task");
    let mut turns = handle.take_turn_starts().expect("first take");

    for i in 0..REGISTER_COUNT as i32 {
        handle
            .submit_local_selection(card(500 + i, "Move 1"))
            .await
            .expect("host selection");
    }

    // Interleave the sends so all three peers finish their sets
    // back-to-back and their handlers race for the completeness check.
    for i in 0..REGISTER_COUNT as i32 {
        for (n, client) in clients.iter().enumerate() {
            client
                .send_selection(&card(n as i32 * 100 + i + 1, "Move 1"))
                .await
                .expect("peer selection");
        }
    }

    let start = timeout(WAIT, turns.recv())
        .await
        .expect("turn should start")
        .expect("channel open");
    assert_eq!(start.round_group, 1);

    // No duplicate resolve-gate signal for the same round-group.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(turns.try_recv().is_err());
}

// =========================================================================
// Quit handling
// =========================================================================

#[tokio::test]
async fn test_quit_relayed_to_other_peers_not_echoed() {
    let (addr, host) = start_host(2).await;
    let stayer = RallyClient::connect(&addr).await.expect("join");
    let leaver = RallyClient::connect(&addr).await.expect("join");
    let handle = host.await.expect("host task");

    let mut stayer_events = stayer.events();
    let mut leaver_events = leaver.events();

    leaver.send_quit().await.expect("quit send");

    let event = timeout(WAIT, stayer_events.recv())
        .await
        .expect("relay should arrive")
        .expect("stream open");
    assert_eq!(event, PeerEvent::PeerQuit(ParticipantId(3)));

    // The departing peer gets no echo; its stream just ends.
    let echo = timeout(WAIT, leaver_events.recv())
        .await
        .expect("stream should close");
    assert_eq!(echo, None);

    wait_for_participant_count(&handle, 2).await;
    assert_eq!(handle.selection_count(ParticipantId(3)).await, None);
}

#[tokio::test]
async fn test_quit_of_last_missing_peer_completes_round() {
    let (addr, host) = start_host(2).await;
    let player = RallyClient::connect(&addr).await.expect("join");
    let leaver = RallyClient::connect(&addr).await.expect("join");
    let mut handle = host.await.expect("host task");
    let mut turns = handle.take_turn_starts().expect("first take");

    for i in 0..REGISTER_COUNT as i32 {
        handle
            .submit_local_selection(card(10 + i, "Move 1"))
            .await
            .expect("host selection");
        player
            .send_selection(&card(300 + i, "Move 1"))
            .await
            .expect("peer selection");
    }
    wait_for_selection_count(&handle, ParticipantId(2), REGISTER_COUNT)
        .await;

    // Everyone still waits on the silent third participant. Its quit
    // shrinks the live set and the round completes immediately.
    assert!(turns.try_recv().is_err());
    leaver.send_quit().await.expect("quit send");

    let start = timeout(WAIT, turns.recv())
        .await
        .expect("turn should start after quit")
        .expect("channel open");
    assert_eq!(start.round_group, 1);
}

#[tokio::test]
async fn test_disconnect_without_quit_removes_participant() {
    let (addr, host) = start_host(2).await;
    let stayer = RallyClient::connect(&addr).await.expect("join");
    let dropper = RallyClient::connect(&addr).await.expect("join");
    let handle = host.await.expect("host task");

    drop(dropper);
    // No PeerQuit relay is guaranteed for a raw disconnect, but the
    // registry must shrink so the barrier never waits on the ghost.
    wait_for_participant_count(&handle, 2).await;
    assert_eq!(handle.selection_count(ParticipantId(3)).await, None);
    assert_eq!(handle.selection_count(ParticipantId(2)).await, Some(0));
    drop(stayer);
}

// =========================================================================
// Deck redistribution
// =========================================================================

#[tokio::test]
async fn test_new_deck_broadcast_to_all_peers() {
    let (addr, host) = start_host(1).await;
    let client = RallyClient::connect(&addr).await.expect("join");
    let handle = host.await.expect("host task");
    let mut events = client.events();

    handle.new_deck_for_all().await;

    let event = timeout(WAIT, events.recv())
        .await
        .expect("deck should arrive")
        .expect("stream open");
    match event {
        PeerEvent::NewDeck(deck) => assert_eq!(deck.len(), 84),
        other => panic!("expected NewDeck, got {other:?}"),
    }
}
