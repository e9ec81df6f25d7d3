//! Minimal LAN session demo: one process hosts, the others join.
//!
//! ```text
//! lan-rally host [peers]    # host a session for `peers` remote peers
//! lan-rally join <addr>     # join a hosted session
//! ```
//!
//! Every participant plays the first five cards of its hand each turn,
//! so a full "match" runs unattended: selections cross the wire, the
//! host resolves five rounds in priority order, and everyone logs the
//! plays.

use rallynet::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("host") => {
            let peers = args
                .next()
                .map(|n| n.parse())
                .transpose()?
                .unwrap_or(1);
            host(peers).await
        }
        Some("join") => {
            let addr = args
                .next()
                .unwrap_or_else(|| DEFAULT_ADDR.to_string());
            join(&addr).await
        }
        _ => {
            eprintln!("usage: lan-rally host [peers] | lan-rally join <addr>");
            std::process::exit(2);
        }
    }
}

async fn host(peers: usize) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("hosting on 0.0.0.0:9000, waiting for {peers} peer(s)");

    let server = RallyServer::builder()
        .bind("0.0.0.0:9000")
        .expected_peers(peers)
        .build()
        .await?;
    let mut handle = server.start().await?;

    let mut turns = handle
        .take_turn_starts()
        .ok_or("resolve-gate receiver already taken")?;

    // The host plays its own hand, then resolves each round-group as
    // the selections complete.
    loop {
        let hand = handle.draw_cards(REGISTER_COUNT).await;
        if hand.len() < REGISTER_COUNT {
            tracing::info!("deck exhausted, dealing a fresh one");
            handle.new_deck_for_all().await;
            continue;
        }
        for card in hand {
            handle.submit_local_selection(card).await?;
        }

        let Some(start) = turns.recv().await else {
            tracing::info!("session over");
            return Ok(());
        };
        tracing::info!(round_group = start.round_group, "resolving turn");

        for round in 1..=REGISTER_COUNT {
            for (participant, card) in handle.drain_round().await {
                tracing::info!(
                    round, %participant, priority = card.priority,
                    card = %card.name, "play"
                );
            }
        }
        handle.complete_turn().await;

        if handle.participant_count().await <= 1 {
            tracing::info!("everyone left, shutting down");
            return Ok(());
        }
    }
}

async fn join(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("joining session at {addr}");

    let client = RallyClient::connect(addr).await?;
    tracing::info!(
        participant = %client.participant(),
        total = client.participant_count(),
        "joined"
    );

    let mut events = client.events();
    let mut hand: Vec<ProgramCard> =
        client.deck().iter().take(REGISTER_COUNT).cloned().collect();
    for card in &hand {
        client.send_selection(card).await?;
    }

    while let Some(event) = events.recv().await {
        match event {
            PeerEvent::Selection { participant, card } => {
                tracing::info!(
                    %participant, priority = card.priority,
                    card = %card.name, "selection"
                );
            }
            PeerEvent::TurnStart => {
                tracing::info!("turn starting, submitting next hand");
                for card in &hand {
                    client.send_selection(card).await?;
                }
            }
            PeerEvent::NewDeck(deck) => {
                tracing::info!(cards = deck.len(), "received a fresh deck");
                hand = deck.into_iter().take(REGISTER_COUNT).collect();
            }
            PeerEvent::PeerQuit(participant) => {
                tracing::info!(%participant, "peer left the session");
            }
        }
    }

    tracing::info!("host closed the session");
    Ok(())
}
