//! Integration tests for the TCP line transport.

use std::time::Duration;

use rallynet_transport::{LineConnection, TcpLineTransport};

async fn pair() -> (LineConnection, LineConnection) {
    let transport = TcpLineTransport::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = transport.local_addr().unwrap().to_string();

    let client = tokio::spawn(async move {
        LineConnection::connect(&addr).await.expect("connect")
    });
    let server_side = transport.accept().await.expect("accept");
    let client_side = client.await.unwrap();
    (server_side, client_side)
}

#[tokio::test]
async fn test_send_and_recv_single_line() {
    let (server, client) = pair().await;
    client.send_line("1 10 0 LEFT Left rotate").await.unwrap();
    let line = server.recv_line().await.unwrap();
    assert_eq!(line.as_deref(), Some("1 10 0 LEFT Left rotate"));
}

#[tokio::test]
async fn test_lines_preserve_embedded_spaces() {
    let (server, client) = pair().await;
    server.send_line("200 -1 NONE Back up").await.unwrap();
    let line = client.recv_line().await.unwrap();
    assert_eq!(line.as_deref(), Some("200 -1 NONE Back up"));
}

#[tokio::test]
async fn test_burst_of_lines_arrives_in_order() {
    let (server, client) = pair().await;
    for i in 0..10 {
        server.send_line(&format!("line {i}")).await.unwrap();
    }
    for i in 0..10 {
        let line = client.recv_line().await.unwrap();
        assert_eq!(line, Some(format!("line {i}")));
    }
}

#[tokio::test]
async fn test_recv_returns_none_on_clean_close() {
    let (server, client) = pair().await;
    client.close().await.unwrap();

    let result =
        tokio::time::timeout(Duration::from_secs(2), server.recv_line())
            .await
            .expect("recv should not hang after close");
    assert!(matches!(result, Ok(None)));
}

#[tokio::test]
async fn test_distinct_connection_ids() {
    let (a, b) = pair().await;
    assert_ne!(a.id(), b.id());
}

#[tokio::test]
async fn test_bind_failure_is_fatal_error() {
    let result = TcpLineTransport::bind("definitely not an address").await;
    assert!(result.is_err());
}
