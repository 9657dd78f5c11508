//! Exercises CollectorClient against a one-shot local HTTP responder.

use collector_client::{CollectorClient, CollectorError};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Accepts a single connection, captures the raw request, answers with
/// `status_line` and `body`.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });

    (format!("http://{addr}/collect"), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8(buf).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn posts_json_body_and_accepts_2xx() {
    let (endpoint, server) = serve_once("202 Accepted", "").await;
    let client = CollectorClient::new(&endpoint).unwrap();

    client
        .post(&json!({ "name": "signup", "payload": { "plan": "pro" } }))
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /collect HTTP/1.1"));
    assert!(request.to_lowercase().contains("content-type: application/json"));
    assert!(request.contains(r#""name":"signup""#));
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let (endpoint, server) = serve_once("503 Service Unavailable", "down for maintenance").await;
    let client = CollectorClient::new(&endpoint).unwrap();

    let err = client.post(&json!({ "name": "x" })).await.unwrap_err();
    server.await.unwrap();

    assert_eq!(err.status(), Some(503));
    match err {
        CollectorError::Api { message, .. } => assert_eq!(message, "down for maintenance"),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_error_status_fails() {
    let (endpoint, server) = serve_once("404 Not Found", "no such collector").await;
    let client = CollectorClient::new(&endpoint).unwrap();

    let err = client.post(&json!({})).await.unwrap_err();
    server.await.unwrap();

    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = CollectorClient::new(&format!("http://{addr}/collect")).unwrap();
    let err = client.post(&json!({})).await.unwrap_err();

    assert!(matches!(err, CollectorError::Network(_)));
    assert_eq!(err.status(), None);
}
