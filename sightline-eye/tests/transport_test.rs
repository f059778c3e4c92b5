//! WebSocket client behaviour without a live server

use bytes::Bytes;
use sightline_eye::transport::websocket::WebSocketClient;
use sightline_eye::transport::{ConnectionState, Transport};

fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_refused_connection_returns_to_disconnected() {
    let mut client = WebSocketClient::new(format!("ws://127.0.0.1:{}", unused_port()));
    let watch = client.state_watch();

    let result = tokio_test::block_on(client.connect());
    assert!(result.is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!watch.is_connected());
}

#[test]
fn test_send_requires_connection() {
    let mut client = WebSocketClient::new("ws://127.0.0.1:9");
    assert!(client.send(Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9])).is_err());
    assert!(client.dispatch_message_queue().is_empty());
}

#[test]
fn test_close_without_connection_is_noop() {
    let mut client = WebSocketClient::new("ws://127.0.0.1:9");
    tokio_test::block_on(client.close()).unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn test_invalid_url_fails_cleanly() {
    let mut client = WebSocketClient::new("not a url");
    assert!(tokio_test::block_on(client.connect()).is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
