//! Integration tests for the network transports.
//!
//! These spin up a real listener on an OS-assigned port and a real client,
//! so records actually cross a socket.

use std::time::Duration;

use parlor_transport::{
    Connection, MAX_LINE_BYTES, TcpTransport, Transport, TransportError,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use parlor_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    async fn connect_client(
        addr: &str,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        // "127.0.0.1:0" lets the OS pick a free port.
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.id().into_inner() > 0);

        // --- Server sends, client receives ---
        server_conn
            .send(br#"{"subject":"welcome_message"}"#)
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(
            msg.into_data().as_ref(),
            br#"{"subject":"welcome_message"}"#,
        );

        // --- Client sends, server receives ---
        client_ws
            .send(Message::Text("hello from client".to_string().into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        // A reader parked in `recv` must not block writers.
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });

        let mut client_ws = connect_client(&addr).await;
        let server_conn =
            std::sync::Arc::new(server_handle.await.unwrap());

        let reader = std::sync::Arc::clone(&server_conn);
        let pending = tokio::spawn(async move { reader.recv().await });
        tokio::task::yield_now().await;

        server_conn.send(b"while reading").await.unwrap();
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"while reading");

        client_ws
            .send(Message::Text("unblock".to_string().into()))
            .await
            .unwrap();
        let got = pending.await.unwrap().unwrap();
        assert_eq!(got, Some(b"unblock".to_vec()));
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }
}

#[tokio::test]
async fn test_tcp_lines_are_records() {
    let mut transport =
        TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
    let addr = transport.local_addr().unwrap();

    let server_handle =
        tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    // Two records in one write, a blank line, and a CRLF terminator.
    client
        .write_all(b"first\nsecond\n\nthird\r\n")
        .await
        .unwrap();

    assert_eq!(server_conn.recv().await.unwrap(), Some(b"first".to_vec()));
    assert_eq!(server_conn.recv().await.unwrap(), Some(b"second".to_vec()));
    assert_eq!(server_conn.recv().await.unwrap(), Some(b"third".to_vec()));
}

#[tokio::test]
async fn test_tcp_record_split_across_writes() {
    let mut transport =
        TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
    let addr = transport.local_addr().unwrap();

    let server_handle =
        tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    client.write_all(b"hel").await.unwrap();
    client.flush().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    client.write_all(b"lo\n").await.unwrap();

    assert_eq!(server_conn.recv().await.unwrap(), Some(b"hello".to_vec()));
}

#[tokio::test]
async fn test_tcp_send_appends_newline_and_eof_is_none() {
    let mut transport =
        TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
    let addr = transport.local_addr().unwrap();

    let server_handle =
        tokio::spawn(async move { transport.accept().await.unwrap() });
    let client = tokio::net::TcpStream::connect(addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    server_conn.send(b"{\"a\":1}").await.unwrap();

    let (read, write) = client.into_split();
    let mut lines = BufReader::new(read).lines();
    let line = lines.next_line().await.unwrap();
    assert_eq!(line.as_deref(), Some("{\"a\":1}"));

    drop(write);
    drop(lines);
    assert_eq!(server_conn.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_tcp_recv_cancelled_mid_line_keeps_partial_bytes() {
    let mut transport =
        TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
    let addr = transport.local_addr().unwrap();

    let server_handle =
        tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    client.write_all(b"{\"subject\":").await.unwrap();
    client.flush().await.unwrap();

    // The first half arrives, but no newline: this recv is dropped unfinished.
    let cancelled =
        tokio::time::timeout(Duration::from_millis(50), server_conn.recv())
            .await;
    assert!(cancelled.is_err(), "recv should still be waiting for a newline");

    client.write_all(b"\"heartbeat\"}\n").await.unwrap();

    assert_eq!(
        server_conn.recv().await.unwrap(),
        Some(br#"{"subject":"heartbeat"}"#.to_vec()),
    );
}

#[tokio::test]
async fn test_tcp_oversize_line_is_rejected() {
    let mut transport =
        TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
    let addr = transport.local_addr().unwrap();

    let server_handle =
        tokio::spawn(async move { transport.accept().await.unwrap() });
    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    let server_conn = server_handle.await.unwrap();

    // No newline anywhere, so the whole write sits in one pending line.
    let writer = tokio::spawn(async move {
        let oversize = vec![b'x'; MAX_LINE_BYTES + 1];
        let _ = client.write_all(&oversize).await;
        client
    });

    let result = server_conn.recv().await;
    match result {
        Err(TransportError::FrameTooLarge(len)) => {
            assert!(len >= MAX_LINE_BYTES);
        }
        other => panic!("expected FrameTooLarge, got {other:?}"),
    }
    drop(writer.await.unwrap());
}
