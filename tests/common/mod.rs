//! Minimal HTTP/1.1 backend for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// What the fake backend does with one connection.
#[derive(Clone)]
pub enum Reply {
    /// Send these SSE chunks, then wait for the client to hang up.
    EventsThenHold(Vec<String>),
    /// Send these SSE chunks, then close the socket.
    EventsThenClose(Vec<String>),
    /// Plain response with a body.
    Status(u16, String),
}

/// Something the backend observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Request { path: String, accept: Option<String> },
    ClientClosed { path: String },
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    pub seen: mpsc::UnboundedReceiver<Seen>,
}

impl FakeBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn next_seen(&mut self) -> Seen {
        tokio::time::timeout(Duration::from_secs(5), self.seen.recv())
            .await
            .expect("backend saw nothing within 5s")
            .expect("backend stopped")
    }
}

/// Serve `replies` in order, one per accepted connection.
pub async fn spawn_backend(replies: Vec<Reply>) -> FakeBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for reply in replies {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let tx = tx.clone();
            tokio::spawn(handle(socket, reply, tx));
        }
    });

    FakeBackend { addr, seen: rx }
}

async fn handle(mut socket: TcpStream, reply: Reply, tx: mpsc::UnboundedSender<Seen>) {
    let head = read_head(&mut socket).await;
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();
    let accept = head
        .lines()
        .find(|line| line.to_ascii_lowercase().starts_with("accept:"))
        .map(|line| line[7..].trim().to_string());
    let _ = tx.send(Seen::Request {
        path: path.clone(),
        accept,
    });

    match reply {
        Reply::Status(code, body) => {
            let response = format!(
                "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                code,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        Reply::EventsThenClose(events) => {
            write_events(&mut socket, &events).await;
            let _ = socket.shutdown().await;
        }
        Reply::EventsThenHold(events) => {
            write_events(&mut socket, &events).await;
            let mut buf = [0u8; 64];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            let _ = tx.send(Seen::ClientClosed { path });
        }
    }
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

async fn write_events(socket: &mut TcpStream, events: &[String]) {
    let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for event in events {
        if socket.write_all(event.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Encode one JSON document as an SSE `message` event.
pub fn sse(json: &str) -> String {
    format!("data: {}\n\n", json)
}
