//! In-process stand-in for the execution server.
//!
//! `/ws/submit` reads the submit request, replays scripted frames, then ends
//! the connection the way the script says. `/submit` records the body and
//! answers with a fixed status and body.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use url::Url;

/// How the WebSocket handler ends after the scripted frames.
#[derive(Debug, Clone, Copy)]
pub enum Ending {
    /// Send a close frame.
    Close,
    /// Drop the TCP connection without a close handshake.
    Drop,
    /// Keep reading until the client goes away.
    Hang,
}

#[derive(Clone)]
pub struct Script {
    frames: Vec<String>,
    ending: Ending,
    http_status: StatusCode,
    http_body: String,
    received: Arc<Mutex<Vec<String>>>,
}

impl Script {
    pub fn frames(frames: &[&str], ending: Ending) -> Self {
        Self {
            frames: frames.iter().map(|frame| frame.to_string()).collect(),
            ending,
            http_status: StatusCode::OK,
            http_body: String::new(),
            received: Arc::default(),
        }
    }

    pub fn http(status: StatusCode, body: &str) -> Self {
        Self {
            http_status: status,
            http_body: body.to_string(),
            ..Self::frames(&[], Ending::Close)
        }
    }
}

pub struct FakeServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("server url")
    }

    /// Request bodies received so far, in order.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().expect("received lock").clone()
    }
}

/// Serve `script` on an ephemeral port from the current runtime.
pub async fn spawn(script: Script) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let received = Arc::clone(&script.received);
    let app = Router::new()
        .route("/ws/submit", get(ws_handler))
        .route("/submit", post(submit_handler))
        .with_state(script);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    FakeServer { addr, received }
}

/// Serve `script` from a runtime on its own thread, for tests that block on a
/// child process.
pub fn spawn_in_thread(script: Script) -> FakeServer {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async move {
            let server = spawn(script).await;
            tx.send(server).expect("hand over server");
            std::future::pending::<()>().await;
        });
    });
    rx.recv().expect("server started")
}

/// Address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr")
}

async fn ws_handler(ws: WebSocketUpgrade, State(script): State<Script>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| replay(socket, script))
}

async fn replay(mut socket: WebSocket, script: Script) {
    if let Some(Ok(Message::Text(request))) = socket.recv().await {
        script
            .received
            .lock()
            .expect("received lock")
            .push(request.to_string());
    }
    for frame in script.frames {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
    match script.ending {
        Ending::Close => {
            let _ = socket.send(Message::Close(None)).await;
        }
        Ending::Drop => drop(socket),
        Ending::Hang => while let Some(Ok(_)) = socket.recv().await {},
    }
}

async fn submit_handler(State(script): State<Script>, body: String) -> impl IntoResponse {
    script.received.lock().expect("received lock").push(body);
    (
        script.http_status,
        [("content-type", "application/json")],
        script.http_body,
    )
}
