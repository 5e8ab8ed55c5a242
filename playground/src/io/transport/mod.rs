//! Duplex message channels to the execution server.
//!
//! A [`Transport`] carries text frames: the session sends exactly one request
//! and then reads frames until the channel ends. Two implementations exist:
//! a persistent WebSocket ([`websocket`]) and a single HTTP exchange whose
//! response is replayed as frames ([`http`]).

pub mod http;
pub mod websocket;

use std::future::Future;

use thiserror::Error;
use tokio_tungstenite::tungstenite;
use url::Url;

pub use self::http::{HttpConnector, HttpTransport};
pub use self::websocket::{WebSocketConnector, WebSocketTransport};

/// Path of the streaming endpoint, relative to the server base URL.
pub const WEBSOCKET_PATH: &str = "ws/submit";
/// Path of the non-streaming endpoint, relative to the server base URL.
pub const SUBMIT_PATH: &str = "submit";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("encode frame: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("transport is not open")]
    NotOpen,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        TransportError::WebSocket(Box::new(err))
    }
}

/// One message-oriented channel, exclusively owned by a session task.
pub trait Transport: Send + 'static {
    /// Establish the channel.
    fn open(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Send one text frame.
    fn send(&mut self, payload: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next inbound text frame. `None` once the peer has closed the channel.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String, TransportError>>> + Send;

    /// Release the channel. Calling it more than once is harmless.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Factory for fresh, unopened transports.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn connect(&self) -> Self::Transport;
}

/// Streaming endpoint for `base`: `http` becomes `ws`, `https` becomes `wss`.
pub fn websocket_url(base: &Url) -> Result<Url, TransportError> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme '{other}' in {base}"
            )));
        }
    };
    let mut url = endpoint(base, WEBSOCKET_PATH);
    url.set_scheme(scheme)
        .map_err(|()| TransportError::InvalidEndpoint(format!("cannot use {scheme} for {base}")))?;
    Ok(url)
}

/// Non-streaming endpoint for `base`.
pub fn submit_url(base: &Url) -> Result<Url, TransportError> {
    match base.scheme() {
        "http" | "https" => Ok(endpoint(base, SUBMIT_PATH)),
        other => Err(TransportError::InvalidEndpoint(format!(
            "unsupported scheme '{other}' in {base}"
        ))),
    }
}

/// `base` with `path` appended to its own path; query and fragment dropped.
fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/{path}"));
    url.set_query(None);
    url.set_fragment(None);
    url
}
