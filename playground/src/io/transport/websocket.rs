//! Persistent WebSocket transport.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use super::{Connector, Transport, TransportError, websocket_url};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    url: Url,
    stream: Option<Stream>,
}

impl WebSocketTransport {
    pub fn new(url: Url) -> Self {
        Self { url, stream: None }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Transport for WebSocketTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        let (stream, response) = connect_async(self.url.as_str()).await?;
        debug!(url = %self.url, status = %response.status(), "websocket connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, payload: String) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream.send(Message::text(payload)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        let Some(stream) = self.stream.as_mut() else {
            return Some(Err(TransportError::NotOpen));
        };
        loop {
            match stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => warn!(len = bytes.len(), "dropping non-utf8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket closed by peer");
                    return None;
                }
                // Ping replies are queued by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        if let Err(err) = stream.close(None).await {
            debug!(error = %err, "websocket close handshake failed");
        }
    }
}

/// Opens a fresh [`WebSocketTransport`] per session.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
}

impl WebSocketConnector {
    /// Connector for the streaming endpoint of `server`.
    pub fn new(server: &Url) -> Result<Self, TransportError> {
        Ok(Self {
            url: websocket_url(server)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    fn connect(&self) -> WebSocketTransport {
        WebSocketTransport::new(self.url.clone())
    }
}
