//! Non-streaming fallback: one POST, replayed as inbound frames.
//!
//! The response `{ output, files }` becomes a `stdout` frame (when output is
//! non-empty) followed by a `result` frame. A non-success status becomes an
//! `error` frame, so the session sees the same frame protocol as over a
//! WebSocket, only without incremental output.

use std::collections::VecDeque;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use super::{Connector, Transport, TransportError, submit_url};
use crate::core::protocol::{InboundFrame, SubmitResponse, encode_frame};

pub struct HttpTransport {
    client: Client,
    url: Url,
    open: bool,
    pending: VecDeque<String>,
}

impl HttpTransport {
    pub fn new(client: Client, url: Url) -> Self {
        Self {
            client,
            url,
            open: false,
            pending: VecDeque::new(),
        }
    }

    fn push(&mut self, frame: &InboundFrame) -> Result<(), TransportError> {
        self.pending.push_back(encode_frame(frame)?);
        Ok(())
    }
}

impl Transport for HttpTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.open = true;
        Ok(())
    }

    async fn send(&mut self, payload: String) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;
        let status = response.status();
        debug!(url = %self.url, %status, "submit response");
        if !status.is_success() {
            return self.push(&InboundFrame::Error {
                message: server_error(status),
            });
        }

        let SubmitResponse { output, files } = response.json().await?;
        if !output.is_empty() {
            self.push(&InboundFrame::Stdout { data: output })?;
        }
        self.push(&InboundFrame::Result { files })
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        if !self.open {
            return Some(Err(TransportError::NotOpen));
        }
        self.pending.pop_front().map(Ok)
    }

    async fn close(&mut self) {
        self.open = false;
        self.pending.clear();
    }
}

/// `Server Error: <reason>`, falling back to the numeric code when the status
/// has no standard reason phrase.
fn server_error(status: StatusCode) -> String {
    let reason = status.canonical_reason().unwrap_or(status.as_str());
    format!("Server Error: {reason}")
}

/// Shares one HTTP client across sessions.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
    url: Url,
}

impl HttpConnector {
    /// Connector for the submit endpoint of `server`. `timeout` bounds each
    /// request end to end.
    pub fn new(server: &Url, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: submit_url(server)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Connector for HttpConnector {
    type Transport = HttpTransport;

    fn connect(&self) -> HttpTransport {
        HttpTransport::new(self.client.clone(), self.url.clone())
    }
}
