//! Test-only collaborators: a scripted transport, a recording observer, and
//! small tree builders.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tempfile::TempDir;
use tokio_tungstenite::tungstenite;

use crate::controller::SessionObserver;
use crate::core::session::SessionEvent;
use crate::io::transport::{Connector, Transport, TransportError};
use crate::tree::{Node, ProjectTree};

#[derive(Debug, Default)]
struct TallyState {
    connects: usize,
    opens: usize,
    closes: usize,
    sent: Vec<String>,
}

/// Counters shared by a scripted connector and every transport it creates.
#[derive(Debug, Clone, Default)]
pub struct Tally(Arc<Mutex<TallyState>>);

impl Tally {
    fn state(&self) -> MutexGuard<'_, TallyState> {
        self.0.lock().expect("tally lock")
    }

    pub fn connects(&self) -> usize {
        self.state().connects
    }

    pub fn opens(&self) -> usize {
        self.state().opens
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    /// Poll until at least `count` requests went out. Panics after two seconds.
    pub async fn wait_for_sent(&self, count: usize) {
        for _ in 0..400 {
            if self.state().sent.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {count} sent requests");
    }
}

/// Transport that replays canned inbound frames.
///
/// After the script runs out the peer "closes" (`recv` yields `None`), unless
/// [`ScriptedTransport::hold_open`] was requested, in which case `recv` never
/// returns.
#[derive(Debug)]
pub struct ScriptedTransport {
    frames: VecDeque<String>,
    fail_open: bool,
    hold_open: bool,
    tally: Tally,
}

impl ScriptedTransport {
    pub fn new(frames: Vec<&str>) -> Self {
        Self {
            frames: frames.into_iter().map(str::to_string).collect(),
            fail_open: false,
            hold_open: false,
            tally: Tally::default(),
        }
    }

    /// A transport whose `open` is refused.
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn tally(&self) -> Tally {
        self.tally.clone()
    }
}

impl Transport for ScriptedTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.tally.state().opens += 1;
        if self.fail_open {
            return Err(tungstenite::Error::ConnectionClosed.into());
        }
        Ok(())
    }

    async fn send(&mut self, payload: String) -> Result<(), TransportError> {
        self.tally.state().sent.push(payload);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(Ok(frame));
        }
        if self.hold_open {
            std::future::pending::<()>().await;
        }
        None
    }

    async fn close(&mut self) {
        self.tally.state().closes += 1;
    }
}

/// Connector handing out [`ScriptedTransport`]s that share one script and
/// one [`Tally`].
#[derive(Debug, Clone)]
pub struct ScriptedConnector {
    frames: Vec<String>,
    hold_open: bool,
    tally: Tally,
}

impl ScriptedConnector {
    pub fn new(frames: Vec<&str>) -> Self {
        Self {
            frames: frames.into_iter().map(str::to_string).collect(),
            hold_open: false,
            tally: Tally::default(),
        }
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn tally(&self) -> Tally {
        self.tally.clone()
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn connect(&self) -> ScriptedTransport {
        self.tally.state().connects += 1;
        ScriptedTransport {
            frames: self.frames.iter().cloned().collect(),
            fail_open: false,
            hold_open: self.hold_open,
            tally: self.tally.clone(),
        }
    }
}

/// Observer that keeps every event it receives, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().expect("events lock").clone()
    }

    /// Poll until at least `count` events arrived. Panics after two seconds.
    pub async fn wait_for_events(&self, count: usize) {
        for _ in 0..400 {
            if self.events.lock().expect("events lock").len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {count} session events");
    }
}

impl SessionObserver for RecordingObserver {
    fn on_output(&self, chunk: &str) {
        self.on_event(SessionEvent::Output(chunk.to_string()));
    }

    fn on_complete(&self, tree: ProjectTree) {
        self.on_event(SessionEvent::Completed(tree));
    }

    fn on_error(&self, message: &str) {
        self.on_event(SessionEvent::Failed(message.to_string()));
    }

    fn on_cancelled(&self, output: &str) {
        self.on_event(SessionEvent::Cancelled {
            output: output.to_string(),
        });
    }

    fn on_event(&self, event: SessionEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

/// Project holding a single root `main.dingle`.
pub fn main_only(content: &str) -> ProjectTree {
    ProjectTree::from_nodes(vec![Node::file("main.dingle", content)])
}

/// `main.dingle` plus `lib/util.dingle` and an empty `assets/` folder.
pub fn nested_project() -> ProjectTree {
    ProjectTree::from_nodes(vec![
        Node::file("main.dingle", "import(\"lib/util.dingle\");\nprint 1;\n"),
        Node::folder_with("lib", vec![Node::file("util.dingle", "define util() {}\n")]),
        Node::folder("assets"),
    ])
}

/// Fresh temporary project directory.
pub fn temp_project() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}
