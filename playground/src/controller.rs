//! Caller-facing façade over execution sessions.
//!
//! At most one session runs at a time. Each session runs in its own tokio task
//! and reports to a [`SessionObserver`]: zero or more output chunks, then
//! exactly one terminal notification.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::session::{SessionEvent, SessionState};
use crate::io::transport::Connector;
use crate::session::run_session;
use crate::tree::ProjectTree;

/// Receives the notifications of one session.
pub trait SessionObserver: Send + 'static {
    fn on_output(&self, chunk: &str);

    /// The run finished; `tree` replaces the submitted project.
    fn on_complete(&self, tree: ProjectTree);

    fn on_error(&self, message: &str);

    /// `output` is everything streamed so far plus the stop marker.
    fn on_cancelled(&self, output: &str);

    /// Dispatch `event` to the matching callback.
    fn on_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Output(chunk) => self.on_output(&chunk),
            SessionEvent::Completed(tree) => self.on_complete(tree),
            SessionEvent::Failed(message) => self.on_error(&message),
            SessionEvent::Cancelled { output } => self.on_cancelled(&output),
        }
    }
}

/// Forwards every event into the channel. Events after the receiver is gone
/// are discarded.
impl SessionObserver for mpsc::UnboundedSender<SessionEvent> {
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
        if self.send(event).is_err() {
            debug!("session event receiver dropped");
        }
    }
}

struct ActiveSession {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<SessionState>,
}

/// Owns zero or one running session. Must be used inside a tokio runtime.
///
/// Dropping the controller cancels the running session.
pub struct SessionController<C: Connector> {
    connector: C,
    active: Option<ActiveSession>,
}

impl<C: Connector> SessionController<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            active: None,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Start a session for `tree`. Ignored (returns `false`) while another
    /// session is still running.
    pub fn start<O: SessionObserver>(&mut self, tree: ProjectTree, observer: O) -> bool {
        if self.is_running() {
            debug!("start ignored: a session is already running");
            return false;
        }
        let transport = self.connector.connect();
        let (cancel, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(run_session(transport, tree, observer, cancel_rx));
        self.active = Some(ActiveSession { cancel, task });
        true
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Cancel the running session and wait until it has closed its transport
    /// and delivered its terminal notification.
    ///
    /// Returns the final state, or `None` when there was no session. A session
    /// that had already finished keeps its own outcome.
    pub async fn stop(&mut self) -> Option<SessionState> {
        let ActiveSession { cancel, task } = self.active.take()?;
        // The task may already be gone; its outcome stands.
        let _ = cancel.send(());
        Some(join(task).await)
    }

    /// Wait for the running session to finish on its own.
    pub async fn wait(&mut self) -> Option<SessionState> {
        let ActiveSession { cancel, task } = self.active.take()?;
        let state = join(task).await;
        drop(cancel);
        Some(state)
    }
}

async fn join(task: JoinHandle<SessionState>) -> SessionState {
    match task.await {
        Ok(state) => state,
        Err(err) => {
            warn!(error = %err, "session task did not finish cleanly");
            SessionState::Failed
        }
    }
}
