//! Execution session state machine.
//!
//! The machine performs no I/O. Each input returns a [`Transition`]: the
//! transport [`Action`] the driver must perform (if any) and the
//! [`SessionEvent`] to hand to the caller (if any). The driver performs the
//! action before delivering the event.
//!
//! ```text
//! Idle --start--> Connecting --open--> Streaming --result--> Completed
//!                     |                   |   \--error---> Failed
//!                     |                   +--drop/fail---> Failed
//!                     +--------cancel-----+--------------> Cancelled
//! ```
//!
//! Terminal states never transition again, and each terminal transition
//! carries the one `Close` action of the session.

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::protocol::{InboundFrame, decode_frame, encode_request};
use crate::tree::ProjectTree;

/// Appended to the accumulated output when the user stops a run.
pub const CANCELLED_MARKER: &str = "\n[Stopped by User]";

/// Caller-facing message for any transport-level failure.
pub const TRANSPORT_FAILURE: &str = "Connection to the execution server failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }

    /// Connecting or streaming: a transport is held and `cancel` applies.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Streaming)
    }
}

/// Transport work requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Open,
    Send(String),
    Close,
}

/// Notification delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A stdout or stderr chunk, in arrival order.
    Output(String),
    /// The run finished; the tree replaces the submitted one.
    Completed(ProjectTree),
    /// The run failed; the message is shown to the user as-is.
    Failed(String),
    /// The user stopped the run. Carries the output so far plus the marker.
    Cancelled { output: String },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionEvent::Output(_))
    }
}

/// Result of feeding one input to the state machine.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Transition {
    pub action: Option<Action>,
    pub event: Option<SessionEvent>,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }

    fn act(action: Action) -> Self {
        Self {
            action: Some(action),
            event: None,
        }
    }

    fn emit(event: SessionEvent) -> Self {
        Self {
            action: None,
            event: Some(event),
        }
    }

    fn finish(event: SessionEvent) -> Self {
        Self {
            action: Some(Action::Close),
            event: Some(event),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.action.is_none() && self.event.is_none()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a session can only be started once (current state: {0:?})")]
    AlreadyStarted(SessionState),
}

/// One request/stream lifecycle.
#[derive(Debug)]
pub struct ExecutionSession {
    state: SessionState,
    submitted: Option<ProjectTree>,
    output: String,
}

impl Default for ExecutionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            submitted: None,
            output: String::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Output accumulated so far (plus the marker once cancelled).
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Begin the session with a snapshot of `tree`. Only valid in `Idle`.
    pub fn start(&mut self, tree: ProjectTree) -> Result<Transition, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyStarted(self.state));
        }
        debug!(roots = tree.len(), "session connecting");
        self.submitted = Some(tree);
        self.state = SessionState::Connecting;
        Ok(Transition::act(Action::Open))
    }

    /// The transport reported that the channel is open.
    pub fn on_open(&mut self) -> Transition {
        if self.state != SessionState::Connecting {
            debug!(state = ?self.state, "ignoring open outside connecting");
            return Transition::none();
        }
        let tree = self.submitted.take().unwrap_or_default();
        match encode_request(&tree) {
            Ok(payload) => {
                debug!(bytes = payload.len(), "session streaming");
                self.state = SessionState::Streaming;
                Transition::act(Action::Send(payload))
            }
            Err(err) => {
                warn!(error = %err, "failed to encode submit request");
                self.fail(format!("Failed to encode project: {err}"))
            }
        }
    }

    /// One raw inbound frame arrived.
    ///
    /// Frames that do not parse, or carry an unknown type, are dropped and the
    /// stream continues.
    pub fn on_frame(&mut self, raw: &str) -> Transition {
        if self.state != SessionState::Streaming {
            debug!(state = ?self.state, "ignoring frame outside streaming");
            return Transition::none();
        }
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping inbound frame");
                return Transition::none();
            }
        };
        match frame {
            InboundFrame::Stdout { data } | InboundFrame::Stderr { data } => {
                self.output.push_str(&data);
                Transition::emit(SessionEvent::Output(data))
            }
            InboundFrame::Result { files } => {
                debug!(roots = files.len(), "session completed");
                self.state = SessionState::Completed;
                Transition::finish(SessionEvent::Completed(files))
            }
            InboundFrame::Error { message } => {
                debug!(message = %message, "session failed remotely");
                self.fail(message)
            }
        }
    }

    /// The transport failed (refused, reset, protocol violation).
    pub fn on_transport_error(&mut self, error: &dyn std::error::Error) -> Transition {
        if !self.state.is_active() {
            return Transition::none();
        }
        warn!(error = %error, state = ?self.state, "transport failure");
        self.fail(TRANSPORT_FAILURE.to_string())
    }

    /// The peer closed the channel. Before a terminal frame this is a failure.
    pub fn on_closed(&mut self) -> Transition {
        if !self.state.is_active() {
            return Transition::none();
        }
        warn!(state = ?self.state, "channel closed before a terminal frame");
        self.fail(TRANSPORT_FAILURE.to_string())
    }

    /// Stop the session. A no-op unless connecting or streaming.
    pub fn cancel(&mut self) -> Transition {
        if !self.state.is_active() {
            debug!(state = ?self.state, "cancel ignored");
            return Transition::none();
        }
        self.state = SessionState::Cancelled;
        self.submitted = None;
        self.output.push_str(CANCELLED_MARKER);
        Transition::finish(SessionEvent::Cancelled {
            output: self.output.clone(),
        })
    }

    fn fail(&mut self, message: String) -> Transition {
        self.state = SessionState::Failed;
        self.submitted = None;
        Transition::finish(SessionEvent::Failed(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    fn streaming_session() -> ExecutionSession {
        let mut session = ExecutionSession::new();
        session
            .start(ProjectTree::from_nodes(vec![Node::file("main.dingle", "print 5;")]))
            .expect("start");
        session.on_open();
        assert_eq!(session.state(), SessionState::Streaming);
        session
    }

    #[test]
    fn start_requests_open_then_send() {
        let mut session = ExecutionSession::new();
        let tree = ProjectTree::from_nodes(vec![Node::file("main.dingle", "print 5;")]);
        let expected = encode_request(&tree).expect("encode");

        let start = session.start(tree).expect("start");
        assert_eq!(start.action, Some(Action::Open));
        assert_eq!(session.state(), SessionState::Connecting);

        let open = session.on_open();
        assert_eq!(open.action, Some(Action::Send(expected)));
        assert!(open.event.is_none());
    }

    #[test]
    fn second_start_is_rejected() {
        let mut session = ExecutionSession::new();
        session.start(ProjectTree::new()).expect("start");
        assert_eq!(
            session.start(ProjectTree::new()),
            Err(SessionError::AlreadyStarted(SessionState::Connecting))
        );
    }

    #[test]
    fn stdout_then_result_completes_with_tree() {
        let mut session = streaming_session();

        let chunk = session.on_frame(r#"{"type":"stdout","data":"5\n"}"#);
        assert_eq!(chunk.event, Some(SessionEvent::Output("5\n".to_string())));
        assert!(chunk.action.is_none());

        let done = session.on_frame(
            r#"{"type":"result","files":[{"id":"x","name":"main.dingle","type":"file","content":"print 5;"}]}"#,
        );
        assert_eq!(done.action, Some(Action::Close));
        let Some(SessionEvent::Completed(tree)) = done.event else {
            panic!("expected completion");
        };
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.roots()[0].name(), "main.dingle");
        assert!(tree.roots()[0].is_file());
        assert_eq!(session.output(), "5\n");
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn stderr_accumulates_in_arrival_order() {
        let mut session = streaming_session();
        session.on_frame(r#"{"type":"stdout","data":"a"}"#);
        session.on_frame(r#"{"type":"stderr","data":"b"}"#);
        session.on_frame(r#"{"type":"stdout","data":"c"}"#);
        assert_eq!(session.output(), "abc");
    }

    #[test]
    fn malformed_frames_do_not_abort_stream() {
        let mut session = streaming_session();
        assert!(session.on_frame("{garbage").is_empty());
        assert!(session.on_frame(r#"{"type":"progress"}"#).is_empty());
        assert_eq!(session.state(), SessionState::Streaming);

        let chunk = session.on_frame(r#"{"type":"stdout","data":"ok"}"#);
        assert_eq!(chunk.event, Some(SessionEvent::Output("ok".to_string())));
    }

    #[test]
    fn error_frame_fails_with_verbatim_message() {
        let mut session = streaming_session();
        let failed = session.on_frame(r#"{"type":"error","message":"Error: main.dingle not found in root."}"#);
        assert_eq!(failed.action, Some(Action::Close));
        assert_eq!(
            failed.event,
            Some(SessionEvent::Failed(
                "Error: main.dingle not found in root.".to_string()
            ))
        );
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn transport_failure_while_connecting_fails_generically() {
        let mut session = ExecutionSession::new();
        session.start(ProjectTree::new()).expect("start");
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let failed = session.on_transport_error(&err);
        assert_eq!(failed.action, Some(Action::Close));
        assert_eq!(
            failed.event,
            Some(SessionEvent::Failed(TRANSPORT_FAILURE.to_string()))
        );
    }

    #[test]
    fn close_before_terminal_frame_fails() {
        let mut session = streaming_session();
        session.on_frame(r#"{"type":"stdout","data":"partial"}"#);
        let failed = session.on_closed();
        assert_eq!(
            failed.event,
            Some(SessionEvent::Failed(TRANSPORT_FAILURE.to_string()))
        );
    }

    #[test]
    fn cancel_preserves_output_and_appends_marker() {
        let mut session = streaming_session();
        session.on_frame(r#"{"type":"stdout","data":"1\n2\n"}"#);
        let cancelled = session.cancel();
        assert_eq!(cancelled.action, Some(Action::Close));
        assert_eq!(
            cancelled.event,
            Some(SessionEvent::Cancelled {
                output: format!("1\n2\n{CANCELLED_MARKER}")
            })
        );
        assert_eq!(session.state(), SessionState::Cancelled);
    }

    #[test]
    fn cancel_while_connecting_skips_send() {
        let mut session = ExecutionSession::new();
        session.start(ProjectTree::new()).expect("start");
        let cancelled = session.cancel();
        assert_eq!(cancelled.action, Some(Action::Close));
        assert!(session.on_open().is_empty());
    }

    #[test]
    fn terminal_state_ignores_everything() {
        let mut session = streaming_session();
        session.on_frame(r#"{"type":"result","files":[]}"#);
        assert_eq!(session.state(), SessionState::Completed);

        assert!(session.cancel().is_empty());
        assert!(session.on_frame(r#"{"type":"stdout","data":"late"}"#).is_empty());
        assert!(session.on_closed().is_empty());
        let err = std::io::Error::other("late");
        assert!(session.on_transport_error(&err).is_empty());
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.output(), "");
    }

    #[test]
    fn cancel_in_idle_is_noop() {
        let mut session = ExecutionSession::new();
        assert!(session.cancel().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }
}
