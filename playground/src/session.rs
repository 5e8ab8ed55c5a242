//! Async driver that runs one [`ExecutionSession`] over a real transport.
//!
//! The driver owns the transport for the whole session. It performs the action
//! of each transition before delivering its event, so by the time an observer
//! sees a terminal event the transport has already been closed. Every wait on
//! the transport (open, send, receive) is raced against the cancel signal.

use std::future::Future;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::controller::SessionObserver;
use crate::core::session::{Action, ExecutionSession, SessionState, Transition};
use crate::io::transport::{Transport, TransportError};
use crate::tree::ProjectTree;

/// What woke the driver up.
enum Input {
    Opened,
    Frame(String),
    Closed,
    Failed(TransportError),
    Cancel,
}

/// Run a session to a terminal state and return that state.
///
/// Sending on (or dropping the sender of) `cancel` stops the session.
pub async fn run_session<T, O>(
    mut transport: T,
    tree: ProjectTree,
    observer: O,
    mut cancel: oneshot::Receiver<()>,
) -> SessionState
where
    T: Transport,
    O: SessionObserver,
{
    let mut session = ExecutionSession::new();
    info!(roots = tree.len(), "starting execution session");
    let mut transition = match session.start(tree) {
        Ok(transition) => transition,
        Err(err) => {
            warn!(error = %err, "session refused to start");
            return session.state();
        }
    };

    loop {
        let Transition { action, event } = transition;
        let input = match action {
            Some(action) => perform(&mut transport, action, &mut cancel).await,
            None => None,
        };
        if let Some(event) = event {
            observer.on_event(event);
        }
        if session.state().is_terminal() {
            break;
        }

        let input = match input {
            Some(input) => input,
            None => receive(&mut transport, &mut cancel).await,
        };
        transition = match input {
            Input::Opened => session.on_open(),
            Input::Frame(raw) => session.on_frame(&raw),
            Input::Closed => session.on_closed(),
            Input::Failed(err) => session.on_transport_error(&err),
            Input::Cancel => session.cancel(),
        };
    }

    info!(state = ?session.state(), "execution session finished");
    session.state()
}

/// Carry out `action`. Returns the input it produced, if any; a successful
/// send produces none and the driver goes on to read frames.
async fn perform<T: Transport>(
    transport: &mut T,
    action: Action,
    cancel: &mut oneshot::Receiver<()>,
) -> Option<Input> {
    match action {
        Action::Open => Some(match until_cancelled(cancel, transport.open()).await {
            None => Input::Cancel,
            Some(Ok(())) => Input::Opened,
            Some(Err(err)) => Input::Failed(err),
        }),
        Action::Send(payload) => match until_cancelled(cancel, transport.send(payload)).await {
            None => Some(Input::Cancel),
            Some(Ok(())) => None,
            Some(Err(err)) => Some(Input::Failed(err)),
        },
        Action::Close => {
            transport.close().await;
            debug!("transport closed");
            None
        }
    }
}

async fn receive<T: Transport>(transport: &mut T, cancel: &mut oneshot::Receiver<()>) -> Input {
    match until_cancelled(cancel, transport.recv()).await {
        None => Input::Cancel,
        Some(None) => Input::Closed,
        Some(Some(Ok(raw))) => Input::Frame(raw),
        Some(Some(Err(err))) => Input::Failed(err),
    }
}

/// `None` when the cancel signal fired (or its sender went away) first.
async fn until_cancelled<F: Future>(
    cancel: &mut oneshot::Receiver<()>,
    work: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel => None,
        output = work => Some(output),
    }
}
