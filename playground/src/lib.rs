//! Client for a remote code playground.
//!
//! Keeps a project tree of files and folders, submits it to an execution
//! server, and streams the program output back. The crate is split the same
//! way throughout:
//!
//! - **[`core`]**: Pure logic (tree edits, flattening, wire frames, the session
//!   state machine). No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (config, snapshot files, disk import/export,
//!   WebSocket and HTTP transports).
//!
//! [`session`] drives the state machine over a transport, [`controller`] keeps
//! at most one session running, and [`workspace`] holds the editor state the
//! CLI works on.

pub mod controller;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
pub mod workspace;
