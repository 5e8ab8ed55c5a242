//! Stable exit codes for playground CLI commands.

/// Command succeeded, or the run completed.
pub const OK: i32 = 0;
/// Bad arguments, config, snapshot or node id.
pub const INVALID: i32 = 1;
/// The run failed: transport failure or an error reported by the server.
pub const FAILED: i32 = 2;
/// The run was stopped with Ctrl-C.
pub const CANCELLED: i32 = 3;
