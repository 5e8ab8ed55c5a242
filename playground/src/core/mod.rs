//! Deterministic, pure logic shared by the playground client.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values (project trees, inbound frames, session state) and return outputs
//! suitable for tests. The one exception is [`id`], whose only state is the
//! system random source.

pub mod edit;
pub mod flat;
pub mod id;
pub mod invariants;
pub mod path;
pub mod protocol;
pub mod samples;
pub mod sanitize;
pub mod session;
