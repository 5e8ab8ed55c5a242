//! Side-effecting helpers: configuration, snapshots, disk import/export, and
//! the network transports.

pub mod config;
pub mod disk;
pub mod snapshot;
pub mod transport;
