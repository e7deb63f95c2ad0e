//! `sync_server`
//!
//! Server-side systems:
//! - Connection handshake and entity assignment
//! - Create/Login/Remove fan-out
//! - Move relay with per-source timestamps
//!
//! Networking model:
//! - TCP: handshake and entity lifecycle
//! - UDP: movement (unordered, unreliable)

pub mod server;

pub use server::GameServer;
