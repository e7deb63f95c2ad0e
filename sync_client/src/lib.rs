//! `sync_client`
//!
//! Client-side systems:
//! - Entity registry and per-entity interpolation
//! - Per-source staleness filtering of inbound moves
//! - Protocol handling (create, move, remove, login)
//! - Optimistic local movement with rate-limited broadcasts
//! - Socket-backed client wiring

pub mod client;
pub mod handler;
pub mod input;
pub mod interp;
pub mod movement;
pub mod outbound;
pub mod registry;
pub mod session;
pub mod staleness;
pub mod sync;

pub use client::GameClient;
pub use sync::{SyncClient, SyncClientBuilder};
