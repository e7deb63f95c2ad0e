//! `sync_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Clear separation of concerns (net, math, config, render events).
//! - Traits at the transport seam so the sync core can be driven without sockets.
//! - No `unsafe`.

pub mod config;
pub mod entity;
pub mod event;
pub mod math;
pub mod net;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::event::*;
    pub use crate::math::*;
    pub use crate::net::*;
}
