//! Client registry for Tandem servers.
//!
//! This crate tracks the server side of every logical connection:
//!
//! 1. **Registration**: turning an accepted [`PendingClient`] into a
//!    [`Connection`] under a fresh [`ClientId`] ([`Registry::insert`])
//! 2. **Per-client I/O**: typed send/receive by id, with dead
//!    connections pruned on access
//! 3. **Lifecycle events**: connect/disconnect notifications through the
//!    [`ClientEvents`] hook
//!
//! # How it fits in the stack
//!
//! ```text
//! Server / accept bridge (above)  ← drains accepted peers into the registry
//!     ↕
//! Registry (this crate)           ← owns every client connection
//!     ↕
//! Protocol + Transport (below)    ← typed values over raw connections
//! ```
//!
//! [`PendingClient`]: tandem_transport::PendingClient
//! [`Connection`]: tandem_transport::Connection
//! [`ClientId`]: tandem_transport::ClientId

mod error;
mod events;
mod registry;

pub use error::RegistryError;
pub use events::ClientEvents;
pub use registry::Registry;
