//! Wire protocol for Tandem.
//!
//! This crate defines how typed values travel over a
//! [`Connection`](tandem_transport::Connection):
//!
//! - **Wire types** ([`Wire`]): 16/32-bit integers in network byte
//!   order, and length-prefixed byte strings and UTF-8 strings.
//! - **Chunking** ([`chunk_count`], [`chunk_ranges`]): how a long
//!   payload is split when the transport has a per-datagram limit.
//! - **Extension methods** ([`ConnectionExt`]): `send` / `receive` on
//!   every connection.
//! - **Errors** ([`ProtocolError`]): what can go wrong while framing.
//!
//! # Architecture
//!
//! ```text
//! Transport (raw bytes, liveness) → Protocol (typed values) → Registry
//! ```
//!
//! The protocol layer never opens sockets. It only decides which raw
//! sends and receives make up a value.

#![allow(async_fn_in_trait)]

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod chunk;
mod error;
mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use chunk::{chunk_count, chunk_ranges};
pub use error::ProtocolError;
pub use wire::{ConnectionExt, Wire};
