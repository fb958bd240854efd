//! # acp-io
//!
//! Framed transport for ACP messages over blocking TCP.
//!
//! A [`Connection`] owns at most one TCP stream (plus, on the listening
//! side, one listener socket) and moves whole messages across it: each
//! message is self-delimiting through the length field in its preamble,
//! so [`Connection::read_message`] blocks until exactly one message has
//! arrived and [`Connection::write_message`] blocks until one has been
//! written out.
//!
//! The model is single-threaded and synchronous. Transient socket
//! conditions (would-block, interrupted) are retried internally with a
//! short fixed backoff; peer shutdown surfaces as an empty view, like
//! end-of-file; everything else is fatal for the connection. Independent
//! connections share no state, so running one per thread needs no
//! synchronization.

pub mod connection;
pub mod error;

pub use connection::{Connection, ConnectionConfig};
pub use error::IoError;
