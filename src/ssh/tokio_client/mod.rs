//! russh-backed implementation of the session abstraction.
//!
//! [`RusshConnector`] performs the per-hop handshake and public key
//! authentication; [`RusshSession`] is the resulting connection, dialing
//! `direct-tcpip` and `direct-streamlocal` channels on behalf of the
//! forwarders.

pub mod authentication;
pub mod connection;
pub mod error;

pub use connection::{ClientHandler, RusshConnector, RusshSession};
pub use error::Error;

// Re-export russh types commonly used with this module
pub use russh::client::Config;
