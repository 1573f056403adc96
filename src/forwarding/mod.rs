//! Local forwarding of one remote endpoint through an SSH session
//!
//! # Architecture
//!
//! - **endpoint**: `tcp:` / `unix:` endpoint classification
//! - **local**: local listeners (TCP on loopback, Unix socket in the scratch
//!   directory) and the accept loop shared by both
//! - **splice**: the per-connection bidirectional relay
//!
//! The local and remote transport kinds are independent: a TCP listener may
//! front a remote Unix socket and vice versa. Which local kind is used is
//! decided by [`resolve_forwarder_kind`].

pub mod endpoint;
pub mod local;
pub mod splice;

pub use endpoint::{classify_endpoint, EndpointKind, RemoteEndpoint};
pub use local::open_forwarder;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Whether this build can bind Unix-domain listeners
pub const UNIX_SOCKETS_SUPPORTED: bool = cfg!(unix);

/// Preferred local listener kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwarderKind {
    Tcp,
    Unix,
    /// Match the remote endpoint where the platform allows it
    #[default]
    Auto,
}

impl ForwarderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwarderKind::Tcp => "tcp",
            ForwarderKind::Unix => "unix",
            ForwarderKind::Auto => "auto",
        }
    }
}

impl FromStr for ForwarderKind {
    type Err = String;

    /// An empty string means `auto`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(ForwarderKind::Tcp),
            "unix" => Ok(ForwarderKind::Unix),
            "auto" | "" => Ok(ForwarderKind::Auto),
            other => Err(format!(
                "invalid forwarder kind {other:?}: expected tcp, unix or auto"
            )),
        }
    }
}

impl fmt::Display for ForwarderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide the effective local listener kind.
///
/// An explicit `tcp` or `unix` always wins. `auto` becomes `tcp` when
/// `unix_supported` is false, otherwise it follows the remote endpoint.
pub fn resolve_forwarder_kind(
    preference: ForwarderKind,
    remote: EndpointKind,
    unix_supported: bool,
) -> EndpointKind {
    match preference {
        ForwarderKind::Tcp => EndpointKind::Tcp,
        ForwarderKind::Unix => EndpointKind::Unix,
        ForwarderKind::Auto if !unix_supported => EndpointKind::Tcp,
        ForwarderKind::Auto => remote,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarder_kind_parse() {
        assert_eq!("tcp".parse::<ForwarderKind>().unwrap(), ForwarderKind::Tcp);
        assert_eq!(" Unix ".parse::<ForwarderKind>().unwrap(), ForwarderKind::Unix);
        assert_eq!("auto".parse::<ForwarderKind>().unwrap(), ForwarderKind::Auto);
        assert_eq!("".parse::<ForwarderKind>().unwrap(), ForwarderKind::Auto);
        assert!("udp".parse::<ForwarderKind>().is_err());
    }

    #[test]
    fn test_explicit_kind_wins() {
        for remote in [EndpointKind::Tcp, EndpointKind::Unix] {
            for unix_supported in [true, false] {
                assert_eq!(
                    resolve_forwarder_kind(ForwarderKind::Tcp, remote, unix_supported),
                    EndpointKind::Tcp
                );
                assert_eq!(
                    resolve_forwarder_kind(ForwarderKind::Unix, remote, unix_supported),
                    EndpointKind::Unix
                );
            }
        }
    }

    #[test]
    fn test_auto_follows_remote() {
        assert_eq!(
            resolve_forwarder_kind(ForwarderKind::Auto, EndpointKind::Tcp, true),
            EndpointKind::Tcp
        );
        assert_eq!(
            resolve_forwarder_kind(ForwarderKind::Auto, EndpointKind::Unix, true),
            EndpointKind::Unix
        );
    }

    #[test]
    fn test_auto_without_unix_support_is_tcp() {
        assert_eq!(
            resolve_forwarder_kind(ForwarderKind::Auto, EndpointKind::Unix, false),
            EndpointKind::Tcp
        );
    }
}
